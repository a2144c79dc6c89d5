use std::rc::{Rc, Weak};

use log::debug;

use zeta_core::{Memory, ADDRESSABLE_SIZE};
use zeta_z80::Z80State;

use crate::DebuggerError;

/// Something that wants to hear about a breakpoint firing.
///
/// Observers are registered as `Rc` handles and held weakly, so dropping the
/// last strong reference unsubscribes an observer on its own; no
/// remove-before-drop discipline is required of the caller.
pub trait BreakpointObserver {
    fn notify(&self, breakpoint: &Breakpoint);
}

/// The width of the word monitored by a memory-change breakpoint.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChangeWidth {
    Byte = 1,
    Word = 2,
    Long = 4,
    Quad = 8,
}

impl ChangeWidth {
    pub fn size_bytes(self) -> usize {
        self as usize
    }

    pub fn bits(self) -> usize {
        self.size_bytes() * 8
    }
}

/// A breakpoint condition.  Equality is structural, so two breakpoints
/// watching the same thing compare equal regardless of their registry state;
/// duplicate policy is the caller's call, the registry itself allows them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Breakpoint {
    /// Fires when PC equals the address at an instruction boundary.
    ProgramCounter { address: u16 },
    /// Fires whenever SP is below the address.
    StackPointerBelow { address: u16 },
    /// Fires when the word at the address differs from its last observed
    /// value.  Never fires on the first check, when no previous value
    /// exists.
    MemoryChanged { address: u16, width: ChangeWidth },
}

impl Breakpoint {
    pub fn type_name(&self) -> &'static str {
        match self {
            Breakpoint::ProgramCounter {
                ..
            } => "Program counter",
            Breakpoint::StackPointerBelow {
                ..
            } => "Stack pointer below",
            Breakpoint::MemoryChanged {
                ..
            } => "Memory value change",
        }
    }

    pub fn condition_description(&self) -> String {
        match self {
            Breakpoint::ProgramCounter {
                address,
            } => format!("PC == 0x{:04x}", address),
            Breakpoint::StackPointerBelow {
                address,
            } => format!("SP < 0x{:04x}", address),
            Breakpoint::MemoryChanged {
                address,
                width,
            } => format!("{}-bit value at address 0x{:04x} changes", width.bits(), address),
        }
    }

    fn validate(&self) -> Result<(), DebuggerError> {
        if let Breakpoint::MemoryChanged {
            address,
            width,
        } = self
        {
            let size = width.size_bytes();
            if *address as usize + size > ADDRESSABLE_SIZE {
                return Err(DebuggerError::InvalidAddress {
                    address: *address,
                    size,
                });
            }
        }
        Ok(())
    }
}

/// A stable ticket for one registered breakpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BreakpointHandle(u32);

pub type ObserverRef = Rc<dyn BreakpointObserver>;

struct BreakpointEntry {
    handle: BreakpointHandle,
    breakpoint: Breakpoint,
    enabled: bool,
    last_seen: Option<u64>,
    observers: Vec<Weak<dyn BreakpointObserver>>,
}

/// The breakpoint registry.  `check_all` is driven by the runner after every
/// instruction; observers of fired breakpoints are notified synchronously in
/// registration order.
#[derive(Default)]
pub struct BreakpointSet {
    entries: Vec<BreakpointEntry>,
    next_handle: u32,
}

impl BreakpointSet {
    pub fn add(&mut self, breakpoint: Breakpoint) -> Result<BreakpointHandle, DebuggerError> {
        breakpoint.validate()?;
        let handle = BreakpointHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(BreakpointEntry {
            handle,
            breakpoint,
            enabled: true,
            last_seen: None,
            observers: Vec::new(),
        });
        Ok(handle)
    }

    pub fn remove(&mut self, handle: BreakpointHandle) -> bool {
        if let Some(index) = self.entries.iter().position(|entry| entry.handle == handle) {
            self.entries.remove(index);
            true
        } else {
            false
        }
    }

    pub fn enable(&mut self, handle: BreakpointHandle) -> bool {
        self.set_enabled(handle, true)
    }

    pub fn disable(&mut self, handle: BreakpointHandle) -> bool {
        self.set_enabled(handle, false)
    }

    fn set_enabled(&mut self, handle: BreakpointHandle, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|entry| entry.handle == handle) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            },
            None => false,
        }
    }

    pub fn is_enabled(&self, handle: BreakpointHandle) -> Option<bool> {
        self.entries.iter().find(|entry| entry.handle == handle).map(|entry| entry.enabled)
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, handle: BreakpointHandle) -> Option<&Breakpoint> {
        self.entries.iter().find(|entry| entry.handle == handle).map(|entry| &entry.breakpoint)
    }

    /// Structural-duplicate probe, for hosts that want to reject duplicates
    /// before adding.
    pub fn contains(&self, breakpoint: &Breakpoint) -> bool {
        self.entries.iter().any(|entry| entry.breakpoint == *breakpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BreakpointHandle, &Breakpoint, bool)> {
        self.entries.iter().map(|entry| (entry.handle, &entry.breakpoint, entry.enabled))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add_observer(&mut self, handle: BreakpointHandle, observer: &ObserverRef) -> bool {
        match self.entries.iter_mut().find(|entry| entry.handle == handle) {
            Some(entry) => {
                entry.observers.push(Rc::downgrade(observer));
                true
            },
            None => false,
        }
    }

    pub fn remove_observer(&mut self, handle: BreakpointHandle, observer: &ObserverRef) -> bool {
        match self.entries.iter_mut().find(|entry| entry.handle == handle) {
            Some(entry) => {
                let before = entry.observers.len();
                entry.observers.retain(|candidate| match candidate.upgrade() {
                    Some(registered) => !Rc::ptr_eq(&registered, observer),
                    None => false,
                });
                entry.observers.len() != before
            },
            None => false,
        }
    }

    /// Evaluate every enabled breakpoint against the CPU state, notify the
    /// observers of each that fired, and return the fired handles.
    pub fn check_all(&mut self, state: &Z80State, memory: &Memory) -> Vec<BreakpointHandle> {
        let mut fired = Vec::new();

        for entry in self.entries.iter_mut() {
            if !entry.enabled {
                continue;
            }

            let hit = match entry.breakpoint {
                Breakpoint::ProgramCounter {
                    address,
                } => state.pc == address,
                Breakpoint::StackPointerBelow {
                    address,
                } => state.sp < address,
                Breakpoint::MemoryChanged {
                    address,
                    width,
                } => {
                    let current = read_z80_word(memory, address, width);
                    let changed = matches!(entry.last_seen, Some(previous) if previous != current);
                    entry.last_seen = Some(current);
                    changed
                },
            };

            if hit {
                debug!("breakpoint fired: {}", entry.breakpoint.condition_description());
                fired.push(entry.handle);

                // prune observers that have been dropped while notifying the
                // rest, preserving registration order
                entry.observers.retain(|observer| match observer.upgrade() {
                    Some(observer) => {
                        observer.notify(&entry.breakpoint);
                        true
                    },
                    None => false,
                });
            }
        }

        fired
    }
}

/// Assemble a Z80-byte-order (little-endian) word of the given width.
fn read_z80_word(memory: &Memory, addr: u16, width: ChangeWidth) -> u64 {
    let mut buffer = [0; 8];
    let bytes = &mut buffer[..width.size_bytes()];
    memory.read_bytes(addr, bytes);
    bytes.iter().rev().fold(0, |acc, byte| (acc << 8) | *byte as u64)
}
