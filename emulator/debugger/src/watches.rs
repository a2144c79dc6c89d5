use core::fmt::Write;

use zeta_core::{Memory, ADDRESSABLE_SIZE};

use crate::charset;
use crate::DebuggerError;

/// The numeric base an integer watch is displayed in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DisplayBase {
    Decimal,
    Hexadecimal,
    Octal,
    Binary,
}

/// The byte order the watched memory is interpreted in.  The Z80 itself is
/// little-endian; a big-endian watch is for data the program stores
/// high-byte-first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WatchByteOrder {
    LittleEndian,
    BigEndian,
}

/// The storage width of an integer watch.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntegerWidth {
    I8 = 1,
    I16 = 2,
    I32 = 4,
    I64 = 8,
    I128 = 16,
}

impl IntegerWidth {
    pub fn size_bytes(self) -> usize {
        self as usize
    }

    pub fn bits(self) -> usize {
        self.size_bytes() * 8
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CharacterEncoding {
    Spectrum,
    Ascii,
}

/// A read-only typed view of a chunk of memory.  Rendering is a pure
/// function of the watched bytes and the display settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryWatch {
    Integer {
        address: u16,
        width: IntegerWidth,
        base: DisplayBase,
        byte_order: WatchByteOrder,
    },
    String {
        address: u16,
        length: u16,
        encoding: CharacterEncoding,
    },
}

impl MemoryWatch {
    pub fn address(&self) -> u16 {
        match self {
            MemoryWatch::Integer {
                address, ..
            } => *address,
            MemoryWatch::String {
                address, ..
            } => *address,
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            MemoryWatch::Integer {
                width, ..
            } => width.size_bytes(),
            MemoryWatch::String {
                length, ..
            } => *length as usize,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            MemoryWatch::Integer {
                width, ..
            } => format!("Int [{}]", width.bits()),
            MemoryWatch::String {
                length, ..
            } => format!("String [{}]", length),
        }
    }

    fn validate(&self) -> Result<(), DebuggerError> {
        let size = self.size_bytes();
        if self.address() as usize + size > ADDRESSABLE_SIZE {
            return Err(DebuggerError::InvalidAddress {
                address: self.address(),
                size,
            });
        }
        Ok(())
    }

    /// Render the current value of the watched memory.
    pub fn display_value(&self, memory: &Memory) -> String {
        match *self {
            MemoryWatch::Integer {
                address,
                width,
                base,
                byte_order,
            } => {
                let mut buffer = [0; 16];
                let bytes = &mut buffer[..width.size_bytes()];
                memory.read_bytes(address, bytes);
                if byte_order == WatchByteOrder::BigEndian {
                    // normalise to the Z80's native order before formatting
                    bytes.reverse();
                }

                if width == IntegerWidth::I128 {
                    return big_display_value(bytes);
                }

                let value = bytes.iter().rev().fold(0u64, |acc, byte| (acc << 8) | *byte as u64);
                match base {
                    DisplayBase::Decimal => format!("{}", value),
                    DisplayBase::Hexadecimal => format!("{:#0digits$x}", value, digits = width.size_bytes() * 2 + 2),
                    DisplayBase::Octal if value == 0 => "0".to_string(),
                    DisplayBase::Octal => format!("0{:o}", value),
                    DisplayBase::Binary => format!("{:#b}", value),
                }
            },
            MemoryWatch::String {
                address,
                length,
                encoding,
            } => {
                let mut bytes = vec![0; length as usize];
                memory.read_bytes(address, &mut bytes);

                let mut out = String::with_capacity(bytes.len());
                for byte in bytes {
                    match encoding {
                        CharacterEncoding::Spectrum => charset::push_spectrum_char(&mut out, byte),
                        CharacterEncoding::Ascii => charset::push_ascii_char(&mut out, byte),
                    }
                }
                out
            },
        }
    }
}

/// Values too wide for a native integer are shown as hex only, most
/// significant byte first.
fn big_display_value(le_bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + le_bytes.len() * 2);
    out.push_str("0x");
    for byte in le_bytes.iter().rev() {
        write!(out, "{:02x}", byte).unwrap();
    }
    out
}

/// A stable ticket for one registered watch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WatchHandle(u32);

/// The watch registry.  Watches never affect execution; they are rendered on
/// demand for the host's display.
#[derive(Default)]
pub struct WatchSet {
    entries: Vec<(WatchHandle, MemoryWatch)>,
    next_handle: u32,
}

impl WatchSet {
    pub fn add(&mut self, watch: MemoryWatch) -> Result<WatchHandle, DebuggerError> {
        watch.validate()?;
        let handle = WatchHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push((handle, watch));
        Ok(handle)
    }

    pub fn remove(&mut self, handle: WatchHandle) -> bool {
        if let Some(index) = self.entries.iter().position(|(candidate, _)| *candidate == handle) {
            self.entries.remove(index);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, handle: WatchHandle) -> Option<&MemoryWatch> {
        self.entries.iter().find(|(candidate, _)| *candidate == handle).map(|(_, watch)| watch)
    }

    pub fn iter(&self) -> impl Iterator<Item = (WatchHandle, &MemoryWatch)> {
        self.entries.iter().map(|(handle, watch)| (*handle, watch))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render every watch against the current memory contents.
    pub fn render_all(&self, memory: &Memory) -> Vec<(WatchHandle, String)> {
        self.entries.iter().map(|(handle, watch)| (*handle, watch.display_value(memory))).collect()
    }
}
