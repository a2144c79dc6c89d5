use femtos::Instant;
use log::debug;

use zeta_core::{EdgeSignal, Memory, Signal};
use zeta_z80::assembly::{self, Mnemonic};
use zeta_z80::{PortBus, PortDeviceBox, Z80, Z80State};

use crate::breakpoints::{BreakpointHandle, BreakpointSet};
use crate::history::{ExecutedInstruction, ExecutionHistory};
use crate::watches::{WatchHandle, WatchSet};

/// Why `run` returned control to the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The pause line was raised.
    Paused,
    /// A breakpoint fired; observers have already been notified.
    Breakpoint(BreakpointHandle),
    /// The reset line was raised.  The CPU has not been reset; the host
    /// decides when to call `reset` (and restore ROM, which is its job).
    Reset,
}

/// The fetch-execute driver.  Owns the CPU and the port bus (which borrows
/// its devices), borrows the memory, and checks breakpoints after every
/// instruction.  Host commands arrive over signal lines sampled at
/// instruction boundaries only.
pub struct Runner<'a> {
    pub cpu: Z80,
    memory: &'a mut Memory,
    io: PortBus,
    pub breakpoints: BreakpointSet,
    pub watches: WatchSet,
    pause: Signal<bool>,
    reset_request: EdgeSignal,
    history: Option<ExecutionHistory>,
    clock: Instant,
}

impl<'a> Runner<'a> {
    pub fn new(cpu: Z80, memory: &'a mut Memory) -> Runner<'a> {
        Runner {
            cpu,
            memory,
            io: PortBus::default(),
            breakpoints: BreakpointSet::default(),
            watches: WatchSet::default(),
            pause: Signal::new(false),
            reset_request: EdgeSignal::default(),
            history: None,
            clock: Instant::START,
        }
    }

    pub fn attach_device(&mut self, device: PortDeviceBox) {
        self.io.attach(device);
    }

    pub fn detach_device(&mut self, device: &PortDeviceBox) {
        self.io.detach(device);
    }

    /// A clone of the pause line for the host to keep; raising it stops
    /// `run` at the next instruction boundary.
    pub fn pause_signal(&self) -> Signal<bool> {
        self.pause.clone()
    }

    /// A clone of the reset-request line for the host to keep; the edge is
    /// consumed when the runner observes it.
    pub fn reset_signal(&self) -> EdgeSignal {
        self.reset_request.clone()
    }

    pub fn pause(&self) {
        self.pause.set(true);
    }

    /// Execute exactly one fetch-execute cycle and check breakpoints,
    /// returning the handles of any that fired.
    pub fn step(&mut self) -> Vec<BreakpointHandle> {
        let state_before = self.history.as_ref().map(|_| self.cpu.state.clone());

        let cycles = self.cpu.step(self.memory, &mut self.io);
        self.clock = self.clock + self.cpu.frequency.period_duration() * cycles as u64;

        if let Some(history) = self.history.as_mut() {
            history.push(ExecutedInstruction {
                pc: self.cpu.decoder.start,
                instruction: self.cpu.decoder.instruction,
                tstates: self.cpu.tstates,
                state_before: state_before.unwrap(),
                state_after: self.cpu.state.clone(),
            });
        }

        self.breakpoints.check_all(&self.cpu.state, self.memory)
    }

    /// Run until the host raises a line or a breakpoint fires.  A pause left
    /// raised from an earlier stop is still in effect; `resume` clears it.
    pub fn run(&mut self) -> StopReason {
        loop {
            if self.reset_request.get() {
                debug!("runner: reset requested");
                return StopReason::Reset;
            }
            if self.pause.get() {
                debug!("runner: paused at pc {:#06x}", self.cpu.state.pc);
                return StopReason::Paused;
            }

            let fired = self.step();
            if let Some(first) = fired.first() {
                return StopReason::Breakpoint(*first);
            }
        }
    }

    /// Clear the pause line and continue running.
    pub fn resume(&mut self) -> StopReason {
        self.pause.set(false);
        self.run()
    }

    /// Reset the CPU to its power-on state.  The derived clock restarts with
    /// the t-state counter.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.clock = Instant::START;
    }

    pub fn nmi(&mut self) {
        self.cpu.request_nmi();
    }

    pub fn interrupt(&mut self, data: u8) {
        self.cpu.request_interrupt(data);
    }

    /// The register snapshot for the host's display.
    pub fn registers(&self) -> &Z80State {
        &self.cpu.state
    }

    /// The derived wall-clock position of the emulated CPU; the t-state
    /// counter on the CPU is the authoritative clock.
    pub fn clock(&self) -> Instant {
        self.clock
    }

    pub fn read_bytes(&self, addr: u16, length: usize) -> Vec<u8> {
        let mut out = vec![0; length];
        self.memory.read_bytes(addr, &mut out);
        out
    }

    /// Debugger poke, for hosts that let the user edit memory while paused.
    pub fn write_byte(&mut self, addr: u16, value: u8) {
        self.memory.write_byte(addr, value);
    }

    pub fn disassemble(&self, addr: u16, count: usize) -> Vec<(u16, Mnemonic)> {
        assembly::disassemble_count(self.memory, addr, count)
    }

    /// Render every watch against current memory.
    pub fn watch_values(&self) -> Vec<(WatchHandle, String)> {
        self.watches.render_all(self.memory)
    }

    /// Start recording execution history (a bounded ring; see
    /// `ExecutionHistory`).  Recording costs a state snapshot per
    /// instruction, so it is off unless a host turns it on.
    pub fn enable_history(&mut self) {
        if self.history.is_none() {
            self.history = Some(ExecutionHistory::default());
        }
    }

    pub fn disable_history(&mut self) {
        self.history = None;
    }

    pub fn history(&self) -> Option<&ExecutionHistory> {
        self.history.as_ref()
    }
}
