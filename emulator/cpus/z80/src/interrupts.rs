use log::{debug, warn};

use zeta_core::Memory;

use crate::instructions::{Instruction, InterruptMode};
use crate::state::Z80;
use crate::timing::Z80InstructionCycles;

const NMI_VECTOR: u16 = 0x0066;
const IM1_VECTOR: u16 = 0x0038;

const NMI_CYCLES: u16 = 11;
const IM1_CYCLES: u16 = 13;
const IM2_CYCLES: u16 = 19;
/// Added to the executed instruction's cost for the IM 0 acknowledge cycle.
const IM0_ACK_CYCLES: u16 = 2;

/// Interrupt request lines and the EI deferral latch.  IFF1/IFF2, the
/// interrupt mode and the halted flag live in the register state, where the
/// instructions that change them can reach them.
#[derive(Clone, Debug, Default)]
pub struct InterruptState {
    pub nmi_pending: bool,
    pub irq_pending: bool,
    pub irq_data: u8,
    pub ei_deferred: bool,
}

impl Z80 {
    /// Pull the NMI line.  The interrupt is accepted before the next
    /// instruction regardless of IFF1.
    pub fn request_nmi(&mut self) {
        self.intr.nmi_pending = true;
    }

    /// Raise a maskable interrupt, with the byte the device would place on
    /// the data bus during the acknowledge cycle (the IM 0 instruction, or
    /// the IM 2 vector-table low byte).
    pub fn request_interrupt(&mut self, data: u8) {
        self.intr.irq_pending = true;
        self.intr.irq_data = data;
    }

    /// Service a pending interrupt if the protocol allows it at this
    /// boundary, returning the T-states charged.
    pub(crate) fn check_pending_interrupts(&mut self, memory: &mut Memory) -> Option<u16> {
        if self.intr.nmi_pending {
            return Some(self.accept_nmi(memory));
        }

        if self.intr.irq_pending && self.state.iff1 && !self.intr.ei_deferred {
            return Some(self.accept_interrupt(memory));
        }

        None
    }

    fn accept_nmi(&mut self, memory: &mut Memory) -> u16 {
        debug!("z80: accepting nmi at pc {:#06x}", self.state.pc);
        self.intr.nmi_pending = false;
        self.state.halted = false;
        self.state.iff2 = self.state.iff1;
        self.state.iff1 = false;
        self.state.refresh(1);

        self.push_word(memory, self.state.pc);
        self.state.pc = NMI_VECTOR;
        self.state.memptr = NMI_VECTOR;
        NMI_CYCLES
    }

    fn accept_interrupt(&mut self, memory: &mut Memory) -> u16 {
        let data = self.intr.irq_data;
        debug!("z80: accepting irq (im {:?}, data {:#04x}) at pc {:#06x}", self.state.im, data, self.state.pc);
        self.intr.irq_pending = false;
        self.state.halted = false;
        self.state.iff1 = false;
        self.state.iff2 = false;
        self.state.refresh(1);

        match self.state.im {
            InterruptMode::Mode0 => {
                // the device supplies one opcode byte; RST is what real
                // hardware puts on the bus, and anything that would need
                // operand fetches cannot be completed from a single byte
                if (data & 0xC7) == 0xC7 {
                    let vector = data & 0x38;
                    self.push_word(memory, self.state.pc);
                    self.state.pc = vector as u16;
                    self.state.memptr = self.state.pc;
                    let cost = Z80InstructionCycles::from_instruction(&Instruction::RST(vector), 0).calculate_cycles(false);
                    cost + IM0_ACK_CYCLES
                } else {
                    warn!("z80: im 0 data byte {:#04x} is not a single-byte instruction, executing as nop", data);
                    4 + IM0_ACK_CYCLES
                }
            },
            InterruptMode::Mode1 => {
                self.push_word(memory, self.state.pc);
                self.state.pc = IM1_VECTOR;
                self.state.memptr = self.state.pc;
                IM1_CYCLES
            },
            InterruptMode::Mode2 => {
                let vector_addr = ((self.state.i as u16) << 8) | ((data & 0xFE) as u16);
                self.push_word(memory, self.state.pc);
                self.state.pc = memory.read_word_le(vector_addr);
                self.state.memptr = self.state.pc;
                IM2_CYCLES
            },
        }
    }
}
