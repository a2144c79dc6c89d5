use zeta_core::Memory;

use crate::decode::Z80Decoder;
use crate::instructions::{
    Condition, Direction, IndexRegister, Instruction, LoadTarget, Register, RegisterPair, SpecialRegister, Target,
};
use crate::port::PortBus;
use crate::state::{Flags, Z80};
use crate::timing::Z80InstructionCycles;

const FLAG_C: u8 = Flags::Carry as u8;
const FLAG_N: u8 = Flags::AddSubtract as u8;
const FLAG_P: u8 = Flags::Parity as u8;
const FLAG_F3: u8 = Flags::F3 as u8;
const FLAG_H: u8 = Flags::HalfCarry as u8;
const FLAG_F5: u8 = Flags::F5 as u8;
const FLAG_Z: u8 = Flags::Zero as u8;
const FLAG_S: u8 = Flags::Sign as u8;

/// The bits preserved by the accumulator rotates, SCF and CCF.
const FLAGS_SZP: u8 = FLAG_S | FLAG_Z | FLAG_P;
/// The two undocumented bits, copied from various sources per instruction.
const FLAGS_XY: u8 = FLAG_F5 | FLAG_F3;

impl Z80 {
    /// Run one fetch-execute step: service a pending interrupt if the
    /// protocol allows, otherwise execute the instruction at PC (or idle for
    /// a NOP's worth of T-states when halted).  Returns the T-states charged;
    /// the same amount is added to the authoritative t-state counter.
    pub fn step(&mut self, memory: &mut Memory, io: &mut PortBus) -> u16 {
        let cycles = if let Some(cycles) = self.check_pending_interrupts(memory) {
            cycles
        } else if self.state.halted {
            // execution is suspended; the refresh machinery keeps running
            self.state.refresh(1);
            4
        } else {
            self.cycle_one(memory, io)
        };
        self.tstates += cycles as u64;
        cycles
    }

    fn cycle_one(&mut self, memory: &mut Memory, io: &mut PortBus) -> u16 {
        self.decoder = Z80Decoder::decode_at(memory, self.state.pc);
        self.state.pc = self.decoder.end;
        self.state.refresh(self.decoder.m1_fetches);

        let took_branch = self.execute_current(memory, io);

        if self.decoder.instruction != Instruction::EI {
            self.intr.ei_deferred = false;
        }

        Z80InstructionCycles::from_instruction(&self.decoder.instruction, self.decoder.extra_tstates)
            .calculate_cycles(took_branch)
    }

    /// Execute the most recently decoded instruction.  Returns true when a
    /// conditional branch was taken or a block operation will repeat, which
    /// selects the higher of the two T-state costs.
    pub fn execute_current(&mut self, memory: &mut Memory, io: &mut PortBus) -> bool {
        let mut took_branch = false;

        match self.decoder.instruction {
            Instruction::ADCa(target) => {
                let src = self.get_target_value(memory, target);
                let acc = self.state.get_register(Register::A);
                let (result, flags) = add_bytes(acc, src, self.state.get_flag(Flags::Carry));
                self.state.set_register(Register::A, result);
                self.state.reg[Register::F as usize] = flags;
            },
            Instruction::ADC16(dest_pair, src_pair) => {
                let src = self.state.get_register_pair(src_pair);
                let dest = self.state.get_register_pair(dest_pair);
                let (result, flags) = add_words(dest, src, self.state.get_flag(Flags::Carry));
                self.state.set_register_pair(dest_pair, result);
                self.state.reg[Register::F as usize] = flags;
                self.state.memptr = dest.wrapping_add(1);
            },
            Instruction::ADDa(target) => {
                let src = self.get_target_value(memory, target);
                let acc = self.state.get_register(Register::A);
                let (result, flags) = add_bytes(acc, src, false);
                self.state.set_register(Register::A, result);
                self.state.reg[Register::F as usize] = flags;
            },
            Instruction::ADD16(dest_pair, src_pair) => {
                let src = self.state.get_register_pair(src_pair);
                let dest = self.state.get_register_pair(dest_pair);
                let (result, flags) = add_words(dest, src, false);
                self.state.set_register_pair(dest_pair, result);
                // 16-bit ADD leaves S, Z and P/V alone
                self.state.set_flags(FLAG_F5 | FLAG_H | FLAG_F3 | FLAG_N | FLAG_C, flags);
                self.state.memptr = dest.wrapping_add(1);
            },
            Instruction::AND(target) => {
                let value = self.get_target_value(memory, target);
                let result = self.state.get_register(Register::A) & value;
                self.state.set_register(Register::A, result);
                self.state.reg[Register::F as usize] = SZP_FLAGS[result as usize] | FLAG_H;
            },
            Instruction::BIT(bit, target) => {
                let value = self.get_target_value(memory, target);
                let result = value & (1 << bit);

                // the undocumented bits come from the tested value for a
                // register operand, and from the internal MEMPTR high byte
                // for the indirect forms
                let xy_source = match target {
                    Target::DirectReg(_) | Target::DirectRegHalf(_) => value,
                    _ => (self.state.memptr >> 8) as u8,
                };

                let mut flags = (self.state.get_flags() & FLAG_C) | FLAG_H | (xy_source & FLAGS_XY) | (result & FLAG_S);
                if result == 0 {
                    flags |= FLAG_Z | FLAG_P;
                }
                self.state.reg[Register::F as usize] = flags;
            },
            Instruction::CALL(addr) => {
                self.state.memptr = addr;
                self.push_word(memory, self.decoder.end);
                self.state.pc = addr;
            },
            Instruction::CALLcc(cond, addr) => {
                self.state.memptr = addr;
                if self.get_current_condition(cond) {
                    self.push_word(memory, self.decoder.end);
                    self.state.pc = addr;
                    took_branch = true;
                }
            },
            Instruction::CCF => {
                let acc = self.state.get_register(Register::A);
                let old_carry = self.state.get_flag(Flags::Carry);
                let mut flags = (self.state.get_flags() & FLAGS_SZP) | (acc & FLAGS_XY);
                if old_carry {
                    flags |= FLAG_H;
                } else {
                    flags |= FLAG_C;
                }
                self.state.reg[Register::F as usize] = flags;
            },
            Instruction::CP(target) => {
                let src = self.get_target_value(memory, target);
                let acc = self.state.get_register(Register::A);
                let (_, flags) = sub_bytes(acc, src, false);
                // F3/F5 come from the operand, not the comparison result
                self.state.reg[Register::F as usize] = (flags & !FLAGS_XY) | (src & FLAGS_XY);
            },
            Instruction::CPI | Instruction::CPD | Instruction::CPIR | Instruction::CPDR => {
                took_branch = self.execute_block_compare(memory);
            },
            Instruction::CPL => {
                let result = !self.state.get_register(Register::A);
                self.state.set_register(Register::A, result);
                let flags = (self.state.get_flags() & (FLAGS_SZP | FLAG_C)) | FLAG_H | FLAG_N | (result & FLAGS_XY);
                self.state.reg[Register::F as usize] = flags;
            },
            Instruction::DAA => {
                let acc = self.state.get_register(Register::A);
                let mut correction = 0;
                let mut carry = self.state.get_flag(Flags::Carry);

                if self.state.get_flag(Flags::HalfCarry) || (acc & 0x0F) > 0x09 {
                    correction |= 0x06;
                }
                if carry || acc > 0x99 {
                    correction |= 0x60;
                    carry = true;
                }

                let (result, flags) = if self.state.get_flag(Flags::AddSubtract) {
                    sub_bytes(acc, correction, false)
                } else {
                    add_bytes(acc, correction, false)
                };

                self.state.set_register(Register::A, result);
                let mut flags = (flags & !(FLAG_P | FLAG_C)) | (SZP_FLAGS[result as usize] & FLAG_P);
                if carry {
                    flags |= FLAG_C;
                }
                self.state.reg[Register::F as usize] = flags;
            },
            Instruction::DEC16(regpair) => {
                let value = self.state.get_register_pair(regpair);
                self.state.set_register_pair(regpair, value.wrapping_sub(1));
            },
            Instruction::DEC8(target) => {
                let value = self.get_target_value(memory, target);
                let (result, flags) = dec_byte(value);
                self.state.set_flags(!FLAG_C, flags);
                self.set_target_value(memory, target, result);
            },
            Instruction::DI => {
                self.state.iff1 = false;
                self.state.iff2 = false;
            },
            Instruction::DJNZ(offset) => {
                let result = self.state.get_register(Register::B).wrapping_sub(1);
                self.state.set_register(Register::B, result);
                if result != 0 {
                    self.state.pc = self.state.pc.wrapping_add(offset as u16);
                    self.state.memptr = self.state.pc;
                    took_branch = true;
                }
            },
            Instruction::EI => {
                self.state.iff1 = true;
                self.state.iff2 = true;
                // interrupts stay masked until the following instruction has
                // completed
                self.intr.ei_deferred = true;
            },
            Instruction::EXX => {
                for i in 0..6 {
                    let (normal, shadow) = (self.state.reg[i], self.state.shadow_reg[i]);
                    self.state.reg[i] = shadow;
                    self.state.shadow_reg[i] = normal;
                }
            },
            Instruction::EXafaf => {
                for i in 6..8 {
                    let (normal, shadow) = (self.state.reg[i], self.state.shadow_reg[i]);
                    self.state.reg[i] = shadow;
                    self.state.shadow_reg[i] = normal;
                }
            },
            Instruction::EXhlde => {
                let hl = self.state.get_register_pair(RegisterPair::HL);
                let de = self.state.get_register_pair(RegisterPair::DE);
                self.state.set_register_pair(RegisterPair::DE, hl);
                self.state.set_register_pair(RegisterPair::HL, de);
            },
            Instruction::EXsp(regpair) => {
                let reg_value = self.state.get_register_pair(regpair);
                let sp_value = memory.read_word_le(self.state.sp);
                memory.write_word_le(self.state.sp, reg_value);
                self.state.set_register_pair(regpair, sp_value);
                self.state.memptr = sp_value;
            },
            Instruction::HALT => {
                self.state.halted = true;
            },
            Instruction::IM(mode) => {
                self.state.im = mode;
            },
            Instruction::INC16(regpair) => {
                let value = self.state.get_register_pair(regpair);
                self.state.set_register_pair(regpair, value.wrapping_add(1));
            },
            Instruction::INC8(target) => {
                let value = self.get_target_value(memory, target);
                let (result, flags) = inc_byte(value);
                self.state.set_flags(!FLAG_C, flags);
                self.set_target_value(memory, target, result);
            },
            Instruction::INI | Instruction::IND | Instruction::INIR | Instruction::INDR => {
                took_branch = self.execute_block_input(memory, io);
            },
            Instruction::INic(reg) => {
                let port = self.state.get_register_pair(RegisterPair::BC);
                let value = io.read_port(port);
                self.state.set_register(reg, value);
                self.state.set_flags(!FLAG_C, SZP_FLAGS[value as usize]);
                self.state.memptr = port.wrapping_add(1);
            },
            Instruction::INicz => {
                let port = self.state.get_register_pair(RegisterPair::BC);
                let value = io.read_port(port);
                self.state.set_flags(!FLAG_C, SZP_FLAGS[value as usize]);
                self.state.memptr = port.wrapping_add(1);
            },
            Instruction::INx(lower) => {
                let acc = self.state.get_register(Register::A);
                let port = ((acc as u16) << 8) | (lower as u16);
                self.state.set_register(Register::A, io.read_port(port));
                self.state.memptr = port.wrapping_add(1);
            },
            Instruction::JP(addr) => {
                self.state.pc = addr;
                self.state.memptr = addr;
            },
            Instruction::JPIndirect(regpair) => {
                self.state.pc = self.state.get_register_pair(regpair);
            },
            Instruction::JPcc(cond, addr) => {
                self.state.memptr = addr;
                if self.get_current_condition(cond) {
                    self.state.pc = addr;
                    took_branch = true;
                }
            },
            Instruction::JR(offset) => {
                self.state.pc = self.state.pc.wrapping_add(offset as u16);
                self.state.memptr = self.state.pc;
            },
            Instruction::JRcc(cond, offset) => {
                if self.get_current_condition(cond) {
                    self.state.pc = self.state.pc.wrapping_add(offset as u16);
                    self.state.memptr = self.state.pc;
                    took_branch = true;
                }
            },
            Instruction::LD(dest, src) => {
                let value = self.get_load_target_value(memory, src);
                self.set_load_target_value(memory, dest, value);
            },
            Instruction::LDsr(special_reg, dir) => {
                match (special_reg, dir) {
                    (SpecialRegister::I, Direction::FromAcc) => {
                        self.state.i = self.state.get_register(Register::A);
                    },
                    (SpecialRegister::R, Direction::FromAcc) => {
                        self.state.r = self.state.get_register(Register::A);
                    },
                    (special_reg, Direction::ToAcc) => {
                        let value = match special_reg {
                            SpecialRegister::I => self.state.i,
                            SpecialRegister::R => self.state.r,
                        };
                        self.state.set_register(Register::A, value);
                        let mut flags = SZP_FLAGS[value as usize] & !FLAG_P;
                        if self.state.iff2 {
                            flags |= FLAG_P;
                        }
                        self.state.set_flags(!FLAG_C, flags);
                    },
                }
            },
            Instruction::LDI | Instruction::LDD | Instruction::LDIR | Instruction::LDDR => {
                took_branch = self.execute_block_transfer(memory);
            },
            Instruction::NEG => {
                let acc = self.state.get_register(Register::A);
                let (result, flags) = sub_bytes(0, acc, false);
                self.state.set_register(Register::A, result);
                self.state.reg[Register::F as usize] = flags;
            },
            Instruction::NOP => {},
            Instruction::OR(target) => {
                let value = self.get_target_value(memory, target);
                let result = self.state.get_register(Register::A) | value;
                self.state.set_register(Register::A, result);
                self.state.reg[Register::F as usize] = SZP_FLAGS[result as usize];
            },
            Instruction::OUTI | Instruction::OUTD | Instruction::OTIR | Instruction::OTDR => {
                took_branch = self.execute_block_output(memory, io);
            },
            Instruction::OUTic(reg) => {
                let port = self.state.get_register_pair(RegisterPair::BC);
                io.write_port(port, self.state.get_register(reg));
                self.state.memptr = port.wrapping_add(1);
            },
            Instruction::OUTicz => {
                let port = self.state.get_register_pair(RegisterPair::BC);
                io.write_port(port, 0);
                self.state.memptr = port.wrapping_add(1);
            },
            Instruction::OUTx(lower) => {
                let acc = self.state.get_register(Register::A);
                let port = ((acc as u16) << 8) | (lower as u16);
                io.write_port(port, acc);
                self.state.memptr = ((acc as u16) << 8) | (lower.wrapping_add(1) as u16);
            },
            Instruction::POP(regpair) => {
                let value = self.pop_word(memory);
                self.state.set_register_pair(regpair, value);
            },
            Instruction::PUSH(regpair) => {
                let value = self.state.get_register_pair(regpair);
                self.push_word(memory, value);
            },
            Instruction::RES(bit, target, opt_copy) => {
                let value = self.get_target_value(memory, target);
                let result = value & !(1 << bit);
                self.set_target_value(memory, target, result);
                if let Some(reg) = opt_copy {
                    self.state.set_register(reg, result);
                }
            },
            Instruction::RET => {
                self.state.pc = self.pop_word(memory);
                self.state.memptr = self.state.pc;
            },
            Instruction::RETI | Instruction::RETN => {
                // RETI differs from RETN only on the bus, where peripherals
                // watch for it; the CPU-side effect is identical
                self.state.pc = self.pop_word(memory);
                self.state.memptr = self.state.pc;
                self.state.iff1 = self.state.iff2;
            },
            Instruction::RETcc(cond) => {
                if self.get_current_condition(cond) {
                    self.state.pc = self.pop_word(memory);
                    self.state.memptr = self.state.pc;
                    took_branch = true;
                }
            },
            Instruction::RL(target, opt_copy) => {
                let value = self.get_target_value(memory, target);
                let (result, carry) = rl_byte(value, self.state.get_flag(Flags::Carry));
                self.set_shifted_value(memory, target, opt_copy, result, carry);
            },
            Instruction::RLA => {
                let (result, carry) = rl_byte(self.state.get_register(Register::A), self.state.get_flag(Flags::Carry));
                self.set_acc_rotate_result(result, carry);
            },
            Instruction::RLC(target, opt_copy) => {
                let value = self.get_target_value(memory, target);
                let (result, carry) = rlc_byte(value);
                self.set_shifted_value(memory, target, opt_copy, result, carry);
            },
            Instruction::RLCA => {
                let (result, carry) = rlc_byte(self.state.get_register(Register::A));
                self.set_acc_rotate_result(result, carry);
            },
            Instruction::RLD => {
                let acc = self.state.get_register(Register::A);
                let addr = self.state.get_register_pair(RegisterPair::HL);
                let value = memory.read_byte(addr);
                memory.write_byte(addr, (value << 4) | (acc & 0x0F));
                let result = (acc & 0xF0) | (value >> 4);
                self.state.set_register(Register::A, result);
                self.state.set_flags(!FLAG_C, SZP_FLAGS[result as usize]);
                self.state.memptr = addr.wrapping_add(1);
            },
            Instruction::RR(target, opt_copy) => {
                let value = self.get_target_value(memory, target);
                let (result, carry) = rr_byte(value, self.state.get_flag(Flags::Carry));
                self.set_shifted_value(memory, target, opt_copy, result, carry);
            },
            Instruction::RRA => {
                let (result, carry) = rr_byte(self.state.get_register(Register::A), self.state.get_flag(Flags::Carry));
                self.set_acc_rotate_result(result, carry);
            },
            Instruction::RRC(target, opt_copy) => {
                let value = self.get_target_value(memory, target);
                let (result, carry) = rrc_byte(value);
                self.set_shifted_value(memory, target, opt_copy, result, carry);
            },
            Instruction::RRCA => {
                let (result, carry) = rrc_byte(self.state.get_register(Register::A));
                self.set_acc_rotate_result(result, carry);
            },
            Instruction::RRD => {
                let acc = self.state.get_register(Register::A);
                let addr = self.state.get_register_pair(RegisterPair::HL);
                let value = memory.read_byte(addr);
                memory.write_byte(addr, (acc << 4) | (value >> 4));
                let result = (acc & 0xF0) | (value & 0x0F);
                self.state.set_register(Register::A, result);
                self.state.set_flags(!FLAG_C, SZP_FLAGS[result as usize]);
                self.state.memptr = addr.wrapping_add(1);
            },
            Instruction::RST(vector) => {
                self.push_word(memory, self.decoder.end);
                self.state.pc = vector as u16;
                self.state.memptr = self.state.pc;
            },
            Instruction::SBCa(target) => {
                let src = self.get_target_value(memory, target);
                let acc = self.state.get_register(Register::A);
                let (result, flags) = sub_bytes(acc, src, self.state.get_flag(Flags::Carry));
                self.state.set_register(Register::A, result);
                self.state.reg[Register::F as usize] = flags;
            },
            Instruction::SBC16(dest_pair, src_pair) => {
                let src = self.state.get_register_pair(src_pair);
                let dest = self.state.get_register_pair(dest_pair);
                let (result, flags) = sub_words(dest, src, self.state.get_flag(Flags::Carry));
                self.state.set_register_pair(dest_pair, result);
                self.state.reg[Register::F as usize] = flags;
                self.state.memptr = dest.wrapping_add(1);
            },
            Instruction::SCF => {
                let acc = self.state.get_register(Register::A);
                let flags = (self.state.get_flags() & FLAGS_SZP) | (acc & FLAGS_XY) | FLAG_C;
                self.state.reg[Register::F as usize] = flags;
            },
            Instruction::SET(bit, target, opt_copy) => {
                let value = self.get_target_value(memory, target);
                let result = value | (1 << bit);
                self.set_target_value(memory, target, result);
                if let Some(reg) = opt_copy {
                    self.state.set_register(reg, result);
                }
            },
            Instruction::SLA(target, opt_copy) => {
                let value = self.get_target_value(memory, target);
                let (result, carry) = (value << 1, (value & 0x80) != 0);
                self.set_shifted_value(memory, target, opt_copy, result, carry);
            },
            Instruction::SLL(target, opt_copy) => {
                // undocumented: shifts left and sets bit 0
                let value = self.get_target_value(memory, target);
                let (result, carry) = ((value << 1) | 0x01, (value & 0x80) != 0);
                self.set_shifted_value(memory, target, opt_copy, result, carry);
            },
            Instruction::SRA(target, opt_copy) => {
                let value = self.get_target_value(memory, target);
                let (result, carry) = ((value >> 1) | (value & 0x80), (value & 0x01) != 0);
                self.set_shifted_value(memory, target, opt_copy, result, carry);
            },
            Instruction::SRL(target, opt_copy) => {
                let value = self.get_target_value(memory, target);
                let (result, carry) = (value >> 1, (value & 0x01) != 0);
                self.set_shifted_value(memory, target, opt_copy, result, carry);
            },
            Instruction::SUB(target) => {
                let src = self.get_target_value(memory, target);
                let acc = self.state.get_register(Register::A);
                let (result, flags) = sub_bytes(acc, src, false);
                self.state.set_register(Register::A, result);
                self.state.reg[Register::F as usize] = flags;
            },
            Instruction::XOR(target) => {
                let value = self.get_target_value(memory, target);
                let result = self.state.get_register(Register::A) ^ value;
                self.state.set_register(Register::A, result);
                self.state.reg[Register::F as usize] = SZP_FLAGS[result as usize];
            },
        }

        took_branch
    }

    fn execute_block_transfer(&mut self, memory: &mut Memory) -> bool {
        let diff = match self.decoder.instruction {
            Instruction::LDI | Instruction::LDIR => 1u16,
            _ => 0xFFFF,
        };

        let hl = self.state.get_register_pair(RegisterPair::HL);
        let de = self.state.get_register_pair(RegisterPair::DE);
        let value = memory.read_byte(hl);
        memory.write_byte(de, value);

        self.state.set_register_pair(RegisterPair::HL, hl.wrapping_add(diff));
        self.state.set_register_pair(RegisterPair::DE, de.wrapping_add(diff));
        let count = self.state.get_register_pair(RegisterPair::BC).wrapping_sub(1);
        self.state.set_register_pair(RegisterPair::BC, count);

        let n = self.state.get_register(Register::A).wrapping_add(value);
        let mut flags = self.state.get_flags() & (FLAG_S | FLAG_Z | FLAG_C);
        flags |= (n & 0x08) | ((n & 0x02) << 4);
        if count != 0 {
            flags |= FLAG_P;
        }
        self.state.reg[Register::F as usize] = flags;

        let repeating = matches!(self.decoder.instruction, Instruction::LDIR | Instruction::LDDR) && count != 0;
        if repeating {
            self.state.pc = self.decoder.start;
            self.state.memptr = self.decoder.start.wrapping_add(1);
        }
        repeating
    }

    fn execute_block_compare(&mut self, memory: &mut Memory) -> bool {
        let diff = match self.decoder.instruction {
            Instruction::CPI | Instruction::CPIR => 1u16,
            _ => 0xFFFF,
        };

        let hl = self.state.get_register_pair(RegisterPair::HL);
        let value = memory.read_byte(hl);
        let acc = self.state.get_register(Register::A);
        let (result, sub_flags) = sub_bytes(acc, value, false);

        self.state.set_register_pair(RegisterPair::HL, hl.wrapping_add(diff));
        let count = self.state.get_register_pair(RegisterPair::BC).wrapping_sub(1);
        self.state.set_register_pair(RegisterPair::BC, count);
        self.state.memptr = self.state.memptr.wrapping_add(diff);

        let n = result.wrapping_sub(((sub_flags & FLAG_H) != 0) as u8);
        let mut flags = (self.state.get_flags() & FLAG_C)
            | (sub_flags & (FLAG_S | FLAG_Z | FLAG_H))
            | FLAG_N
            | (n & 0x08)
            | ((n & 0x02) << 4);
        if count != 0 {
            flags |= FLAG_P;
        }
        self.state.reg[Register::F as usize] = flags;

        let repeating = matches!(self.decoder.instruction, Instruction::CPIR | Instruction::CPDR)
            && count != 0
            && (flags & FLAG_Z) == 0;
        if repeating {
            self.state.pc = self.decoder.start;
            self.state.memptr = self.decoder.start.wrapping_add(1);
        }
        repeating
    }

    fn execute_block_input(&mut self, memory: &mut Memory, io: &mut PortBus) -> bool {
        let increasing = matches!(self.decoder.instruction, Instruction::INI | Instruction::INIR);
        let diff = if increasing { 1u16 } else { 0xFFFF };

        let port = self.state.get_register_pair(RegisterPair::BC);
        let value = io.read_port(port);
        let hl = self.state.get_register_pair(RegisterPair::HL);
        memory.write_byte(hl, value);
        self.state.memptr = port.wrapping_add(diff);

        let count = self.state.get_register(Register::B).wrapping_sub(1);
        self.state.set_register(Register::B, count);
        self.state.set_register_pair(RegisterPair::HL, hl.wrapping_add(diff));

        let adjusted_c = self.state.get_register(Register::C).wrapping_add(diff as u8);
        self.state.reg[Register::F as usize] = block_io_flags(value, adjusted_c, count);

        let repeating = matches!(self.decoder.instruction, Instruction::INIR | Instruction::INDR) && count != 0;
        if repeating {
            self.state.pc = self.decoder.start;
        }
        repeating
    }

    fn execute_block_output(&mut self, memory: &mut Memory, io: &mut PortBus) -> bool {
        let increasing = matches!(self.decoder.instruction, Instruction::OUTI | Instruction::OTIR);
        let diff = if increasing { 1u16 } else { 0xFFFF };

        let hl = self.state.get_register_pair(RegisterPair::HL);
        let value = memory.read_byte(hl);
        let count = self.state.get_register(Register::B).wrapping_sub(1);
        self.state.set_register(Register::B, count);

        let port = self.state.get_register_pair(RegisterPair::BC);
        io.write_port(port, value);
        self.state.memptr = port.wrapping_add(diff);
        self.state.set_register_pair(RegisterPair::HL, hl.wrapping_add(diff));

        let low = (hl.wrapping_add(diff) & 0x00FF) as u8;
        self.state.reg[Register::F as usize] = block_io_flags(value, low, count);

        let repeating = matches!(self.decoder.instruction, Instruction::OTIR | Instruction::OTDR) && count != 0;
        if repeating {
            self.state.pc = self.decoder.start;
        }
        repeating
    }

    fn set_shifted_value(&mut self, memory: &mut Memory, target: Target, opt_copy: Option<Register>, result: u8, carry: bool) {
        let mut flags = SZP_FLAGS[result as usize];
        if carry {
            flags |= FLAG_C;
        }
        self.state.reg[Register::F as usize] = flags;
        self.set_target_value(memory, target, result);
        if let Some(reg) = opt_copy {
            self.state.set_register(reg, result);
        }
    }

    fn set_acc_rotate_result(&mut self, result: u8, carry: bool) {
        let mut flags = (self.state.get_flags() & FLAGS_SZP) | (result & FLAGS_XY);
        if carry {
            flags |= FLAG_C;
        }
        self.state.reg[Register::F as usize] = flags;
        self.state.set_register(Register::A, result);
    }

    pub(crate) fn push_word(&mut self, memory: &mut Memory, value: u16) {
        self.state.sp = self.state.sp.wrapping_sub(1);
        memory.write_byte(self.state.sp, (value >> 8) as u8);
        self.state.sp = self.state.sp.wrapping_sub(1);
        memory.write_byte(self.state.sp, value as u8);
    }

    pub(crate) fn pop_word(&mut self, memory: &Memory) -> u16 {
        let mut value = memory.read_byte(self.state.sp) as u16;
        self.state.sp = self.state.sp.wrapping_add(1);
        value |= (memory.read_byte(self.state.sp) as u16) << 8;
        self.state.sp = self.state.sp.wrapping_add(1);
        value
    }

    fn index_offset_addr(&mut self, reg: IndexRegister, offset: i8) -> u16 {
        let addr = self.state.get_index_register(reg).wrapping_add(offset as u16);
        self.state.memptr = addr;
        addr
    }

    fn get_target_value(&mut self, memory: &Memory, target: Target) -> u8 {
        match target {
            Target::DirectReg(reg) => self.state.get_register(reg),
            Target::DirectRegHalf(reg) => self.state.get_index_register_half(reg),
            Target::IndirectReg(regpair) => {
                let addr = self.state.get_register_pair(regpair);
                memory.read_byte(addr)
            },
            Target::IndirectOffset(reg, offset) => {
                let addr = self.index_offset_addr(reg, offset);
                memory.read_byte(addr)
            },
            Target::Immediate(data) => data,
        }
    }

    fn set_target_value(&mut self, memory: &mut Memory, target: Target, value: u8) {
        match target {
            Target::DirectReg(reg) => self.state.set_register(reg, value),
            Target::DirectRegHalf(reg) => self.state.set_index_register_half(reg, value),
            Target::IndirectReg(regpair) => {
                let addr = self.state.get_register_pair(regpair);
                memory.write_byte(addr, value);
            },
            Target::IndirectOffset(reg, offset) => {
                let addr = self.index_offset_addr(reg, offset);
                memory.write_byte(addr, value);
            },
            Target::Immediate(_) => unreachable!("immediates cannot be a store destination"),
        }
    }

    fn get_load_target_value(&mut self, memory: &Memory, target: LoadTarget) -> u16 {
        match target {
            LoadTarget::DirectRegByte(reg) => self.state.get_register(reg) as u16,
            LoadTarget::DirectRegHalfByte(reg) => self.state.get_index_register_half(reg) as u16,
            LoadTarget::DirectRegWord(regpair) => self.state.get_register_pair(regpair),
            LoadTarget::IndirectRegByte(regpair) => {
                let addr = self.state.get_register_pair(regpair);
                if matches!(regpair, RegisterPair::BC | RegisterPair::DE) {
                    self.state.memptr = addr.wrapping_add(1);
                }
                memory.read_byte(addr) as u16
            },
            LoadTarget::IndirectOffsetByte(index_reg, offset) => {
                let addr = self.index_offset_addr(index_reg, offset);
                memory.read_byte(addr) as u16
            },
            LoadTarget::IndirectByte(addr) => {
                self.state.memptr = addr.wrapping_add(1);
                memory.read_byte(addr) as u16
            },
            LoadTarget::IndirectWord(addr) => {
                self.state.memptr = addr.wrapping_add(1);
                memory.read_word_le(addr)
            },
            LoadTarget::ImmediateByte(data) => data as u16,
            LoadTarget::ImmediateWord(data) => data,
        }
    }

    fn set_load_target_value(&mut self, memory: &mut Memory, target: LoadTarget, value: u16) {
        match target {
            LoadTarget::DirectRegByte(reg) => self.state.set_register(reg, value as u8),
            LoadTarget::DirectRegHalfByte(reg) => self.state.set_index_register_half(reg, value as u8),
            LoadTarget::DirectRegWord(regpair) => self.state.set_register_pair(regpair, value),
            LoadTarget::IndirectRegByte(regpair) => {
                let addr = self.state.get_register_pair(regpair);
                if matches!(regpair, RegisterPair::BC | RegisterPair::DE) {
                    // only A is ever stored this way, and it lands in the
                    // high byte of MEMPTR
                    self.state.memptr = ((value & 0xFF) << 8) | (addr.wrapping_add(1) & 0x00FF);
                }
                memory.write_byte(addr, value as u8);
            },
            LoadTarget::IndirectOffsetByte(index_reg, offset) => {
                let addr = self.index_offset_addr(index_reg, offset);
                memory.write_byte(addr, value as u8);
            },
            LoadTarget::IndirectByte(addr) => {
                self.state.memptr = ((value & 0xFF) << 8) | (addr.wrapping_add(1) & 0x00FF);
                memory.write_byte(addr, value as u8);
            },
            LoadTarget::IndirectWord(addr) => {
                self.state.memptr = addr.wrapping_add(1);
                memory.write_word_le(addr, value);
            },
            LoadTarget::ImmediateByte(_) | LoadTarget::ImmediateWord(_) => {
                unreachable!("immediates cannot be a store destination")
            },
        }
    }

    fn get_current_condition(&self, cond: Condition) -> bool {
        match cond {
            Condition::NotZero => !self.state.get_flag(Flags::Zero),
            Condition::Zero => self.state.get_flag(Flags::Zero),
            Condition::NotCarry => !self.state.get_flag(Flags::Carry),
            Condition::Carry => self.state.get_flag(Flags::Carry),
            Condition::ParityOdd => !self.state.get_flag(Flags::Parity),
            Condition::ParityEven => self.state.get_flag(Flags::Parity),
            Condition::Positive => !self.state.get_flag(Flags::Sign),
            Condition::Negative => self.state.get_flag(Flags::Sign),
        }
    }
}

/// Sign, zero, F3/F5 and parity of every byte value, the flag set produced
/// verbatim by the logical operations.
static SZP_FLAGS: [u8; 256] = build_szp_flags();

const fn build_szp_flags() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let value = i as u8;
        let mut flags = value & (FLAG_S | FLAGS_XY);
        if value == 0 {
            flags |= FLAG_Z;
        }
        if value.count_ones() & 0x01 == 0 {
            flags |= FLAG_P;
        }
        table[i] = flags;
        i += 1;
    }
    table
}

fn add_bytes(op1: u8, op2: u8, carry_in: bool) -> (u8, u8) {
    let carry_in = carry_in as u8;
    let result16 = op1 as u16 + op2 as u16 + carry_in as u16;
    let result = result16 as u8;

    let mut flags = result & (FLAG_S | FLAGS_XY);
    if result == 0 {
        flags |= FLAG_Z;
    }
    if result16 > 0xFF {
        flags |= FLAG_C;
    }
    if (op1 & 0x0F) + (op2 & 0x0F) + carry_in > 0x0F {
        flags |= FLAG_H;
    }
    if ((op1 ^ result) & (op2 ^ result) & 0x80) != 0 {
        flags |= FLAG_P;
    }
    (result, flags)
}

fn sub_bytes(op1: u8, op2: u8, carry_in: bool) -> (u8, u8) {
    let carry_in = carry_in as u8;
    let result16 = (op1 as u16).wrapping_sub(op2 as u16).wrapping_sub(carry_in as u16);
    let result = result16 as u8;

    let mut flags = (result & (FLAG_S | FLAGS_XY)) | FLAG_N;
    if result == 0 {
        flags |= FLAG_Z;
    }
    if result16 > 0xFF {
        flags |= FLAG_C;
    }
    if (op1 & 0x0F) < (op2 & 0x0F) + carry_in {
        flags |= FLAG_H;
    }
    if ((op1 ^ op2) & (op1 ^ result) & 0x80) != 0 {
        flags |= FLAG_P;
    }
    (result, flags)
}

fn add_words(op1: u16, op2: u16, carry_in: bool) -> (u16, u8) {
    let carry_in = carry_in as u16;
    let result32 = op1 as u32 + op2 as u32 + carry_in as u32;
    let result = result32 as u16;

    let mut flags = ((result >> 8) as u8) & (FLAG_S | FLAGS_XY);
    if result == 0 {
        flags |= FLAG_Z;
    }
    if result32 > 0xFFFF {
        flags |= FLAG_C;
    }
    if (op1 & 0x0FFF) + (op2 & 0x0FFF) + carry_in > 0x0FFF {
        flags |= FLAG_H;
    }
    if ((op1 ^ result) & (op2 ^ result) & 0x8000) != 0 {
        flags |= FLAG_P;
    }
    (result, flags)
}

fn sub_words(op1: u16, op2: u16, carry_in: bool) -> (u16, u8) {
    let carry_in = carry_in as u16;
    let result32 = (op1 as u32).wrapping_sub(op2 as u32).wrapping_sub(carry_in as u32);
    let result = result32 as u16;

    let mut flags = (((result >> 8) as u8) & (FLAG_S | FLAGS_XY)) | FLAG_N;
    if result == 0 {
        flags |= FLAG_Z;
    }
    if result32 > 0xFFFF {
        flags |= FLAG_C;
    }
    if (op1 & 0x0FFF) < (op2 & 0x0FFF) + carry_in {
        flags |= FLAG_H;
    }
    if ((op1 ^ op2) & (op1 ^ result) & 0x8000) != 0 {
        flags |= FLAG_P;
    }
    (result, flags)
}

fn inc_byte(value: u8) -> (u8, u8) {
    let result = value.wrapping_add(1);
    let mut flags = result & (FLAG_S | FLAGS_XY);
    if result == 0 {
        flags |= FLAG_Z;
    }
    if (value & 0x0F) == 0x0F {
        flags |= FLAG_H;
    }
    if result == 0x80 {
        flags |= FLAG_P;
    }
    (result, flags)
}

fn dec_byte(value: u8) -> (u8, u8) {
    let result = value.wrapping_sub(1);
    let mut flags = (result & (FLAG_S | FLAGS_XY)) | FLAG_N;
    if result == 0 {
        flags |= FLAG_Z;
    }
    if (value & 0x0F) == 0 {
        flags |= FLAG_H;
    }
    if result == 0x7F {
        flags |= FLAG_P;
    }
    (result, flags)
}

/// The de-facto flag result shared by INI/IND/OUTI/OUTD and their repeating
/// forms: S/Z/F5/F3 from the decremented B, N from bit 7 of the transferred
/// byte, H and C from the 9-bit sum of the byte and the adjusted low address,
/// and parity of that sum's low bits folded with B.
fn block_io_flags(value: u8, adjusted_low: u8, count: u8) -> u8 {
    let mut flags = SZP_FLAGS[count as usize] & !FLAG_P;
    if (value & 0x80) != 0 {
        flags |= FLAG_N;
    }
    let k = value as u16 + adjusted_low as u16;
    if k > 0xFF {
        flags |= FLAG_H | FLAG_C;
    }
    if (SZP_FLAGS[(((k & 0x07) as u8) ^ count) as usize] & FLAG_P) != 0 {
        flags |= FLAG_P;
    }
    flags
}

fn rlc_byte(value: u8) -> (u8, bool) {
    let carry = (value & 0x80) != 0;
    ((value << 1) | (carry as u8), carry)
}

fn rl_byte(value: u8, carry_in: bool) -> (u8, bool) {
    let carry = (value & 0x80) != 0;
    ((value << 1) | (carry_in as u8), carry)
}

fn rrc_byte(value: u8) -> (u8, bool) {
    let carry = (value & 0x01) != 0;
    ((value >> 1) | ((carry as u8) << 7), carry)
}

fn rr_byte(value: u8, carry_in: bool) -> (u8, bool) {
    let carry = (value & 0x01) != 0;
    ((value >> 1) | ((carry_in as u8) << 7), carry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn szp_table_matches_bit_definitions() {
        assert_eq!(SZP_FLAGS[0x00], FLAG_Z | FLAG_P);
        assert_eq!(SZP_FLAGS[0x80], FLAG_S);
        assert_eq!(SZP_FLAGS[0xFF], FLAG_S | FLAG_F5 | FLAG_F3 | FLAG_P);
        assert_eq!(SZP_FLAGS[0x03], FLAG_P);
    }

    #[test]
    fn byte_addition_carries_between_nibbles() {
        let (result, flags) = add_bytes(0x0F, 0x01, false);
        assert_eq!(result, 0x10);
        assert_eq!(flags & FLAG_H, FLAG_H);
        assert_eq!(flags & FLAG_C, 0);
    }

    #[test]
    fn byte_subtraction_detects_overflow() {
        let (result, flags) = sub_bytes(0x80, 0x01, false);
        assert_eq!(result, 0x7F);
        assert_ne!(flags & FLAG_P, 0);
        assert_ne!(flags & FLAG_N, 0);
    }
}
