use core::fmt::Write;

use log::warn;

use zeta_core::Memory;

use crate::instructions::{
    Condition, Direction, IndexRegister, IndexRegisterHalf, Instruction, InterruptMode, LoadTarget, Register, RegisterPair,
    SpecialRegister, Target, UndocumentedCopy,
};

/// Decodes the instruction starting at a given address, tracking how many
/// bytes were consumed, how many M1 (opcode-fetch) cycles occurred for the
/// refresh register, and any prefix T-state surcharge not already included in
/// the timing table.
#[derive(Clone, Debug, PartialEq)]
pub struct Z80Decoder {
    pub start: u16,
    pub end: u16,
    pub extra_tstates: u16,
    pub m1_fetches: u8,
    pub instruction: Instruction,
}

impl Default for Z80Decoder {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            extra_tstates: 0,
            m1_fetches: 0,
            instruction: Instruction::NOP,
        }
    }
}

impl Z80Decoder {
    pub fn decode_at(memory: &Memory, start: u16) -> Z80Decoder {
        let mut decoder = Z80Decoder {
            start,
            end: start,
            ..Z80Decoder::default()
        };
        let ins = decoder.read_instruction_byte(memory);
        decoder.m1_fetches = 1;
        decoder.instruction = decoder.decode_bare(memory, ins, 0);
        decoder
    }

    /// The instruction length in bytes (1 to 4), wrapping across 0xFFFF.
    pub fn size(&self) -> u16 {
        self.end.wrapping_sub(self.start)
    }

    fn decode_bare(&mut self, memory: &Memory, ins: u8, extra_tstates: u16) -> Instruction {
        self.extra_tstates = extra_tstates;
        match get_ins_x(ins) {
            0 => match get_ins_z(ins) {
                0 => match get_ins_y(ins) {
                    0 => Instruction::NOP,
                    1 => Instruction::EXafaf,
                    2 => {
                        let offset = self.read_instruction_byte(memory) as i8;
                        Instruction::DJNZ(offset)
                    },
                    3 => {
                        let offset = self.read_instruction_byte(memory) as i8;
                        Instruction::JR(offset)
                    },
                    y => {
                        let offset = self.read_instruction_byte(memory) as i8;
                        Instruction::JRcc(get_condition(y - 4), offset)
                    },
                },
                1 => {
                    if get_ins_q(ins) == 0 {
                        let data = self.read_instruction_word(memory);
                        Instruction::LD(
                            LoadTarget::DirectRegWord(get_register_pair(get_ins_p(ins))),
                            LoadTarget::ImmediateWord(data),
                        )
                    } else {
                        Instruction::ADD16(RegisterPair::HL, get_register_pair(get_ins_p(ins)))
                    }
                },
                2 => {
                    if (ins & 0x20) == 0 {
                        let target = match (ins & 0x10) != 0 {
                            false => LoadTarget::IndirectRegByte(RegisterPair::BC),
                            true => LoadTarget::IndirectRegByte(RegisterPair::DE),
                        };

                        match get_ins_q(ins) != 0 {
                            false => Instruction::LD(target, LoadTarget::DirectRegByte(Register::A)),
                            true => Instruction::LD(LoadTarget::DirectRegByte(Register::A), target),
                        }
                    } else {
                        let addr = self.read_instruction_word(memory);
                        match (ins >> 3) & 0x03 {
                            0 => Instruction::LD(LoadTarget::IndirectWord(addr), LoadTarget::DirectRegWord(RegisterPair::HL)),
                            1 => Instruction::LD(LoadTarget::DirectRegWord(RegisterPair::HL), LoadTarget::IndirectWord(addr)),
                            2 => Instruction::LD(LoadTarget::IndirectByte(addr), LoadTarget::DirectRegByte(Register::A)),
                            3 => Instruction::LD(LoadTarget::DirectRegByte(Register::A), LoadTarget::IndirectByte(addr)),
                            _ => unreachable!(),
                        }
                    }
                },
                3 => {
                    if get_ins_q(ins) == 0 {
                        Instruction::INC16(get_register_pair(get_ins_p(ins)))
                    } else {
                        Instruction::DEC16(get_register_pair(get_ins_p(ins)))
                    }
                },
                4 => Instruction::INC8(get_register(get_ins_y(ins))),
                5 => Instruction::DEC8(get_register(get_ins_y(ins))),
                6 => {
                    let data = self.read_instruction_byte(memory);
                    Instruction::LD(to_load_target(get_register(get_ins_y(ins))), LoadTarget::ImmediateByte(data))
                },
                7 => match get_ins_y(ins) {
                    0 => Instruction::RLCA,
                    1 => Instruction::RRCA,
                    2 => Instruction::RLA,
                    3 => Instruction::RRA,
                    4 => Instruction::DAA,
                    5 => Instruction::CPL,
                    6 => Instruction::SCF,
                    7 => Instruction::CCF,
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            },
            1 => {
                if ins == 0x76 {
                    Instruction::HALT
                } else {
                    Instruction::LD(
                        to_load_target(get_register(get_ins_y(ins))),
                        to_load_target(get_register(get_ins_z(ins))),
                    )
                }
            },
            2 => get_alu_instruction(get_ins_y(ins), get_register(get_ins_z(ins))),
            3 => match get_ins_z(ins) {
                0 => Instruction::RETcc(get_condition(get_ins_y(ins))),
                1 => {
                    if get_ins_q(ins) == 0 {
                        Instruction::POP(get_register_pair_alt(get_ins_p(ins)))
                    } else {
                        match get_ins_p(ins) {
                            0 => Instruction::RET,
                            1 => Instruction::EXX,
                            2 => Instruction::JPIndirect(RegisterPair::HL),
                            3 => Instruction::LD(
                                LoadTarget::DirectRegWord(RegisterPair::SP),
                                LoadTarget::DirectRegWord(RegisterPair::HL),
                            ),
                            _ => unreachable!(),
                        }
                    }
                },
                2 => {
                    let addr = self.read_instruction_word(memory);
                    Instruction::JPcc(get_condition(get_ins_y(ins)), addr)
                },
                3 => match get_ins_y(ins) {
                    0 => {
                        let addr = self.read_instruction_word(memory);
                        Instruction::JP(addr)
                    },
                    1 => self.decode_prefix_cb(memory),
                    2 => {
                        let port = self.read_instruction_byte(memory);
                        Instruction::OUTx(port)
                    },
                    3 => {
                        let port = self.read_instruction_byte(memory);
                        Instruction::INx(port)
                    },
                    4 => Instruction::EXsp(RegisterPair::HL),
                    5 => Instruction::EXhlde,
                    6 => Instruction::DI,
                    7 => Instruction::EI,
                    _ => unreachable!(),
                },
                4 => {
                    let addr = self.read_instruction_word(memory);
                    Instruction::CALLcc(get_condition(get_ins_y(ins)), addr)
                },
                5 => {
                    if get_ins_q(ins) == 0 {
                        Instruction::PUSH(get_register_pair_alt(get_ins_p(ins)))
                    } else {
                        match get_ins_p(ins) {
                            0 => {
                                let addr = self.read_instruction_word(memory);
                                Instruction::CALL(addr)
                            },
                            1 => self.decode_prefix_dd_fd(memory, IndexRegister::IX),
                            2 => self.decode_prefix_ed(memory),
                            3 => self.decode_prefix_dd_fd(memory, IndexRegister::IY),
                            _ => unreachable!(),
                        }
                    }
                },
                6 => {
                    let data = self.read_instruction_byte(memory);
                    get_alu_instruction(get_ins_y(ins), Target::Immediate(data))
                },
                7 => Instruction::RST(get_ins_y(ins) * 8),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    fn decode_prefix_cb(&mut self, memory: &Memory) -> Instruction {
        let ins = self.read_instruction_byte(memory);
        self.m1_fetches += 1;
        match get_ins_x(ins) {
            0 => get_rot_instruction(get_ins_y(ins), get_register(get_ins_z(ins)), None),
            1 => Instruction::BIT(get_ins_y(ins), get_register(get_ins_z(ins))),
            2 => Instruction::RES(get_ins_y(ins), get_register(get_ins_z(ins)), None),
            3 => Instruction::SET(get_ins_y(ins), get_register(get_ins_z(ins)), None),
            _ => unreachable!(),
        }
    }

    /// The `DD CB d op` / `FD CB d op` page.  The displacement byte sits
    /// between the prefix pair and the final opcode, and neither of those two
    /// trailing bytes is an M1 fetch.  Encodings whose `z` field names a
    /// register also copy the operation's result into that register; the
    /// `(HL)`-shaped encoding (`z` == 6) writes memory only.
    fn decode_sub_prefix_cb(&mut self, memory: &Memory, reg: IndexRegister) -> Instruction {
        let offset = self.read_instruction_byte(memory) as i8;
        let ins = self.read_instruction_byte(memory);
        let opt_copy: UndocumentedCopy = get_plain_register(get_ins_z(ins));

        match get_ins_x(ins) {
            0 => get_rot_instruction(get_ins_y(ins), Target::IndirectOffset(reg, offset), opt_copy),
            1 => Instruction::BIT(get_ins_y(ins), Target::IndirectOffset(reg, offset)),
            2 => Instruction::RES(get_ins_y(ins), Target::IndirectOffset(reg, offset), opt_copy),
            3 => Instruction::SET(get_ins_y(ins), Target::IndirectOffset(reg, offset), opt_copy),
            _ => unreachable!(),
        }
    }

    fn decode_prefix_ed(&mut self, memory: &Memory) -> Instruction {
        let ins = self.read_instruction_byte(memory);
        self.m1_fetches += 1;

        match get_ins_x(ins) {
            1 => match get_ins_z(ins) {
                0 => {
                    if let Target::DirectReg(reg) = get_register(get_ins_y(ins)) {
                        Instruction::INic(reg)
                    } else {
                        Instruction::INicz
                    }
                },
                1 => {
                    if let Target::DirectReg(reg) = get_register(get_ins_y(ins)) {
                        Instruction::OUTic(reg)
                    } else {
                        Instruction::OUTicz
                    }
                },
                2 => {
                    if get_ins_q(ins) == 0 {
                        Instruction::SBC16(RegisterPair::HL, get_register_pair(get_ins_p(ins)))
                    } else {
                        Instruction::ADC16(RegisterPair::HL, get_register_pair(get_ins_p(ins)))
                    }
                },
                3 => {
                    let addr = self.read_instruction_word(memory);
                    if get_ins_q(ins) == 0 {
                        Instruction::LD(
                            LoadTarget::IndirectWord(addr),
                            LoadTarget::DirectRegWord(get_register_pair(get_ins_p(ins))),
                        )
                    } else {
                        Instruction::LD(
                            LoadTarget::DirectRegWord(get_register_pair(get_ins_p(ins))),
                            LoadTarget::IndirectWord(addr),
                        )
                    }
                },
                // every y is a valid encoding of NEG, and of RETN below
                4 => Instruction::NEG,
                5 => {
                    if get_ins_y(ins) == 1 {
                        Instruction::RETI
                    } else {
                        Instruction::RETN
                    }
                },
                6 => match get_ins_y(ins) & 0x03 {
                    0 | 1 => Instruction::IM(InterruptMode::Mode0),
                    2 => Instruction::IM(InterruptMode::Mode1),
                    3 => Instruction::IM(InterruptMode::Mode2),
                    _ => unreachable!(),
                },
                7 => match get_ins_y(ins) {
                    0 => Instruction::LDsr(SpecialRegister::I, Direction::FromAcc),
                    1 => Instruction::LDsr(SpecialRegister::R, Direction::FromAcc),
                    2 => Instruction::LDsr(SpecialRegister::I, Direction::ToAcc),
                    3 => Instruction::LDsr(SpecialRegister::R, Direction::ToAcc),
                    4 => Instruction::RRD,
                    5 => Instruction::RLD,
                    _ => self.invalid_ed(ins),
                },
                _ => unreachable!(),
            },
            2 => match ins {
                0xA0 => Instruction::LDI,
                0xA1 => Instruction::CPI,
                0xA2 => Instruction::INI,
                0xA3 => Instruction::OUTI,
                0xA8 => Instruction::LDD,
                0xA9 => Instruction::CPD,
                0xAA => Instruction::IND,
                0xAB => Instruction::OUTD,
                0xB0 => Instruction::LDIR,
                0xB1 => Instruction::CPIR,
                0xB2 => Instruction::INIR,
                0xB3 => Instruction::OTIR,
                0xB8 => Instruction::LDDR,
                0xB9 => Instruction::CPDR,
                0xBA => Instruction::INDR,
                0xBB => Instruction::OTDR,
                _ => self.invalid_ed(ins),
            },
            _ => self.invalid_ed(ins),
        }
    }

    fn invalid_ed(&mut self, ins: u8) -> Instruction {
        warn!("z80: unrecognised opcode ed {:02x} at {:#06x}, executing as nop", ins, self.start);
        self.extra_tstates = 4;
        Instruction::NOP
    }

    fn decode_prefix_dd_fd(&mut self, memory: &Memory, index_reg: IndexRegister) -> Instruction {
        let ins = self.read_instruction_byte(memory);
        self.m1_fetches += 1;

        if ins == 0xCB {
            return self.decode_sub_prefix_cb(memory, index_reg);
        }

        match get_ins_x(ins) {
            0 => {
                if (ins & 0x0F) == 9 {
                    return Instruction::ADD16(index_reg.into(), get_register_pair_index(get_ins_p(ins), index_reg));
                }

                match get_ins_p(ins) {
                    2 => match get_ins_z(ins) {
                        1 => {
                            let data = self.read_instruction_word(memory);
                            Instruction::LD(LoadTarget::DirectRegWord(index_reg.into()), LoadTarget::ImmediateWord(data))
                        },
                        2 => {
                            let addr = self.read_instruction_word(memory);
                            let regpair = index_reg.into();
                            match get_ins_q(ins) != 0 {
                                false => Instruction::LD(LoadTarget::IndirectWord(addr), LoadTarget::DirectRegWord(regpair)),
                                true => Instruction::LD(LoadTarget::DirectRegWord(regpair), LoadTarget::IndirectWord(addr)),
                            }
                        },
                        3 => match get_ins_q(ins) != 0 {
                            false => Instruction::INC16(index_reg.into()),
                            true => Instruction::DEC16(index_reg.into()),
                        },
                        4 => {
                            self.extra_tstates = 4;
                            let half = get_index_register_half(index_reg, get_ins_q(ins));
                            Instruction::INC8(Target::DirectRegHalf(half))
                        },
                        5 => {
                            self.extra_tstates = 4;
                            let half = get_index_register_half(index_reg, get_ins_q(ins));
                            Instruction::DEC8(Target::DirectRegHalf(half))
                        },
                        6 => {
                            self.extra_tstates = 4;
                            let half = get_index_register_half(index_reg, get_ins_q(ins));
                            let data = self.read_instruction_byte(memory);
                            Instruction::LD(LoadTarget::DirectRegHalfByte(half), LoadTarget::ImmediateByte(data))
                        },
                        _ => self.decode_bare(memory, ins, 4),
                    },
                    3 => match ins {
                        0x34 => {
                            let offset = self.read_instruction_byte(memory) as i8;
                            Instruction::INC8(Target::IndirectOffset(index_reg, offset))
                        },
                        0x35 => {
                            let offset = self.read_instruction_byte(memory) as i8;
                            Instruction::DEC8(Target::IndirectOffset(index_reg, offset))
                        },
                        0x36 => {
                            let offset = self.read_instruction_byte(memory) as i8;
                            let immediate = self.read_instruction_byte(memory);
                            Instruction::LD(
                                LoadTarget::IndirectOffsetByte(index_reg, offset),
                                LoadTarget::ImmediateByte(immediate),
                            )
                        },
                        _ => self.decode_bare(memory, ins, 4),
                    },
                    _ => self.decode_bare(memory, ins, 4),
                }
            },
            1 => match get_ins_p(ins) {
                0 | 1 => {
                    let target = match self.decode_index_target(memory, index_reg, get_ins_z(ins)) {
                        Some(target) => target,
                        None => return self.decode_bare(memory, ins, 4),
                    };

                    let dest = match get_ins_y(ins) {
                        0 => Register::B,
                        1 => Register::C,
                        2 => Register::D,
                        3 => Register::E,
                        _ => unreachable!(),
                    };
                    Instruction::LD(LoadTarget::DirectRegByte(dest), to_load_target(target))
                },
                2 => {
                    let src = match get_ins_z(ins) {
                        0 => Target::DirectReg(Register::B),
                        1 => Target::DirectReg(Register::C),
                        2 => Target::DirectReg(Register::D),
                        3 => Target::DirectReg(Register::E),
                        4 => Target::DirectRegHalf(get_index_register_half(index_reg, 0)),
                        5 => Target::DirectRegHalf(get_index_register_half(index_reg, 1)),
                        6 => {
                            // LD H,(IX+d) and LD L,(IX+d) operate on the real
                            // H and L, not the index halves
                            let offset = self.read_instruction_byte(memory) as i8;
                            let src = LoadTarget::IndirectOffsetByte(index_reg, offset);
                            let dest = if get_ins_q(ins) == 0 { Register::H } else { Register::L };
                            return Instruction::LD(LoadTarget::DirectRegByte(dest), src);
                        },
                        7 => Target::DirectReg(Register::A),
                        _ => unreachable!(),
                    };

                    let dest = get_index_register_half(index_reg, get_ins_q(ins));
                    Instruction::LD(LoadTarget::DirectRegHalfByte(dest), to_load_target(src))
                },
                3 => {
                    if get_ins_q(ins) == 0 {
                        if get_ins_z(ins) == 6 {
                            // 0x76 is HALT even under a prefix
                            return self.decode_bare(memory, ins, 4);
                        }
                        let src = get_register(get_ins_z(ins));
                        let offset = self.read_instruction_byte(memory) as i8;
                        Instruction::LD(LoadTarget::IndirectOffsetByte(index_reg, offset), to_load_target(src))
                    } else {
                        let target = match self.decode_index_target(memory, index_reg, get_ins_z(ins)) {
                            Some(target) => target,
                            None => return self.decode_bare(memory, ins, 4),
                        };

                        Instruction::LD(LoadTarget::DirectRegByte(Register::A), to_load_target(target))
                    }
                },
                _ => unreachable!(),
            },
            2 => {
                let target = match self.decode_index_target(memory, index_reg, get_ins_z(ins)) {
                    Some(target) => target,
                    None => return self.decode_bare(memory, ins, 4),
                };

                if matches!(target, Target::DirectRegHalf(_)) {
                    self.extra_tstates = 4;
                }
                get_alu_instruction(get_ins_y(ins), target)
            },
            3 => match ins {
                0xE1 => Instruction::POP(index_reg.into()),
                0xE3 => Instruction::EXsp(index_reg.into()),
                0xE5 => Instruction::PUSH(index_reg.into()),
                0xE9 => Instruction::JPIndirect(index_reg.into()),
                0xF9 => Instruction::LD(
                    LoadTarget::DirectRegWord(RegisterPair::SP),
                    LoadTarget::DirectRegWord(index_reg.into()),
                ),
                _ => self.decode_bare(memory, ins, 4),
            },
            _ => unreachable!(),
        }
    }

    fn decode_index_target(&mut self, memory: &Memory, index_reg: IndexRegister, z: u8) -> Option<Target> {
        match z {
            4 => Some(Target::DirectRegHalf(get_index_register_half(index_reg, 0))),
            5 => Some(Target::DirectRegHalf(get_index_register_half(index_reg, 1))),
            6 => {
                let offset = self.read_instruction_byte(memory) as i8;
                Some(Target::IndirectOffset(index_reg, offset))
            },
            _ => None,
        }
    }

    fn read_instruction_byte(&mut self, memory: &Memory) -> u8 {
        let byte = memory.read_byte(self.end);
        self.end = self.end.wrapping_add(1);
        byte
    }

    fn read_instruction_word(&mut self, memory: &Memory) -> u16 {
        let word = memory.read_word_le(self.end);
        self.end = self.end.wrapping_add(2);
        word
    }

    pub fn format_instruction_bytes(&self, memory: &Memory) -> String {
        let mut ins_data = String::new();
        for offset in 0..self.size() {
            write!(ins_data, "{:02x} ", memory.read_byte(self.start.wrapping_add(offset))).unwrap();
        }
        ins_data.trim_end().to_string()
    }
}

fn get_alu_instruction(alu: u8, target: Target) -> Instruction {
    match alu {
        0 => Instruction::ADDa(target),
        1 => Instruction::ADCa(target),
        2 => Instruction::SUB(target),
        3 => Instruction::SBCa(target),
        4 => Instruction::AND(target),
        5 => Instruction::XOR(target),
        6 => Instruction::OR(target),
        7 => Instruction::CP(target),
        _ => unreachable!(),
    }
}

fn get_rot_instruction(rot: u8, target: Target, opt_copy: UndocumentedCopy) -> Instruction {
    match rot {
        0 => Instruction::RLC(target, opt_copy),
        1 => Instruction::RRC(target, opt_copy),
        2 => Instruction::RL(target, opt_copy),
        3 => Instruction::RR(target, opt_copy),
        4 => Instruction::SLA(target, opt_copy),
        5 => Instruction::SRA(target, opt_copy),
        6 => Instruction::SLL(target, opt_copy),
        7 => Instruction::SRL(target, opt_copy),
        _ => unreachable!(),
    }
}

fn get_register(reg: u8) -> Target {
    match reg {
        0 => Target::DirectReg(Register::B),
        1 => Target::DirectReg(Register::C),
        2 => Target::DirectReg(Register::D),
        3 => Target::DirectReg(Register::E),
        4 => Target::DirectReg(Register::H),
        5 => Target::DirectReg(Register::L),
        6 => Target::IndirectReg(RegisterPair::HL),
        7 => Target::DirectReg(Register::A),
        _ => unreachable!(),
    }
}

fn get_plain_register(reg: u8) -> Option<Register> {
    match reg {
        0 => Some(Register::B),
        1 => Some(Register::C),
        2 => Some(Register::D),
        3 => Some(Register::E),
        4 => Some(Register::H),
        5 => Some(Register::L),
        6 => None,
        7 => Some(Register::A),
        _ => unreachable!(),
    }
}

fn to_load_target(target: Target) -> LoadTarget {
    match target {
        Target::DirectReg(reg) => LoadTarget::DirectRegByte(reg),
        Target::DirectRegHalf(reg) => LoadTarget::DirectRegHalfByte(reg),
        Target::IndirectReg(reg) => LoadTarget::IndirectRegByte(reg),
        Target::IndirectOffset(reg, offset) => LoadTarget::IndirectOffsetByte(reg, offset),
        Target::Immediate(data) => LoadTarget::ImmediateByte(data),
    }
}

fn get_register_pair(reg: u8) -> RegisterPair {
    match reg {
        0 => RegisterPair::BC,
        1 => RegisterPair::DE,
        2 => RegisterPair::HL,
        3 => RegisterPair::SP,
        _ => unreachable!(),
    }
}

fn get_register_pair_index(reg: u8, index_reg: IndexRegister) -> RegisterPair {
    match reg {
        0 => RegisterPair::BC,
        1 => RegisterPair::DE,
        2 => index_reg.into(),
        3 => RegisterPair::SP,
        _ => unreachable!(),
    }
}

fn get_register_pair_alt(reg: u8) -> RegisterPair {
    match reg {
        0 => RegisterPair::BC,
        1 => RegisterPair::DE,
        2 => RegisterPair::HL,
        3 => RegisterPair::AF,
        _ => unreachable!(),
    }
}

fn get_index_register_half(reg: IndexRegister, q: u8) -> IndexRegisterHalf {
    match (reg, q) {
        (IndexRegister::IX, 0) => IndexRegisterHalf::IXH,
        (IndexRegister::IX, _) => IndexRegisterHalf::IXL,
        (IndexRegister::IY, 0) => IndexRegisterHalf::IYH,
        (IndexRegister::IY, _) => IndexRegisterHalf::IYL,
    }
}

fn get_condition(cond: u8) -> Condition {
    match cond {
        0 => Condition::NotZero,
        1 => Condition::Zero,
        2 => Condition::NotCarry,
        3 => Condition::Carry,
        4 => Condition::ParityOdd,
        5 => Condition::ParityEven,
        6 => Condition::Positive,
        7 => Condition::Negative,
        _ => unreachable!(),
    }
}

/// Instruction bytes are split into x, y, and z bitfields, or alternatively
/// x, p, q, and z, following the decoding scheme described at
/// <http://www.z80.info/decoding.htm>:
///
/// ```text
/// Bits : 7 6 5 4 3 2 1 0
///       | X |  Y  |  Z  |
///           | P |Q|
/// ```
fn get_ins_x(ins: u8) -> u8 {
    (ins >> 6) & 0x03
}

fn get_ins_y(ins: u8) -> u8 {
    (ins >> 3) & 0x07
}

fn get_ins_z(ins: u8) -> u8 {
    ins & 0x07
}

fn get_ins_p(ins: u8) -> u8 {
    (ins >> 4) & 0x03
}

fn get_ins_q(ins: u8) -> u8 {
    (ins >> 3) & 0x01
}
