//! Disassembly display layer: converts decoded instructions into mnemonics
//! with typed operands, for the debugger UI.  Decoding itself lives in
//! `decode`; building the display form from the decoder's output keeps the
//! two from ever disagreeing.

use core::fmt;

use zeta_core::Memory;

use crate::decode::Z80Decoder;
use crate::instructions::{
    Condition, Direction, IndexRegister, IndexRegisterHalf, Instruction, InterruptMode, LoadTarget, Register, RegisterPair,
    SpecialRegister, Target,
};

/// Instruction names, with condition codes folded into the name the way the
/// canonical tables list them.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[rustfmt::skip]
pub enum Opcode {
    ADC, ADD, AND, BIT, CALL, CALLC, CALLM, CALLNC, CALLNZ, CALLP, CALLPE, CALLPO, CALLZ,
    CCF, CP, CPD, CPDR, CPI, CPIR, CPL, DAA, DEC, DI, DJNZ, EI, EX, EXX, HALT,
    IM0, IM1, IM2, IN, INC, IND, INDR, INI, INIR,
    JP, JPC, JPM, JPNC, JPNZ, JPP, JPPE, JPPO, JPZ, JR, JRC, JRNC, JRNZ, JRZ,
    LD, LDD, LDDR, LDI, LDIR, NEG, NOP, OR, OTDR, OTIR, OUT, OUTD, OUTI,
    POP, PUSH, RES, RET, RETC, RETI, RETM, RETN, RETNC, RETNZ, RETP, RETPE, RETPO, RETZ,
    RL, RLA, RLC, RLCA, RLD, RR, RRA, RRC, RRCA, RRD, RST,
    SBC, SCF, SET, SLA, SLL, SRA, SRL, SUB, XOR,
}

/// An 8-bit register name as it appears in disassembly.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    F,
    I,
    R,
    IXH,
    IXL,
    IYH,
    IYL,
}

/// A 16-bit register name as it appears in disassembly.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg16 {
    AF,
    AFShadow,
    BC,
    DE,
    HL,
    SP,
    IX,
    IY,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// An 8-bit literal.
    Immediate8(u8),
    /// A 16-bit literal, including absolute jump/call targets.
    Immediate16(u16),
    /// A signed displacement for the relative jumps.
    RelativeOffset(i8),
    /// An absolute address operand, rendered in parentheses.
    ExtendedAddress(u16),
    /// An index register plus signed displacement, `(IX+0x05)`.
    Indexed { reg: IndexRegister, offset: i8 },
    Register8(Reg8),
    Register16(Reg16),
    /// An 8-bit register holding half of a port number, `(C)`.
    Register8Indirect(Reg8),
    /// A 16-bit register holding an address, `(HL)`.
    Register16Indirect(Reg16),
    /// The bit number of a BIT/RES/SET instruction.
    BitIndex(u8),
    /// One of the eight fixed RST targets.
    RstVector(u16),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mnemonic {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    pub size: u8,
}

/// Disassemble the single instruction at `addr`, wrapping across 0xFFFF.
pub fn disassemble(memory: &Memory, addr: u16) -> Mnemonic {
    let decoder = Z80Decoder::decode_at(memory, addr);
    Mnemonic::from_instruction(&decoder.instruction, decoder.size() as u8)
}

/// Disassemble `count` consecutive instructions starting at `addr`,
/// returning each with the address it starts at.
pub fn disassemble_count(memory: &Memory, addr: u16, count: usize) -> Vec<(u16, Mnemonic)> {
    let mut listing = Vec::with_capacity(count);
    let mut next = addr;
    for _ in 0..count {
        let decoder = Z80Decoder::decode_at(memory, next);
        listing.push((next, Mnemonic::from_instruction(&decoder.instruction, decoder.size() as u8)));
        next = decoder.end;
    }
    listing
}

impl Mnemonic {
    pub fn from_instruction(instruction: &Instruction, size: u8) -> Mnemonic {
        let (opcode, operands) = convert(instruction);
        Mnemonic {
            opcode,
            operands,
            size,
        }
    }
}

fn convert(instruction: &Instruction) -> (Opcode, Vec<Operand>) {
    match *instruction {
        Instruction::ADCa(target) => (Opcode::ADC, vec![Operand::Register8(Reg8::A), target_operand(target)]),
        Instruction::ADC16(dest, src) => (Opcode::ADC, vec![pair_operand(dest), pair_operand(src)]),
        Instruction::ADDa(target) => (Opcode::ADD, vec![Operand::Register8(Reg8::A), target_operand(target)]),
        Instruction::ADD16(dest, src) => (Opcode::ADD, vec![pair_operand(dest), pair_operand(src)]),
        Instruction::AND(target) => (Opcode::AND, vec![target_operand(target)]),
        Instruction::BIT(bit, target) => (Opcode::BIT, vec![Operand::BitIndex(bit), target_operand(target)]),
        Instruction::CALL(addr) => (Opcode::CALL, vec![Operand::Immediate16(addr)]),
        Instruction::CALLcc(cond, addr) => (call_opcode(cond), vec![Operand::Immediate16(addr)]),
        Instruction::CCF => (Opcode::CCF, vec![]),
        Instruction::CP(target) => (Opcode::CP, vec![target_operand(target)]),
        Instruction::CPD => (Opcode::CPD, vec![]),
        Instruction::CPDR => (Opcode::CPDR, vec![]),
        Instruction::CPI => (Opcode::CPI, vec![]),
        Instruction::CPIR => (Opcode::CPIR, vec![]),
        Instruction::CPL => (Opcode::CPL, vec![]),
        Instruction::DAA => (Opcode::DAA, vec![]),
        Instruction::DEC16(regpair) => (Opcode::DEC, vec![pair_operand(regpair)]),
        Instruction::DEC8(target) => (Opcode::DEC, vec![target_operand(target)]),
        Instruction::DI => (Opcode::DI, vec![]),
        Instruction::DJNZ(offset) => (Opcode::DJNZ, vec![Operand::RelativeOffset(offset)]),
        Instruction::EI => (Opcode::EI, vec![]),
        Instruction::EXX => (Opcode::EXX, vec![]),
        Instruction::EXafaf => (Opcode::EX, vec![Operand::Register16(Reg16::AF), Operand::Register16(Reg16::AFShadow)]),
        Instruction::EXhlde => (Opcode::EX, vec![Operand::Register16(Reg16::DE), Operand::Register16(Reg16::HL)]),
        Instruction::EXsp(regpair) => {
            (Opcode::EX, vec![Operand::Register16Indirect(Reg16::SP), pair_operand(regpair)])
        },
        Instruction::HALT => (Opcode::HALT, vec![]),
        Instruction::IM(mode) => (
            match mode {
                InterruptMode::Mode0 => Opcode::IM0,
                InterruptMode::Mode1 => Opcode::IM1,
                InterruptMode::Mode2 => Opcode::IM2,
            },
            vec![],
        ),
        Instruction::INC16(regpair) => (Opcode::INC, vec![pair_operand(regpair)]),
        Instruction::INC8(target) => (Opcode::INC, vec![target_operand(target)]),
        Instruction::IND => (Opcode::IND, vec![]),
        Instruction::INDR => (Opcode::INDR, vec![]),
        Instruction::INI => (Opcode::INI, vec![]),
        Instruction::INIR => (Opcode::INIR, vec![]),
        Instruction::INic(reg) => (Opcode::IN, vec![Operand::Register8(reg8_operand(reg)), Operand::Register8Indirect(Reg8::C)]),
        Instruction::INicz => (Opcode::IN, vec![Operand::Register8Indirect(Reg8::C)]),
        Instruction::INx(port) => (Opcode::IN, vec![Operand::Register8(Reg8::A), Operand::Immediate8(port)]),
        Instruction::JP(addr) => (Opcode::JP, vec![Operand::Immediate16(addr)]),
        Instruction::JPIndirect(regpair) => (Opcode::JP, vec![indirect_pair_operand(regpair)]),
        Instruction::JPcc(cond, addr) => (jp_opcode(cond), vec![Operand::Immediate16(addr)]),
        Instruction::JR(offset) => (Opcode::JR, vec![Operand::RelativeOffset(offset)]),
        Instruction::JRcc(cond, offset) => (jr_opcode(cond), vec![Operand::RelativeOffset(offset)]),
        Instruction::LD(dest, src) => (Opcode::LD, vec![load_operand(dest), load_operand(src)]),
        Instruction::LDsr(special_reg, dir) => {
            let special = Operand::Register8(match special_reg {
                SpecialRegister::I => Reg8::I,
                SpecialRegister::R => Reg8::R,
            });
            let acc = Operand::Register8(Reg8::A);
            match dir {
                Direction::FromAcc => (Opcode::LD, vec![special, acc]),
                Direction::ToAcc => (Opcode::LD, vec![acc, special]),
            }
        },
        Instruction::LDD => (Opcode::LDD, vec![]),
        Instruction::LDDR => (Opcode::LDDR, vec![]),
        Instruction::LDI => (Opcode::LDI, vec![]),
        Instruction::LDIR => (Opcode::LDIR, vec![]),
        Instruction::NEG => (Opcode::NEG, vec![]),
        Instruction::NOP => (Opcode::NOP, vec![]),
        Instruction::OR(target) => (Opcode::OR, vec![target_operand(target)]),
        Instruction::OTDR => (Opcode::OTDR, vec![]),
        Instruction::OTIR => (Opcode::OTIR, vec![]),
        Instruction::OUTD => (Opcode::OUTD, vec![]),
        Instruction::OUTI => (Opcode::OUTI, vec![]),
        Instruction::OUTic(reg) => {
            (Opcode::OUT, vec![Operand::Register8Indirect(Reg8::C), Operand::Register8(reg8_operand(reg))])
        },
        Instruction::OUTicz => (Opcode::OUT, vec![Operand::Register8Indirect(Reg8::C), Operand::Immediate8(0)]),
        Instruction::OUTx(port) => (Opcode::OUT, vec![Operand::Immediate8(port), Operand::Register8(Reg8::A)]),
        Instruction::POP(regpair) => (Opcode::POP, vec![pair_operand(regpair)]),
        Instruction::PUSH(regpair) => (Opcode::PUSH, vec![pair_operand(regpair)]),
        Instruction::RES(bit, target, opt_copy) => {
            let mut operands = vec![Operand::BitIndex(bit), target_operand(target)];
            push_copy_operand(&mut operands, opt_copy);
            (Opcode::RES, operands)
        },
        Instruction::RET => (Opcode::RET, vec![]),
        Instruction::RETI => (Opcode::RETI, vec![]),
        Instruction::RETN => (Opcode::RETN, vec![]),
        Instruction::RETcc(cond) => (ret_opcode(cond), vec![]),
        Instruction::RL(target, opt_copy) => rotate(Opcode::RL, target, opt_copy),
        Instruction::RLA => (Opcode::RLA, vec![]),
        Instruction::RLC(target, opt_copy) => rotate(Opcode::RLC, target, opt_copy),
        Instruction::RLCA => (Opcode::RLCA, vec![]),
        Instruction::RLD => (Opcode::RLD, vec![]),
        Instruction::RR(target, opt_copy) => rotate(Opcode::RR, target, opt_copy),
        Instruction::RRA => (Opcode::RRA, vec![]),
        Instruction::RRC(target, opt_copy) => rotate(Opcode::RRC, target, opt_copy),
        Instruction::RRCA => (Opcode::RRCA, vec![]),
        Instruction::RRD => (Opcode::RRD, vec![]),
        Instruction::RST(vector) => (Opcode::RST, vec![Operand::RstVector(vector as u16)]),
        Instruction::SBCa(target) => (Opcode::SBC, vec![Operand::Register8(Reg8::A), target_operand(target)]),
        Instruction::SBC16(dest, src) => (Opcode::SBC, vec![pair_operand(dest), pair_operand(src)]),
        Instruction::SCF => (Opcode::SCF, vec![]),
        Instruction::SET(bit, target, opt_copy) => {
            let mut operands = vec![Operand::BitIndex(bit), target_operand(target)];
            push_copy_operand(&mut operands, opt_copy);
            (Opcode::SET, operands)
        },
        Instruction::SLA(target, opt_copy) => rotate(Opcode::SLA, target, opt_copy),
        Instruction::SLL(target, opt_copy) => rotate(Opcode::SLL, target, opt_copy),
        Instruction::SRA(target, opt_copy) => rotate(Opcode::SRA, target, opt_copy),
        Instruction::SRL(target, opt_copy) => rotate(Opcode::SRL, target, opt_copy),
        Instruction::SUB(target) => (Opcode::SUB, vec![target_operand(target)]),
        Instruction::XOR(target) => (Opcode::XOR, vec![target_operand(target)]),
    }
}

fn rotate(opcode: Opcode, target: Target, opt_copy: Option<Register>) -> (Opcode, Vec<Operand>) {
    let mut operands = vec![target_operand(target)];
    push_copy_operand(&mut operands, opt_copy);
    (opcode, operands)
}

/// The undocumented DDCB/FDCB encodings also name the register that receives
/// a copy of the result; it is shown as a trailing operand.
fn push_copy_operand(operands: &mut Vec<Operand>, opt_copy: Option<Register>) {
    if let Some(reg) = opt_copy {
        operands.push(Operand::Register8(reg8_operand(reg)));
    }
}

fn reg8_operand(reg: Register) -> Reg8 {
    match reg {
        Register::A => Reg8::A,
        Register::B => Reg8::B,
        Register::C => Reg8::C,
        Register::D => Reg8::D,
        Register::E => Reg8::E,
        Register::H => Reg8::H,
        Register::L => Reg8::L,
        Register::F => Reg8::F,
    }
}

fn half_operand(half: IndexRegisterHalf) -> Reg8 {
    match half {
        IndexRegisterHalf::IXH => Reg8::IXH,
        IndexRegisterHalf::IXL => Reg8::IXL,
        IndexRegisterHalf::IYH => Reg8::IYH,
        IndexRegisterHalf::IYL => Reg8::IYL,
    }
}

fn reg16_name(regpair: RegisterPair) -> Reg16 {
    match regpair {
        RegisterPair::AF => Reg16::AF,
        RegisterPair::BC => Reg16::BC,
        RegisterPair::DE => Reg16::DE,
        RegisterPair::HL => Reg16::HL,
        RegisterPair::SP => Reg16::SP,
        RegisterPair::IX => Reg16::IX,
        RegisterPair::IY => Reg16::IY,
    }
}

fn pair_operand(regpair: RegisterPair) -> Operand {
    Operand::Register16(reg16_name(regpair))
}

fn indirect_pair_operand(regpair: RegisterPair) -> Operand {
    Operand::Register16Indirect(reg16_name(regpair))
}

fn target_operand(target: Target) -> Operand {
    match target {
        Target::DirectReg(reg) => Operand::Register8(reg8_operand(reg)),
        Target::DirectRegHalf(half) => Operand::Register8(half_operand(half)),
        Target::IndirectReg(regpair) => indirect_pair_operand(regpair),
        Target::IndirectOffset(reg, offset) => Operand::Indexed {
            reg,
            offset,
        },
        Target::Immediate(value) => Operand::Immediate8(value),
    }
}

fn load_operand(target: LoadTarget) -> Operand {
    match target {
        LoadTarget::DirectRegByte(reg) => Operand::Register8(reg8_operand(reg)),
        LoadTarget::DirectRegHalfByte(half) => Operand::Register8(half_operand(half)),
        LoadTarget::DirectRegWord(regpair) => pair_operand(regpair),
        LoadTarget::IndirectRegByte(regpair) => indirect_pair_operand(regpair),
        LoadTarget::IndirectOffsetByte(reg, offset) => Operand::Indexed {
            reg,
            offset,
        },
        LoadTarget::IndirectByte(addr) | LoadTarget::IndirectWord(addr) => Operand::ExtendedAddress(addr),
        LoadTarget::ImmediateByte(value) => Operand::Immediate8(value),
        LoadTarget::ImmediateWord(value) => Operand::Immediate16(value),
    }
}

fn jp_opcode(cond: Condition) -> Opcode {
    match cond {
        Condition::NotZero => Opcode::JPNZ,
        Condition::Zero => Opcode::JPZ,
        Condition::NotCarry => Opcode::JPNC,
        Condition::Carry => Opcode::JPC,
        Condition::ParityOdd => Opcode::JPPO,
        Condition::ParityEven => Opcode::JPPE,
        Condition::Positive => Opcode::JPP,
        Condition::Negative => Opcode::JPM,
    }
}

fn jr_opcode(cond: Condition) -> Opcode {
    match cond {
        Condition::NotZero => Opcode::JRNZ,
        Condition::Zero => Opcode::JRZ,
        Condition::NotCarry => Opcode::JRNC,
        Condition::Carry => Opcode::JRC,
        // the hardware has no relative jumps on parity or sign
        _ => Opcode::JR,
    }
}

fn call_opcode(cond: Condition) -> Opcode {
    match cond {
        Condition::NotZero => Opcode::CALLNZ,
        Condition::Zero => Opcode::CALLZ,
        Condition::NotCarry => Opcode::CALLNC,
        Condition::Carry => Opcode::CALLC,
        Condition::ParityOdd => Opcode::CALLPO,
        Condition::ParityEven => Opcode::CALLPE,
        Condition::Positive => Opcode::CALLP,
        Condition::Negative => Opcode::CALLM,
    }
}

fn ret_opcode(cond: Condition) -> Opcode {
    match cond {
        Condition::NotZero => Opcode::RETNZ,
        Condition::Zero => Opcode::RETZ,
        Condition::NotCarry => Opcode::RETNC,
        Condition::Carry => Opcode::RETC,
        Condition::ParityOdd => Opcode::RETPO,
        Condition::ParityEven => Opcode::RETPE,
        Condition::Positive => Opcode::RETP,
        Condition::Negative => Opcode::RETM,
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Opcode::CALLC => "CALL C",
            Opcode::CALLM => "CALL M",
            Opcode::CALLNC => "CALL NC",
            Opcode::CALLNZ => "CALL NZ",
            Opcode::CALLP => "CALL P",
            Opcode::CALLPE => "CALL PE",
            Opcode::CALLPO => "CALL PO",
            Opcode::CALLZ => "CALL Z",
            Opcode::IM0 => "IM 0",
            Opcode::IM1 => "IM 1",
            Opcode::IM2 => "IM 2",
            Opcode::JPC => "JP C",
            Opcode::JPM => "JP M",
            Opcode::JPNC => "JP NC",
            Opcode::JPNZ => "JP NZ",
            Opcode::JPP => "JP P",
            Opcode::JPPE => "JP PE",
            Opcode::JPPO => "JP PO",
            Opcode::JPZ => "JP Z",
            Opcode::JRC => "JR C",
            Opcode::JRNC => "JR NC",
            Opcode::JRNZ => "JR NZ",
            Opcode::JRZ => "JR Z",
            Opcode::RETC => "RET C",
            Opcode::RETM => "RET M",
            Opcode::RETNC => "RET NC",
            Opcode::RETNZ => "RET NZ",
            Opcode::RETP => "RET P",
            Opcode::RETPE => "RET PE",
            Opcode::RETPO => "RET PO",
            Opcode::RETZ => "RET Z",
            other => return write!(f, "{:?}", other),
        };
        write!(f, "{}", text)
    }
}

impl fmt::Display for Reg8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for Reg16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg16::AFShadow => write!(f, "AF'"),
            other => write!(f, "{:?}", other),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Immediate8(value) => write!(f, "{:#04x}", value),
            Operand::Immediate16(value) => write!(f, "{:#06x}", value),
            Operand::RelativeOffset(offset) => write!(f, "{:+}", offset),
            Operand::ExtendedAddress(addr) => write!(f, "({:#06x})", addr),
            Operand::Indexed {
                reg,
                offset,
            } => {
                let name = match reg {
                    IndexRegister::IX => "IX",
                    IndexRegister::IY => "IY",
                };
                if *offset < 0 {
                    write!(f, "({}-{:#04x})", name, -(*offset as i16))
                } else {
                    write!(f, "({}+{:#04x})", name, offset)
                }
            },
            Operand::Register8(reg) => write!(f, "{}", reg),
            Operand::Register16(reg) => write!(f, "{}", reg),
            Operand::Register8Indirect(reg) => write!(f, "({})", reg),
            Operand::Register16Indirect(reg) => write!(f, "({})", reg),
            Operand::BitIndex(bit) => write!(f, "{}", bit),
            Operand::RstVector(vector) => write!(f, "{:#04x}", vector),
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", operand)?;
            } else {
                write!(f, ", {}", operand)?;
            }
        }
        Ok(())
    }
}
