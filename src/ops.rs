//! Instruction word decoding.
//!
//! Every instruction is a single 16-bit word: the top 4 bits select the opcode and the
//! remaining 12 bits hold operand fields, whose meaning depends on the opcode.

/// The 16 values of an instruction's top nibble.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// Conditional branch on `nzp` mask.
    BR = 0x0,
    ADD = 0x1,
    LD = 0x2,
    ST = 0x3,
    /// `JSR` (PC-relative) and `JSRR` (register), selected by bit 11.
    JSR = 0x4,
    AND = 0x5,
    LDR = 0x6,
    STR = 0x7,
    /// Return from interrupt. No privilege model exists, so this is illegal.
    RTI = 0x8,
    NOT = 0x9,
    LDI = 0xA,
    STI = 0xB,
    /// Also `RET`, which is `JMP R7`.
    JMP = 0xC,
    /// Reserved, illegal.
    RES = 0xD,
    LEA = 0xE,
    TRAP = 0xF,
}

impl Opcode {
    pub fn from_instr(instr: u16) -> Self {
        match instr >> 12 {
            0x0 => Self::BR,
            0x1 => Self::ADD,
            0x2 => Self::LD,
            0x3 => Self::ST,
            0x4 => Self::JSR,
            0x5 => Self::AND,
            0x6 => Self::LDR,
            0x7 => Self::STR,
            0x8 => Self::RTI,
            0x9 => Self::NOT,
            0xA => Self::LDI,
            0xB => Self::STI,
            0xC => Self::JMP,
            0xD => Self::RES,
            0xE => Self::LEA,
            // Only 4 bits remain after the shift
            _ => Self::TRAP,
        }
    }
}

/// Interpret the low `bits` bits of `val` as two's complement and widen to 16 bits.
#[inline]
pub fn sign_extend(val: u16, bits: u32) -> u16 {
    debug_assert!(bits > 0 && bits < 16);
    // Sign bit
    let sign = val & (1u16 << (bits - 1));
    // Bits lower than sign bit
    let magnitude = val & ((1u16 << (bits - 1)) - 1);
    // Positive input: all bits unset; 0x0000
    // Negative input: sign bit and above will be set, lower bits will be reset
    //      Eg. bits=14 -> 0xE000
    let sign_extension = (!sign).wrapping_add(1); // sign * -1
    magnitude | sign_extension
}

/// Accessors for the operand fields of an instruction word.
///
/// Which fields are meaningful depends on the opcode; all of them are always
/// extractable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instr(pub u16);

impl Instr {
    pub fn opcode(self) -> Opcode {
        Opcode::from_instr(self.0)
    }

    /// Destination register, or source register of a store. Bits 11..9.
    #[inline]
    pub fn dr(self) -> u16 {
        (self.0 >> 9) & 0b111
    }

    /// First source register, or base register. Bits 8..6.
    #[inline]
    pub fn sr1(self) -> u16 {
        (self.0 >> 6) & 0b111
    }

    /// Second source register. Bits 2..0.
    #[inline]
    pub fn sr2(self) -> u16 {
        self.0 & 0b111
    }

    /// `nzp` mask of a branch. Bits 11..9.
    #[inline]
    pub fn cond_mask(self) -> u16 {
        (self.0 >> 9) & 0b111
    }

    /// Immediate mode bit of `ADD`/`AND`.
    #[inline]
    pub fn is_imm(self) -> bool {
        self.0 & 0x0020 != 0
    }

    /// PC-relative mode bit of `JSR`.
    #[inline]
    pub fn is_long(self) -> bool {
        self.0 & 0x0800 != 0
    }

    #[inline]
    pub fn imm5(self) -> u16 {
        sign_extend(self.0, 5)
    }

    #[inline]
    pub fn offset6(self) -> u16 {
        sign_extend(self.0, 6)
    }

    #[inline]
    pub fn pc_offset9(self) -> u16 {
        sign_extend(self.0, 9)
    }

    #[inline]
    pub fn pc_offset11(self) -> u16 {
        sign_extend(self.0, 11)
    }

    #[inline]
    pub fn trap_vect(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}
