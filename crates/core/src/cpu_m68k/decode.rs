//! Opcode dispatch table.
//!
//! Every instruction family is listed once as a mask/match pattern together
//! with the addressing modes and sizes it accepts. The 65536-entry table is
//! generated from this list the first time a CPU executes, so the set of
//! legal encodings for each mnemonic can be read straight off [`PATTERNS`].
//! Patterns are tried in order and the first legal match wins.

use std::sync::OnceLock;

use super::Size;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Illegal,
    /// Recognised encoding of a family this core does not execute
    Unsupported(&'static str),

    OriCcr,
    OriSr,
    AndiCcr,
    AndiSr,
    EoriCcr,
    EoriSr,
    Ori,
    Andi,
    Subi,
    Addi,
    Eori,
    Cmpi,
    BtstDyn,
    BchgDyn,
    BclrDyn,
    BsetDyn,
    BtstImm,
    BchgImm,
    BclrImm,
    BsetImm,

    Move,
    Movea,
    Moveq,
    MoveFromSr,
    MoveToCcr,
    MoveToSr,
    MoveUsp,

    Negx,
    Clr,
    Neg,
    Not,
    Tst,
    Ext,
    Swap,
    Exg,
    Lea,
    Pea,
    Link,
    Unlk,
    MovemToMem,
    MovemFromMem,

    Nop,
    Rte,
    Rts,
    Rtr,
    Jsr,
    Jmp,
    Bra,
    Bsr,
    Bcc,
    DBcc,
    Scc,

    Addq,
    Subq,
    Add,
    Adda,
    Addx,
    Sub,
    Suba,
    Subx,
    Cmp,
    Cmpa,
    Cmpm,
    And,
    Or,
    Eor,
    Mulu,
    Muls,
    Divu,
    Divs,

    ShiftReg,
    ShiftMem,
}

/// Addressing mode classes, as bit sets over [`ea_index`]
mod ea {
    pub const DN: u16 = 1 << 0;
    pub const AN: u16 = 1 << 1;
    pub const IND: u16 = 1 << 2;
    pub const POSTINC: u16 = 1 << 3;
    pub const PREDEC: u16 = 1 << 4;
    pub const DISP: u16 = 1 << 5;
    pub const INDEX: u16 = 1 << 6;
    pub const ABS_W: u16 = 1 << 7;
    pub const ABS_L: u16 = 1 << 8;
    pub const PC_DISP: u16 = 1 << 9;
    pub const PC_INDEX: u16 = 1 << 10;
    pub const IMM: u16 = 1 << 11;

    pub const ALL: u16 = 0x0FFF;
    pub const DATA: u16 = ALL & !AN;
    pub const MEMORY: u16 = ALL & !(DN | AN);
    pub const ALTERABLE: u16 = DN | AN | MEM_ALT;
    pub const DATA_ALT: u16 = DN | MEM_ALT;
    pub const MEM_ALT: u16 = IND | POSTINC | PREDEC | DISP | INDEX | ABS_W | ABS_L;
    pub const CONTROL: u16 = IND | DISP | INDEX | ABS_W | ABS_L | PC_DISP | PC_INDEX;
    pub const MOVEM_TO_MEM: u16 = IND | PREDEC | DISP | INDEX | ABS_W | ABS_L;
    pub const MOVEM_FROM_MEM: u16 = CONTROL | POSTINC;
    /// The effective address field is not an addressing mode
    pub const NONE: u16 = 0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeRule {
    None,
    /// Bits 7-6
    Std,
    /// Bits 13-12
    Move,
    /// Bits 13-12, word or long only
    MoveAddr,
}

struct Pattern {
    mask: u16,
    bits: u16,
    op: Op,
    ea: u16,
    size: SizeRule,
}

const fn p(mask: u16, bits: u16, op: Op, ea: u16, size: SizeRule) -> Pattern {
    Pattern {
        mask,
        bits,
        op,
        ea,
        size,
    }
}

use SizeRule::{Move as SzMove, MoveAddr as SzMoveA, None as SzNone, Std as SzStd};

#[rustfmt::skip]
static PATTERNS: &[Pattern] = &[
    // Line 0: immediate and bit manipulation
    p(0xFFFF, 0x003C, Op::OriCcr, ea::NONE, SzNone),
    p(0xFFFF, 0x007C, Op::OriSr, ea::NONE, SzNone),
    p(0xFFFF, 0x023C, Op::AndiCcr, ea::NONE, SzNone),
    p(0xFFFF, 0x027C, Op::AndiSr, ea::NONE, SzNone),
    p(0xFFFF, 0x0A3C, Op::EoriCcr, ea::NONE, SzNone),
    p(0xFFFF, 0x0A7C, Op::EoriSr, ea::NONE, SzNone),
    p(0xF138, 0x0108, Op::Unsupported("MOVEP"), ea::NONE, SzNone),
    p(0xF1C0, 0x0100, Op::BtstDyn, ea::DATA, SzNone),
    p(0xF1C0, 0x0140, Op::BchgDyn, ea::DATA_ALT, SzNone),
    p(0xF1C0, 0x0180, Op::BclrDyn, ea::DATA_ALT, SzNone),
    p(0xF1C0, 0x01C0, Op::BsetDyn, ea::DATA_ALT, SzNone),
    p(0xFFC0, 0x0800, Op::BtstImm, ea::DATA & !ea::IMM, SzNone),
    p(0xFFC0, 0x0840, Op::BchgImm, ea::DATA_ALT, SzNone),
    p(0xFFC0, 0x0880, Op::BclrImm, ea::DATA_ALT, SzNone),
    p(0xFFC0, 0x08C0, Op::BsetImm, ea::DATA_ALT, SzNone),
    p(0xFF00, 0x0000, Op::Ori, ea::DATA_ALT, SzStd),
    p(0xFF00, 0x0200, Op::Andi, ea::DATA_ALT, SzStd),
    p(0xFF00, 0x0400, Op::Subi, ea::DATA_ALT, SzStd),
    p(0xFF00, 0x0600, Op::Addi, ea::DATA_ALT, SzStd),
    p(0xFF00, 0x0A00, Op::Eori, ea::DATA_ALT, SzStd),
    p(0xFF00, 0x0C00, Op::Cmpi, ea::DATA_ALT, SzStd),

    // Lines 1-3: MOVE, MOVEA
    p(0xC1C0, 0x0040, Op::Movea, ea::ALL, SzMoveA),
    p(0xC000, 0x0000, Op::Move, ea::ALL, SzMove),

    // Line 4: miscellaneous
    p(0xFFC0, 0x40C0, Op::MoveFromSr, ea::DATA_ALT, SzNone),
    p(0xFFC0, 0x44C0, Op::MoveToCcr, ea::DATA, SzNone),
    p(0xFFC0, 0x46C0, Op::MoveToSr, ea::DATA, SzNone),
    p(0xFF00, 0x4000, Op::Negx, ea::DATA_ALT, SzStd),
    p(0xFF00, 0x4200, Op::Clr, ea::DATA_ALT, SzStd),
    p(0xFF00, 0x4400, Op::Neg, ea::DATA_ALT, SzStd),
    p(0xFF00, 0x4600, Op::Not, ea::DATA_ALT, SzStd),
    p(0xFFC0, 0x4800, Op::Unsupported("NBCD"), ea::DATA_ALT, SzNone),
    p(0xFFF8, 0x4840, Op::Swap, ea::NONE, SzNone),
    p(0xFFC0, 0x4840, Op::Pea, ea::CONTROL, SzNone),
    p(0xFFB8, 0x4880, Op::Ext, ea::NONE, SzNone),
    p(0xFF80, 0x4880, Op::MovemToMem, ea::MOVEM_TO_MEM, SzNone),
    p(0xFF80, 0x4C80, Op::MovemFromMem, ea::MOVEM_FROM_MEM, SzNone),
    p(0xFFFF, 0x4AFC, Op::Unsupported("ILLEGAL"), ea::NONE, SzNone),
    p(0xFFC0, 0x4AC0, Op::Unsupported("TAS"), ea::DATA_ALT, SzNone),
    p(0xFF00, 0x4A00, Op::Tst, ea::DATA_ALT, SzStd),
    p(0xFFF0, 0x4E40, Op::Unsupported("TRAP"), ea::NONE, SzNone),
    p(0xFFF8, 0x4E50, Op::Link, ea::NONE, SzNone),
    p(0xFFF8, 0x4E58, Op::Unlk, ea::NONE, SzNone),
    p(0xFFF0, 0x4E60, Op::MoveUsp, ea::NONE, SzNone),
    p(0xFFFF, 0x4E70, Op::Unsupported("RESET"), ea::NONE, SzNone),
    p(0xFFFF, 0x4E71, Op::Nop, ea::NONE, SzNone),
    p(0xFFFF, 0x4E72, Op::Unsupported("STOP"), ea::NONE, SzNone),
    p(0xFFFF, 0x4E73, Op::Rte, ea::NONE, SzNone),
    p(0xFFFF, 0x4E75, Op::Rts, ea::NONE, SzNone),
    p(0xFFFF, 0x4E76, Op::Unsupported("TRAPV"), ea::NONE, SzNone),
    p(0xFFFF, 0x4E77, Op::Rtr, ea::NONE, SzNone),
    p(0xFFC0, 0x4E80, Op::Jsr, ea::CONTROL, SzNone),
    p(0xFFC0, 0x4EC0, Op::Jmp, ea::CONTROL, SzNone),
    p(0xF1C0, 0x41C0, Op::Lea, ea::CONTROL, SzNone),
    p(0xF1C0, 0x4180, Op::Unsupported("CHK"), ea::DATA, SzNone),

    // Line 5: ADDQ, SUBQ, Scc, DBcc
    p(0xF0F8, 0x50C8, Op::DBcc, ea::NONE, SzNone),
    p(0xF0C0, 0x50C0, Op::Scc, ea::DATA_ALT, SzNone),
    p(0xF100, 0x5000, Op::Addq, ea::ALTERABLE, SzStd),
    p(0xF100, 0x5100, Op::Subq, ea::ALTERABLE, SzStd),

    // Line 6: branches
    p(0xFF00, 0x6000, Op::Bra, ea::NONE, SzNone),
    p(0xFF00, 0x6100, Op::Bsr, ea::NONE, SzNone),
    p(0xF000, 0x6000, Op::Bcc, ea::NONE, SzNone),

    // Line 7
    p(0xF100, 0x7000, Op::Moveq, ea::NONE, SzNone),

    // Line 8: OR, DIV
    p(0xF1C0, 0x80C0, Op::Divu, ea::DATA, SzNone),
    p(0xF1C0, 0x81C0, Op::Divs, ea::DATA, SzNone),
    p(0xF1F0, 0x8100, Op::Unsupported("SBCD"), ea::NONE, SzNone),
    p(0xF100, 0x8000, Op::Or, ea::DATA, SzStd),
    p(0xF100, 0x8100, Op::Or, ea::MEM_ALT, SzStd),

    // Line 9: SUB
    p(0xF0C0, 0x90C0, Op::Suba, ea::ALL, SzNone),
    p(0xF130, 0x9100, Op::Subx, ea::NONE, SzStd),
    p(0xF100, 0x9000, Op::Sub, ea::ALL, SzStd),
    p(0xF100, 0x9100, Op::Sub, ea::MEM_ALT, SzStd),

    p(0xF000, 0xA000, Op::Unsupported("line A emulator"), ea::NONE, SzNone),

    // Line B: CMP, EOR
    p(0xF0C0, 0xB0C0, Op::Cmpa, ea::ALL, SzNone),
    p(0xF138, 0xB108, Op::Cmpm, ea::NONE, SzStd),
    p(0xF100, 0xB000, Op::Cmp, ea::ALL, SzStd),
    p(0xF100, 0xB100, Op::Eor, ea::DATA_ALT, SzStd),

    // Line C: AND, MUL, EXG
    p(0xF1C0, 0xC0C0, Op::Mulu, ea::DATA, SzNone),
    p(0xF1C0, 0xC1C0, Op::Muls, ea::DATA, SzNone),
    p(0xF1F0, 0xC100, Op::Unsupported("ABCD"), ea::NONE, SzNone),
    p(0xF1F8, 0xC140, Op::Exg, ea::NONE, SzNone),
    p(0xF1F8, 0xC148, Op::Exg, ea::NONE, SzNone),
    p(0xF1F8, 0xC188, Op::Exg, ea::NONE, SzNone),
    p(0xF100, 0xC000, Op::And, ea::DATA, SzStd),
    p(0xF100, 0xC100, Op::And, ea::MEM_ALT, SzStd),

    // Line D: ADD
    p(0xF0C0, 0xD0C0, Op::Adda, ea::ALL, SzNone),
    p(0xF130, 0xD100, Op::Addx, ea::NONE, SzStd),
    p(0xF100, 0xD000, Op::Add, ea::ALL, SzStd),
    p(0xF100, 0xD100, Op::Add, ea::MEM_ALT, SzStd),

    // Line E: shifts and rotates
    p(0xF8C0, 0xE0C0, Op::ShiftMem, ea::MEM_ALT, SzNone),
    p(0xF000, 0xE000, Op::ShiftReg, ea::NONE, SzStd),

    p(0xF000, 0xF000, Op::Unsupported("line F emulator"), ea::NONE, SzNone),
];

/// Position of a mode/register pair in the `ea` bit sets
pub(crate) fn ea_index(mode: u8, reg: u8) -> Option<u8> {
    match mode & 7 {
        7 => match reg & 7 {
            r @ 0..=4 => Some(7 + r),
            _ => None,
        },
        m => Some(m),
    }
}

fn size_of(opcode: u16, rule: SizeRule) -> Result<Option<Size>, ()> {
    match rule {
        SizeRule::None => Ok(None),
        SizeRule::Std => Size::from_std_bits(opcode >> 6).map(Some).ok_or(()),
        SizeRule::Move => Size::from_move_bits(opcode >> 12).map(Some).ok_or(()),
        SizeRule::MoveAddr => match Size::from_move_bits(opcode >> 12) {
            Some(Size::Byte) | None => Err(()),
            size => Ok(size),
        },
    }
}

fn accepts(pattern: &Pattern, opcode: u16) -> bool {
    if opcode & pattern.mask != pattern.bits {
        return false;
    }
    let size = match size_of(opcode, pattern.size) {
        Ok(size) => size,
        Err(()) => return false,
    };

    if pattern.ea != ea::NONE {
        let mode = ((opcode >> 3) & 7) as u8;
        let reg = (opcode & 7) as u8;
        let Some(index) = ea_index(mode, reg) else {
            return false;
        };
        if pattern.ea & (1 << index) == 0 {
            return false;
        }
        // Address registers cannot be byte operands
        if size == Some(Size::Byte) && mode == 1 {
            return false;
        }
    }

    if pattern.op == Op::Move {
        let dst_mode = ((opcode >> 6) & 7) as u8;
        let dst_reg = ((opcode >> 9) & 7) as u8;
        match ea_index(dst_mode, dst_reg) {
            Some(index) if ea::DATA_ALT & (1 << index) != 0 => {}
            _ => return false,
        }
    }

    true
}

fn build() -> Box<[Op]> {
    (0..=u16::MAX)
        .map(|opcode| {
            PATTERNS
                .iter()
                .find(|pattern| accepts(pattern, opcode))
                .map_or(Op::Illegal, |pattern| pattern.op)
        })
        .collect()
}

fn table() -> &'static [Op] {
    static TABLE: OnceLock<Box<[Op]>> = OnceLock::new();
    TABLE.get_or_init(build)
}

#[inline]
pub(crate) fn lookup(opcode: u16) -> Op {
    table()[opcode as usize]
}
