//! Status register layout and condition code arithmetic.
//!
//! The helpers here are pure: they take operands and the truncated result and
//! return the condition code bits, so every instruction family shares one
//! definition of carry and overflow.

use super::Size;

pub const SR_C: u16 = 0x0001;
pub const SR_V: u16 = 0x0002;
pub const SR_Z: u16 = 0x0004;
pub const SR_N: u16 = 0x0008;
pub const SR_X: u16 = 0x0010;
pub const SR_INT_MASK: u16 = 0x0700;
pub const SR_S: u16 = 0x2000;
pub const SR_T: u16 = 0x8000;

/// Bits of SR that exist on the 68000
pub const SR_MASK: u16 = 0xA71F;
/// Condition code register (low byte of SR)
pub const CCR_MASK: u16 = 0x001F;

/// N and Z for `result`; V and C clear.
pub fn logic(result: u32, size: Size) -> u16 {
    let mut ccr = 0;
    if size.truncate(result) == 0 {
        ccr |= SR_Z;
    }
    if size.is_negative(result) {
        ccr |= SR_N;
    }
    ccr
}

/// X N Z V C for `dst + src (+ X)` producing `result`
pub fn add(src: u32, dst: u32, result: u32, size: Size) -> u16 {
    let msb = size.msb();
    let carry = ((src & dst) | (!result & (src | dst))) & msb != 0;
    let overflow = (src ^ result) & (dst ^ result) & msb != 0;
    arith(result, size, carry, overflow)
}

/// X N Z V C for `dst - src (- X)` producing `result`
pub fn sub(src: u32, dst: u32, result: u32, size: Size) -> u16 {
    let msb = size.msb();
    let borrow = ((src & !dst) | (result & (src | !dst))) & msb != 0;
    let overflow = (src ^ dst) & (result ^ dst) & msb != 0;
    arith(result, size, borrow, overflow)
}

fn arith(result: u32, size: Size, carry: bool, overflow: bool) -> u16 {
    let mut ccr = logic(result, size);
    if carry {
        ccr |= SR_C | SR_X;
    }
    if overflow {
        ccr |= SR_V;
    }
    ccr
}

/// Evaluate one of the 16 condition tests (bits 11-8 of Bcc/DBcc/Scc)
pub fn condition(sr: u16, cc: u8) -> bool {
    let c = sr & SR_C != 0;
    let v = sr & SR_V != 0;
    let z = sr & SR_Z != 0;
    let n = sr & SR_N != 0;
    match cc & 0xF {
        0x0 => true,
        0x1 => false,
        0x2 => !c && !z,
        0x3 => c || z,
        0x4 => !c,
        0x5 => c,
        0x6 => !z,
        0x7 => z,
        0x8 => !v,
        0x9 => v,
        0xA => !n,
        0xB => n,
        0xC => n == v,
        0xD => n != v,
        0xE => !z && n == v,
        _ => z || n != v,
    }
}
