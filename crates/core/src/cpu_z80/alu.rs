//! Flag-setting arithmetic, logic, rotate and shift helpers.
//!
//! Undocumented bits 3 and 5 of F are copied from the result, as the chip does
//! for ordinary ALU operations.

use super::{CpuZ80, MemoryZ80, FLAG_C, FLAG_H, FLAG_N, FLAG_PV, FLAG_S, FLAG_X, FLAG_Y, FLAG_Z};

/// S, Z, Y and X taken from an 8-bit result
pub(crate) fn sz_flags(val: u8) -> u8 {
    let mut f = val & (FLAG_S | FLAG_Y | FLAG_X);
    if val == 0 {
        f |= FLAG_Z;
    }
    f
}

/// S, Z, Y, X and even parity
pub(crate) fn szp_flags(val: u8) -> u8 {
    let mut f = sz_flags(val);
    if val.count_ones() % 2 == 0 {
        f |= FLAG_PV;
    }
    f
}

impl<M: MemoryZ80> CpuZ80<M> {
    /// ADD/ADC: returns the 8-bit sum and sets every flag
    pub(crate) fn add8(&mut self, a: u8, val: u8, carry: bool) -> u8 {
        let c = if carry && self.flag(FLAG_C) { 1 } else { 0 };
        let wide = a as u16 + val as u16 + c;
        let result = wide as u8;

        let mut f = sz_flags(result);
        if (a ^ val ^ result) & 0x10 != 0 {
            f |= FLAG_H;
        }
        if (a ^ result) & (val ^ result) & 0x80 != 0 {
            f |= FLAG_PV;
        }
        if wide > 0xFF {
            f |= FLAG_C;
        }
        self.f = f;
        result
    }

    /// SUB/SBC/CP/NEG: returns the 8-bit difference and sets every flag
    pub(crate) fn sub8(&mut self, a: u8, val: u8, carry: bool) -> u8 {
        let c = if carry && self.flag(FLAG_C) { 1 } else { 0 };
        let wide = (a as u16).wrapping_sub(val as u16).wrapping_sub(c);
        let result = wide as u8;

        let mut f = sz_flags(result) | FLAG_N;
        if (a ^ val ^ result) & 0x10 != 0 {
            f |= FLAG_H;
        }
        if (a ^ val) & (a ^ result) & 0x80 != 0 {
            f |= FLAG_PV;
        }
        if wide > 0xFF {
            f |= FLAG_C;
        }
        self.f = f;
        result
    }

    /// The eight accumulator operations selected by bits 5-3 of the opcode:
    /// ADD ADC SUB SBC AND XOR OR CP
    pub(crate) fn alu_a(&mut self, op: u8, val: u8) {
        let a = self.a;
        match op & 7 {
            0 => self.a = self.add8(a, val, false),
            1 => self.a = self.add8(a, val, true),
            2 => self.a = self.sub8(a, val, false),
            3 => self.a = self.sub8(a, val, true),
            4 => {
                self.a = a & val;
                self.f = szp_flags(self.a) | FLAG_H;
            }
            5 => {
                self.a = a ^ val;
                self.f = szp_flags(self.a);
            }
            6 => {
                self.a = a | val;
                self.f = szp_flags(self.a);
            }
            _ => {
                self.sub8(a, val, false);
                // CP takes the undocumented bits from the operand
                self.f = (self.f & !(FLAG_Y | FLAG_X)) | (val & (FLAG_Y | FLAG_X));
            }
        }
    }

    /// INC r: carry is preserved, overflow only when the result is 0x80
    pub(crate) fn inc8(&mut self, val: u8) -> u8 {
        let result = val.wrapping_add(1);
        let mut f = (self.f & FLAG_C) | sz_flags(result);
        if val & 0x0F == 0x0F {
            f |= FLAG_H;
        }
        if result == 0x80 {
            f |= FLAG_PV;
        }
        self.f = f;
        result
    }

    /// DEC r: carry is preserved, overflow only when the result is 0x7F
    pub(crate) fn dec8(&mut self, val: u8) -> u8 {
        let result = val.wrapping_sub(1);
        let mut f = (self.f & FLAG_C) | sz_flags(result) | FLAG_N;
        if val & 0x0F == 0x00 {
            f |= FLAG_H;
        }
        if result == 0x7F {
            f |= FLAG_PV;
        }
        self.f = f;
        result
    }

    /// ADD HL/IX/IY,rr: only H, N and C change (plus the undocumented bits)
    pub(crate) fn add16(&mut self, a: u16, val: u16) -> u16 {
        let wide = a as u32 + val as u32;
        let result = wide as u16;
        let mut f = self.f & (FLAG_S | FLAG_Z | FLAG_PV);
        f |= ((result >> 8) as u8) & (FLAG_Y | FLAG_X);
        if (a ^ val ^ result) & 0x1000 != 0 {
            f |= FLAG_H;
        }
        if wide > 0xFFFF {
            f |= FLAG_C;
        }
        self.f = f;
        result
    }

    pub(crate) fn adc16(&mut self, a: u16, val: u16) -> u16 {
        let c = self.flag(FLAG_C) as u32;
        let wide = a as u32 + val as u32 + c;
        let result = wide as u16;
        let mut f = sz_flags((result >> 8) as u8) & !FLAG_Z;
        if result == 0 {
            f |= FLAG_Z;
        }
        if (a ^ val ^ result) & 0x1000 != 0 {
            f |= FLAG_H;
        }
        if (a ^ result) & (val ^ result) & 0x8000 != 0 {
            f |= FLAG_PV;
        }
        if wide > 0xFFFF {
            f |= FLAG_C;
        }
        self.f = f;
        result
    }

    pub(crate) fn sbc16(&mut self, a: u16, val: u16) -> u16 {
        let c = self.flag(FLAG_C) as u32;
        let wide = (a as u32).wrapping_sub(val as u32).wrapping_sub(c);
        let result = wide as u16;
        let mut f = (sz_flags((result >> 8) as u8) & !FLAG_Z) | FLAG_N;
        if result == 0 {
            f |= FLAG_Z;
        }
        if (a ^ val ^ result) & 0x1000 != 0 {
            f |= FLAG_H;
        }
        if (a ^ val) & (a ^ result) & 0x8000 != 0 {
            f |= FLAG_PV;
        }
        if wide > 0xFFFF {
            f |= FLAG_C;
        }
        self.f = f;
        result
    }

    /// The CB-page rotate/shift selected by bits 5-3:
    /// RLC RRC RL RR SLA SRA SLL SRL
    pub(crate) fn rotate(&mut self, op: u8, val: u8) -> u8 {
        let carry_in = self.flag(FLAG_C) as u8;
        let (result, carry) = match op & 7 {
            0 => (val.rotate_left(1), val & 0x80 != 0),
            1 => (val.rotate_right(1), val & 0x01 != 0),
            2 => ((val << 1) | carry_in, val & 0x80 != 0),
            3 => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
            4 => (val << 1, val & 0x80 != 0),
            5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
            6 => ((val << 1) | 1, val & 0x80 != 0),
            _ => (val >> 1, val & 0x01 != 0),
        };
        self.f = szp_flags(result) | if carry { FLAG_C } else { 0 };
        result
    }

    /// RLCA/RRCA/RLA/RRA: like the CB rotates but S, Z and P/V survive
    pub(crate) fn rotate_a(&mut self, op: u8) {
        let keep = self.f & (FLAG_S | FLAG_Z | FLAG_PV);
        let result = self.rotate(op, self.a);
        self.a = result;
        self.f = keep | (self.f & FLAG_C) | (result & (FLAG_Y | FLAG_X));
    }

    /// BIT n: Z and P/V reflect the tested bit, S only for bit 7
    pub(crate) fn bit(&mut self, n: u8, val: u8) {
        let set = val & (1 << n) != 0;
        let mut f = (self.f & FLAG_C) | FLAG_H | (val & (FLAG_Y | FLAG_X));
        if !set {
            f |= FLAG_Z | FLAG_PV;
        }
        if set && n == 7 {
            f |= FLAG_S;
        }
        self.f = f;
    }

    pub(crate) fn daa(&mut self) {
        let a = self.a;
        let n = self.flag(FLAG_N);
        let h = self.flag(FLAG_H);
        let mut carry = self.flag(FLAG_C);
        let mut correction = 0u8;

        if h || (a & 0x0F) > 9 {
            correction |= 0x06;
        }
        if carry || a > 0x99 {
            correction |= 0x60;
            carry = true;
        }

        let (result, half) = if n {
            (a.wrapping_sub(correction), h && (a & 0x0F) < 6)
        } else {
            (a.wrapping_add(correction), (a & 0x0F) > 9)
        };

        let mut f = szp_flags(result) | (self.f & FLAG_N);
        if half {
            f |= FLAG_H;
        }
        if carry {
            f |= FLAG_C;
        }
        self.a = result;
        self.f = f;
    }
}
