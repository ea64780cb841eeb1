//! Bit manipulation, shifts and rotates.

use super::decode::Op;
use super::flags;
use super::{CpuM68k, M68kError, Memory68k, Operand, Size, SR_C, SR_V, SR_X, SR_Z};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShiftKind {
    Arithmetic,
    Logical,
    RotateExtend,
    Rotate,
}

impl ShiftKind {
    fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            0 => ShiftKind::Arithmetic,
            1 => ShiftKind::Logical,
            2 => ShiftKind::RotateExtend,
            _ => ShiftKind::Rotate,
        }
    }
}

impl<M: Memory68k> CpuM68k<M> {
    /// BTST/BCHG/BCLR/BSET. Data registers are tested modulo 32, memory bytes modulo 8.
    pub(super) fn op_bit(&mut self, op: Op) -> Result<(), M68kError> {
        let bit = match op {
            Op::BtstDyn | Op::BchgDyn | Op::BclrDyn | Op::BsetDyn => self.d[self.reg_hi()],
            _ => self.fetch_word()? & 0xFF,
        };
        let apply = |value: u32, mask: u32| match op {
            Op::BchgDyn | Op::BchgImm => Some(value ^ mask),
            Op::BclrDyn | Op::BclrImm => Some(value & !mask),
            Op::BsetDyn | Op::BsetImm => Some(value | mask),
            _ => None,
        };

        let (operand, size, mask) = if self.main_ea_is_data_reg() {
            (Operand::DataReg(self.reg_lo()), Size::Long, 1u32 << (bit % 32))
        } else {
            let operand = self.resolve_main_ea(Size::Byte)?;
            (operand, Size::Byte, 1u32 << (bit % 8))
        };

        let value = self.read_operand(operand, size)?;
        self.set_flag(SR_Z, value & mask == 0);
        if let Some(result) = apply(value, mask) {
            self.write_operand(operand, size, result)?;
            self.add_cycles(4);
        }
        Ok(())
    }

    pub(super) fn op_shift_reg(&mut self) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let field = self.reg_hi();
        let count = if self.opcode & 0x0020 != 0 {
            self.d[field] % 64
        } else if field == 0 {
            8
        } else {
            field as u32
        };
        let kind = ShiftKind::from_bits(self.opcode >> 3);
        let left = self.opcode & 0x0100 != 0;

        let reg = self.reg_lo();
        let value = size.truncate(self.d[reg]);
        let result = self.shift(kind, left, value, count, size);
        self.write_operand(Operand::DataReg(reg), size, result)?;
        let base = if size == Size::Long { 4 } else { 2 };
        self.add_cycles(base + 2 * count);
        Ok(())
    }

    /// Memory shifts always move a word by one bit
    pub(super) fn op_shift_mem(&mut self) -> Result<(), M68kError> {
        let kind = ShiftKind::from_bits(self.opcode >> 9);
        let left = self.opcode & 0x0100 != 0;
        let operand = self.resolve_main_ea(Size::Word)?;
        let value = self.read_operand(operand, Size::Word)?;
        let result = self.shift(kind, left, value, 1, Size::Word);
        self.write_operand(operand, Size::Word, result)
    }

    fn shift(&mut self, kind: ShiftKind, left: bool, value: u32, count: u32, size: Size) -> u32 {
        let msb = size.msb();
        let mut value = size.truncate(value);
        let mut extend = self.sr & SR_X != 0;
        let mut carry = false;
        let mut overflow = false;

        for _ in 0..count {
            if left {
                let out = value & msb != 0;
                value = size.truncate(value << 1);
                match kind {
                    ShiftKind::Arithmetic => overflow |= (value & msb != 0) != out,
                    ShiftKind::Logical => {}
                    ShiftKind::RotateExtend => value |= extend as u32,
                    ShiftKind::Rotate => value |= out as u32,
                }
                carry = out;
            } else {
                let out = value & 1 != 0;
                let sign = value & msb;
                value >>= 1;
                match kind {
                    ShiftKind::Arithmetic => value |= sign,
                    ShiftKind::Logical => {}
                    ShiftKind::RotateExtend => {
                        if extend {
                            value |= msb;
                        }
                    }
                    ShiftKind::Rotate => {
                        if out {
                            value |= msb;
                        }
                    }
                }
                carry = out;
            }
            if kind != ShiftKind::Rotate {
                extend = carry;
            }
        }

        if count == 0 && kind == ShiftKind::RotateExtend {
            carry = extend;
        }

        let mut ccr = flags::logic(value, size);
        if carry {
            ccr |= SR_C;
        }
        if overflow {
            ccr |= SR_V;
        }
        if extend {
            ccr |= SR_X;
        }
        // extend still holds the old X for ROL/ROR and zero counts
        self.set_ccr(ccr);
        value
    }
}
