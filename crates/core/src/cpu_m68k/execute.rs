//! Instruction handlers for data movement, arithmetic and logic.

use super::addressing::{MODE_AN, MODE_DN, MODE_POSTINC, MODE_PREDEC};
use super::decode::Op;
use super::flags;
use super::{CpuM68k, M68kError, Memory68k, Operand, Size, SR_C, SR_V, SR_X, SR_Z};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alu {
    Add,
    Sub,
    And,
    Or,
    Eor,
    Cmp,
}

impl<M: Memory68k> CpuM68k<M> {
    fn ea_mode(&self) -> u8 {
        ((self.opcode >> 3) & 7) as u8
    }

    fn ea_reg(&self) -> u8 {
        (self.opcode & 7) as u8
    }

    /// Register field in bits 11-9
    pub(crate) fn reg_hi(&self) -> usize {
        ((self.opcode >> 9) & 7) as usize
    }

    /// Register field in bits 2-0
    pub(crate) fn reg_lo(&self) -> usize {
        (self.opcode & 7) as usize
    }

    pub(crate) fn std_size(&self) -> Result<Size, M68kError> {
        Size::from_std_bits(self.opcode >> 6).ok_or_else(|| self.unimplemented())
    }

    /// Resolve the operand in bits 5-0
    pub(crate) fn resolve_main_ea(&mut self, size: Size) -> Result<Operand, M68kError> {
        let (mode, reg) = (self.ea_mode(), self.ea_reg());
        self.resolve_ea(mode, reg, size)
    }

    pub(crate) fn read_main_ea(&mut self, size: Size) -> Result<u32, M68kError> {
        let operand = self.resolve_main_ea(size)?;
        self.read_operand(operand, size)
    }

    pub(crate) fn main_ea_is_data_reg(&self) -> bool {
        self.ea_mode() == MODE_DN
    }

    /// Fetch an immediate operand of `size` from the instruction stream
    fn fetch_immediate(&mut self, size: Size) -> Result<u32, M68kError> {
        match size {
            Size::Byte => Ok(self.fetch_word()? & 0xFF),
            Size::Word => self.fetch_word(),
            Size::Long => self.fetch_long(),
        }
    }

    pub(super) fn execute(&mut self, op: Op) -> Result<(), M68kError> {
        match op {
            Op::Illegal => Err(self.unimplemented()),
            Op::Unsupported(what) => Err(self.unsupported(what)),

            Op::OriCcr | Op::AndiCcr | Op::EoriCcr => self.op_logic_ccr(op),
            Op::OriSr | Op::AndiSr | Op::EoriSr => self.op_logic_sr(op),
            Op::Ori => self.op_alu_immediate(Alu::Or),
            Op::Andi => self.op_alu_immediate(Alu::And),
            Op::Subi => self.op_alu_immediate(Alu::Sub),
            Op::Addi => self.op_alu_immediate(Alu::Add),
            Op::Eori => self.op_alu_immediate(Alu::Eor),
            Op::Cmpi => self.op_alu_immediate(Alu::Cmp),
            Op::BtstDyn | Op::BchgDyn | Op::BclrDyn | Op::BsetDyn => self.op_bit(op),
            Op::BtstImm | Op::BchgImm | Op::BclrImm | Op::BsetImm => self.op_bit(op),

            Op::Move => self.op_move(),
            Op::Movea => self.op_movea(),
            Op::Moveq => self.op_moveq(),
            Op::MoveFromSr => self.op_move_from_sr(),
            Op::MoveToCcr => self.op_move_to_ccr(),
            Op::MoveToSr => self.op_move_to_sr(),
            Op::MoveUsp => self.op_move_usp(),

            Op::Negx => self.op_negx(),
            Op::Clr => self.op_clr(),
            Op::Neg => self.op_neg(),
            Op::Not => self.op_not(),
            Op::Tst => self.op_tst(),
            Op::Ext => self.op_ext(),
            Op::Swap => self.op_swap(),
            Op::Exg => self.op_exg(),
            Op::Lea => self.op_lea(),
            Op::Pea => self.op_pea(),
            Op::Link => self.op_link(),
            Op::Unlk => self.op_unlk(),
            Op::MovemToMem => self.op_movem_to_mem(),
            Op::MovemFromMem => self.op_movem_from_mem(),

            Op::Nop => Ok(()),
            Op::Rte => self.op_rte(),
            Op::Rts => self.op_rts(),
            Op::Rtr => self.op_rtr(),
            Op::Jsr => self.op_jsr(),
            Op::Jmp => self.op_jmp(),
            Op::Bra | Op::Bsr | Op::Bcc => self.op_branch(op),
            Op::DBcc => self.op_dbcc(),
            Op::Scc => self.op_scc(),

            Op::Addq => self.op_quick(Alu::Add),
            Op::Subq => self.op_quick(Alu::Sub),
            Op::Add => self.op_alu(Alu::Add),
            Op::Sub => self.op_alu(Alu::Sub),
            Op::And => self.op_alu(Alu::And),
            Op::Or => self.op_alu(Alu::Or),
            Op::Eor => self.op_alu(Alu::Eor),
            Op::Cmp => self.op_alu(Alu::Cmp),
            Op::Adda => self.op_address_arith(Alu::Add),
            Op::Suba => self.op_address_arith(Alu::Sub),
            Op::Cmpa => self.op_address_arith(Alu::Cmp),
            Op::Addx => self.op_extended(Alu::Add),
            Op::Subx => self.op_extended(Alu::Sub),
            Op::Cmpm => self.op_cmpm(),
            Op::Mulu => self.op_mul(false),
            Op::Muls => self.op_mul(true),
            Op::Divu => self.op_div(false),
            Op::Divs => self.op_div(true),

            Op::ShiftReg => self.op_shift_reg(),
            Op::ShiftMem => self.op_shift_mem(),
        }
    }

    /// Compute `dst <alu> src` and the condition codes it produces.
    ///
    /// The returned bits are X N Z V C; logical operations report X as it was.
    fn alu(&self, alu: Alu, src: u32, dst: u32, size: Size) -> (u32, u16) {
        match alu {
            Alu::Add => {
                let result = size.truncate(dst.wrapping_add(src));
                (result, flags::add(src, dst, result, size))
            }
            Alu::Sub | Alu::Cmp => {
                let result = size.truncate(dst.wrapping_sub(src));
                (result, flags::sub(src, dst, result, size))
            }
            Alu::And | Alu::Or | Alu::Eor => {
                let result = match alu {
                    Alu::And => dst & src,
                    Alu::Or => dst | src,
                    _ => dst ^ src,
                };
                let result = size.truncate(result);
                (result, flags::logic(result, size) | (self.sr & SR_X))
            }
        }
    }

    fn apply_alu_flags(&mut self, alu: Alu, ccr: u16) {
        match alu {
            // CMP leaves X alone
            Alu::Cmp => self.set_nzvc(ccr),
            _ => self.set_ccr(ccr),
        }
    }

    fn op_move(&mut self) -> Result<(), M68kError> {
        let size = Size::from_move_bits(self.opcode >> 12).ok_or_else(|| self.unimplemented())?;
        let value = self.read_main_ea(size)?;
        let dst_mode = ((self.opcode >> 6) & 7) as u8;
        let dst_reg = self.reg_hi() as u8;
        self.write_ea(dst_mode, dst_reg, size, value)?;
        self.set_nzvc(flags::logic(value, size));
        Ok(())
    }

    fn op_movea(&mut self) -> Result<(), M68kError> {
        let size = Size::from_move_bits(self.opcode >> 12).ok_or_else(|| self.unimplemented())?;
        let value = self.read_main_ea(size)?;
        let reg = self.reg_hi();
        self.a[reg] = size.sign_extend(value);
        Ok(())
    }

    fn op_moveq(&mut self) -> Result<(), M68kError> {
        let value = Size::Byte.sign_extend(self.opcode as u32);
        let reg = self.reg_hi();
        self.d[reg] = value;
        self.set_nzvc(flags::logic(value, Size::Long));
        Ok(())
    }

    fn op_move_from_sr(&mut self) -> Result<(), M68kError> {
        let operand = self.resolve_main_ea(Size::Word)?;
        self.write_operand(operand, Size::Word, self.sr as u32)
    }

    fn op_move_to_ccr(&mut self) -> Result<(), M68kError> {
        let value = self.read_main_ea(Size::Word)?;
        self.set_ccr(value as u16);
        Ok(())
    }

    fn op_move_to_sr(&mut self) -> Result<(), M68kError> {
        self.check_privilege("MOVE to SR");
        let value = self.read_main_ea(Size::Word)?;
        self.set_sr(value as u16 & flags::SR_MASK);
        Ok(())
    }

    fn op_move_usp(&mut self) -> Result<(), M68kError> {
        self.check_privilege("MOVE USP");
        let reg = self.reg_lo();
        if self.opcode & 0x0008 != 0 {
            self.a[reg] = self.user_sp();
        } else {
            let value = self.a[reg];
            self.set_user_sp(value);
        }
        Ok(())
    }

    fn op_logic_ccr(&mut self, op: Op) -> Result<(), M68kError> {
        let imm = self.fetch_word()? as u16 & flags::CCR_MASK;
        let ccr = self.sr & flags::CCR_MASK;
        let ccr = match op {
            Op::OriCcr => ccr | imm,
            Op::AndiCcr => ccr & imm,
            _ => ccr ^ imm,
        };
        self.set_ccr(ccr);
        Ok(())
    }

    fn op_logic_sr(&mut self, op: Op) -> Result<(), M68kError> {
        self.check_privilege("immediate to SR");
        let imm = self.fetch_word()? as u16;
        let sr = match op {
            Op::OriSr => self.sr | imm,
            Op::AndiSr => self.sr & imm,
            _ => self.sr ^ imm,
        };
        self.set_sr(sr & flags::SR_MASK);
        Ok(())
    }

    fn op_alu_immediate(&mut self, alu: Alu) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let src = self.fetch_immediate(size)?;
        let operand = self.resolve_main_ea(size)?;
        let dst = self.read_operand(operand, size)?;
        let (result, ccr) = self.alu(alu, src, dst, size);
        if alu != Alu::Cmp {
            self.write_operand(operand, size, result)?;
        }
        self.apply_alu_flags(alu, ccr);
        Ok(())
    }

    /// ADD/SUB/AND/OR/CMP with a data register, and EOR
    fn op_alu(&mut self, alu: Alu) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let reg = self.reg_hi();
        let to_ea = self.opcode & 0x0100 != 0 && alu != Alu::Cmp;

        if to_ea {
            let operand = self.resolve_main_ea(size)?;
            let dst = self.read_operand(operand, size)?;
            let src = size.truncate(self.d[reg]);
            let (result, ccr) = self.alu(alu, src, dst, size);
            self.write_operand(operand, size, result)?;
            self.apply_alu_flags(alu, ccr);
        } else {
            let src = self.read_main_ea(size)?;
            let dst = size.truncate(self.d[reg]);
            let (result, ccr) = self.alu(alu, src, dst, size);
            if alu != Alu::Cmp {
                self.write_operand(Operand::DataReg(reg), size, result)?;
            }
            self.apply_alu_flags(alu, ccr);
            if size == Size::Long {
                self.add_cycles(2);
            }
        }
        Ok(())
    }

    /// ADDA/SUBA/CMPA: word sources are sign-extended, the whole register takes part
    fn op_address_arith(&mut self, alu: Alu) -> Result<(), M68kError> {
        let size = if self.opcode & 0x0100 != 0 {
            Size::Long
        } else {
            Size::Word
        };
        let src = size.sign_extend(self.read_main_ea(size)?);
        let reg = self.reg_hi();
        match alu {
            Alu::Add => self.a[reg] = self.a[reg].wrapping_add(src),
            Alu::Sub => self.a[reg] = self.a[reg].wrapping_sub(src),
            _ => {
                let (_, ccr) = self.alu(Alu::Cmp, src, self.a[reg], Size::Long);
                self.set_nzvc(ccr);
            }
        }
        self.add_cycles(4);
        Ok(())
    }

    fn op_quick(&mut self, alu: Alu) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let data = match (self.opcode >> 9) & 7 {
            0 => 8,
            n => n as u32,
        };

        if self.ea_mode() == MODE_AN {
            // Address register destinations use all 32 bits and leave flags alone
            let reg = self.reg_lo();
            self.a[reg] = match alu {
                Alu::Add => self.a[reg].wrapping_add(data),
                _ => self.a[reg].wrapping_sub(data),
            };
            self.add_cycles(4);
            return Ok(());
        }

        let operand = self.resolve_main_ea(size)?;
        let dst = self.read_operand(operand, size)?;
        let (result, ccr) = self.alu(alu, data, dst, size);
        self.write_operand(operand, size, result)?;
        self.set_ccr(ccr);
        Ok(())
    }

    /// ADDX/SUBX, register or -(Ay),-(Ax) form
    fn op_extended(&mut self, alu: Alu) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let (rx, ry) = (self.reg_hi() as u8, self.reg_lo() as u8);
        let memory_form = self.opcode & 0x0008 != 0;

        let (src, dst, target) = if memory_form {
            let src = self.read_ea(MODE_PREDEC, ry, size)?;
            let target = self.resolve_ea(MODE_PREDEC, rx, size)?;
            let dst = self.read_operand(target, size)?;
            (src, dst, target)
        } else {
            let target = Operand::DataReg(rx as usize);
            (size.truncate(self.d[ry as usize]), size.truncate(self.d[rx as usize]), target)
        };

        let x = (self.sr & SR_X != 0) as u32;
        let result;
        let mut ccr = match alu {
            Alu::Add => {
                result = size.truncate(dst.wrapping_add(src).wrapping_add(x));
                flags::add(src, dst, result, size)
            }
            _ => {
                result = size.truncate(dst.wrapping_sub(src).wrapping_sub(x));
                flags::sub(src, dst, result, size)
            }
        };
        // Z is only ever cleared, so multi-precision chains test the whole value
        ccr &= !SR_Z;
        if result == 0 {
            ccr |= self.sr & SR_Z;
        }
        self.write_operand(target, size, result)?;
        self.set_ccr(ccr);
        Ok(())
    }

    fn op_cmpm(&mut self) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let (rx, ry) = (self.reg_hi() as u8, self.reg_lo() as u8);
        let src = self.read_ea(MODE_POSTINC, ry, size)?;
        let dst = self.read_ea(MODE_POSTINC, rx, size)?;
        let (_, ccr) = self.alu(Alu::Cmp, src, dst, size);
        self.set_nzvc(ccr);
        Ok(())
    }

    fn op_negx(&mut self) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let operand = self.resolve_main_ea(size)?;
        let dst = self.read_operand(operand, size)?;
        let x = (self.sr & SR_X != 0) as u32;
        let result = size.truncate(0u32.wrapping_sub(dst).wrapping_sub(x));
        let mut ccr = flags::sub(dst, 0, result, size) & !SR_Z;
        if result == 0 {
            ccr |= self.sr & SR_Z;
        }
        self.write_operand(operand, size, result)?;
        self.set_ccr(ccr);
        Ok(())
    }

    fn op_neg(&mut self) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let operand = self.resolve_main_ea(size)?;
        let dst = self.read_operand(operand, size)?;
        let (result, ccr) = self.alu(Alu::Sub, dst, 0, size);
        self.write_operand(operand, size, result)?;
        self.set_ccr(ccr);
        Ok(())
    }

    fn op_clr(&mut self) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let operand = self.resolve_main_ea(size)?;
        self.write_operand(operand, size, 0)?;
        self.set_nzvc(SR_Z);
        Ok(())
    }

    fn op_not(&mut self) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let operand = self.resolve_main_ea(size)?;
        let result = size.truncate(!self.read_operand(operand, size)?);
        self.write_operand(operand, size, result)?;
        self.set_nzvc(flags::logic(result, size));
        Ok(())
    }

    fn op_tst(&mut self) -> Result<(), M68kError> {
        let size = self.std_size()?;
        let value = self.read_main_ea(size)?;
        self.set_nzvc(flags::logic(value, size));
        Ok(())
    }

    fn op_ext(&mut self) -> Result<(), M68kError> {
        let reg = self.reg_lo();
        if self.opcode & 0x0040 != 0 {
            self.d[reg] = Size::Word.sign_extend(self.d[reg]);
            self.set_nzvc(flags::logic(self.d[reg], Size::Long));
        } else {
            let word = Size::Byte.sign_extend(self.d[reg]) & 0xFFFF;
            self.d[reg] = (self.d[reg] & 0xFFFF_0000) | word;
            self.set_nzvc(flags::logic(word, Size::Word));
        }
        Ok(())
    }

    fn op_swap(&mut self) -> Result<(), M68kError> {
        let reg = self.reg_lo();
        self.d[reg] = self.d[reg].rotate_left(16);
        self.set_nzvc(flags::logic(self.d[reg], Size::Long));
        Ok(())
    }

    fn op_exg(&mut self) -> Result<(), M68kError> {
        let (rx, ry) = (self.reg_hi(), self.reg_lo());
        match (self.opcode >> 3) & 0x1F {
            0x08 => self.d.swap(rx, ry),
            0x09 => self.a.swap(rx, ry),
            _ => std::mem::swap(&mut self.d[rx], &mut self.a[ry]),
        }
        self.add_cycles(2);
        Ok(())
    }

    fn op_mul(&mut self, signed: bool) -> Result<(), M68kError> {
        let src = self.read_main_ea(Size::Word)?;
        let reg = self.reg_hi();
        let dst = self.d[reg] & 0xFFFF;
        let result = if signed {
            (Size::Word.sign_extend(src) as i32).wrapping_mul(Size::Word.sign_extend(dst) as i32)
                as u32
        } else {
            src * dst
        };
        self.d[reg] = result;
        self.set_nzvc(flags::logic(result, Size::Long));
        self.add_cycles(34);
        Ok(())
    }

    fn op_div(&mut self, signed: bool) -> Result<(), M68kError> {
        let src = self.read_main_ea(Size::Word)?;
        if src == 0 {
            return Err(M68kError::DivideByZero { pc: self.instr_pc });
        }
        let reg = self.reg_hi();
        let dividend = self.d[reg];

        let (quotient, remainder, overflow) = if signed {
            let divisor = Size::Word.sign_extend(src) as i32 as i64;
            let dividend = dividend as i32 as i64;
            let q = dividend / divisor;
            let r = dividend % divisor;
            (q as u32, r as u32, !(-0x8000..=0x7FFF).contains(&q))
        } else {
            let q = dividend / src;
            (q, dividend % src, q > 0xFFFF)
        };

        if overflow {
            // Destination is left untouched
            self.sr |= SR_V;
            self.sr &= !SR_C;
        } else {
            self.d[reg] = ((remainder & 0xFFFF) << 16) | (quotient & 0xFFFF);
            self.set_nzvc(flags::logic(quotient, Size::Word));
        }
        self.add_cycles(if signed { 118 } else { 100 });
        Ok(())
    }

    fn op_lea(&mut self) -> Result<(), M68kError> {
        let (mode, reg) = (self.ea_mode(), self.ea_reg());
        let addr = self.control_address(mode, reg)?;
        let dst = self.reg_hi();
        self.a[dst] = addr;
        Ok(())
    }

    fn op_pea(&mut self) -> Result<(), M68kError> {
        let (mode, reg) = (self.ea_mode(), self.ea_reg());
        let addr = self.control_address(mode, reg)?;
        self.push_long(addr)
    }

    fn op_link(&mut self) -> Result<(), M68kError> {
        let reg = self.reg_lo();
        let disp = Size::Word.sign_extend(self.fetch_word()?);
        self.push_long(self.a[reg])?;
        self.a[reg] = self.a[7];
        self.a[7] = self.a[7].wrapping_add(disp);
        Ok(())
    }

    fn op_unlk(&mut self) -> Result<(), M68kError> {
        let reg = self.reg_lo();
        self.a[7] = self.a[reg];
        self.a[reg] = self.pop_long()?;
        Ok(())
    }

    fn op_movem_to_mem(&mut self) -> Result<(), M68kError> {
        let size = if self.opcode & 0x0040 != 0 {
            Size::Long
        } else {
            Size::Word
        };
        let mask = self.fetch_word()? as u16;
        let (mode, reg) = (self.ea_mode(), self.ea_reg());

        if mode == MODE_PREDEC {
            // Mask is reversed: bit 0 is A7, bit 15 is D0
            let r = reg as usize;
            let mut addr = self.a[r];
            for i in (0..16).rev() {
                if mask & (1 << (15 - i)) != 0 {
                    addr = addr.wrapping_sub(size.bytes());
                    let value = self.register(i);
                    self.write_mem(addr, value, size)?;
                }
            }
            self.a[r] = addr;
        } else {
            let mut addr = self.control_address(mode, reg)?;
            for i in 0..16 {
                if mask & (1 << i) != 0 {
                    let value = self.register(i);
                    self.write_mem(addr, value, size)?;
                    addr = addr.wrapping_add(size.bytes());
                }
            }
        }
        Ok(())
    }

    fn op_movem_from_mem(&mut self) -> Result<(), M68kError> {
        let size = if self.opcode & 0x0040 != 0 {
            Size::Long
        } else {
            Size::Word
        };
        let mask = self.fetch_word()? as u16;
        let (mode, reg) = (self.ea_mode(), self.ea_reg());

        let mut addr = if mode == MODE_POSTINC {
            self.a[reg as usize]
        } else {
            self.control_address(mode, reg)?
        };
        for i in 0..16 {
            if mask & (1 << i) != 0 {
                let value = size.sign_extend(self.read_mem(addr, size)?);
                self.set_register(i, value);
                addr = addr.wrapping_add(size.bytes());
            }
        }
        if mode == MODE_POSTINC {
            self.a[reg as usize] = addr;
        }
        self.add_cycles(4);
        Ok(())
    }

    /// D0-D7 then A0-A7
    fn register(&self, index: usize) -> u32 {
        if index < 8 {
            self.d[index]
        } else {
            self.a[index - 8]
        }
    }

    fn set_register(&mut self, index: usize, value: u32) {
        if index < 8 {
            self.d[index] = value;
        } else {
            self.a[index - 8] = value;
        }
    }
}
