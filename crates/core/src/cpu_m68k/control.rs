//! Program control: branches, subroutine calls and returns.

use super::decode::Op;
use super::flags::{self, CCR_MASK, SR_MASK};
use super::{CpuM68k, M68kError, Memory68k, Size};

impl<M: Memory68k> CpuM68k<M> {
    fn condition_field(&self) -> u8 {
        ((self.opcode >> 8) & 0xF) as u8
    }

    pub(super) fn op_branch(&mut self, op: Op) -> Result<(), M68kError> {
        // Displacements are relative to the word after the opcode
        let base = self.pc;
        let disp = match self.opcode & 0xFF {
            0x00 => Size::Word.sign_extend(self.fetch_word()?),
            0xFF => return Err(self.unsupported("32-bit branch displacement")),
            byte => Size::Byte.sign_extend(byte as u32),
        };
        let target = base.wrapping_add(disp);

        match op {
            Op::Bsr => {
                self.push_long(self.pc)?;
                self.pc = target;
            }
            Op::Bra => self.pc = target,
            _ => {
                if flags::condition(self.sr, self.condition_field()) {
                    self.pc = target;
                    self.add_cycles(2);
                }
            }
        }
        Ok(())
    }

    pub(super) fn op_dbcc(&mut self) -> Result<(), M68kError> {
        let base = self.pc;
        let disp = Size::Word.sign_extend(self.fetch_word()?);
        if flags::condition(self.sr, self.condition_field()) {
            return Ok(());
        }

        let reg = self.reg_lo();
        let counter = (self.d[reg] as u16).wrapping_sub(1);
        self.d[reg] = (self.d[reg] & 0xFFFF_0000) | counter as u32;
        if counter != 0xFFFF {
            self.pc = base.wrapping_add(disp);
            self.add_cycles(2);
        } else {
            self.add_cycles(4);
        }
        Ok(())
    }

    pub(super) fn op_scc(&mut self) -> Result<(), M68kError> {
        let value = if flags::condition(self.sr, self.condition_field()) {
            0xFF
        } else {
            0x00
        };
        let operand = self.resolve_main_ea(Size::Byte)?;
        self.write_operand(operand, Size::Byte, value)
    }

    pub(super) fn op_jmp(&mut self) -> Result<(), M68kError> {
        let (mode, reg) = (((self.opcode >> 3) & 7) as u8, (self.opcode & 7) as u8);
        self.pc = self.control_address(mode, reg)?;
        Ok(())
    }

    pub(super) fn op_jsr(&mut self) -> Result<(), M68kError> {
        let (mode, reg) = (((self.opcode >> 3) & 7) as u8, (self.opcode & 7) as u8);
        let target = self.control_address(mode, reg)?;
        // PC now points past any extension words: that is the return address
        self.push_long(self.pc)?;
        self.pc = target;
        Ok(())
    }

    pub(super) fn op_rts(&mut self) -> Result<(), M68kError> {
        self.pc = self.pop_long()?;
        Ok(())
    }

    pub(super) fn op_rtr(&mut self) -> Result<(), M68kError> {
        let ccr = self.pop_word()? as u16;
        self.set_ccr(ccr & CCR_MASK);
        self.pc = self.pop_long()?;
        Ok(())
    }

    pub(super) fn op_rte(&mut self) -> Result<(), M68kError> {
        self.check_privilege("RTE");
        let sr = self.pop_word()? as u16;
        let pc = self.pop_long()?;
        self.set_sr(sr & SR_MASK);
        self.pc = pc;
        Ok(())
    }
}
