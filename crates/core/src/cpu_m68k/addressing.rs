//! Effective address resolution.
//!
//! Resolving an operand is effectful: it consumes extension words from the
//! instruction stream and applies the post-increment/pre-decrement of the
//! address register. Read-modify-write instructions therefore resolve once
//! and then read and write through the returned [`Operand`].

use super::{CpuM68k, M68kError, Memory68k, Size};

/// A resolved operand location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    DataReg(usize),
    AddrReg(usize),
    Memory(u32),
    /// Program-space memory (PC-relative); readable only
    Program(u32),
    Immediate(u32),
}

pub(super) const MODE_DN: u8 = 0;
pub(super) const MODE_AN: u8 = 1;
pub(super) const MODE_POSTINC: u8 = 3;
pub(super) const MODE_PREDEC: u8 = 4;

impl<M: Memory68k> CpuM68k<M> {
    /// Byte steps on A7 move by 2 to keep the stack word aligned
    fn step_for(reg: usize, size: Size) -> u32 {
        if reg == 7 && size == Size::Byte {
            2
        } else {
            size.bytes()
        }
    }

    fn invalid_mode(&self, mode: u8, reg: u8) -> M68kError {
        M68kError::InvalidAddressingMode {
            opcode: self.opcode,
            mode,
            reg,
            pc: self.instr_pc,
        }
    }

    /// Brief extension word: D/A, register, W/L, 8-bit displacement
    fn indexed(&mut self, base: u32) -> Result<u32, M68kError> {
        let ext = self.fetch_word()?;
        let reg = ((ext >> 12) & 7) as usize;
        let index = if ext & 0x8000 != 0 { self.a[reg] } else { self.d[reg] };
        let index = if ext & 0x0800 != 0 {
            index
        } else {
            Size::Word.sign_extend(index)
        };
        let disp = Size::Byte.sign_extend(ext);
        self.add_cycles(2);
        Ok(base.wrapping_add(index).wrapping_add(disp))
    }

    /// Decode a mode/register pair, consuming extension words.
    pub fn resolve_ea(&mut self, mode: u8, reg: u8, size: Size) -> Result<Operand, M68kError> {
        let r = (reg & 7) as usize;
        let operand = match mode & 7 {
            0 => Operand::DataReg(r),
            1 => Operand::AddrReg(r),
            2 => Operand::Memory(self.a[r]),
            3 => {
                let addr = self.a[r];
                self.a[r] = addr.wrapping_add(Self::step_for(r, size));
                Operand::Memory(addr)
            }
            4 => {
                self.a[r] = self.a[r].wrapping_sub(Self::step_for(r, size));
                self.add_cycles(2);
                Operand::Memory(self.a[r])
            }
            5 => {
                let disp = Size::Word.sign_extend(self.fetch_word()?);
                Operand::Memory(self.a[r].wrapping_add(disp))
            }
            6 => {
                let base = self.a[r];
                Operand::Memory(self.indexed(base)?)
            }
            _ => match reg & 7 {
                0 => Operand::Memory(Size::Word.sign_extend(self.fetch_word()?)),
                1 => Operand::Memory(self.fetch_long()?),
                2 => {
                    let base = self.pc;
                    let disp = Size::Word.sign_extend(self.fetch_word()?);
                    Operand::Program(base.wrapping_add(disp))
                }
                3 => {
                    let base = self.pc;
                    Operand::Program(self.indexed(base)?)
                }
                4 => {
                    let value = match size {
                        Size::Byte => self.fetch_word()? & 0xFF,
                        Size::Word => self.fetch_word()?,
                        Size::Long => self.fetch_long()?,
                    };
                    Operand::Immediate(value)
                }
                _ => return Err(self.invalid_mode(mode, reg)),
            },
        };
        Ok(operand)
    }

    pub(crate) fn read_operand(&mut self, operand: Operand, size: Size) -> Result<u32, M68kError> {
        match operand {
            Operand::DataReg(r) => Ok(size.truncate(self.d[r])),
            Operand::AddrReg(r) => Ok(size.truncate(self.a[r])),
            Operand::Memory(addr) | Operand::Program(addr) => self.read_mem(addr, size),
            Operand::Immediate(value) => Ok(size.truncate(value)),
        }
    }

    pub(crate) fn write_operand(
        &mut self,
        operand: Operand,
        size: Size,
        value: u32,
    ) -> Result<(), M68kError> {
        match operand {
            Operand::DataReg(r) => {
                let mask = size.mask();
                self.d[r] = (self.d[r] & !mask) | (value & mask);
                Ok(())
            }
            Operand::AddrReg(r) => {
                self.a[r] = match size {
                    Size::Byte => (self.a[r] & !0xFF) | (value & 0xFF),
                    Size::Word => Size::Word.sign_extend(value),
                    Size::Long => value,
                };
                Ok(())
            }
            Operand::Memory(addr) => self.write_mem(addr, value, size),
            Operand::Program(_) | Operand::Immediate(_) => Err(self.invalid_mode(
                ((self.opcode >> 3) & 7) as u8,
                (self.opcode & 7) as u8,
            )),
        }
    }

    /// Resolve and read a source operand
    pub fn read_ea(&mut self, mode: u8, reg: u8, size: Size) -> Result<u32, M68kError> {
        let operand = self.resolve_ea(mode, reg, size)?;
        self.read_operand(operand, size)
    }

    /// Resolve and write a destination operand
    pub fn write_ea(&mut self, mode: u8, reg: u8, size: Size, value: u32) -> Result<(), M68kError> {
        let operand = self.resolve_ea(mode, reg, size)?;
        match operand {
            Operand::Program(_) | Operand::Immediate(_) => Err(self.invalid_mode(mode, reg)),
            _ => self.write_operand(operand, size, value),
        }
    }

    /// Address computed by a control addressing mode (LEA, JMP, PEA, ...)
    pub(crate) fn control_address(&mut self, mode: u8, reg: u8) -> Result<u32, M68kError> {
        match self.resolve_ea(mode, reg, Size::Long)? {
            Operand::Memory(addr) | Operand::Program(addr) => Ok(addr),
            _ => Err(self.invalid_mode(mode, reg)),
        }
    }
}
