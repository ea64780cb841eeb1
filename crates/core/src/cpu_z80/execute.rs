//! Primary opcode page, shared by the DD/FD prefixes.

use super::alu::szp_flags;
use super::{CpuZ80, Index, MemoryZ80, Z80Error, FLAG_C, FLAG_H, FLAG_N, FLAG_X, FLAG_Y};

impl<M: MemoryZ80> CpuZ80<M> {
    /// Execute `opcode` with HL replaced by the register `idx` names.
    ///
    /// Returns the cycle count of the unprefixed form; prefix and
    /// displacement costs are added on top.
    pub(super) fn execute(&mut self, opcode: u8, idx: Index) -> Result<u32, Z80Error> {
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;
        let p = y >> 1;

        let cycles = match opcode {
            // NOP
            0x00 => 4,

            // EX AF,AF'
            0x08 => {
                std::mem::swap(&mut self.a, &mut self.a_prime);
                std::mem::swap(&mut self.f, &mut self.f_prime);
                4
            }

            // DJNZ d
            0x10 => {
                let disp = self.read_pc() as i8;
                self.b = self.b.wrapping_sub(1);
                if self.b != 0 {
                    self.pc = self.pc.wrapping_add(disp as u16);
                    13
                } else {
                    8
                }
            }

            // JR d
            0x18 => {
                let disp = self.read_pc() as i8;
                self.pc = self.pc.wrapping_add(disp as u16);
                12
            }

            // JR NZ/Z/NC/C,d
            0x20 | 0x28 | 0x30 | 0x38 => {
                let disp = self.read_pc() as i8;
                if self.condition(y - 4) {
                    self.pc = self.pc.wrapping_add(disp as u16);
                    12
                } else {
                    7
                }
            }

            // LD rr,nn
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.read_pc_u16();
                self.set_rp(p, idx, val);
                10
            }

            // ADD HL,rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                let hl = self.index_reg(idx);
                let val = self.rp(p, idx);
                let result = self.add16(hl, val);
                self.set_index_reg(idx, result);
                11
            }

            // LD (BC),A / LD (DE),A
            0x02 => {
                self.memory.write(self.bc(), self.a);
                7
            }
            0x12 => {
                self.memory.write(self.de(), self.a);
                7
            }

            // LD A,(BC) / LD A,(DE)
            0x0A => {
                self.a = self.memory.read(self.bc());
                7
            }
            0x1A => {
                self.a = self.memory.read(self.de());
                7
            }

            // LD (nn),HL / LD HL,(nn)
            0x22 => {
                let addr = self.read_pc_u16();
                self.write_u16(addr, self.index_reg(idx));
                16
            }
            0x2A => {
                let addr = self.read_pc_u16();
                let val = self.read_u16(addr);
                self.set_index_reg(idx, val);
                16
            }

            // LD (nn),A / LD A,(nn)
            0x32 => {
                let addr = self.read_pc_u16();
                self.memory.write(addr, self.a);
                13
            }
            0x3A => {
                let addr = self.read_pc_u16();
                self.a = self.memory.read(addr);
                13
            }

            // INC rr / DEC rr
            0x03 | 0x13 | 0x23 | 0x33 => {
                let val = self.rp(p, idx).wrapping_add(1);
                self.set_rp(p, idx, val);
                6
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let val = self.rp(p, idx).wrapping_sub(1);
                self.set_rp(p, idx, val);
                6
            }

            // INC (HL) / DEC (HL)
            0x34 => {
                let addr = self.hl_operand(idx);
                let val = self.memory.read(addr);
                let result = self.inc8(val);
                self.memory.write(addr, result);
                11
            }
            0x35 => {
                let addr = self.hl_operand(idx);
                let val = self.memory.read(addr);
                let result = self.dec8(val);
                self.memory.write(addr, result);
                11
            }

            // INC r / DEC r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => {
                let val = self.reg8(y, idx);
                let result = self.inc8(val);
                self.set_reg8(y, idx, result);
                4
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => {
                let val = self.reg8(y, idx);
                let result = self.dec8(val);
                self.set_reg8(y, idx, result);
                4
            }

            // LD (HL),n; the indexed form totals 19
            0x36 => {
                let addr = self.hl_operand(idx);
                let val = self.read_pc();
                self.memory.write(addr, val);
                if idx == Index::Hl {
                    10
                } else {
                    7
                }
            }

            // LD r,n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let val = self.read_pc();
                self.set_reg8(y, idx, val);
                7
            }

            // RLCA / RRCA / RLA / RRA
            0x07 | 0x0F | 0x17 | 0x1F => {
                self.rotate_a(y);
                4
            }

            // DAA
            0x27 => {
                self.daa();
                4
            }

            // CPL
            0x2F => {
                self.a = !self.a;
                self.f = (self.f & !(FLAG_Y | FLAG_X))
                    | FLAG_H
                    | FLAG_N
                    | (self.a & (FLAG_Y | FLAG_X));
                4
            }

            // SCF
            0x37 => {
                self.f = (self.f & !(FLAG_H | FLAG_N | FLAG_Y | FLAG_X))
                    | FLAG_C
                    | (self.a & (FLAG_Y | FLAG_X));
                4
            }

            // CCF
            0x3F => {
                let carry = self.flag(FLAG_C);
                self.f = (self.f & !(FLAG_H | FLAG_N | FLAG_C | FLAG_Y | FLAG_X))
                    | (self.a & (FLAG_Y | FLAG_X));
                self.set_flag(FLAG_H, carry);
                self.set_flag(FLAG_C, !carry);
                4
            }

            // HALT
            0x76 => {
                self.halted = true;
                4
            }

            // LD r,(HL) / LD (HL),r: the register side is never IXH/IXL
            0x40..=0x7F if z == 6 => {
                let addr = self.hl_operand(idx);
                let val = self.memory.read(addr);
                self.set_reg8(y, Index::Hl, val);
                7
            }
            0x70..=0x77 => {
                let addr = self.hl_operand(idx);
                self.memory.write(addr, self.reg8(z, Index::Hl));
                7
            }

            // LD r,r'
            0x40..=0x7F => {
                let val = self.reg8(z, idx);
                self.set_reg8(y, idx, val);
                4
            }

            // ALU A,(HL)
            0x80..=0xBF if z == 6 => {
                let addr = self.hl_operand(idx);
                let val = self.memory.read(addr);
                self.alu_a(y, val);
                7
            }

            // ALU A,r
            0x80..=0xBF => {
                let val = self.reg8(z, idx);
                self.alu_a(y, val);
                4
            }

            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition(y) {
                    self.pc = self.pop_u16();
                    11
                } else {
                    5
                }
            }

            // POP rr
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let val = self.pop_u16();
                self.set_rp2(p, idx, val);
                10
            }

            // RET
            0xC9 => {
                self.pc = self.pop_u16();
                10
            }

            // EXX
            0xD9 => {
                std::mem::swap(&mut self.b, &mut self.b_prime);
                std::mem::swap(&mut self.c, &mut self.c_prime);
                std::mem::swap(&mut self.d, &mut self.d_prime);
                std::mem::swap(&mut self.e, &mut self.e_prime);
                std::mem::swap(&mut self.h, &mut self.h_prime);
                std::mem::swap(&mut self.l, &mut self.l_prime);
                4
            }

            // JP (HL)
            0xE9 => {
                self.pc = self.index_reg(idx);
                4
            }

            // LD SP,HL
            0xF9 => {
                self.sp = self.index_reg(idx);
                6
            }

            // JP cc,nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let addr = self.read_pc_u16();
                if self.condition(y) {
                    self.pc = addr;
                }
                10
            }

            // JP nn
            0xC3 => {
                self.pc = self.read_pc_u16();
                10
            }

            // OUT (n),A / IN A,(n)
            0xD3 => {
                let port = self.read_pc();
                self.memory.io_write(port, self.a);
                11
            }
            0xDB => {
                let port = self.read_pc();
                self.a = self.memory.io_read(port);
                11
            }

            // EX (SP),HL
            0xE3 => {
                let val = self.read_u16(self.sp);
                self.write_u16(self.sp, self.index_reg(idx));
                self.set_index_reg(idx, val);
                19
            }

            // EX DE,HL is not affected by a prefix
            0xEB => {
                let de = self.de();
                let hl = self.hl();
                self.set_de(hl);
                self.set_hl(de);
                4
            }

            // DI / EI
            0xF3 => {
                self.iff1 = false;
                self.iff2 = false;
                4
            }
            0xFB => {
                self.iff1 = true;
                self.iff2 = true;
                self.ei_delay = true;
                4
            }

            // CALL cc,nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let addr = self.read_pc_u16();
                if self.condition(y) {
                    self.push_u16(self.pc);
                    self.pc = addr;
                    17
                } else {
                    10
                }
            }

            // PUSH rr
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                self.push_u16(self.rp2(p, idx));
                11
            }

            // CALL nn
            0xCD => {
                let addr = self.read_pc_u16();
                self.push_u16(self.pc);
                self.pc = addr;
                17
            }

            // ALU A,n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let val = self.read_pc();
                self.alu_a(y, val);
                7
            }

            // RST p
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.push_u16(self.pc);
                self.pc = (y as u16) * 8;
                11
            }

            // Prefixes
            0xCB => match idx {
                Index::Hl => self.execute_cb()?,
                _ => self.execute_index_cb(idx)?,
            },
            // ED ignores a DD/FD in front of it
            0xED => self.execute_ed()?,
            0xDD => self.execute_prefixed(Index::Ix)?,
            0xFD => self.execute_prefixed(Index::Iy)?,
        };
        Ok(cycles)
    }

    /// DD/FD: fetch the next opcode and run it with IX/IY in place of HL.
    ///
    /// When another DD/FD follows, this prefix is spent as a 4-cycle NOP and
    /// PC stays on the new prefix, so chains never nest.
    fn execute_prefixed(&mut self, idx: Index) -> Result<u32, Z80Error> {
        if matches!(self.memory.read(self.pc), 0xDD | 0xFD) {
            return Ok(4);
        }
        let opcode = self.fetch_opcode();
        Ok(self.execute(opcode, idx)? + 4)
    }

    /// IN r,(C) style flag update
    pub(super) fn in_flags(&mut self, val: u8) {
        self.f = (self.f & FLAG_C) | szp_flags(val);
    }
}
