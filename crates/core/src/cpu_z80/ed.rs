//! ED page: extended loads, 16-bit arithmetic, I/O, interrupt modes and the
//! block transfer/search/I/O instructions.

use super::alu::{sz_flags, szp_flags};
use super::{CpuZ80, Index, MemoryZ80, Z80Error, FLAG_C, FLAG_H, FLAG_N, FLAG_PV, FLAG_Z};

impl<M: MemoryZ80> CpuZ80<M> {
    pub(super) fn execute_ed(&mut self) -> Result<u32, Z80Error> {
        let opcode = self.fetch_opcode();
        let y = (opcode >> 3) & 7;
        let p = y >> 1;

        let cycles = match opcode {
            // IN r,(C); code 6 only sets flags
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let val = self.memory.io_read(self.c);
                self.in_flags(val);
                if y != 6 {
                    self.set_reg8(y, Index::Hl, val);
                }
                12
            }

            // OUT (C),r; code 6 outputs zero
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let val = if y == 6 { 0 } else { self.reg8(y, Index::Hl) };
                self.memory.io_write(self.c, val);
                12
            }

            // SBC HL,rr / ADC HL,rr
            0x42 | 0x52 | 0x62 | 0x72 => {
                let val = self.rp(p, Index::Hl);
                let result = self.sbc16(self.hl(), val);
                self.set_hl(result);
                15
            }
            0x4A | 0x5A | 0x6A | 0x7A => {
                let val = self.rp(p, Index::Hl);
                let result = self.adc16(self.hl(), val);
                self.set_hl(result);
                15
            }

            // LD (nn),rr / LD rr,(nn)
            0x43 | 0x53 | 0x63 | 0x73 => {
                let addr = self.read_pc_u16();
                self.write_u16(addr, self.rp(p, Index::Hl));
                20
            }
            0x4B | 0x5B | 0x6B | 0x7B => {
                let addr = self.read_pc_u16();
                let val = self.read_u16(addr);
                self.set_rp(p, Index::Hl, val);
                20
            }

            // NEG and its mirrors
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let a = self.a;
                self.a = self.sub8(0, a, false);
                8
            }

            // RETN / RETI (and mirrors); both restore IFF1 from IFF2
            0x45 | 0x4D | 0x55 | 0x5D | 0x65 | 0x6D | 0x75 | 0x7D => {
                self.iff1 = self.iff2;
                self.pc = self.pop_u16();
                14
            }

            // IM 0/1/2
            0x46 | 0x4E | 0x66 | 0x6E => {
                self.im = 0;
                8
            }
            0x56 | 0x76 => {
                self.im = 1;
                8
            }
            0x5E | 0x7E => {
                self.im = 2;
                8
            }

            // LD I,A / LD R,A / LD A,I / LD A,R
            0x47 => {
                self.i = self.a;
                9
            }
            0x4F => {
                self.r = self.a;
                9
            }
            0x57 | 0x5F => {
                self.a = if opcode == 0x57 { self.i } else { self.r };
                self.f = (self.f & FLAG_C) | sz_flags(self.a);
                self.set_flag(FLAG_PV, self.iff2);
                9
            }

            // RRD / RLD
            0x67 => {
                let addr = self.hl();
                let val = self.memory.read(addr);
                self.memory.write(addr, (self.a << 4) | (val >> 4));
                self.a = (self.a & 0xF0) | (val & 0x0F);
                self.f = (self.f & FLAG_C) | szp_flags(self.a);
                18
            }
            0x6F => {
                let addr = self.hl();
                let val = self.memory.read(addr);
                self.memory.write(addr, (val << 4) | (self.a & 0x0F));
                self.a = (self.a & 0xF0) | (val >> 4);
                self.f = (self.f & FLAG_C) | szp_flags(self.a);
                18
            }

            // LDI / LDD / LDIR / LDDR
            0xA0 | 0xA8 | 0xB0 | 0xB8 => {
                let step = if opcode & 0x08 == 0 { 1 } else { 0xFFFF };
                self.block_load(step);
                self.repeat_while(opcode & 0x10 != 0 && self.bc() != 0)
            }

            // CPI / CPD / CPIR / CPDR
            0xA1 | 0xA9 | 0xB1 | 0xB9 => {
                let step = if opcode & 0x08 == 0 { 1 } else { 0xFFFF };
                self.block_compare(step);
                let more = self.bc() != 0 && !self.flag(FLAG_Z);
                self.repeat_while(opcode & 0x10 != 0 && more)
            }

            // INI / IND / INIR / INDR
            0xA2 | 0xAA | 0xB2 | 0xBA => {
                let step = if opcode & 0x08 == 0 { 1 } else { 0xFFFF };
                let val = self.memory.io_read(self.c);
                self.memory.write(self.hl(), val);
                self.set_hl(self.hl().wrapping_add(step));
                self.b = self.b.wrapping_sub(1);
                self.block_io_flags();
                self.repeat_while(opcode & 0x10 != 0 && self.b != 0)
            }

            // OUTI / OUTD / OTIR / OTDR
            0xA3 | 0xAB | 0xB3 | 0xBB => {
                let step = if opcode & 0x08 == 0 { 1 } else { 0xFFFF };
                let val = self.memory.read(self.hl());
                self.b = self.b.wrapping_sub(1);
                self.memory.io_write(self.c, val);
                self.set_hl(self.hl().wrapping_add(step));
                self.block_io_flags();
                self.repeat_while(opcode & 0x10 != 0 && self.b != 0)
            }

            _ => return Err(self.unimplemented(0xED, opcode)),
        };
        Ok(cycles)
    }

    /// One LDI/LDD unit: (DE) <- (HL), step both pointers, BC -= 1
    fn block_load(&mut self, step: u16) {
        let val = self.memory.read(self.hl());
        self.memory.write(self.de(), val);
        self.set_hl(self.hl().wrapping_add(step));
        self.set_de(self.de().wrapping_add(step));
        self.set_bc(self.bc().wrapping_sub(1));

        self.f &= !(FLAG_H | FLAG_N | FLAG_PV);
        self.set_flag(FLAG_PV, self.bc() != 0);
    }

    /// One CPI/CPD unit: compare A with (HL), step HL, BC -= 1. Carry survives.
    fn block_compare(&mut self, step: u16) {
        let val = self.memory.read(self.hl());
        let carry = self.f & FLAG_C;
        let a = self.a;
        self.sub8(a, val, false);
        self.f = (self.f & !(FLAG_C | FLAG_PV)) | carry;
        self.set_hl(self.hl().wrapping_add(step));
        self.set_bc(self.bc().wrapping_sub(1));
        self.set_flag(FLAG_PV, self.bc() != 0);
    }

    fn block_io_flags(&mut self) {
        self.f = (self.f & FLAG_C) | sz_flags(self.b) | FLAG_N;
    }

    /// Repeating block forms rewind PC onto the ED prefix until done
    fn repeat_while(&mut self, repeat: bool) -> u32 {
        if repeat {
            self.pc = self.pc.wrapping_sub(2);
            21
        } else {
            16
        }
    }
}
