//! CB page: rotates, shifts and single-bit operations.

use super::{CpuZ80, Index, MemoryZ80, Z80Error};

impl<M: MemoryZ80> CpuZ80<M> {
    pub(super) fn execute_cb(&mut self) -> Result<u32, Z80Error> {
        let opcode = self.fetch_opcode();
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;

        if z == 6 {
            let addr = self.hl();
            let val = self.memory.read(addr);
            return Ok(match x {
                1 => {
                    self.bit(y, val);
                    12
                }
                _ => {
                    let result = self.bit_op(x, y, val);
                    self.memory.write(addr, result);
                    15
                }
            });
        }

        let val = self.reg8(z, Index::Hl);
        if x == 1 {
            self.bit(y, val);
        } else {
            let result = self.bit_op(x, y, val);
            self.set_reg8(z, Index::Hl, result);
        }
        Ok(8)
    }

    /// DD CB d op / FD CB d op. The displacement precedes the opcode, and
    /// every form except BIT also copies the result into register `z` when
    /// `z` is not 6.
    pub(super) fn execute_index_cb(&mut self, idx: Index) -> Result<u32, Z80Error> {
        let d = self.read_pc() as i8;
        let opcode = self.read_pc();
        let addr = self.index_reg(idx).wrapping_add(d as u16);
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;

        let val = self.memory.read(addr);
        if x == 1 {
            self.bit(y, val);
            return Ok(16);
        }

        let result = self.bit_op(x, y, val);
        self.memory.write(addr, result);
        if z != 6 {
            self.set_reg8(z, Index::Hl, result);
        }
        Ok(19)
    }

    /// Rotate/shift (x = 0), RES (x = 2) or SET (x = 3)
    fn bit_op(&mut self, x: u8, y: u8, val: u8) -> u8 {
        match x {
            0 => self.rotate(y, val),
            2 => val & !(1 << y),
            _ => val | (1 << y),
        }
    }
}
