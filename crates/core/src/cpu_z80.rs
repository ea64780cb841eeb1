//! Zilog Z80 CPU core implementation
//!
//! The Z80 extends the 8080 with additional registers and instructions.
//! This module provides a reusable Z80 implementation covering the documented
//! primary, CB, ED, DD/FD and DD/FD-CB opcode pages plus the undocumented
//! IXH/IXL/IYH/IYL register forms and SLL.
//!
//! A DD or FD prefix in front of an opcode that does not involve HL runs the
//! opcode unprefixed and costs four extra cycles. ED opcodes with no defined
//! meaning stop execution with [`Z80Error::UnimplementedOpcode`].

mod alu;
mod cb;
mod ed;
mod execute;

#[cfg(test)]
mod tests;

use crate::logging::{log, LogCategory, LogLevel};
use crate::trace::{NullTrace, TraceCpu, TraceEntry, TraceSink};

/// Memory interface trait for the Z80 CPU
pub trait MemoryZ80 {
    /// Read a byte from memory
    fn read(&self, addr: u16) -> u8;

    /// Write a byte to memory
    fn write(&mut self, addr: u16, val: u8);

    /// Read from I/O port
    fn io_read(&mut self, port: u8) -> u8 {
        let _ = port;
        0xFF
    }

    /// Write to I/O port
    fn io_write(&mut self, port: u8, val: u8) {
        let _ = (port, val);
    }
}

// Flag bit positions
pub const FLAG_S: u8 = 0x80;
pub const FLAG_Z: u8 = 0x40;
pub const FLAG_Y: u8 = 0x20;
pub const FLAG_H: u8 = 0x10;
pub const FLAG_X: u8 = 0x08;
pub const FLAG_PV: u8 = 0x04;
pub const FLAG_N: u8 = 0x02;
pub const FLAG_C: u8 = 0x01;

/// Fatal conditions raised while executing Z80 code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Z80Error {
    /// `prefix` is 0 for the primary page, otherwise 0xCB, 0xDD, 0xED or 0xFD
    #[error("unimplemented Z80 opcode {prefix:#04X} {opcode:#04X} at PC {pc:#06X}")]
    UnimplementedOpcode { prefix: u8, opcode: u8, pc: u16 },
}

/// Which register stands in for HL in the current instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Index {
    Hl,
    Ix,
    Iy,
}

/// Zilog Z80 CPU state
#[derive(Debug)]
pub struct CpuZ80<M: MemoryZ80> {
    /// Main registers
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    /// Shadow registers (Z80 specific)
    pub a_prime: u8,
    pub f_prime: u8,
    pub b_prime: u8,
    pub c_prime: u8,
    pub d_prime: u8,
    pub e_prime: u8,
    pub h_prime: u8,
    pub l_prime: u8,

    /// Index registers (Z80 specific)
    pub ix: u16,
    pub iy: u16,

    /// Special registers
    pub i: u8, // Interrupt vector
    pub r: u8, // Memory refresh

    /// Stack pointer
    pub sp: u16,
    /// Program counter
    pub pc: u16,

    /// Interrupt flags
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8, // Interrupt mode (0, 1, or 2)

    /// State
    pub halted: bool,
    pub cycles: u64,

    /// Memory interface
    pub memory: M,

    /// Set by EI; interrupts stay blocked until the following instruction ends
    ei_delay: bool,
    instr_pc: u16,
    extra_cycles: u32,
    trace: Box<dyn TraceSink>,
}

impl<M: MemoryZ80> CpuZ80<M> {
    /// Create a new Z80 CPU
    pub fn new(memory: M) -> Self {
        Self {
            a: 0xFF,
            f: 0xFF,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            a_prime: 0,
            f_prime: 0,
            b_prime: 0,
            c_prime: 0,
            d_prime: 0,
            e_prime: 0,
            h_prime: 0,
            l_prime: 0,
            ix: 0,
            iy: 0,
            i: 0,
            r: 0,
            sp: 0xFFFF,
            pc: 0,
            iff1: false,
            iff2: false,
            im: 0,
            halted: false,
            cycles: 0,
            memory,
            ei_delay: false,
            instr_pc: 0,
            extra_cycles: 0,
            trace: Box::new(NullTrace),
        }
    }

    /// Reset the CPU. Only PC, I, R, the interrupt state and (by
    /// convention) AF/SP are affected; the other registers keep their values.
    pub fn reset(&mut self) {
        self.a = 0xFF;
        self.f = 0xFF;
        self.sp = 0xFFFF;
        self.pc = 0;
        self.i = 0;
        self.r = 0;
        self.iff1 = false;
        self.iff2 = false;
        self.im = 0;
        self.halted = false;
        self.ei_delay = false;
        self.cycles = 0;
        log(LogCategory::Z80, LogLevel::Debug, || "Z80: reset".to_string());
    }

    pub fn set_trace(&mut self, trace: Box<dyn TraceSink>) {
        self.trace = trace;
    }

    pub fn trace(&self) -> &dyn TraceSink {
        self.trace.as_ref()
    }

    /// Execute one instruction
    pub fn step(&mut self) -> Result<u32, Z80Error> {
        self.ei_delay = false;
        self.instr_pc = self.pc;
        self.extra_cycles = 0;

        if self.halted {
            self.bump_r();
            self.cycles += 4;
            return Ok(4);
        }

        let opcode = self.fetch_opcode();
        self.trace.record(TraceEntry {
            cpu: TraceCpu::Z80,
            pc: self.instr_pc as u32,
            opcode: opcode as u32,
        });

        let cycles = self.execute(opcode, Index::Hl)? + self.extra_cycles;
        self.cycles += cycles as u64;
        Ok(cycles)
    }

    /// Raise the maskable interrupt line with `data` on the data bus.
    ///
    /// Returns the cycles spent entering the handler, or 0 when the interrupt
    /// is not accepted (IFF1 clear or the instruction after EI still pending).
    /// Mode 0 treats `data` as an RST instruction.
    pub fn interrupt(&mut self, data: u8) -> u32 {
        if !self.iff1 || self.ei_delay {
            return 0;
        }
        self.halted = false;
        self.iff1 = false;
        self.iff2 = false;
        self.bump_r();

        let cycles = match self.im {
            2 => {
                self.push_u16(self.pc);
                let vector = ((self.i as u16) << 8) | (data & 0xFE) as u16;
                self.pc = self.read_u16(vector);
                19
            }
            1 => {
                self.push_u16(self.pc);
                self.pc = 0x0038;
                13
            }
            _ => {
                self.push_u16(self.pc);
                self.pc = (data & 0x38) as u16;
                13
            }
        };
        let pc = self.pc;
        log(LogCategory::Interrupts, LogLevel::Trace, || {
            format!("Z80: INT mode {} -> {:04X}", self.im, pc)
        });
        self.cycles += cycles as u64;
        cycles
    }

    /// Non-maskable interrupt: always taken, jumps to 0x0066
    pub fn nmi(&mut self) -> u32 {
        self.halted = false;
        self.iff2 = self.iff1;
        self.iff1 = false;
        self.bump_r();
        self.push_u16(self.pc);
        self.pc = 0x0066;
        self.cycles += 11;
        11
    }

    /// Address of the instruction currently executing
    pub fn instruction_pc(&self) -> u16 {
        self.instr_pc
    }

    // Helper methods
    fn bump_r(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    /// M1 fetch: read the byte at PC and advance the refresh counter
    fn fetch_opcode(&mut self) -> u8 {
        self.bump_r();
        self.read_pc()
    }

    fn read_pc(&mut self) -> u8 {
        let val = self.memory.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        val
    }

    fn read_pc_u16(&mut self) -> u16 {
        let lo = self.read_pc() as u16;
        let hi = self.read_pc() as u16;
        (hi << 8) | lo
    }

    fn read_u16(&self, addr: u16) -> u16 {
        let lo = self.memory.read(addr) as u16;
        let hi = self.memory.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    fn write_u16(&mut self, addr: u16, val: u16) {
        self.memory.write(addr, val as u8);
        self.memory.write(addr.wrapping_add(1), (val >> 8) as u8);
    }

    fn push_u16(&mut self, val: u16) {
        self.sp = self.sp.wrapping_sub(1);
        self.memory.write(self.sp, (val >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        self.memory.write(self.sp, val as u8);
    }

    fn pop_u16(&mut self) -> u16 {
        let val = self.read_u16(self.sp);
        self.sp = self.sp.wrapping_add(2);
        val
    }

    // Register pair accessors
    pub fn af(&self) -> u16 {
        ((self.a as u16) << 8) | (self.f as u16)
    }

    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = val as u8;
    }

    pub fn bc(&self) -> u16 {
        ((self.b as u16) << 8) | (self.c as u16)
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn de(&self) -> u16 {
        ((self.d as u16) << 8) | (self.e as u16)
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn hl(&self) -> u16 {
        ((self.h as u16) << 8) | (self.l as u16)
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    /// HL, IX or IY depending on the active prefix
    fn index_reg(&self, idx: Index) -> u16 {
        match idx {
            Index::Hl => self.hl(),
            Index::Ix => self.ix,
            Index::Iy => self.iy,
        }
    }

    fn set_index_reg(&mut self, idx: Index, val: u16) {
        match idx {
            Index::Hl => self.set_hl(val),
            Index::Ix => self.ix = val,
            Index::Iy => self.iy = val,
        }
    }

    /// Address of the `(HL)` operand; under a prefix this fetches the
    /// displacement and yields `(IX+d)` / `(IY+d)`.
    fn hl_operand(&mut self, idx: Index) -> u16 {
        match idx {
            Index::Hl => self.hl(),
            _ => {
                let d = self.read_pc() as i8;
                self.extra_cycles += 8;
                self.index_reg(idx).wrapping_add(d as u16)
            }
        }
    }

    /// 8-bit register by its 3-bit code (6 is not a register). Under a
    /// prefix, codes 4 and 5 select the high and low halves of IX/IY.
    fn reg8(&self, code: u8, idx: Index) -> u8 {
        match code {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => (self.index_reg(idx) >> 8) as u8,
            5 => self.index_reg(idx) as u8,
            _ => self.a,
        }
    }

    fn set_reg8(&mut self, code: u8, idx: Index, val: u8) {
        match code {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => {
                let r = self.index_reg(idx);
                self.set_index_reg(idx, (r & 0x00FF) | ((val as u16) << 8));
            }
            5 => {
                let r = self.index_reg(idx);
                self.set_index_reg(idx, (r & 0xFF00) | val as u16);
            }
            _ => self.a = val,
        }
    }

    /// Register pair table used by LD/INC/DEC/ADD: BC, DE, HL, SP
    fn rp(&self, p: u8, idx: Index) -> u16 {
        match p {
            0 => self.bc(),
            1 => self.de(),
            2 => self.index_reg(idx),
            _ => self.sp,
        }
    }

    fn set_rp(&mut self, p: u8, idx: Index, val: u16) {
        match p {
            0 => self.set_bc(val),
            1 => self.set_de(val),
            2 => self.set_index_reg(idx, val),
            _ => self.sp = val,
        }
    }

    /// Register pair table used by PUSH/POP: BC, DE, HL, AF
    fn rp2(&self, p: u8, idx: Index) -> u16 {
        match p {
            3 => self.af(),
            _ => self.rp(p, idx),
        }
    }

    fn set_rp2(&mut self, p: u8, idx: Index, val: u16) {
        match p {
            3 => self.set_af(val),
            _ => self.set_rp(p, idx, val),
        }
    }

    // Flag operations
    pub fn flag(&self, flag: u8) -> bool {
        (self.f & flag) != 0
    }

    fn set_flag(&mut self, flag: u8, val: bool) {
        if val {
            self.f |= flag;
        } else {
            self.f &= !flag;
        }
    }

    /// Condition codes NZ Z NC C PO PE P M
    fn condition(&self, cc: u8) -> bool {
        match cc & 7 {
            0 => !self.flag(FLAG_Z),
            1 => self.flag(FLAG_Z),
            2 => !self.flag(FLAG_C),
            3 => self.flag(FLAG_C),
            4 => !self.flag(FLAG_PV),
            5 => self.flag(FLAG_PV),
            6 => !self.flag(FLAG_S),
            _ => self.flag(FLAG_S),
        }
    }

    fn unimplemented(&self, prefix: u8, opcode: u8) -> Z80Error {
        Z80Error::UnimplementedOpcode {
            prefix,
            opcode,
            pc: self.instr_pc,
        }
    }
}

impl<M: MemoryZ80> crate::Cpu for CpuZ80<M> {
    type Error = Z80Error;

    fn reset(&mut self) -> Result<(), Z80Error> {
        self.reset();
        Ok(())
    }

    fn step(&mut self) -> Result<u32, Z80Error> {
        self.step()
    }
}

/// Flat 64 KB memory with a 256-entry I/O space
#[derive(Debug, Clone)]
pub struct ArrayMemory {
    data: Vec<u8>,
    /// Last value written to each port
    pub ports: [u8; 256],
    /// Values returned by port reads
    pub inputs: [u8; 256],
}

impl ArrayMemory {
    pub fn new() -> Self {
        Self {
            data: vec![0; 0x10000],
            ports: [0; 256],
            inputs: [0xFF; 256],
        }
    }

    /// Copy a program into memory at `addr`
    pub fn load_program(&mut self, addr: u16, program: &[u8]) {
        for (i, &b) in program.iter().enumerate() {
            self.data[(addr as usize + i) & 0xFFFF] = b;
        }
    }
}

impl Default for ArrayMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryZ80 for ArrayMemory {
    fn read(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.data[addr as usize] = val;
    }

    fn io_read(&mut self, port: u8) -> u8 {
        self.inputs[port as usize]
    }

    fn io_write(&mut self, port: u8, val: u8) {
        self.ports[port as usize] = val;
    }
}
