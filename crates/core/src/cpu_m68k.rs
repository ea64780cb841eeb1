//! Motorola 68000 CPU core implementation
//!
//! This module provides a reusable 68000 implementation. A system plugs in its
//! address space by implementing [`Memory68k`]; the CPU owns that memory object
//! the same way the other cores in this crate do.
//!
//! Instructions are dispatched through a 65536-entry table built once from the
//! declarative patterns in `decode`. Opcodes that decode to nothing, and the
//! instruction families this core does not carry (BCD arithmetic, MOVEP, CHK,
//! TRAP, STOP, line A/F emulators...), stop execution with an error that names
//! the opcode and the program counter.

mod addressing;
mod control;
mod decode;
mod execute;
pub mod flags;
mod shift;

#[cfg(test)]
mod tests;

use crate::logging::{log, LogCategory, LogLevel};
use crate::trace::{NullTrace, TraceCpu, TraceEntry, TraceSink};

pub use addressing::Operand;
pub use flags::{SR_C, SR_INT_MASK, SR_MASK, SR_N, SR_S, SR_T, SR_V, SR_X, SR_Z};

/// Operand size of a 68000 instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
    Byte,
    Word,
    Long,
}

impl Size {
    pub fn bytes(self) -> u32 {
        match self {
            Size::Byte => 1,
            Size::Word => 2,
            Size::Long => 4,
        }
    }

    pub fn mask(self) -> u32 {
        match self {
            Size::Byte => 0xFF,
            Size::Word => 0xFFFF,
            Size::Long => 0xFFFF_FFFF,
        }
    }

    pub fn msb(self) -> u32 {
        match self {
            Size::Byte => 0x80,
            Size::Word => 0x8000,
            Size::Long => 0x8000_0000,
        }
    }

    pub fn truncate(self, value: u32) -> u32 {
        value & self.mask()
    }

    pub fn sign_extend(self, value: u32) -> u32 {
        match self {
            Size::Byte => value as u8 as i8 as i32 as u32,
            Size::Word => value as u16 as i16 as i32 as u32,
            Size::Long => value,
        }
    }

    pub fn is_negative(self, value: u32) -> bool {
        value & self.msb() != 0
    }

    /// Standard size field (bits 7-6): 00 byte, 01 word, 10 long
    pub fn from_std_bits(bits: u16) -> Option<Size> {
        match bits & 3 {
            0 => Some(Size::Byte),
            1 => Some(Size::Word),
            2 => Some(Size::Long),
            _ => None,
        }
    }

    /// MOVE size field (bits 13-12): 01 byte, 11 word, 10 long
    pub fn from_move_bits(bits: u16) -> Option<Size> {
        match bits & 3 {
            1 => Some(Size::Byte),
            3 => Some(Size::Word),
            2 => Some(Size::Long),
            _ => None,
        }
    }
}

/// Failure reported by a [`Memory68k`] implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("unmapped address {address:#08X} (write: {write})")]
    Unmapped { address: u32, write: bool },
    #[error("VDP: {0}")]
    Vdp(String),
}

/// Fatal conditions raised while executing 68000 code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum M68kError {
    #[error("unimplemented opcode {opcode:#06X} at PC {pc:#08X}")]
    UnimplementedOpcode { opcode: u16, pc: u32 },
    #[error("invalid addressing mode {mode}/{reg} in opcode {opcode:#06X} at PC {pc:#08X}")]
    InvalidAddressingMode {
        opcode: u16,
        mode: u8,
        reg: u8,
        pc: u32,
    },
    #[error("{what} is not supported (opcode {opcode:#06X} at PC {pc:#08X})")]
    Unsupported {
        what: &'static str,
        opcode: u16,
        pc: u32,
    },
    #[error("division by zero at PC {pc:#08X}")]
    DivideByZero { pc: u32 },
    #[error("bus error at PC {pc:#08X}: {source}")]
    Bus { pc: u32, source: BusError },
}

/// Memory interface trait for the 68000 CPU
///
/// Addresses are passed through unmasked; the implementation decides how many
/// address lines it decodes. Reads take `&mut self` because some device
/// registers change state when read.
pub trait Memory68k {
    /// Read a byte, word or long (big-endian) at `addr`
    fn read(&mut self, addr: u32, size: Size) -> Result<u32, BusError>;

    /// Write the low `size` bytes of `value` (big-endian) at `addr`
    fn write(&mut self, addr: u32, value: u32, size: Size) -> Result<(), BusError>;
}

/// Motorola 68000 CPU state and execution engine
#[derive(Debug)]
pub struct CpuM68k<M: Memory68k> {
    /// Data registers D0-D7
    pub d: [u32; 8],
    /// Address registers A0-A7; A7 is the stack pointer of the current mode
    pub a: [u32; 8],
    pub pc: u32,
    /// Status register (T - S - - I2 I1 I0 - - - X N Z V C)
    pub sr: u16,
    /// Banked supervisor stack pointer, valid while in user mode
    pub ssp: u32,
    /// Banked user stack pointer, valid while in supervisor mode
    pub usp: u32,
    /// Total cycles executed
    pub cycles: u64,
    /// Memory interface
    pub memory: M,

    instr_pc: u32,
    opcode: u16,
    instr_cycles: u32,
    trace: Box<dyn TraceSink>,
}

impl<M: Memory68k> CpuM68k<M> {
    /// Create a new 68000 CPU with the given memory interface
    pub fn new(memory: M) -> Self {
        Self {
            d: [0; 8],
            a: [0; 8],
            pc: 0,
            sr: SR_S | SR_INT_MASK,
            ssp: 0,
            usp: 0,
            cycles: 0,
            memory,
            instr_pc: 0,
            opcode: 0,
            instr_cycles: 0,
            trace: Box::new(NullTrace),
        }
    }

    /// Power-on sequence: load SSP and PC from the vector table at 0 and 4.
    ///
    /// Every other register is filled with all ones and SR starts as 0x7FFF
    /// (supervisor, interrupts masked).
    pub fn initialize(&mut self) -> Result<(), M68kError> {
        self.d = [0xFFFF_FFFF; 8];
        self.a = [0xFFFF_FFFF; 8];
        self.sr = 0x7FFF;
        self.usp = 0;
        self.cycles = 0;
        self.instr_pc = 0;

        let ssp = self.read_mem(0, Size::Long)?;
        let pc = self.read_mem(4, Size::Long)?;
        self.ssp = ssp;
        self.a[7] = ssp;
        self.pc = pc;

        log(LogCategory::M68k, LogLevel::Info, || {
            format!("68000: reset, SSP={:08X} PC={:08X}", ssp, pc)
        });
        Ok(())
    }

    /// Install a trace sink that receives every executed opcode
    pub fn set_trace(&mut self, trace: Box<dyn TraceSink>) {
        self.trace = trace;
    }

    pub fn trace(&self) -> &dyn TraceSink {
        self.trace.as_ref()
    }

    pub fn is_supervisor(&self) -> bool {
        self.sr & SR_S != 0
    }

    /// Current interrupt priority mask (0-7)
    pub fn interrupt_mask(&self) -> u8 {
        ((self.sr & SR_INT_MASK) >> 8) as u8
    }

    pub fn supervisor_sp(&self) -> u32 {
        if self.is_supervisor() {
            self.a[7]
        } else {
            self.ssp
        }
    }

    pub fn user_sp(&self) -> u32 {
        if self.is_supervisor() {
            self.usp
        } else {
            self.a[7]
        }
    }

    pub(crate) fn set_user_sp(&mut self, value: u32) {
        if self.is_supervisor() {
            self.usp = value;
        } else {
            self.a[7] = value;
        }
    }

    /// Replace SR, swapping the live stack pointer when the S bit changes.
    pub fn set_sr(&mut self, value: u16) {
        let was_supervisor = self.is_supervisor();
        let now_supervisor = value & SR_S != 0;
        if was_supervisor && !now_supervisor {
            self.ssp = self.a[7];
            self.a[7] = self.usp;
        } else if !was_supervisor && now_supervisor {
            self.usp = self.a[7];
            self.a[7] = self.ssp;
        }
        self.sr = value;
    }

    pub fn flag(&self, mask: u16) -> bool {
        self.sr & mask != 0
    }

    pub(crate) fn set_flag(&mut self, mask: u16, on: bool) {
        if on {
            self.sr |= mask;
        } else {
            self.sr &= !mask;
        }
    }

    /// Replace the X N Z V C bits with `ccr`
    pub(crate) fn set_ccr(&mut self, ccr: u16) {
        self.sr = (self.sr & !flags::CCR_MASK) | (ccr & flags::CCR_MASK);
    }

    /// Replace N Z V C, leaving X alone
    pub(crate) fn set_nzvc(&mut self, ccr: u16) {
        let keep = self.sr & !(SR_N | SR_Z | SR_V | SR_C);
        self.sr = keep | (ccr & (SR_N | SR_Z | SR_V | SR_C));
    }

    /// Execute one instruction and return the cycles it took
    pub fn step(&mut self) -> Result<u32, M68kError> {
        self.instr_pc = self.pc;
        self.instr_cycles = 0;

        let opcode = self.fetch_word()? as u16;
        self.opcode = opcode;
        self.trace.record(TraceEntry {
            cpu: TraceCpu::M68k,
            pc: self.instr_pc,
            opcode: opcode as u32,
        });

        self.execute(decode::lookup(opcode))?;

        let cycles = self.instr_cycles.max(4);
        self.cycles += cycles as u64;
        Ok(cycles)
    }

    /// Take an autovectored interrupt.
    ///
    /// Pushes the return PC and the pre-exception SR onto the supervisor
    /// stack, raises the mask to `level` and jumps through vector `vector`.
    pub fn interrupt(&mut self, level: u8, vector: u8) -> Result<u32, M68kError> {
        self.instr_pc = self.pc;
        self.instr_cycles = 0;

        let old_sr = self.sr;
        self.set_sr((old_sr | SR_S) & !SR_T);
        self.push_long(self.pc)?;
        self.push_word(old_sr as u32)?;
        self.pc = self.read_mem(vector as u32 * 4, Size::Long)?;
        self.sr = (self.sr & !SR_INT_MASK) | (((level & 7) as u16) << 8);

        let cycles = 44;
        self.cycles += cycles as u64;
        Ok(cycles)
    }

    pub(crate) fn add_cycles(&mut self, cycles: u32) {
        self.instr_cycles += cycles;
    }

    pub(crate) fn read_mem(&mut self, addr: u32, size: Size) -> Result<u32, M68kError> {
        self.instr_cycles += if size == Size::Long { 8 } else { 4 };
        let pc = self.instr_pc;
        self.memory
            .read(addr, size)
            .map_err(|source| M68kError::Bus { pc, source })
    }

    pub(crate) fn write_mem(&mut self, addr: u32, value: u32, size: Size) -> Result<(), M68kError> {
        self.instr_cycles += if size == Size::Long { 8 } else { 4 };
        let pc = self.instr_pc;
        self.memory
            .write(addr, size.truncate(value), size)
            .map_err(|source| M68kError::Bus { pc, source })
    }

    /// Read the word at PC and advance PC past it
    pub(crate) fn fetch_word(&mut self) -> Result<u32, M68kError> {
        let value = self.read_mem(self.pc, Size::Word)?;
        self.pc = self.pc.wrapping_add(2);
        Ok(value)
    }

    pub(crate) fn fetch_long(&mut self) -> Result<u32, M68kError> {
        let high = self.fetch_word()?;
        let low = self.fetch_word()?;
        Ok((high << 16) | low)
    }

    pub(crate) fn push_word(&mut self, value: u32) -> Result<(), M68kError> {
        self.a[7] = self.a[7].wrapping_sub(2);
        self.write_mem(self.a[7], value, Size::Word)
    }

    pub(crate) fn push_long(&mut self, value: u32) -> Result<(), M68kError> {
        self.a[7] = self.a[7].wrapping_sub(4);
        self.write_mem(self.a[7], value, Size::Long)
    }

    pub(crate) fn pop_word(&mut self) -> Result<u32, M68kError> {
        let value = self.read_mem(self.a[7], Size::Word)?;
        self.a[7] = self.a[7].wrapping_add(2);
        Ok(value)
    }

    pub(crate) fn pop_long(&mut self) -> Result<u32, M68kError> {
        let value = self.read_mem(self.a[7], Size::Long)?;
        self.a[7] = self.a[7].wrapping_add(4);
        Ok(value)
    }

    fn unimplemented(&self) -> M68kError {
        M68kError::UnimplementedOpcode {
            opcode: self.opcode,
            pc: self.instr_pc,
        }
    }

    fn unsupported(&self, what: &'static str) -> M68kError {
        M68kError::Unsupported {
            what,
            opcode: self.opcode,
            pc: self.instr_pc,
        }
    }

    /// Privileged instructions run in user mode too; flag it in the log.
    fn check_privilege(&self, what: &str) {
        if !self.is_supervisor() {
            let pc = self.instr_pc;
            log(LogCategory::M68k, LogLevel::Warn, || {
                format!("68000: privileged {} executed in user mode at {:06X}", what, pc)
            });
        }
    }

    /// Address of the instruction currently executing
    pub fn instruction_pc(&self) -> u32 {
        self.instr_pc
    }
}

impl<M: Memory68k> crate::Cpu for CpuM68k<M> {
    type Error = M68kError;

    fn reset(&mut self) -> Result<(), M68kError> {
        self.initialize()
    }

    fn step(&mut self) -> Result<u32, M68kError> {
        self.step()
    }
}

/// Flat 16 MB test memory
#[derive(Debug, Clone)]
pub struct ArrayMemory {
    data: Vec<u8>,
}

impl ArrayMemory {
    pub fn new() -> Self {
        Self {
            data: vec![0; 0x100_0000],
        }
    }

    /// Copy a program into memory at `addr`
    pub fn load_program(&mut self, addr: u32, program: &[u8]) {
        let start = (addr & 0x00FF_FFFF) as usize;
        let end = (start + program.len()).min(self.data.len());
        self.data[start..end].copy_from_slice(&program[..end - start]);
    }

    /// Copy big-endian words into memory at `addr`
    pub fn load_words(&mut self, addr: u32, words: &[u16]) {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        self.load_program(addr, &bytes);
    }

    /// Set the reset vectors (SSP at 0, PC at 4)
    pub fn set_reset_vectors(&mut self, ssp: u32, pc: u32) {
        self.load_program(0, &ssp.to_be_bytes());
        self.load_program(4, &pc.to_be_bytes());
    }

    pub fn byte(&self, addr: u32) -> u8 {
        self.data[(addr & 0x00FF_FFFF) as usize]
    }
}

impl Default for ArrayMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory68k for ArrayMemory {
    fn read(&mut self, addr: u32, size: Size) -> Result<u32, BusError> {
        let mut value = 0u32;
        for i in 0..size.bytes() {
            value = (value << 8) | self.byte(addr.wrapping_add(i)) as u32;
        }
        Ok(value)
    }

    fn write(&mut self, addr: u32, value: u32, size: Size) -> Result<(), BusError> {
        let n = size.bytes();
        for i in 0..n {
            let shift = 8 * (n - 1 - i);
            let at = (addr.wrapping_add(i) & 0x00FF_FFFF) as usize;
            self.data[at] = (value >> shift) as u8;
        }
        Ok(())
    }
}
