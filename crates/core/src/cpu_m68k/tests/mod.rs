//! Instruction-level tests for the 68000 core.
//!
//! Each test loads a few opcode words at 0x400 behind reset vectors
//! SSP=0xFF00 / PC=0x400, initializes the CPU and steps it.

mod tests_addressing;
mod tests_branch;
mod tests_shift;

use super::{ArrayMemory, CpuM68k, Memory68k, Size};

pub(super) const ENTRY: u32 = 0x400;
pub(super) const STACK: u32 = 0xFF00;

/// CPU with `program` at the reset PC; all D/A registers start at all ones.
pub(super) fn cpu_with(program: &[u16]) -> CpuM68k<ArrayMemory> {
    let mut mem = ArrayMemory::new();
    mem.set_reset_vectors(STACK, ENTRY);
    mem.load_words(ENTRY, program);
    let mut cpu = CpuM68k::new(mem);
    cpu.initialize().unwrap();
    cpu
}

pub(super) fn peek(cpu: &mut CpuM68k<ArrayMemory>, addr: u32, size: Size) -> u32 {
    cpu.memory.read(addr, size).unwrap()
}

pub(super) fn poke(cpu: &mut CpuM68k<ArrayMemory>, addr: u32, value: u32, size: Size) {
    cpu.memory.write(addr, value, size).unwrap();
}
