//! Instruction-level tests for the Z80 core.
//!
//! Programs are loaded at 0x0000 with SP at 0xF000.

mod tests_index;

use super::{ArrayMemory, CpuZ80};

pub(super) const STACK: u16 = 0xF000;

pub(super) fn cpu_with(program: &[u8]) -> CpuZ80<ArrayMemory> {
    let mut mem = ArrayMemory::new();
    mem.load_program(0, program);
    let mut cpu = CpuZ80::new(mem);
    cpu.sp = STACK;
    cpu.f = 0;
    cpu
}

/// Step `n` instructions and return the cycles they took
pub(super) fn run(cpu: &mut CpuZ80<ArrayMemory>, n: usize) -> u32 {
    (0..n).map(|_| cpu.step().unwrap()).sum()
}
