//! Tests for shifts, rotates and bit manipulation

use super::cpu_with;
use crate::cpu_m68k::{SR_C, SR_N, SR_V, SR_X, SR_Z};

#[test]
fn test_lsl_word_carries_out() {
    let mut cpu = cpu_with(&[0xE348]); // LSL.W #1,D0
    cpu.d[0] = 0xFFFF_8001;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0xFFFF_0002);
    assert!(cpu.flag(SR_C));
    assert!(cpu.flag(SR_X));
}

#[test]
fn test_asr_byte_keeps_sign() {
    let mut cpu = cpu_with(&[0xE200]); // ASR.B #1,D0
    cpu.d[0] = 0x81;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0xC0);
    assert!(cpu.flag(SR_C));
    assert!(cpu.flag(SR_N));
}

#[test]
fn test_asl_sets_overflow_on_sign_change() {
    let mut cpu = cpu_with(&[0xE300]); // ASL.B #1,D0
    cpu.d[0] = 0x40;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0x80);
    assert!(cpu.flag(SR_V));
    assert!(cpu.flag(SR_N));
    assert!(!cpu.flag(SR_C));
}

#[test]
fn test_rol_count_eight_leaves_x() {
    let mut cpu = cpu_with(&[0xE198]); // ROL.L #8,D0
    cpu.d[0] = 0x1234_5678;
    cpu.sr |= SR_X;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0x3456_7812);
    assert!(cpu.flag(SR_X));
    assert!(!cpu.flag(SR_C));
}

#[test]
fn test_roxr_shifts_extend_in() {
    let mut cpu = cpu_with(&[0xE250]); // ROXR.W #1,D0
    cpu.d[0] = 0;
    cpu.sr |= SR_X;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0x8000);
    assert!(!cpu.flag(SR_X));
    assert!(!cpu.flag(SR_C));
}

#[test]
fn test_register_count_shift() {
    let mut cpu = cpu_with(&[0xE2A8]); // LSR.L D1,D0
    cpu.d[0] = 0xF0;
    cpu.d[1] = 4;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0x0F);
    assert!(!cpu.flag(SR_C));
}

#[test]
fn test_zero_count_clears_carry_keeps_x() {
    let mut cpu = cpu_with(&[0xE2A8]);
    cpu.d[0] = 0x80;
    cpu.d[1] = 64; // taken modulo 64
    cpu.sr |= SR_X | SR_C;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0x80);
    assert!(!cpu.flag(SR_C));
    assert!(cpu.flag(SR_X));
}

#[test]
fn test_memory_shift_word() {
    let mut cpu = cpu_with(&[0xE1D0]); // ASL (A0)
    cpu.a[0] = 0x2000;
    cpu.memory.load_words(0x2000, &[0x4000]);
    cpu.step().unwrap();
    assert_eq!(cpu.memory.byte(0x2000), 0x80);
    assert!(cpu.flag(SR_V));
}

#[test]
fn test_btst_register_is_modulo_32() {
    let mut cpu = cpu_with(&[0x0800, 0x0023]); // BTST #35,D0
    cpu.d[0] = 0x08;
    cpu.step().unwrap();
    assert!(!cpu.flag(SR_Z));
}

#[test]
fn test_bset_high_bit_of_register() {
    let mut cpu = cpu_with(&[0x08C0, 0x001F]); // BSET #31,D0
    cpu.d[0] = 0;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0x8000_0000);
    assert!(cpu.flag(SR_Z), "bit was clear before");
}

#[test]
fn test_dynamic_bclr_memory_is_modulo_8() {
    let mut cpu = cpu_with(&[0x0390]); // BCLR D1,(A0)
    cpu.a[0] = 0x2000;
    cpu.d[1] = 9;
    cpu.memory.load_program(0x2000, &[0x02]);
    cpu.step().unwrap();
    assert_eq!(cpu.memory.byte(0x2000), 0x00);
    assert!(!cpu.flag(SR_Z));
}

#[test]
fn test_bchg_toggles() {
    let mut cpu = cpu_with(&[0x0840, 0x0000, 0x0840, 0x0000]); // BCHG #0,D0 twice
    cpu.d[0] = 0;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 1);
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0);
}
