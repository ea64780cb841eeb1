//! Tests for branches, DBcc, Scc and subroutine linkage

use super::{cpu_with, peek, ENTRY, STACK};
use crate::cpu_m68k::{M68kError, Size, SR_Z};

#[test]
fn test_bra_byte_displacement() {
    let mut cpu = cpu_with(&[0x6004]);
    cpu.step().unwrap();
    assert_eq!(cpu.pc, ENTRY + 2 + 4);
}

#[test]
fn test_bra_word_displacement_when_byte_is_zero() {
    let mut cpu = cpu_with(&[0x6000, 0x0010]);
    cpu.step().unwrap();
    assert_eq!(cpu.pc, ENTRY + 2 + 0x10);
}

#[test]
fn test_bra_backwards() {
    let mut cpu = cpu_with(&[0x60FE]); // BRA.S *
    cpu.step().unwrap();
    assert_eq!(cpu.pc, ENTRY);
}

#[test]
fn test_long_displacement_is_unsupported() {
    let mut cpu = cpu_with(&[0x60FF, 0x0000, 0x0010]);
    assert!(matches!(
        cpu.step(),
        Err(M68kError::Unsupported { opcode: 0x60FF, pc, .. }) if pc == ENTRY
    ));
}

#[test]
fn test_beq_taken_and_not_taken() {
    let mut cpu = cpu_with(&[0x6702]);
    cpu.sr |= SR_Z;
    cpu.step().unwrap();
    assert_eq!(cpu.pc, ENTRY + 4);

    let mut cpu = cpu_with(&[0x6702]);
    cpu.sr &= !SR_Z;
    cpu.step().unwrap();
    assert_eq!(cpu.pc, ENTRY + 2);
}

#[test]
fn test_bsr_pushes_address_after_extension_word() {
    let mut cpu = cpu_with(&[0x6100, 0x0020]);
    cpu.step().unwrap();
    assert_eq!(cpu.pc, ENTRY + 2 + 0x20);
    assert_eq!(cpu.a[7], STACK - 4);
    assert_eq!(peek(&mut cpu, STACK - 4, Size::Long), ENTRY + 4);
}

#[test]
fn test_jsr_rts_round_trip_big_endian() {
    let mut cpu = cpu_with(&[0x4EB9, 0x0000, 0x0500]); // JSR $500
    cpu.memory.load_words(0x500, &[0x4E75]); // RTS

    cpu.step().unwrap();
    assert_eq!(cpu.pc, 0x500);
    assert_eq!(cpu.memory.byte(STACK - 4), 0x00);
    assert_eq!(cpu.memory.byte(STACK - 3), 0x00);
    assert_eq!(cpu.memory.byte(STACK - 2), 0x04);
    assert_eq!(cpu.memory.byte(STACK - 1), 0x06);

    cpu.step().unwrap();
    assert_eq!(cpu.pc, ENTRY + 6);
    assert_eq!(cpu.a[7], STACK);
}

#[test]
fn test_jmp_indirect() {
    let mut cpu = cpu_with(&[0x4ED0]); // JMP (A0)
    cpu.a[0] = 0x1234;
    cpu.step().unwrap();
    assert_eq!(cpu.pc, 0x1234);
}

#[test]
fn test_dbf_from_zero_falls_through() {
    let mut cpu = cpu_with(&[0x51C8, 0xFFFE]); // DBF D0,*
    cpu.d[0] = 0xABCD_0000;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0xABCD_FFFF, "high word untouched");
    assert_eq!(cpu.pc, ENTRY + 4);
}

#[test]
fn test_dbf_from_one_branches() {
    let mut cpu = cpu_with(&[0x51C8, 0xFFFE]);
    cpu.d[0] = 0xABCD_0001;
    let flags = cpu.sr;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0xABCD_0000);
    assert_eq!(cpu.pc, ENTRY);
    assert_eq!(cpu.sr, flags, "DBcc leaves the condition codes alone");
}

#[test]
fn test_dbcc_true_condition_skips_decrement() {
    let mut cpu = cpu_with(&[0x57C8, 0xFFFE]); // DBEQ D0,*
    cpu.d[0] = 5;
    cpu.sr |= SR_Z;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 5);
    assert_eq!(cpu.pc, ENTRY + 4);
}

#[test]
fn test_dbra_loop_runs_count_plus_one_times() {
    // loop: ADDQ.L #1,D1 ; DBF D0,loop
    let mut cpu = cpu_with(&[0x5281, 0x51C8, 0xFFFC]);
    cpu.d[0] = 3;
    cpu.d[1] = 0;
    while cpu.pc != ENTRY + 6 {
        cpu.step().unwrap();
    }
    assert_eq!(cpu.d[1], 4);
    assert_eq!(cpu.d[0] & 0xFFFF, 0xFFFF);
}

#[test]
fn test_scc_writes_byte() {
    let mut cpu = cpu_with(&[0x57C0, 0x56C1]); // SEQ D0 ; SNE D1
    cpu.d[0] = 0;
    cpu.d[1] = 0x1234_5678;
    cpu.sr |= SR_Z;
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0xFF);
    cpu.step().unwrap();
    assert_eq!(cpu.d[1], 0x1234_5600);
}

#[test]
fn test_link_unlk() {
    let mut cpu = cpu_with(&[0x4E56, 0xFFF8, 0x4E5E]); // LINK A6,#-8 ; UNLK A6
    cpu.a[6] = 0x1234;
    cpu.step().unwrap();
    assert_eq!(peek(&mut cpu, STACK - 4, Size::Long), 0x1234);
    assert_eq!(cpu.a[6], STACK - 4);
    assert_eq!(cpu.a[7], STACK - 12);

    cpu.step().unwrap();
    assert_eq!(cpu.a[6], 0x1234);
    assert_eq!(cpu.a[7], STACK);
}

#[test]
fn test_rtr_restores_ccr_only() {
    let mut cpu = cpu_with(&[0x4E77]);
    cpu.a[7] = STACK - 6;
    cpu.memory.load_words(STACK - 6, &[0xFF1F, 0x0000, 0x0800]);
    cpu.sr = 0x2700;
    cpu.step().unwrap();
    assert_eq!(cpu.sr, 0x271F);
    assert_eq!(cpu.pc, 0x800);
    assert_eq!(cpu.a[7], STACK);
}
