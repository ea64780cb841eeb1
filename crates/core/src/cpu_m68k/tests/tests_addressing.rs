//! Tests for effective address resolution

use super::{cpu_with, ENTRY};
use crate::cpu_m68k::{M68kError, Operand, Size};

const SIZES: [Size; 3] = [Size::Byte, Size::Word, Size::Long];

#[test]
fn test_postincrement_steps_by_size() {
    for (size, step) in SIZES.into_iter().zip([1, 2, 4]) {
        let mut cpu = cpu_with(&[]);
        cpu.a[0] = 0x1000;
        let operand = cpu.resolve_ea(3, 0, size).unwrap();
        assert_eq!(operand, Operand::Memory(0x1000), "access uses the old value");
        assert_eq!(cpu.a[0], 0x1000 + step);
    }
}

#[test]
fn test_predecrement_steps_by_size() {
    for (size, step) in SIZES.into_iter().zip([1, 2, 4]) {
        let mut cpu = cpu_with(&[]);
        cpu.a[0] = 0x1000;
        let operand = cpu.resolve_ea(4, 0, size).unwrap();
        assert_eq!(operand, Operand::Memory(0x1000 - step), "access uses the new value");
        assert_eq!(cpu.a[0], 0x1000 - step);
    }
}

#[test]
fn test_stack_pointer_byte_steps_stay_even() {
    let mut cpu = cpu_with(&[]);
    cpu.resolve_ea(4, 7, Size::Byte).unwrap();
    assert_eq!(cpu.a[7], 0xFEFE);
    cpu.resolve_ea(3, 7, Size::Byte).unwrap();
    assert_eq!(cpu.a[7], 0xFF00);
}

#[test]
fn test_postincrement_through_instruction() {
    // MOVE.B (A0)+,D0 ; MOVE.W (A0)+,D1 ; MOVE.L (A0)+,D2
    let mut cpu = cpu_with(&[0x1018, 0x3218, 0x2418]);
    cpu.a[0] = 0x2000;
    cpu.memory
        .load_program(0x2000, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
    cpu.step().unwrap();
    assert_eq!(cpu.d[0] & 0xFF, 0x11);
    assert_eq!(cpu.a[0], 0x2001);
    cpu.step().unwrap();
    assert_eq!(cpu.d[1] & 0xFFFF, 0x2233);
    assert_eq!(cpu.a[0], 0x2003);
    cpu.step().unwrap();
    assert_eq!(cpu.d[2], 0x4455_6677);
    assert_eq!(cpu.a[0], 0x2007);
}

/// Write through a mode, rewind the register and PC, read back through it.
fn round_trip(mode: u8, reg: u8, ext: &[u16]) {
    let value = 0x89AB_CDEF;
    for size in SIZES {
        if mode == 1 && size == Size::Byte {
            continue;
        }
        let mut cpu = cpu_with(ext);
        cpu.a[0] = 0x2000;
        cpu.d[1] = 4;

        cpu.write_ea(mode, reg, size, value).unwrap();
        let after_write = cpu.pc;
        cpu.pc = ENTRY;
        cpu.a[0] = 0x2000;
        let back = cpu.read_ea(mode, reg, size).unwrap();

        assert_eq!(back, size.truncate(value), "mode {} reg {} {:?}", mode, reg, size);
        assert_eq!(cpu.pc, after_write, "same extension words consumed");
    }
}

#[test]
fn test_round_trip_register_modes() {
    round_trip(0, 2, &[]);
    round_trip(1, 3, &[]);
}

#[test]
fn test_round_trip_memory_modes() {
    round_trip(2, 0, &[]);
    round_trip(3, 0, &[]);
    round_trip(4, 0, &[]);
    round_trip(5, 0, &[0xFFF0]);
    round_trip(6, 0, &[0x1010]); // d8(A0,D1.W)
    round_trip(7, 0, &[0x3000]);
    round_trip(7, 1, &[0x0000, 0x3000]);
}

#[test]
fn test_address_register_word_write_sign_extends() {
    let mut cpu = cpu_with(&[]);
    cpu.write_ea(1, 2, Size::Word, 0x8000).unwrap();
    assert_eq!(cpu.a[2], 0xFFFF_8000);
}

#[test]
fn test_data_register_word_write_preserves_high_word() {
    let mut cpu = cpu_with(&[]);
    cpu.d[4] = 0xAAAA_BBBB;
    cpu.write_ea(0, 4, Size::Word, 0x1234).unwrap();
    assert_eq!(cpu.d[4], 0xAAAA_1234);
}

#[test]
fn test_displacement_and_index() {
    // MOVE.W -2(A0),D0 ; MOVE.W 2(A0,D1.L),D2 ; MOVE.W 0(A0,A1.W),D3
    let mut cpu = cpu_with(&[0x3028, 0xFFFE, 0x3430, 0x1802, 0x3630, 0x9000]);
    cpu.a[0] = 0x2002;
    cpu.d[1] = 0x0000_0010;
    cpu.a[1] = 0x0001_FFFE; // low word is -2
    cpu.memory
        .load_words(0x2000, &[0x1111, 0x2222, 0x3333, 0x4444, 0x5555, 0x6666, 0x7777]);
    cpu.memory.load_words(0x2014, &[0xABCD]);

    cpu.step().unwrap();
    assert_eq!(cpu.d[0] & 0xFFFF, 0x1111);
    cpu.step().unwrap();
    assert_eq!(cpu.d[2] & 0xFFFF, 0xABCD);
    cpu.step().unwrap();
    assert_eq!(cpu.d[3] & 0xFFFF, 0x1111);
}

#[test]
fn test_pc_relative_is_relative_to_extension_word() {
    // MOVE.W $10(PC),D0 ; MOVE.W 4(PC,D1.W),D2
    let mut cpu = cpu_with(&[0x303A, 0x0010, 0x343B, 0x1004]);
    cpu.d[1] = 0x10;
    cpu.memory.load_words(ENTRY + 2 + 0x10, &[0xBEEF]);
    cpu.memory.load_words(ENTRY + 6 + 0x10 + 4, &[0xCAFE]);

    cpu.step().unwrap();
    assert_eq!(cpu.d[0] & 0xFFFF, 0xBEEF);
    cpu.step().unwrap();
    assert_eq!(cpu.d[2] & 0xFFFF, 0xCAFE);
}

#[test]
fn test_immediate_byte_uses_low_byte_of_word() {
    let mut cpu = cpu_with(&[0x103C, 0xFF12]); // MOVE.B #$12,D0
    cpu.step().unwrap();
    assert_eq!(cpu.d[0], 0xFFFF_FF12);
    assert_eq!(cpu.pc, ENTRY + 4);
}

#[test]
fn test_absolute_short_sign_extends() {
    let mut cpu = cpu_with(&[0xFFF0]);
    let operand = cpu.resolve_ea(7, 0, Size::Word).unwrap();
    assert_eq!(operand, Operand::Memory(0xFFFF_FFF0));
}

#[test]
fn test_writes_to_pc_relative_and_immediate_fail() {
    let mut cpu = cpu_with(&[0x0010, 0x0010]);
    assert!(matches!(
        cpu.write_ea(7, 2, Size::Word, 0),
        Err(M68kError::InvalidAddressingMode { mode: 7, reg: 2, .. })
    ));
    assert!(matches!(
        cpu.write_ea(7, 4, Size::Word, 0),
        Err(M68kError::InvalidAddressingMode { mode: 7, reg: 4, .. })
    ));
}

#[test]
fn test_undefined_mode_seven_registers_fail() {
    let mut cpu = cpu_with(&[]);
    for reg in 5..=7 {
        assert!(matches!(
            cpu.resolve_ea(7, reg, Size::Word),
            Err(M68kError::InvalidAddressingMode { .. })
        ));
    }
}

#[test]
fn test_undecodable_opcode_reports_pc() {
    let mut cpu = cpu_with(&[0x4E71, 0x42C0]); // NOP ; (CLR with size 11)
    cpu.step().unwrap();
    assert_eq!(
        cpu.step(),
        Err(M68kError::UnimplementedOpcode {
            opcode: 0x42C0,
            pc: ENTRY + 2
        })
    );
}
