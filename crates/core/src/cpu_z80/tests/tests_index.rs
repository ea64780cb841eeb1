//! Tests for the DD/FD prefixes, including IXH/IXL and DD CB forms

use super::{cpu_with, STACK};
use crate::cpu_z80::{MemoryZ80, FLAG_C, FLAG_Z};

#[test]
fn test_ld_ix_nn() {
    let mut cpu = cpu_with(&[0xDD, 0x21, 0x00, 0x40, 0xFD, 0x21, 0x34, 0x12]);
    assert_eq!(cpu.step().unwrap(), 14);
    assert_eq!(cpu.ix, 0x4000);
    cpu.step().unwrap();
    assert_eq!(cpu.iy, 0x1234);
    assert_eq!(cpu.hl(), 0, "HL untouched");
}

#[test]
fn test_indexed_memory_operands() {
    // LD (IX+5),$99 ; LD A,(IX+5) ; LD (IX-2),A
    let mut cpu = cpu_with(&[0xDD, 0x36, 0x05, 0x99, 0xDD, 0x7E, 0x05, 0xDD, 0x77, 0xFE]);
    cpu.ix = 0x4000;
    assert_eq!(cpu.step().unwrap(), 19);
    assert_eq!(cpu.memory.read(0x4005), 0x99);
    assert_eq!(cpu.step().unwrap(), 19);
    assert_eq!(cpu.a, 0x99);
    cpu.step().unwrap();
    assert_eq!(cpu.memory.read(0x3FFE), 0x99);
}

#[test]
fn test_indexed_load_uses_real_h_and_l() {
    // LD H,(IX+1) ; LD (IX+0),L
    let mut cpu = cpu_with(&[0xDD, 0x66, 0x01, 0xDD, 0x75, 0x00]);
    cpu.ix = 0x4000;
    cpu.l = 0x5A;
    cpu.memory.write(0x4001, 0xA5);
    cpu.step().unwrap();
    assert_eq!(cpu.h, 0xA5);
    assert_eq!(cpu.ix, 0x4000);
    cpu.step().unwrap();
    assert_eq!(cpu.memory.read(0x4000), 0x5A);
}

#[test]
fn test_inc_indexed_memory() {
    let mut cpu = cpu_with(&[0xFD, 0x34, 0x00]); // INC (IY+0)
    cpu.iy = 0x4000;
    cpu.memory.write(0x4000, 0xFF);
    assert_eq!(cpu.step().unwrap(), 23);
    assert_eq!(cpu.memory.read(0x4000), 0);
    assert!(cpu.flag(FLAG_Z));
}

#[test]
fn test_add_ix_rr() {
    // ADD IX,BC ; ADD IX,IX
    let mut cpu = cpu_with(&[0xDD, 0x09, 0xDD, 0x29]);
    cpu.ix = 0x8000;
    cpu.set_bc(0x0001);
    cpu.set_hl(0x1111);
    assert_eq!(cpu.step().unwrap(), 15);
    assert_eq!(cpu.ix, 0x8001);
    cpu.step().unwrap();
    assert_eq!(cpu.ix, 0x0002);
    assert!(cpu.flag(FLAG_C));
    assert_eq!(cpu.hl(), 0x1111);
}

#[test]
fn test_undocumented_half_registers() {
    // LD IXH,$12 ; LD IXL,$34 ; LD B,IXL ; ADD A,IXH
    let mut cpu = cpu_with(&[0xDD, 0x26, 0x12, 0xDD, 0x2E, 0x34, 0xDD, 0x45, 0xDD, 0x84]);
    cpu.a = 1;
    for _ in 0..4 {
        cpu.step().unwrap();
    }
    assert_eq!(cpu.ix, 0x1234);
    assert_eq!(cpu.b, 0x34);
    assert_eq!(cpu.a, 0x13);
    assert_eq!(cpu.hl(), 0);
}

#[test]
fn test_prefix_on_unrelated_opcode_falls_back() {
    // DD INC A ; DD EX DE,HL
    let mut cpu = cpu_with(&[0xDD, 0x3C, 0xDD, 0xEB]);
    cpu.a = 1;
    cpu.ix = 0x7777;
    cpu.set_de(0x1111);
    cpu.set_hl(0x2222);
    assert_eq!(cpu.step().unwrap(), 8);
    assert_eq!(cpu.a, 2);
    assert_eq!(cpu.pc, 2);
    cpu.step().unwrap();
    assert_eq!(cpu.de(), 0x2222);
    assert_eq!(cpu.hl(), 0x1111);
    assert_eq!(cpu.ix, 0x7777);
}

#[test]
fn test_stacked_prefixes_last_one_wins() {
    let mut cpu = cpu_with(&[0xDD, 0xFD, 0x21, 0x34, 0x12]); // DD ; LD IY,$1234
    assert_eq!(cpu.step().unwrap(), 4);
    assert_eq!(cpu.pc, 1);
    assert_eq!(cpu.step().unwrap(), 14);
    assert_eq!(cpu.iy, 0x1234);
    assert_eq!(cpu.ix, 0);
    assert_eq!(cpu.pc, 5);
}

#[test]
fn test_memory_full_of_prefixes_steps_one_byte_at_a_time() {
    let mut cpu = cpu_with(&vec![0xDD; 0x10000]);
    for n in 1..=0x100u16 {
        assert_eq!(cpu.step().unwrap(), 4);
        assert_eq!(cpu.pc, n);
    }

    let mut cpu = cpu_with(&[0xFD; 0x100]);
    cpu.pc = 0x80;
    assert_eq!(cpu.step().unwrap(), 4);
    assert_eq!(cpu.pc, 0x81);
    assert_eq!(cpu.iy, 0);
}

#[test]
fn test_index_cb_set_and_bit() {
    // SET 1,(IX+3) ; BIT 1,(IX+3)
    let mut cpu = cpu_with(&[0xDD, 0xCB, 0x03, 0xCE, 0xDD, 0xCB, 0x03, 0x4E]);
    cpu.ix = 0x4000;
    assert_eq!(cpu.step().unwrap(), 23);
    assert_eq!(cpu.memory.read(0x4003), 0x02);
    assert_eq!(cpu.step().unwrap(), 20);
    assert!(!cpu.flag(FLAG_Z));
    assert_eq!(cpu.pc, 8);
}

#[test]
fn test_index_cb_copies_result_to_register() {
    let mut cpu = cpu_with(&[0xFD, 0xCB, 0xFF, 0x00]); // RLC (IY-1),B
    cpu.iy = 0x4001;
    cpu.memory.write(0x4000, 0x80);
    cpu.step().unwrap();
    assert_eq!(cpu.memory.read(0x4000), 0x01);
    assert_eq!(cpu.b, 0x01);
    assert!(cpu.flag(FLAG_C));
}

#[test]
fn test_push_pop_jp_ex_sp_with_index() {
    // PUSH IX ; POP IY ; EX (SP),IX ; JP (IY)
    let mut cpu = cpu_with(&[0xDD, 0xE5, 0xFD, 0xE1, 0xDD, 0xE3, 0xFD, 0xE9]);
    cpu.ix = 0x1234;
    cpu.step().unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.iy, 0x1234);
    assert_eq!(cpu.sp, STACK);

    cpu.sp = STACK - 2;
    cpu.memory.load_program(STACK - 2, &[0xCD, 0xAB]);
    assert_eq!(cpu.step().unwrap(), 23);
    assert_eq!(cpu.ix, 0xABCD);
    assert_eq!(cpu.memory.read(STACK - 2), 0x34);
    assert_eq!(cpu.memory.read(STACK - 1), 0x12);

    assert_eq!(cpu.step().unwrap(), 8);
    assert_eq!(cpu.pc, 0x1234);
}
