//! The Z80's view of the machine.
//!
//! | Range | Device |
//! |---|---|
//! | 0x0000-0x1FFF | 8 KB sound RAM (mirrored at 0x2000) |
//! | 0x4000-0x5FFF | YM2612 (stub: reads 0, writes dropped) |
//! | 0x6000-0x60FF | Bank register, one bit per write |
//! | 0x7F11 | PSG (stub) |
//! | 0x8000-0xFFFF | 32 KB window onto the 68000 address space |
//!
//! The 68000 reaches the same RAM through 0xA00000-0xA0FFFF.

use crate::memory::CART_END;
use emu_core::cpu_z80::MemoryZ80;
use emu_core::logging::{log, LogCategory, LogLevel};
use std::sync::Arc;

const RAM_SIZE: usize = 0x2000;
const BANK_MASK: u16 = 0x1FF;

#[derive(Debug, Clone)]
pub struct Z80Memory {
    ram: Box<[u8]>,
    rom: Arc<[u8]>,
    /// 68000 address bits 23-15 of the bank window
    bank: u16,
}

impl Z80Memory {
    pub fn new(rom: Arc<[u8]>) -> Self {
        Self {
            ram: vec![0; RAM_SIZE].into_boxed_slice(),
            rom,
            bank: 0,
        }
    }

    /// Bank register value (9 bits)
    pub fn bank(&self) -> u16 {
        self.bank
    }

    /// 68000 address the window at 0x8000 currently starts at
    pub fn bank_base(&self) -> u32 {
        (self.bank as u32) << 15
    }

    /// Power-on state: RAM is kept, the bank register is cleared
    pub fn reset(&mut self) {
        self.bank = 0;
    }

    /// Shift one bit (bit 0 of the written value) into bit 8 of the bank register
    fn shift_bank(&mut self, value: u8) {
        self.bank = ((self.bank >> 1) | (((value & 1) as u16) << 8)) & BANK_MASK;
        log(LogCategory::Z80, LogLevel::Trace, || {
            format!("Bank register now {:03X} (base {:06X})", self.bank, self.bank_base())
        });
    }

    fn read_banked(&self, addr: u16) -> u8 {
        let target = self.bank_base() | (addr as u32 & 0x7FFF);
        if target <= CART_END {
            self.rom.get(target as usize).copied().unwrap_or(0xFF)
        } else {
            log(LogCategory::Stubs, LogLevel::Debug, || {
                format!("Z80 bank read outside cartridge at {:06X}", target)
            });
            0xFF
        }
    }
}

impl MemoryZ80 for Z80Memory {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.ram[addr as usize & (RAM_SIZE - 1)],
            // YM2612 status: never busy
            0x4000..=0x5FFF => 0,
            0x6000..=0x7FFF => 0xFF,
            0x8000..=0xFFFF => self.read_banked(addr),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x3FFF => self.ram[addr as usize & (RAM_SIZE - 1)] = val,
            0x4000..=0x5FFF => log(LogCategory::Stubs, LogLevel::Debug, || {
                format!("YM2612 write {:02X} to {:04X} dropped", val, addr)
            }),
            0x6000..=0x60FF => self.shift_bank(val),
            0x7F11 => log(LogCategory::Stubs, LogLevel::Debug, || {
                format!("PSG write {:02X} dropped", val)
            }),
            0x8000..=0xFFFF => log(LogCategory::Stubs, LogLevel::Debug, || {
                format!(
                    "Z80 bank write {:02X} to {:06X} dropped",
                    val,
                    self.bank_base() | (addr as u32 & 0x7FFF)
                )
            }),
            _ => log(LogCategory::Z80, LogLevel::Debug, || {
                format!("Z80 write {:02X} to unused {:04X}", val, addr)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_marker() -> Arc<[u8]> {
        let mut rom = vec![0u8; 0x20000];
        rom[0x0_0000] = 0x11;
        rom[0x1_8005] = 0x22;
        Arc::from(rom)
    }

    fn select_bank(mem: &mut Z80Memory, bank: u16) {
        for bit in 0..9 {
            mem.write(0x6000, ((bank >> bit) & 1) as u8);
        }
    }

    #[test]
    fn test_ram_is_mirrored() {
        let mut mem = Z80Memory::new(Arc::from(vec![]));
        mem.write(0x0123, 0xAB);
        assert_eq!(mem.read(0x2123), 0xAB);
        mem.write(0x3FFF, 0x5A);
        assert_eq!(mem.read(0x1FFF), 0x5A);
    }

    #[test]
    fn test_ym2612_stub() {
        let mut mem = Z80Memory::new(Arc::from(vec![]));
        mem.write(0x4000, 0x22);
        mem.write(0x4001, 0x0F);
        assert_eq!(mem.read(0x4000), 0);
        mem.write(0x7F11, 0x9F);
    }

    #[test]
    fn test_bank_register_shifts_nine_bits() {
        let mut mem = Z80Memory::new(rom_with_marker());
        select_bank(&mut mem, 3);
        assert_eq!(mem.bank(), 3);
        assert_eq!(mem.bank_base(), 0x1_8000);
        assert_eq!(mem.read(0x8005), 0x22);

        select_bank(&mut mem, 0);
        assert_eq!(mem.read(0x8000), 0x11);
    }

    #[test]
    fn test_bank_window_outside_rom() {
        let mut mem = Z80Memory::new(rom_with_marker());
        // 0xFF0000: work RAM is not reachable through the window here
        select_bank(&mut mem, 0x1FE);
        assert_eq!(mem.bank_base(), 0xFF_0000);
        assert_eq!(mem.read(0x8000), 0xFF);

        // Past the end of a short image
        select_bank(&mut mem, 0x10);
        assert_eq!(mem.read(0x8000), 0xFF);
    }

    #[test]
    fn test_reset_clears_bank_only() {
        let mut mem = Z80Memory::new(rom_with_marker());
        mem.write(0x0000, 0x77);
        select_bank(&mut mem, 5);
        mem.reset();
        assert_eq!(mem.bank(), 0);
        assert_eq!(mem.read(0x0000), 0x77);
    }
}
