//! Cartridge ROM and 68000 work RAM.

use emu_core::logging::{log, LogCategory, LogLevel};
use std::sync::Arc;

/// Size of the 68000 work RAM
pub const RAM_SIZE: usize = 0x10000;

/// Highest address decoded as cartridge space
pub const CART_END: u32 = 0x3F_FFFF;

/// Cartridge ROM plus the 64 KB of work RAM at 0xFF0000.
///
/// The ROM image is shared with the Z80 bank window, so it lives behind an
/// `Arc` and is never written.
#[derive(Debug, Clone)]
pub struct MemoryBlock {
    rom: Arc<[u8]>,
    ram: Box<[u8]>,
}

impl MemoryBlock {
    pub fn new(rom: Arc<[u8]>) -> Self {
        Self {
            rom,
            ram: vec![0; RAM_SIZE].into_boxed_slice(),
        }
    }

    pub fn rom(&self) -> &Arc<[u8]> {
        &self.rom
    }

    /// Cartridge byte; addresses past the image read as 0xFF
    pub fn read_rom(&self, addr: u32) -> u8 {
        match self.rom.get(addr as usize) {
            Some(&b) => b,
            None => {
                log(LogCategory::Bus, LogLevel::Trace, || {
                    format!("ROM read past image at {:06X}", addr)
                });
                0xFF
            }
        }
    }

    pub fn write_rom(&self, addr: u32, value: u8) {
        log(LogCategory::Bus, LogLevel::Debug, || {
            format!("Ignoring ROM write {:02X} at {:06X}", value, addr)
        });
    }

    /// Work RAM byte; every address in 0xE00000-0xFFFFFF folds onto the 64 KB
    pub fn read_ram(&self, addr: u32) -> u8 {
        self.ram[addr as usize & (RAM_SIZE - 1)]
    }

    pub fn write_ram(&mut self, addr: u32, value: u8) {
        self.ram[addr as usize & (RAM_SIZE - 1)] = value;
    }

    pub fn clear_ram(&mut self) {
        self.ram.fill(0);
    }
}
