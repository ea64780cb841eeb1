//! Genesis 68000 bus
//!
//! Address decode for the main CPU. Ranges are checked in a fixed order:
//! cartridge, fixed I/O registers, the Z80 window, the VDP ports and finally
//! work RAM. Anything else is a fatal [`BusError::Unmapped`].
//!
//! The bus owns every device the 68000 can reach, the Z80 included, so the
//! driver loop steps the Z80 through [`GenesisBus::z80_mut`].

use crate::io::{ControllerState, IoPorts};
use crate::memory::{MemoryBlock, CART_END};
use crate::system::GenesisConfig;
use crate::vdp::{DmaMode, Vdp};
use crate::z80_memory::Z80Memory;
use emu_core::cpu_m68k::{BusError, Memory68k, Size};
use emu_core::cpu_z80::{CpuZ80, MemoryZ80};
use emu_core::logging::{log, LogCategory, LogLevel};
use std::sync::Arc;

const ADDRESS_MASK: u32 = 0xFF_FFFF;

/// Genesis memory bus as seen by the 68000
#[derive(Debug)]
pub struct GenesisBus {
    memory: MemoryBlock,
    vdp: Vdp,
    z80: CpuZ80<Z80Memory>,
    io: IoPorts,

    /// 68000 holds the Z80 bus (0xA11100)
    z80_bus_requested: bool,
    /// Z80 RESET line asserted (0xA11200)
    z80_reset: bool,
}

impl GenesisBus {
    pub fn new(rom: Arc<[u8]>, config: &GenesisConfig) -> Self {
        Self {
            memory: MemoryBlock::new(rom.clone()),
            vdp: Vdp::new(config),
            z80: CpuZ80::new(Z80Memory::new(rom)),
            io: IoPorts::new(),
            z80_bus_requested: false,
            z80_reset: true,
        }
    }

    /// Power-on state for everything behind the bus. The Z80 starts held in
    /// reset until the 68000 releases it.
    pub fn reset(&mut self) {
        self.memory.clear_ram();
        self.vdp.reset();
        self.io.reset();
        self.z80.reset();
        self.z80.memory.reset();
        self.z80_bus_requested = false;
        self.z80_reset = true;
    }

    pub fn rom(&self) -> &Arc<[u8]> {
        self.memory.rom()
    }

    pub fn vdp(&self) -> &Vdp {
        &self.vdp
    }

    pub fn vdp_mut(&mut self) -> &mut Vdp {
        &mut self.vdp
    }

    pub fn z80(&self) -> &CpuZ80<Z80Memory> {
        &self.z80
    }

    pub fn z80_mut(&mut self) -> &mut CpuZ80<Z80Memory> {
        &mut self.z80
    }

    pub fn set_controller(&mut self, port: usize, state: ControllerState) {
        self.io.set_controller(port, state);
    }

    pub fn z80_bus_requested(&self) -> bool {
        self.z80_bus_requested
    }

    pub fn z80_in_reset(&self) -> bool {
        self.z80_reset
    }

    /// The Z80 runs on its own only while it has its bus and is out of reset
    pub fn z80_running(&self) -> bool {
        !self.z80_bus_requested && !self.z80_reset
    }

    /// Advance the active DMA by one unit. 68000 to VDP transfers read their
    /// source word through this bus.
    pub fn dma_step(&mut self) -> Result<(), BusError> {
        match self.vdp.dma_mode() {
            Some(DmaMode::MemoryToVram) => {
                let source = self.vdp.dma_source();
                let word = self.read_word(source)?;
                self.vdp.dma_transfer_word(word);
            }
            Some(DmaMode::Fill) | Some(DmaMode::Copy) => self.vdp.dma_step_vram(),
            None => {}
        }
        Ok(())
    }

    fn write_bus_request(&mut self, value: u8) {
        let request = value & 1 != 0;
        if request != self.z80_bus_requested {
            log(LogCategory::Z80, LogLevel::Debug, || {
                if request {
                    "Bus requested by 68000".to_string()
                } else {
                    "Bus released to Z80".to_string()
                }
            });
        }
        self.z80_bus_requested = request;
    }

    fn write_z80_reset(&mut self, value: u8) {
        if value & 1 != 0 {
            if self.z80_reset {
                log(LogCategory::Z80, LogLevel::Debug, || "Reset released".to_string());
            }
            self.z80_reset = false;
        } else if self.z80_bus_requested {
            self.z80.reset();
            self.z80_reset = true;
        } else {
            log(LogCategory::Z80, LogLevel::Debug, || {
                "Reset asserted without the bus; ignored".to_string()
            });
        }
    }

    fn unmapped(address: u32, write: bool) -> BusError {
        BusError::Unmapped { address, write }
    }

    /// Status byte of 0xA11100: bit 0 clear once the 68000 owns the Z80 bus
    fn bus_request_status(&self) -> u8 {
        if self.z80_bus_requested {
            0x00
        } else {
            0x01
        }
    }

    fn read_byte(&mut self, addr: u32) -> Result<u8, BusError> {
        let addr = addr & ADDRESS_MASK;
        match addr {
            0x00_0000..=CART_END => Ok(self.memory.read_rom(addr)),
            0xA1_0000..=0xA1_001F => Ok(self.io.read(addr)),
            0xA1_1100 => Ok(self.bus_request_status()),
            // Memory mode register reads back as zero, like the handshake spares
            0xA1_1000..=0xA1_1001 | 0xA1_1101 | 0xA1_1200..=0xA1_1201 => Ok(0),
            0xA1_3000..=0xA1_30FF | 0xA1_4000..=0xA1_4003 => {
                log(LogCategory::Stubs, LogLevel::Debug, || {
                    format!("Cartridge control read at {:06X}", addr)
                });
                Ok(0)
            }
            0xA0_0000..=0xA0_7FFF => Ok(self.z80.memory.read(addr as u16 & 0x7FFF)),
            0xA0_8000..=0xA0_FFFF => Ok(0xFF),
            0xC0_0000..=0xC0_001F => {
                let word = self.read_vdp(addr & !1)?;
                Ok(if addr & 1 == 0 {
                    (word >> 8) as u8
                } else {
                    word as u8
                })
            }
            0xE0_0000..=0xFF_FFFF => Ok(self.memory.read_ram(addr)),
            _ => Err(Self::unmapped(addr, false)),
        }
    }

    fn read_word(&mut self, addr: u32) -> Result<u16, BusError> {
        let addr = addr & ADDRESS_MASK;
        match addr {
            0x00_0000..=CART_END => Ok(u16::from_be_bytes([
                self.memory.read_rom(addr),
                self.memory.read_rom(addr + 1),
            ])),
            // Byte-wide registers appear on both halves of the data bus
            0xA1_0000..=0xA1_001F => Ok(self.io.read(addr | 1) as u16 * 0x0101),
            0xA1_1100..=0xA1_1101 => Ok((self.bus_request_status() as u16) << 8),
            0xA0_0000..=0xA0_FFFF => Ok(self.read_byte(addr)? as u16 * 0x0101),
            0xC0_0000..=0xC0_001F => self.read_vdp(addr),
            0xE0_0000..=0xFF_FFFF => Ok(u16::from_be_bytes([
                self.memory.read_ram(addr),
                self.memory.read_ram(addr + 1),
            ])),
            _ => Ok(u16::from_be_bytes([
                self.read_byte(addr)?,
                self.read_byte(addr + 1)?,
            ])),
        }
    }

    fn read_vdp(&mut self, addr: u32) -> Result<u16, BusError> {
        match addr & 0x1F {
            0x00..=0x03 => Ok(self.vdp.read_data()),
            0x04..=0x07 => Ok(self.vdp.read_status()),
            0x08..=0x0F => Ok(self.vdp.hv_counter()),
            port => {
                log(LogCategory::Stubs, LogLevel::Debug, || {
                    format!("Read from VDP port {:02X}", port)
                });
                Ok(0xFFFF)
            }
        }
    }

    fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), BusError> {
        let addr = addr & ADDRESS_MASK;
        match addr {
            0x00_0000..=CART_END => self.memory.write_rom(addr, value),
            0xA1_0000..=0xA1_001F => self.io.write(addr, value),
            0xA1_1100 => self.write_bus_request(value),
            0xA1_1200 => self.write_z80_reset(value),
            0xA1_1000..=0xA1_1001 | 0xA1_1101 | 0xA1_1201 => {}
            0xA1_3000..=0xA1_30FF | 0xA1_4000..=0xA1_4003 => {
                log(LogCategory::Stubs, LogLevel::Debug, || {
                    format!("Cartridge control write {:02X} at {:06X} dropped", value, addr)
                });
            }
            0xA0_0000..=0xA0_7FFF => self.z80.memory.write(addr as u16 & 0x7FFF, value),
            0xA0_8000..=0xA0_FFFF => {
                log(LogCategory::Z80, LogLevel::Debug, || {
                    format!("68000 write {:02X} to Z80 space {:06X} dropped", value, addr)
                });
            }
            0xC0_0000..=0xC0_001F => match addr & 0x1F {
                0x00..=0x03 => self.vdp.write_data_byte(value),
                0x04..=0x07 => self.vdp.write_control(value as u16 * 0x0101)?,
                0x11 | 0x13 | 0x15 | 0x17 => {
                    log(LogCategory::Stubs, LogLevel::Debug, || {
                        format!("PSG write {:02X} dropped", value)
                    });
                }
                _ => {}
            },
            0xE0_0000..=0xFF_FFFF => self.memory.write_ram(addr, value),
            _ => return Err(Self::unmapped(addr, true)),
        }
        Ok(())
    }

    fn write_word(&mut self, addr: u32, value: u16) -> Result<(), BusError> {
        let addr = addr & ADDRESS_MASK;
        let [high, low] = value.to_be_bytes();
        match addr {
            0x00_0000..=CART_END => {
                log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("Ignoring ROM write {:04X} at {:06X}", value, addr)
                });
            }
            0xA1_0000..=0xA1_001F => self.io.write(addr | 1, low),
            0xA1_1100..=0xA1_1101 => self.write_bus_request(high),
            0xA1_1200..=0xA1_1201 => self.write_z80_reset(high),
            // Word writes into Z80 space only carry the high byte
            0xA0_0000..=0xA0_FFFF => self.write_byte(addr, high)?,
            0xC0_0000..=0xC0_001F => match addr & 0x1F {
                0x00..=0x03 => self.vdp.write_data(value),
                0x04..=0x07 => self.vdp.write_control(value)?,
                _ => self.write_byte(addr | 1, low)?,
            },
            0xE0_0000..=0xFF_FFFF => {
                self.memory.write_ram(addr, high);
                self.memory.write_ram(addr + 1, low);
            }
            _ => {
                self.write_byte(addr, high)?;
                self.write_byte(addr + 1, low)?;
            }
        }
        Ok(())
    }
}

impl Memory68k for GenesisBus {
    fn read(&mut self, addr: u32, size: Size) -> Result<u32, BusError> {
        match size {
            Size::Byte => Ok(self.read_byte(addr)? as u32),
            Size::Word => Ok(self.read_word(addr)? as u32),
            Size::Long => {
                let high = self.read_word(addr)? as u32;
                let low = self.read_word(addr.wrapping_add(2))? as u32;
                Ok((high << 16) | low)
            }
        }
    }

    fn write(&mut self, addr: u32, value: u32, size: Size) -> Result<(), BusError> {
        match size {
            Size::Byte => self.write_byte(addr, value as u8),
            Size::Word => self.write_word(addr, value as u16),
            Size::Long => {
                self.write_word(addr, (value >> 16) as u16)?;
                self.write_word(addr.wrapping_add(2), value as u16)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus_with_rom(rom: &[u8]) -> GenesisBus {
        GenesisBus::new(Arc::from(rom), &GenesisConfig::default())
    }

    fn bus() -> GenesisBus {
        bus_with_rom(&[0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x04, 0x00])
    }

    #[test]
    fn test_rom_reads_big_endian() {
        let mut bus = bus();
        assert_eq!(bus.read(0, Size::Long).unwrap(), 0x0000_FF00);
        assert_eq!(bus.read(4, Size::Long).unwrap(), 0x0000_0400);
        assert_eq!(bus.read(2, Size::Word).unwrap(), 0xFF00);
        assert_eq!(bus.read(2, Size::Byte).unwrap(), 0xFF);
    }

    #[test]
    fn test_rom_past_image_and_writes() {
        let mut bus = bus();
        assert_eq!(bus.read(0x1000, Size::Word).unwrap(), 0xFFFF);
        bus.write(0, 0x1234, Size::Word).unwrap();
        bus.write(1, 0x99, Size::Byte).unwrap();
        assert_eq!(bus.read(0, Size::Word).unwrap(), 0x0000);
    }

    #[test]
    fn test_ram_and_mirror() {
        let mut bus = bus();
        bus.write(0xFF_0000, 0xDEAD_BEEF, Size::Long).unwrap();
        assert_eq!(bus.read(0xFF_0000, Size::Long).unwrap(), 0xDEAD_BEEF);
        assert_eq!(bus.read(0xE0_0002, Size::Word).unwrap(), 0xBEEF);
        assert_eq!(bus.read(0xFE_0001, Size::Byte).unwrap(), 0xAD);
    }

    #[test]
    fn test_address_bus_is_24_bits() {
        let mut bus = bus();
        bus.write(0xFFFF_0010, 0x42, Size::Byte).unwrap();
        assert_eq!(bus.read(0x00FF_0010, Size::Byte).unwrap(), 0x42);
    }

    #[test]
    fn test_unmapped_is_fatal() {
        let mut bus = bus();
        assert_eq!(
            bus.read(0x80_0000, Size::Word),
            Err(BusError::Unmapped {
                address: 0x80_0000,
                write: false
            })
        );
        assert_eq!(
            bus.write(0xB0_0000, 0, Size::Byte),
            Err(BusError::Unmapped {
                address: 0xB0_0000,
                write: true
            })
        );
    }

    #[test]
    fn test_version_and_controller_ports() {
        let mut bus = bus();
        assert_eq!(bus.read(0xA1_0001, Size::Byte).unwrap(), 0xA0);
        assert_eq!(bus.read(0xA1_0000, Size::Word).unwrap(), 0xA0A0);

        bus.set_controller(
            0,
            ControllerState {
                b: true,
                ..Default::default()
            },
        );
        bus.write(0xA1_0009, 0x40, Size::Byte).unwrap();
        bus.write(0xA1_0003, 0x40, Size::Byte).unwrap();
        assert_eq!(bus.read(0xA1_0003, Size::Byte).unwrap(), 0x6F);
        // Word access lands on the odd register
        bus.write(0xA1_0002, 0x0000, Size::Word).unwrap();
        assert_eq!(bus.read(0xA1_0002, Size::Word).unwrap(), 0x3333);
    }

    #[test]
    fn test_z80_handshake() {
        let mut bus = bus();
        assert!(bus.z80_in_reset());
        assert!(!bus.z80_running());
        assert_eq!(bus.read(0xA1_1100, Size::Word).unwrap(), 0x0100);

        bus.write(0xA1_1100, 0x0100, Size::Word).unwrap();
        assert!(bus.z80_bus_requested());
        assert_eq!(bus.read(0xA1_1100, Size::Word).unwrap() & 0x0100, 0);

        bus.write(0xA1_1200, 0x0100, Size::Word).unwrap();
        assert!(!bus.z80_in_reset());
        assert!(!bus.z80_running());

        bus.write(0xA1_1100, 0x0000, Size::Word).unwrap();
        assert!(bus.z80_running());
    }

    #[test]
    fn test_z80_reset_needs_the_bus() {
        let mut bus = bus();
        bus.write(0xA1_1200, 0x01, Size::Byte).unwrap();
        bus.z80_mut().pc = 0x1234;

        // Ignored while the Z80 owns its bus
        bus.write(0xA1_1200, 0x00, Size::Byte).unwrap();
        assert!(bus.z80_running());
        assert_eq!(bus.z80().pc, 0x1234);

        bus.write(0xA1_1100, 0x01, Size::Byte).unwrap();
        bus.write(0xA1_1200, 0x00, Size::Byte).unwrap();
        assert!(bus.z80_in_reset());
        assert_eq!(bus.z80().pc, 0);
    }

    #[test]
    fn test_z80_ram_through_window() {
        let mut bus = bus();
        bus.write(0xA0_0010, 0xC3, Size::Byte).unwrap();
        bus.write(0xA0_0011, 0x3412, Size::Word).unwrap();
        assert_eq!(bus.z80().memory.read(0x0010), 0xC3);
        assert_eq!(bus.z80().memory.read(0x0011), 0x34);
        assert_eq!(bus.read(0xA0_2010, Size::Byte).unwrap(), 0xC3);
        assert_eq!(bus.read(0xA0_0010, Size::Word).unwrap(), 0xC3C3);
        // YM2612 stub
        bus.write(0xA0_4000, 0x2B, Size::Byte).unwrap();
        assert_eq!(bus.read(0xA0_4000, Size::Byte).unwrap(), 0);
    }

    #[test]
    fn test_stub_registers_accept_writes() {
        let mut bus = bus();
        bus.write(0xA1_4000, 0x5345_4741, Size::Long).unwrap();
        bus.write(0xA1_30F1, 0x01, Size::Byte).unwrap();
        bus.write(0xC0_0011, 0x9F, Size::Byte).unwrap();
        bus.write(0xA1_1000, 0x0000, Size::Word).unwrap();
    }

    #[test]
    fn test_memory_mode_register_reads_zero() {
        let mut bus = bus();
        bus.write(0xA1_1000, 0x0100, Size::Word).unwrap();
        assert_eq!(bus.read(0xA1_1000, Size::Word).unwrap(), 0);
        assert_eq!(bus.read(0xA1_1000, Size::Byte).unwrap(), 0);
        assert_eq!(bus.read(0xA1_1001, Size::Byte).unwrap(), 0);
    }

    #[test]
    fn test_vdp_ports() {
        let mut bus = bus();
        // Auto-increment 2, then a VRAM write command for 0x0000 as one long
        bus.write(0xC0_0004, 0x8F02, Size::Word).unwrap();
        bus.write(0xC0_0004, 0x4000_0000, Size::Long).unwrap();
        bus.write(0xC0_0000, 0x1234_5678, Size::Long).unwrap();
        // Both words are still in the FIFO
        assert_eq!(bus.read(0xC0_0004, Size::Word).unwrap() & 0x0200, 0);
        assert_eq!(bus.vdp().fifo_len(), 2);

        bus.write(0xC0_0004, 0x0000_0000, Size::Long).unwrap();
        assert_eq!(bus.read(0xC0_0000, Size::Word).unwrap(), 0x1234);
        assert_eq!(bus.read(0xC0_0002, Size::Word).unwrap(), 0x5678);
        assert_eq!(&bus.vdp().vram()[0..4], &[0x12, 0x34, 0x56, 0x78]);

        let status = bus.read(0xC0_0004, Size::Word).unwrap();
        assert_eq!(status & 0x0200, 0x0200);
        assert_eq!(bus.read(0xC0_0008, Size::Word).unwrap(), 0x0000);
    }

    #[test]
    fn test_malformed_dma_surfaces_as_bus_error() {
        let mut bus = bus();
        bus.write(0xC0_0004, 0x8114, Size::Word).unwrap();
        let err = bus.write(0xC0_0004, 0x0000_0080, Size::Long).unwrap_err();
        assert!(matches!(err, BusError::Vdp(_)));
    }

    #[test]
    fn test_memory_dma_reads_source_through_bus() {
        let mut bus = bus();
        bus.write(0xFF_0100, 0x1111_2222, Size::Long).unwrap();

        for reg in [
            0x8114u16, // DMA enable
            0x8F02,    // auto-increment 2
            0x9302,    // length 2 words
            0x9400,
            0x9580, // source 0xFF0100 >> 1 = 0x7F8080
            0x9680,
            0x977F,
        ] {
            bus.write(0xC0_0004, reg as u32, Size::Word).unwrap();
        }
        bus.write(0xC0_0004, 0x4000_0080, Size::Long).unwrap();
        assert!(bus.vdp().dma_holds_cpu());

        bus.dma_step().unwrap();
        bus.dma_step().unwrap();
        assert!(!bus.vdp().dma_active());
        assert_eq!(&bus.vdp().vram()[0..4], &[0x11, 0x11, 0x22, 0x22]);

        // Nothing armed: a further step is a no-op
        bus.dma_step().unwrap();
    }

    #[test]
    fn test_reset_restores_power_on_state() {
        let mut bus = bus();
        bus.write(0xFF_0000, 0x55, Size::Byte).unwrap();
        bus.write(0xA1_1200, 0x01, Size::Byte).unwrap();
        bus.reset();
        assert_eq!(bus.read(0xFF_0000, Size::Byte).unwrap(), 0);
        assert!(bus.z80_in_reset());
    }
}
