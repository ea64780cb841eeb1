//! Sega Genesis Video Display Processor (YM7101) port engine
//!
//! The 68000 talks to the VDP through two ports:
//!
//! - **Control port** (0xC00004): register writes (`100R RRRR VVVV VVVV`) and
//!   two-word commands that set the access address and the 6-bit access code
//! - **Data port** (0xC00000): reads and writes at the current address, which
//!   then advances by register 0x0F
//!
//! Command layout:
//!
//! ```text
//! first:  CD1 CD0 A13 A12 A11 A10 A9 A8 A7 A6 A5 A4 A3 A2 A1 A0
//! second:   0   0   0   0   0   0  0  0 CD5 CD4 CD3 CD2 0 0 A15 A14
//! ```
//!
//! CD3-CD0 select the target (VRAM, CRAM or VSRAM, read or write). CD5 arms
//! a DMA when register 1 allows it; register 0x17 picks the mode.
//!
//! # FIFO
//!
//! Data-port writes wait in a four-entry FIFO. One entry lands per
//! [`advance`](Vdp::advance) or DMA unit. A data-port read, a fifth write or
//! the start of a DMA lands them all first.
//!
//! # DMA
//!
//! Every mode moves one unit per [`GenesisBus::dma_step`](crate::GenesisBus::dma_step):
//! a word for 68000 to VDP transfers, a byte for fills and copies. The length
//! (0x13-0x14) and source (0x15-0x17) registers are written back after each
//! unit, so they always show where the transfer stands.
//!
//! Only the backdrop colour is rendered; planes and sprites are not.

use crate::system::GenesisConfig;
use emu_core::cpu_m68k::BusError;
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::types::Frame;
use std::collections::VecDeque;

pub const FRAME_WIDTH: u32 = 320;
pub const FRAME_HEIGHT: u32 = 256;

const VRAM_SIZE: usize = 0x10000;
const CRAM_ENTRIES: usize = 64;
const VSRAM_ENTRIES: usize = 40;
const REGISTER_COUNT: usize = 24;
const FIFO_DEPTH: usize = 4;

/// Cycles at the end of each line reported as horizontal blank
const HBLANK_CYCLES: u32 = 92;

/// Unused status bits read back as the upper half of a NOP
const STATUS_FIXED: u16 = 0x3400;
const STATUS_FIFO_EMPTY: u16 = 0x0200;
const STATUS_FIFO_FULL: u16 = 0x0100;
const STATUS_VINT: u16 = 0x0080;
const STATUS_VBLANK: u16 = 0x0008;
const STATUS_HBLANK: u16 = 0x0004;
const STATUS_DMA: u16 = 0x0002;

/// DMA sub-mode selected by register 0x17 bits 7-6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaMode {
    /// 68000 memory to VRAM/CRAM/VSRAM; the 68000 is held until done
    MemoryToVram,
    /// Repeat the high byte of the next data-port word across VRAM
    Fill,
    /// VRAM to VRAM, byte by byte
    Copy,
}

#[derive(Debug, Clone, Copy)]
struct Dma {
    mode: DmaMode,
    remaining: u32,
    /// Fill byte; a fill stays parked until the data port supplies it
    fill: Option<u8>,
}

impl Dma {
    fn running(&self) -> bool {
        !(self.mode == DmaMode::Fill && self.fill.is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Vram,
    Cram,
    Vsram,
}

/// A data-port write waiting to reach VDP memory
#[derive(Debug, Clone, Copy)]
struct FifoEntry {
    target: Target,
    address: u16,
    value: u16,
}

fn write_target(code: u8) -> Option<Target> {
    match code & 0x0F {
        0x1 => Some(Target::Vram),
        0x3 => Some(Target::Cram),
        0x5 => Some(Target::Vsram),
        _ => None,
    }
}

/// Expand a CRAM word (`----BBB-GGG-RRR-`) to ARGB8888
pub fn decode_color(word: u16) -> u32 {
    let expand = |c: u16| ((c as u32 & 7) + 1) * 32 - 1;
    let r = expand(word >> 1);
    let g = expand(word >> 5);
    let b = expand(word >> 9);
    0xFF00_0000 | (r << 16) | (g << 8) | b
}

/// Things that happened while the beam advanced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VdpEvents {
    /// The beam entered the vertical blanking interval
    pub vblank_start: bool,
    /// The last line of the frame finished
    pub frame_done: bool,
}

#[derive(Debug, Clone)]
pub struct Vdp {
    vram: Box<[u8]>,
    cram: [u16; CRAM_ENTRIES],
    vsram: [u16; VSRAM_ENTRIES],
    registers: [u8; REGISTER_COUNT],

    /// VRAM write address, also used by data-port reads
    address_register: u16,
    /// CRAM and VSRAM writes advance their own address
    cram_address: u16,
    vsram_address: u16,
    code_register: u8,
    /// First command word, waiting for the second
    pending_command: Option<u16>,
    /// First half of a byte-wide CRAM/VSRAM write
    byte_latch: Option<u8>,
    /// First of a pair of CRAM/VSRAM word writes
    word_latch: Option<u16>,
    fifo: VecDeque<FifoEntry>,
    dma: Option<Dma>,

    // Decoded from registers 0 and 1
    hint_enabled: bool,
    display_enabled: bool,
    vint_enabled: bool,
    dma_enabled: bool,

    vint_pending: bool,
    vblank: bool,
    scanline: u32,
    line_cycles: u32,

    cycles_per_line: u32,
    lines_per_frame: u32,
    vblank_line: u32,

    frame: Frame,
}

impl Vdp {
    pub fn new(config: &GenesisConfig) -> Self {
        Self {
            vram: vec![0; VRAM_SIZE].into_boxed_slice(),
            cram: [0; CRAM_ENTRIES],
            vsram: [0; VSRAM_ENTRIES],
            registers: [0; REGISTER_COUNT],
            address_register: 0,
            cram_address: 0,
            vsram_address: 0,
            code_register: 0,
            pending_command: None,
            byte_latch: None,
            word_latch: None,
            fifo: VecDeque::with_capacity(FIFO_DEPTH),
            dma: None,
            hint_enabled: false,
            display_enabled: false,
            vint_enabled: false,
            dma_enabled: false,
            vint_pending: false,
            vblank: false,
            scanline: 0,
            line_cycles: 0,
            cycles_per_line: config.cycles_per_line.max(1),
            lines_per_frame: config.lines_per_frame.max(1),
            vblank_line: config.vblank_line,
            frame: Frame::new(FRAME_WIDTH, FRAME_HEIGHT),
        }
    }

    pub fn reset(&mut self) {
        self.vram.fill(0);
        self.cram = [0; CRAM_ENTRIES];
        self.vsram = [0; VSRAM_ENTRIES];
        self.registers = [0; REGISTER_COUNT];
        self.address_register = 0;
        self.cram_address = 0;
        self.vsram_address = 0;
        self.code_register = 0;
        self.pending_command = None;
        self.byte_latch = None;
        self.word_latch = None;
        self.fifo.clear();
        self.dma = None;
        self.hint_enabled = false;
        self.display_enabled = false;
        self.vint_enabled = false;
        self.dma_enabled = false;
        self.vint_pending = false;
        self.vblank = false;
        self.scanline = 0;
        self.line_cycles = 0;
        self.frame.pixels.fill(0);
    }

    pub fn register(&self, index: usize) -> u8 {
        self.registers.get(index).copied().unwrap_or(0)
    }

    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn cram(&self) -> &[u16] {
        &self.cram
    }

    pub fn vsram(&self) -> &[u16] {
        &self.vsram
    }

    pub fn address(&self) -> u16 {
        self.address_register
    }

    pub fn code(&self) -> u8 {
        self.code_register
    }

    /// Writes queued and not yet committed to VDP memory
    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    pub fn scanline(&self) -> u32 {
        self.scanline
    }

    pub fn display_enabled(&self) -> bool {
        self.display_enabled
    }

    pub fn vint_enabled(&self) -> bool {
        self.vint_enabled
    }

    pub fn hint_enabled(&self) -> bool {
        self.hint_enabled
    }

    pub fn dma_enabled(&self) -> bool {
        self.dma_enabled
    }

    pub fn in_vblank(&self) -> bool {
        self.vblank
    }

    fn auto_increment(&self) -> u16 {
        self.registers[0x0F] as u16
    }

    fn write_register(&mut self, index: usize, value: u8) {
        if index >= REGISTER_COUNT {
            log(LogCategory::Vdp, LogLevel::Debug, || {
                format!("Write {:02X} to nonexistent register {}", value, index)
            });
            return;
        }
        self.registers[index] = value;
        match index {
            0 => self.hint_enabled = value & 0x10 != 0,
            1 => {
                self.display_enabled = value & 0x40 != 0;
                self.vint_enabled = value & 0x20 != 0;
                self.dma_enabled = value & 0x10 != 0;
            }
            _ => {}
        }
        log(LogCategory::Vdp, LogLevel::Trace, || {
            format!("R{:02X} = {:02X}", index, value)
        });
    }

    /// Write a word to the control port.
    ///
    /// Fails when a DMA is armed with an access code that cannot be its
    /// destination.
    pub fn write_control(&mut self, value: u16) -> Result<(), BusError> {
        let Some(first) = self.pending_command.take() else {
            if value & 0xE000 == 0x8000 {
                self.write_register(((value >> 8) & 0x1F) as usize, value as u8);
                return Ok(());
            }
            // The first word takes effect on its own; the second completes it
            self.pending_command = Some(value);
            self.address_register = (self.address_register & 0xC000) | (value & 0x3FFF);
            self.code_register = (self.code_register & 0x3C) | ((value >> 14) as u8 & 0x03);
            return Ok(());
        };

        self.address_register = (first & 0x3FFF) | ((value & 0x0003) << 14);
        self.code_register = ((first >> 14) as u8 & 0x03) | ((value >> 2) as u8 & 0x3C);
        self.byte_latch = None;
        if let Some(word) = self.word_latch.take() {
            log(LogCategory::Vdp, LogLevel::Debug, || {
                format!("Unpaired CRAM/VSRAM word {:04X} dropped by new command", word)
            });
        }
        match write_target(self.code_register) {
            Some(Target::Cram) => self.cram_address = self.address_register,
            Some(Target::Vsram) => self.vsram_address = self.address_register,
            _ => {}
        }
        log(LogCategory::Vdp, LogLevel::Trace, || {
            format!(
                "Command: code {:02X} address {:04X}",
                self.code_register, self.address_register
            )
        });

        if self.code_register & 0x20 != 0 {
            if self.dma_enabled {
                self.arm_dma()?;
            } else {
                log(LogCategory::Dma, LogLevel::Debug, || {
                    "DMA bit set while DMA is disabled in R01; ignored".to_string()
                });
            }
        }
        Ok(())
    }

    fn dma_length(&self) -> u32 {
        let len = self.registers[0x13] as u32 | (self.registers[0x14] as u32) << 8;
        if len == 0 {
            0x10000
        } else {
            len
        }
    }

    fn arm_dma(&mut self) -> Result<(), BusError> {
        let mode = match self.registers[0x17] >> 6 {
            0 | 1 => DmaMode::MemoryToVram,
            2 => DmaMode::Fill,
            _ => DmaMode::Copy,
        };
        let target = write_target(self.code_register);
        match (mode, target) {
            (DmaMode::MemoryToVram, None) => {
                return Err(BusError::Vdp(format!(
                    "68k DMA armed with non-write access code {:02X}",
                    self.code_register
                )))
            }
            (DmaMode::Fill, t) if t != Some(Target::Vram) => {
                return Err(BusError::Vdp(format!(
                    "VRAM fill armed with access code {:02X}",
                    self.code_register
                )))
            }
            _ => {}
        }

        // A transfer starts from an empty FIFO
        self.flush_fifo();
        let remaining = self.dma_length();
        self.dma = Some(Dma {
            mode,
            remaining,
            fill: None,
        });
        log(LogCategory::Dma, LogLevel::Debug, || {
            let source = match mode {
                DmaMode::MemoryToVram => self.dma_source(),
                _ => self.copy_source() as u32,
            };
            format!(
                "{:?} armed: source {:06X} length {:X} destination {:04X} (code {:02X})",
                mode, source, remaining, self.address_register, self.code_register
            )
        });
        Ok(())
    }

    /// Write a word to the data port.
    ///
    /// The word joins the FIFO; a full FIFO stalls the 68000 until every
    /// queued write has landed. CRAM and VSRAM take words in pairs: the first
    /// is held and the second commits both.
    pub fn write_data(&mut self, value: u16) {
        self.pending_command = None;
        if let Some(dma) = self.dma.as_mut() {
            if dma.mode == DmaMode::Fill && dma.fill.is_none() {
                dma.fill = Some((value >> 8) as u8);
                log(LogCategory::Dma, LogLevel::Debug, || {
                    format!("Fill value {:02X}", value >> 8)
                });
            }
        }
        match write_target(self.code_register) {
            Some(Target::Cram) | Some(Target::Vsram) => match self.word_latch.take() {
                None => self.word_latch = Some(value),
                Some(first) => {
                    self.port_write(first);
                    self.port_write(value);
                }
            },
            _ => self.port_write(value),
        }
    }

    /// Byte write to the data port. VRAM sees the byte on both halves of the
    /// bus; CRAM and VSRAM collect two bytes before committing.
    pub fn write_data_byte(&mut self, value: u8) {
        match write_target(self.code_register) {
            Some(Target::Cram) | Some(Target::Vsram) => match self.byte_latch.take() {
                None => self.byte_latch = Some(value),
                Some(high) => {
                    self.pending_command = None;
                    self.port_write(((high as u16) << 8) | value as u16);
                }
            },
            _ => self.write_data(((value as u16) << 8) | value as u16),
        }
    }

    fn port_write(&mut self, value: u16) {
        if self.fifo.len() >= FIFO_DEPTH {
            log(LogCategory::Vdp, LogLevel::Trace, || {
                "FIFO full; 68000 waits for it to drain".to_string()
            });
            self.flush_fifo();
        }
        self.enqueue(value);
    }

    /// Queue a write at the target's address and advance that address
    fn enqueue(&mut self, value: u16) {
        let Some(target) = write_target(self.code_register) else {
            log(LogCategory::Vdp, LogLevel::Warn, || {
                format!(
                    "Data write {:04X} with read code {:02X} dropped",
                    value, self.code_register
                )
            });
            return;
        };
        let increment = self.auto_increment();
        let address = match target {
            Target::Vram => &mut self.address_register,
            Target::Cram => &mut self.cram_address,
            Target::Vsram => &mut self.vsram_address,
        };
        self.fifo.push_back(FifoEntry {
            target,
            address: *address,
            value,
        });
        *address = address.wrapping_add(increment);
    }

    /// Commit the oldest queued write, if any
    fn drain_one(&mut self) -> bool {
        match self.fifo.pop_front() {
            Some(entry) => {
                self.commit(entry);
                true
            }
            None => false,
        }
    }

    /// Commit every queued write
    pub fn flush_fifo(&mut self) {
        while self.drain_one() {}
    }

    fn commit(&mut self, entry: FifoEntry) {
        match entry.target {
            Target::Vram => {
                let addr = entry.address as usize;
                self.vram[addr] = (entry.value >> 8) as u8;
                self.vram[addr ^ 1] = entry.value as u8;
            }
            Target::Cram => {
                self.cram[(entry.address as usize >> 1) & (CRAM_ENTRIES - 1)] = entry.value & 0x0EEE;
            }
            Target::Vsram => {
                if let Some(slot) = self.vsram.get_mut(entry.address as usize >> 1) {
                    *slot = entry.value & 0x07FF;
                }
            }
        }
    }

    /// Read a word from the data port
    pub fn read_data(&mut self) -> u16 {
        self.pending_command = None;
        self.flush_fifo();
        let addr = self.address_register as usize;
        let value = match self.code_register & 0x0F {
            0x0 => ((self.vram[addr & !1] as u16) << 8) | self.vram[addr | 1] as u16,
            0x8 => self.cram[(addr >> 1) & (CRAM_ENTRIES - 1)],
            0x4 => self.vsram.get(addr >> 1).copied().unwrap_or(0),
            code => {
                log(LogCategory::Vdp, LogLevel::Warn, || {
                    format!("Data read with write code {:02X}", code)
                });
                0
            }
        };
        self.address_register = self.address_register.wrapping_add(self.auto_increment());
        value
    }

    /// Read the status register. Also abandons a half-written command.
    pub fn read_status(&mut self) -> u16 {
        self.pending_command = None;
        let mut status = STATUS_FIXED;
        if self.fifo.is_empty() {
            status |= STATUS_FIFO_EMPTY;
        }
        if self.fifo.len() >= FIFO_DEPTH {
            status |= STATUS_FIFO_FULL;
        }
        if self.vint_pending {
            status |= STATUS_VINT;
        }
        if self.vblank || !self.display_enabled {
            status |= STATUS_VBLANK;
        }
        if self.line_cycles + HBLANK_CYCLES >= self.cycles_per_line {
            status |= STATUS_HBLANK;
        }
        if self.dma_active() {
            status |= STATUS_DMA;
        }
        status
    }

    /// Beam position: line in the high byte, horizontal position in the low
    pub fn hv_counter(&self) -> u16 {
        let v = (self.scanline & 0xFF) as u16;
        let h = (self.line_cycles * 256 / self.cycles_per_line) as u16 & 0xFF;
        (v << 8) | h
    }

    pub fn vint_pending(&self) -> bool {
        self.vint_pending
    }

    /// Interrupt acknowledge
    pub fn clear_vint(&mut self) {
        self.vint_pending = false;
    }

    /// Raise the vertical interrupt as if vblank had just started
    pub fn raise_vint(&mut self) {
        self.vint_pending = true;
    }

    /// A transfer is moving data (an armed fill still waiting for its value
    /// does not count)
    pub fn dma_active(&self) -> bool {
        self.dma.is_some_and(|d| d.running())
    }

    /// Mode of the running transfer
    pub fn dma_mode(&self) -> Option<DmaMode> {
        self.dma.filter(|d| d.running()).map(|d| d.mode)
    }

    /// The 68000 is off the bus while a 68000 to VDP transfer runs
    pub fn dma_holds_cpu(&self) -> bool {
        self.dma_mode() == Some(DmaMode::MemoryToVram)
    }

    /// 68000 byte address of the next word of a memory transfer
    pub fn dma_source(&self) -> u32 {
        ((self.registers[0x17] as u32 & 0x7F) << 17)
            | ((self.registers[0x16] as u32) << 9)
            | ((self.registers[0x15] as u32) << 1)
    }

    fn copy_source(&self) -> u16 {
        self.registers[0x15] as u16 | (self.registers[0x16] as u16) << 8
    }

    fn set_source_low(&mut self, value: u16) {
        self.registers[0x15] = value as u8;
        self.registers[0x16] = (value >> 8) as u8;
    }

    /// One unit of a 68000 to VDP transfer; `word` was read from
    /// [`dma_source`](Self::dma_source) by the bus
    pub fn dma_transfer_word(&mut self, word: u16) {
        if !self.dma_holds_cpu() {
            return;
        }
        self.enqueue(word);
        self.drain_one();
        // The source wraps inside its 128 KB block
        let next = self.copy_source().wrapping_add(1);
        self.set_source_low(next);
        self.finish_unit();
    }

    /// One byte of a fill or copy
    pub fn dma_step_vram(&mut self) {
        let Some(dma) = self.dma.filter(|d| d.running()) else {
            return;
        };
        // The data-port write that started a fill lands before its first byte
        if self.drain_one() {
            return;
        }
        let addr = self.address_register as usize;
        match (dma.mode, dma.fill) {
            (DmaMode::Fill, Some(value)) => self.vram[addr] = value,
            (DmaMode::Copy, _) => {
                let source = self.copy_source();
                self.vram[addr] = self.vram[source as usize];
                self.set_source_low(source.wrapping_add(1));
            }
            _ => return,
        }
        self.address_register = self.address_register.wrapping_add(self.auto_increment());
        self.finish_unit();
    }

    /// Count down the length registers; ends the transfer at zero
    fn finish_unit(&mut self) {
        let Some(dma) = self.dma.as_mut() else {
            return;
        };
        dma.remaining = dma.remaining.saturating_sub(1);
        let remaining = dma.remaining;
        self.registers[0x13] = remaining as u8;
        self.registers[0x14] = (remaining >> 8) as u8;
        if remaining == 0 {
            let mode = dma.mode;
            self.dma = None;
            self.code_register &= !0x20;
            log(LogCategory::Dma, LogLevel::Debug, || {
                format!("{:?} complete at {:04X}", mode, self.address_register)
            });
        }
    }

    /// Move the beam forward by `cycles` 68000 cycles
    pub fn advance(&mut self, cycles: u32) -> VdpEvents {
        let mut events = VdpEvents::default();
        self.drain_one();
        self.line_cycles += cycles;
        while self.line_cycles >= self.cycles_per_line {
            self.line_cycles -= self.cycles_per_line;
            self.scanline += 1;

            if self.scanline == self.vblank_line {
                self.vblank = true;
                events.vblank_start = true;
                if self.vint_enabled {
                    self.vint_pending = true;
                    log(LogCategory::Interrupts, LogLevel::Trace, || {
                        "VINT raised".to_string()
                    });
                }
            }
            if self.scanline >= self.lines_per_frame {
                self.scanline = 0;
                self.vblank = false;
                events.frame_done = true;
            }
        }
        events
    }

    pub fn cram_color(&self, index: usize) -> u32 {
        decode_color(self.cram[index & (CRAM_ENTRIES - 1)])
    }

    /// Paint the frame with the backdrop colour (register 7), or black while
    /// the display is off
    pub fn render_frame(&mut self) -> &Frame {
        self.flush_fifo();
        let color = if self.display_enabled {
            self.cram_color(self.registers[7] as usize & 0x3F)
        } else {
            0xFF00_0000
        };
        self.frame.pixels.fill(color);
        &self.frame
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}
