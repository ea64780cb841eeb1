//! Sega Genesis main system implementation

use crate::bus::GenesisBus;
use crate::io::ControllerState;
use crate::vdp::VdpEvents;
use crate::GenesisError;
use emu_core::cpu_m68k::CpuM68k;
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::renderer::{NullSink, PixelSink};
use emu_core::trace::{RingTrace, TraceEntry};
use emu_core::types::Frame;
use emu_core::{MountPointInfo, System};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Vertical interrupt priority and autovector (vector 30 sits at 0x78)
const VINT_LEVEL: u8 = 6;
const VINT_VECTOR: u8 = 30;

/// Z80 clock relative to the 68000 clock: 3.58 MHz / 7.67 MHz
const Z80_CLOCK_NUM: i64 = 7;
const Z80_CLOCK_DEN: i64 = 15;

/// Byte the Z80 sees on the data bus when it acknowledges INT
const Z80_INT_DATA: u8 = 0xFF;

/// Machine timing and feature switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    /// 68000 cycles per scanline
    pub cycles_per_line: u32,
    /// Scanlines per frame (262 for NTSC)
    pub lines_per_frame: u32,
    /// First line of vertical blank, where VINT is raised
    pub vblank_line: u32,
    /// 68000 cycles charged for each word of a 68000 to VDP transfer
    pub dma_cycles_per_word: u32,
    /// Run the Z80 at all
    pub z80_enabled: bool,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            cycles_per_line: 488,
            lines_per_frame: 262,
            vblank_line: 224,
            dma_cycles_per_word: 4,
            z80_enabled: true,
        }
    }
}

/// Sega Genesis emulator
pub struct GenesisSystem {
    cpu: CpuM68k<GenesisBus>,
    config: GenesisConfig,
    sink: Box<dyn PixelSink>,
    mounted: bool,
    /// Ring size for instruction traces; 0 leaves tracing off
    trace_depth: usize,
    /// Z80 cycles owed, scaled by `Z80_CLOCK_DEN`
    z80_budget: i64,
    frames: u64,
}

impl GenesisSystem {
    pub fn new() -> Self {
        Self::with_config(GenesisConfig::default())
    }

    pub fn with_config(config: GenesisConfig) -> Self {
        let bus = GenesisBus::new(Arc::from(Vec::new()), &config);
        Self {
            cpu: CpuM68k::new(bus),
            config,
            sink: Box::new(NullSink),
            mounted: false,
            trace_depth: 0,
            z80_budget: 0,
            frames: 0,
        }
    }

    /// Insert a cartridge and power on
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), GenesisError> {
        if data.len() < 8 {
            return Err(GenesisError::RomTooSmall(data.len()));
        }
        self.cpu = CpuM68k::new(GenesisBus::new(Arc::from(data), &self.config));
        self.mounted = true;
        self.install_traces();
        log(LogCategory::Bus, LogLevel::Info, || {
            format!("Cartridge loaded: {} bytes", data.len())
        });
        self.reset()
    }

    /// Keep the last `depth` instructions of each CPU for post-mortem dumps
    pub fn enable_trace(&mut self, depth: usize) {
        self.trace_depth = depth;
        self.install_traces();
    }

    fn install_traces(&mut self) {
        if self.trace_depth == 0 {
            return;
        }
        self.cpu.set_trace(Box::new(RingTrace::new(self.trace_depth)));
        self.cpu
            .memory
            .z80_mut()
            .set_trace(Box::new(RingTrace::new(self.trace_depth)));
    }

    /// Traced instructions, 68000 first, each oldest first
    pub fn recent_trace(&self) -> Vec<TraceEntry> {
        let mut entries = self.cpu.trace().recent();
        entries.extend(self.cpu.memory.z80().trace().recent());
        entries
    }

    pub fn set_controller(&mut self, port: usize, state: ControllerState) {
        self.cpu.memory.set_controller(port, state);
    }

    pub fn set_pixel_sink(&mut self, sink: Box<dyn PixelSink>) {
        log(LogCategory::Vdp, LogLevel::Debug, || {
            format!("Pixel sink: {}", sink.name())
        });
        self.sink = sink;
    }

    pub fn config(&self) -> &GenesisConfig {
        &self.config
    }

    pub fn cpu(&self) -> &CpuM68k<GenesisBus> {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CpuM68k<GenesisBus> {
        &mut self.cpu
    }

    pub fn bus(&self) -> &GenesisBus {
        &self.cpu.memory
    }

    pub fn bus_mut(&mut self) -> &mut GenesisBus {
        &mut self.cpu.memory
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Deliver the vertical interrupt if it is pending and not masked.
    /// Returns the cycles spent on exception processing.
    pub fn check_interrupts(&mut self) -> Result<u32, GenesisError> {
        if !self.cpu.memory.vdp().vint_pending() || self.cpu.interrupt_mask() > VINT_LEVEL {
            return Ok(0);
        }
        let from = self.cpu.pc;
        let cycles = self.cpu.interrupt(VINT_LEVEL, VINT_VECTOR)?;
        self.cpu.memory.vdp_mut().clear_vint();
        log(LogCategory::Interrupts, LogLevel::Debug, || {
            format!("VINT taken at {:06X}, handler {:06X}", from, self.cpu.pc)
        });
        Ok(cycles)
    }

    /// One slice of the machine: a 68000 instruction (or a DMA unit while
    /// the 68000 is held), the Z80's share of those cycles, interrupt
    /// delivery, then the VDP beam.
    pub fn tick(&mut self) -> Result<VdpEvents, GenesisError> {
        let mut cycles = if self.cpu.memory.vdp().dma_holds_cpu() {
            self.cpu.memory.dma_step()?;
            self.config.dma_cycles_per_word
        } else {
            let cycles = self.cpu.step()?;
            // Fills and copies run alongside the 68000
            let vdp = self.cpu.memory.vdp();
            if vdp.dma_active() && !vdp.dma_holds_cpu() {
                self.cpu.memory.dma_step()?;
            }
            cycles
        };

        self.step_z80(cycles)?;
        cycles += self.check_interrupts()?;

        let events = self.cpu.memory.vdp_mut().advance(cycles);
        if events.vblank_start && self.z80_active() {
            let taken = self.cpu.memory.z80_mut().interrupt(Z80_INT_DATA);
            if taken > 0 {
                log(LogCategory::Interrupts, LogLevel::Trace, || {
                    "Z80 INT taken".to_string()
                });
            }
        }
        Ok(events)
    }

    fn z80_active(&self) -> bool {
        self.config.z80_enabled && self.cpu.memory.z80_running()
    }

    /// Run the Z80 for its share of `cycles` 68000 cycles
    fn step_z80(&mut self, cycles: u32) -> Result<(), GenesisError> {
        if !self.z80_active() {
            self.z80_budget = 0;
            return Ok(());
        }
        self.z80_budget += cycles as i64 * Z80_CLOCK_NUM;
        while self.z80_budget > 0 {
            let used = self.cpu.memory.z80_mut().step()?;
            self.z80_budget -= used as i64 * Z80_CLOCK_DEN;
        }
        Ok(())
    }

    fn report_fatal(&self, err: &GenesisError) {
        let category = match err {
            GenesisError::Z80(_) => LogCategory::Z80,
            _ => LogCategory::M68k,
        };
        log(category, LogLevel::Error, || format!("Emulation stopped: {}", err));
        for entry in self.recent_trace() {
            log(category, LogLevel::Error, || format!("  {}", entry));
        }
    }

    /// Snapshot of CPU and VDP registers for `--dump-state`
    pub fn debug_state(&self) -> Value {
        let cpu = &self.cpu;
        let bus = &self.cpu.memory;
        let z80 = bus.z80();
        let vdp = bus.vdp();
        serde_json::json!({
            "frames": self.frames,
            "config": self.config,
            "m68k": {
                "pc": cpu.pc,
                "sr": cpu.sr,
                "d": cpu.d,
                "a": cpu.a,
                "usp": cpu.user_sp(),
                "ssp": cpu.supervisor_sp(),
                "cycles": cpu.cycles,
            },
            "z80": {
                "pc": z80.pc,
                "sp": z80.sp,
                "af": z80.af(),
                "bc": z80.bc(),
                "de": z80.de(),
                "hl": z80.hl(),
                "ix": z80.ix,
                "iy": z80.iy,
                "iff1": z80.iff1,
                "im": z80.im,
                "halted": z80.halted,
                "bank": z80.memory.bank(),
                "bus_requested": bus.z80_bus_requested(),
                "reset": bus.z80_in_reset(),
            },
            "vdp": {
                "registers": vdp.registers(),
                "address": vdp.address(),
                "code": vdp.code(),
                "scanline": vdp.scanline(),
                "vint_pending": vdp.vint_pending(),
                "dma_active": vdp.dma_active(),
                "fifo": vdp.fifo_len(),
            },
        })
    }
}

impl Default for GenesisSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for GenesisSystem {
    type Error = GenesisError;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.cpu.memory.reset();
        self.z80_budget = 0;
        self.frames = 0;
        if !self.mounted {
            return Err(GenesisError::NoCartridge);
        }
        self.cpu.initialize()?;
        log(LogCategory::M68k, LogLevel::Debug, || {
            format!("Reset: SSP {:08X} PC {:08X}", self.cpu.a[7], self.cpu.pc)
        });
        Ok(())
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        if !self.mounted {
            return Err(GenesisError::NoCartridge);
        }
        loop {
            match self.tick() {
                Ok(events) if events.frame_done => break,
                Ok(_) => {}
                Err(err) => {
                    self.report_fatal(&err);
                    return Err(err);
                }
            }
        }
        self.frames += 1;

        let frame = self.cpu.memory.vdp_mut().render_frame();
        self.sink.present(frame);
        Ok(frame.clone())
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: "cartridge".to_string(),
            name: "Cartridge Slot".to_string(),
            extensions: vec!["md".to_string(), "bin".to_string(), "gen".to_string()],
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != "cartridge" {
            return Err(GenesisError::InvalidMountPoint(mount_point_id.to_string()));
        }
        self.load_rom(data)
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != "cartridge" {
            return Err(GenesisError::InvalidMountPoint(mount_point_id.to_string()));
        }
        self.cpu = CpuM68k::new(GenesisBus::new(Arc::from(Vec::new()), &self.config));
        self.mounted = false;
        self.install_traces();
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == "cartridge" && self.mounted
    }
}
