//! Version register and the two controller ports at 0xA10000.
//!
//! A 3-button pad exposes eight buttons through six data lines. The TH line
//! (bit 6) selects which half is visible:
//!
//! ```text
//! TH = 1:  TH  C  B  Right Left Down Up
//! TH = 0:  TH  Start A  0  0  Down Up
//! ```
//!
//! Buttons are active low.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

/// Overseas NTSC console without the expansion unit
pub const VERSION: u8 = 0xA0;

const TH: u8 = 0x40;

/// Buttons held on one pad
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub c: bool,
    pub start: bool,
}

impl ControllerState {
    /// Input lines for the given TH level, active low, TH itself excluded
    fn lines(&self, th_high: bool) -> u8 {
        let bit = |pressed: bool, n: u8| if pressed { 0 } else { 1 << n };
        if th_high {
            bit(self.up, 0)
                | bit(self.down, 1)
                | bit(self.left, 2)
                | bit(self.right, 3)
                | bit(self.b, 4)
                | bit(self.c, 5)
        } else {
            bit(self.up, 0) | bit(self.down, 1) | bit(self.a, 4) | bit(self.start, 5)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Port {
    pad: ControllerState,
    /// Value last written by the 68000
    data: u8,
    /// Direction mask: set bits are driven by the 68000
    ctrl: u8,
}

impl Port {
    fn read(&self) -> u8 {
        let th_high = if self.ctrl & TH != 0 {
            self.data & TH != 0
        } else {
            // Pulled up when nobody drives it
            true
        };
        let input = self.pad.lines(th_high) | if th_high { TH } else { 0 };
        (input & !self.ctrl & 0x7F) | (self.data & (self.ctrl | 0x80))
    }
}

/// Registers at 0xA10001-0xA1001F (odd bytes)
#[derive(Debug, Clone, Default)]
pub struct IoPorts {
    ports: [Port; 3],
}

impl IoPorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        for port in &mut self.ports {
            port.data = 0;
            port.ctrl = 0;
        }
    }

    pub fn set_controller(&mut self, port: usize, state: ControllerState) {
        if let Some(p) = self.ports.get_mut(port) {
            p.pad = state;
        }
    }

    pub fn controller(&self, port: usize) -> Option<ControllerState> {
        self.ports.get(port).map(|p| p.pad)
    }

    /// Read a register; `offset` is the address within 0xA10000-0xA1001F.
    /// Even addresses mirror the odd register above them.
    pub fn read(&self, offset: u32) -> u8 {
        let reg = ((offset & 0x1F) >> 1) as usize;
        match reg {
            0 => VERSION,
            1..=3 => self.ports[reg - 1].read(),
            4..=6 => self.ports[reg - 4].ctrl,
            _ => {
                log(LogCategory::Stubs, LogLevel::Debug, || {
                    format!("Serial I/O register {:02X} read", offset & 0x1F)
                });
                0
            }
        }
    }

    pub fn write(&mut self, offset: u32, value: u8) {
        let reg = ((offset & 0x1F) >> 1) as usize;
        match reg {
            1..=3 => self.ports[reg - 1].data = value,
            4..=6 => self.ports[reg - 4].ctrl = value,
            _ => log(LogCategory::Stubs, LogLevel::Debug, || {
                format!("I/O register {:02X} write {:02X} dropped", offset & 0x1F, value)
            }),
        }
    }
}
