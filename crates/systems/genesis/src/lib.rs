//! Sega Genesis / Mega Drive emulator implementation
//!
//! This crate implements the console around the reusable CPU cores in
//! `emu_core`.
//!
//! # Architecture
//!
//! - **Main CPU**: Motorola 68000 @ 7.67 MHz, owns the [`GenesisBus`]
//! - **Sound CPU**: Zilog Z80 @ 3.58 MHz with 8 KB of private RAM
//! - **VDP**: Yamaha YM7101; port protocol, VRAM/CRAM/VSRAM and DMA
//! - **RAM**: 64 KB work RAM at 0xFF0000, mirrored from 0xE00000
//! - **I/O**: two 3-button pads behind the TH-multiplexed data ports
//!
//! The YM2612 and PSG are register stubs. Tile and sprite rendering is left to
//! the pixel sink; the VDP only produces the backdrop colour.
//!
//! # Memory map (68000 side)
//!
//! | Range | Device |
//! |---|---|
//! | 0x000000-0x3FFFFF | Cartridge ROM |
//! | 0xA00000-0xA0FFFF | Z80 address space |
//! | 0xA10000-0xA1001F | Version, controller data and control ports |
//! | 0xA11100 / 0xA11200 | Z80 bus request / reset |
//! | 0xC00000-0xC0001F | VDP ports |
//! | 0xE00000-0xFFFFFF | Work RAM (64 KB mirrored) |

mod bus;
mod io;
mod memory;
mod system;
mod vdp;
mod z80_memory;

pub use bus::GenesisBus;
pub use io::ControllerState;
pub use system::{GenesisConfig, GenesisSystem};
pub use vdp::{decode_color, DmaMode, Vdp, VdpEvents};
pub use z80_memory::Z80Memory;

use emu_core::cpu_m68k::{BusError, M68kError};
use emu_core::cpu_z80::Z80Error;
use thiserror::Error;

/// Genesis emulator errors. Every variant ends the session.
#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("68000: {0}")]
    M68k(#[from] M68kError),
    #[error("Z80: {0}")]
    Z80(#[from] Z80Error),
    #[error("bus: {0}")]
    Bus(#[from] BusError),
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error("No cartridge loaded")]
    NoCartridge,
    #[error("ROM image is {0} bytes; the vector table alone needs 8")]
    RomTooSmall(usize),
}
