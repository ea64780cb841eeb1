use anyhow::{anyhow, Context, Result};
use clap::Parser;
use emu_core::logging::{LogCategory, LogConfig, LogLevel};
use emu_core::System;
use emu_genesis::GenesisSystem;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Headless Sega Genesis runner")]
struct Args {
    /// Cartridge image (.md, .bin or .gen)
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Level applied to every log category: off, error, warn, info, debug, trace
    #[arg(long, value_parser = parse_level)]
    log_level: Option<LogLevel>,

    /// Per-category override, e.g. --log vdp=debug (repeatable)
    #[arg(long = "log", value_parser = parse_category_level)]
    log: Vec<(LogCategory, LogLevel)>,

    /// Write core log lines to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Keep the last N executed instructions and print them on a fatal error
    #[arg(long, default_value_t = 0)]
    trace: usize,

    /// Write debug_state as JSON to this file after the run
    #[arg(long)]
    dump_state: Option<PathBuf>,

    /// Print frame size and the first pixels after every frame
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn parse_level(s: &str) -> Result<LogLevel, String> {
    LogLevel::from_str(s).ok_or_else(|| format!("unknown log level '{}'", s))
}

fn parse_category_level(s: &str) -> Result<(LogCategory, LogLevel), String> {
    let (category, level) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=LEVEL, got '{}'", s))?;
    let category =
        LogCategory::from_str(category).ok_or_else(|| format!("unknown category '{}'", category))?;
    Ok((category, parse_level(level)?))
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();
    if let Some(level) = args.log_level {
        config.set_global_level(level);
    }
    for &(category, level) in &args.log {
        config.set_level(category, level);
    }
    if let Some(path) = &args.log_file {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;

    let rom = fs::read(&args.rom).with_context(|| format!("reading {}", args.rom.display()))?;
    let mut sys = GenesisSystem::new();
    if args.trace > 0 {
        sys.enable_trace(args.trace);
    }
    sys.mount("cartridge", &rom)?;
    log::info!("loaded {} ({} bytes)", args.rom.display(), rom.len());

    for fnum in 1..=args.frames {
        let frame = match sys.step_frame() {
            Ok(frame) => frame,
            Err(e) => {
                let trace = sys.recent_trace();
                if !trace.is_empty() {
                    eprintln!("last {} instructions:", trace.len());
                    for entry in &trace {
                        eprintln!("  {}", entry);
                    }
                }
                return Err(anyhow!(e).context(format!("frame {}", fnum)));
            }
        };

        if args.debug {
            println!("Frame {}: {}x{}", fnum, frame.width, frame.height);
            let dump_len = std::cmp::min(16, frame.pixels.len());
            let mut out = String::new();
            for px in &frame.pixels[..dump_len] {
                out.push_str(&format!("{:08X} ", px));
            }
            println!("First {} pixels: {}", dump_len, out);
        }
    }
    log::info!("ran {} frames", sys.frame_count());

    if let Some(path) = &args.dump_state {
        let mut f = File::create(path)?;
        write!(f, "{}", serde_json::to_string_pretty(&sys.debug_state())?)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_category_overrides() {
        assert_eq!(
            parse_category_level("vdp=debug"),
            Ok((LogCategory::Vdp, LogLevel::Debug))
        );
        assert_eq!(
            parse_category_level("68k=TRACE"),
            Ok((LogCategory::M68k, LogLevel::Trace))
        );
        assert!(parse_category_level("vdp").is_err());
        assert!(parse_category_level("psg=info").is_err());
        assert!(parse_category_level("dma=loud").is_err());
    }

    #[test]
    fn args_accept_repeated_log_flags() {
        let args = Args::try_parse_from([
            "genesis",
            "game.md",
            "--frames",
            "3",
            "--log",
            "z80=warn",
            "--log",
            "bus=trace",
            "--trace",
            "32",
        ])
        .unwrap();
        assert_eq!(args.frames, 3);
        assert_eq!(args.log.len(), 2);
        assert_eq!(args.trace, 32);
        assert!(args.log_level.is_none());
        assert!(args.dump_state.is_none());
    }
}
