//! Centralized logging configuration for the emulator.
//!
//! Every diagnostic emitted by the CPU cores, the bus, the VDP and the DMA
//! engine goes through [`log`]. Levels are configured per category with a
//! global fallback, so a front end can turn on e.g. interrupt tracing without
//! drowning in bus traffic.
//!
//! # Architecture
//!
//! - **LogConfig**: Thread-safe global configuration using atomic operations
//! - **LogLevel**: Hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: One category per emulated component
//! - **log()**: Common logging function for all output with async file I/O
//!
//! Logging is off by default. When disabled a call costs two relaxed atomic
//! loads and the message closure is never evaluated.
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{log, LogLevel, LogCategory};
//!
//! log(LogCategory::M68k, LogLevel::Debug, || {
//!     format!("68000: RTE to PC={:06X}", 0x1234)
//! });
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Log category for different emulator components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// 68000 instruction execution
    M68k,
    /// Z80 instruction execution and bus handshake
    Z80,
    /// Address decoding on the main bus
    Bus,
    /// VDP register and port traffic
    Vdp,
    /// VDP DMA transfers
    Dma,
    /// Interrupt delivery
    Interrupts,
    /// Unimplemented hardware that is accepted and ignored
    Stubs,
}

const CATEGORY_COUNT: usize = 7;

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::M68k,
        LogCategory::Z80,
        LogCategory::Bus,
        LogCategory::Vdp,
        LogCategory::Dma,
        LogCategory::Interrupts,
        LogCategory::Stubs,
    ];

    /// Parse a category name as used on the command line (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "m68k" | "68k" | "cpu" => Some(LogCategory::M68k),
            "z80" => Some(LogCategory::Z80),
            "bus" => Some(LogCategory::Bus),
            "vdp" => Some(LogCategory::Vdp),
            "dma" => Some(LogCategory::Dma),
            "int" | "interrupts" => Some(LogCategory::Interrupts),
            "stubs" => Some(LogCategory::Stubs),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            LogCategory::M68k => 0,
            LogCategory::Z80 => 1,
            LogCategory::Bus => 2,
            LogCategory::Vdp => 3,
            LogCategory::Dma => 4,
            LogCategory::Interrupts => 5,
            LogCategory::Stubs => 6,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding a logging lock must not disable logging for good.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sliding one-second window of one category
#[derive(Default)]
struct Window {
    stamps: VecDeque<Instant>,
    dropped: usize,
    last_report: Option<Instant>,
}

impl Window {
    fn expire(&mut self, now: Instant) {
        while let Some(&front) = self.stamps.front() {
            if now.duration_since(front) <= RATE_WINDOW {
                break;
            }
            self.stamps.pop_front();
        }
    }

    /// Hands out the accumulated drop count, at most once per window
    fn take_dropped(&mut self, now: Instant, force: bool) -> Option<usize> {
        let due = force
            || self
                .last_report
                .map_or(true, |last| now.duration_since(last) >= RATE_WINDOW);
        if self.dropped == 0 || !due {
            return None;
        }
        self.last_report = Some(now);
        Some(std::mem::take(&mut self.dropped))
    }
}

const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Per-category rate limiter
struct RateLimiter {
    max_per_window: AtomicUsize,
    windows: Mutex<[Window; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_per_window: AtomicUsize::new(max_logs_per_second),
            windows: Mutex::new(std::array::from_fn(|_| Window::default())),
        }
    }

    /// Whether the message may go out, plus a drop count to report if one is due
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let max = self.max_per_window.load(Ordering::Relaxed);
        let mut windows = lock(&self.windows);
        let window = &mut windows[category.index()];

        window.expire(now);
        if window.stamps.len() < max {
            window.stamps.push_back(now);
            (true, window.take_dropped(now, true))
        } else {
            window.dropped += 1;
            (false, window.take_dropped(now, false))
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    category_levels: [AtomicU8; CATEGORY_COUNT],
    log_sender: Mutex<Option<Sender<String>>>,
    file_logging_enabled: AtomicBool,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// Create a new LogConfig with all logging disabled and a rate limit of 60 logs/second
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: std::array::from_fn(|_| AtomicU8::new(LogLevel::Off as u8)),
            log_sender: Mutex::new(None),
            file_logging_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    /// Set the global log level (applies to all categories unless overridden)
    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category-specific level wins; categories left at Off fall back to the global level.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Set the maximum logs per second per category
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .max_per_window
            .store(max_logs_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_per_window.load(Ordering::Relaxed)
    }

    /// Route log output to a file written by a background thread.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
                let _ = file.flush();
            })?;

        *lock(&self.log_sender) = Some(sender);
        self.file_logging_enabled.store(true, Ordering::Relaxed);

        Ok(())
    }

    /// Stop logging to file; the writer thread exits once the sender is dropped.
    pub fn clear_log_file(&self) {
        *lock(&self.log_sender) = None;
        self.file_logging_enabled.store(false, Ordering::Relaxed);
    }

    fn write_message(&self, message: &str) {
        if self.file_logging_enabled.load(Ordering::Relaxed) {
            let log_sender = lock(&self.log_sender);
            match log_sender.as_ref() {
                Some(sender) if sender.send(message.to_string()).is_ok() => {}
                _ => eprintln!("{}", message),
            }
        } else {
            eprintln!("{}", message);
        }
    }
}

/// Log a message with the specified category and level
///
/// The message closure is only evaluated when the category/level is enabled
/// and the per-category rate limit allows it. When messages are dropped a
/// summary line is emitted at most once per second.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if config.should_log(category, level) {
        let (allowed, dropped_count) = config.rate_limiter.should_allow(category);

        if let Some(count) = dropped_count {
            if count > 0 {
                let warning = format!(
                    "[{:?}] WARNING: Rate limit exceeded, {} log message(s) dropped in the last second",
                    category, count
                );
                config.write_message(&warning);
            }
        }

        if allowed {
            let message = message_fn();
            config.write_message(&format!("[{:?}] {}", category, message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("ERR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("invalid"), None);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(LogCategory::from_str("68k"), Some(LogCategory::M68k));
        assert_eq!(LogCategory::from_str("Z80"), Some(LogCategory::Z80));
        assert_eq!(LogCategory::from_str("dma"), Some(LogCategory::Dma));
        assert_eq!(LogCategory::from_str("int"), Some(LogCategory::Interrupts));
        assert_eq!(LogCategory::from_str("psg"), None);
    }

    #[test]
    fn test_category_indices_are_distinct() {
        let mut seen = [false; CATEGORY_COUNT];
        for category in LogCategory::ALL {
            assert!(!seen[category.index()]);
            seen[category.index()] = true;
        }
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_should_log_with_category_level() {
        let config = LogConfig::new();
        config.set_level(LogCategory::Vdp, LogLevel::Info);

        assert!(config.should_log(LogCategory::Vdp, LogLevel::Error));
        assert!(config.should_log(LogCategory::Vdp, LogLevel::Info));
        assert!(!config.should_log(LogCategory::Vdp, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Error));
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::M68k, LogLevel::Debug);

        assert!(config.should_log(LogCategory::M68k, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Warn));
        assert!(config.should_log(LogCategory::Bus, LogLevel::Error));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Dma, LogLevel::Debug);

        config.reset();

        assert_eq!(config.get_global_level(), LogLevel::Off);
        assert_eq!(config.get_level(LogCategory::Dma), LogLevel::Off);
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit_per_category() {
        let limiter = RateLimiter::new(60);

        for _ in 0..60 {
            let (allowed, _) = limiter.should_allow(LogCategory::Z80);
            assert!(allowed);
        }

        let (allowed, _) = limiter.should_allow(LogCategory::Z80);
        assert!(!allowed, "61st message in the window must be dropped");

        let (allowed, _) = limiter.should_allow(LogCategory::Interrupts);
        assert!(allowed, "other categories have their own window");
    }

    #[test]
    fn test_rate_limiter_reports_dropped_count() {
        let limiter = RateLimiter::new(5);

        for _ in 0..5 {
            limiter.should_allow(LogCategory::Bus);
        }
        // The first drop reports immediately (count 1), the rest accumulate.
        for _ in 0..10 {
            limiter.should_allow(LogCategory::Bus);
        }

        std::thread::sleep(Duration::from_millis(1100));

        let (allowed, dropped) = limiter.should_allow(LogCategory::Bus);
        assert!(allowed);
        assert_eq!(dropped, Some(9));
    }
}
