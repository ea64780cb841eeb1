//! Instruction trace sinks
//!
//! Each CPU core reports every fetched instruction to a [`TraceSink`]. The
//! default [`NullTrace`] throws entries away; [`RingTrace`] keeps the last N
//! so the instructions leading up to a fatal error can be dumped.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Which core produced a trace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceCpu {
    M68k,
    Z80,
}

/// One executed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub cpu: TraceCpu,
    /// Address of the opcode
    pub pc: u32,
    /// First opcode word (68000) or byte(s) including prefix (Z80)
    pub opcode: u32,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cpu {
            TraceCpu::M68k => write!(f, "68k {:06X}: {:04X}", self.pc, self.opcode),
            TraceCpu::Z80 => write!(f, "z80 {:04X}: {:02X}", self.pc, self.opcode),
        }
    }
}

pub trait TraceSink: fmt::Debug + Send {
    fn record(&mut self, entry: TraceEntry);

    /// Oldest first.
    fn recent(&self) -> Vec<TraceEntry> {
        Vec::new()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    #[inline]
    fn record(&mut self, _entry: TraceEntry) {}
}

/// Bounded history of the most recent instructions.
#[derive(Debug, Clone)]
pub struct RingTrace {
    entries: VecDeque<TraceEntry>,
    capacity: usize,
}

impl RingTrace {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl TraceSink for RingTrace {
    fn record(&mut self, entry: TraceEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    fn recent(&self) -> Vec<TraceEntry> {
        self.entries.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pc: u32) -> TraceEntry {
        TraceEntry {
            cpu: TraceCpu::M68k,
            pc,
            opcode: 0x4E71,
        }
    }

    #[test]
    fn null_trace_keeps_nothing() {
        let mut t = NullTrace;
        t.record(entry(0x200));
        assert!(t.recent().is_empty());
    }

    #[test]
    fn ring_trace_keeps_last_entries_in_order() {
        let mut t = RingTrace::new(3);
        for pc in [0x200, 0x202, 0x204, 0x206, 0x208] {
            t.record(entry(pc));
        }
        let pcs: Vec<u32> = t.recent().iter().map(|e| e.pc).collect();
        assert_eq!(pcs, vec![0x204, 0x206, 0x208]);
    }

    #[test]
    fn zero_capacity_ring_records_nothing() {
        let mut t = RingTrace::new(0);
        t.record(entry(0x200));
        assert!(t.recent().is_empty());
    }

    #[test]
    fn entries_format_per_cpu() {
        let e = TraceEntry {
            cpu: TraceCpu::Z80,
            pc: 0x38,
            opcode: 0xED,
        };
        assert_eq!(e.to_string(), "z80 0038: ED");
        assert_eq!(entry(0x400).to_string(), "68k 000400: 4E71");
    }

    #[test]
    fn entries_serialize_for_state_dumps() {
        let json = serde_json::to_string(&entry(0x400)).unwrap();
        assert_eq!(json, r#"{"cpu":"M68k","pc":1024,"opcode":20081}"#);
        let back: TraceEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry(0x400));
    }
}
