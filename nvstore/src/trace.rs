//! Store diagnostics
//!
//! Structured trace events kept in a fixed ring. Recording never allocates,
//! so the same log keeps working after ExitBootServices when the firmware
//! console and the pool allocator are gone.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::lifecycle::Phase;

/// Number of events retained.
pub const TRACE_CAPACITY: usize = 64;

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    Info,      // Normal operation info
    Success,   // Operation succeeded
    Warning,   // Non-critical issue
    Error,     // Operation failed
    Debug,     // Detailed debug info
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCategory {
    Header,    // Header validation / formatting
    Read,      // FVB reads
    Write,     // FVB writes
    Erase,     // Erase requests
    Lifecycle, // Init / device binding
    Runtime,   // Virtual address change
}

/// One trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    pub level: TraceLevel,
    pub category: TraceCategory,
    pub message: &'static str,
    pub lba: u64,
    pub offset: usize,
    pub phase: Phase,
}

impl TraceEvent {
    /// Format for display with prefix
    pub fn format_line(&self) -> String {
        let prefix = match self.level {
            TraceLevel::Info => "[INFO]",
            TraceLevel::Success => "[OK]",
            TraceLevel::Warning => "[WARN]",
            TraceLevel::Error => "[ERR]",
            TraceLevel::Debug => "[DBG]",
        };
        let rt = match self.phase {
            Phase::Boot => "",
            Phase::Runtime => " (rt)",
        };
        format!(
            "{}{} {} lba={:#x} off={:#x}",
            prefix, rt, self.message, self.lba, self.offset
        )
    }
}

/// Fixed-capacity event ring; the oldest event is dropped when full.
pub struct TraceLog {
    events: [Option<TraceEvent>; TRACE_CAPACITY],
    head: usize,
    len: usize,
    phase: Phase,
}

impl TraceLog {
    pub const fn new() -> Self {
        Self {
            events: [None; TRACE_CAPACITY],
            head: 0,
            len: 0,
            phase: Phase::Boot,
        }
    }

    /// Stamp subsequent events with `phase`.
    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn record(
        &mut self,
        level: TraceLevel,
        category: TraceCategory,
        message: &'static str,
        lba: u64,
        offset: usize,
    ) {
        let slot = (self.head + self.len) % TRACE_CAPACITY;
        self.events[slot] = Some(TraceEvent {
            level,
            category,
            message,
            lba,
            offset,
            phase: self.phase,
        });
        if self.len == TRACE_CAPACITY {
            self.head = (self.head + 1) % TRACE_CAPACITY;
        } else {
            self.len += 1;
        }
    }

    pub fn info(&mut self, category: TraceCategory, message: &'static str) {
        self.record(TraceLevel::Info, category, message, 0, 0);
    }

    pub fn success(&mut self, category: TraceCategory, message: &'static str) {
        self.record(TraceLevel::Success, category, message, 0, 0);
    }

    pub fn warning(&mut self, category: TraceCategory, message: &'static str) {
        self.record(TraceLevel::Warning, category, message, 0, 0);
    }

    /// Error at a specific location
    pub fn error_at(
        &mut self,
        category: TraceCategory,
        message: &'static str,
        lba: u64,
        offset: usize,
    ) {
        self.record(TraceLevel::Error, category, message, lba, offset);
    }

    /// Debug event at a specific location
    pub fn debug_at(
        &mut self,
        category: TraceCategory,
        message: &'static str,
        lba: u64,
        offset: usize,
    ) {
        self.record(TraceLevel::Debug, category, message, lba, offset);
    }

    /// Events, oldest first
    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> + '_ {
        (0..self.len).filter_map(move |i| self.events[(self.head + i) % TRACE_CAPACITY].as_ref())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get events filtered by level
    pub fn events_by_level(&self, level: TraceLevel) -> Vec<&TraceEvent> {
        self.events().filter(|e| e.level == level).collect()
    }

    /// Get events filtered by category
    pub fn events_by_category(&self, category: TraceCategory) -> Vec<&TraceEvent> {
        self.events().filter(|e| e.category == category).collect()
    }

    pub fn has_errors(&self) -> bool {
        self.events().any(|e| e.level == TraceLevel::Error)
    }

    pub fn clear(&mut self) {
        self.events = [None; TRACE_CAPACITY];
        self.head = 0;
        self.len = 0;
    }
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new()
    }
}
