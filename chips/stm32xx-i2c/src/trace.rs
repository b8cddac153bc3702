//! Trace Recorder (spec §4.3): a bounded, allocation-free ring of
//! `(status, event, param, count, timestamp)` tuples for post-mortem
//! debugging. Pure observer — nothing here feeds back into the protocol
//! engine's decisions. Compiled out entirely when the `trace` feature is
//! off, per Design Notes' "zero footprint, zero timing perturbation".

/// Ring capacity. Spec §4.3 default.
pub const TRACE_CAPACITY: usize = 32;

/// Trace events the engine annotates entries with.
///
/// `Read2` and `ReadLastByte` are given distinct codes here; spec.md's
/// Design Notes flag that the original source collides them both on code
/// 72 — an unresolved Open Question there, not a behavior this driver
/// needs to reproduce bit-for-bit (see DESIGN.md).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    None = 0,
    Start = 1,
    SendAddr = 2,
    AddrAcked = 3,
    AddrNacked = 4,
    WriteByte = 5,
    WriteComplete = 6,
    ReadWait = 7,
    Read1 = 8,
    Read2 = 70,
    Read3Plus = 71,
    ReadLastByte = 72,
    Stop = 9,
    Shutdown = 10,
    StateError = 11,
    DeviceNotReady = 12,
    WriteFlagError = 13,
    ReadError = 14,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Entry {
    pub status: u32,
    pub count: u32,
    pub event: Option<EventCode>,
    pub param: u32,
    pub timestamp: u32,
}

/// Newtype so `Entry` can derive `Default` without requiring `Event` to
/// have a meaningless default variant.
pub type EventCode = Event;

impl Default for Event {
    fn default() -> Self {
        Event::None
    }
}

#[cfg(feature = "trace")]
pub struct TraceRecorder {
    entries: [Entry; TRACE_CAPACITY],
    len: usize,
    dropped: u32,
}

#[cfg(feature = "trace")]
impl TraceRecorder {
    pub const fn new() -> Self {
        TraceRecorder {
            entries: [Entry {
                status: 0,
                count: 0,
                event: None,
                param: 0,
                timestamp: 0,
            }; TRACE_CAPACITY],
            len: 0,
            dropped: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.dropped = 0;
    }

    /// Samples a status word. If it matches the current entry's status the
    /// entry's count is incremented in place; otherwise a new entry is
    /// opened (or the sample is dropped if the ring is full).
    pub fn sample(&mut self, status: u32, timestamp: u32) {
        if self.len > 0 && self.entries[self.len - 1].status == status {
            self.entries[self.len - 1].count += 1;
            return;
        }
        if self.len == TRACE_CAPACITY {
            self.dropped += 1;
            return;
        }
        self.entries[self.len] = Entry {
            status,
            count: 1,
            event: None,
            param: 0,
            timestamp,
        };
        self.len += 1;
    }

    /// Annotates the current (most recently opened) entry with an event.
    pub fn annotate(&mut self, event: Event, param: u32) {
        if let Some(entry) = self.entries[..self.len].last_mut() {
            entry.event = Some(event);
            entry.param = param;
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries[..self.len]
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Emits the ring through `debug!` for post-mortem inspection.
    pub fn dump(&self) {
        for (i, e) in self.entries().iter().enumerate() {
            kernel::debug!(
                "i2c trace[{}]: status={:#x} count={} event={:?} param={}",
                i,
                e.status,
                e.count,
                e.event,
                e.param
            );
        }
        if self.dropped > 0 {
            kernel::debug!("i2c trace: {} entries dropped (ring full)", self.dropped);
        }
    }
}

#[cfg(not(feature = "trace"))]
pub struct TraceRecorder;

#[cfg(not(feature = "trace"))]
impl TraceRecorder {
    pub const fn new() -> Self {
        TraceRecorder
    }

    #[inline(always)]
    pub fn clear(&mut self) {}
    #[inline(always)]
    pub fn sample(&mut self, _status: u32, _timestamp: u32) {}
    #[inline(always)]
    pub fn annotate(&mut self, _event: Event, _param: u32) {}
    #[inline(always)]
    pub fn dump(&self) {}
}

#[cfg(all(test, feature = "trace"))]
mod tests {
    use super::*;

    #[test]
    fn repeated_status_collapses_into_one_entry_with_growing_count() {
        let mut trace = TraceRecorder::new();
        trace.sample(0x01, 0);
        trace.sample(0x01, 1);
        trace.sample(0x01, 2);
        assert_eq!(trace.entries().len(), 1);
        assert_eq!(trace.entries()[0].count, 3);
    }

    #[test]
    fn status_change_opens_a_new_entry() {
        let mut trace = TraceRecorder::new();
        trace.sample(0x01, 0);
        trace.sample(0x02, 1);
        assert_eq!(trace.entries().len(), 2);
    }

    #[test]
    fn overflow_drops_and_is_reported_not_silently_discarded() {
        let mut trace = TraceRecorder::new();
        for i in 0..(TRACE_CAPACITY as u32 + 5) {
            trace.sample(i, i);
        }
        assert_eq!(trace.entries().len(), TRACE_CAPACITY);
        assert_eq!(trace.dropped(), 5);
    }
}
