//! Dispatcher & Synchronization (spec §4.6, §5): owns the per-transfer
//! sequencing around the Protocol Engine — lock already held by the
//! caller, STOP settling, clock programming, the completion wait (either
//! flavor), timeout recovery, and final error classification.

use core::cell::Cell;

use crate::clock::{self, ClockConfig};
use crate::engine::{self, StepOutcome};
use crate::error;
use crate::message::Message;
use crate::platform::Platform;
use crate::registers::I2CPeripheral;
use crate::trace::TraceRecorder;
use crate::transfer::TransferState;
use kernel::hil::i2c::Error;

/// The interrupt handshake (spec §3, §9): single-writer (engine), single-
/// reader (dispatcher). `Waiting` is only ever set by the dispatcher right
/// before enabling interrupts, and only the dispatcher clears it again, so
/// a plain `Cell` behind the bus lock is enough.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Handshake {
    Idle,
    Waiting,
    Done,
}

impl Default for Handshake {
    fn default() -> Self {
        Handshake::Idle
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Timeout {
    base_us: u32,
    per_byte_us: u32,
}

impl Timeout {
    /// `static-timeout`: a fixed deadline regardless of transfer size.
    pub const fn fixed(seconds: u32, milliseconds: u32) -> Self {
        Timeout {
            base_us: seconds * 1_000_000 + milliseconds * 1_000,
            per_byte_us: 0,
        }
    }

    /// `dynamic-timeout`: a base plus a caller-supplied per-byte allowance.
    pub const fn scaled(base_ms: u32, per_byte_us: u32) -> Self {
        Timeout {
            base_us: base_ms * 1_000,
            per_byte_us,
        }
    }

    fn deadline_us(&self, now_us: u32, total_bytes: usize) -> u32 {
        let budget = self
            .base_us
            .saturating_add(self.per_byte_us.saturating_mul(total_bytes as u32));
        now_us.wrapping_add(budget)
    }
}

/// How long dispatcher step 2 will wait for a lingering STOP to clear
/// before giving up and proceeding anyway (spec §7: "logged but do not
/// fail the transfer preamble").
const STOP_SETTLE_TIMEOUT_US: u32 = 25_000;

/// The FSMC/I2C1 LBAR conflict workaround (spec §6, §9): an optional
/// pre/post hook so the core path carries no trace of it on chips that
/// don't share the resource. Compiled out entirely unless the
/// `fsmc-workaround` feature is on (and `lib.rs` requires `i2c1` with it,
/// since the conflict is specific to that port).
#[cfg(feature = "fsmc-workaround")]
pub trait FsmcWorkaround {
    fn suspend(&self);
    fn resume(&self);
}

/// `lifecycle::Instance`/`Dispatcher` store the FSMC collaborator as this:
/// a real optional hook with the feature on, a zero-size unit with it off.
#[cfg(feature = "fsmc-workaround")]
pub type FsmcSlot<'a> = Option<&'a dyn FsmcWorkaround>;
#[cfg(not(feature = "fsmc-workaround"))]
pub type FsmcSlot<'a> = ();

pub struct Dispatcher<'a> {
    pub regs: &'a dyn I2CPeripheral,
    /// A second borrow of the same register block through the narrower
    /// interface the Clock Programmer needs. Kept distinct from `regs`
    /// because `I2CPeripheral` and `clock::I2CPeripheralRegs` are separate
    /// trait objects over the same concrete `Registers`.
    pub clock_regs: &'a dyn clock::I2CPeripheralRegs,
    pub platform: &'a dyn Platform,
    pub fsmc: FsmcSlot<'a>,
}

impl<'a> Dispatcher<'a> {
    /// Runs one complete transfer (spec §4.6 steps 1-10; step 1, acquiring
    /// the bus lock, is the caller's responsibility — see
    /// `lifecycle::Instance::transfer`).
    pub fn process(
        &self,
        state: &mut TransferState,
        msgs: &mut [Message],
        trace: &mut TraceRecorder,
        handshake: &Cell<Handshake>,
        clock: ClockConfig,
        timeout: Timeout,
    ) -> Result<(), Error> {
        let interrupt_mode = cfg!(feature = "dispatch-interrupt");

        self.pre_transfer_settle();

        self.regs.clear_sr1();
        self.regs.clear_start_stop_pec();

        trace.clear();
        clock::apply(self.clock_regs, clock);
        state.arm(msgs.len());

        handshake.set(Handshake::Idle);
        self.regs.set_start();

        if interrupt_mode {
            self.regs.enable_event_interrupts();
            handshake.set(Handshake::Waiting);
        }

        let total_bytes: usize = msgs.iter().map(|m| m.buffer.len()).sum();
        let deadline = timeout.deadline_us(self.platform.now_us(), total_bytes);

        let timed_out = if interrupt_mode {
            self.wait_on_handshake(handshake, deadline)
        } else {
            self.poll_until_done(state, msgs, trace, deadline)
        };

        if interrupt_mode {
            self.regs.disable_all_interrupts();
        }

        let result = if timed_out {
            self.regs.clear_start_stop_pec();
            if !interrupt_mode {
                self.regs.set_stop();
            }
            Err(Error::TimedOut)
        } else if state.protocol_error {
            Err(Error::Protocol)
        } else {
            let sr1 = self.regs.read_sr1();
            let sr2 = self.regs.read_sr2();
            match error::classify(sr1, sr2) {
                Some(e) => Err(e),
                None => Ok(()),
            }
        };

        trace.dump();
        handshake.set(Handshake::Idle);

        self.post_transfer_settle();

        result
    }

    /// STOP will not complete while FSMC is suspending I2C1's clock, so
    /// with the workaround enabled the settle wait is deferred to
    /// `post_transfer_settle` instead of running here.
    #[cfg(feature = "fsmc-workaround")]
    fn pre_transfer_settle(&self) {
        match self.fsmc {
            Some(fsmc) => fsmc.suspend(),
            None => self.wait_for_stop_settle(),
        }
    }

    #[cfg(not(feature = "fsmc-workaround"))]
    fn pre_transfer_settle(&self) {
        self.wait_for_stop_settle();
    }

    #[cfg(feature = "fsmc-workaround")]
    fn post_transfer_settle(&self) {
        if let Some(fsmc) = self.fsmc {
            self.wait_for_stop_settle();
            fsmc.resume();
        }
    }

    #[cfg(not(feature = "fsmc-workaround"))]
    fn post_transfer_settle(&self) {}

    fn wait_for_stop_settle(&self) {
        let deadline = self.platform.now_us().wrapping_add(STOP_SETTLE_TIMEOUT_US);
        while self.regs.stop_pending() && !self.regs.read_sr1().timeout {
            if self.platform.now_us() >= deadline {
                break;
            }
        }
    }

    /// Interrupt mode: the engine itself runs from ISR context elsewhere
    /// and writes `Done`; this just bounds how long the caller's thread of
    /// control waits for it to happen (spec §5's rendezvous).
    fn wait_on_handshake(&self, handshake: &Cell<Handshake>, deadline_us: u32) -> bool {
        loop {
            if handshake.get() == Handshake::Done {
                return false;
            }
            if self.platform.now_us() >= deadline_us {
                return true;
            }
        }
    }

    fn poll_until_done(
        &self,
        state: &mut TransferState,
        msgs: &mut [Message],
        trace: &mut TraceRecorder,
        deadline_us: u32,
    ) -> bool {
        loop {
            let now = self.platform.now_us();
            if engine::step(self.regs, state, msgs, trace, now, false) == StepOutcome::Done {
                return false;
            }
            if now >= deadline_us {
                return true;
            }
        }
    }
}
