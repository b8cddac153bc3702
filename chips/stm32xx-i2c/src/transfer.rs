//! Transfer State (spec §3, §4.4).
//!
//! The source's `dcnt == -1` sentinel ("between messages, the next engine
//! entry shall advance to the next message") is replaced with the tagged
//! `Phase` enum Design Notes (spec §9) ask for, rather than a signed
//! counter doubling as a state tag.

use crate::message::{Message, MessageFlags};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No transfer in progress; also the state terminal handling leaves
    /// things in once a transfer completes.
    Idle,
    /// `dcnt == -1` with the transfer still live: either there is another
    /// message to latch (`msg_count > 0`), or the chain just finished and
    /// this tick's terminal handling should run (`msg_count == 0`).
    PendingNextMessage,
    /// `dcnt >= 0`: mid-message, `remaining` bytes left to move.
    InFlight { remaining: usize },
}

pub struct TransferState {
    pub phase: Phase,
    /// Index of the message currently transferring ("ptr"'s message, i.e.
    /// `msgv` at the moment it was latched).
    active: Option<usize>,
    /// Index of the next message to latch ("msgv" after it has been
    /// advanced ahead of the in-flight one).
    next: usize,
    /// Messages remaining including the current one ("msgc").
    pub msg_count: usize,
    /// Byte offset into the active message's buffer ("ptr").
    byte_index: usize,
    pub total_msg_len: usize,
    pub flags: MessageFlags,
    pub check_addr_ack: bool,
    /// SR1 | (SR2 << 16) snapshot captured at terminal events.
    pub status: u32,
    /// Set when the engine hits a message-chain combination spec.md's
    /// write-completion and 10-bit-address branches call "unrecognized" —
    /// a bug in the caller's chain, not a bus condition, so it overrides
    /// whatever `error::classify` would otherwise read off SR1/SR2.
    pub protocol_error: bool,
}

impl TransferState {
    pub const fn new() -> Self {
        TransferState {
            phase: Phase::Idle,
            active: None,
            next: 0,
            msg_count: 0,
            byte_index: 0,
            total_msg_len: 0,
            flags: MessageFlags::empty(),
            check_addr_ack: false,
            status: 0,
            protocol_error: false,
        }
    }

    /// Installs a fresh chain and arms the engine to emit START on the
    /// next step (spec §4.6 step 6: "dcnt = -1 ... emit START").
    pub fn arm(&mut self, msg_count: usize) {
        self.phase = Phase::PendingNextMessage;
        self.active = None;
        self.next = 0;
        self.msg_count = msg_count;
        self.byte_index = 0;
        self.total_msg_len = 0;
        self.flags = MessageFlags::empty();
        self.check_addr_ack = false;
        self.status = 0;
        self.protocol_error = false;
    }

    pub fn remaining(&self) -> Option<usize> {
        match self.phase {
            Phase::InFlight { remaining } => Some(remaining),
            _ => None,
        }
    }

    pub fn set_remaining(&mut self, remaining: usize) {
        self.phase = Phase::InFlight { remaining };
    }

    /// Message-advance prelude (spec §4.4 / §4.5a). Latches the message at
    /// `next`, decrements `msg_count`, and — unless that was the last
    /// message — advances `next` so the write-completion branch can read
    /// the *following* message's flags off of it.
    pub fn latch_next(&mut self, msgs: &[Message]) {
        let idx = self.next;
        let msg = &msgs[idx];
        self.total_msg_len = msg.buffer.len();
        self.flags = msg.flags;
        self.active = Some(idx);
        self.byte_index = 0;
        self.phase = Phase::InFlight {
            remaining: msg.buffer.len(),
        };

        self.msg_count -= 1;
        if self.msg_count > 0 {
            self.next += 1;
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn next_index(&self) -> usize {
        self.next
    }

    pub fn byte_index(&self) -> usize {
        self.byte_index
    }

    pub fn advance_byte_index(&mut self) {
        self.byte_index += 1;
    }

    /// Terminal handling (spec §4.5, run every engine entry after branch
    /// selection): marks the chain fully finished. Clears `msgv` (P1: "msgv
    /// is cleared").
    pub fn finish(&mut self) {
        self.phase = Phase::Idle;
        self.active = None;
        self.next = 0;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::PendingNextMessage) && self.msg_count == 0
    }
}

impl Default for TransferState {
    fn default() -> Self {
        Self::new()
    }
}
