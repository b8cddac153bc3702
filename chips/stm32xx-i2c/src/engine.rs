//! Protocol Engine (spec §4.5): the event-driven state machine that turns
//! one SR1 snapshot into the next register write. Shared verbatim by the
//! interrupt and polled dispatch paths; `step` never blocks and never
//! touches the completion handshake — that belongs to the dispatcher.
//!
//! Branches are tried in the priority order the peripheral's errata demand;
//! see each helper's doc comment for the hazard it exists to avoid.

use crate::message::{Message, MessageFlags};
use crate::registers::{I2CPeripheral, Sr1Bits};
use crate::trace::{Event, TraceRecorder};
use crate::transfer::{Phase, TransferState};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Terminal handling ran; `state.status` holds the final snapshot.
    Done,
    /// The transfer is still in progress.
    Continue,
    /// Polled mode only: no recognized condition this tick, spin again.
    NotReady,
}

/// Runs one engine entry. `timestamp` is only used to stamp trace samples.
pub fn step(
    regs: &dyn I2CPeripheral,
    state: &mut TransferState,
    msgs: &mut [Message],
    trace: &mut TraceRecorder,
    timestamp: u32,
    interrupt_mode: bool,
) -> StepOutcome {
    trace.sample(regs.combined_status(), timestamp);

    // (a) message-advance prelude
    if matches!(state.phase, Phase::PendingNextMessage) && state.msg_count > 0 {
        state.latch_next(msgs);
    }

    let sr1 = regs.read_sr1();

    if sr1.sb {
        // (b)
        start_generated(regs, state, msgs, trace);
    } else if interrupt_mode && !sr1.addr && state.check_addr_ack {
        // (c)
        address_nacked(regs, state, trace);
    } else if sr1.addr && state.flags.contains(MessageFlags::READ) && state.check_addr_ack {
        // (d)
        read_address_clear(regs, state, trace);
    } else if !state.flags.contains(MessageFlags::READ) && (sr1.addr || sr1.txe) {
        // (e)
        write_path(regs, state, msgs, trace, sr1);
    } else if state.flags.contains(MessageFlags::READ) && sr1.rxne {
        // (f)
        read_data_phase(regs, state, msgs, trace, sr1);
    } else if matches!(state.phase, Phase::PendingNextMessage) && state.msg_count == 0 {
        // (g)
        trace.annotate(Event::Shutdown, 0);
    } else if !interrupt_mode {
        // (h), polled
        trace.annotate(Event::DeviceNotReady, 0);
        return StepOutcome::NotReady;
    } else {
        // (h), interrupt
        trace.annotate(Event::StateError, 0);
        state.phase = Phase::PendingNextMessage;
        state.msg_count = 0;
    }

    if state.is_terminal() {
        state.status |= regs.combined_status();
        state.finish();
        StepOutcome::Done
    } else {
        StepOutcome::Continue
    }
}

/// (b) START-generated: the ACK/POS policy for the data phase must be
/// written *before* the address byte goes out, because the slave may start
/// clocking data as soon as it ACKs the address (spec §4.5b, P7).
fn start_generated(
    regs: &dyn I2CPeripheral,
    state: &mut TransferState,
    msgs: &[Message],
    trace: &mut TraceRecorder,
) {
    trace.annotate(Event::Start, 0);

    if state.flags.contains(MessageFlags::TEN_BIT) {
        // True 10-bit addressing needs a header byte this engine does not
        // emit; abort rather than write a placeholder byte onto the bus.
        trace.annotate(Event::WriteFlagError, 0);
        state.protocol_error = true;
        regs.set_stop();
        state.phase = Phase::PendingNextMessage;
        state.msg_count = 0;
        return;
    }

    if state.remaining() == Some(0) {
        // Empty message: nothing to address. Force a TXE re-entry so the
        // next tick's prelude advances to whatever follows.
        state.phase = Phase::PendingNextMessage;
        regs.set_itbufen(true);
        return;
    }

    let read = state.flags.contains(MessageFlags::READ);
    if state.total_msg_len == 1 && read {
        regs.set_pos(false);
        regs.set_ack(false);
    } else if state.total_msg_len == 2 && read {
        regs.set_pos(true);
        regs.set_ack(true);
    } else {
        regs.set_pos(false);
        regs.set_ack(true);
    }

    let idx = state
        .active_index()
        .expect("SB fired without a latched message");
    let addr7 = (msgs[idx].address as u8) << 1;
    let addr_byte = addr7 | if read { 1 } else { 0 };
    regs.write_dr(addr_byte);
    state.check_addr_ack = true;
    trace.annotate(Event::SendAddr, addr_byte as u32);
}

/// (c) ADDR never set after a START means the slave NACKed the address —
/// only observable this way in interrupt mode, since polled mode instead
/// times out waiting for ADDR (spec §4.6 step 9).
fn address_nacked(regs: &dyn I2CPeripheral, state: &mut TransferState, trace: &mut TraceRecorder) {
    trace.annotate(Event::AddrNacked, 0);
    state.check_addr_ack = false;
    state.phase = Phase::PendingNextMessage;
    state.msg_count = 0;
    regs.set_stop();
}

/// (d) Read-mode address clear. The ACK/POS policy (b) already wrote must
/// not be disturbed before SR2 is read, and for the two shortest read
/// lengths the clear order itself is the hazard (P5, P7).
fn read_address_clear(regs: &dyn I2CPeripheral, state: &mut TransferState, trace: &mut TraceRecorder) {
    trace.annotate(Event::AddrAcked, 0);
    let remaining = state.remaining().unwrap_or(0);

    if remaining == 1 && state.total_msg_len == 1 {
        regs.set_itbufen(true);
        regs.read_sr2();
        regs.set_stop();
        state.set_remaining(remaining - 1);
    } else if remaining == 2 && state.total_msg_len == 2 {
        regs.set_ack(false);
        regs.read_sr2();
    } else {
        regs.read_sr2();
    }

    state.check_addr_ack = false;
}

/// (e) Write path: one byte out per TXE, with the message-boundary decision
/// (STOP, repeated START, or fall through a NO_RESTART join) made the
/// instant the buffer empties.
fn write_path(
    regs: &dyn I2CPeripheral,
    state: &mut TransferState,
    msgs: &[Message],
    trace: &mut TraceRecorder,
    sr1: Sr1Bits,
) {
    if sr1.addr {
        regs.read_sr2();
        state.check_addr_ack = false;
    }

    let remaining = state.remaining().unwrap_or(0);
    if remaining >= 1 {
        let idx = state
            .active_index()
            .expect("write TXE without a latched message");
        let byte = msgs[idx].buffer[state.byte_index()];
        regs.write_dr(byte);
        state.advance_byte_index();
        state.set_remaining(remaining - 1);
        trace.annotate(Event::WriteByte, byte as u32);
        return;
    }

    trace.annotate(Event::WriteComplete, 0);
    if state.msg_count == 0 {
        regs.set_stop();
        state.phase = Phase::PendingNextMessage;
        return;
    }

    let next_flags = msgs[state.next_index()].flags;
    let restart = next_flags.contains(MessageFlags::NO_RESTART);
    let read = next_flags.contains(MessageFlags::READ);

    if next_flags.is_empty() || (read && !restart) {
        regs.set_start();
        state.phase = Phase::PendingNextMessage;
    } else if restart && !read {
        // No START: the byte stream continues straight through the
        // message boundary.
        state.phase = Phase::PendingNextMessage;
    } else {
        trace.annotate(Event::WriteFlagError, 0);
        state.protocol_error = true;
        state.msg_count = 0;
        state.phase = Phase::PendingNextMessage;
    }
}

fn push_byte(msgs: &mut [Message], idx: usize, state: &mut TransferState, byte: u8) {
    let at = state.byte_index();
    msgs[idx].buffer[at] = byte;
    state.advance_byte_index();
}

/// (f) Read data phase. RXNE alone is unreliable for 3+ byte reads on this
/// silicon; the sub-protocols below are keyed on `(total_msg_len,
/// remaining, BTF)` rather than RXNE, per spec §4.5f and the Design Notes'
/// table-over-cascade guidance (P4-P6).
fn read_data_phase(
    regs: &dyn I2CPeripheral,
    state: &mut TransferState,
    msgs: &mut [Message],
    trace: &mut TraceRecorder,
    sr1: Sr1Bits,
) {
    let remaining = state.remaining().unwrap_or(0);
    let total = state.total_msg_len;
    let idx = state
        .active_index()
        .expect("RXNE without a latched message");

    match (total, remaining, sr1.btf) {
        (1, 0, _) => {
            let byte = regs.read_dr();
            push_byte(msgs, idx, state, byte);
            state.phase = Phase::PendingNextMessage;
            trace.annotate(Event::Read1, byte as u32);
        }
        (2, 2, false) => {
            trace.annotate(Event::ReadWait, 0);
        }
        (2, 2, true) => {
            regs.set_stop();
            let b0 = regs.read_dr();
            let b1 = regs.read_dr();
            push_byte(msgs, idx, state, b0);
            push_byte(msgs, idx, state, b1);
            state.phase = Phase::PendingNextMessage;
            trace.annotate(Event::Read2, ((b0 as u32) << 8) | b1 as u32);
        }
        (_, _, false) if total >= 3 => {
            trace.annotate(Event::ReadWait, 0);
        }
        (_, n, true) if total >= 3 && n >= 4 => {
            let byte = regs.read_dr();
            push_byte(msgs, idx, state, byte);
            state.set_remaining(n - 1);
            trace.annotate(Event::Read3Plus, byte as u32);
        }
        (_, 3, true) if total >= 3 => {
            regs.set_ack(false);
            let byte = regs.read_dr();
            push_byte(msgs, idx, state, byte);
            state.set_remaining(2);
            trace.annotate(Event::Read3Plus, byte as u32);
        }
        (_, 2, true) if total >= 3 => {
            regs.set_stop();
            let b0 = regs.read_dr();
            let b1 = regs.read_dr();
            push_byte(msgs, idx, state, b0);
            push_byte(msgs, idx, state, b1);
            state.phase = Phase::PendingNextMessage;
            trace.annotate(Event::ReadLastByte, ((b0 as u32) << 8) | b1 as u32);
        }
        _ => {
            trace.annotate(Event::ReadError, 0);
            state.protocol_error = true;
            state.phase = Phase::PendingNextMessage;
            state.msg_count = 0;
        }
    }

    state.status |= regs.combined_status();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Sr2Bits;
    use core::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// A scripted "silicon" responder. Each test drives the SR1 condition
    /// bits explicitly for every tick via `set_flags` (no bit is left over
    /// from the previous tick by accident); `read_dr` pops from a queue of
    /// bytes the test primes in advance, so multi-byte-per-tick reads (the
    /// N=2 and N-1/N tail cases) see distinct values.
    #[derive(Default)]
    struct MockRegisters {
        sb: Cell<bool>,
        addr: Cell<bool>,
        txe: Cell<bool>,
        rxne: Cell<bool>,
        btf: Cell<bool>,
        busy: Cell<bool>,
        dr_in: Cell<u8>,
        dr_out: RefCell<VecDeque<u8>>,
        ack: Cell<bool>,
        pos: Cell<bool>,
        start_count: Cell<u32>,
        stop_count: Cell<u32>,
        itbufen: Cell<bool>,
    }

    impl MockRegisters {
        fn set_flags(&self, sb: bool, addr: bool, txe: bool, rxne: bool, btf: bool) {
            self.sb.set(sb);
            self.addr.set(addr);
            self.txe.set(txe);
            self.rxne.set(rxne);
            self.btf.set(btf);
        }

        fn push_byte(&self, byte: u8) {
            self.dr_out.borrow_mut().push_back(byte);
        }
    }

    impl I2CPeripheral for MockRegisters {
        fn read_sr1(&self) -> Sr1Bits {
            Sr1Bits {
                sb: self.sb.get(),
                addr: self.addr.get(),
                txe: self.txe.get(),
                rxne: self.rxne.get(),
                btf: self.btf.get(),
                af: false,
                berr: false,
                arlo: false,
                ovr: false,
                pecerr: false,
                timeout: false,
            }
        }

        fn read_sr2(&self) -> Sr2Bits {
            Sr2Bits { busy: self.busy.get() }
        }

        fn read_dr(&self) -> u8 {
            self.dr_out.borrow_mut().pop_front().expect("test under-primed dr_out")
        }

        fn write_dr(&self, byte: u8) {
            self.dr_in.set(byte);
        }

        fn set_ack(&self, on: bool) {
            self.ack.set(on);
        }

        fn set_pos(&self, on: bool) {
            self.pos.set(on);
        }

        fn set_start(&self) {
            self.start_count.set(self.start_count.get() + 1);
        }

        fn set_stop(&self) {
            self.stop_count.set(self.stop_count.get() + 1);
        }

        fn set_itbufen(&self, on: bool) {
            self.itbufen.set(on);
        }

        fn enable_event_interrupts(&self) {}
        fn disable_all_interrupts(&self) {}
        fn set_pe(&self, _on: bool) {}

        fn combined_status(&self) -> u32 {
            0
        }

        fn stop_pending(&self) -> bool {
            false
        }

        fn clear_sr1(&self) {}
        fn clear_start_stop_pec(&self) {}
    }

    fn run(regs: &MockRegisters, state: &mut TransferState, msgs: &mut [Message]) -> StepOutcome {
        let mut trace = TraceRecorder::new();
        step(regs, state, msgs, &mut trace, 0, true)
    }

    /// S3: read(0x50, buf, 1).
    #[test]
    fn one_byte_read_follows_the_documented_sequence() {
        let regs = MockRegisters::default();
        let mut buf = [0u8; 1];
        let mut msgs = [Message::read(0x50, &mut buf)];
        let mut state = TransferState::new();
        state.arm(1);

        regs.set_flags(true, false, false, false, false);
        assert_eq!(run(&regs, &mut state, &mut msgs), StepOutcome::Continue);
        assert_eq!(regs.dr_in.get(), 0xA1);
        assert!(!regs.pos.get());
        assert!(!regs.ack.get());

        regs.set_flags(false, true, false, false, false);
        assert_eq!(run(&regs, &mut state, &mut msgs), StepOutcome::Continue);
        assert_eq!(regs.stop_count.get(), 1);
        assert!(regs.itbufen.get());

        regs.set_flags(false, false, false, true, false);
        regs.push_byte(0x42);
        assert_eq!(run(&regs, &mut state, &mut msgs), StepOutcome::Done);
        assert_eq!(buf[0], 0x42);
        assert_eq!(regs.start_count.get(), 0);
        assert_eq!(regs.stop_count.get(), 1);
    }

    /// S4: read(0x50, buf, 2).
    #[test]
    fn two_byte_read_sets_pos_and_ack_before_clearing_addr() {
        let regs = MockRegisters::default();
        let mut buf = [0u8; 2];
        let mut msgs = [Message::read(0x50, &mut buf)];
        let mut state = TransferState::new();
        state.arm(1);

        regs.set_flags(true, false, false, false, false);
        run(&regs, &mut state, &mut msgs);
        assert!(regs.pos.get());
        assert!(regs.ack.get());

        regs.set_flags(false, true, false, false, false);
        run(&regs, &mut state, &mut msgs);
        assert!(!regs.ack.get());
        assert_eq!(regs.stop_count.get(), 0);

        regs.set_flags(false, false, false, true, false);
        assert_eq!(run(&regs, &mut state, &mut msgs), StepOutcome::Continue);
        assert_eq!(regs.stop_count.get(), 0, "must wait for BTF, not STOP on RXNE alone");

        regs.push_byte(0x11);
        regs.push_byte(0x11);
        regs.set_flags(false, false, false, true, true);
        let outcome = run(&regs, &mut state, &mut msgs);
        assert_eq!(regs.stop_count.get(), 1);
        assert_eq!(outcome, StepOutcome::Done);
        assert_eq!(buf, [0x11, 0x11]);
    }

    /// S5: write(0x50,[0xAA]); read(0x50,buf,3) with a repeated START.
    #[test]
    fn write_then_repeated_start_read_of_three() {
        let regs = MockRegisters::default();
        let mut wbuf = [0xAAu8];
        let mut rbuf = [0u8; 3];
        let mut msgs = [Message::write(0x50, &mut wbuf), Message::read(0x50, &mut rbuf)];
        let mut state = TransferState::new();
        state.arm(2);

        regs.set_flags(true, false, false, false, false);
        run(&regs, &mut state, &mut msgs);
        assert_eq!(regs.dr_in.get(), 0xA0);

        regs.set_flags(false, true, false, false, false);
        run(&regs, &mut state, &mut msgs);
        assert_eq!(regs.dr_in.get(), 0xAA, "ADDR-clear and the first data byte share a tick");

        regs.set_flags(false, false, true, false, false);
        run(&regs, &mut state, &mut msgs);
        assert_eq!(regs.start_count.get(), 1, "NORESTART absent -> repeated START");

        regs.set_flags(true, false, false, false, false);
        run(&regs, &mut state, &mut msgs);
        assert_eq!(regs.dr_in.get(), 0xA1);

        regs.set_flags(false, true, false, false, false);
        run(&regs, &mut state, &mut msgs);

        regs.push_byte(1);
        regs.set_flags(false, false, false, true, true);
        run(&regs, &mut state, &mut msgs);
        assert!(!regs.ack.get(), "ACK cleared exactly when remaining hits 3");

        regs.push_byte(2);
        regs.push_byte(3);
        let outcome = run(&regs, &mut state, &mut msgs);
        assert_eq!(outcome, StepOutcome::Done);
        assert_eq!(regs.stop_count.get(), 1);
        assert_eq!(rbuf, [1, 2, 3]);
    }

    /// P9 / S6: an address NACK aborts the transfer and leaves it idle.
    #[test]
    fn address_nack_aborts_with_a_stop_and_no_retry() {
        let regs = MockRegisters::default();
        let mut buf = [0u8; 1];
        let mut msgs = [Message::write(0x7F, &mut buf)];
        let mut state = TransferState::new();
        state.arm(1);

        regs.set_flags(true, false, false, false, false);
        run(&regs, &mut state, &mut msgs);
        assert!(state.check_addr_ack);

        regs.set_flags(false, false, false, false, false);
        let outcome = run(&regs, &mut state, &mut msgs);
        assert_eq!(outcome, StepOutcome::Done);
        assert_eq!(regs.stop_count.get(), 1);
        assert!(!state.check_addr_ack);
        assert_eq!(state.msg_count, 0);
    }

    /// P2/P3: a NO_RESTART join writes through the message boundary with
    /// no START in between, and still emits exactly one STOP at the end.
    #[test]
    fn no_restart_join_continues_without_a_repeated_start() {
        let regs = MockRegisters::default();
        let mut w0 = [0xAAu8];
        let mut w1 = [0xBBu8];
        let mut msgs = [
            Message::write(0x50, &mut w0),
            {
                let mut m = Message::write(0x50, &mut w1);
                m.flags |= MessageFlags::NO_RESTART;
                m
            },
        ];
        let mut state = TransferState::new();
        state.arm(2);

        regs.set_flags(true, false, false, false, false);
        run(&regs, &mut state, &mut msgs);

        regs.set_flags(false, true, false, false, false);
        run(&regs, &mut state, &mut msgs);
        assert_eq!(regs.dr_in.get(), 0xAA);

        regs.set_flags(false, false, true, false, false);
        run(&regs, &mut state, &mut msgs);
        assert_eq!(regs.start_count.get(), 0, "NORESTART -> no repeated START");

        run(&regs, &mut state, &mut msgs);
        assert_eq!(regs.dr_in.get(), 0xBB);

        let outcome = run(&regs, &mut state, &mut msgs);
        assert_eq!(outcome, StepOutcome::Done);
        assert_eq!(regs.start_count.get(), 0);
        assert_eq!(regs.stop_count.get(), 1);
    }
}
