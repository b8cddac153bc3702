//! Lifecycle (spec §4.7): reference-counted bring-up/tear-down of a shared
//! physical port, default frequency programming, and bus recovery.

use core::cell::Cell;

use kernel::common::cells::{MapCell, OptionalCell};

use crate::clock::{self, ClockConfig};
use crate::dispatcher::{Dispatcher, FsmcSlot, Handshake, Timeout};
use crate::message::{AddressWidth, Message, MessageFlags};
use crate::platform::{Platform, RecoverySlot};
use crate::registers::I2CPeripheral;
use crate::trace::TraceRecorder;
use crate::transfer::TransferState;
use kernel::hil::i2c::{Error, I2CHwMasterClient, I2CMaster};

const DEFAULT_FREQUENCY_HZ: u32 = 100_000;
/// Below this peripheral clock the hardware cannot reliably hit 400 kHz
/// bus timing; `setfrequency` silently clamps to the default (spec §6).
const MIN_PERIPHERAL_CLOCK_HZ: u32 = 4_000_000;
#[cfg(feature = "bus-recovery")]
const RECOVERY_MAX_PULSES: u8 = 10;
#[cfg(feature = "bus-recovery")]
const RECOVERY_HALF_PERIOD_US: u32 = 10;

/// Per-physical-port shared state (spec §3's Bus State). One lives
/// statically per port, named `I2CnBUS` below, and is shared by every
/// `Instance` opened against that port.
pub struct BusState {
    refcount: Cell<u32>,
    locked: Cell<bool>,
    handshake: Cell<Handshake>,
    transfer: MapCell<TransferState>,
    trace: MapCell<TraceRecorder>,
}

impl BusState {
    pub const fn new() -> Self {
        BusState {
            refcount: Cell::new(0),
            locked: Cell::new(false),
            handshake: Cell::new(Handshake::Idle),
            transfer: MapCell::new(TransferState::new()),
            trace: MapCell::new(TraceRecorder::new()),
        }
    }

    /// Busy-waits for the exclusion lock (spec §5). A board with an OS
    /// scheduler underneath would park the caller here instead; this core
    /// makes no assumption about one being present.
    fn lock(&self) {
        while self.locked.replace(true) {}
    }

    fn unlock(&self) {
        self.locked.set(false);
    }
}

impl Default for BusState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "i2c1")]
pub static I2C1_BUS: BusState = BusState::new();
#[cfg(feature = "i2c2")]
pub static I2C2_BUS: BusState = BusState::new();
#[cfg(feature = "i2c3")]
pub static I2C3_BUS: BusState = BusState::new();

/// One caller handle (spec §3's Instance): a target address and width
/// hint bound to a shared `BusState` plus the collaborators this core
/// treats as external (spec §1).
pub struct Instance<'a> {
    bus: &'a BusState,
    regs: &'a dyn I2CPeripheral,
    clock_regs: &'a dyn clock::I2CPeripheralRegs,
    platform: &'a dyn Platform,
    recovery: RecoverySlot<'a>,
    fsmc: FsmcSlot<'a>,
    timeout: Timeout,
    initialized: Cell<bool>,
    address: Cell<u16>,
    address_width: Cell<AddressWidth>,
    frequency_hz: Cell<u32>,
    client: OptionalCell<&'a dyn I2CHwMasterClient>,
}

impl<'a> Instance<'a> {
    /// Builds a handle against `bus` without touching any hardware; call
    /// `init` to bring the port up (spec §6 `init(dev)`).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: &'a BusState,
        regs: &'a dyn I2CPeripheral,
        clock_regs: &'a dyn clock::I2CPeripheralRegs,
        platform: &'a dyn Platform,
        recovery: RecoverySlot<'a>,
        fsmc: FsmcSlot<'a>,
        timeout: Timeout,
    ) -> Self {
        Instance {
            bus,
            regs,
            clock_regs,
            platform,
            recovery,
            fsmc,
            timeout,
            initialized: Cell::new(false),
            address: Cell::new(0),
            address_width: Cell::new(AddressWidth::Bits7),
            frequency_hz: Cell::new(DEFAULT_FREQUENCY_HZ),
            client: OptionalCell::empty(),
        }
    }

    /// Brings the shared port up on first reference (spec §4.7 "up on
    /// first reference": clock enable, reset pulse, pin config, IRQ
    /// attach, default frequency programming). Idempotent. Fails with
    /// `Error::Busy` if another instance on this port is mid-transfer,
    /// since bring-up cannot safely interleave with one.
    pub fn init(&self) -> Result<(), Error> {
        if self.initialized.get() {
            return Ok(());
        }
        if self.bus.locked.get() {
            return Err(Error::Busy);
        }
        self.up();
        self.initialized.set(true);
        Ok(())
    }

    /// Consumes the handle, tearing down the hardware on last release if
    /// it was ever brought up. Equivalent to just dropping the `Instance`;
    /// spelled out because spec §6 names `uninit(dev)` as its own
    /// operation.
    pub fn uninit(self) {}

    pub fn setfrequency(&self, hz: u32) -> u32 {
        let effective = if self.platform.peripheral_clock_hz() < MIN_PERIPHERAL_CLOCK_HZ {
            DEFAULT_FREQUENCY_HZ
        } else {
            hz
        };
        self.frequency_hz.set(effective);
        effective
    }

    pub fn setaddress(&self, address: u16, width: AddressWidth) {
        self.address.set(address);
        self.address_width.set(width);
    }

    pub fn write(&self, buffer: &mut [u8]) -> Result<(), Error> {
        let address = self.address.get();
        let flags = self.base_flags();
        let mut msgs = [Message { address, flags, buffer }];
        self.run(&mut msgs)
    }

    pub fn read(&self, buffer: &mut [u8]) -> Result<(), Error> {
        let address = self.address.get();
        let flags = self.base_flags() | MessageFlags::READ;
        let mut msgs = [Message { address, flags, buffer }];
        self.run(&mut msgs)
    }

    /// The general chain entry point (spec §6 `transfer(msgs[])`).
    /// Compiled out when `transfer-chain` is off; `write`/`read` still
    /// dispatch through `run` directly, per spec §6.
    #[cfg(feature = "transfer-chain")]
    pub fn transfer(&self, msgs: &mut [Message]) -> Result<(), Error> {
        self.run(msgs)
    }

    /// Shared dispatch core behind `write`/`read`/`transfer` (spec §4.6
    /// steps 1-10).
    fn run(&self, msgs: &mut [Message]) -> Result<(), Error> {
        self.bus.lock();

        let clock_cfg = self.clock_config();
        let dispatcher = Dispatcher {
            regs: self.regs,
            clock_regs: self.clock_regs,
            platform: self.platform,
            fsmc: self.fsmc,
        };

        let bus = self.bus;
        let result = bus
            .transfer
            .map(|state| {
                bus.trace
                    .map(|trace| {
                        dispatcher.process(
                            state,
                            msgs,
                            trace,
                            &bus.handshake,
                            clock_cfg,
                            self.timeout,
                        )
                    })
                    .unwrap_or(Err(Error::BusError))
            })
            .unwrap_or(Err(Error::BusError));

        self.bus.unlock();
        result
    }

    /// Bus recovery (spec §4.7): deinit, bit-bang the bus free, reinit.
    /// Never run automatically — exposed for the caller to invoke after a
    /// transfer reports a bus condition it can't otherwise clear.
    #[cfg(feature = "bus-recovery")]
    pub fn reset(&self) -> Result<(), Error> {
        self.bus.lock();
        self.teardown_hardware();
        let recovered = self
            .recovery
            .recover(self.platform, RECOVERY_MAX_PULSES, RECOVERY_HALF_PERIOD_US);
        self.bringup_hardware();
        self.bus.unlock();
        if recovered {
            Ok(())
        } else {
            Err(Error::BusError)
        }
    }

    /// Stub for builds with the bit-bang recovery procedure compiled out
    /// (spec §6): this driver has no way left to unwedge the bus.
    #[cfg(not(feature = "bus-recovery"))]
    pub fn reset(&self) -> Result<(), Error> {
        Err(Error::Protocol)
    }

    fn base_flags(&self) -> MessageFlags {
        match self.address_width.get() {
            AddressWidth::Bits10 => MessageFlags::TEN_BIT,
            AddressWidth::Bits7 => MessageFlags::empty(),
        }
    }

    fn clock_config(&self) -> ClockConfig {
        clock::program(
            self.platform.peripheral_clock_hz(),
            self.frequency_hz.get(),
            cfg!(feature = "duty-16-9"),
        )
    }

    fn bringup_hardware(&self) {
        self.platform.enable_clock();
        self.platform.configure_pins_for_i2c();
        self.platform.attach_interrupts();
        clock::apply(self.clock_regs, self.clock_config());
        self.regs.set_pe(true);
    }

    fn teardown_hardware(&self) {
        self.regs.set_pe(false);
        self.platform.detach_interrupts();
        self.platform.configure_pins_for_gpio();
        self.platform.disable_clock();
    }

    fn up(&self) {
        let first = self.platform.atomic(|| {
            let count = self.bus.refcount.get();
            self.bus.refcount.set(count + 1);
            count == 0
        });
        if first {
            self.bringup_hardware();
        }
    }

    fn down(&self) {
        let last = self.platform.atomic(|| {
            let count = self.bus.refcount.get().saturating_sub(1);
            self.bus.refcount.set(count);
            count == 0
        });
        if last {
            self.teardown_hardware();
        }
    }
}

impl<'a> Drop for Instance<'a> {
    fn drop(&mut self) {
        if self.initialized.get() {
            self.down();
        }
    }
}

/// The portable HIL-facing surface (spec §2): a synchronous adapter over
/// `run`, delivering the result through `command_complete` before
/// `write`/`read`/`write_read` return rather than from a later interrupt,
/// since this engine's dispatch is itself blocking. Mirrors the teacher's
/// own `impl i2c::I2CMaster for I2C<'a>` in `chips/stm32f3xx/src/i2c.rs`.
impl<'a> I2CMaster<'a> for Instance<'a> {
    fn set_master_client(&self, client: &'a dyn I2CHwMasterClient) {
        self.client.replace(client);
    }

    fn enable(&self) {
        self.regs.set_pe(true);
    }

    fn disable(&self) {
        self.regs.set_pe(false);
    }

    fn write_read(
        &self,
        addr: u8,
        data: &'static mut [u8],
        write_len: usize,
        read_len: usize,
    ) -> Result<(), (Error, &'static mut [u8])> {
        if write_len.saturating_add(read_len) > data.len() {
            return Err((Error::Protocol, data));
        }
        self.setaddress(addr as u16, AddressWidth::Bits7);
        let result = {
            let (write_buf, rest) = data.split_at_mut(write_len);
            let mut msgs = [
                Message::write(addr as u16, write_buf),
                Message::read(addr as u16, &mut rest[..read_len]),
            ];
            self.run(&mut msgs)
        };
        self.client.map(|client| client.command_complete(data, result));
        Ok(())
    }

    fn write(&self, addr: u8, data: &'static mut [u8], len: usize) -> Result<(), (Error, &'static mut [u8])> {
        if len > data.len() {
            return Err((Error::Protocol, data));
        }
        self.setaddress(addr as u16, AddressWidth::Bits7);
        let result = {
            let mut msgs = [Message::write(addr as u16, &mut data[..len])];
            self.run(&mut msgs)
        };
        self.client.map(|client| client.command_complete(data, result));
        Ok(())
    }

    fn read(&self, addr: u8, buffer: &'static mut [u8], len: usize) -> Result<(), (Error, &'static mut [u8])> {
        if len > buffer.len() {
            return Err((Error::Protocol, buffer));
        }
        self.setaddress(addr as u16, AddressWidth::Bits7);
        let result = {
            let mut msgs = [Message::read(addr as u16, &mut buffer[..len])];
            self.run(&mut msgs)
        };
        self.client.map(|client| client.command_complete(buffer, result));
        Ok(())
    }
}
