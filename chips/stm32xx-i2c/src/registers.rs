//! Register Accessor (spec §4.1): typed access to the I2Cv1 peripheral's
//! memory-mapped registers. No protocol logic lives here — only the
//! distinction the engine relies on, that reading SR1 and reading SR2 are
//! two separate, independently-timed actions.

use kernel::common::registers::{register_bitfields, ReadWrite};
use kernel::common::StaticRef;

#[repr(C)]
pub struct I2CRegisters {
    /// control register 1
    pub cr1: ReadWrite<u32, CR1::Register>,
    /// control register 2
    pub cr2: ReadWrite<u32, CR2::Register>,
    /// own address register 1
    pub oar1: ReadWrite<u32, OAR1::Register>,
    /// own address register 2
    pub oar2: ReadWrite<u32, OAR2::Register>,
    /// data register
    pub dr: ReadWrite<u32, DR::Register>,
    /// status register 1
    pub sr1: ReadWrite<u32, SR1::Register>,
    /// status register 2
    pub sr2: ReadWrite<u32, SR2::Register>,
    /// clock control register
    pub ccr: ReadWrite<u32, CCR::Register>,
    /// tRise register
    pub trise: ReadWrite<u32, TRISE::Register>,
    /// filter register (not present pre-F303/F4-rev-A but harmless to model)
    pub fltr: ReadWrite<u32, FLTR::Register>,
}

register_bitfields![u32,
    pub CR1 [
        SWRST OFFSET(15) NUMBITS(1) [],
        ALERT OFFSET(13) NUMBITS(1) [],
        PEC OFFSET(12) NUMBITS(1) [],
        /// Acknowledge/PEC position for data reception
        POS OFFSET(11) NUMBITS(1) [],
        ACK OFFSET(10) NUMBITS(1) [],
        STOP OFFSET(9) NUMBITS(1) [],
        START OFFSET(8) NUMBITS(1) [],
        NOSTRETCH OFFSET(7) NUMBITS(1) [],
        ENGC OFFSET(6) NUMBITS(1) [],
        ENPEC OFFSET(5) NUMBITS(1) [],
        ENARP OFFSET(4) NUMBITS(1) [],
        SMBTYPE OFFSET(3) NUMBITS(1) [],
        SMBUS OFFSET(1) NUMBITS(1) [],
        PE OFFSET(0) NUMBITS(1) []
    ],
    pub CR2 [
        LAST OFFSET(12) NUMBITS(1) [],
        DMAEN OFFSET(11) NUMBITS(1) [],
        ITBUFEN OFFSET(10) NUMBITS(1) [],
        ITEVTEN OFFSET(9) NUMBITS(1) [],
        ITERREN OFFSET(8) NUMBITS(1) [],
        FREQ OFFSET(0) NUMBITS(6) []
    ],
    pub OAR1 [
        ADDMODE OFFSET(15) NUMBITS(1) [],
        /// Silicon erratum: must always be written 1.
        ALWAYS_SET OFFSET(14) NUMBITS(1) [],
        ADD OFFSET(0) NUMBITS(10) []
    ],
    pub OAR2 [
        ADD2 OFFSET(1) NUMBITS(7) [],
        ENDUAL OFFSET(0) NUMBITS(1) []
    ],
    pub DR [
        DR OFFSET(0) NUMBITS(8) []
    ],
    pub SR1 [
        SMBALERT OFFSET(15) NUMBITS(1) [],
        TIMEOUT OFFSET(14) NUMBITS(1) [],
        PECERR OFFSET(12) NUMBITS(1) [],
        OVR OFFSET(11) NUMBITS(1) [],
        AF OFFSET(10) NUMBITS(1) [],
        ARLO OFFSET(9) NUMBITS(1) [],
        BERR OFFSET(8) NUMBITS(1) [],
        TXE OFFSET(7) NUMBITS(1) [],
        RXNE OFFSET(6) NUMBITS(1) [],
        STOPF OFFSET(4) NUMBITS(1) [],
        ADD10 OFFSET(3) NUMBITS(1) [],
        BTF OFFSET(2) NUMBITS(1) [],
        ADDR OFFSET(1) NUMBITS(1) [],
        SB OFFSET(0) NUMBITS(1) []
    ],
    pub SR2 [
        PEC OFFSET(8) NUMBITS(8) [],
        DUALF OFFSET(7) NUMBITS(1) [],
        SMBHOST OFFSET(6) NUMBITS(1) [],
        SMBDEFAULT OFFSET(5) NUMBITS(1) [],
        GENCALL OFFSET(4) NUMBITS(1) [],
        TRA OFFSET(2) NUMBITS(1) [],
        BUSY OFFSET(1) NUMBITS(1) [],
        MSL OFFSET(0) NUMBITS(1) []
    ],
    pub CCR [
        FS OFFSET(15) NUMBITS(1) [
            SM_MODE = 0,
            FM_MODE = 1
        ],
        DUTY OFFSET(14) NUMBITS(1) [],
        CCR OFFSET(0) NUMBITS(12) []
    ],
    pub TRISE [
        TRISE OFFSET(0) NUMBITS(6) []
    ],
    pub FLTR [
        ANOFF OFFSET(4) NUMBITS(1) [],
        DNF OFFSET(0) NUMBITS(4) []
    ]
];

#[cfg(feature = "i2c1")]
pub const I2C1_BASE: StaticRef<I2CRegisters> =
    unsafe { StaticRef::new(0x4000_5400 as *const I2CRegisters) };
#[cfg(feature = "i2c2")]
pub const I2C2_BASE: StaticRef<I2CRegisters> =
    unsafe { StaticRef::new(0x4000_5800 as *const I2CRegisters) };
#[cfg(feature = "i2c3")]
pub const I2C3_BASE: StaticRef<I2CRegisters> =
    unsafe { StaticRef::new(0x4000_5C00 as *const I2CRegisters) };

/// The handful of SR1 bits the engine branches on, sampled once per step so
/// a single invocation observes a consistent snapshot (spec §5: "within a
/// single `process()` call the engine observes hardware events in hardware
/// order").
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sr1Bits {
    pub sb: bool,
    pub addr: bool,
    pub txe: bool,
    pub rxne: bool,
    pub btf: bool,
    pub af: bool,
    pub berr: bool,
    pub arlo: bool,
    pub ovr: bool,
    pub pecerr: bool,
    pub timeout: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sr2Bits {
    pub busy: bool,
}

/// What the Protocol Engine needs from the Register Accessor. A real chip
/// implements this against `StaticRef<I2CRegisters>`; tests implement it
/// against a scripted fake "silicon" responder.
pub trait I2CPeripheral {
    fn read_sr1(&self) -> Sr1Bits;
    /// Reads SR2. On real hardware this has the side effect of completing
    /// the ADDR-clear sequence when read after SR1.ADDR — the engine never
    /// calls this except where spec §4.5 explicitly says to.
    fn read_sr2(&self) -> Sr2Bits;
    fn read_dr(&self) -> u8;
    fn write_dr(&self, byte: u8);

    fn set_ack(&self, on: bool);
    fn set_pos(&self, on: bool);
    fn set_start(&self);
    fn set_stop(&self);
    fn set_itbufen(&self, on: bool);
    fn enable_event_interrupts(&self);
    fn disable_all_interrupts(&self);
    fn set_pe(&self, on: bool);

    /// Combined SR1 | (SR2 << 16) snapshot, used by the dispatcher for
    /// final error classification and by the trace recorder.
    fn combined_status(&self) -> u32;

    /// True while CR1.STOP has not yet been cleared by hardware (dispatcher
    /// step 2's STOP-settle wait).
    fn stop_pending(&self) -> bool;
    /// Writes 0 to SR1, dropping stale error bits (dispatcher step 3).
    fn clear_sr1(&self);
    /// Clears CR1 START/STOP/PEC (dispatcher step 4, and the timeout path).
    fn clear_start_stop_pec(&self);
}

pub struct Registers {
    regs: StaticRef<I2CRegisters>,
}

impl Registers {
    /// # Safety
    /// `base` must address a live I2Cv1 peripheral register block.
    pub const unsafe fn new(base: StaticRef<I2CRegisters>) -> Self {
        Registers { regs: base }
    }

    pub fn raw(&self) -> &I2CRegisters {
        &self.regs
    }
}

impl I2CPeripheral for Registers {
    fn read_sr1(&self) -> Sr1Bits {
        let sr1 = &self.regs.sr1;
        Sr1Bits {
            sb: sr1.is_set(SR1::SB),
            addr: sr1.is_set(SR1::ADDR),
            txe: sr1.is_set(SR1::TXE),
            rxne: sr1.is_set(SR1::RXNE),
            btf: sr1.is_set(SR1::BTF),
            af: sr1.is_set(SR1::AF),
            berr: sr1.is_set(SR1::BERR),
            arlo: sr1.is_set(SR1::ARLO),
            ovr: sr1.is_set(SR1::OVR),
            pecerr: sr1.is_set(SR1::PECERR),
            timeout: sr1.is_set(SR1::TIMEOUT),
        }
    }

    fn read_sr2(&self) -> Sr2Bits {
        Sr2Bits {
            busy: self.regs.sr2.is_set(SR2::BUSY),
        }
    }

    fn read_dr(&self) -> u8 {
        self.regs.dr.read(DR::DR) as u8
    }

    fn write_dr(&self, byte: u8) {
        self.regs.dr.write(DR::DR.val(byte as u32));
    }

    fn set_ack(&self, on: bool) {
        if on {
            self.regs.cr1.modify(CR1::ACK::SET);
        } else {
            self.regs.cr1.modify(CR1::ACK::CLEAR);
        }
    }

    fn set_pos(&self, on: bool) {
        if on {
            self.regs.cr1.modify(CR1::POS::SET);
        } else {
            self.regs.cr1.modify(CR1::POS::CLEAR);
        }
    }

    fn set_start(&self) {
        self.regs.cr1.modify(CR1::START::SET);
    }

    fn set_stop(&self) {
        self.regs.cr1.modify(CR1::STOP::SET);
    }

    fn set_itbufen(&self, on: bool) {
        if on {
            self.regs.cr2.modify(CR2::ITBUFEN::SET);
        } else {
            self.regs.cr2.modify(CR2::ITBUFEN::CLEAR);
        }
    }

    fn enable_event_interrupts(&self) {
        self.regs
            .cr2
            .modify(CR2::ITEVTEN::SET + CR2::ITERREN::SET);
    }

    fn disable_all_interrupts(&self) {
        self.regs
            .cr2
            .modify(CR2::ITEVTEN::CLEAR + CR2::ITERREN::CLEAR + CR2::ITBUFEN::CLEAR);
    }

    fn set_pe(&self, on: bool) {
        if on {
            self.regs.cr1.modify(CR1::PE::SET);
        } else {
            self.regs.cr1.modify(CR1::PE::CLEAR);
        }
    }

    fn combined_status(&self) -> u32 {
        self.regs.sr1.get() | (self.regs.sr2.get() << 16)
    }

    fn stop_pending(&self) -> bool {
        self.regs.cr1.is_set(CR1::STOP)
    }

    fn clear_sr1(&self) {
        self.regs.sr1.set(0);
    }

    fn clear_start_stop_pec(&self) {
        self.regs
            .cr1
            .modify(CR1::START::CLEAR + CR1::STOP::CLEAR + CR1::PEC::CLEAR);
    }
}
