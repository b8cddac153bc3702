//! Clock Programmer (spec §4.2): derives CCR/TRISE/OAR1 values from the
//! peripheral clock and the target bus frequency. Pure arithmetic — the
//! caller is responsible for clearing CR1.PE before writing the result and
//! restoring it afterward.

use crate::registers::{I2CPeripheral, CCR, CR1, OAR1, TRISE};

const STANDARD_MODE_CEILING_HZ: u32 = 100_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    pub ccr: u32,
    pub duty_16_9: bool,
    pub fast_mode: bool,
    pub trise: u32,
    /// Bit 14 of OAR1, always forced to 1 (documented silicon erratum).
    pub oar1_bit14: bool,
}

/// Computes CCR/TRISE for the requested bus frequency, per spec §4.2.
///
/// Standard mode (`f_t <= 100_000`): `CCR = max(4, f_p / (2 * f_t))`,
/// `TRISE = f_p_mhz + 1`.
///
/// Fast mode: `CCR = f_p / (25 * f_t)` with 16/9 duty, else
/// `f_p / (3 * f_t)`, floor 1; `TRISE = (f_p_mhz * 300) / 1000 + 1`.
pub fn program(f_p: u32, f_t: u32, duty_16_9: bool) -> ClockConfig {
    let f_p_mhz = f_p / 1_000_000;

    if f_t <= STANDARD_MODE_CEILING_HZ {
        let ccr = core::cmp::max(4, f_p / (2 * f_t));
        ClockConfig {
            ccr,
            duty_16_9: false,
            fast_mode: false,
            trise: f_p_mhz + 1,
            oar1_bit14: true,
        }
    } else {
        let ccr = if duty_16_9 {
            core::cmp::max(1, f_p / (25 * f_t))
        } else {
            core::cmp::max(1, f_p / (3 * f_t))
        };
        ClockConfig {
            ccr,
            duty_16_9,
            fast_mode: true,
            trise: (f_p_mhz * 300) / 1000 + 1,
            oar1_bit14: true,
        }
    }
}

/// Writes a previously computed `ClockConfig` into CCR/TRISE/OAR1 with the
/// peripheral disabled, then restores CR1.PE to whatever it was before.
pub fn apply(regs: &dyn I2CPeripheralRegs, config: ClockConfig) {
    let was_enabled = regs.pe_enabled();
    regs.set_pe(false);

    regs.write_ccr(config.ccr, config.fast_mode, config.duty_16_9);
    regs.write_trise(config.trise);
    regs.write_oar1_bit14(config.oar1_bit14);

    regs.set_pe(was_enabled);
}

/// The subset of register access `apply` needs, split out from
/// `I2CPeripheral` because CCR/TRISE/OAR1 field packing is clock-programmer
/// business, not engine business.
pub trait I2CPeripheralRegs {
    fn pe_enabled(&self) -> bool;
    fn set_pe(&self, on: bool);
    fn write_ccr(&self, ccr: u32, fast_mode: bool, duty_16_9: bool);
    fn write_trise(&self, trise: u32);
    fn write_oar1_bit14(&self, set: bool);
}

impl I2CPeripheralRegs for crate::registers::Registers {
    fn pe_enabled(&self) -> bool {
        self.raw().cr1.is_set(CR1::PE)
    }

    fn set_pe(&self, on: bool) {
        I2CPeripheral::set_pe(self, on)
    }

    fn write_ccr(&self, ccr: u32, fast_mode: bool, duty_16_9: bool) {
        let fs = if fast_mode { CCR::FS::FM_MODE } else { CCR::FS::SM_MODE };
        let duty = if duty_16_9 { CCR::DUTY::SET } else { CCR::DUTY::CLEAR };
        self.raw().ccr.write(CCR::CCR.val(ccr) + fs + duty);
    }

    fn write_trise(&self, trise: u32) {
        self.raw().trise.write(TRISE::TRISE.val(trise));
    }

    fn write_oar1_bit14(&self, set: bool) {
        if set {
            self.raw().oar1.modify(OAR1::ALWAYS_SET::SET);
        } else {
            self.raw().oar1.modify(OAR1::ALWAYS_SET::CLEAR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S1: setfrequency(100_000) @ 8 MHz => CCR=40, TRISE=9, FS=0.
    #[test]
    fn standard_mode_8mhz_100khz() {
        let cfg = program(8_000_000, 100_000, false);
        assert_eq!(cfg.ccr, 40);
        assert_eq!(cfg.trise, 9);
        assert!(!cfg.fast_mode);
    }

    /// S2: setfrequency(400_000) @ 36 MHz, standard (non-16/9) duty =>
    /// CCR=30, TRISE=11, FS=1, DUTY=0.
    #[test]
    fn fast_mode_36mhz_400khz() {
        let cfg = program(36_000_000, 400_000, false);
        assert_eq!(cfg.ccr, 30);
        assert_eq!(cfg.trise, 11);
        assert!(cfg.fast_mode);
        assert!(!cfg.duty_16_9);
    }

    #[test]
    fn fast_mode_duty_16_9_variant() {
        let cfg = program(36_000_000, 400_000, true);
        assert_eq!(cfg.ccr, 3);
        assert!(cfg.duty_16_9);
    }

    #[test]
    fn standard_mode_ccr_floors_at_4() {
        let cfg = program(1_000_000, 100_000, false);
        assert_eq!(cfg.ccr, 4);
    }

    #[test]
    fn fast_mode_ccr_floors_at_1() {
        let cfg = program(2_000_000, 400_000, false);
        assert_eq!(cfg.ccr, 1);
    }

    #[test]
    fn oar1_bit14_always_forced() {
        assert!(program(8_000_000, 100_000, false).oar1_bit14);
        assert!(program(36_000_000, 400_000, true).oar1_bit14);
    }
}
