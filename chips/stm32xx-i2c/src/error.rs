//! Error classification (spec §4.6 step 9, §7).

pub use kernel::hil::i2c::Error;

use crate::registers::{Sr1Bits, Sr2Bits};

/// Maps the SR1/SR2 bits captured at the end of a transfer to a single
/// `Error`, in the fixed priority order spec.md §4.6 step 9 gives:
/// BERR, ARLO, AF, OVR, PECERR, TIMEOUT, then a bare BUSY with no other bit
/// set. No bits set at all is success (`None`).
pub fn classify(sr1: Sr1Bits, sr2: Sr2Bits) -> Option<Error> {
    if sr1.berr {
        Some(Error::BusError)
    } else if sr1.arlo {
        Some(Error::ArbitrationLost)
    } else if sr1.af {
        Some(Error::Nack)
    } else if sr1.ovr {
        Some(Error::Overrun)
    } else if sr1.pecerr {
        Some(Error::Protocol)
    } else if sr1.timeout {
        Some(Error::BusTimeout)
    } else if sr2.busy {
        Some(Error::Busy)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sr1(set: impl Fn(&mut Sr1Bits)) -> Sr1Bits {
        let mut bits = Sr1Bits::default();
        set(&mut bits);
        bits
    }

    #[test]
    fn priority_order_is_berr_arlo_af_ovr_pecerr_timeout_busy() {
        let all_but_berr = sr1(|b| {
            b.arlo = true;
            b.af = true;
            b.ovr = true;
            b.pecerr = true;
            b.timeout = true;
        });
        let mut with_berr = all_but_berr;
        with_berr.berr = true;
        assert_eq!(classify(with_berr, Sr2Bits::default()), Some(Error::BusError));
        assert_eq!(classify(all_but_berr, Sr2Bits::default()), Some(Error::ArbitrationLost));
    }

    #[test]
    fn busy_only_reports_when_nothing_else_is_set() {
        let mut sr2 = Sr2Bits::default();
        sr2.busy = true;
        assert_eq!(classify(Sr1Bits::default(), sr2), Some(Error::Busy));
    }

    #[test]
    fn no_bits_set_is_success() {
        assert_eq!(classify(Sr1Bits::default(), Sr2Bits::default()), None);
    }
}
