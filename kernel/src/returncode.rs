//! The legacy Tock return-code convention: operations that do not yet
//! return a `Result` surface a `ReturnCode` instead. New HILs (see
//! `hil::i2c`) prefer `Result<(), Error>`, but `ReturnCode` remains the
//! currency of the older chip-level APIs in this repo, and `Error`
//! converts into it at the seam so callers that only know `ReturnCode`
//! keep working.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReturnCode {
    SuccessWithValue { value: usize },
    SUCCESS,
    FAIL,
    EBUSY,
    EALREADY,
    EOFF,
    ERESERVE,
    EINVAL,
    ESIZE,
    ECANCEL,
    ENOMEM,
    ENOSUPPORT,
    ENODEVICE,
    EUNINSTALLED,
    ENOACK,
}

impl From<ReturnCode> for isize {
    fn from(original: ReturnCode) -> isize {
        match original {
            ReturnCode::SuccessWithValue { value } => value as isize,
            ReturnCode::SUCCESS => 0,
            ReturnCode::FAIL => -1,
            ReturnCode::EBUSY => -2,
            ReturnCode::EALREADY => -3,
            ReturnCode::EOFF => -4,
            ReturnCode::ERESERVE => -5,
            ReturnCode::EINVAL => -6,
            ReturnCode::ESIZE => -7,
            ReturnCode::ECANCEL => -8,
            ReturnCode::ENOMEM => -9,
            ReturnCode::ENOSUPPORT => -10,
            ReturnCode::ENODEVICE => -11,
            ReturnCode::EUNINSTALLED => -12,
            ReturnCode::ENOACK => -13,
        }
    }
}
