/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the error taxonomy used by the Marker LID parser and the
    firmware acceptance policies.

--*/
use core::fmt;
use core::num::{NonZeroU32, TryFromIntError};

/// Numeric error code
/// Derives debug, copy, clone, eq, and partial eq
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ErrorCode(pub NonZeroU32);

/// Macro to define error code constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_codes {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: ErrorCode = ErrorCode::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error codes for testing uniqueness
        pub fn all_codes() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl ErrorCode {
    /// Create an error code; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. Use `ErrorCode::try_from()` for runtime values.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("ErrorCode cannot be 0"),
        }
    }

    define_error_codes![
        (
            UNPARSEABLE_VERSION,
            0x0001_0001,
            "Version string does not match the configured pattern"
        ),
        (
            INVALID_PATTERN,
            0x0001_0002,
            "Configured version pattern is invalid"
        ),
        (
            TRUNCATED_RECORD,
            0x0002_0001,
            "Short read inside the Marker LID"
        ),
        (
            MALFORMED_ADF,
            0x0002_0002,
            "Additional data field is malformed"
        ),
        (IO, 0x0002_0003, "Marker LID could not be opened"),
        (
            BELOW_MINIMUM_SHIP_LEVEL,
            0x0003_0001,
            "Image version is below the minimum ship level"
        ),
        (
            EXPIRED_ACCESS_KEY,
            0x0004_0001,
            "Update access key has expired for this service pack"
        ),
        (
            POLICY_STORE_UNAVAILABLE,
            0x0005_0001,
            "Policy keyword store could not be reached"
        ),
    ];
}

impl From<ErrorCode> for u32 {
    fn from(val: ErrorCode) -> Self {
        val.0.get()
    }
}

impl TryFrom<u32> for ErrorCode {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        NonZeroU32::try_from(val).map(ErrorCode)
    }
}

/// Error raised by the Marker LID parser and the acceptance policies.
///
/// Parse-level kinds (`TruncatedRecord`, `MalformedAdf`, `UnparseableVersion`,
/// `PolicyStoreUnavailable`) are absorbed inside the core. Only
/// `BelowMinimumShipLevel` and `ExpiredAccessKey` are meant to reach the
/// activation glue.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LidError {
    UnparseableVersion {
        version: String,
    },
    InvalidPattern {
        pattern: String,
        reason: String,
    },
    TruncatedRecord {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    MalformedAdf {
        offset: u64,
    },
    Io {
        path: String,
        reason: String,
    },
    BelowMinimumShipLevel {
        minimum: String,
        actual: String,
        purpose: String,
    },
    ExpiredAccessKey {
        expiration_date: String,
        build_date: String,
    },
    PolicyStoreUnavailable {
        key: String,
        reason: String,
    },
}

impl LidError {
    /// Stable numeric code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnparseableVersion { .. } => ErrorCode::UNPARSEABLE_VERSION,
            Self::InvalidPattern { .. } => ErrorCode::INVALID_PATTERN,
            Self::TruncatedRecord { .. } => ErrorCode::TRUNCATED_RECORD,
            Self::MalformedAdf { .. } => ErrorCode::MALFORMED_ADF,
            Self::Io { .. } => ErrorCode::IO,
            Self::BelowMinimumShipLevel { .. } => ErrorCode::BELOW_MINIMUM_SHIP_LEVEL,
            Self::ExpiredAccessKey { .. } => ErrorCode::EXPIRED_ACCESS_KEY,
            Self::PolicyStoreUnavailable { .. } => ErrorCode::POLICY_STORE_UNAVAILABLE,
        }
    }

    /// Returns true for the rejections that must block activation
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            Self::BelowMinimumShipLevel { .. } | Self::ExpiredAccessKey { .. }
        )
    }
}

impl fmt::Display for LidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparseableVersion { version } => {
                write!(f, "unable to parse version {version:?}")
            }
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "invalid version pattern {pattern:?}: {reason}")
            }
            Self::TruncatedRecord {
                offset,
                expected,
                actual,
            } => write!(
                f,
                "truncated read at offset {offset:#x}: expected {expected} bytes, got {actual}"
            ),
            Self::MalformedAdf { offset } => {
                write!(f, "malformed additional data field at offset {offset:#x}")
            }
            Self::Io { path, reason } => write!(f, "{path}: {reason}"),
            Self::BelowMinimumShipLevel {
                minimum,
                actual,
                purpose,
            } => write!(
                f,
                "minimum ship level ({minimum}) not met by {actual} (purpose {purpose})"
            ),
            Self::ExpiredAccessKey {
                expiration_date,
                build_date,
            } => write!(
                f,
                "update access key expired: expiration date {expiration_date}, build date {build_date}"
            ),
            Self::PolicyStoreUnavailable { key, reason } => {
                write!(f, "policy store unavailable for {key}: {reason}")
            }
        }
    }
}

impl std::error::Error for LidError {}

pub type LidResult<T> = Result<T, LidError>;
