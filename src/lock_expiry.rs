use std::{str::FromStr, time::Duration};

use derive_more::{Display, From};
use thiserror::Error;

use crate::Bytes;

/// The absolute expiry timestamp of a lock hold, in milliseconds since the UNIX epoch.
///
/// This is the only lock metadata kept in a store.
/// It is encoded as a decimal integer string, e.g. `1000110000`.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, From)]
pub struct LockExpiry(i64);

/// An invalid lock expiry encoding.
#[derive(Debug, Error)]
#[error("invalid lock expiry {0:?}, expected milliseconds since the UNIX epoch")]
pub struct LockExpiryError(String);

impl LockExpiry {
    /// Create a lock expiry from milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Create the expiry of a hold of `max_hold` starting at `now_millis`.
    ///
    /// Saturates at [`i64::MAX`].
    #[must_use]
    pub fn after(now_millis: i64, max_hold: Duration) -> Self {
        let max_hold = i64::try_from(max_hold.as_millis()).unwrap_or(i64::MAX);
        Self(now_millis.saturating_add(max_hold))
    }

    /// Returns the expiry in milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns true if the hold has expired at `now_millis`.
    ///
    /// A hold is still fresh at the exact millisecond of its expiry.
    #[must_use]
    pub const fn is_expired_at(self, now_millis: i64) -> bool {
        self.0 < now_millis
    }

    /// Encode the expiry as a store value.
    #[must_use]
    pub fn to_bytes(self) -> Bytes {
        Bytes::from(self.0.to_string())
    }

    /// Decode an expiry from a store value.
    ///
    /// # Errors
    /// Returns a [`LockExpiryError`] if `value` is not a UTF-8 decimal integer.
    pub fn from_bytes(value: &[u8]) -> Result<Self, LockExpiryError> {
        std::str::from_utf8(value)
            .map_err(|_| LockExpiryError(String::from_utf8_lossy(value).into_owned()))?
            .parse()
    }
}

impl FromStr for LockExpiry {
    type Err = LockExpiryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| LockExpiryError(s.to_string()))
    }
}
