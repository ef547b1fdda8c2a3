use derive_more::{Display, From};
use thiserror::Error;

/// A store key identifying a lockable resource.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct StoreKey(String);

/// An invalid store key.
#[derive(Debug, From, Error)]
#[error("invalid store key {0:?}")]
pub struct StoreKeyError(String);

impl StoreKey {
    /// Create a new store key from `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreKeyError`] if `key` is not valid according to [`StoreKey::validate()`].
    pub fn new(key: impl Into<String>) -> Result<Self, StoreKeyError> {
        let key = key.into();
        if Self::validate(&key) {
            Ok(Self(key))
        } else {
            Err(StoreKeyError(key))
        }
    }

    /// Extracts a string slice of the underlying key [String].
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a key: a key cannot be an empty string or contain a NUL character.
    ///
    /// Any other string is a valid key, including `/`-separated paths such as `/orders/42`.
    #[must_use]
    pub fn validate(key: &str) -> bool {
        !key.is_empty() && !key.contains('\0')
    }
}

impl TryFrom<&str> for StoreKey {
    type Error = StoreKeyError;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

impl TryFrom<String> for StoreKey {
    type Error = StoreKeyError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_key() {
        assert!(StoreKey::new("42").is_ok());
        assert_eq!(StoreKey::new("product/42").unwrap().to_string(), "product/42");
        assert!(StoreKey::new("").is_err());
        assert!(StoreKey::new("a\0b").is_err());
        for key in ["/orders/42", "a/", "a//b", "a/../b", ".", "..", "a.lock", "100%"] {
            assert_eq!(StoreKey::new(key).unwrap().as_str(), key);
        }
        assert_eq!(
            StoreKey::new("").unwrap_err().to_string(),
            "invalid store key \"\""
        );
    }
}
