use std::fmt::{Debug, Display};
use std::ops::Deref;

/// A base64 encoded symmetric key.
///
/// The `Debug` implementation redacts the value so keys don't end up in
/// logs by accident.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SharedKey(String);

impl Deref for SharedKey {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedKey(***)")
    }
}

impl Display for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<String> for SharedKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SharedKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<SharedKey> for String {
    fn from(value: SharedKey) -> Self {
        value.0
    }
}
