//! Output naming.

use std::fmt;
use std::str::FromStr;

use crate::IoError;

/// Longest accepted experiment name.
pub const MAX_EXPERIMENT_NAME_LEN: usize = 64;

/// Prefix shared by every file one run writes.
///
/// ASCII letters, digits, `_` and `-` only, starting with a letter or digit,
/// so it is always a single safe path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] when the name is empty, too
    /// long, does not start alphanumerically, or has other characters.
    pub fn new(name: String) -> Result<Self, IoError> {
        let reject = |reason| {
            Err(IoError::InvalidExperimentName {
                name: name.clone(),
                reason,
            })
        };
        let Some(first) = name.chars().next() else {
            return reject("empty");
        };
        if name.len() > MAX_EXPERIMENT_NAME_LEN {
            return reject("longer than 64 characters");
        }
        if !first.is_ascii_alphanumeric() {
            return reject("must start with a letter or digit");
        }
        if name
            .bytes()
            .any(|b| !(b.is_ascii_alphanumeric() || b == b'_' || b == b'-'))
        {
            return reject("only letters, digits, '_' and '-' allowed");
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ExperimentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExperimentName {
    type Error = IoError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl FromStr for ExperimentName {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
