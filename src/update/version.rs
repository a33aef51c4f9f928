//! Dotted numeric version parsing and ordering.
//!
//! Versions compare componentwise as integers, so `1.10.0` is newer than
//! `1.9.0`. Missing trailing components count as zero (`1.0 == 1.0.0`).

use crate::error::{Result, UpdateError};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed dotted numeric version (e.g. `1.0.1`).
#[derive(Debug, Clone, Eq)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    /// Parse a version string. A single leading `v` or `V` is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Parse`] for empty strings, empty components
    /// (`1..2`), or any non-numeric component (`1.0-beta`).
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        if body.is_empty() {
            return Err(UpdateError::Parse(format!("empty version string {input:?}")));
        }

        let parts = body
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                    return Err(UpdateError::Parse(format!(
                        "invalid version {input:?}: component {part:?} is not numeric"
                    )));
                }
                part.parse::<u64>().map_err(|e| {
                    UpdateError::Parse(format!("invalid version {input:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { parts })
    }

    /// Numeric components as parsed.
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }
}

impl FromStr for Version {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.parts {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
            first = false;
        }
        Ok(())
    }
}

/// Returns `true` if `a` is strictly newer than `b`.
///
/// # Errors
///
/// Returns [`UpdateError::Parse`] if either string is not a valid version.
/// Callers must surface this rather than treating it as "no update".
pub fn is_newer(a: &str, b: &str) -> Result<bool> {
    Ok(Version::parse(a)? > Version::parse(b)?)
}
