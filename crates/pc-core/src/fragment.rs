//! Fragment identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The three payload kinds a playcast feed publishes per fragment number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentType {
    /// One-time bootstrap payload, fetched at `signup_fragment`.
    Start,
    /// Complete snapshot at a fragment number.
    Full,
    /// Incremental update sharing the number of its full counterpart.
    Delta,
}

impl FragmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            FragmentType::Start => "start",
            FragmentType::Full => "full",
            FragmentType::Delta => "delta",
        }
    }
}

impl fmt::Display for FragmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FragmentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(FragmentType::Start),
            "full" => Ok(FragmentType::Full),
            "delta" => Ok(FragmentType::Delta),
            other => Err(Error::Validation(format!("unknown fragment type '{other}'"))),
        }
    }
}

/// Store and upstream key of one fragment: `(number, type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentKey {
    pub number: u64,
    pub kind: FragmentType,
}

impl FragmentKey {
    pub fn new(number: u64, kind: FragmentType) -> Self {
        Self { number, kind }
    }

    pub fn start(number: u64) -> Self {
        Self::new(number, FragmentType::Start)
    }

    pub fn full(number: u64) -> Self {
        Self::new(number, FragmentType::Full)
    }

    pub fn delta(number: u64) -> Self {
        Self::new(number, FragmentType::Delta)
    }
}

/// Renders as the relative URL/path form `{number}/{type}`.
impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.kind)
    }
}
