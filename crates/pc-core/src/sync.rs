//! The feed's temporal anchor.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Cadence used when the upstream omits `keyframe_interval`.
pub const DEFAULT_KEYFRAME_INTERVAL_SECS: u64 = 3;

fn default_keyframe_interval() -> u64 {
    DEFAULT_KEYFRAME_INTERVAL_SECS
}

/// Sync metadata published by the upstream at `GET {base}/sync`.
///
/// `fragment`, `tick`, `tps` and `keyframe_interval` are fixed for one feed
/// session. Fields the relay does not interpret are kept in `extra` so the
/// record can be re-exposed without losing anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Fragment number that anchors tick accounting.
    pub fragment: i64,
    /// Logical tick at `fragment`.
    pub tick: i64,
    /// Ticks advanced per fragment increment.
    pub tps: i64,
    /// Seconds between polling cycles.
    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval: u64,
    /// Fragment carrying the one-time `start` payload.
    pub signup_fragment: i64,
    /// Set only on delayed copies handed to clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_redirect: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SyncRecord {
    /// Parse a sync record from upstream JSON.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Validation(format!("sync record parse error: {e}")))
    }

    /// Serialize back to JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::Internal(format!("sync record serialize error: {e}")))
    }

    /// The feed clock: tick at an arbitrary fragment number.
    ///
    /// Fails when the tick does not fit in an `i64`.
    pub fn tick_at(&self, fragment: i64) -> Result<i64> {
        fragment
            .checked_sub(self.fragment)
            .and_then(|offset| offset.checked_mul(self.tps))
            .and_then(|ticks| ticks.checked_add(self.tick))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "tick for fragment {fragment} is out of range (anchor {} at tick {}, tps {})",
                    self.fragment, self.tick, self.tps
                ))
            })
    }

    /// First fragment number the collector polls.
    ///
    /// The upstream reports a negative anchor while a map change is in
    /// progress; there is nothing to collect in that state.
    pub fn first_fragment(&self) -> Result<u64> {
        u64::try_from(self.fragment).map_err(|_| {
            Error::Validation(format!(
                "feed not yet available (sync fragment is {})",
                self.fragment
            ))
        })
    }

    /// Fragment number of the bootstrap `start` payload.
    pub fn start_fragment(&self) -> Result<u64> {
        u64::try_from(self.signup_fragment).map_err(|_| {
            Error::Validation(format!(
                "invalid signup fragment {}",
                self.signup_fragment
            ))
        })
    }

    /// Polling cadence.
    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.keyframe_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPSTREAM_SYNC: &str = r#"{
        "tick": 128512,
        "endtick": 128700,
        "maxtick": 128900,
        "rtdelay": 1.4,
        "rcvage": 0.2,
        "fragment": 251,
        "signup_fragment": 0,
        "tps": 64,
        "keyframe_interval": 3,
        "map": "de_ancient",
        "protocol": 5
    }"#;

    #[test]
    fn parses_upstream_sync_and_keeps_unknown_fields() {
        let sync = SyncRecord::from_json(UPSTREAM_SYNC.as_bytes()).unwrap();
        assert_eq!(sync.fragment, 251);
        assert_eq!(sync.tick, 128512);
        assert_eq!(sync.tps, 64);
        assert_eq!(sync.keyframe_interval, 3);
        assert_eq!(sync.signup_fragment, 0);
        assert_eq!(sync.token_redirect, None);
        assert_eq!(sync.extra["map"], "de_ancient");
        assert_eq!(sync.extra["protocol"], 5);

        let round: serde_json::Value =
            serde_json::from_slice(&sync.to_json().unwrap()).unwrap();
        assert_eq!(round["endtick"], 128700);
        assert!(round.get("token_redirect").is_none());
    }

    #[test]
    fn keyframe_interval_defaults_to_three_seconds() {
        let json = r#"{"fragment": 10, "tick": 0, "tps": 32, "signup_fragment": 1}"#;
        let sync = SyncRecord::from_json(json.as_bytes()).unwrap();
        assert_eq!(sync.cadence(), Duration::from_secs(3));
    }

    #[test]
    fn missing_required_field_is_validation_error() {
        let json = r#"{"fragment": 10, "tps": 32}"#;
        let err = SyncRecord::from_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn tick_at_follows_clock_law() {
        let json = r#"{"fragment": 100, "tick": 5000, "tps": 30, "signup_fragment": 99}"#;
        let sync = SyncRecord::from_json(json.as_bytes()).unwrap();
        assert_eq!(sync.tick_at(100).unwrap(), 5000);
        assert_eq!(sync.tick_at(150).unwrap(), 6500);
        assert_eq!(sync.tick_at(99).unwrap(), 4970);
    }

    #[test]
    fn negative_anchor_is_not_collectable() {
        let json = r#"{"fragment": -40, "tick": 0, "tps": 64, "signup_fragment": -41}"#;
        let sync = SyncRecord::from_json(json.as_bytes()).unwrap();
        assert!(sync.first_fragment().is_err());
        assert!(sync.start_fragment().is_err());
    }
}
