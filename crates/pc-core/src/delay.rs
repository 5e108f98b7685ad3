//! Delayed-start planning.
//!
//! Given the sync anchor and the newest fragment the collector has stored,
//! [`DelayPlanner::plan`] decides which fragment (and tick) a viewer asking for
//! a lagged view resumes from. When the store does not yet hold enough history
//! the plan falls back to the anchor fragment and asks the caller to wait for
//! the missing fragments plus a safety margin, so the viewer does not race
//! the collector's own cadence.
//!
//! Planning is pure: no I/O, no clock, no hidden state.

use std::time::Duration;

use crate::config::DelayConfig;
use crate::{Result, SyncRecord};

/// Relative URL delayed clients are redirected to for fragment fetches, so
/// that content comes from the live store instead of a second delay layer.
pub const TOKEN_REDIRECT: &str = "../";

/// Where a delayed viewer resumes, and how long to hold them first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPlan {
    pub resume_fragment: i64,
    pub resume_tick: i64,
    /// Requested delay minus buffered history; positive means short.
    pub deficit: i64,
    /// True when the buffer was too short and the viewer must wait.
    pub catch_up: bool,
    /// Zero unless `catch_up`.
    pub wait: Duration,
}

/// Computes [`DelayPlan`]s for a fixed delay and safety margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPlanner {
    delay_fragments: u64,
    safety_margin: Duration,
}

impl DelayPlanner {
    pub fn new(delay_fragments: u64, safety_margin: Duration) -> Self {
        Self {
            delay_fragments,
            safety_margin,
        }
    }

    pub fn delay_fragments(&self) -> u64 {
        self.delay_fragments
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Plan a delayed start against the newest stored fragment.
    ///
    /// Fails with [`Error::Validation`](crate::Error::Validation) when the
    /// resume tick cannot be represented.
    pub fn plan(&self, sync: &SyncRecord, current: u64) -> Result<DelayPlan> {
        let current = i64::try_from(current).unwrap_or(i64::MAX);
        let delay = i64::try_from(self.delay_fragments).unwrap_or(i64::MAX);
        let buffered = current.saturating_sub(sync.fragment);
        let deficit = delay.saturating_sub(buffered);

        let (resume_fragment, wait) = if deficit > 0 {
            // Not enough history: start from the anchor once the missing
            // fragments have had time to arrive.
            let missing = Duration::from_secs(deficit.unsigned_abs());
            (sync.fragment, missing + self.safety_margin)
        } else {
            (current - delay, Duration::ZERO)
        };

        Ok(DelayPlan {
            resume_fragment,
            resume_tick: sync.tick_at(resume_fragment)?,
            deficit,
            catch_up: deficit > 0,
            wait,
        })
    }

    /// Derived copy of `sync` re-anchored at the plan's resume point.
    ///
    /// The stored original is never touched.
    pub fn delayed_sync(&self, sync: &SyncRecord, plan: &DelayPlan) -> SyncRecord {
        let mut delayed = sync.clone();
        delayed.fragment = plan.resume_fragment;
        delayed.tick = plan.resume_tick;
        delayed.token_redirect = Some(TOKEN_REDIRECT.to_string());
        delayed
    }
}

impl From<&DelayConfig> for DelayPlanner {
    fn from(config: &DelayConfig) -> Self {
        Self::new(
            config.fragments,
            Duration::from_secs(config.safety_margin_secs),
        )
    }
}

impl Default for DelayPlanner {
    fn default() -> Self {
        Self::from(&DelayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn sync(fragment: i64, tick: i64, tps: i64) -> SyncRecord {
        SyncRecord {
            fragment,
            tick,
            tps,
            keyframe_interval: 3,
            signup_fragment: fragment - 1,
            token_redirect: None,
            extra: serde_json::Map::new(),
        }
    }

    fn planner() -> DelayPlanner {
        DelayPlanner::new(50, Duration::from_secs(5))
    }

    #[test]
    fn live_edge_beyond_tick_range_is_rejected() {
        let err = planner().plan(&sync(100, 5000, 30), u64::MAX).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn oversized_tps_is_rejected() {
        let err = planner().plan(&sync(100, 5000, i64::MAX), 200).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn catch_up_at_anchor_tolerates_oversized_tps() {
        // The anchor's own tick needs no multiplication.
        let plan = planner().plan(&sync(100, 5000, i64::MAX), 120).unwrap();
        assert!(plan.catch_up);
        assert_eq!(plan.resume_tick, 5000);
    }

    #[test]
    fn enough_history_resumes_exactly_delay_behind() {
        let plan = planner().plan(&sync(100, 5000, 30), 200).unwrap();
        assert_eq!(plan.resume_fragment, 150);
        assert_eq!(plan.resume_tick, 6500);
        assert_eq!(plan.deficit, -50);
        assert!(!plan.catch_up);
        assert_eq!(plan.wait, Duration::ZERO);
    }

    #[test]
    fn short_history_waits_and_resumes_from_anchor() {
        let plan = planner().plan(&sync(100, 5000, 30), 120).unwrap();
        assert_eq!(plan.deficit, 30);
        assert!(plan.catch_up);
        assert_eq!(plan.resume_fragment, 100);
        assert_eq!(plan.resume_tick, 5000);
        assert_eq!(plan.wait, Duration::from_secs(35));
    }

    #[test]
    fn exact_history_needs_no_wait() {
        let plan = planner().plan(&sync(100, 5000, 30), 150).unwrap();
        assert_eq!(plan.deficit, 0);
        assert!(!plan.catch_up);
        assert_eq!(plan.resume_fragment, 100);
        assert_eq!(plan.resume_tick, 5000);
    }

    #[test]
    fn one_fragment_short_still_catches_up() {
        let plan = planner().plan(&sync(100, 5000, 30), 149).unwrap();
        assert_eq!(plan.deficit, 1);
        assert!(plan.catch_up);
        assert_eq!(plan.resume_fragment, 100);
        assert_eq!(plan.wait, Duration::from_secs(6));
    }

    #[test]
    fn current_behind_anchor_counts_as_no_history() {
        let plan = planner().plan(&sync(100, 5000, 30), 90).unwrap();
        assert_eq!(plan.deficit, 60);
        assert_eq!(plan.resume_fragment, 100);
        assert_eq!(plan.wait, Duration::from_secs(65));
    }

    #[test]
    fn clock_law_holds_across_inputs() {
        let p = planner();
        for anchor in [0i64, 7, 100, 4096] {
            for current in 0u64..400 {
                let s = sync(anchor, 1_000 + anchor * 3, 64);
                let plan = p.plan(&s, current).unwrap();
                assert_eq!(
                    plan.resume_tick,
                    s.tick + (plan.resume_fragment - s.fragment) * s.tps
                );
                let buffered = current as i64 - anchor;
                if 50 <= buffered {
                    assert_eq!(plan.resume_fragment, current as i64 - 50);
                    assert_eq!(plan.wait, Duration::ZERO);
                } else {
                    assert_eq!(plan.resume_fragment, anchor);
                    assert_eq!(plan.resume_tick, s.tick);
                    assert!(plan.wait >= Duration::from_secs((50 - buffered) as u64 + 5));
                }
            }
        }
    }

    #[test]
    fn planning_is_idempotent() {
        let p = planner();
        let s = sync(100, 5000, 30);
        assert_eq!(p.plan(&s, 120).unwrap(), p.plan(&s, 120).unwrap());
        assert_eq!(p.plan(&s, 200).unwrap(), p.plan(&s, 200).unwrap());
    }

    #[test]
    fn zero_delay_resumes_at_live_edge() {
        let p = DelayPlanner::new(0, Duration::from_secs(5));
        let plan = p.plan(&sync(100, 5000, 30), 130).unwrap();
        assert_eq!(plan.resume_fragment, 130);
        assert!(!plan.catch_up);
    }

    #[test]
    fn delayed_sync_replaces_anchor_and_adds_redirect() {
        let mut original = sync(100, 5000, 30);
        original
            .extra
            .insert("map".into(), serde_json::Value::from("de_nuke"));
        let p = planner();
        let plan = p.plan(&original, 200).unwrap();
        let delayed = p.delayed_sync(&original, &plan);

        assert_eq!(delayed.fragment, 150);
        assert_eq!(delayed.tick, 6500);
        assert_eq!(delayed.token_redirect.as_deref(), Some("../"));
        assert_eq!(delayed.tps, original.tps);
        assert_eq!(delayed.signup_fragment, original.signup_fragment);
        assert_eq!(delayed.extra["map"], "de_nuke");
        // The source record is not modified.
        assert_eq!(original.fragment, 100);
        assert_eq!(original.token_redirect, None);
    }

    #[test]
    fn default_planner_uses_reference_constants() {
        let p = DelayPlanner::default();
        assert_eq!(p.delay_fragments(), 50);
        assert_eq!(p.safety_margin(), Duration::from_secs(5));
    }
}
