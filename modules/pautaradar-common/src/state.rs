//! Event state machine rules and editorial action gating.
//!
//! Pure decision logic. Persistence of transitions (append-only history rows)
//! lives in the store crate; the maintenance worker and the editorial action
//! service both route their decisions through here.

use chrono::{DateTime, Utc};

use crate::profile::Pool;
use crate::types::{EditorialAction, EventStatus};

// Stable status reasons written to the event_state history.
pub const FAST_PATH_EVENT_CREATED: &str = "FAST_PATH_EVENT_CREATED";
pub const HYDRATION_TIMEOUT_FAST: &str = "HYDRATION_TIMEOUT_FAST";
pub const HYDRATION_TIMEOUT_RENDER: &str = "HYDRATION_TIMEOUT_RENDER";
pub const HYDRATION_TIMEOUT_DEEP: &str = "HYDRATION_TIMEOUT_DEEP";
pub const QUARANTINE_TTL_EXPIRED: &str = "QUARANTINE_TTL_EXPIRED";
pub const SCORE_QUARANTINE: &str = "SCORE_QUARANTINE";
pub const SCORE_HOT: &str = "SCORE_HOT";
pub const SCORE_HYDRATING: &str = "SCORE_HYDRATING";
pub const FEEDBACK_IGNORE: &str = "FEEDBACK_IGNORE";
pub const FEEDBACK_SNOOZE: &str = "FEEDBACK_SNOOZE";
pub const FEEDBACK_PAUTAR: &str = "FEEDBACK_PAUTAR";
pub const HARD_ANCHOR_MATCH: &str = "HARD_ANCHOR_MATCH";
pub const EDITORIAL_MERGE: &str = "EDITORIAL_MERGE";
pub const EDITORIAL_SPLIT_CREATED: &str = "EDITORIAL_SPLIT_CREATED";
pub const EDITORIAL_SPLIT_SOURCE_UPDATED: &str = "EDITORIAL_SPLIT_SOURCE_UPDATED";

/// Flag key set on events with extreme velocity but thin verification.
pub const FLAG_UNVERIFIED_VIRAL: &str = "UNVERIFIED_VIRAL";

/// SLO seconds per pool, from configuration.
#[derive(Debug, Clone, Copy)]
pub struct SloPolicy {
    pub fast_path_s: u64,
    pub render_path_s: u64,
    pub deep_path_s: u64,
}

impl SloPolicy {
    pub fn timeout_for(&self, pool: Pool) -> u64 {
        match pool {
            Pool::Fast => self.fast_path_s,
            Pool::HeavyRender => self.render_path_s,
            Pool::DeepExtract => self.deep_path_s,
        }
    }
}

/// Hydration timeout check. Returns the status reason when the event must
/// move to PARTIAL_ENRICH. The pool is the one recorded on the task that
/// created the event, not whatever pool is currently fetching.
pub fn hydration_timeout(
    pool: Pool,
    hydration_start: DateTime<Utc>,
    now: DateTime<Utc>,
    slo: &SloPolicy,
) -> Option<&'static str> {
    let elapsed = (now - hydration_start).num_seconds();
    if elapsed <= slo.timeout_for(pool) as i64 {
        return None;
    }
    Some(match pool {
        Pool::Fast => HYDRATION_TIMEOUT_FAST,
        Pool::HeavyRender => HYDRATION_TIMEOUT_RENDER,
        Pool::DeepExtract => HYDRATION_TIMEOUT_DEEP,
    })
}

/// Quarantine TTL check for the maintenance tick.
pub fn quarantine_expired(
    last_update: DateTime<Utc>,
    now: DateTime<Utc>,
    ttl_s: u64,
) -> bool {
    (now - last_update).num_seconds() > ttl_s as i64
}

/// Grey-area heuristic: low score despite multiple sources.
pub fn check_quarantine(score_plantao: f64, diversity: u32) -> bool {
    score_plantao < 20.0 && diversity >= 2
}

/// Extreme velocity with thin verification.
pub fn check_unverified_viral(velocity: f64, diversity: u32) -> bool {
    velocity > 50.0 && diversity >= 3
}

/// Status proposed by the scoring engine. `None` means leave it alone.
pub fn propose_status(
    current: EventStatus,
    score_plantao: f64,
    diversity: u32,
) -> Option<EventStatus> {
    if current.is_terminal() {
        return None;
    }
    if check_quarantine(score_plantao, diversity) {
        return Some(EventStatus::Quarantine);
    }
    if score_plantao >= 70.0 {
        return Some(EventStatus::Hot);
    }
    if matches!(current, EventStatus::New | EventStatus::Hydrating) {
        return Some(EventStatus::Hydrating);
    }
    None
}

/// Why an editorial action was refused. The wire form is the stable
/// `ACTION_BLOCKED_*` code surfaced in 409 bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Tombstone,
    Hydrating,
    Terminal,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tombstone => "ACTION_BLOCKED_TOMBSTONE",
            Self::Hydrating => "ACTION_BLOCKED_HYDRATING",
            Self::Terminal => "ACTION_BLOCKED_TERMINAL",
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State-gating for editorial actions. Never mutates anything; callers must
/// not touch state when this returns a block.
///
/// `hydration_timed_out` is the result of [`hydration_timeout`] for events
/// still in HYDRATING.
pub fn action_gating(
    action: EditorialAction,
    status: EventStatus,
    is_tombstone: bool,
    hydration_timed_out: bool,
) -> Result<(), BlockReason> {
    if is_tombstone || status == EventStatus::Merged {
        return Err(BlockReason::Tombstone);
    }

    match action {
        EditorialAction::Ignore | EditorialAction::Snooze => Ok(()),
        EditorialAction::Merge | EditorialAction::Split | EditorialAction::Pautar => {
            if status == EventStatus::Hydrating && !hydration_timed_out {
                return Err(BlockReason::Hydrating);
            }
            if matches!(status, EventStatus::Ignored | EventStatus::Expired) {
                return Err(BlockReason::Terminal);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SLO: SloPolicy = SloPolicy { fast_path_s: 60, render_path_s: 120, deep_path_s: 300 };

    #[test]
    fn hydration_timeout_respects_pool_slo() {
        let now = Utc::now();
        assert_eq!(hydration_timeout(Pool::Fast, now - Duration::seconds(59), now, &SLO), None);
        assert_eq!(
            hydration_timeout(Pool::Fast, now - Duration::seconds(61), now, &SLO),
            Some(HYDRATION_TIMEOUT_FAST)
        );
        assert_eq!(
            hydration_timeout(Pool::HeavyRender, now - Duration::seconds(61), now, &SLO),
            None
        );
        assert_eq!(
            hydration_timeout(Pool::HeavyRender, now - Duration::seconds(121), now, &SLO),
            Some(HYDRATION_TIMEOUT_RENDER)
        );
        assert_eq!(
            hydration_timeout(Pool::DeepExtract, now - Duration::seconds(301), now, &SLO),
            Some(HYDRATION_TIMEOUT_DEEP)
        );
    }

    #[test]
    fn quarantine_ttl_boundary() {
        let now = Utc::now();
        assert!(!quarantine_expired(now - Duration::seconds(900), now, 900));
        assert!(quarantine_expired(now - Duration::seconds(901), now, 900));
    }

    #[test]
    fn quarantine_heuristic_needs_low_score_and_two_sources() {
        assert!(check_quarantine(19.9, 2));
        assert!(!check_quarantine(19.9, 1));
        assert!(!check_quarantine(20.0, 2));
    }

    #[test]
    fn unverified_viral_threshold() {
        assert!(check_unverified_viral(50.1, 3));
        assert!(!check_unverified_viral(50.1, 2));
        assert!(!check_unverified_viral(50.0, 3));
    }

    #[test]
    fn score_proposals() {
        assert_eq!(
            propose_status(EventStatus::Hydrating, 10.0, 2),
            Some(EventStatus::Quarantine)
        );
        assert_eq!(propose_status(EventStatus::Hydrating, 75.0, 1), Some(EventStatus::Hot));
        assert_eq!(
            propose_status(EventStatus::New, 40.0, 1),
            Some(EventStatus::Hydrating)
        );
        assert_eq!(propose_status(EventStatus::PartialEnrich, 40.0, 1), None);
        assert_eq!(propose_status(EventStatus::Merged, 90.0, 5), None);
    }

    #[test]
    fn tombstones_block_every_action() {
        for action in [
            EditorialAction::Ignore,
            EditorialAction::Snooze,
            EditorialAction::Pautar,
            EditorialAction::Merge,
            EditorialAction::Split,
        ] {
            assert_eq!(
                action_gating(action, EventStatus::Hot, true, true),
                Err(BlockReason::Tombstone)
            );
        }
    }

    #[test]
    fn hydrating_blocks_structural_actions_until_timeout() {
        let blocked =
            action_gating(EditorialAction::Merge, EventStatus::Hydrating, false, false);
        assert_eq!(blocked, Err(BlockReason::Hydrating));

        let allowed =
            action_gating(EditorialAction::Merge, EventStatus::Hydrating, false, true);
        assert_eq!(allowed, Ok(()));

        // IGNORE is allowed even mid-hydration.
        assert_eq!(
            action_gating(EditorialAction::Ignore, EventStatus::Hydrating, false, false),
            Ok(())
        );
    }

    #[test]
    fn terminal_states_block_structural_actions() {
        assert_eq!(
            action_gating(EditorialAction::Pautar, EventStatus::Expired, false, true),
            Err(BlockReason::Terminal)
        );
        assert_eq!(
            action_gating(EditorialAction::Split, EventStatus::Ignored, false, true),
            Err(BlockReason::Terminal)
        );
    }
}
