//! Structured deltas between document versions: what changed, as data.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AnchorDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

pub fn anchor_delta(old: &[String], new: &[String]) -> AnchorDelta {
    let old_set: HashSet<&String> = old.iter().collect();
    let new_set: HashSet<&String> = new.iter().collect();
    let mut added: Vec<String> =
        new_set.difference(&old_set).map(|s| s.to_string()).collect();
    let mut removed: Vec<String> =
        old_set.difference(&new_set).map(|s| s.to_string()).collect();
    added.sort();
    removed.sort();
    AnchorDelta { added, removed }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValueDelta {
    pub from: Option<f64>,
    pub to: Option<f64>,
    pub diff: f64,
}

pub fn value_delta(old: Option<f64>, new: Option<f64>) -> Option<ValueDelta> {
    if old == new {
        return None;
    }
    Some(ValueDelta {
        from: old,
        to: new,
        diff: new.unwrap_or(0.0) - old.unwrap_or(0.0),
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TemporalDelta {
    pub previous_time: Option<DateTime<Utc>>,
    pub new_time: Option<DateTime<Utc>>,
    pub is_postponed: Option<bool>,
}

pub fn temporal_delta(
    old: Option<DateTime<Utc>>,
    new: Option<DateTime<Utc>>,
) -> Option<TemporalDelta> {
    if old == new {
        return None;
    }
    Some(TemporalDelta {
        previous_time: old,
        new_time: new,
        is_postponed: match (old, new) {
            (Some(o), Some(n)) => Some(n > o),
            _ => None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn anchor_delta_splits_added_and_removed() {
        let old = vec!["CNPJ:1".to_string(), "PL:2".to_string()];
        let new = vec!["PL:2".to_string(), "SEI:3".to_string()];
        let delta = anchor_delta(&old, &new);
        assert_eq!(delta.added, vec!["SEI:3"]);
        assert_eq!(delta.removed, vec!["CNPJ:1"]);
    }

    #[test]
    fn value_delta_none_when_unchanged() {
        assert_eq!(value_delta(Some(10.0), Some(10.0)), None);
        assert_eq!(value_delta(None, None), None);
        let delta = value_delta(Some(10.0), Some(25.0)).unwrap();
        assert!((delta.diff - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn temporal_delta_flags_postponement() {
        let t0 = Utc::now();
        let later = t0 + Duration::hours(3);
        let delta = temporal_delta(Some(t0), Some(later)).unwrap();
        assert_eq!(delta.is_postponed, Some(true));
        let delta = temporal_delta(Some(later), Some(t0)).unwrap();
        assert_eq!(delta.is_postponed, Some(false));
        assert_eq!(temporal_delta(Some(t0), Some(t0)), None);
        assert_eq!(temporal_delta(None, Some(t0)).unwrap().is_postponed, None);
    }
}
