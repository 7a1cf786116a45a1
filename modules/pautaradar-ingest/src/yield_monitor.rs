//! Yield and starvation monitoring.
//!
//! Every organized fetch records how many anchors it produced. A source that
//! keeps answering HTTP 200 while its anchor yield collapses against its own
//! baseline has silently broken layout or API. That is a DATA_STARVATION
//! incident, not a fetch error.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::cache::EphemeralCache;
use crate::metrics::Metrics;

/// Ring bounds per source.
const RING_MAX_ENTRIES: usize = 500;
const RING_TTL_H: u64 = 72;

/// Minimum recent HTTP-200 points before starvation is considered.
const MIN_RECENT: usize = 5;
/// Minimum historical HTTP-200 points for a mature baseline.
const MIN_HISTORICAL: usize = 10;
/// Minimum same-slot points for the calendar baseline.
const MIN_CALENDAR: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldPoint {
    pub ts: DateTime<Utc>,
    pub anchors_count: u32,
    pub status_code: u16,
}

fn ring_key(source_pk: i64) -> String {
    format!("radar:yield:{source_pk}")
}

#[derive(Clone)]
pub struct YieldMonitor {
    cache: Arc<EphemeralCache>,
}

impl YieldMonitor {
    pub fn new(cache: Arc<EphemeralCache>) -> Self {
        Self { cache }
    }

    /// Record the yield of one fetch.
    pub async fn update_yield(&self, source_pk: i64, anchors_count: u32, status_code: u16) {
        let point = YieldPoint { ts: Utc::now(), anchors_count, status_code };
        let Ok(encoded) = serde_json::to_string(&point) else {
            return;
        };
        self.cache
            .ring_push(
                &ring_key(source_pk),
                &encoded,
                RING_MAX_ENTRIES,
                std::time::Duration::from_secs(RING_TTL_H * 3600),
            )
            .await;
    }

    /// Whether the source's recent yield has collapsed against baseline.
    pub async fn check_starvation(
        &self,
        source_pk: i64,
        window_min: i64,
        calendar_profile: Option<&str>,
    ) -> bool {
        let history: Vec<YieldPoint> = self
            .cache
            .ring_all(&ring_key(source_pk))
            .await
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect();
        evaluate_starvation(&history, Utc::now(), window_min, calendar_profile)
    }
}

/// Pure starvation rule over a yield history.
pub fn evaluate_starvation(
    history: &[YieldPoint],
    now: DateTime<Utc>,
    window_min: i64,
    calendar_profile: Option<&str>,
) -> bool {
    if history.is_empty() {
        return false;
    }

    let cutoff = now - Duration::minutes(window_min);
    let (recent, older): (Vec<&YieldPoint>, Vec<&YieldPoint>) =
        history.iter().partition(|p| p.ts >= cutoff);

    if recent.len() < MIN_RECENT {
        return false;
    }
    let recent_200: Vec<&&YieldPoint> =
        recent.iter().filter(|p| p.status_code == 200).collect();
    if recent_200.len() < MIN_RECENT {
        return false;
    }

    let recent_avg =
        recent_200.iter().map(|p| p.anchors_count as f64).sum::<f64>() / recent_200.len() as f64;

    let historical_200: Vec<&&YieldPoint> =
        older.iter().filter(|p| p.status_code == 200).collect();
    if historical_200.len() < MIN_HISTORICAL {
        // Before the baseline matures: starved only if every recent fetch
        // produced zero anchors.
        return recent_200.iter().all(|p| p.anchors_count == 0);
    }

    let historical_avg = historical_200.iter().map(|p| p.anchors_count as f64).sum::<f64>()
        / historical_200.len() as f64;
    if recent_avg <= 0.1 && historical_avg >= 1.0 {
        return true;
    }

    let Some(profile) = calendar_profile else {
        return false;
    };

    let hour = now.hour();
    let is_weekend = now.weekday().number_from_monday() >= 6;
    if profile == "business_hours_br" && (is_weekend || !(7..=20).contains(&hour)) {
        // Outside working hours only the rolling rule applies.
        return false;
    }

    let calendar: Vec<&&YieldPoint> = historical_200
        .iter()
        .copied()
        .filter(|p| {
            p.ts.hour() == hour
                && (profile != "business_hours_br"
                    || (p.ts.weekday().number_from_monday() >= 6) == is_weekend)
        })
        .collect();
    if calendar.len() < MIN_CALENDAR {
        return false;
    }
    let calendar_avg =
        calendar.iter().map(|p| p.anchors_count as f64).sum::<f64>() / calendar.len() as f64;

    calendar_avg >= 1.0 && recent_avg <= (calendar_avg * 0.1).max(0.1)
}

/// Open a DATA_STARVATION incident for a source.
pub fn trigger_starvation_incident(metrics: &Metrics, source_pk: i64, domain: &str) {
    error!(
        incident_code = "DATA_STARVATION",
        source_pk,
        source_domain = domain,
        "Possible layout/API breakage: healthy responses, collapsed anchor yield"
    );
    metrics
        .data_starvation_incidents_total
        .with_label_values(&[domain])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(minutes_ago: i64, anchors: u32, status: u16, now: DateTime<Utc>) -> YieldPoint {
        YieldPoint {
            ts: now - Duration::minutes(minutes_ago),
            anchors_count: anchors,
            status_code: status,
        }
    }

    fn baseline(now: DateTime<Utc>) -> Vec<YieldPoint> {
        // 12 historical points averaging 3 anchors, spread over two hours
        // before the 60-minute window.
        (0..12).map(|i| point(70 + i * 10, 3, 200, now)).collect()
    }

    #[test]
    fn no_history_is_not_starvation() {
        assert!(!evaluate_starvation(&[], Utc::now(), 60, None));
    }

    #[test]
    fn too_few_recent_points_is_not_starvation() {
        let now = Utc::now();
        let mut history = baseline(now);
        history.extend((0..3).map(|i| point(i * 5, 0, 200, now)));
        assert!(!evaluate_starvation(&history, now, 60, None));
    }

    #[test]
    fn rolling_collapse_detected() {
        let now = Utc::now();
        let mut history = baseline(now);
        history.extend((0..6).map(|i| point(i * 5, 0, 200, now)));
        assert!(evaluate_starvation(&history, now, 60, None));
    }

    #[test]
    fn healthy_yield_is_not_starvation() {
        let now = Utc::now();
        let mut history = baseline(now);
        history.extend((0..6).map(|i| point(i * 5, 2, 200, now)));
        assert!(!evaluate_starvation(&history, now, 60, None));
    }

    #[test]
    fn non_200_responses_disarm_the_rule() {
        let now = Utc::now();
        let mut history = baseline(now);
        history.extend((0..6).map(|i| point(i * 5, 0, if i == 0 { 503 } else { 200 }, now)));
        assert!(!evaluate_starvation(&history, now, 60, None));
    }

    #[test]
    fn immature_baseline_requires_all_zero() {
        let now = Utc::now();
        // Only 4 historical points: baseline not mature.
        let mut history: Vec<YieldPoint> = (0..4).map(|i| point(70 + i * 10, 3, 200, now)).collect();
        history.extend((0..6).map(|i| point(i * 5, 0, 200, now)));
        assert!(evaluate_starvation(&history, now, 60, None));

        let mut mixed: Vec<YieldPoint> = (0..4).map(|i| point(70 + i * 10, 3, 200, now)).collect();
        mixed.extend((0..5).map(|i| point(i * 5, 0, 200, now)));
        mixed.push(point(25, 1, 200, now));
        assert!(!evaluate_starvation(&mixed, now, 60, None));
    }

    /// History where only the calendar rule can fire: overall baseline sits
    /// below 1.0, but the same-slot baseline is rich.
    fn calendar_history(now: DateTime<Utc>) -> Vec<YieldPoint> {
        let mut history = Vec::new();
        for week in 1..=10 {
            // Same hour and weekday, 2 anchors each.
            history.push(YieldPoint {
                ts: now - Duration::weeks(week),
                anchors_count: 2,
                status_code: 200,
            });
            // Off-slot zeros drag the rolling baseline under 1.0.
            history.push(YieldPoint {
                ts: now - Duration::weeks(week) - Duration::hours(5),
                anchors_count: 0,
                status_code: 200,
            });
            history.push(YieldPoint {
                ts: now - Duration::weeks(week) - Duration::hours(9),
                anchors_count: 0,
                status_code: 200,
            });
        }
        history.extend((0..6).map(|i| point(i * 5, 0, 200, now)));
        history
    }

    fn at_fixed_hour(hour: u32) -> DateTime<Utc> {
        // 2025-03-05 is a Wednesday.
        chrono::NaiveDate::from_ymd_opt(2025, 3, 5)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn calendar_collapse_detected_in_working_hours() {
        let now = at_fixed_hour(10);
        assert!(evaluate_starvation(&calendar_history(now), now, 60, Some("business_hours_br")));
        // Without a calendar profile the same history is below the rolling
        // threshold and passes.
        assert!(!evaluate_starvation(&calendar_history(now), now, 60, None));
    }

    #[test]
    fn business_hours_profile_suppresses_off_hours() {
        let now = at_fixed_hour(3);
        // The calendar rule would fire, but 03:00 is outside working hours.
        assert!(!evaluate_starvation(&calendar_history(now), now, 60, Some("business_hours_br")));

        // The rolling rule still applies off-hours.
        let mut history = baseline(now);
        history.extend((0..6).map(|i| point(i * 5, 0, 200, now)));
        assert!(evaluate_starvation(&history, now, 60, Some("business_hours_br")));
    }
}
