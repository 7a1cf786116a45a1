//! Dual event scoring.
//!
//! `SCORE_PLANTAO` ranks hard-news urgency: source tier, velocity, diversity
//! and an exponential age decay with a 2-hour half-life constant.
//! `SCORE_OCEANO_AZUL` ranks scoop opportunity: deterministic evidence,
//! official provenance, and how long tier-1 outlets have ignored the story.
//! Both carry stable reason codes consumed by alerts and the editorial UI.

use chrono::{DateTime, Utc};

pub const PLANTAO_VELOCITY_SPIKE: &str = "PLANTAO_VELOCITY_SPIKE";
pub const PLANTAO_TIER_WEIGHT: &str = "PLANTAO_TIER_WEIGHT";
pub const PLANTAO_DIVERSITY: &str = "PLANTAO_DIVERSITY";
pub const PLANTAO_IMPACT_HEURISTIC: &str = "PLANTAO_IMPACT_HEURISTIC";
pub const PLANTAO_TRUST_PENALTY: &str = "PLANTAO_TRUST_PENALTY";
pub const PLANTAO_DECAY: &str = "PLANTAO_DECAY";

pub const OCEANO_EVIDENCE_STRONG: &str = "OCEANO_EVIDENCE_STRONG";
pub const OCEANO_COVERAGE_LAG: &str = "OCEANO_COVERAGE_LAG";
pub const OCEANO_EVIDENCE_PDF: &str = "OCEANO_EVIDENCE_PDF";
pub const OCEANO_TRUST_PENALTY_REDUCED: &str = "OCEANO_TRUST_PENALTY_REDUCED";
pub const OCEANO_OFFICIAL_SOURCE: &str = "OCEANO_OFFICIAL_SOURCE";

/// Aggregated inputs for one event, computed from its linked documents.
#[derive(Debug, Clone)]
pub struct EventSignals {
    /// Best (lowest) tier among contributing sources.
    pub tier: u8,
    /// Documents linked in the last 30 minutes.
    pub velocity: f64,
    /// Distinct contributing sources.
    pub diversity: u32,
    pub has_official: bool,
    pub has_tier1: bool,
    /// Maximum evidence score among linked documents.
    pub max_evidence: f64,
    pub has_pdf_evidence: bool,
    /// Minutes since first sighting without tier-1 coverage. Zero once any
    /// tier-1 source has the story.
    pub coverage_lag_min: f64,
    pub impact: f64,
    pub trust_penalty: f64,
    pub first_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub score: f64,
    pub reasons: Vec<&'static str>,
}

pub fn calculate_plantao_score(signals: &EventSignals, now: DateTime<Utc>) -> ScoreResult {
    let tier_weight = (4.0 - signals.tier as f64) * 2.0;
    let velocity_boost = (1.0 + signals.velocity).ln() * 5.0;
    let diversity_boost = (signals.diversity as f64).sqrt() * 3.0;
    let impact_boost = signals.impact.clamp(0.0, 10.0) * 0.8;
    let trust_penalty = signals.trust_penalty.clamp(0.0, 20.0);

    let raw = 10.0 + tier_weight + velocity_boost + diversity_boost + impact_boost - trust_penalty;

    let age_hours = (now - signals.first_seen_at).num_seconds().max(0) as f64 / 3600.0;
    let decay = (-age_hours / 2.0).exp();
    let score = raw * decay;

    let mut reasons = Vec::new();
    if signals.velocity > 5.0 {
        reasons.push(PLANTAO_VELOCITY_SPIKE);
    }
    if signals.tier == 1 {
        reasons.push(PLANTAO_TIER_WEIGHT);
    }
    if signals.diversity > 2 {
        reasons.push(PLANTAO_DIVERSITY);
    }
    if impact_boost > 0.5 {
        reasons.push(PLANTAO_IMPACT_HEURISTIC);
    }
    if trust_penalty > 0.0 {
        reasons.push(PLANTAO_TRUST_PENALTY);
    }
    if decay < 0.8 {
        reasons.push(PLANTAO_DECAY);
    }

    ScoreResult { score, reasons }
}

pub fn calculate_oceano_score(signals: &EventSignals) -> ScoreResult {
    let official_boost = if signals.has_official { 5.0 } else { 0.0 };
    let lag_boost = if signals.has_tier1 {
        0.0
    } else {
        (signals.coverage_lag_min / 6.0).min(20.0)
    };
    let pdf_boost = if signals.has_pdf_evidence { 4.0 } else { 0.0 };

    let evidence_multiplier = 1.0 + signals.max_evidence / 5.0;
    let penalty_weight = if signals.max_evidence >= 3.0 { 0.25 } else { 0.6 };

    let raw = (5.0 + official_boost + lag_boost + pdf_boost) * evidence_multiplier
        - signals.trust_penalty * penalty_weight;
    let score = raw.min(100.0);

    let mut reasons = Vec::new();
    if signals.max_evidence > 3.0 {
        reasons.push(OCEANO_EVIDENCE_STRONG);
    }
    // The reason tracks the coverage gap itself, not the boost size: a
    // freshly created non-tier-1 event carries it at zero lag.
    if !signals.has_tier1 {
        reasons.push(OCEANO_COVERAGE_LAG);
    }
    if signals.has_pdf_evidence {
        reasons.push(OCEANO_EVIDENCE_PDF);
    }
    if signals.trust_penalty > 0.0 && signals.max_evidence >= 3.0 {
        reasons.push(OCEANO_TRUST_PENALTY_REDUCED);
    }
    if signals.has_official {
        reasons.push(OCEANO_OFFICIAL_SOURCE);
    }

    ScoreResult { score, reasons }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn signals() -> EventSignals {
        EventSignals {
            tier: 2,
            velocity: 0.0,
            diversity: 1,
            has_official: false,
            has_tier1: true,
            max_evidence: 0.0,
            has_pdf_evidence: false,
            coverage_lag_min: 0.0,
            impact: 0.0,
            trust_penalty: 0.0,
            first_seen_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_tier1_event_scores_the_tier_weight() {
        let mut s = signals();
        s.tier = 1;
        let result = calculate_plantao_score(&s, s.first_seen_at);
        // 10 + 6 + 0 + 3 = 19, no decay yet.
        assert!((result.score - 19.0).abs() < 1e-9);
        assert!(result.reasons.contains(&PLANTAO_TIER_WEIGHT));
        assert!(!result.reasons.contains(&PLANTAO_DECAY));
    }

    #[test]
    fn velocity_spike_raises_score_and_reason() {
        let now = Utc::now();
        let mut s = signals();
        let calm = calculate_plantao_score(&s, now);
        s.velocity = 10.0;
        let spiking = calculate_plantao_score(&s, now);
        assert!(spiking.score > calm.score);
        assert!(spiking.reasons.contains(&PLANTAO_VELOCITY_SPIKE));
        assert!(!calm.reasons.contains(&PLANTAO_VELOCITY_SPIKE));
    }

    #[test]
    fn diversity_reason_requires_three_sources() {
        let now = Utc::now();
        let mut s = signals();
        s.diversity = 2;
        assert!(!calculate_plantao_score(&s, now).reasons.contains(&PLANTAO_DIVERSITY));
        s.diversity = 3;
        assert!(calculate_plantao_score(&s, now).reasons.contains(&PLANTAO_DIVERSITY));
    }

    #[test]
    fn old_events_decay_exponentially() {
        let now = Utc::now();
        let mut s = signals();
        s.first_seen_at = now - Duration::hours(2);
        let aged = calculate_plantao_score(&s, now);
        s.first_seen_at = now;
        let fresh = calculate_plantao_score(&s, now);
        // Half-life of 2h: one half-life elapsed means e^-1.
        assert!((aged.score - fresh.score * (-1.0f64).exp()).abs() < 1e-6);
        assert!(aged.reasons.contains(&PLANTAO_DECAY));
    }

    #[test]
    fn trust_penalty_is_clamped() {
        let now = Utc::now();
        let mut s = signals();
        s.trust_penalty = 50.0;
        let capped = calculate_plantao_score(&s, now);
        s.trust_penalty = 20.0;
        let at_limit = calculate_plantao_score(&s, now);
        assert!((capped.score - at_limit.score).abs() < 1e-9);
        assert!(capped.reasons.contains(&PLANTAO_TRUST_PENALTY));
    }

    #[test]
    fn oceano_base_score_without_signals() {
        let result = calculate_oceano_score(&signals());
        assert!((result.score - 5.0).abs() < 1e-9);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn oceano_lag_boost_capped_at_twenty() {
        let mut s = signals();
        s.has_tier1 = false;
        s.coverage_lag_min = 60.0;
        let result = calculate_oceano_score(&s);
        // 5 + 60/6 = 15, no multiplier.
        assert!((result.score - 15.0).abs() < 1e-9);
        assert!(result.reasons.contains(&OCEANO_COVERAGE_LAG));

        s.coverage_lag_min = 100_000.0;
        let capped = calculate_oceano_score(&s);
        assert!((capped.score - 25.0).abs() < 1e-9);
    }

    #[test]
    fn tier1_coverage_zeroes_the_lag_boost() {
        let mut s = signals();
        s.has_tier1 = true;
        s.coverage_lag_min = 600.0;
        let result = calculate_oceano_score(&s);
        assert!(!result.reasons.contains(&OCEANO_COVERAGE_LAG));
    }

    #[test]
    fn coverage_lag_reason_holds_at_zero_lag() {
        // First scoring right after creation: no lag accrued yet, but the
        // tier-1 gap is already a fact worth reporting.
        let mut s = signals();
        s.has_tier1 = false;
        s.coverage_lag_min = 0.0;
        let result = calculate_oceano_score(&s);
        assert!(result.reasons.contains(&OCEANO_COVERAGE_LAG));
        assert!((result.score - 5.0).abs() < 1e-9);
    }

    #[test]
    fn strong_evidence_softens_the_trust_penalty() {
        let mut s = signals();
        s.trust_penalty = 10.0;
        s.max_evidence = 1.0;
        let weak = calculate_oceano_score(&s);
        s.max_evidence = 3.0;
        let strong = calculate_oceano_score(&s);
        // Weak evidence pays 0.6 per penalty point, strong pays 0.25.
        assert!(strong.reasons.contains(&OCEANO_TRUST_PENALTY_REDUCED));
        assert!(!weak.reasons.contains(&OCEANO_TRUST_PENALTY_REDUCED));
        let weak_paid = (5.0) * (1.0 + 1.0 / 5.0) - weak.score;
        let strong_paid = (5.0) * (1.0 + 3.0 / 5.0) - strong.score;
        assert!((weak_paid - 6.0).abs() < 1e-9);
        assert!((strong_paid - 2.5).abs() < 1e-9);
    }

    #[test]
    fn oceano_score_is_capped_at_one_hundred() {
        let mut s = signals();
        s.has_official = true;
        s.has_tier1 = false;
        s.coverage_lag_min = 100_000.0;
        s.has_pdf_evidence = true;
        s.max_evidence = 15.0;
        let result = calculate_oceano_score(&s);
        assert!((result.score - 100.0).abs() < 1e-9);
        assert!(result.reasons.contains(&OCEANO_EVIDENCE_STRONG));
        assert!(result.reasons.contains(&OCEANO_EVIDENCE_PDF));
        assert!(result.reasons.contains(&OCEANO_OFFICIAL_SOURCE));
    }
}
