//! 64-bit SimHash for near-duplicate detection.
//!
//! Text is folded (NFKD, diacritics stripped, lower-cased, non-alphanumerics
//! collapsed), tokenized, and turned into 3-token shingles plus a bounded set
//! of leading unigrams. Each feature is hashed with a keyed SipHash so the
//! fingerprint is stable across processes and restarts.

use std::hash::Hasher;

use siphasher::sip::SipHasher13;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Near-duplicate threshold used by the organizer lookup.
pub const NEAR_DUPLICATE_DISTANCE: u32 = 12;

/// Unigrams folded in alongside shingles, for very short texts.
const MAX_UNIGRAMS: usize = 24;

/// Fixed SipHash keys. Changing these invalidates every stored fingerprint.
const SIP_KEY_0: u64 = 0x7061_7574_6172_6164;
const SIP_KEY_1: u64 = 0x6172_7369_6d68_6173;

const STOPWORDS: &[&str] = &[
    "a", "ao", "aos", "as", "com", "como", "contra", "da", "das", "de", "do", "dos", "e", "em",
    "entre", "na", "nas", "no", "nos", "o", "os", "ou", "para", "pela", "pelas", "pelo", "pelos",
    "por", "que", "sem", "sob", "sobre", "uma", "um", "uns", "umas", "daquele", "daquela", "este",
    "esta", "isso", "esse", "essa",
];

/// Fold text for hashing: lower-case, strip diacritics, keep [a-z0-9].
pub fn normalize_text(value: &str) -> String {
    let folded: String = value
        .trim()
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn build_features(text: &str) -> Vec<String> {
    let norm = normalize_text(text);
    if norm.is_empty() {
        return Vec::new();
    }

    let tokens: Vec<&str> = norm
        .split(' ')
        .filter(|t| t.len() >= 3 && !STOPWORDS.contains(t))
        .collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut features: Vec<String> = tokens
        .windows(3)
        .map(|w| w.join(" "))
        .collect();
    features.extend(tokens.iter().take(MAX_UNIGRAMS).map(|t| t.to_string()));
    features
}

fn feature_digest(feature: &str) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(SIP_KEY_0, SIP_KEY_1);
    hasher.write(feature.as_bytes());
    hasher.finish()
}

/// Compute the 64-bit SimHash of a text. `None` when nothing survives folding.
pub fn compute_simhash64(text: &str) -> Option<u64> {
    let features = build_features(text);
    if features.is_empty() {
        return None;
    }

    let mut votes = [0i32; 64];
    for feature in &features {
        let digest = feature_digest(feature);
        for (i, vote) in votes.iter_mut().enumerate() {
            if (digest >> i) & 1 == 1 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
    }

    let mut fingerprint = 0u64;
    for (i, vote) in votes.iter().enumerate() {
        if *vote >= 0 {
            fingerprint |= 1 << i;
        }
    }
    Some(fingerprint)
}

pub fn hamming_distance64(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Best candidate within `max_distance`: smallest distance, then smallest id.
pub fn best_match(
    target: u64,
    candidates: &[(i64, u64)],
    max_distance: u32,
) -> Option<(i64, u32)> {
    candidates
        .iter()
        .map(|(id, hash)| (*id, hamming_distance64(target, *hash)))
        .filter(|(_, dist)| *dist <= max_distance)
        .min_by_key(|(id, dist)| (*dist, *id))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Governo federal anuncia novo pacote de investimentos em infraestrutura \
                          rodoviária para o estado de Minas Gerais em 2025. O programa prevê a \
                          duplicação de trechos estratégicos, recuperação de pontes e viadutos, \
                          contratação de obras por meio de licitações públicas e contrapartidas \
                          estaduais. Segundo o ministério, os recursos serão liberados em parcelas \
                          semestrais condicionadas ao cumprimento de metas físicas auditadas pelo \
                          tribunal, com prioridade para corredores logísticos que escoam a produção \
                          agrícola do norte do estado rumo aos portos do sudeste brasileiro";

    #[test]
    fn same_text_same_fingerprint() {
        assert_eq!(compute_simhash64(SAMPLE), compute_simhash64(SAMPLE));
    }

    #[test]
    fn folding_ignores_accents_and_case() {
        let a = compute_simhash64("Operação policial em São Paulo").unwrap();
        let b = compute_simhash64("operacao policial em sao paulo").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_and_stopword_only_text_has_no_fingerprint() {
        assert_eq!(compute_simhash64(""), None);
        assert_eq!(compute_simhash64("de da do em no"), None);
    }

    #[test]
    fn single_token_edit_stays_near() {
        let a = compute_simhash64(SAMPLE).unwrap();
        let edited = SAMPLE.replace("rodoviária", "ferroviária");
        let b = compute_simhash64(&edited).unwrap();
        assert!(
            hamming_distance64(a, b) <= NEAR_DUPLICATE_DISTANCE,
            "distance {} too large",
            hamming_distance64(a, b)
        );
    }

    #[test]
    fn unrelated_texts_are_far_apart() {
        let a = compute_simhash64(SAMPLE).unwrap();
        let b = compute_simhash64(
            "Campeonato brasileiro tem rodada decisiva neste domingo com três jogos",
        )
        .unwrap();
        assert!(hamming_distance64(a, b) > NEAR_DUPLICATE_DISTANCE);
    }

    #[test]
    fn best_match_prefers_smaller_distance_then_smaller_id() {
        let target = compute_simhash64(SAMPLE).unwrap();
        let near = compute_simhash64(&SAMPLE.replace("novo", "amplo")).unwrap();
        let candidates = vec![(30, near), (10, target), (20, target)];
        // Exact matches beat the near one; between the two exact, smallest id.
        assert_eq!(best_match(target, &candidates, 12), Some((10, 0)));
    }

    #[test]
    fn best_match_respects_threshold() {
        let target = compute_simhash64(SAMPLE).unwrap();
        let far = compute_simhash64("texto completamente diferente sobre esportes e futebol")
            .unwrap();
        assert_eq!(best_match(target, &[(1, far)], 12), None);
    }

    #[test]
    fn hamming_distance_basics() {
        assert_eq!(hamming_distance64(0, 0), 0);
        assert_eq!(hamming_distance64(0, u64::MAX), 64);
        assert_eq!(hamming_distance64(0b1010, 0b0110), 2);
    }
}
