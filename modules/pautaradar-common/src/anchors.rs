//! Deterministic anchor extraction.
//!
//! A fixed regex pack pulls identifiers (CNPJ, CPF, CNJ, SEI, TCU, PL, ATO),
//! amounts, dates, times, and official/PDF links out of clean text. Values
//! are normalized so the same real-world identifier always produces the same
//! anchor value: digits only for numeric identifiers, ISO dates, `BRL:<float>`
//! amounts, upper-case identifiers, lower-case URLs.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::types::AnchorType;

/// Evidence pointer window, in characters on each side of the match.
const PTR_WINDOW_CHARS: usize = 30;

/// Evidence score cap.
const EVIDENCE_CAP: f64 = 15.0;

static CNPJ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}\b").expect("valid regex"));
static CPF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b").expect("valid regex"));
static CNJ_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{7}-\d{2}\.\d{4}\.\d\.\d{2}\.\d{4}\b").expect("valid regex")
});
static SEI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}\.\d{6}/\d{4}-\d{2}\b").expect("valid regex"));
static TCU_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Acórdão\s+(\d+/\d+)").expect("valid regex"));
static PL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(PL|PEC|PLP)\s+(\d+(?:/\d+)?)").expect("valid regex"));
static ATO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(Portaria|Decreto|Resolução)\s+(?:nº\s+)?(\d+/\d+)").expect("valid regex")
});
static VALOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"R\$\s*[\d.]+(?:,\d{2})?").expect("valid regex"));
static DATA_BR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("valid regex"));
static DATA_ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid regex"));
static HORA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)(?::[0-5]\d)?\b").expect("valid regex")
});
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// One extracted anchor: normalized value plus a ±30 char evidence window.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub anchor_type: AnchorType,
    pub value: String,
    pub ptr: String,
    pub confidence: f32,
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn upper_identifier(raw: &str) -> String {
    WHITESPACE_RE.replace_all(raw.trim(), " ").to_uppercase()
}

fn brl_value(raw: &str) -> Option<String> {
    let body = raw.strip_prefix("BRL:").unwrap_or(raw);
    let amount: f64 = if raw.starts_with("BRL:") {
        body.parse().ok()?
    } else {
        let cleaned: String = body
            .trim_start_matches("R$")
            .trim()
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .collect();
        cleaned.replace('.', "").replace(',', ".").parse().ok()?
    };
    Some(format!("BRL:{amount}"))
}

fn iso_date(day: u32, month: u32, year: i32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

fn lower_url(raw: &str) -> String {
    raw.trim_end_matches(['.', ',', ';']).to_lowercase()
}

/// Normalize a raw match for its anchor type. Idempotent: feeding a
/// normalized value back yields the same value.
pub fn normalize_value(anchor_type: AnchorType, raw: &str) -> Option<String> {
    let normalized = match anchor_type {
        AnchorType::Cnpj | AnchorType::Cpf | AnchorType::Cnj | AnchorType::Sei => digits_only(raw),
        AnchorType::Tcu | AnchorType::Pl => upper_identifier(raw),
        // "Portaria nº 55" and "Portaria 55" are the same act.
        AnchorType::Ato => upper_identifier(raw).replace("Nº ", ""),
        AnchorType::Valor => brl_value(raw)?,
        AnchorType::Data => {
            if let Some(caps) = DATA_BR_RE.captures(raw) {
                iso_date(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)?
            } else if let Some(caps) = DATA_ISO_RE.captures(raw) {
                iso_date(caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?)?
            } else {
                return None;
            }
        }
        AnchorType::Hora => {
            let caps = HORA_RE.captures(raw)?;
            format!("{:02}:{}", caps[1].parse::<u32>().ok()?, &caps[2])
        }
        AnchorType::LinkGov | AnchorType::Pdf => lower_url(raw),
    };
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn ptr_window(text: &str, start: usize, end: usize) -> String {
    let mut lo = start;
    let mut steps = 0;
    while lo > 0 && steps < PTR_WINDOW_CHARS {
        lo -= 1;
        while lo > 0 && !text.is_char_boundary(lo) {
            lo -= 1;
        }
        steps += 1;
    }
    let mut hi = end.min(text.len());
    let mut steps = 0;
    while hi < text.len() && steps < PTR_WINDOW_CHARS {
        hi += 1;
        while hi < text.len() && !text.is_char_boundary(hi) {
            hi += 1;
        }
        steps += 1;
    }
    text[lo..hi].to_string()
}

fn host_is_official(host: &str) -> bool {
    host.ends_with(".gov.br")
        || host.ends_with(".leg.br")
        || host.ends_with(".jus.br")
        || host == "gov.br"
        || host.contains(".gov.")
}

/// Apply the full regex pack, deduplicating by (type, value, match start).
pub fn extract_anchors(text: &str) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    let mut seen: HashSet<(AnchorType, String, usize)> = HashSet::new();

    let mut push = |anchor_type: AnchorType, raw: &str, start: usize, end: usize, out: &mut Vec<Anchor>| {
        let Some(value) = normalize_value(anchor_type, raw) else {
            return;
        };
        if !seen.insert((anchor_type, value.clone(), start)) {
            return;
        }
        out.push(Anchor {
            anchor_type,
            value,
            ptr: ptr_window(text, start, end),
            confidence: 1.0,
        });
    };

    let simple: [(AnchorType, &Regex); 8] = [
        (AnchorType::Cnpj, &CNPJ_RE),
        (AnchorType::Cpf, &CPF_RE),
        (AnchorType::Cnj, &CNJ_RE),
        (AnchorType::Sei, &SEI_RE),
        (AnchorType::Tcu, &TCU_RE),
        (AnchorType::Pl, &PL_RE),
        (AnchorType::Ato, &ATO_RE),
        (AnchorType::Valor, &VALOR_RE),
    ];
    for (anchor_type, re) in simple {
        for m in re.find_iter(text) {
            push(anchor_type, m.as_str(), m.start(), m.end(), &mut anchors);
        }
    }

    for m in DATA_BR_RE.find_iter(text) {
        push(AnchorType::Data, m.as_str(), m.start(), m.end(), &mut anchors);
    }
    for m in DATA_ISO_RE.find_iter(text) {
        push(AnchorType::Data, m.as_str(), m.start(), m.end(), &mut anchors);
    }
    for m in HORA_RE.find_iter(text) {
        push(AnchorType::Hora, m.as_str(), m.start(), m.end(), &mut anchors);
    }

    // URL scanner: a single URL can be both an official link and a PDF.
    for m in URL_RE.find_iter(text) {
        let lowered = lower_url(m.as_str());
        let host = url_host(&lowered);
        if host.as_deref().is_some_and(host_is_official) {
            push(AnchorType::LinkGov, m.as_str(), m.start(), m.end(), &mut anchors);
        }
        if lowered.contains(".pdf") {
            push(AnchorType::Pdf, m.as_str(), m.start(), m.end(), &mut anchors);
        }
    }

    anchors
}

fn url_host(raw: &str) -> Option<String> {
    url::Url::parse(raw).ok()?.host_str().map(|h| h.to_string())
}

fn weight(anchor_type: AnchorType) -> f64 {
    match anchor_type {
        AnchorType::Cnj | AnchorType::Tcu => 2.0,
        AnchorType::Pl | AnchorType::Cnpj => 1.5,
        AnchorType::Cpf | AnchorType::Pdf | AnchorType::Sei => 1.2,
        AnchorType::LinkGov => 0.8,
        AnchorType::Valor => 0.5,
        AnchorType::Data | AnchorType::Hora => 0.2,
        AnchorType::Ato => 0.1,
    }
}

/// Weighted sum over unique anchor values, capped.
pub fn compute_evidence_score(anchors: &[Anchor]) -> f64 {
    let unique: HashSet<(AnchorType, &str)> =
        anchors.iter().map(|a| (a.anchor_type, a.value.as_str())).collect();
    let score: f64 = unique.iter().map(|(t, _)| weight(*t)).sum();
    score.min(EVIDENCE_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values_of(anchors: &[Anchor], anchor_type: AnchorType) -> Vec<String> {
        anchors
            .iter()
            .filter(|a| a.anchor_type == anchor_type)
            .map(|a| a.value.clone())
            .collect()
    }

    #[test]
    fn extracts_and_normalizes_cnpj() {
        let anchors = extract_anchors("contrato com a empresa 12.345.678/0001-99 firmado");
        assert_eq!(values_of(&anchors, AnchorType::Cnpj), vec!["12345678000199"]);
    }

    #[test]
    fn extracts_cnj_case_number() {
        let anchors = extract_anchors("processo 1234567-89.2024.1.00.0001 em tramitação");
        assert_eq!(values_of(&anchors, AnchorType::Cnj), vec!["12345678920241000001"]);
    }

    #[test]
    fn extracts_tcu_and_pl() {
        let anchors = extract_anchors("o Acórdão 2345/2024 cita o PL 1234/2025 e a PEC 45");
        assert_eq!(values_of(&anchors, AnchorType::Tcu), vec!["ACÓRDÃO 2345/2024"]);
        assert_eq!(values_of(&anchors, AnchorType::Pl), vec!["PL 1234/2025", "PEC 45"]);
    }

    #[test]
    fn normalizes_valor_to_brl() {
        let anchors = extract_anchors("repasse de R$ 1.234,56 aprovado e mais R$ 10");
        assert_eq!(values_of(&anchors, AnchorType::Valor), vec!["BRL:1234.56", "BRL:10"]);
    }

    #[test]
    fn normalizes_dates_to_iso() {
        let anchors = extract_anchors("publicado em 05/03/2025, vigente desde 2024-12-01");
        let mut dates = values_of(&anchors, AnchorType::Data);
        dates.sort();
        assert_eq!(dates, vec!["2024-12-01", "2025-03-05"]);
    }

    #[test]
    fn invalid_date_is_skipped() {
        let anchors = extract_anchors("datado de 45/13/2025");
        assert!(values_of(&anchors, AnchorType::Data).is_empty());
    }

    #[test]
    fn hora_is_zero_padded() {
        let anchors = extract_anchors("sessão às 9:30 desta quarta");
        assert_eq!(values_of(&anchors, AnchorType::Hora), vec!["09:30"]);
    }

    #[test]
    fn url_scanner_classifies_gov_and_pdf() {
        let text = "veja https://Exemplo.GOV.br/doc e https://site.com/Relatorio.PDF";
        let anchors = extract_anchors(text);
        assert_eq!(values_of(&anchors, AnchorType::LinkGov), vec!["https://exemplo.gov.br/doc"]);
        assert_eq!(values_of(&anchors, AnchorType::Pdf), vec!["https://site.com/relatorio.pdf"]);
    }

    #[test]
    fn official_pdf_link_yields_both_anchor_types() {
        let anchors = extract_anchors("https://www.camara.leg.br/prop/doc.pdf");
        assert_eq!(values_of(&anchors, AnchorType::LinkGov).len(), 1);
        assert_eq!(values_of(&anchors, AnchorType::Pdf).len(), 1);
    }

    #[test]
    fn normalization_is_idempotent() {
        let cases = [
            (AnchorType::Cnpj, "12.345.678/0001-99"),
            (AnchorType::Cpf, "123.456.789-09"),
            (AnchorType::Cnj, "1234567-89.2024.1.00.0001"),
            (AnchorType::Sei, "12345.678901/2024-12"),
            (AnchorType::Pl, "pl 1234/2025"),
            (AnchorType::Ato, "Portaria nº 55/2024"),
            (AnchorType::Valor, "R$ 1.234,56"),
            (AnchorType::Data, "05/03/2025"),
            (AnchorType::Hora, "9:30"),
            (AnchorType::LinkGov, "https://Exemplo.GOV.br/Doc"),
            (AnchorType::Pdf, "https://site.com/A.pdf"),
        ];
        for (anchor_type, raw) in cases {
            let once = normalize_value(anchor_type, raw).unwrap();
            let twice = normalize_value(anchor_type, &once).unwrap();
            assert_eq!(once, twice, "{anchor_type} not idempotent");
        }
    }

    #[test]
    fn evidence_pointer_surrounds_match() {
        let text = "a".repeat(100) + " 12.345.678/0001-99 " + &"b".repeat(100);
        let anchors = extract_anchors(&text);
        let ptr = &anchors[0].ptr;
        assert!(ptr.contains("12.345.678/0001-99"));
        assert!(ptr.len() < text.len());
    }

    #[test]
    fn duplicate_matches_at_same_offset_dedupe() {
        let anchors = extract_anchors("12.345.678/0001-99");
        assert_eq!(anchors.len(), 1);
    }

    #[test]
    fn evidence_score_counts_unique_values_once() {
        let text = "CNPJ 12.345.678/0001-99 e de novo 12.345.678/0001-99";
        let anchors = extract_anchors(text);
        assert!((compute_evidence_score(&anchors) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn evidence_score_is_monotonic_and_capped() {
        let base = extract_anchors("processo 1234567-89.2024.1.00.0001");
        let more = extract_anchors(
            "processo 1234567-89.2024.1.00.0001, CNPJ 12.345.678/0001-99, R$ 50,00",
        );
        assert!(compute_evidence_score(&more) >= compute_evidence_score(&base));

        let mut flood = String::new();
        for i in 0..20 {
            flood.push_str(&format!("processo 1234{i:03}-89.2024.1.00.0001 "));
        }
        assert!((compute_evidence_score(&extract_anchors(&flood)) - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn equal_inputs_yield_equal_scores() {
        let a = extract_anchors("Acórdão 1/2024 e R$ 5,00");
        let b = extract_anchors("Acórdão 1/2024 e R$ 5,00");
        assert_eq!(compute_evidence_score(&a), compute_evidence_score(&b));
    }
}
