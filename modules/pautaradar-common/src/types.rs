use serde::{Deserialize, Serialize};

// --- Event lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    New,
    Hydrating,
    PartialEnrich,
    FailedEnrich,
    Quarantine,
    Hot,
    Merged,
    Ignored,
    Expired,
}

impl EventStatus {
    /// Terminal states never transition again (except via tombstone reads).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Merged | Self::Ignored | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Hydrating => "HYDRATING",
            Self::PartialEnrich => "PARTIAL_ENRICH",
            Self::FailedEnrich => "FAILED_ENRICH",
            Self::Quarantine => "QUARANTINE",
            Self::Hot => "HOT",
            Self::Merged => "MERGED",
            Self::Ignored => "IGNORED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "HYDRATING" => Ok(Self::Hydrating),
            "PARTIAL_ENRICH" => Ok(Self::PartialEnrich),
            "FAILED_ENRICH" => Ok(Self::FailedEnrich),
            "QUARANTINE" => Ok(Self::Quarantine),
            "HOT" => Ok(Self::Hot),
            "MERGED" => Ok(Self::Merged),
            "IGNORED" => Ok(Self::Ignored),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(format!("unknown EventStatus: {other}")),
        }
    }
}

// --- Anchors ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnchorType {
    Cnpj,
    Cpf,
    Cnj,
    Sei,
    Tcu,
    Pl,
    Ato,
    Valor,
    Data,
    Hora,
    LinkGov,
    Pdf,
}

impl AnchorType {
    /// Strong anchors considered by the canonicalizer when folding events.
    pub fn is_strong(&self) -> bool {
        matches!(self, Self::Cnpj | Self::Cnj | Self::Pl | Self::Sei | Self::Tcu)
    }

    /// Anchors that link a new document to an existing event. A narrower set
    /// than [`AnchorType::is_strong`]: TCU rulings group events during
    /// canonicalization but never drive the organizer's deferred merge.
    pub fn is_linkage_anchor(&self) -> bool {
        matches!(self, Self::Cnpj | Self::Cnj | Self::Pl | Self::Sei)
    }

    /// Entity label derived from deterministic anchors, when one applies.
    pub fn entity_label(&self) -> Option<EntityLabel> {
        match self {
            Self::Cnpj => Some(EntityLabel::Org),
            Self::Cpf => Some(EntityLabel::Per),
            Self::Cnj | Self::Sei | Self::Tcu | Self::Ato => Some(EntityLabel::Gov),
            Self::Pl => Some(EntityLabel::Event),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cnpj => "CNPJ",
            Self::Cpf => "CPF",
            Self::Cnj => "CNJ",
            Self::Sei => "SEI",
            Self::Tcu => "TCU",
            Self::Pl => "PL",
            Self::Ato => "ATO",
            Self::Valor => "VALOR",
            Self::Data => "DATA",
            Self::Hora => "HORA",
            Self::LinkGov => "LINK_GOV",
            Self::Pdf => "PDF",
        }
    }
}

impl std::fmt::Display for AnchorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnchorType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CNPJ" => Ok(Self::Cnpj),
            "CPF" => Ok(Self::Cpf),
            "CNJ" => Ok(Self::Cnj),
            "SEI" => Ok(Self::Sei),
            "TCU" => Ok(Self::Tcu),
            "PL" => Ok(Self::Pl),
            "ATO" => Ok(Self::Ato),
            "VALOR" => Ok(Self::Valor),
            "DATA" => Ok(Self::Data),
            "HORA" => Ok(Self::Hora),
            "LINK_GOV" => Ok(Self::LinkGov),
            "PDF" => Ok(Self::Pdf),
            other => Err(format!("unknown AnchorType: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLabel {
    Per,
    Org,
    Loc,
    Gov,
    Event,
}

impl EntityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Per => "PER",
            Self::Org => "ORG",
            Self::Loc => "LOC",
            Self::Gov => "GOV",
            Self::Event => "EVENT",
        }
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Editorial actions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditorialAction {
    Ignore,
    Snooze,
    Pautar,
    Merge,
    Split,
}

impl EditorialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "IGNORE",
            Self::Snooze => "SNOOZE",
            Self::Pautar => "PAUTAR",
            Self::Merge => "MERGE",
            Self::Split => "SPLIT",
        }
    }
}

impl std::fmt::Display for EditorialAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EditorialAction {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "IGNORE" => Ok(Self::Ignore),
            "SNOOZE" => Ok(Self::Snooze),
            "PAUTAR" => Ok(Self::Pautar),
            "MERGE" => Ok(Self::Merge),
            "SPLIT" => Ok(Self::Split),
            other => Err(format!("unknown EditorialAction: {other}")),
        }
    }
}

// --- Error taxonomy ---

/// Stable error classes recorded on fetch attempts and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Timeout,
    Dns,
    ConnectError,
    TlsError,
    HttpStatusError,
    CircuitOpen,
    RateLimited,
    DomainConcurrencyLimited,
    MaxBytesExceeded,
    MissingSourceId,
    MissingEndpoint,
    JsonDecode,
    HtmlParse,
    PdfParse,
    OcrUnavailable,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "Timeout",
            Self::Dns => "DNS",
            Self::ConnectError => "ConnectError",
            Self::TlsError => "TLSError",
            Self::HttpStatusError => "HTTPStatusError",
            Self::CircuitOpen => "CircuitOpen",
            Self::RateLimited => "RateLimited",
            Self::DomainConcurrencyLimited => "DomainConcurrencyLimited",
            Self::MaxBytesExceeded => "MaxBytesExceeded",
            Self::MissingSourceId => "MissingSourceId",
            Self::MissingEndpoint => "MissingEndpoint",
            Self::JsonDecode => "JSONDecode",
            Self::HtmlParse => "HTMLParse",
            Self::PdfParse => "PDFParse",
            Self::OcrUnavailable => "OCRUnavailable",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            "NEW",
            "HYDRATING",
            "PARTIAL_ENRICH",
            "FAILED_ENRICH",
            "QUARANTINE",
            "HOT",
            "MERGED",
            "IGNORED",
            "EXPIRED",
        ] {
            assert_eq!(EventStatus::from_str(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn terminal_states() {
        assert!(EventStatus::Merged.is_terminal());
        assert!(EventStatus::Ignored.is_terminal());
        assert!(EventStatus::Expired.is_terminal());
        assert!(!EventStatus::Hot.is_terminal());
        assert!(!EventStatus::Quarantine.is_terminal());
    }

    #[test]
    fn strong_anchor_set() {
        assert!(AnchorType::Cnpj.is_strong());
        assert!(AnchorType::Cnj.is_strong());
        assert!(AnchorType::Pl.is_strong());
        assert!(AnchorType::Sei.is_strong());
        assert!(AnchorType::Tcu.is_strong());
        assert!(!AnchorType::Valor.is_strong());
        assert!(!AnchorType::LinkGov.is_strong());
    }

    #[test]
    fn linkage_anchors_exclude_tcu() {
        assert!(AnchorType::Cnpj.is_linkage_anchor());
        assert!(AnchorType::Cnj.is_linkage_anchor());
        assert!(AnchorType::Pl.is_linkage_anchor());
        assert!(AnchorType::Sei.is_linkage_anchor());
        assert!(!AnchorType::Tcu.is_linkage_anchor());
        assert!(!AnchorType::LinkGov.is_linkage_anchor());
    }

    #[test]
    fn entity_labels_from_anchors() {
        assert_eq!(AnchorType::Cnpj.entity_label(), Some(EntityLabel::Org));
        assert_eq!(AnchorType::Cpf.entity_label(), Some(EntityLabel::Per));
        assert_eq!(AnchorType::Pl.entity_label(), Some(EntityLabel::Event));
        assert_eq!(AnchorType::Ato.entity_label(), Some(EntityLabel::Gov));
        assert_eq!(AnchorType::Data.entity_label(), None);
    }
}
