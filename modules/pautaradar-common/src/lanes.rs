//! Editorial lane inference.
//!
//! Lanes are resolved in a fixed precedence: an explicit catalog hint wins,
//! then the first lane whose keywords hit the title + snippet. Matching runs
//! over folded text so accents never matter.

use crate::simhash::normalize_text;

pub const DEFAULT_LANE: &str = "geral";

/// Ordered keyword map. Earlier lanes win on simultaneous hits.
const LANE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "justica",
        &["stf", "stj", "tse", "justica", "tribunal", "mpf", "ministerio publico", "operacao"],
    ),
    (
        "politica",
        &["politica", "congresso", "senado", "camara", "planalto", "presidente", "eleicao"],
    ),
    (
        "economia",
        &["economia", "mercado", "bolsa", "selic", "copom", "inflacao", "fiscal", "orcamento"],
    ),
    ("seguranca", &["seguranca", "policia", "crime", "faccao", "prisao", "violencia"]),
    ("saude", &["saude", "sus", "hospital", "anvisa", "vacin", "epidemia"]),
    (
        "educacao",
        &["educacao", "mec", "enem", "fies", "sisu", "universidade", "escola", "professor"],
    ),
    ("internacional", &["itamaraty", "onu", "mercosul", "internacional", "g20", "g7"]),
    (
        "meio_ambiente",
        &["meio ambiente", "clima", "amazonia", "desmatamento", "queimada", "ibama", "cop30"],
    ),
    (
        "direitos_humanos",
        &["direitos humanos", "racismo", "violencia policial", "feminicidio", "indigena"],
    ),
    ("tecnologia", &["tecnologia", "inteligencia artificial", "chip", "software"]),
    (
        "infraestrutura",
        &["rodovia", "ferrovia", "porto", "aeroporto", "saneamento", "obras", "energia"],
    ),
    ("agronegocio", &["agronegocio", "agro", "safra", "conab", "soja", "milho", "pecuaria"]),
    ("esportes", &["futebol", "campeonato", "rodada", "gol", "partida", "olimpiada", "copa"]),
    ("entretenimento", &["reality", "famoso", "celebridade", "novela", "streaming", "serie"]),
    ("cultura", &["cultura", "filme", "teatro", "musica", "literatura"]),
    ("opiniao", &["opiniao", "editorial", "coluna", "artigo"]),
];

fn is_known_lane(value: &str) -> bool {
    value == "hardnews" || LANE_KEYWORDS.iter().any(|(lane, _)| *lane == value)
}

/// Infer the editorial lane for a document.
pub fn infer_editorial_lane(
    title: Option<&str>,
    snippet: &str,
    hint: Option<&str>,
) -> String {
    if let Some(hint) = hint {
        let folded = normalize_text(hint).replace(' ', "_");
        if is_known_lane(&folded) {
            return folded;
        }
    }

    let haystack = normalize_text(&format!("{} {}", title.unwrap_or(""), snippet));
    for (lane, keywords) in LANE_KEYWORDS {
        if keywords.iter().any(|kw| haystack.contains(kw)) {
            return lane.to_string();
        }
    }

    DEFAULT_LANE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_hint_wins_over_keywords() {
        let lane = infer_editorial_lane(
            Some("Bolsa despenca após decisão do Copom"),
            "mercado reage",
            Some("Esportes"),
        );
        assert_eq!(lane, "esportes");
    }

    #[test]
    fn unknown_hint_falls_through_to_keywords() {
        let lane = infer_editorial_lane(Some("Selic sobe"), "copom decide", Some("setorial"));
        assert_eq!(lane, "economia");
    }

    #[test]
    fn title_keywords_drive_lane() {
        assert_eq!(infer_editorial_lane(Some("STF julga recurso"), "", None), "justica");
        assert_eq!(
            infer_editorial_lane(Some("Congresso vota orçamento"), "", None),
            "politica"
        );
    }

    #[test]
    fn precedence_is_stable_on_multiple_hits() {
        // Both justica and politica keywords present; justica is listed first.
        let lane = infer_editorial_lane(Some("STF e Senado em rota de colisão"), "", None);
        assert_eq!(lane, "justica");
    }

    #[test]
    fn accents_are_folded_before_matching() {
        assert_eq!(infer_editorial_lane(Some("Operação da polícia"), "", None), "justica");
    }

    #[test]
    fn default_lane_when_nothing_matches() {
        assert_eq!(infer_editorial_lane(Some("nota curta"), "sem tema", None), "geral");
    }
}
