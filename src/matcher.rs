//! Query-to-entry matching and ranking.
//!
//! Each entry gets the best of four scores: phrase containment against the
//! question, against an alias, keyword overlap, and token overlap with the
//! question or an alias. Results below the threshold are dropped and the
//! rest are ordered by descending score, keeping declaration order on ties.
//!
//! Queries are autocorrected against a table of common misspellings before
//! scoring. In the keyword tier a query word also matches through the domain
//! synonym table, or when its edit-distance similarity to a keyword is at
//! least [`FUZZY_WORD_SIMILARITY`].

use crate::types::{HelpEntry, MatchType, SearchResult};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Minimum score for a result to count as an answer
pub const STATIC_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Bonus for entries belonging to the section the user is in
const SECTION_BOOST: f64 = 0.15;

const EXACT_SCORE: f64 = 1.0;
const CONTAINS_SCORE: f64 = 0.95;
const ALIAS_SCORE: f64 = 0.9;
const KEYWORD_BASE: f64 = 0.6;
const KEYWORD_SPAN: f64 = 0.2;
const MAX_KEYWORDS_CONSIDERED: usize = 8;

/// Minimum normalized Levenshtein similarity for a typo to hit a keyword
pub const FUZZY_WORD_SIMILARITY: f64 = 0.8;
const FUZZY_MIN_WORD_LEN: usize = 5;

/// Misspellings seen in real queries, in normalized form
static COMMON_TYPOS: &[(&str, &str)] = &[
    ("aser", "hacer"),
    ("acer", "hacer"),
    ("ago", "hago"),
    ("ase", "hace"),
    ("benta", "venta"),
    ("bentas", "ventas"),
    ("bender", "vender"),
    ("bendo", "vendo"),
    ("bendera", "vender"),
    ("nesesito", "necesito"),
    ("nececito", "necesito"),
    ("nesesita", "necesita"),
    ("quero", "quiero"),
    ("kiero", "quiero"),
    ("kiereo", "quiero"),
    ("beo", "veo"),
    ("ber", "ver"),
    ("aber", "ver"),
    ("ay", "hay"),
    ("porke", "porque"),
    ("xq", "porque"),
    ("xk", "porque"),
    ("q", "que"),
    ("k", "que"),
    ("qe", "que"),
    ("ke", "que"),
    ("qeu", "que"),
    ("tb", "tambien"),
    ("tmb", "tambien"),
    ("aki", "aqui"),
    ("dnd", "donde"),
    ("dond", "donde"),
    ("dde", "donde"),
    ("stok", "stock"),
    ("inbentario", "inventario"),
    ("imventario", "inventario"),
    ("provedor", "proveedor"),
    ("cotisacion", "cotizacion"),
    ("cotisasion", "cotizacion"),
    ("fatura", "factura"),
    ("boletta", "boleta"),
    ("clente", "cliente"),
    ("ciente", "cliente"),
    ("cliennte", "cliente"),
    ("prodcuto", "producto"),
    ("prudcto", "producto"),
    ("prodcutos", "productos"),
    ("prudctos", "productos"),
    ("categria", "categoria"),
    ("catgoria", "categoria"),
    ("marka", "marca"),
    ("usurio", "usuario"),
    ("usario", "usuario"),
    ("deletear", "eliminar"),
    ("deletiar", "eliminar"),
    ("editear", "editar"),
    ("createar", "crear"),
    ("updatear", "actualizar"),
    ("printear", "imprimir"),
    ("printiar", "imprimir"),
    ("savear", "guardar"),
    ("checkear", "revisar"),
    ("chequear", "revisar"),
];

/// Domain vocabulary: each head word and the words users write for it.
/// Lookups go both ways, so a listed variant also reaches its head word.
static SYNONYMS: &[(&str, &[&str])] = &[
    ("factura", &["comprobante", "boleta", "recibo", "documento", "voucher", "ticket"]),
    ("comprobante", &["factura", "boleta", "recibo", "documento", "ticket"]),
    ("boleta", &["factura", "comprobante", "recibo", "ticket"]),
    ("guia", &["remision", "despacho"]),
    ("venta", &["vender", "comercializar", "transaccion", "operacion"]),
    ("vender", &["venta", "comercializar", "despachar"]),
    ("compra", &["adquisicion", "comprar", "ingreso"]),
    ("comprar", &["adquirir", "compra", "ingreso"]),
    ("cliente", &["comprador", "consumidor", "adquiriente"]),
    ("proveedor", &["suministrador", "abastecedor"]),
    ("usuario", &["user", "persona"]),
    ("producto", &["articulo", "item", "mercaderia", "bien"]),
    ("articulo", &["producto", "item", "mercaderia"]),
    ("inventario", &["stock", "existencias", "almacen", "bodega", "kardex"]),
    ("stock", &["inventario", "existencias", "disponibilidad"]),
    ("contabilidad", &["contable", "financiero", "libros"]),
    ("asiento", &["registro", "anotacion", "apunte"]),
    ("debe", &["debito", "cargo"]),
    ("haber", &["credito", "abono"]),
    ("balance", &["informe"]),
    ("crear", &["generar", "hacer", "elaborar", "agregar", "anadir"]),
    ("generar", &["crear", "hacer", "elaborar", "producir"]),
    ("hacer", &["crear", "generar", "elaborar", "realizar"]),
    ("agregar", &["anadir", "crear", "insertar", "incluir"]),
    ("editar", &["modificar", "cambiar", "actualizar", "corregir"]),
    ("modificar", &["editar", "cambiar", "actualizar"]),
    ("cambiar", &["modificar", "editar", "actualizar"]),
    ("actualizar", &["modificar", "editar", "cambiar", "renovar"]),
    ("eliminar", &["borrar", "quitar", "suprimir", "remover", "delete"]),
    ("borrar", &["eliminar", "quitar", "remover", "suprimir"]),
    ("ver", &["visualizar", "consultar", "revisar", "mostrar", "listar"]),
    ("consultar", &["ver", "revisar", "buscar"]),
    ("buscar", &["encontrar", "localizar", "consultar"]),
    ("precio", &["costo", "valor", "importe", "monto"]),
    ("costo", &["precio", "valor", "gasto"]),
    ("descuento", &["rebaja", "oferta", "promocion", "deduccion"]),
    ("reporte", &["informe", "estadistica", "dashboard"]),
    ("informe", &["reporte", "estadistica", "dashboard"]),
    ("pago", &["abono", "desembolso"]),
    ("cobro", &["cobranza", "recaudo"]),
    ("cotizacion", &["presupuesto", "proforma"]),
];

/// Phrases that ask for help without naming a topic
static GENERIC_HELP_PHRASES: &[&str] = &[
    "ayuda",
    "ayudame",
    "necesito ayuda",
    "quiero ayuda",
    "ayuda con esto",
    "no entiendo",
    "no se que hacer",
    "que hago",
    "como funciona",
    "como se usa",
    "como empiezo",
    "por donde empiezo",
    "help",
];

static STOPWORDS: &[&str] = &[
    "a", "al", "como", "con", "de", "del", "el", "en", "es", "la", "las", "le", "lo", "los",
    "me", "mi", "mis", "o", "para", "por", "que", "se", "su", "un", "una", "unas", "unos", "y",
];

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        '¿' | '?' | '¡' | '!' | '.' | ',' | ';' | ':' => ' ',
        other => other,
    }
}

/// Lowercase, strip accents and punctuation, collapse whitespace
pub fn normalize_text(text: &str) -> String {
    let folded: String = text.to_lowercase().chars().map(fold_char).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

fn content_words<'a>(words: &[&'a str]) -> Vec<&'a str> {
    words
        .iter()
        .copied()
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .collect()
}

/// Whole-word phrase containment on normalized text
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

/// Share of distinct words in common, relative to the larger side
fn word_overlap(a: &[&str], b: &[&str]) -> f64 {
    let set_a: HashSet<&str> = a.iter().copied().collect();
    let set_b: HashSet<&str> = b.iter().copied().collect();
    let larger = set_a.len().max(set_b.len());
    if larger == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / larger as f64
}

/// Collapse runs of three or more identical characters ("ayudaaa" -> "ayuda")
fn collapse_repeats(word: &str) -> String {
    let chars: Vec<char> = word.chars().collect();
    let mut out = String::with_capacity(word.len());
    let mut i = 0;
    while i < chars.len() {
        let run = chars[i..].iter().take_while(|&&c| c == chars[i]).count();
        let keep = if run >= 3 { 1 } else { run };
        out.extend(std::iter::repeat(chars[i]).take(keep));
        i += run;
    }
    out
}

/// Replace known misspellings in an already-normalized query
pub fn autocorrect(normalized: &str) -> String {
    normalized
        .split_whitespace()
        .map(|word| {
            let word = collapse_repeats(word);
            COMMON_TYPOS
                .iter()
                .find(|(typo, _)| *typo == word)
                .map_or(word, |(_, fixed)| fixed.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The word itself plus every synonym reachable from it
pub fn synonyms_of(word: &str) -> Vec<&str> {
    let mut expanded = vec![word];
    for (head, variants) in SYNONYMS {
        let related = *head == word || variants.contains(&word);
        if !related {
            continue;
        }
        for candidate in std::iter::once(head).chain(variants.iter()) {
            if !expanded.contains(candidate) {
                expanded.push(*candidate);
            }
        }
    }
    expanded
}

/// Edit distance counted in characters
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != *cb);
            row[j + 1] = (diagonal + cost).min(above + 1).min(row[j] + 1);
            diagonal = above;
        }
    }
    row[b.len()]
}

/// 1.0 for identical words, falling towards 0.0 as edits pile up
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn stem_matches(word: &str, keyword: &str) -> bool {
    if word == keyword {
        return true;
    }
    // crude stemming: "productos" ~ "producto", "configurar" ~ "configura"
    word.len() >= 4 && keyword.len() >= 4 && (word.starts_with(keyword) || keyword.starts_with(word))
}

fn keyword_matches(word: &str, keyword: &str) -> bool {
    if synonyms_of(word).iter().any(|w| stem_matches(w, keyword)) {
        return true;
    }
    word.len() >= FUZZY_MIN_WORD_LEN
        && keyword.len() >= FUZZY_MIN_WORD_LEN
        && similarity(word, keyword) >= FUZZY_WORD_SIMILARITY
}

/// Score a single entry against an already-normalized query
pub fn score_entry(query: &str, entry: &HelpEntry) -> (f64, MatchType) {
    let query_words = tokens(query);
    let multi_word = query_words.len() > 1;

    // 1. question equality, then containment either way
    let question = normalize_text(&entry.question);
    if query == question {
        return (EXACT_SCORE, MatchType::Exact);
    }
    if (multi_word && contains_phrase(&question, query)) || contains_phrase(query, &question) {
        return (CONTAINS_SCORE, MatchType::Exact);
    }

    let mut best = (0.0, MatchType::Fuzzy);

    // 2. alias containment
    let aliases: Vec<String> = entry.aliases.iter().map(|a| normalize_text(a)).collect();
    if aliases.iter().any(|alias| {
        query == alias
            || (multi_word && contains_phrase(alias, query))
            || contains_phrase(query, alias)
    }) {
        best = (ALIAS_SCORE, MatchType::Alias);
    }

    // 3. keyword overlap
    if best.0 < KEYWORD_BASE + KEYWORD_SPAN && !entry.keywords.is_empty() {
        let words = content_words(&query_words);
        let matching = entry
            .keywords
            .iter()
            .map(|k| normalize_text(k))
            .filter(|kw| words.iter().any(|w| keyword_matches(w, kw)))
            .count();

        if matching > 0 {
            let denominator = entry.keywords.len().min(MAX_KEYWORDS_CONSIDERED) as f64;
            let ratio = (matching as f64 / denominator).min(1.0);
            let score = KEYWORD_BASE + ratio * KEYWORD_SPAN;
            if score > best.0 {
                best = (score, MatchType::Keyword);
            }
        }
    }

    // 4. token overlap with question and aliases
    let question_words = tokens(&question);
    let overlap = std::iter::once(word_overlap(&query_words, &question_words))
        .chain(aliases.iter().map(|a| word_overlap(&query_words, &tokens(a))))
        .fold(0.0, f64::max);
    if overlap > best.0 {
        best = (overlap, MatchType::Fuzzy);
    }

    best
}

/// True when the query is a bare request for help with no topic
pub fn is_generic_help_request(normalized: &str) -> bool {
    GENERIC_HELP_PHRASES
        .iter()
        .any(|phrase| normalized == *phrase || contains_phrase(normalized, phrase))
}

fn rank(
    query: &str,
    entries: &[HelpEntry],
    threshold: f64,
    section: Option<&str>,
) -> Vec<SearchResult> {
    let normalized = autocorrect(&normalize_text(query));
    if normalized.is_empty() {
        return Vec::new();
    }
    log::trace!("Ranking '{}' as '{}'", query, normalized);

    // raw score breaks ties left by the 1.0 cap
    let mut ranked: Vec<(SearchResult, f64)> = entries
        .iter()
        .filter_map(|entry| {
            let (raw, match_type) = score_entry(&normalized, entry);
            let mut score = raw;

            if let Some(section) = section {
                let in_section = entry.section.as_deref() == Some(section)
                    || entry.id.starts_with(&format!("{}-", section));
                if in_section && score > 0.3 {
                    score = (score + SECTION_BOOST).min(1.0);
                }
            }

            (score >= threshold).then(|| {
                let result = SearchResult {
                    entry: entry.clone(),
                    score,
                    match_type,
                };
                (result, raw)
            })
        })
        .collect();

    // sort_by is stable, so equal scores keep declaration order
    ranked.sort_by(|(a, a_raw), (b, b_raw)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(b_raw.partial_cmp(a_raw).unwrap_or(Ordering::Equal))
    });
    let mut results: Vec<SearchResult> = ranked.into_iter().map(|(result, _)| result).collect();

    if results.is_empty() && is_generic_help_request(&normalized) {
        if let Some(entry) = generic_fallback(entries) {
            log::debug!("Generic help request '{}' routed to {}", query, entry.id);
            results.push(SearchResult {
                entry: entry.clone(),
                score: threshold,
                match_type: MatchType::Fallback,
            });
        }
    }

    results
}

fn generic_fallback(entries: &[HelpEntry]) -> Option<&HelpEntry> {
    entries
        .iter()
        .find(|e| {
            e.aliases
                .iter()
                .any(|a| is_generic_help_request(&normalize_text(a)))
        })
        .or_else(|| entries.first())
}

/// Rank entries against a free-text query
pub fn search(query: &str, entries: &[HelpEntry], threshold: f64) -> Vec<SearchResult> {
    rank(query, entries, threshold, None)
}

/// Like [`search`], boosting entries of the section the user is in
pub fn search_in_section(
    query: &str,
    entries: &[HelpEntry],
    threshold: f64,
    section: &str,
) -> Vec<SearchResult> {
    rank(query, entries, threshold, Some(section))
}

/// Related phrasings for a "did you mean" style list
pub fn suggest_related_queries(query: &str, entries: &[HelpEntry]) -> Vec<String> {
    let mut suggestions: Vec<String> = Vec::new();

    for result in search(query, entries, 0.4).iter().take(5) {
        let candidates = std::iter::once(&result.entry.question).chain(result.entry.aliases.iter().take(2));
        for candidate in candidates {
            if !suggestions.contains(candidate) {
                suggestions.push(candidate.clone());
            }
        }
    }

    suggestions.truncate(5);
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::tests::sample_store;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("¿Cómo  creo un PRODUCTO?"), "como creo un producto");
        assert_eq!(normalize_text("Año, señal; ¡acción!"), "ano senal accion");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_partial_question_matches_above_threshold() {
        let store = sample_store();
        let results = search("como creo un producto", store.entries(), STATIC_CONFIDENCE_THRESHOLD);

        assert!(!results.is_empty());
        assert_eq!(results[0].entry.id, "products-create");
        assert!(results[0].score > STATIC_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_exact_question() {
        let store = sample_store();
        let results = search("¿Cómo creo un nuevo producto?", store.entries(), STATIC_CONFIDENCE_THRESHOLD);
        assert_eq!(results[0].entry.id, "products-create");
        assert_eq!(results[0].match_type, MatchType::Exact);
        assert_eq!(results[0].score, 1.0);
    }

    #[test]
    fn test_literal_question_beats_containing_one() {
        let entries = vec![
            HelpEntry::new("products-composite", "Como creo un producto compuesto?", "x"),
            HelpEntry::new("products-create", "Como creo un producto?", "x"),
        ];

        let results = search("Como creo un producto?", &entries, STATIC_CONFIDENCE_THRESHOLD);
        assert_eq!(results[0].entry.id, "products-create");
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, CONTAINS_SCORE);

        let results = search("Como creo un producto compuesto?", &entries, STATIC_CONFIDENCE_THRESHOLD);
        assert_eq!(results[0].entry.id, "products-composite");

        // both boosted to the cap, the literal question still leads
        let results = search_in_section("Como creo un producto?", &entries, STATIC_CONFIDENCE_THRESHOLD, "products");
        assert_eq!(results[0].score, results[1].score);
        assert_eq!(results[0].entry.id, "products-create");
    }

    #[test]
    fn test_alias_match() {
        let store = sample_store();
        let results = search("quiero ver las fotos del producto", store.entries(), STATIC_CONFIDENCE_THRESHOLD);
        assert_eq!(results[0].entry.id, "products-images");
        assert_eq!(results[0].match_type, MatchType::Alias);
    }

    #[test]
    fn test_results_respect_threshold_and_order() {
        let store = sample_store();
        let queries = [
            "producto",
            "precio",
            "como registro un asiento",
            "imagenes de productos",
            "nuevo producto precio",
            "xyz",
        ];

        for threshold in [0.3, STATIC_CONFIDENCE_THRESHOLD, 0.85] {
            for query in queries {
                let results = search(query, store.entries(), threshold);
                assert!(results.iter().all(|r| r.score >= threshold), "{}", query);
                assert!(results.windows(2).all(|w| w[0].score >= w[1].score), "{}", query);
            }
        }
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let entries = vec![
            HelpEntry::new("a", "Uno", "x").with_keywords(&["stock"]),
            HelpEntry::new("b", "Dos", "x").with_keywords(&["stock"]),
            HelpEntry::new("c", "Tres", "x").with_keywords(&["stock"]),
        ];
        let results = search("stock", &entries, 0.5);
        let ids: Vec<&str> = results.iter().map(|r| r.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_query_yields_nothing() {
        let store = sample_store();
        assert!(search("", store.entries(), 0.0).is_empty());
        assert!(search("  ¿? ", store.entries(), 0.0).is_empty());
    }

    #[test]
    fn test_generic_request_never_dead_ends() {
        let entries = vec![
            HelpEntry::new("a", "Como exporto un reporte?", "x"),
            HelpEntry::new("b", "Como configuro la impresora?", "x")
                .with_aliases(&["necesito ayuda"]),
        ];

        let results = search("ayúdame por favor", &entries, STATIC_CONFIDENCE_THRESHOLD);
        assert_eq!(results.len(), 1);
        assert_eq!(search("ayudaaaa", &entries, STATIC_CONFIDENCE_THRESHOLD)[0].entry.id, "b");
        assert_eq!(results[0].entry.id, "b");
        assert!(results[0].score >= STATIC_CONFIDENCE_THRESHOLD);

        // without any generic alias the first entry is used
        let results = search("ayuda", &entries[..1], STATIC_CONFIDENCE_THRESHOLD);
        assert_eq!(results[0].entry.id, "a");
        assert_eq!(results[0].match_type, MatchType::Fallback);
    }

    #[test]
    fn test_section_boost() {
        let entries = vec![
            HelpEntry::new("sales-discount", "Como aplico un descuento?", "x")
                .with_keywords(&["descuento", "venta", "rebaja", "oferta", "promocion"]),
            HelpEntry::new("quotes-discount", "Como aplico un descuento?", "x")
                .with_keywords(&["descuento", "cotizacion", "rebaja", "oferta", "promocion"]),
        ];

        let plain = search("descuento", &entries, 0.5);
        assert_eq!(plain[0].entry.id, "sales-discount");

        let boosted = search_in_section("descuento", &entries, 0.5, "quotes");
        assert_eq!(boosted[0].entry.id, "quotes-discount");
        assert!(boosted[0].score > boosted[1].score);
        assert!(boosted[0].score <= 1.0);
    }

    fn sales_and_invoices() -> Vec<HelpEntry> {
        vec![
            HelpEntry::new("sales-new", "Como hago una venta?", "x").with_keywords(&["venta", "vender"]),
            HelpEntry::new("invoices-new", "Como emito una factura?", "x")
                .with_keywords(&["factura", "emitir"]),
        ]
    }

    #[test]
    fn test_misspelled_queries_still_match() {
        let entries = sales_and_invoices();

        for query in ["como ago una benta", "kiero bender"] {
            let results = search(query, &entries, STATIC_CONFIDENCE_THRESHOLD);
            assert_eq!(results.len(), 1, "{}", query);
            assert_eq!(results[0].entry.id, "sales-new", "{}", query);
        }

        // "ago una benta" corrects to the literal question
        let results = search("como ago una benta", &entries, STATIC_CONFIDENCE_THRESHOLD);
        assert_eq!(results[0].match_type, MatchType::Exact);
    }

    #[test]
    fn test_synonyms_reach_keywords() {
        let entries = sales_and_invoices();

        for query in ["como saco un comprobante", "necesito una boleta"] {
            let results = search(query, &entries, STATIC_CONFIDENCE_THRESHOLD);
            assert_eq!(results.len(), 1, "{}", query);
            assert_eq!(results[0].entry.id, "invoices-new", "{}", query);
            assert_eq!(results[0].match_type, MatchType::Keyword);
        }
    }

    #[test]
    fn test_edit_distance_tolerates_unlisted_typos() {
        let entries = sales_and_invoices();
        let results = search("factira", &entries, STATIC_CONFIDENCE_THRESHOLD);
        assert_eq!(results[0].entry.id, "invoices-new");

        // short words are too ambiguous for edit distance
        assert!(search("vnta", &entries[..1], STATIC_CONFIDENCE_THRESHOLD).is_empty());
    }

    #[test]
    fn test_autocorrect() {
        assert_eq!(autocorrect("kiero aser una benta"), "quiero hacer una venta");
        assert_eq!(autocorrect("ayudaaaa porfa"), "ayuda porfa");
        assert_eq!(autocorrect("llevar stock"), "llevar stock");
        assert_eq!(autocorrect(""), "");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("benta", "venta"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("niño", "nino"), 1);
        assert_eq!(similarity("factura", "factura"), 1.0);
        assert!(similarity("factira", "factura") >= FUZZY_WORD_SIMILARITY);
    }

    #[test]
    fn test_synonyms_are_symmetric() {
        assert!(synonyms_of("boleta").contains(&"factura"));
        assert!(synonyms_of("kardex").contains(&"inventario"));
        assert_eq!(synonyms_of("zzz"), vec!["zzz"]);
    }

    #[test]
    fn test_suggest_related_queries() {
        let store = sample_store();
        let suggestions = suggest_related_queries("producto nuevo", store.entries());
        assert!(suggestions.len() <= 5);
        assert!(suggestions.contains(&"Como creo un nuevo producto?".to_string()));
    }
}
