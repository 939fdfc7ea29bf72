//! Search terms driven through every store, and the category each one files
//! its products under.

/// Popular searches ingested by `--all-queries` and by the scheduler.
pub(crate) const DEFAULT_QUERIES: &[&str] = &[
    "laptop",
    "iphone",
    "samsung galaxy",
    "nintendo switch",
    "playstation 5",
    "xbox",
    "airpods",
    "tablet",
    "smart tv",
    "audifonos",
    "mouse gamer",
    "teclado mecanico",
];

/// Used for live runs when neither `--queries` nor `--all-queries` is given.
const FALLBACK_QUERIES: &[&str] = &["laptop", "iphone"];

const QUERY_CATEGORIES: &[(&str, &str)] = &[
    ("laptop", "Computación"),
    ("iphone", "Celulares"),
    ("samsung galaxy", "Celulares"),
    ("nintendo switch", "Videojuegos"),
    ("playstation 5", "Videojuegos"),
    ("xbox", "Videojuegos"),
    ("airpods", "Audio"),
    ("audifonos", "Audio"),
    ("tablet", "Computación"),
    ("smart tv", "Electrónica"),
    ("mouse gamer", "Computación"),
    ("teclado mecanico", "Computación"),
];

/// Category name for products found by `query`, if the term is mapped.
pub(crate) fn category_for_query(query: &str) -> Option<&'static str> {
    let query = query.trim();
    QUERY_CATEGORIES
        .iter()
        .find(|(term, _)| term.eq_ignore_ascii_case(query))
        .map(|(_, category)| *category)
}

/// Picks the queries for a run.
///
/// `--all-queries` wins over `--queries`. With neither, live runs fall back
/// to a short default list while file runs ingest the whole file unfiltered
/// (an empty list).
pub(crate) fn resolve_queries(queries: Option<&str>, all_queries: bool, from_file: bool) -> Vec<String> {
    if all_queries {
        return DEFAULT_QUERIES.iter().map(ToString::to_string).collect();
    }

    let explicit: Vec<String> = queries
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(ToString::to_string)
        .collect();

    if !explicit.is_empty() || from_file {
        return explicit;
    }
    FALLBACK_QUERIES.iter().map(ToString::to_string).collect()
}
