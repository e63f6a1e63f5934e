//! Text similarity used by the fuzzy tier.

use std::collections::BTreeSet;

use crate::bom::BomLine;

/// Query string for a line: material family and description, falling back
/// to the description alone and then the line id.
pub fn build_query(line: &BomLine) -> String {
    let joined = [
        line.material_family.as_deref().unwrap_or(""),
        line.description.as_str(),
    ]
    .iter()
    .map(|part| part.trim())
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ");

    if !joined.is_empty() {
        return joined;
    }
    if !line.description.trim().is_empty() {
        return line.description.trim().to_string();
    }
    line.id.clone()
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn join_tokens<'a>(parts: impl Iterator<Item = &'a String>) -> String {
    parts.map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn combine(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{} {}", head, tail),
    }
}

/// Token-set similarity on a 0-1 scale.
///
/// Both texts are tokenized (case-insensitive, split on non-alphanumerics)
/// and deduplicated. A full subset match scores 1.0; otherwise the best
/// normalized edit similarity between the shared tokens and each side's
/// sorted token string is returned.
pub fn token_set_ratio(left: &str, right: &str) -> f64 {
    let a = tokens(left);
    let b = tokens(right);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = join_tokens(a.intersection(&b));
    let only_a = join_tokens(a.difference(&b));
    let only_b = join_tokens(b.difference(&a));

    if !intersection.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 1.0;
    }

    let with_a = combine(&intersection, &only_a);
    let with_b = combine(&intersection, &only_b);

    let mut best = strsim::normalized_levenshtein(&with_a, &with_b);
    if !intersection.is_empty() {
        best = best
            .max(strsim::normalized_levenshtein(&intersection, &with_a))
            .max(strsim::normalized_levenshtein(&intersection, &with_b));
    }
    best.clamp(0.0, 1.0)
}
