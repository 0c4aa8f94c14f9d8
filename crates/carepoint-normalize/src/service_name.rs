//! Normalizes a raw, provider-supplied service name into a display form and
//! a set of search tags.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::tables::NormalizationTables;

/// Output of [`normalize`]. `original_name` is always the verbatim input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedName {
    pub display_name: String,
    pub normalized_tags: BTreeSet<String>,
    pub original_name: String,
}

impl NormalizedName {
    fn empty(original_name: String) -> Self {
        Self { display_name: String::new(), normalized_tags: BTreeSet::new(), original_name }
    }
}

/// Normalizes `raw_name` using `tables`. Deterministic and infallible: any
/// input, including empty strings, unrecognized jargon, or mixed scripts,
/// produces a result without panicking.
pub fn normalize(raw_name: &str, tables: &NormalizationTables) -> NormalizedName {
    let original_name = raw_name.to_string();
    let trimmed = raw_name.trim();
    if trimmed.is_empty() {
        return NormalizedName::empty(original_name);
    }

    let mut display_words = Vec::new();
    let mut tags = BTreeSet::new();

    let whole_upper = trimmed.to_uppercase();
    if let Some(canonical) = tables.abbreviations.get(&whole_upper) {
        apply_canonical(canonical, tables, &mut display_words, &mut tags);
    } else {
        for word in trimmed.split_whitespace() {
            let upper_word = word.to_uppercase();
            if let Some(canonical) = tables.abbreviations.get(&upper_word) {
                apply_canonical(canonical, tables, &mut display_words, &mut tags);
                continue;
            }
            let lower_word = word.to_lowercase();
            if let Some(canonical) = tables.typos.get(&lower_word) {
                apply_canonical(canonical, tables, &mut display_words, &mut tags);
                continue;
            }
            display_words.push(capitalize(word));
            let slug = slugify(word);
            if !slug.is_empty() {
                tags.insert(slug);
            }
        }
    }

    NormalizedName {
        display_name: display_words.join(" "),
        normalized_tags: tags,
        original_name,
    }
}

fn apply_canonical(canonical: &str, tables: &NormalizationTables, display_words: &mut Vec<String>, tags: &mut BTreeSet<String>) {
    let display = tables
        .canonical_display
        .get(canonical)
        .cloned()
        .unwrap_or_else(|| title_case_tokens(canonical));
    for word in display.split_whitespace() {
        display_words.push(word.to_string());
    }
    tags.insert(slugify(canonical));
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn title_case_tokens(canonical: &str) -> String {
    canonical
        .split(['_', '-', ' '])
        .filter(|s| !s.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lower-cases and replaces runs of non-alphanumeric characters with a
/// single underscore, trimming leading/trailing underscores.
fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_sep = true;
    for ch in input.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
