//! Concept dictionaries loaded once at startup.
//!
//! Both tables are plain data; a missing or empty file degrades to the
//! built-in seed set rather than failing startup — normalization and query
//! understanding are enhancements, not hard dependencies.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use carepoint_core::query::QueryIntent;

/// Abbreviation/typo/canonical-display lookup for [`crate::service_name::normalize`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationTables {
    /// Whole-string or whole-word abbreviation, keyed upper-case (`"C/S"`),
    /// mapping to a canonical token (`"CAESAREAN_SECTION"`).
    pub abbreviations: HashMap<String, String>,
    /// Known misspelling, keyed lower-case, mapping to a canonical token.
    pub typos: HashMap<String, String>,
    /// Canonical token mapping to its human-readable display phrase.
    pub canonical_display: HashMap<String, String>,
}

impl NormalizationTables {
    /// A small built-in seed set so the normalizer behaves sensibly with
    /// no configuration file present. Production deployments load a much
    /// larger table via [`Self::load_from_path`].
    pub fn built_in() -> Self {
        let mut abbreviations = HashMap::new();
        abbreviations.insert("C/S".to_string(), "CAESAREAN_SECTION".to_string());
        abbreviations.insert("CS".to_string(), "CAESAREAN_SECTION".to_string());
        abbreviations.insert("ANC".to_string(), "ANTENATAL_CARE".to_string());
        abbreviations.insert("ER".to_string(), "EMERGENCY_ROOM".to_string());
        abbreviations.insert("ICU".to_string(), "INTENSIVE_CARE_UNIT".to_string());

        let mut typos = HashMap::new();
        typos.insert("ceasarean".to_string(), "CAESAREAN_SECTION".to_string());
        typos.insert("cesarean".to_string(), "CAESAREAN_SECTION".to_string());
        typos.insert("ceasarian".to_string(), "CAESAREAN_SECTION".to_string());

        let mut canonical_display = HashMap::new();
        canonical_display.insert("CAESAREAN_SECTION".to_string(), "Caesarean Section".to_string());
        canonical_display.insert("ANTENATAL_CARE".to_string(), "Antenatal Care".to_string());
        canonical_display.insert("EMERGENCY_ROOM".to_string(), "Emergency Room".to_string());
        canonical_display.insert("INTENSIVE_CARE_UNIT".to_string(), "Intensive Care Unit".to_string());

        Self { abbreviations, typos, canonical_display }
    }

    /// Loads tables from a JSON file; falls back to [`Self::built_in`] with
    /// a warning if the file is absent or unparsable.
    pub fn load_from_path(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::load_from_str(&contents).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "falling back to built-in normalization tables");
                Self::built_in()
            }),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "normalization table file not found, using built-in tables");
                Self::built_in()
            }
        }
    }

    pub fn load_from_str(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

/// Synonym/spelling/intent lookup for [`crate::query_understanding::ConceptQueryUnderstanding`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryTables {
    /// Term (lower-case) to its synonym set.
    pub synonyms: HashMap<String, Vec<String>>,
    /// Misspelling (lower-case) to corrected term.
    pub spelling: HashMap<String, String>,
    /// Keyword (lower-case) to the intent it signals.
    #[serde(with = "intent_keyword_map")]
    pub intent_keywords: HashMap<String, QueryIntent>,
}

impl QueryTables {
    pub fn built_in() -> Self {
        let mut synonyms = HashMap::new();
        synonyms.insert("caesarean".to_string(), vec!["c-section".to_string(), "cs".to_string()]);
        synonyms.insert("clinic".to_string(), vec!["hospital".to_string(), "health center".to_string()]);

        let mut spelling = HashMap::new();
        spelling.insert("ceasarean".to_string(), "caesarean".to_string());
        spelling.insert("ceasarian".to_string(), "caesarean".to_string());

        let mut intent_keywords = HashMap::new();
        for kw in ["cheap", "cheapest", "affordable", "low cost", "budget"] {
            intent_keywords.insert(kw.to_string(), QueryIntent::PriceSensitive);
        }
        for kw in ["near me", "nearby", "closest", "close by"] {
            intent_keywords.insert(kw.to_string(), QueryIntent::LocationSensitive);
        }
        for kw in ["emergency", "urgent", "now", "asap"] {
            intent_keywords.insert(kw.to_string(), QueryIntent::Urgent);
        }

        Self { synonyms, spelling, intent_keywords }
    }

    pub fn load_from_path(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "falling back to built-in query tables");
                Self::built_in()
            }),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "query table file not found, using built-in tables");
                Self::built_in()
            }
        }
    }
}

/// `QueryIntent` does not derive `Serialize`/`Deserialize` as a map key by
/// default (serde_json maps require string keys); this module adapts it
/// through its string name.
mod intent_keyword_map {
    use std::collections::HashMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use carepoint_core::query::QueryIntent;

    pub fn serialize<S: Serializer>(map: &HashMap<String, QueryIntent>, ser: S) -> Result<S::Ok, S::Error> {
        let as_strings: HashMap<&String, &str> = map.iter().map(|(k, v)| (k, intent_name(*v))).collect();
        as_strings.serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<HashMap<String, QueryIntent>, D::Error> {
        let raw: HashMap<String, String> = HashMap::deserialize(de)?;
        Ok(raw.into_iter().map(|(k, v)| (k, intent_from_name(&v))).collect())
    }

    fn intent_name(intent: QueryIntent) -> &'static str {
        match intent {
            QueryIntent::General => "general",
            QueryIntent::PriceSensitive => "price_sensitive",
            QueryIntent::LocationSensitive => "location_sensitive",
            QueryIntent::Urgent => "urgent",
        }
    }

    fn intent_from_name(name: &str) -> QueryIntent {
        match name {
            "price_sensitive" => QueryIntent::PriceSensitive,
            "location_sensitive" => QueryIntent::LocationSensitive,
            "urgent" => QueryIntent::Urgent,
            _ => QueryIntent::General,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_normalization_tables_resolve_caesarean() {
        let tables = NormalizationTables::built_in();
        assert_eq!(tables.abbreviations.get("C/S").unwrap(), "CAESAREAN_SECTION");
        assert_eq!(tables.canonical_display.get("CAESAREAN_SECTION").unwrap(), "Caesarean Section");
    }

    #[test]
    fn load_from_path_falls_back_on_missing_file() {
        let tables = NormalizationTables::load_from_path(Path::new("/nonexistent/path/tables.json"));
        assert!(tables.abbreviations.contains_key("C/S"));
    }

    #[test]
    fn load_from_path_reads_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        std::fs::write(&path, r#"{"abbreviations":{"X":"Y"},"typos":{},"canonical_display":{}}"#).unwrap();
        let tables = NormalizationTables::load_from_path(&path);
        assert_eq!(tables.abbreviations.get("X").unwrap(), "Y");
    }
}
