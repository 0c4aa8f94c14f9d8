//! Last-resort region inference from provider tags.
//!
//! Only consulted when neither coordinates nor a usable address string are
//! available. Never extends a query already built from real address fields.

/// A small, fixed table of recognized region tags. Providers in this domain
/// commonly tag records with the city/state they operate in even when they
/// omit structured address fields.
const KNOWN_REGIONS: &[(&str, &str, &str)] = &[
    ("lagos", "Lagos", "Lagos"),
    ("port harcourt", "Port Harcourt", "Rivers"),
    ("portharcourt", "Port Harcourt", "Rivers"),
    ("abuja", "Abuja", "FCT"),
    ("kano", "Kano", "Kano"),
    ("ibadan", "Ibadan", "Oyo"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredRegion {
    pub city: String,
    pub state: String,
}

/// Looks up the first recognized region among `tags`, case-insensitively.
pub fn infer_region_from_tags(tags: &[String]) -> Option<InferredRegion> {
    for tag in tags {
        let lower = tag.trim().to_lowercase();
        if let Some((_, city, state)) = KNOWN_REGIONS.iter().find(|(key, _, _)| *key == lower) {
            return Some(InferredRegion { city: city.to_string(), state: state.to_string() });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_region_tag() {
        let region = infer_region_from_tags(&["lagos".to_string()]).unwrap();
        assert_eq!(region.city, "Lagos");
    }

    #[test]
    fn unknown_tags_infer_nothing() {
        assert!(infer_region_from_tags(&["maternity".to_string(), "clinic".to_string()]).is_none());
    }

    #[test]
    fn first_match_wins() {
        let region = infer_region_from_tags(&["clinic".to_string(), "port harcourt".to_string()]).unwrap();
        assert_eq!(region.city, "Port Harcourt");
        assert_eq!(region.state, "Rivers");
    }
}
