//! Stable entity identifiers.
//!
//! Facility and procedure identifiers are opaque strings, but callers should
//! not be able to pass a raw `String` where an id is expected — that's how
//! `facility_id` and `procedure_id` get swapped at a call site. Both newtypes
//! are cheap to construct and `Display`/`FromStr` round-trip the inner value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing identifier string verbatim.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the id, returning the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(FacilityId, "A stable, deterministically-derived facility identifier.");
opaque_id!(ProcedureId, "A procedure identifier, stable within a provider's code space.");

impl FacilityId {
    /// Derives a facility id deterministically from provider input.
    ///
    /// The id is a pure function of `(provider_id, facility_external_id,
    /// normalized_facility_name)` — no random or time-based component — so
    /// that two records describing the same facility from the same provider
    /// always converge on the same id, across runs and across machines.
    /// `normalized_facility_name` should already be lower-cased/trimmed by
    /// the caller so that cosmetic differences in casing don't mint a new id.
    pub fn derive(provider_id: &str, facility_external_id: &str, normalized_facility_name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"facility\0");
        hasher.update(provider_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(facility_external_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(normalized_facility_name.as_bytes());
        let digest = hasher.finalize();
        Self(hex_prefix(&digest, "fac"))
    }
}

impl ProcedureId {
    /// Derives a procedure id deterministically, preferring the provider's
    /// own code when present and falling back to the normalized display
    /// name. Two records naming the same procedure (by code, or by name
    /// when no code is supplied) converge on the same id.
    pub fn derive(code: Option<&str>, normalized_name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"procedure\0");
        match code {
            Some(code) => {
                hasher.update(b"code\0");
                hasher.update(code.as_bytes());
            }
            None => {
                hasher.update(b"name\0");
                hasher.update(normalized_name.as_bytes());
            }
        }
        let digest = hasher.finalize();
        Self(hex_prefix(&digest, "proc"))
    }
}

/// A stable hash of provider/page/record fields, used to deduplicate
/// ingestion within a bounded TTL (see [`crate::model::IngestionIdempotencyRecord`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Computes the key from the provider id, page cursor, and a record
    /// fingerprint (typically the record's canonical JSON or a stable subset
    /// of its fields, chosen by the caller).
    pub fn compute(provider_id: &str, page_cursor: &str, record_fingerprint: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"idempotency\0");
        hasher.update(provider_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(page_cursor.as_bytes());
        hasher.update(b"\0");
        hasher.update(record_fingerprint.as_bytes());
        let digest = hasher.finalize();
        Self(hex_prefix(&digest, "idem"))
    }

    /// Returns the key as a string slice, suitable as a store lookup key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hex_prefix(digest: &[u8], prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1 + digest.len() * 2);
    out.push_str(prefix);
    out.push('_');
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facility_id_is_deterministic() {
        let a = FacilityId::derive("provider-1", "ext-42", "city hospital");
        let b = FacilityId::derive("provider-1", "ext-42", "city hospital");
        assert_eq!(a, b);
    }

    #[test]
    fn facility_id_distinguishes_providers() {
        let a = FacilityId::derive("provider-1", "ext-42", "city hospital");
        let b = FacilityId::derive("provider-2", "ext-42", "city hospital");
        assert_ne!(a, b);
    }

    #[test]
    fn idempotency_key_is_stable_across_calls() {
        let a = IdempotencyKey::compute("p1", "cursor-0", "fingerprint");
        let b = IdempotencyKey::compute("p1", "cursor-0", "fingerprint");
        assert_eq!(a, b);
    }

    #[test]
    fn procedure_id_prefers_code_over_name() {
        let a = ProcedureId::derive(Some("CPT-123"), "caesarean section");
        let b = ProcedureId::derive(Some("CPT-123"), "different name");
        assert_eq!(a, b);
    }

    #[test]
    fn procedure_id_falls_back_to_name_without_code() {
        let a = ProcedureId::derive(None, "caesarean section");
        let b = ProcedureId::derive(None, "caesarean section");
        let c = ProcedureId::derive(None, "antenatal care");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn idempotency_key_changes_with_cursor() {
        let a = IdempotencyKey::compute("p1", "cursor-0", "fingerprint");
        let b = IdempotencyKey::compute("p1", "cursor-1", "fingerprint");
        assert_ne!(a, b);
    }
}
