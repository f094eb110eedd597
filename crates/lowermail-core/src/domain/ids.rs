use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque document identifier, unique within one collection.
///
/// Ordering is byte order of the id, which is the order the database uses
/// when sorting a single collection by document name. Legacy numeric ids
/// (`__id<n>__`) are the exception: the database sorts them numerically and
/// ahead of every string id, so byte order does not hold for them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        if value.is_empty() {
            return Err(CoreError::EmptyDocumentId);
        }
        if value.contains('/') {
            return Err(CoreError::InvalidDocumentId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_legacy_numeric(&self) -> bool {
        self.0
            .strip_prefix("__id")
            .and_then(|rest| rest.strip_suffix("__"))
            .is_some_and(|digits| {
                let digits = digits.strip_prefix('-').unwrap_or(digits);
                !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
            })
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentId;
    use crate::error::CoreError;

    #[test]
    fn document_id_rejects_empty_and_path_segments() {
        assert_eq!(DocumentId::new(""), Err(CoreError::EmptyDocumentId));
        assert!(matches!(
            DocumentId::new("users/u1"),
            Err(CoreError::InvalidDocumentId(_))
        ));
    }

    #[test]
    fn legacy_numeric_ids_are_recognized() {
        let legacy = |value: &str| DocumentId::new(value).expect("id").is_legacy_numeric();
        assert!(legacy("__id7__"));
        assert!(legacy("__id-12__"));
        assert!(!legacy("__id__"));
        assert!(!legacy("__idx7__"));
        assert!(!legacy("id7"));
    }

    #[test]
    fn document_ids_sort_by_bytes() {
        let mut ids: Vec<DocumentId> = ["b", "A", "a", "B10", "B2"]
            .iter()
            .map(|id| id.parse().expect("id"))
            .collect();
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(DocumentId::as_str).collect();
        assert_eq!(sorted, vec!["A", "B10", "B2", "a", "b"]);
    }
}
