use std::path::Path;

use serde_json::{Map, Value};

use super::types::GroundTruthRecord;
use super::ValidationError;

/// Hand-labeled expectations keyed by document identifier. Read-only.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthSet {
    entries: Map<String, Value>,
}

impl GroundTruthSet {
    /// Load a JSON object keyed by document id. A missing file or a
    /// top-level value that is not an object is terminal.
    pub fn load(path: &Path) -> Result<Self, ValidationError> {
        if !path.exists() {
            return Err(ValidationError::GroundTruthNotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| ValidationError::GroundTruthFormat(format!("{}: {e}", path.display())))?;
        let set = Self::from_value(value)?;
        tracing::info!(path = %path.display(), entries = set.len(), "Ground truth loaded");
        Ok(set)
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(ValidationError::GroundTruthFormat(format!(
                "expected an object, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expectation for one document.
    ///
    /// Looks up the exact id first, then any key with the same file stem
    /// ("casa.png" labels "casa.txt"). An unlabeled document gets an empty
    /// record, which scores nothing. An entry that does not parse fails only
    /// this document.
    pub fn get(&self, document_id: &str) -> Result<GroundTruthRecord, ValidationError> {
        let Some(value) = self.lookup(document_id) else {
            tracing::debug!(document_id, "No ground truth entry");
            return Ok(GroundTruthRecord::default());
        };
        serde_json::from_value(value.clone()).map_err(|e| ValidationError::MalformedGroundTruth {
            document_id: document_id.to_string(),
            reason: e.to_string(),
        })
    }

    fn lookup(&self, document_id: &str) -> Option<&Value> {
        if let Some(value) = self.entries.get(document_id) {
            return Some(value);
        }
        let stem = file_stem(document_id);
        self.entries
            .iter()
            .find(|(key, _)| file_stem(key) == stem)
            .map(|(_, value)| value)
    }
}

fn file_stem(id: &str) -> &str {
    Path::new(id)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(id)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn loads_object_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"casa.txt": {{"ambientes": ["sala"]}}}}"#).unwrap();

        let set = GroundTruthSet::load(file.path()).unwrap();
        assert_eq!(set.len(), 1);
        let gt = set.get("casa.txt").unwrap();
        assert_eq!(gt.environments, Some(vec!["sala".to_string()]));
    }

    #[test]
    fn missing_file_is_terminal() {
        let err = GroundTruthSet::load(Path::new("/nonexistent/gabarito.json")).unwrap_err();
        assert!(matches!(err, ValidationError::GroundTruthNotFound(_)));
        assert!(err.is_terminal());
    }

    #[test]
    fn non_object_is_terminal() {
        let err = GroundTruthSet::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ValidationError::GroundTruthFormat(_)));
        assert!(err.is_terminal());
    }

    #[test]
    fn invalid_json_file_is_terminal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = GroundTruthSet::load(file.path()).unwrap_err();
        assert!(err.is_terminal());
    }

    #[test]
    fn unlabeled_document_gets_empty_record() {
        let set = GroundTruthSet::from_value(json!({})).unwrap();
        assert_eq!(set.get("x.txt").unwrap(), GroundTruthRecord::default());
    }

    #[test]
    fn lookup_falls_back_to_file_stem() {
        let set = GroundTruthSet::from_value(json!({
            "planta_01.png": {"classificacao": {"categoria": "residencial"}}
        }))
        .unwrap();
        let gt = set.get("planta_01.txt").unwrap();
        assert_eq!(gt.classification.category.as_deref(), Some("residencial"));
    }

    #[test]
    fn malformed_entry_fails_only_that_document() {
        let set = GroundTruthSet::from_value(json!({
            "bad.txt": {"classification": {"plan_type": "roof"}},
            "good.txt": {"environments": ["SALA"]}
        }))
        .unwrap();

        let err = set.get("bad.txt").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MalformedGroundTruth { ref document_id, .. } if document_id == "bad.txt"
        ));
        assert!(!err.is_terminal());
        assert!(set.get("good.txt").is_ok());
    }
}
