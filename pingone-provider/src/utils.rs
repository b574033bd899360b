//! Import identifier parsing

use pingone_core::diagnostics::Diagnostic;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportIdError {
    #[error("Import ID \"{id}\" must have the format \"{expected}\"")]
    WrongShape { id: String, expected: String },

    #[error("Import ID \"{id}\" contains whitespace")]
    Whitespace { id: String },
}

impl ImportIdError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error("Unexpected Import Identifier").with_detail(self.to_string())
    }
}

/// Split a slash-separated import identifier into its named parts
/// (e.g., "<environment_id>/<population_id>"). Every part must be non-empty
/// and contain neither slashes nor whitespace.
pub fn parse_import_id(id: &str, parts: &[&str]) -> Result<Vec<String>, ImportIdError> {
    let expected = parts
        .iter()
        .map(|p| format!("<{}>", p))
        .collect::<Vec<_>>()
        .join("/");

    if id.chars().any(char::is_whitespace) {
        return Err(ImportIdError::Whitespace { id: id.to_string() });
    }

    let values: Vec<&str> = id.splitn(parts.len(), '/').collect();
    if values.len() != parts.len() || values.iter().any(|v| v.is_empty() || v.contains('/')) {
        return Err(ImportIdError::WrongShape {
            id: id.to_string(),
            expected,
        });
    }
    Ok(values.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVIRONMENT: [&str; 2] = ["environment_id", "population_id"];

    #[test]
    fn splits_on_slash() {
        assert_eq!(
            parse_import_id("A1B2/P1Q2", &ENVIRONMENT).unwrap(),
            vec!["A1B2".to_string(), "P1Q2".to_string()]
        );
    }

    #[test]
    fn rejects_whitespace() {
        let err = parse_import_id("A1B2/ P1Q2", &ENVIRONMENT).unwrap_err();
        assert!(matches!(err, ImportIdError::Whitespace { .. }));
        assert_eq!(err.to_diagnostic().summary, "Unexpected Import Identifier");
    }

    #[test]
    fn rejects_missing_or_extra_parts() {
        for id in ["A1B2", "A1B2/", "/P1Q2", "A1B2/P1Q2/X"] {
            let err = parse_import_id(id, &ENVIRONMENT).unwrap_err();
            assert!(
                err.to_string()
                    .contains("<environment_id>/<population_id>"),
                "{}",
                id
            );
        }
    }
}
