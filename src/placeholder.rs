use std::collections::BTreeMap;

use serde_json::Value;

use crate::InputError;

/// Literal `{token}` replacements applied to raw definition text.
///
/// Replacement is plain substring substitution: no regular expressions, no recursion, and no
/// awareness of JSON structure, so a token may sit anywhere in the file, including inside string
/// values.  Tokens are applied one at a time in sorted order; tokens whose text overlaps give
/// order-dependent results and should be avoided.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Placeholders {
    tokens: BTreeMap<String, String>,
}

impl Placeholders {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a mapping from a JSON object whose values are all strings.
    pub fn from_json(text: &str) -> Result<Self, InputError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| InputError::InvalidPlaceholders {
                message: err.to_string(),
            })?;
        let Value::Object(object) = value else {
            return Err(InputError::InvalidPlaceholders {
                message: format!("expected a JSON object, got {value}"),
            });
        };
        let mut placeholders = Self::new();
        for (token, replacement) in object {
            let Value::String(replacement) = replacement else {
                return Err(InputError::InvalidPlaceholders {
                    message: format!("value for {token:?} must be a string, not {replacement}"),
                });
            };
            if token.is_empty() {
                return Err(InputError::InvalidPlaceholders {
                    message: "token names must not be empty".to_string(),
                });
            }
            placeholders.insert(token, replacement);
        }
        Ok(placeholders)
    }

    /// Add or replace the value for `token`.
    pub fn insert(&mut self, token: impl Into<String>, replacement: impl Into<String>) {
        self.tokens.insert(token.into(), replacement.into());
    }

    /// Number of tokens in the mapping.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when there is nothing to replace.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Replace every `{token}` in `text` with its value.
    pub fn apply(&self, text: &str) -> String {
        let mut text = text.to_string();
        for (token, replacement) in self.tokens.iter() {
            let needle = format!("{{{token}}}");
            if text.contains(&needle) {
                tracing::debug!(token = %token, "substituting placeholder");
                text = text.replace(&needle, replacement);
            }
        }
        text
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Placeholders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut placeholders = Self::new();
        for (token, replacement) in iter {
            placeholders.insert(token, replacement);
        }
        placeholders
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use guacamole::combinators::*;
    use guacamole::Guacamole;

    use super::*;

    #[test]
    fn empty_mapping_is_identity() {
        let text = r#"{"name": "{locId}", "properties": {}}"#;
        assert_eq!(text, Placeholders::new().apply(text));
    }

    #[test]
    fn replaces_every_occurrence() {
        let placeholders: Placeholders = [("locId", "MG1")].into_iter().collect();
        assert_eq!(
            "MG1/a MG1/b {other}",
            placeholders.apply("{locId}/a {locId}/b {other}")
        );
    }

    #[test]
    fn bare_token_without_braces_is_untouched() {
        let placeholders: Placeholders = [("locId", "MG1")].into_iter().collect();
        assert_eq!("locId {locid}", placeholders.apply("locId {locid}"));
    }

    #[test]
    fn replacement_is_not_recursive() {
        let placeholders: Placeholders = [("a", "{a}{a}")].into_iter().collect();
        assert_eq!("{a}{a}", placeholders.apply("{a}"));
    }

    #[test]
    fn replacement_is_literal() {
        let placeholders: Placeholders = [("a.b", "$1")].into_iter().collect();
        assert_eq!("$1 {aXb}", placeholders.apply("{a.b} {aXb}"));
    }

    #[test]
    fn from_json_object() {
        let placeholders = Placeholders::from_json(
            r#"{"locId": "/providers/Microsoft.Management/managementGroups/MG1", "env": "prod"}"#,
        )
        .unwrap();
        assert_eq!(2, placeholders.len());
        assert_eq!("prod-x", placeholders.apply("{env}-x"));
    }

    #[test]
    fn from_json_rejects_non_objects_and_non_strings() {
        for text in ["[]", "\"x\"", "{\"a\": 1}", "{\"a\": null}", "{\"\": \"x\"}", "{"] {
            assert!(
                matches!(
                    Placeholders::from_json(text),
                    Err(InputError::InvalidPlaceholders { .. })
                ),
                "{text}"
            );
        }
    }

    #[test]
    fn randomized_substitution_matches_expected_text() {
        let mut guac = Guacamole::new(42);
        let tokens = ["alpha", "beta", "gamma"];
        let fillers = ["x", " ", "\"", "/", "{unknown}"];
        let placeholders: Placeholders = tokens
            .iter()
            .map(|t| (t.to_string(), t.to_uppercase()))
            .collect();
        for _ in 0..128 {
            let mut text = String::new();
            let mut expected = String::new();
            for _ in 0..range_to(16usize)(&mut guac) {
                if coin()(&mut guac) {
                    let token = tokens[range_to(tokens.len())(&mut guac)];
                    text.push_str(&format!("{{{token}}}"));
                    expected.push_str(&token.to_uppercase());
                } else {
                    let filler = fillers[range_to(fillers.len())(&mut guac)];
                    text.push_str(filler);
                    expected.push_str(filler);
                }
            }
            assert_eq!(expected, placeholders.apply(&text));
        }
    }
}
