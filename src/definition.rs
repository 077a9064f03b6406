//! Definition files and their classification.
//!
//! A definition file is classified by the shape of its `properties` object: a non-empty
//! `policyDefinitions` makes it a policy set, otherwise a non-empty `policyRule` makes it a
//! policy, and anything else is unrecognized.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::{DefinitionError, Placeholders};

/// The mode a policy definition gets when its file does not name one.
pub const DEFAULT_POLICY_MODE: &str = "All";

////////////////////////////////////////// DefinitionKind //////////////////////////////////////////

/// The kinds of definition the tools deploy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DefinitionKind {
    /// A single policy definition, identified by `properties.policyRule`.
    Policy,
    /// A policy set (initiative) definition, identified by `properties.policyDefinitions`.
    PolicySet,
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefinitionKind::Policy => write!(f, "policy definition"),
            DefinitionKind::PolicySet => write!(f, "policy set definition"),
        }
    }
}

///////////////////////////////////////// PolicyDefinition /////////////////////////////////////////

/// A single policy definition extracted from a definition file.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyDefinition {
    /// Resource name of the definition.
    pub name: String,
    /// `properties.displayName`, if any.
    pub display_name: Option<String>,
    /// `properties.description`, if any.
    pub description: Option<String>,
    /// `properties.mode`, or [`DEFAULT_POLICY_MODE`].
    pub mode: String,
    /// `properties.parameters`, the parameter schema.
    pub parameters: Option<Value>,
    /// `properties.policyRule`, passed through verbatim.
    pub policy_rule: Value,
    /// `properties.metadata`, if any.
    pub metadata: Option<Value>,
}

//////////////////////////////////// PolicyDefinitionReference /////////////////////////////////////

/// One member of a policy set.
///
/// Fields other than the ones named here are kept in `extra` and sent back unchanged.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinitionReference {
    /// Resource id of the referenced policy definition.
    pub policy_definition_id: String,
    /// Identifier of this reference within the set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_definition_reference_id: Option<String>,
    /// Parameter bindings for the referenced definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    /// Names of the `policyDefinitionGroups` this reference belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_names: Option<Vec<String>>,
    /// Any other fields of the reference.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/////////////////////////////////////// PolicySetDefinition ////////////////////////////////////////

/// A policy set (initiative) definition extracted from a definition file.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicySetDefinition {
    /// Resource name of the definition.
    pub name: String,
    /// `properties.displayName`, if any.
    pub display_name: Option<String>,
    /// `properties.description`, if any.
    pub description: Option<String>,
    /// `properties.parameters`, the parameter schema.
    pub parameters: Option<Value>,
    /// `properties.policyDefinitions`, in file order.
    pub policy_definitions: Vec<PolicyDefinitionReference>,
    /// `properties.policyDefinitionGroups`, if any.
    pub policy_definition_groups: Option<Value>,
    /// `properties.metadata`, if any.
    pub metadata: Option<Value>,
}

////////////////////////////////////////// Classification //////////////////////////////////////////

/// What a definition file turned out to contain.
#[derive(Clone, Debug, PartialEq)]
pub enum Classification {
    /// A single policy definition.
    Policy(PolicyDefinition),
    /// A policy set definition.
    PolicySet(PolicySetDefinition),
    /// Neither of the above.
    Unrecognized,
}

impl Classification {
    /// The kind of definition, or `None` when unrecognized.
    pub fn kind(&self) -> Option<DefinitionKind> {
        match self {
            Classification::Policy(_) => Some(DefinitionKind::Policy),
            Classification::PolicySet(_) => Some(DefinitionKind::PolicySet),
            Classification::Unrecognized => None,
        }
    }

    /// Classify an already-parsed document.
    ///
    /// The error is a human-readable reason the document has a recognized shape but cannot be
    /// deployed.
    pub fn of(document: &Value) -> Result<Self, String> {
        let properties = document.get("properties");
        let field = |name: &str| properties.and_then(|p| p.get(name));
        if field("policyDefinitions").is_some_and(is_non_empty) {
            Ok(Classification::PolicySet(policy_set_from(document)?))
        } else if field("policyRule").is_some_and(is_non_empty) {
            Ok(Classification::Policy(policy_from(document)?))
        } else {
            Ok(Classification::Unrecognized)
        }
    }
}

/////////////////////////////////////////// DefinitionFile /////////////////////////////////////////

/// The raw text of a definition file and where it came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DefinitionFile {
    path: PathBuf,
    text: String,
}

impl DefinitionFile {
    /// Read a definition file from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(path, text))
    }

    /// Wrap text that did not come from disk.
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Where the file came from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw text of the file.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace placeholder tokens throughout the raw text.
    pub fn substitute(self, placeholders: &Placeholders) -> Self {
        Self {
            text: placeholders.apply(&self.text),
            path: self.path,
        }
    }

    /// Parse the raw text as JSON.
    pub fn parse(&self) -> Result<Value, DefinitionError> {
        serde_json::from_str(&self.text).map_err(|source| DefinitionError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Parse and classify the file.
    pub fn classify(&self) -> Result<Classification, DefinitionError> {
        let document = self.parse()?;
        Classification::of(&document).map_err(|message| DefinitionError::Invalid {
            path: self.path.clone(),
            message,
        })
    }
}

////////////////////////////////////////////// helpers /////////////////////////////////////////////

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Characters that would change the meaning of the resource id or request URL.
const RESERVED_NAME_CHARACTERS: &[char] = &['/', '\\', '?', '#', '%', '&', ':', '<', '>', '*'];

fn required_name(document: &Value) -> Result<String, String> {
    match document.get("name") {
        Some(Value::String(name)) if name.trim().is_empty() => {
            Err("\"name\" is empty".to_string())
        }
        Some(Value::String(name)) => {
            if let Some(c) = name.chars().find(|c| RESERVED_NAME_CHARACTERS.contains(c)) {
                Err(format!("\"name\" {name:?} must not contain {c:?}"))
            } else if name.contains("..") {
                Err(format!("\"name\" {name:?} must not contain \"..\""))
            } else {
                Ok(name.clone())
            }
        }
        Some(other) => Err(format!("\"name\" must be a string, not {other}")),
        None => Err("missing \"name\"".to_string()),
    }
}

fn optional_string(properties: &Value, key: &str) -> Result<Option<String>, String> {
    match properties.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("\"properties.{key}\" must be a string, not {other}")),
    }
}

fn optional_value(properties: &Value, key: &str) -> Option<Value> {
    properties.get(key).filter(|v| !v.is_null()).cloned()
}

fn policy_from(document: &Value) -> Result<PolicyDefinition, String> {
    let properties = &document["properties"];
    Ok(PolicyDefinition {
        name: required_name(document)?,
        display_name: optional_string(properties, "displayName")?,
        description: optional_string(properties, "description")?,
        mode: optional_string(properties, "mode")?
            .unwrap_or_else(|| DEFAULT_POLICY_MODE.to_string()),
        parameters: optional_value(properties, "parameters"),
        policy_rule: properties["policyRule"].clone(),
        metadata: optional_value(properties, "metadata"),
    })
}

fn policy_set_from(document: &Value) -> Result<PolicySetDefinition, String> {
    let properties = &document["properties"];
    let policy_definitions: Vec<PolicyDefinitionReference> =
        serde_json::from_value(properties["policyDefinitions"].clone())
            .map_err(|err| format!("invalid \"properties.policyDefinitions\": {err}"))?;
    Ok(PolicySetDefinition {
        name: required_name(document)?,
        display_name: optional_string(properties, "displayName")?,
        description: optional_string(properties, "description")?,
        parameters: optional_value(properties, "parameters"),
        policy_definitions,
        policy_definition_groups: optional_value(properties, "policyDefinitionGroups"),
        metadata: optional_value(properties, "metadata"),
    })
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
