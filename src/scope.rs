use uuid::Uuid;

use crate::InputError;

/// Where definitions are created: one subscription or one management group, never both.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Scope {
    /// A subscription, by id.
    Subscription(Uuid),
    /// A management group, by name.
    ManagementGroup(String),
}

impl Scope {
    /// Bind the scope from the two mutually exclusive command-line options.
    pub fn from_args(
        subscription_id: Option<&str>,
        management_group: Option<&str>,
    ) -> Result<Self, InputError> {
        match (subscription_id, management_group) {
            (Some(_), Some(_)) => Err(InputError::ConflictingScope),
            (None, None) => Err(InputError::NoScope),
            (Some(id), None) => Self::subscription(id),
            (None, Some(name)) => Self::management_group(name),
        }
    }

    /// A subscription scope; `id` must be a GUID.
    pub fn subscription(id: &str) -> Result<Self, InputError> {
        Uuid::parse_str(id.trim())
            .map(Scope::Subscription)
            .map_err(|err| InputError::InvalidSubscriptionId {
                value: id.to_string(),
                reason: err.to_string(),
            })
    }

    /// A management group scope; `name` must not be blank.
    pub fn management_group(name: &str) -> Result<Self, InputError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InputError::EmptyManagementGroup);
        }
        Ok(Scope::ManagementGroup(name.to_string()))
    }

    /// The resource id of the scope itself.
    pub fn resource_id(&self) -> String {
        match self {
            Scope::Subscription(id) => format!("/subscriptions/{id}"),
            Scope::ManagementGroup(name) => {
                format!("/providers/Microsoft.Management/managementGroups/{name}")
            }
        }
    }

    /// The resource id a policy definition named `name` gets at this scope.
    pub fn policy_definition_id(&self, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.Authorization/policyDefinitions/{name}",
            self.resource_id()
        )
    }

    /// The resource id a policy set definition named `name` gets at this scope.
    pub fn policy_set_definition_id(&self, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.Authorization/policySetDefinitions/{name}",
            self.resource_id()
        )
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Subscription(id) => write!(f, "subscription {id}"),
            Scope::ManagementGroup(name) => write!(f, "management group {name}"),
        }
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_scope() {
        assert!(matches!(
            Scope::from_args(Some("00000000-0000-0000-0000-000000000001"), Some("MG1")),
            Err(InputError::ConflictingScope)
        ));
        assert!(matches!(
            Scope::from_args(None, None),
            Err(InputError::NoScope)
        ));
    }

    #[test]
    fn subscription_must_be_a_guid() {
        let id = Uuid::new_v4();
        assert_eq!(
            Scope::Subscription(id),
            Scope::from_args(Some(&id.to_string()), None).unwrap()
        );
        assert!(matches!(
            Scope::from_args(Some("my-subscription"), None),
            Err(InputError::InvalidSubscriptionId { .. })
        ));
    }

    #[test]
    fn management_group_must_not_be_blank() {
        assert!(matches!(
            Scope::from_args(None, Some("  ")),
            Err(InputError::EmptyManagementGroup)
        ));
        assert_eq!(
            Scope::ManagementGroup("MG1".to_string()),
            Scope::from_args(None, Some("MG1")).unwrap()
        );
    }

    #[test]
    fn resource_ids() {
        let subscription =
            Scope::subscription("6E2C5A1F-0B44-4F0C-9D55-1B7A7F1C2E3D").unwrap();
        assert_eq!(
            "/subscriptions/6e2c5a1f-0b44-4f0c-9d55-1b7a7f1c2e3d/providers/Microsoft.Authorization/policyDefinitions/p1",
            subscription.policy_definition_id("p1")
        );
        let group = Scope::management_group("MG1").unwrap();
        assert_eq!(
            "/providers/Microsoft.Management/managementGroups/MG1/providers/Microsoft.Authorization/policySetDefinitions/s1",
            group.policy_set_definition_id("s1")
        );
        assert_eq!("management group MG1", group.to_string());
    }
}
