use serde_json::{json, Map, Value};

use crate::{AccessToken, DeployError, PolicyDefinition, PolicySetDefinition, Scope, Session};

/// The public-cloud Azure Resource Manager endpoint.
pub const ARM_ENDPOINT: &str = "https://management.azure.com";

/// The Microsoft.Authorization API version the definitions are written with.
pub const ARM_API_VERSION: &str = "2021-06-01";

///////////////////////////////////////////// PolicyApi ////////////////////////////////////////////

/// The create-or-update call the deployer issues.
#[allow(async_fn_in_trait)]
pub trait PolicyApi {
    /// Create or update the resource at `resource_id` with `body`, returning the stored resource.
    async fn put(&self, resource_id: &str, body: &Value) -> Result<Value, DeployError>;
}

impl<A: PolicyApi> PolicyApi for &A {
    async fn put(&self, resource_id: &str, body: &Value) -> Result<Value, DeployError> {
        (**self).put(resource_id, body).await
    }
}

///////////////////////////////////////////// ArmClient ////////////////////////////////////////////

/// A [`PolicyApi`] that talks to Azure Resource Manager over HTTPS.
#[derive(Clone, Debug)]
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    api_version: String,
    token: AccessToken,
}

impl ArmClient {
    /// A client for `endpoint` that authenticates with `token`.
    pub fn new(endpoint: impl Into<String>, token: AccessToken) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_version: ARM_API_VERSION.to_string(),
            token,
        }
    }

    /// Use a different Microsoft.Authorization API version.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// The full URL for `resource_id`.
    pub fn url_for(&self, resource_id: &str) -> String {
        format!(
            "{}{resource_id}?api-version={}",
            self.endpoint, self.api_version
        )
    }
}

impl PolicyApi for ArmClient {
    async fn put(&self, resource_id: &str, body: &Value) -> Result<Value, DeployError> {
        let transport = |source| DeployError::Transport {
            resource_id: resource_id.to_string(),
            source,
        };
        let resp = self
            .http
            .put(self.url_for(resource_id))
            .bearer_auth(self.token.secret())
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        let text = resp.text().await.map_err(transport)?;
        tracing::debug!(%resource_id, status = status.as_u16(), "response");
        if !status.is_success() {
            return Err(api_error(
                resource_id,
                status.as_u16(),
                status.canonical_reason(),
                &text,
            ));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| DeployError::InvalidResponse {
            resource_id: resource_id.to_string(),
            message: err.to_string(),
        })
    }
}

#[derive(serde::Deserialize)]
struct ArmErrorResponse {
    error: ArmErrorDetail,
}

#[derive(serde::Deserialize)]
struct ArmErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

fn api_error(resource_id: &str, status: u16, reason: Option<&str>, body: &str) -> DeployError {
    let (code, message) = match serde_json::from_str::<ArmErrorResponse>(body) {
        Ok(ArmErrorResponse { error }) => (error.code, error.message),
        Err(_) => (None, None),
    };
    let message = message
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .or_else(|| reason.map(str::to_string))
        .unwrap_or_else(|| "no details".to_string());
    DeployError::Api {
        resource_id: resource_id.to_string(),
        status,
        code,
        message,
    }
}

/////////////////////////////////////////// request bodies /////////////////////////////////////////

fn insert_opt<T: Into<Value>>(properties: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        properties.insert(key.to_string(), value.into());
    }
}

/// The request body that creates or updates `policy`.
pub fn policy_definition_body(policy: &PolicyDefinition) -> Value {
    let mut properties = Map::new();
    properties.insert("policyType".to_string(), "Custom".into());
    properties.insert("mode".to_string(), policy.mode.clone().into());
    insert_opt(&mut properties, "displayName", policy.display_name.clone());
    insert_opt(&mut properties, "description", policy.description.clone());
    insert_opt(&mut properties, "parameters", policy.parameters.clone());
    properties.insert("policyRule".to_string(), policy.policy_rule.clone());
    insert_opt(&mut properties, "metadata", policy.metadata.clone());
    json! {{ "properties": properties }}
}

/// The request body that creates or updates `set`.
pub fn policy_set_definition_body(set: &PolicySetDefinition) -> Value {
    let mut properties = Map::new();
    properties.insert("policyType".to_string(), "Custom".into());
    insert_opt(&mut properties, "displayName", set.display_name.clone());
    insert_opt(&mut properties, "description", set.description.clone());
    insert_opt(&mut properties, "parameters", set.parameters.clone());
    properties.insert(
        "policyDefinitions".to_string(),
        Value::Array(
            set.policy_definitions
                .iter()
                .map(|reference| json!(reference))
                .collect(),
        ),
    );
    insert_opt(
        &mut properties,
        "policyDefinitionGroups",
        set.policy_definition_groups.clone(),
    );
    insert_opt(&mut properties, "metadata", set.metadata.clone());
    json! {{ "properties": properties }}
}

////////////////////////////////////////////// Deployer ////////////////////////////////////////////

/// Creates or updates definitions at one scope on behalf of one session.
#[derive(Debug)]
pub struct Deployer<A: PolicyApi> {
    api: A,
    scope: Scope,
    session: Session,
}

impl<A: PolicyApi> Deployer<A> {
    /// A deployer that writes to `scope` through `api`.
    pub fn new(api: A, scope: Scope, session: Session) -> Self {
        Self {
            api,
            scope,
            session,
        }
    }

    /// Where definitions are written.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Who definitions are written as.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Create or update a policy definition.
    pub async fn deploy_policy(&self, policy: &PolicyDefinition) -> Result<Value, DeployError> {
        let resource_id = self.scope.policy_definition_id(&policy.name);
        tracing::info!(
            name = %policy.name,
            scope = %self.scope,
            account = %self.session.account,
            "deploying policy definition"
        );
        self.api
            .put(&resource_id, &policy_definition_body(policy))
            .await
    }

    /// Create or update a policy set definition.
    pub async fn deploy_policy_set(&self, set: &PolicySetDefinition) -> Result<Value, DeployError> {
        let resource_id = self.scope.policy_set_definition_id(&set.name);
        tracing::info!(
            name = %set.name,
            scope = %self.scope,
            account = %self.session.account,
            references = set.policy_definitions.len(),
            "deploying policy set definition"
        );
        self.api
            .put(&resource_id, &policy_set_definition_body(set))
            .await
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
