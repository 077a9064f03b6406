use std::cell::RefCell;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use policydeploy::pipeline::{deploy_policy_definitions, deploy_policy_set_definition};
use policydeploy::{
    ensure_session, AccessToken, DefinitionError, DefinitionKind, DeployError, Deployer,
    InputSelection, Placeholders, PolicyApi, Prompt, PromptChoice, Scope, Session, SessionError,
    SessionProvider, SignInMode,
};

#[derive(Default)]
struct InMemoryArm {
    stored: RefCell<Vec<(String, Value)>>,
}

impl PolicyApi for InMemoryArm {
    async fn put(&self, resource_id: &str, body: &Value) -> Result<Value, DeployError> {
        let mut resource = body.clone();
        resource["id"] = resource_id.into();
        resource["name"] = resource_id.rsplit('/').next().unwrap_or_default().into();
        self.stored
            .borrow_mut()
            .push((resource_id.to_string(), resource.clone()));
        Ok(resource)
    }
}

fn session() -> Session {
    Session {
        tenant_id: "72f988bf-0000-0000-0000-000000000000".to_string(),
        subscription_id: "6e2c5a1f-0b44-4f0c-9d55-1b7a7f1c2e3d".to_string(),
        subscription_name: "Production".to_string(),
        account: "alice@example.org".to_string(),
    }
}

fn write(path: &Path, value: &Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn policy(name: &str) -> Value {
    json! {{
        "name": name,
        "properties": {
            "displayName": format!("{name} policy"),
            "description": "Deny storage accounts without HTTPS.",
            "mode": "Indexed",
            "parameters": {},
            "policyRule": {
                "if": {
                    "allOf": [
                        {"field": "type", "equals": "Microsoft.Storage/storageAccounts"},
                        {"field": "Microsoft.Storage/storageAccounts/supportsHttpsTrafficOnly", "notEquals": true}
                    ]
                },
                "then": {"effect": "deny"}
            },
            "metadata": {"category": "Storage"}
        }
    }}
}

fn initiative() -> Value {
    json! {{
        "name": "custom1-initiative",
        "properties": {
            "displayName": "Custom initiative",
            "description": "Groups the custom policies.",
            "parameters": {},
            "policyDefinitions": [
                {
                    "policyDefinitionReferenceId": "custom1",
                    "policyDefinitionId": "{locId}/providers/Microsoft.Authorization/policyDefinitions/custom1-policyDef",
                    "parameters": {}
                }
            ],
            "metadata": {"category": "Custom"}
        }
    }}
}

fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
    let mut names: Vec<String> = files
        .iter()
        .map(|f| {
            f.strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn directory_with_policy_and_policy_set_deploys_only_the_policy() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("a.json"), &policy("a"));
    write(&dir.path().join("b.json"), &initiative());

    let selection =
        InputSelection::from_args(vec![], Some(dir.path().to_string_lossy().into_owned()), false)
            .unwrap();
    selection.validate().unwrap();
    let files = selection.collect().unwrap();

    let arm = InMemoryArm::default();
    let deployer = Deployer::new(&arm, Scope::management_group("MG1").unwrap(), session());
    let report = deploy_policy_definitions(&deployer, &files).await;

    assert_eq!(1, report.results.len());
    assert_eq!(
        "/providers/Microsoft.Management/managementGroups/MG1/providers/Microsoft.Authorization/policyDefinitions/a",
        report.results[0]["id"]
    );
    assert_eq!("deny", report.results[0]["properties"]["policyRule"]["then"]["effect"]);
    assert_eq!(1, report.skipped.len());
    assert!(report.skipped[0].reason.path().ends_with("b.json"));
    assert!(matches!(
        report.skipped[0].reason,
        DefinitionError::WrongKind {
            expected: DefinitionKind::Policy,
            found: DefinitionKind::PolicySet,
            ..
        }
    ));
    assert!(report.failed.is_empty());
    assert_eq!(1, arm.stored.borrow().len());
}

#[tokio::test]
async fn set_definition_placeholders_resolve_policy_definition_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("initiative.json");
    write(&path, &initiative());
    let placeholders = Placeholders::from_json(
        r#"{"locId": "/providers/Microsoft.Management/managementGroups/MG1"}"#,
    )
    .unwrap();

    let arm = InMemoryArm::default();
    let deployer = Deployer::new(&arm, Scope::management_group("MG1").unwrap(), session());
    let result = deploy_policy_set_definition(&deployer, &path, &placeholders)
        .await
        .unwrap();

    assert_eq!(
        "/providers/Microsoft.Management/managementGroups/MG1/providers/Microsoft.Authorization/policySetDefinitions/custom1-initiative",
        result["id"]
    );
    assert_eq!(
        "/providers/Microsoft.Management/managementGroups/MG1/providers/Microsoft.Authorization/policyDefinitions/custom1-policyDef",
        result["properties"]["policyDefinitions"][0]["policyDefinitionId"]
    );
    assert_eq!(
        "custom1",
        result["properties"]["policyDefinitions"][0]["policyDefinitionReferenceId"]
    );
}

#[tokio::test]
async fn recursive_directory_finds_nested_definitions() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("top.json"), &policy("top"));
    write(&dir.path().join("network/vnet.json"), &policy("vnet"));
    write(&dir.path().join("network/dns/zones.json"), &policy("zones"));

    let flat = InputSelection::Directory {
        path: dir.path().to_path_buf(),
        recursive: false,
    };
    assert_eq!(vec!["top.json"], relative(dir.path(), &flat.collect().unwrap()));

    let recursive = InputSelection::Directory {
        path: dir.path().to_path_buf(),
        recursive: true,
    };
    let files = recursive.collect().unwrap();
    assert_eq!(
        vec!["network/dns/zones.json", "network/vnet.json", "top.json"],
        relative(dir.path(), &files)
    );

    let arm = InMemoryArm::default();
    let scope = Scope::subscription("6e2c5a1f-0b44-4f0c-9d55-1b7a7f1c2e3d").unwrap();
    let deployer = Deployer::new(&arm, scope, session());
    let report = deploy_policy_definitions(&deployer, &files).await;
    assert_eq!(3, report.results.len());
    assert!(report.skipped.is_empty());
    assert!(arm
        .stored
        .borrow()
        .iter()
        .all(|(id, _)| id.starts_with("/subscriptions/6e2c5a1f-0b44-4f0c-9d55-1b7a7f1c2e3d/")));
}

#[tokio::test]
async fn set_definition_tool_refuses_policy_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    write(&path, &policy("p"));
    let arm = InMemoryArm::default();
    let deployer = Deployer::new(&arm, Scope::management_group("MG1").unwrap(), session());
    assert!(
        deploy_policy_set_definition(&deployer, &path, &Placeholders::new())
            .await
            .is_err()
    );
    assert!(arm.stored.borrow().is_empty());
}

struct SignedOut;

impl SessionProvider for SignedOut {
    fn current(&self) -> Result<Option<Session>, SessionError> {
        Ok(None)
    }

    fn sign_in(&self) -> Result<(), SessionError> {
        panic!("silent mode must not sign in");
    }

    fn sign_out(&self) -> Result<(), SessionError> {
        panic!("silent mode must not sign out");
    }

    fn access_token(&self, _: &str) -> Result<AccessToken, SessionError> {
        panic!("silent mode must not fetch a token without a session");
    }
}

struct NeverAsked;

impl Prompt for NeverAsked {
    fn confirm(&mut self, _: &Session) -> Result<PromptChoice, SessionError> {
        panic!("silent mode must not prompt");
    }
}

#[test]
fn silent_mode_without_session_stops_before_any_work() {
    let err = ensure_session(&SignedOut, SignInMode::from_flag(true), &mut NeverAsked).unwrap_err();
    assert!(matches!(err, SessionError::NotSignedIn));
}
