#![deny(missing_docs)]

//! policydeploy: deploy Azure Policy definitions and policy set definitions from JSON files.
//!
//! The crate backs two command-line tools that share one linear pipeline:
//!
//! - **Session**: make sure an Azure CLI session exists, prompting or signing in when allowed
//! - **Inputs**: resolve the definition files, either listed explicitly or found in a directory
//! - **Definition**: parse each file and classify it as a policy or a policy set
//! - **Placeholders**: literal `{token}` replacement in raw text before parsing
//! - **Deploy**: PUT each definition to Azure Resource Manager at one subscription or
//!   management group
//!
//! `policydeploy-definitions` deploys policy definitions in bulk and skips whatever it cannot
//! deploy.  `policydeploy-set-definition` deploys one policy set definition and stops at the
//! first problem.
//!
//! # Example
//!
//! ```
//! use policydeploy::{Classification, DefinitionFile, Placeholders};
//!
//! let mut placeholders = Placeholders::new();
//! placeholders.insert("locId", "/providers/Microsoft.Management/managementGroups/MG1");
//! let file = DefinitionFile::from_text(
//!     "initiative.json",
//!     r#"{
//!         "name": "custom1",
//!         "properties": {
//!             "policyDefinitions": [
//!                 {"policyDefinitionId": "{locId}/providers/Microsoft.Authorization/policyDefinitions/custom1-policyDef"}
//!             ]
//!         }
//!     }"#,
//! )
//! .substitute(&placeholders);
//! let Classification::PolicySet(set) = file.classify().unwrap() else {
//!     panic!("expected a policy set");
//! };
//! assert_eq!(
//!     "/providers/Microsoft.Management/managementGroups/MG1/providers/Microsoft.Authorization/policyDefinitions/custom1-policyDef",
//!     set.policy_definitions[0].policy_definition_id,
//! );
//! ```

pub mod cli;
pub mod pipeline;

mod definition;
mod deploy;
mod errors;
mod inputs;
mod placeholder;
mod scope;
mod session;

pub use definition::{
    Classification, DefinitionFile, DefinitionKind, PolicyDefinition, PolicyDefinitionReference,
    PolicySetDefinition, DEFAULT_POLICY_MODE,
};
pub use deploy::{
    policy_definition_body, policy_set_definition_body, ArmClient, Deployer, PolicyApi,
    ARM_API_VERSION, ARM_ENDPOINT,
};
pub use errors::{DefinitionError, DeployError, Error, InputError, SessionError};
pub use inputs::InputSelection;
pub use placeholder::Placeholders;
pub use scope::Scope;
pub use session::{
    ensure_session, AccessToken, AzureCli, Prompt, PromptChoice, Session, SessionProvider,
    SignInMode, TerminalPrompt,
};
