//! The two deployment pipelines.
//!
//! Bulk deployment of policy definitions is best-effort: a file that cannot be read, parsed or
//! classified as a policy definition is skipped with a diagnostic, and a failed deployment does
//! not stop the batch.  Deployment of a single policy set definition is strict: any problem ends
//! the run before or instead of the deployment call.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::{
    Classification, DefinitionError, DefinitionFile, DefinitionKind, DeployError, Deployer, Error,
    Placeholders, PolicyApi, PolicySetDefinition,
};

/// A file the bulk pipeline did not deploy.
#[derive(Debug)]
pub struct Skipped {
    /// Why the file was skipped; the error names the file.
    pub reason: DefinitionError,
}

/// A definition whose deployment call failed.
#[derive(Debug)]
pub struct Failed {
    /// The file the definition came from.
    pub path: PathBuf,
    /// The definition's name.
    pub name: String,
    /// What the API reported.
    pub error: DeployError,
}

/// The outcome of a bulk run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Deployment results in file order.
    pub results: Vec<Value>,
    /// Files skipped before deployment.
    pub skipped: Vec<Skipped>,
    /// Definitions whose deployment failed.
    pub failed: Vec<Failed>,
}

impl BatchReport {
    /// True when no deployment call failed.  Skipped files do not count as failures.
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deploy every policy definition among `files`, skipping everything else.
pub async fn deploy_policy_definitions<A: PolicyApi>(
    deployer: &Deployer<A>,
    files: &[PathBuf],
) -> BatchReport {
    let mut report = BatchReport::default();
    for path in files {
        let policy = match load_policy(path) {
            Ok(policy) => policy,
            Err(reason) => {
                tracing::warn!(file = %path.display(), "skipping: {reason}");
                report.skipped.push(Skipped { reason });
                continue;
            }
        };
        match deployer.deploy_policy(&policy).await {
            Ok(result) => report.results.push(result),
            Err(error) => {
                tracing::error!(file = %path.display(), name = %policy.name, "deployment failed: {error}");
                report.failed.push(Failed {
                    path: path.clone(),
                    name: policy.name,
                    error,
                });
            }
        }
    }
    tracing::info!(
        deployed = report.results.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "batch complete"
    );
    report
}

fn load_policy(path: &Path) -> Result<crate::PolicyDefinition, DefinitionError> {
    let file = DefinitionFile::read(path)?;
    match file.classify()? {
        Classification::Policy(policy) => Ok(policy),
        Classification::PolicySet(_) => Err(DefinitionError::WrongKind {
            path: path.to_path_buf(),
            expected: DefinitionKind::Policy,
            found: DefinitionKind::PolicySet,
        }),
        Classification::Unrecognized => Err(DefinitionError::Unrecognized {
            path: path.to_path_buf(),
        }),
    }
}

/// Read `path`, substitute `placeholders`, and require a policy set definition.
pub fn load_policy_set(
    path: &Path,
    placeholders: &Placeholders,
) -> Result<PolicySetDefinition, DefinitionError> {
    let file = DefinitionFile::read(path)?.substitute(placeholders);
    match file.classify()? {
        Classification::PolicySet(set) => Ok(set),
        Classification::Policy(_) => Err(DefinitionError::WrongKind {
            path: path.to_path_buf(),
            expected: DefinitionKind::PolicySet,
            found: DefinitionKind::Policy,
        }),
        Classification::Unrecognized => Err(DefinitionError::Unrecognized {
            path: path.to_path_buf(),
        }),
    }
}

/// Deploy the policy set definition in `path`; nothing is deployed unless the file is one.
pub async fn deploy_policy_set_definition<A: PolicyApi>(
    deployer: &Deployer<A>,
    path: &Path,
    placeholders: &Placeholders,
) -> Result<Value, Error> {
    let set = load_policy_set(path, placeholders)?;
    Ok(deployer.deploy_policy_set(&set).await?)
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
