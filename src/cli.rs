//! Plumbing shared by the command-line tools.
//!
//! Both tools check their arguments first, then the session, and only then read definition
//! files.  [`run_definitions`] and [`run_set_definition`] hold that order; the binaries supply
//! the Azure CLI, the terminal prompt and an [`ArmClient`].

use std::path::PathBuf;

use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::pipeline::{deploy_policy_definitions, deploy_policy_set_definition, BatchReport};
use crate::{
    ensure_session, ArmClient, Deployer, Error, InputError, InputSelection, Placeholders,
    PolicyApi, Prompt, Scope, SessionError, SessionProvider, SignInMode, ARM_ENDPOINT,
};

/// Send logs to stderr; stdout carries only deployment results.
///
/// `RUST_LOG` overrides the default filter when set.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,policydeploy=debug"
    } else {
        "warn,policydeploy=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

///////////////////////////////////////// DefinitionsRequest ///////////////////////////////////////

/// The command line of `policydeploy-definitions`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DefinitionsRequest {
    /// Definition files named on the command line.
    pub files: Vec<String>,
    /// Directory to search instead of `files`.
    pub directory: Option<String>,
    /// Search subdirectories of `directory` too.
    pub recursive: bool,
    /// Target subscription id.
    pub subscription_id: Option<String>,
    /// Target management group.
    pub management_group: Option<String>,
    /// Fail instead of prompting when not signed in.
    pub silent: bool,
}

/// Deploy the policy definitions `request` names.
///
/// `connect` builds the API client once a session exists.
pub async fn run_definitions<S, P, A, C>(
    request: DefinitionsRequest,
    provider: &S,
    prompt: &mut P,
    connect: C,
) -> Result<BatchReport, Error>
where
    S: SessionProvider,
    P: Prompt,
    A: PolicyApi,
    C: FnOnce(&S) -> Result<A, SessionError>,
{
    let scope = Scope::from_args(
        request.subscription_id.as_deref(),
        request.management_group.as_deref(),
    )?;
    let selection =
        InputSelection::from_args(request.files, request.directory, request.recursive)?;
    selection.validate()?;

    let session = ensure_session(provider, SignInMode::from_flag(request.silent), prompt)?;
    let files = selection.collect()?;
    if files.is_empty() {
        tracing::warn!("no definition files found");
    }
    let deployer = Deployer::new(connect(provider)?, scope, session);
    log_target(&deployer);
    Ok(deploy_policy_definitions(&deployer, &files).await)
}

//////////////////////////////////////// SetDefinitionRequest //////////////////////////////////////

/// The command line of `policydeploy-set-definition`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SetDefinitionRequest {
    /// Positional arguments; exactly one definition file is expected.
    pub files: Vec<String>,
    /// JSON object of placeholder replacements.
    pub placeholders: Option<String>,
    /// Target subscription id.
    pub subscription_id: Option<String>,
    /// Target management group.
    pub management_group: Option<String>,
    /// Fail instead of prompting when not signed in.
    pub silent: bool,
}

/// Deploy the one policy set definition `request` names.
pub async fn run_set_definition<S, P, A, C>(
    request: SetDefinitionRequest,
    provider: &S,
    prompt: &mut P,
    connect: C,
) -> Result<Value, Error>
where
    S: SessionProvider,
    P: Prompt,
    A: PolicyApi,
    C: FnOnce(&S) -> Result<A, SessionError>,
{
    let scope = Scope::from_args(
        request.subscription_id.as_deref(),
        request.management_group.as_deref(),
    )?;
    let [file] = request.files.as_slice() else {
        return Err(InputError::ExpectedOneFile {
            found: request.files.len(),
        }
        .into());
    };
    let path = PathBuf::from(file);
    InputSelection::Files(vec![path.clone()]).validate()?;
    let placeholders = match request.placeholders.as_deref() {
        Some(text) => Placeholders::from_json(text)?,
        None => Placeholders::new(),
    };

    let session = ensure_session(provider, SignInMode::from_flag(request.silent), prompt)?;
    let deployer = Deployer::new(connect(provider)?, scope, session);
    log_target(&deployer);
    deploy_policy_set_definition(&deployer, &path, &placeholders).await
}

fn log_target<A: PolicyApi>(deployer: &Deployer<A>) {
    let session = deployer.session();
    tracing::info!(
        tenant = %session.tenant_id,
        subscription = %session.subscription_name,
        account = %session.account,
        scope = %deployer.scope(),
        "using session"
    );
}

/// A client for `endpoint` (the public cloud when `None`) with a token from `provider`.
pub fn arm_client<S: SessionProvider>(
    provider: &S,
    endpoint: Option<&str>,
) -> Result<ArmClient, SessionError> {
    let endpoint = endpoint.unwrap_or(ARM_ENDPOINT);
    let token = provider.access_token(&token_resource(endpoint))?;
    Ok(ArmClient::new(endpoint, token))
}

fn token_resource(endpoint: &str) -> String {
    format!("{}/", endpoint.trim_end_matches('/'))
}

/// Log `err` and exit with status 1.
pub fn exit_with(err: impl std::fmt::Display) -> ! {
    tracing::error!("{err}");
    std::process::exit(1);
}

/// Print `value` to stdout as pretty JSON.
pub fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => exit_with(format!("could not serialize results: {err}")),
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
