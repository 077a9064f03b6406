use std::path::PathBuf;

use crate::DefinitionKind;

/////////////////////////////////////////// SessionError ///////////////////////////////////////////

/// Errors that can occur while establishing an authenticated session.
#[derive(Debug)]
#[allow(missing_docs)] // variant fields are self-describing
pub enum SessionError {
    /// No session exists and interactive sign-in was not allowed.
    NotSignedIn,
    /// The session store could not be invoked or reported a failure.
    Unavailable { command: String, message: String },
    /// The session store produced output that could not be understood.
    Malformed { command: String, message: String },
    /// Interactive sign-in finished without leaving a session behind.
    SignInFailed { message: String },
    /// The operator aborted the sign-in prompt.
    Cancelled,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotSignedIn => {
                write!(f, "Not signed in to Azure\nSuggestion: Run `az login` first or drop --silent to sign in interactively")
            }
            SessionError::Unavailable { command, message } => {
                write!(f, "Could not run `{command}`: {message}\nSuggestion: Check that the Azure CLI is installed and on PATH")
            }
            SessionError::Malformed { command, message } => {
                write!(f, "Unexpected output from `{command}`: {message}")
            }
            SessionError::SignInFailed { message } => {
                write!(f, "Sign-in did not produce a session: {message}")
            }
            SessionError::Cancelled => write!(f, "Sign-in prompt cancelled"),
        }
    }
}

impl std::error::Error for SessionError {}

//////////////////////////////////////////// InputError ////////////////////////////////////////////

/// Errors detected while binding command-line arguments, before any processing happens.
#[derive(Debug)]
#[allow(missing_docs)] // variant fields are self-describing
pub enum InputError {
    /// A file or directory named on the command line does not exist.
    MissingPath { path: PathBuf },
    /// The path given as a directory is not one.
    NotADirectory { path: PathBuf },
    /// Both an explicit file list and a directory were given.
    ConflictingSelection,
    /// Neither an explicit file list nor a directory was given.
    NoSelection,
    /// The recursive flag was given without a directory.
    RecursiveWithoutDirectory,
    /// The tool takes exactly one definition file.
    ExpectedOneFile { found: usize },
    /// Both a subscription and a management group were given.
    ConflictingScope,
    /// Neither a subscription nor a management group was given.
    NoScope,
    /// The subscription id is not a well-formed GUID.
    InvalidSubscriptionId { value: String, reason: String },
    /// The management group name is blank.
    EmptyManagementGroup,
    /// The placeholder mapping could not be understood.
    InvalidPlaceholders { message: String },
    /// A directory could not be listed.
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::MissingPath { path } => {
                write!(f, "Path does not exist: {}", path.display())
            }
            InputError::NotADirectory { path } => {
                write!(f, "Not a directory: {}", path.display())
            }
            InputError::ConflictingSelection => {
                write!(f, "Definition files and --directory are mutually exclusive\nSuggestion: Pass either a list of files or a directory, not both")
            }
            InputError::NoSelection => {
                write!(f, "No definitions to deploy\nSuggestion: Pass one or more definition files or --directory")
            }
            InputError::RecursiveWithoutDirectory => {
                write!(f, "--recursive only applies together with --directory")
            }
            InputError::ExpectedOneFile { found } => {
                write!(f, "Expected exactly one definition file, got {found}")
            }
            InputError::ConflictingScope => {
                write!(f, "--subscription-id and --management-group are mutually exclusive\nSuggestion: Deploy to one scope per run")
            }
            InputError::NoScope => {
                write!(f, "No deployment scope\nSuggestion: Pass --subscription-id or --management-group")
            }
            InputError::InvalidSubscriptionId { value, reason } => {
                write!(f, "Invalid subscription id '{value}': {reason}\nSuggestion: Subscription ids are GUIDs such as 00000000-0000-0000-0000-000000000000")
            }
            InputError::EmptyManagementGroup => {
                write!(f, "Management group name must not be empty")
            }
            InputError::InvalidPlaceholders { message } => {
                write!(f, "Invalid placeholders: {message}\nSuggestion: Pass a JSON object of strings, e.g. '{{\"locId\": \"/providers/...\"}}'")
            }
            InputError::ReadDirectory { path, source } => {
                write!(f, "Could not list {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InputError::ReadDirectory { source, .. } => Some(source),
            _ => None,
        }
    }
}

////////////////////////////////////////// DefinitionError /////////////////////////////////////////

/// Errors that make a definition file unusable.
#[derive(Debug)]
#[allow(missing_docs)] // variant fields are self-describing
pub enum DefinitionError {
    /// The file could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not well-formed JSON.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The file is neither a policy definition nor a policy set definition.
    Unrecognized { path: PathBuf },
    /// The file holds a different kind of definition than the tool deploys.
    WrongKind {
        path: PathBuf,
        expected: DefinitionKind,
        found: DefinitionKind,
    },
    /// The file has the right shape but a required field is missing or mistyped.
    Invalid { path: PathBuf, message: String },
}

impl DefinitionError {
    /// The file the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            DefinitionError::Read { path, .. }
            | DefinitionError::Parse { path, .. }
            | DefinitionError::Unrecognized { path }
            | DefinitionError::WrongKind { path, .. }
            | DefinitionError::Invalid { path, .. } => path,
        }
    }
}

impl std::fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefinitionError::Read { path, source } => {
                write!(f, "Could not read {}: {source}", path.display())
            }
            DefinitionError::Parse { path, source } => {
                write!(f, "{} is not valid JSON: {source}", path.display())
            }
            DefinitionError::Unrecognized { path } => {
                write!(f, "{} has neither properties.policyRule nor properties.policyDefinitions", path.display())
            }
            DefinitionError::WrongKind {
                path,
                expected,
                found,
            } => {
                write!(
                    f,
                    "{} contains a {found}, expected a {expected}",
                    path.display()
                )
            }
            DefinitionError::Invalid { path, message } => {
                write!(f, "{} is not a valid definition: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for DefinitionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DefinitionError::Read { source, .. } => Some(source),
            DefinitionError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

//////////////////////////////////////////// DeployError ///////////////////////////////////////////

/// Errors returned while creating or updating a definition.
#[derive(Debug)]
#[allow(missing_docs)] // variant fields are self-describing
pub enum DeployError {
    /// The request never got a response.
    Transport {
        resource_id: String,
        source: reqwest::Error,
    },
    /// Azure Resource Manager rejected the request.
    Api {
        resource_id: String,
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// Azure Resource Manager accepted the request but the response body was not JSON.
    InvalidResponse { resource_id: String, message: String },
}

impl std::fmt::Display for DeployError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployError::Transport {
                resource_id,
                source,
            } => write!(f, "Request for {resource_id} failed: {source}"),
            DeployError::Api {
                resource_id,
                status,
                code: Some(code),
                message,
            } => write!(f, "{resource_id} rejected with HTTP {status} ({code}): {message}"),
            DeployError::Api {
                resource_id,
                status,
                code: None,
                message,
            } => write!(f, "{resource_id} rejected with HTTP {status}: {message}"),
            DeployError::InvalidResponse {
                resource_id,
                message,
            } => write!(f, "Unreadable response for {resource_id}: {message}"),
        }
    }
}

impl std::error::Error for DeployError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeployError::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

/////////////////////////////////////////////// Error //////////////////////////////////////////////

/// Any error that ends a run.
#[derive(Debug)]
pub enum Error {
    /// Authentication failed.
    Session(SessionError),
    /// Command-line arguments were unusable.
    Input(InputError),
    /// A definition file was unusable.
    Definition(DefinitionError),
    /// A deployment call failed.
    Deploy(DeployError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Session(err) => write!(f, "Authentication error: {err}"),
            Error::Input(err) => write!(f, "Input error: {err}"),
            Error::Definition(err) => write!(f, "Definition error: {err}"),
            Error::Deploy(err) => write!(f, "Deployment error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Session(err) => Some(err),
            Error::Input(err) => Some(err),
            Error::Definition(err) => Some(err),
            Error::Deploy(err) => Some(err),
        }
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl From<InputError> for Error {
    fn from(err: InputError) -> Self {
        Self::Input(err)
    }
}

impl From<DefinitionError> for Error {
    fn from(err: DefinitionError) -> Self {
        Self::Definition(err)
    }
}

impl From<DeployError> for Error {
    fn from(err: DeployError) -> Self {
        Self::Deploy(err)
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
