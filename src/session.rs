//! Authenticated sessions.
//!
//! The tools never hold credentials of their own.  They rely on the session the Azure CLI keeps
//! in its own store, and the [`Session`] captured here is only used to tell the operator who the
//! run acts as.

use std::process::{Command, Output, Stdio};

use rustyline::error::ReadlineError;
use rustyline::{Cmd, Config, DefaultEditor, KeyCode, KeyEvent, Modifiers};

use crate::SessionError;

///////////////////////////////////////////// Session //////////////////////////////////////////////

/// The identity a run operates as.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Session {
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Id of the default subscription.
    pub subscription_id: String,
    /// Name of the default subscription.
    pub subscription_name: String,
    /// The signed-in user or service principal.
    pub account: String,
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tenant {}, subscription {} ({}), account {}",
            self.tenant_id, self.subscription_name, self.subscription_id, self.account
        )
    }
}

/////////////////////////////////////////// AccessToken ////////////////////////////////////////////

/// A bearer token for Azure Resource Manager.
#[derive(Clone, Eq, PartialEq)]
pub struct AccessToken {
    secret: String,
    expires_on: Option<String>,
}

impl AccessToken {
    /// Wrap a raw bearer token.
    pub fn new(secret: impl Into<String>, expires_on: Option<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_on,
        }
    }

    /// The raw token.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// When the token expires, as reported by the session store.
    pub fn expires_on(&self) -> Option<&str> {
        self.expires_on.as_deref()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

////////////////////////////////////////// SessionProvider /////////////////////////////////////////

/// A store of authenticated sessions.
pub trait SessionProvider {
    /// The current session, or `None` when nobody is signed in.
    fn current(&self) -> Result<Option<Session>, SessionError>;
    /// Sign in interactively.
    fn sign_in(&self) -> Result<(), SessionError>;
    /// Discard the current session.
    fn sign_out(&self) -> Result<(), SessionError>;
    /// A bearer token for `resource` from the current session.
    fn access_token(&self, resource: &str) -> Result<AccessToken, SessionError>;
}

///////////////////////////////////////////// AzureCli /////////////////////////////////////////////

/// A [`SessionProvider`] backed by the `az` command-line tool.
#[derive(Clone, Debug)]
pub struct AzureCli {
    program: String,
}

impl AzureCli {
    /// Use `program` instead of `az`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn output(&self, args: &[&str]) -> Result<Output, SessionError> {
        tracing::debug!(command = %self.describe(args), "running");
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| SessionError::Unavailable {
                command: self.describe(args),
                message: err.to_string(),
            })
    }

    // Interactive commands share the terminal; stdout is discarded so results stay clean.
    fn interactive(&self, args: &[&str]) -> Result<(), SessionError> {
        tracing::debug!(command = %self.describe(args), "running");
        let status = Command::new(&self.program)
            .args(args)
            .stdout(Stdio::null())
            .status()
            .map_err(|err| SessionError::Unavailable {
                command: self.describe(args),
                message: err.to_string(),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(SessionError::Unavailable {
                command: self.describe(args),
                message: format!("exited with {status}"),
            })
        }
    }
}

impl Default for AzureCli {
    fn default() -> Self {
        Self::new("az")
    }
}

impl SessionProvider for AzureCli {
    fn current(&self) -> Result<Option<Session>, SessionError> {
        let args = ["account", "show", "--output", "json"];
        let output = self.output(&args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_signed_out(&stderr) {
                return Ok(None);
            }
            return Err(SessionError::Unavailable {
                command: self.describe(&args),
                message: stderr.trim().to_string(),
            });
        }
        parse_account(&output.stdout)
            .map(Some)
            .map_err(|message| SessionError::Malformed {
                command: self.describe(&args),
                message,
            })
    }

    fn sign_in(&self) -> Result<(), SessionError> {
        self.interactive(&["login"])
    }

    fn sign_out(&self) -> Result<(), SessionError> {
        self.interactive(&["logout"])
    }

    fn access_token(&self, resource: &str) -> Result<AccessToken, SessionError> {
        let args = [
            "account",
            "get-access-token",
            "--resource",
            resource,
            "--output",
            "json",
        ];
        let output = self.output(&args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_signed_out(&stderr) {
                return Err(SessionError::NotSignedIn);
            }
            return Err(SessionError::Unavailable {
                command: self.describe(&args),
                message: stderr.trim().to_string(),
            });
        }
        parse_access_token(&output.stdout).map_err(|message| SessionError::Malformed {
            command: self.describe(&args),
            message,
        })
    }
}

fn is_signed_out(stderr: &str) -> bool {
    stderr.contains("az login") || stderr.contains("not logged in")
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountShow {
    id: String,
    name: String,
    tenant_id: String,
    user: AccountUser,
}

#[derive(serde::Deserialize)]
struct AccountUser {
    name: String,
}

fn parse_account(stdout: &[u8]) -> Result<Session, String> {
    let account: AccountShow = serde_json::from_slice(stdout).map_err(|err| err.to_string())?;
    Ok(Session {
        tenant_id: account.tenant_id,
        subscription_id: account.id,
        subscription_name: account.name,
        account: account.user.name,
    })
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetAccessToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
}

fn parse_access_token(stdout: &[u8]) -> Result<AccessToken, String> {
    let token: GetAccessToken = serde_json::from_slice(stdout).map_err(|err| err.to_string())?;
    if token.access_token.is_empty() {
        return Err("empty accessToken".to_string());
    }
    Ok(AccessToken::new(token.access_token, token.expires_on))
}

////////////////////////////////////////////// Prompt //////////////////////////////////////////////

/// The operator's answer when a session already exists.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PromptChoice {
    /// Keep using the existing session.
    Continue,
    /// Sign out and sign in again.
    SignInAgain,
}

/// Asks the operator whether to keep the existing session.
pub trait Prompt {
    /// Show `session` and ask what to do.
    fn confirm(&mut self, session: &Session) -> Result<PromptChoice, SessionError>;
}

/// A [`Prompt`] on the controlling terminal: Enter continues, Escape signs in again.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn confirm(&mut self, session: &Session) -> Result<PromptChoice, SessionError> {
        let terminal_error = |err: ReadlineError| SessionError::Unavailable {
            command: "terminal prompt".to_string(),
            message: err.to_string(),
        };
        eprintln!("Signed in to Azure:");
        eprintln!("  Tenant:       {}", session.tenant_id);
        eprintln!(
            "  Subscription: {} ({})",
            session.subscription_name, session.subscription_id
        );
        eprintln!("  Account:      {}", session.account);
        let config = Config::builder().keyseq_timeout(Some(50)).build();
        let mut editor = DefaultEditor::with_config(config).map_err(terminal_error)?;
        // Escape on its own interrupts the line, which is how it requests a fresh sign-in.
        editor.bind_sequence(KeyEvent(KeyCode::Esc, Modifiers::NONE), Cmd::Interrupt);
        loop {
            match editor.readline("Press Enter to continue, or Esc to sign in again: ") {
                Ok(line) => match line.trim() {
                    "" => return Ok(PromptChoice::Continue),
                    "login" => return Ok(PromptChoice::SignInAgain),
                    other => eprintln!("unrecognized response {other:?}"),
                },
                Err(ReadlineError::Interrupted) => return Ok(PromptChoice::SignInAgain),
                Err(ReadlineError::Eof) => return Err(SessionError::Cancelled),
                Err(err) => return Err(terminal_error(err)),
            }
        }
    }
}

/////////////////////////////////////////// ensure_session /////////////////////////////////////////

/// Whether the guard may interact with the operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignInMode {
    /// Never prompt; fail when no session exists.
    Silent,
    /// Prompt about an existing session, or sign in when there is none.
    Interactive,
}

impl SignInMode {
    /// `Silent` when `silent` is set.
    pub fn from_flag(silent: bool) -> Self {
        if silent {
            SignInMode::Silent
        } else {
            SignInMode::Interactive
        }
    }
}

/// Make sure an authenticated session exists and return it.
pub fn ensure_session<S: SessionProvider, P: Prompt>(
    provider: &S,
    mode: SignInMode,
    prompt: &mut P,
) -> Result<Session, SessionError> {
    let current = provider.current()?;
    match (mode, current) {
        (SignInMode::Silent, Some(session)) => Ok(session),
        (SignInMode::Silent, None) => Err(SessionError::NotSignedIn),
        (SignInMode::Interactive, Some(session)) => match prompt.confirm(&session)? {
            PromptChoice::Continue => Ok(session),
            PromptChoice::SignInAgain => {
                tracing::info!(account = %session.account, "signing out");
                provider.sign_out()?;
                sign_in(provider)
            }
        },
        (SignInMode::Interactive, None) => sign_in(provider),
    }
}

fn sign_in<S: SessionProvider>(provider: &S) -> Result<Session, SessionError> {
    tracing::info!("no usable session, signing in");
    provider.sign_in()?;
    provider
        .current()?
        .ok_or_else(|| SessionError::SignInFailed {
            message: "no account selected after sign-in".to_string(),
        })
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
