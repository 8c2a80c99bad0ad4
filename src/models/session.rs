//! Session context for the signed-in user.
//!
//! The backend authorizes editor-only endpoints by the `X-User-Role` header,
//! so the session carries the role alongside the username. Login is a plain
//! credential match against a configured account table.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Role assumed when nobody is signed in.
pub const ANONYMOUS_ROLE: &str = "user";

/// Role allowed to list reviews and decide them.
pub const EDITOR_ROLE: &str = "editor";

/// A known account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
    pub role: String,
}

impl Account {
    fn new(username: &str, password: &str, role: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            role: role.to_string(),
        }
    }
}

/// The built-in account table.
pub fn default_accounts() -> Vec<Account> {
    vec![
        Account::new("editor", "admin123", EDITOR_ROLE),
        Account::new("editor2", "admin123", EDITOR_ROLE),
        Account::new("user", "user123", ANONYMOUS_ROLE),
    ]
}

/// Who is signed in, and with which role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    username: Option<String>,
    role: String,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl SessionContext {
    /// A signed-out session.
    pub fn anonymous() -> Self {
        Self {
            username: None,
            role: ANONYMOUS_ROLE.to_string(),
        }
    }

    /// Sign in by matching `username`/`password` against `accounts`.
    pub fn login(username: &str, password: &str, accounts: &[Account]) -> Result<Self, AppError> {
        let account = accounts
            .iter()
            .find(|a| a.username == username && a.password == password)
            .ok_or_else(|| AppError::authentication("Invalid username or password"))?;

        log::info!("[session] {} signed in as {}", account.username, account.role);

        Ok(Self {
            username: Some(account.username.clone()),
            role: account.role.clone(),
        })
    }

    /// Sign out, resetting to the anonymous role.
    pub fn logout(&mut self) {
        if let Some(username) = self.username.take() {
            log::info!("[session] {} signed out", username);
        }
        self.role = ANONYMOUS_ROLE.to_string();
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    pub fn is_editor(&self) -> bool {
        self.role == EDITOR_ROLE
    }
}
