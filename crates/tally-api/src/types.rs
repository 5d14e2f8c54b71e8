//! Core wire types for the Tally API.
//!
//! These are the structures exchanged with the budget API server, plus
//! the small identity/time newtypes the rest of the workspace keys on.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-field validation messages, keyed by field name.
///
/// `BTreeMap` keeps the fields sorted so messages render in a stable order.
pub type FieldErrors = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Identity and time
// ---------------------------------------------------------------------------

/// A unique identifier for a user account (the server's user primary key).
///
/// Newtype wrapper so a principal ID can never be confused with any other
/// integer. Serializes as the bare number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PrincipalId(pub u64);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// An absolute point in time: milliseconds since the Unix epoch.
///
/// Token expiry has to survive a restart (it is persisted with the
/// credential), so it can't be a monotonic `Instant`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns milliseconds since the Unix epoch.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns this timestamp moved forward by `duration`, saturating.
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// The identified user behind an authenticated session.
///
/// Deserializes straight from the server's user payload; fields the
/// client doesn't use (profile, timestamps) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// ISO 4217 code amounts are displayed in.
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_currency() -> String {
    "BRL".to_string()
}

fn default_timezone() -> String {
    "America/Sao_Paulo".to_string()
}

impl Principal {
    /// Creates a principal with only the ID and email set.
    pub fn new(id: PrincipalId, email: impl Into<String>) -> Self {
        Self {
            id,
            username: String::new(),
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            currency: default_currency(),
            timezone: default_timezone(),
        }
    }

    /// First and last name joined, falling back to the email.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Login form contents. The server uses the email as the username.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Hand-written so passwords never end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registration form contents.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirm: String,
}

impl Registration {
    /// Checks the form before it is sent.
    ///
    /// # Errors
    /// Returns the offending fields: empty required fields, and a
    /// `password_confirm` entry when the two passwords differ.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        let required = [
            ("username", &self.username),
            ("email", &self.email),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("password", &self.password),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.insert(field.to_string(), "This field is required.".to_string());
            }
        }
        if !self.email.is_empty() && !self.email.contains('@') {
            errors.insert("email".to_string(), "Enter a valid email address.".to_string());
        }
        if self.password != self.password_confirm {
            errors.insert(
                "password_confirm".to_string(),
                "Passwords do not match.".to_string(),
            );
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// What a successful login or registration hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// Short-lived bearer token for resource requests.
    pub access: String,
    /// Long-lived token used only to obtain new access tokens.
    pub refresh: String,
    /// When the access token stops being accepted. `None` when the server
    /// doesn't say; the session store then applies its configured lifetime.
    pub expires_at: Option<Timestamp>,
    pub principal: Principal,
}

/// What a successful token refresh hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub access: String,
    /// Present when the server rotates refresh tokens.
    pub refresh: Option<String>,
    pub expires_at: Option<Timestamp>,
}
