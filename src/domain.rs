//! Identity domain model.

/// Capabilities the core needs from an authenticated subject.
///
/// The authenticator and the token issuer only go through this trait, so
/// they can be exercised against lightweight fakes without a store.
pub trait Identity {
    fn id(&self) -> &str;
    fn username(&self) -> &str;
    fn password_hash(&self) -> &str;
    fn is_active(&self) -> bool;
}

/// A stored user record.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
    /// Salted hash of the latest refresh token, `None` until the first login.
    pub refresh_token_hash: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password_hash: password_hash.into(),
            is_active: true,
            refresh_token_hash: None,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

// Hashes stay out of logs.
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("is_active", &self.is_active)
            .field("has_refresh_token", &self.refresh_token_hash.is_some())
            .finish()
    }
}

impl Identity for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn password_hash(&self) -> &str {
        &self.password_hash
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Partial update of a user record.
///
/// Only the refresh-token hash is writable through the core; every other
/// column is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateUser {
    /// `Some(val)` = set, `None` = no change.
    pub refresh_token_hash: Option<String>,
    /// Compare-and-swap guard on the stored refresh-token hash.
    /// `None` = unconditional, `Some(expected)` = apply only while the stored
    /// value still equals `expected` (`Some(None)` = no hash stored yet).
    pub expected_refresh_token_hash: Option<Option<String>>,
}

impl UpdateUser {
    pub fn set_refresh_token_hash(hash: String) -> Self {
        Self {
            refresh_token_hash: Some(hash),
            expected_refresh_token_hash: None,
        }
    }

    pub fn expecting(mut self, current: Option<String>) -> Self {
        self.expected_refresh_token_hash = Some(current);
        self
    }

    /// Whether the guard admits a record currently holding `stored`.
    pub fn precondition_holds(&self, stored: Option<&str>) -> bool {
        match &self.expected_refresh_token_hash {
            None => true,
            Some(expected) => expected.as_deref() == stored,
        }
    }
}
