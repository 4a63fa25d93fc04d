use std::fmt;

/// A principal record as read from the `Principals` table.
/// `principal_id` is `<kind>:<tenant>:<local-id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: String,
    pub display_name: String,
    pub email: Option<String>,
}

impl Principal {
    pub fn new(principal_id: &str, display_name: &str, email: Option<&str>) -> Self {
        Self {
            principal_id: principal_id.to_string(),
            display_name: display_name.to_string(),
            email: email.map(str::to_string),
        }
    }

    pub fn kind(&self) -> PrincipalKind {
        PrincipalKind::of(&self.principal_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    User,
    Group,
    Other,
}

impl PrincipalKind {
    pub fn of(principal_id: &str) -> Self {
        if principal_id.starts_with("u:") {
            Self::User
        } else if principal_id.starts_with("g:") {
            Self::Group
        } else {
            Self::Other
        }
    }
}

/// One identity claiming an email address, kept in scan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimant {
    pub id: String,
    pub display_name: String,
}

/// A single row of `invalid-users.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub principal_id: String,
    pub display_name: String,
    pub email: String,
    pub message: Violation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    MissingEmail,
    InvalidEmail,
    DuplicateEmail,
}

impl Violation {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingEmail => "missing email address",
            Self::InvalidEmail => "invalid email address",
            Self::DuplicateEmail => "duplicate email addresses detected",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A row destined for the `PrincipalsByEmail` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMapping {
    pub email: String,
    pub principal_id: String,
}
