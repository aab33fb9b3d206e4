//! Subject key generation.

use std::fmt;
use std::net::IpAddr;

/// The kind of subject a quota is tracked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    /// Remote client address
    Ip,
    /// Authenticated user id
    User,
    /// API key presented by the caller
    ApiKey,
}

impl SubjectKind {
    fn prefix(&self) -> &'static str {
        match self {
            SubjectKind::Ip => "ip",
            SubjectKind::User => "user",
            SubjectKind::ApiKey => "key",
        }
    }
}

/// A key that uniquely identifies a rate limited subject.
///
/// The kind is part of the key, so a user id that happens to equal an
/// API key never shares a bucket with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectKey {
    /// The kind of subject
    pub kind: SubjectKind,
    /// The raw identifier
    pub id: String,
}

impl SubjectKey {
    /// Create a subject key from its parts.
    pub fn new(kind: SubjectKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Key for a client IP address.
    pub fn ip(addr: IpAddr) -> Self {
        Self::new(SubjectKind::Ip, addr.to_string())
    }

    /// Key for an authenticated user.
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(SubjectKind::User, id)
    }

    /// Key for an API key.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::new(SubjectKind::ApiKey, key)
    }

    /// Convert the subject key to the token used by the bucket store.
    pub fn to_token(&self) -> String {
        format!("{}:{}", self.kind.prefix(), self.id)
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_token())
    }
}
