//! Request-bound identities that answer permission checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{id::Id, permission::Permission};

/// What kind of identity an [`Authorizer`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizerKind {
    /// API token.
    Authorization,
    /// Interactive user session.
    Session,
}

/// The identity making a request.
///
/// Implementations are resolved per request and answer only membership
/// questions; they never mutate state.
pub trait Authorizer: Send + Sync {
    /// Whether `permission` is granted.
    fn allowed(&self, permission: &Permission) -> bool;

    /// Identifier of the authorizer itself.
    fn identifier(&self) -> Id;

    /// User the authorizer acts for.
    fn user_id(&self) -> Id;

    /// Kind of authorizer.
    fn kind(&self) -> AuthorizerKind;
}

/// Whether any permission in `granted` matches `requested`.
pub fn permission_allowed(requested: &Permission, granted: &[Permission]) -> bool {
    granted.iter().any(|p| p.matches(requested))
}

/// Token status. Inactive tokens grant nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    /// Token is usable.
    #[default]
    Active,
    /// Token has been disabled.
    Inactive,
}

/// An API token with a fixed permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Authorization {
    /// Token identifier.
    pub id: Id,
    /// Owning organization.
    #[serde(rename = "orgID")]
    pub org_id: Id,
    /// User the token was issued to.
    #[serde(rename = "userID")]
    pub user_id: Id,
    /// Token status.
    #[serde(default)]
    #[builder(default)]
    pub status: AuthorizationStatus,
    /// Granted permissions.
    #[serde(default)]
    #[builder(default)]
    pub permissions: Vec<Permission>,
}

impl Authorization {
    /// Whether the token is usable.
    pub fn is_active(&self) -> bool {
        self.status == AuthorizationStatus::Active
    }
}

impl Authorizer for Authorization {
    fn allowed(&self, permission: &Permission) -> bool {
        self.is_active() && permission_allowed(permission, &self.permissions)
    }

    fn identifier(&self) -> Id {
        self.id
    }

    fn user_id(&self) -> Id {
        self.user_id
    }

    fn kind(&self) -> AuthorizerKind {
        AuthorizerKind::Authorization
    }
}

/// An interactive user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Session {
    /// Session identifier.
    pub id: Id,
    /// Logged-in user.
    #[serde(rename = "userID")]
    pub user_id: Id,
    /// When the session was created.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// When the session stops granting anything.
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    /// Permissions derived from the user's memberships.
    #[serde(default)]
    #[builder(default)]
    pub permissions: Vec<Permission>,
}

impl Session {
    /// Whether the session had expired at `now`.
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the session has expired.
    pub fn expired(&self) -> bool {
        self.expired_at(Utc::now())
    }
}

impl Authorizer for Session {
    fn allowed(&self, permission: &Permission) -> bool {
        !self.expired() && permission_allowed(permission, &self.permissions)
    }

    fn identifier(&self) -> Id {
        self.id
    }

    fn user_id(&self) -> Id {
        self.user_id
    }

    fn kind(&self) -> AuthorizerKind {
        AuthorizerKind::Session
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::permission::{Action, ResourceType};

    fn bucket_read() -> Permission {
        Permission::new_at_id(Id::new(0x10), Action::Read, ResourceType::Buckets, Some(Id::new(1)))
            .unwrap()
    }

    fn token(status: AuthorizationStatus) -> Authorization {
        Authorization::builder()
            .id(Id::new(100))
            .org_id(Id::new(1))
            .user_id(Id::new(200))
            .status(status)
            .permissions(vec![Permission::new(Action::Read, ResourceType::Buckets)])
            .build()
    }

    #[test]
    fn test_active_token_grants_matching_permissions() {
        let auth = token(AuthorizationStatus::Active);
        assert!(auth.allowed(&bucket_read()));
        assert_eq!(auth.kind(), AuthorizerKind::Authorization);
        assert_eq!(auth.user_id(), Id::new(200));
    }

    #[test]
    fn test_inactive_token_grants_nothing() {
        assert!(!token(AuthorizationStatus::Inactive).allowed(&bucket_read()));
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = Session::builder()
            .id(Id::new(300))
            .user_id(Id::new(200))
            .created_at(now - Duration::hours(1))
            .expires_at(now + Duration::hours(1))
            .permissions(vec![bucket_read()])
            .build();

        assert!(session.allowed(&bucket_read()));
        assert!(!session.expired_at(now));
        assert!(session.expired_at(now + Duration::hours(2)));

        let expired = Session { expires_at: now - Duration::seconds(1), ..session };
        assert!(!expired.allowed(&bucket_read()));
    }

    #[test]
    fn test_permission_allowed_over_empty_set() {
        assert!(!permission_allowed(&bucket_read(), &[]));
    }
}
