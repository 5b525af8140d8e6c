//! Permission model.
//!
//! A [`Permission`] pairs an [`Action`] with a [`Resource`]. A resource is a
//! type from a closed set, optionally narrowed to one organization and/or
//! one resource id. Unset narrowing fields in a *granted* permission act as
//! wildcards; see [`Permission::matches`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::{
    error::{CodedError, ErrorCode},
    id::Id,
};

/// Errors produced when constructing or parsing a permission.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum PermissionError {
    /// The resource id is zero.
    #[snafu(display("invalid resource id for permission"))]
    InvalidResourceId,

    /// The organization id is zero.
    #[snafu(display("invalid organization id for permission"))]
    InvalidOrgId,

    /// The action name is not `read` or `write`.
    #[snafu(display("unknown action {action:?}"))]
    UnknownAction {
        /// The rejected action text.
        action: String,
    },

    /// The resource type is not in the closed set.
    #[snafu(display("unknown resource type {resource_type:?}"))]
    UnknownResourceType {
        /// The rejected resource type text.
        resource_type: String,
    },
}

impl CodedError for PermissionError {
    fn code(&self) -> ErrorCode {
        ErrorCode::Invalid
    }
}

/// What a permission allows doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read access.
    Read,
    /// Write access.
    Write,
}

impl Action {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(PermissionError::UnknownAction { action: other.to_string() }),
        }
    }
}

macro_rules! resource_types {
    ($($variant:ident => $wire:literal),+ $(,)?) => {
        /// Kind of resource a permission applies to.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ResourceType {
            $(
                #[doc = concat!("`", $wire, "`")]
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl ResourceType {
            /// Every resource type, in declaration order.
            pub const ALL: &'static [ResourceType] = &[$(ResourceType::$variant),+];

            /// Wire name.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl FromStr for ResourceType {
            type Err = PermissionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(PermissionError::UnknownResourceType {
                        resource_type: other.to_string(),
                    }),
                }
            }
        }
    };
}

resource_types! {
    Authorizations => "authorizations",
    Buckets => "buckets",
    Dashboards => "dashboards",
    Orgs => "orgs",
    Sources => "sources",
    Tasks => "tasks",
    Telegrafs => "telegrafs",
    Users => "users",
    Variables => "variables",
    Scrapers => "scrapers",
    Secrets => "secrets",
    Labels => "labels",
    Views => "views",
    Documents => "documents",
    NotificationRules => "notificationRules",
    NotificationEndpoints => "notificationEndpoints",
    Checks => "checks",
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The target of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Specific resource, or every resource of the type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    /// Owning organization, or every organization.
    #[serde(rename = "orgID", default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<Id>,
}

impl fmt::Display for Resource {
    /// `orgs/<org>/<type>/<id>`, omitting the unset parts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(org_id) = self.org_id {
            write!(f, "orgs/{org_id}/")?;
        }
        write!(f, "{}", self.resource_type)?;
        if let Some(id) = self.id {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}

/// An action on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Allowed action.
    pub action: Action,
    /// Target resource.
    pub resource: Resource,
}

impl Permission {
    /// Permission on every resource of a type in every organization.
    pub const fn new(action: Action, resource_type: ResourceType) -> Self {
        Self { action, resource: Resource { resource_type, id: None, org_id: None } }
    }

    /// Permission on every resource of a type within one organization.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::InvalidOrgId`] if `org_id` is zero.
    pub fn new_at_org(
        action: Action,
        resource_type: ResourceType,
        org_id: Id,
    ) -> Result<Self, PermissionError> {
        if !org_id.is_valid() {
            return Err(PermissionError::InvalidOrgId);
        }
        Ok(Self { action, resource: Resource { resource_type, id: None, org_id: Some(org_id) } })
    }

    /// Permission on one specific resource.
    ///
    /// An unset organization leaves the permission unscoped by organization.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::InvalidResourceId`] if `id` is zero and
    /// [`PermissionError::InvalidOrgId`] if `org_id` is set to zero.
    pub fn new_at_id(
        id: Id,
        action: Action,
        resource_type: ResourceType,
        org_id: Option<Id>,
    ) -> Result<Self, PermissionError> {
        if !id.is_valid() {
            return Err(PermissionError::InvalidResourceId);
        }
        if org_id.is_some_and(|org_id| !org_id.is_valid()) {
            return Err(PermissionError::InvalidOrgId);
        }
        Ok(Self { action, resource: Resource { resource_type, id: Some(id), org_id } })
    }

    /// Whether this (granted) permission covers `requested`.
    ///
    /// Action and type must be equal, and each of the grant's organization
    /// and id must be either unset or equal to the requested one.
    pub fn matches(&self, requested: &Permission) -> bool {
        if self.action != requested.action
            || self.resource.resource_type != requested.resource.resource_type
        {
            return false;
        }

        let org_matches =
            self.resource.org_id.is_none_or(|org_id| requested.resource.org_id == Some(org_id));
        let id_matches = self.resource.id.is_none_or(|id| requested.resource.id == Some(id));
        org_matches && id_matches
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.resource)
    }
}
