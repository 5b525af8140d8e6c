//! Bucket records: the current schema, the legacy schema, and lookup filters.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{context::Context, error::CodedError, id::Id};

/// A bucket in the current schema.
///
/// `org` holds the owning organization's name. It is empty when the record
/// was migrated from a legacy record that carried neither organization
/// alias; resolving it is left to identity resolution outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Bucket {
    /// Bucket identifier (storage key).
    pub id: Id,
    /// Owning organization.
    #[serde(rename = "orgID", default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Id>,
    /// Owning organization name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[builder(default, into)]
    pub org: String,
    /// Bucket name, unique within the organization.
    #[builder(into)]
    pub name: String,
    /// Retention policy name, kept for v1 sources.
    #[serde(rename = "rp", default, skip_serializing_if = "String::is_empty")]
    #[builder(default, into)]
    pub retention_policy_name: String,
    /// How long data is kept. Zero means forever.
    #[serde(rename = "retentionPeriod", default, with = "duration_nanos")]
    #[builder(default)]
    pub retention_period: Duration,
}

/// A bucket as written by any earlier schema.
///
/// Carries every field that has ever existed, including the deprecated
/// `organization` alias of `org`. Current-schema records decode as this type
/// too, so conversion can safely re-read already converted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OldBucket {
    /// Bucket identifier.
    pub id: Id,
    /// Owning organization.
    #[serde(rename = "orgID", default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Id>,
    /// Deprecated alias of `org`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organization: String,
    /// Owning organization name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub org: String,
    /// Bucket name.
    #[serde(default)]
    pub name: String,
    /// Retention policy name.
    #[serde(rename = "rp", default, skip_serializing_if = "String::is_empty")]
    pub retention_policy_name: String,
    /// Retention period.
    #[serde(rename = "retentionPeriod", default, with = "duration_nanos")]
    pub retention_period: Duration,
}

/// Converts a legacy bucket to the current schema.
///
/// The organization name is `org` when set, otherwise the deprecated
/// `organization` alias, otherwise empty.
pub fn convert_old_bucket_to_new(old: OldBucket) -> Bucket {
    let org = if old.org.is_empty() { old.organization } else { old.org };
    Bucket {
        id: old.id,
        organization_id: old.organization_id,
        org,
        name: old.name,
        retention_policy_name: old.retention_policy_name,
        retention_period: old.retention_period,
    }
}

/// Locates zero or one bucket.
///
/// Unset fields match anything. A filter with every field unset matches the
/// first bucket in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketFilter {
    /// Exact bucket identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    /// Exact bucket name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owning organization identifier.
    #[serde(rename = "orgID", default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Id>,
    /// Owning organization name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
}

impl BucketFilter {
    /// Filter matching a single bucket by identifier.
    pub fn by_id(id: Id) -> Self {
        Self { id: Some(id), ..Self::default() }
    }

    /// Filter matching a bucket by name within an organization.
    pub fn by_name(organization_id: Id, name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), organization_id: Some(organization_id), ..Self::default() }
    }

    /// Filter matching a bucket by name within a named organization.
    pub fn by_org_name(org: impl Into<String>, name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), org: Some(org.into()), ..Self::default() }
    }

    /// Whether no organization scope is set.
    pub fn is_unscoped(&self) -> bool {
        self.organization_id.is_none() && self.org.is_none()
    }

    /// Whether `bucket` satisfies every set field.
    pub fn matches(&self, bucket: &Bucket) -> bool {
        self.id.is_none_or(|id| id == bucket.id)
            && self.name.as_deref().is_none_or(|name| name == bucket.name)
            && self.organization_id.is_none_or(|org_id| Some(org_id) == bucket.organization_id)
            && self.org.as_deref().is_none_or(|org| org == bucket.org)
    }
}

impl fmt::Display for BucketFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(4);
        if let Some(id) = self.id {
            parts.push(format!("Bucket ID: {id}"));
        }
        if let Some(name) = &self.name {
            parts.push(format!("Bucket Name: {name}"));
        }
        if let Some(org_id) = self.organization_id {
            parts.push(format!("Org ID: {org_id}"));
        }
        if let Some(org) = &self.org {
            parts.push(format!("Org Name: {org}"));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Resolves a [`BucketFilter`] to a single current-schema bucket.
pub trait BucketFinder: Send + Sync {
    /// Error returned by lookups. Misses must classify as `ErrorCode::NotFound`.
    type Error: CodedError + Send + Sync + 'static;

    /// Returns the first bucket matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error classified as not found when nothing matches, or any
    /// failure of the underlying lookup.
    fn find_bucket(&self, ctx: &Context, filter: &BucketFilter) -> Result<Bucket, Self::Error>;
}

/// Durations as integer nanoseconds, the layout older records were written with.
mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos = i64::try_from(duration.as_nanos()).map_err(serde::ser::Error::custom)?;
        serializer.serialize_i64(nanos)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = i64::deserialize(deserializer)?;
        let nanos = u64::try_from(nanos)
            .map_err(|_| serde::de::Error::custom("retention period must not be negative"))?;
        Ok(Duration::from_nanos(nanos))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    fn old(org: &str, organization: &str) -> OldBucket {
        OldBucket {
            id: Id::new(1),
            organization_id: Some(Id::new(0x0a)),
            organization: organization.to_string(),
            org: org.to_string(),
            name: "b1".to_string(),
            ..OldBucket::default()
        }
    }

    #[test]
    fn test_convert_keeps_org_field() {
        assert_eq!(convert_old_bucket_to_new(old("acme", "")).org, "acme");
    }

    #[test]
    fn test_convert_falls_back_to_organization_alias() {
        assert_eq!(convert_old_bucket_to_new(old("", "acme")).org, "acme");
    }

    #[test]
    fn test_convert_prefers_org_when_both_set() {
        assert_eq!(convert_old_bucket_to_new(old("acme", "legacy")).org, "acme");
    }

    #[test]
    fn test_convert_leaves_org_empty_when_neither_set() {
        assert_eq!(convert_old_bucket_to_new(old("", "")).org, "");
    }

    #[test]
    fn test_legacy_json_layout_decodes() {
        let raw = br#"{"id":"0000000000000001","organization":"acme","name":"b1","rp":"autogen","retentionPeriod":3600000000000}"#;
        let old: OldBucket = decode(raw).unwrap();
        assert_eq!(old.id, Id::new(1));
        assert_eq!(old.organization_id, None);
        assert_eq!(old.organization, "acme");
        assert_eq!(old.retention_policy_name, "autogen");
        assert_eq!(old.retention_period, Duration::from_secs(3600));
    }

    #[test]
    fn test_current_layout_has_no_organization_alias() {
        let bucket = Bucket::builder().id(Id::new(1)).org("acme").name("b1").build();
        let json = String::from_utf8(encode(&bucket).unwrap()).unwrap();
        assert_eq!(json, r#"{"id":"0000000000000001","org":"acme","name":"b1","retentionPeriod":0}"#);
    }

    #[test]
    fn test_current_record_decodes_as_legacy() {
        let bucket = Bucket::builder()
            .id(Id::new(7))
            .organization_id(Id::new(9))
            .org("acme")
            .name("telemetry")
            .retention_period(Duration::from_secs(60))
            .build();
        let old: OldBucket = decode(&encode(&bucket).unwrap()).unwrap();
        assert_eq!(convert_old_bucket_to_new(old), bucket);
    }

    #[test]
    fn test_negative_retention_is_rejected() {
        let raw = br#"{"id":"0000000000000001","name":"b1","retentionPeriod":-1}"#;
        assert!(decode::<OldBucket>(raw).is_err());
    }

    #[test]
    fn test_filter_display_lists_set_fields() {
        let filter = BucketFilter {
            id: Some(Id::new(0x10)),
            name: Some("b1".to_string()),
            organization_id: None,
            org: Some("acme".to_string()),
        };
        assert_eq!(
            filter.to_string(),
            "[Bucket ID: 0000000000000010, Bucket Name: b1, Org Name: acme]"
        );
        assert_eq!(BucketFilter::default().to_string(), "[]");
    }

    #[test]
    fn test_filter_matches() {
        let bucket = Bucket::builder()
            .id(Id::new(1))
            .organization_id(Id::new(2))
            .org("acme")
            .name("b1")
            .build();

        assert!(BucketFilter::default().matches(&bucket));
        assert!(BucketFilter::by_id(Id::new(1)).matches(&bucket));
        assert!(!BucketFilter::by_id(Id::new(3)).matches(&bucket));
        assert!(BucketFilter::by_name(Id::new(2), "b1").matches(&bucket));
        assert!(!BucketFilter::by_name(Id::new(5), "b1").matches(&bucket));
        assert!(BucketFilter::by_org_name("acme", "b1").matches(&bucket));
        assert!(!BucketFilter::by_org_name("other", "b1").matches(&bucket));
    }
}
