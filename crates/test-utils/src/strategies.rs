//! Proptest strategies for Tessera domain types.
//!
//! Generators produce well-formed records while exploring the field
//! combinations that matter for migration: which organization aliases a
//! legacy record carries, and whether optional fields are present at all.
//!
//! # Usage
//!
//! ```no_run
//! use tessera_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(old in strategies::arb_old_bucket()) {
//!         // test invariant with a randomly generated legacy bucket
//!     }
//! }
//! ```

use std::time::Duration;

use proptest::prelude::*;
use tessera_types::{Action, Bucket, BucketFilter, Id, OldBucket, Permission, ResourceType};

/// Generates a valid (non-zero) identifier.
pub fn arb_id() -> impl Strategy<Value = Id> {
    (1u64..=u64::MAX).prop_map(Id::new)
}

/// Generates a resource name of 1-24 characters matching `[a-z][a-z0-9_-]{0,23}`.
pub fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,23}"
}

/// Generates either an empty string or a name.
pub fn arb_optional_name() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), arb_name()]
}

/// Generates a retention period between zero (forever) and 30 days, whole seconds.
pub fn arb_retention_period() -> impl Strategy<Value = Duration> {
    (0u64..=30 * 24 * 3600).prop_map(Duration::from_secs)
}

/// Generates a legacy bucket with every field combination.
///
/// `org` and `organization` are independently empty or set.
pub fn arb_old_bucket() -> impl Strategy<Value = OldBucket> {
    (
        arb_id(),
        proptest::option::of(arb_id()),
        arb_optional_name(),
        arb_optional_name(),
        arb_name(),
        arb_optional_name(),
        arb_retention_period(),
    )
        .prop_map(
            |(id, organization_id, organization, org, name, retention_policy_name, period)| {
                OldBucket {
                    id,
                    organization_id,
                    organization,
                    org,
                    name,
                    retention_policy_name,
                    retention_period: period,
                }
            },
        )
}

/// Generates a legacy bucket whose organization fields are fixed.
///
/// Useful for exercising one branch of the conversion rule at a time.
pub fn arb_old_bucket_with_orgs(
    org: &'static str,
    organization: &'static str,
) -> impl Strategy<Value = OldBucket> {
    arb_old_bucket().prop_map(move |mut bucket| {
        bucket.org = org.to_string();
        bucket.organization = organization.to_string();
        bucket
    })
}

/// Generates a list of legacy buckets with distinct identifiers.
pub fn arb_old_buckets(max: usize) -> impl Strategy<Value = Vec<OldBucket>> {
    proptest::collection::btree_map(arb_id(), arb_old_bucket(), 0..=max).prop_map(|buckets| {
        buckets
            .into_iter()
            .map(|(id, mut bucket)| {
                bucket.id = id;
                bucket
            })
            .collect()
    })
}

/// Generates a current-schema bucket.
pub fn arb_bucket() -> impl Strategy<Value = Bucket> {
    (
        arb_id(),
        proptest::option::of(arb_id()),
        arb_optional_name(),
        arb_name(),
        arb_optional_name(),
        arb_retention_period(),
    )
        .prop_map(|(id, organization_id, org, name, rp, period)| Bucket {
            id,
            organization_id,
            org,
            name,
            retention_policy_name: rp,
            retention_period: period,
        })
}

/// Generates a filter with any subset of fields set.
pub fn arb_bucket_filter() -> impl Strategy<Value = BucketFilter> {
    (
        proptest::option::of(arb_id()),
        proptest::option::of(arb_name()),
        proptest::option::of(arb_id()),
        proptest::option::of(arb_name()),
    )
        .prop_map(|(id, name, organization_id, org)| BucketFilter {
            id,
            name,
            organization_id,
            org,
        })
}

/// Generates an action.
pub fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Read), Just(Action::Write)]
}

/// Generates a resource type from the closed set.
pub fn arb_resource_type() -> impl Strategy<Value = ResourceType> {
    proptest::sample::select(ResourceType::ALL.to_vec())
}

/// Generates a permission at type, organization or resource scope.
pub fn arb_permission() -> impl Strategy<Value = Permission> {
    (
        arb_action(),
        arb_resource_type(),
        proptest::option::of(arb_id()),
        proptest::option::of(arb_id()),
    )
        .prop_map(|(action, resource_type, id, org_id)| {
            let mut permission = Permission::new(action, resource_type);
            permission.resource.id = id;
            permission.resource.org_id = org_id;
            permission
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    proptest! {
        #[test]
        fn test_arb_id_is_valid(id in arb_id()) {
            prop_assert!(id.is_valid());
        }

        #[test]
        fn test_arb_old_buckets_have_distinct_ids(buckets in arb_old_buckets(16)) {
            let ids: BTreeSet<_> = buckets.iter().map(|b| b.id).collect();
            prop_assert_eq!(ids.len(), buckets.len());
        }

        #[test]
        fn test_arb_old_bucket_with_orgs_pins_fields(bucket in arb_old_bucket_with_orgs("", "acme")) {
            prop_assert!(bucket.org.is_empty());
            prop_assert_eq!(bucket.organization.as_str(), "acme");
        }

        #[test]
        fn test_arb_name_is_nonempty(name in arb_name()) {
            prop_assert!(!name.is_empty());
        }
    }
}
