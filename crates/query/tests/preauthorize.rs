//! Pre-authorization against mock and store-backed bucket finders.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use proptest::prelude::*;
use tessera_kv::Service;
use tessera_query::{BucketPreAuthorizer, PreAuthorizer, QueryError, QueryReferences};
use tessera_store::Database;
use tessera_test_utils::{MockBucketFinder, RecordingAuthorizer, SequenceIdGenerator};
use tessera_types::{
    Action, Authorization, AuthorizationStatus, Bucket, BucketFilter, CodedError, Context,
    ErrorCode, Id, Permission, ResourceType,
};

const O1: Id = Id::new(0x01);
const O2: Id = Id::new(0x02);

fn bucket(id: u64, org_id: Id, name: &str) -> Bucket {
    Bucket::builder().id(Id::new(id)).organization_id(org_id).name(name).build()
}

fn at_id(action: Action, bucket: &Bucket) -> Permission {
    Permission::new_at_id(bucket.id, action, ResourceType::Buckets, bucket.organization_id).unwrap()
}

fn fixture() -> (Vec<Bucket>, QueryReferences) {
    let a = bucket(1, O1, "a");
    let b = bucket(2, O2, "b");
    let c = bucket(3, O1, "c");
    let query = QueryReferences::new()
        .with_read(BucketFilter::by_name(O1, "a"))
        .with_read(BucketFilter::by_name(O2, "b"))
        .with_write(BucketFilter::by_name(O1, "c"));
    (vec![a, b, c], query)
}

#[test]
fn test_required_permissions_are_exact() {
    let (buckets, query) = fixture();
    let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(buckets.clone()));

    let permissions = preauth.required_permissions(&Context::background(), &query, Some(O1)).unwrap();

    assert_eq!(
        permissions,
        vec![
            at_id(Action::Read, &buckets[0]),
            at_id(Action::Read, &buckets[1]),
            at_id(Action::Write, &buckets[2]),
        ]
    );
    assert_eq!(permissions[1].resource.org_id, Some(O2));
}

#[test]
fn test_duplicate_references_yield_one_permission() {
    let a = bucket(1, O1, "a");
    let query = QueryReferences::new()
        .with_read(BucketFilter::by_name(O1, "a"))
        .with_read(BucketFilter::by_name(O1, "a"))
        .with_read(BucketFilter { name: Some("a".to_string()), ..BucketFilter::default() });
    let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(vec![a.clone()]));

    let permissions = preauth.required_permissions(&Context::background(), &query, Some(O1)).unwrap();
    assert_eq!(permissions, vec![at_id(Action::Read, &a)]);
}

#[test]
fn test_filters_resolving_to_one_bucket_yield_one_permission() {
    let x = bucket(0x10, O1, "x");
    let query = QueryReferences::new()
        .with_read(BucketFilter::by_id(x.id))
        .with_read(BucketFilter::by_name(O1, "x"));
    let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(vec![x.clone()]));
    let ctx = Context::background();

    let permissions = preauth.required_permissions(&ctx, &query, Some(O1)).unwrap();
    assert_eq!(permissions, vec![at_id(Action::Read, &x)]);

    let auth = RecordingAuthorizer::new(vec![at_id(Action::Read, &x)]);
    preauth.pre_authorize(&ctx, &query, &auth, Some(O1)).unwrap();
    assert_eq!(auth.checked(), vec![at_id(Action::Read, &x)]);
}

#[test]
fn test_missing_read_bucket_names_filter() {
    let (buckets, _) = fixture();
    let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(buckets));
    let query = QueryReferences::new().with_read(BucketFilter::by_name(O1, "missing"));

    let err = preauth.required_permissions(&Context::background(), &query, Some(O1)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert!(
        err.to_string()
            .starts_with("could not find read bucket with filter: [Bucket Name: missing, Org ID: 0000000000000001]")
    );
}

#[test]
fn test_lookup_failure_fails_whole_call() {
    let (buckets, query) = fixture();
    let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(buckets).failing("io error"));
    let auth = RecordingAuthorizer::new(vec![Permission::new(Action::Read, ResourceType::Buckets)]);

    let err = preauth.pre_authorize(&Context::background(), &query, &auth, Some(O1)).unwrap_err();
    assert!(matches!(err, QueryError::BucketLookup { action: Action::Read, .. }));
    assert_eq!(err.code(), ErrorCode::Internal);
    assert!(auth.checked().is_empty());
}

#[test]
fn test_scenario_read_grant_for_exact_bucket() {
    let x = bucket(0x10, O1, "X");
    let y = bucket(0x11, O1, "Y");
    let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(vec![x.clone(), y.clone()]));
    let query = QueryReferences::new().with_read(BucketFilter::by_name(O1, "X"));
    let ctx = Context::background();

    let granted_x = RecordingAuthorizer::new(vec![at_id(Action::Read, &x)]);
    preauth.pre_authorize(&ctx, &query, &granted_x, Some(O1)).unwrap();

    let granted_y = RecordingAuthorizer::new(vec![at_id(Action::Read, &y)]);
    let err = preauth.pre_authorize(&ctx, &query, &granted_y, Some(O1)).unwrap_err();
    assert_eq!(err.to_string(), "no read permission for bucket: \"X\"");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[test]
fn test_org_wide_grant_covers_buckets_in_that_org_only() {
    let (buckets, query) = fixture();
    let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(buckets));
    let auth = RecordingAuthorizer::new(vec![
        Permission::new_at_org(Action::Read, ResourceType::Buckets, O1).unwrap(),
        Permission::new_at_org(Action::Write, ResourceType::Buckets, O1).unwrap(),
    ]);

    let err = preauth.pre_authorize(&Context::background(), &query, &auth, Some(O1)).unwrap_err();
    assert!(matches!(err, QueryError::Denied { action: Action::Read, ref name } if name == "b"));
}

#[test]
fn test_write_denial_is_distinguished() {
    let (buckets, query) = fixture();
    let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(buckets));
    let auth = RecordingAuthorizer::new(vec![Permission::new(Action::Read, ResourceType::Buckets)]);

    let err = preauth.pre_authorize(&Context::background(), &query, &auth, Some(O1)).unwrap_err();
    assert_eq!(err.to_string(), "no write permission for bucket: \"c\"");
}

#[test]
fn test_inactive_authorization_is_denied() {
    let (buckets, query) = fixture();
    let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(buckets));
    let auth = Authorization {
        id: Id::new(0x99),
        user_id: Id::new(0x98),
        org_id: O1,
        status: AuthorizationStatus::Inactive,
        permissions: vec![
            Permission::new(Action::Read, ResourceType::Buckets),
            Permission::new(Action::Write, ResourceType::Buckets),
        ],
    };

    let err = preauth.pre_authorize(&Context::background(), &query, &auth, Some(O1)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);

    let active = Authorization { status: AuthorizationStatus::Active, ..auth };
    preauth.pre_authorize(&Context::background(), &query, &active, Some(O1)).unwrap();
}

#[test]
fn test_store_backed_finder() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let service = Service::with_id_generator(db, Arc::new(SequenceIdGenerator::default()));
    let ctx = Context::background();
    service.initialize(&ctx).unwrap();

    let mut cpu = Bucket::builder().id(Id::new(0)).organization_id(O1).org("acme").name("cpu").build();
    service.create_bucket(&ctx, &mut cpu).unwrap();

    let preauth = BucketPreAuthorizer::new(service);
    let query = QueryReferences::new()
        .with_read(BucketFilter { name: Some("cpu".to_string()), ..BucketFilter::default() })
        .with_write(BucketFilter::by_org_name("acme", "cpu"));

    let permissions = preauth.required_permissions(&ctx, &query, Some(O1)).unwrap();
    assert_eq!(permissions, vec![at_id(Action::Read, &cpu), at_id(Action::Write, &cpu)]);

    let missing = QueryReferences::new().with_write(BucketFilter::by_name(O1, "mem"));
    let err = preauth.required_permissions(&ctx, &missing, Some(O1)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert!(err.to_string().starts_with("could not find write bucket with filter: "));
}

proptest! {
    #[test]
    fn test_single_denial_fails_and_stops_checking(denied in 0usize..3) {
        let (buckets, query) = fixture();
        let required = [
            at_id(Action::Read, &buckets[0]),
            at_id(Action::Read, &buckets[1]),
            at_id(Action::Write, &buckets[2]),
        ];
        let granted: Vec<_> =
            required.iter().enumerate().filter(|(i, _)| *i != denied).map(|(_, p)| *p).collect();
        let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(buckets));
        let auth = RecordingAuthorizer::new(granted);

        let result = preauth.pre_authorize(&Context::background(), &query, &auth, Some(O1));

        let is_denied = matches!(result, Err(QueryError::Denied { .. }));
        prop_assert!(is_denied);
        prop_assert_eq!(auth.checked(), required[..=denied].to_vec());
    }

    #[test]
    fn test_full_grant_passes(extra in tessera_test_utils::strategies::arb_permission()) {
        let (buckets, query) = fixture();
        let mut granted = vec![
            at_id(Action::Read, &buckets[0]),
            at_id(Action::Read, &buckets[1]),
            at_id(Action::Write, &buckets[2]),
        ];
        granted.push(extra);
        let preauth = BucketPreAuthorizer::new(MockBucketFinder::new(buckets));
        let auth = RecordingAuthorizer::new(granted);

        prop_assert!(preauth.pre_authorize(&Context::background(), &query, &auth, Some(O1)).is_ok());
        prop_assert_eq!(auth.checked().len(), 3);
    }
}
