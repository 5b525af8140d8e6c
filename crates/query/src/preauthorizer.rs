//! Permission pre-authorization for queries.
//!
//! Pre-authorization resolves every bucket a query references and checks the
//! matching permission before the query runs. It is advisory: the execution
//! engine still authorizes each access, so passing here does not guarantee
//! the query will be allowed at runtime.

use std::collections::HashSet;

use tessera_types::{
    Action, Authorizer, Bucket, BucketFilter, BucketFinder, CodedError, Context, Id, Permission,
    ResourceType,
};
use tracing::instrument;

use crate::{
    error::{QueryError, Result},
    references::BucketsAccessed,
};

/// Decides whether a query may run before it is executed.
pub trait PreAuthorizer: Send + Sync {
    /// Succeeds when `authorizer` holds every permission the query requires.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Denied`] naming the first bucket the authorizer
    /// lacks access to, or the error that prevented computing the permissions.
    fn pre_authorize(
        &self,
        ctx: &Context,
        query: &dyn BucketsAccessed,
        authorizer: &dyn Authorizer,
        org_id: Option<Id>,
    ) -> Result<()>;

    /// Permissions the query requires: reads first, then writes, each in
    /// discovery order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::BucketLookup`] if a referenced bucket cannot be
    /// resolved.
    fn required_permissions(
        &self,
        ctx: &Context,
        query: &dyn BucketsAccessed,
        org_id: Option<Id>,
    ) -> Result<Vec<Permission>>;
}

/// Pre-authorizer for bucket references.
#[derive(Debug, Clone)]
pub struct BucketPreAuthorizer<F> {
    finder: F,
}

impl<F: BucketFinder> BucketPreAuthorizer<F> {
    /// Resolves bucket filters through `finder`.
    pub fn new(finder: F) -> Self {
        Self { finder }
    }

    /// The bucket finder.
    pub fn finder(&self) -> &F {
        &self.finder
    }

    fn resolve(&self, ctx: &Context, action: Action, filter: &BucketFilter) -> Result<Bucket> {
        ctx.check()?;
        self.finder.find_bucket(ctx, filter).map_err(|e| QueryError::BucketLookup {
            action,
            filter: filter.clone(),
            lookup_code: e.code(),
            message: e.to_string(),
        })
    }

    /// Resolves every reference in order and hands each distinct permission
    /// to `visit`.
    ///
    /// Stops at the first error from either resolution or `visit`.
    fn for_each_permission(
        &self,
        ctx: &Context,
        query: &dyn BucketsAccessed,
        org_id: Option<Id>,
        mut visit: impl FnMut(&Bucket, Permission) -> Result<()>,
    ) -> Result<()> {
        let (reads, writes) = query.buckets_accessed(org_id).into_parts();
        let references = reads
            .iter()
            .map(|filter| (Action::Read, filter))
            .chain(writes.iter().map(|filter| (Action::Write, filter)));

        let mut seen = HashSet::new();
        for (action, filter) in references {
            let bucket = self.resolve(ctx, action, filter)?;
            let permission = Permission::new_at_id(
                bucket.id,
                action,
                ResourceType::Buckets,
                bucket.organization_id,
            )
            .map_err(|source| QueryError::Permission { action, source })?;
            if seen.insert(permission) {
                visit(&bucket, permission)?;
            }
        }
        Ok(())
    }
}

impl<F: BucketFinder> PreAuthorizer for BucketPreAuthorizer<F> {
    #[instrument(skip_all, fields(org_id = ?org_id))]
    fn pre_authorize(
        &self,
        ctx: &Context,
        query: &dyn BucketsAccessed,
        authorizer: &dyn Authorizer,
        org_id: Option<Id>,
    ) -> Result<()> {
        self.for_each_permission(ctx, query, org_id, |bucket, permission| {
            if authorizer.allowed(&permission) {
                return Ok(());
            }
            tracing::debug!(
                bucket = %bucket.name,
                bucket_id = %bucket.id,
                action = %permission.action,
                authorizer = %authorizer.identifier(),
                "Pre-authorization denied"
            );
            Err(QueryError::Denied { action: permission.action, name: bucket.name.clone() })
        })
    }

    fn required_permissions(
        &self,
        ctx: &Context,
        query: &dyn BucketsAccessed,
        org_id: Option<Id>,
    ) -> Result<Vec<Permission>> {
        let mut permissions = Vec::new();
        self.for_each_permission(ctx, query, org_id, |_, permission| {
            permissions.push(permission);
            Ok(())
        })?;
        Ok(permissions)
    }
}
