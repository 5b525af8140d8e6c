//! Resources a query reads and writes.
//!
//! Extracting references from query text belongs to the query engine. The
//! pre-authorizer only sees the result through [`BucketsAccessed`].

use tessera_types::{BucketFilter, Id};

/// A parsed query that can report the buckets it touches.
pub trait BucketsAccessed {
    /// Buckets read and written by the query.
    ///
    /// Filters without an organization scope are resolved within `org_id`.
    fn buckets_accessed(&self, org_id: Option<Id>) -> QueryReferences;
}

/// Ordered, de-duplicated bucket references of one query.
///
/// Filters keep their discovery order; adding a filter already present in
/// the same list is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryReferences {
    reads: Vec<BucketFilter>,
    writes: Vec<BucketFilter>,
}

impl QueryReferences {
    /// No references.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a read reference.
    #[must_use]
    pub fn with_read(mut self, filter: BucketFilter) -> Self {
        self.add_read(filter);
        self
    }

    /// Adds a write reference.
    #[must_use]
    pub fn with_write(mut self, filter: BucketFilter) -> Self {
        self.add_write(filter);
        self
    }

    /// Adds a read reference. Returns `false` if it was already present.
    pub fn add_read(&mut self, filter: BucketFilter) -> bool {
        push_unique(&mut self.reads, filter)
    }

    /// Adds a write reference. Returns `false` if it was already present.
    pub fn add_write(&mut self, filter: BucketFilter) -> bool {
        push_unique(&mut self.writes, filter)
    }

    /// Read references in discovery order.
    pub fn reads(&self) -> &[BucketFilter] {
        &self.reads
    }

    /// Write references in discovery order.
    pub fn writes(&self) -> &[BucketFilter] {
        &self.writes
    }

    /// Total number of references.
    pub fn len(&self) -> usize {
        self.reads.len() + self.writes.len()
    }

    /// Whether the query references no buckets.
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }

    /// Scopes every unscoped filter to `org_id`.
    ///
    /// Filters that become equal after scoping collapse into the first one.
    #[must_use]
    pub fn scoped_to(self, org_id: Option<Id>) -> Self {
        let Some(org_id) = org_id else {
            return self;
        };

        let scope = |filter: BucketFilter| {
            if filter.is_unscoped() {
                BucketFilter { organization_id: Some(org_id), ..filter }
            } else {
                filter
            }
        };

        let mut scoped = Self::new();
        for filter in self.reads {
            scoped.add_read(scope(filter));
        }
        for filter in self.writes {
            scoped.add_write(scope(filter));
        }
        scoped
    }

    /// Splits into `(reads, writes)`.
    pub fn into_parts(self) -> (Vec<BucketFilter>, Vec<BucketFilter>) {
        (self.reads, self.writes)
    }
}

/// A fixed reference list is its own extractor.
impl BucketsAccessed for QueryReferences {
    fn buckets_accessed(&self, org_id: Option<Id>) -> QueryReferences {
        self.clone().scoped_to(org_id)
    }
}

fn push_unique(filters: &mut Vec<BucketFilter>, filter: BucketFilter) -> bool {
    if filters.contains(&filter) {
        return false;
    }
    filters.push(filter);
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;
    use tessera_test_utils::strategies::arb_bucket_filter;

    use super::*;

    const ORG: Id = Id::new(0x0a);

    #[test]
    fn test_duplicates_are_dropped_per_list() {
        let cpu = BucketFilter::by_name(ORG, "cpu");
        let mut refs = QueryReferences::new();
        assert!(refs.add_read(cpu.clone()));
        assert!(!refs.add_read(cpu.clone()));
        assert!(refs.add_write(cpu.clone()));

        assert_eq!(refs.reads(), [cpu.clone()].as_slice());
        assert_eq!(refs.writes(), [cpu].as_slice());
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_unscoped_filters_inherit_org() {
        let named = BucketFilter { name: Some("cpu".to_string()), ..BucketFilter::default() };
        let other_org = BucketFilter::by_name(Id::new(0x0b), "mem");
        let by_org_name = BucketFilter::by_org_name("acme", "disk");

        let refs = QueryReferences::new()
            .with_read(named)
            .with_read(other_org.clone())
            .with_write(by_org_name.clone())
            .buckets_accessed(Some(ORG));

        assert_eq!(refs.reads(), [BucketFilter::by_name(ORG, "cpu"), other_org].as_slice());
        assert_eq!(refs.writes(), [by_org_name].as_slice());
    }

    #[test]
    fn test_scoping_collapses_equal_filters() {
        let refs = QueryReferences::new()
            .with_read(BucketFilter { name: Some("cpu".to_string()), ..BucketFilter::default() })
            .with_read(BucketFilter::by_name(ORG, "cpu"))
            .scoped_to(Some(ORG));
        assert_eq!(refs.reads(), [BucketFilter::by_name(ORG, "cpu")].as_slice());
    }

    #[test]
    fn test_no_org_leaves_filters_unchanged() {
        let filter = BucketFilter { name: Some("cpu".to_string()), ..BucketFilter::default() };
        let refs = QueryReferences::new().with_read(filter.clone()).scoped_to(None);
        assert_eq!(refs.into_parts(), (vec![filter], vec![]));
    }

    proptest! {
        #[test]
        fn test_references_are_unique_and_ordered(
            filters in proptest::collection::vec(arb_bucket_filter(), 0..16),
        ) {
            let mut refs = QueryReferences::new();
            for filter in &filters {
                refs.add_read(filter.clone());
            }

            let mut expected: Vec<BucketFilter> = Vec::new();
            for filter in filters {
                if !expected.contains(&filter) {
                    expected.push(filter);
                }
            }
            prop_assert_eq!(refs.reads(), expected.as_slice());
        }
    }
}
