//! Fluent cursor over the results of a `find`.
//!
//! A [`Cursor`] is created by [`Collection::find`](crate::collection::Collection::find) with the
//! filtered documents already computed. Sorting, skipping and limiting are configured with
//! chained calls and applied by [`Cursor::exec`].
//!
//! # Example
//!
//! ```ignore
//! let adults = users
//!     .find(json!({ "age": { "$gte": 18 } }))
//!     .await?
//!     .sort_by("age")
//!     .order_by("asc")?
//!     .skip_by(10)?
//!     .limit_by(10)?
//!     .exec();
//! ```

use std::cmp::Ordering;

use crate::{
    document::{CREATED_AT_FIELD, Document},
    error::{DocumentStoreError, DocumentStoreResult},
    evaluator::Comparable,
    query::SortDirection,
    store::DatabaseOptions,
};

/// Default number of documents returned by [`Cursor::exec`].
pub const DEFAULT_LIMIT: usize = 20;

/// Query results plus sort/skip/limit configuration.
///
/// The cursor owns its result sequence. [`Cursor::exec`] sorts, skips and limits that sequence
/// in place and keeps the outcome, so calling it again applies skip and limit to the
/// already-processed results rather than starting over from the original filter.
#[derive(Debug, Clone)]
pub struct Cursor {
    results: Vec<Document>,
    sort_field: String,
    sort_direction: SortDirection,
    limit: usize,
    skip: usize,
}

impl Cursor {
    /// Creates a cursor with the default configuration: newest `createdAt` first, 20 results.
    pub fn new(results: Vec<Document>) -> Self {
        Self {
            results,
            sort_field: CREATED_AT_FIELD.to_string(),
            sort_direction: SortDirection::Desc,
            limit: DEFAULT_LIMIT,
            skip: 0,
        }
    }

    /// Creates a cursor using a database's configured defaults.
    pub fn with_options(results: Vec<Document>, options: &DatabaseOptions) -> Self {
        Self {
            results,
            sort_field: options.default_sort_field.clone(),
            sort_direction: options.default_sort_direction,
            limit: options.default_limit,
            skip: 0,
        }
    }

    /// Sets the field to sort by.
    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.sort_field = field.into();
        self
    }

    /// Sets the sort direction from its textual form, `"asc"` or `"desc"`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] for any other value.
    pub fn order_by(self, direction: &str) -> DocumentStoreResult<Self> {
        Ok(self.order(direction.parse()?))
    }

    /// Sets the sort direction.
    pub fn order(mut self, direction: SortDirection) -> Self {
        self.sort_direction = direction;
        self
    }

    /// Caps the number of results. `0` disables the cap.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if `n` is negative.
    pub fn limit_by(mut self, n: i64) -> DocumentStoreResult<Self> {
        self.limit = non_negative("limit", n)?;
        Ok(self)
    }

    /// Skips the first `n` results after sorting.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if `n` is negative.
    pub fn skip_by(mut self, n: i64) -> DocumentStoreResult<Self> {
        self.skip = non_negative("skip", n)?;
        Ok(self)
    }

    /// Sorts, skips and limits the held results, returning a copy of the outcome.
    ///
    /// The sort is stable: documents whose sort values are equal, missing or of incomparable
    /// types keep their relative order.
    pub fn exec(&mut self) -> Vec<Document> {
        let field = self.sort_field.as_str();
        let direction = self.sort_direction;

        self.results.sort_by(|a, b| {
            let left = Comparable::of_field(a, field);
            let right = Comparable::of_field(b, field);

            match direction {
                SortDirection::Asc => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
                SortDirection::Desc => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
            }
        });

        if self.skip > 0 {
            let skip = self.skip.min(self.results.len());
            self.results.drain(..skip);
        }

        if self.limit > 0 {
            self.results.truncate(self.limit);
        }

        self.results.clone()
    }

    /// Number of documents currently held.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn sort_field(&self) -> &str {
        &self.sort_field
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn skip(&self) -> usize {
        self.skip
    }
}

fn non_negative(name: &str, n: i64) -> DocumentStoreResult<usize> {
    usize::try_from(n).map_err(|_| {
        DocumentStoreError::Validation(format!("{name} must be a non-negative number, got {n}"))
    })
}
