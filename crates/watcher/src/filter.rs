//! Inclusion filters
//!
//! A filter decides whether a path is tracked. It runs once per path during
//! enumeration and again every time the path is reconciled. A directory that
//! is rejected is never entered.

use async_trait::async_trait;
use std::sync::Arc;
use treewatch_core::{RelPath, StatRecord};

/// Predicate over a path and its current stat record
#[async_trait]
pub trait Filter: Send + Sync {
    /// Return `Ok(true)` to track the path
    async fn accept(&self, path: &RelPath, stat: &StatRecord) -> anyhow::Result<bool>;
}

/// Tracks everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl Filter for AcceptAll {
    async fn accept(&self, _path: &RelPath, _stat: &StatRecord) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Filter backed by a synchronous closure, see [`filter_fn`]
pub struct FnFilter<F> {
    predicate: F,
}

/// Adapt a closure into a [`Filter`]
///
/// ```
/// use treewatch::filter_fn;
///
/// let rust_sources = filter_fn(|path, stat| stat.is_dir() || path.as_str().ends_with(".rs"));
/// # let _ = rust_sources;
/// ```
pub fn filter_fn<F>(predicate: F) -> FnFilter<F>
where
    F: Fn(&RelPath, &StatRecord) -> bool + Send + Sync,
{
    FnFilter { predicate }
}

#[async_trait]
impl<F> Filter for FnFilter<F>
where
    F: Fn(&RelPath, &StatRecord) -> bool + Send + Sync,
{
    async fn accept(&self, path: &RelPath, stat: &StatRecord) -> anyhow::Result<bool> {
        Ok((self.predicate)(path, stat))
    }
}

/// Accepts a path only when every inner filter does
///
/// Filters are consulted in order and evaluation stops at the first
/// rejection or error.
#[derive(Clone, Default)]
pub struct AllOf {
    filters: Vec<Arc<dyn Filter>>,
}

impl AllOf {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { filters }
    }
}

#[async_trait]
impl Filter for AllOf {
    async fn accept(&self, path: &RelPath, stat: &StatRecord) -> anyhow::Result<bool> {
        for filter in &self.filters {
            if !filter.accept(path, stat).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
