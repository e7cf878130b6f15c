//! Bounded concurrent fetching

use super::source::PageSource;
use crate::error::{Error, Result};
use crate::types::{RawPage, ResourceRef};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Result of a batch fetch, indexed by reference
pub type FetchResults = HashMap<ResourceRef, Result<RawPage>>;

/// Fetch every reference with at most `concurrency` requests in flight
///
/// A failure is recorded under its reference and never aborts the batch.
/// Errors other than `Fetch` are wrapped as `Fetch` with the reference as
/// context.
pub async fn fetch_all<S>(source: &S, refs: &[ResourceRef], concurrency: usize) -> FetchResults
where
    S: PageSource + ?Sized,
{
    let total = refs.len();
    let completed = AtomicUsize::new(0);
    let completed = &completed;

    stream::iter(refs.iter().cloned())
        .map(|reference| async move {
            let result = source.fetch(&reference).await.map_err(|e| match e {
                Error::Fetch { .. } => e,
                other => Error::fetch(reference.to_string(), other.to_string()),
            });

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            match &result {
                Ok(_) => info!("[{done}/{total}] Fetched {reference}"),
                Err(e) => warn!("[{done}/{total}] {e}"),
            }
            (reference, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

/// Split results into pages and failures, both in the order of `refs`
pub fn partition_results(
    refs: &[ResourceRef],
    mut results: FetchResults,
) -> (Vec<RawPage>, Vec<(ResourceRef, Error)>) {
    let mut pages = Vec::new();
    let mut failures = Vec::new();

    for reference in refs {
        match results.remove(reference) {
            Some(Ok(page)) => pages.push(page),
            Some(Err(e)) => failures.push((reference.clone(), e)),
            None => {}
        }
    }
    (pages, failures)
}
