//! Page fetching module
//!
//! `PageSource` abstracts where pages come from (a live `Session`, or a fake
//! in tests). `fetch_all` fans a list of references out over a bounded pool.

mod pool;
mod source;

pub use pool::{fetch_all, partition_results, FetchResults};
pub use source::PageSource;

#[cfg(test)]
mod tests;
