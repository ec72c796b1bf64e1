//! Search aggregation: ranked queries, fan-out, dedup, blacklist filtering.

mod aggregator;
mod dedup;
mod queries;

pub use aggregator::{SearchAggregator, SearchError, MAX_RESULTS};
pub use dedup::{deduplicate_by_guid, sort_ranked, RankedResult};
pub use queries::{build_queries, SearchQuery};
