// * The Refinery
// * Turns rendered markup into review records: sampling, extraction, rating normalization, aggregation

pub mod aggregate;
pub mod extractor;
pub mod rating;
pub mod sample;
pub mod schema;

// * Re-exports for convenient access
pub use aggregate::{average_rating, merge, Aggregator};
pub use extractor::{extract, run_strategies, try_strategy, SelectorStrategy, StrategyRun};
pub use rating::parse_rating;
pub use sample::PageSample;
pub use schema::{
    AggregateResult, ExtractionResult, RawReview, RenderedPage, SchemaError, SelectorSet,
    SelectorSource,
};
