pub mod actions;
pub mod config;
pub mod data_parser;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod repository;
pub mod services;
pub mod test_dependencies;

pub use actions::batch_scheduler::{compute_groups, run_batch, schedule, BatchSummary, Weekday};
pub use actions::place_resolver::PlaceUrlResolver;
pub use config::Config;
pub use pipeline::{PipelineContext, PlaceOutcome};
