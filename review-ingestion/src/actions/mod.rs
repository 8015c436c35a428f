pub mod batch_scheduler;
pub mod place_resolver;
pub mod prompts;
pub mod review_analysis;
pub mod review_crawler;
