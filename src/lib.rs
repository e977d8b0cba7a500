pub mod config;
pub mod fetch;
pub mod join;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod regression;
pub mod summary;
pub mod table;
pub mod tidy;
