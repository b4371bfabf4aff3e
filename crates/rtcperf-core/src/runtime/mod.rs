//! Aggregator construction and lifecycle.
//!
//! # Examples
//!
//! ```no_run
//! use rtcperf_core::{config::AppConfig, runtime::Aggregator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let aggregator = Aggregator::builder().with_config(config).build()?;
//!
//!     let first_id = aggregator.consume_session_id(1);
//!     // ... create sessions starting at `first_id` and `add_session` them ...
//!
//!     aggregator.start().await;
//!     let mut stats = aggregator.subscribe();
//!     while stats.changed().await.is_ok() {
//!         let snapshot = stats.borrow_and_update().clone();
//!         println!("{} metrics", snapshot.len());
//!     }
//!
//!     aggregator.stop().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod lifecycle;
mod pipeline;

pub use builder::{AggregatorBuilder, AggregatorError};
pub use lifecycle::Aggregator;
pub use pipeline::TickOutcome;
