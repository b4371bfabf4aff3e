//! Mock infrastructure for testing the aggregator.
//!
//! - [`ScriptedSession`]: a session whose stats, latency and failures are set by the test
//! - [`CapturingExporter`]: a sink that keeps a copy of what every tick handed it
//! - Test helpers for configs and external payloads
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{quiet_config, ScriptedSession};
//!
//! let aggregator = Aggregator::builder().with_config(quiet_config()).build()?;
//! aggregator.add_session(ScriptedSession::new(1).with_scalar("cpu", 10.0).into_arc())?;
//! ```

pub mod capture;
pub mod test_helpers;

pub use capture::{CapturedTick, CapturingExporter};
pub use session::ScriptedSession;
pub use test_helpers::*;
