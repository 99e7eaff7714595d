//! Service Module
//!
//! The request-handling pipeline and the collaborators it drives.

mod context;
mod handler;
mod logic;
mod metrics;
mod persistence;

pub use context::RequestContext;
pub use handler::{
    Blueprint, BlueprintHandler, HandlerBuilder, HandlerConfig, CALL_METHOD, HEALTH_CHECK_METHOD,
};
pub use logic::{BusinessLogic, DefaultLogic, PROBE_QUERY};
pub use metrics::{CallTimer, Metrics, MetricsRecorder};
pub use persistence::{PersistentStore, SqliteStore};
