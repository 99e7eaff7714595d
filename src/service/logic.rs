//! Business Logic Module
//!
//! Domain operation run on a cache miss.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::models::{CallRequest, CallResponse};
use crate::service::{PersistentStore, RequestContext};

/// Exploratory read issued once per computed call
pub const PROBE_QUERY: &str = "SELECT COUNT(*) FROM sqlite_master";

/// Domain operation behind `Call`.
///
/// `response` arrives with the greeting already filled in; implementations
/// may enrich or replace it. Any error becomes an internal failure for the
/// caller.
#[async_trait]
pub trait BusinessLogic: Send + Sync {
    async fn process(
        &self,
        ctx: &RequestContext,
        request: &CallRequest,
        response: &mut CallResponse,
    ) -> anyhow::Result<()>;
}

// == Default Logic ==
/// Pass-through logic with an optional read against the persistent store.
#[derive(Clone, Default)]
pub struct DefaultLogic {
    store: Option<Arc<dyn PersistentStore>>,
}

impl DefaultLogic {
    pub fn new(store: Option<Arc<dyn PersistentStore>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BusinessLogic for DefaultLogic {
    async fn process(
        &self,
        ctx: &RequestContext,
        request: &CallRequest,
        _response: &mut CallResponse,
    ) -> anyhow::Result<()> {
        ctx.ensure_active()?;

        if let Some(store) = &self.store {
            match ctx.run(store.query(PROBE_QUERY)).await? {
                Ok(tables) => debug!(name = %request.name, tables, "store probe succeeded"),
                Err(e) => warn!(name = %request.name, error = %e, "store probe failed"),
            }
        }

        Ok(())
    }
}
