use std::sync::Arc;

use crate::conversation::OperationPolicy;
use crate::event::EventHandler;
use crate::message::{CorrelationId, OperationParams};
use crate::ClientResult;

use super::ClientCore;

pub struct GetStatusClient {
    core: ClientCore,
}

impl GetStatusClient {
    pub fn new(core: ClientCore) -> Self {
        Self { core }
    }

    pub fn get_status(
        &self,
        collection_id: &str,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> ClientResult<CorrelationId> {
        self.core.start(
            collection_id,
            OperationParams::GetStatus,
            OperationPolicy::get_status(),
            Vec::new(),
            handler,
        )
    }
}
