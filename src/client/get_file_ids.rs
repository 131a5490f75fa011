use std::sync::Arc;

use crate::conversation::OperationPolicy;
use crate::event::EventHandler;
use crate::message::{ContributorQuery, CorrelationId, OperationParams};
use crate::ClientResult;

use super::{require_file_id, ClientCore};

pub struct GetFileIdsClient {
    core: ClientCore,
}

impl GetFileIdsClient {
    pub fn new(core: ClientCore) -> Self {
        Self { core }
    }

    pub fn get_file_ids(
        &self,
        collection_id: &str,
        queries: Vec<ContributorQuery>,
        file_id: Option<&str>,
        delivery_url: Option<&str>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> ClientResult<CorrelationId> {
        if let Some(file_id) = file_id {
            require_file_id(file_id)?;
        }
        self.core.start(
            collection_id,
            OperationParams::GetFileIds {
                file_id: file_id.map(str::to_string),
                delivery_url: delivery_url.map(str::to_string),
                query: None,
            },
            OperationPolicy::collection_query(),
            queries,
            handler,
        )
    }
}
