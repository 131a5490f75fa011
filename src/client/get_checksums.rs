use std::sync::Arc;

use crate::conversation::OperationPolicy;
use crate::event::EventHandler;
use crate::message::{ChecksumSpec, ContributorQuery, CorrelationId, OperationParams};
use crate::ClientResult;

use super::{require_file_id, ClientCore};

/// Collects checksums from the contributors of a collection.
///
/// Without queries every contributor is asked; with queries only the queried
/// contributors are, each with its own limits. Pages are fetched until no
/// contributor reports a partial result.
pub struct GetChecksumsClient {
    core: ClientCore,
}

impl GetChecksumsClient {
    pub fn new(core: ClientCore) -> Self {
        Self { core }
    }

    pub fn get_checksums(
        &self,
        collection_id: &str,
        queries: Vec<ContributorQuery>,
        file_id: Option<&str>,
        checksum_spec: ChecksumSpec,
        delivery_url: Option<&str>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> ClientResult<CorrelationId> {
        if let Some(file_id) = file_id {
            require_file_id(file_id)?;
        }
        self.core.start(
            collection_id,
            OperationParams::GetChecksums {
                file_id: file_id.map(str::to_string),
                checksum_spec,
                delivery_url: delivery_url.map(str::to_string),
                query: None,
            },
            OperationPolicy::collection_query(),
            queries,
            handler,
        )
    }
}
