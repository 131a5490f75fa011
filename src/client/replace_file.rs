use std::sync::Arc;

use crate::conversation::OperationPolicy;
use crate::event::EventHandler;
use crate::message::{ChecksumData, CorrelationId, OperationParams};
use crate::{ClientError, ClientResult};

use super::{require_file_id, require_non_empty, ClientCore};

/// Replaces a file at one named contributor.
pub struct ReplaceFileClient {
    core: ClientCore,
}

impl ReplaceFileClient {
    pub fn new(core: ClientCore) -> Self {
        Self { core }
    }

    /// `checksum_for_existing` proves the caller knows the file being replaced.
    #[allow(clippy::too_many_arguments)]
    pub fn replace_file(
        &self,
        collection_id: &str,
        contributor_id: &str,
        file_id: &str,
        file_address: &str,
        file_size: u64,
        checksum_for_existing: Option<ChecksumData>,
        checksum_for_new: Option<ChecksumData>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> ClientResult<CorrelationId> {
        require_file_id(file_id)?;
        require_non_empty("file address", file_address)?;
        self.core.require_contributor(collection_id, contributor_id)?;
        if checksum_for_existing.is_none() {
            return Err(ClientError::invalid_argument(
                "Replacing a file requires the checksum of the existing file",
            ));
        }
        self.core.start(
            collection_id,
            OperationParams::ReplaceFile {
                file_id: file_id.to_string(),
                file_address: file_address.to_string(),
                file_size,
                checksum_for_existing,
                checksum_for_new,
            },
            OperationPolicy::replace_file(contributor_id),
            Vec::new(),
            handler,
        )
    }
}
