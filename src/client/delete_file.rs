use std::sync::Arc;

use crate::conversation::OperationPolicy;
use crate::event::EventHandler;
use crate::message::{ChecksumData, ChecksumSpec, CorrelationId, OperationParams};
use crate::{ClientError, ClientResult};

use super::{require_file_id, ClientCore};

/// Deletes a file at one named contributor.
///
/// A contributor that no longer has the file counts as done.
pub struct DeleteFileClient {
    core: ClientCore,
}

impl DeleteFileClient {
    pub fn new(core: ClientCore) -> Self {
        Self { core }
    }

    pub fn delete_file(
        &self,
        collection_id: &str,
        contributor_id: &str,
        file_id: &str,
        checksum_for_validation: Option<ChecksumData>,
        checksum_request: Option<ChecksumSpec>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> ClientResult<CorrelationId> {
        require_file_id(file_id)?;
        self.core.require_contributor(collection_id, contributor_id)?;
        if checksum_for_validation.is_none() {
            return Err(ClientError::invalid_argument(
                "Deleting a file requires its checksum",
            ));
        }
        self.core.start(
            collection_id,
            OperationParams::DeleteFile {
                file_id: file_id.to_string(),
                checksum_for_validation,
                checksum_request,
            },
            OperationPolicy::delete_file(contributor_id),
            Vec::new(),
            handler,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::core;
    use crate::conversation::test_support::{shared, RecordingSender};

    #[test]
    fn test_delete_requires_checksum() {
        let client = DeleteFileClient::new(core(shared::<RecordingSender>()));
        assert!(matches!(
            client.delete_file("books", "p1", "f1", None, None, None),
            Err(ClientError::InvalidArgument(_))
        ));
    }
}
