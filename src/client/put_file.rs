use std::sync::Arc;

use crate::conversation::OperationPolicy;
use crate::event::EventHandler;
use crate::message::{ChecksumData, ChecksumSpec, CorrelationId, OperationParams};
use crate::ClientResult;

use super::{require_file_id, require_non_empty, ClientCore};

/// Stores a file on every contributor of the collection.
///
/// Contributors already holding the file with the supplied checksum count as
/// done. With `partial_put_allowed` the put proceeds when some contributors do
/// not answer identification, but still reports failure overall.
pub struct PutFileClient {
    core: ClientCore,
}

impl PutFileClient {
    pub fn new(core: ClientCore) -> Self {
        Self { core }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn put_file(
        &self,
        collection_id: &str,
        file_id: &str,
        file_address: &str,
        file_size: u64,
        checksum_for_validation: Option<ChecksumData>,
        checksum_request: Option<ChecksumSpec>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> ClientResult<CorrelationId> {
        require_file_id(file_id)?;
        require_non_empty("file address", file_address)?;
        self.core.start(
            collection_id,
            OperationParams::PutFile {
                file_id: file_id.to_string(),
                file_address: file_address.to_string(),
                file_size,
                checksum_for_validation,
                checksum_request,
            },
            OperationPolicy::put_file(self.core.settings().partial_put_allowed),
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
    use crate::ClientError;

    #[test]
    fn test_put_file_requires_address() {
        let client = PutFileClient::new(core(shared::<RecordingSender>()));
        assert!(matches!(
            client.put_file("books", "f1", "", 10, None, None, None),
            Err(ClientError::InvalidArgument(_))
        ));
    }
}
