use std::sync::Arc;

use crate::conversation::OperationPolicy;
use crate::event::EventHandler;
use crate::message::{CorrelationId, FilePart, OperationParams};
use crate::ClientResult;

use super::{require_file_id, require_non_empty, ClientCore};

/// Fetches a file from whichever contributor declares the fastest delivery.
pub struct GetFileClient {
    core: ClientCore,
}

impl GetFileClient {
    pub fn new(core: ClientCore) -> Self {
        Self { core }
    }

    pub fn get_file(
        &self,
        collection_id: &str,
        file_id: &str,
        delivery_url: &str,
        file_part: Option<FilePart>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> ClientResult<CorrelationId> {
        require_file_id(file_id)?;
        require_non_empty("delivery url", delivery_url)?;
        self.core.start(
            collection_id,
            OperationParams::GetFile {
                file_id: file_id.to_string(),
                delivery_url: delivery_url.to_string(),
                file_part,
            },
            OperationPolicy::get_file(),
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
    use crate::message::MessageBody;
    use crate::ClientError;

    #[tokio::test]
    async fn test_get_file_broadcasts_identify() {
        let sender = shared::<RecordingSender>();
        let client = GetFileClient::new(core(sender.clone()));
        let id = client
            .get_file("books", "f1", "http://upload/f1", None, None)
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let sent = sender.sent();
        assert_eq!(sent[0].correlation_id, id);
        assert!(matches!(
            &sent[0].body,
            MessageBody::IdentifyRequest(r) if r.params.file_id() == Some("f1")
        ));
    }

    #[test]
    fn test_get_file_validates_arguments() {
        let client = GetFileClient::new(core(shared::<RecordingSender>()));
        assert!(matches!(
            client.get_file("books", "", "http://upload", None, None),
            Err(ClientError::InvalidArgument(_))
        ));
        assert!(matches!(
            client.get_file("books", "f1", " ", None, None),
            Err(ClientError::InvalidArgument(_))
        ));
    }
}
