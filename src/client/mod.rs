//! # Client Facades
//!
//! Thin per-operation entry points. Each validates its arguments, resolves the
//! expected contributors from [`ClientSettings`], builds a conversation with the
//! operation's [`OperationPolicy`] and hands it to the mediator. Every call returns
//! the correlation id as soon as the conversation is started; progress and the
//! outcome arrive through the supplied [`EventHandler`].
//!
//! For a single awaitable outcome pass a [`BlockingEventHandler`](crate::event::BlockingEventHandler):
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use bitmag::{client::{ClientCore, GetStatusClient}, event::BlockingEventHandler};
//! # async fn example(core: ClientCore) -> bitmag::ClientResult<()> {
//! let handler = Arc::new(BlockingEventHandler::new(None));
//! GetStatusClient::new(core).get_status("books", Some(handler.clone()))?;
//! let statuses = handler.await_results().await?;
//! # Ok(())
//! # }
//! ```

mod delete_file;
mod get_audit_trails;
mod get_checksums;
mod get_file;
mod get_file_ids;
mod get_status;
mod put_file;
mod replace_file;

pub use delete_file::DeleteFileClient;
pub use get_audit_trails::GetAuditTrailsClient;
pub use get_checksums::GetChecksumsClient;
pub use get_file::GetFileClient;
pub use get_file_ids::GetFileIdsClient;
pub use get_status::GetStatusClient;
pub use put_file::PutFileClient;
pub use replace_file::ReplaceFileClient;

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::bus::MessageSender;
use crate::config::ClientSettings;
use crate::conversation::{Conversation, ConversationContext, OperationPolicy};
use crate::event::EventHandler;
use crate::mediator::ConversationMediator;
use crate::message::{ContributorQuery, CorrelationId, OperationParams};
use crate::{ClientError, ClientResult};

pub type CorrelationIdGenerator = Arc<dyn Fn() -> CorrelationId + Send + Sync>;

/// Shared plumbing behind every facade.
#[derive(Clone)]
pub struct ClientCore {
    settings: Arc<ClientSettings>,
    mediator: ConversationMediator,
    sender: Arc<dyn MessageSender>,
    id_generator: CorrelationIdGenerator,
}

impl ClientCore {
    pub fn new(
        settings: ClientSettings,
        mediator: ConversationMediator,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            mediator,
            sender,
            id_generator: Arc::new(|| Uuid::new_v4().to_string()),
        }
    }

    pub fn with_id_generator(mut self, id_generator: CorrelationIdGenerator) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn mediator(&self) -> &ConversationMediator {
        &self.mediator
    }

    pub(crate) fn start(
        &self,
        collection_id: &str,
        params: OperationParams,
        policy: OperationPolicy,
        queries: Vec<ContributorQuery>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> ClientResult<CorrelationId> {
        let contributors = self.settings.contributors(collection_id)?.to_vec();
        if contributors.is_empty() {
            return Err(ClientError::invalid_argument(format!(
                "Collection {} has no contributors",
                collection_id
            )));
        }
        for query in &queries {
            if !contributors.contains(&query.contributor_id) {
                return Err(ClientError::invalid_argument(format!(
                    "Queried contributor {} is not part of {}",
                    query.contributor_id, collection_id
                )));
            }
        }

        let correlation_id = (self.id_generator)();
        let operation = params.operation_type();
        let context = ConversationContext::new(
            correlation_id.clone(),
            collection_id,
            params,
            policy.with_retries(self.settings.operation_retry_count),
            contributors,
            &self.settings,
            self.sender.clone(),
            handler,
        )
        .with_queries(queries);
        self.mediator.start(Conversation::new(context))?;
        info!(
            "Started {} conversation {} in {}",
            operation, correlation_id, collection_id
        );
        Ok(correlation_id)
    }

    pub(crate) fn require_contributor(
        &self,
        collection_id: &str,
        contributor_id: &str,
    ) -> ClientResult<()> {
        if self
            .settings
            .contributors(collection_id)?
            .iter()
            .any(|id| id == contributor_id)
        {
            Ok(())
        } else {
            Err(ClientError::invalid_argument(format!(
                "Contributor {} is not part of {}",
                contributor_id, collection_id
            )))
        }
    }
}

pub(crate) fn require_non_empty(name: &str, value: &str) -> ClientResult<()> {
    if value.trim().is_empty() {
        return Err(ClientError::invalid_argument(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(())
}

pub(crate) fn require_file_id(file_id: &str) -> ClientResult<()> {
    require_non_empty("file id", file_id)?;
    if file_id.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ClientError::invalid_argument(format!(
            "Invalid file id: {:?}",
            file_id
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::conversation::test_support::RecordingSender;

    /// Core over a recording sender with predictable correlation ids.
    pub fn core(sender: Arc<RecordingSender>) -> ClientCore {
        let settings = ClientSettings::default().with_collection("books", &["p1", "p2"]);
        let counter = Arc::new(AtomicUsize::new(0));
        ClientCore::new(settings, ConversationMediator::new(), sender).with_id_generator(
            Arc::new(move || format!("conv-{}", counter.fetch_add(1, Ordering::SeqCst))),
        )
    }
}
