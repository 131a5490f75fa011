use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::bus::{BusResult, MessageSender};
use crate::config::ClientSettings;
use crate::event::EventHandler;
use crate::message::{
    ContributorId, ContributorQuery, CorrelationId, Destination, Message, MessageBody,
    OperationParams, OperationType, ResultCursor,
};

use super::{EventMonitor, OperationPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationTimeouts {
    pub identification: Duration,
    pub operation: Duration,
    pub conversation: Duration,
}

impl From<&ClientSettings> for ConversationTimeouts {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            identification: settings.identification_timeout,
            operation: settings.operation_timeout,
            conversation: settings.conversation_timeout,
        }
    }
}

/// Everything one conversation needs, fixed for its lifetime.
pub struct ConversationContext {
    pub conversation_id: CorrelationId,
    pub collection_id: String,
    pub client_id: String,
    pub reply_to: Destination,
    pub collection_destination: Destination,
    /// Contributors expected to answer the identify request.
    pub contributors: Vec<ContributorId>,
    /// Collection members left out by the queries; their identify responses are ignored.
    pub bystanders: Vec<ContributorId>,
    pub params: OperationParams,
    /// Per-contributor result limits, keyed by contributor id.
    pub queries: HashMap<ContributorId, ContributorQuery>,
    pub policy: OperationPolicy,
    pub timeouts: ConversationTimeouts,
    pub sender: Arc<dyn MessageSender>,
    pub monitor: EventMonitor,
}

impl ConversationContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conversation_id: impl Into<CorrelationId>,
        collection_id: impl Into<String>,
        params: OperationParams,
        policy: OperationPolicy,
        contributors: Vec<ContributorId>,
        settings: &ClientSettings,
        sender: Arc<dyn MessageSender>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> Self {
        let conversation_id = conversation_id.into();
        let operation = params.operation_type();
        Self {
            monitor: EventMonitor::new(conversation_id.clone(), operation, handler),
            conversation_id,
            collection_id: collection_id.into(),
            client_id: settings.client_id.clone(),
            reply_to: settings.receiver_destination.clone(),
            collection_destination: settings.collection_destination.clone(),
            contributors,
            bystanders: Vec::new(),
            params,
            queries: HashMap::new(),
            policy,
            timeouts: ConversationTimeouts::from(settings),
            sender,
        }
    }

    /// Restricts the expected contributors to the queried ones.
    pub fn with_queries(mut self, queries: Vec<ContributorQuery>) -> Self {
        if queries.is_empty() {
            return self;
        }
        let queried: Vec<ContributorId> = queries.iter().map(|q| q.contributor_id.clone()).collect();
        self.bystanders = self
            .contributors
            .iter()
            .filter(|id| !queried.contains(id))
            .cloned()
            .collect();
        self.contributors = queried;
        self.queries = queries
            .into_iter()
            .map(|q| (q.contributor_id.clone(), q))
            .collect();
        self
    }

    pub fn operation(&self) -> OperationType {
        self.params.operation_type()
    }

    /// Operation parameters for one contributor, continuing after `cursor` when paging.
    pub fn request_params(
        &self,
        contributor_id: &str,
        cursor: Option<&ResultCursor>,
    ) -> OperationParams {
        let query = match (self.queries.get(contributor_id), cursor) {
            (Some(query), Some(cursor)) => Some(query.advanced(cursor)),
            (Some(query), None) => Some(query.clone()),
            (None, Some(cursor)) => Some(ContributorQuery::new(contributor_id).advanced(cursor)),
            (None, None) => None,
        };
        (self.policy.build_request)(&self.params, query.as_ref())
    }

    pub fn send(&self, to: &str, body: MessageBody) -> BusResult<()> {
        self.sender.send_message(Message {
            correlation_id: self.conversation_id.clone(),
            collection_id: self.collection_id.clone(),
            from: self.client_id.clone(),
            to: to.to_string(),
            reply_to: self.reply_to.clone(),
            operation: self.operation(),
            body,
        })
    }
}
