use std::sync::Arc;

use crate::conversation::OperationPolicy;
use crate::event::EventHandler;
use crate::message::{ContributorQuery, CorrelationId, OperationParams};
use crate::ClientResult;

use super::{require_file_id, ClientCore};

/// Collects audit trail events, paging by sequence number per contributor.
pub struct GetAuditTrailsClient {
    core: ClientCore,
}

impl GetAuditTrailsClient {
    pub fn new(core: ClientCore) -> Self {
        Self { core }
    }

    pub fn get_audit_trails(
        &self,
        collection_id: &str,
        queries: Vec<ContributorQuery>,
        file_id: Option<&str>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> ClientResult<CorrelationId> {
        if let Some(file_id) = file_id {
            require_file_id(file_id)?;
        }
        self.core.start(
            collection_id,
            OperationParams::GetAuditTrails {
                file_id: file_id.map(str::to_string),
                query: None,
            },
            OperationPolicy::collection_query(),
            queries,
            handler,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::core;
    use crate::conversation::test_support::{shared, RecordingSender};
    use crate::message::MessageKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_queries_restrict_expected_contributors() {
        let sender = shared::<RecordingSender>();
        let client = GetAuditTrailsClient::new(core(sender.clone()));
        let mut query = ContributorQuery::new("p2");
        query.min_sequence = Some(3);
        client
            .get_audit_trails("books", vec![query], None, None)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let request = sender.sent()[0].clone();
        assert_eq!(request.kind(), MessageKind::IdentifyRequest);
        client
            .core
            .mediator()
            .dispatch(crate::conversation::test_support::identify(
                &request,
                "p2",
                crate::message::ResponseCode::IdentificationPositive,
                None,
            ));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let operation_request = sender.sent()[1].clone();
        assert_eq!(operation_request.to, "p2-topic");
        let params = crate::conversation::test_support::request_params(&operation_request).unwrap();
        assert_eq!(params.query().and_then(|q| q.min_sequence), Some(3));
    }
}
