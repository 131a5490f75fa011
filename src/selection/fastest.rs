use tracing::{debug, warn};

use crate::message::{ContributorId, Message, OperationType};

use super::{
    identify_response, ComponentSelector, ContributorResponseStatus, SelectedComponentInfo,
    UnexpectedResponseError,
};

/// Selects the single contributor declaring the smallest time to deliver.
///
/// Times are compared in milliseconds; on a tie the first response seen wins.
/// A positive response without a declared time is counted but never selected.
pub struct FastestSelector {
    operation: OperationType,
    status: ContributorResponseStatus,
    fastest: Option<(SelectedComponentInfo, u128)>,
}

impl FastestSelector {
    pub fn new<I, S>(operation: OperationType, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ContributorId>,
    {
        Self {
            operation,
            status: ContributorResponseStatus::new(expected),
            fastest: None,
        }
    }
}

impl ComponentSelector for FastestSelector {
    fn process_response(&mut self, message: &Message) -> Result<(), UnexpectedResponseError> {
        let response = identify_response(self.operation, message)?;
        self.status.mark_as_responded(&response.contributor_id)?;

        if !response.info.code.is_positive_identification() {
            debug!(
                "{} not selected: {}",
                response.contributor_id, response.info.code
            );
            return Ok(());
        }
        let Some(time_to_deliver) = response.time_to_deliver else {
            warn!(
                "{} identified without a time to deliver, ignoring for selection",
                response.contributor_id
            );
            return Ok(());
        };

        let millis = time_to_deliver.as_millis();
        let faster = match &self.fastest {
            Some((_, best)) => millis < *best,
            None => true,
        };
        if faster {
            self.fastest = Some((
                SelectedComponentInfo::new(
                    response.contributor_id.clone(),
                    response.destination.clone(),
                ),
                millis,
            ));
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.status.have_all_responded()
    }

    fn has_selected_component(&self) -> bool {
        self.fastest.is_some()
    }

    fn selected_components(&self) -> Vec<SelectedComponentInfo> {
        self.fastest
            .iter()
            .map(|(selected, _)| selected.clone())
            .collect()
    }

    fn outstanding_components(&self) -> Vec<ContributorId> {
        self.status.outstanding()
    }

    fn mark_timed_out(&mut self) -> Vec<ContributorId> {
        self.status.mark_timed_out()
    }

    fn allows_partial_selection(&self) -> bool {
        true
    }
}
