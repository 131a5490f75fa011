use tracing::debug;

use crate::message::{ContributorId, Message, OperationType};

use super::{
    identify_response, ComponentSelector, ContributorResponseStatus, SelectedComponentInfo,
    UnexpectedResponseError,
};

/// Selects every contributor that identifies positively.
pub struct AllPositiveSelector {
    operation: OperationType,
    status: ContributorResponseStatus,
    selected: Vec<SelectedComponentInfo>,
    allow_partial: bool,
}

impl AllPositiveSelector {
    pub fn new<I, S>(operation: OperationType, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ContributorId>,
    {
        Self {
            operation,
            status: ContributorResponseStatus::new(expected),
            selected: Vec::new(),
            allow_partial: false,
        }
    }

    pub fn with_partial_selection(mut self, allow_partial: bool) -> Self {
        self.allow_partial = allow_partial;
        self
    }
}

impl ComponentSelector for AllPositiveSelector {
    fn process_response(&mut self, message: &Message) -> Result<(), UnexpectedResponseError> {
        let response = identify_response(self.operation, message)?;
        self.status.mark_as_responded(&response.contributor_id)?;
        if response.info.code.is_positive_identification() {
            self.selected.push(SelectedComponentInfo::new(
                response.contributor_id.clone(),
                response.destination.clone(),
            ));
        } else {
            debug!(
                "{} not selected: {}",
                response.contributor_id, response.info.code
            );
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.status.have_all_responded()
    }

    fn has_selected_component(&self) -> bool {
        !self.selected.is_empty()
    }

    fn selected_components(&self) -> Vec<SelectedComponentInfo> {
        self.selected.clone()
    }

    fn outstanding_components(&self) -> Vec<ContributorId> {
        self.status.outstanding()
    }

    fn mark_timed_out(&mut self) -> Vec<ContributorId> {
        self.status.mark_timed_out()
    }

    fn allows_partial_selection(&self) -> bool {
        self.allow_partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ResponseCode;
    use crate::selection::test_support::{identify_response, positive};

    fn ids(ids: &[&str]) -> Vec<ContributorId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_all_positive_selects_everyone() {
        let mut selector = AllPositiveSelector::new(OperationType::PutFile, ids(&["P1", "P2", "P3"]));
        for id in ["P1", "P2", "P3"] {
            assert!(!selector.is_finished());
            selector
                .process_response(&positive(OperationType::PutFile, id))
                .unwrap();
        }
        assert!(selector.is_finished());
        assert!(selector.has_selected_component());
        assert_eq!(selector.selected_components().len(), 3);
        assert_eq!(selector.selected_components()[0].destination, "P1-topic");
    }

    #[test]
    fn test_negative_identification_is_counted_not_selected() {
        let mut selector = AllPositiveSelector::new(OperationType::PutFile, ids(&["P1", "P2"]));
        selector
            .process_response(&identify_response(
                OperationType::PutFile,
                "P1",
                ResponseCode::IdentificationNegative,
                None,
            ))
            .unwrap();
        assert_eq!(selector.outstanding_components(), ids(&["P2"]));
        assert!(!selector.has_selected_component());

        selector
            .process_response(&identify_response(
                OperationType::PutFile,
                "P2",
                ResponseCode::RequestNotSupported,
                None,
            ))
            .unwrap();
        assert!(selector.is_finished());
        assert!(!selector.has_selected_component());
    }

    #[test]
    fn test_timeout_keeps_partial_selection() {
        let mut selector = AllPositiveSelector::new(OperationType::GetChecksums, ids(&["P1", "P2"]))
            .with_partial_selection(true);
        selector
            .process_response(&positive(OperationType::GetChecksums, "P1"))
            .unwrap();

        assert_eq!(selector.mark_timed_out(), ids(&["P2"]));
        assert!(selector.is_finished());
        assert!(selector.allows_partial_selection());
        assert_eq!(
            selector.selected_components(),
            vec![SelectedComponentInfo::new("P1", "P1-topic")]
        );
    }
}
