use tracing::debug;

use crate::message::{ContributorId, Message, OperationType};

use super::{
    identify_response, ComponentSelector, ContributorResponseStatus, SelectedComponentInfo,
    UnexpectedResponseError,
};

/// Selects the one contributor the caller named, if it identifies positively.
///
/// Responses from everyone else are still consumed for ledger completeness.
pub struct SpecificSelector {
    operation: OperationType,
    status: ContributorResponseStatus,
    target: ContributorId,
    selected: Option<SelectedComponentInfo>,
}

impl SpecificSelector {
    pub fn new<I, S>(operation: OperationType, expected: I, target: impl Into<ContributorId>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ContributorId>,
    {
        Self {
            operation,
            status: ContributorResponseStatus::new(expected),
            target: target.into(),
            selected: None,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl ComponentSelector for SpecificSelector {
    fn process_response(&mut self, message: &Message) -> Result<(), UnexpectedResponseError> {
        let response = identify_response(self.operation, message)?;
        self.status.mark_as_responded(&response.contributor_id)?;

        if response.contributor_id != self.target {
            debug!(
                "Ignoring {} for selection, waiting for {}",
                response.contributor_id, self.target
            );
            return Ok(());
        }
        if response.info.code.is_positive_identification() {
            self.selected = Some(SelectedComponentInfo::new(
                response.contributor_id.clone(),
                response.destination.clone(),
            ));
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.status.have_all_responded()
    }

    fn has_selected_component(&self) -> bool {
        self.selected.is_some()
    }

    fn selected_components(&self) -> Vec<SelectedComponentInfo> {
        self.selected.iter().cloned().collect()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ResponseCode;
    use crate::selection::test_support::{identify_response, positive};

    fn selector() -> SpecificSelector {
        SpecificSelector::new(
            OperationType::ReplaceFile,
            ["P1", "P2"].iter().map(|id| id.to_string()),
            "P2",
        )
    }

    #[test]
    fn test_only_target_is_selected() {
        let mut selector = selector();
        selector
            .process_response(&positive(OperationType::ReplaceFile, "P1"))
            .unwrap();
        assert!(!selector.has_selected_component());
        assert!(!selector.is_finished());

        selector
            .process_response(&positive(OperationType::ReplaceFile, "P2"))
            .unwrap();
        assert!(selector.is_finished());
        assert_eq!(
            selector.selected_components(),
            vec![SelectedComponentInfo::new("P2", "P2-topic")]
        );
    }

    #[test]
    fn test_negative_target_selects_nothing() {
        let mut selector = selector();
        selector
            .process_response(&identify_response(
                OperationType::ReplaceFile,
                "P2",
                ResponseCode::FileNotFoundFailure,
                None,
            ))
            .unwrap();
        selector
            .process_response(&positive(OperationType::ReplaceFile, "P1"))
            .unwrap();
        assert!(selector.is_finished());
        assert!(!selector.has_selected_component());
        assert_eq!(selector.target(), "P2");
    }
}
