use std::collections::HashSet;

use crate::message::ContributorId;

use super::UnexpectedResponseError;

/// Which expected contributors have answered one phase of a conversation.
///
/// Each id is accounted for at most once, either by a response or by a timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorResponseStatus {
    expected: Vec<ContributorId>,
    responded: HashSet<ContributorId>,
    timed_out: HashSet<ContributorId>,
}

impl ContributorResponseStatus {
    pub fn new<I, S>(expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ContributorId>,
    {
        let mut seen = HashSet::new();
        let expected = expected
            .into_iter()
            .map(Into::into)
            .filter(|id: &ContributorId| seen.insert(id.clone()))
            .collect();
        Self {
            expected,
            responded: HashSet::new(),
            timed_out: HashSet::new(),
        }
    }

    pub fn mark_as_responded(&mut self, contributor_id: &str) -> Result<(), UnexpectedResponseError> {
        if !self.is_expected(contributor_id) {
            return Err(UnexpectedResponseError::UnknownContributor {
                contributor_id: contributor_id.to_string(),
            });
        }
        if self.is_accounted_for(contributor_id) {
            return Err(UnexpectedResponseError::DuplicateResponse {
                contributor_id: contributor_id.to_string(),
            });
        }
        self.responded.insert(contributor_id.to_string());
        Ok(())
    }

    /// Accounts for every outstanding contributor as timed out and returns them.
    pub fn mark_timed_out(&mut self) -> Vec<ContributorId> {
        let outstanding = self.outstanding();
        self.timed_out.extend(outstanding.iter().cloned());
        outstanding
    }

    pub fn have_all_responded(&self) -> bool {
        self.expected.iter().all(|id| self.is_accounted_for(id))
    }

    /// Expected ids not yet accounted for, in configuration order.
    pub fn outstanding(&self) -> Vec<ContributorId> {
        self.expected
            .iter()
            .filter(|id| !self.is_accounted_for(id))
            .cloned()
            .collect()
    }

    pub fn is_expected(&self, contributor_id: &str) -> bool {
        self.expected.iter().any(|id| id == contributor_id)
    }

    pub fn has_responded(&self, contributor_id: &str) -> bool {
        self.responded.contains(contributor_id)
    }

    fn is_accounted_for(&self, contributor_id: &str) -> bool {
        self.responded.contains(contributor_id) || self.timed_out.contains(contributor_id)
    }

    pub fn expected(&self) -> &[ContributorId] {
        &self.expected
    }

    pub fn responded_count(&self) -> usize {
        self.responded.len()
    }
}
