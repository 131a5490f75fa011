//! # Message Model
//!
//! Tagged request/response envelopes exchanged with contributors over the bus.
//!
//! Every [`Message`] carries an explicit [`MessageBody`] discriminant, so routing
//! and state handling is a plain `match` on the tag. The correlation id is the only
//! field the mediator looks at; payloads are never inspected for routing.
//!
//! ```text
//! client ──IdentifyRequest──▶ collection destination ──▶ every contributor
//! client ◀─IdentifyResponse── contributor (reply_to)
//! client ──OperationRequest─▶ selected contributor destination
//! client ◀─ProgressResponse── contributor (zero or more)
//! client ◀─FinalResponse───── contributor (exactly one per request)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque token linking every message of one conversation.
pub type CorrelationId = String;
/// Stable identity of a contributor (pillar, service).
pub type ContributorId = String;
/// Bus destination name.
pub type Destination = String;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum OperationType {
    GetFile,
    PutFile,
    ReplaceFile,
    DeleteFile,
    GetChecksums,
    GetFileIds,
    GetAuditTrails,
    GetStatus,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum ResponseCode {
    IdentificationPositive,
    IdentificationNegative,
    OperationAcceptedProgress,
    OperationProgress,
    OperationCompleted,
    Failure,
    FileNotFoundFailure,
    FileTransferFailure,
    DuplicateFileFailure,
    ExistingFileChecksumFailure,
    NewFileChecksumFailure,
    RequestNotSupported,
    RequestNotUnderstoodFailure,
}

impl ResponseCode {
    pub fn is_positive_identification(&self) -> bool {
        matches!(self, ResponseCode::IdentificationPositive)
    }

    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            ResponseCode::OperationAcceptedProgress | ResponseCode::OperationProgress
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseCode::OperationCompleted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub code: ResponseCode,
    pub text: String,
}

impl ResponseInfo {
    pub fn new(code: ResponseCode, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum TimeMeasureUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl TimeMeasureUnit {
    fn millis(&self) -> u128 {
        match self {
            TimeMeasureUnit::Milliseconds => 1,
            TimeMeasureUnit::Seconds => 1_000,
            TimeMeasureUnit::Minutes => 60_000,
            TimeMeasureUnit::Hours => 3_600_000,
        }
    }
}

/// A declared duration with its unit, as reported by a contributor.
///
/// Values with different units are only comparable after [`TimeMeasure::as_millis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeMeasure {
    pub value: u64,
    pub unit: TimeMeasureUnit,
}

impl TimeMeasure {
    pub fn new(value: u64, unit: TimeMeasureUnit) -> Self {
        Self { value, unit }
    }

    pub fn millis(value: u64) -> Self {
        Self::new(value, TimeMeasureUnit::Milliseconds)
    }

    pub fn as_millis(&self) -> u128 {
        u128::from(self.value) * self.unit.millis()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum ChecksumType {
    Md5,
    Sha1,
    Sha256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumSpec {
    pub algorithm: ChecksumType,
    pub salt: Option<String>,
}

impl Default for ChecksumSpec {
    fn default() -> Self {
        Self {
            algorithm: ChecksumType::Md5,
            salt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumData {
    pub value: String,
    pub calculated_at: DateTime<Utc>,
}

impl ChecksumData {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            calculated_at: Utc::now(),
        }
    }

    pub fn same_value(&self, other: &ChecksumData) -> bool {
        self.value.eq_ignore_ascii_case(&other.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePart {
    pub offset: u64,
    pub length: u64,
}

/// Limits the result set requested from one contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContributorQuery {
    pub contributor_id: ContributorId,
    pub min_timestamp: Option<DateTime<Utc>>,
    pub max_timestamp: Option<DateTime<Utc>>,
    pub max_results: Option<usize>,
    pub min_sequence: Option<u64>,
    /// With `min_timestamp`, entries stamped exactly at the bound are returned
    /// when their file id sorts after this one.
    #[serde(default)]
    pub after_file_id: Option<String>,
}

impl ContributorQuery {
    pub fn new(contributor_id: impl Into<ContributorId>) -> Self {
        Self {
            contributor_id: contributor_id.into(),
            ..Default::default()
        }
    }

    /// Moves the lower bound past the given cursor.
    pub fn advanced(&self, cursor: &ResultCursor) -> Self {
        let mut next = self.clone();
        if cursor.min_sequence.is_some() {
            next.min_sequence = cursor.min_sequence;
        }
        if cursor.min_timestamp.is_some() {
            next.min_timestamp = cursor.min_timestamp;
            next.after_file_id = cursor.after_file_id.clone();
        }
        next
    }
}

/// Where a follow-up request should continue after a partial result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultCursor {
    pub min_sequence: Option<u64>,
    pub min_timestamp: Option<DateTime<Utc>>,
    /// Last file id delivered at `min_timestamp`.
    pub after_file_id: Option<String>,
}

/// Operation-specific request parameters, shared by identify and operation requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationParams {
    GetFile {
        file_id: String,
        delivery_url: String,
        file_part: Option<FilePart>,
    },
    PutFile {
        file_id: String,
        file_address: String,
        file_size: u64,
        checksum_for_validation: Option<ChecksumData>,
        checksum_request: Option<ChecksumSpec>,
    },
    ReplaceFile {
        file_id: String,
        file_address: String,
        file_size: u64,
        checksum_for_existing: Option<ChecksumData>,
        checksum_for_new: Option<ChecksumData>,
    },
    DeleteFile {
        file_id: String,
        checksum_for_validation: Option<ChecksumData>,
        checksum_request: Option<ChecksumSpec>,
    },
    GetChecksums {
        file_id: Option<String>,
        checksum_spec: ChecksumSpec,
        delivery_url: Option<String>,
        query: Option<ContributorQuery>,
    },
    GetFileIds {
        file_id: Option<String>,
        delivery_url: Option<String>,
        query: Option<ContributorQuery>,
    },
    GetAuditTrails {
        file_id: Option<String>,
        query: Option<ContributorQuery>,
    },
    GetStatus,
}

impl OperationParams {
    pub fn operation_type(&self) -> OperationType {
        match self {
            OperationParams::GetFile { .. } => OperationType::GetFile,
            OperationParams::PutFile { .. } => OperationType::PutFile,
            OperationParams::ReplaceFile { .. } => OperationType::ReplaceFile,
            OperationParams::DeleteFile { .. } => OperationType::DeleteFile,
            OperationParams::GetChecksums { .. } => OperationType::GetChecksums,
            OperationParams::GetFileIds { .. } => OperationType::GetFileIds,
            OperationParams::GetAuditTrails { .. } => OperationType::GetAuditTrails,
            OperationParams::GetStatus => OperationType::GetStatus,
        }
    }

    pub fn file_id(&self) -> Option<&str> {
        match self {
            OperationParams::GetFile { file_id, .. }
            | OperationParams::PutFile { file_id, .. }
            | OperationParams::ReplaceFile { file_id, .. }
            | OperationParams::DeleteFile { file_id, .. } => Some(file_id),
            OperationParams::GetChecksums { file_id, .. }
            | OperationParams::GetFileIds { file_id, .. }
            | OperationParams::GetAuditTrails { file_id, .. } => file_id.as_deref(),
            OperationParams::GetStatus => None,
        }
    }

    pub fn query(&self) -> Option<&ContributorQuery> {
        match self {
            OperationParams::GetChecksums { query, .. }
            | OperationParams::GetFileIds { query, .. }
            | OperationParams::GetAuditTrails { query, .. } => query.as_ref(),
            _ => None,
        }
    }

    /// Replaces the per-contributor query on the operations that support one.
    pub fn with_query(mut self, new_query: Option<ContributorQuery>) -> Self {
        match &mut self {
            OperationParams::GetChecksums { query, .. }
            | OperationParams::GetFileIds { query, .. }
            | OperationParams::GetAuditTrails { query, .. } => *query = new_query,
            _ => {}
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumEntry {
    pub file_id: String,
    pub checksum: ChecksumData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdEntry {
    pub file_id: String,
    pub last_modified: DateTime<Utc>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrailEvent {
    pub sequence: u64,
    pub file_id: Option<String>,
    pub actor: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub status: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload a contributor returns with its final response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OperationResult {
    #[default]
    None,
    FileDelivered {
        url: String,
    },
    Checksum(Option<ChecksumData>),
    Checksums(Vec<ChecksumEntry>),
    FileIds(Vec<FileIdEntry>),
    AuditTrails(Vec<AuditTrailEvent>),
    Status(StatusInfo),
}

impl OperationResult {
    /// Cursor continuing after the last entry of this page, if the result is pageable.
    ///
    /// Listings keyed by time continue after the last (timestamp, file id)
    /// pair, so entries sharing the boundary timestamp are not skipped. An
    /// audit trail ending at `u64::MAX` has nothing left to continue with.
    pub fn next_cursor(&self) -> Option<ResultCursor> {
        match self {
            OperationResult::AuditTrails(events) => events
                .iter()
                .map(|e| e.sequence)
                .max()
                .and_then(|last| last.checked_add(1))
                .map(|next| ResultCursor {
                    min_sequence: Some(next),
                    ..Default::default()
                }),
            OperationResult::FileIds(entries) => {
                after_last(entries.iter().map(|e| (e.last_modified, &e.file_id)))
            }
            OperationResult::Checksums(entries) => {
                after_last(entries.iter().map(|e| (e.checksum.calculated_at, &e.file_id)))
            }
            _ => None,
        }
    }
}

fn after_last<'a>(
    keys: impl Iterator<Item = (DateTime<Utc>, &'a String)>,
) -> Option<ResultCursor> {
    keys.max().map(|(timestamp, file_id)| ResultCursor {
        min_sequence: None,
        min_timestamp: Some(timestamp),
        after_file_id: Some(file_id.clone()),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    pub params: OperationParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub contributor_id: ContributorId,
    /// Where operation requests for this contributor should be sent.
    pub destination: Destination,
    pub info: ResponseInfo,
    pub time_to_deliver: Option<TimeMeasure>,
    /// Checksum of an already present file, reported with `DuplicateFileFailure`.
    pub checksum: Option<ChecksumData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub contributor_id: ContributorId,
    pub params: OperationParams,
    /// Counts the requests sent to this contributor within the conversation.
    pub request_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub contributor_id: ContributorId,
    pub info: ResponseInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResponse {
    pub contributor_id: ContributorId,
    pub info: ResponseInfo,
    pub result: OperationResult,
    /// More data exists than fitted this response.
    pub partial_result: bool,
    /// Echo of the answered request's `request_number`.
    #[serde(default)]
    pub request_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum MessageKind {
    IdentifyRequest,
    IdentifyResponse,
    OperationRequest,
    ProgressResponse,
    FinalResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    IdentifyRequest(IdentifyRequest),
    IdentifyResponse(IdentifyResponse),
    OperationRequest(OperationRequest),
    ProgressResponse(ProgressResponse),
    FinalResponse(FinalResponse),
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::IdentifyRequest(_) => MessageKind::IdentifyRequest,
            MessageBody::IdentifyResponse(_) => MessageKind::IdentifyResponse,
            MessageBody::OperationRequest(_) => MessageKind::OperationRequest,
            MessageBody::ProgressResponse(_) => MessageKind::ProgressResponse,
            MessageBody::FinalResponse(_) => MessageKind::FinalResponse,
        }
    }

    /// Contributor a response originates from; `None` for requests.
    pub fn responder(&self) -> Option<&str> {
        match self {
            MessageBody::IdentifyResponse(r) => Some(&r.contributor_id),
            MessageBody::ProgressResponse(r) => Some(&r.contributor_id),
            MessageBody::FinalResponse(r) => Some(&r.contributor_id),
            MessageBody::IdentifyRequest(_) | MessageBody::OperationRequest(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub correlation_id: CorrelationId,
    pub collection_id: String,
    pub from: String,
    pub to: Destination,
    pub reply_to: Destination,
    pub operation: OperationType,
    pub body: MessageBody,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    pub fn is_response(&self) -> bool {
        self.body.responder().is_some()
    }

    /// Builds a response to `request`, addressed to its `reply_to`.
    pub fn reply(
        request: &Message,
        from: impl Into<String>,
        own_destination: impl Into<Destination>,
        body: MessageBody,
    ) -> Message {
        Message {
            correlation_id: request.correlation_id.clone(),
            collection_id: request.collection_id.clone(),
            from: from.into(),
            to: request.reply_to.clone(),
            reply_to: own_destination.into(),
            operation: request.operation,
            body,
        }
    }
}
