//! # Simulated Contributor
//!
//! An in-memory pillar answering identify and operation requests, for
//! integration tests and the demonstration binary.
//!
//! Files live in a map; nothing is actually transferred. Checksums are taken from
//! the request when supplied and otherwise derived from the file address.
//! Listings are sorted and paged by `page_size`; timestamp lower bounds are
//! exclusive so a continuation never repeats the last delivered entry.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    },
};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bus::{LocalMessageBus, MessageListener, MessageSender};
use crate::message::{
    AuditTrailEvent, ChecksumData, ChecksumEntry, ContributorId, ContributorQuery, Destination,
    FileIdEntry, FinalResponse, IdentifyResponse, Message, MessageBody, OperationParams,
    OperationRequest, OperationResult, OperationType, ProgressResponse, ResponseCode,
    ResponseInfo, StatusInfo, TimeMeasure,
};

#[derive(Debug, Clone)]
struct StoredFile {
    checksum: ChecksumData,
    size: u64,
    last_modified: DateTime<Utc>,
}

pub struct SimulatedPillar {
    id: ContributorId,
    destination: Destination,
    sender: Arc<dyn MessageSender>,
    time_to_deliver: TimeMeasure,
    checksum_only: bool,
    page_size: usize,
    files: DashMap<String, StoredFile>,
    audit: Mutex<Vec<AuditTrailEvent>>,
    responsive: AtomicBool,
    transfer_failures: AtomicU32,
}

impl SimulatedPillar {
    pub fn new(id: impl Into<ContributorId>, sender: Arc<dyn MessageSender>) -> Self {
        let id = id.into();
        Self {
            destination: format!("{}-topic", id),
            id,
            sender,
            time_to_deliver: TimeMeasure::millis(100),
            checksum_only: false,
            page_size: 1000,
            files: DashMap::new(),
            audit: Mutex::new(Vec::new()),
            responsive: AtomicBool::new(true),
            transfer_failures: AtomicU32::new(0),
        }
    }

    pub fn with_time_to_deliver(mut self, time_to_deliver: TimeMeasure) -> Self {
        self.time_to_deliver = time_to_deliver;
        self
    }

    /// Holds checksums only; file data requests are answered as unsupported.
    pub fn checksum_only(mut self) -> Self {
        self.checksum_only = true;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_file(self, file_id: &str, checksum: ChecksumData) -> Self {
        self.store(file_id, checksum, 0);
        self.record(Some(file_id), "put");
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn has_file(&self, file_id: &str) -> bool {
        self.files.contains_key(file_id)
    }

    pub fn checksum_of(&self, file_id: &str) -> Option<ChecksumData> {
        self.files.get(file_id).map(|f| f.checksum.clone())
    }

    /// An unresponsive pillar silently drops every request.
    pub fn set_responsive(&self, responsive: bool) {
        self.responsive.store(responsive, Ordering::SeqCst);
    }

    /// The next `count` transfers fail with `FileTransferFailure`.
    pub fn fail_next_transfers(&self, count: u32) {
        self.transfer_failures.store(count, Ordering::SeqCst);
    }

    /// Listens on the shared collection destination and on its own destination.
    pub fn attach(
        self: &Arc<Self>,
        bus: &LocalMessageBus,
        collection_destination: &str,
    ) -> Vec<JoinHandle<()>> {
        vec![
            bus.add_listener(collection_destination, self.clone()),
            bus.add_listener(&self.destination, self.clone()),
        ]
    }

    fn store(&self, file_id: &str, checksum: ChecksumData, size: u64) {
        let last_modified = checksum.calculated_at;
        self.files.insert(
            file_id.to_string(),
            StoredFile {
                checksum,
                size,
                last_modified,
            },
        );
    }

    fn record(&self, file_id: Option<&str>, action: &str) {
        if let Ok(mut audit) = self.audit.lock() {
            let sequence = audit.len() as u64 + 1;
            audit.push(AuditTrailEvent {
                sequence,
                file_id: file_id.map(str::to_string),
                actor: self.id.clone(),
                action: action.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    fn reply(&self, request: &Message, body: MessageBody) {
        let response = Message::reply(request, self.id.clone(), self.destination.clone(), body);
        if let Err(e) = self.sender.send_message(response) {
            warn!("{} failed to reply to {}: {}", self.id, request.correlation_id, e);
        }
    }

    fn identify(&self, request: &Message, params: &OperationParams) {
        let file = params.file_id().and_then(|id| self.files.get(id).map(|f| f.value().clone()));
        let data_operation = matches!(
            params.operation_type(),
            OperationType::GetFile | OperationType::PutFile | OperationType::ReplaceFile
        );

        let (code, checksum) = if self.checksum_only && data_operation {
            (ResponseCode::RequestNotSupported, None)
        } else {
            match (params, file) {
                (OperationParams::PutFile { .. }, Some(existing)) => {
                    (ResponseCode::DuplicateFileFailure, Some(existing.checksum))
                }
                (OperationParams::PutFile { .. }, None) => {
                    (ResponseCode::IdentificationPositive, None)
                }
                (
                    OperationParams::GetFile { .. }
                    | OperationParams::ReplaceFile { .. }
                    | OperationParams::DeleteFile { .. },
                    None,
                ) => (ResponseCode::FileNotFoundFailure, None),
                _ => (ResponseCode::IdentificationPositive, None),
            }
        };

        self.reply(
            request,
            MessageBody::IdentifyResponse(IdentifyResponse {
                contributor_id: self.id.clone(),
                destination: self.destination.clone(),
                info: ResponseInfo::new(code, format!("{} identified", self.id)),
                time_to_deliver: Some(self.time_to_deliver),
                checksum,
            }),
        );
    }

    fn perform(&self, message: &Message, request: &OperationRequest) {
        self.reply(
            message,
            MessageBody::ProgressResponse(ProgressResponse {
                contributor_id: self.id.clone(),
                info: ResponseInfo::new(ResponseCode::OperationAcceptedProgress, "accepted"),
            }),
        );

        let (code, result, partial_result) = self.execute(&request.params);
        self.reply(
            message,
            MessageBody::FinalResponse(FinalResponse {
                contributor_id: self.id.clone(),
                info: ResponseInfo::new(code, format!("{} {}", self.id, code)),
                result,
                partial_result,
                request_number: request.request_number,
            }),
        );
    }

    fn execute(&self, params: &OperationParams) -> (ResponseCode, OperationResult, bool) {
        match params {
            OperationParams::GetFile {
                file_id,
                delivery_url,
                ..
            } => {
                if !self.has_file(file_id) {
                    return (ResponseCode::FileNotFoundFailure, OperationResult::None, false);
                }
                (
                    ResponseCode::OperationCompleted,
                    OperationResult::FileDelivered {
                        url: delivery_url.clone(),
                    },
                    false,
                )
            }
            OperationParams::PutFile {
                file_id,
                file_address,
                file_size,
                checksum_for_validation,
                checksum_request,
            } => {
                if self.take_transfer_failure() {
                    return (ResponseCode::FileTransferFailure, OperationResult::None, false);
                }
                let checksum = checksum_for_validation
                    .clone()
                    .unwrap_or_else(|| address_checksum(file_address));
                self.store(file_id, checksum.clone(), *file_size);
                self.record(Some(file_id), "put");
                let result = checksum_request
                    .as_ref()
                    .map(|_| OperationResult::Checksum(Some(checksum)))
                    .unwrap_or_default();
                (ResponseCode::OperationCompleted, result, false)
            }
            OperationParams::ReplaceFile {
                file_id,
                file_address,
                file_size,
                checksum_for_existing,
                checksum_for_new,
            } => {
                let Some(existing) = self.checksum_of(file_id) else {
                    return (ResponseCode::FileNotFoundFailure, OperationResult::None, false);
                };
                if !checksum_for_existing
                    .as_ref()
                    .is_some_and(|c| c.same_value(&existing))
                {
                    return (
                        ResponseCode::ExistingFileChecksumFailure,
                        OperationResult::None,
                        false,
                    );
                }
                if self.take_transfer_failure() {
                    return (ResponseCode::FileTransferFailure, OperationResult::None, false);
                }
                let checksum = checksum_for_new
                    .clone()
                    .unwrap_or_else(|| address_checksum(file_address));
                self.store(file_id, checksum.clone(), *file_size);
                self.record(Some(file_id), "replace");
                (
                    ResponseCode::OperationCompleted,
                    OperationResult::Checksum(Some(checksum)),
                    false,
                )
            }
            OperationParams::DeleteFile {
                file_id,
                checksum_for_validation,
                ..
            } => {
                let Some(existing) = self.checksum_of(file_id) else {
                    return (ResponseCode::FileNotFoundFailure, OperationResult::None, false);
                };
                if !checksum_for_validation
                    .as_ref()
                    .is_some_and(|c| c.same_value(&existing))
                {
                    return (
                        ResponseCode::ExistingFileChecksumFailure,
                        OperationResult::None,
                        false,
                    );
                }
                self.files.remove(file_id);
                self.record(Some(file_id), "delete");
                (
                    ResponseCode::OperationCompleted,
                    OperationResult::Checksum(Some(existing)),
                    false,
                )
            }
            OperationParams::GetChecksums { file_id, query, .. } => {
                let mut entries: Vec<ChecksumEntry> = self
                    .files
                    .iter()
                    .filter(|f| file_id.as_deref().map_or(true, |id| id == f.key()))
                    .filter(|f| within(query.as_ref(), f.checksum.calculated_at, Some(f.key().as_str())))
                    .map(|f| ChecksumEntry {
                        file_id: f.key().clone(),
                        checksum: f.checksum.clone(),
                    })
                    .collect();
                entries.sort_by(|a, b| {
                    (a.checksum.calculated_at, &a.file_id).cmp(&(b.checksum.calculated_at, &b.file_id))
                });
                let partial = self.truncate(&mut entries, query.as_ref());
                (
                    ResponseCode::OperationCompleted,
                    OperationResult::Checksums(entries),
                    partial,
                )
            }
            OperationParams::GetFileIds { file_id, query, .. } => {
                let mut entries: Vec<FileIdEntry> = self
                    .files
                    .iter()
                    .filter(|f| file_id.as_deref().map_or(true, |id| id == f.key()))
                    .filter(|f| within(query.as_ref(), f.last_modified, Some(f.key().as_str())))
                    .map(|f| FileIdEntry {
                        file_id: f.key().clone(),
                        last_modified: f.last_modified,
                        size: Some(f.size),
                    })
                    .collect();
                entries.sort_by(|a, b| {
                    (a.last_modified, &a.file_id).cmp(&(b.last_modified, &b.file_id))
                });
                let partial = self.truncate(&mut entries, query.as_ref());
                (
                    ResponseCode::OperationCompleted,
                    OperationResult::FileIds(entries),
                    partial,
                )
            }
            OperationParams::GetAuditTrails { file_id, query } => {
                let mut events: Vec<AuditTrailEvent> = self
                    .audit
                    .lock()
                    .map(|audit| audit.clone())
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|e| file_id.is_none() || e.file_id == *file_id)
                    .filter(|e| {
                        query
                            .as_ref()
                            .and_then(|q| q.min_sequence)
                            .map_or(true, |min| e.sequence >= min)
                    })
                    .filter(|e| within(query.as_ref(), e.timestamp, None))
                    .collect();
                events.sort_by_key(|e| e.sequence);
                let partial = self.truncate(&mut events, query.as_ref());
                (
                    ResponseCode::OperationCompleted,
                    OperationResult::AuditTrails(events),
                    partial,
                )
            }
            OperationParams::GetStatus => (
                ResponseCode::OperationCompleted,
                OperationResult::Status(StatusInfo {
                    status: "OK".to_string(),
                    text: format!("{} holds {} file(s)", self.id, self.files.len()),
                    timestamp: Utc::now(),
                }),
                false,
            ),
        }
    }

    /// Cuts `entries` to one page, returning whether anything was left out.
    fn truncate<T>(&self, entries: &mut Vec<T>, query: Option<&ContributorQuery>) -> bool {
        let limit = query
            .and_then(|q| q.max_results)
            .map_or(self.page_size, |max| max.min(self.page_size))
            .max(1);
        let partial = entries.len() > limit;
        entries.truncate(limit);
        partial
    }

    fn take_transfer_failure(&self) -> bool {
        self.transfer_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl MessageListener for SimulatedPillar {
    fn on_message(&self, message: Message) {
        if !self.responsive.load(Ordering::SeqCst) {
            debug!("{} unresponsive, dropping {}", self.id, message.kind());
            return;
        }
        match &message.body {
            MessageBody::IdentifyRequest(request) => self.identify(&message, &request.params),
            MessageBody::OperationRequest(request) if request.contributor_id == self.id => {
                self.perform(&message, request)
            }
            MessageBody::OperationRequest(request) => debug!(
                "{} ignoring request for {}",
                self.id, request.contributor_id
            ),
            _ => debug!("{} ignoring {}", self.id, message.kind()),
        }
    }
}

/// `min_timestamp` is exclusive unless `after_file_id` continues a page at that instant.
fn within(
    query: Option<&ContributorQuery>,
    timestamp: DateTime<Utc>,
    file_id: Option<&str>,
) -> bool {
    let Some(query) = query else {
        return true;
    };
    let after_min = match query.min_timestamp {
        None => true,
        Some(min) if timestamp == min => match (query.after_file_id.as_deref(), file_id) {
            (Some(after), Some(id)) => id > after,
            _ => false,
        },
        Some(min) => timestamp > min,
    };
    after_min && query.max_timestamp.map_or(true, |max| timestamp <= max)
}

fn address_checksum(file_address: &str) -> ChecksumData {
    let mut hasher = DefaultHasher::new();
    file_address.hash(&mut hasher);
    ChecksumData::new(format!("{:016x}", hasher.finish()))
}

/// Checksum data stamped `offset_ms` after `base`, for building ordered fixtures.
pub fn checksum_at(value: &str, base: DateTime<Utc>, offset_ms: i64) -> ChecksumData {
    ChecksumData {
        value: value.to_string(),
        calculated_at: base + Duration::milliseconds(offset_ms),
    }
}
