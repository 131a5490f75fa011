use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::debug;

use crate::{ClientError, ClientResult};

use super::{deliver, ContributorResult, EventHandler, OperationEvent, OperationEventKind};

/// Turns the event stream of one conversation into a single awaitable outcome.
///
/// Every event is forwarded to the optional inner handler. `ComponentComplete`
/// results are accumulated in arrival order, and the first terminal event fills
/// a single-slot handoff that [`BlockingEventHandler::await_finished`] waits on.
pub struct BlockingEventHandler {
    inner: Option<Arc<dyn EventHandler>>,
    results: Mutex<Vec<ContributorResult>>,
    terminal: Mutex<Option<OperationEvent>>,
    finish_tx: Mutex<Option<oneshot::Sender<OperationEvent>>>,
    finish_rx: Mutex<Option<oneshot::Receiver<OperationEvent>>>,
}

impl BlockingEventHandler {
    pub fn new(inner: Option<Arc<dyn EventHandler>>) -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            inner,
            results: Mutex::new(Vec::new()),
            terminal: Mutex::new(None),
            finish_tx: Mutex::new(Some(tx)),
            finish_rx: Mutex::new(Some(rx)),
        }
    }

    /// Waits for the terminal event. There is no timeout of its own; the
    /// conversation always ends in `Complete` or `Failed`.
    pub async fn await_finished(&self) -> ClientResult<OperationEvent> {
        if let Some(event) = self.finished_event() {
            return Ok(event);
        }
        let rx = self.take_receiver()?;
        rx.await
            .map_err(|_| ClientError::internal("conversation ended without a terminal event"))
    }

    /// Blocking variant of [`Self::await_finished`] for synchronous callers.
    ///
    /// Must not be called from within an async runtime context.
    pub fn blocking_await_finished(&self) -> ClientResult<OperationEvent> {
        if let Some(event) = self.finished_event() {
            return Ok(event);
        }
        let rx = self.take_receiver()?;
        rx.blocking_recv()
            .map_err(|_| ClientError::internal("conversation ended without a terminal event"))
    }

    /// Waits for the outcome and converts a `Failed` event into a negative response.
    pub async fn await_results(&self) -> ClientResult<Vec<ContributorResult>> {
        let event = self.await_finished().await?;
        self.outcome(event)
    }

    pub fn blocking_await_results(&self) -> ClientResult<Vec<ContributorResult>> {
        let event = self.blocking_await_finished()?;
        self.outcome(event)
    }

    pub fn results(&self) -> Vec<ContributorResult> {
        self.results
            .lock()
            .map(|results| results.clone())
            .unwrap_or_default()
    }

    fn outcome(&self, event: OperationEvent) -> ClientResult<Vec<ContributorResult>> {
        match event.kind {
            OperationEventKind::Failed { code } => Err(ClientError::NegativeResponse {
                info: event.info,
                code,
            }),
            _ => Ok(self.results()),
        }
    }

    fn finished_event(&self) -> Option<OperationEvent> {
        self.terminal.lock().ok().and_then(|slot| slot.clone())
    }

    fn take_receiver(&self) -> ClientResult<oneshot::Receiver<OperationEvent>> {
        self.finish_rx
            .lock()
            .map_err(|_| ClientError::internal("finish slot poisoned"))?
            .take()
            .ok_or_else(|| ClientError::internal("already awaiting the terminal event"))
    }
}

impl Default for BlockingEventHandler {
    fn default() -> Self {
        Self::new(None)
    }
}

impl EventHandler for BlockingEventHandler {
    fn handle_event(&self, event: &OperationEvent) {
        if let Some(inner) = &self.inner {
            deliver(inner.as_ref(), event);
        }

        if let OperationEventKind::ComponentComplete(result) = &event.kind {
            if let Ok(mut results) = self.results.lock() {
                results.push(result.clone());
            }
        }

        if event.is_terminal() {
            if let Ok(mut terminal) = self.terminal.lock() {
                if terminal.is_some() {
                    debug!("Ignoring second terminal event for {}", event.conversation_id);
                    return;
                }
                *terminal = Some(event.clone());
            }
            let sender = self.finish_tx.lock().ok().and_then(|mut tx| tx.take());
            if let Some(tx) = sender {
                let _ = tx.send(event.clone());
            }
        }
    }
}
