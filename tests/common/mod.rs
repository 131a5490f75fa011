#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use bitmag::{
    bus::LocalMessageBus,
    client::ClientCore,
    config::ClientSettings,
    event::{BlockingEventHandler, EventHandler, OperationEvent, OperationEventType},
    mediator::ConversationMediator,
    message::{
        IdentifyResponse, Message, MessageBody, OperationType, ResponseCode, ResponseInfo,
        TimeMeasure,
    },
    simulator::SimulatedPillar,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

pub const COLLECTION: &str = "books";

pub fn settings(contributors: &[&str]) -> ClientSettings {
    let mut settings = ClientSettings::default().with_collection(COLLECTION, contributors);
    settings.identification_timeout = Duration::from_millis(300);
    settings.operation_timeout = Duration::from_secs(2);
    settings.conversation_timeout = Duration::from_secs(5);
    settings
}

/// A client wired to simulated pillars over an in-process bus.
pub struct Harness {
    pub bus: Arc<LocalMessageBus>,
    pub mediator: ConversationMediator,
    pub core: ClientCore,
    pub pillars: HashMap<String, Arc<SimulatedPillar>>,
}

impl Harness {
    /// Must run inside a Tokio runtime; listeners are spawned tasks.
    pub fn new<F>(settings: ClientSettings, build: F) -> Self
    where
        F: FnOnce(&Arc<LocalMessageBus>) -> Vec<SimulatedPillar>,
    {
        let bus = Arc::new(LocalMessageBus::new(settings.bus_capacity));
        let mut pillars = HashMap::new();
        for pillar in build(&bus) {
            let pillar = Arc::new(pillar);
            pillar.attach(&bus, &settings.collection_destination);
            pillars.insert(pillar.id().to_string(), pillar);
        }
        let mediator = ConversationMediator::new();
        bus.add_listener(&settings.receiver_destination, Arc::new(mediator.clone()));
        let core = ClientCore::new(settings, mediator.clone(), bus.clone());
        Self {
            bus,
            mediator,
            core,
            pillars,
        }
    }

    pub fn pillar(&self, id: &str) -> &Arc<SimulatedPillar> {
        &self.pillars[id]
    }
}

pub fn pillar(bus: &Arc<LocalMessageBus>, id: &str, millis: u64) -> SimulatedPillar {
    SimulatedPillar::new(id, bus.clone()).with_time_to_deliver(TimeMeasure::millis(millis))
}

/// Records every event and exposes the blocking outcome.
pub struct Recorder {
    pub events: Arc<Mutex<Vec<OperationEvent>>>,
    pub blocking: Arc<BlockingEventHandler>,
}

impl Recorder {
    pub fn new() -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let inner: Arc<dyn EventHandler> = Arc::new(move |event: &OperationEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        Self {
            events,
            blocking: Arc::new(BlockingEventHandler::new(Some(inner))),
        }
    }

    pub fn handler(&self) -> Option<Arc<dyn EventHandler>> {
        Some(self.blocking.clone())
    }

    pub fn types(&self) -> Vec<OperationEventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type())
            .collect()
    }

    pub fn events(&self) -> Vec<OperationEvent> {
        self.events.lock().unwrap().clone()
    }
}

pub fn identify_response(
    operation: OperationType,
    contributor: &str,
    code: ResponseCode,
    time_to_deliver: Option<TimeMeasure>,
) -> Message {
    Message {
        correlation_id: "conversation-1".to_string(),
        collection_id: COLLECTION.to_string(),
        from: contributor.to_string(),
        to: "client-topic".to_string(),
        reply_to: format!("{}-topic", contributor),
        operation,
        body: MessageBody::IdentifyResponse(IdentifyResponse {
            contributor_id: contributor.to_string(),
            destination: format!("{}-topic", contributor),
            info: ResponseInfo::new(code, "identify"),
            time_to_deliver,
            checksum: None,
        }),
    }
}
