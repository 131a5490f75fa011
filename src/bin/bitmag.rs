use bitmag::{
    bus::LocalMessageBus,
    client::{
        ClientCore, DeleteFileClient, GetAuditTrailsClient, GetChecksumsClient, GetFileClient,
        GetFileIdsClient, GetStatusClient, PutFileClient,
    },
    config::ClientSettings,
    event::{BlockingEventHandler, EventHandler, OperationEvent},
    mediator::ConversationMediator,
    message::{ChecksumData, ChecksumSpec, TimeMeasure},
    simulator::SimulatedPillar,
    ClientError, ClientResult,
};
use clap::{command, Parser, Subcommand};
use rand::Rng;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEMO_COLLECTION: &str = "demo";
const SEEDED_FILES: usize = 3;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = DEMO_COLLECTION)]
    collection: String,

    /// Print every operation event
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    operation: Operation,
}

#[derive(Subcommand)]
enum Operation {
    GetFile {
        file_id: String,
        #[arg(long, default_value = "http://localhost/delivery")]
        delivery_url: String,
    },
    PutFile {
        file_id: String,
        file_address: String,
        #[arg(long, default_value_t = 0)]
        size: u64,
    },
    DeleteFile {
        contributor: String,
        file_id: String,
        checksum: String,
    },
    GetChecksums,
    GetFileIds,
    GetAuditTrails,
    GetStatus,
}

fn load_settings(cli: &Cli) -> ClientResult<ClientSettings> {
    let settings = match &cli.config {
        Some(path) => ClientSettings::from_file(path)?,
        None => ClientSettings::default(),
    };
    if settings.collections.is_empty() {
        return Ok(settings.with_collection(DEMO_COLLECTION, &["pillar1", "pillar2", "pillar3"]));
    }
    Ok(settings)
}

/// Starts one simulated pillar per configured contributor, seeded with a few files.
fn start_pillars(bus: &Arc<LocalMessageBus>, settings: &ClientSettings, collection: &str) -> ClientResult<()> {
    let mut rng = rand::thread_rng();
    for contributor in settings.contributors(collection)? {
        let mut pillar = SimulatedPillar::new(contributor.clone(), bus.clone())
            .with_time_to_deliver(TimeMeasure::millis(rng.gen_range(50..500)));
        for i in 1..=SEEDED_FILES {
            pillar = pillar.with_file(&format!("file-{}", i), ChecksumData::new(format!("{:032x}", i)));
        }
        let pillar = Arc::new(pillar);
        pillar.attach(bus, &settings.collection_destination);
        debug!("Started simulated pillar {}", pillar.id());
    }
    Ok(())
}

async fn run(cli: &Cli) -> ClientResult<()> {
    let settings = load_settings(cli)?;
    info!("settings loaded.");
    debug!("settings: {:?}", settings);

    let bus = Arc::new(LocalMessageBus::new(settings.bus_capacity));
    start_pillars(&bus, &settings, &cli.collection)?;

    let mediator = ConversationMediator::new();
    bus.add_listener(&settings.receiver_destination, Arc::new(mediator.clone()));
    let core = ClientCore::new(settings, mediator.clone(), bus.clone());

    let printer: Option<Arc<dyn EventHandler>> = if cli.verbose {
        Some(Arc::new(|event: &OperationEvent| {
            println!("[{}] {}: {}", event.conversation_id, event.event_type(), event.info);
        }))
    } else {
        None
    };
    let handler = Arc::new(BlockingEventHandler::new(printer));
    let events: Option<Arc<dyn EventHandler>> = Some(handler.clone());
    let collection = cli.collection.as_str();

    let conversation_id = match &cli.operation {
        Operation::GetFile {
            file_id,
            delivery_url,
        } => GetFileClient::new(core).get_file(collection, file_id, delivery_url, None, events)?,
        Operation::PutFile {
            file_id,
            file_address,
            size,
        } => PutFileClient::new(core).put_file(
            collection,
            file_id,
            file_address,
            *size,
            None,
            Some(ChecksumSpec::default()),
            events,
        )?,
        Operation::DeleteFile {
            contributor,
            file_id,
            checksum,
        } => DeleteFileClient::new(core).delete_file(
            collection,
            contributor,
            file_id,
            Some(ChecksumData::new(checksum.clone())),
            None,
            events,
        )?,
        Operation::GetChecksums => GetChecksumsClient::new(core).get_checksums(
            collection,
            Vec::new(),
            None,
            ChecksumSpec::default(),
            None,
            events,
        )?,
        Operation::GetFileIds => {
            GetFileIdsClient::new(core).get_file_ids(collection, Vec::new(), None, None, events)?
        }
        Operation::GetAuditTrails => {
            GetAuditTrailsClient::new(core).get_audit_trails(collection, Vec::new(), None, events)?
        }
        Operation::GetStatus => GetStatusClient::new(core).get_status(collection, events)?,
    };
    info!("Started conversation {}", conversation_id);

    let outcome = handler.await_results().await;
    mediator.shutdown();
    let results = outcome?;

    let output = serde_json::to_string_pretty(&results)
        .map_err(|e| ClientError::Internal(format!("Failed to render results: {}", e)))?;
    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
