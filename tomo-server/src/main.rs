// tomo-server: run companions against a message relay, or talk to it from the shell

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tomo_companion::{AnimationPlayer, CompanionRoster};
use tomo_core::CompanionId;
use tomo_nav::CrowdNavigationManager;
use tomo_protocol::{
    ChatMessage, OutboundQuery, ProtocolRouter, QueryCorrelator, QueryResponder, RouteDecision,
    Transport,
};
use tomo_server::animation::LoggingAnimationPlayer;
use tomo_server::answerer::SceneAnswerer;
use tomo_server::coordinator::PlayerFactory;
use tomo_server::scene::{SceneFacts, SceneFile};
use tomo_server::speech::LoggingSpeech;
use tomo_server::{logging, ws, Coordinator, ServerConfig};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tomo-server")]
#[command(about = "Companion coordinator for shared spaces", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Relay endpoint, overrides the configuration
    #[arg(long, global = true)]
    endpoint: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the relay and drive the configured companions
    Run {
        /// Scene file with walkable geometry and furniture (JSON)
        #[arg(long)]
        scene: Option<PathBuf>,
    },

    /// Send one query and print the result
    Ask {
        /// Query type: objects, user, speak, ...
        query_type: String,

        /// Companion the query is sent on behalf of (name or id)
        #[arg(long, default_value = "natsumi")]
        from: String,

        /// Query body as a JSON object
        #[arg(long)]
        body: Option<String>,

        /// Timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Send a chat line from the user to every configured companion
    Say {
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(endpoint) = cli.endpoint {
        config.protocol.endpoint = endpoint;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    logging::init(&config.log_level, config.log_json)?;

    match cli.command {
        Commands::Run { scene } => run(config, scene).await,
        Commands::Ask {
            query_type,
            from,
            body,
            timeout_ms,
        } => ask(config, query_type, from, body, timeout_ms).await,
        Commands::Say { message } => say(config, message).await,
    }
}

fn companion_id(name_or_id: &str) -> CompanionId {
    if name_or_id.starts_with(tomo_core::ids::COMPANION_ID_PREFIX) {
        CompanionId::new(name_or_id)
    } else {
        CompanionId::from_name(name_or_id)
    }
}

async fn run(config: ServerConfig, scene: Option<PathBuf>) -> anyhow::Result<()> {
    let scene_path = scene.or_else(|| config.scene_path.clone());
    let scene = match &scene_path {
        Some(path) => Some(SceneFile::load(path).with_context(|| format!("loading {}", path.display()))?),
        None => None,
    };
    let facts = scene.as_ref().map(SceneFacts::from_scene).unwrap_or_default();

    let relay = ws::connect(&config.protocol).await?;
    let transport: Arc<dyn Transport> = Arc::new(relay.transport.clone());

    let (events_tx, events_rx) = mpsc::channel(64);
    let speakers: HashMap<CompanionId, u32> = config
        .companions
        .roster
        .iter()
        .map(|p| (CompanionId::from_name(&p.name), p.speaker_id))
        .collect();
    let answerer = SceneAnswerer::new(facts, speakers, Arc::new(LoggingSpeech), events_tx.clone());

    let correlator = QueryCorrelator::new(
        transport.clone(),
        config.protocol.default_query_timeout(),
        config.protocol.speak_timeout(),
    );
    let responder = QueryResponder::new(Arc::new(answerer), transport);

    let mut coordinator = Coordinator::new(
        CrowdNavigationManager::new(config.crowd.clone()),
        CompanionRoster::new(config.companions.clone()),
        correlator,
        responder,
        config.tick_interval(),
    );

    let clips: Arc<HashSet<String>> = Arc::new(config.companions.animations.iter().cloned().collect());
    let gesture_duration = config.gesture_duration();
    let players: PlayerFactory = Box::new(move |id: &CompanionId| -> Box<dyn AnimationPlayer> {
        Box::new(LoggingAnimationPlayer::new(id.clone(), clips.clone(), gesture_duration))
    });
    coordinator.spawn_roster(&players);

    match scene.as_ref().map(SceneFile::geometry) {
        Some(geometry) if !geometry.is_empty() => {
            if let Err(e) = coordinator.bake(&geometry) {
                warn!("Scene geometry rejected: {}", e);
            }
        }
        _ => info!("No walkable geometry yet; companions stay put until it arrives"),
    }

    coordinator
        .run(relay.inbound, events_rx, async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    relay.task.abort();
    info!("Shutdown complete");
    Ok(())
}

async fn ask(
    config: ServerConfig,
    query_type: String,
    from: String,
    body: Option<String>,
    timeout_ms: Option<u64>,
) -> anyhow::Result<()> {
    let mut query = OutboundQuery::new(companion_id(&from), query_type);
    if let Some(body) = body {
        match serde_json::from_str::<Value>(&body).context("parsing --body")? {
            Value::Object(map) => query.body = map,
            _ => anyhow::bail!("--body must be a JSON object"),
        }
    }

    let relay = ws::connect(&config.protocol).await?;
    let mut inbound = relay.inbound;
    let correlator = QueryCorrelator::new(
        Arc::new(relay.transport.clone()),
        config.protocol.default_query_timeout(),
        config.protocol.speak_timeout(),
    );

    let listener = {
        let correlator = correlator.clone();
        tokio::spawn(async move {
            let router = ProtocolRouter::new();
            while let Some(frame) = inbound.recv().await {
                if let RouteDecision::QueryResponse(response) = router.route(&frame) {
                    let _ = correlator.resolve(response);
                }
            }
        })
    };

    let timeout = match (timeout_ms, query.query_type.as_str()) {
        (Some(ms), _) => Duration::from_millis(ms),
        (None, "speak") => config.protocol.speak_timeout(),
        (None, _) => config.protocol.default_query_timeout(),
    };
    let result = correlator.send(query, timeout).await;

    listener.abort();
    relay.task.abort();

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn say(config: ServerConfig, message: String) -> anyhow::Result<()> {
    let ids: Vec<CompanionId> = config
        .companions
        .roster
        .iter()
        .map(|p| CompanionId::from_name(&p.name))
        .collect();
    let chat = ChatMessage::from_user(ids.iter(), &message);

    let relay = ws::connect(&config.protocol).await?;
    relay.transport.send_json(&chat.to_frame()).await?;
    info!("Sent chat {} to {} companions", chat.id, ids.len());

    // Dropping the last sender closes the socket after the frame is written
    drop(relay.transport);
    let _ = relay.task.await;
    Ok(())
}
