//! medqa-relay server binary.
//!
//! Loads configuration from the environment, wires the adapters behind the
//! ports and serves `/ws` and `/health` until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use medqa_relay::adapters::ai::{
    LlmDraftGenerator, MockDraftGenerator, OpenAIProvider, RemoteAnswerService,
};
use medqa_relay::adapters::archive::PostgresConsultationArchive;
use medqa_relay::adapters::auth::{JwtTokenValidator, StaticTokenValidator};
use medqa_relay::adapters::context::StaticPatientContextProvider;
use medqa_relay::adapters::notifications::{InMemoryNotificationBus, RedisNotificationBus};
use medqa_relay::adapters::registry::InMemoryConnectionRegistry;
use medqa_relay::adapters::websocket::{websocket_router, WebSocketState};
use medqa_relay::application::{
    ArchiveReviewHandler, DraftDeliveryHandler, DraftPipeline, SessionOrchestrator,
};
use medqa_relay::config::{
    AppConfig, DraftBackend, NotificationBackend, ServerConfig, TokenPolicy,
};
use medqa_relay::domain::consultation::Confidence;
use medqa_relay::ports::{
    ConsultationArchive, DoctorTokenValidator, DraftGenerator, NotificationBus, Topic,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.server);
    config.validate().context("validating configuration")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = match config.notifications.backend {
        NotificationBackend::InMemory => {
            build_app(&config, Arc::new(InMemoryNotificationBus::new())).await?
        }
        NotificationBackend::Redis => {
            let redis = config
                .redis
                .as_ref()
                .context("redis notification backend needs MEDQA__REDIS__URL")?;
            let client = redis::Client::open(redis.url.as_str())?;
            let bus = tokio::time::timeout(
                redis.timeout(),
                RedisNotificationBus::connect(
                    client,
                    config.notifications.stream_settings(),
                    shutdown_rx,
                ),
            )
            .await
            .context("timed out connecting to redis")??;
            build_app(&config, Arc::new(bus)).await?
        }
    };

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        bus = ?config.notifications.backend,
        drafts = ?config.ai.draft_backend,
        "medqa-relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if server.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Wires every component around one notification bus.
async fn build_app<B>(config: &AppConfig, bus: Arc<B>) -> Result<Router>
where
    B: NotificationBus + 'static,
{
    let policy = config.consultation.draft_policy();
    let registry = Arc::new(InMemoryConnectionRegistry::new());

    // Each instance delivers only to its own registry, so draft topics are
    // read under a per-instance group. Archiving stays on the shared group.
    let delivery_group = config.notifications.delivery_group();
    for topic in [Topic::DraftReady, Topic::DraftFailed] {
        bus.subscribe(
            topic,
            &delivery_group,
            Arc::new(DraftDeliveryHandler::new(registry.clone(), policy)),
        );
    }
    if let Some(archive) = connect_archive(config).await? {
        bus.subscribe(
            Topic::ReviewDone,
            &config.notifications.consumer_group,
            Arc::new(ArchiveReviewHandler::new(archive)),
        );
    }

    let pipeline = DraftPipeline::new(
        draft_generator(config)?,
        Arc::new(StaticPatientContextProvider::new(
            config.consultation.default_context(),
        )),
        bus.clone(),
    );
    let orchestrator = Arc::new(SessionOrchestrator::new(
        registry,
        token_validator(config)?,
        pipeline,
        bus,
        policy,
    ));

    Ok(websocket_router()
        .with_state(WebSocketState::new(orchestrator))
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http()))
}

fn draft_generator(config: &AppConfig) -> Result<Arc<dyn DraftGenerator>> {
    let generator: Arc<dyn DraftGenerator> = match config.ai.draft_backend {
        DraftBackend::Remote => {
            let remote = config
                .ai
                .remote_config()
                .context("remote draft backend needs MEDQA__AI__REMOTE_URL")?;
            Arc::new(RemoteAnswerService::new(remote)?)
        }
        DraftBackend::OpenAI => {
            let openai = config
                .ai
                .openai_config()
                .context("openai draft backend needs MEDQA__AI__OPENAI_API_KEY")?;
            let provider = Arc::new(OpenAIProvider::new(openai)?);
            Arc::new(LlmDraftGenerator::new(provider, config.ai.llm_settings()))
        }
        DraftBackend::Mock => {
            tracing::warn!("Using mock draft generator");
            Arc::new(MockDraftGenerator::echoing(
                config.ai.mock_draft.clone(),
                Confidence::clamped(0.9),
            ))
        }
    };
    tracing::info!(generator = generator.name(), "Draft generator ready");
    Ok(generator)
}

fn token_validator(config: &AppConfig) -> Result<Arc<dyn DoctorTokenValidator>> {
    Ok(match config.auth.token_policy {
        TokenPolicy::Static => {
            let validator = StaticTokenValidator::new(config.auth.doctor_token_list());
            if validator.is_permissive() {
                tracing::warn!("No doctor tokens configured, any non-empty token is accepted");
            }
            Arc::new(validator)
        }
        TokenPolicy::Jwt => {
            let secret = config
                .auth
                .jwt_secret
                .as_ref()
                .context("jwt token policy needs MEDQA__AUTH__JWT_SECRET")?;
            Arc::new(JwtTokenValidator::new(secret))
        }
    })
}

async fn connect_archive(config: &AppConfig) -> Result<Option<Arc<dyn ConsultationArchive>>> {
    let Some(database) = &config.database else {
        tracing::info!("No database configured, reviewed answers are not archived");
        return Ok(None);
    };

    let pool = database
        .pool_options()
        .connect(&database.url)
        .await
        .context("connecting to the archive database")?;
    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Archive migrations applied");
    }
    Ok(Some(Arc::new(PostgresConsultationArchive::new(pool))))
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    }
}
