use evisa_backend::api::{self, AppDependencies, AppState, PublicPayPalConfig};
use evisa_backend::config::AppConfig;
use evisa_backend::database::application_repository::PgApplicationRepository;
use evisa_backend::database::document_repository::PgDocumentRepository;
use evisa_backend::database::memory::InMemoryStore;
use evisa_backend::database::payment_repository::PgPaymentRepository;
use evisa_backend::database::repository::{
    ApplicationRepository, DocumentRepository, PaymentRepository, SnapshotRepository,
};
use evisa_backend::database::snapshot_repository::PgSnapshotRepository;
use evisa_backend::database::{init_pool_from_config, run_migrations};
use evisa_backend::health::HealthChecker;
use evisa_backend::logging::init_tracing;
use evisa_backend::middleware::auth::TokenVerifier;
use evisa_backend::payments::{PayPalGateway, PaymentGateway};
use evisa_backend::services::notification::sender_from_config;
use evisa_backend::storage::{InMemoryStorage, ObjectStorage, SupabaseStorage};
use http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

struct Repositories {
    applications: Arc<dyn ApplicationRepository>,
    payments: Arc<dyn PaymentRepository>,
    documents: Arc<dyn DocumentRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
}

fn in_memory_repositories() -> Repositories {
    let store = Arc::new(InMemoryStore::new());
    Repositories {
        applications: store.clone(),
        payments: store.clone(),
        documents: store.clone(),
        snapshots: store,
    }
}

fn postgres_repositories(pool: &sqlx::PgPool) -> Repositories {
    Repositories {
        applications: Arc::new(PgApplicationRepository::new(pool.clone())),
        payments: Arc::new(PgPaymentRepository::new(pool.clone())),
        documents: Arc::new(PgDocumentRepository::new(pool.clone())),
        snapshots: Arc::new(PgSnapshotRepository::new(pool.clone())),
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    let skip_externals = std::env::var("SKIP_EXTERNALS")
        .unwrap_or_else(|_| "false".to_string())
        .to_lowercase()
        == "true";

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        paypal_mode = config.paypal.mode.as_str(),
        "🚀 Starting e-Visa backend service"
    );

    let (db_pool, repositories, storage) = if skip_externals {
        info!("⏭️  Skipping database and object storage (SKIP_EXTERNALS=true)");
        let storage: Arc<dyn ObjectStorage> = Arc::new(InMemoryStorage::new());
        (None, in_memory_repositories(), storage)
    } else {
        if config.database.url.is_empty() {
            anyhow::bail!("DATABASE_URL not set");
        }
        info!("📊 Initializing database connection pool...");
        let pool = init_pool_from_config(&config.database).await.map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            e
        })?;
        info!(
            max_connections = pool.options().get_max_connections(),
            "✅ Database connection pool initialized"
        );

        if config.database.run_migrations {
            run_migrations(&pool).await?;
        }

        let storage: Arc<dyn ObjectStorage> = Arc::new(SupabaseStorage::new(&config.storage)?);
        info!(bucket = %config.storage.bucket, "✅ Object storage configured");

        let repositories = postgres_repositories(&pool);
        (Some(pool), repositories, storage)
    };

    if !config.paypal.has_credentials() {
        warn!("⚠️  PayPal credentials missing; order creation and capture will fail");
    }
    let gateway: Arc<dyn PaymentGateway> = Arc::new(PayPalGateway::new(config.paypal.clone())?);
    let email = sender_from_config(&config.email)?;

    let health_checker = HealthChecker::new(
        db_pool,
        config.paypal.has_credentials(),
        config.paypal.webhook_id.is_some(),
    );

    let state = AppState::new(AppDependencies {
        applications: repositories.applications,
        payments: repositories.payments,
        documents: repositories.documents,
        snapshots: repositories.snapshots,
        storage,
        gateway,
        email,
        admin_email: config.email.admin_email.clone(),
        token_verifier: Arc::new(TokenVerifier::new(&config.auth)),
        health_checker,
        paypal: PublicPayPalConfig {
            client_id: config.paypal.client_id.clone(),
            mode: config.paypal.mode,
        },
    });

    info!("🛣️  Setting up application routes...");
    let app = api::router(state).layer(cors_layer(&config.server.cors_allowed_origins));
    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");

    Ok(())
}
