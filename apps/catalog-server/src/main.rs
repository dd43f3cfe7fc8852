//! `catalog-server`: the HTTP binary hosting the plugin runtime (spec.md
//! §4.10), modeled on `apps/hyperspot-server/src/main.rs`'s CLI shape and
//! `CancellationToken`-driven shutdown.

mod config;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use catalog_audit::{AuditConfig, AuditState, InMemoryAuditStore};
use catalog_authz::{AuthzState, CachingAuthorizer, NoopAuthorizer, TenantState};
use catalog_cache::{ResponseCache, ResponseCacheConfig};
use catalog_jobs::{JobStore, SeaOrmJobStore, WorkerPoolConfig};
use catalog_kit::registry::PluginRuntime;
use catalog_kit::{PluginConfig, PluginCtx};
use clap::{Parser, Subcommand};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::routes::DiscoveryState;

#[derive(Parser, Debug)]
#[command(name = "catalog-server", about = "Pluggable catalog control plane")]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `server.port`.
    #[arg(long)]
    port: Option<u16>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server (the default when no subcommand is given).
    Run,
    /// Validate the configuration without starting the listener.
    Check,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
    }

    let mut app_config = AppConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        app_config.server.port = port;
    }

    if cli.print_config {
        println!("{}", app_config.to_yaml()?);
        return Ok(());
    }

    init_tracing(cli.verbose);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => check_config(&app_config),
        Commands::Run => run_server(app_config).await,
    }
}

fn check_config(config: &AppConfig) -> anyhow::Result<()> {
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn ensure_refresh_jobs_table(db: &sea_orm::DatabaseConnection) -> anyhow::Result<()> {
    let backend = db.get_database_backend();
    let sql = match backend {
        DatabaseBackend::Postgres => {
            "CREATE TABLE IF NOT EXISTS refresh_jobs (
                id UUID PRIMARY KEY,
                namespace VARCHAR(255) NOT NULL,
                plugin VARCHAR(255) NOT NULL,
                source_id VARCHAR(255) NOT NULL,
                requested_by VARCHAR(255) NOT NULL,
                requested_at TIMESTAMPTZ NOT NULL,
                state VARCHAR(16) NOT NULL,
                attempt_count INT NOT NULL,
                last_error TEXT,
                started_at TIMESTAMPTZ,
                finished_at TIMESTAMPTZ,
                idempotency_key VARCHAR(255) UNIQUE,
                entities_loaded BIGINT,
                entities_removed BIGINT,
                duration_ms BIGINT,
                message TEXT
            )"
        }
        _ => {
            "CREATE TABLE IF NOT EXISTS refresh_jobs (
                id TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                plugin TEXT NOT NULL,
                source_id TEXT NOT NULL,
                requested_by TEXT NOT NULL,
                requested_at TEXT NOT NULL,
                state TEXT NOT NULL,
                attempt_count INTEGER NOT NULL,
                last_error TEXT,
                started_at TEXT,
                finished_at TEXT,
                idempotency_key TEXT UNIQUE,
                entities_loaded INTEGER,
                entities_removed INTEGER,
                duration_ms INTEGER,
                message TEXT
            )"
        }
    };
    db.execute(Statement::from_string(backend, sql)).await?;
    Ok(())
}

/// Builds the `PluginConfig` slice for `plugin_name` from the unified
/// sources document (if any) and this plugin's `plugins.<name>` settings.
fn plugin_config_for(
    plugin_name: &str,
    sources_doc: Option<&catalog_kit::yaml::CatalogSourcesDocument>,
    app_config: &AppConfig,
) -> PluginConfig {
    let sources = sources_doc
        .and_then(|doc| doc.catalogs.get(plugin_name))
        .map(|entry| serde_json::json!({ "sources": entry.sources }))
        .unwrap_or(serde_json::Value::Null);
    let settings = app_config
        .plugins
        .get(plugin_name)
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    PluginConfig { sources, settings }
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn run_server(app_config: AppConfig) -> anyhow::Result<()> {
    let instance_id = Uuid::new_v4();
    let cancel = CancellationToken::new();

    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        tracing::info!("shutdown signal received");
        shutdown_cancel.cancel();
    });

    let db = Database::connect(app_config.database.url.as_str()).await?;

    let lock = catalog_ha::acquire(&db, &instance_id.to_string()).await?;
    ensure_refresh_jobs_table(&db).await?;
    lock.release().await?;

    let audit_store: Arc<dyn catalog_audit::AuditStore> = Arc::new(InMemoryAuditStore::default());
    let job_store: Arc<dyn JobStore> = Arc::new(SeaOrmJobStore::new(db.clone()));

    let cache = ResponseCache::new(ResponseCacheConfig {
        discovery_ttl: std::time::Duration::from_secs(app_config.cache.discovery_ttl_seconds),
        capabilities_ttl: std::time::Duration::from_secs(app_config.cache.capabilities_ttl_seconds),
        max_entries: app_config.cache.max_entries,
    });
    let cache_invalidator: Arc<dyn catalog_kit::CacheInvalidator> = Arc::new(cache.clone());

    let authorizer: Arc<dyn catalog_authz::Authorizer> = Arc::new(CachingAuthorizer::with_ttl(
        NoopAuthorizer,
        std::time::Duration::from_secs(app_config.authz.cache_ttl_seconds),
    ));

    let sources_doc = app_config
        .sources_file
        .as_ref()
        .map(|path| catalog_kit::yaml::load_catalog_sources(std::path::Path::new(path)))
        .transpose()?;

    let mut runtime = PluginRuntime::new();
    runtime.register(model_catalog::build_registration());
    runtime.register(mcp_catalog::build_registration(Some(job_store.clone())));

    let refreshers = runtime.refreshers();
    runtime
        .init_all(|name| {
            PluginCtx::new(
                leak_name(name),
                plugin_config_for(name, sources_doc.as_ref(), &app_config),
                cancel.clone(),
                refreshers.clone(),
            )
            .with_invalidator(cache_invalidator.clone())
        })
        .await;

    runtime.start_all(cancel.clone()).await;

    for failed in runtime.failed() {
        tracing::warn!(plugin = failed.name, error = failed.error, "plugin failed to initialize");
    }

    let singleton_handles: Arc<tokio::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>> =
        Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let handles_slot = singleton_handles.clone();
    let jobs_cfg = WorkerPoolConfig {
        concurrency: app_config.jobs.concurrency,
        max_retries: app_config.jobs.max_retries,
        poll_interval: std::time::Duration::from_secs(app_config.jobs.poll_interval_seconds),
        claim_timeout: std::time::Duration::from_secs(app_config.jobs.claim_timeout_seconds),
        retention_days: app_config.jobs.retention_days,
    };
    let job_store_for_workers = job_store.clone();
    let audit_store_for_retention = audit_store.clone();
    let audit_retention_days = app_config.audit.retention_days;
    let leader_cancel = cancel.clone();
    catalog_ha::run_disabled(
        move |cancel| async move {
            let mut handles = catalog_jobs::spawn(job_store_for_workers, refreshers, jobs_cfg, cancel.clone());
            handles.push(tokio::spawn(catalog_audit::retention::run(
                audit_store_for_retention,
                audit_retention_days,
                cancel,
            )));
            *handles_slot.lock().await = handles;
        },
        leader_cancel,
    )
    .await;

    let runtime = Arc::new(runtime);

    let mut router = Router::new();
    router = runtime.mount_routes(router)?;
    router = router.nest(
        "/api/audit/v1alpha1/events",
        routes::audit_router(audit_store.clone()),
    );
    router = router.nest("/api/jobs/v1alpha1/refresh", routes::jobs_router(job_store.clone()));
    router = router.merge(routes::discovery_router(DiscoveryState { runtime: runtime.clone() }));

    let tenant_state = TenantState {
        mode: app_config.tenancy.mode(),
        default_namespace: app_config.tenancy.default_namespace.clone(),
    };
    let authz_state = AuthzState { authorizer };
    let audit_state = AuditState {
        store: audit_store.clone(),
        config: AuditConfig {
            enabled: app_config.audit.enabled,
            log_denied: app_config.audit.log_denied,
        },
    };

    let router = router
        .layer(axum::middleware::from_fn_with_state(cache, catalog_cache::cache_layer))
        .layer(axum::middleware::from_fn_with_state(audit_state, catalog_audit::audit_layer))
        .layer(axum::middleware::from_fn_with_state(authz_state, catalog_authz::authz_layer))
        .layer(axum::middleware::from_fn(catalog_authz::identity_layer))
        .layer(axum::middleware::from_fn_with_state(tenant_state, catalog_authz::tenant_layer))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, %instance_id, "catalog-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await?;

    for handle in singleton_handles.lock().await.drain(..) {
        let _ = handle.await;
    }
    runtime.stop_all().await;

    Ok(())
}

/// Plugin names are always known `'static` string literals from
/// `CatalogPlugin::name`; this turns the borrowed lookup key back into the
/// `'static` str `PluginCtx` expects without re-deriving it per plugin.
fn leak_name(name: &str) -> &'static str {
    match name {
        "model" => "model",
        "mcp" => "mcp",
        other => Box::leak(other.to_owned().into_boxed_str()),
    }
}
