use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use campus_core::{CampusConfig, Clock, SystemClock};
use campus_notify::{HttpPush, PushChannel, SqliteNotificationStore, UnconfiguredPush};
use campus_reminders::{ReminderEngine, SqliteReminderStore};
use campus_transit::{ArrivalEstimator, TransitClient};
use clap::Parser;
use tracing::{info, warn};

mod app;
mod http;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (overrides CAMPUS_CONFIG).
    #[arg(long)]
    config: Option<String>,

    /// Run one reminder cycle, print its summary as JSON and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "campus_gateway=info,campus_reminders=info,tower_http=debug".into()
            }),
        )
        .init();

    let args = Args::parse();

    // load config: explicit path > CAMPUS_CONFIG env > ~/.campus/campus.toml
    let config_path = args.config.or_else(|| std::env::var("CAMPUS_CONFIG").ok());
    let config = CampusConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CampusConfig::default()
    });

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = campus_reminders::db::open(&db_path)?;
    campus_reminders::db::init_db(&db)?;
    campus_notify::db::init_db(&db)?;
    info!("database migrations complete");

    // each subsystem gets its own connection
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let reminders = Arc::new(SqliteReminderStore::new(db, Arc::clone(&clock)));
    let notifications = Arc::new(SqliteNotificationStore::new(campus_reminders::db::open(
        &db_path,
    )?));
    let engine = Arc::new(ReminderEngine::new(
        reminders,
        notifications,
        build_push(&config),
        Arc::clone(&clock),
        &config.reminders,
    ));

    if args.once {
        let summary = engine.run_cycle().await?;
        println!("{}", serde_json::to_string(&summary)?);
        return Ok(());
    }

    let estimator: Option<Arc<dyn ArrivalEstimator>> = match config.transit.clone() {
        Some(transit) => {
            info!(city = %transit.city, "transit API lookups enabled");
            Some(Arc::new(TransitClient::new(transit, Arc::clone(&clock))))
        }
        None => None,
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let poll_secs = config.reminders.poll_interval_secs;
    if poll_secs > 0 {
        let engine = Arc::clone(&engine);
        tokio::spawn(engine.run(Duration::from_secs(poll_secs), shutdown_rx));
    } else {
        info!("reminder poll loop disabled; cycles run only via the check endpoint");
    }

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, engine, estimator));
    let router = app::build_router(state);

    info!("Campus gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // signal the poll loop to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Realtime push from config. Both endpoint and secret must be set.
fn build_push(config: &CampusConfig) -> Arc<dyn PushChannel> {
    let timeout = Duration::from_millis(config.reminders.push_timeout_ms);
    match (&config.push.endpoint, &config.push.secret) {
        (Some(endpoint), Some(secret)) => {
            match HttpPush::new(endpoint.clone(), secret.clone(), timeout) {
                Ok(push) => {
                    info!(endpoint = %endpoint, "realtime push enabled");
                    Arc::new(push)
                }
                Err(e) => {
                    warn!(error = %e, "realtime push disabled");
                    Arc::new(UnconfiguredPush)
                }
            }
        }
        _ => {
            warn!("push.endpoint / push.secret not set; realtime pushes will fail");
            Arc::new(UnconfiguredPush)
        }
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
