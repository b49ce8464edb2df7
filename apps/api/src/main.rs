use std::sync::Arc;

use anyhow::{bail, Context};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::notifier_from_config;
use appointment_cell::{BookingStore, MemoryClinicStore, SupabaseClinicStore};
use availability_cell::ScheduleStore;
use shared_config::{AppConfig, StorageBackend};
use shared_utils::ClinicClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic booking API server");

    let config = Arc::new(AppConfig::from_env());
    let (bookings, schedule) = build_stores(&config)?;
    let notifier = notifier_from_config(&config);
    let clock = ClinicClock::system(config.clinic_offset());
    info!("Clinic clock running at UTC{}", clock.offset());

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), bookings, schedule, notifier, clock)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// One concrete store serves both the schedule and the bookings, so the
/// admission transaction and the slot grid read the same data.
fn build_stores(config: &AppConfig) -> anyhow::Result<(Arc<dyn BookingStore>, Arc<dyn ScheduleStore>)> {
    match config.storage_backend {
        StorageBackend::Supabase => {
            if !config.is_configured() {
                bail!("STORAGE_BACKEND=supabase needs SUPABASE_URL, SUPABASE_ANON_PUBLIC_KEY and SUPABASE_JWT_SECRET");
            }
            info!("Using Supabase store at {}", config.supabase_url);
            let store = Arc::new(SupabaseClinicStore::new(config));
            let bookings: Arc<dyn BookingStore> = store.clone();
            let schedule: Arc<dyn ScheduleStore> = store;
            Ok((bookings, schedule))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory store, data is lost on restart");
            let store = Arc::new(if config.seed_demo_data {
                MemoryClinicStore::with_demo_data()
            } else {
                MemoryClinicStore::new()
            });
            let bookings: Arc<dyn BookingStore> = store.clone();
            let schedule: Arc<dyn ScheduleStore> = store;
            Ok((bookings, schedule))
        }
    }
}
