use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use cinepass_api::state::{AppState, AuthSettings};
use cinepass_api::{app, engine::ReservationEngine, reaper};
use cinepass_domain::store::{
    ReservationRepository, ScheduleGate, SeatLockStore, SessionStore, UserRepository,
};
use cinepass_infra::{
    Config, Database, PgReservationRepository, PgScheduleGate, PgUserRepository,
    RedisSeatLockStore, RedisSessionStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinepass_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!("Starting cinepass API on port {}", config.server.port);

    let db = Database::connect(&config.database)
        .await
        .context("failed to connect to Postgres")?;
    db.migrate().await.context("failed to run migrations")?;

    let reservations: Arc<dyn ReservationRepository> =
        Arc::new(PgReservationRepository::new(db.clone()));
    let schedules: Arc<dyn ScheduleGate> = Arc::new(PgScheduleGate::new(db.clone()));
    let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(db.clone()));
    let seat_locks: Arc<dyn SeatLockStore> = Arc::new(
        RedisSeatLockStore::new(&config.redis.url).context("failed to connect to Redis")?,
    );
    let sessions: Arc<dyn SessionStore> = Arc::new(
        RedisSessionStore::new(&config.redis.url).context("failed to connect to Redis")?,
    );

    let engine = Arc::new(ReservationEngine::new(
        Arc::clone(&reservations),
        Arc::clone(&seat_locks),
        schedules,
        config.booking.hold_ttl(),
    ));

    tokio::spawn(reaper::run(
        Arc::clone(&reservations),
        Arc::clone(&seat_locks),
        config.booking.reap_interval(),
    ));

    let state = AppState {
        engine,
        seat_locks,
        sessions,
        users,
        auth: AuthSettings {
            jwt_secret: config.auth.jwt_secret.clone(),
            session_ttl: config.auth.session_ttl(),
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app(state))
        .await
        .context("server error")?;
    Ok(())
}
