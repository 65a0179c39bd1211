pub mod config;
pub mod database;
pub mod reservation_repo;
pub mod schedule_repo;
pub mod seat_lock;
pub mod session_store;
pub mod user_repo;

pub use config::Config;
pub use database::Database;
pub use reservation_repo::PgReservationRepository;
pub use schedule_repo::PgScheduleGate;
pub use seat_lock::RedisSeatLockStore;
pub use session_store::RedisSessionStore;
pub use user_repo::PgUserRepository;
