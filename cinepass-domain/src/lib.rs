pub mod error;
pub mod reservation;
pub mod schedule;
pub mod session;
pub mod store;
pub mod user;

pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
