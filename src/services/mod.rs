pub mod rate_limit;
pub mod store;

pub use store::PgStore;
