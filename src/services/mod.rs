pub mod database;
pub mod jwt;
pub mod proration;
pub mod telemetry;

pub use database::Database;
pub use jwt::{AccessTokenClaims, JwtService};
pub use proration::{period_end, prorated_amount, ProrationError};
pub use telemetry::init_tracing;
