mod messages;
mod newsletters;
mod submissions;
mod subscriptions;
mod users;

pub use messages::*;
pub use newsletters::*;
pub use submissions::*;
pub use subscriptions::*;
pub use users::*;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Connect a pool to a single in-memory database.
/// NOTE: Every SQLite connection to `:memory:` opens its own database, so the
/// pool is held to one connection that is never recycled.
pub async fn connect_in_memory() -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Apply the embedded schema migrations
#[tracing::instrument(name = "Run database migrations", skip(pool))]
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
