use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Connect to PostgreSQL. A single attempt unless the caller configures more,
/// in which case failed attempts back off exponentially.
///
/// Only used at startup; per-operation failures are never retried here.
pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let max_attempts = config.connect_attempts.max(1);

    let pool_options = PgPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(300));

    let mut attempt = 0;
    loop {
        attempt += 1;
        tracing::debug!("Database connection attempt {} of {}", attempt, max_attempts);

        let error = match pool_options.clone().connect(&config.url).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => {
                    tracing::info!("Connected to database on attempt {}", attempt);
                    return Ok(pool);
                }
                Err(e) => {
                    pool.close().await;
                    e
                }
            },
            Err(e) => e,
        };

        if attempt >= max_attempts {
            tracing::error!(
                "Failed to connect to database after {} attempts: {}",
                max_attempts,
                error
            );
            return Err(error);
        }

        // Cap at ~6.4 seconds
        let delay = Duration::from_millis(100 * (1 << (attempt - 1).min(6)));
        tracing::warn!(
            "Connection attempt {} failed: {}; retrying in {:?}",
            attempt,
            error,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}
