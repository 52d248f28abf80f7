//! PostgreSQL-backed event store.
//!
//! Durable backend built on sqlx. Writes run in a single transaction
//! per push; reads compile filters into one SELECT over the `events`
//! and `actions` tables. See [`PgStore::setup`] for the schema.

mod push;
mod query;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::instrument;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::filter::{Filter, Reducer};
use crate::model::{Aggregate, Event};
use crate::store::EventStore;

/// The durable backend.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a fresh pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist. Idempotent.
    pub async fn setup(&self) -> Result<()> {
        self.pool.execute(include_str!("schema.sql")).await?;
        tracing::info!("event store schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn ready(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(aggregates = aggregates.len()))]
    async fn push(&self, aggregates: &[Aggregate]) -> Result<Vec<Event>> {
        let events = push::push(&self.pool, aggregates).await?;
        tracing::debug!(events = events.len(), "push committed");
        Ok(events)
    }

    #[instrument(skip_all, fields(queries = filter.queries.len()))]
    async fn filter(&self, filter: &Filter, reducer: &mut dyn Reducer) -> Result<()> {
        query::filter(&self.pool, filter, reducer).await
    }
}
