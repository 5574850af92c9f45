use async_trait::async_trait;
use sea_query::{Alias, Expr, Order, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use sqlx::postgres::PgRow;
use sqlx::{Connection, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use std::time::Instant;
use ulid::Ulid;

use crate::config::ProviderConfig;
use crate::event_sourcing::core::{
    EnvelopeCodec, Payload, PersistenceProvider, ProviderState, Snapshot, TypeRegistry,
};
use crate::event_sourcing::errors::{PersistenceError, Result};
use crate::event_sourcing::store::schema::{DefaultSchema, JournalSchema};
use crate::metrics::Metrics;

// ============================================================================
// Postgres Persistence Provider
// ============================================================================
//
// Stores events and snapshots as JSON envelopes, one row per persist call.
//
// Every call is one serializable transaction on a connection borrowed from
// the shared pool:
// 1. Writes: begin → insert → commit. The transaction guard rolls back when
//    dropped without commit, so every error path (and a cancelled future)
//    releases the connection with nothing written.
// 2. Reads: begin → select → commit, then decode row by row.
//
// Per-actor ordering comes from UNIQUE (actor_name, sequence_number): of two
// writers racing for the same sequence number exactly one commits.
//
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Table {
    Journal,
    Snapshot,
}

impl Table {
    fn label(self) -> &'static str {
        match self {
            Table::Journal => "journal",
            Table::Snapshot => "snapshot",
        }
    }
}

#[derive(Clone)]
pub struct PostgresProvider {
    pool: PgPool,
    schema: Arc<dyn JournalSchema>,
    codec: EnvelopeCodec,
    snapshot_interval: i64,
    metrics: Arc<Metrics>,
}

impl PostgresProvider {
    pub fn builder(pool: PgPool) -> PostgresProviderBuilder {
        PostgresProviderBuilder::new(pool)
    }

    pub fn schema(&self) -> &dyn JournalSchema {
        self.schema.as_ref()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn table_name(&self, table: Table) -> &str {
        match table {
            Table::Journal => self.schema.journal_table_name(),
            Table::Snapshot => self.schema.snapshot_table_name(),
        }
    }

    async fn begin_serializable(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    // ========================================================================
    // Write path
    // ========================================================================

    async fn insert(
        &self,
        table: Table,
        actor_name: &str,
        sequence_number: i64,
        payload: &dyn Payload,
    ) -> Result<()> {
        let envelope = self.codec.encode_value(payload)?;
        let started = Instant::now();

        let (sql, values) = Query::insert()
            .into_table(Alias::new(self.table_name(table)))
            .columns(self.schema.select_columns().map(Alias::new))
            .values_panic([
                Ulid::new().to_string().into(),
                envelope.into(),
                sequence_number.into(),
                actor_name.into(),
            ])
            .build_sqlx(PostgresQueryBuilder);

        let mut tx = self.begin_serializable().await?;
        sqlx::query_with(&sql, values).execute(&mut *tx).await?;
        tx.commit().await?;

        self.metrics
            .record_persist(table.label(), started.elapsed().as_secs_f64());

        tracing::info!(
            actor_name = %actor_name,
            sequence_number = sequence_number,
            table = table.label(),
            payload_type = payload.payload_type(),
            "✅ Persisted"
        );

        Ok(())
    }

    /// Append one event to the journal.
    ///
    /// Fails with `Store` (unique violation) when `sequence_number` is already
    /// taken for this actor.
    pub async fn try_persist_event(
        &self,
        actor_name: &str,
        sequence_number: i64,
        event: &dyn Payload,
    ) -> Result<()> {
        self.insert(Table::Journal, actor_name, sequence_number, event).await
    }

    /// Store one snapshot version. Older versions are kept.
    pub async fn try_persist_snapshot(
        &self,
        actor_name: &str,
        sequence_number: i64,
        snapshot: &dyn Payload,
    ) -> Result<()> {
        self.insert(Table::Snapshot, actor_name, sequence_number, snapshot).await
    }

    fn report_persist_failure(
        &self,
        table: Table,
        actor_name: &str,
        sequence_number: i64,
        error: &PersistenceError,
    ) {
        self.metrics.record_persist_failure(table.label(), error.kind());
        tracing::error!(
            actor_name = %actor_name,
            sequence_number = sequence_number,
            table = table.label(),
            reason = error.kind(),
            error = %error,
            "Persistence failure, payload dropped"
        );
    }

    // ========================================================================
    // Read path
    // ========================================================================

    fn decode_row(&self, row: &PgRow) -> Result<(Box<dyn Payload>, i64)> {
        let envelope: serde_json::Value = row.try_get(self.schema.payload())?;
        let sequence_number: i64 = row.try_get(self.schema.sequence_number())?;

        let payload = self.codec.decode_value(envelope).inspect_err(|e| {
            self.metrics.record_decode_failure(e.kind());
        })?;

        Ok((payload, sequence_number))
    }

    /// Replay events in `[from_sequence, to_sequence]`, ascending.
    ///
    /// Rows are read in one transaction and then decoded one at a time; a
    /// decode failure stops the replay, and events already handed to
    /// `on_event` stay delivered. Returns the number delivered.
    pub async fn try_get_events<F>(
        &self,
        actor_name: &str,
        from_sequence: i64,
        to_sequence: i64,
        mut on_event: F,
    ) -> Result<usize>
    where
        F: FnMut(Box<dyn Payload>) + Send,
    {
        let started = Instant::now();
        let sequence_column = self.schema.sequence_number();

        let (sql, values) = Query::select()
            .columns(self.schema.select_columns().map(Alias::new))
            .from(Alias::new(self.schema.journal_table_name()))
            .and_where(Expr::col(Alias::new(self.schema.actor_name())).eq(actor_name))
            .and_where(Expr::col(Alias::new(sequence_column)).between(from_sequence, to_sequence))
            .order_by(Alias::new(sequence_column), Order::Asc)
            .build_sqlx(PostgresQueryBuilder);

        let mut tx = self.begin_serializable().await?;
        let rows = sqlx::query_with(&sql, values).fetch_all(&mut *tx).await?;
        tx.commit().await?;

        tracing::debug!(
            actor_name = %actor_name,
            from_sequence = from_sequence,
            to_sequence = to_sequence,
            rows = rows.len(),
            "Loaded events for replay"
        );

        let mut delivered = 0usize;
        let outcome: Result<()> = rows.iter().try_for_each(|row| {
            let (event, _) = self.decode_row(row)?;
            on_event(event);
            delivered += 1;
            Ok(())
        });

        self.metrics
            .record_replay(delivered as u64, started.elapsed().as_secs_f64());

        outcome.map(|()| delivered)
    }

    /// Latest snapshot by sequence number.
    pub async fn try_get_snapshot(&self, actor_name: &str) -> Result<Option<Snapshot>> {
        let started = Instant::now();

        let (sql, values) = Query::select()
            .columns(self.schema.select_columns().map(Alias::new))
            .from(Alias::new(self.schema.snapshot_table_name()))
            .and_where(Expr::col(Alias::new(self.schema.actor_name())).eq(actor_name))
            .order_by(Alias::new(self.schema.sequence_number()), Order::Desc)
            .limit(1)
            .build_sqlx(PostgresQueryBuilder);

        let mut tx = self.begin_serializable().await?;
        let row = sqlx::query_with(&sql, values).fetch_optional(&mut *tx).await?;
        tx.commit().await?;

        let snapshot = match row {
            Some(row) => {
                let (payload, sequence_number) = self.decode_row(&row)?;
                Some(Snapshot {
                    payload,
                    sequence_number,
                })
            }
            None => None,
        };

        self.metrics
            .record_snapshot_lookup(snapshot.is_some(), started.elapsed().as_secs_f64());

        Ok(snapshot)
    }

    /// Borrow a connection and ping the server.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }
}

// ============================================================================
// Host contract
// ============================================================================

#[async_trait]
impl ProviderState for PostgresProvider {
    async fn get_events(
        &self,
        actor_name: &str,
        from_sequence: i64,
        to_sequence: i64,
        on_event: &mut (dyn FnMut(Box<dyn Payload>) + Send),
    ) {
        if let Err(e) = self
            .try_get_events(actor_name, from_sequence, to_sequence, &mut *on_event)
            .await
        {
            self.metrics.record_read_failure("get_events", e.kind());
            tracing::error!(
                actor_name = %actor_name,
                from_sequence = from_sequence,
                to_sequence = to_sequence,
                reason = e.kind(),
                error = %e,
                "Event replay aborted"
            );
        }
    }

    async fn persist_event(&self, actor_name: &str, sequence_number: i64, event: &dyn Payload) {
        if let Err(e) = self.try_persist_event(actor_name, sequence_number, event).await {
            self.report_persist_failure(Table::Journal, actor_name, sequence_number, &e);
        }
    }

    async fn delete_events(&self, _actor_name: &str, _up_to_sequence: i64) {}

    async fn get_snapshot(&self, actor_name: &str) -> Option<Snapshot> {
        match self.try_get_snapshot(actor_name).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.metrics.record_read_failure("get_snapshot", e.kind());
                tracing::error!(actor_name = %actor_name, reason = e.kind(), error = %e, "Snapshot lookup failed");
                None
            }
        }
    }

    async fn persist_snapshot(&self, actor_name: &str, sequence_number: i64, snapshot: &dyn Payload) {
        if let Err(e) = self.try_persist_snapshot(actor_name, sequence_number, snapshot).await {
            self.report_persist_failure(Table::Snapshot, actor_name, sequence_number, &e);
        }
    }

    async fn delete_snapshots(&self, _actor_name: &str, _up_to_sequence: i64) {}

    fn get_snapshot_interval(&self) -> i64 {
        self.snapshot_interval
    }

    async fn restart(&self) {
        if let Err(e) = self.ping().await {
            tracing::warn!(error = %e, "Store liveness probe failed");
        }
    }
}

impl PersistenceProvider for PostgresProvider {
    fn get_state(&self) -> Arc<dyn ProviderState> {
        Arc::new(self.clone())
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct PostgresProviderBuilder {
    pool: PgPool,
    schema: Option<Arc<dyn JournalSchema>>,
    snapshot_interval: i64,
    metrics: Option<Arc<Metrics>>,
    registry: Option<&'static TypeRegistry>,
}

impl PostgresProviderBuilder {
    fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema: None,
            snapshot_interval: ProviderConfig::default().snapshot_interval,
            metrics: None,
            registry: None,
        }
    }

    pub fn schema(mut self, schema: impl JournalSchema + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn snapshot_interval(mut self, interval: i64) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Decode against this registry instead of the process-wide one.
    pub fn registry(mut self, registry: &'static TypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Apply the naming and cadence settings of a config.
    pub fn config(self, config: &ProviderConfig) -> Self {
        self.schema(config.schema())
            .snapshot_interval(config.snapshot_interval)
    }

    /// Fails with `RegistryNotInitialized` when no registry was given and the
    /// global one has not been installed yet.
    pub fn build(self) -> Result<PostgresProvider> {
        let codec = match self.registry {
            Some(registry) => EnvelopeCodec::new(registry),
            None => EnvelopeCodec::global()?,
        };

        Ok(PostgresProvider {
            pool: self.pool,
            schema: self
                .schema
                .unwrap_or_else(|| Arc::new(DefaultSchema::new())),
            codec,
            snapshot_interval: self.snapshot_interval,
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}
