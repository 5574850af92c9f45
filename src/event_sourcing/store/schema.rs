//! Physical table and column names for the journal and snapshot tables.
//!
//! Both tables share one column layout. Table names are configurable at
//! construction; column names are fixed.

use sea_query::{Alias, ColumnDef, Expr, Index, PostgresQueryBuilder, Table};

/// Name accessors and DDL for the two persistence tables.
pub trait JournalSchema: Send + Sync {
    fn journal_table_name(&self) -> &str;

    fn snapshot_table_name(&self) -> &str;

    fn id(&self) -> &str;

    /// Column holding the JSON envelope.
    fn payload(&self) -> &str;

    fn actor_name(&self) -> &str;

    fn sequence_number(&self) -> &str;

    fn created(&self) -> &str;

    /// One `CREATE TABLE` statement per table, journal first.
    fn create_tables(&self) -> Vec<String>;

    /// Columns written by every insert and read back by every select, in
    /// that order.
    fn select_columns(&self) -> [&str; 4] {
        [self.id(), self.payload(), self.sequence_number(), self.actor_name()]
    }
}

/// `journals` / `snapshots` unless overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultSchema {
    journal_table: String,
    snapshot_table: String,
}

impl DefaultSchema {
    pub const DEFAULT_JOURNAL_TABLE: &'static str = "journals";
    pub const DEFAULT_SNAPSHOT_TABLE: &'static str = "snapshots";

    pub fn new() -> Self {
        Self {
            journal_table: Self::DEFAULT_JOURNAL_TABLE.to_string(),
            snapshot_table: Self::DEFAULT_SNAPSHOT_TABLE.to_string(),
        }
    }

    pub fn with_journal_table(mut self, name: impl Into<String>) -> Self {
        self.journal_table = name.into();
        self
    }

    pub fn with_snapshot_table(mut self, name: impl Into<String>) -> Self {
        self.snapshot_table = name.into();
        self
    }

    /// Identifiers are quoted, so table names keep their case and match the
    /// quoted names every query uses.
    fn create_table(&self, table: &str) -> String {
        Table::create()
            .table(Alias::new(table))
            .if_not_exists()
            .col(ColumnDef::new(Alias::new(self.id())).char_len(26).not_null())
            .col(ColumnDef::new(Alias::new(self.payload())).json_binary().not_null())
            .col(ColumnDef::new(Alias::new(self.sequence_number())).big_integer())
            .col(ColumnDef::new(Alias::new(self.actor_name())).string_len(255))
            .col(
                ColumnDef::new(Alias::new(self.created()))
                    .timestamp_with_time_zone()
                    .default(Expr::current_timestamp()),
            )
            .primary_key(Index::create().col(Alias::new(self.id())))
            .index(Index::create().unique().col(Alias::new(self.id())))
            .index(
                Index::create()
                    .unique()
                    .col(Alias::new(self.actor_name()))
                    .col(Alias::new(self.sequence_number())),
            )
            .to_string(PostgresQueryBuilder)
    }
}

impl Default for DefaultSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl JournalSchema for DefaultSchema {
    fn journal_table_name(&self) -> &str {
        &self.journal_table
    }

    fn snapshot_table_name(&self) -> &str {
        &self.snapshot_table
    }

    fn id(&self) -> &str {
        "id"
    }

    fn payload(&self) -> &str {
        "payload"
    }

    fn actor_name(&self) -> &str {
        "actor_name"
    }

    fn sequence_number(&self) -> &str {
        "sequence_number"
    }

    fn created(&self) -> &str {
        "created_at"
    }

    fn create_tables(&self) -> Vec<String> {
        [self.journal_table_name(), self.snapshot_table_name()]
            .into_iter()
            .map(|table| self.create_table(table))
            .collect()
    }
}
