//! Ports consumed by the engine.
//!
//! Concrete persistence, messaging and transaction technology lives behind
//! these traits. Every method receives the [`ExecutionContext`]; when the
//! context carries a transaction, adapters must stage their writes in it.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::{
    context::{ExecutionContext, TransactionHandle},
    domain::{
        field::ForeignTableRef, mutate::RecordMutateSpec, mutate::TableMutateSpec,
        record::TableRecord, table::Table,
    },
    error::DomainError,
    event::PublishedEvent,
    ids::{RecordId, TableId, ViewId},
};

/// Lazily produced, already validated record batches.
pub type RecordBatchStream<'a> = BoxStream<'a, Result<Vec<TableRecord>, DomainError>>;

/// Lazily produced batches of record updates.
pub type RecordUpdateStream<'a> = BoxStream<'a, Result<Vec<RecordUpdate>, DomainError>>;

/// One mutate spec to replay against a stored record.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordUpdate {
    pub record_id: RecordId,
    pub spec: RecordMutateSpec,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    ByIds(Vec<RecordId>),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryMode {
    /// Read stored cell values only.
    #[default]
    Stored,
    /// Include values of derived and computed fields.
    Computed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordQueryOptions {
    pub mode: QueryMode,
    /// Populate per-view order values.
    pub include_orders: bool,
}

/// Where moved records land relative to the anchor record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderPosition {
    Before,
    After,
}

#[async_trait]
pub trait TableRepository: Send + Sync {
    async fn insert(&self, ctx: &ExecutionContext, table: &Table) -> Result<Table, DomainError>;

    /// Replays `spec` against the stored table; `table` is the state after it.
    async fn update(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        spec: &TableMutateSpec,
    ) -> Result<(), DomainError>;

    async fn find_one(
        &self,
        ctx: &ExecutionContext,
        table_id: &TableId,
    ) -> Result<Option<Table>, DomainError>;

    /// Loads every referenced table that exists; missing ones are omitted.
    async fn find_many(
        &self,
        ctx: &ExecutionContext,
        refs: &[ForeignTableRef],
    ) -> Result<Vec<Table>, DomainError>;
}

/// Physical schema materialization (columns, junction tables, ...).
#[async_trait]
pub trait TableSchemaRepository: Send + Sync {
    async fn insert(&self, ctx: &ExecutionContext, table: &Table) -> Result<(), DomainError>;

    async fn update(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        spec: &TableMutateSpec,
    ) -> Result<(), DomainError>;
}

#[async_trait]
pub trait TableRecordRepository: Send + Sync {
    async fn insert_many(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        records: Vec<TableRecord>,
    ) -> Result<usize, DomainError>;

    /// Consumes `batches` until exhausted, stopping at the first error.
    async fn insert_many_stream(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        batches: RecordBatchStream<'_>,
    ) -> Result<usize, DomainError>;

    async fn update_many_stream(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        batches: RecordUpdateStream<'_>,
    ) -> Result<(), DomainError>;
}

#[async_trait]
pub trait TableRecordQueryRepository: Send + Sync {
    async fn find(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        filter: &RecordFilter,
        options: RecordQueryOptions,
    ) -> Result<Vec<TableRecord>, DomainError>;
}

#[async_trait]
pub trait RecordOrderCalculator: Send + Sync {
    /// Returns `count` distinct, ascending order values for records placed
    /// `position` the anchor record in `view_id`.
    async fn calculate_orders(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        view_id: &ViewId,
        anchor_id: &RecordId,
        position: OrderPosition,
        count: usize,
    ) -> Result<Vec<f64>, DomainError>;
}

/// Receives events after their transaction committed.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: PublishedEvent) -> Result<(), DomainError>;

    async fn publish_many(&self, events: Vec<PublishedEvent>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

/// The single transactional entry point.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self, ctx: &ExecutionContext) -> Result<TransactionHandle, DomainError>;

    async fn commit(&self, transaction: &TransactionHandle) -> Result<(), DomainError>;

    async fn rollback(&self, transaction: &TransactionHandle) -> Result<(), DomainError>;
}
