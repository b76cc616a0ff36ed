use async_trait::async_trait;
use tablekit_sdk::{
    context::ExecutionContext,
    domain::{mutate::TableMutateSpec, table::Table},
    emit::Emit,
    error::DomainError,
    ids::TableId,
};
use tracing::debug;

use crate::deps::Ports;

/// Runs inside the transaction once the primary mutation is persisted and
/// before the commit. Returned events are published with the mutation's.
#[async_trait]
pub trait AfterPersistHook: Send + Sync {
    async fn after_persist(&self, ctx: &ExecutionContext, table: &Table) -> Result<Emit, DomainError>;
}

pub struct TableUpdateOutcome {
    /// The table after the mutation, with its event queue drained.
    pub table: Table,
    pub events: Emit,
}

/// The load, mutate, persist, hook, collect pipeline shared by every
/// handler changing a single table.
pub struct TableUpdateFlow<'a> {
    ports: &'a Ports,
}

impl<'a> TableUpdateFlow<'a> {
    pub fn new(ports: &'a Ports) -> Self {
        TableUpdateFlow { ports }
    }

    pub async fn load(&self, ctx: &ExecutionContext, table_id: &TableId) -> Result<Table, DomainError> {
        self.ports
            .tables
            .find_one(ctx, table_id)
            .await?
            .ok_or_else(|| DomainError::table_not_found(table_id))
    }

    /// Applies `spec` to `table` in memory, then replays it against the
    /// table repository and the schema repository.
    pub async fn run(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        spec: &TableMutateSpec,
        hook: Option<&dyn AfterPersistHook>,
    ) -> Result<TableUpdateOutcome, DomainError> {
        let mut updated = table.update(|draft| spec.apply(draft))?;

        self.ports.tables.update(ctx, &updated, spec).await?;
        self.ports.schemas.update(ctx, &updated, spec).await?;
        debug!(table_id = %updated.id(), op = spec.op_name(), "persisted table mutation");

        let mut events = updated.pull_events();
        if let Some(hook) = hook {
            events.extend(hook.after_persist(ctx, &updated).await?);
        }

        Ok(TableUpdateOutcome {
            table: updated,
            events,
        })
    }
}
