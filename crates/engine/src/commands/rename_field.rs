use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    domain::{mutate::TableMutateSpec, table::Table},
    emit::EmittedEvent,
    error::DomainError,
    ids::{FieldId, TableId},
};

use crate::{engine::Services, table_update::TableUpdateFlow, unit_of_work::UnitOfWorkScope};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameField {
    pub table_id: TableId,
    pub field_id: FieldId,
    pub name: String,
}

impl Command for RenameField {
    const NAME: &'static str = "RenameField";
    type Output = RenameResult;
}

/// Outcome of a rename. `events` is empty when the name did not change.
#[derive(Clone, Debug)]
pub struct RenameResult {
    pub table: Table,
    pub events: Vec<EmittedEvent>,
}

pub struct RenameFieldHandler {
    services: Arc<Services>,
}

impl RenameFieldHandler {
    pub fn new(services: Arc<Services>) -> Self {
        RenameFieldHandler { services }
    }
}

#[async_trait]
impl CommandHandler for RenameFieldHandler {
    type Command = RenameField;

    async fn handle(&self, ctx: &ExecutionContext, command: RenameField) -> Result<RenameResult, DomainError> {
        let spec = TableMutateSpec::RenameField {
            field_id: command.field_id,
            name: command.name,
        };
        rename(&self.services, ctx, &command.table_id, spec).await
    }
}

/// Shared by field and table renames: a rename to the current name is a
/// no-op that touches neither persistence nor the event bus.
pub(crate) async fn rename(
    services: &Services,
    ctx: &ExecutionContext,
    table_id: &TableId,
    spec: TableMutateSpec,
) -> Result<RenameResult, DomainError> {
    let flow = TableUpdateFlow::new(&services.ports);
    let table = flow.load(ctx, table_id).await?;
    let preview = table.update(|draft| spec.apply(draft))?;
    if preview.pending_events().is_empty() {
        return Ok(RenameResult {
            table,
            events: Vec::new(),
        });
    }

    let scope = UnitOfWorkScope::begin(&services.ports, ctx).await?;
    let outcome = flow
        .run(scope.context(), &table, &spec, None)
        .await
        .map(|outcome| (outcome.table, outcome.events));
    let (table, events) = scope.complete_with_events(outcome).await?;
    Ok(RenameResult { table, events })
}
