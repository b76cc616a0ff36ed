use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    domain::{field::Field, mutate::TableMutateSpec, table::Table},
    emit::{Emit, EmittedEvent},
    error::DomainError,
    ids::TableId,
};

use crate::{
    engine::Services,
    foreign_tables::{ForeignTableLoader, TableStateMap},
    side_effect::{SideEffectHook, SideEffectService},
    table_update::{AfterPersistHook, TableUpdateFlow},
    unit_of_work::UnitOfWorkScope,
};

/// Adds a field to an existing table.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateField {
    pub table_id: TableId,
    pub field: Field,
}

impl Command for CreateField {
    const NAME: &'static str = "CreateField";
    type Output = CreateFieldResult;
}

#[derive(Clone, Debug)]
pub struct CreateFieldResult {
    pub table: Table,
    pub field: Field,
    /// The table a new link points at, after its side effects.
    pub foreign_tables: Vec<Table>,
    pub events: Vec<EmittedEvent>,
}

pub struct CreateFieldHandler {
    services: Arc<Services>,
}

impl CreateFieldHandler {
    pub fn new(services: Arc<Services>) -> Self {
        CreateFieldHandler { services }
    }
}

/// Loads the tables the host references once `spec` is applied and
/// validates the candidate host against them.
pub(crate) async fn prepare_field(
    services: &Services,
    ctx: &ExecutionContext,
    host: &Table,
    spec: &TableMutateSpec,
) -> Result<TableStateMap, DomainError> {
    let candidate = host.update(|draft| spec.apply(draft))?;
    let batch = HashSet::from([host.id().clone()]);
    let foreign = ForeignTableLoader::new(services.ports.tables.as_ref())
        .load(ctx, candidate.fields(), &batch)
        .await?;

    let mut state = TableStateMap::new(foreign);
    state.insert(candidate);
    state.validate([host.id()])?;
    Ok(state)
}

/// Persists `spec` on `host` and applies the side effects of the field it
/// creates in the same transaction.
pub(crate) async fn persist_field(
    services: &Services,
    ctx: &ExecutionContext,
    host: &Table,
    spec: &TableMutateSpec,
    state: TableStateMap,
) -> Result<((Table, Vec<Table>), Emit), DomainError> {
    let hook = SideEffectHook::new(
        SideEffectService::new(&services.ports, &services.policy),
        spec.created_field().cloned().into_iter().collect(),
        state,
    );
    let outcome = TableUpdateFlow::new(&services.ports)
        .run(ctx, host, spec, Some(&hook as &dyn AfterPersistHook))
        .await?;

    let state = hook.into_state();
    let table = state.require(host.id())?.clone();
    let foreign_tables = spec
        .created_field()
        .and_then(Field::foreign_table_ref)
        .filter(|foreign| &foreign.table_id != host.id())
        .and_then(|foreign| state.get(&foreign.table_id).cloned())
        .into_iter()
        .collect();
    Ok(((table, foreign_tables), outcome.events))
}

#[async_trait]
impl CommandHandler for CreateFieldHandler {
    type Command = CreateField;

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        command: CreateField,
    ) -> Result<CreateFieldResult, DomainError> {
        let CreateField { table_id, mut field } = command;
        field.ensure_symmetric_field_id();
        let field_id = field.id.clone();

        let flow = TableUpdateFlow::new(&self.services.ports);
        let host = flow.load(ctx, &table_id).await?;
        let spec = TableMutateSpec::AddField { field };
        let state = prepare_field(&self.services, ctx, &host, &spec).await?;

        let scope = UnitOfWorkScope::begin(&self.services.ports, ctx).await?;
        let outcome = persist_field(&self.services, scope.context(), &host, &spec, state).await;
        let ((table, foreign_tables), events) = scope.complete_with_events(outcome).await?;

        let field = table
            .field(&field_id)
            .cloned()
            .ok_or_else(|| DomainError::field_not_found(&field_id))?;
        Ok(CreateFieldResult {
            table,
            field,
            foreign_tables,
            events,
        })
    }
}
