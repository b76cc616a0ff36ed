use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    domain::{field::Field, mutate::RecordMutateSpec, mutate::TableMutateSpec, table::Table},
    emit::{Emit, EmittedEvent},
    error::DomainError,
    events::RecordFieldValuesCopied,
    ids::{FieldId, TableId},
    ports::{RecordFilter, RecordQueryOptions, RecordUpdate},
};
use tracing::debug;

use crate::{
    commands::create_field::{persist_field, prepare_field},
    engine::Services,
    record_batch::update_batches,
    table_update::TableUpdateFlow,
    unit_of_work::UnitOfWorkScope,
};

/// Copies a field, placing the copy right after the source.
///
/// Without an explicit name the copy is called `"<name> (copy)"`, numbered
/// when that name is taken.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateField {
    pub table_id: TableId,
    pub field_id: FieldId,
    #[serde(default)]
    pub name: Option<String>,
    /// Also copy the source's stored cell values.
    #[serde(default)]
    pub include_record_values: bool,
}

impl Command for DuplicateField {
    const NAME: &'static str = "DuplicateField";
    type Output = DuplicateFieldResult;
}

#[derive(Clone, Debug)]
pub struct DuplicateFieldResult {
    pub table: Table,
    /// The field that was copied, as stored after the command.
    pub source: Field,
    pub field: Field,
    pub foreign_tables: Vec<Table>,
    /// Records whose value was copied into the new field.
    pub copied_records: usize,
    pub events: Vec<EmittedEvent>,
}

pub struct DuplicateFieldHandler {
    services: Arc<Services>,
}

impl DuplicateFieldHandler {
    pub fn new(services: Arc<Services>) -> Self {
        DuplicateFieldHandler { services }
    }

    async fn copy_values(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        source_id: &FieldId,
        field_id: &FieldId,
    ) -> Result<usize, DomainError> {
        let ports = &self.services.ports;
        let records = ports
            .record_queries
            .find(ctx, table, &RecordFilter::All, RecordQueryOptions::default())
            .await?;

        let updates: Vec<RecordUpdate> = records
            .into_iter()
            .filter_map(|record| {
                let value = record
                    .fields
                    .get(source_id)
                    .filter(|value| !value.is_null())?
                    .clone();
                Some(RecordUpdate {
                    record_id: record.id,
                    spec: RecordMutateSpec::SetFieldValue {
                        field_id: field_id.clone(),
                        value,
                    },
                })
            })
            .collect();

        let copied = updates.len();
        if copied > 0 {
            ports
                .records
                .update_many_stream(
                    ctx,
                    table,
                    update_batches(updates, self.services.config.record_batch_size),
                )
                .await?;
        }
        debug!(%source_id, %field_id, copied, "copied field values");
        Ok(copied)
    }

    async fn persist(
        &self,
        ctx: &ExecutionContext,
        host: &Table,
        source: &Field,
        spec: &TableMutateSpec,
        include_record_values: bool,
    ) -> Result<((Table, Vec<Table>, usize), Emit), DomainError> {
        let state = prepare_field(&self.services, ctx, host, spec).await?;
        let ((table, foreign_tables), mut events) =
            persist_field(&self.services, ctx, host, spec, state).await?;

        let mut copied = 0;
        if include_record_values
            && !source.is_read_only()
            && let Some(field) = spec.created_field()
        {
            copied = self.copy_values(ctx, &table, &source.id, &field.id).await?;
            events.push(RecordFieldValuesCopied {
                table_id: table.id().clone(),
                source_field_id: source.id.clone(),
                field_id: field.id.clone(),
                record_count: copied,
            })?;
        }

        Ok(((table, foreign_tables, copied), events))
    }
}

/// Builds the copy of `source`: fresh id, never primary, and for two-way
/// links a fresh reciprocal.
fn copy_field(host: &Table, source: &Field, name: Option<String>) -> Field {
    let name = name.unwrap_or_else(|| host.unique_field_name(&format!("{} (copy)", source.name)));
    let mut field = Field {
        id: FieldId::generate(),
        name,
        is_primary: false,
        kind: source.kind.clone(),
    };
    if let Some(options) = field.link_options_mut() {
        options.symmetric_field_id = None;
    }
    field.ensure_symmetric_field_id();
    field
}

#[async_trait]
impl CommandHandler for DuplicateFieldHandler {
    type Command = DuplicateField;

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        command: DuplicateField,
    ) -> Result<DuplicateFieldResult, DomainError> {
        let host = TableUpdateFlow::new(&self.services.ports)
            .load(ctx, &command.table_id)
            .await?;
        let source = host
            .field(&command.field_id)
            .cloned()
            .ok_or_else(|| DomainError::field_not_found(&command.field_id))?;

        let field = copy_field(&host, &source, command.name);
        let field_id = field.id.clone();
        let spec = TableMutateSpec::DuplicateField {
            source_field_id: source.id.clone(),
            field,
        };

        let scope = UnitOfWorkScope::begin(&self.services.ports, ctx).await?;
        let outcome = self
            .persist(
                scope.context(),
                &host,
                &source,
                &spec,
                command.include_record_values,
            )
            .await;
        let ((table, foreign_tables, copied_records), events) =
            scope.complete_with_events(outcome).await?;

        let source = table
            .field(&command.field_id)
            .cloned()
            .ok_or_else(|| DomainError::field_not_found(&command.field_id))?;
        let field = table
            .field(&field_id)
            .cloned()
            .ok_or_else(|| DomainError::field_not_found(&field_id))?;
        Ok(DuplicateFieldResult {
            table,
            source,
            field,
            foreign_tables,
            copied_records,
            events,
        })
    }
}
