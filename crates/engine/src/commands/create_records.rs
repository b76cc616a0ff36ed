use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    domain::{record::RecordInput, table::Table},
    emit::{Emit, EmittedEvent},
    error::DomainError,
    events::RecordsCreated,
    ids::{RecordId, TableId},
};
use tracing::debug;

use crate::{
    commands::create_tables::with_record_ids, engine::Services, record_batch::record_batches,
    table_update::TableUpdateFlow, unit_of_work::UnitOfWorkScope,
};

/// Inserts records into one table.
///
/// Records are validated and written batch by batch; an invalid batch stops
/// the insert and nothing is kept.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecords {
    pub table_id: TableId,
    pub records: Vec<RecordInput>,
}

impl Command for CreateRecords {
    const NAME: &'static str = "CreateRecords";
    type Output = CreateRecordsResult;
}

#[derive(Clone, Debug)]
pub struct CreateRecordsResult {
    pub record_ids: Vec<RecordId>,
    pub inserted: usize,
    pub events: Vec<EmittedEvent>,
}

pub struct CreateRecordsHandler {
    services: Arc<Services>,
}

impl CreateRecordsHandler {
    pub fn new(services: Arc<Services>) -> Self {
        CreateRecordsHandler { services }
    }

    async fn persist(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        records: Vec<RecordInput>,
        record_ids: Vec<RecordId>,
    ) -> Result<(usize, Emit), DomainError> {
        let batches = record_batches(table, records, self.services.config.record_batch_size);
        let inserted = self
            .services
            .ports
            .records
            .insert_many_stream(ctx, table, batches)
            .await?;
        debug!(table_id = %table.id(), inserted, "inserted records");

        let mut events = Emit::new();
        events.push(RecordsCreated {
            table_id: table.id().clone(),
            record_ids,
        })?;
        Ok((inserted, events))
    }
}

#[async_trait]
impl CommandHandler for CreateRecordsHandler {
    type Command = CreateRecords;

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        command: CreateRecords,
    ) -> Result<CreateRecordsResult, DomainError> {
        if command.records.is_empty() {
            return Err(DomainError::validation("At least one record is required"));
        }
        let table = TableUpdateFlow::new(&self.services.ports)
            .load(ctx, &command.table_id)
            .await?;

        let records = with_record_ids(command.records);
        let mut seen = HashSet::new();
        let mut record_ids = Vec::with_capacity(records.len());
        for id in records.iter().filter_map(|record| record.id.clone()) {
            if !seen.insert(id.clone()) {
                return Err(DomainError::validation(format!("Record {id} appears twice")));
            }
            record_ids.push(id);
        }

        let scope = UnitOfWorkScope::begin(&self.services.ports, ctx).await?;
        let outcome = self
            .persist(scope.context(), &table, records, record_ids.clone())
            .await;
        let (inserted, events) = scope.complete_with_events(outcome).await?;

        Ok(CreateRecordsResult {
            record_ids,
            inserted,
            events,
        })
    }
}
