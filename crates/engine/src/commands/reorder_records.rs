use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    domain::{mutate::RecordMutateSpec, record::TableRecord, table::Table},
    emit::{Emit, EmittedEvent},
    error::{DomainError, codes},
    events::RecordsReordered,
    ids::{RecordId, TableId, ViewId},
    ports::{OrderPosition, RecordFilter, RecordQueryOptions, RecordUpdate},
};
use tracing::debug;

use crate::{
    engine::Services, record_batch::update_batches, table_update::TableUpdateFlow,
    unit_of_work::UnitOfWorkScope,
};

/// Moves records of a view next to an anchor record, keeping their relative
/// order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRecords {
    pub table_id: TableId,
    pub view_id: ViewId,
    pub record_ids: Vec<RecordId>,
    pub anchor_id: RecordId,
    pub position: OrderPosition,
}

impl Command for ReorderRecords {
    const NAME: &'static str = "ReorderRecords";
    type Output = ReorderRecordsResult;
}

#[derive(Clone, Debug)]
pub struct ReorderRecordsResult {
    /// The moved records with their new order, in command order.
    pub records: Vec<TableRecord>,
    pub orders: Vec<f64>,
    pub events: Vec<EmittedEvent>,
}

pub struct ReorderRecordsHandler {
    services: Arc<Services>,
}

impl ReorderRecordsHandler {
    pub fn new(services: Arc<Services>) -> Self {
        ReorderRecordsHandler { services }
    }

    async fn persist(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        command: &ReorderRecords,
    ) -> Result<((Vec<TableRecord>, Vec<f64>), Emit), DomainError> {
        let ports = &self.services.ports;

        let mut ids = command.record_ids.clone();
        ids.push(command.anchor_id.clone());
        let found = ports
            .record_queries
            .find(
                ctx,
                table,
                &RecordFilter::ByIds(ids.clone()),
                RecordQueryOptions {
                    include_orders: true,
                    ..RecordQueryOptions::default()
                },
            )
            .await?;
        let records = ids
            .iter()
            .map(|id| {
                found
                    .iter()
                    .find(|record| &record.id == id)
                    .ok_or_else(|| {
                        DomainError::not_found(format!("Record {id} not found"))
                            .with_code(codes::RECORD_NOT_FOUND)
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let moved = &records[..command.record_ids.len()];

        let orders = ports
            .order_calculator
            .calculate_orders(
                ctx,
                table,
                &command.view_id,
                &command.anchor_id,
                command.position,
                moved.len(),
            )
            .await?;
        check_orders(&orders, moved.len())?;

        let mut updates = Vec::with_capacity(moved.len());
        let mut updated = Vec::with_capacity(moved.len());
        for (record, &order) in moved.iter().zip(&orders) {
            let spec = RecordMutateSpec::SetRowOrder {
                view_id: command.view_id.clone(),
                order,
            };
            updated.push(record.update(&spec));
            updates.push(RecordUpdate {
                record_id: record.id.clone(),
                spec,
            });
        }
        let previous_orders = moved
            .iter()
            .map(|record| record.order(&command.view_id))
            .collect();

        ports
            .records
            .update_many_stream(
                ctx,
                table,
                update_batches(updates, self.services.config.order_batch_size),
            )
            .await?;
        debug!(
            view_id = %command.view_id,
            moved = moved.len(),
            "reordered records"
        );

        let mut events = Emit::new();
        events.push(RecordsReordered {
            table_id: table.id().clone(),
            view_id: command.view_id.clone(),
            record_ids: command.record_ids.clone(),
            previous_orders,
            orders: orders.clone(),
        })?;
        Ok(((updated, orders), events))
    }
}

fn check_orders(orders: &[f64], expected: usize) -> Result<(), DomainError> {
    if orders.len() != expected {
        return Err(DomainError::unexpected(format!(
            "order calculator returned {} orders for {expected} records",
            orders.len()
        )));
    }
    if orders.windows(2).any(|pair| pair[0] >= pair[1]) || orders.iter().any(|order| !order.is_finite()) {
        return Err(DomainError::unexpected(
            "order calculator returned orders that are not strictly ascending",
        ));
    }
    Ok(())
}

#[async_trait]
impl CommandHandler for ReorderRecordsHandler {
    type Command = ReorderRecords;

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        command: ReorderRecords,
    ) -> Result<ReorderRecordsResult, DomainError> {
        if command.record_ids.is_empty() {
            return Err(DomainError::validation("At least one record must be moved"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = command.record_ids.iter().find(|id| !seen.insert(*id)) {
            return Err(DomainError::validation(format!("Record {dup} appears twice")));
        }
        if seen.contains(&command.anchor_id) {
            return Err(DomainError::validation(format!(
                "Record {} cannot be moved relative to itself",
                command.anchor_id
            )));
        }

        let table = TableUpdateFlow::new(&self.services.ports)
            .load(ctx, &command.table_id)
            .await?;
        if table.view(&command.view_id).is_none() {
            return Err(
                DomainError::not_found(format!("View {} not found", command.view_id))
                    .with_code(codes::VIEW_NOT_FOUND),
            );
        }

        let scope = UnitOfWorkScope::begin(&self.services.ports, ctx).await?;
        let outcome = self.persist(scope.context(), &table, &command).await;
        let ((records, orders), events) = scope.complete_with_events(outcome).await?;

        Ok(ReorderRecordsResult {
            records,
            orders,
            events,
        })
    }
}
