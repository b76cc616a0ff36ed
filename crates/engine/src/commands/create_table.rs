use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    domain::table::Table,
    emit::EmittedEvent,
    error::DomainError,
    ids::{BaseId, RecordId},
};

use crate::{
    commands::create_tables::{CreateTables, CreateTablesHandler, TableInput},
    engine::Services,
};

/// Creates a single table. Same rules as [`CreateTables`] with one entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTable {
    pub base_id: BaseId,
    pub table: TableInput,
}

impl Command for CreateTable {
    const NAME: &'static str = "CreateTable";
    type Output = CreateTableResult;
}

#[derive(Clone, Debug)]
pub struct CreateTableResult {
    pub table: Table,
    pub foreign_tables: Vec<Table>,
    pub record_ids: Vec<RecordId>,
    pub events: Vec<EmittedEvent>,
}

pub struct CreateTableHandler {
    tables: CreateTablesHandler,
}

impl CreateTableHandler {
    pub fn new(services: Arc<Services>) -> Self {
        CreateTableHandler {
            tables: CreateTablesHandler::new(services),
        }
    }
}

#[async_trait]
impl CommandHandler for CreateTableHandler {
    type Command = CreateTable;

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        command: CreateTable,
    ) -> Result<CreateTableResult, DomainError> {
        let mut result = self
            .tables
            .handle(
                ctx,
                CreateTables {
                    base_id: command.base_id,
                    tables: vec![command.table],
                },
            )
            .await?;

        let table = result
            .tables
            .pop()
            .ok_or_else(|| DomainError::unexpected("table batch returned no table"))?;
        let record_ids = result.record_ids.shift_remove(table.id()).unwrap_or_default();

        Ok(CreateTableResult {
            table,
            foreign_tables: result.foreign_tables,
            record_ids,
            events: result.events,
        })
    }
}
