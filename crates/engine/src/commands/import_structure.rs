use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    error::DomainError,
    ids::BaseId,
};
use tracing::debug;

use crate::{
    commands::create_tables::{CreateTables, CreateTablesHandler, CreateTablesResult},
    engine::Services,
    unit_of_work::UnitOfWorkScope,
};

/// Creates the tables described by a structure file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStructure {
    pub base_id: BaseId,
    pub source: String,
}

impl Command for ImportStructure {
    const NAME: &'static str = "ImportStructure";
    type Output = CreateTablesResult;
}

pub struct ImportStructureHandler {
    services: Arc<Services>,
    tables: CreateTablesHandler,
}

impl ImportStructureHandler {
    pub fn new(services: Arc<Services>) -> Self {
        ImportStructureHandler {
            tables: CreateTablesHandler::new(services.clone()),
            services,
        }
    }
}

#[async_trait]
impl CommandHandler for ImportStructureHandler {
    type Command = ImportStructure;

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        command: ImportStructure,
    ) -> Result<CreateTablesResult, DomainError> {
        let structure = self.services.importer.import(&command.source)?;
        debug!(tables = structure.tables.len(), "parsed structure");

        let scope = UnitOfWorkScope::begin(&self.services.ports, ctx).await?;
        let outcome = self
            .tables
            .handle(
                scope.context(),
                CreateTables {
                    base_id: command.base_id,
                    tables: structure.tables,
                },
            )
            .await;
        scope.complete(outcome).await
    }
}
