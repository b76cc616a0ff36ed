use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    domain::mutate::TableMutateSpec,
    error::DomainError,
    ids::TableId,
};

use crate::{
    commands::rename_field::{RenameResult, rename},
    engine::Services,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameTable {
    pub table_id: TableId,
    pub name: String,
}

impl Command for RenameTable {
    const NAME: &'static str = "RenameTable";
    type Output = RenameResult;
}

pub struct RenameTableHandler {
    services: Arc<Services>,
}

impl RenameTableHandler {
    pub fn new(services: Arc<Services>) -> Self {
        RenameTableHandler { services }
    }
}

#[async_trait]
impl CommandHandler for RenameTableHandler {
    type Command = RenameTable;

    async fn handle(&self, ctx: &ExecutionContext, command: RenameTable) -> Result<RenameResult, DomainError> {
        let spec = TableMutateSpec::RenameTable { name: command.name };
        rename(&self.services, ctx, &command.table_id, spec).await
    }
}

#[cfg(test)]
mod tests {
    use tablekit_memory::ops;
    use tablekit_sdk::{error::ErrorKind, event::Event, events::TableRenamed};

    use super::*;
    use crate::testing::{Harness, ctx};

    #[tokio::test]
    async fn renames_table() {
        let harness = Harness::new();
        harness.seed_table("T1", "Tasks").await;

        let result = harness
            .engine
            .execute(
                &ctx(),
                RenameTable {
                    table_id: TableId::from("T1"),
                    name: " Chores ".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(result.table.name(), "Chores");
        assert_eq!(harness.bus.event_types(), [TableRenamed::EVENT_TYPE]);
        assert_eq!(harness.store.calls_to(ops::SCHEMAS_UPDATE), 1);
    }

    #[tokio::test]
    async fn unchanged_name_publishes_nothing() {
        let harness = Harness::new();
        harness.seed_table("T1", "Tasks").await;

        let result = harness
            .engine
            .execute(
                &ctx(),
                RenameTable {
                    table_id: TableId::from("T1"),
                    name: "Tasks".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert!(harness.bus.published().is_empty());
    }

    #[tokio::test]
    async fn unknown_table_is_not_found() {
        let harness = Harness::new();
        let err = harness
            .engine
            .execute(
                &ctx(),
                RenameTable {
                    table_id: TableId::from("T404"),
                    name: "Chores".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
