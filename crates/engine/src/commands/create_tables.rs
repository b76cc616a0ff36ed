use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    domain::{field::Field, record::RecordInput, table::Table, view::View},
    emit::{Emit, EmittedEvent},
    error::{DomainError, codes},
    events::RecordsCreated,
    ids::{BaseId, RecordId, TableId},
};
use tracing::debug;

use crate::{
    dependency::{sort_records, sort_tables},
    engine::Services,
    foreign_tables::{ForeignTableLoader, TableStateMap},
    record_batch::validate_records,
    side_effect::SideEffectService,
    unit_of_work::UnitOfWorkScope,
};

/// Definition of one table to create, optionally with initial records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInput {
    #[serde(default)]
    pub id: Option<TableId>,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub records: Vec<RecordInput>,
}

impl TableInput {
    pub fn new(name: impl Into<String>) -> Self {
        TableInput {
            name: name.into(),
            ..TableInput::default()
        }
    }

    pub fn id(mut self, id: impl Into<TableId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn view(mut self, view: View) -> Self {
        self.views.push(view);
        self
    }

    pub fn record(mut self, record: RecordInput) -> Self {
        self.records.push(record);
        self
    }
}

/// Creates several tables of one base in a single transaction.
///
/// Tables may link to each other and to existing tables; their initial
/// records may link across the batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTables {
    pub base_id: BaseId,
    pub tables: Vec<TableInput>,
}

impl Command for CreateTables {
    const NAME: &'static str = "CreateTables";
    type Output = CreateTablesResult;
}

#[derive(Clone, Debug)]
pub struct CreateTablesResult {
    /// Created tables in input order, in their final state.
    pub tables: Vec<Table>,
    /// Latest state of every referenced table outside the batch.
    pub foreign_tables: Vec<Table>,
    /// Ids of the inserted records per table.
    pub record_ids: IndexMap<TableId, Vec<RecordId>>,
    pub events: Vec<EmittedEvent>,
}

pub struct CreateTablesHandler {
    services: Arc<Services>,
}

impl CreateTablesHandler {
    pub fn new(services: Arc<Services>) -> Self {
        CreateTablesHandler { services }
    }

    async fn persist(
        &self,
        ctx: &ExecutionContext,
        plan: Plan,
    ) -> Result<(CreateTablesResult, Emit), DomainError> {
        let ports = &self.services.ports;
        let Plan {
            tables,
            mut state,
            records,
            input_order,
            foreign_ids,
        } = plan;
        let mut events = Emit::new();

        let mut declared = Vec::with_capacity(tables.len());
        for mut table in sort_tables(tables) {
            events.extend(table.pull_events());
            let persisted = ports.tables.insert(ctx, &table).await?;
            ports.schemas.insert(ctx, &persisted).await?;
            declared.push((persisted.id().clone(), persisted.fields().to_vec()));
            state.insert(persisted);
        }

        let side_effects = SideEffectService::new(ports, &self.services.policy);
        for (table_id, fields) in &declared {
            events.extend(side_effects.apply(ctx, table_id, fields, &mut state).await?);
        }

        let mut record_ids: IndexMap<TableId, Vec<RecordId>> = IndexMap::new();
        for group in sort_records(records) {
            let table = state.require(&group.table_id)?;
            let records = validate_records(table, group.records)?;
            let ids: Vec<RecordId> = records.iter().map(|record| record.id.clone()).collect();
            ports.records.insert_many(ctx, table, records).await?;
            record_ids.entry(group.table_id).or_default().extend(ids);
        }
        for (table_id, ids) in &record_ids {
            events.push(RecordsCreated {
                table_id: table_id.clone(),
                record_ids: ids.clone(),
            })?;
        }

        let tables = input_order
            .iter()
            .map(|table_id| state.require(table_id).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let foreign_tables = foreign_ids
            .iter()
            .filter_map(|table_id| state.get(table_id).cloned())
            .collect();

        Ok((
            CreateTablesResult {
                tables,
                foreign_tables,
                record_ids,
                events: Vec::new(),
            },
            events,
        ))
    }
}

/// Validated tables and everything needed to persist them.
struct Plan {
    tables: Vec<Table>,
    state: TableStateMap,
    records: Vec<(TableId, Vec<RecordInput>)>,
    input_order: Vec<TableId>,
    foreign_ids: Vec<TableId>,
}

#[async_trait]
impl CommandHandler for CreateTablesHandler {
    type Command = CreateTables;

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        command: CreateTables,
    ) -> Result<CreateTablesResult, DomainError> {
        let CreateTables { base_id, tables: inputs } = command;
        if inputs.is_empty() {
            return Err(DomainError::validation("At least one table is required")
                .with_code(codes::TABLE_INVALID));
        }

        let mut batch = HashSet::new();
        let mut tables = Vec::with_capacity(inputs.len());
        let mut records = Vec::with_capacity(inputs.len());
        for input in inputs {
            let table_id = input.id.unwrap_or_else(TableId::generate);
            if !batch.insert(table_id.clone()) {
                return Err(DomainError::validation(format!("Table {table_id} appears twice"))
                    .with_code(codes::TABLE_INVALID));
            }
            let table = Table::create(
                table_id.clone(),
                base_id.clone(),
                input.name,
                input.fields,
                input.views,
            )?;
            records.push((table_id, with_record_ids(input.records)));
            tables.push(table);
        }
        let input_order: Vec<TableId> = tables.iter().map(|table| table.id().clone()).collect();

        let foreign = ForeignTableLoader::new(self.services.ports.tables.as_ref())
            .load(ctx, tables.iter().flat_map(|table| table.fields()), &batch)
            .await?;
        let foreign_ids: Vec<TableId> = foreign.iter().map(|table| table.id().clone()).collect();
        let state = TableStateMap::new(foreign.into_iter().chain(tables.iter().cloned()));
        state.validate(&input_order)?;
        debug!(
            tables = input_order.len(),
            foreign = foreign_ids.len(),
            "validated table batch"
        );

        let scope = UnitOfWorkScope::begin(&self.services.ports, ctx).await?;
        let outcome = self
            .persist(
                scope.context(),
                Plan {
                    tables,
                    state,
                    records,
                    input_order,
                    foreign_ids,
                },
            )
            .await;
        let (mut result, events) = scope.complete_with_events(outcome).await?;
        result.events = events;
        Ok(result)
    }
}

/// Gives every record without an id a fresh one so that link cells and
/// results can refer to it.
pub(crate) fn with_record_ids(records: Vec<RecordInput>) -> Vec<RecordInput> {
    records
        .into_iter()
        .map(|mut record| {
            record.id.get_or_insert_with(RecordId::generate);
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tablekit_memory::ops;
    use tablekit_sdk::{
        domain::field::FieldKind,
        error::ErrorKind,
        event::Event,
        events::{FieldCreated, TableCreated},
        ids::FieldId,
    };

    use super::*;
    use crate::testing::{Harness, ctx, link, text};

    fn event_types(events: &[EmittedEvent]) -> Vec<&str> {
        events.iter().map(|event| event.event_type.as_str()).collect()
    }

    // ==================== Creation ====================

    #[tokio::test]
    async fn creates_tables_with_defaults() {
        let harness = Harness::new();
        let result = harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: vec![TableInput::new("People").id("T1").field(text("F1", "Name"))],
                },
            )
            .await
            .unwrap();

        let table = &result.tables[0];
        assert!(table.fields()[0].is_primary);
        assert_eq!(table.views().len(), 1);
        assert_eq!(event_types(&result.events), [TableCreated::EVENT_TYPE]);
        assert!(harness.store.table(&TableId::from("T1")).is_some());
        assert_eq!(harness.bus.event_types(), [TableCreated::EVENT_TYPE]);
    }

    #[tokio::test]
    async fn link_between_batch_tables_gets_reciprocal() {
        let harness = Harness::new();
        let result = harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: vec![
                        TableInput::new("A").id("TA").field(text("FA", "Name")),
                        TableInput::new("B")
                            .id("TB")
                            .field(text("FB", "Name"))
                            .field(link("FBA", "To A", "TA", false)),
                    ],
                },
            )
            .await
            .unwrap();

        let a = &result.tables[0];
        let reciprocal = a.field_by_name("B").expect("reciprocal field on A");
        let options = reciprocal.link_options().unwrap();
        assert_eq!(options.foreign_table_id, TableId::from("TB"));
        assert_eq!(options.symmetric_field_id, Some(FieldId::from("FBA")));

        let b = &result.tables[1];
        assert_eq!(
            b.field(&FieldId::from("FBA")).unwrap().link_options().unwrap().symmetric_field_id,
            Some(reciprocal.id.clone())
        );
        assert_eq!(
            event_types(&result.events),
            [TableCreated::EVENT_TYPE, TableCreated::EVENT_TYPE, FieldCreated::EVENT_TYPE]
        );
        assert_eq!(harness.bus.published().len(), 3);
    }

    #[tokio::test]
    async fn dependent_table_is_inserted_after_its_dependency() {
        let harness = Harness::new();
        harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: vec![
                        TableInput::new("B")
                            .id("TB")
                            .field(text("FB", "Name"))
                            .field(link("FBA", "To A", "TA", true)),
                        TableInput::new("A").id("TA").field(text("FA", "Name")),
                    ],
                },
            )
            .await
            .unwrap();

        let inserted: Vec<_> = harness
            .store
            .calls()
            .into_iter()
            .filter(|call| call.operation == ops::TABLES_INSERT)
            .filter_map(|call| call.table_id)
            .collect();
        assert_eq!(inserted, [TableId::from("TA"), TableId::from("TB")]);
    }

    #[tokio::test]
    async fn link_to_existing_table_updates_it() {
        let harness = Harness::new();
        harness.seed_table("T1", "Customers").await;

        let result = harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: vec![
                        TableInput::new("Orders")
                            .id("T2")
                            .field(text("F1", "Name"))
                            .field(link("F2", "Customer", "T1", false)),
                    ],
                },
            )
            .await
            .unwrap();

        assert_eq!(result.foreign_tables.len(), 1);
        let customers = harness.store.table(&TableId::from("T1")).unwrap();
        assert!(customers.field_by_name("Orders").is_some());
        assert_eq!(
            harness.store.calls_to(ops::TABLES_FIND_MANY),
            1,
            "foreign tables are loaded in one call"
        );
    }

    #[tokio::test]
    async fn two_links_to_existing_table_get_distinct_reciprocals() {
        let harness = Harness::new();
        harness.seed_table("T1", "Customers").await;

        let result = harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: vec![
                        TableInput::new("Orders")
                            .id("T2")
                            .field(text("F1", "Name"))
                            .field(link("F2", "Customer", "T1", false))
                            .field(link("F3", "Billing customer", "T1", false)),
                    ],
                },
            )
            .await
            .unwrap();

        let customers = harness.store.table(&TableId::from("T1")).unwrap();
        let names: Vec<_> = customers.fields().iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, ["Name", "Orders", "Orders 1"]);
        for (field_id, reciprocal) in [("F2", "Orders"), ("F3", "Orders 1")] {
            let options = customers.field_by_name(reciprocal).unwrap().link_options().unwrap();
            assert_eq!(options.symmetric_field_id, Some(FieldId::from(field_id)));
        }
        assert_eq!(
            event_types(&result.events),
            [TableCreated::EVENT_TYPE, FieldCreated::EVENT_TYPE, FieldCreated::EVENT_TYPE]
        );
        let field_created = harness
            .bus
            .event_types()
            .into_iter()
            .filter(|event_type| event_type == FieldCreated::EVENT_TYPE)
            .count();
        assert_eq!(field_created, 2);
    }

    // ==================== Records ====================

    #[tokio::test]
    async fn linked_records_are_inserted_in_dependency_order() {
        let harness = Harness::new();
        let result = harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: vec![
                        TableInput::new("T2")
                            .id("T2")
                            .field(text("F21", "Name"))
                            .field(link("F22", "Parent", "T1", true))
                            .record(RecordInput::new("R2").field("F22", json!([{ "id": "R1" }]))),
                        TableInput::new("T1")
                            .id("T1")
                            .field(text("F11", "Name"))
                            .record(RecordInput::new("R1").field("F11", json!("root"))),
                    ],
                },
            )
            .await
            .unwrap();

        let inserted: Vec<_> = harness
            .store
            .calls()
            .into_iter()
            .filter(|call| call.operation == ops::RECORDS_INSERT_MANY)
            .filter_map(|call| call.table_id)
            .collect();
        assert_eq!(inserted, [TableId::from("T1"), TableId::from("T2")]);
        assert_eq!(result.record_ids[&TableId::from("T2")], [RecordId::from("R2")]);
        assert!(harness.store.record(&TableId::from("T2"), &RecordId::from("R2")).is_some());
    }

    #[tokio::test]
    async fn records_without_ids_get_generated_ids() {
        let harness = Harness::new();
        let result = harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: vec![
                        TableInput::new("Notes")
                            .id("T1")
                            .field(text("F1", "Name"))
                            .record(RecordInput::default().field("F1", json!("a")))
                            .record(RecordInput::default().field("F1", json!("b"))),
                    ],
                },
            )
            .await
            .unwrap();

        let ids = &result.record_ids[&TableId::from("T1")];
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id.as_str().starts_with("rec")));
    }

    // ==================== Failures ====================

    #[tokio::test]
    async fn missing_foreign_table_is_not_found() {
        let harness = Harness::new();
        let err = harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: vec![
                        TableInput::new("Orders")
                            .field(text("F1", "Name"))
                            .field(link("F2", "Customer", "tblMissing", false)),
                    ],
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(harness.store.calls_to(ops::UOW_BEGIN), 0);
        assert!(harness.bus.published().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let harness = Harness::new();
        let err = harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: Vec::new(),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn failed_persistence_rolls_back_and_publishes_nothing() {
        let harness = Harness::new();
        harness.store.fail_on(ops::SCHEMAS_INSERT);

        let err = harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: vec![TableInput::new("People").id("T1").field(text("F1", "Name"))],
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Unexpected);
        assert_eq!(harness.store.calls_to(ops::UOW_ROLLBACK), 1);
        assert_eq!(harness.store.calls_to(ops::UOW_COMMIT), 0);
        assert!(harness.store.table(&TableId::from("T1")).is_none());
        assert!(harness.bus.published().is_empty());
    }

    #[tokio::test]
    async fn invalid_record_rolls_back_tables() {
        let harness = Harness::new();
        let err = harness
            .engine
            .execute(
                &ctx(),
                CreateTables {
                    base_id: BaseId::from("bse1"),
                    tables: vec![
                        TableInput::new("People")
                            .id("T1")
                            .field(text("F1", "Name"))
                            .field(Field::new("F2", "Age", FieldKind::Number { precision: 0 }))
                            .record(RecordInput::new("R1").field("F2", json!("old"))),
                    ],
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(harness.store.table(&TableId::from("T1")).is_none());
        assert!(harness.bus.published().is_empty());
    }
}
