use std::sync::Arc;

use tablekit_memory::{InMemoryEventBus, MemoryStore};
use tablekit_sdk::{
    context::ExecutionContext,
    domain::{
        field::{Field, FieldKind, LinkOptions, Relationship},
        record::{RecordInput, TableRecord},
        table::Table,
    },
    ids::{BaseId, TableId},
    ports::{TableRecordRepository, TableRepository, TableSchemaRepository},
};

use crate::{config::EngineConfig, deps::Ports, engine::Engine};

pub(crate) struct Harness {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub bus: Arc<InMemoryEventBus>,
}

impl Harness {
    pub fn new() -> Self {
        Harness::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let engine = Engine::builder(Ports::from_store(store.clone(), bus.clone()))
            .config(config)
            .build();
        Harness { engine, store, bus }
    }

    pub fn ports(&self) -> Ports {
        Ports::from_store(self.store.clone(), self.bus.clone())
    }

    /// Stores a committed table with a single primary `"{id}F1"` text field
    /// named `Name`, then clears the call log.
    pub async fn seed_table(&self, id: &str, name: &str) -> Table {
        let table = Table::create(
            TableId::from(id),
            BaseId::from("bse1"),
            name,
            vec![text(&format!("{id}F1"), "Name")],
            Vec::new(),
        )
        .unwrap();
        let ctx = ctx();
        let stored = TableRepository::insert(self.store.as_ref(), &ctx, &table)
            .await
            .unwrap();
        TableSchemaRepository::insert(self.store.as_ref(), &ctx, &stored)
            .await
            .unwrap();
        self.store.clear_calls();
        stored
    }

    pub async fn seed_records(&self, table_id: &str, records: Vec<RecordInput>) {
        let table_id = TableId::from(table_id);
        let table = self.store.table(&table_id).unwrap();
        let records = records
            .into_iter()
            .map(|input| TableRecord::from_input(&table_id, input))
            .collect();
        self.store
            .insert_many(&ctx(), &table, records)
            .await
            .unwrap();
        self.store.clear_calls();
    }
}

pub(crate) fn ctx() -> ExecutionContext {
    ExecutionContext::new("usrTest")
}

pub(crate) fn text(id: &str, name: &str) -> Field {
    Field::new(id, name, FieldKind::SingleLineText)
}

pub(crate) fn link(id: &str, name: &str, foreign: &str, one_way: bool) -> Field {
    Field::new(
        id,
        name,
        FieldKind::Link(LinkOptions {
            foreign_table_id: TableId::from(foreign),
            foreign_base_id: None,
            relationship: Relationship::ManyMany,
            is_one_way: one_way,
            symmetric_field_id: None,
        }),
    )
}
