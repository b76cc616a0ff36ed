use std::sync::Arc;

use tablekit_sdk::ports::{
    EventBus, RecordOrderCalculator, TableRecordQueryRepository, TableRecordRepository,
    TableRepository, TableSchemaRepository, UnitOfWork,
};

/// The adapters every handler talks to.
#[derive(Clone)]
pub struct Ports {
    pub tables: Arc<dyn TableRepository>,
    pub schemas: Arc<dyn TableSchemaRepository>,
    pub records: Arc<dyn TableRecordRepository>,
    pub record_queries: Arc<dyn TableRecordQueryRepository>,
    pub order_calculator: Arc<dyn RecordOrderCalculator>,
    pub event_bus: Arc<dyn EventBus>,
    pub unit_of_work: Arc<dyn UnitOfWork>,
}

impl Ports {
    /// Uses one adapter for every port except the event bus.
    pub fn from_store<S>(store: Arc<S>, event_bus: Arc<dyn EventBus>) -> Self
    where
        S: TableRepository
            + TableSchemaRepository
            + TableRecordRepository
            + TableRecordQueryRepository
            + RecordOrderCalculator
            + UnitOfWork
            + 'static,
    {
        Ports {
            tables: store.clone(),
            schemas: store.clone(),
            records: store.clone(),
            record_queries: store.clone(),
            order_calculator: store.clone(),
            unit_of_work: store,
            event_bus,
        }
    }
}
