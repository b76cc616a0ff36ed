use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use futures_util::StreamExt;
use indexmap::IndexMap;
use tablekit_sdk::{
    context::{ExecutionContext, TransactionHandle},
    domain::{
        field::ForeignTableRef,
        mutate::TableMutateSpec,
        record::TableRecord,
        table::Table,
    },
    error::{DomainError, codes},
    ids::{FieldId, RecordId, TableId, ViewId},
    ports::{
        OrderPosition, RecordBatchStream, RecordFilter, RecordOrderCalculator, RecordQueryOptions,
        RecordUpdate, RecordUpdateStream, TableRecordQueryRepository, TableRecordRepository,
        TableRepository, TableSchemaRepository, UnitOfWork,
    },
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::call_log::{Call, CallLog, ops};

#[derive(Clone, Debug, Default)]
struct Snapshot {
    tables: IndexMap<TableId, Table>,
    /// Physical columns per table, in creation order.
    columns: IndexMap<TableId, Vec<FieldId>>,
    records: IndexMap<TableId, IndexMap<RecordId, TableRecord>>,
}

#[derive(Debug, Default)]
struct State {
    committed: Snapshot,
    open: HashMap<Uuid, Snapshot>,
}

/// An in-memory implementation of every persistence port.
///
/// Each transaction works on its own copy of the committed state and
/// replaces it on commit; the last commit wins. Calls without a transaction
/// write straight to the committed state.
///
/// Every port call is recorded, and failures can be injected per operation
/// with [`MemoryStore::fail_on`] and [`MemoryStore::fail_on_call`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    log: CallLog,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.calls()
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        self.log.count(operation)
    }

    pub fn clear_calls(&self) {
        self.log.clear();
    }

    /// Fails every following call to `operation`.
    pub fn fail_on(&self, operation: &'static str) {
        self.log.fail(operation, None);
    }

    /// Fails the `nth` call to `operation` from now on, counting from 1, once.
    pub fn fail_on_call(&self, operation: &'static str, nth: usize) {
        self.log.fail(operation, Some(nth.saturating_sub(1)));
    }

    /// Committed state of a table.
    pub fn table(&self, table_id: &TableId) -> Option<Table> {
        self.committed(|snapshot| snapshot.tables.get(table_id).cloned())
    }

    pub fn tables(&self) -> Vec<Table> {
        self.committed(|snapshot| snapshot.tables.values().cloned().collect())
    }

    /// Committed physical columns of a table.
    pub fn columns(&self, table_id: &TableId) -> Vec<FieldId> {
        self.committed(|snapshot| {
            snapshot
                .columns
                .get(table_id)
                .cloned()
                .unwrap_or_default()
        })
    }

    pub fn record(&self, table_id: &TableId, record_id: &RecordId) -> Option<TableRecord> {
        self.committed(|snapshot| {
            snapshot
                .records
                .get(table_id)
                .and_then(|records| records.get(record_id))
                .cloned()
        })
    }

    /// Committed records of a table, in insertion order.
    pub fn records(&self, table_id: &TableId) -> Vec<TableRecord> {
        self.committed(|snapshot| {
            snapshot
                .records
                .get(table_id)
                .map(|records| records.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    pub fn open_transactions(&self) -> usize {
        self.lock().open.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn committed<T>(&self, read: impl FnOnce(&Snapshot) -> T) -> T {
        read(&self.lock().committed)
    }

    fn read<T>(
        &self,
        ctx: &ExecutionContext,
        read: impl FnOnce(&Snapshot) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let state = self.lock();
        match ctx.transaction() {
            Some(transaction) => read(open_snapshot(&state.open, transaction)?),
            None => read(&state.committed),
        }
    }

    /// Applies `write` to a copy of the visible snapshot and keeps the copy
    /// only when it succeeds.
    fn write<T>(
        &self,
        ctx: &ExecutionContext,
        write: impl FnOnce(&mut Snapshot) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let mut state = self.lock();
        let target = match ctx.transaction() {
            Some(transaction) => state
                .open
                .get_mut(&transaction.id())
                .ok_or_else(|| not_open(transaction))?,
            None => &mut state.committed,
        };
        let mut next = target.clone();
        let output = write(&mut next)?;
        *target = next;
        Ok(output)
    }

    fn record_call(
        &self,
        operation: &'static str,
        ctx: &ExecutionContext,
        table_id: Option<&TableId>,
    ) -> Result<(), DomainError> {
        self.log.record(
            operation,
            table_id,
            ctx.transaction().map(TransactionHandle::id),
        )
    }
}

fn open_snapshot<'a>(
    open: &'a HashMap<Uuid, Snapshot>,
    transaction: &TransactionHandle,
) -> Result<&'a Snapshot, DomainError> {
    open.get(&transaction.id()).ok_or_else(|| not_open(transaction))
}

fn not_open(transaction: &TransactionHandle) -> DomainError {
    DomainError::unexpected(format!("transaction {} is not open", transaction.id()))
}

fn stored_table<'a>(snapshot: &'a Snapshot, table_id: &TableId) -> Result<&'a Table, DomainError> {
    snapshot
        .tables
        .get(table_id)
        .ok_or_else(|| DomainError::table_not_found(table_id))
}

fn record_not_found(record_id: &RecordId) -> DomainError {
    DomainError::not_found(format!("Record {record_id} not found")).with_code(codes::RECORD_NOT_FOUND)
}

/// Tables are stored without pending events.
fn settled(table: &Table) -> Table {
    let mut table = table.clone();
    table.pull_events();
    table
}

fn insert_records(
    snapshot: &mut Snapshot,
    table_id: &TableId,
    records: Vec<TableRecord>,
) -> Result<usize, DomainError> {
    let views: Vec<ViewId> = stored_table(snapshot, table_id)?
        .views()
        .iter()
        .map(|view| view.id.clone())
        .collect();
    let stored = snapshot.records.entry(table_id.clone()).or_default();

    // Next free order per view, computed once for the whole batch.
    let mut next_orders: Vec<(ViewId, f64)> = views
        .into_iter()
        .map(|view_id| {
            let max = stored
                .values()
                .filter_map(|existing| existing.order(&view_id))
                .fold(0.0, f64::max);
            (view_id, max + 1.0)
        })
        .collect();

    let count = records.len();
    for mut record in records {
        if stored.contains_key(&record.id) {
            return Err(DomainError::validation(format!(
                "Record {} already exists in table {table_id}",
                record.id
            ))
            .with_code(codes::RECORD_INVALID_VALUE));
        }
        for (view_id, next) in &mut next_orders {
            match record.order(view_id) {
                Some(order) => *next = next.max(order + 1.0),
                None => {
                    record.orders.insert(view_id.clone(), *next);
                    *next += 1.0;
                }
            }
        }
        record.table_id = table_id.clone();
        stored.insert(record.id.clone(), record);
    }
    Ok(count)
}

fn update_records(
    snapshot: &mut Snapshot,
    table_id: &TableId,
    updates: Vec<RecordUpdate>,
) -> Result<(), DomainError> {
    stored_table(snapshot, table_id)?;
    let stored = snapshot.records.entry(table_id.clone()).or_default();
    for update in updates {
        let record = stored
            .get_mut(&update.record_id)
            .ok_or_else(|| record_not_found(&update.record_id))?;
        *record = record.update(&update.spec);
    }
    Ok(())
}

/// `count` ascending orders placed next to `anchor`.
///
/// With a neighbor on that side the orders split the gap evenly; without one
/// they step by 1 away from the anchor.
pub(crate) fn orders_next_to(
    anchor: f64,
    neighbor: Option<f64>,
    position: OrderPosition,
    count: usize,
) -> Vec<f64> {
    let steps = (1..=count).map(|step| step as f64);
    match (position, neighbor) {
        (_, Some(neighbor)) => {
            let (low, high) = match position {
                OrderPosition::After => (anchor, neighbor),
                OrderPosition::Before => (neighbor, anchor),
            };
            let gap = (high - low) / (count as f64 + 1.0);
            steps.map(|step| low + gap * step).collect()
        }
        (OrderPosition::After, None) => steps.map(|step| anchor + step).collect(),
        (OrderPosition::Before, None) => steps.map(|step| anchor - (count as f64 + 1.0 - step)).collect(),
    }
}

#[async_trait]
impl TableRepository for MemoryStore {
    async fn insert(&self, ctx: &ExecutionContext, table: &Table) -> Result<Table, DomainError> {
        self.record_call(ops::TABLES_INSERT, ctx, Some(table.id()))?;
        self.write(ctx, |snapshot| {
            if snapshot.tables.contains_key(table.id()) {
                return Err(DomainError::validation(format!(
                    "Table {} already exists",
                    table.id()
                ))
                .with_code(codes::TABLE_INVALID));
            }
            let stored = settled(table);
            snapshot.tables.insert(table.id().clone(), stored.clone());
            Ok(stored)
        })
    }

    async fn update(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        spec: &TableMutateSpec,
    ) -> Result<(), DomainError> {
        self.record_call(ops::TABLES_UPDATE, ctx, Some(table.id()))?;
        self.write(ctx, |snapshot| {
            stored_table(snapshot, table.id())?;
            snapshot.tables.insert(table.id().clone(), settled(table));
            debug!(table_id = %table.id(), op = spec.op_name(), "table updated");
            Ok(())
        })
    }

    async fn find_one(
        &self,
        ctx: &ExecutionContext,
        table_id: &TableId,
    ) -> Result<Option<Table>, DomainError> {
        self.record_call(ops::TABLES_FIND_ONE, ctx, Some(table_id))?;
        self.read(ctx, |snapshot| Ok(snapshot.tables.get(table_id).cloned()))
    }

    async fn find_many(
        &self,
        ctx: &ExecutionContext,
        refs: &[ForeignTableRef],
    ) -> Result<Vec<Table>, DomainError> {
        self.record_call(ops::TABLES_FIND_MANY, ctx, None)?;
        self.read(ctx, |snapshot| {
            Ok(refs
                .iter()
                .filter_map(|table_ref| {
                    snapshot.tables.get(&table_ref.table_id).filter(|table| {
                        table_ref
                            .base_id
                            .as_ref()
                            .is_none_or(|base_id| table.base_id() == base_id)
                    })
                })
                .cloned()
                .collect())
        })
    }
}

#[async_trait]
impl TableSchemaRepository for MemoryStore {
    async fn insert(&self, ctx: &ExecutionContext, table: &Table) -> Result<(), DomainError> {
        self.record_call(ops::SCHEMAS_INSERT, ctx, Some(table.id()))?;
        self.write(ctx, |snapshot| {
            snapshot.columns.insert(
                table.id().clone(),
                table.fields().iter().map(|field| field.id.clone()).collect(),
            );
            Ok(())
        })
    }

    async fn update(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        spec: &TableMutateSpec,
    ) -> Result<(), DomainError> {
        self.record_call(ops::SCHEMAS_UPDATE, ctx, Some(table.id()))?;
        self.write(ctx, |snapshot| {
            let columns = snapshot.columns.entry(table.id().clone()).or_default();
            if let Some(field) = spec.created_field()
                && !columns.contains(&field.id)
            {
                columns.push(field.id.clone());
            }
            Ok(())
        })
    }
}

#[async_trait]
impl TableRecordRepository for MemoryStore {
    async fn insert_many(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        records: Vec<TableRecord>,
    ) -> Result<usize, DomainError> {
        self.record_call(ops::RECORDS_INSERT_MANY, ctx, Some(table.id()))?;
        self.write(ctx, |snapshot| insert_records(snapshot, table.id(), records))
    }

    async fn insert_many_stream(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        mut batches: RecordBatchStream<'_>,
    ) -> Result<usize, DomainError> {
        let mut inserted = 0;
        while let Some(batch) = batches.next().await {
            let batch = batch?;
            self.record_call(ops::RECORDS_BATCH, ctx, Some(table.id()))?;
            inserted += self.write(ctx, |snapshot| insert_records(snapshot, table.id(), batch))?;
        }
        Ok(inserted)
    }

    async fn update_many_stream(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        mut batches: RecordUpdateStream<'_>,
    ) -> Result<(), DomainError> {
        while let Some(batch) = batches.next().await {
            let batch = batch?;
            self.record_call(ops::RECORDS_UPDATE_BATCH, ctx, Some(table.id()))?;
            self.write(ctx, |snapshot| update_records(snapshot, table.id(), batch))?;
        }
        Ok(())
    }
}

#[async_trait]
impl TableRecordQueryRepository for MemoryStore {
    async fn find(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        filter: &RecordFilter,
        options: RecordQueryOptions,
    ) -> Result<Vec<TableRecord>, DomainError> {
        self.record_call(ops::RECORDS_FIND, ctx, Some(table.id()))?;
        let mut records = self.read(ctx, |snapshot| {
            let Some(stored) = snapshot.records.get(table.id()) else {
                return Ok(Vec::new());
            };
            Ok(match filter {
                RecordFilter::All => stored.values().cloned().collect::<Vec<_>>(),
                RecordFilter::ByIds(ids) => ids
                    .iter()
                    .filter_map(|record_id| stored.get(record_id))
                    .cloned()
                    .collect(),
            })
        })?;
        if !options.include_orders {
            for record in &mut records {
                record.orders.clear();
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl RecordOrderCalculator for MemoryStore {
    async fn calculate_orders(
        &self,
        ctx: &ExecutionContext,
        table: &Table,
        view_id: &ViewId,
        anchor_id: &RecordId,
        position: OrderPosition,
        count: usize,
    ) -> Result<Vec<f64>, DomainError> {
        self.record_call(ops::ORDERS_CALCULATE, ctx, Some(table.id()))?;
        self.read(ctx, |snapshot| {
            let stored = snapshot.records.get(table.id());
            let anchor = stored
                .and_then(|records| records.get(anchor_id))
                .ok_or_else(|| record_not_found(anchor_id))?;
            let anchor_order = anchor.order(view_id).ok_or_else(|| {
                DomainError::validation(format!(
                    "Record {anchor_id} has no order in view {view_id}"
                ))
            })?;

            let orders = stored
                .into_iter()
                .flat_map(|records| records.values())
                .filter_map(|record| record.order(view_id));
            let neighbor = match position {
                OrderPosition::After => orders
                    .filter(|order| *order > anchor_order)
                    .min_by(f64::total_cmp),
                OrderPosition::Before => orders
                    .filter(|order| *order < anchor_order)
                    .max_by(f64::total_cmp),
            };
            Ok(orders_next_to(anchor_order, neighbor, position, count))
        })
    }
}

#[async_trait]
impl UnitOfWork for MemoryStore {
    async fn begin(&self, ctx: &ExecutionContext) -> Result<TransactionHandle, DomainError> {
        self.record_call(ops::UOW_BEGIN, ctx, None)?;
        let transaction = TransactionHandle::new();
        let mut state = self.lock();
        let snapshot = state.committed.clone();
        state.open.insert(transaction.id(), snapshot);
        Ok(transaction)
    }

    async fn commit(&self, transaction: &TransactionHandle) -> Result<(), DomainError> {
        self.log
            .record(ops::UOW_COMMIT, None, Some(transaction.id()))?;
        let mut state = self.lock();
        let snapshot = state
            .open
            .remove(&transaction.id())
            .ok_or_else(|| not_open(transaction))?;
        state.committed = snapshot;
        debug!(transaction_id = %transaction.id(), "committed");
        Ok(())
    }

    async fn rollback(&self, transaction: &TransactionHandle) -> Result<(), DomainError> {
        self.log
            .record(ops::UOW_ROLLBACK, None, Some(transaction.id()))?;
        if self.lock().open.remove(&transaction.id()).is_none() {
            warn!(transaction_id = %transaction.id(), "rollback of a transaction that is not open");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tablekit_sdk::{
        domain::{
            field::{Field, FieldKind},
            mutate::RecordMutateSpec,
            record::RecordInput,
        },
        error::ErrorKind,
        ids::BaseId,
    };

    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("usr1")
    }

    fn table(id: &str) -> Table {
        Table::create(
            TableId::from(id),
            BaseId::from("bse1"),
            "Tasks",
            vec![Field::new(format!("{id}F1"), "Name", FieldKind::SingleLineText)],
            Vec::new(),
        )
        .unwrap()
    }

    fn records(table_id: &str, ids: &[&str]) -> Vec<TableRecord> {
        ids.iter()
            .map(|id| TableRecord::from_input(&TableId::from(table_id), RecordInput::new(*id)))
            .collect()
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = MemoryStore::new();
        let ctx = ctx();
        let transaction = store.begin(&ctx).await.unwrap();
        let tx_ctx = ctx.with_transaction(transaction.clone());

        TableRepository::insert(&store, &tx_ctx, &table("T1"))
            .await
            .unwrap();
        assert!(store.table(&TableId::from("T1")).is_none());
        assert!(
            store
                .find_one(&tx_ctx, &TableId::from("T1"))
                .await
                .unwrap()
                .is_some()
        );

        store.rollback(&transaction).await.unwrap();
        assert!(store.table(&TableId::from("T1")).is_none());
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn commit_publishes_staged_writes() {
        let store = MemoryStore::new();
        let ctx = ctx();
        let transaction = store.begin(&ctx).await.unwrap();
        let tx_ctx = ctx.with_transaction(transaction.clone());

        let stored = TableRepository::insert(&store, &tx_ctx, &table("T1"))
            .await
            .unwrap();
        TableSchemaRepository::insert(&store, &tx_ctx, &stored)
            .await
            .unwrap();
        store.commit(&transaction).await.unwrap();

        assert!(stored.pending_events().is_empty());
        assert!(store.table(&TableId::from("T1")).is_some());
        assert_eq!(store.columns(&TableId::from("T1")), [FieldId::from("T1F1")]);
        assert!(store.commit(&transaction).await.is_err());
    }

    #[tokio::test]
    async fn calls_carry_the_transaction() {
        let store = MemoryStore::new();
        let ctx = ctx();
        let transaction = store.begin(&ctx).await.unwrap();
        TableRepository::insert(&store, &ctx.with_transaction(transaction.clone()), &table("T1"))
            .await
            .unwrap();

        let calls = store.calls();
        assert_eq!(calls[0].operation, ops::UOW_BEGIN);
        assert_eq!(calls[1].operation, ops::TABLES_INSERT);
        assert_eq!(calls[1].table_id, Some(TableId::from("T1")));
        assert_eq!(calls[1].transaction_id, Some(transaction.id()));
    }

    #[tokio::test]
    async fn duplicate_table_is_rejected() {
        let store = MemoryStore::new();
        TableRepository::insert(&store, &ctx(), &table("T1"))
            .await
            .unwrap();

        let err = TableRepository::insert(&store, &ctx(), &table("T1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn find_many_filters_by_base() {
        let store = MemoryStore::new();
        TableRepository::insert(&store, &ctx(), &table("T1"))
            .await
            .unwrap();

        let found = store
            .find_many(
                &ctx(),
                &[
                    ForeignTableRef {
                        base_id: None,
                        table_id: TableId::from("T1"),
                    },
                    ForeignTableRef {
                        base_id: Some(BaseId::from("bseOther")),
                        table_id: TableId::from("T1"),
                    },
                    ForeignTableRef {
                        base_id: None,
                        table_id: TableId::from("T9"),
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn inserted_records_get_increasing_orders() {
        let store = MemoryStore::new();
        let stored = TableRepository::insert(&store, &ctx(), &table("T1"))
            .await
            .unwrap();
        let view_id = stored.views()[0].id.clone();

        store
            .insert_many(&ctx(), &stored, records("T1", &["R1", "R2"]))
            .await
            .unwrap();
        store
            .insert_many(&ctx(), &stored, records("T1", &["R3"]))
            .await
            .unwrap();

        let orders: Vec<_> = store
            .records(&TableId::from("T1"))
            .iter()
            .map(|record| record.order(&view_id))
            .collect();
        assert_eq!(orders, [Some(1.0), Some(2.0), Some(3.0)]);

        let err = store
            .insert_many(&ctx(), &stored, records("T1", &["R4", "R1"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(store.records(&TableId::from("T1")).len(), 3);
    }

    #[tokio::test]
    async fn batch_orders_continue_after_explicit_order() {
        let store = MemoryStore::new();
        let stored = TableRepository::insert(&store, &ctx(), &table("T1"))
            .await
            .unwrap();
        let view_id = stored.views()[0].id.clone();

        let mut batch = records("T1", &["R1", "R2", "R3"]);
        batch[1].orders.insert(view_id.clone(), 10.0);
        store.insert_many(&ctx(), &stored, batch).await.unwrap();

        let orders: Vec<_> = store
            .records(&TableId::from("T1"))
            .iter()
            .map(|record| record.order(&view_id))
            .collect();
        assert_eq!(orders, [Some(1.0), Some(10.0), Some(11.0)]);
    }

    #[tokio::test]
    async fn find_by_ids_keeps_requested_order() {
        let store = MemoryStore::new();
        let stored = TableRepository::insert(&store, &ctx(), &table("T1"))
            .await
            .unwrap();
        store
            .insert_many(&ctx(), &stored, records("T1", &["R1", "R2", "R3"]))
            .await
            .unwrap();

        let found = store
            .find(
                &ctx(),
                &stored,
                &RecordFilter::ByIds(vec![RecordId::from("R3"), RecordId::from("R9"), RecordId::from("R1")]),
                RecordQueryOptions::default(),
            )
            .await
            .unwrap();

        let ids: Vec<_> = found.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, ["R3", "R1"]);
        assert!(found[0].orders.is_empty());
    }

    #[tokio::test]
    async fn update_stream_replays_specs() {
        let store = MemoryStore::new();
        let stored = TableRepository::insert(&store, &ctx(), &table("T1"))
            .await
            .unwrap();
        store
            .insert_many(&ctx(), &stored, records("T1", &["R1"]))
            .await
            .unwrap();

        let update = RecordUpdate {
            record_id: RecordId::from("R1"),
            spec: RecordMutateSpec::SetFieldValue {
                field_id: FieldId::from("T1F1"),
                value: json!("Ada"),
            },
        };
        store
            .update_many_stream(
                &ctx(),
                &stored,
                futures_util::stream::iter([Ok(vec![update])]).boxed(),
            )
            .await
            .unwrap();

        let record = store
            .record(&TableId::from("T1"), &RecordId::from("R1"))
            .unwrap();
        assert_eq!(record.value(&FieldId::from("T1F1")), Some(&json!("Ada")));
        assert_eq!(store.calls_to(ops::RECORDS_UPDATE_BATCH), 1);
    }

    #[tokio::test]
    async fn orders_fill_the_gap_next_to_anchor() {
        let store = MemoryStore::new();
        let stored = TableRepository::insert(&store, &ctx(), &table("T1"))
            .await
            .unwrap();
        let view_id = stored.views()[0].id.clone();
        store
            .insert_many(&ctx(), &stored, records("T1", &["R1", "R2"]))
            .await
            .unwrap();

        let after = store
            .calculate_orders(&ctx(), &stored, &view_id, &RecordId::from("R1"), OrderPosition::After, 3)
            .await
            .unwrap();
        assert_eq!(after, [1.25, 1.5, 1.75]);

        let last = store
            .calculate_orders(&ctx(), &stored, &view_id, &RecordId::from("R2"), OrderPosition::After, 2)
            .await
            .unwrap();
        assert_eq!(last, [3.0, 4.0]);

        let err = store
            .calculate_orders(&ctx(), &stored, &view_id, &RecordId::from("R9"), OrderPosition::Before, 1)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(codes::RECORD_NOT_FOUND));
    }

    #[test]
    fn orders_before_first_record_stay_ascending() {
        assert_eq!(orders_next_to(1.0, None, OrderPosition::Before, 2), [-1.0, 0.0]);
        assert_eq!(orders_next_to(4.0, Some(2.0), OrderPosition::Before, 1), [3.0]);
    }
}
