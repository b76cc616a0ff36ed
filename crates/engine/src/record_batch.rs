use futures_util::{StreamExt, stream};
use tablekit_sdk::{
    domain::{
        record::{RecordInput, TableRecord},
        table::Table,
    },
    error::DomainError,
    ports::{RecordBatchStream, RecordUpdate, RecordUpdateStream},
};

/// Lazily validates and converts `inputs` in chunks of `batch_size`.
///
/// A chunk is only validated when the consumer polls for it; the first
/// invalid record turns its chunk into an error.
pub fn record_batches(table: &Table, inputs: Vec<RecordInput>, batch_size: usize) -> RecordBatchStream<'_> {
    let batch_size = batch_size.max(1);
    stream::unfold(inputs.into_iter(), move |mut inputs| async move {
        let chunk: Vec<RecordInput> = inputs.by_ref().take(batch_size).collect();
        if chunk.is_empty() {
            return None;
        }
        Some((validate_records(table, chunk), inputs))
    })
    .boxed()
}

/// Chunks `updates` into batches of `batch_size`.
pub fn update_batches(updates: Vec<RecordUpdate>, batch_size: usize) -> RecordUpdateStream<'static> {
    let batch_size = batch_size.max(1);
    stream::unfold(updates.into_iter(), move |mut updates| async move {
        let chunk: Vec<RecordUpdate> = updates.by_ref().take(batch_size).collect();
        if chunk.is_empty() {
            return None;
        }
        Some((Ok(chunk), updates))
    })
    .boxed()
}

/// Validates `inputs` against `table` and converts them to records.
pub fn validate_records(table: &Table, inputs: Vec<RecordInput>) -> Result<Vec<TableRecord>, DomainError> {
    inputs
        .into_iter()
        .map(|input| {
            table.validate_record(&input.fields)?;
            Ok(TableRecord::from_input(table.id(), input))
        })
        .collect()
}
