use std::sync::{Mutex, PoisonError};

use tablekit_sdk::{error::DomainError, ids::TableId};
use uuid::Uuid;

/// Operation names recorded in the call log.
pub mod ops {
    pub const TABLES_INSERT: &str = "tables.insert";
    pub const TABLES_UPDATE: &str = "tables.update";
    pub const TABLES_FIND_ONE: &str = "tables.find_one";
    pub const TABLES_FIND_MANY: &str = "tables.find_many";
    pub const SCHEMAS_INSERT: &str = "schemas.insert";
    pub const SCHEMAS_UPDATE: &str = "schemas.update";
    pub const RECORDS_INSERT_MANY: &str = "records.insert_many";
    /// One batch pulled from an insert stream.
    pub const RECORDS_BATCH: &str = "records.batch";
    /// One batch pulled from an update stream.
    pub const RECORDS_UPDATE_BATCH: &str = "records.update_batch";
    pub const RECORDS_FIND: &str = "records.find";
    pub const ORDERS_CALCULATE: &str = "orders.calculate";
    pub const UOW_BEGIN: &str = "uow.begin";
    pub const UOW_COMMIT: &str = "uow.commit";
    pub const UOW_ROLLBACK: &str = "uow.rollback";
}

/// One port call as seen by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub operation: &'static str,
    pub table_id: Option<TableId>,
    pub transaction_id: Option<Uuid>,
}

#[derive(Debug)]
struct Failure {
    operation: &'static str,
    /// Matching calls to let through before failing once; `None` fails every call.
    skip: Option<usize>,
}

#[derive(Debug, Default)]
pub(crate) struct CallLog {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<Failure>>,
}

impl CallLog {
    /// Records a call, then fails it if a failure was injected for it.
    pub fn record(
        &self,
        operation: &'static str,
        table_id: Option<&TableId>,
        transaction_id: Option<Uuid>,
    ) -> Result<(), DomainError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                operation,
                table_id: table_id.cloned(),
                transaction_id,
            });

        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(index) = failures
            .iter()
            .position(|failure| failure.operation == operation)
        else {
            return Ok(());
        };
        match failures[index].skip {
            None => {}
            Some(0) => {
                failures.remove(index);
            }
            Some(skip) => {
                failures[index].skip = Some(skip - 1);
                return Ok(());
            }
        }

        Err(DomainError::unexpected(format!(
            "injected failure in {operation}"
        )))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn fail(&self, operation: &'static str, skip: Option<usize>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Failure { operation, skip });
    }
}
