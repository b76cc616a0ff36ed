//! One command type and one handler per file.

mod create_field;
mod create_records;
mod create_table;
mod create_tables;
mod duplicate_field;
mod import_structure;
mod rename_field;
mod rename_table;
mod reorder_records;

pub use create_field::{CreateField, CreateFieldHandler, CreateFieldResult};
pub use create_records::{CreateRecords, CreateRecordsHandler, CreateRecordsResult};
pub use create_table::{CreateTable, CreateTableHandler, CreateTableResult};
pub use create_tables::{CreateTables, CreateTablesHandler, CreateTablesResult, TableInput};
pub use duplicate_field::{DuplicateField, DuplicateFieldHandler, DuplicateFieldResult};
pub use import_structure::{ImportStructure, ImportStructureHandler};
pub use rename_field::{RenameField, RenameFieldHandler, RenameResult};
pub use rename_table::{RenameTable, RenameTableHandler};
pub use reorder_records::{ReorderRecords, ReorderRecordsHandler, ReorderRecordsResult};
