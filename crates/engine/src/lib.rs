//! # tablekit engine
//!
//! Command handlers for tables, fields and records, and the machinery they
//! share.
//!
//! Every command runs the same way:
//!
//! 1. The [`Engine`] routes it to its single handler through the
//!    [`CommandBus`](bus::CommandBus), inside a `command` tracing span
//! 2. The handler loads and validates what the command refers to
//! 3. All writes happen inside one [`UnitOfWorkScope`](unit_of_work::UnitOfWorkScope);
//!    side effects on other tables join the same transaction
//! 4. Domain events are published only after the transaction committed
//!
//! ## Example
//!
//! ```rust,ignore
//! use tablekit_engine::{Engine, Ports, commands::*};
//! use tablekit_sdk::prelude::*;
//!
//! let engine = Engine::builder(ports).record_batch_size(1_000).build();
//! let ctx = ExecutionContext::new("usr1");
//!
//! let created = engine
//!     .execute(&ctx, CreateTable {
//!         base_id: BaseId::from("bse1"),
//!         table: TableInput::new("Tasks")
//!             .field(Field::new(FieldId::generate(), "Name", FieldKind::SingleLineText)),
//!     })
//!     .await?;
//! ```

pub mod bus;
pub mod commands;
pub mod config;
pub mod dependency;
pub mod deps;
pub mod engine;
pub mod foreign_tables;
pub mod importer;
pub mod record_batch;
pub mod side_effect;
pub mod table_update;
pub mod unit_of_work;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use deps::Ports;
pub use engine::{Engine, EngineBuilder, Services};
