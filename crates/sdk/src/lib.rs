//! # tablekit SDK
//!
//! Domain model and contracts for the table/field/record command engine.
//!
//! ## Overview
//!
//! This crate provides the types shared by the engine and its adapters:
//!
//! 1. The [`Table`](domain::Table) aggregate with its fields and views, and
//!    the [`TableRecord`](domain::TableRecord) value
//! 2. Mutate specs describing one atomic change, applied in memory and
//!    replayed by persistence
//! 3. Domain events, queued on aggregates via [`Emit`](emit::Emit)
//! 4. The command/handler contract and the ports (repositories, event bus,
//!    unit of work) handlers talk to
//!
//! ## Example
//!
//! ```rust,ignore
//! use tablekit_sdk::prelude::*;
//!
//! let table = Table::create(
//!     TableId::from("T1"),
//!     BaseId::from("B1"),
//!     "People",
//!     vec![Field::new("F1", "Name", FieldKind::SingleLineText)],
//!     Vec::new(),
//! )?;
//!
//! let spec = TableMutateSpec::AddField {
//!     field: Field::new("F2", "Email", FieldKind::SingleLineText),
//! };
//! let updated = table.update(|draft| spec.apply(draft))?;
//!
//! assert_eq!(table.fields().len(), 1);
//! assert_eq!(updated.fields().len(), 2);
//! ```

extern crate self as tablekit_sdk;

pub use tablekit_macros::{Event, EventSet};

pub mod command;
pub mod context;
pub mod domain;
pub mod domain_id;
pub mod emit;
pub mod error;
pub mod event;
pub mod events;
pub mod ids;
pub mod ports;
#[macro_use]
mod macros;

pub mod prelude {
    pub use crate::command::*;
    pub use crate::context::*;
    pub use crate::domain::*;
    pub use crate::domain_id::*;
    pub use crate::emit;
    pub use crate::emit::*;
    pub use crate::error::*;
    pub use crate::event::*;
    pub use crate::events::*;
    pub use crate::ids::*;
    pub use crate::ports::*;
    pub use tablekit_macros::{Event, EventSet};
}

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
