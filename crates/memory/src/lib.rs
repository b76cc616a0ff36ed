//! # tablekit memory adapter
//!
//! In-memory implementations of the engine's ports, used by tests and
//! local tooling.
//!
//! [`MemoryStore`] implements every repository, the record order calculator
//! and the unit of work. It records each port call so tests can assert on
//! what a handler did, and can be told to fail chosen calls:
//!
//! ```rust,ignore
//! use tablekit_memory::{MemoryStore, ops};
//!
//! let store = MemoryStore::new();
//! store.fail_on_call(ops::RECORDS_BATCH, 2);
//! ```
//!
//! [`InMemoryEventBus`] keeps published events in order.

mod call_log;
mod event_bus;
mod store;

pub use call_log::{Call, ops};
pub use event_bus::InMemoryEventBus;
pub use store::MemoryStore;
