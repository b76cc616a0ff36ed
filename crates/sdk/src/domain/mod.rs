pub mod field;
pub mod mutate;
pub mod record;
pub mod table;
pub mod view;

pub use field::*;
pub use mutate::*;
pub use record::*;
pub use table::*;
pub use view::*;
