use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain_id::DomainIdValue;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a fresh, prefixed id.
            pub fn generate() -> Self {
                Self(format!("{}{}", Self::PREFIX, Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl From<$name> for DomainIdValue {
            fn from(value: $name) -> Self {
                DomainIdValue::Value(value.0)
            }
        }
    };
}

define_id!(
    /// Owning base (workspace) of a table.
    BaseId,
    "bse"
);
define_id!(TableId, "tbl");
define_id!(FieldId, "fld");
define_id!(RecordId, "rec");
define_id!(ViewId, "viw");
define_id!(
    /// Identity of whoever issued a command.
    ActorId,
    "usr"
);
