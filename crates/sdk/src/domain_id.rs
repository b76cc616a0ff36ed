use std::collections::HashMap;

/// Domain ID values from an event instance.
///
/// Maps domain ID field names (`table_id`, `record_id`, ...) to their values
/// in this specific event. Consumers use them to route events per aggregate.
pub type DomainIdValues = HashMap<&'static str, DomainIdValue>;

/// A domain ID value, which may be optional.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainIdValue {
    /// A present value
    Value(String),
    /// An absent optional value
    None,
}

impl DomainIdValue {
    pub fn as_option(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v.as_str()),
            Self::None => None,
        }
    }
}

impl From<String> for DomainIdValue {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for DomainIdValue {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl<T: Into<String>> From<Option<T>> for DomainIdValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v.into()),
            None => Self::None,
        }
    }
}
