/// Builds an [`Emit`](crate::emit::Emit) from several events, stopping at
/// the first event that fails to serialize.
///
/// # Example
///
/// ```rust,ignore
/// let emit = emit![
///     FieldCreated { table_id: host.clone(), field_id, name, field_type },
///     FieldCreated { table_id: foreign.clone(), field_id: symmetric_id, name, field_type },
/// ]?;
/// ```
///
/// Expands to:
///
/// ```rust,ignore
/// Ok(Emit::new())
///     .and_then(|emit| emit.try_event(FieldCreated { ... }))
///     .and_then(|emit| emit.try_event(FieldCreated { ... }))
/// ```
#[macro_export]
macro_rules! emit {
    () => {
        ::std::result::Result::<_, $crate::error::SerializationError>::Ok($crate::emit::Emit::new())
    };
    ($($event:expr),+ $(,)?) => {
        ::std::result::Result::<_, $crate::error::SerializationError>::Ok($crate::emit::Emit::new())
            $(.and_then(|emit| emit.try_event($event)))+
    };
}
