use async_trait::async_trait;

use crate::{context::ExecutionContext, error::DomainError};

/// An immutable intent object carrying only the validated parameters of one
/// mutation.
pub trait Command: Send + 'static {
    /// Name used for routing and tracing.
    const NAME: &'static str;

    /// Value returned on success.
    type Output: Send + 'static;
}

/// The single handler of a command type.
///
/// A handler:
/// 1. Loads whatever the command refers to (foreign tables, records)
/// 2. Validates the command against that state
/// 3. Persists the change inside one unit of work
/// 4. Publishes the accumulated events once the unit of work committed
///
/// Expected failures are returned as [`DomainError`]; the first failing step
/// short-circuits the rest.
///
/// # Example
///
/// ```rust,ignore
/// #[async_trait]
/// impl CommandHandler for RenameTableHandler {
///     type Command = RenameTable;
///
///     async fn handle(&self, ctx: &ExecutionContext, command: RenameTable) -> Result<Table, DomainError> {
///         let table = self.tables.load(ctx, &command.base_id, &command.table_id).await?;
///         let spec = TableMutateSpec::RenameTable { name: command.name };
///         self.flow.run(ctx, table, spec, None).await
///     }
/// }
/// ```
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    type Command: Command;

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        command: Self::Command,
    ) -> Result<<Self::Command as Command>::Output, DomainError>;
}
