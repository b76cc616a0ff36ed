use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use async_trait::async_trait;
use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    error::{DomainError, codes},
};
use tracing::{Instrument, debug, info_span, warn};

/// Routes each command type to its single registered handler.
#[derive(Default)]
pub struct CommandBus {
    handlers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl CommandBus {
    pub fn new() -> Self {
        CommandBus::default()
    }

    /// Registers `handler` for its command type, replacing any previous one.
    pub fn register_handler<H>(mut self, handler: H) -> Self
    where
        H: CommandHandler,
    {
        let handler: Arc<dyn CommandHandler<Command = H::Command>> = Arc::new(Traced::new(handler));
        self.handlers
            .insert(TypeId::of::<H::Command>(), Box::new(handler));
        self
    }

    pub fn has_handler<C: Command>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<C>())
    }

    pub async fn execute<C>(&self, ctx: &ExecutionContext, command: C) -> Result<C::Output, DomainError>
    where
        C: Command,
    {
        let handler = self
            .handlers
            .get(&TypeId::of::<C>())
            .and_then(|handler| handler.downcast_ref::<Arc<dyn CommandHandler<Command = C>>>())
            .ok_or_else(|| {
                DomainError::unexpected(format!("no handler registered for {}", C::NAME))
                    .with_code(codes::HANDLER_NOT_REGISTERED)
            })?;

        handler.handle(ctx, command).await
    }
}

/// Wraps a handler in a `command` span and logs its outcome.
pub struct Traced<H> {
    inner: H,
}

impl<H> Traced<H> {
    pub fn new(inner: H) -> Self {
        Traced { inner }
    }
}

#[async_trait]
impl<H> CommandHandler for Traced<H>
where
    H: CommandHandler,
{
    type Command = H::Command;

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        command: Self::Command,
    ) -> Result<<Self::Command as Command>::Output, DomainError> {
        let span = info_span!(
            "command",
            command = <H::Command as Command>::NAME,
            actor = %ctx.actor_id,
            correlation_id = %ctx.correlation_id,
            nested = ctx.transaction().is_some(),
        );

        let result = self.inner.handle(ctx, command).instrument(span.clone()).await;
        span.in_scope(|| match &result {
            Ok(_) => debug!("command succeeded"),
            Err(err) => warn!(kind = %err.kind, code = ?err.code, "command failed: {}", err.message),
        });
        result
    }
}
