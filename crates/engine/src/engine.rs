use std::sync::Arc;

use tablekit_sdk::{
    command::{Command, CommandHandler},
    context::ExecutionContext,
    error::DomainError,
};

use crate::{
    bus::CommandBus,
    commands::{
        CreateFieldHandler, CreateRecordsHandler, CreateTableHandler, CreateTablesHandler,
        DuplicateFieldHandler, ImportStructureHandler, RenameFieldHandler, RenameTableHandler,
        ReorderRecordsHandler,
    },
    config::EngineConfig,
    deps::Ports,
    importer::{DotTeaImporter, StructureImporter},
    side_effect::SideEffectPolicy,
};

/// Everything a handler needs, shared by all handlers of an engine.
pub struct Services {
    pub ports: Ports,
    pub config: EngineConfig,
    pub policy: SideEffectPolicy,
    pub importer: Arc<dyn StructureImporter>,
}

/// The command engine: a [`CommandBus`] with every built-in handler
/// registered.
pub struct Engine {
    bus: CommandBus,
    services: Arc<Services>,
}

impl Engine {
    pub fn builder(ports: Ports) -> EngineBuilder {
        EngineBuilder::new(ports)
    }

    pub async fn execute<C>(&self, ctx: &ExecutionContext, command: C) -> Result<C::Output, DomainError>
    where
        C: Command,
    {
        self.bus.execute(ctx, command).await
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn config(&self) -> &EngineConfig {
        &self.services.config
    }
}

pub struct EngineBuilder {
    ports: Ports,
    config: EngineConfig,
    policy: SideEffectPolicy,
    importer: Arc<dyn StructureImporter>,
    extra: Vec<Box<dyn FnOnce(CommandBus, &Arc<Services>) -> CommandBus + Send>>,
}

impl EngineBuilder {
    pub fn new(ports: Ports) -> Self {
        EngineBuilder {
            ports,
            config: EngineConfig::default(),
            policy: SideEffectPolicy::default(),
            importer: Arc::new(DotTeaImporter),
            extra: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn record_batch_size(mut self, record_batch_size: usize) -> Self {
        self.config.record_batch_size = record_batch_size;
        self
    }

    pub fn order_batch_size(mut self, order_batch_size: usize) -> Self {
        self.config.order_batch_size = order_batch_size;
        self
    }

    pub fn side_effect_policy(mut self, policy: SideEffectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn structure_importer(mut self, importer: impl StructureImporter + 'static) -> Self {
        self.importer = Arc::new(importer);
        self
    }

    /// Registers an additional handler, built from the engine's services.
    ///
    /// Registering a handler for a built-in command replaces the built-in one.
    pub fn handler<H, F>(mut self, make: F) -> Self
    where
        H: CommandHandler,
        F: FnOnce(Arc<Services>) -> H + Send + 'static,
    {
        self.extra.push(Box::new(move |bus: CommandBus, services: &Arc<Services>| {
            bus.register_handler(make(services.clone()))
        }));
        self
    }

    pub fn build(self) -> Engine {
        let services = Arc::new(Services {
            ports: self.ports,
            config: self.config.normalized(),
            policy: self.policy,
            importer: self.importer,
        });

        let mut bus = CommandBus::new()
            .register_handler(CreateTableHandler::new(services.clone()))
            .register_handler(CreateTablesHandler::new(services.clone()))
            .register_handler(CreateFieldHandler::new(services.clone()))
            .register_handler(DuplicateFieldHandler::new(services.clone()))
            .register_handler(RenameFieldHandler::new(services.clone()))
            .register_handler(RenameTableHandler::new(services.clone()))
            .register_handler(CreateRecordsHandler::new(services.clone()))
            .register_handler(ReorderRecordsHandler::new(services.clone()))
            .register_handler(ImportStructureHandler::new(services.clone()));
        for register in self.extra {
            bus = register(bus, &services);
        }

        Engine { bus, services }
    }
}
