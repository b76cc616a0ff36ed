//! Follow-up mutations on other tables caused by a field.
//!
//! A [`SideEffectPolicy`] maps field types to [`SideEffectRule`]s. The
//! default policy makes every two-way link create its reciprocal field on
//! the foreign table.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures_util::lock::Mutex;
use tablekit_sdk::{
    context::ExecutionContext,
    domain::{
        field::{Field, FieldKind, FieldType, LinkOptions},
        mutate::TableMutateSpec,
        table::Table,
    },
    emit::Emit,
    error::{DomainError, codes},
    ids::TableId,
};
use tracing::debug;

use crate::{
    deps::Ports,
    foreign_tables::TableStateMap,
    table_update::{AfterPersistHook, TableUpdateFlow},
};

/// A mutate spec to apply to a table other than the one being changed.
#[derive(Clone, Debug, PartialEq)]
pub struct SideEffect {
    pub foreign_table_id: TableId,
    pub spec: TableMutateSpec,
}

/// Derives side effects of one field of `host`.
///
/// `state` holds the latest version of every table involved; a rule must
/// fail with not-found when a table it needs is missing.
pub trait SideEffectRule: Send + Sync {
    fn side_effects(
        &self,
        host: &Table,
        field: &Field,
        state: &TableStateMap,
    ) -> Result<Vec<SideEffect>, DomainError>;
}

/// Creates the reciprocal field of a two-way link.
///
/// The reciprocal is named after the host table, points back at it with the
/// reversed relationship and shares the pair's symmetric ids. Nothing is
/// produced for one-way links or when the foreign table already has the
/// symmetric field.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymmetricLinkRule;

impl SideEffectRule for SymmetricLinkRule {
    fn side_effects(
        &self,
        host: &Table,
        field: &Field,
        state: &TableStateMap,
    ) -> Result<Vec<SideEffect>, DomainError> {
        let Some(options) = field.link_options() else {
            return Ok(Vec::new());
        };
        if options.is_one_way {
            return Ok(Vec::new());
        }
        let symmetric_field_id = options.symmetric_field_id.clone().ok_or_else(|| {
            DomainError::validation(format!("Two-way link {} has no symmetric field", field.id))
                .with_code(codes::FIELD_INVALID)
        })?;

        let foreign = state.require(&options.foreign_table_id)?;
        if let Some(existing) = foreign.field(&symmetric_field_id) {
            let links_back = existing.link_options().is_some_and(|back| {
                &back.foreign_table_id == host.id()
                    && back.symmetric_field_id.as_ref() == Some(&field.id)
            });
            if !links_back {
                return Err(DomainError::validation(format!(
                    "Field {symmetric_field_id} on table {} is not the reciprocal link of {}",
                    foreign.id(),
                    field.id
                ))
                .with_code(codes::FIELD_INVALID));
            }
            return Ok(Vec::new());
        }

        let reciprocal = Field::new(
            symmetric_field_id,
            foreign.unique_field_name(host.name()),
            FieldKind::Link(LinkOptions {
                foreign_table_id: host.id().clone(),
                foreign_base_id: options
                    .foreign_base_id
                    .as_ref()
                    .map(|_| host.base_id().clone()),
                relationship: options.relationship.reversed(),
                is_one_way: false,
                symmetric_field_id: Some(field.id.clone()),
            }),
        );

        Ok(vec![SideEffect {
            foreign_table_id: foreign.id().clone(),
            spec: TableMutateSpec::AddField { field: reciprocal },
        }])
    }
}

/// Which rule, if any, applies to each field type.
#[derive(Clone)]
pub struct SideEffectPolicy {
    rules: HashMap<FieldType, Arc<dyn SideEffectRule>>,
}

impl SideEffectPolicy {
    /// A policy without any rule.
    pub fn empty() -> Self {
        SideEffectPolicy {
            rules: HashMap::new(),
        }
    }

    pub fn with_rule(mut self, field_type: FieldType, rule: impl SideEffectRule + 'static) -> Self {
        self.rules.insert(field_type, Arc::new(rule));
        self
    }

    pub fn without_rule(mut self, field_type: FieldType) -> Self {
        self.rules.remove(&field_type);
        self
    }

    pub fn rule(&self, field_type: FieldType) -> Option<&Arc<dyn SideEffectRule>> {
        self.rules.get(&field_type)
    }
}

impl Default for SideEffectPolicy {
    fn default() -> Self {
        SideEffectPolicy::empty().with_rule(FieldType::Link, SymmetricLinkRule)
    }
}

/// Asks the policy for the side effects of each field it visits.
pub struct SideEffectVisitor<'a> {
    policy: &'a SideEffectPolicy,
}

impl<'a> SideEffectVisitor<'a> {
    pub fn new(policy: &'a SideEffectPolicy) -> Self {
        SideEffectVisitor { policy }
    }

    pub fn visit(
        &self,
        host: &Table,
        field: &Field,
        state: &TableStateMap,
    ) -> Result<Vec<SideEffect>, DomainError> {
        match self.policy.rule(field.field_type()) {
            Some(rule) => rule.side_effects(host, field, state),
            None => Ok(Vec::new()),
        }
    }
}

/// Applies side effects through the regular table update pipeline.
pub struct SideEffectService<'a> {
    ports: &'a Ports,
    policy: &'a SideEffectPolicy,
}

impl<'a> SideEffectService<'a> {
    pub fn new(ports: &'a Ports, policy: &'a SideEffectPolicy) -> Self {
        SideEffectService { ports, policy }
    }

    /// Visits `fields` of the host table one after another, applying each
    /// resulting side effect to the latest version of its target and storing
    /// the result back into `state`.
    pub async fn apply(
        &self,
        ctx: &ExecutionContext,
        host_id: &TableId,
        fields: &[Field],
        state: &mut TableStateMap,
    ) -> Result<Emit, DomainError> {
        let visitor = SideEffectVisitor::new(self.policy);
        let flow = TableUpdateFlow::new(self.ports);
        let mut events = Emit::new();

        for field in fields {
            let host = state.require(host_id)?.clone();
            for effect in visitor.visit(&host, field, state)? {
                let target = state.require(&effect.foreign_table_id)?.clone();
                let outcome = flow.run(ctx, &target, &effect.spec, None).await?;
                debug!(
                    table_id = %effect.foreign_table_id,
                    op = effect.spec.op_name(),
                    field_id = %field.id,
                    "applied side effect"
                );
                events.extend(outcome.events);
                state.insert(outcome.table);
            }
        }

        Ok(events)
    }
}

/// Applies the side effects of `fields` once the host mutation is persisted.
pub struct SideEffectHook<'a> {
    service: SideEffectService<'a>,
    fields: Vec<Field>,
    state: Mutex<TableStateMap>,
}

impl<'a> SideEffectHook<'a> {
    pub fn new(service: SideEffectService<'a>, fields: Vec<Field>, state: TableStateMap) -> Self {
        SideEffectHook {
            service,
            fields,
            state: Mutex::new(state),
        }
    }

    /// State of every table after the hook ran, host included.
    pub fn into_state(self) -> TableStateMap {
        self.state.into_inner()
    }
}

#[async_trait]
impl AfterPersistHook for SideEffectHook<'_> {
    async fn after_persist(&self, ctx: &ExecutionContext, table: &Table) -> Result<Emit, DomainError> {
        let mut state = self.state.lock().await;
        state.insert(table.clone());
        self.service
            .apply(ctx, table.id(), &self.fields, &mut state)
            .await
    }
}
