use std::collections::HashSet;

use indexmap::IndexMap;
use tablekit_sdk::{
    context::ExecutionContext,
    domain::{
        field::{Field, ForeignTableRef},
        table::Table,
    },
    error::DomainError,
    ids::TableId,
    ports::TableRepository,
};
use tracing::debug;

/// Loads the tables a batch references but does not itself contain.
pub struct ForeignTableLoader<'a> {
    tables: &'a dyn TableRepository,
}

impl<'a> ForeignTableLoader<'a> {
    pub fn new(tables: &'a dyn TableRepository) -> Self {
        ForeignTableLoader { tables }
    }

    /// Distinct references of `fields`, in first-seen order, skipping tables
    /// of the batch.
    pub fn collect_refs<'f>(
        fields: impl IntoIterator<Item = &'f Field>,
        batch: &HashSet<TableId>,
    ) -> Vec<ForeignTableRef> {
        let mut refs = IndexMap::new();
        for foreign in fields.into_iter().filter_map(Field::foreign_table_ref) {
            if batch.contains(&foreign.table_id) {
                continue;
            }
            refs.entry(foreign.key()).or_insert(foreign);
        }
        refs.into_values().collect()
    }

    /// Fetches every foreign table in a single repository call.
    ///
    /// Tables that do not exist are simply absent from the result; field
    /// validation reports them.
    pub async fn load<'f>(
        &self,
        ctx: &ExecutionContext,
        fields: impl IntoIterator<Item = &'f Field>,
        batch: &HashSet<TableId>,
    ) -> Result<Vec<Table>, DomainError> {
        let refs = Self::collect_refs(fields, batch);
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let tables = self.tables.find_many(ctx, &refs).await?;
        debug!(
            requested = refs.len(),
            found = tables.len(),
            "loaded foreign tables"
        );
        Ok(tables)
    }
}

/// Latest known state of every table a command touches, keyed by id.
///
/// Holds externally loaded tables together with the tables of the batch and
/// is updated as side effects are applied.
#[derive(Clone, Debug, Default)]
pub struct TableStateMap {
    tables: IndexMap<TableId, Table>,
}

impl TableStateMap {
    pub fn new(tables: impl IntoIterator<Item = Table>) -> Self {
        let mut map = TableStateMap::default();
        for table in tables {
            map.insert(table);
        }
        map
    }

    pub fn get(&self, table_id: &TableId) -> Option<&Table> {
        self.tables.get(table_id)
    }

    /// Like [`TableStateMap::get`], failing with not-found.
    pub fn require(&self, table_id: &TableId) -> Result<&Table, DomainError> {
        self.get(table_id)
            .ok_or_else(|| DomainError::table_not_found(table_id))
    }

    /// Stores `table`, replacing the previous state of the same id.
    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.id().clone(), table);
    }

    pub fn contains(&self, table_id: &TableId) -> bool {
        self.tables.contains_key(table_id)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Validates the fields of each table in `table_ids` against the whole
    /// map.
    pub fn validate<'i>(&self, table_ids: impl IntoIterator<Item = &'i TableId>) -> Result<(), DomainError> {
        for table_id in table_ids {
            self.require(table_id)?
                .validate_fields(|id| self.tables.get(id))?;
        }
        Ok(())
    }

    pub fn into_tables(self) -> Vec<Table> {
        self.tables.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use tablekit_sdk::{
        domain::field::{FieldKind, LinkOptions, Relationship},
        error::{ErrorKind, codes},
        ids::{BaseId, FieldId},
    };

    use super::*;

    fn link(id: &str, foreign: &str, base: Option<&str>) -> Field {
        Field::new(
            id,
            id,
            FieldKind::Link(LinkOptions {
                foreign_table_id: TableId::from(foreign),
                foreign_base_id: base.map(BaseId::from),
                relationship: Relationship::ManyOne,
                is_one_way: true,
                symmetric_field_id: None,
            }),
        )
    }

    #[test]
    fn refs_are_deduplicated_and_exclude_batch() {
        let fields = [
            link("F1", "T9", None),
            link("F2", "T9", None),
            link("F3", "T9", Some("bse2")),
            link("F4", "T1", None),
            Field::new("F5", "Text", FieldKind::SingleLineText),
        ];
        let batch = HashSet::from([TableId::from("T1")]);

        let refs = ForeignTableLoader::collect_refs(&fields, &batch);

        assert_eq!(
            refs,
            vec![
                ForeignTableRef {
                    base_id: None,
                    table_id: TableId::from("T9"),
                },
                ForeignTableRef {
                    base_id: Some(BaseId::from("bse2")),
                    table_id: TableId::from("T9"),
                },
            ]
        );
    }

    #[test]
    fn validation_reports_missing_foreign_table() {
        let table = Table::create(
            TableId::from("T1"),
            BaseId::from("bse1"),
            "Orders",
            vec![
                Field::new("F0", "Name", FieldKind::SingleLineText),
                link("F1", "T404", None),
            ],
            Vec::new(),
        )
        .unwrap();
        let state = TableStateMap::new([table]);

        let err = state.validate([&TableId::from("T1")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.code(), Some(codes::TABLE_NOT_FOUND));
    }

    #[test]
    fn insert_replaces_previous_state() {
        let table = Table::create(
            TableId::from("T1"),
            BaseId::from("bse1"),
            "Orders",
            vec![Field::new("F0", "Name", FieldKind::SingleLineText)],
            Vec::new(),
        )
        .unwrap();
        let renamed = table
            .update(|draft| draft.rename_field(&FieldId::from("F0"), "Title"))
            .unwrap();

        let mut state = TableStateMap::new([table]);
        state.insert(renamed);

        assert_eq!(state.len(), 1);
        assert_eq!(
            state.require(&TableId::from("T1")).unwrap().fields()[0].name,
            "Title"
        );
    }
}
