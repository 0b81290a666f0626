//! Memoized table column metadata with virtual-child resolution.

use crate::error::CatalogResult;
use lathe_core::tables::TableAliases;
use lathe_db::traits::{SchemaColumn, SchemaSource};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Process-wide cache of per-logical-table column lists.
///
/// A table's column list is immutable cache content; it changes only through
/// an explicit [`invalidate`](Self::invalidate) or [`clear`](Self::clear).
/// Virtual child tables resolve to their base table's columns minus the
/// excluded columns accumulated along the child chain, with `id` always
/// retained.
pub struct SchemaCache {
    source: Arc<dyn SchemaSource>,
    aliases: Arc<TableAliases>,
    schema: String,
    columns: RwLock<HashMap<String, Arc<Vec<SchemaColumn>>>>,
}

impl SchemaCache {
    pub fn new(source: Arc<dyn SchemaSource>, aliases: Arc<TableAliases>, schema: impl Into<String>) -> Self {
        Self {
            source,
            aliases,
            schema: schema.into(),
            columns: RwLock::new(HashMap::new()),
        }
    }

    /// Column list for a logical table name.
    ///
    /// Hit path takes only the shared lock. On a miss the schema source is
    /// queried outside any lock; a racing filler may insert first, in which
    /// case the first writer's value wins and the redundant query result is
    /// discarded.
    pub async fn columns(&self, table: &str) -> CatalogResult<Arc<Vec<SchemaColumn>>> {
        {
            let cached = self.columns.read().expect("schema cache lock poisoned");
            if let Some(cols) = cached.get(table) {
                return Ok(Arc::clone(cols));
            }
        }

        let resolved = self.aliases.resolve(table);
        let raw = self
            .source
            .list_columns(&self.schema, &resolved.base)
            .await?;
        let filtered: Vec<SchemaColumn> = raw
            .into_iter()
            .filter(|c| c.name == "id" || !resolved.excluded.contains(&c.name))
            .collect();

        let mut cached = self.columns.write().expect("schema cache lock poisoned");
        let entry = cached
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(filtered));
        Ok(Arc::clone(entry))
    }

    /// Drop one table's cached column list.
    pub fn invalidate(&self, table: &str) {
        self.columns
            .write()
            .expect("schema cache lock poisoned")
            .remove(table);
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.columns
            .write()
            .expect("schema cache lock poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lathe_core::tables::{ChildTableSpec, TableEntry};
    use lathe_db::error::DbResult;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedSource {
        columns: Vec<SchemaColumn>,
        calls: AtomicU32,
    }

    impl FixedSource {
        fn new(names: &[&str]) -> Self {
            Self {
                columns: names
                    .iter()
                    .map(|n| SchemaColumn {
                        name: n.to_string(),
                        data_type: "text".to_string(),
                        udt_name: "text".to_string(),
                        numeric_precision: None,
                        numeric_scale: None,
                    })
                    .collect(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SchemaSource for FixedSource {
        async fn list_columns(&self, _schema: &str, _table: &str) -> DbResult<Vec<SchemaColumn>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.columns.clone())
        }
    }

    fn aliases() -> Arc<TableAliases> {
        Arc::new(
            TableAliases::new(
                vec![TableEntry {
                    id: 1,
                    name: "milling_tool_catalog".into(),
                    images_table: "milling_tool_images".into(),
                    fk_column: "tool_id".into(),
                }],
                vec![(
                    "mills_catalog".into(),
                    ChildTableSpec {
                        parent: "milling_tool_catalog".into(),
                        exclude: vec!["id".into(), "shank_type".into()],
                    },
                )],
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let source = Arc::new(FixedSource::new(&["id", "name", "shank_type"]));
        let cache = SchemaCache::new(source.clone(), aliases(), "public");

        let first = cache.columns("milling_tool_catalog").await.unwrap();
        let second = cache.columns("milling_tool_catalog").await.unwrap();
        assert_eq!(first.len(), 3);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn child_filters_excluded_columns_but_keeps_id() {
        let source = Arc::new(FixedSource::new(&["id", "name", "shank_type"]));
        let cache = SchemaCache::new(source, aliases(), "public");

        let cols = cache.columns("mills_catalog").await.unwrap();
        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        // "id" survives even though the child exclusion list names it.
        assert_eq!(names, vec!["id", "name"]);
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let source = Arc::new(FixedSource::new(&["id", "name"]));
        let cache = SchemaCache::new(source.clone(), aliases(), "public");

        cache.columns("milling_tool_catalog").await.unwrap();
        cache.invalidate("milling_tool_catalog");
        cache.columns("milling_tool_catalog").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
