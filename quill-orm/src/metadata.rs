//! # Metadata Cache Module
//!
//! Reflects a [`Record`] type once into a [`RecordDescriptor`] and caches it
//! for the lifetime of the owning `Database`.
//!
//! ## Flattening
//!
//! Embedded groups (`#[orm(flatten)]`) are walked breadth-first. A field name
//! is recorded only the first time it is seen, so a declaration closer to the
//! root hides one with the same name deeper down. Only exported (`pub`) fields
//! carrying a column tag are reachable by column name.
//!
//! ## Concurrency
//!
//! The cache is a sharded `DashMap` keyed by `TypeId`. The descriptor is built
//! while the shard entry is held, so each type is reflected at most once even
//! when many tasks ask for it at the same time.

use std::any::{TypeId, type_name};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{FieldInfo, FieldKind, Record, ScalarKind};
use crate::Error;

// ============================================================================
// Descriptors
// ============================================================================

/// One scalar field reachable from the record root.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub field_name: &'static str,
    /// Column name, when the field carries a column tag.
    pub column: Option<&'static str>,
    pub sql_type: &'static str,
    pub kind: ScalarKind,
    pub nullable: bool,
    pub exported: bool,
    pub primary_key: bool,
    pub sequence: Option<&'static str>,
    pub trigger: bool,
    /// Field names from the root struct down to this field.
    pub path: Vec<&'static str>,
    /// 0 for fields declared on the root struct.
    pub depth: usize,
}

impl FieldDescriptor {
    fn from_info(info: &FieldInfo, kind: ScalarKind, prefix: &[&'static str], depth: usize) -> Self {
        let mut path = prefix.to_vec();
        path.push(info.name);
        Self {
            field_name: info.name,
            column: info.column,
            sql_type: info.sql_type,
            kind,
            nullable: info.nullable,
            exported: info.exported,
            primary_key: info.primary_key,
            sequence: info.sequence,
            trigger: info.trigger,
            path,
            depth,
        }
    }

    /// Column name, or the field name for untagged fields.
    pub fn column_name(&self) -> &'static str {
        self.column.unwrap_or(self.field_name)
    }
}

/// The reflected shape of one record type.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    pub type_name: &'static str,
    /// Mapped columns in declaration (breadth-first) order.
    columns: Vec<FieldDescriptor>,
    /// Lowercased column name to index in `columns`.
    column_index: HashMap<String, usize>,
    exported: HashMap<&'static str, FieldDescriptor>,
    private: HashMap<&'static str, FieldDescriptor>,
    primary_key: Option<usize>,
}

impl RecordDescriptor {
    /// Reflects `T`.
    pub fn of<T: Record>() -> Result<Self, Error> {
        Self::build(type_name::<T>(), T::fields())
    }

    fn build(type_name: &'static str, root: Vec<FieldInfo>) -> Result<Self, Error> {
        if root.is_empty() {
            return Err(Error::Mapping(format!("{} declares no fields", type_name)));
        }

        let mut descriptor = Self {
            type_name,
            columns: Vec::new(),
            column_index: HashMap::new(),
            exported: HashMap::new(),
            private: HashMap::new(),
            primary_key: None,
        };
        let mut seen: HashSet<&'static str> = HashSet::new();
        let mut queue: VecDeque<(Vec<FieldInfo>, Vec<&'static str>, usize)> = VecDeque::new();
        queue.push_back((root, Vec::new(), 0));

        while let Some((fields, prefix, depth)) = queue.pop_front() {
            for info in &fields {
                if !seen.insert(info.name) {
                    continue;
                }
                match info.kind {
                    FieldKind::Embedded(inner) => {
                        let mut path = prefix.clone();
                        path.push(info.name);
                        queue.push_back((inner(), path, depth + 1));
                    }
                    FieldKind::Scalar(kind) => {
                        let field = FieldDescriptor::from_info(info, kind, &prefix, depth);
                        descriptor.insert(field);
                    }
                }
            }
        }

        Ok(descriptor)
    }

    fn insert(&mut self, field: FieldDescriptor) {
        if !field.exported {
            self.private.insert(field.field_name, field);
            return;
        }

        if let Some(column) = field.column {
            let key = column.to_lowercase();
            if !self.column_index.contains_key(&key) {
                self.column_index.insert(key, self.columns.len());
                if field.primary_key && self.primary_key.is_none() {
                    self.primary_key = Some(self.columns.len());
                }
                self.columns.push(field.clone());
            }
        }
        self.exported.insert(field.field_name, field);
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Mapped columns in order.
    pub fn columns(&self) -> &[FieldDescriptor] {
        &self.columns
    }

    /// Finds the field mapped to a result or table column, case-insensitively.
    pub fn by_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.column_index.get(&column.to_lowercase()).map(|&idx| &self.columns[idx])
    }

    /// Exported field by name, tagged or not.
    pub fn exported_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.exported.get(name)
    }

    pub fn private_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.private.get(name)
    }

    pub fn primary_key(&self) -> Option<&FieldDescriptor> {
        self.primary_key.map(|idx| &self.columns[idx])
    }
}

// ============================================================================
// Metadata Cache
// ============================================================================

/// Concurrent per-type descriptor cache.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: DashMap<TypeId, Arc<RecordDescriptor>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor for `T`, reflecting it on first use.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let descriptor = cache.describe::<User>()?;
    /// let id = descriptor.by_column("ID").unwrap();
    /// assert_eq!(id.field_name, "id");
    /// ```
    pub fn describe<T: Record>(&self) -> Result<Arc<RecordDescriptor>, Error> {
        let key = TypeId::of::<T>();
        if let Some(found) = self.entries.get(&key) {
            return Ok(Arc::clone(found.value()));
        }

        let entry = self.entries.entry(key).or_try_insert_with(|| {
            log::debug!("Reflecting record type {}", type_name::<T>());
            RecordDescriptor::of::<T>().map(Arc::new)
        })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Number of cached record types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entity, Record};
    use std::sync::Barrier;
    use std::thread;

    #[derive(Record, Default, Debug)]
    pub struct Audit {
        #[orm(column)]
        pub created_by: String,
        #[orm(column = "note")]
        pub name: String,
    }

    #[derive(Entity, Default, Debug)]
    #[orm(table = "t_doc")]
    pub struct Doc {
        #[orm(column, primary_key)]
        pub id: i64,
        #[orm(column = "title")]
        pub name: String,
        pub scratch: String,
        #[orm(column)]
        secret: String,
        #[orm(flatten)]
        pub audit: Audit,
    }

    #[derive(Record, Default)]
    pub struct Empty {}

    #[test]
    fn test_flattening_nearest_name_wins() {
        let descriptor = RecordDescriptor::of::<Doc>().unwrap();

        // `name` on the root hides `Audit::name`, so `note` is never mapped
        assert!(descriptor.by_column("note").is_none());
        assert_eq!(descriptor.exported_field("name").unwrap().column, Some("title"));

        let created_by = descriptor.by_column("created_by").unwrap();
        assert_eq!(created_by.path, vec!["audit", "created_by"]);
        assert_eq!(created_by.depth, 1);
    }

    #[test]
    fn test_untagged_and_private_fields_are_not_columns() {
        let descriptor = RecordDescriptor::of::<Doc>().unwrap();

        assert!(descriptor.by_column("scratch").is_none());
        assert!(descriptor.exported_field("scratch").is_some());
        assert!(descriptor.by_column("secret").is_none());
        assert!(descriptor.private_field("secret").is_some());

        let names: Vec<_> = descriptor.columns().iter().map(|c| c.column_name()).collect();
        assert_eq!(names, vec!["id", "title", "created_by"]);
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let descriptor = RecordDescriptor::of::<Doc>().unwrap();
        assert_eq!(descriptor.by_column("TITLE").unwrap().field_name, "name");
        assert_eq!(descriptor.primary_key().unwrap().field_name, "id");
    }

    #[test]
    fn test_record_without_fields_is_rejected() {
        assert!(matches!(RecordDescriptor::of::<Empty>(), Err(Error::Mapping(_))));
        assert!(MetadataCache::new().describe::<Empty>().is_err());
    }

    #[test]
    fn test_concurrent_describe_builds_once() {
        let cache = MetadataCache::new();
        let barrier = Barrier::new(8);

        let results: Vec<Arc<RecordDescriptor>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.describe::<Doc>().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.len(), 1);
        assert!(results.iter().all(|d| Arc::ptr_eq(d, &results[0])));
    }
}
