//! # Entity Mapper Module
//!
//! Turns records and [`EntityMap`]s into INSERT / UPDATE / DELETE statements.
//!
//! ## Primary Key Strategies
//!
//! The strategy is resolved per statement from the key field's metadata and
//! its current value ("unassigned" means null, `0`, `""` or the nil UUID):
//!
//! | Field metadata         | Unassigned value    | Assigned value |
//! |------------------------|---------------------|----------------|
//! | `sequence = "expr"`    | `Sequence(expr)`    | `Assigned`     |
//! | `trigger`              | `Trigger`           | `Assigned`     |
//! | integer                | `AutoIncrement`     | `Assigned`     |
//! | `String` / `Uuid`      | `ClientGenerated`   | `Assigned`     |
//!
//! - `Sequence`: the expression is written literally into `VALUES`.
//! - `AutoIncrement` / `Trigger`: the key column is left out and the statement
//!   is flagged so the caller reads the generated key back.
//! - `ClientGenerated`: a key is produced by the `KeyGenerator` and written to
//!   the record once the whole statement has been built.
//!
//! All output uses the neutral `?` placeholder; [`MappedStatement::dialect_sql`]
//! gives the text for a specific driver.

use crate::dialect::{Drivers, PLACEHOLDER};
use crate::entity_map::EntityMap;
use crate::hooks::KeyGenerator;
use crate::metadata::{FieldDescriptor, RecordDescriptor};
use crate::model::{Entity, ScalarKind};
use crate::{Error, Finder, Value, temporal};

// ============================================================================
// Key Strategy
// ============================================================================

/// How the primary key of an inserted row gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    AutoIncrement,
    Sequence(&'static str),
    ClientGenerated,
    Trigger,
    Assigned,
}

/// Resolves the key strategy for one row.
pub fn resolve_key_strategy(key: &FieldDescriptor, value: &Value) -> Result<KeyStrategy, Error> {
    if !key.kind.is_key_compatible() {
        return Err(Error::Mapping(format!(
            "primary key {} must be an integer, String or Uuid field, found {}",
            key.field_name, key.sql_type
        )));
    }
    if !value.is_unassigned_key() {
        return Ok(KeyStrategy::Assigned);
    }

    let strategy = if let Some(expression) = key.sequence {
        KeyStrategy::Sequence(expression)
    } else if key.trigger {
        KeyStrategy::Trigger
    } else if key.kind == ScalarKind::Integer {
        KeyStrategy::AutoIncrement
    } else {
        KeyStrategy::ClientGenerated
    };
    Ok(strategy)
}

/// Which columns an UPDATE writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Every non-key column.
    Full,
    /// Non-key columns whose value is not null (`Option::None` fields are skipped).
    NonNull,
}

// ============================================================================
// Mapped Statement
// ============================================================================

/// A built statement with the metadata the executor needs.
#[derive(Debug, Clone)]
pub struct MappedStatement {
    pub table: String,
    /// SQL with neutral placeholders.
    pub sql: String,
    /// Written columns, in placeholder order.
    pub columns: Vec<String>,
    pub values: Vec<Value>,
    /// The database assigns the key; the caller should read it back.
    pub autoincrement: bool,
    /// The SQL ends with `RETURNING <key>`.
    pub returning: bool,
    pub primary_key: Option<FieldDescriptor>,
}

impl MappedStatement {
    /// The SQL text with the driver's placeholder syntax.
    pub fn dialect_sql(&self, driver: &Drivers) -> String {
        driver.rebind(&self.sql)
    }
}

/// Finalizes generated SQL through a `Finder`. Sequence expressions may
/// contain quotes, so the injection check is off.
fn finalize(sql: String, values: Vec<Value>) -> Result<(String, Vec<Value>), Error> {
    let mut finder = Finder::new();
    finder.injection_check = false;
    finder.append(&sql, values);
    finder.finalize()
}

fn placeholder(field: &FieldDescriptor, driver: &Drivers) -> String {
    match driver {
        Drivers::Postgres => format!("{}{}", PLACEHOLDER, temporal::get_postgres_type_cast(field.sql_type)),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Replaces chrono's default date-time with the sentinel.
fn normalize_value(value: Value) -> Value {
    match value {
        Value::DateTime(dt) if temporal::is_zero_naive_datetime(&dt) => Value::DateTime(temporal::zero_naive_sentinel()),
        Value::Timestamp(ts) if temporal::is_zero_datetime(&ts) => Value::Timestamp(temporal::zero_date_sentinel()),
        other => other,
    }
}

fn read_field<T: Entity>(record: &T, field: &FieldDescriptor) -> Result<Value, Error> {
    record.field_value(&field.path).ok_or_else(|| {
        Error::Mapping(format!("{} has no readable field at {}", std::any::type_name::<T>(), field.path.join(".")))
    })
}

fn require_columns(descriptor: &RecordDescriptor) -> Result<(), Error> {
    if descriptor.columns().is_empty() {
        return Err(Error::Mapping(format!("{} has no column-tagged fields", descriptor.type_name)));
    }
    Ok(())
}

fn require_key(descriptor: &RecordDescriptor) -> Result<&FieldDescriptor, Error> {
    descriptor
        .primary_key()
        .ok_or_else(|| Error::Mapping(format!("{} has no primary key field", descriptor.type_name)))
}

// ============================================================================
// Insert
// ============================================================================

/// One row of an INSERT, with the chosen key strategy.
struct InsertRow {
    columns: Vec<String>,
    placeholders: Vec<String>,
    values: Vec<Value>,
    strategy: Option<KeyStrategy>,
    /// Client-generated key still to be written to the record, with the
    /// value it replaces.
    generated_key: Option<(Value, Value)>,
}

impl InsertRow {
    fn write_key<T: Entity>(&self, record: &mut T, key: &FieldDescriptor) -> Result<(), Error> {
        match &self.generated_key {
            Some((_, generated)) => record.set_field_value(&key.path, generated.clone()),
            None => Ok(()),
        }
    }

    fn restore_key<T: Entity>(&self, record: &mut T, key: &FieldDescriptor) {
        if let Some((original, _)) = &self.generated_key {
            if let Err(e) = record.set_field_value(&key.path, original.clone()) {
                log::error!("Failed to restore key {} after a failed batch: {}", key.field_name, e);
            }
        }
    }
}

fn map_insert_row<T: Entity>(
    record: &T,
    descriptor: &RecordDescriptor,
    driver: &Drivers,
    keys: &dyn KeyGenerator,
) -> Result<InsertRow, Error> {
    let mut row = InsertRow {
        columns: Vec::new(),
        placeholders: Vec::new(),
        values: Vec::new(),
        strategy: None,
        generated_key: None,
    };

    for field in descriptor.columns() {
        let column = field.column_name().to_string();
        let value = read_field(record, field)?;

        if !field.primary_key {
            row.columns.push(column);
            row.placeholders.push(placeholder(field, driver));
            row.values.push(normalize_value(value));
            continue;
        }

        let strategy = resolve_key_strategy(field, &value)?;
        row.strategy = Some(strategy);
        match strategy {
            KeyStrategy::AutoIncrement | KeyStrategy::Trigger => {}
            KeyStrategy::Sequence(expression) => {
                row.columns.push(column);
                row.placeholders.push(expression.to_string());
            }
            KeyStrategy::ClientGenerated => {
                let generated = keys.generate(field.kind);
                row.columns.push(column);
                row.placeholders.push(placeholder(field, driver));
                row.values.push(generated.clone());
                row.generated_key = Some((value, generated));
            }
            KeyStrategy::Assigned => {
                row.columns.push(column);
                row.placeholders.push(placeholder(field, driver));
                row.values.push(value);
            }
        }
    }

    Ok(row)
}

/// Builds `INSERT INTO table (..) VALUES (..)` for one record.
///
/// A client-generated key is written back into `record`.
///
/// # Example
///
/// ```rust,ignore
/// let stmt = build_insert(&mut user, &descriptor, &Drivers::SQLite, &UuidKeyGenerator)?;
/// // INSERT INTO t_user (name,created_at) VALUES (?,?)   (autoincrement = true)
/// ```
pub fn build_insert<T: Entity>(
    record: &mut T,
    descriptor: &RecordDescriptor,
    driver: &Drivers,
    keys: &dyn KeyGenerator,
) -> Result<MappedStatement, Error> {
    require_columns(descriptor)?;
    let row = map_insert_row(record, descriptor, driver, keys)?;
    if row.columns.is_empty() {
        return Err(Error::Mapping(format!("{} has no insertable columns", descriptor.type_name)));
    }

    let autoincrement = matches!(row.strategy, Some(KeyStrategy::AutoIncrement | KeyStrategy::Trigger));
    let primary_key = descriptor.primary_key().cloned();
    let returning = autoincrement
        && driver.supports_returning()
        && primary_key.as_ref().is_some_and(|key| key.kind == ScalarKind::Integer);

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        T::table_name(),
        row.columns.join(","),
        row.placeholders.join(",")
    );
    if let Some(key) = primary_key.as_ref().filter(|_| returning) {
        sql.push_str(&format!(" RETURNING {}", key.column_name()));
    }

    if let Some(key) = primary_key.as_ref() {
        row.write_key(record, key)?;
    }

    let (sql, values) = finalize(sql, row.values)?;
    Ok(MappedStatement {
        table: T::table_name().to_string(),
        sql,
        columns: row.columns,
        values,
        autoincrement,
        returning,
        primary_key,
    })
}

/// Builds one multi-row INSERT for `records`.
///
/// Every row must resolve to the same key strategy: a batch mixing assigned
/// and database-generated keys is rejected. Generated keys are not read back.
/// Client-generated keys are written to the records only when the whole
/// batch maps; on failure every record keeps its original key.
pub fn build_insert_batch<T: Entity>(
    records: &mut [T],
    descriptor: &RecordDescriptor,
    driver: &Drivers,
    keys: &dyn KeyGenerator,
) -> Result<MappedStatement, Error> {
    require_columns(descriptor)?;
    if records.is_empty() {
        return Err(Error::Validation("batch insert needs at least one record".to_string()));
    }

    let mut columns: Option<Vec<String>> = None;
    let mut first_strategy: Option<KeyStrategy> = None;
    let mut tuples = Vec::with_capacity(records.len());
    let mut values = Vec::new();
    let mut rows = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let row = map_insert_row(record, descriptor, driver, keys)?;

        if index == 0 {
            first_strategy = row.strategy;
        } else if !same_key_shape(first_strategy, row.strategy) {
            return Err(Error::Validation(format!(
                "batch row {} resolves key strategy {:?}, first row resolved {:?}",
                index + 1,
                row.strategy,
                first_strategy
            )));
        }

        match &columns {
            None => columns = Some(row.columns.clone()),
            Some(existing) if *existing != row.columns => {
                return Err(Error::Validation(format!("batch row {} writes a different column set", index + 1)));
            }
            Some(_) => {}
        }
        tuples.push(format!("({})", row.placeholders.join(",")));
        values.extend(row.values.iter().cloned());
        rows.push(row);
    }

    if let Some(key) = descriptor.primary_key() {
        for (index, row) in rows.iter().enumerate() {
            if let Err(e) = row.write_key(&mut records[index], key) {
                for (written, record) in rows.iter().zip(records.iter_mut()).take(index) {
                    written.restore_key(record, key);
                }
                return Err(e);
            }
        }
    }

    let columns = columns.unwrap_or_default();
    let sql = format!("INSERT INTO {} ({}) VALUES {}", T::table_name(), columns.join(","), tuples.join(","));
    let (sql, values) = finalize(sql, values)?;

    Ok(MappedStatement {
        table: T::table_name().to_string(),
        sql,
        columns,
        values,
        autoincrement: matches!(first_strategy, Some(KeyStrategy::AutoIncrement | KeyStrategy::Trigger)),
        returning: false,
        primary_key: descriptor.primary_key().cloned(),
    })
}

/// Client-generated and assigned keys both write the key column.
fn same_key_shape(a: Option<KeyStrategy>, b: Option<KeyStrategy>) -> bool {
    let writes_key = |s: Option<KeyStrategy>| matches!(s, Some(KeyStrategy::ClientGenerated | KeyStrategy::Assigned));
    match (a, b) {
        (Some(KeyStrategy::Sequence(x)), Some(KeyStrategy::Sequence(y))) => x == y,
        (Some(KeyStrategy::Sequence(_)), _) | (_, Some(KeyStrategy::Sequence(_))) => false,
        (a, b) => writes_key(a) == writes_key(b),
    }
}

// ============================================================================
// Update / Delete
// ============================================================================

/// Builds `UPDATE table SET .. WHERE key = ?`.
///
/// The key column is moved out of the SET list into the trailing predicate.
pub fn build_update<T: Entity>(
    record: &T,
    descriptor: &RecordDescriptor,
    driver: &Drivers,
    mode: UpdateMode,
) -> Result<MappedStatement, Error> {
    require_columns(descriptor)?;
    let key = require_key(descriptor)?;

    let mut columns = Vec::new();
    let mut assignments = Vec::new();
    let mut values = Vec::new();

    for field in descriptor.columns().iter().filter(|field| !field.primary_key) {
        let value = read_field(record, field)?;
        if mode == UpdateMode::NonNull && value.is_null() {
            continue;
        }
        columns.push(field.column_name().to_string());
        assignments.push(format!("{}={}", field.column_name(), placeholder(field, driver)));
        values.push(normalize_value(value));
    }
    if assignments.is_empty() {
        return Err(Error::Validation(format!("update of {} has no columns to set", T::table_name())));
    }

    values.push(read_field(record, key)?);
    let sql = format!(
        "UPDATE {} SET {} WHERE {}={}",
        T::table_name(),
        assignments.join(","),
        key.column_name(),
        placeholder(key, driver)
    );
    let (sql, values) = finalize(sql, values)?;

    Ok(MappedStatement {
        table: T::table_name().to_string(),
        sql,
        columns,
        values,
        autoincrement: false,
        returning: false,
        primary_key: Some(key.clone()),
    })
}

/// Builds `DELETE FROM table WHERE key = ?`.
pub fn build_delete<T: Entity>(
    record: &T,
    descriptor: &RecordDescriptor,
    driver: &Drivers,
) -> Result<MappedStatement, Error> {
    require_columns(descriptor)?;
    let key = require_key(descriptor)?;

    let sql = format!("DELETE FROM {} WHERE {}={}", T::table_name(), key.column_name(), placeholder(key, driver));
    let (sql, values) = finalize(sql, vec![read_field(record, key)?])?;

    Ok(MappedStatement {
        table: T::table_name().to_string(),
        sql,
        columns: vec![key.column_name().to_string()],
        values,
        autoincrement: false,
        returning: false,
        primary_key: Some(key.clone()),
    })
}

// ============================================================================
// Entity Map
// ============================================================================

/// Builds an INSERT for a dynamic row.
///
/// With a key column named: an absent or unassigned key uses the sequence when
/// one is set, a client key when the value is an empty string, and is left to
/// the database otherwise.
pub fn build_insert_map(map: &mut EntityMap, driver: &Drivers, keys: &dyn KeyGenerator) -> Result<MappedStatement, Error> {
    if map.is_empty() && map.sequence().is_none() {
        return Err(Error::Mapping(format!("entity map for {} has no columns", map.table())));
    }

    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    let mut values = Vec::new();
    let mut autoincrement = false;

    if let Some(pk) = map.primary_key().map(str::to_string) {
        let current = map.get(&pk).cloned();
        let unassigned = current.as_ref().is_none_or(Value::is_unassigned_key);
        if unassigned {
            if let Some(expression) = map.sequence().map(str::to_string) {
                columns.push(pk.clone());
                placeholders.push(expression);
            } else if matches!(current, Some(Value::Text(_))) {
                let generated = keys.generate(ScalarKind::Text);
                map.set(pk.as_str(), generated.clone())?;
                columns.push(pk.clone());
                placeholders.push(PLACEHOLDER.to_string());
                values.push(generated);
            } else {
                autoincrement = true;
            }
        }
        for (column, value) in map.entries() {
            if unassigned && column.eq_ignore_ascii_case(&pk) {
                continue;
            }
            columns.push(column.clone());
            placeholders.push(PLACEHOLDER.to_string());
            values.push(normalize_value(value.clone()));
        }
    } else {
        for (column, value) in map.entries() {
            columns.push(column.clone());
            placeholders.push(PLACEHOLDER.to_string());
            values.push(normalize_value(value.clone()));
        }
    }

    let mut sql = format!("INSERT INTO {} ({}) VALUES ({})", map.table(), columns.join(","), placeholders.join(","));
    let returning = autoincrement && driver.supports_returning();
    if let Some(pk) = map.primary_key().filter(|_| returning) {
        sql.push_str(&format!(" RETURNING {}", pk));
    }
    let (sql, values) = finalize(sql, values)?;

    Ok(MappedStatement {
        table: map.table().to_string(),
        sql,
        columns,
        values,
        autoincrement,
        returning,
        primary_key: None,
    })
}

/// Builds an UPDATE for a dynamic row. The key column and its value are required.
pub fn build_update_map(map: &EntityMap) -> Result<MappedStatement, Error> {
    let pk = map
        .primary_key()
        .ok_or_else(|| Error::Mapping(format!("entity map for {} has no primary key column", map.table())))?;
    let key_value = map
        .get(pk)
        .cloned()
        .ok_or_else(|| Error::Mapping(format!("entity map for {} has no value for key {}", map.table(), pk)))?;

    let mut columns = Vec::new();
    let mut assignments = Vec::new();
    let mut values = Vec::new();
    for (column, value) in map.entries().iter().filter(|(column, _)| !column.eq_ignore_ascii_case(pk)) {
        columns.push(column.clone());
        assignments.push(format!("{}={}", column, PLACEHOLDER));
        values.push(normalize_value(value.clone()));
    }
    if assignments.is_empty() {
        return Err(Error::Validation(format!("update of {} has no columns to set", map.table())));
    }
    values.push(key_value);

    let sql = format!("UPDATE {} SET {} WHERE {}={}", map.table(), assignments.join(","), pk, PLACEHOLDER);
    let (sql, values) = finalize(sql, values)?;

    Ok(MappedStatement {
        table: map.table().to_string(),
        sql,
        columns,
        values,
        autoincrement: false,
        returning: false,
        primary_key: None,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::UuidKeyGenerator;
    use crate::{Entity, Record};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Entity, Default, Debug, Clone)]
    #[orm(table = "t_user")]
    pub struct User {
        #[orm(column, primary_key)]
        pub id: i64,
        #[orm(column)]
        pub name: String,
        #[orm(column)]
        pub nickname: Option<String>,
        #[orm(column)]
        pub created_at: DateTime<Utc>,
    }

    #[derive(Entity, Default, Debug)]
    #[orm(table = "t_tag")]
    pub struct Tag {
        #[orm(column, primary_key)]
        pub id: String,
        #[orm(column)]
        pub label: String,
    }

    #[derive(Entity, Default, Debug)]
    #[orm(table = "t_order")]
    pub struct Order {
        #[orm(column, primary_key, sequence = "nextval('order_seq')")]
        pub id: i64,
        #[orm(column)]
        pub amount: f64,
    }

    #[derive(Entity, Default, Debug)]
    #[orm(table = "t_bad")]
    pub struct BadKey {
        #[orm(column, primary_key)]
        pub id: f64,
        #[orm(column)]
        pub label: String,
    }

    #[derive(Entity, Default, Debug)]
    #[orm(table = "t_none")]
    pub struct Unmapped {
        pub id: i64,
    }

    fn describe<T: Entity>() -> RecordDescriptor {
        RecordDescriptor::of::<T>().unwrap()
    }

    #[test]
    fn test_insert_autoincrement_drops_key_column() {
        let mut user = User { name: "alice".into(), ..Default::default() };
        let stmt = build_insert(&mut user, &describe::<User>(), &Drivers::SQLite, &UuidKeyGenerator).unwrap();

        assert_eq!(stmt.sql, "INSERT INTO t_user (name,nickname,created_at) VALUES (?,?,?)");
        assert!(stmt.autoincrement);
        assert!(!stmt.returning);
        assert_eq!(stmt.values[1], Value::Null);
    }

    #[test]
    fn test_insert_replaces_zero_datetime_with_sentinel() {
        let mut user = User { name: "alice".into(), ..Default::default() };
        let stmt = build_insert(&mut user, &describe::<User>(), &Drivers::SQLite, &UuidKeyGenerator).unwrap();

        assert_eq!(stmt.values[2], Value::Timestamp(temporal::zero_date_sentinel()));
        assert!(temporal::is_zero_datetime(&user.created_at));
    }

    #[test]
    fn test_insert_postgres_returning_and_casts() {
        let mut user = User { name: "alice".into(), ..Default::default() };
        let stmt = build_insert(&mut user, &describe::<User>(), &Drivers::Postgres, &UuidKeyGenerator).unwrap();

        assert_eq!(stmt.sql, "INSERT INTO t_user (name,nickname,created_at) VALUES (?,?,?::TIMESTAMPTZ) RETURNING id");
        assert_eq!(
            stmt.dialect_sql(&Drivers::Postgres),
            "INSERT INTO t_user (name,nickname,created_at) VALUES ($1,$2,$3::TIMESTAMPTZ) RETURNING id"
        );
        assert!(stmt.returning);
    }

    #[test]
    fn test_insert_assigned_key_is_bound() {
        let mut user = User { id: 9, name: "bob".into(), ..Default::default() };
        let stmt = build_insert(&mut user, &describe::<User>(), &Drivers::MySQL, &UuidKeyGenerator).unwrap();

        assert_eq!(stmt.columns, vec!["id", "name", "nickname", "created_at"]);
        assert_eq!(stmt.values[0], Value::Int(9));
        assert!(!stmt.autoincrement);
    }

    #[test]
    fn test_insert_client_key_written_back() {
        let mut tag = Tag { label: "rust".into(), ..Default::default() };
        let stmt = build_insert(&mut tag, &describe::<Tag>(), &Drivers::SQLite, &UuidKeyGenerator).unwrap();

        assert_eq!(tag.id.len(), 32);
        assert_eq!(stmt.values[0], Value::Text(tag.id.clone()));
        assert!(!stmt.autoincrement);
    }

    #[test]
    fn test_insert_sequence_is_literal() {
        let mut order = Order { amount: 3.5, ..Default::default() };
        let stmt = build_insert(&mut order, &describe::<Order>(), &Drivers::Oracle, &UuidKeyGenerator).unwrap();

        assert_eq!(stmt.sql, "INSERT INTO t_order (id,amount) VALUES (nextval('order_seq'),?)");
        assert_eq!(stmt.values, vec![Value::Float(3.5)]);
        assert_eq!(stmt.dialect_sql(&Drivers::Oracle), "INSERT INTO t_order (id,amount) VALUES (nextval('order_seq'),:1)");
    }

    #[test]
    fn test_unsupported_key_type_is_rejected() {
        let mut bad = BadKey { label: "x".into(), ..Default::default() };
        let result = build_insert(&mut bad, &describe::<BadKey>(), &Drivers::SQLite, &UuidKeyGenerator);
        assert!(matches!(result, Err(Error::Mapping(_))));
    }

    #[test]
    fn test_record_without_columns_is_rejected() {
        let mut none = Unmapped::default();
        let result = build_insert(&mut none, &describe::<Unmapped>(), &Drivers::SQLite, &UuidKeyGenerator);
        assert!(matches!(result, Err(Error::Mapping(_))));
    }

    #[test]
    fn test_update_full_and_non_null() {
        let user = User { id: 3, name: "carol".into(), nickname: None, ..Default::default() };
        let descriptor = describe::<User>();

        let full = build_update(&user, &descriptor, &Drivers::SQLite, UpdateMode::Full).unwrap();
        assert_eq!(full.sql, "UPDATE t_user SET name=?,nickname=?,created_at=? WHERE id=?");
        assert_eq!(full.values.last(), Some(&Value::Int(3)));

        let partial = build_update(&user, &descriptor, &Drivers::SQLite, UpdateMode::NonNull).unwrap();
        assert_eq!(partial.sql, "UPDATE t_user SET name=?,created_at=? WHERE id=?");
        assert_eq!(partial.values.len(), 3);
    }

    #[test]
    fn test_delete_uses_key_predicate() {
        let user = User { id: 5, ..Default::default() };
        let stmt = build_delete(&user, &describe::<User>(), &Drivers::MSSQL).unwrap();

        assert_eq!(stmt.sql, "DELETE FROM t_user WHERE id=?");
        assert_eq!(stmt.dialect_sql(&Drivers::MSSQL), "DELETE FROM t_user WHERE id=@p1");
    }

    #[test]
    fn test_batch_rejects_mixed_integer_keys() {
        let mut users = vec![User { id: 0, ..Default::default() }, User { id: 7, ..Default::default() }];
        let result = build_insert_batch(&mut users, &describe::<User>(), &Drivers::SQLite, &UuidKeyGenerator);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_batch_builds_one_statement() {
        let mut tags = vec![
            Tag { label: "a".into(), ..Default::default() },
            Tag { id: "fixed".into(), label: "b".into() },
        ];
        let stmt = build_insert_batch(&mut tags, &describe::<Tag>(), &Drivers::SQLite, &UuidKeyGenerator).unwrap();

        assert_eq!(stmt.sql, "INSERT INTO t_tag (id,label) VALUES (?,?),(?,?)");
        assert_eq!(stmt.values.len(), 4);
        assert!(!tags[0].id.is_empty());
        assert_eq!(tags[1].id, "fixed");
    }

    /// Hands out one usable key, then values no `String` field accepts.
    struct OneKeyGenerator(AtomicUsize);

    impl KeyGenerator for OneKeyGenerator {
        fn generate(&self, _kind: ScalarKind) -> Value {
            match self.0.fetch_add(1, Ordering::SeqCst) {
                0 => Value::Text("k1".into()),
                _ => Value::Null,
            }
        }
    }

    #[test]
    fn test_failed_batch_leaves_keys_untouched() {
        let mut tags = vec![
            Tag { label: "a".into(), ..Default::default() },
            Tag { label: "b".into(), ..Default::default() },
        ];
        let keys = OneKeyGenerator(AtomicUsize::new(0));
        let result = build_insert_batch(&mut tags, &describe::<Tag>(), &Drivers::SQLite, &keys);

        assert!(result.is_err());
        assert!(tags.iter().all(|tag| tag.id.is_empty()));
    }

    #[test]
    fn test_insert_map_autoincrement_and_update_map() {
        let mut map = EntityMap::new("t_audit").with_primary_key("id");
        map.set("action", "login").unwrap().set("id", 0).unwrap();

        let insert = build_insert_map(&mut map, &Drivers::SQLite, &UuidKeyGenerator).unwrap();
        assert_eq!(insert.sql, "INSERT INTO t_audit (action) VALUES (?)");
        assert!(insert.autoincrement);

        let returning = build_insert_map(&mut map.clone(), &Drivers::Postgres, &UuidKeyGenerator).unwrap();
        assert_eq!(returning.sql, "INSERT INTO t_audit (action) VALUES (?) RETURNING id");

        map.set("id", 12).unwrap();
        let update = build_update_map(&map).unwrap();
        assert_eq!(update.sql, "UPDATE t_audit SET action=? WHERE id=?");
        assert_eq!(update.values, vec![Value::Text("login".into()), Value::Int(12)]);
    }

    #[test]
    fn test_update_map_requires_key() {
        let mut map = EntityMap::new("t_audit");
        map.set("action", "x").unwrap();
        assert!(matches!(build_update_map(&map), Err(Error::Mapping(_))));
    }
}
