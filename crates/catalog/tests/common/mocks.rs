//! Mock collaborators for coordinator and purger tests.

use async_trait::async_trait;
use bytes::Bytes;
use lathe_db::error::{DbError, DbResult};
use lathe_db::traits::{AdvisoryLocks, Database, DbTransaction, SchemaColumn, SchemaSource};
use lathe_db::value::{Row, SqlValue, Statement};
use lathe_storage::{ObjectStore, StorageError, StorageResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct DbState {
    committed: Vec<Statement>,
    standalone: Vec<Statement>,
    begun: u32,
    committed_tx: u32,
    rolled_back_tx: u32,
    scripted: Vec<(String, Vec<Row>)>,
    fail_on: Vec<(String, u32)>,
    zero_affected_on: Vec<String>,
    fail_commit: bool,
}

impl DbState {
    fn should_fail(&mut self, sql: &str) -> Option<String> {
        for (needle, remaining) in &mut self.fail_on {
            if *remaining > 0 && sql.contains(needle.as_str()) {
                *remaining -= 1;
                return Some(needle.clone());
            }
        }
        None
    }

    fn scripted_rows(&self, sql: &str) -> Option<Vec<Row>> {
        self.scripted
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
    }
}

/// In-memory stand-in for the relational store. Statements executed inside a
/// transaction become visible via `committed_statements` only after commit.
#[derive(Clone)]
pub struct MockDatabase {
    state: Arc<Mutex<DbState>>,
    next_id: Arc<AtomicI64>,
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(DbState::default())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the rows returned for any query whose SQL contains `needle`.
    pub fn script_query(&self, needle: &str, rows: Vec<Row>) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .push((needle.to_string(), rows));
    }

    /// Fail every statement whose SQL contains `needle`.
    pub fn fail_on(&self, needle: &str) {
        self.fail_times(needle, u32::MAX);
    }

    /// Fail the first `times` statements whose SQL contains `needle`.
    pub fn fail_times(&self, needle: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .fail_on
            .push((needle.to_string(), times));
    }

    /// Report zero affected rows for statements whose SQL contains `needle`.
    pub fn zero_affected_on(&self, needle: &str) {
        self.state
            .lock()
            .unwrap()
            .zero_affected_on
            .push(needle.to_string());
    }

    pub fn fail_commit(&self) {
        self.state.lock().unwrap().fail_commit = true;
    }

    pub fn committed_statements(&self) -> Vec<Statement> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn find_committed(&self, needle: &str) -> Option<Statement> {
        self.committed_statements()
            .into_iter()
            .find(|stmt| stmt.sql.contains(needle))
    }

    pub fn standalone_statements(&self) -> Vec<Statement> {
        self.state.lock().unwrap().standalone.clone()
    }

    pub fn begun_count(&self) -> u32 {
        self.state.lock().unwrap().begun
    }

    pub fn committed_count(&self) -> u32 {
        self.state.lock().unwrap().committed_tx
    }

    pub fn rolled_back_count(&self) -> u32 {
        self.state.lock().unwrap().rolled_back_tx
    }
}

struct MockTransaction {
    state: Arc<Mutex<DbState>>,
    next_id: Arc<AtomicI64>,
    staged: Vec<Statement>,
}

impl MockTransaction {
    fn run(&mut self, stmt: &Statement) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(needle) = state.should_fail(&stmt.sql) {
            return Err(DbError::Config(format!("injected failure: {needle}")));
        }
        drop(state);
        self.staged.push(stmt.clone());
        Ok(())
    }
}

#[async_trait]
impl DbTransaction for MockTransaction {
    async fn query(&mut self, stmt: Statement) -> DbResult<Vec<Row>> {
        self.run(&stmt)?;
        let state = self.state.lock().unwrap();
        if let Some(rows) = state.scripted_rows(&stmt.sql) {
            return Ok(rows);
        }
        drop(state);
        if stmt.sql.contains("RETURNING id") {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            return Ok(vec![Row::from_pairs([("id", SqlValue::Int(id))])]);
        }
        Ok(Vec::new())
    }

    async fn execute(&mut self, stmt: Statement) -> DbResult<u64> {
        self.run(&stmt)?;
        let state = self.state.lock().unwrap();
        let affected = if state
            .zero_affected_on
            .iter()
            .any(|needle| stmt.sql.contains(needle.as_str()))
        {
            0
        } else {
            1
        };
        Ok(affected)
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_commit {
            return Err(DbError::Config("injected commit failure".to_string()));
        }
        state.committed.extend(self.staged);
        state.committed_tx += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.state.lock().unwrap().rolled_back_tx += 1;
        Ok(())
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn begin(&self) -> DbResult<Box<dyn DbTransaction>> {
        self.state.lock().unwrap().begun += 1;
        Ok(Box::new(MockTransaction {
            state: Arc::clone(&self.state),
            next_id: Arc::clone(&self.next_id),
            staged: Vec::new(),
        }))
    }

    async fn query(&self, stmt: Statement) -> DbResult<Vec<Row>> {
        let mut state = self.state.lock().unwrap();
        if let Some(needle) = state.should_fail(&stmt.sql) {
            return Err(DbError::Config(format!("injected failure: {needle}")));
        }
        state.standalone.push(stmt.clone());
        Ok(state.scripted_rows(&stmt.sql).unwrap_or_default())
    }

    async fn execute(&self, stmt: Statement) -> DbResult<u64> {
        let mut state = self.state.lock().unwrap();
        if let Some(needle) = state.should_fail(&stmt.sql) {
            return Err(DbError::Config(format!("injected failure: {needle}")));
        }
        state.standalone.push(stmt);
        Ok(1)
    }
}

/// Advisory lock mock backed by an in-process set of held keys.
#[derive(Default)]
pub struct MockAdvisoryLocks {
    held: Mutex<HashSet<i64>>,
    try_calls: AtomicU32,
    unlocked: Mutex<Vec<i64>>,
}

impl MockAdvisoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-acquire a key, simulating another instance mid-purge.
    pub fn hold(&self, key: i64) {
        self.held.lock().unwrap().insert(key);
    }

    pub fn try_call_count(&self) -> u32 {
        self.try_calls.load(Ordering::SeqCst)
    }

    pub fn unlock_calls(&self) -> Vec<i64> {
        self.unlocked.lock().unwrap().clone()
    }

    pub fn is_held(&self, key: i64) -> bool {
        self.held.lock().unwrap().contains(&key)
    }
}

#[async_trait]
impl AdvisoryLocks for MockAdvisoryLocks {
    async fn try_lock(&self, key: i64) -> DbResult<bool> {
        self.try_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.held.lock().unwrap().insert(key))
    }

    async fn unlock(&self, key: i64) -> DbResult<()> {
        self.held.lock().unwrap().remove(&key);
        self.unlocked.lock().unwrap().push(key);
        Ok(())
    }
}

/// Object store mock with injectable put/delete failures.
#[derive(Default)]
pub struct MockObjectStore {
    objects: Mutex<BTreeMap<(String, String), Bytes>>,
    delete_calls: Mutex<Vec<(String, String)>>,
    fail_put_on: Mutex<Option<String>>,
    fail_deletes: AtomicBool,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail puts whose object key contains `needle`.
    pub fn fail_put_on(&self, needle: &str) {
        *self.fail_put_on.lock().unwrap() = Some(needle.to_string());
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn delete_calls(&self) -> Vec<(String, String)> {
        self.delete_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> StorageResult<()> {
        if let Some(needle) = self.fail_put_on.lock().unwrap().as_deref() {
            if key.contains(needle) {
                return Err(StorageError::S3("injected put failure".into()));
            }
        }
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.delete_calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::S3("injected delete failure".into()));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

/// Fixed schema source keyed by base table name.
#[derive(Default)]
pub struct MockSchemaSource {
    tables: Mutex<HashMap<String, Vec<SchemaColumn>>>,
}

impl MockSchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: &str, columns: &[&str]) -> Self {
        self.tables.lock().unwrap().insert(
            table.to_string(),
            columns.iter().map(|name| text_column(name)).collect(),
        );
        self
    }
}

#[async_trait]
impl SchemaSource for MockSchemaSource {
    async fn list_columns(&self, _schema: &str, table: &str) -> DbResult<Vec<SchemaColumn>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn text_column(name: &str) -> SchemaColumn {
    SchemaColumn {
        name: name.to_string(),
        data_type: "text".to_string(),
        udt_name: "text".to_string(),
        numeric_precision: None,
        numeric_scale: None,
    }
}
