//! The URI-routed, schema-validated record store.
//!
//! `RecordStore<E>` owns one table: its schema, its routing table and a
//! change notifier. Every write is validated against the schema and every
//! path is routed before the executor is touched. The table itself is
//! created lazily by the first operation that reaches storage.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error};

use crate::{
    ChangeNotifier, Delete, Fields, Filter, ID_COLUMN, ObserverId, Query, QueryExecutor, Record,
    ResourcePath, Route, Router, SchemaStatus, Selection, StoreConfig, StoreError, TableSchema,
    Update,
};

pub struct RecordStore<E: QueryExecutor> {
    executor: E,
    schema: TableSchema,
    router: Router,
    notifier: ChangeNotifier,
    schema_status: Mutex<Option<SchemaStatus>>,
}

impl<E: QueryExecutor> RecordStore<E> {
    /// Build a store from an executor, a validated schema and its routing table.
    pub fn new(executor: E, schema: TableSchema, router: Router) -> Result<Self, StoreError> {
        schema.validate()?;
        if router.collection() != schema.collection {
            return Err(StoreError::InvalidSchema(format!(
                "router collection '{}' does not match schema collection '{}'",
                router.collection(),
                schema.collection
            )));
        }
        Ok(Self {
            executor,
            schema,
            router,
            notifier: ChangeNotifier::new(),
            schema_status: Mutex::new(None),
        })
    }

    pub fn from_config(executor: E, config: StoreConfig) -> Result<Self, StoreError> {
        let router = config.router();
        Self::new(executor, config.schema, router)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn collection_path(&self) -> ResourcePath {
        self.router.collection_path()
    }

    pub fn item_path(&self, id: i64) -> ResourcePath {
        self.router.item_path(id)
    }

    /// Run the schema step now instead of on first storage access.
    ///
    /// Subsequent calls return the status of the first run.
    pub fn initialize(&self) -> Result<SchemaStatus, StoreError> {
        let mut status = self.lock_status();
        if let Some(done) = *status {
            return Ok(done);
        }
        let done = self.executor.ensure_table(&self.schema)?;
        debug!(table = %self.schema.table, ?done, "schema ready");
        *status = Some(done);
        Ok(done)
    }

    /// Query by path. An item path ignores the selection's filters.
    pub fn query(&self, path: &str, selection: Selection) -> Result<Vec<Record>, StoreError> {
        let (_, route) = self.router.route_str(path)?;
        self.schema.check_selection(&selection)?;
        let query = self.query_for(route, selection);
        self.initialize()?;
        self.executor.fetch(&query)
    }

    /// Every record matching `selection`. No pagination.
    pub fn list(&self, selection: Selection) -> Result<Vec<Record>, StoreError> {
        self.schema.check_selection(&selection)?;
        let query = self.query_for(Route::Collection, selection);
        self.initialize()?;
        self.executor.fetch(&query)
    }

    /// One record by id; `None` when absent.
    pub fn get(&self, id: i64) -> Result<Option<Record>, StoreError> {
        let query = self.query_for(Route::Item(id), Selection::all());
        self.initialize()?;
        self.executor.fetch_optional(&query)
    }

    /// Create a record through a collection path and return the new item path.
    pub fn insert(&self, path: &str, fields: Fields) -> Result<ResourcePath, StoreError> {
        let (path, route) = self.router.route_str(path)?;
        if route != Route::Collection {
            return Err(StoreError::UnknownResource(format!(
                "insertion is not supported for {}",
                path
            )));
        }
        let id = self.insert_row(&path, fields)?;
        Ok(path.with_appended_id(id))
    }

    /// Create a record and return its id.
    ///
    /// Storage failures surface as [`StoreError::StorageError`], distinct
    /// from validation failures; no notification is sent for them.
    pub fn create(&self, fields: Fields) -> Result<i64, StoreError> {
        self.insert_row(&self.router.collection_path(), fields)
    }

    /// Partial update by path.
    ///
    /// Only supplied fields are validated and written. An empty field map is
    /// a no-op returning 0. An item path replaces the selection's filters
    /// with `id = ?`.
    pub fn update(&self, path: &str, fields: Fields, selection: Selection) -> Result<u64, StoreError> {
        let (path, route) = self.router.route_str(path)?;
        self.update_route(&path, route, fields, selection)
    }

    pub fn update_by_id(&self, id: i64, fields: Fields) -> Result<u64, StoreError> {
        self.update_route(&self.item_path(id), Route::Item(id), fields, Selection::all())
    }

    /// Delete by path. A collection path with no filters removes every row.
    pub fn delete(&self, path: &str, selection: Selection) -> Result<u64, StoreError> {
        let (path, route) = self.router.route_str(path)?;
        self.delete_route(&path, route, selection)
    }

    pub fn delete_by_id(&self, id: i64) -> Result<u64, StoreError> {
        self.delete_route(&self.item_path(id), Route::Item(id), Selection::all())
    }

    pub fn delete_all(&self) -> Result<u64, StoreError> {
        self.delete_route(&self.collection_path(), Route::Collection, Selection::all())
    }

    /// Directory type for the collection path, item type for an item path.
    pub fn content_type(&self, path: &str) -> Result<String, StoreError> {
        let (_, route) = self.router.route_str(path)?;
        Ok(self.router.content_type(route))
    }

    /// Observe changes at `path`. The path need not route; observers of
    /// unrelated paths are simply never called.
    pub fn register_observer<F>(
        &self,
        path: &str,
        notify_for_descendants: bool,
        callback: F,
    ) -> Result<ObserverId, StoreError>
    where
        F: Fn(&ResourcePath) + Send + Sync + 'static,
    {
        let path = ResourcePath::parse(path)?;
        Ok(self.notifier.register(path, notify_for_descendants, callback))
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.notifier.unregister(id)
    }

    fn insert_row(&self, path: &ResourcePath, fields: Fields) -> Result<i64, StoreError> {
        let values = self.schema.prepare_insert(fields)?;
        self.initialize()?;
        match self.executor.insert(&self.schema.table, &values) {
            Ok(id) => {
                debug!(table = %self.schema.table, id, "inserted row");
                self.notifier.notify(path);
                Ok(id)
            }
            Err(e) => {
                error!(path = %path, error = %e, "failed to insert row");
                Err(e)
            }
        }
    }

    fn update_route(
        &self,
        path: &ResourcePath,
        route: Route,
        fields: Fields,
        selection: Selection,
    ) -> Result<u64, StoreError> {
        let values = self.schema.prepare_update(fields)?;
        if values.is_empty() {
            return Ok(0);
        }
        self.schema.check_selection(&selection)?;
        let filters = self.filters_for(route, selection.filters);
        self.initialize()?;
        let update = Update::for_table(self.schema.table.clone(), values).filters(filters);
        let rows = self.executor.update(&update)?;
        debug!(path = %path, rows, "updated rows");
        if rows > 0 {
            self.notifier.notify(path);
        }
        Ok(rows)
    }

    fn delete_route(
        &self,
        path: &ResourcePath,
        route: Route,
        selection: Selection,
    ) -> Result<u64, StoreError> {
        self.schema.check_selection(&selection)?;
        let filters = self.filters_for(route, selection.filters);
        self.initialize()?;
        let delete = Delete::for_table(self.schema.table.clone()).filters(filters);
        let rows = self.executor.delete(&delete)?;
        debug!(path = %path, rows, "deleted rows");
        if rows > 0 {
            self.notifier.notify(path);
        }
        Ok(rows)
    }

    fn query_for(&self, route: Route, mut selection: Selection) -> Query {
        selection.filters = self.filters_for(route, selection.filters);
        Query::for_table(self.schema.table.clone()).select(selection)
    }

    fn filters_for(&self, route: Route, filters: Vec<Filter>) -> Vec<Filter> {
        match route {
            Route::Collection => filters,
            Route::Item(id) => vec![Filter::Eq(ID_COLUMN.to_string(), id.into())],
        }
    }

    fn lock_status(&self) -> MutexGuard<'_, Option<SchemaStatus>> {
        self.schema_status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<E: QueryExecutor + std::fmt::Debug> std::fmt::Debug for RecordStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("executor", &self.executor)
            .field("schema", &self.schema)
            .field("router", &self.router)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{ValidationError, Value};

    /// In-memory executor that understands `id = ?` filters only.
    #[derive(Default)]
    struct FakeExecutor {
        rows: Mutex<Vec<Record>>,
        next_id: Mutex<i64>,
        calls: AtomicUsize,
        fail_inserts: bool,
    }

    impl FakeExecutor {
        fn matches(record: &Record, filters: &[Filter]) -> bool {
            filters.iter().all(|filter| match filter {
                Filter::Eq(field, Value::Int(id)) if field == ID_COLUMN => record.id == *id,
                _ => true,
            })
        }
    }

    impl QueryExecutor for FakeExecutor {
        fn ensure_table(&self, _schema: &TableSchema) -> Result<SchemaStatus, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SchemaStatus::Created)
        }

        fn fetch(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|r| Self::matches(r, &query.filters))
                .cloned()
                .collect())
        }

        fn insert(&self, _table: &str, values: &Fields) -> Result<i64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_inserts {
                return Err(StoreError::StorageError("disk full".to_string()));
            }
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            self.rows.lock().unwrap().push(Record::new(*next, values.clone()));
            Ok(*next)
        }

        fn update(&self, update: &Update) -> Result<u64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.rows.lock().unwrap();
            let mut count = 0;
            for row in rows.iter_mut().filter(|r| Self::matches(r, &update.filters)) {
                for (field, value) in update.values.iter() {
                    row.fields.insert(field, value.clone());
                }
                count += 1;
            }
            Ok(count)
        }

        fn delete(&self, delete: &Delete) -> Result<u64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| !Self::matches(r, &delete.filters));
            Ok((before - rows.len()) as u64)
        }
    }

    const PETS: &str = "content://eu.id2go.pets/pets";

    fn store_with(executor: FakeExecutor) -> RecordStore<FakeExecutor> {
        let schema = TableSchema::pets();
        let router = Router::for_schema("eu.id2go.pets", &schema);
        RecordStore::new(executor, schema, router).unwrap()
    }

    fn store() -> RecordStore<FakeExecutor> {
        store_with(FakeExecutor::default())
    }

    fn counter(store: &RecordStore<FakeExecutor>, path: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        store
            .register_observer(path, true, move |_| {
                sink.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        count
    }

    fn rex() -> Fields {
        Fields::new()
            .with("name", "Rex")
            .with("breed", "Labrador")
            .with("gender", 1)
            .with("weight", 10)
    }

    #[test]
    fn insert_returns_item_path_and_notifies_collection() {
        let store = store();
        let notified = counter(&store, PETS);

        let path = store.insert(PETS, rex()).unwrap();
        assert_eq!(path.to_string(), format!("{PETS}/1"));
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn insert_on_item_path_is_unknown_resource() {
        let err = store().insert(&format!("{PETS}/1"), rex()).unwrap_err();
        assert!(matches!(err, StoreError::UnknownResource(_)));
    }

    #[test]
    fn validation_happens_before_storage() {
        let store = store();
        let err = store.create(rex().with("name", "")).unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::Required {
                field: "name".to_string()
            })
        );
        assert_eq!(store.executor().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_path_fails_before_storage() {
        let store = store();
        for result in [
            store.query("content://eu.id2go.pets/staff", Selection::all()).map(|_| ()),
            store
                .update("content://eu.id2go.pets/staff", rex(), Selection::all())
                .map(|_| ()),
            store
                .delete("content://eu.id2go.pets/staff", Selection::all())
                .map(|_| ()),
        ] {
            assert!(matches!(result, Err(StoreError::UnknownResource(_))));
        }
        assert_eq!(store.executor().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_update_touches_nothing() {
        let store = store();
        let notified = counter(&store, PETS);

        assert_eq!(store.update_by_id(1, Fields::new()).unwrap(), 0);
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert_eq!(store.executor().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn storage_failure_is_distinct_and_silent() {
        let store = store_with(FakeExecutor {
            fail_inserts: true,
            ..FakeExecutor::default()
        });
        let notified = counter(&store, PETS);

        let err = store.create(rex()).unwrap_err();
        assert!(err.is_storage_failure());
        assert!(err.as_validation().is_none());
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn item_update_replaces_caller_filters() {
        let store = store();
        store.create(rex()).unwrap();
        store.create(rex().with("name", "Tom")).unwrap();

        let rows = store
            .update(
                &format!("{PETS}/2"),
                Fields::new().with("weight", 3),
                Selection::all().eq("name", "Rex"),
            )
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(store.get(2).unwrap().unwrap().get_i64("weight"), Some(3));
        assert_eq!(store.get(1).unwrap().unwrap().get_i64("weight"), Some(10));
    }

    #[test]
    fn delete_notifies_only_when_rows_removed() {
        let store = store();
        let notified = counter(&store, PETS);
        let id = store.create(rex()).unwrap();

        assert_eq!(store.delete_by_id(id).unwrap(), 1);
        assert_eq!(store.delete_by_id(id).unwrap(), 0);
        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn schema_step_runs_once() {
        let store = store();
        assert_eq!(store.initialize().unwrap(), SchemaStatus::Created);
        store.list(Selection::all()).unwrap();
        store.get(1).unwrap();
        // ensure_table, fetch, fetch
        assert_eq!(store.executor().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn content_type_follows_route() {
        let store = store();
        assert_eq!(
            store.content_type(PETS).unwrap(),
            "vnd.content.dir/eu.id2go.pets/pets"
        );
        assert_eq!(
            store.content_type(&format!("{PETS}/4")).unwrap(),
            "vnd.content.item/eu.id2go.pets/pets"
        );
    }

    #[test]
    fn mismatched_router_is_rejected() {
        let result = RecordStore::new(
            FakeExecutor::default(),
            TableSchema::pets(),
            Router::new("content", "a", "stock"),
        );
        assert!(matches!(result, Err(StoreError::InvalidSchema(_))));
    }
}
