use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::info;
use thiserror::Error;

use crate::file::{
    BufferPoolManager, DbHeader, FileError, FreeSpaceManager, PageId, HEADER_PAGE_ID,
    INVALID_PAGE_ID,
};
use crate::record::{Column, ColumnType, RecordError, Schema, TableHeap, TablePage, Value};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Table {0} already exists")]
    DuplicateTable(String),

    #[error("Database file is corrupt: {0}")]
    Corrupt(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Table identifier; ids 0 and 1 belong to the system tables
pub type TableId = i32;

pub const CATALOG_TABLES_ID: TableId = 0;
pub const CATALOG_COLUMNS_ID: TableId = 1;
pub const FIRST_USER_TABLE_ID: TableId = 2;

const CATALOG_TABLES_NAME: &str = "__catalog_tables";
const CATALOG_COLUMNS_NAME: &str = "__catalog_columns";

/// Schema of `__catalog_tables`: one row per table in the database
fn tables_schema() -> Schema {
    Schema::new(vec![
        Column::new("table_id".to_string(), ColumnType::Integer, 0, false),
        Column::new("table_name".to_string(), ColumnType::Varchar, 64, false),
        Column::new("first_page_id".to_string(), ColumnType::Integer, 0, false),
    ])
}

/// Schema of `__catalog_columns`: one row per column of every table
fn columns_schema() -> Schema {
    Schema::new(vec![
        Column::new("table_id".to_string(), ColumnType::Integer, 0, false),
        Column::new("column_name".to_string(), ColumnType::Varchar, 64, false),
        Column::new("column_type".to_string(), ColumnType::Integer, 0, false),
        Column::new("column_length".to_string(), ColumnType::Integer, 0, false),
        Column::new("column_index".to_string(), ColumnType::Integer, 0, false),
    ])
}

/// Metadata manager. The database describes its own tables: two system
/// heaps hold one row per table and one row per column, the header page
/// points at the first of them, and a reopened file rebuilds every
/// TableHeap and Schema from those rows alone.
pub struct Catalog {
    pool: Arc<Mutex<BufferPoolManager>>,
    free_space: Arc<FreeSpaceManager>,
    tables_heap: TableHeap,
    columns_heap: TableHeap,
    table_names: HashMap<String, TableId>,
    tables: HashMap<TableId, TableHeap>,
    schemas: HashMap<TableId, Schema>,
    next_table_id: TableId,
}

impl Catalog {
    /// Open the catalog, bootstrapping the system tables on a fresh file
    /// and loading them on an existing one
    pub fn open(
        pool: Arc<Mutex<BufferPoolManager>>,
        free_space: Arc<FreeSpaceManager>,
    ) -> CatalogResult<Self> {
        free_space.initialize()?;

        let catalog_root = {
            let mut pool = pool.lock().unwrap();
            let frame_id = pool.fetch_page(HEADER_PAGE_ID)?;
            let (valid, root) = {
                let header = DbHeader::new(pool.frame_data_mut(frame_id));
                (header.is_valid(), header.catalog_root())
            };
            pool.unpin_page(HEADER_PAGE_ID, false)?;
            if !valid {
                return Err(CatalogError::Corrupt("invalid header magic".to_string()));
            }
            root
        };

        if catalog_root == INVALID_PAGE_ID {
            Self::bootstrap(pool, free_space)
        } else {
            Self::load(pool, free_space, catalog_root)
        }
    }

    /// First open of a fresh file: create both system heaps and make them
    /// describe themselves
    fn bootstrap(
        pool: Arc<Mutex<BufferPoolManager>>,
        free_space: Arc<FreeSpaceManager>,
    ) -> CatalogResult<Self> {
        let tables_root = create_table_page(&pool, &free_space)?;
        let columns_root = create_table_page(&pool, &free_space)?;

        {
            let mut pool = pool.lock().unwrap();
            let frame_id = pool.fetch_page(HEADER_PAGE_ID)?;
            DbHeader::new(pool.frame_data_mut(frame_id)).set_catalog_root(tables_root);
            pool.unpin_page(HEADER_PAGE_ID, true)?;
        }

        let mut tables_heap = TableHeap::new(pool.clone(), Some(free_space.clone()), tables_root);
        let mut columns_heap = TableHeap::new(pool.clone(), Some(free_space.clone()), columns_root);

        let ts = tables_schema();
        let cs = columns_schema();
        insert_table_row(
            &mut tables_heap,
            &ts,
            CATALOG_TABLES_ID,
            CATALOG_TABLES_NAME,
            tables_root,
        )?;
        insert_table_row(
            &mut tables_heap,
            &ts,
            CATALOG_COLUMNS_ID,
            CATALOG_COLUMNS_NAME,
            columns_root,
        )?;
        insert_column_rows(&mut columns_heap, &cs, CATALOG_TABLES_ID, &ts)?;
        insert_column_rows(&mut columns_heap, &cs, CATALOG_COLUMNS_ID, &cs)?;

        info!(
            "bootstrapped fresh catalog (tables root {}, columns root {})",
            tables_root, columns_root
        );

        Ok(Self {
            pool,
            free_space,
            tables_heap,
            columns_heap,
            table_names: HashMap::new(),
            tables: HashMap::new(),
            schemas: HashMap::new(),
            next_table_id: FIRST_USER_TABLE_ID,
        })
    }

    /// Reopen an existing file: rebuild the in-memory maps from the system
    /// tables
    fn load(
        pool: Arc<Mutex<BufferPoolManager>>,
        free_space: Arc<FreeSpaceManager>,
        catalog_root: PageId,
    ) -> CatalogResult<Self> {
        let ts = tables_schema();
        let cs = columns_schema();

        let tables_heap = TableHeap::new(pool.clone(), Some(free_space.clone()), catalog_root);

        let mut columns_root = INVALID_PAGE_ID;
        let mut user_tables = Vec::new();
        for item in tables_heap.iter() {
            let (_, bytes) = item?;
            let row = ts.deserialize_record(&bytes)?;
            let (table_id, name, first_page_id) = match row.as_slice() {
                [Value::Integer(id), Value::Varchar(name), Value::Integer(first)] => {
                    (*id, name.clone(), *first)
                }
                _ => {
                    return Err(CatalogError::Corrupt(
                        "malformed row in __catalog_tables".to_string(),
                    ))
                }
            };
            if table_id == CATALOG_COLUMNS_ID {
                columns_root = first_page_id;
            }
            if table_id >= FIRST_USER_TABLE_ID {
                user_tables.push((table_id, name, first_page_id));
            }
        }
        if columns_root == INVALID_PAGE_ID {
            return Err(CatalogError::Corrupt(
                "__catalog_columns is missing".to_string(),
            ));
        }

        let columns_heap = TableHeap::new(pool.clone(), Some(free_space.clone()), columns_root);

        let mut columns_by_table: HashMap<TableId, Vec<(i32, Column)>> = HashMap::new();
        for item in columns_heap.iter() {
            let (_, bytes) = item?;
            let row = cs.deserialize_record(&bytes)?;
            let (table_id, name, type_tag, length, index) = match row.as_slice() {
                [Value::Integer(id), Value::Varchar(name), Value::Integer(tag), Value::Integer(len), Value::Integer(idx)] => {
                    (*id, name.clone(), *tag, *len, *idx)
                }
                _ => {
                    return Err(CatalogError::Corrupt(
                        "malformed row in __catalog_columns".to_string(),
                    ))
                }
            };
            let column_type = ColumnType::from_tag(type_tag).ok_or_else(|| {
                CatalogError::Corrupt(format!("unknown column type tag {}", type_tag))
            })?;
            columns_by_table
                .entry(table_id)
                .or_default()
                .push((index, Column::new(name, column_type, length as usize, true)));
        }

        let mut table_names = HashMap::new();
        let mut tables = HashMap::new();
        let mut schemas = HashMap::new();
        let mut next_table_id = FIRST_USER_TABLE_ID;
        for (table_id, name, first_page_id) in user_tables {
            let mut columns = columns_by_table.remove(&table_id).unwrap_or_default();
            columns.sort_by_key(|(index, _)| *index);
            let schema = Schema::new(columns.into_iter().map(|(_, column)| column).collect());
            table_names.insert(name, table_id);
            tables.insert(
                table_id,
                TableHeap::new(pool.clone(), Some(free_space.clone()), first_page_id),
            );
            schemas.insert(table_id, schema);
            if table_id >= next_table_id {
                next_table_id = table_id + 1;
            }
        }

        info!("loaded catalog with {} user table(s)", tables.len());

        Ok(Self {
            pool,
            free_space,
            tables_heap,
            columns_heap,
            table_names,
            tables,
            schemas,
            next_table_id,
        })
    }

    /// Create a user table. The metadata rows are persisted before the
    /// table becomes visible; on failure the allocated page is released and
    /// nothing is published.
    pub fn create_table(&mut self, name: &str, schema: Schema) -> CatalogResult<&mut TableHeap> {
        if name == CATALOG_TABLES_NAME
            || name == CATALOG_COLUMNS_NAME
            || self.table_names.contains_key(name)
        {
            return Err(CatalogError::DuplicateTable(name.to_string()));
        }

        let first_page_id = create_table_page(&self.pool, &self.free_space)?;
        let table_id = self.next_table_id;

        if let Err(e) = self.persist_table(table_id, name, first_page_id, &schema) {
            {
                let mut pool = self.pool.lock().unwrap();
                let _ = pool.delete_page(first_page_id);
            }
            let _ = self.free_space.deallocate_page(first_page_id);
            return Err(e);
        }

        self.next_table_id += 1;
        self.table_names.insert(name.to_string(), table_id);
        self.schemas.insert(table_id, schema);
        let heap = TableHeap::new(
            self.pool.clone(),
            Some(self.free_space.clone()),
            first_page_id,
        );
        info!(
            "created table {} (id {}, first page {})",
            name, table_id, first_page_id
        );
        Ok(self.tables.entry(table_id).or_insert(heap))
    }

    pub fn get_table(&mut self, name: &str) -> Option<&mut TableHeap> {
        let table_id = *self.table_names.get(name)?;
        self.tables.get_mut(&table_id)
    }

    pub fn get_schema(&self, name: &str) -> Option<&Schema> {
        let table_id = *self.table_names.get(name)?;
        self.schemas.get(&table_id)
    }

    fn persist_table(
        &mut self,
        table_id: TableId,
        name: &str,
        first_page_id: PageId,
        schema: &Schema,
    ) -> CatalogResult<()> {
        let ts = tables_schema();
        let cs = columns_schema();
        insert_table_row(&mut self.tables_heap, &ts, table_id, name, first_page_id)?;
        insert_column_rows(&mut self.columns_heap, &cs, table_id, schema)?;
        Ok(())
    }
}

/// Allocate and format one empty table page, returning its id
fn create_table_page(
    pool: &Arc<Mutex<BufferPoolManager>>,
    free_space: &Arc<FreeSpaceManager>,
) -> CatalogResult<PageId> {
    let page_id = free_space.allocate_page()?;
    let mut pool_guard = pool.lock().unwrap();
    let frame_id = match pool_guard.new_page(page_id) {
        Ok(frame_id) => frame_id,
        Err(e) => {
            drop(pool_guard);
            let _ = free_space.deallocate_page(page_id);
            return Err(e.into());
        }
    };
    {
        let mut page = TablePage::new(pool_guard.frame_data_mut(frame_id));
        page.init();
    }
    pool_guard.unpin_page(page_id, true)?;
    Ok(page_id)
}

fn insert_table_row(
    heap: &mut TableHeap,
    schema: &Schema,
    table_id: TableId,
    name: &str,
    first_page_id: PageId,
) -> CatalogResult<()> {
    let row = schema.serialize_record(&[
        Value::Integer(table_id),
        Value::Varchar(name.to_string()),
        Value::Integer(first_page_id),
    ])?;
    heap.insert_record(&row)?;
    Ok(())
}

fn insert_column_rows(
    heap: &mut TableHeap,
    catalog_schema: &Schema,
    table_id: TableId,
    table_schema: &Schema,
) -> CatalogResult<()> {
    for (index, column) in table_schema.columns().iter().enumerate() {
        let row = catalog_schema.serialize_record(&[
            Value::Integer(table_id),
            Value::Varchar(column.name().to_string()),
            Value::Integer(column.column_type().to_tag()),
            Value::Integer(column.max_length() as i32),
            Value::Integer(index as i32),
        ])?;
        heap.insert_record(&row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::DiskManager;
    use tempfile::TempDir;

    fn open_catalog(temp_dir: &TempDir) -> Catalog {
        let disk = DiskManager::open(temp_dir.path().join("test.db")).unwrap();
        let pool = Arc::new(Mutex::new(BufferPoolManager::new(10, disk)));
        let free_space = Arc::new(FreeSpaceManager::new(pool.clone()));
        Catalog::open(pool, free_space).unwrap()
    }

    fn users_schema() -> Schema {
        Schema::new(vec![
            Column::new("id".to_string(), ColumnType::Integer, 0, true),
            Column::new("name".to_string(), ColumnType::Varchar, 50, true),
            Column::new("age".to_string(), ColumnType::Integer, 0, true),
        ])
    }

    #[test]
    fn test_bootstrap_places_system_tables_on_pages_two_and_three() {
        let temp_dir = tempfile::tempdir().unwrap();
        let catalog = open_catalog(&temp_dir);
        assert_eq!(catalog.tables_heap.first_page_id(), 2);
        assert_eq!(catalog.columns_heap.first_page_id(), 3);
    }

    #[test]
    fn test_create_and_lookup_table() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut catalog = open_catalog(&temp_dir);

        let heap = catalog.create_table("users", users_schema()).unwrap();
        assert_eq!(heap.first_page_id(), 4);

        assert!(catalog.get_table("users").is_some());
        assert_eq!(catalog.get_schema("users"), Some(&users_schema()));
        assert!(catalog.get_table("missing").is_none());
        assert!(catalog.get_schema("missing").is_none());
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut catalog = open_catalog(&temp_dir);

        catalog.create_table("users", users_schema()).unwrap();
        let result = catalog.create_table("users", users_schema());
        assert!(matches!(result, Err(CatalogError::DuplicateTable(_))));
    }

    #[test]
    fn test_system_table_names_are_reserved() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut catalog = open_catalog(&temp_dir);

        let result = catalog.create_table(CATALOG_TABLES_NAME, users_schema());
        assert!(matches!(result, Err(CatalogError::DuplicateTable(_))));
        let result = catalog.create_table(CATALOG_COLUMNS_NAME, users_schema());
        assert!(matches!(result, Err(CatalogError::DuplicateTable(_))));
    }

    #[test]
    fn test_schemas_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();

        {
            let mut catalog = open_catalog(&temp_dir);
            catalog.create_table("users", users_schema()).unwrap();
            catalog
                .create_table(
                    "products",
                    Schema::new(vec![
                        Column::new("product_id".to_string(), ColumnType::Integer, 0, true),
                        Column::new("product_name".to_string(), ColumnType::Varchar, 100, true),
                        Column::new("price".to_string(), ColumnType::Integer, 0, true),
                    ]),
                )
                .unwrap();
        }

        let mut catalog = open_catalog(&temp_dir);
        assert!(catalog.get_table("users").is_some());
        assert!(catalog.get_table("products").is_some());
        assert_eq!(catalog.get_schema("users"), Some(&users_schema()));

        let products = catalog.get_schema("products").unwrap();
        assert_eq!(products.column_count(), 3);
        assert_eq!(products.column(0).unwrap().name(), "product_id");
        assert_eq!(products.column(1).unwrap().name(), "product_name");
        assert_eq!(products.column(1).unwrap().max_length(), 100);
        assert_eq!(
            products.column(2).unwrap().column_type(),
            ColumnType::Integer
        );
    }

    #[test]
    fn test_rows_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let schema = users_schema();

        let rid = {
            let mut catalog = open_catalog(&temp_dir);
            let heap = catalog.create_table("users", schema.clone()).unwrap();
            let row = schema
                .serialize_record(&[
                    Value::Integer(1),
                    Value::Varchar("Alice".to_string()),
                    Value::Integer(25),
                ])
                .unwrap();
            heap.insert_record(&row).unwrap()
        };

        let mut catalog = open_catalog(&temp_dir);
        let heap = catalog.get_table("users").unwrap();
        let bytes = heap.get_record(rid).unwrap();
        assert_eq!(
            schema.deserialize_record(&bytes).unwrap(),
            vec![
                Value::Integer(1),
                Value::Varchar("Alice".to_string()),
                Value::Integer(25),
            ]
        );
    }

    #[test]
    fn test_new_tables_after_reopen_get_fresh_ids() {
        let temp_dir = tempfile::tempdir().unwrap();

        {
            let mut catalog = open_catalog(&temp_dir);
            catalog.create_table("first", users_schema()).unwrap();
        }

        let mut catalog = open_catalog(&temp_dir);
        assert_eq!(catalog.next_table_id, FIRST_USER_TABLE_ID + 1);
        catalog.create_table("second", users_schema()).unwrap();
        assert!(catalog.get_table("first").is_some());
        assert!(catalog.get_table("second").is_some());
    }
}
