// In-memory SQLite stand-in for the external database, used by tests
use crate::application::errors::IntrospectionError;
use crate::application::schema_source::{DatabaseConnector, ExternalDatabase};
use crate::domain::chart::ChartPoint;
use crate::domain::datasource::{ConnectionParams, DatabaseKind};
use crate::domain::schema::{ColumnSchema, TableSchema};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const ORDERS_SQL: &str = r#"
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        region VARCHAR(20),
        placed_at DATETIME,
        amount DECIMAL(10,2),
        customer TEXT,
        receipt BLOB
    );
    INSERT INTO orders (id, region, placed_at, amount, customer) VALUES
        (1, 'west', '2024-01-02 10:00:00', 10, 'acme'),
        (2, 'west', '2024-01-03 11:30:00', 5, 'globex'),
        (3, 'east', '2024-01-04 09:15:00', 7, 'acme');
    CREATE TABLE regions (name VARCHAR(20));
    CREATE TABLE audit_log (at DATETIME);
"#;

#[derive(Clone)]
pub struct SqliteFixture {
    conn: Arc<Mutex<Connection>>,
    refuse: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
    reflections: Arc<AtomicUsize>,
}

impl SqliteFixture {
    /// An `orders` table with rows (west,10), (west,5), (east,7), plus
    /// a string-only table and a table with no usable columns.
    pub fn orders() -> Self {
        let conn = Connection::open_in_memory().expect("open in-memory sqlite");
        conn.execute_batch(ORDERS_SQL).expect("seed fixture");
        Self {
            conn: Arc::new(Mutex::new(conn)),
            refuse: Arc::new(AtomicBool::new(false)),
            connects: Arc::new(AtomicUsize::new(0)),
            reflections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn params(&self) -> ConnectionParams {
        ConnectionParams {
            kind: DatabaseKind::MySql,
            host: "fixture.local".to_string(),
            dbname: "shop".to_string(),
            username: "report".to_string(),
            password: "secret".to_string(),
        }
    }

    pub fn connector(&self) -> Arc<dyn DatabaseConnector> {
        Arc::new(self.clone())
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn execute(&self, sql: &str) {
        self.conn.lock().unwrap().execute_batch(sql).expect("fixture sql");
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn reflections(&self) -> usize {
        self.reflections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseConnector for SqliteFixture {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }

    async fn connect(
        &self,
        _params: &ConnectionParams,
    ) -> Result<Box<dyn ExternalDatabase>, IntrospectionError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(IntrospectionError::Connection(
                "Access denied for user 'report'".to_string(),
            ));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ExternalDatabase for SqliteFixture {
    async fn reflect(&mut self) -> anyhow::Result<Vec<TableSchema>> {
        self.reflections.fetch_add(1, Ordering::SeqCst);
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = Vec::new();
        for name in names {
            let mut info = conn.prepare(&format!("PRAGMA table_info(\"{}\")", name))?;
            let columns = info
                .query_map([], |row| {
                    Ok(ColumnSchema::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            tables.push(TableSchema::new(name, columns));
        }
        Ok(tables)
    }

    async fn query_points(&mut self, sql: &str) -> anyhow::Result<Vec<ChartPoint>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let points = stmt
            .query_map([], |row| Ok(ChartPoint::new(row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(points)
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}
