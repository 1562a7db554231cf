// SQLite metadata store for datasource and chart records
use crate::application::repositories::{ChartRepository, DatasourceRepository, StoredSchema};
use crate::domain::chart::{AggregateFunction, Chart, ChartAxes, ChartId, NewChart};
use crate::domain::datasource::{ConnectionParams, Datasource, DatasourceId, NewDatasource};
use crate::infrastructure::secret_cipher::SecretCipher;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS datasources (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    owner               TEXT NOT NULL,
    name                TEXT NOT NULL,
    dbtype              TEXT NOT NULL,
    dbname              TEXT NOT NULL,
    dbusername          TEXT NOT NULL,
    dbpassword          TEXT NOT NULL,
    dbhost              TEXT NOT NULL,
    encoded_tables      TEXT,
    encoded_measures    TEXT,
    encoded_dimensions  TEXT,
    time_introspected   TEXT,
    CHECK ((encoded_tables IS NULL) = (encoded_measures IS NULL)
       AND (encoded_tables IS NULL) = (encoded_dimensions IS NULL))
);

CREATE TABLE IF NOT EXISTS charts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    owner           TEXT NOT NULL,
    name            TEXT NOT NULL,
    datasource_id   INTEGER NOT NULL REFERENCES datasources(id) ON DELETE CASCADE,
    table_name      TEXT,
    x_axis          TEXT,
    y_axis          TEXT,
    aggr_func_name  TEXT,
    time_created    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS charts_by_datasource ON charts(datasource_id);
"#;

const DATASOURCE_COLUMNS: &str =
    "id, owner, name, dbtype, dbname, dbusername, dbpassword, dbhost, time_introspected";

const CHART_COLUMNS: &str =
    "id, owner, name, datasource_id, table_name, x_axis, y_axis, aggr_func_name, time_created";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    cipher: SecretCipher,
}

/// A datasource row before the password is decrypted.
struct DatasourceRow {
    id: DatasourceId,
    owner: String,
    name: String,
    dbtype: String,
    dbname: String,
    dbusername: String,
    dbpassword: String,
    dbhost: String,
    time_introspected: Option<String>,
}

impl SqliteStore {
    pub fn open(path: &Path, cipher: SecretCipher) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open metadata store {}", path.display()))?;
        Self::init(conn, cipher)
    }

    pub fn in_memory(cipher: SecretCipher) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, cipher)
    }

    fn init(conn: Connection, cipher: SecretCipher) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to apply metadata store schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("metadata store mutex poisoned"))
    }

    fn hydrate(&self, row: DatasourceRow) -> Result<Datasource> {
        let kind = row
            .dbtype
            .parse()
            .map_err(|_| anyhow::anyhow!("datasource {} has unknown kind {}", row.id, row.dbtype))?;
        let password = self
            .cipher
            .decrypt(&row.dbpassword)
            .with_context(|| format!("Failed to decrypt password of datasource {}", row.id))?;

        Ok(Datasource {
            id: row.id,
            owner: row.owner,
            name: row.name,
            params: ConnectionParams {
                kind,
                host: row.dbhost,
                dbname: row.dbname,
                username: row.dbusername,
                password,
            },
            time_introspected: row.time_introspected.as_deref().map(parse_time).transpose()?,
        })
    }
}

#[async_trait]
impl DatasourceRepository for SqliteStore {
    async fn insert(
        &self,
        datasource: &NewDatasource,
        schema: &StoredSchema,
        introspected_at: DateTime<Utc>,
    ) -> Result<Datasource> {
        let params = &datasource.params;
        let encrypted = self.cipher.encrypt(&params.password)?;
        let introspected = (!schema.is_empty()).then_some(introspected_at);

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO datasources (
               owner, name, dbtype, dbname, dbusername, dbpassword, dbhost,
               encoded_tables, encoded_measures, encoded_dimensions, time_introspected
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                datasource.owner,
                datasource.name,
                params.kind.as_str(),
                params.dbname,
                params.username,
                encrypted,
                params.host,
                schema.tables,
                schema.measures,
                schema.dimensions,
                introspected.map(|t| t.to_rfc3339()),
            ],
        )
        .context("Failed to insert datasource")?;

        Ok(Datasource {
            id: conn.last_insert_rowid(),
            owner: datasource.owner.clone(),
            name: datasource.name.clone(),
            params: params.clone(),
            time_introspected: introspected,
        })
    }

    async fn get(&self, owner: &str, id: DatasourceId) -> Result<Option<Datasource>> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                &format!("SELECT {DATASOURCE_COLUMNS} FROM datasources WHERE owner = ?1 AND id = ?2"),
                params![owner, id],
                parse_datasource_row,
            )
            .optional()?
        };
        row.map(|r| self.hydrate(r)).transpose()
    }

    async fn list(&self, owner: &str) -> Result<Vec<Datasource>> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {DATASOURCE_COLUMNS} FROM datasources WHERE owner = ?1 ORDER BY id"
            ))?;
            stmt.query_map([owner], parse_datasource_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        rows.into_iter().map(|r| self.hydrate(r)).collect()
    }

    async fn update(&self, datasource: &Datasource) -> Result<()> {
        let params = &datasource.params;
        let encrypted = self.cipher.encrypt(&params.password)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE datasources
             SET name = ?1, dbtype = ?2, dbname = ?3, dbusername = ?4, dbpassword = ?5, dbhost = ?6
             WHERE id = ?7 AND owner = ?8",
            params![
                datasource.name,
                params.kind.as_str(),
                params.dbname,
                params.username,
                encrypted,
                params.host,
                datasource.id,
                datasource.owner,
            ],
        )?;
        if changed == 0 {
            anyhow::bail!("datasource {} no longer exists", datasource.id);
        }
        Ok(())
    }

    async fn delete(&self, owner: &str, id: DatasourceId) -> Result<Option<usize>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let charts: i64 = tx.query_row(
            "SELECT COUNT(*) FROM charts WHERE datasource_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        let deleted = tx.execute(
            "DELETE FROM datasources WHERE id = ?1 AND owner = ?2",
            params![id, owner],
        )?;
        tx.commit()?;

        Ok((deleted > 0).then_some(charts as usize))
    }

    async fn load_schema(&self, id: DatasourceId) -> Result<StoredSchema> {
        let conn = self.conn()?;
        let stored = conn
            .query_row(
                "SELECT encoded_tables, encoded_measures, encoded_dimensions FROM datasources WHERE id = ?1",
                [id],
                |row| {
                    Ok(StoredSchema {
                        tables: row.get(0)?,
                        measures: row.get(1)?,
                        dimensions: row.get(2)?,
                    })
                },
            )
            .optional()?;
        stored.ok_or_else(|| anyhow::anyhow!("datasource {} no longer exists", id))
    }

    async fn store_schema(
        &self,
        id: DatasourceId,
        schema: &StoredSchema,
        introspected_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE datasources
             SET encoded_tables = ?1, encoded_measures = ?2, encoded_dimensions = ?3, time_introspected = ?4
             WHERE id = ?5",
            params![
                schema.tables,
                schema.measures,
                schema.dimensions,
                introspected_at.to_rfc3339(),
                id
            ],
        )
        .context("Failed to store introspected schema")?;
        Ok(())
    }
}

#[async_trait]
impl ChartRepository for SqliteStore {
    async fn insert(&self, chart: &NewChart) -> Result<Chart> {
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO charts (owner, name, datasource_id, time_created) VALUES (?1, ?2, ?3, ?4)",
            params![chart.owner, chart.name, chart.datasource_id, now.to_rfc3339()],
        )
        .context("Failed to insert chart")?;

        Ok(Chart {
            id: conn.last_insert_rowid(),
            owner: chart.owner.clone(),
            name: chart.name.clone(),
            datasource_id: chart.datasource_id,
            table_name: None,
            axes: None,
            time_created: now,
        })
    }

    async fn get(&self, owner: &str, id: ChartId) -> Result<Option<Chart>> {
        let conn = self.conn()?;
        let chart = conn
            .query_row(
                &format!("SELECT {CHART_COLUMNS} FROM charts WHERE owner = ?1 AND id = ?2"),
                params![owner, id],
                parse_chart_row,
            )
            .optional()?;
        Ok(chart)
    }

    async fn list(&self, owner: &str) -> Result<Vec<Chart>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHART_COLUMNS} FROM charts WHERE owner = ?1 ORDER BY id"
        ))?;
        let charts = stmt
            .query_map([owner], parse_chart_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(charts)
    }

    async fn update(&self, chart: &Chart) -> Result<()> {
        let axes = chart.axes.as_ref();
        let conn = self.conn()?;
        conn.execute(
            "UPDATE charts SET table_name = ?1, x_axis = ?2, y_axis = ?3, aggr_func_name = ?4
             WHERE id = ?5 AND owner = ?6",
            params![
                chart.table_name,
                axes.map(|a| a.x_axis.as_str()),
                axes.map(|a| a.y_axis.as_str()),
                axes.map(|a| a.aggr_func.as_str()),
                chart.id,
                chart.owner,
            ],
        )?;
        Ok(())
    }

    async fn delete(&self, owner: &str, id: ChartId) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM charts WHERE id = ?1 AND owner = ?2",
            params![id, owner],
        )?;
        Ok(deleted > 0)
    }
}

fn parse_datasource_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DatasourceRow> {
    Ok(DatasourceRow {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        dbtype: row.get(3)?,
        dbname: row.get(4)?,
        dbusername: row.get(5)?,
        dbpassword: row.get(6)?,
        dbhost: row.get(7)?,
        time_introspected: row.get(8)?,
    })
}

fn parse_chart_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chart> {
    let x_axis: Option<String> = row.get(5)?;
    let y_axis: Option<String> = row.get(6)?;
    let aggr_func = row
        .get::<_, Option<String>>(7)?
        .map(|raw| {
            raw.parse::<AggregateFunction>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, e.into())
            })
        })
        .transpose()?;

    let axes = match (x_axis, y_axis, aggr_func) {
        (Some(x_axis), Some(y_axis), Some(aggr_func)) => Some(ChartAxes {
            x_axis,
            y_axis,
            aggr_func,
        }),
        _ => None,
    };

    let time_created: String = row.get(8)?;
    Ok(Chart {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        datasource_id: row.get(3)?,
        table_name: row.get(4)?,
        axes,
        time_created: parse_time(&time_created).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, e.into())
        })?,
    })
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid timestamp {}", raw))?
        .with_timezone(&Utc))
}
