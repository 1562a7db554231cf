// MySQL adapter - connection, INFORMATION_SCHEMA reflection and chart queries
use crate::application::errors::IntrospectionError;
use crate::application::schema_source::{DatabaseConnector, ExternalDatabase};
use crate::domain::chart::ChartPoint;
use crate::domain::datasource::{ConnectionParams, DatabaseKind};
use crate::domain::schema::{ColumnSchema, TableSchema};
use anyhow::Context;
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, Row, Value};

const REFLECT_SQL: &str = "SELECT t.TABLE_NAME, c.COLUMN_NAME, c.DATA_TYPE \
     FROM INFORMATION_SCHEMA.TABLES t \
     LEFT JOIN INFORMATION_SCHEMA.COLUMNS c \
       ON c.TABLE_SCHEMA = t.TABLE_SCHEMA AND c.TABLE_NAME = t.TABLE_NAME \
     WHERE t.TABLE_SCHEMA = DATABASE() AND t.TABLE_TYPE = 'BASE TABLE' \
     ORDER BY t.TABLE_NAME, c.ORDINAL_POSITION";

#[derive(Debug, Clone, Default)]
pub struct MySqlConnector;

#[async_trait]
impl DatabaseConnector for MySqlConnector {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }

    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn ExternalDatabase>, IntrospectionError> {
        let opts = Opts::from_url(&params.connection_url())
            .map_err(|e| IntrospectionError::Connection(e.to_string()))?;
        let conn = Conn::new(opts)
            .await
            .map_err(|e| IntrospectionError::Connection(e.to_string()))?;
        Ok(Box::new(MySqlDatabase { conn }))
    }
}

pub struct MySqlDatabase {
    conn: Conn,
}

#[async_trait]
impl ExternalDatabase for MySqlDatabase {
    async fn reflect(&mut self) -> anyhow::Result<Vec<TableSchema>> {
        let rows: Vec<(String, Option<String>, Option<String>)> = self
            .conn
            .query(REFLECT_SQL)
            .await
            .context("Failed to read INFORMATION_SCHEMA")?;
        Ok(group_columns(rows))
    }

    async fn query_points(&mut self, sql: &str) -> anyhow::Result<Vec<ChartPoint>> {
        let rows: Vec<Row> = self.conn.query(sql).await.context("Chart query failed")?;
        rows.into_iter().map(point_from_row).collect()
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

/// Fold ordered (table, column, type) rows into tables. A table without
/// columns comes back as a single row with NULL column fields.
fn group_columns(rows: Vec<(String, Option<String>, Option<String>)>) -> Vec<TableSchema> {
    let mut tables: Vec<TableSchema> = Vec::new();
    for (table, column, data_type) in rows {
        if tables.last().map(|t| t.name != table).unwrap_or(true) {
            tables.push(TableSchema::new(table, Vec::new()));
        }
        if let (Some(column), Some(data_type), Some(current)) = (column, data_type, tables.last_mut()) {
            current.columns.push(ColumnSchema::new(column, data_type));
        }
    }
    tables
}

fn point_from_row(row: Row) -> anyhow::Result<ChartPoint> {
    let mut values = row.unwrap();
    if values.len() != 2 {
        anyhow::bail!("chart query returned {} columns, expected 2", values.len());
    }
    let value = values.pop().unwrap_or(Value::NULL);
    let category = values.pop().unwrap_or(Value::NULL);
    Ok(ChartPoint::new(category_text(category), numeric_value(value)?))
}

fn category_text(value: Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        other => Some(other.as_sql(true).trim_matches('\'').to_string()),
    }
}

fn numeric_value(value: Value) -> anyhow::Result<Option<f64>> {
    Ok(match value {
        Value::NULL => None,
        Value::Int(i) => Some(i as f64),
        Value::UInt(u) => Some(u as f64),
        Value::Float(f) => Some(f as f64),
        Value::Double(d) => Some(d),
        Value::Bytes(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            Some(
                text.trim()
                    .parse::<f64>()
                    .with_context(|| format!("aggregate value {} is not numeric", text))?,
            )
        }
        other => anyhow::bail!("unexpected aggregate value {:?}", other),
    })
}
