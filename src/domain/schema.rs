// Schema domain models - reflected tables and measure/dimension classification
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a column can be used when building a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Measure,
    Dimension,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Declared type as reported by the database, e.g. `int`, `varchar`.
    pub data_type: String,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    pub fn role(&self) -> ColumnRole {
        classify(&self.data_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

/// Map a declared column type onto a chart role.
///
/// Integer and exact/approximate numeric types are measures, the character
/// family (including `enum` and `set`) are dimensions, everything else
/// (temporal, binary, `bit`, `json`, spatial) is left out of both.
pub fn classify(data_type: &str) -> ColumnRole {
    // "int(11) unsigned" -> "int"
    let base = data_type
        .trim()
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match base.as_str() {
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "decimal"
        | "numeric" | "dec" | "fixed" | "float" | "double" | "real" => ColumnRole::Measure,
        "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum"
        | "set" => ColumnRole::Dimension,
        _ => ColumnRole::Ignored,
    }
}

/// The cached result of introspecting one datasource.
///
/// The three mappings are only ever built together by [`IntrospectedSchema::from_tables`]
/// or restored together from storage, so every table key is present in all of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntrospectedSchema {
    pub tables: BTreeMap<String, TableSchema>,
    pub measures: BTreeMap<String, Vec<String>>,
    pub dimensions: BTreeMap<String, Vec<String>>,
}

impl IntrospectedSchema {
    pub fn from_tables(tables: Vec<TableSchema>) -> Self {
        let mut schema = Self::default();

        for table in tables {
            let mut measures = Vec::new();
            let mut dimensions = Vec::new();
            for column in &table.columns {
                match column.role() {
                    ColumnRole::Measure => measures.push(column.name.clone()),
                    ColumnRole::Dimension => dimensions.push(column.name.clone()),
                    ColumnRole::Ignored => {}
                }
            }
            schema.measures.insert(table.name.clone(), measures);
            schema.dimensions.insert(table.name.clone(), dimensions);
            schema.tables.insert(table.name.clone(), table);
        }

        schema
    }

    /// Rebuild from the three stored mappings, rejecting mappings that disagree.
    pub fn from_parts(
        tables: BTreeMap<String, TableSchema>,
        measures: BTreeMap<String, Vec<String>>,
        dimensions: BTreeMap<String, Vec<String>>,
    ) -> Option<Self> {
        let schema = Self {
            tables,
            measures,
            dimensions,
        };
        schema.is_consistent().then_some(schema)
    }

    pub fn is_consistent(&self) -> bool {
        self.tables.len() == self.measures.len()
            && self.tables.len() == self.dimensions.len()
            && self
                .tables
                .keys()
                .all(|name| self.measures.contains_key(name) && self.dimensions.contains_key(name))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn has_table(&self, table_name: &str) -> bool {
        self.tables.contains_key(table_name)
    }

    pub fn measures_of(&self, table_name: &str) -> &[String] {
        self.measures.get(table_name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn dimensions_of(&self, table_name: &str) -> &[String] {
        self.dimensions
            .get(table_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Per-table measures and dimensions, sorted by table name.
    pub fn layout(&self) -> Vec<TableLayout> {
        self.tables
            .keys()
            .map(|name| TableLayout {
                table: name.clone(),
                measures: self.measures_of(name).to_vec(),
                dimensions: self.dimensions_of(name).to_vec(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLayout {
    pub table: String,
    pub measures: Vec<String>,
    pub dimensions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_table() -> TableSchema {
        TableSchema::new(
            "orders",
            vec![
                ColumnSchema::new("id", "int"),
                ColumnSchema::new("region", "varchar"),
                ColumnSchema::new("placed_at", "datetime"),
                ColumnSchema::new("amount", "decimal(10,2)"),
                ColumnSchema::new("note", "text"),
                ColumnSchema::new("paid", "bit"),
            ],
        )
    }

    #[test]
    fn test_classify_by_declared_type() {
        assert_eq!(classify("int"), ColumnRole::Measure);
        assert_eq!(classify("BIGINT UNSIGNED"), ColumnRole::Measure);
        assert_eq!(classify("decimal(10,2)"), ColumnRole::Measure);
        assert_eq!(classify("double"), ColumnRole::Measure);
        assert_eq!(classify("varchar(255)"), ColumnRole::Dimension);
        assert_eq!(classify("longtext"), ColumnRole::Dimension);
        assert_eq!(classify("enum"), ColumnRole::Dimension);
        assert_eq!(classify("enum('open','closed')"), ColumnRole::Dimension);
        assert_eq!(classify("set"), ColumnRole::Dimension);
        assert_eq!(classify("varbinary(16)"), ColumnRole::Ignored);
        assert_eq!(classify("date"), ColumnRole::Ignored);
        assert_eq!(classify("timestamp"), ColumnRole::Ignored);
        assert_eq!(classify("blob"), ColumnRole::Ignored);
        assert_eq!(classify("bit"), ColumnRole::Ignored);
        assert_eq!(classify(""), ColumnRole::Ignored);
    }

    #[test]
    fn test_from_tables_preserves_column_order() {
        let schema = IntrospectedSchema::from_tables(vec![orders_table()]);

        assert_eq!(schema.measures_of("orders"), ["id", "amount"]);
        assert_eq!(schema.dimensions_of("orders"), ["region", "note"]);
    }

    #[test]
    fn test_every_table_has_both_entries() {
        let schema = IntrospectedSchema::from_tables(vec![
            orders_table(),
            TableSchema::new("empty", vec![]),
            TableSchema::new("events", vec![ColumnSchema::new("at", "datetime")]),
        ]);

        assert!(schema.is_consistent());
        assert_eq!(schema.table_names(), ["empty", "events", "orders"]);
        assert!(schema.measures_of("empty").is_empty());
        assert!(schema.dimensions_of("events").is_empty());
        assert!(schema.measures.contains_key("events"));
    }

    #[test]
    fn test_from_parts_rejects_mismatched_mappings() {
        let full = IntrospectedSchema::from_tables(vec![orders_table()]);
        let mut measures = full.measures.clone();
        measures.remove("orders");

        assert!(IntrospectedSchema::from_parts(full.tables.clone(), measures, full.dimensions.clone()).is_none());
        assert_eq!(
            IntrospectedSchema::from_parts(full.tables.clone(), full.measures.clone(), full.dimensions.clone()),
            Some(full)
        );
    }

    #[test]
    fn test_layout_is_sorted_by_table() {
        let schema = IntrospectedSchema::from_tables(vec![
            orders_table(),
            TableSchema::new("customers", vec![ColumnSchema::new("name", "varchar")]),
        ]);

        let layout = schema.layout();
        assert_eq!(layout[0].table, "customers");
        assert_eq!(layout[0].dimensions, ["name"]);
        assert_eq!(layout[1].table, "orders");
    }
}
