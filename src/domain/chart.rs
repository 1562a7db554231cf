// Chart domain model
use crate::domain::datasource::DatasourceId;
use crate::domain::schema::IntrospectedSchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ChartId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Avg,
    Count,
    Max,
    Min,
    Sum,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 5] = [
        AggregateFunction::Avg,
        AggregateFunction::Count,
        AggregateFunction::Max,
        AggregateFunction::Min,
        AggregateFunction::Sum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "avg",
            AggregateFunction::Count => "count",
            AggregateFunction::Max => "max",
            AggregateFunction::Min => "min",
            AggregateFunction::Sum => "sum",
        }
    }

    pub fn sql_name(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Sum => "SUM",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown aggregation function: {}", s))
    }
}

/// Axis selection for a column chart. Set together, reset together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartAxes {
    pub x_axis: String,
    pub y_axis: String,
    pub aggr_func: AggregateFunction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxesRejection {
    TableNotSelected,
    UnknownTable(String),
    NotADimension(String),
    NotAMeasure(String),
}

impl fmt::Display for AxesRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxesRejection::TableNotSelected => write!(f, "select a table before choosing axes"),
            AxesRejection::UnknownTable(t) => write!(f, "table {} is not part of the datasource", t),
            AxesRejection::NotADimension(c) => write!(f, "column {} is not a dimension", c),
            AxesRejection::NotAMeasure(c) => write!(f, "column {} is not a measure", c),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub id: ChartId,
    pub owner: String,
    pub name: String,
    pub datasource_id: DatasourceId,
    pub table_name: Option<String>,
    pub axes: Option<ChartAxes>,
    pub time_created: DateTime<Utc>,
}

impl Chart {
    /// Select the table; a different table invalidates the previous axes.
    /// Returns true when the axes were reset.
    pub fn select_table(&mut self, table_name: String) -> bool {
        if self.table_name.as_deref() == Some(table_name.as_str()) {
            return false;
        }
        self.table_name = Some(table_name);
        self.axes.take().is_some()
    }

    pub fn check_axes(
        &self,
        schema: &IntrospectedSchema,
        axes: &ChartAxes,
    ) -> Result<(), AxesRejection> {
        let table = self
            .table_name
            .as_deref()
            .ok_or(AxesRejection::TableNotSelected)?;
        if !schema.has_table(table) {
            return Err(AxesRejection::UnknownTable(table.to_string()));
        }
        if !schema.dimensions_of(table).contains(&axes.x_axis) {
            return Err(AxesRejection::NotADimension(axes.x_axis.clone()));
        }
        if !schema.measures_of(table).contains(&axes.y_axis) {
            return Err(AxesRejection::NotAMeasure(axes.y_axis.clone()));
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.table_name.is_some() && self.axes.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewChart {
    pub owner: String,
    pub name: String,
    pub datasource_id: DatasourceId,
}

/// One bar of a column chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub category: Option<String>,
    pub value: Option<f64>,
}

impl ChartPoint {
    pub fn new(category: Option<String>, value: Option<f64>) -> Self {
        Self { category, value }
    }
}
