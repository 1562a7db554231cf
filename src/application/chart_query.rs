// Grouped aggregation query for column charts
use crate::application::schema_source::ExternalDatabase;
use crate::domain::chart::{AggregateFunction, Chart, ChartPoint};

/// `SELECT x, AGGR(y) FROM table GROUP BY x ORDER BY x`.
///
/// Groups come back in ascending order of the x-axis value, using the
/// external database's collation; a NULL group sorts first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuery {
    pub table: String,
    pub x_axis: String,
    pub y_axis: String,
    pub aggr_func: AggregateFunction,
}

impl AggregateQuery {
    /// `None` until the chart has a table and axes.
    pub fn for_chart(chart: &Chart) -> Option<Self> {
        let table = chart.table_name.as_ref()?;
        let axes = chart.axes.as_ref()?;
        Some(Self {
            table: table.clone(),
            x_axis: axes.x_axis.clone(),
            y_axis: axes.y_axis.clone(),
            aggr_func: axes.aggr_func,
        })
    }

    pub fn to_sql(&self) -> String {
        let x = quote_identifier(&self.x_axis);
        format!(
            "SELECT {x}, {func}({y}) FROM {table} GROUP BY {x} ORDER BY {x}",
            func = self.aggr_func.sql_name(),
            y = quote_identifier(&self.y_axis),
            table = quote_identifier(&self.table),
        )
    }

    pub async fn run(&self, db: &mut dyn ExternalDatabase) -> anyhow::Result<Vec<ChartPoint>> {
        let sql = self.to_sql();
        tracing::debug!(%sql, "running chart query");
        db.query_points(&sql).await
    }
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::schema_source::DatabaseConnector;
    use crate::infrastructure::sqlite_fixture::SqliteFixture;

    fn query(func: AggregateFunction) -> AggregateQuery {
        AggregateQuery {
            table: "orders".to_string(),
            x_axis: "region".to_string(),
            y_axis: "amount".to_string(),
            aggr_func: func,
        }
    }

    async fn run(query: &AggregateQuery) -> anyhow::Result<Vec<(Option<String>, Option<f64>)>> {
        let fixture = SqliteFixture::orders();
        let mut db = fixture.connect(&fixture.params()).await.unwrap();
        let points = query.run(db.as_mut()).await?;
        Ok(points.into_iter().map(|p| (p.category, p.value)).collect())
    }

    fn pair(category: &str, value: f64) -> (Option<String>, Option<f64>) {
        (Some(category.to_string()), Some(value))
    }

    #[test]
    fn test_sql_text() {
        assert_eq!(
            query(AggregateFunction::Sum).to_sql(),
            "SELECT `region`, SUM(`amount`) FROM `orders` GROUP BY `region` ORDER BY `region`"
        );
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let q = AggregateQuery {
            table: "odd`name".to_string(),
            ..query(AggregateFunction::Count)
        };
        assert!(q.to_sql().contains("FROM `odd``name`"));
    }

    #[tokio::test]
    async fn test_sum_groups_and_orders_by_category() {
        let points = run(&query(AggregateFunction::Sum)).await.unwrap();
        assert_eq!(points, vec![pair("east", 7.0), pair("west", 15.0)]);
    }

    #[tokio::test]
    async fn test_other_aggregations() {
        assert_eq!(
            run(&query(AggregateFunction::Avg)).await.unwrap(),
            vec![pair("east", 7.0), pair("west", 7.5)]
        );
        assert_eq!(
            run(&query(AggregateFunction::Count)).await.unwrap(),
            vec![pair("east", 1.0), pair("west", 2.0)]
        );
        assert_eq!(
            run(&query(AggregateFunction::Max)).await.unwrap(),
            vec![pair("east", 7.0), pair("west", 10.0)]
        );
        assert_eq!(
            run(&query(AggregateFunction::Min)).await.unwrap(),
            vec![pair("east", 7.0), pair("west", 5.0)]
        );
    }

    #[tokio::test]
    async fn test_null_category_sorts_first() {
        let fixture = SqliteFixture::orders();
        fixture.execute("INSERT INTO orders (id, region, amount) VALUES (9, NULL, 4);");
        let mut db = fixture.connect(&fixture.params()).await.unwrap();

        let points = query(AggregateFunction::Sum).run(db.as_mut()).await.unwrap();
        assert_eq!(
            points,
            vec![
                ChartPoint::new(None, Some(4.0)),
                ChartPoint::new(Some("east".to_string()), Some(7.0)),
                ChartPoint::new(Some("west".to_string()), Some(15.0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_column_fails() {
        let q = AggregateQuery {
            y_axis: "dropped".to_string(),
            ..query(AggregateFunction::Sum)
        };
        assert!(run(&q).await.is_err());
    }
}
