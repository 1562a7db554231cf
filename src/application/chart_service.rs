// Chart service - build charts step by step and render them
use crate::application::chart_query::AggregateQuery;
use crate::application::errors::ChartError;
use crate::application::introspector::SchemaIntrospector;
use crate::application::repositories::{ChartRepository, DatasourceRepository};
use crate::application::schema_cache::SchemaCache;
use crate::domain::chart::{AggregateFunction, Chart, ChartAxes, ChartId, ChartPoint, NewChart};
use crate::domain::datasource::{Datasource, DatasourceId};
use crate::domain::schema::IntrospectedSchema;
use crate::infrastructure::chart_options::ColumnChartOptions;
use std::sync::Arc;

pub const CHART_ERROR_NOTICE: &str = "Uh oh! Error creating chart!";

/// Everything the chart detail page needs.
#[derive(Debug, Clone)]
pub struct ChartView {
    pub chart: Chart,
    pub table_choices: Vec<String>,
    pub axis_choices: Option<AxisChoices>,
    pub column_chart: Option<ColumnChartOptions>,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisChoices {
    pub x_axis: Vec<String>,
    pub y_axis: Vec<String>,
    pub aggr_func: Vec<AggregateFunction>,
}

#[derive(Clone)]
pub struct ChartService {
    charts: Arc<dyn ChartRepository>,
    datasources: Arc<dyn DatasourceRepository>,
    introspector: SchemaIntrospector,
    cache: SchemaCache,
}

impl ChartService {
    pub fn new(
        charts: Arc<dyn ChartRepository>,
        datasources: Arc<dyn DatasourceRepository>,
        introspector: SchemaIntrospector,
        cache: SchemaCache,
    ) -> Self {
        Self {
            charts,
            datasources,
            introspector,
            cache,
        }
    }

    /// Step one: a name and one of the owner's datasources.
    pub async fn create(
        &self,
        owner: &str,
        name: &str,
        datasource_id: DatasourceId,
    ) -> Result<Chart, ChartError> {
        if name.trim().is_empty() {
            return Err(ChartError::InvalidSelection("name must not be empty".to_string()));
        }
        self.datasource(owner, datasource_id).await?;

        let chart = self
            .charts
            .insert(&NewChart {
                owner: owner.to_string(),
                name: name.trim().to_string(),
                datasource_id,
            })
            .await?;
        tracing::info!(chart = chart.id, datasource = datasource_id, "chart created");
        Ok(chart)
    }

    pub async fn list(&self, owner: &str) -> Result<Vec<Chart>, ChartError> {
        Ok(self.charts.list(owner).await?)
    }

    pub async fn get(&self, owner: &str, id: ChartId) -> Result<Chart, ChartError> {
        self.charts.get(owner, id).await?.ok_or(ChartError::NotFound(id))
    }

    /// Step two: pick a table. Picking a different table clears the axes.
    pub async fn select_table(
        &self,
        owner: &str,
        id: ChartId,
        table_name: String,
    ) -> Result<Chart, ChartError> {
        let mut chart = self.get(owner, id).await?;
        let (_, schema) = self.schema_for(&chart).await?;
        if !schema.has_table(&table_name) {
            return Err(ChartError::InvalidSelection(format!(
                "table {} is not part of the datasource",
                table_name
            )));
        }

        if chart.select_table(table_name) {
            tracing::debug!(chart = id, "table changed, axes reset");
        }
        self.charts.update(&chart).await?;
        Ok(chart)
    }

    /// Step three: x dimension, y measure and aggregation.
    pub async fn set_axes(&self, owner: &str, id: ChartId, axes: ChartAxes) -> Result<Chart, ChartError> {
        let mut chart = self.get(owner, id).await?;
        let (_, schema) = self.schema_for(&chart).await?;
        chart.check_axes(&schema, &axes)?;

        chart.axes = Some(axes);
        self.charts.update(&chart).await?;
        Ok(chart)
    }

    pub async fn delete(&self, owner: &str, id: ChartId) -> Result<(), ChartError> {
        if !self.charts.delete(owner, id).await? {
            return Err(ChartError::NotFound(id));
        }
        tracing::info!(chart = id, "chart deleted");
        Ok(())
    }

    /// Build the detail view. Schema and query failures never fail the view;
    /// they leave `column_chart` empty and set `notice`.
    pub async fn view(&self, owner: &str, id: ChartId) -> Result<ChartView, ChartError> {
        let chart = self.get(owner, id).await?;
        let datasource = self.datasource(&chart.owner, chart.datasource_id).await?;
        let schema = match self.cache.load(&datasource).await {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!(chart = id, error = %e, "schema unavailable for chart view");
                return Ok(ChartView {
                    chart,
                    table_choices: Vec::new(),
                    axis_choices: None,
                    column_chart: None,
                    notice: Some(CHART_ERROR_NOTICE.to_string()),
                });
            }
        };

        let axis_choices = chart.table_name.as_deref().map(|table| AxisChoices {
            x_axis: schema.dimensions_of(table).to_vec(),
            y_axis: schema.measures_of(table).to_vec(),
            aggr_func: AggregateFunction::ALL.to_vec(),
        });

        let (column_chart, notice) = if chart.is_complete() {
            match self.plot_column_chart(&chart, &datasource, &schema).await {
                Ok(options) => (Some(options), None),
                Err(e) => {
                    tracing::warn!(chart = id, error = %e, "chart rendering failed");
                    (None, Some(CHART_ERROR_NOTICE.to_string()))
                }
            }
        } else {
            (None, None)
        };

        Ok(ChartView {
            table_choices: schema.table_names(),
            chart,
            axis_choices,
            column_chart,
            notice,
        })
    }

    /// Query the grouped aggregation. Every failure is a `ChartCreation` error.
    pub async fn column_chart_data(
        &self,
        chart: &Chart,
        datasource: &Datasource,
        schema: &IntrospectedSchema,
    ) -> Result<Vec<ChartPoint>, ChartError> {
        let axes = chart.axes.as_ref().ok_or_else(incomplete)?;
        let query = AggregateQuery::for_chart(chart).ok_or_else(incomplete)?;
        chart
            .check_axes(schema, axes)
            .map_err(|e| ChartError::ChartCreation(e.to_string()))?;

        let mut db = self
            .introspector
            .connect(&datasource.params)
            .await
            .map_err(|e| ChartError::ChartCreation(e.to_string()))?;
        let result = query.run(db.as_mut()).await;
        if let Err(e) = db.close().await {
            tracing::warn!("Error closing chart connection: {}", e);
        }
        result.map_err(|e| ChartError::ChartCreation(format!("{:#}", e)))
    }

    async fn plot_column_chart(
        &self,
        chart: &Chart,
        datasource: &Datasource,
        schema: &IntrospectedSchema,
    ) -> Result<ColumnChartOptions, ChartError> {
        let points = self.column_chart_data(chart, datasource, schema).await?;
        let axes = chart.axes.as_ref().ok_or_else(incomplete)?;

        Ok(ColumnChartOptions::new(
            &chart.name,
            &axes.x_axis,
            &axes.y_axis,
            format!("{}({})", axes.aggr_func, axes.y_axis),
            points,
        ))
    }

    async fn datasource(&self, owner: &str, id: DatasourceId) -> Result<Datasource, ChartError> {
        self.datasources
            .get(owner, id)
            .await?
            .ok_or(ChartError::DatasourceNotFound(id))
    }

    async fn schema_for(&self, chart: &Chart) -> Result<(Datasource, Arc<IntrospectedSchema>), ChartError> {
        let datasource = self.datasource(&chart.owner, chart.datasource_id).await?;
        let schema = self.cache.load(&datasource).await?;
        Ok((datasource, schema))
    }
}

fn incomplete() -> ChartError {
    ChartError::ChartCreation("chart is not fully configured".to_string())
}
