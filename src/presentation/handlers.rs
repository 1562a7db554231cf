// HTTP request handlers
use crate::application::chart_service::{AxisChoices, ChartView};
use crate::application::datasource_service::DatasourceForm;
use crate::domain::chart::{AggregateFunction, Chart, ChartAxes, ChartId};
use crate::domain::datasource::{Datasource, DatasourceDetail, DatasourceId, DatasourceUpdate};
use crate::domain::schema::TableLayout;
use crate::infrastructure::chart_options::ColumnChartOptions;
use crate::presentation::app_state::AppState;
use crate::presentation::errors::{ApiError, api_error, chart_error, datasource_error};
use axum::{
    Json, async_trait,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const OWNER_HEADER: &str = "x-owner";

/// The caller, taken from the `x-owner` header.
pub struct Owner(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Owner(v.to_string()))
            .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "missing x-owner header"))
    }
}

#[derive(Debug, Serialize)]
pub struct DatasourceResponse {
    pub id: DatasourceId,
    pub name: String,
    pub dbtype: String,
    pub dbname: String,
    pub dbusername: String,
    pub dbhost: String,
    pub time_introspected: Option<DateTime<Utc>>,
}

impl From<Datasource> for DatasourceResponse {
    fn from(d: Datasource) -> Self {
        Self {
            id: d.id,
            name: d.name,
            dbtype: d.params.kind.to_string(),
            dbname: d.params.dbname,
            dbusername: d.params.username,
            dbhost: d.params.host,
            time_introspected: d.time_introspected,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatasourceDetailResponse {
    pub datasource: DatasourceResponse,
    pub layout: Vec<TableLayout>,
}

impl From<DatasourceDetail> for DatasourceDetailResponse {
    fn from(detail: DatasourceDetail) -> Self {
        Self {
            layout: detail.schema.layout(),
            datasource: detail.datasource.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedDatasource {
    pub id: DatasourceId,
    pub deleted_charts: usize,
}

#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub id: ChartId,
    pub name: String,
    pub datasource_id: DatasourceId,
    pub table_name: Option<String>,
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
    pub aggr_func: Option<AggregateFunction>,
    pub time_created: DateTime<Utc>,
}

impl From<Chart> for ChartResponse {
    fn from(c: Chart) -> Self {
        let (x_axis, y_axis, aggr_func) = match c.axes {
            Some(a) => (Some(a.x_axis), Some(a.y_axis), Some(a.aggr_func)),
            None => (None, None, None),
        };
        Self {
            id: c.id,
            name: c.name,
            datasource_id: c.datasource_id,
            table_name: c.table_name,
            x_axis,
            y_axis,
            aggr_func,
            time_created: c.time_created,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AxisChoicesResponse {
    pub x_axis: Vec<String>,
    pub y_axis: Vec<String>,
    pub aggr_func: Vec<AggregateFunction>,
}

impl From<AxisChoices> for AxisChoicesResponse {
    fn from(c: AxisChoices) -> Self {
        Self {
            x_axis: c.x_axis,
            y_axis: c.y_axis,
            aggr_func: c.aggr_func,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChartViewResponse {
    pub chart: ChartResponse,
    pub table_choices: Vec<String>,
    pub axis_choices: Option<AxisChoicesResponse>,
    pub column_chart: Option<ColumnChartOptions>,
    /// `<script>` block defining `chart_options`, for server-rendered pages.
    pub column_chart_script: Option<String>,
    pub notice: Option<String>,
}

impl From<ChartView> for ChartViewResponse {
    fn from(view: ChartView) -> Self {
        let column_chart_script = view.column_chart.as_ref().and_then(|options| {
            options
                .to_script()
                .map_err(|e| tracing::warn!("Error embedding chart options: {}", e))
                .ok()
        });
        Self {
            chart: view.chart.into(),
            table_choices: view.table_choices,
            axis_choices: view.axis_choices.map(Into::into),
            column_chart: view.column_chart,
            column_chart_script,
            notice: view.notice,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub datasources: Vec<DatasourceResponse>,
    pub charts: Vec<ChartResponse>,
}

#[derive(Debug, Deserialize)]
pub struct NewChartRequest {
    pub name: String,
    pub datasource_id: DatasourceId,
}

#[derive(Debug, Deserialize)]
pub struct TableRequest {
    pub table_name: String,
}

#[derive(Debug, Deserialize)]
pub struct AxesRequest {
    pub x_axis: String,
    pub y_axis: String,
    pub aggr_func: String,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// The caller's datasources and charts
pub async fn index(
    Owner(owner): Owner,
    State(state): State<Arc<AppState>>,
) -> Result<Json<IndexResponse>, ApiError> {
    let datasources = state
        .datasource_service
        .list(&owner)
        .await
        .map_err(datasource_error)?;
    let charts = state.chart_service.list(&owner).await.map_err(chart_error)?;

    Ok(Json(IndexResponse {
        datasources: datasources.into_iter().map(Into::into).collect(),
        charts: charts.into_iter().map(Into::into).collect(),
    }))
}

pub async fn list_datasources(
    Owner(owner): Owner,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DatasourceResponse>>, ApiError> {
    let datasources = state
        .datasource_service
        .list(&owner)
        .await
        .map_err(datasource_error)?;
    Ok(Json(datasources.into_iter().map(Into::into).collect()))
}

/// Validate, introspect and persist a new datasource
pub async fn create_datasource(
    Owner(owner): Owner,
    State(state): State<Arc<AppState>>,
    Json(form): Json<DatasourceForm>,
) -> Result<(StatusCode, Json<DatasourceResponse>), ApiError> {
    let datasource = state
        .datasource_service
        .create(&owner, form)
        .await
        .map_err(datasource_error)?;
    Ok((StatusCode::CREATED, Json(datasource.into())))
}

pub async fn datasource_details(
    Owner(owner): Owner,
    Path(id): Path<DatasourceId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DatasourceDetailResponse>, ApiError> {
    let detail = state
        .datasource_service
        .details(&owner, id)
        .await
        .map_err(datasource_error)?;
    Ok(Json(detail.into()))
}

pub async fn update_datasource(
    Owner(owner): Owner,
    Path(id): Path<DatasourceId>,
    State(state): State<Arc<AppState>>,
    Json(update): Json<DatasourceUpdate>,
) -> Result<Json<DatasourceResponse>, ApiError> {
    let datasource = state
        .datasource_service
        .update(&owner, id, update)
        .await
        .map_err(datasource_error)?;
    Ok(Json(datasource.into()))
}

pub async fn refresh_datasource(
    Owner(owner): Owner,
    Path(id): Path<DatasourceId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DatasourceDetailResponse>, ApiError> {
    let detail = state
        .datasource_service
        .refresh_schema(&owner, id)
        .await
        .map_err(datasource_error)?;
    Ok(Json(detail.into()))
}

pub async fn delete_datasource(
    Owner(owner): Owner,
    Path(id): Path<DatasourceId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeletedDatasource>, ApiError> {
    let deleted_charts = state
        .datasource_service
        .delete(&owner, id)
        .await
        .map_err(datasource_error)?;
    Ok(Json(DeletedDatasource { id, deleted_charts }))
}

pub async fn list_charts(
    Owner(owner): Owner,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChartResponse>>, ApiError> {
    let charts = state.chart_service.list(&owner).await.map_err(chart_error)?;
    Ok(Json(charts.into_iter().map(Into::into).collect()))
}

pub async fn create_chart(
    Owner(owner): Owner,
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewChartRequest>,
) -> Result<(StatusCode, Json<ChartResponse>), ApiError> {
    let chart = state
        .chart_service
        .create(&owner, &request.name, request.datasource_id)
        .await
        .map_err(chart_error)?;
    Ok((StatusCode::CREATED, Json(chart.into())))
}

/// Chart with its selection choices and, once configured, the rendered options
pub async fn chart_view(
    Owner(owner): Owner,
    Path(id): Path<ChartId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChartViewResponse>, ApiError> {
    let view = state.chart_service.view(&owner, id).await.map_err(chart_error)?;
    Ok(Json(view.into()))
}

pub async fn select_chart_table(
    Owner(owner): Owner,
    Path(id): Path<ChartId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<TableRequest>,
) -> Result<Json<ChartResponse>, ApiError> {
    let chart = state
        .chart_service
        .select_table(&owner, id, request.table_name)
        .await
        .map_err(chart_error)?;
    Ok(Json(chart.into()))
}

pub async fn set_chart_axes(
    Owner(owner): Owner,
    Path(id): Path<ChartId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<AxesRequest>,
) -> Result<Json<ChartResponse>, ApiError> {
    let aggr_func: AggregateFunction = request
        .aggr_func
        .parse()
        .map_err(|e: String| api_error(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    let axes = ChartAxes {
        x_axis: request.x_axis,
        y_axis: request.y_axis,
        aggr_func,
    };

    let chart = state
        .chart_service
        .set_axes(&owner, id, axes)
        .await
        .map_err(chart_error)?;
    Ok(Json(chart.into()))
}

pub async fn delete_chart(
    Owner(owner): Owner,
    Path(id): Path<ChartId>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state
        .chart_service
        .delete(&owner, id)
        .await
        .map_err(chart_error)?;
    Ok(StatusCode::NO_CONTENT)
}
