// Router assembly
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    chart_view, create_chart, create_datasource, datasource_details, delete_chart,
    delete_datasource, health_check, index, list_charts, list_datasources, refresh_datasource,
    select_chart_table, set_chart_axes, update_datasource,
};
use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/", get(index))
        .route("/datasources", get(list_datasources).post(create_datasource))
        .route(
            "/datasources/:id",
            get(datasource_details)
                .patch(update_datasource)
                .delete(delete_datasource),
        )
        .route("/datasources/:id/refresh", post(refresh_datasource))
        .route("/charts", get(list_charts).post(create_chart))
        .route("/charts/:id", get(chart_view).delete(delete_chart))
        .route("/charts/:id/table", put(select_chart_table))
        .route("/charts/:id/axes", put(set_chart_axes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
