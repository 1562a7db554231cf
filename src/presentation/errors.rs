// HTTP error mapping
use crate::application::errors::{CacheError, ChartError, DatasourceError};
use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn cache_status(err: &CacheError) -> StatusCode {
    match err {
        CacheError::Introspection(_) => StatusCode::BAD_GATEWAY,
        CacheError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn datasource_error(err: DatasourceError) -> ApiError {
    let status = match &err {
        DatasourceError::UnsupportedDatabaseKind(_) | DatasourceError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        DatasourceError::NotFound(_) => StatusCode::NOT_FOUND,
        DatasourceError::Schema(e) => cache_status(e),
        DatasourceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = ?err, "datasource operation failed");
    }
    api_error(status, err.to_string())
}

pub fn chart_error(err: ChartError) -> ApiError {
    let status = match &err {
        ChartError::NotFound(_) | ChartError::DatasourceNotFound(_) => StatusCode::NOT_FOUND,
        ChartError::InvalidSelection(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ChartError::ChartCreation(_) => StatusCode::BAD_GATEWAY,
        ChartError::Schema(e) => cache_status(e),
        ChartError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = ?err, "chart operation failed");
    }
    api_error(status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::IntrospectionError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(datasource_error(DatasourceError::NotFound(3)).0, StatusCode::NOT_FOUND);
        assert_eq!(
            datasource_error(DatasourceError::UnsupportedDatabaseKind("ORACLE".into())).0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            chart_error(ChartError::Schema(CacheError::Introspection(
                IntrospectionError::Connection("refused".into())
            )))
            .0,
            StatusCode::BAD_GATEWAY
        );
        let (status, Json(body)) = chart_error(ChartError::DatasourceNotFound(9));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "cannot find the datasource: 9");
    }
}
