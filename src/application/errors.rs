// Application error taxonomy
use crate::domain::chart::{AxesRejection, ChartId};
use crate::domain::datasource::DatasourceId;
use thiserror::Error;

/// Failures while talking to the external database during connect/reflect.
#[derive(Debug, Error)]
pub enum IntrospectionError {
    #[error("unsupported database kind: {0}")]
    UnsupportedDatabaseKind(String),
    #[error("can't connect to the database: {0}")]
    Connection(String),
    #[error("schema reflection failed: {0}")]
    Reflection(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),
    #[error("schema store failure: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum DatasourceError {
    #[error("unsupported database kind: {0}")]
    UnsupportedDatabaseKind(String),
    #[error("invalid datasource: {0}")]
    Validation(String),
    #[error("cannot find the datasource: {0}")]
    NotFound(DatasourceId),
    #[error(transparent)]
    Schema(#[from] CacheError),
    #[error("datasource store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<IntrospectionError> for DatasourceError {
    fn from(value: IntrospectionError) -> Self {
        match value {
            IntrospectionError::UnsupportedDatabaseKind(kind) => Self::UnsupportedDatabaseKind(kind),
            other => Self::Validation(format!(
                "something is wrong with the parameters, can't connect to the database ({})",
                other
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("cannot find the chart: {0}")]
    NotFound(ChartId),
    #[error("cannot find the datasource: {0}")]
    DatasourceNotFound(DatasourceId),
    #[error("invalid chart selection: {0}")]
    InvalidSelection(String),
    #[error("error creating chart: {0}")]
    ChartCreation(String),
    #[error(transparent)]
    Schema(#[from] CacheError),
    #[error("chart store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<AxesRejection> for ChartError {
    fn from(value: AxesRejection) -> Self {
        Self::InvalidSelection(value.to_string())
    }
}
