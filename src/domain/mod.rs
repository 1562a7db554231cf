// Domain layer - Datasources, schemas and charts
pub mod chart;
pub mod datasource;
pub mod schema;
