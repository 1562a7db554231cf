// Application layer - Services and the ports they depend on
pub mod chart_query;
pub mod chart_service;
pub mod datasource_service;
pub mod errors;
pub mod introspector;
pub mod repositories;
pub mod schema_cache;
pub mod schema_source;
