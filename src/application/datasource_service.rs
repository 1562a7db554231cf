// Datasource service - register, inspect, update and delete datasources
use crate::application::errors::DatasourceError;
use crate::application::introspector::SchemaIntrospector;
use crate::application::repositories::DatasourceRepository;
use crate::application::schema_cache::SchemaCache;
use crate::domain::datasource::{
    ConnectionParams, DatabaseKind, Datasource, DatasourceDetail, DatasourceId, DatasourceUpdate,
    NewDatasource,
};
use crate::infrastructure::schema_codec;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

/// Raw registration input; the kind is still a string until validated.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasourceForm {
    pub name: String,
    pub dbtype: String,
    pub dbname: String,
    pub dbusername: String,
    pub dbpassword: String,
    pub dbhost: String,
}

#[derive(Clone)]
pub struct DatasourceService {
    repository: Arc<dyn DatasourceRepository>,
    introspector: SchemaIntrospector,
    cache: SchemaCache,
}

impl DatasourceService {
    pub fn new(
        repository: Arc<dyn DatasourceRepository>,
        introspector: SchemaIntrospector,
        cache: SchemaCache,
    ) -> Self {
        Self {
            repository,
            introspector,
            cache,
        }
    }

    /// Validate the connection, introspect once and persist the record
    /// together with its schema. Nothing is written if any step fails.
    pub async fn create(&self, owner: &str, form: DatasourceForm) -> Result<Datasource, DatasourceError> {
        let params = parse_params(&form)?;
        if form.name.trim().is_empty() {
            return Err(DatasourceError::Validation("name must not be empty".to_string()));
        }

        self.introspector.validate(&params).await?;
        let schema = self.introspector.introspect(&params).await?;
        let stored = schema_codec::encode(&schema)?;
        let tables = schema.tables.len();

        let datasource = self
            .repository
            .insert(
                &NewDatasource {
                    owner: owner.to_string(),
                    name: form.name,
                    params,
                },
                &stored,
                Utc::now(),
            )
            .await?;
        self.cache.prime(datasource.id, schema).await;

        tracing::info!(
            datasource = datasource.id,
            owner = %owner,
            tables,
            "datasource registered"
        );
        Ok(datasource)
    }

    pub async fn list(&self, owner: &str) -> Result<Vec<Datasource>, DatasourceError> {
        Ok(self.repository.list(owner).await?)
    }

    pub async fn get(&self, owner: &str, id: DatasourceId) -> Result<Datasource, DatasourceError> {
        self.repository
            .get(owner, id)
            .await?
            .ok_or(DatasourceError::NotFound(id))
    }

    pub async fn details(&self, owner: &str, id: DatasourceId) -> Result<DatasourceDetail, DatasourceError> {
        let datasource = self.get(owner, id).await?;
        let schema = self.cache.load(&datasource).await?;
        Ok(DatasourceDetail { datasource, schema })
    }

    /// Change name or credentials. The cached schema is kept as is.
    pub async fn update(
        &self,
        owner: &str,
        id: DatasourceId,
        update: DatasourceUpdate,
    ) -> Result<Datasource, DatasourceError> {
        let mut datasource = self.get(owner, id).await?;
        update.apply(&mut datasource);
        if datasource.name.trim().is_empty() {
            return Err(DatasourceError::Validation("name must not be empty".to_string()));
        }
        self.repository.update(&datasource).await?;
        Ok(datasource)
    }

    /// Explicitly re-run introspection and replace every cached tier.
    pub async fn refresh_schema(&self, owner: &str, id: DatasourceId) -> Result<DatasourceDetail, DatasourceError> {
        let datasource = self.get(owner, id).await?;
        let schema = self.introspector.introspect(&datasource.params).await?;
        let schema = self.cache.replace(id, schema).await?;
        tracing::info!(datasource = id, "schema refreshed on request");

        let datasource = self.get(owner, id).await?;
        Ok(DatasourceDetail { datasource, schema })
    }

    /// Returns how many charts went with it.
    pub async fn delete(&self, owner: &str, id: DatasourceId) -> Result<usize, DatasourceError> {
        let charts = self
            .repository
            .delete(owner, id)
            .await?
            .ok_or(DatasourceError::NotFound(id))?;
        self.cache.invalidate(id).await;
        tracing::info!(datasource = id, charts, "datasource deleted");
        Ok(charts)
    }
}

fn parse_params(form: &DatasourceForm) -> Result<ConnectionParams, DatasourceError> {
    let kind: DatabaseKind = form
        .dbtype
        .parse()
        .map_err(|_| DatasourceError::UnsupportedDatabaseKind(form.dbtype.clone()))?;

    for (field, value) in [
        ("dbname", &form.dbname),
        ("dbusername", &form.dbusername),
        ("dbhost", &form.dbhost),
    ] {
        if value.trim().is_empty() {
            return Err(DatasourceError::Validation(format!("{} must not be empty", field)));
        }
    }

    Ok(ConnectionParams {
        kind,
        host: form.dbhost.trim().to_string(),
        dbname: form.dbname.trim().to_string(),
        username: form.dbusername.clone(),
        password: form.dbpassword.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repositories::StoredSchema;
    use crate::infrastructure::secret_cipher::SecretCipher;
    use crate::infrastructure::sqlite_fixture::SqliteFixture;
    use crate::infrastructure::sqlite_store::SqliteStore;

    struct Harness {
        fixture: SqliteFixture,
        store: Arc<SqliteStore>,
        service: DatasourceService,
    }

    fn harness() -> Harness {
        let fixture = SqliteFixture::orders();
        let store = Arc::new(SqliteStore::in_memory(SecretCipher::generate()).unwrap());
        let introspector = SchemaIntrospector::new(vec![fixture.connector()]);
        let cache = SchemaCache::new(store.clone(), introspector.clone());
        let service = DatasourceService::new(store.clone(), introspector, cache);
        Harness {
            fixture,
            store,
            service,
        }
    }

    fn form(dbtype: &str) -> DatasourceForm {
        DatasourceForm {
            name: "shop".to_string(),
            dbtype: dbtype.to_string(),
            dbname: "shop".to_string(),
            dbusername: "report".to_string(),
            dbpassword: "secret".to_string(),
            dbhost: "fixture.local".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_introspects_once_and_persists_schema() {
        let h = harness();
        let created = h.service.create("alice", form("MYSQL")).await.unwrap();

        assert!(created.time_introspected.is_some());
        assert_eq!(h.fixture.reflections(), 1);

        let stored = h.store.load_schema(created.id).await.unwrap();
        let schema = schema_codec::decode(&stored).unwrap();
        assert!(schema.is_consistent());
        assert_eq!(schema.measures_of("orders"), ["id", "amount"]);

        let detail = h.service.details("alice", created.id).await.unwrap();
        assert_eq!(*detail.schema, schema);
        assert_eq!(h.fixture.reflections(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_kind_persists_nothing() {
        let h = harness();
        let err = h.service.create("alice", form("ORACLE")).await.unwrap_err();

        assert!(matches!(err, DatasourceError::UnsupportedDatabaseKind(ref k) if k == "ORACLE"));
        assert!(h.service.list("alice").await.unwrap().is_empty());
        assert_eq!(h.fixture.connects(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_database_persists_nothing() {
        let h = harness();
        h.fixture.refuse_connections(true);

        let err = h.service.create("alice", form("MYSQL")).await.unwrap_err();

        assert!(matches!(err, DatasourceError::Validation(_)));
        assert!(h.service.list("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credential_change_does_not_reintrospect() {
        let h = harness();
        let created = h.service.create("alice", form("MYSQL")).await.unwrap();
        h.fixture.execute("CREATE TABLE late_arrival (code VARCHAR(3));");

        let updated = h
            .service
            .update(
                "alice",
                created.id,
                DatasourceUpdate {
                    password: Some("rotated".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.params.password, "rotated");

        let detail = h.service.details("alice", created.id).await.unwrap();
        assert!(!detail.schema.has_table("late_arrival"));
        assert_eq!(detail.datasource.params.password, "rotated");
        assert_eq!(h.fixture.reflections(), 1);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_tables() {
        let h = harness();
        let created = h.service.create("alice", form("MYSQL")).await.unwrap();
        h.fixture.execute("CREATE TABLE late_arrival (code VARCHAR(3));");

        let refreshed = h.service.refresh_schema("alice", created.id).await.unwrap();
        assert!(refreshed.schema.has_table("late_arrival"));

        let detail = h.service.details("alice", created.id).await.unwrap();
        assert_eq!(detail.schema.dimensions_of("late_arrival"), ["code"]);
    }

    #[tokio::test]
    async fn test_details_fill_missing_blobs() {
        let h = harness();
        let datasource = h
            .store
            .insert(
                &NewDatasource {
                    owner: "alice".to_string(),
                    name: "legacy".to_string(),
                    params: h.fixture.params(),
                },
                &StoredSchema::default(),
                Utc::now(),
            )
            .await
            .unwrap();

        let detail = h.service.details("alice", datasource.id).await.unwrap();
        assert!(detail.schema.has_table("orders"));
        assert!(detail.datasource.time_introspected.is_none());
        assert!(h.store.load_schema(datasource.id).await.unwrap().tables.is_some());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let h = harness();
        let err = h.service.delete("alice", 42).await.unwrap_err();
        assert!(matches!(err, DatasourceError::NotFound(42)));
    }
}
