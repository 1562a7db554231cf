// Datasource domain model
use crate::domain::schema::IntrospectedSchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type DatasourceId = i64;

/// Supported external database kinds. Each kind owns a connection-string template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseKind {
    #[serde(rename = "MYSQL")]
    MySql,
}

impl DatabaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::MySql => "MYSQL",
        }
    }

    pub fn connection_url(&self, params: &ConnectionParams) -> String {
        self.render_url(params, &urlencoding::encode(&params.password))
    }

    fn render_url(&self, params: &ConnectionParams, password: &str) -> String {
        match self {
            DatabaseKind::MySql => format!(
                "mysql://{}:{}@{}/{}",
                urlencoding::encode(&params.username),
                password,
                params.host,
                urlencoding::encode(&params.dbname),
            ),
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedKind(pub String);

impl FromStr for DatabaseKind {
    type Err = UnsupportedKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MYSQL" => Ok(DatabaseKind::MySql),
            _ => Err(UnsupportedKind(s.to_string())),
        }
    }
}

/// Everything needed to open a connection to the external database.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub kind: DatabaseKind,
    pub host: String,
    pub dbname: String,
    pub username: String,
    pub password: String,
}

impl ConnectionParams {
    pub fn connection_url(&self) -> String {
        self.kind.connection_url(self)
    }

    /// Connection string safe for logs.
    pub fn redacted_url(&self) -> String {
        self.kind.render_url(self, "***")
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("dbname", &self.dbname)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Datasource {
    pub id: DatasourceId,
    pub owner: String,
    pub name: String,
    pub params: ConnectionParams,
    pub time_introspected: Option<DateTime<Utc>>,
}

/// A datasource that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewDatasource {
    pub owner: String,
    pub name: String,
    pub params: ConnectionParams,
}

/// Fields a user may change after creation. None of them trigger re-introspection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasourceUpdate {
    pub name: Option<String>,
    pub host: Option<String>,
    pub dbname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl DatasourceUpdate {
    pub fn apply(self, datasource: &mut Datasource) {
        if let Some(name) = self.name {
            datasource.name = name;
        }
        if let Some(host) = self.host {
            datasource.params.host = host;
        }
        if let Some(dbname) = self.dbname {
            datasource.params.dbname = dbname;
        }
        if let Some(username) = self.username {
            datasource.params.username = username;
        }
        if let Some(password) = self.password {
            datasource.params.password = password;
        }
    }
}

/// Datasource plus its schema, as shown on the detail page.
#[derive(Debug, Clone)]
pub struct DatasourceDetail {
    pub datasource: Datasource,
    pub schema: std::sync::Arc<IntrospectedSchema>,
}
