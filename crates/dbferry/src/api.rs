//! Request/response contracts consumed by the transport layer.
//!
//! The HTTP framing itself lives outside this crate; these types define the
//! payloads it exchanges with the engine. Requests are validated here, at the
//! boundary, before they reach any adapter.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{FerryError, Result};
use crate::jobs::{JobSnapshot, JobStats, JobStatus};

/// Closed set of supported backend identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Document store (MongoDB).
    Mongodb,
    /// Relational (PostgreSQL).
    Postgres,
    /// Relational (MySQL/MariaDB).
    Mysql,
    /// Key-value (Redis).
    Redis,
}

impl Backend {
    /// All registered backends, in registration order.
    pub const ALL: [Backend; 4] = [
        Backend::Mongodb,
        Backend::Postgres,
        Backend::Mysql,
        Backend::Redis,
    ];

    /// Parse a backend identifier.
    ///
    /// # Errors
    ///
    /// Returns [`FerryError::UnsupportedBackend`] when the identifier has no
    /// registered adapter.
    pub fn parse(id: &str) -> Result<Self> {
        match id.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Backend::Mongodb),
            "postgres" | "postgresql" | "pg" => Ok(Backend::Postgres),
            "mysql" | "mariadb" => Ok(Backend::Mysql),
            "redis" => Ok(Backend::Redis),
            other => Err(FerryError::UnsupportedBackend(other.to_string())),
        }
    }

    /// Stable identifier string for this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Mongodb => "mongodb",
            Backend::Postgres => "postgres",
            Backend::Mysql => "mysql",
            Backend::Redis => "redis",
        }
    }

    /// URI scheme prefixes accepted for this backend.
    fn uri_prefixes(&self) -> &'static [&'static str] {
        match self {
            Backend::Mongodb => &["mongodb://", "mongodb+srv://"],
            Backend::Postgres => &["postgres://", "postgresql://"],
            Backend::Mysql => &["mysql://"],
            Backend::Redis => &["redis://", "rediss://"],
        }
    }

    /// Validate the shape of a connection URI for this backend.
    ///
    /// This is a cheap scheme check performed before any connection attempt;
    /// deeper validation is left to the driver.
    pub fn validate_uri(&self, uri: &str) -> Result<()> {
        if uri.is_empty() {
            return Err(FerryError::Validation("Missing URI".to_string()));
        }
        if self.uri_prefixes().iter().any(|p| uri.starts_with(p)) {
            Ok(())
        } else {
            Err(FerryError::Validation(format!(
                "Invalid {} URI",
                self.as_str()
            )))
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Copy-migration request, one variant per backend.
///
/// Serialized as a tagged union keyed by the backend identifier, so the
/// transport layer can deserialize a request body directly:
///
/// ```json
/// {"backend": "postgres", "sourceUri": "postgres://...", "targetUri": "postgres://..."}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum MigrateRequest {
    #[serde(rename_all = "camelCase")]
    Mongodb { source_uri: String, target_uri: String },
    #[serde(rename_all = "camelCase")]
    Postgres { source_uri: String, target_uri: String },
    #[serde(rename_all = "camelCase")]
    Mysql { source_uri: String, target_uri: String },
    #[serde(rename_all = "camelCase")]
    Redis { source_uri: String, target_uri: String },
}

impl MigrateRequest {
    /// The backend this request targets.
    pub fn backend(&self) -> Backend {
        match self {
            MigrateRequest::Mongodb { .. } => Backend::Mongodb,
            MigrateRequest::Postgres { .. } => Backend::Postgres,
            MigrateRequest::Mysql { .. } => Backend::Mysql,
            MigrateRequest::Redis { .. } => Backend::Redis,
        }
    }

    /// Source and target URIs, in that order.
    pub fn uris(&self) -> (&str, &str) {
        match self {
            MigrateRequest::Mongodb { source_uri, target_uri }
            | MigrateRequest::Postgres { source_uri, target_uri }
            | MigrateRequest::Mysql { source_uri, target_uri }
            | MigrateRequest::Redis { source_uri, target_uri } => (source_uri, target_uri),
        }
    }

    /// Validate both URIs against the backend's expected scheme.
    pub fn validate(&self) -> Result<()> {
        let backend = self.backend();
        let (source, target) = self.uris();
        backend.validate_uri(source)?;
        backend.validate_uri(target)?;
        Ok(())
    }
}

/// Response to a connection verification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the liveness probe succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

impl VerifyResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: "Connection successful".to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Response to a migration start request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    /// Identifier of the launched job.
    pub job_id: String,
    /// Human-readable confirmation.
    pub message: String,
}

/// One message on a job status stream.
///
/// The first frame is always a full snapshot; subsequent frames re-send the
/// full state after each job mutation, ending with a terminal frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFrame {
    pub status: JobStatus,
    pub progress: f64,
    pub logs: Vec<String>,
    pub stats: JobStats,
}

impl From<JobSnapshot> for StatusFrame {
    fn from(snapshot: JobSnapshot) -> Self {
        Self {
            status: snapshot.status,
            progress: snapshot.progress,
            logs: snapshot.logs,
            stats: snapshot.stats,
        }
    }
}

/// Archive filename for a download response, derived from the current time.
pub fn export_filename() -> String {
    format!("dump_{}.zip", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(Backend::parse("mongodb").unwrap(), Backend::Mongodb);
        assert_eq!(Backend::parse("postgresql").unwrap(), Backend::Postgres);
        assert_eq!(Backend::parse("pg").unwrap(), Backend::Postgres);
        assert_eq!(Backend::parse("MariaDB").unwrap(), Backend::Mysql);
        assert_eq!(Backend::parse("redis").unwrap(), Backend::Redis);
        assert!(matches!(
            Backend::parse("oracle"),
            Err(FerryError::UnsupportedBackend(_))
        ));
    }

    #[test]
    fn test_uri_validation_per_backend() {
        assert!(Backend::Mongodb
            .validate_uri("mongodb+srv://user:pw@cluster0.example.net/app")
            .is_ok());
        assert!(Backend::Postgres
            .validate_uri("postgres://localhost:5432/app")
            .is_ok());
        assert!(Backend::Mysql.validate_uri("mysql://localhost/app").is_ok());
        assert!(Backend::Redis.validate_uri("rediss://cache:6380").is_ok());

        // Scheme mismatch is rejected before any connection attempt
        assert!(matches!(
            Backend::Postgres.validate_uri("mysql://localhost/app"),
            Err(FerryError::Validation(_))
        ));
        assert!(matches!(
            Backend::Redis.validate_uri(""),
            Err(FerryError::Validation(_))
        ));
    }

    #[test]
    fn test_migrate_request_tagged_union() {
        let json = r#"{
            "backend": "redis",
            "sourceUri": "redis://a:6379",
            "targetUri": "redis://b:6379"
        }"#;
        let req: MigrateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.backend(), Backend::Redis);
        assert_eq!(req.uris().0, "redis://a:6379");
        assert!(req.validate().is_ok());

        let round = serde_json::to_value(&req).unwrap();
        assert_eq!(round["backend"], "redis");
        assert_eq!(round["targetUri"], "redis://b:6379");
    }

    #[test]
    fn test_migrate_request_rejects_mismatched_uri() {
        let req = MigrateRequest::Postgres {
            source_uri: "postgres://a/app".into(),
            target_uri: "mongodb://b/app".into(),
        };
        assert!(matches!(req.validate(), Err(FerryError::Validation(_))));
    }

    #[test]
    fn test_export_filename_shape() {
        let name = export_filename();
        assert!(name.starts_with("dump_"));
        assert!(name.ends_with(".zip"));
    }
}
