//! Static adapter registry with enum dispatch.
//!
//! All four adapters are constructed once at registry creation; resolution is
//! an infallible match on the parsed [`Backend`], so a request that survives
//! parsing always has an adapter.

use async_trait::async_trait;

use crate::adapters::{DbAdapter, MongoAdapter, MysqlAdapter, PostgresAdapter, RedisAdapter};
use crate::api::Backend;
use crate::archive::ArchiveBuilder;
use crate::error::Result;
use crate::jobs::JobContext;

/// Enum dispatch over the backend adapters, avoiding trait objects on the
/// hot path.
pub enum AdapterImpl {
    Mongo(MongoAdapter),
    Postgres(PostgresAdapter),
    Mysql(MysqlAdapter),
    Redis(RedisAdapter),
}

#[async_trait]
impl DbAdapter for AdapterImpl {
    fn backend(&self) -> Backend {
        match self {
            AdapterImpl::Mongo(a) => a.backend(),
            AdapterImpl::Postgres(a) => a.backend(),
            AdapterImpl::Mysql(a) => a.backend(),
            AdapterImpl::Redis(a) => a.backend(),
        }
    }

    async fn verify_connection(&self, uri: &str) -> bool {
        match self {
            AdapterImpl::Mongo(a) => a.verify_connection(uri).await,
            AdapterImpl::Postgres(a) => a.verify_connection(uri).await,
            AdapterImpl::Mysql(a) => a.verify_connection(uri).await,
            AdapterImpl::Redis(a) => a.verify_connection(uri).await,
        }
    }

    async fn run_copy(&self, ctx: &JobContext, source_uri: &str, target_uri: &str) -> Result<()> {
        match self {
            AdapterImpl::Mongo(a) => a.run_copy(ctx, source_uri, target_uri).await,
            AdapterImpl::Postgres(a) => a.run_copy(ctx, source_uri, target_uri).await,
            AdapterImpl::Mysql(a) => a.run_copy(ctx, source_uri, target_uri).await,
            AdapterImpl::Redis(a) => a.run_copy(ctx, source_uri, target_uri).await,
        }
    }

    async fn run_export(
        &self,
        ctx: &JobContext,
        source_uri: &str,
        archive: &mut ArchiveBuilder,
    ) -> Result<()> {
        match self {
            AdapterImpl::Mongo(a) => a.run_export(ctx, source_uri, archive).await,
            AdapterImpl::Postgres(a) => a.run_export(ctx, source_uri, archive).await,
            AdapterImpl::Mysql(a) => a.run_export(ctx, source_uri, archive).await,
            AdapterImpl::Redis(a) => a.run_export(ctx, source_uri, archive).await,
        }
    }
}

/// Holds one adapter instance per supported backend.
pub struct AdapterRegistry {
    mongo: AdapterImpl,
    postgres: AdapterImpl,
    mysql: AdapterImpl,
    redis: AdapterImpl,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            mongo: AdapterImpl::Mongo(MongoAdapter::new()),
            postgres: AdapterImpl::Postgres(PostgresAdapter::new()),
            mysql: AdapterImpl::Mysql(MysqlAdapter::new()),
            redis: AdapterImpl::Redis(RedisAdapter::new()),
        }
    }

    /// Resolve the adapter for a backend. Infallible: every parsed backend
    /// has a registered adapter.
    pub fn resolve(&self, backend: Backend) -> &AdapterImpl {
        match backend {
            Backend::Mongodb => &self.mongo,
            Backend::Postgres => &self.postgres,
            Backend::Mysql => &self.mysql,
            Backend::Redis => &self.redis,
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_backend_resolves_to_its_own_adapter() {
        let registry = AdapterRegistry::new();
        for backend in Backend::ALL {
            assert_eq!(registry.resolve(backend).backend(), backend);
        }
    }
}
