use async_trait::async_trait;

use rowforge_core::{Catalog, DatabaseSchema, Result};

use crate::options::IntrospectOptions;

/// Trait implemented by database adapters that can introspect schemas.
#[async_trait]
pub trait Adapter {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Introspect the database and return a schema snapshot.
    async fn introspect(&self, opts: &IntrospectOptions) -> Result<DatabaseSchema>;

    /// Introspect and build the catalog maps in one step.
    async fn catalog(&self, opts: &IntrospectOptions) -> Result<Catalog> {
        let snapshot = self.introspect(opts).await?;
        rowforge_core::validate_schema(&snapshot)?;
        Ok(Catalog::from_schema(&snapshot))
    }
}
