use async_trait::async_trait;

/// Dependency check backing the readiness endpoints.
///
/// Implementations issue the cheapest possible round-trip to the dependency
/// and return its error untouched; callers decide what to expose.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn ready(&self) -> anyhow::Result<()>;
}
