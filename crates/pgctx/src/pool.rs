//! `deadpool-postgres` pools for fetcher connections.
//!
//! A pooled client implements [`GenericClient`](crate::GenericClient), so it
//! can be handed straight to [`ContextDataFetcher::fetch`](crate::ContextDataFetcher::fetch).

use crate::error::{CtxError, CtxResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::NoTls;

/// Pool size used by [`create_pool`] and [`create_pool_with_tls`].
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Plain-TCP pool with [`DEFAULT_POOL_SIZE`] connections.
///
/// ```ignore
/// let pool = pgctx::create_pool("postgres://app@localhost/invoices")?;
/// let client = pool.get().await?;
/// let shaped = fetcher.fetch(&client, "invoice", &id, &cancel).await?;
/// ```
pub fn create_pool(database_url: &str) -> CtxResult<Pool> {
    create_pool_with_config(database_url, DEFAULT_POOL_SIZE)
}

/// Plain-TCP pool with at most `max_size` connections.
pub fn create_pool_with_config(database_url: &str, max_size: usize) -> CtxResult<Pool> {
    create_pool_with_manager_config(database_url, NoTls, manager_config(), |builder| {
        builder.max_size(max_size)
    })
}

/// Pool over a caller-supplied TLS connector.
pub fn create_pool_with_tls<T>(database_url: &str, tls: T) -> CtxResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    create_pool_with_manager_config(database_url, tls, manager_config(), |builder| {
        builder.max_size(DEFAULT_POOL_SIZE)
    })
}

/// Full control over manager and pool settings.
///
/// The URL is parsed up front; no connection is opened until the first
/// `pool.get()`.
pub fn create_pool_with_manager_config<T>(
    database_url: &str,
    tls: T,
    manager_config: ManagerConfig,
    configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> CtxResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| CtxError::Connection(e.to_string()))?;

    let manager = Manager::from_config(config, tls, manager_config);
    configure_pool(Pool::builder(manager))
        .build()
        .map_err(|e| CtxError::Pool(e.to_string()))
}

// Fetches are read-only, so fast recycling is enough.
fn manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}
