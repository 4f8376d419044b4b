//! Query executor: runs a built query and decodes the flat row set.
//!
//! There is no business logic here. Zero rows is a normal outcome and is
//! returned as an empty list. Cancellation is cooperative: the caller's
//! [`CancellationToken`] is raced against the in-flight query, and when it wins
//! (or the optional timeout fires) a cancel request is sent to the server so the
//! backend stops working too.

use crate::builder::BuiltQuery;
use crate::client::GenericClient;
use crate::error::{CtxError, CtxResult};
use crate::row::FlatRow;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use tokio_util::sync::CancellationToken;

/// Executes context queries with optional timeout and caller cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryExecutor {
    query_timeout: Option<Duration>,
}

impl QueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`CtxError::Timeout`] when a query runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    /// Run `query` and decode every row.
    pub async fn execute<C: GenericClient>(
        &self,
        conn: &C,
        query: &BuiltQuery,
        cancel: &CancellationToken,
    ) -> CtxResult<Vec<FlatRow>> {
        let rows = self
            .query(conn, query.sql(), &query.params_ref(), cancel)
            .await?;
        rows.iter().map(FlatRow::from_row).collect()
    }

    /// Run arbitrary SQL under the same timeout and cancellation rules.
    pub async fn query<C: GenericClient>(
        &self,
        conn: &C,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        cancel: &CancellationToken,
    ) -> CtxResult<Vec<Row>> {
        run_cancellable(conn, conn.query(sql, params), self.query_timeout, cancel).await
    }
}

/// Race `future` against `cancel` and an optional timeout.
pub(crate) async fn run_cancellable<C, T, F>(
    conn: &C,
    future: F,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> CtxResult<T>
where
    C: GenericClient,
    F: Future<Output = CtxResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(CtxError::Cancelled);
    }

    let deadline = async move {
        match timeout {
            Some(timeout) => {
                tokio::time::sleep(timeout).await;
                timeout
            }
            None => std::future::pending().await,
        }
    };

    tokio::pin!(future);
    tokio::select! {
        result = &mut future => result,
        _ = cancel.cancelled() => {
            tracing::warn!(target: "pgctx", "query cancelled by caller");
            cancel_on_server(conn);
            Err(CtxError::Cancelled)
        }
        timeout = deadline => {
            tracing::warn!(target: "pgctx", ?timeout, "query timed out");
            cancel_on_server(conn);
            Err(CtxError::Timeout(timeout))
        }
    }
}

fn cancel_on_server<C: GenericClient>(conn: &C) {
    if let Some(cancel_token) = conn.cancel_token() {
        tokio::spawn(async move {
            let _ = cancel_token.cancel_query(tokio_postgres::NoTls).await;
        });
    }
}
