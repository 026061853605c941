//! Runs rendered statements against a registered datasource.

use crate::error::EngineError;
use crate::registry::ConnectionRegistry;
use crate::sql::{bind_values, row_to_record, Record, SelectQuery, Value};
use sqlx::any::Any;
use sqlx::{AnyConnection, Transaction};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct SqlExecutor {
    registry: Arc<ConnectionRegistry>,
    slow_query: Duration,
}

impl SqlExecutor {
    pub fn new(registry: Arc<ConnectionRegistry>, slow_query: Duration) -> Self {
        SqlExecutor { registry, slow_query }
    }

    /// Rows in column order; empty for statements that return none.
    pub async fn execute(&self, conn_id: &str, sql: &str, args: &[Value]) -> Result<Vec<Record>, EngineError> {
        let pool = self.registry.get(conn_id).await?;
        tracing::debug!(conn = %conn_id, sql = %sql, params = ?args, "query");
        let started = Instant::now();
        let rows = bind_values(sqlx::query(sql), args)
            .fetch_all(&pool)
            .await
            .map_err(|e| EngineError::execution(sql, e))?;
        self.observe(sql, started);
        Ok(rows.iter().map(row_to_record).collect())
    }

    pub async fn execute_query(&self, conn_id: &str, query: &SelectQuery) -> Result<Vec<Record>, EngineError> {
        let q = query.to_sql();
        self.execute(conn_id, &q.sql, &q.params).await
    }

    /// Total rows the query would return without its LIMIT. A separate round trip.
    pub async fn execute_count(&self, conn_id: &str, query: &SelectQuery) -> Result<i64, EngineError> {
        let q = query.to_count_sql();
        let rows = self.execute(conn_id, &q.sql, &q.params).await?;
        Ok(rows.first().map(first_cell_as_count).unwrap_or(0))
    }

    pub async fn begin(&self, conn_id: &str) -> Result<Transaction<'static, Any>, EngineError> {
        let pool = self.registry.get(conn_id).await?;
        pool.begin()
            .await
            .map_err(|e| EngineError::Transaction(format!("begin on {}: {}", conn_id, e)))
    }

    /// Same as [`execute`](Self::execute), on a caller-held connection (usually a transaction).
    pub async fn execute_in(
        &self,
        conn: &mut AnyConnection,
        sql: &str,
        args: &[Value],
    ) -> Result<Vec<Record>, EngineError> {
        tracing::debug!(sql = %sql, params = ?args, "query (tx)");
        let started = Instant::now();
        let rows = bind_values(sqlx::query(sql), args)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| EngineError::execution(sql, e))?;
        self.observe(sql, started);
        Ok(rows.iter().map(row_to_record).collect())
    }

    pub async fn execute_query_in(
        &self,
        conn: &mut AnyConnection,
        query: &SelectQuery,
    ) -> Result<Vec<Record>, EngineError> {
        let q = query.to_sql();
        self.execute_in(conn, &q.sql, &q.params).await
    }

    fn observe(&self, sql: &str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed >= self.slow_query {
            tracing::warn!(sql = %sql, elapsed_ms = elapsed.as_millis() as u64, "slow query");
        }
    }
}

fn first_cell_as_count(row: &Record) -> i64 {
    match row.iter().next().map(|(_, v)| v) {
        Some(Value::Int(n)) => *n,
        Some(Value::Float(f)) => *f as i64,
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
