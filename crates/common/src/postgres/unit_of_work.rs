use crate::domain::{DomainError, DomainResult, PoolStats, UnitOfWork, UnitOfWorkProvider};
use crate::postgres::{pool_error_to_domain, PostgresClient};
use async_trait::async_trait;
use std::any::Any;
use tracing::{debug, instrument, warn};

/// A transaction pinned to one pooled connection.
///
/// The connection is held until `commit` or `rollback` succeeds. If the unit
/// of work is dropped first, or finishing it fails, the connection is detached
/// from the pool and closed, which makes the server abort the open transaction.
pub struct PostgresUnitOfWork {
    conn: Option<deadpool_postgres::Client>,
}

impl PostgresUnitOfWork {
    async fn begin(conn: deadpool_postgres::Client) -> DomainResult<Self> {
        conn.batch_execute("BEGIN")
            .await
            .map_err(|e| DomainError::ServerError(e.into()))?;
        Ok(Self { conn: Some(conn) })
    }

    /// Connection to run statements on while the transaction is open
    pub fn connection(&self) -> DomainResult<&deadpool_postgres::Client> {
        self.conn
            .as_ref()
            .ok_or_else(|| DomainError::InvalidTransaction("unit of work already finished".to_string()))
    }

    /// Recovers the PostgreSQL transaction behind a unit of work
    pub fn from_unit_of_work<'a>(
        uow: &'a mut (dyn UnitOfWork + 'static),
    ) -> DomainResult<&'a Self> {
        uow.as_any_mut()
            .downcast_mut::<Self>()
            .map(|uow| &*uow)
            .ok_or_else(|| {
                DomainError::InvalidTransaction(
                    "unit of work is not a postgres transaction".to_string(),
                )
            })
    }

    async fn finish(mut self: Box<Self>, statement: &'static str) -> DomainResult<()> {
        let result = self.connection()?.batch_execute(statement).await;

        match result {
            Ok(()) => {
                // Returns the connection to the pool
                self.conn.take();
                debug!(statement, "transaction finished");
                Ok(())
            }
            // Drop discards the connection
            Err(e) => Err(DomainError::ServerError(e.into())),
        }
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn commit(self: Box<Self>) -> DomainResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> DomainResult<()> {
        self.finish("ROLLBACK").await
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for PostgresUnitOfWork {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("unit of work not finished cleanly, discarding connection");
            drop(deadpool_postgres::Client::take(conn));
        }
    }
}

/// Hands out PostgreSQL units of work from the shared pool
#[derive(Clone)]
pub struct PostgresUnitOfWorkProvider {
    client: PostgresClient,
}

impl PostgresUnitOfWorkProvider {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UnitOfWorkProvider for PostgresUnitOfWorkProvider {
    #[instrument(skip(self))]
    async fn begin(&self) -> DomainResult<Box<dyn UnitOfWork>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(pool_error_to_domain)?;

        let uow = PostgresUnitOfWork::begin(conn).await?;
        debug!("transaction started");
        Ok(Box::new(uow))
    }

    fn stat(&self) -> PoolStats {
        self.client.stat()
    }
}
