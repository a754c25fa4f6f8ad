use crate::domain::result::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Snapshot of connection pool health
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub max_size: usize,
    pub size: usize,
    pub available: usize,
    pub waiting: usize,
}

/// A scoped database transaction holding one pooled connection.
///
/// `commit` and `rollback` consume the unit of work, so at most one of them
/// can run. The connection goes back to the pool when the unit of work is
/// consumed. A unit of work dropped without finishing must not return an
/// in-transaction connection to the pool.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self: Box<Self>) -> DomainResult<()>;

    async fn rollback(self: Box<Self>) -> DomainResult<()>;

    /// Lets a storage adapter recover its concrete transaction type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Source of units of work and pool statistics
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UnitOfWorkProvider: Send + Sync {
    /// Acquire a connection and begin a transaction on it
    async fn begin(&self) -> DomainResult<Box<dyn UnitOfWork>>;

    fn stat(&self) -> PoolStats;
}
