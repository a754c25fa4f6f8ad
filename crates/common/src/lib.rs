pub mod domain;
pub mod http;
pub mod nats;
pub mod postgres;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockObjectStore;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockPersonRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockUnitOfWorkProvider;
