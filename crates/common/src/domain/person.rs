use crate::domain::result::DomainResult;
use crate::domain::unit_of_work::UnitOfWork;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Person domain entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Surrogate key assigned by storage on insert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    pub person_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tenant_id: String,
}

/// Request/response envelope wrapping a single person
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Onboarding {
    pub person: Person,
}

impl Onboarding {
    pub fn new(person: Person) -> Self {
        Self { person }
    }

    /// Envelope carrying only a business key, used for reads
    pub fn for_person_id(person_id: impl Into<String>) -> Self {
        Self {
            person: Person {
                person_id: person_id.into(),
                ..Default::default()
            },
        }
    }
}

/// Input for a point lookup by business key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPersonInput {
    pub person_id: String,
}

/// Input for a range scan starting at (and including) `person_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPersonInput {
    pub person_id: String,
}

/// Repository trait for person storage operations.
///
/// Mutating operations, and reads that feed them, run inside a caller-owned
/// [`UnitOfWork`] on its connection. Plain reads take their own pooled
/// connection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PersonRepository: Send + Sync {
    /// Insert a person, stamping `created_at` and returning the assigned `id`
    async fn add_person(
        &self,
        uow: &mut (dyn UnitOfWork + 'static),
        input: Onboarding,
    ) -> DomainResult<Onboarding>;

    /// Get a person by exact `person_id`
    async fn get_person(&self, input: GetPersonInput) -> DomainResult<Onboarding>;

    /// Get a person inside the unit of work, locking the row until it finishes
    async fn get_person_for_update(
        &self,
        uow: &mut (dyn UnitOfWork + 'static),
        input: GetPersonInput,
    ) -> DomainResult<Onboarding>;

    /// Update `name` and stamp `updated_at`, returning the affected row count
    async fn update_person(
        &self,
        uow: &mut (dyn UnitOfWork + 'static),
        input: &mut Onboarding,
    ) -> DomainResult<u64>;

    /// List every person with `person_id >= input.person_id`, ascending
    async fn list_person(&self, input: ListPersonInput) -> DomainResult<Vec<Onboarding>>;
}
