use crate::domain::{
    DomainError, DomainResult, GetPersonInput, ListPersonInput, Onboarding, Person,
    PersonRepository, UnitOfWork,
};
use crate::postgres::{pool_error_to_domain, PostgresClient, PostgresUnitOfWork};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, instrument};

/// Current time at the precision TIMESTAMPTZ stores, so returned values match later reads
fn storage_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

const PERSON_SELECT_COLUMNS: &str = "id, person_id, name, created_at, updated_at, tenant_id";

/// Person row for PostgreSQL storage
#[derive(Debug, Clone)]
pub struct PersonRow {
    pub id: i32,
    pub person_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tenant_id: String,
}

impl TryFrom<&tokio_postgres::Row> for PersonRow {
    type Error = tokio_postgres::Error;

    fn try_from(row: &tokio_postgres::Row) -> Result<Self, Self::Error> {
        Ok(PersonRow {
            id: row.try_get("id")?,
            person_id: row.try_get("person_id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            tenant_id: row.try_get("tenant_id")?,
        })
    }
}

impl From<PersonRow> for Onboarding {
    fn from(row: PersonRow) -> Self {
        Onboarding::new(Person {
            id: Some(row.id),
            person_id: row.person_id,
            name: row.name,
            created_at: Some(row.created_at),
            updated_at: row.updated_at,
            tenant_id: row.tenant_id,
        })
    }
}

fn onboarding_from_row(row: &tokio_postgres::Row) -> DomainResult<Onboarding> {
    PersonRow::try_from(row)
        .map(Onboarding::from)
        .map_err(|e| DomainError::ServerError(e.into()))
}

/// PostgreSQL implementation of PersonRepository trait
#[derive(Clone)]
pub struct PostgresPersonRepository {
    client: PostgresClient,
}

impl PostgresPersonRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PersonRepository for PostgresPersonRepository {
    #[instrument(skip(self, uow, input), fields(person_id = %input.person.person_id))]
    async fn add_person(
        &self,
        uow: &mut (dyn UnitOfWork + 'static),
        mut input: Onboarding,
    ) -> DomainResult<Onboarding> {
        let conn = PostgresUnitOfWork::from_unit_of_work(uow)?.connection()?;

        let now = storage_now();
        input.person.created_at = Some(now);
        input.person.updated_at = None;

        let result = conn
            .query_one(
                "INSERT INTO person (person_id, name, created_at, tenant_id)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id",
                &[
                    &input.person.person_id,
                    &input.person.name,
                    &now,
                    &input.person.tenant_id,
                ],
            )
            .await;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                if let Some(db_err) = e.as_db_error() {
                    // PostgreSQL error code 23505 is unique_violation
                    if db_err.code().code() == "23505" {
                        return Err(DomainError::InsertFailed(anyhow::Error::new(e).context(
                            format!("person {} already exists", input.person.person_id),
                        )));
                    }
                }
                return Err(DomainError::InsertFailed(e.into()));
            }
        };

        let id: i32 = row
            .try_get("id")
            .map_err(|e| DomainError::InsertFailed(e.into()))?;
        input.person.id = Some(id);

        debug!(id, person_id = %input.person.person_id, "person inserted");

        Ok(input)
    }

    #[instrument(skip(self, input), fields(person_id = %input.person_id))]
    async fn get_person(&self, input: GetPersonInput) -> DomainResult<Onboarding> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(pool_error_to_domain)?;

        debug!(person_id = %input.person_id, "fetching person from database");

        let query = format!(
            "SELECT {} FROM person WHERE person_id = $1 LIMIT 1",
            PERSON_SELECT_COLUMNS
        );
        let row = conn
            .query_opt(query.as_str(), &[&input.person_id])
            .await
            .map_err(|e| DomainError::ServerError(e.into()))?;

        match row {
            Some(row) => onboarding_from_row(&row),
            None => Err(DomainError::NotFound(input.person_id)),
        }
    }

    #[instrument(skip(self, uow, input), fields(person_id = %input.person_id))]
    async fn get_person_for_update(
        &self,
        uow: &mut (dyn UnitOfWork + 'static),
        input: GetPersonInput,
    ) -> DomainResult<Onboarding> {
        let conn = PostgresUnitOfWork::from_unit_of_work(uow)?.connection()?;

        let query = format!(
            "SELECT {} FROM person WHERE person_id = $1 LIMIT 1 FOR UPDATE",
            PERSON_SELECT_COLUMNS
        );
        let row = conn
            .query_opt(query.as_str(), &[&input.person_id])
            .await
            .map_err(|e| DomainError::ServerError(e.into()))?;

        match row {
            Some(row) => onboarding_from_row(&row),
            None => Err(DomainError::NotFound(input.person_id)),
        }
    }

    #[instrument(skip(self, uow, input), fields(person_id = %input.person.person_id))]
    async fn update_person(
        &self,
        uow: &mut (dyn UnitOfWork + 'static),
        input: &mut Onboarding,
    ) -> DomainResult<u64> {
        let conn = PostgresUnitOfWork::from_unit_of_work(uow)?.connection()?;

        let now = storage_now();
        input.person.updated_at = Some(now);

        let rows_affected = conn
            .execute(
                "UPDATE person
                 SET name = $2, updated_at = $3
                 WHERE person_id = $1",
                &[&input.person.person_id, &input.person.name, &now],
            )
            .await
            .map_err(|e| DomainError::UpdateFailed(e.into()))?;

        if rows_affected == 0 {
            return Err(DomainError::UpdateAffectedZeroRows(
                input.person.person_id.clone(),
            ));
        }

        debug!(rows_affected, person_id = %input.person.person_id, "person updated");

        Ok(rows_affected)
    }

    #[instrument(skip(self, input), fields(person_id = %input.person_id))]
    async fn list_person(&self, input: ListPersonInput) -> DomainResult<Vec<Onboarding>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(pool_error_to_domain)?;

        let query = format!(
            "SELECT {} FROM person WHERE person_id >= $1 ORDER BY person_id ASC",
            PERSON_SELECT_COLUMNS
        );
        let rows = conn
            .query(query.as_str(), &[&input.person_id])
            .await
            .map_err(|e| DomainError::ServerError(e.into()))?;

        let persons = rows
            .iter()
            .map(onboarding_from_row)
            .collect::<DomainResult<Vec<_>>>()?;

        debug!(count = persons.len(), "listed persons");

        Ok(persons)
    }
}
