use common::domain::{
    DomainError, DomainResult, GetPersonInput, ListPersonInput, Onboarding, PersonRepository,
    PoolStats, UnitOfWork, UnitOfWorkProvider,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Domain service for the person onboarding workflow
pub struct OnboardingService {
    person_repository: Arc<dyn PersonRepository>,
    unit_of_work: Arc<dyn UnitOfWorkProvider>,
}

impl OnboardingService {
    pub fn new(
        person_repository: Arc<dyn PersonRepository>,
        unit_of_work: Arc<dyn UnitOfWorkProvider>,
    ) -> Self {
        Self {
            person_repository,
            unit_of_work,
        }
    }

    /// Insert a new person inside its own transaction
    #[instrument(skip(self, input), fields(person_id = %input.person.person_id))]
    pub async fn add_person(&self, input: Onboarding) -> DomainResult<Onboarding> {
        debug!("adding person");

        let mut uow = self.unit_of_work.begin().await?;
        let result = self.person_repository.add_person(uow.as_mut(), input).await;

        finish_unit_of_work(uow, result).await
    }

    /// Rename an existing person.
    ///
    /// The existence check and the update share one transaction and its
    /// connection, with the row locked in between. The returned
    /// value is the caller's input with `updated_at` stamped, not a re-read row.
    #[instrument(skip(self, input), fields(person_id = %input.person.person_id))]
    pub async fn update_person(&self, mut input: Onboarding) -> DomainResult<Onboarding> {
        debug!("updating person");

        let mut uow = self.unit_of_work.begin().await?;
        let result = self.update_existing(uow.as_mut(), &mut input).await;

        finish_unit_of_work(uow, result.map(|_| input)).await
    }

    async fn update_existing(
        &self,
        uow: &mut (dyn UnitOfWork + 'static),
        input: &mut Onboarding,
    ) -> DomainResult<()> {
        self.person_repository
            .get_person_for_update(
                uow,
                GetPersonInput {
                    person_id: input.person.person_id.clone(),
                },
            )
            .await?;

        let rows_affected = self.person_repository.update_person(uow, input).await?;
        if rows_affected == 0 {
            return Err(DomainError::UpdateAffectedZeroRows(
                input.person.person_id.clone(),
            ));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_person(&self, person_id: String) -> DomainResult<Onboarding> {
        self.person_repository
            .get_person(GetPersonInput { person_id })
            .await
    }

    /// Every person whose `person_id` sorts at or after `person_id`
    #[instrument(skip(self))]
    pub async fn list_person(&self, person_id: String) -> DomainResult<Vec<Onboarding>> {
        self.person_repository
            .list_person(ListPersonInput { person_id })
            .await
    }

    pub fn stat(&self) -> PoolStats {
        self.unit_of_work.stat()
    }
}

/// Commits on success and rolls back on failure.
///
/// A failed commit is returned to the caller. A failed rollback is only logged
/// and the original error wins.
pub async fn finish_unit_of_work<T>(
    uow: Box<dyn UnitOfWork>,
    result: DomainResult<T>,
) -> DomainResult<T> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, "failed to roll back unit of work");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use common::domain::{MockPersonRepository, MockUnitOfWorkProvider, Person};
    use std::any::Any;
    use std::sync::Mutex;

    /// Unit of work that records how it was finished
    struct RecordingUnitOfWork {
        log: FinishLog,
        fail_commit: bool,
    }

    #[async_trait]
    impl UnitOfWork for RecordingUnitOfWork {
        async fn commit(self: Box<Self>) -> DomainResult<()> {
            self.log.lock().unwrap().push("commit");
            if self.fail_commit {
                return Err(DomainError::ServerError(anyhow::anyhow!(
                    "connection reset during commit"
                )));
            }
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> DomainResult<()> {
            self.log.lock().unwrap().push("rollback");
            Ok(())
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    type FinishLog = Arc<Mutex<Vec<&'static str>>>;

    fn recording_provider(fail_commit: bool) -> (MockUnitOfWorkProvider, FinishLog) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut provider = MockUnitOfWorkProvider::new();
        let begin_log = log.clone();
        provider.expect_begin().times(1).returning(move || {
            begin_log.lock().unwrap().push("begin");
            Ok(Box::new(RecordingUnitOfWork {
                log: begin_log.clone(),
                fail_commit,
            }) as Box<dyn UnitOfWork>)
        });
        (provider, log)
    }

    fn onboarding(person_id: &str, name: &str) -> Onboarding {
        Onboarding::new(Person {
            person_id: person_id.to_string(),
            name: name.to_string(),
            tenant_id: "T1".to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_add_person_commits() {
        let mut repo = MockPersonRepository::new();
        repo.expect_add_person()
            .withf(|_, input| input.person.person_id == "P1")
            .times(1)
            .returning(|_, mut input| {
                input.person.id = Some(1);
                input.person.created_at = Some(Utc::now());
                Ok(input)
            });
        let (provider, log) = recording_provider(false);

        let service = OnboardingService::new(Arc::new(repo), Arc::new(provider));
        let result = service.add_person(onboarding("P1", "Alice")).await.unwrap();

        assert_eq!(result.person.id, Some(1));
        assert!(result.person.created_at.is_some());
        assert_eq!(*log.lock().unwrap(), vec!["begin", "commit"]);
    }

    #[tokio::test]
    async fn test_add_person_failure_rolls_back() {
        let mut repo = MockPersonRepository::new();
        repo.expect_add_person()
            .times(1)
            .returning(|_, _| Err(DomainError::InsertFailed(anyhow::anyhow!("duplicate key"))));
        let (provider, log) = recording_provider(false);

        let service = OnboardingService::new(Arc::new(repo), Arc::new(provider));
        let result = service.add_person(onboarding("P1", "Alice")).await;

        assert!(matches!(result, Err(DomainError::InsertFailed(_))));
        assert_eq!(*log.lock().unwrap(), vec!["begin", "rollback"]);
    }

    #[tokio::test]
    async fn test_begin_failure_is_returned() {
        let repo = MockPersonRepository::new();
        let mut provider = MockUnitOfWorkProvider::new();
        provider
            .expect_begin()
            .times(1)
            .returning(|| Err(DomainError::Timeout("waiting for database connection".to_string())));

        let service = OnboardingService::new(Arc::new(repo), Arc::new(provider));
        let result = service.add_person(onboarding("P1", "Alice")).await;

        assert!(matches!(result, Err(DomainError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_update_missing_person_never_updates() {
        let mut repo = MockPersonRepository::new();
        repo.expect_get_person_for_update()
            .times(1)
            .returning(|_, input| Err(DomainError::NotFound(input.person_id)));
        repo.expect_update_person().times(0);
        let (provider, log) = recording_provider(false);

        let service = OnboardingService::new(Arc::new(repo), Arc::new(provider));
        let result = service.update_person(onboarding("ghost", "Nobody")).await;

        assert!(matches!(result, Err(DomainError::NotFound(id)) if id == "ghost"));
        assert_eq!(*log.lock().unwrap(), vec!["begin", "rollback"]);
    }

    #[tokio::test]
    async fn test_update_person_returns_stamped_input() {
        let mut repo = MockPersonRepository::new();
        repo.expect_get_person_for_update()
            .times(1)
            .returning(|_, input| Ok(Onboarding::for_person_id(input.person_id)));
        repo.expect_get_person().times(0);
        repo.expect_update_person()
            .times(1)
            .returning(|_, input| {
                input.person.updated_at = Some(Utc::now());
                Ok(1)
            });
        let (provider, log) = recording_provider(false);

        let service = OnboardingService::new(Arc::new(repo), Arc::new(provider));
        let result = service
            .update_person(onboarding("P1", "Alicia"))
            .await
            .unwrap();

        assert_eq!(result.person.name, "Alicia");
        assert!(result.person.updated_at.is_some());
        assert_eq!(*log.lock().unwrap(), vec!["begin", "commit"]);
    }

    #[tokio::test]
    async fn test_update_zero_rows_keeps_kind() {
        let mut repo = MockPersonRepository::new();
        repo.expect_get_person_for_update()
            .returning(|_, input| Ok(Onboarding::for_person_id(input.person_id)));
        repo.expect_update_person().returning(|_, _| Ok(0));
        let (provider, log) = recording_provider(false);

        let service = OnboardingService::new(Arc::new(repo), Arc::new(provider));
        let result = service.update_person(onboarding("P1", "Alicia")).await;

        assert!(matches!(result, Err(DomainError::UpdateAffectedZeroRows(_))));
        assert_eq!(*log.lock().unwrap(), vec!["begin", "rollback"]);
    }

    #[tokio::test]
    async fn test_commit_failure_surfaces() {
        let mut repo = MockPersonRepository::new();
        repo.expect_add_person().returning(|_, input| Ok(input));
        let (provider, log) = recording_provider(true);

        let service = OnboardingService::new(Arc::new(repo), Arc::new(provider));
        let result = service.add_person(onboarding("P1", "Alice")).await;

        assert!(matches!(result, Err(DomainError::ServerError(_))));
        assert_eq!(*log.lock().unwrap(), vec!["begin", "commit"]);
    }

    #[tokio::test]
    async fn test_reads_use_no_transaction() {
        let mut repo = MockPersonRepository::new();
        repo.expect_get_person()
            .times(1)
            .returning(|input| Ok(Onboarding::for_person_id(input.person_id)));
        repo.expect_list_person()
            .withf(|input| input.person_id == "A")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    Onboarding::for_person_id("A"),
                    Onboarding::for_person_id("B"),
                ])
            });
        let mut provider = MockUnitOfWorkProvider::new();
        provider.expect_begin().times(0);

        let service = OnboardingService::new(Arc::new(repo), Arc::new(provider));

        let person = service.get_person("P1".to_string()).await.unwrap();
        assert_eq!(person.person.person_id, "P1");

        let listed = service.list_person("A".to_string()).await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_stat_delegates_to_provider() {
        let repo = MockPersonRepository::new();
        let mut provider = MockUnitOfWorkProvider::new();
        provider.expect_stat().returning(|| PoolStats {
            max_size: 10,
            size: 2,
            available: 1,
            waiting: 0,
        });

        let service = OnboardingService::new(Arc::new(repo), Arc::new(provider));
        let stats = service.stat();

        assert_eq!(stats.max_size, 10);
        assert_eq!(stats.size, 2);
    }
}
