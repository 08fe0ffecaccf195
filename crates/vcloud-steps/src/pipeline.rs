//! Step trait and the pipeline runner

use crate::error::{PipelineError, Result, RollbackFailure};
use crate::state::StateBag;
use async_trait::async_trait;
use vcloud_client::VCloudClient;

/// One unit of a multi-step mutation
///
/// `perform` records whatever `rollback` needs in the state bag. `rollback`
/// must be a no-op when that record is missing, and drops it once undone.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn perform(&self, client: &VCloudClient, state: &mut StateBag) -> Result<()>;

    async fn rollback(&self, client: &VCloudClient, state: &mut StateBag) -> Result<()>;
}

/// Ordered steps run against one client
pub struct Pipeline {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub async fn run(&self, client: &VCloudClient) -> std::result::Result<StateBag, PipelineError> {
        self.run_with(client, StateBag::new()).await
    }

    /// Run every step in order, starting from `state`
    ///
    /// On the first failure the steps that completed are rolled back in
    /// reverse and the failure is returned.
    pub async fn run_with(
        &self,
        client: &VCloudClient,
        mut state: StateBag,
    ) -> std::result::Result<StateBag, PipelineError> {
        tracing::debug!("{}: running {} step(s)", self.name, self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            tracing::debug!("{}: {}", self.name, step.name());

            if let Err(source) = step.perform(client, &mut state).await {
                tracing::warn!(
                    "{}: {} failed ({}), rolling back {} step(s)",
                    self.name,
                    step.name(),
                    source,
                    index
                );
                let rollback_failures = self.unwind(client, &mut state, index).await;
                return Err(PipelineError {
                    pipeline: self.name.clone(),
                    step: step.name().to_string(),
                    source,
                    rollback_failures,
                });
            }
        }

        tracing::info!("{}: completed", self.name);
        Ok(state)
    }

    async fn unwind(
        &self,
        client: &VCloudClient,
        state: &mut StateBag,
        completed: usize,
    ) -> Vec<RollbackFailure> {
        let mut failures = Vec::new();

        for step in self.steps[..completed].iter().rev() {
            match step.rollback(client, state).await {
                Ok(()) => tracing::debug!("{}: rolled back {}", self.name, step.name()),
                Err(error) => {
                    tracing::error!(
                        "{}: rollback of {} failed: {}",
                        self.name,
                        step.name(),
                        error
                    );
                    failures.push(RollbackFailure {
                        step: step.name().to_string(),
                        error,
                    });
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use std::sync::{Arc, Mutex};
    use vcloud_client::testing::fake_client;

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Records its calls; keeps its undo handle under its own name
    struct Recording {
        name: String,
        fail_perform: bool,
        fail_rollback: bool,
        journal: Journal,
    }

    impl Recording {
        fn new(name: &str, journal: &Journal) -> Self {
            Self {
                name: name.to_string(),
                fail_perform: false,
                fail_rollback: false,
                journal: journal.clone(),
            }
        }

        fn failing(mut self) -> Self {
            self.fail_perform = true;
            self
        }

        fn failing_rollback(mut self) -> Self {
            self.fail_rollback = true;
            self
        }

        fn note(&self, entry: String) {
            self.journal.lock().unwrap().push(entry);
        }
    }

    #[async_trait]
    impl Step for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        async fn perform(&self, _client: &VCloudClient, state: &mut StateBag) -> Result<()> {
            self.note(format!("perform {}", self.name));
            if self.fail_perform {
                return Err(StepError::Failed(format!("{} broke", self.name)));
            }
            state.insert(self.name.clone(), &true)
        }

        async fn rollback(&self, _client: &VCloudClient, state: &mut StateBag) -> Result<()> {
            if !state.contains(&self.name) {
                return Ok(());
            }
            self.note(format!("rollback {}", self.name));
            if self.fail_rollback {
                return Err(StepError::Failed(format!("{} stuck", self.name)));
            }
            state.remove(&self.name);
            Ok(())
        }
    }

    fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_all_steps_performed_in_order() {
        let (client, _, _) = fake_client(None);
        let journal = journal();
        let pipeline = Pipeline::new("three")
            .step(Recording::new("one", &journal))
            .step(Recording::new("two", &journal))
            .step(Recording::new("three", &journal));

        let state = pipeline.run(&client).await.unwrap();

        assert_eq!(
            entries(&journal),
            vec!["perform one", "perform two", "perform three"]
        );
        assert_eq!(state.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_completed_steps_only() {
        let (client, _, _) = fake_client(None);
        let journal = journal();
        let pipeline = Pipeline::new("three")
            .step(Recording::new("one", &journal))
            .step(Recording::new("two", &journal).failing())
            .step(Recording::new("three", &journal));

        let err = pipeline.run(&client).await.unwrap_err();

        assert_eq!(
            entries(&journal),
            vec!["perform one", "perform two", "rollback one"]
        );
        assert_eq!(err.step, "two");
        assert!(matches!(err.source, StepError::Failed(ref m) if m == "two broke"));
        assert!(err.rolled_back_cleanly());
    }

    #[tokio::test]
    async fn test_rollback_runs_in_reverse() {
        let (client, _, _) = fake_client(None);
        let journal = journal();
        let pipeline = Pipeline::new("four")
            .step(Recording::new("one", &journal))
            .step(Recording::new("two", &journal))
            .step(Recording::new("three", &journal))
            .step(Recording::new("four", &journal).failing());

        pipeline.run(&client).await.unwrap_err();

        assert_eq!(
            entries(&journal)[4..].to_vec(),
            vec!["rollback three", "rollback two", "rollback one"]
        );
    }

    #[tokio::test]
    async fn test_rollback_failure_keeps_original_error() {
        let (client, _, _) = fake_client(None);
        let journal = journal();
        let pipeline = Pipeline::new("two")
            .step(Recording::new("one", &journal).failing_rollback())
            .step(Recording::new("two", &journal).failing());

        let err = pipeline.run(&client).await.unwrap_err();

        assert!(matches!(err.source, StepError::Failed(ref m) if m == "two broke"));
        assert_eq!(err.rollback_failures.len(), 1);
        assert_eq!(err.rollback_failures[0].step, "one");
        assert!(!err.rolled_back_cleanly());
    }

    #[tokio::test]
    async fn test_every_rollback_failure_is_reported() {
        let (client, _, _) = fake_client(None);
        let journal = journal();
        let pipeline = Pipeline::new("four")
            .step(Recording::new("one", &journal))
            .step(Recording::new("two", &journal).failing_rollback())
            .step(Recording::new("three", &journal).failing_rollback())
            .step(Recording::new("four", &journal).failing());

        let err = pipeline.run(&client).await.unwrap_err();

        let failed: Vec<&str> = err
            .rollback_failures
            .iter()
            .map(|f| f.step.as_str())
            .collect();
        assert_eq!(failed, vec!["three", "two"]);
        assert_eq!(
            entries(&journal)[4..].to_vec(),
            vec!["rollback three", "rollback two", "rollback one"]
        );
        assert!(matches!(err.source, StepError::Failed(ref m) if m == "four broke"));
    }

    #[tokio::test]
    async fn test_rollback_without_perform_is_noop() {
        let (client, _, _) = fake_client(None);
        let journal = journal();
        let step = Recording::new("one", &journal);
        let mut state = StateBag::new();
        state.insert("unrelated", &1).unwrap();

        step.rollback(&client, &mut state).await.unwrap();

        assert!(entries(&journal).is_empty());
        assert_eq!(state.len(), 1);
        assert!(state.contains("unrelated"));
    }

    #[tokio::test]
    async fn test_first_step_failure_has_nothing_to_undo() {
        let (client, _, _) = fake_client(None);
        let journal = journal();
        let pipeline = Pipeline::new("one").step(Recording::new("one", &journal).failing());

        let err = pipeline.run(&client).await.unwrap_err();

        assert_eq!(entries(&journal), vec!["perform one"]);
        assert!(err.rollback_failures.is_empty());
    }
}
