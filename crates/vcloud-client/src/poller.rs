//! Waiting on remote tasks
//!
//! Long-running operations answer with an entity carrying tasks. The
//! poller reloads the queued and running ones every `wait_delay` until they
//! reach a terminal status or `wait_max` runs out, then checks the entity's
//! task list once more.

use crate::client::VCloudClient;
use crate::entity::{Entity, Task};
use crate::error::{ClientError, Result};
use chrono::{DateTime, Utc};

impl VCloudClient {
    /// Wait for every pending task on `entity`; any failed task is an error
    pub async fn wait_entity(&self, entity: &Entity) -> Result<Entity> {
        self.wait_entity_inner(entity, false).await
    }

    /// Like [`wait_entity`](Self::wait_entity), but failed tasks are tolerated
    pub async fn wait_entity_accepting_failure(&self, entity: &Entity) -> Result<Entity> {
        self.wait_entity_inner(entity, true).await
    }

    pub async fn wait_task(&self, task: &Task) -> Result<Task> {
        let started = self.clock().now();
        self.wait_task_inner(task, task.href.as_str(), started, false)
            .await
    }

    pub async fn wait_task_accepting_failure(&self, task: &Task) -> Result<Task> {
        let started = self.clock().now();
        self.wait_task_inner(task, task.href.as_str(), started, true)
            .await
    }

    async fn wait_entity_inner(&self, entity: &Entity, accept_failure: bool) -> Result<Entity> {
        let started = self.clock().now();
        let mut current = self.reload(entity).await?;

        // The entity can still list a task as pending after the task itself
        // finished, so keep going until a reload shows none.
        loop {
            let pending: Vec<Task> = current.pending_tasks().into_iter().cloned().collect();
            if pending.is_empty() {
                break;
            }

            tracing::debug!(
                "Waiting on {} pending task(s) of {}",
                pending.len(),
                current.describe()
            );
            for task in &pending {
                self.wait_task_inner(task, current.describe(), started, accept_failure)
                    .await?;
            }
            current = self.reload(&current).await?;
        }

        check_tasks(&current, accept_failure)?;
        Ok(current)
    }

    async fn wait_task_inner(
        &self,
        task: &Task,
        owner: &str,
        started: DateTime<Utc>,
        accept_failure: bool,
    ) -> Result<Task> {
        let control = self.control();
        let mut current = task.clone();

        while !current.status.is_terminal() {
            let waited = (self.clock().now() - started).to_std().unwrap_or_default();
            if waited >= control.wait_max() {
                tracing::warn!(
                    "Gave up on {} for {} after {}s",
                    current.label(),
                    owner,
                    waited.as_secs()
                );
                return Err(ClientError::Timeout {
                    entity: owner.to_string(),
                    operation: current.label().to_string(),
                    waited_secs: waited.as_secs(),
                });
            }

            self.clock().sleep(control.wait_delay()).await;
            current = self.reload_task(&current).await?;
            tracing::debug!("Task {} on {} is {}", current.id, owner, current.status);
        }

        if current.status.is_failure() {
            if accept_failure {
                tracing::info!("Task {} on {} failed, continuing", current, owner);
            } else {
                tracing::error!("Task {} on {} finished as {}", current.id, owner, current.status);
                return Err(ClientError::TaskFailed {
                    urn: current.id.clone(),
                    operation: current.label().to_string(),
                });
            }
        }
        Ok(current)
    }
}

fn check_tasks(entity: &Entity, accept_failure: bool) -> Result<()> {
    if !accept_failure {
        let failed = describe_tasks(entity, |t| t.status.is_failure());
        if !failed.is_empty() {
            return Err(ClientError::TasksFailed {
                entity: entity.describe().to_string(),
                tasks: failed,
            });
        }
    }

    let unfinished = describe_tasks(entity, |t| !t.status.is_terminal());
    if !unfinished.is_empty() {
        return Err(ClientError::InconsistentTasks {
            entity: entity.describe().to_string(),
            tasks: unfinished,
        });
    }
    Ok(())
}

fn describe_tasks(entity: &Entity, pick: impl Fn(&Task) -> bool) -> String {
    entity
        .tasks
        .iter()
        .filter(|t| pick(t))
        .map(Task::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
