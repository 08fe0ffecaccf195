//! Concrete steps

mod catalog;
mod disk;

pub use catalog::AddCatalogItem;
pub use disk::{AttachDisk, CreateDisk, DetachDisk, DiskPlacement};

use crate::error::{Result, StepError};
use vcloud_client::{Entity, Link, Reply, Task, VCloudClient};

/// Link on `entity` with `rel` and `media_type`, or a step error naming both
pub(crate) fn required_link<'a>(
    entity: &'a Entity,
    rel: &str,
    media_type: &str,
    link: &'static str,
) -> Result<&'a Link> {
    entity
        .link(rel, media_type)
        .ok_or_else(|| StepError::MissingLink {
            entity: entity.describe().to_string(),
            link,
        })
}

/// Wait for the task a mutating call answered with, if it answered with one
pub(crate) async fn wait_for_reply(client: &VCloudClient, reply: Reply) -> Result<()> {
    if reply.is_empty() {
        return Ok(());
    }
    let task: Task = reply.parse()?;
    client.wait_task(&task).await?;
    Ok(())
}
