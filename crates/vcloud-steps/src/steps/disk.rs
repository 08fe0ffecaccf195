use super::{required_link, wait_for_reply};
use crate::error::Result;
use crate::pipeline::Step;
use crate::state::StateBag;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use vcloud_client::{Entity, InvokeOptions, Method, VCloudClient, media_type, rel};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Independent disk in the configured virtual datacenter
pub struct CreateDisk {
    name: String,
    size_mb: u64,
}

impl CreateDisk {
    pub const STATE_KEY: &'static str = "disk";

    pub fn new(name: impl Into<String>, size_mb: u64) -> Self {
        Self {
            name: name.into(),
            size_mb,
        }
    }
}

#[async_trait]
impl Step for CreateDisk {
    fn name(&self) -> &str {
        "CreateDisk"
    }

    async fn perform(&self, client: &VCloudClient, state: &mut StateBag) -> Result<()> {
        let vdc = client.vdc().await?;
        let link = required_link(&vdc, rel::ADD, media_type::DISK_CREATE_PARAMS, "add disk")?;

        let payload = json!({
            "disk": {
                "name": self.name,
                "size": self.size_mb * BYTES_PER_MB,
            }
        });
        let disk = client
            .invoke(
                Method::POST,
                link,
                InvokeOptions::new().payload(payload, media_type::DISK_CREATE_PARAMS),
            )
            .await?
            .entity()?;

        // The disk exists from here on, even when its creation task fails
        let disk = match client.wait_entity(&disk).await {
            Ok(disk) => disk,
            Err(e) => {
                if let Err(cleanup) = delete_disk(client, &disk).await {
                    tracing::error!(
                        "Could not remove disk {} after failed creation: {}",
                        disk.cid(),
                        cleanup
                    );
                }
                return Err(e.into());
            }
        };
        tracing::info!("Created disk {} ({} MB) as {}", self.name, self.size_mb, disk.cid());
        state.insert(Self::STATE_KEY, &disk)
    }

    async fn rollback(&self, client: &VCloudClient, state: &mut StateBag) -> Result<()> {
        let Some(disk) = state.get::<Entity>(Self::STATE_KEY)? else {
            return Ok(());
        };

        delete_disk(client, &disk).await?;
        state.remove(Self::STATE_KEY);
        Ok(())
    }
}

async fn delete_disk(client: &VCloudClient, disk: &Entity) -> Result<()> {
    let reply = client
        .invoke(Method::DELETE, disk, InvokeOptions::new())
        .await?;
    wait_for_reply(client, reply).await?;
    tracing::info!("Deleted disk {}", disk.cid());
    Ok(())
}

/// Disk and the VM it was attached to or detached from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskPlacement {
    pub vm: Entity,
    pub disk: Entity,
}

#[derive(Debug, Clone, Copy)]
enum DiskAction {
    Attach,
    Detach,
}

impl DiskAction {
    fn rel(self) -> &'static str {
        match self {
            DiskAction::Attach => rel::DISK_ATTACH,
            DiskAction::Detach => rel::DISK_DETACH,
        }
    }

    fn label(self) -> &'static str {
        match self {
            DiskAction::Attach => "disk attach",
            DiskAction::Detach => "disk detach",
        }
    }

    fn reverse(self) -> Self {
        match self {
            DiskAction::Attach => DiskAction::Detach,
            DiskAction::Detach => DiskAction::Attach,
        }
    }
}

/// Attach or detach `disk` on the current version of `vm`
async fn apply(
    client: &VCloudClient,
    action: DiskAction,
    vm: &Entity,
    disk: &Entity,
) -> Result<Entity> {
    let vm = client.reload(vm).await?;
    let link = required_link(
        &vm,
        action.rel(),
        media_type::DISK_ATTACH_DETACH_PARAMS,
        action.label(),
    )?;

    let payload = json!({ "disk": disk.to_link() });
    let reply = client
        .invoke(
            Method::POST,
            link,
            InvokeOptions::new().payload(payload, media_type::DISK_ATTACH_DETACH_PARAMS),
        )
        .await?;
    wait_for_reply(client, reply).await?;

    tracing::info!("{} of {} on {} done", action.label(), disk.cid(), vm.describe());
    Ok(vm)
}

/// Shared body of the attach and detach steps
async fn perform_placement(
    client: &VCloudClient,
    state: &mut StateBag,
    action: DiskAction,
    key: &str,
    vm: &Entity,
    disk: &Entity,
) -> Result<()> {
    let vm = apply(client, action, vm, disk).await?;
    state.insert(
        key,
        &DiskPlacement {
            vm,
            disk: disk.clone(),
        },
    )
}

async fn undo_placement(
    client: &VCloudClient,
    state: &mut StateBag,
    action: DiskAction,
    key: &str,
) -> Result<()> {
    let Some(placement) = state.get::<DiskPlacement>(key)? else {
        return Ok(());
    };

    apply(client, action.reverse(), &placement.vm, &placement.disk).await?;
    state.remove(key);
    Ok(())
}

pub struct AttachDisk {
    vm: Entity,
    disk: Entity,
}

impl AttachDisk {
    pub const STATE_KEY: &'static str = "attached_disk";

    pub fn new(vm: Entity, disk: Entity) -> Self {
        Self { vm, disk }
    }
}

#[async_trait]
impl Step for AttachDisk {
    fn name(&self) -> &str {
        "AttachDisk"
    }

    async fn perform(&self, client: &VCloudClient, state: &mut StateBag) -> Result<()> {
        perform_placement(
            client,
            state,
            DiskAction::Attach,
            Self::STATE_KEY,
            &self.vm,
            &self.disk,
        )
        .await
    }

    async fn rollback(&self, client: &VCloudClient, state: &mut StateBag) -> Result<()> {
        undo_placement(client, state, DiskAction::Attach, Self::STATE_KEY).await
    }
}

pub struct DetachDisk {
    vm: Entity,
    disk: Entity,
}

impl DetachDisk {
    pub const STATE_KEY: &'static str = "detached_disk";

    pub fn new(vm: Entity, disk: Entity) -> Self {
        Self { vm, disk }
    }
}

#[async_trait]
impl Step for DetachDisk {
    fn name(&self) -> &str {
        "DetachDisk"
    }

    async fn perform(&self, client: &VCloudClient, state: &mut StateBag) -> Result<()> {
        perform_placement(
            client,
            state,
            DiskAction::Detach,
            Self::STATE_KEY,
            &self.vm,
            &self.disk,
        )
        .await
    }

    async fn rollback(&self, client: &VCloudClient, state: &mut StateBag) -> Result<()> {
        undo_placement(client, state, DiskAction::Detach, Self::STATE_KEY).await
    }
}
