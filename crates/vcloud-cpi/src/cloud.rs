//! The `VCloud` operation facade

use crate::error::{CpiError, Result};
use crate::operation::CloudOperation;
use serde_json::{Value, json};
use std::path::Path;
use vcloud_client::{ClientError, Entity, InvokeOptions, Method, Task, VCloudClient};
use vcloud_config::Settings;
use vcloud_steps::{AttachDisk, CreateDisk, DetachDisk, Pipeline};

const BYTES_PER_MB: u64 = 1024 * 1024;
const DISK_NAME_PREFIX: &str = "cpi-disk-";

/// Resolve the operation behind `method`, if it is one this facade carries out
pub fn implemented_operation(method: &str) -> Result<CloudOperation> {
    method
        .parse::<CloudOperation>()
        .ok()
        .filter(|op| op.is_implemented())
        .ok_or_else(|| CpiError::Unsupported(method.to_string()))
}

pub struct VCloud {
    client: VCloudClient,
}

impl VCloud {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self::with_client(VCloudClient::new(settings)?))
    }

    pub fn with_client(client: VCloudClient) -> Self {
        Self { client }
    }

    /// Facade over the settings at `path`, or the discovered settings file
    pub fn from_config(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Settings::load(path)?,
            None => Settings::discover()?,
        };
        Self::new(&settings)
    }

    pub fn client(&self) -> &VCloudClient {
        &self.client
    }

    /// Run `method` with its positional arguments
    pub async fn dispatch(&self, method: &str, arguments: &[Value]) -> Result<Value> {
        let operation = implemented_operation(method)?;
        let args = Arguments::new(operation, arguments);
        tracing::info!("{} {:?}", operation, arguments);

        match operation {
            CloudOperation::CreateDisk => {
                let cid = self.create_disk(args.integer(0)?).await?;
                Ok(Value::String(cid))
            }
            CloudOperation::DeleteDisk => {
                self.delete_disk(args.string(0)?).await?;
                Ok(Value::Null)
            }
            CloudOperation::AttachDisk => {
                self.attach_disk(args.string(0)?, args.string(1)?).await?;
                Ok(Value::Null)
            }
            CloudOperation::DetachDisk => {
                self.detach_disk(args.string(0)?, args.string(1)?).await?;
                Ok(Value::Null)
            }
            CloudOperation::GetDiskSizeMb => Ok(json!(self.get_disk_size_mb(args.string(0)?).await?)),
            other => Err(CpiError::Unsupported(other.as_str().to_string())),
        }
    }

    /// Create an independent disk; returns its id
    pub async fn create_disk(&self, size_mb: u64) -> Result<String> {
        let name = format!("{}{}", DISK_NAME_PREFIX, chrono::Utc::now().timestamp_millis());
        let state = Pipeline::new("create_disk")
            .step(CreateDisk::new(name, size_mb))
            .run(&self.client)
            .await?;

        let disk: Entity = state.get(CreateDisk::STATE_KEY)?.ok_or_else(|| {
            ClientError::UnexpectedResponse("disk creation left no disk behind".to_string())
        })?;
        Ok(disk.cid().to_string())
    }

    pub async fn delete_disk(&self, disk_id: &str) -> Result<()> {
        let disk = self.client.resolve_entity(disk_id).await?;
        let reply = self
            .client
            .invoke(Method::DELETE, &disk, InvokeOptions::new())
            .await?;
        if !reply.is_empty() {
            let task: Task = reply.parse()?;
            self.client.wait_task(&task).await?;
        }
        tracing::info!("Deleted disk {}", disk_id);
        Ok(())
    }

    pub async fn attach_disk(&self, vm_id: &str, disk_id: &str) -> Result<()> {
        let vm = self.client.resolve_entity(vm_id).await?;
        let disk = self.client.resolve_entity(disk_id).await?;
        Pipeline::new("attach_disk")
            .step(AttachDisk::new(vm, disk))
            .run(&self.client)
            .await?;
        Ok(())
    }

    pub async fn detach_disk(&self, vm_id: &str, disk_id: &str) -> Result<()> {
        let vm = self.client.resolve_entity(vm_id).await?;
        let disk = self.client.resolve_entity(disk_id).await?;
        Pipeline::new("detach_disk")
            .step(DetachDisk::new(vm, disk))
            .run(&self.client)
            .await?;
        Ok(())
    }

    pub async fn get_disk_size_mb(&self, disk_id: &str) -> Result<u64> {
        let disk = self.client.resolve_entity(disk_id).await?;
        let bytes: u64 = disk.attribute("size").ok_or_else(|| {
            ClientError::UnexpectedResponse(format!("disk {} reports no size", disk_id))
        })?;
        Ok(bytes / BYTES_PER_MB)
    }

    /// Log in and resolve the configured organization and datacenter
    pub async fn check(&self) -> Result<(Entity, Entity)> {
        let org = self.client.org().await?;
        let vdc = self.client.vdc().await?;
        Ok((org, vdc))
    }
}

/// Positional arguments of one call
struct Arguments<'a> {
    operation: CloudOperation,
    values: &'a [Value],
}

impl<'a> Arguments<'a> {
    fn new(operation: CloudOperation, values: &'a [Value]) -> Self {
        Self { operation, values }
    }

    fn get(&self, index: usize) -> Result<&'a Value> {
        self.values
            .get(index)
            .ok_or_else(|| self.invalid(format!("missing argument {}", index)))
    }

    fn string(&self, index: usize) -> Result<&'a str> {
        self.get(index)?
            .as_str()
            .ok_or_else(|| self.invalid(format!("argument {} must be a string", index)))
    }

    fn integer(&self, index: usize) -> Result<u64> {
        self.get(index)?
            .as_u64()
            .ok_or_else(|| self.invalid(format!("argument {} must be a positive integer", index)))
    }

    fn invalid(&self, message: String) -> CpiError {
        CpiError::InvalidArguments {
            method: self.operation.as_str().to_string(),
            message,
        }
    }
}
