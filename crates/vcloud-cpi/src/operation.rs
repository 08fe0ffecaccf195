//! The CPI capability set

use std::fmt;
use std::str::FromStr;

/// Every operation a CPI caller may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudOperation {
    CreateStemcell,
    DeleteStemcell,
    CreateVm,
    DeleteVm,
    RebootVm,
    HasVm,
    ConfigureNetworks,
    CreateDisk,
    DeleteDisk,
    AttachDisk,
    DetachDisk,
    GetDiskSizeMb,
    HasDisk,
    ValidateDeployment,
}

impl CloudOperation {
    pub const ALL: [CloudOperation; 14] = [
        CloudOperation::CreateStemcell,
        CloudOperation::DeleteStemcell,
        CloudOperation::CreateVm,
        CloudOperation::DeleteVm,
        CloudOperation::RebootVm,
        CloudOperation::HasVm,
        CloudOperation::ConfigureNetworks,
        CloudOperation::CreateDisk,
        CloudOperation::DeleteDisk,
        CloudOperation::AttachDisk,
        CloudOperation::DetachDisk,
        CloudOperation::GetDiskSizeMb,
        CloudOperation::HasDisk,
        CloudOperation::ValidateDeployment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CloudOperation::CreateStemcell => "create_stemcell",
            CloudOperation::DeleteStemcell => "delete_stemcell",
            CloudOperation::CreateVm => "create_vm",
            CloudOperation::DeleteVm => "delete_vm",
            CloudOperation::RebootVm => "reboot_vm",
            CloudOperation::HasVm => "has_vm",
            CloudOperation::ConfigureNetworks => "configure_networks",
            CloudOperation::CreateDisk => "create_disk",
            CloudOperation::DeleteDisk => "delete_disk",
            CloudOperation::AttachDisk => "attach_disk",
            CloudOperation::DetachDisk => "detach_disk",
            CloudOperation::GetDiskSizeMb => "get_disk_size_mb",
            CloudOperation::HasDisk => "has_disk",
            CloudOperation::ValidateDeployment => "validate_deployment",
        }
    }

    /// Whether [`VCloud`](crate::VCloud) carries this operation out
    pub fn is_implemented(self) -> bool {
        matches!(
            self,
            CloudOperation::CreateDisk
                | CloudOperation::DeleteDisk
                | CloudOperation::AttachDisk
                | CloudOperation::DetachDisk
                | CloudOperation::GetDiskSizeMb
        )
    }
}

impl fmt::Display for CloudOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl fmt::Display for UnknownOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown operation: {}", self.0)
    }
}

impl std::error::Error for UnknownOperation {}

impl FromStr for CloudOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // predicate names may carry a trailing `?`
        let name = s.strip_suffix('?').unwrap_or(s);
        CloudOperation::ALL
            .into_iter()
            .find(|op| op.as_str() == name)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for op in CloudOperation::ALL {
            assert_eq!(op.as_str().parse::<CloudOperation>(), Ok(op));
        }
    }

    #[test]
    fn test_predicate_suffix() {
        assert_eq!("has_disk?".parse(), Ok(CloudOperation::HasDisk));
        assert_eq!("has_vm".parse(), Ok(CloudOperation::HasVm));
    }

    #[test]
    fn test_unknown_name() {
        let err = "launch_rocket".parse::<CloudOperation>().unwrap_err();
        assert_eq!(err, UnknownOperation("launch_rocket".to_string()));
    }

    #[test]
    fn test_only_disk_operations_implemented() {
        let implemented: Vec<_> = CloudOperation::ALL
            .into_iter()
            .filter(|op| op.is_implemented())
            .map(CloudOperation::as_str)
            .collect();
        assert_eq!(
            implemented,
            vec![
                "create_disk",
                "delete_disk",
                "attach_disk",
                "detach_disk",
                "get_disk_size_mb"
            ]
        );
        assert!(!CloudOperation::HasDisk.is_implemented());
    }
}
