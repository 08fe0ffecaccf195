//! vCloud Director cloud provider interface
//!
//! [`CloudOperation`] lists every operation a CPI caller can ask for and
//! [`VCloud`] carries out the ones this provider implements. Anything else
//! is rejected with [`CpiError::Unsupported`].

pub mod cloud;
pub mod error;
pub mod operation;
pub mod rpc;

// Re-exports
pub use cloud::VCloud;
pub use error::{CpiError, Result};
pub use operation::{CloudOperation, UnknownOperation};
pub use rpc::{RpcError, RpcRequest, RpcResponse};
