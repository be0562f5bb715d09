//! Worker provisioning adapters

pub mod fixed;
pub mod tfcmd;

pub use fixed::FixedAddressProvisioner;
pub use tfcmd::TfcmdProvisioner;
