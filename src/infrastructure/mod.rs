//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with external systems like OpenSSH, tfcmd, the Telegram
//! Bot API, and the local transcription engine.

pub mod messaging;
pub mod preferences;
pub mod provisioning;
pub mod remote;
pub mod transcription;

// Re-export adapters
pub use messaging::TelegramMessenger;
pub use preferences::FilePreferenceStore;
pub use provisioning::{FixedAddressProvisioner, TfcmdProvisioner};
pub use remote::{ensure_keypair, OpensshChannel};
pub use transcription::EngineCliTranscriber;
