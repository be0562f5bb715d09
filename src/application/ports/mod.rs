//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod messenger;
pub mod preferences;
pub mod provisioner;
pub mod remote;
pub mod staging;
pub mod transcriber;
pub mod updates;

// Re-export common types
pub use messenger::{Messenger, MessengerError, DEFAULT_TEXT_LIMIT};
pub use preferences::{PreferenceStore, Preferences};
pub use provisioner::{destroy_leftovers, ProvisionError, WorkerProvisioner};
pub use remote::{quote, RemoteChannel, RemoteError, RemoteSession};
pub use staging::{AttachmentRef, InputStager, StagingError};
pub use transcriber::{LocalTranscribeError, LocalTranscriber};
pub use updates::{InboundUpdate, UpdateSource};
