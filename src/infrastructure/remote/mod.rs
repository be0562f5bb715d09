//! Remote execution adapters

pub mod keys;
pub mod openssh;

pub use keys::ensure_keypair;
pub use openssh::OpensshChannel;
