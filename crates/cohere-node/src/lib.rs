pub mod error;
pub mod grpc;
pub mod registration;
pub mod retry;
pub mod store;

pub use error::{RegistrationError, StoreError};
pub use registration::RegistrationClient;
pub use store::{FjallStore, KvStore, MemoryStore};
