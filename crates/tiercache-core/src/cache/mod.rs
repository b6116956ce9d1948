//! Cache management module

mod backend;
mod callback;
mod manager;
mod queue;
mod router;

pub use backend::{Backend, ParseBackendError};
pub use callback::{CallbackDispatcher, CallbackQueue};
pub use manager::CacheManager;
pub use queue::Pending;
