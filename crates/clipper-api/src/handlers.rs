//! Request handlers.

pub mod health;
pub mod jobs;
pub mod storage;

pub use health::*;
pub use jobs::*;
pub use storage::*;
