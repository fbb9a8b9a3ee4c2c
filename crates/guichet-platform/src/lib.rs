//! # guichet-platform
//!
//! The seam between Guichet and the host chat platform.
//!
//! The ticket system only ever talks to the outside world through the
//! [`Platform`] trait: channel lifecycle, message delivery, history reads,
//! role and permission lookups. A production deployment implements the trait
//! against a concrete gateway library; [`MemoryPlatform`] is the in-process
//! implementation used by tests and the sandbox console.

pub mod memory;
pub mod platform;
pub mod types;

mod error;

pub use error::PlatformError;
pub use memory::{FailPoint, MemoryPlatform};
pub use platform::Platform;
pub use types::*;
