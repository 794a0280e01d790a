//! Backend abstraction layer
//!
//! Provides the traits and types that a native effect compiler / device
//! implements, plus a dummy reference backend for tests and tooling.

pub mod traits;
pub mod types;

#[cfg(feature = "dummy")]
pub mod dummy;

pub use traits::*;
pub use types::*;

#[cfg(feature = "dummy")]
pub use dummy::DummyBackend;
