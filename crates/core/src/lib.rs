//! Core library for the Lyricstator native bootstrap.
//!
//! The crate covers the narrow strip between a host platform and the
//! engine's native code: resolving the microphone-capture permission
//! without blocking, loading the ordered chain of shared libraries exactly
//! once, and raising the native-ready signal the engine waits for. Each
//! module owns one of those concerns; the host adapter wires them together
//! through [`BootstrapController`].

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod loader;
pub mod permission;
pub mod sequencer;

pub use bootstrap::{BootstrapController, BootstrapObserver, BootstrapStatus};
pub use config::{BootstrapConfig, CaptureConfig, LibraryConfig};
pub use error::{BootstrapError, DynError, Result};
pub use loader::{platform_library_filename, DynamicLibraryLoader};
pub use permission::{PermissionGate, PermissionHost, PermissionRequest, PermissionState};
pub use sequencer::{LibraryLoadSequencer, LibrarySpec, NativeLoader};
