//! Sources of backing Blocks.

mod system;

pub use system::SystemPlatform;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::MmapPlatform;
