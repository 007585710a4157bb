//! Utility modules for cpumon.

mod platform;

pub use platform::{Platform, current_platform_id};
