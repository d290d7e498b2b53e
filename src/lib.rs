//! Release assembly for ESP32 firmware
//!
//! Three steps run around the firmware build. `version::tag_build` mints a version tag and
//! writes it into a generated header before the build. `jobs::force_single_job` limits the
//! build to one job on Windows. `merge::MergePlan` runs after the build and merges the
//! bootloader, partition table, optional OTA boot selector and application into one image
//! named after the version and date.

mod context;
mod error;
pub mod jobs;
pub mod merge;
pub mod pipeline;
pub mod tool;
pub mod version;

pub use context::{BoardConfig, BuildContext, MergeToolConfig};
pub use error::{Error, ExitCode};
pub use merge::{MergePlan, MergeReport};
pub use version::VersionTag;
