use std::path::PathBuf;

use log::debug;

use crate::version::VersionTag;
use crate::Error;

/// The name of the generated version header, relative to the project source directory
pub const HEADER_FILE_NAME: &str = "auto_fw_version.h";
/// The firmware metadata source the version is parsed from when none was published
pub const METADATA_FILE_NAME: &str = "WS_Information.h";
/// The PlatformIO environment used when none is configured
pub const DEFAULT_BUILD_ENV: &str = "esp32dev";
/// The prefix of merged image file names
pub const DEFAULT_PRODUCT_PREFIX: &str = "FISH";

/// Board and chip values as the board definition provides them, without normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// Chip identifier, e.g. `esp32s3`
    pub chip: String,
    /// Flash mode, e.g. `dio`
    pub flash_mode: String,
    /// Flash frequency, either in Hz (`40000000L`) or already in merge tool form (`40m`)
    pub flash_freq: String,
    /// Flash size, e.g. `4MB`
    pub flash_size: String,
}

impl Default for BoardConfig {
    fn default() -> BoardConfig {
        BoardConfig {
            chip: "esp32".to_string(),
            flash_mode: "dio".to_string(),
            flash_freq: "40000000L".to_string(),
            flash_size: "4MB".to_string(),
        }
    }
}

/// How to launch the external merge utility
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeToolConfig {
    /// The merge utility, usually `esptool.py`
    pub esptool: PathBuf,
    /// An interpreter to run `esptool` with, if it isn't directly executable
    pub python: Option<PathBuf>,
}

impl Default for MergeToolConfig {
    fn default() -> MergeToolConfig {
        MergeToolConfig {
            esptool: PathBuf::from("esptool.py"),
            python: None,
        }
    }
}

/// Everything the build steps of one invocation share
///
/// The context is created once, handed to the pre-build step by mutable reference and read by
/// the later steps. The version slot starts out empty and can be filled exactly once.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Root of the firmware project
    pub project_dir: PathBuf,
    /// Directory holding the compiled artifacts
    pub build_dir: PathBuf,
    /// Board and chip configuration
    pub board: BoardConfig,
    /// The merge utility to invoke
    pub tool: MergeToolConfig,
    /// Prefix of the merged image file name
    pub product_prefix: String,
    /// Overrides the firmware metadata source used for version fallback
    pub version_source: Option<PathBuf>,
    /// The configured number of parallel build jobs, if any
    pub jobs: Option<usize>,
    version: Option<VersionTag>,
}

impl BuildContext {
    /// Creates a context for the project at `project_dir`, with the default build directory
    /// `.pio/build/esp32dev` and default board values
    pub fn new<P: Into<PathBuf>>(project_dir: P) -> BuildContext {
        let project_dir = project_dir.into();
        let build_dir = project_dir
            .join(".pio")
            .join("build")
            .join(DEFAULT_BUILD_ENV);

        BuildContext {
            project_dir,
            build_dir,
            board: BoardConfig::default(),
            tool: MergeToolConfig::default(),
            product_prefix: DEFAULT_PRODUCT_PREFIX.to_string(),
            version_source: None,
            jobs: None,
            version: None,
        }
    }

    /// Publishes the version tag for the rest of this invocation
    ///
    /// Returns `Error::VersionAlreadyPublished` if a tag was already published.
    pub fn publish_version(&mut self, tag: VersionTag) -> Result<(), Error> {
        if let Some(existing) = &self.version {
            return Err(Error::VersionAlreadyPublished(existing.to_string()));
        }

        debug!("Publishing version {}", tag);
        self.version = Some(tag);

        Ok(())
    }

    /// The published version tag, if any step published one
    pub fn version(&self) -> Option<&VersionTag> {
        self.version.as_ref()
    }

    /// Path of the generated version header
    pub fn header_path(&self) -> PathBuf {
        self.source_dir().join(HEADER_FILE_NAME)
    }

    /// Path of the firmware metadata source used as version fallback
    pub fn metadata_path(&self) -> PathBuf {
        match &self.version_source {
            Some(path) => path.clone(),
            None => self.source_dir().join(METADATA_FILE_NAME),
        }
    }

    /// Directory the merged images are written to
    pub fn dist_dir(&self) -> PathBuf {
        self.project_dir.join("dist")
    }

    fn source_dir(&self) -> PathBuf {
        self.project_dir.join("src")
    }
}
