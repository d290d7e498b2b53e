use std::path::PathBuf;

use structopt::StructOpt;

use fish_release::{BoardConfig, BuildContext, MergeToolConfig, VersionTag};

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Mint a version tag and write the version header
    Version,
    /// Merge the build artifacts into a single flashable image
    Merge {
        /// Source file to read `#define FW_VERSION "..."` from when no version is given
        #[structopt(long = "version-source", env = "FW_VERSION_SOURCE")]
        version_source: Option<PathBuf>,
        /// The version published by an earlier `version` run
        #[structopt(long = "fw-version", env = "AUTO_FW_VERSION")]
        fw_version: Option<String>,
    },
    /// Tag the version, run the build command and merge the result
    Build {
        /// The build command, e.g. `pio run`; `-j<jobs>` is appended when a job count is set
        #[structopt(last = true)]
        command: Vec<String>,
    },
}

#[derive(StructOpt, Debug)]
#[structopt(name = "fish-release", about = "Firmware version tagging and merged image assembly")]
pub struct Opts {
    #[structopt(subcommand)]
    pub command: Command,

    /// Root of the firmware project
    #[structopt(long = "project-dir", env = "PROJECT_DIR", default_value = ".")]
    pub project_dir: PathBuf,
    /// Directory with the compiled artifacts [default: <project>/.pio/build/<env>]
    #[structopt(long = "build-dir", env = "BUILD_DIR")]
    pub build_dir: Option<PathBuf>,
    /// The build environment the default build directory is derived from
    #[structopt(long = "env", env = "PIOENV", default_value = "esp32dev")]
    pub build_env: String,

    /// Chip identifier passed to the merge tool
    #[structopt(long = "chip", env = "BOARD_MCU", default_value = "esp32")]
    pub chip: String,
    /// Flash mode
    #[structopt(long = "flash-mode", env = "BOARD_FLASH_MODE", default_value = "dio")]
    pub flash_mode: String,
    /// Flash frequency, in Hz (`40000000L`) or merge tool form (`40m`)
    #[structopt(long = "flash-freq", env = "BOARD_F_FLASH", default_value = "40000000L")]
    pub flash_freq: String,
    /// Flash size
    #[structopt(long = "flash-size", env = "BOARD_FLASH_SIZE", default_value = "4MB")]
    pub flash_size: String,

    /// Prefix of the merged image file name
    #[structopt(long = "prefix", env = "FW_PRODUCT_PREFIX", default_value = "FISH")]
    pub prefix: String,
    /// The merge tool
    #[structopt(long = "esptool", env = "ESPTOOL", default_value = "esptool.py")]
    pub esptool: PathBuf,
    /// Interpreter to run the merge tool with
    #[structopt(long = "python", env = "PYTHONEXE")]
    pub python: Option<PathBuf>,
    /// Number of parallel build jobs
    #[structopt(short = "j", long = "jobs", env = "BUILD_JOBS")]
    pub jobs: Option<usize>,
}

impl Opts {
    /// Creates the build context described by the options
    pub fn build_context(&self) -> Result<BuildContext, fish_release::Error> {
        let mut ctx = BuildContext::new(&self.project_dir);

        ctx.build_dir = match &self.build_dir {
            Some(build_dir) => build_dir.clone(),
            None => self
                .project_dir
                .join(".pio")
                .join("build")
                .join(&self.build_env),
        };
        ctx.board = BoardConfig {
            chip: self.chip.clone(),
            flash_mode: self.flash_mode.clone(),
            flash_freq: self.flash_freq.clone(),
            flash_size: self.flash_size.clone(),
        };
        ctx.tool = MergeToolConfig {
            esptool: self.esptool.clone(),
            python: self.python.clone(),
        };
        ctx.product_prefix = self.prefix.clone();
        ctx.jobs = self.jobs;

        if let Command::Merge {
            version_source,
            fw_version,
        } = &self.command
        {
            ctx.version_source = version_source.clone();

            // A blank version counts as absent so resolution falls through to the metadata source
            if let Some(version) = fw_version.as_deref().filter(|v| !v.trim().is_empty()) {
                ctx.publish_version(VersionTag::sanitized(version))?;
            }
        }

        Ok(ctx)
    }
}
