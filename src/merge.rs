//! Merging the build artifacts into a single flashable image
//!
//! Merging happens in two halves. `MergePlan::prepare` resolves the version, output name, chip
//! offsets and flash parameters and assembles the merge utility command line without touching
//! anything. `MergePlan::execute` checks the artifacts, runs the utility and reports the result.

pub mod chip;
pub mod flash;
pub mod resolve;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{debug, info};
use sha2::{Digest, Sha256};

pub use chip::{ChipProfile, FlashOffset, LEGACY_BOOTLOADER_OFFSET};
pub use flash::{normalize_flash_freq, FlashParameters};
pub use resolve::{default_resolvers, resolve_version, VersionResolver};

use crate::tool::{Invocation, ToolRunner};
use crate::version::VersionTag;
use crate::{BuildContext, Error};

/// Offset of the partition table
pub const PARTITION_TABLE_OFFSET: FlashOffset = FlashOffset(0x8000);
/// Offset of the OTA boot selector
pub const BOOT_SELECTOR_OFFSET: FlashOffset = FlashOffset(0xe000);
/// Offset of the application image
pub const APPLICATION_OFFSET: FlashOffset = FlashOffset(0x10000);

/// The binaries that make up a merged image
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArtifactSet {
    pub bootloader: PathBuf,
    pub partition_table: PathBuf,
    /// Only set when the boot selector exists on disk
    pub boot_selector: Option<PathBuf>,
    pub application: PathBuf,
}

impl ArtifactSet {
    /// Locates the artifacts in `build_dir`, including the boot selector only if it exists
    pub fn discover<P: AsRef<Path>>(build_dir: P) -> ArtifactSet {
        let build_dir = build_dir.as_ref();
        let boot_selector = build_dir.join("boot_app0.bin");

        let boot_selector = if boot_selector.is_file() {
            Some(boot_selector)
        } else {
            debug!("No boot selector at {}, leaving it out", boot_selector.display());
            None
        };

        ArtifactSet {
            bootloader: build_dir.join("bootloader.bin"),
            partition_table: build_dir.join("partitions.bin"),
            boot_selector,
            application: build_dir.join("firmware.bin"),
        }
    }

    /// Returns `Error::MissingArtifact` for the first required artifact that doesn't exist
    pub fn check_required(&self) -> Result<(), Error> {
        for path in &[&self.bootloader, &self.partition_table, &self.application] {
            if !path.is_file() {
                return Err(Error::MissingArtifact(path.to_path_buf()));
            }
        }

        Ok(())
    }

    /// The (offset, file) pairs in merge order
    pub fn segments(&self, chip: &ChipProfile) -> Vec<(FlashOffset, &Path)> {
        let mut segments = vec![
            (chip.bootloader_offset(), self.bootloader.as_path()),
            (PARTITION_TABLE_OFFSET, self.partition_table.as_path()),
        ];

        if let Some(boot_selector) = &self.boot_selector {
            segments.push((BOOT_SELECTOR_OFFSET, boot_selector.as_path()));
        }

        segments.push((APPLICATION_OFFSET, self.application.as_path()));
        segments
    }
}

/// The file name of the merged image, `<prefix>-<version>-<YYYYMMDD>.bin`
pub fn output_file_name(prefix: &str, version: &VersionTag, date: NaiveDate) -> String {
    format!("{}-{}-{}.bin", prefix, version, date.format("%Y%m%d"))
}

/// Builds the `merge_bin` arguments for the merge utility
pub fn merge_args(
    chip: &ChipProfile,
    output: &Path,
    flash: &FlashParameters,
    artifacts: &ArtifactSet,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--chip".into(),
        chip.id().into(),
        "merge_bin".into(),
        "-o".into(),
        output.into(),
        "--flash_mode".into(),
        flash.mode.as_str().into(),
        "--flash_freq".into(),
        flash.freq.as_str().into(),
        "--flash_size".into(),
        flash.size.as_str().into(),
    ];

    for (offset, path) in artifacts.segments(chip) {
        args.push(offset.to_string().into());
        args.push(path.into());
    }

    args
}

/// Everything needed to produce one merged image
#[derive(Clone, Debug)]
pub struct MergePlan {
    pub version: VersionTag,
    pub chip: ChipProfile,
    pub flash: FlashParameters,
    pub artifacts: ArtifactSet,
    pub output: PathBuf,
    pub invocation: Invocation,
}

impl MergePlan {
    /// Plans the merge for the context `ctx` on `date`, using the default version resolvers
    pub fn prepare(ctx: &BuildContext, date: NaiveDate) -> MergePlan {
        MergePlan::prepare_with(ctx, date, &default_resolvers(ctx))
    }

    /// Plans the merge, asking `resolvers` for the version
    pub fn prepare_with(
        ctx: &BuildContext,
        date: NaiveDate,
        resolvers: &[Box<dyn VersionResolver>],
    ) -> MergePlan {
        let version = resolve_version(ctx, resolvers);
        let output = ctx
            .dist_dir()
            .join(output_file_name(&ctx.product_prefix, &version, date));
        let chip = ChipProfile::new(&ctx.board.chip);
        let flash = FlashParameters::from_board(&ctx.board);
        let artifacts = ArtifactSet::discover(&ctx.build_dir);
        let merge = merge_args(&chip, &output, &flash, &artifacts);

        let invocation = match &ctx.tool.python {
            Some(python) => {
                let mut invocation = Invocation::new(python);
                invocation.arg(&ctx.tool.esptool).args(&merge);
                invocation
            }
            None => {
                let mut invocation = Invocation::new(&ctx.tool.esptool);
                invocation.args(&merge);
                invocation
            }
        };

        MergePlan {
            version,
            chip,
            flash,
            artifacts,
            output,
            invocation,
        }
    }

    /// Runs the merge utility with `runner` and reports on the written image
    ///
    /// The output directory is created if needed. A missing required artifact or a non-zero
    /// exit of the merge utility is an error.
    pub fn execute<R: ToolRunner + ?Sized>(&self, runner: &mut R) -> Result<MergeReport, Error> {
        self.artifacts.check_required()?;

        if let Some(dist_dir) = self.output.parent() {
            fs::create_dir_all(dist_dir)
                .map_err(|err| Error::OutputDirError(dist_dir.to_path_buf(), err))?;
        }

        info!("Firmware version: {}", self.version);
        info!("{}", self.invocation.command_line());

        let exit_code = runner.run(&self.invocation)?;

        if !exit_code.success() {
            return Err(Error::MergeFailed(exit_code));
        }

        let report = MergeReport::from_file(&self.output)?;

        info!("Wrote {}", report.path.display());

        Ok(report)
    }
}

/// Facts about a written merged image
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MergeReport {
    pub path: PathBuf,
    pub size: u64,
    /// Lower-case hex SHA-256 of the image
    pub sha256: String,
}

impl MergeReport {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<MergeReport, Error> {
        let path = path.as_ref();
        let contents = fs::read(path).map_err(|err| Error::ReportError(path.to_path_buf(), err))?;

        Ok(MergeReport {
            path: path.to_path_buf(),
            size: contents.len() as u64,
            sha256: format!("{:x}", Sha256::digest(&contents)),
        })
    }
}
