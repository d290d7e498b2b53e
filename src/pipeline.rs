//! The full release pipeline: tag the version, guard the job count, build, merge

use chrono::NaiveDate;
use log::info;

use crate::jobs::{self, GuardOutcome, HostPlatform};
use crate::merge::{MergePlan, MergeReport};
use crate::tool::{Invocation, ToolRunner};
use crate::version::{self, VersionTag};
use crate::{BuildContext, Error};

/// The build command to run between tagging and merging, with `-j<jobs>` appended if a job
/// count is configured
pub fn build_invocation(command: &[String], jobs: Option<usize>) -> Option<Invocation> {
    let (program, args) = command.split_first()?;
    let mut invocation = Invocation::new(program);

    invocation.args(args);

    if let Some(jobs) = jobs {
        invocation.arg(format!("-j{}", jobs));
    }

    Some(invocation)
}

/// What a pipeline run produced
#[derive(Debug)]
pub struct PipelineReport {
    pub version: VersionTag,
    pub guard: GuardOutcome,
    pub merge: MergeReport,
}

/// Runs every step in order against `ctx`
///
/// `build_command` may be empty, in which case the artifacts are expected to exist already.
/// `today` is asked for the image date once the build has finished.
pub fn run<R, D>(
    ctx: &mut BuildContext,
    host: HostPlatform,
    build_command: &[String],
    runner: &mut R,
    today: D,
) -> Result<PipelineReport, Error>
where
    R: ToolRunner + ?Sized,
    D: FnOnce() -> NaiveDate,
{
    let version = version::tag_build(ctx)?;
    let guard = jobs::force_single_job(host, Some(&mut *ctx));

    if let Some(invocation) = build_invocation(build_command, ctx.jobs) {
        info!("Building: {}", invocation.command_line());

        let exit_code = runner.run(&invocation)?;

        if !exit_code.success() {
            return Err(Error::BuildFailed(exit_code));
        }
    }

    let merge = MergePlan::prepare(ctx, today()).execute(runner)?;

    Ok(PipelineReport {
        version,
        guard,
        merge,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    use super::*;
    use crate::error::ExitCode;

    /// Runner that answers the build command with `build_exit` and fakes the merge
    struct FakeTools {
        programs: Rc<RefCell<Vec<String>>>,
        build_args: Vec<String>,
        build_exit: ExitCode,
    }

    impl FakeTools {
        fn new(build_exit: i32) -> FakeTools {
            FakeTools {
                programs: Rc::new(RefCell::new(Vec::new())),
                build_args: Vec::new(),
                build_exit: ExitCode(Some(build_exit)),
            }
        }
    }

    impl ToolRunner for FakeTools {
        fn run(&mut self, invocation: &Invocation) -> Result<ExitCode, Error> {
            let program = invocation.program.to_string_lossy().into_owned();
            let args = invocation.args_lossy();

            self.programs.borrow_mut().push(program.clone());

            if program == "pio" {
                self.build_args = args;
                return Ok(self.build_exit);
            }

            let output = args.iter().position(|arg| arg == "-o").unwrap() + 1;
            fs::write(&args[output], b"image").unwrap();

            Ok(ExitCode(Some(0)))
        }
    }

    fn project(dir: &std::path::Path) -> BuildContext {
        let ctx = BuildContext::new(dir);

        fs::create_dir_all(dir.join("src")).unwrap();
        fs::create_dir_all(&ctx.build_dir).unwrap();

        for name in &["bootloader.bin", "partitions.bin", "firmware.bin"] {
            fs::write(ctx.build_dir.join(name), b"bin").unwrap();
        }

        ctx
    }

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn it_should_append_job_count() {
        let invocation = build_invocation(&command(&["pio", "run"]), Some(1)).unwrap();

        assert_eq!(invocation.command_line(), "pio run -j1");
    }

    #[test]
    fn it_should_skip_empty_build_command() {
        assert_eq!(build_invocation(&[], Some(4)), None);
    }

    #[test]
    fn it_should_name_image_after_published_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = project(dir.path());
        let mut tools = FakeTools::new(0);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let report = run(&mut ctx, HostPlatform::Other, &[], &mut tools, || date).unwrap();

        let expected = format!("FISH-{}-20240101.bin", report.version);
        assert_eq!(report.merge.path, dir.path().join("dist").join(expected));
        assert_eq!(report.guard, GuardOutcome::NotAffected);
        assert_eq!(*tools.programs.borrow(), vec!["esptool.py"]);

        let header = fs::read_to_string(ctx.header_path()).unwrap();
        assert!(header.contains(report.version.as_str()));
    }

    #[test]
    fn it_should_build_with_single_job_on_windows() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = project(dir.path());
        ctx.jobs = Some(8);
        let mut tools = FakeTools::new(0);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let report = run(
            &mut ctx,
            HostPlatform::Windows,
            &command(&["pio", "run"]),
            &mut tools,
            || date,
        )
        .unwrap();

        assert_eq!(report.guard, GuardOutcome::Clamped(Some(8)));
        assert_eq!(*tools.programs.borrow(), vec!["pio", "esptool.py"]);
        assert_eq!(tools.build_args, vec!["run", "-j1"]);
    }

    #[test]
    fn it_should_date_image_after_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = project(dir.path());
        let mut tools = FakeTools::new(0);
        let programs = Rc::clone(&tools.programs);
        let mut seen_by_clock = Vec::new();

        let report = run(
            &mut ctx,
            HostPlatform::Other,
            &command(&["pio", "run"]),
            &mut tools,
            || {
                seen_by_clock = programs.borrow().clone();
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
            },
        )
        .unwrap();

        assert_eq!(seen_by_clock, vec!["pio"]);
        assert!(report.merge.path.to_string_lossy().ends_with("-20240102.bin"));
    }

    #[test]
    fn it_should_stop_when_build_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = project(dir.path());
        let mut tools = FakeTools::new(1);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let result = run(
            &mut ctx,
            HostPlatform::Other,
            &command(&["pio", "run"]),
            &mut tools,
            || date,
        );

        assert!(matches!(result, Err(Error::BuildFailed(ExitCode(Some(1))))));
        assert_eq!(*tools.programs.borrow(), vec!["pio"]);
    }
}
