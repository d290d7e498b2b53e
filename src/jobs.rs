//! Clamping the build to a single job on Windows
//!
//! Parallel builds on Windows sometimes race on object files: `ar` scans an object that is still
//! being written and reports it missing. Forcing one job avoids that. The clamp is best effort:
//! nothing in here ever fails the build, and every no-op is reported as a warning.

use log::{debug, info, warn};
use thiserror::Error;

use crate::BuildContext;

/// Errors when reading or changing the parallel job count
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobsError {
    #[error("The job count is not configured")]
    Unset,
    #[error("The job count must be at least 1")]
    Zero,
}

/// The platform the build runs on
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HostPlatform {
    Windows,
    Other,
}

impl HostPlatform {
    /// Detects the platform this process runs on
    pub fn current() -> HostPlatform {
        HostPlatform::from_os(std::env::consts::OS)
    }

    /// Maps an OS name as in `std::env::consts::OS` to a platform
    pub fn from_os(os: &str) -> HostPlatform {
        if os.starts_with("windows") {
            HostPlatform::Windows
        } else {
            HostPlatform::Other
        }
    }
}

/// Read and write access to the parallel job count of the build
pub trait JobControl {
    fn jobs(&self) -> Result<usize, JobsError>;
    fn set_jobs(&mut self, jobs: usize) -> Result<(), JobsError>;
}

impl JobControl for BuildContext {
    fn jobs(&self) -> Result<usize, JobsError> {
        self.jobs.ok_or(JobsError::Unset)
    }

    fn set_jobs(&mut self, jobs: usize) -> Result<(), JobsError> {
        if jobs == 0 {
            return Err(JobsError::Zero);
        }

        self.jobs = Some(jobs);

        Ok(())
    }
}

/// What `force_single_job` did
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GuardOutcome {
    /// The host is not affected
    NotAffected,
    /// No job control was available
    Unavailable,
    /// The job count already was 1
    AlreadySingle,
    /// The job count was changed to 1 from the given value, if it could be read
    Clamped(Option<usize>),
    /// The job count could not be changed
    Failed,
}

/// Sets the job count to 1 if `host` is Windows and it isn't 1 already
pub fn force_single_job(host: HostPlatform, control: Option<&mut dyn JobControl>) -> GuardOutcome {
    if host != HostPlatform::Windows {
        warn!("Not on Windows; leaving the build job count unchanged");

        return GuardOutcome::NotAffected;
    }

    let control = match control {
        Some(control) => control,
        None => {
            warn!("No job control available; cannot force a single build job");

            return GuardOutcome::Unavailable;
        }
    };

    let current = match control.jobs() {
        Ok(jobs) => Some(jobs),
        Err(err) => {
            debug!("Could not read the job count: {}", err);
            None
        }
    };

    if current == Some(1) {
        return GuardOutcome::AlreadySingle;
    }

    match control.set_jobs(1) {
        Ok(()) => {
            info!("Windows: forced a single build job to avoid intermittent missing object files in ar");

            GuardOutcome::Clamped(current)
        }
        Err(err) => {
            warn!("Failed to force a single build job: {}", err);

            GuardOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::Once;

    use log::{Level, Log, Metadata, Record};

    use super::*;

    thread_local! {
        static LEVELS: RefCell<Vec<Level>> = RefCell::new(Vec::new());
    }

    /// Logger that records the level of every message logged on the current thread
    struct LevelRecorder;

    impl Log for LevelRecorder {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            LEVELS.with(|levels| levels.borrow_mut().push(record.level()));
        }

        fn flush(&self) {}
    }

    /// Runs `f` and returns the levels of the messages it logged
    fn logged_levels<F: FnOnce()>(f: F) -> Vec<Level> {
        static INIT: Once = Once::new();
        static RECORDER: LevelRecorder = LevelRecorder;

        INIT.call_once(|| {
            log::set_logger(&RECORDER).unwrap();
            log::set_max_level(log::LevelFilter::Trace);
        });

        LEVELS.with(|levels| levels.borrow_mut().clear());
        f();
        LEVELS.with(|levels| levels.borrow().clone())
    }

    /// Job control that records every write
    struct RecordingControl {
        jobs: Result<usize, JobsError>,
        writes: Vec<usize>,
        reject_writes: bool,
    }

    impl RecordingControl {
        fn new(jobs: Result<usize, JobsError>) -> RecordingControl {
            RecordingControl {
                jobs,
                writes: Vec::new(),
                reject_writes: false,
            }
        }
    }

    impl JobControl for RecordingControl {
        fn jobs(&self) -> Result<usize, JobsError> {
            self.jobs.clone()
        }

        fn set_jobs(&mut self, jobs: usize) -> Result<(), JobsError> {
            if self.reject_writes {
                return Err(JobsError::Zero);
            }

            self.writes.push(jobs);
            self.jobs = Ok(jobs);

            Ok(())
        }
    }

    #[test]
    fn it_should_detect_windows() {
        assert_eq!(HostPlatform::from_os("windows"), HostPlatform::Windows);
        assert_eq!(HostPlatform::from_os("linux"), HostPlatform::Other);
        assert_eq!(HostPlatform::from_os("macos"), HostPlatform::Other);
    }

    #[test]
    fn it_should_leave_single_job_untouched() {
        let mut control = RecordingControl::new(Ok(1));

        let outcome = force_single_job(HostPlatform::Windows, Some(&mut control));

        assert_eq!(outcome, GuardOutcome::AlreadySingle);
        assert!(control.writes.is_empty());
    }

    #[test]
    fn it_should_clamp_parallel_jobs() {
        for jobs in &[0usize, 2, 8, 64] {
            let mut control = RecordingControl::new(Ok(*jobs));

            let outcome = force_single_job(HostPlatform::Windows, Some(&mut control));

            assert_eq!(outcome, GuardOutcome::Clamped(Some(*jobs)));
            assert_eq!(control.writes, vec![1]);
            assert_eq!(control.jobs, Ok(1));
        }
    }

    #[test]
    fn it_should_clamp_when_job_count_is_unreadable() {
        let mut control = RecordingControl::new(Err(JobsError::Unset));

        let outcome = force_single_job(HostPlatform::Windows, Some(&mut control));

        assert_eq!(outcome, GuardOutcome::Clamped(None));
        assert_eq!(control.writes, vec![1]);
    }

    #[test]
    fn it_should_not_touch_other_platforms() {
        let mut control = RecordingControl::new(Ok(8));

        let outcome = force_single_job(HostPlatform::Other, Some(&mut control));

        assert_eq!(outcome, GuardOutcome::NotAffected);
        assert!(control.writes.is_empty());
    }

    #[test]
    fn it_should_warn_on_other_platforms() {
        let mut ctx = BuildContext::new("/project");
        ctx.jobs = Some(8);

        let levels = logged_levels(|| {
            assert_eq!(
                force_single_job(HostPlatform::Other, Some(&mut ctx)),
                GuardOutcome::NotAffected
            );
        });

        assert_eq!(levels, vec![Level::Warn]);
        assert_eq!(ctx.jobs, Some(8));
    }

    #[test]
    fn it_should_not_log_when_already_single() {
        let mut control = RecordingControl::new(Ok(1));

        let levels = logged_levels(|| {
            force_single_job(HostPlatform::Windows, Some(&mut control));
        });

        assert!(levels.is_empty(), "unexpected messages: {:?}", levels);
    }

    #[test]
    fn it_should_downgrade_missing_control() {
        assert_eq!(
            force_single_job(HostPlatform::Windows, None),
            GuardOutcome::Unavailable
        );
    }

    #[test]
    fn it_should_downgrade_failed_writes() {
        let mut control = RecordingControl::new(Ok(4));
        control.reject_writes = true;

        let outcome = force_single_job(HostPlatform::Windows, Some(&mut control));

        assert_eq!(outcome, GuardOutcome::Failed);
        assert_eq!(control.jobs, Ok(4));
    }

    #[test]
    fn it_should_clamp_build_context() {
        let mut ctx = BuildContext::new("/project");
        ctx.jobs = Some(12);

        let outcome = force_single_job(HostPlatform::Windows, Some(&mut ctx));

        assert_eq!(outcome, GuardOutcome::Clamped(Some(12)));
        assert_eq!(ctx.jobs, Some(1));
    }

    #[test]
    fn it_should_reject_zero_jobs_on_build_context() {
        let mut ctx = BuildContext::new("/project");

        assert_eq!(ctx.set_jobs(0), Err(JobsError::Zero));
        assert_eq!(ctx.jobs(), Err(JobsError::Unset));
    }
}
