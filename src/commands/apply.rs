//! `apistack apply` and `apistack resume`

use anyhow::Result;
use declarative::{
    CancelToken, ConfirmCallback, ExecuteOptions, Executor, ProgressCallback, RetryConfig,
    RunReport, StateStore,
};
use std::thread;
use std::time::Duration;

use crate::Context;
use crate::cli::RunArgs;
use crate::commands::outputs::print_outputs;
use crate::commands::{Prompt, Session, retry_hint};
use crate::progress::ProgressReporter;
use crate::ui;

/// Which entry point a run goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Apply,
    Resume,
}

pub fn run(ctx: &Context, args: &RunArgs, mode: Mode) -> Result<i32> {
    let session = Session::open(ctx, args.force_state)?;
    let options = execute_options(args);
    log::debug!("Execute options: {options:?}");

    let cancel = CancelToken::new();
    if let Some(secs) = args.deadline {
        arm_deadline(&cancel, Duration::from_secs(secs));
    }

    let total = session.stack.resources.len();
    let mut progress = ProgressReporter::new(total, ctx.quiet);
    let mut prompt = Prompt::proceed(args.yes);
    let report = execute(&session, options, cancel, mode, &mut progress, &mut prompt);
    progress.finish();
    let report = report?;

    ui::print_run_summary(&report);
    if let Some(hint) = retry_hint(&report) {
        ui::info(&hint);
    } else if report.is_success() && !report.results.is_empty() {
        print_outputs(&session.stack, &session.store.load()?)?;
    }
    Ok(report.exit_code())
}

pub fn execute_options(args: &RunArgs) -> ExecuteOptions {
    ExecuteOptions {
        jobs: args.jobs.max(1),
        fail_fast: args.fail_fast,
        refresh: args.refresh,
        retry: RetryConfig {
            max_attempts: args.retries.max(1),
            ..RetryConfig::default()
        },
        poll_interval: Duration::from_secs(args.poll_interval),
        resource_timeout: Duration::from_secs(args.timeout),
    }
}

/// Cancel the run once `after` elapses; in-flight operations still finish.
fn arm_deadline(cancel: &CancelToken, after: Duration) {
    let token = cancel.clone();
    thread::spawn(move || {
        thread::sleep(after);
        log::warn!(
            "Deadline of {}s reached, cancelling remaining work",
            after.as_secs()
        );
        token.cancel();
    });
}

pub fn execute<P, C>(
    session: &Session,
    options: ExecuteOptions,
    cancel: CancelToken,
    mode: Mode,
    progress: &mut P,
    confirm: &mut C,
) -> Result<RunReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let registry = session.registry()?;
    let executor = Executor::new(&session.providers, &session.store, options).with_cancel(cancel);
    let report = match mode {
        Mode::Apply => executor.apply(&registry, progress, confirm)?,
        Mode::Resume => executor.resume(&registry, progress, confirm)?,
    };
    log::info!(
        "{} run {} finished: {}",
        report.operation,
        report.run_id,
        report.status
    );
    Ok(report)
}
