//! `apistack rollback` and `apistack destroy`

use anyhow::Result;
use declarative::{ExecuteOptions, Executor};

use crate::Context;
use crate::commands::{Prompt, Session, retry_hint};
use crate::progress::ProgressReporter;
use crate::ui;

pub fn rollback(ctx: &Context, yes: bool, force_state: bool) -> Result<i32> {
    let session = Session::open(ctx, force_state)?;
    let executor = Executor::new(&session.providers, &session.store, ExecuteOptions::default());

    let mut progress = ProgressReporter::new(session.stack.resources.len(), ctx.quiet);
    let report = executor.rollback(&mut progress, &mut Prompt::destructive(yes));
    progress.finish();
    let report = report?;

    ui::print_run_summary(&report);
    if let Some(hint) = retry_hint(&report) {
        ui::info(&hint);
    }
    Ok(report.exit_code())
}

pub fn destroy(ctx: &Context, targets: &[String], yes: bool, force_state: bool) -> Result<i32> {
    let session = Session::open(ctx, force_state)?;
    let executor = Executor::new(&session.providers, &session.store, ExecuteOptions::default());

    let mut progress = ProgressReporter::new(session.stack.resources.len(), ctx.quiet);
    let report = executor.destroy(targets, &mut progress, &mut Prompt::destructive(yes));
    progress.finish();
    let report = report?;

    ui::print_run_summary(&report);
    if report.results.is_empty() {
        ui::info("Nothing recorded to destroy");
    } else if let Some(hint) = retry_hint(&report) {
        ui::info(&hint);
    }
    Ok(report.exit_code())
}

#[cfg(test)]
mod tests {
    use crate::commands::apply::{Mode, execute};
    use crate::commands::test_support::Sandbox;
    use declarative::{
        AutoConfirm, CancelToken, Error, ExecuteOptions, Executor, NoProgress, RunStatus,
        StateStore,
    };
    use std::time::Duration;

    fn options() -> ExecuteOptions {
        ExecuteOptions {
            poll_interval: Duration::from_millis(5),
            ..ExecuteOptions::default()
        }
    }

    fn provisioned() -> Sandbox {
        let sandbox = Sandbox::new();
        let report = execute(
            &sandbox.session(),
            options(),
            CancelToken::new(),
            Mode::Apply,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        sandbox
    }

    #[test]
    fn test_rollback_removes_everything_created() {
        let sandbox = provisioned();
        let session = sandbox.session();
        let report = Executor::new(&session.providers, &session.store, options())
            .rollback(&mut NoProgress, &mut AutoConfirm)
            .unwrap();

        assert_eq!(report.status, RunStatus::RolledBack);
        assert_eq!(report.summary().deleted, 11);
        assert!(session.cloud.inventory().is_empty());
        assert!(session.store.load().unwrap().resources.is_empty());

        let again = Executor::new(&session.providers, &session.store, options())
            .rollback(&mut NoProgress, &mut AutoConfirm);
        assert!(matches!(again, Err(Error::NothingToResume { .. })));
    }

    #[test]
    fn test_destroy_target_refuses_to_strand_dependents() {
        let sandbox = provisioned();
        let session = sandbox.session();
        let executor = Executor::new(&session.providers, &session.store, options());

        let err = executor
            .destroy(&["ApiDomain".to_string()], &mut NoProgress, &mut AutoConfirm)
            .unwrap_err();
        assert!(matches!(err, Error::DependentsRemain { .. }));

        let report = executor
            .destroy(
                &["ApiRecord".to_string(), "ApiDomain".to_string()],
                &mut NoProgress,
                &mut AutoConfirm,
            )
            .unwrap();
        assert_eq!(report.summary().deleted, 2);
        let state = session.store.load().unwrap();
        assert!(state.get("ApiDomain").is_none());
        assert!(state.get("ApiStage").is_some());
    }
}
