mod cli;
mod cloud;
mod commands;
mod paths;
mod progress;
mod resource;
mod schema;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use commands::apply::Mode;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Stack file the command operates on
    pub stack: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        stack: cli.stack,
    };

    let code = match dispatch(&ctx, cli.command) {
        Ok(code) => code,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

fn dispatch(ctx: &Context, command: Commands) -> Result<i32> {
    match command {
        Commands::Init(args) => commands::init::run(ctx, &args),
        Commands::Graph { format } => commands::graph::run(ctx, format),
        Commands::Plan { target, diff } => commands::plan::run(ctx, &target, diff),
        Commands::Apply(args) => commands::apply::run(ctx, &args, Mode::Apply),
        Commands::Resume(args) => commands::apply::run(ctx, &args, Mode::Resume),
        Commands::Rollback { yes, force_state } => {
            commands::teardown::rollback(ctx, yes, force_state)
        }
        Commands::Destroy {
            target,
            yes,
            force_state,
        } => commands::teardown::destroy(ctx, &target, yes, force_state),
        Commands::Outputs => commands::outputs::run(ctx),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "apistack", &mut io::stdout());
            Ok(0)
        }
    }
}

/// 1 for problems with the stack or state, 2 for backend and I/O failures.
fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(e) = error.downcast_ref::<declarative::Error>() {
        return e.exit_code();
    }
    if let Some(e) = error.downcast_ref::<schema::StackError>() {
        return e.exit_code();
    }
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_exit_code_follows_error_category() {
        let cycle = anyhow::Error::new(declarative::Error::CycleDetected {
            cycle: vec!["A".to_string(), "A".to_string()],
        });
        assert_eq!(exit_code(&cycle), 1);

        let backend = anyhow::Error::new(declarative::Error::permanent("denied"));
        assert_eq!(exit_code(&backend), 2);

        let parse = schema::StackFile::parse("not = [toml", Path::new("stack.toml")).unwrap_err();
        assert_eq!(exit_code(&anyhow::Error::new(parse)), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("disk on fire")), 2);
    }
}
