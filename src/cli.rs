use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::paths::{DEFAULT_STACK_FILE, ENV_STACK};

#[derive(Parser)]
#[command(name = "apistack")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Provision a TLS-secured, custom-domain serverless API from a declarative stack",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Stack file to load
    #[arg(long, global = true, env = ENV_STACK, default_value = DEFAULT_STACK_FILE)]
    pub stack: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a template stack for a custom-domain serverless API
    Init(InitArgs),

    /// Show the dependency graph and provisioning batches
    Graph {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: GraphFormat,
    },

    /// Show what apply would do, without touching the backend
    Plan {
        /// Only plan these resources and what they depend on
        #[arg(short, long)]
        target: Vec<String>,

        /// Print property-level changes
        #[arg(long)]
        diff: bool,
    },

    /// Provision the declared stack
    Apply(RunArgs),

    /// Continue a partially failed or cancelled run
    Resume(RunArgs),

    /// Delete what the last run created, in reverse dependency order
    Rollback {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Accept a state file whose checksum does not match
        #[arg(long)]
        force_state: bool,
    },

    /// Delete recorded resources, in reverse dependency order
    Destroy {
        /// Only destroy these resources (default: everything recorded)
        #[arg(short, long)]
        target: Vec<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Accept a state file whose checksum does not match
        #[arg(long)]
        force_state: bool,
    },

    /// Print the stack outputs from recorded state
    Outputs,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct InitArgs {
    /// Apex domain served by the hosted zone
    #[arg(long, default_value = "example.com")]
    pub domain: String,

    /// Record name for the API under the apex domain
    #[arg(long, default_value = "api")]
    pub record: String,

    /// Overwrite an existing stack file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
}

// ============================================================================
// Run options shared by apply and resume
// ============================================================================

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Maximum concurrent operations within a batch
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Stop dispatching new batches after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Check recorded resources still exist before treating them as unchanged
    #[arg(long)]
    pub refresh: bool,

    /// Per-resource readiness timeout in seconds
    #[arg(long, default_value = "900")]
    pub timeout: u64,

    /// Seconds between readiness polls
    #[arg(long, default_value = "2")]
    pub poll_interval: u64,

    /// Cancel the run after this many seconds; in-flight work finishes
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Attempts per backend call for transient errors
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Accept a state file whose checksum does not match
    #[arg(long)]
    pub force_state: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_defaults() {
        let cli = Cli::try_parse_from(["apistack", "apply"]).unwrap();
        let Commands::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.jobs, 4);
        assert_eq!(args.timeout, 900);
        assert_eq!(args.retries, 3);
        assert!(args.deadline.is_none());
        assert!(!args.fail_fast && !args.refresh && !args.yes);
    }

    #[test]
    fn test_destroy_collects_targets() {
        let cli = Cli::try_parse_from([
            "apistack", "destroy", "--target", "ApiRecord", "-t", "ApiDomain", "--yes",
        ])
        .unwrap();
        match cli.command {
            Commands::Destroy { target, yes, .. } => {
                assert_eq!(target, vec!["ApiRecord", "ApiDomain"]);
                assert!(yes);
            }
            _ => panic!("expected destroy"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["apistack", "plan", "-vv", "--stack", "infra/demo.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.stack, PathBuf::from("infra/demo.toml"));
    }
}
