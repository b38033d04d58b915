//! `apistack outputs` - stack outputs resolved from recorded state

use anyhow::Result;
use colored::Colorize;
use declarative::{DeploymentState, StateStore};

use crate::Context;
use crate::commands::Session;
use crate::schema::StackFile;
use crate::ui;

pub fn run(ctx: &Context) -> Result<i32> {
    let session = Session::open(ctx, false)?;
    let state = session.store.load()?;

    ui::header(&format!("Stack {}", session.stack.name()));
    ui::kv("account", &session.cloud.account_id());
    ui::kv("region", &session.cloud.region());
    ui::kv("recorded", &state.resources.len().to_string());
    ui::kv("live in account", &session.cloud.inventory().len().to_string());
    print_outputs(&session.stack, &state)?;
    Ok(0)
}

pub fn print_outputs(stack: &StackFile, state: &DeploymentState) -> Result<()> {
    let outputs = stack.resolve_outputs(state)?;
    if outputs.is_empty() {
        return Ok(());
    }
    ui::section("Outputs");
    for line in render(&outputs) {
        println!("{line}");
    }
    Ok(())
}

fn render(outputs: &[(String, Option<String>)]) -> Vec<String> {
    let width = outputs.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    outputs
        .iter()
        .map(|(name, value)| match value {
            Some(value) => format!("  {name:<width$}  {value}"),
            None => format!(
                "  {name:<width$}  {}",
                "(not yet provisioned)".dimmed()
            ),
        })
        .collect()
}
