//! `apistack plan` - preview changes without touching the backend

use anyhow::Result;
use colored::Colorize;
use declarative::{ExecuteOptions, Executor, PlanReport, PropertyChange};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use crate::Context;
use crate::commands::Session;
use crate::ui;

pub fn run(ctx: &Context, targets: &[String], show_diff: bool) -> Result<i32> {
    let session = Session::open(ctx, false)?;
    let registry = session.registry()?;
    let report = Executor::new(&session.providers, &session.store, ExecuteOptions::default())
        .plan(&registry, targets)?;

    print_report(&report, show_diff || ctx.verbose > 0);
    Ok(0)
}

fn print_report(report: &PlanReport, show_diff: bool) {
    ui::header("Plan");
    let total = report.plan.len();
    for batch in report.plan.batches() {
        println!();
        ui::step(batch.index + 1, total, &format!("{} resources", batch.resources.len()));
        for diff in report.diffs.iter().filter(|d| d.batch == batch.index) {
            println!("  {}", ui::diff_line(diff));
            if show_diff && diff.is_change() {
                for change in &diff.changes {
                    print!("{}", render_change(change));
                }
            }
        }
    }

    let warnings = report.warnings();
    if !warnings.is_empty() {
        println!();
        for warning in &warnings {
            ui::warn(warning);
        }
    }
    if !report.orphans.is_empty() {
        ui::section("Recorded but no longer declared");
        for orphan in &report.orphans {
            println!("  {} {orphan}", "-".red());
        }
    }

    ui::print_plan_summary(&report.summary());
    if !report.has_changes() {
        ui::success("Stack is up to date");
    }
}

/// Line diff of one property, values rendered as pretty JSON.
fn render_change(change: &PropertyChange) -> String {
    let before = change.before.as_ref().map(pretty).unwrap_or_default();
    let after = change.after.as_ref().map(pretty).unwrap_or_default();

    let mut out = format!("      {}\n", change.name.cyan());
    let diff = TextDiff::from_lines(&before, &after);
    for line in diff.iter_all_changes() {
        let text = line.value().trim_end_matches('\n');
        match line.tag() {
            ChangeTag::Delete => out.push_str(&format!("        {}\n", format!("- {text}").red())),
            ChangeTag::Insert => {
                out.push_str(&format!("        {}\n", format!("+ {text}").green()));
            }
            ChangeTag::Equal => out.push_str(&format!("          {text}\n")),
        }
    }
    out
}

fn pretty(value: &Value) -> String {
    let mut text = match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_scalar_change() {
        colored::control::set_override(false);
        let change = PropertyChange {
            name: "stage_name".to_string(),
            before: Some(json!("dev")),
            after: Some(json!("prod")),
        };
        assert_eq!(
            render_change(&change),
            "      stage_name\n        - dev\n        + prod\n"
        );
    }

    #[test]
    fn test_render_added_property() {
        colored::control::set_override(false);
        let change = PropertyChange {
            name: "memory_mb".to_string(),
            before: None,
            after: Some(json!(512)),
        };
        assert_eq!(render_change(&change), "      memory_mb\n        + 512\n");
    }

    #[test]
    fn test_render_list_change_keeps_common_lines() {
        colored::control::set_override(false);
        let change = PropertyChange {
            name: "subject_alternative_names".to_string(),
            before: Some(json!(["*.example.com"])),
            after: Some(json!(["*.example.com", "www.example.com"])),
        };
        let text = render_change(&change);
        assert!(text.contains("          [\n"));
        assert!(text.contains("+   \"www.example.com\""));
    }

    #[test]
    fn test_plan_on_empty_state_creates_everything() {
        let sandbox = crate::commands::test_support::Sandbox::new();
        let session = sandbox.session();
        let registry = session.registry().unwrap();
        let report = Executor::new(&session.providers, &session.store, ExecuteOptions::default())
            .plan(&registry, &[])
            .unwrap();
        assert_eq!(report.summary().creates, 11);
        assert!(report.orphans.is_empty());
    }
}
