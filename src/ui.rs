use colored::{ColoredString, Colorize};
use declarative::{
    DiffSummary, ExecuteSummary, ResourceDiff, ResourceOperationResult, ResourceStatus, RunReport,
    Verb,
};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

// ============================================================================
// Plan and Run Rendering
// ============================================================================

/// Symbol for a planned verb
pub fn verb_symbol(verb: Verb) -> ColoredString {
    match verb {
        Verb::Create => "+".green(),
        Verb::Update => "~".yellow(),
        Verb::Replace => "±".magenta(),
        Verb::Delete => "-".red(),
        Verb::NoOp => "○".dimmed(),
    }
}

/// Symbol for a finished resource
pub fn status_symbol(status: ResourceStatus) -> ColoredString {
    match status {
        ResourceStatus::Done => "✓".green(),
        ResourceStatus::Failed => "✗".red(),
        ResourceStatus::Skipped => "⊘".yellow(),
        ResourceStatus::Pending | ResourceStatus::InProgress => "○".dimmed(),
    }
}

/// One line per planned resource
pub fn diff_line(diff: &ResourceDiff) -> String {
    let mut line = format!(
        "{} {} {} {}",
        verb_symbol(diff.verb),
        diff.identity.bold(),
        format!("({})", diff.kind).dimmed(),
        diff.verb.as_str()
    );
    if diff.inputs_pending {
        line.push_str(&format!(" {}", "(inputs known after apply)".dimmed()));
    }
    if diff.affects_bindings {
        line.push_str(&format!(" {}", "⚠ affects DNS/TLS bindings".yellow()));
    }
    line
}

/// One line per finished resource
pub fn result_line(result: &ResourceOperationResult) -> String {
    let mut line = format!(
        "{} {} {}",
        status_symbol(result.status),
        result.identity,
        format!("({} {})", result.kind, result.verb).dimmed()
    );
    if let Some(error) = &result.error {
        line.push_str(&format!(" - {}", error.dimmed()));
    }
    line
}

pub fn print_plan_summary(summary: &DiffSummary) {
    println!();
    println!(
        "  Plan: {} to create, {} to update, {} to replace, {} unchanged",
        summary.creates.to_string().green(),
        summary.updates.to_string().yellow(),
        summary.replaces.to_string().magenta(),
        summary.no_ops
    );
    if summary.orphans > 0 {
        println!(
            "  {} {} recorded resources are no longer declared (use destroy)",
            "⚠".yellow(),
            summary.orphans
        );
    }
}

/// Print final summary
pub fn print_run_summary(report: &RunReport) {
    let summary: ExecuteSummary = report.summary();
    println!();
    if report.is_success() {
        println!(
            "  {} {} {} ({})",
            "✓".green().bold(),
            report.operation,
            report.status,
            report.run_id.dimmed()
        );
    } else {
        println!(
            "  {} {} {} ({})",
            "⚠".yellow().bold(),
            report.operation,
            report.status,
            report.run_id.dimmed()
        );
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.no_change > 0 {
        println!("    • {} resources unchanged", summary.no_change);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Outputs, ResourceKind};

    #[test]
    fn test_result_line_carries_error() {
        colored::control::set_override(false);
        let failed = ResourceOperationResult::failed(
            "ApiRecord",
            ResourceKind::Record,
            Verb::Create,
            "quota exceeded".to_string(),
        );
        assert_eq!(
            result_line(&failed),
            "✗ ApiRecord (record create) - quota exceeded"
        );

        let done = ResourceOperationResult::done(
            "ApiStage",
            ResourceKind::Stage,
            Verb::NoOp,
            Outputs::new(),
        );
        assert_eq!(result_line(&done), "✓ ApiStage (stage no-op)");
    }

    #[test]
    fn test_diff_line_flags() {
        colored::control::set_override(false);
        let diff = ResourceDiff {
            identity: "ApiCertificate".to_string(),
            kind: ResourceKind::Certificate,
            batch: 1,
            verb: Verb::Replace,
            inputs_pending: false,
            affects_bindings: true,
            changes: Vec::new(),
        };
        let line = diff_line(&diff);
        assert!(line.starts_with("± ApiCertificate (certificate) replace"));
        assert!(line.contains("affects DNS/TLS bindings"));
    }
}
