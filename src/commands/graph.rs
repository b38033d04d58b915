//! `apistack graph` - dependency graph and provisioning batches

use anyhow::Result;
use colored::Colorize;
use declarative::{DependencyGraph, ExecutionPlan};

use crate::Context;
use crate::cli::GraphFormat;
use crate::schema::StackFile;
use crate::ui;

pub fn run(ctx: &Context, format: GraphFormat) -> Result<i32> {
    let stack = StackFile::load(&ctx.stack)?;
    let registry = stack.registry()?;
    let graph = DependencyGraph::build(&registry)?;

    match format {
        GraphFormat::Dot => print!("{}", graph.to_dot()),
        GraphFormat::Text => {
            let plan = ExecutionPlan::synthesize(&graph)?;
            ui::header(&format!("Stack {}", stack.name()));
            print!("{}", render_batches(&graph, &plan));
            println!();
            println!(
                "  {} resources, {} dependencies, {} batches",
                graph.len(),
                graph.edge_count(),
                plan.len()
            );
        }
    }
    Ok(0)
}

/// Batches in order, each resource with what it waits on.
fn render_batches(graph: &DependencyGraph, plan: &ExecutionPlan) -> String {
    let mut out = String::new();
    for batch in plan.batches() {
        out.push('\n');
        out.push_str(&format!(
            "{}\n",
            format!("[{}/{}]", batch.index + 1, plan.len()).blue().bold()
        ));
        for identity in &batch.resources {
            let kind = graph.kind(identity).map_or("", |k| k.as_str());
            out.push_str(&format!("  {identity} {}", format!("({kind})").dimmed()));
            let deps: Vec<&str> = graph.dependencies(identity).collect();
            if !deps.is_empty() {
                out.push_str(&format!(" {} {}", "←".dimmed(), deps.join(", ")));
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use std::path::Path;

    #[test]
    fn test_render_batches_lists_dependencies() {
        colored::control::set_override(false);
        let stack =
            StackFile::parse(&schema::template("example.com", "api"), Path::new("stack.toml"))
                .unwrap();
        let graph = DependencyGraph::build(&stack.registry().unwrap()).unwrap();
        let plan = ExecutionPlan::synthesize(&graph).unwrap();

        let text = render_batches(&graph, &plan);
        assert!(text.contains("[1/7]"));
        assert!(text.contains("[7/7]"));
        assert!(text.contains("  DemoHostedZone (hosted_zone)\n"));
        assert!(text.contains("ApiRecord (record) ← ApiDomain, DemoHostedZone"));
    }
}
