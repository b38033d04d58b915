//! `apistack init` - write a template stack

use anyhow::{Context as _, Result, bail};
use std::fs;
use std::path::Path;

use crate::Context;
use crate::cli::InitArgs;
use crate::resource::is_valid_domain;
use crate::schema::{self, StackFile};
use crate::ui;

pub fn run(ctx: &Context, args: &InitArgs) -> Result<i32> {
    let path = write_template(&ctx.stack, args)?;
    if !ctx.quiet {
        ui::success(&format!("Wrote {}", path.display()));
        ui::section("Next steps");
        ui::dim("apistack graph    # review dependency order");
        ui::dim("apistack plan     # preview what apply will do");
        ui::dim("apistack apply    # provision the stack");
    }
    Ok(0)
}

fn write_template<'a>(path: &'a Path, args: &InitArgs) -> Result<&'a Path> {
    if path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    let domain = args.domain.trim_end_matches('.').to_ascii_lowercase();
    if !is_valid_domain(&domain) {
        bail!("'{}' is not a valid domain name", args.domain);
    }
    let fqdn = format!("{}.{domain}", args.record);
    if !is_valid_domain(&fqdn) {
        bail!("'{fqdn}' is not a valid record name");
    }

    let content = schema::template(&domain, &args.record);
    // The template must stay loadable for any accepted domain.
    StackFile::parse(&content, path)?.registry()?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote template stack for {fqdn}");
    Ok(path)
}
