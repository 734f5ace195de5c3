//! `kubevet checks`: resolve a configuration and list what it enables.

use anyhow::{Context, Result};
use kubevet_core::{load_config_or_default, BuiltinChecks, CheckRegistrySnapshot, CheckSource};
use serde::Serialize;

use crate::cli::args::ChecksArgs;
use crate::exit_codes::SUCCESS;

#[derive(Debug, Serialize)]
struct CheckRow<'a> {
    name: &'a str,
    description: &'a str,
    remediation: &'a str,
    custom: bool,
}

pub fn run(args: ChecksArgs) -> Result<i32> {
    let builtin = BuiltinChecks::new();
    let config = load_config_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let snapshot = CheckRegistrySnapshot::build(&config, &builtin, 0)
        .context("resolving enabled checks")?;

    print!("{}", render(&snapshot, &builtin, args.json)?);
    Ok(SUCCESS)
}

pub(crate) fn render(
    snapshot: &CheckRegistrySnapshot,
    builtin: &BuiltinChecks,
    json: bool,
) -> Result<String> {
    let rows: Vec<CheckRow<'_>> = snapshot
        .checks()
        .map(|c| CheckRow {
            name: &c.spec.name,
            description: &c.spec.description,
            remediation: &c.spec.remediation,
            custom: builtin.load(&c.spec.name).is_none(),
        })
        .collect();

    if json {
        let mut out = serde_json::to_string_pretty(&rows)?;
        out.push('\n');
        return Ok(out);
    }

    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for row in &rows {
        let marker = if row.custom { " (custom)" } else { "" };
        out.push_str(&format!(
            "{:width$}  {}{}\n",
            row.name,
            row.description,
            marker,
            width = width
        ));
    }
    out.push_str(&format!("{} checks enabled\n", rows.len()));
    Ok(out)
}
