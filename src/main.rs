//! Protocol Registry CLI
//!
//! Loads database.yml files and prints databases, tasks, protocols and
//! sources from the merged registry.

use anyhow::{Context, Result, bail};
use clap::Parser;
use protocol_registry::cli::{Cli, Command, ShowArgs};
use protocol_registry::config::ConfigPaths;
use protocol_registry::finder::FileFinder;
use protocol_registry::format::{
    DatabaseSummary, OutputFormat, ProtocolSummary, format_database_markdown,
    format_databases_markdown, format_files_markdown, format_load_report_markdown,
    format_protocol_markdown, format_sources_markdown, format_tasks_markdown, to_json,
};
use protocol_registry::logging::{LogTarget, init_logging};
use protocol_registry::registry::{LoadReport, OverridePolicy, Registry};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let policy = OverridePolicy::from(cli.override_policy);
    let format = OutputFormat::from(cli.format);
    let (registry, report) = load_registry(&cli, policy)?;

    let output = match cli.command {
        Command::Status => match format {
            OutputFormat::Json => to_json(&report),
            OutputFormat::Markdown => format_load_report_markdown(&report),
        },
        Command::Databases { ref task } => {
            let names = match task {
                Some(task) => registry.databases_for_task(task),
                None => registry.list_databases(),
            };
            match format {
                OutputFormat::Json => to_json(&names),
                OutputFormat::Markdown => format_databases_markdown(&names, task.as_deref()),
            }
        }
        Command::Tasks => match format {
            OutputFormat::Json => {
                let tasks: serde_json::Map<String, serde_json::Value> = registry
                    .list_tasks()
                    .into_iter()
                    .map(|task| {
                        let databases = registry.databases_for_task(&task);
                        (task, json!(databases))
                    })
                    .collect();
                to_json(&tasks)
            }
            OutputFormat::Markdown => format_tasks_markdown(&registry),
        },
        Command::Protocols { ref database } => {
            let database = registry.get_database(database)?;
            let summary = DatabaseSummary::new(&database, &registry);
            match format {
                OutputFormat::Json => to_json(&summary),
                OutputFormat::Markdown => format_database_markdown(&summary),
            }
        }
        Command::Show(ref args) => run_show(&registry, args, format)?,
        Command::Sources { ref database } => {
            let sources: BTreeMap<String, Vec<String>> = match database {
                Some(name) => {
                    let templates = registry
                        .sources(name)
                        .with_context(|| format!("No sources declared for database \"{}\"", name))?;
                    [(name.clone(), templates.to_vec())].into_iter().collect()
                }
                None => registry.all_sources().clone(),
            };
            match format {
                OutputFormat::Json => to_json(&sources),
                OutputFormat::Markdown => format_sources_markdown(&sources),
            }
        }
        Command::Find {
            ref protocol,
            ref uri,
        } => {
            let protocol = registry.get_protocol(protocol)?;
            let files = protocol.files()?;
            let Some(item) = files.iter().find(|f| &f.uri == uri) else {
                bail!("Protocol {} has no file with uri \"{}\"", protocol.name(), uri);
            };
            let path = FileFinder::new(&registry).find(item)?;
            match format {
                OutputFormat::Json => to_json(&json!({ "uri": uri, "path": path })),
                OutputFormat::Markdown => format!("{}\n", path.display()),
            }
        }
    };

    print!("{}", output);
    Ok(())
}

/// Load default files (unless disabled), then files given with --config.
fn load_registry(cli: &Cli, policy: OverridePolicy) -> Result<(Registry, LoadReport)> {
    let mut registry = Registry::new();
    let mut report = LoadReport::default();

    if !cli.no_defaults {
        let defaults = registry
            .load_default_databases(&ConfigPaths::discover(), policy)
            .context("Failed to load default configuration files")?;
        report.loaded.extend(defaults.loaded);
        report.conflicts.extend(defaults.conflicts);
    }

    if !cli.configs.is_empty() {
        let explicit = registry
            .load_databases(&cli.configs, policy)
            .context("Failed to load configuration files")?;
        report.loaded.extend(explicit.loaded);
        report.conflicts.extend(explicit.conflicts);
    }

    debug!(
        files = report.loaded.len(),
        databases = registry.list_databases().len(),
        "Registry ready"
    );
    Ok((registry, report))
}

fn run_show(registry: &Registry, args: &ShowArgs, format: OutputFormat) -> Result<String> {
    let protocol = registry.get_protocol(&args.protocol)?;

    let Some(ref subset) = args.subset else {
        let summary = ProtocolSummary::new(&protocol)?;
        return Ok(match format {
            OutputFormat::Json => to_json(&summary),
            OutputFormat::Markdown => format_protocol_markdown(&summary),
        });
    };

    let files = if subset == "files" && !protocol.has_subset("files") {
        protocol.files()?
    } else {
        protocol.subset(subset)?
    };
    Ok(match format {
        OutputFormat::Json => to_json(&files),
        OutputFormat::Markdown => format_files_markdown(subset, &files),
    })
}
