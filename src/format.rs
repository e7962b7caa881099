//! Output formatting utilities for markdown and JSON.

use crate::database::Database;
use crate::error::RegistryResult;
use crate::protocol::{Protocol, ProtocolFile};
use crate::registry::{LoadReport, Registry};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Markdown,
}

/// Serializable view of a database.
#[derive(Debug, Serialize)]
pub struct DatabaseSummary {
    pub name: String,
    /// Task -> protocol names.
    pub tasks: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl DatabaseSummary {
    pub fn new(database: &Database, registry: &Registry) -> Self {
        let tasks = database
            .tasks()
            .into_iter()
            .map(|task| {
                let protocols = database
                    .protocols(task)
                    .unwrap_or_default()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                (task.to_string(), protocols)
            })
            .collect();

        Self {
            name: database.name().to_string(),
            tasks,
            sources: registry
                .sources(database.name())
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
        }
    }
}

/// Serializable view of a protocol, with item counts per subset.
#[derive(Debug, Serialize)]
pub struct ProtocolSummary {
    pub name: String,
    pub config_path: String,
    pub meta: bool,
    pub subsets: IndexMap<String, usize>,
}

impl ProtocolSummary {
    pub fn new(protocol: &Protocol) -> RegistryResult<Self> {
        let mut subsets = IndexMap::new();
        for name in protocol.subset_names() {
            subsets.insert(name.to_string(), protocol.subset(name)?.len());
        }
        Ok(Self {
            name: protocol.name(),
            config_path: protocol.config_path().display().to_string(),
            meta: protocol.is_meta(),
            subsets,
        })
    }
}

/// Format a list of databases as markdown.
pub fn format_databases_markdown(names: &[String], task: Option<&str>) -> String {
    let mut md = String::new();

    match task {
        Some(task) => md.push_str(&format!("# Databases for {} ({})\n\n", task, names.len())),
        None => md.push_str(&format!("# Databases ({})\n\n", names.len())),
    }
    for name in names {
        md.push_str(&format!("- {}\n", name));
    }

    md
}

/// Format a list of tasks, with the databases supporting each, as markdown.
pub fn format_tasks_markdown(registry: &Registry) -> String {
    let tasks = registry.list_tasks();
    let mut md = String::new();

    md.push_str(&format!("# Tasks ({})\n\n", tasks.len()));
    for task in &tasks {
        let databases = registry.databases_for_task(task);
        md.push_str(&format!("- **{}**: {}\n", task, databases.join(", ")));
    }

    md
}

/// Format a database as markdown.
pub fn format_database_markdown(summary: &DatabaseSummary) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Database: {}\n", summary.name));

    if !summary.sources.is_empty() {
        md.push_str("\n### Sources\n");
        for source in &summary.sources {
            md.push_str(&format!("- `{}`\n", source));
        }
    }

    for (task, protocols) in &summary.tasks {
        md.push_str(&format!("\n## {}\n", task));
        for protocol in protocols {
            md.push_str(&format!("- {}.{}.{}\n", summary.name, task, protocol));
        }
    }

    md
}

/// Format a protocol as markdown.
pub fn format_protocol_markdown(summary: &ProtocolSummary) -> String {
    let mut md = String::new();

    md.push_str(&format!("## Protocol: {}\n", summary.name));
    md.push_str(&format!("- **defined in**: `{}`\n", summary.config_path));
    if summary.meta {
        md.push_str("- **meta-protocol**: yes\n");
    }

    md.push_str("\n### Subsets\n");
    for (name, count) in &summary.subsets {
        md.push_str(&format!("- **{}**: {} files\n", name, count));
    }

    md
}

/// Format protocol items as markdown.
pub fn format_files_markdown(subset: &str, files: &[ProtocolFile]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {} ({})\n\n", subset, files.len()));
    for file in files {
        md.push_str(&format!("- `{}`", file.unique_identifier()));
        if !file.fields.is_empty() {
            let keys: Vec<&str> = file.fields.keys().map(String::as_str).collect();
            md.push_str(&format!(" ({})", keys.join(", ")));
        }
        md.push('\n');
    }

    md
}

/// Format the `Databases` section of every loaded file as markdown.
pub fn format_sources_markdown(sources: &BTreeMap<String, Vec<String>>) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Sources ({})\n", sources.len()));
    for (database, templates) in sources {
        md.push_str(&format!("\n## {}\n", database));
        for template in templates {
            md.push_str(&format!("- `{}`\n", template));
        }
    }

    md
}

/// Format a load report as markdown.
pub fn format_load_report_markdown(report: &LoadReport) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Loaded files ({})\n\n", report.loaded.len()));
    for path in &report.loaded {
        md.push_str(&format!("- `{}`\n", path.display()));
    }

    if !report.conflicts.is_empty() {
        md.push_str(&format!("\n### Conflicts ({})\n", report.conflicts.len()));
        for conflict in &report.conflicts {
            md.push_str(&format!("- {}\n", conflict));
        }
    }

    md
}

/// Serialize any value as pretty JSON.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        Value::Object(
            [("error".to_string(), Value::String(e.to_string()))]
                .into_iter()
                .collect(),
        )
        .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolKey;
    use crate::protocol::{FileListSubset, Subset, UriSource};
    use std::sync::Arc;

    fn protocol() -> Protocol {
        let mut subsets = IndexMap::new();
        subsets.insert(
            "train".to_string(),
            Subset::FileList(FileListSubset {
                uris: UriSource::Inline(vec!["a".into(), "b".into()]),
                fields: IndexMap::new(),
            }),
        );
        Protocol::new(
            ProtocolKey::new("AMI", "SpeakerDiarization", "MixHeadset"),
            "/cfg/database.yml",
            subsets,
        )
    }

    #[test]
    fn test_protocol_summary_counts_items() {
        let summary = ProtocolSummary::new(&protocol()).unwrap();
        assert_eq!(summary.name, "AMI.SpeakerDiarization.MixHeadset");
        assert_eq!(summary.subsets["train"], 2);

        let md = format_protocol_markdown(&summary);
        assert!(md.contains("## Protocol: AMI.SpeakerDiarization.MixHeadset"));
        assert!(md.contains("- **train**: 2 files"));
    }

    #[test]
    fn test_database_summary_json() {
        let p = Arc::new(protocol());
        let mut protocols = IndexMap::new();
        protocols.insert(p.key().local(), p);
        let database = Database::new("AMI", protocols);

        let summary = DatabaseSummary::new(&database, &Registry::new());
        let json: Value = serde_json::from_str(&to_json(&summary)).unwrap();
        assert_eq!(json["name"], "AMI");
        assert_eq!(json["tasks"]["SpeakerDiarization"][0], "MixHeadset");
        assert!(json.get("sources").is_none());
    }

    #[test]
    fn test_databases_markdown() {
        let md = format_databases_markdown(&["AMI".to_string(), "X".to_string()], None);
        assert!(md.starts_with("# Databases (2)"));
        assert!(md.contains("- X\n"));
    }
}
