//! CLI command definitions for protocol-registry
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use crate::registry::OverridePolicy;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    /// Markdown (default)
    #[default]
    Markdown,
    /// Pretty-printed JSON
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Override policy accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PolicyArg {
    /// Later files replace earlier protocols silently
    Override,
    /// Later files replace earlier protocols, with a warning
    WarnOverride,
    /// Earlier protocols are kept, with a warning (default)
    #[default]
    #[value(alias = "warn")]
    WarnKeep,
    /// Earlier protocols are kept silently
    #[value(alias = "ignore")]
    Keep,
}

impl From<PolicyArg> for OverridePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Override => OverridePolicy::Override,
            PolicyArg::WarnOverride => OverridePolicy::WarnOverride,
            PolicyArg::WarnKeep => OverridePolicy::WarnKeep,
            PolicyArg::Keep => OverridePolicy::Keep,
        }
    }
}

/// Inspect dataset protocols declared in database.yml files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to load (repeatable, loaded in order after the defaults)
    #[arg(short, long = "config", value_name = "FILE", global = true)]
    pub configs: Vec<PathBuf>,

    /// Do not load ~/.protocol-registry/database.yml, ./database.yml or $PROTOCOL_REGISTRY_CONFIG
    #[arg(long, global = true)]
    pub no_defaults: bool,

    /// How to treat protocols declared in more than one file
    #[arg(long, value_enum, default_value_t = PolicyArg::WarnKeep, global = true)]
    pub override_policy: PolicyArg,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Markdown, global = true)]
    pub format: FormatArg,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List loaded configuration files and override conflicts
    Status,

    /// List databases
    Databases {
        /// Only databases providing protocols for this task
        #[arg(long)]
        task: Option<String>,
    },

    /// List tasks and the databases supporting them
    Tasks,

    /// Show the tasks and protocols of a database
    Protocols {
        /// Database name
        database: String,
    },

    /// Show a protocol, or the files of one of its subsets
    Show(ShowArgs),

    /// Show media path templates
    Sources {
        /// Only this database
        database: Option<String>,
    },

    /// Locate the media file of a protocol item
    Find {
        /// Fully-qualified protocol name
        protocol: String,
        /// Item uri
        uri: String,
    },
}

/// Arguments for the show subcommand
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Fully-qualified protocol name (Database.Task.Protocol)
    pub protocol: String,

    /// List the files of this subset (train, development, test, files)
    #[arg(short, long)]
    pub subset: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_configs() {
        let cli = Cli::parse_from([
            "protocol-registry",
            "-c",
            "a.yml",
            "--config",
            "b.yml",
            "databases",
        ]);
        assert_eq!(cli.configs, vec![PathBuf::from("a.yml"), PathBuf::from("b.yml")]);
        assert!(matches!(cli.command, Command::Databases { task: None }));
        assert_eq!(cli.override_policy, PolicyArg::WarnKeep);
    }

    #[test]
    fn test_policy_aliases() {
        let cli = Cli::parse_from(["protocol-registry", "--override-policy", "ignore", "tasks"]);
        assert_eq!(OverridePolicy::from(cli.override_policy), OverridePolicy::Keep);

        let cli = Cli::parse_from(["protocol-registry", "tasks", "--override-policy", "warn"]);
        assert_eq!(OverridePolicy::from(cli.override_policy), OverridePolicy::WarnKeep);
    }

    #[test]
    fn test_show_subset() {
        let cli = Cli::parse_from([
            "protocol-registry",
            "show",
            "AMI.SpeakerDiarization.MixHeadset",
            "--subset",
            "train",
            "-f",
            "json",
        ]);
        match cli.command {
            Command::Show(args) => {
                assert_eq!(args.protocol, "AMI.SpeakerDiarization.MixHeadset");
                assert_eq!(args.subset.as_deref(), Some("train"));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.format, FormatArg::Json);
    }
}
