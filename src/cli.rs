//! CLI surface (spec.md §6), built with `clap` derive following the
//! teacher's `Cli`/`Commands`/`Subcommand` pattern. The command-line
//! surface itself is an external collaborator (spec.md §1's "out of
//! scope" list); this module is the thin skeleton that parses arguments
//! and hands them to `commands::*`.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "center-ingest")]
#[command(about = "Center file ingestion, validation and table reconciliation engine", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate one submission unit locally and report pass/fail.
    ValidateSingleFile {
        /// Project identifier.
        #[arg(long)]
        project_id: String,
        /// One or two file paths comprising the submission unit.
        #[arg(required = true, num_args = 1..=2)]
        filepath: Vec<String>,
        /// Submitting center.
        center: String,
        /// Explicit filetype override, skipping detection.
        #[arg(long)]
        filetype: Option<String>,
        /// If set and validation passes, upload the files to this container.
        #[arg(long)]
        parentid: Option<String>,
        /// Extension packages to discover formats/validation helper from.
        #[arg(long = "format-registry-packages", num_args = 0..)]
        format_registry_packages: Vec<String>,
    },
    /// Create the fixed persisted-state tables, per-center input folders,
    /// per-format output folders/tables, and the project's `dbMapping`
    /// annotation.
    BootstrapInfra {
        #[arg(long, conflicts_with = "project_id", required_unless_present = "project_id")]
        project_name: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
        /// Centers to provision input folders/table rows for.
        #[arg(long, required = true, num_args = 1..)]
        centers: Vec<String>,
        #[arg(long = "format-registry-packages", num_args = 0..)]
        format_registry_packages: Vec<String>,
    },
    /// Run the per-center pipeline.
    Process {
        #[arg(long)]
        project_id: String,
        /// Limit to one center; omit to run every center whose
        /// `centerMapping.release` flag is set.
        #[arg(long)]
        center: Option<String>,
        /// Skip format-table processing; only validate and record status.
        #[arg(long)]
        only_validate: bool,
        /// Wipe the per-center scratch directory before downloading.
        #[arg(long)]
        delete_old: bool,
        #[arg(long = "format-registry-packages", num_args = 0..)]
        format_registry_packages: Vec<String>,
    },
    /// Rewire a file type's destination table, archiving the old one.
    ReplaceDb {
        #[arg(long)]
        project_id: String,
        /// The file type whose destination table is being replaced.
        filetype: String,
        /// Project to archive the old table under.
        archive_project_id: String,
        /// Name for the new destination table.
        table_name: String,
    },
    /// Print the concatenated error texts for one center.
    GetFileErrors {
        #[arg(long)]
        project_id: String,
        center: String,
    },
}
