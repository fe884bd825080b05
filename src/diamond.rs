//! Wrapper around the external `diamond` aligner.
//!
//! Both invocations (`makedb` on first run, `blastp` per genome) are
//! blocking subprocess calls. A spawn failure means the tool is not
//! installed; a non-zero exit means it ran and failed — the two get distinct
//! user-facing messages and neither is retried. Search results use the
//! default 12-column tabular format and are cached on disk by a filename
//! convention so re-runs skip the alignment.

use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// Overrides the executable looked up on PATH, for installs outside it.
pub const DIAMOND_ENV: &str = "GEMPRUNE_DIAMOND";
const DEFAULT_BIN: &str = "diamond";

/// One row of diamond's 12-column tabular output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiamondHit {
    pub query: String,
    pub subject: String,
    pub identity: f64,
    pub alignment_length: u32,
    pub mismatches: u32,
    pub gap_openings: u32,
    pub query_start: u32,
    pub query_end: u32,
    pub subject_start: u32,
    pub subject_end: u32,
    pub evalue: f64,
    pub bitscore: f64,
}

pub fn diamond_executable() -> String {
    match std::env::var(DIAMOND_ENV) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => DEFAULT_BIN.to_string(),
    }
}

/// Cached search output name for one reconstruction target.
pub fn cached_output_name(model_id: &str) -> String {
    format!("{model_id}-Diamond.tsv")
}

/// `diamond makedb --in <fasta> -d <db>`; run once to build the reference
/// database from the shipped FASTA.
pub fn make_database(fasta_file: &Path, database_file: &Path) -> Result<()> {
    // diamond appends the .dmnd extension itself.
    let db_prefix = database_file.with_extension("");
    let mut cmd = Command::new(diamond_executable());
    cmd.arg("makedb")
        .arg("--in")
        .arg(fasta_file)
        .arg("-d")
        .arg(&db_prefix);
    run_checked(cmd, false)
}

/// `diamond blastp` of the query proteins against the reference database,
/// writing tabular output to `output_file`. `extra_args` is the user's
/// whitespace-separated passthrough string.
pub fn run_blastp(
    query_file: &Path,
    database_file: &Path,
    output_file: &Path,
    extra_args: Option<&str>,
) -> Result<()> {
    let mut cmd = Command::new(diamond_executable());
    cmd.arg("blastp")
        .arg("-d")
        .arg(database_file)
        .arg("-q")
        .arg(query_file)
        .arg("-o")
        .arg(output_file)
        .arg("--outfmt")
        .arg("6");
    let custom_args = extra_args.is_some_and(|args| !args.trim().is_empty());
    if let Some(args) = extra_args {
        cmd.args(args.split_whitespace());
    }
    run_checked(cmd, custom_args)
}

fn run_checked(mut cmd: Command, custom_args: bool) -> Result<()> {
    let rendered = render_command(&cmd);
    let status = cmd.status().map_err(|_| {
        anyhow!(
            "Unable to run diamond with the command \"{rendered}\".\n\
             Make sure diamond is installed and available in your PATH, \
             or point {DIAMOND_ENV} at the executable."
        )
    })?;
    if !status.success() {
        if custom_args {
            return Err(anyhow!(
                "Failed to run diamond. Incorrect diamond args? \
                 Please check the documentation or use default args."
            ));
        }
        return Err(anyhow!("Failed to run diamond."));
    }
    Ok(())
}

fn render_command(cmd: &Command) -> String {
    let mut rendered = cmd.get_program().to_string_lossy().to_string();
    for arg in cmd.get_args() {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

pub fn parse_output(path: &Path) -> Result<Vec<DiamondHit>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)
        .map_err(|e| anyhow!("Could not read diamond output '{}': {e}", path.display()))?;
    let mut hits = vec![];
    for record in reader.deserialize() {
        let hit: DiamondHit = record
            .map_err(|e| anyhow!("Malformed diamond output '{}': {e}", path.display()))?;
        hits.push(hit);
    }
    Ok(hits)
}
