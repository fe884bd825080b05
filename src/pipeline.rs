//! End-to-end reconstruction run.
//!
//! Sequences the stages in their fixed order — reference data, universal
//! network, constraints, taxonomy, ORFs, homology search, scoring, pruning —
//! and writes the coarse progress checkpoints (3, 4, 8, 30, 40, 99) that
//! external watchers poll. Each invocation starts fresh; only the cached
//! network snapshot and a previous run's diamond output are re-used.

use crate::accumulate::{self, ConstraintsFromFile};
use crate::constraints_file;
use crate::datafiles;
use crate::diamond;
use crate::orf;
use crate::pathways::PathwayMembershipIndex;
use crate::progress::{ProgressStatus, save_progress};
use crate::prune;
use crate::scoring;
use crate::taxonomy;
use crate::universe::NetworkViews;
use anyhow::{Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub diamond_args: Option<String>,
    pub verbose: bool,
    pub constraints: Option<PathBuf>,
    pub reference: Option<PathBuf>,
}

/// How a run ended without erroring. A genome with too little evidence is a
/// legitimate answer, not a crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    ModelWritten(PathBuf),
    InsufficientEvidence(String),
}

/// Model identifier and output path, derived from the explicit output when
/// given, otherwise from the input file name.
pub fn derive_output(input: &Path, output: Option<&Path>) -> (String, PathBuf) {
    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("xml"));
    let model_id = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "model".to_string());
    (model_id, output_path)
}

pub fn run(options: &PipelineOptions) -> Result<RunOutcome> {
    let (model_id, output_path) = derive_output(&options.input, options.output.as_deref());
    let output_folder = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&output_folder).map_err(|e| {
        anyhow!(
            "Unable to create output folder '{}': {e}",
            output_folder.display()
        )
    })?;
    save_progress(&output_folder, &ProgressStatus::Percent(3));

    let generated_dir = datafiles::generated_dir();
    let pathways = PathwayMembershipIndex::load_from_dir(&generated_dir)?;
    let mut views = NetworkViews::load_or_build(&generated_dir)?;
    if options.verbose {
        println!(
            "Universal network ready: {} reactions, {} metabolites",
            views.reaction_count(),
            views.metabolite_count()
        );
    }

    let constraints_from_file = match &options.constraints {
        Some(path) => {
            let index = constraints_file::load_constraints_file(path, &pathways)?;
            accumulate::resolve_constraints(&index, &mut views, &pathways)
        }
        None => ConstraintsFromFile::default(),
    };

    let taxonomy_constraints = taxonomy::load_for_input(&options.input)?;
    save_progress(&output_folder, &ProgressStatus::Percent(4));

    let prepared = orf::prepare_protein_input(&options.input, &output_folder)?;
    save_progress(&output_folder, &ProgressStatus::Percent(8));

    let blast_output = output_folder.join(diamond::cached_output_name(&model_id));
    let cached = blast_output
        .metadata()
        .map(|meta| meta.len() > 0)
        .unwrap_or(false);
    if !cached {
        if options.verbose {
            println!("Running diamond...");
        }
        diamond::run_blastp(
            &prepared.protein_fasta,
            &generated_dir.join(datafiles::DIAMOND_DB_FILE),
            &blast_output,
            options.diamond_args.as_deref(),
        )?;
    } else if options.verbose {
        println!(
            "Re-using cached diamond output '{}'",
            blast_output.display()
        );
    }
    save_progress(&output_folder, &ProgressStatus::Percent(30));

    let hits = diamond::parse_output(&blast_output)?;
    let protein_map =
        scoring::load_protein_reaction_map(&generated_dir.join(datafiles::PROTEIN_TO_REACTION_FILE))?;
    let scoring_result = scoring::score_reactions(
        &hits,
        &protein_map,
        &views,
        &taxonomy_constraints,
        &constraints_from_file,
    );
    save_progress(&output_folder, &ProgressStatus::Percent(40));

    let Some(mut reaction_scoring) = scoring_result else {
        let message =
            "The input genome did not match sufficient genes/reactions in the database.".to_string();
        save_progress(&output_folder, &ProgressStatus::Failure(message.clone()));
        return Ok(RunOutcome::InsufficientEvidence(message));
    };

    if let Some(reference) = &options.reference {
        let adjusted = scoring::apply_reference_model(reference, &views, &mut reaction_scoring)?;
        if options.verbose {
            println!("Reference model raised the score of {adjusted} reactions");
        }
    }

    if options.verbose {
        println!("All in place! Starting to reconstruct model.");
    }
    let Some(model) = prune::prune_model(&views, &reaction_scoring, &model_id) else {
        let message = "Failed to build model.".to_string();
        save_progress(&output_folder, &ProgressStatus::Failure(message.clone()));
        return Ok(RunOutcome::InsufficientEvidence(message));
    };

    prune::write_sbml(&model, &output_path)?;
    save_progress(&output_folder, &ProgressStatus::Percent(99));
    if options.verbose {
        println!(
            "Wrote draft model with {} reactions to '{}'",
            model.reactions.len(),
            output_path.display()
        );
    }
    Ok(RunOutcome::ModelWritten(output_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::PROGRESS_FILE_NAME;
    use crate::universe_sbml;
    use tempfile::tempdir;

    // Both end-to-end tests point GEMPRUNE_DATA_DIR at their own tempdir;
    // the lock keeps the process-global variable consistent per test.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn test_derive_output() {
        let (model_id, output) = derive_output(Path::new("genomes/eco.faa"), None);
        assert_eq!(model_id, "eco");
        assert_eq!(output, PathBuf::from("genomes/eco.xml"));

        let (model_id, output) =
            derive_output(Path::new("eco.faa"), Some(Path::new("out/draft-model.xml")));
        assert_eq!(model_id, "draft-model");
        assert_eq!(output, PathBuf::from("out/draft-model.xml"));
    }

    /// Full run against a seeded data directory, with the diamond output
    /// pre-cached so no external tool is needed.
    #[test]
    fn test_run_end_to_end_with_cached_diamond_output() {
        let td = tempdir().unwrap();
        let generated = td.path().join("refdata").join(datafiles::GENERATED_SUBDIR);
        fs::create_dir_all(&generated).unwrap();
        fs::write(
            generated.join(datafiles::UNIVERSAL_SBML_FILE),
            include_str!("../test_files/universal_toy.xml"),
        )
        .unwrap();
        fs::write(
            generated.join(datafiles::KEGG_MODULES_FILE),
            r#"{"M00001": {"RxnsInvolved": [[["R00299"]]]}}"#,
        )
        .unwrap();
        fs::write(
            generated.join(datafiles::BIOCYC_PATHWAYS_FILE),
            r#"{"PWY-5484": {"RxnsInvolved": ["GLUCOKIN-RXN"]}}"#,
        )
        .unwrap();
        fs::write(
            generated.join(datafiles::PROTEIN_TO_REACTION_FILE),
            "P00001\tGLUCOKIN-RXN_forwardTemp\n",
        )
        .unwrap();

        let work = td.path().join("run");
        fs::create_dir_all(&work).unwrap();
        let input = work.join("eco.faa");
        fs::write(&input, ">orf_1 glucokinase\nMKLVINEQWP\n").unwrap();
        fs::write(
            work.join("eco-Diamond.tsv"),
            "orf_1\tP00001\t92.0\t300\t24\t0\t1\t300\t1\t300\t1e-100\t500.0\n",
        )
        .unwrap();
        let constraints = work.join("constraints.tsv");
        fs::write(
            &constraints,
            "id\ttype\tscore\tgroup\nM_na1\tSoft\t2\tProduct\n",
        )
        .unwrap();

        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { std::env::set_var(datafiles::DATA_DIR_ENV, td.path().join("refdata")) };
        let outcome = run(&PipelineOptions {
            input: input.clone(),
            output: None,
            diamond_args: None,
            verbose: false,
            constraints: Some(constraints),
            reference: None,
        });
        unsafe { std::env::remove_var(datafiles::DATA_DIR_ENV) };

        let outcome = outcome.unwrap();
        let RunOutcome::ModelWritten(model_path) = outcome else {
            panic!("expected a model, got {outcome:?}");
        };
        assert_eq!(model_path, work.join("eco.xml"));

        // Homology kept the glucokinase reaction; the product constraint
        // kept the sodium exchange.
        let model = universe_sbml::parse_sbml_file(&model_path).unwrap();
        let ids: Vec<&str> = model.reactions.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"GLUCOKIN-RXN"));
        assert!(ids.contains(&"EX_na1_e"));

        let progress = fs::read_to_string(work.join(PROGRESS_FILE_NAME)).unwrap();
        assert_eq!(progress, "99\n");

        // The network snapshot was cached for the next run.
        assert!(generated.join(datafiles::NETWORK_SNAPSHOT_FILE).exists());
    }

    #[test]
    fn test_run_without_evidence_is_a_negative_outcome() {
        let td = tempdir().unwrap();
        let generated = td.path().join("refdata").join(datafiles::GENERATED_SUBDIR);
        fs::create_dir_all(&generated).unwrap();
        fs::write(
            generated.join(datafiles::UNIVERSAL_SBML_FILE),
            include_str!("../test_files/universal_toy.xml"),
        )
        .unwrap();
        fs::write(generated.join(datafiles::KEGG_MODULES_FILE), "{}").unwrap();
        fs::write(generated.join(datafiles::BIOCYC_PATHWAYS_FILE), "{}").unwrap();
        fs::write(generated.join(datafiles::PROTEIN_TO_REACTION_FILE), "").unwrap();

        let work = td.path().join("run");
        fs::create_dir_all(&work).unwrap();
        let input = work.join("mystery.faa");
        fs::write(&input, ">orf_1\nMKLVINEQWP\n").unwrap();
        // Cached but empty of usable subjects.
        fs::write(
            work.join("mystery-Diamond.tsv"),
            "orf_1\tUNKNOWN\t92.0\t300\t24\t0\t1\t300\t1\t300\t1e-100\t500.0\n",
        )
        .unwrap();

        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { std::env::set_var(datafiles::DATA_DIR_ENV, td.path().join("refdata")) };
        let outcome = run(&PipelineOptions {
            input,
            ..PipelineOptions::default()
        });
        unsafe { std::env::remove_var(datafiles::DATA_DIR_ENV) };

        let outcome = outcome.unwrap();
        assert!(matches!(outcome, RunOutcome::InsufficientEvidence(_)));
        let progress = fs::read_to_string(work.join(PROGRESS_FILE_NAME)).unwrap();
        assert!(progress.contains("did not match sufficient"));
    }
}
