use gemprune::{about, datafiles, pipeline};
use std::env;
use std::path::PathBuf;

fn usage() {
    eprintln!(
        "Reconstruct a metabolic model using pathway-guided pruning\n\n\
         Usage:\n  \
         gemprune INPUT [options]\n\n\
         INPUT is a protein FASTA, DNA FASTA or GenBank file.\n\n\
         Options:\n  \
         --diamond-args ARGS   Additional arguments passed to diamond\n  \
         -o, --output PATH     SBML output file (default: INPUT with .xml)\n  \
         -q, --quiet           Switch off the verbose mode\n  \
         --constraints PATH    Constraints file (tab-separated)\n  \
         --reference PATH      Manually curated model of a close reference species\n  \
         --updateDB            Look for a more recent version of the reference databases\n  \
         --version             Print version information"
    );
}

struct CliArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    diamond_args: Option<String>,
    verbose: bool,
    constraints: Option<PathBuf>,
    reference: Option<PathBuf>,
    update_db: bool,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut inputs: Vec<PathBuf> = vec![];
    let mut output = None;
    let mut diamond_args = None;
    let mut verbose = true;
    let mut constraints = None;
    let mut reference = None;
    let mut update_db = false;

    let take_value = |iter: &mut std::slice::Iter<String>, flag: &str| {
        iter.next()
            .cloned()
            .ok_or_else(|| format!("Missing value for {flag}"))
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--diamond-args" => diamond_args = Some(take_value(&mut iter, arg)?),
            "-o" | "--output" => output = Some(PathBuf::from(take_value(&mut iter, arg)?)),
            "-q" | "--quiet" => verbose = false,
            "--constraints" => constraints = Some(PathBuf::from(take_value(&mut iter, arg)?)),
            "--reference" => reference = Some(PathBuf::from(take_value(&mut iter, arg)?)),
            "--updateDB" => update_db = true,
            flag if flag.starts_with('-') => {
                usage();
                return Err(format!("Unknown option '{flag}'"));
            }
            _ => inputs.push(PathBuf::from(arg)),
        }
    }

    if inputs.is_empty() {
        usage();
        return Err("Missing INPUT file".to_string());
    }
    if inputs.len() > 1 {
        return Err(
            "Can only accept one input per run. If your file name has spaces, try using \
             double quotes ( \" ) instead of single quotes ( ' ), or replace the white \
             space by underscore signs."
                .to_string(),
        );
    }

    Ok(CliArgs {
        input: inputs.remove(0),
        output,
        diamond_args,
        verbose,
        constraints,
        reference,
        update_db,
    })
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }
    let cli = parse_args(&args)?;

    let first_run = datafiles::first_run_check(cli.update_db).map_err(|e| e.to_string())?;
    if first_run {
        println!(
            "\n########\nThis was gemprune's first run. Reference files were downloaded. \
             Please start the application again for normal usage. If you keep seeing this \
             message, manually download the missing files from:\n{}/\n########\n",
            datafiles::DATA_MIRROR_URL
        );
        return Ok(());
    }

    let options = pipeline::PipelineOptions {
        input: cli.input,
        output: cli.output,
        diamond_args: cli.diamond_args,
        verbose: cli.verbose,
        constraints: cli.constraints,
        reference: cli.reference,
    };
    match pipeline::run(&options).map_err(|e| e.to_string())? {
        pipeline::RunOutcome::ModelWritten(path) => {
            if options.verbose {
                println!("Done. Model written to '{}'", path.display());
            }
            Ok(())
        }
        // A genome without enough evidence is an answer, not an error.
        pipeline::RunOutcome::InsufficientEvidence(message) => {
            println!("{message}");
            Ok(())
        }
    }
}
