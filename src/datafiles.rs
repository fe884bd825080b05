//! Locations and bootstrap of the reference data the pipeline depends on.
//!
//! All generated reference files live under `<data dir>/generated`. The data
//! directory defaults to `data` next to the working directory and can be
//! relocated with the `GEMPRUNE_DATA_DIR` environment variable. Missing files
//! are fetched once from the project mirror; the diamond database is built
//! locally from the shipped FASTA on first use.

use crate::diamond;
use anyhow::{Result, anyhow};
use flate2::read::GzDecoder;
use reqwest::blocking::get;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "GEMPRUNE_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const GENERATED_SUBDIR: &str = "generated";

pub const UNIVERSAL_SBML_FILE: &str = "universalRheaUnidirectional.xml";
pub const NETWORK_SNAPSHOT_FILE: &str = "universalNetwork.json";
pub const KEGG_MODULES_FILE: &str = "keggModules.json";
pub const BIOCYC_PATHWAYS_FILE: &str = "biocycPathways.json";
pub const PROTEIN_TO_REACTION_FILE: &str = "proteinToReaction.tsv";
pub const DIAMOND_FASTA_FILE: &str = "reactionDb.fasta";
pub const DIAMOND_DB_FILE: &str = "reactionDb.dmnd";

pub const DATA_MIRROR_URL: &str = "https://files.ufz.de/~umb-pgp_reconstruction-01";

/// Files served by the mirror. The network snapshot and the diamond database
/// are derived locally and intentionally absent from this list.
const MIRRORED_FILES: [&str; 5] = [
    UNIVERSAL_SBML_FILE,
    KEGG_MODULES_FILE,
    BIOCYC_PATHWAYS_FILE,
    PROTEIN_TO_REACTION_FILE,
    DIAMOND_FASTA_FILE,
];

pub fn data_dir() -> PathBuf {
    data_dir_from(std::env::var(DATA_DIR_ENV).ok().as_deref())
}

fn data_dir_from(override_value: Option<&str>) -> PathBuf {
    match override_value.map(str::trim) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_DATA_DIR),
    }
}

pub fn generated_dir() -> PathBuf {
    data_dir().join(GENERATED_SUBDIR)
}

/// Fetch mirrored files that are absent locally (all of them when `force` is
/// set). Returns whether anything was downloaded, which callers treat as the
/// first-run signal.
pub fn download_missing_files(force: bool) -> Result<bool> {
    sync_files(DATA_MIRROR_URL, &generated_dir(), force)
}

fn sync_files(base_url: &str, target_dir: &Path, force: bool) -> Result<bool> {
    fs::create_dir_all(target_dir).map_err(|e| {
        anyhow!(
            "Could not create data directory '{}': {e}",
            target_dir.display()
        )
    })?;

    let mut downloaded_any = false;
    for name in MIRRORED_FILES {
        let destination = target_dir.join(name);
        if !force && destination.exists() {
            continue;
        }
        println!("Downloading '{name}' from the data mirror...");
        // Mirror serves gzip-compressed copies; fall back to the plain file.
        let gz_result = materialize_source(&format!("{base_url}/{name}.gz"), &destination);
        if let Err(gz_error) = gz_result {
            materialize_source(&format!("{base_url}/{name}"), &destination).map_err(|e| {
                anyhow!(
                    "{gz_error}\n{e}\nYou can manually download the missing files from {DATA_MIRROR_URL}/"
                )
            })?;
        }
        downloaded_any = true;
    }
    Ok(downloaded_any)
}

/// Make sure every reference file and the diamond database exist before the
/// pipeline starts. Returns true when this was a bootstrap run that fetched
/// files, in which case the caller asks the user to start again.
pub fn first_run_check(update_db: bool) -> Result<bool> {
    if update_db && download_missing_files(true)? {
        return Ok(true);
    }

    let diamond_db = generated_dir().join(DIAMOND_DB_FILE);
    if !diamond_db.exists() {
        // Only touches the network while the diamond database is absent.
        if download_missing_files(false)? {
            return Ok(true);
        }

        let fasta_file = generated_dir().join(DIAMOND_FASTA_FILE);
        if !fasta_file.exists() {
            return Err(anyhow!(
                "Reference FASTA '{}' is missing; manually download it from {DATA_MIRROR_URL}/",
                fasta_file.display()
            ));
        }
        println!(
            "Running diamond for the first time, please wait while we build the internal database..."
        );
        diamond::make_database(&fasta_file, &diamond_db)?;
    }

    Ok(false)
}

struct SourceReader {
    reader: Box<dyn Read>,
    gzip: bool,
}

fn open_source_reader(source: &str) -> Result<SourceReader> {
    let gzip = source.to_ascii_lowercase().ends_with(".gz");
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = get(source)
            .map_err(|e| anyhow!("Could not fetch '{source}': {e}"))?
            .error_for_status()
            .map_err(|e| anyhow!("Could not fetch '{source}': {e}"))?;
        return Ok(SourceReader {
            reader: Box::new(response),
            gzip,
        });
    }
    let path = if let Some(stripped) = source.strip_prefix("file://") {
        PathBuf::from(stripped)
    } else {
        PathBuf::from(source)
    };
    let file = File::open(&path)
        .map_err(|e| anyhow!("Could not open source file '{}': {e}", path.display()))?;
    Ok(SourceReader {
        reader: Box::new(file),
        gzip,
    })
}

/// Stream one source into place through a `.part` staging file so interrupted
/// downloads never leave a truncated reference file behind.
fn materialize_source(source: &str, destination: &Path) -> Result<()> {
    let mut tmp_os: OsString = destination.as_os_str().to_os_string();
    tmp_os.push(".part");
    let tmp_path = PathBuf::from(tmp_os);

    let SourceReader { reader, gzip } = open_source_reader(source)?;
    let mut writer = BufWriter::new(
        File::create(&tmp_path)
            .map_err(|e| anyhow!("Could not create '{}': {e}", tmp_path.display()))?,
    );

    let copy_result = if gzip {
        let mut decoder = GzDecoder::new(reader);
        std::io::copy(&mut decoder, &mut writer)
            .map_err(|e| anyhow!("Could not decompress '{source}': {e}"))
    } else {
        let mut reader = reader;
        std::io::copy(&mut reader, &mut writer)
            .map_err(|e| anyhow!("Could not copy '{source}': {e}"))
    };

    if let Err(e) = copy_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    drop(writer);

    fs::rename(&tmp_path, destination).map_err(|e| {
        anyhow!(
            "Could not finalize destination '{}': {e}",
            destination.display()
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;
    use tempfile::tempdir;

    fn write_gzip(path: &Path, text: &str) {
        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_data_dir_override() {
        assert_eq!(data_dir_from(None), PathBuf::from("data"));
        assert_eq!(data_dir_from(Some("  ")), PathBuf::from("data"));
        assert_eq!(data_dir_from(Some("/opt/refdata")), PathBuf::from("/opt/refdata"));
    }

    #[test]
    fn test_sync_files_downloads_and_decompresses_missing_files() {
        let td = tempdir().unwrap();
        let mirror = td.path().join("mirror");
        fs::create_dir_all(&mirror).unwrap();
        for name in MIRRORED_FILES {
            write_gzip(&mirror.join(format!("{name}.gz")), &format!("payload of {name}"));
        }

        let target = td.path().join("generated");
        let base_url = format!("file://{}", mirror.display());
        let downloaded = sync_files(&base_url, &target, false).unwrap();
        assert!(downloaded);
        let text = fs::read_to_string(target.join(KEGG_MODULES_FILE)).unwrap();
        assert_eq!(text, format!("payload of {KEGG_MODULES_FILE}"));
        assert!(!target.join(format!("{KEGG_MODULES_FILE}.part")).exists());

        // Second pass finds everything in place and fetches nothing.
        let downloaded = sync_files(&base_url, &target, false).unwrap();
        assert!(!downloaded);
    }

    #[test]
    fn test_sync_files_force_refreshes_existing_files() {
        let td = tempdir().unwrap();
        let mirror = td.path().join("mirror");
        fs::create_dir_all(&mirror).unwrap();
        for name in MIRRORED_FILES {
            write_gzip(&mirror.join(format!("{name}.gz")), "fresh");
        }

        let target = td.path().join("generated");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join(UNIVERSAL_SBML_FILE), "stale").unwrap();

        let base_url = format!("file://{}", mirror.display());
        let downloaded = sync_files(&base_url, &target, true).unwrap();
        assert!(downloaded);
        let text = fs::read_to_string(target.join(UNIVERSAL_SBML_FILE)).unwrap();
        assert_eq!(text, "fresh");
    }

    #[test]
    fn test_sync_files_falls_back_to_uncompressed_source() {
        let td = tempdir().unwrap();
        let mirror = td.path().join("mirror");
        fs::create_dir_all(&mirror).unwrap();
        // No .gz copies on this mirror, only the plain files.
        for name in MIRRORED_FILES {
            fs::write(mirror.join(name), "plain").unwrap();
        }

        let target = td.path().join("generated");
        let base_url = format!("file://{}", mirror.display());
        assert!(sync_files(&base_url, &target, false).unwrap());
        assert_eq!(
            fs::read_to_string(target.join(DIAMOND_FASTA_FILE)).unwrap(),
            "plain"
        );
    }
}
