//! Input classification and open reading frame discovery.
//!
//! The homology step wants a protein FASTA. Protein input passes through
//! unchanged; GenBank input contributes its annotated CDS translations;
//! nucleotide FASTA input goes through a six-frame ORF scan with in-line
//! translation. The six frames are scanned in parallel, one job per frame.

use anyhow::{Result, anyhow};
use bio::io::fasta;
use indexmap::IndexMap;
use rayon::prelude::*;
use regex::Regex;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Shortest ORF worth translating, in amino acids.
pub const MIN_ORF_AA: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    ProteinFasta,
    NucleotideFasta,
    GenBank,
}

/// Protein FASTA handed to the homology search, plus what each sequence ID
/// meant in the original input (gene/product names where known).
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub protein_fasta: PathBuf,
    pub descriptions: IndexMap<String, String>,
}

static NUCLEOTIDE_ALPHABET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ACGTUNRYSWKMBDHV]*$").unwrap());

/// Sniff what kind of input the user gave us. GenBank is recognized by its
/// `LOCUS` header, FASTA sequence type by its alphabet: a sequence made
/// entirely of nucleotide (IUPAC) letters is treated as DNA/RNA.
pub fn classify_input(path: &Path) -> Result<InputKind> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Could not read input file '{}': {e}", path.display()))?;
    if text.trim_start().starts_with("LOCUS") {
        return Ok(InputKind::GenBank);
    }

    let mut sampled = String::new();
    for line in text.lines() {
        if line.starts_with('>') || line.starts_with(';') {
            continue;
        }
        sampled.push_str(line.trim());
        if sampled.len() >= 10_000 {
            break;
        }
    }
    if sampled.is_empty() {
        return Err(anyhow!(
            "Input file '{}' contains no sequence data",
            path.display()
        ));
    }
    if NUCLEOTIDE_ALPHABET.is_match(&sampled.to_ascii_uppercase()) {
        Ok(InputKind::NucleotideFasta)
    } else {
        Ok(InputKind::ProteinFasta)
    }
}

/// Make sure a protein FASTA exists for the input, deriving one under
/// `work_dir` when the input is nucleotide or GenBank.
pub fn prepare_protein_input(input: &Path, work_dir: &Path) -> Result<PreparedInput> {
    match classify_input(input)? {
        InputKind::ProteinFasta => {
            let reader = fasta::Reader::new(File::open(input).map_err(|e| {
                anyhow!("Could not open input file '{}': {e}", input.display())
            })?);
            let mut descriptions = IndexMap::new();
            for record in reader.records().filter_map(|r| r.ok()) {
                descriptions.insert(
                    record.id().to_string(),
                    record.desc().unwrap_or(record.id()).to_string(),
                );
            }
            Ok(PreparedInput {
                protein_fasta: input.to_path_buf(),
                descriptions,
            })
        }
        InputKind::NucleotideFasta => translate_nucleotide_fasta(input, work_dir),
        InputKind::GenBank => extract_genbank_translations(input, work_dir),
    }
}

fn derived_fasta_path(input: &Path, work_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string());
    work_dir.join(format!("{stem}-proteins.faa"))
}

fn translate_nucleotide_fasta(input: &Path, work_dir: &Path) -> Result<PreparedInput> {
    let reader = fasta::Reader::new(
        File::open(input).map_err(|e| anyhow!("Could not open input file '{}': {e}", input.display()))?,
    );
    let output_path = derived_fasta_path(input, work_dir);
    let mut writer = fasta::Writer::new(File::create(&output_path).map_err(|e| {
        anyhow!("Could not create protein file '{}': {e}", output_path.display())
    })?);

    let mut descriptions = IndexMap::new();
    for record in reader.records().filter_map(|r| r.ok()) {
        for (n, peptide) in find_orf_peptides(record.seq()).into_iter().enumerate() {
            let orf_id = format!("{}_orf{}", record.id(), n + 1);
            writer
                .write(&orf_id, None, peptide.as_bytes())
                .map_err(|e| anyhow!("Could not write '{}': {e}", output_path.display()))?;
            descriptions.insert(orf_id, format!("ORF from {}", record.id()));
        }
    }
    if descriptions.is_empty() {
        return Err(anyhow!(
            "No open reading frames of at least {MIN_ORF_AA} amino acids found in '{}'",
            input.display()
        ));
    }
    Ok(PreparedInput {
        protein_fasta: output_path,
        descriptions,
    })
}

fn extract_genbank_translations(input: &Path, work_dir: &Path) -> Result<PreparedInput> {
    let seqs = gb_io::reader::parse_file(input)
        .map_err(|e| anyhow!("Could not parse GenBank file '{}': {e}", input.display()))?;
    let output_path = derived_fasta_path(input, work_dir);
    let mut writer = fasta::Writer::new(File::create(&output_path).map_err(|e| {
        anyhow!("Could not create protein file '{}': {e}", output_path.display())
    })?);

    let mut descriptions = IndexMap::new();
    let mut cds_number = 0;
    for seq in &seqs {
        let seq_name = seq.name.clone().unwrap_or_else(|| "sequence".to_string());
        for feature in &seq.features {
            if !feature.kind.to_string().eq_ignore_ascii_case("CDS") {
                continue;
            }
            let Some(translation) = feature
                .qualifier_values("translation".into())
                .next()
                .map(|t| t.replace(char::is_whitespace, ""))
            else {
                continue;
            };
            cds_number += 1;
            let cds_id = feature
                .qualifier_values("locus_tag".into())
                .next()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{seq_name}_cds{cds_number}"));
            let description = feature
                .qualifier_values("gene".into())
                .next()
                .or_else(|| feature.qualifier_values("product".into()).next())
                .unwrap_or(cds_id.as_str())
                .to_string();
            writer
                .write(&cds_id, None, translation.as_bytes())
                .map_err(|e| anyhow!("Could not write '{}': {e}", output_path.display()))?;
            descriptions.insert(cds_id, description);
        }
    }
    if descriptions.is_empty() {
        return Err(anyhow!(
            "GenBank file '{}' contains no CDS translations",
            input.display()
        ));
    }
    Ok(PreparedInput {
        protein_fasta: output_path,
        descriptions,
    })
}

/// Translate all six reading frames of a linear sequence, returning the
/// peptide of every ORF (ATG to stop) at least `MIN_ORF_AA` long. Frame
/// order is stable: forward frames 0..3, then reverse frames 0..3.
pub fn find_orf_peptides(sequence: &[u8]) -> Vec<String> {
    let forward = sequence.to_ascii_uppercase();
    let reverse = reverse_complement(&forward);
    let frames: [(&[u8], usize); 6] = [
        (&forward, 0),
        (&forward, 1),
        (&forward, 2),
        (&reverse, 0),
        (&reverse, 1),
        (&reverse, 2),
    ];
    frames
        .par_iter()
        .flat_map(|(frame, offset)| scan_frame(frame, *offset))
        .collect()
}

fn scan_frame(sequence: &[u8], offset: usize) -> Vec<String> {
    let mut peptides = vec![];
    let mut current: Option<String> = None;
    let mut position = offset;
    while position + 3 <= sequence.len() {
        let codon = [sequence[position], sequence[position + 1], sequence[position + 2]];
        if is_stop_codon(&codon) {
            if let Some(peptide) = current.take() {
                if peptide.len() >= MIN_ORF_AA {
                    peptides.push(peptide);
                }
            }
        } else if let Some(peptide) = &mut current {
            peptide.push(translate_codon(&codon) as char);
        } else if codon == *b"ATG" {
            current = Some("M".to_string());
        }
        position += 3;
    }
    // An ORF running off the sequence end has no stop codon and is dropped.
    peptides
}

fn is_stop_codon(codon: &[u8; 3]) -> bool {
    matches!(codon, b"TAA" | b"TAG" | b"TGA")
}

fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence.iter().rev().map(|&base| complement(base)).collect()
}

fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' | b'U' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        _ => b'N',
    }
}

/// Standard codon table (NCBI table 1). Ambiguous codons translate to X.
fn translate_codon(codon: &[u8; 3]) -> u8 {
    match codon {
        b"TTT" | b"TTC" => b'F',
        b"TTA" | b"TTG" | b"CTT" | b"CTC" | b"CTA" | b"CTG" => b'L',
        b"ATT" | b"ATC" | b"ATA" => b'I',
        b"ATG" => b'M',
        b"GTT" | b"GTC" | b"GTA" | b"GTG" => b'V',
        b"TCT" | b"TCC" | b"TCA" | b"TCG" | b"AGT" | b"AGC" => b'S',
        b"CCT" | b"CCC" | b"CCA" | b"CCG" => b'P',
        b"ACT" | b"ACC" | b"ACA" | b"ACG" => b'T',
        b"GCT" | b"GCC" | b"GCA" | b"GCG" => b'A',
        b"TAT" | b"TAC" => b'Y',
        b"CAT" | b"CAC" => b'H',
        b"CAA" | b"CAG" => b'Q',
        b"AAT" | b"AAC" => b'N',
        b"AAA" | b"AAG" => b'K',
        b"GAT" | b"GAC" => b'D',
        b"GAA" | b"GAG" => b'E',
        b"TGT" | b"TGC" => b'C',
        b"TGG" => b'W',
        b"CGT" | b"CGC" | b"CGA" | b"CGG" | b"AGA" | b"AGG" => b'R',
        b"GGT" | b"GGC" | b"GGA" | b"GGG" => b'G',
        _ => b'X',
    }
}
