pub mod about;
pub mod accumulate;
pub mod constraints_file;
pub mod datafiles;
pub mod diamond;
pub mod error;
pub mod orf;
pub mod pathways;
pub mod pipeline;
pub mod progress;
pub mod prune;
pub mod resolver;
pub mod scoring;
pub mod taxonomy;
pub mod universe;
pub mod universe_sbml;
