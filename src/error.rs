use std::io;
use std::path::PathBuf;

/// Every way loading or running a program can fail
///
/// Line numbers are 1-based and refer to the source text as written, so they
/// still point at the right place after comments and blank lines are dropped.
#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("failed to read `{}`", .path.display())]
  FileRead {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("line {line}: initial memory is not a JSON array of integers")]
  MemoryParse {
    line: usize,
    #[source]
    source: serde_json::Error,
  },

  #[error("program is empty, expected a JSON memory image on the first line")]
  MissingMemory,

  #[error("line {line}: no instruction matches `{text}`")]
  UnknownInstruction { line: usize, text: String },

  #[error("line {line}: branch to undeclared label `{label}`")]
  LabelNotFound { label: String, line: usize },

  #[error("label `{label}` declared on line {first} and again on line {second}")]
  DuplicateLabel {
    label: String,
    first: usize,
    second: usize,
  },

  #[error("line {line}: store to address {address} is past the memory limit")]
  AddressOutOfRange { address: usize, line: usize },

  #[error("instruction has no operand at position {index}")]
  MissingField { index: usize },

  #[error("step limit of {limit} reached before the program halted")]
  StepLimit { limit: u64 },

  #[error("failed to write trace")]
  Trace(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
