//! Turning source text into a runnable [`Program`]
//!
//! ```text
//! [1, 2, 3]          // initial memory, index = address
//! MOV R0, #5
//! loop: SUB R0, R0, #1
//! CMP R0, #0
//! BGT loop
//! HALT
//! ```
//!
//! `//` starts a comment and blank lines are ignored. A label may sit on its
//! own line or in front of an instruction; either way it takes up a slot of
//! its own in the program.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::grammar::Captures;
use crate::isa::{self, InstructionSpec};
use crate::machine::Word;

const COMMENT: &str = "//";

/// One slot of the program: a source line and the instruction it matched
#[derive(Debug, Clone)]
pub struct ParsedLine {
  /// 1-based line number in the source text
  pub line: usize,
  pub text: String,
  pub spec: &'static InstructionSpec,
  pub captures: Captures,
}

/// Label name to program slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
  slots: HashMap<String, (usize, usize)>,
}

impl Labels {
  /// Record that `name` is declared at `slot`, on source line `line`
  pub fn declare(&mut self, name: &str, slot: usize, line: usize) -> Result<()> {
    if let Some(&(_, first)) = self.slots.get(name) {
      return Err(Error::DuplicateLabel {
        label: name.to_owned(),
        first,
        second: line,
      });
    }
    self.slots.insert(name.to_owned(), (slot, line));
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<usize> {
    self.slots.get(name).map(|&(slot, _)| slot)
  }

  pub fn len(&self) -> usize {
    self.slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }
}

/// A fully matched program, ready to run
#[derive(Debug, Clone)]
pub struct Program {
  memory: Vec<Word>,
  lines: Vec<ParsedLine>,
  labels: Labels,
}

impl Program {
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| Error::FileRead {
      path: path.to_owned(),
      source,
    })?;
    Self::parse(&source)
  }

  pub fn parse(source: &str) -> Result<Self> {
    let mut cleaned = source
      .lines()
      .enumerate()
      .map(|(i, text)| (i + 1, strip_comment(text)))
      .filter(|(_, text)| !text.is_empty());

    let (memory_line, memory_text) = cleaned.next().ok_or(Error::MissingMemory)?;
    let memory: Vec<Word> =
      serde_json::from_str(memory_text).map_err(|source| Error::MemoryParse {
        line: memory_line,
        source,
      })?;
    debug!(words = memory.len(), "parsed initial memory");

    let mut lines = Vec::new();
    for (line, text) in cleaned {
      match_line(line, text, &mut lines)?;
    }

    let mut labels = Labels::default();
    for (slot, parsed) in lines.iter().enumerate() {
      if parsed.spec.declares_label() {
        let name = parsed.captures.label(0)?;
        labels.declare(name, slot, parsed.line)?;
        debug!(label = name, slot, "resolved label");
      }
    }
    debug!(slots = lines.len(), labels = labels.len(), "loaded program");

    Ok(Self {
      memory,
      lines,
      labels,
    })
  }

  /// The memory image the program starts with
  pub fn memory(&self) -> &[Word] {
    &self.memory
  }

  pub fn lines(&self) -> &[ParsedLine] {
    &self.lines
  }

  pub fn labels(&self) -> &Labels {
    &self.labels
  }

  pub fn len(&self) -> usize {
    self.lines.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }
}

fn strip_comment(text: &str) -> &str {
  let code = match text.find(COMMENT) {
    Some(at) => &text[..at],
    None => text,
  };
  code.trim()
}

// a line that matches nothing may still be `label: instruction`
fn match_line(line: usize, text: &str, lines: &mut Vec<ParsedLine>) -> Result<()> {
  if let Some((spec, captures)) = isa::lookup(text) {
    lines.push(ParsedLine {
      line,
      text: text.to_owned(),
      spec,
      captures,
    });
    return Ok(());
  }

  let declaration = isa::label_declaration();
  let unknown = || Error::UnknownInstruction {
    line,
    text: text.to_owned(),
  };
  let (captures, rest) = declaration.match_prefix(text).ok_or_else(unknown)?;
  let rest = rest.trim_start();
  let (spec, rest_captures) = isa::lookup(rest).ok_or_else(unknown)?;
  lines.push(ParsedLine {
    line,
    text: text[..text.len() - rest.len()].trim_end().to_owned(),
    spec: declaration,
    captures,
  });
  lines.push(ParsedLine {
    line,
    text: rest.to_owned(),
    spec,
    captures: rest_captures,
  });
  Ok(())
}
