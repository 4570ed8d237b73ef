//! Error types for inference.
//!
//! [`InferError`] aborts the whole operation; [`Diagnostic`] is recorded and
//! inference carries on with a best-effort tree.

use std::fmt;

use thiserror::Error;

use crate::ir::Kind;

/// Location inside a sample, spelled with the literal JSON keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePath(Vec<Segment>);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Element,
}

impl SourcePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn key(&self, key: &str) -> Self {
        let mut out = self.clone();
        out.0.push(Segment::Key(key.to_string()));
        out
    }

    pub fn element(&self) -> Self {
        let mut out = self.clone();
        out.0.push(Segment::Element);
        out
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.first() {
            None => return f.write_str("<root>"),
            Some(Segment::Element) => f.write_str("<root>")?,
            Some(Segment::Key(_)) => {}
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => f.write_str(key)?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Element => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferError {
    #[error("type conflict at `{path}`: {expected} vs {found}")]
    Conflict {
        path: SourcePath,
        expected: Kind,
        found: Kind,
    },

    #[error("no samples were observed")]
    NoSamples,
}

/// Non-fatal finding recorded while detecting or unifying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Two samples disagree at `path`; the first-seen kind was kept.
    Conflict {
        path: SourcePath,
        kept: Kind,
        discarded: Kind,
    },
    /// Two keys of one object normalize to the same field name.
    NameCollision {
        path: SourcePath,
        declared: String,
        kept: String,
        dropped: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Conflict { path, kept, discarded } => write!(
                f,
                "`{path}` has different types, skipping merge (kept {kept}, discarded {discarded})"
            ),
            Diagnostic::NameCollision { path, declared, kept, dropped } => write!(
                f,
                "keys `{kept}` and `{dropped}` at `{path}` both map to field `{declared}`, kept `{kept}`"
            ),
        }
    }
}
