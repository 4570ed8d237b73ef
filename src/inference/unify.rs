use std::collections::btree_map::Entry;

use crate::error::{Diagnostic, InferError, SourcePath};
use crate::ir::{Kind, Shape, TypeNode};

/// What to do when two samples disagree on the kind at one position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ConflictPolicy {
    /// Fail the whole operation.
    Abort,
    /// Keep the first-seen kind and record a diagnostic.
    #[default]
    Skip,
}

/// Merges nodes that occupy the same logical position.
///
/// Merging is left-biased and in place: `dest` survives, `src` is consumed.
#[derive(Debug, Default)]
pub struct Unifier {
    policy: ConflictPolicy,
    diagnostics: Vec<Diagnostic>,
}

impl Unifier {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy, diagnostics: Vec::new() }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub(crate) fn record(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(%diagnostic, "recorded diagnostic");
        self.diagnostics.push(diagnostic);
    }

    /// Append diagnostics collected by another unifier, e.g. one that ran
    /// detection on a worker thread.
    pub(crate) fn absorb(&mut self, diagnostics: Vec<Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Merge `src` into `dest`. A conflict under [`ConflictPolicy::Abort`]
    /// leaves `dest` exactly as it was.
    pub fn unify(&mut self, dest: &mut TypeNode, src: TypeNode) -> Result<(), InferError> {
        if self.policy == ConflictPolicy::Skip {
            return self.unify_at(&SourcePath::root(), dest, src);
        }
        let mut staged = dest.clone();
        self.unify_at(&SourcePath::root(), &mut staged, src)?;
        *dest = staged;
        Ok(())
    }

    /// Same as [`Unifier::unify`], reporting conflicts relative to `path`.
    /// Mutates `dest` as it goes, so an aborted call may leave it half merged.
    pub fn unify_at(
        &mut self,
        path: &SourcePath,
        dest: &mut TypeNode,
        src: TypeNode,
    ) -> Result<(), InferError> {
        let (dest_kind, src_kind) = (dest.kind(), src.kind());
        if dest_kind != src_kind {
            if dest_kind.is_numeric() && src_kind.is_numeric() {
                // widening only: an integer sample never narrows a float
                if src_kind == Kind::Float {
                    dest.shape = Shape::Float;
                }
                return Ok(());
            }
            return self.conflict(path, dest_kind, src_kind);
        }

        match (&mut dest.shape, src.shape) {
            (Shape::Map { fields }, Shape::Map { fields: incoming }) => {
                for (name, field) in incoming {
                    match fields.entry(name) {
                        Entry::Vacant(slot) => {
                            slot.insert(field);
                        }
                        Entry::Occupied(mut slot) => {
                            let field_path = path.key(&slot.get().original_key);
                            self.unify_at(&field_path, slot.get_mut(), field)?;
                        }
                    }
                }
            }
            (Shape::Array { element }, Shape::Array { element: incoming }) => {
                // an `Any` element means the array was empty or all-null
                if element.kind() == Kind::Any {
                    *element = incoming;
                } else if incoming.kind() != Kind::Any {
                    self.unify_at(&path.element(), element, *incoming)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn conflict(&mut self, path: &SourcePath, kept: Kind, discarded: Kind) -> Result<(), InferError> {
        match self.policy {
            ConflictPolicy::Abort => Err(InferError::Conflict {
                path: path.clone(),
                expected: kept,
                found: discarded,
            }),
            ConflictPolicy::Skip => {
                self.record(Diagnostic::Conflict { path: path.clone(), kept, discarded });
                Ok(())
            }
        }
    }
}
