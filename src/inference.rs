//! Sample-driven type inference.
//!
//! Feed decoded JSON samples in, get one Type Node tree out:
//! - every sample is walked by a [`Detector`] (array elements are unified on
//!   the way down),
//! - each sample's tree is folded into the running root by the [`Unifier`],
//!   in sample order,
//! - structural conflicts either abort or become [`Diagnostic`]s, per
//!   [`ConflictPolicy`].
pub mod detect;
pub mod unify;

use rayon::prelude::*;
use serde_json::Value;

pub use detect::Detector;
pub use unify::{ConflictPolicy, Unifier};

use crate::error::{Diagnostic, InferError};
use crate::ir::{TypeNode, TypePath};

// ------------------------------- Options ---------------------------------- //

#[derive(Debug, Clone, Copy)]
pub struct InferOptions {
    pub conflict_policy: ConflictPolicy,
    /// Detect samples on the rayon pool in [`Inference::observe_all`].
    pub parallel: bool,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            parallel: true,
        }
    }
}

// ------------------------------- Front API -------------------------------- //

pub struct Inference {
    root_name: String,
    options: InferOptions,
    detector: Detector,
    root: Option<TypeNode>,
    /// First fatal error; once set, the session only reports it.
    failed: Option<InferError>,
}

/// Result of a finished session.
#[derive(Debug, Clone)]
pub struct Solved {
    pub root: TypeNode,
    pub diagnostics: Vec<Diagnostic>,
}

impl Inference {
    pub fn new(root_name: impl Into<String>, options: InferOptions) -> Self {
        Self {
            root_name: root_name.into(),
            options,
            detector: Detector::new(options.conflict_policy),
            root: None,
            failed: None,
        }
    }

    pub fn observe_value(&mut self, value: &Value) -> Result<(), InferError> {
        self.check()?;
        let detected = self.detector.detect(value, &self.root_name, &TypePath::root());
        let result = detected.and_then(|node| self.merge(node));
        self.settle(result)
    }

    /// Observe a batch. Detection of independent samples may run in
    /// parallel; merging always happens here, in input order.
    pub fn observe_all(&mut self, values: &[Value]) -> Result<(), InferError> {
        self.check()?;
        if !self.options.parallel || values.len() < 2 {
            for value in values {
                self.observe_value(value)?;
            }
            return Ok(());
        }

        let policy = self.options.conflict_policy;
        let root_name = self.root_name.as_str();
        let detected: Vec<Result<(TypeNode, Vec<Diagnostic>), InferError>> = values
            .par_iter()
            .map(|value| {
                let mut detector = Detector::new(policy);
                let node = detector.detect(value, root_name, &TypePath::root())?;
                Ok((node, detector.into_diagnostics()))
            })
            .collect();

        for result in detected {
            let (node, diagnostics) = self.settle(result)?;
            self.detector.unifier_mut().absorb(diagnostics);
            let merged = self.merge(node);
            self.settle(merged)?;
        }
        Ok(())
    }

    fn check(&self) -> Result<(), InferError> {
        match &self.failed {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Remember the first fatal error so [`Inference::solve`] cannot hand
    /// out a tree built from a partial merge.
    fn settle<T>(&mut self, result: Result<T, InferError>) -> Result<T, InferError> {
        if let Err(error) = &result {
            tracing::debug!(%error, "session failed");
            self.failed.get_or_insert_with(|| error.clone());
        }
        result
    }

    fn merge(&mut self, node: TypeNode) -> Result<(), InferError> {
        match self.root.as_mut() {
            None => {
                tracing::debug!(kind = %node.kind(), "first sample sets the root");
                self.root = Some(node);
            }
            Some(root) => {
                tracing::debug!(kind = %node.kind(), "merging sample into root");
                self.detector.unifier_mut().unify(root, node)?;
            }
        }
        Ok(())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.detector.diagnostics()
    }

    pub fn solve(self) -> Result<Solved, InferError> {
        if let Some(error) = self.failed {
            return Err(error);
        }
        let root = self.root.ok_or(InferError::NoSamples)?;
        Ok(Solved {
            root,
            diagnostics: self.detector.into_diagnostics(),
        })
    }
}

/// Detect one sample with the default conflict policy.
pub fn detect_type(value: &Value, name: &str, parent: &TypePath) -> Result<TypeNode, InferError> {
    Detector::new(ConflictPolicy::default()).detect(value, name, parent)
}

pub fn infer_from_values<'a, I>(
    values: I,
    root_name: &str,
    options: InferOptions,
) -> Result<Solved, InferError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut inference = Inference::new(root_name, options);
    for value in values {
        inference.observe_value(value)?;
    }
    inference.solve()
}

// ------------------------------- Tests ------------------------------------ //
