//! Infer Go struct declarations from JSON samples.
//!
//! ```
//! use json2go::{codegen, inference, ir::TypePath};
//! use serde_json::json;
//!
//! let node = inference::detect_type(&json!({"user_id": 5}), "Root", &TypePath::root()).unwrap();
//! assert_eq!(
//!     codegen::render(&node, false),
//!     "type Root struct {\n    Userid int `json:\"user_id\"`\n}\n",
//! );
//! ```

pub mod cli;
pub mod codegen;
pub mod error;
pub mod inference;
pub mod ir;
pub mod jq_exec;

pub use codegen::{Codegen, EmitOptions, render};
pub use error::{Diagnostic, InferError, SourcePath};
pub use inference::{ConflictPolicy, InferOptions, Inference, Solved, detect_type};
pub use ir::{Kind, TypeIdentity, TypeNode, TypePath};
