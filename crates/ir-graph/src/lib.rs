//! `ir-graph` - Deferred tensor computations as an immutable graph of IR
//! nodes, lowered on demand into target operations.
//!
//! This crate provides:
//! - `Node` / `Value`: immutable vertices and references to their outputs,
//!   with shapes inferred at construction and structural fingerprints
//! - The `Operation` trait and the built-in operations (`as_strided`,
//!   `cumsum`, `cumprod`, `max_in_dim`, `collective_permute`, parameters and
//!   tokens)
//! - `LoweringContext`: at-most-once, operands-first lowering into any
//!   `ir_tensor::OpBuilder`
//! - `NodeCache`: fingerprint-keyed reuse of structurally identical nodes

pub mod cache;
pub mod config;
pub mod dump;
pub mod error;
pub mod fingerprint;
pub mod kind;
pub mod lowering;
pub mod node;
pub mod ops;
pub mod shape_inference;
pub mod traversal;

pub use cache::NodeCache;
pub use config::LoweringConfig;
pub use dump::dump_graph;
pub use error::{IrError, Result};
pub use fingerprint::Fingerprint;
pub use kind::OpKind;
pub use lowering::{LoweredComputation, LoweringContext};
pub use node::{Node, NodeId, NodePtr, Operation, Value};
