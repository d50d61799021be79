//! Translation of an IR graph into target operations.
//!
//! A [`LoweringContext`] wraps one builder for the duration of a session.
//! Nodes are lowered on demand, operands first, and each node is lowered at
//! most once per session; later requests reuse the recorded handles.

use log::{debug, trace};
use rustc_hash::FxHashMap;

use ir_tensor::{OpBuilder, TargetOp, TensorError};

use crate::config::LoweringConfig;
use crate::error::{IrError, Result};
use crate::node::{Node, NodeId, NodePtr, Value};
use crate::traversal::post_order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Accumulating,
    Aborted,
}

/// Result of [`LoweringContext::finalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredComputation {
    /// One handle per requested output, in request order.
    pub outputs: Vec<TargetOp>,
    /// Number of nodes lowered during the session.
    pub lowered_nodes: usize,
}

pub struct LoweringContext<'b> {
    builder: &'b mut dyn OpBuilder,
    config: LoweringConfig,
    emitted: FxHashMap<NodeId, Vec<TargetOp>>,
    state: SessionState,
}

fn lowering_error(node: &Node, source: IrError) -> IrError {
    IrError::Lowering {
        node: node.to_string(),
        source: Box::new(source),
    }
}

impl<'b> LoweringContext<'b> {
    pub fn new(builder: &'b mut dyn OpBuilder) -> Self {
        Self::with_config(builder, LoweringConfig::default())
    }

    pub fn with_config(builder: &'b mut dyn OpBuilder, config: LoweringConfig) -> Self {
        debug!("starting lowering session on {} builder", builder.name());
        LoweringContext {
            builder,
            config,
            emitted: FxHashMap::default(),
            state: SessionState::Accumulating,
        }
    }

    pub fn config(&self) -> &LoweringConfig {
        &self.config
    }

    pub fn builder(&self) -> &dyn OpBuilder {
        &*self.builder
    }

    pub fn lowered_node_count(&self) -> usize {
        self.emitted.len()
    }

    pub fn is_emitted(&self, node: &Node) -> bool {
        self.emitted.contains_key(&node.id())
    }

    pub fn is_aborted(&self) -> bool {
        self.state == SessionState::Aborted
    }

    fn lookup(&self, value: &Value) -> Option<TargetOp> {
        self.emitted
            .get(&value.node().id())
            .map(|ops| ops[value.index()])
    }

    /// The target operation for `value`, lowering its node and any operands
    /// not yet lowered in this session.
    ///
    /// A failure aborts the session; every later call returns
    /// [`IrError::SessionAborted`].
    pub fn get_output(&mut self, value: &Value) -> Result<TargetOp> {
        if self.state == SessionState::Aborted {
            return Err(IrError::SessionAborted);
        }
        if let Some(op) = self.lookup(value) {
            return Ok(op);
        }

        let emitted = &self.emitted;
        let pending = post_order(std::slice::from_ref(value.node()), |node| {
            emitted.contains_key(&node.id())
        });
        trace!("lowering {} pending nodes for {}", pending.len(), value);
        for node in &pending {
            if let Err(err) = self.lower_node(node) {
                self.state = SessionState::Aborted;
                debug!("lowering session aborted: {}", err);
                return Err(err);
            }
        }

        self.lookup(value).ok_or_else(|| {
            self.state = SessionState::Aborted;
            lowering_error(
                value.node(),
                TensorError::Other(format!("no handle recorded for {}", value)).into(),
            )
        })
    }

    /// [`LoweringContext::get_output`] for each value, in order.
    pub fn lower_all(&mut self, values: &[Value]) -> Result<Vec<TargetOp>> {
        values.iter().map(|value| self.get_output(value)).collect()
    }

    fn lower_node(&mut self, node: &NodePtr) -> Result<()> {
        let mut operands = Vec::with_capacity(node.operands().len());
        for operand in node.operands() {
            let op = self.lookup(operand).ok_or_else(|| {
                lowering_error(
                    node,
                    TensorError::Other(format!("operand {} was not lowered", operand)).into(),
                )
            })?;
            operands.push(op);
        }

        if self.config.trace_descriptions {
            trace!("lowering {}", node);
        } else {
            trace!("lowering {} {}", node.id(), node.kind());
        }
        let outputs = node
            .operation()
            .lower(&operands, &mut *self.builder)
            .map_err(|err| lowering_error(node, err))?;
        if outputs.len() != node.num_outputs() {
            return Err(lowering_error(
                node,
                TensorError::Other(format!(
                    "lowering returned {} handles for {} outputs",
                    outputs.len(),
                    node.num_outputs()
                ))
                .into(),
            ));
        }

        if self.config.verify_shapes {
            for (i, &op) in outputs.iter().enumerate() {
                let lowered = self
                    .builder
                    .shape_of(op)
                    .map_err(|err| lowering_error(node, err.into()))?;
                if &lowered != node.shape(i) {
                    return Err(IrError::ShapeDisagreement {
                        node: node.to_string(),
                        output: i,
                        inferred: node.shape(i).to_string(),
                        lowered: lowered.to_string(),
                    });
                }
            }
        }

        self.emitted.insert(node.id(), outputs);
        Ok(())
    }

    /// Lowers `outputs` and closes the session.
    pub fn finalize(mut self, outputs: &[Value]) -> Result<LoweredComputation> {
        let handles = self.lower_all(outputs)?;
        debug!(
            "finalized lowering on {} builder: {} nodes, {} instructions",
            self.builder.name(),
            self.emitted.len(),
            self.builder.program().len()
        );
        Ok(LoweredComputation {
            outputs: handles,
            lowered_nodes: self.emitted.len(),
        })
    }
}
