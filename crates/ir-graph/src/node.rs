use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ir_tensor::{OpBuilder, TargetOp, ValueShape};

use crate::error::{IrError, Result};
use crate::fingerprint::Fingerprint;
use crate::kind::OpKind;

/// Behaviour every operation kind provides.
///
/// Implementations hold only immutable static parameters. A [`Node`] pairs
/// one with its operands; the same operation may back many nodes.
pub trait Operation: Send + Sync + fmt::Debug + 'static {
    /// The kind tag of this operation.
    fn kind(&self) -> OpKind;

    /// Number of values the operation produces.
    fn num_outputs(&self) -> usize {
        1
    }

    /// Output value types for the given operand types.
    ///
    /// Must be a pure function of `operands` and the parameters, and must
    /// agree with the shapes [`Operation::lower`] produces.
    fn infer_shapes(&self, operands: &[ValueShape]) -> Result<Vec<ValueShape>>;

    /// Emits target operations for this operation, given the already lowered
    /// operands in declared order. Returns one handle per output.
    fn lower(&self, operands: &[TargetOp], builder: &mut dyn OpBuilder) -> Result<Vec<TargetOp>>;

    /// Hash of every static parameter.
    fn fingerprint_params(&self) -> Fingerprint;

    /// Rendering of every parameter that contributes to
    /// [`Operation::fingerprint_params`], as `, name=value` pairs.
    fn describe_params(&self) -> String {
        String::new()
    }

    fn as_any(&self) -> &dyn Any;
}

/// Process-unique node identity. Never part of a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

pub type NodePtr = Arc<Node>;

/// An immutable vertex of the IR graph.
pub struct Node {
    id: NodeId,
    op: Arc<dyn Operation>,
    operands: Vec<Value>,
    shapes: Vec<ValueShape>,
    fingerprint: Fingerprint,
}

impl Node {
    /// Builds a node, inferring its output shapes immediately.
    pub fn new<O: Operation>(op: O, operands: Vec<Value>) -> Result<NodePtr> {
        Self::from_operation(Arc::new(op), operands)
    }

    /// Builds a node around a shared operation.
    pub fn from_operation(op: Arc<dyn Operation>, operands: Vec<Value>) -> Result<NodePtr> {
        let kind = op.kind();
        let operand_shapes: Vec<ValueShape> =
            operands.iter().map(|v| v.shape().clone()).collect();
        let shapes = op.infer_shapes(&operand_shapes)?;
        if shapes.len() != op.num_outputs() {
            return Err(IrError::shape(
                kind,
                format!(
                    "inferred {} outputs, operation declares {}",
                    shapes.len(),
                    op.num_outputs()
                ),
            ));
        }

        let fingerprint = operands.iter().fold(
            Fingerprint::of(kind.as_str()).combine(op.fingerprint_params()),
            |acc, operand| acc.combine(operand.fingerprint()),
        );
        let id = NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed));
        log::trace!("created {} {} fingerprint={}", id, kind, fingerprint);

        Ok(Arc::new(Node {
            id,
            op,
            operands,
            shapes,
            fingerprint,
        }))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> OpKind {
        self.op.kind()
    }

    pub fn operation(&self) -> &dyn Operation {
        self.op.as_ref()
    }

    /// The operation as its concrete type, if it is a `T`.
    pub fn downcast<T: Operation>(&self) -> Option<&T> {
        self.op.as_any().downcast_ref::<T>()
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    /// Returns operand `i`.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    pub fn operand(&self, i: usize) -> &Value {
        &self.operands[i]
    }

    pub fn shapes(&self) -> &[ValueShape] {
        &self.shapes
    }

    /// Returns the type of output `i`.
    ///
    /// # Panics
    /// Panics if `i >= num_outputs()`.
    pub fn shape(&self, i: usize) -> &ValueShape {
        &self.shapes[i]
    }

    pub fn num_outputs(&self) -> usize {
        self.shapes.len()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// A node of the same operation rebound to `operands`. Shapes and
    /// fingerprint are recomputed for the new operands.
    pub fn clone_with_operands(&self, operands: Vec<Value>) -> Result<NodePtr> {
        Node::from_operation(Arc::clone(&self.op), operands)
    }

    /// Reference to output `index`.
    ///
    /// # Panics
    /// Panics if `index >= num_outputs()`.
    pub fn output(self: &Arc<Self>, index: usize) -> Value {
        Value::new(Arc::clone(self), index)
    }

    /// References to every output, in order.
    pub fn outputs(self: &Arc<Self>) -> Vec<Value> {
        (0..self.num_outputs()).map(|i| self.output(i)).collect()
    }
}

impl Drop for Node {
    // Operand chains can be arbitrarily long; release them with a worklist so
    // dropping the last reference to a deep graph does not recurse.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.operands);
        while let Some(value) = pending.pop() {
            if let Some(mut node) = Arc::into_inner(value.node) {
                pending.append(&mut node.operands);
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = ", self.id)?;
        if let [shape] = self.shapes.as_slice() {
            write!(f, "{}", shape)?;
        } else {
            write!(f, "(")?;
            for (i, shape) in self.shapes.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", shape)?;
            }
            write!(f, ")")?;
        }
        write!(f, " {}(", self.kind())?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", operand)?;
        }
        write!(f, "){}", self.op.describe_params())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("operands", &self.operands)
            .field("shapes", &self.shapes)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// A reference to one output of a node.
#[derive(Clone)]
pub struct Value {
    node: NodePtr,
    index: usize,
}

impl Value {
    /// # Panics
    /// Panics if `index >= node.num_outputs()`.
    pub fn new(node: NodePtr, index: usize) -> Self {
        assert!(
            index < node.num_outputs(),
            "output {} out of range for {} with {} outputs",
            index,
            node.id(),
            node.num_outputs()
        );
        Value { node, index }
    }

    pub fn node(&self) -> &NodePtr {
        &self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn shape(&self) -> &ValueShape {
        self.node.shape(self.index)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.node
            .fingerprint()
            .combine(Fingerprint::of(&self.index))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node) && self.index == other.index
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.id().hash(state);
        self.index.hash(state);
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.node.num_outputs() == 1 {
            write!(f, "{}", self.node.id())
        } else {
            write!(f, "{}.{}", self.node.id(), self.index)
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({}: {})", self, self.shape())
    }
}
