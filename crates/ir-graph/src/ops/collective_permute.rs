use std::any::Any;

use ir_tensor::{OpBuilder, TargetOp, ValueShape};

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::kind::{self, OpKind};
use crate::node::{Node, Operation, Value};
use crate::shape_inference::{expect_operands, infer_output_shapes};

/// Sends the data operand from each source replica to its paired target
/// replica.
///
/// Operands are `(data, token)`. Output 0 is the received data, output 1 a
/// new token ordering later collectives after this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectivePermute {
    source_target_pairs: Vec<(usize, usize)>,
}

impl CollectivePermute {
    pub fn new(source_target_pairs: Vec<(usize, usize)>) -> Self {
        CollectivePermute {
            source_target_pairs,
        }
    }

    pub fn source_target_pairs(&self) -> &[(usize, usize)] {
        &self.source_target_pairs
    }
}

impl Operation for CollectivePermute {
    fn kind(&self) -> OpKind {
        kind::COLLECTIVE_PERMUTE
    }

    fn num_outputs(&self) -> usize {
        2
    }

    fn infer_shapes(&self, operands: &[ValueShape]) -> Result<Vec<ValueShape>> {
        expect_operands(self.kind(), operands, 2)?;
        infer_output_shapes(self.kind(), operands, |builder, params| self.lower(params, builder))
    }

    fn lower(&self, operands: &[TargetOp], builder: &mut dyn OpBuilder) -> Result<Vec<TargetOp>> {
        let permuted =
            builder.collective_permute(operands[0], operands[1], &self.source_target_pairs)?;
        Ok(vec![permuted.result, permuted.token])
    }

    fn fingerprint_params(&self) -> Fingerprint {
        Fingerprint::of(&self.source_target_pairs)
    }

    fn describe_params(&self) -> String {
        let pairs: Vec<String> = self
            .source_target_pairs
            .iter()
            .map(|(source, target)| format!("({}, {})", source, target))
            .collect();
        format!(", pairs=({})", pairs.join(", "))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Outputs of [`collective_permute`].
#[derive(Debug, Clone)]
pub struct CollectivePermuteOutputs {
    pub data: Value,
    pub token: Value,
}

pub fn collective_permute(
    input: &Value,
    token: &Value,
    source_target_pairs: Vec<(usize, usize)>,
) -> Result<CollectivePermuteOutputs> {
    let node = Node::new(
        CollectivePermute::new(source_target_pairs),
        vec![input.clone(), token.clone()],
    )?;
    Ok(CollectivePermuteOutputs {
        data: node.output(0),
        token: node.output(1),
    })
}
