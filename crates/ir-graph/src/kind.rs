use std::fmt;

/// Tag naming the semantic operation of a node, as `namespace::name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpKind(&'static str);

impl OpKind {
    pub const fn new(name: &'static str) -> Self {
        OpKind(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub const PARAMETER: OpKind = OpKind::new("ir::parameter");
pub const CREATE_TOKEN: OpKind = OpKind::new("ir::create_token");
pub const AS_STRIDED: OpKind = OpKind::new("aten::as_strided");
pub const CUMSUM: OpKind = OpKind::new("aten::cumsum");
pub const CUMPROD: OpKind = OpKind::new("aten::cumprod");
pub const MAX_IN_DIM: OpKind = OpKind::new("aten::max");
pub const COLLECTIVE_PERMUTE: OpKind = OpKind::new("xla::collective_permute");
