use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrError {
    #[error("shape error in {kind}: {message}")]
    Shape { kind: String, message: String },
    #[error("unsupported configuration for {kind}: {message}")]
    UnsupportedConfiguration { kind: String, message: String },
    #[error("lowering failed at {node}: {source}")]
    Lowering {
        node: String,
        #[source]
        source: Box<IrError>,
    },
    #[error("{node} output {output}: inferred {inferred}, lowered {lowered}")]
    ShapeDisagreement {
        node: String,
        output: usize,
        inferred: String,
        lowered: String,
    },
    #[error("lowering session aborted by an earlier failure")]
    SessionAborted,
    #[error("invalid value {value:?} for configuration key {key}")]
    InvalidConfig { key: String, value: String },
    #[error("tensor error: {0}")]
    Tensor(#[from] ir_tensor::TensorError),
}

impl IrError {
    pub fn shape(kind: impl ToString, message: impl Into<String>) -> Self {
        IrError::Shape {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn unsupported(kind: impl ToString, message: impl Into<String>) -> Self {
        IrError::UnsupportedConfiguration {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn is_shape_error(&self) -> bool {
        matches!(self, IrError::Shape { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, IrError::UnsupportedConfiguration { .. })
    }

    /// True for failures raised while lowering a session, including an
    /// aborted session.
    pub fn is_lowering_error(&self) -> bool {
        matches!(
            self,
            IrError::Lowering { .. } | IrError::ShapeDisagreement { .. } | IrError::SessionAborted
        )
    }
}

pub type Result<T> = std::result::Result<T, IrError>;
