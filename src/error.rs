//! Error taxonomy for passes, buffers and effects

pub type VfxResult<T> = Result<T, VfxError>;

#[derive(thiserror::Error, Debug)]
pub enum VfxError {
    /// The program could not be compiled or linked. Not recoverable for the pass.
    #[error("shader compile error in '{program}': {diagnostics}")]
    ShaderCompile { program: String, diagnostics: String },

    #[error("unknown parameter '{key}' for program '{program}'")]
    UnknownParameter { program: String, key: String },

    #[error("shape mismatch for parameter '{key}': declared stride {stride}, got {len} component(s)")]
    ShapeMismatch {
        key: String,
        stride: usize,
        len: usize,
    },

    #[error("parameter '{key}' declared twice for program '{program}'")]
    DuplicateParameter { program: String, key: String },

    #[error("texture unit {unit} assigned to both '{first}' and '{second}'")]
    TextureUnitCollision {
        unit: u32,
        first: String,
        second: String,
    },

    #[error("resource allocation failed: {0}")]
    ResourceAllocation(String),

    #[error("{what} used after dispose")]
    Disposed { what: String },

    #[error("{what} used before its first resize")]
    Uninitialized { what: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl VfxError {
    pub fn disposed(what: impl Into<String>) -> Self {
        Self::Disposed { what: what.into() }
    }

    pub fn uninitialized(what: impl Into<String>) -> Self {
        Self::Uninitialized { what: what.into() }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::ResourceAllocation(msg.into())
    }

    /// Programmer errors: the caller used the API wrong and must fix the call site.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownParameter { .. }
                | Self::ShapeMismatch { .. }
                | Self::DuplicateParameter { .. }
                | Self::TextureUnitCollision { .. }
                | Self::Disposed { .. }
                | Self::Uninitialized { .. }
                | Self::InvalidArgument(_)
        )
    }
}
