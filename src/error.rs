//! Central error handling for the thematic renderer.
//!
//! Provides a unified RenderError enum with consistent categorization
//! across ingestion, classification, geometry and GPU work.

/// Centralized error type for all map operations
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Device error: {0}")]
    Device(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Classification error: {0}")]
    Classify(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Not implemented: {0}")]
    Unimplemented(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Convenience constructors for common error types
    pub fn device<T: ToString>(msg: T) -> Self {
        RenderError::Device(msg.to_string())
    }

    pub fn upload<T: ToString>(msg: T) -> Self {
        RenderError::Upload(msg.to_string())
    }

    pub fn render<T: ToString>(msg: T) -> Self {
        RenderError::Render(msg.to_string())
    }

    pub fn classify<T: ToString>(msg: T) -> Self {
        RenderError::Classify(msg.to_string())
    }

    pub fn geometry<T: ToString>(msg: T) -> Self {
        RenderError::Geometry(msg.to_string())
    }

    /// A variant-specific operation that the requested variant does not supply.
    /// Fatal by contract; callers must not retry.
    pub fn unimplemented(operation: &str) -> Self {
        RenderError::Unimplemented(operation.to_string())
    }
}

/// Result type alias for map operations
pub type RenderResult<T> = Result<T, RenderError>;
