use thiserror::Error;

/// Error type for design extraction
///
/// Covers the codec boundary and every phase of the extraction
/// pipeline. Use [`ExtractError::is_recoverable`] to decide whether a
/// caller should fall back to the unprocessed composite.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// Input bytes could not be decoded, or the decoded image is empty
    ///
    /// This error is fatal for the request: there is nothing to fall back to.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Composite and base dimensions differ
    ///
    /// The extractor resolves this internally by resampling the composite,
    /// so it only surfaces from operations that cannot resample.
    #[error("Image dimensions mismatch: expected {expected:?}, actual {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height)
        expected: (u32, u32),
        /// Actual dimensions (width, height)
        actual: (u32, u32),
    },

    /// An unexpected fault inside a matting, grid, filter or refine phase
    #[error("Extraction failed during {phase}: {reason}")]
    ExtractionFailure {
        phase: &'static str,
        reason: String,
    },

    /// Invalid parameter provided to the operation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ExtractError {
    /// Returns `true` when the caller should degrade to the opaque composite
    /// instead of failing the request.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }

    pub(crate) fn failure(phase: &'static str, reason: impl Into<String>) -> Self {
        Self::ExtractionFailure {
            phase,
            reason: reason.into(),
        }
    }
}

/// Error type for placing extracted artwork onto a product photo
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeError {
    /// The artwork or target canvas has a zero dimension
    #[error("Cannot composite an empty image ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// Scale or offsets are not usable for the given target
    ///
    /// This error occurs when the scale is not a positive finite number,
    /// an offset is not finite, or the scaled artwork would collapse to
    /// zero pixels.
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),
}

/// Error type for the end-to-end preview pipeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreviewError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Composite(#[from] CompositeError),
}
