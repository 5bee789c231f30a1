/// Convenience result type used across Filigrane.
pub type FiligraneResult<T> = Result<T, FiligraneError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum FiligraneError {
    /// Invalid user-provided settings or inputs.
    #[error("validation error: {0}")]
    Validation(String),

    /// A base or watermark image could not be loaded.
    #[error("decode error ({name}): {message}")]
    Decode {
        /// Name of the input that failed to decode.
        name: String,
        /// Decoder message.
        message: String,
    },

    /// A drawing surface could not be created or acquired.
    #[error("surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// Archive creation or delivery failed.
    #[error("packaging error: {0}")]
    Packaging(String),

    /// A text watermark asked for a font family that was never registered.
    #[error("font not registered: {0}")]
    FontNotRegistered(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FiligraneError {
    /// Build a [`FiligraneError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FiligraneError::Decode`] value.
    pub fn decode(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Build a [`FiligraneError::SurfaceUnavailable`] value.
    pub fn surface(msg: impl Into<String>) -> Self {
        Self::SurfaceUnavailable(msg.into())
    }

    /// Build a [`FiligraneError::Packaging`] value.
    pub fn packaging(msg: impl Into<String>) -> Self {
        Self::Packaging(msg.into())
    }

    /// Build a [`FiligraneError::FontNotRegistered`] value.
    pub fn font_not_registered(family: impl Into<String>) -> Self {
        Self::FontNotRegistered(family.into())
    }

    /// Build a [`FiligraneError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` for errors that make every remaining image in a batch unprocessable.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::SurfaceUnavailable(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
