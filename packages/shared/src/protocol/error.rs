//! Frame decoding errors.

use thiserror::Error;

/// Errors produced while decoding or validating a wire frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer than four `|`-separated fields
    #[error("frame has {found} field(s), expected 4")]
    MissingFields { found: usize },

    /// The type field is empty
    #[error("frame type is empty")]
    EmptyType,

    /// The room field is empty
    #[error("frame room id is empty")]
    EmptyRoom,

    /// A header field contains the delimiter and would not survive encoding
    #[error("frame field '{field}' contains the '|' delimiter")]
    DelimiterInHeader { field: &'static str },
}
