//! Error types for address, network and range operations.

use thiserror::Error;

/// Failure kinds surfaced by parsing and arithmetic.
///
/// Every fallible operation in this crate reports one of these variants
/// synchronously; there are no partial results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IpError {
    /// Textual input that matches no accepted notation.
    #[error("invalid IP address format: {0}")]
    InvalidFormat(String),

    /// A numeric literal too wide for any IP version.
    #[error("wrong IP version: {0}")]
    InvalidVersion(String),

    /// Prefix length outside `[0, max]`, or not strictly longer on a split.
    #[error("invalid prefix length: {0}")]
    InvalidPrefixLength(String),

    /// Out-of-range value or violated ordering precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Both operands of a bitwise or range operation must share a version.
    #[error("IP version mismatch between operands")]
    VersionMismatch,

    /// The subnet to exclude is not contained in the source network.
    #[error("exclude subnet not within target network")]
    NotContained,
}
