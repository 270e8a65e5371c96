/// Why a processing request was turned away.
///
/// Both variants are recoverable: the dashboard shows them as a status
/// message and keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    #[error("please enter some text to process")]
    InvalidInput,

    #[error("an operation is already in flight")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModeParseError {
    #[error("unknown processing mode: {0}")]
    Unknown(String),
}
