use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame has no `type` field")]
    MissingType,

    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
#[error("failed to encode signaling message: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);
