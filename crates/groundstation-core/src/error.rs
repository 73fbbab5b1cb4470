#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown uav '{0}'")]
    NotFound(String),
    #[error("no open link for uav '{0}'")]
    LinkUnavailable(String),
    #[error("no mission cached for this uav")]
    MissionEmpty,
    #[error("mission already in progress")]
    MissionInProgress,
    #[error("protocol timeout: {0}")]
    ProtocolTimeout(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("transport error: {0}")]
    TransportError(String),
    #[error("malformed plan: {0}")]
    ParseError(#[from] mission_core::MissionError),
}

impl From<mavlink::error::MessageReadError> for CoreError {
    fn from(err: mavlink::error::MessageReadError) -> Self {
        CoreError::TransportError(err.to_string())
    }
}

impl From<mavlink::error::MessageWriteError> for CoreError {
    fn from(err: mavlink::error::MessageWriteError) -> Self {
        CoreError::TransportError(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::ParseError(mission_core::MissionError::ParseError(err.to_string()))
    }
}
