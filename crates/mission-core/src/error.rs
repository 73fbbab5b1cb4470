#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("malformed .plan document: {0}")]
    ParseError(String),
    #[error("missing required field '{0}' in .plan document")]
    MissingField(&'static str),
}
