#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("player name must not be empty")]
    EmptyPlayerName,
    #[error("round for '{0}' is still in progress")]
    RoundInProgress(String),
    #[error("target center unavailable from calibration")]
    TargetCenterUnavailable,
    #[error("invalid engine config: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}
