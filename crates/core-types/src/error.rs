use crate::enums::PositionStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Invalid position transition: {0:?} -> {1:?}")]
    InvalidTransition(PositionStatus, PositionStatus),
}
