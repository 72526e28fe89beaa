//! Backtest errors and their user/internal classification.

use thiserror::Error;

use foldcast_core::{ConfigError, FactoryError, LeakageError, SplitError};

/// Errors that abort a whole backtest run.
///
/// Per-fold model failures are not errors at this level: they are recorded
/// on the `FoldResult` and the run continues.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("invalid split config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    InsufficientData(#[from] SplitError),
    #[error("invalid model setup: {0}")]
    Model(#[from] FactoryError),
    #[error("leakage invariant violated: {0}")]
    Leakage(#[from] LeakageError),
    #[error("backtest cancelled")]
    Cancelled,
}

/// Who has to act on an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fixable by changing the request or the data.
    UserInput,
    /// A defect in fold construction. Never shown in detail to end users.
    Internal,
    Cancelled,
}

impl BacktestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::InsufficientData(_) | Self::Model(_) => ErrorClass::UserInput,
            Self::Leakage(_) => ErrorClass::Internal,
            Self::Cancelled => ErrorClass::Cancelled,
        }
    }

    pub fn is_user_error(&self) -> bool {
        self.class() == ErrorClass::UserInput
    }

    /// Message safe to surface to the requester.
    pub fn user_message(&self) -> String {
        match self.class() {
            ErrorClass::Internal => "backtest internal error".to_string(),
            ErrorClass::UserInput | ErrorClass::Cancelled => self.to_string(),
        }
    }
}
