use crate::storage::StorageError;

/// Phase of a single verification run.
///
/// ```text
/// Idle -> ValidatingInput -> SizeMismatchOrMissing -> Failure
///                         -> Hashing -> Comparing -> Success | Failure
///                                    -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyState {
    #[default]
    Idle,
    ValidatingInput,
    SizeMismatchOrMissing,
    Hashing,
    Comparing,
    Success,
    Failure,
    Cancelled,
}

impl VerifyState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VerifyState::Success | VerifyState::Failure | VerifyState::Cancelled
        )
    }
}

/// Result of a verification run that reports through a callback.
#[derive(Debug)]
pub enum VerifyOutcome {
    Success,
    /// Every error that was delivered to the callback, in delivery order.
    Failure(Vec<StorageError>),
    Cancelled,
}

impl VerifyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerifyOutcome::Success)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, VerifyOutcome::Cancelled)
    }

    pub fn errors(&self) -> &[StorageError] {
        match self {
            VerifyOutcome::Failure(errors) => errors,
            VerifyOutcome::Success | VerifyOutcome::Cancelled => &[],
        }
    }

    pub(crate) fn state(&self) -> VerifyState {
        match self {
            VerifyOutcome::Success => VerifyState::Success,
            VerifyOutcome::Failure(_) => VerifyState::Failure,
            VerifyOutcome::Cancelled => VerifyState::Cancelled,
        }
    }
}
