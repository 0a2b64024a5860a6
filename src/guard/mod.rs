//! Gates in front of instance deletion.
//!
//! Termination protection is checked first and refuses without prompting;
//! only an unprotected instance reaches the confirmation prompt.

use thiserror::Error;

/// Question asked before deleting the instance.
pub const DELETE_PROMPT: &str = "Are you sure you want to delete your instance?";

/// Errors raised by the deletion gates.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum GuardError {
    /// API termination protection is enabled on the instance.
    #[error(
        "termination protection is enabled; run disable-termination-protection before deleting"
    )]
    TerminationProtected,
    /// The operator declined the confirmation prompt.
    #[error("aborted: instance was not deleted")]
    Aborted,
    /// The prompt could not be shown or read.
    #[error("failed to read confirmation: {message}")]
    Prompt {
        /// Terminal error text.
        message: String,
    },
}

/// Asks the operator a yes/no question.
pub trait Confirmer {
    /// Returns the operator's answer; defaults to no.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Prompt`] when the terminal interaction fails.
    fn confirm(&self, prompt: &str) -> Result<bool, GuardError>;
}

/// Confirmer backed by an interactive terminal prompt.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool, GuardError> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|err| GuardError::Prompt {
                message: err.to_string(),
            })
    }
}

/// Applies both deletion gates in order.
///
/// # Errors
///
/// Returns [`GuardError::TerminationProtected`] when `protected` is set,
/// without consulting `confirmer`, and [`GuardError::Aborted`] when the
/// operator declines.
pub fn authorize_delete(protected: bool, confirmer: &dyn Confirmer) -> Result<(), GuardError> {
    if protected {
        return Err(GuardError::TerminationProtected);
    }
    if confirmer.confirm(DELETE_PROMPT)? {
        Ok(())
    } else {
        Err(GuardError::Aborted)
    }
}

#[cfg(test)]
mod tests;
