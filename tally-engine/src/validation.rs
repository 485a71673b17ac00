//! Input checks run before any store call.
use uuid::Uuid;

use crate::EngineError;

pub(crate) const MAX_QUESTION_LEN: usize = 500;
pub(crate) const MAX_OPTION_LEN: usize = 300;
/// Fewest choices a poll may be left with.
pub(crate) const MIN_OPTIONS: usize = 2;

pub(crate) fn ensure_id(id: Uuid, field: &str) -> Result<(), EngineError> {
    if id.is_nil() {
        return Err(EngineError::invalid_input(format!("{field} must not be nil")));
    }
    Ok(())
}

fn ensure_text(text: &str, field: &str, max: usize) -> Result<(), EngineError> {
    let len = text.trim().chars().count();
    if len == 0 {
        return Err(EngineError::invalid_input(format!("{field} must not be empty")));
    }
    if text.chars().count() > max {
        return Err(EngineError::invalid_input(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_question(question: &str) -> Result<(), EngineError> {
    ensure_text(question, "question", MAX_QUESTION_LEN)
}

pub(crate) fn ensure_option_text(text: &str) -> Result<(), EngineError> {
    ensure_text(text, "option text", MAX_OPTION_LEN)
}
