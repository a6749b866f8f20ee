use crate::types::Result;
use dialoguer::Input;

/// Ask for the question on the terminal, pre-filled with `default`.
pub fn ask_question(default: &str) -> Result<String> {
    let question: String = Input::new()
        .with_prompt("Question")
        .default(default.to_string())
        .show_default(true)
        .interact_text()?;
    Ok(question.trim().to_string())
}
