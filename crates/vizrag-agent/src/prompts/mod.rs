//! Instruction prompt loading
//!
//! Prompt files are markdown documents with Usage and Prompt sections. The
//! default instruction is embedded at compile time using `include_str!`.

use std::fs;
use std::path::Path;

use vizrag_core::{Error, Result};

const DATA_VISUALIZATION_MD: &str = include_str!("../../../../prompts/data_visualization.md");

/// The data visualization expert instruction sent with every query.
pub fn default_instruction() -> String {
    extract_prompt_section(DATA_VISUALIZATION_MD).unwrap_or_else(|_| DATA_VISUALIZATION_MD.trim().to_owned())
}

/// Read an instruction from a file.
///
/// Markdown files with a `## Prompt` section contribute only that section;
/// any other file is used whole.
///
/// # Errors
/// Returns [`Error::Config`] if the file cannot be read or is blank.
pub fn load_instruction_file(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)
        .map_err(|err| Error::Config(format!("Cannot read instruction file {}: {err}", path.display())))?;
    let instruction = extract_prompt_section(&content).unwrap_or_else(|_| content.trim().to_owned());
    if instruction.is_empty() {
        return Err(Error::Config(format!("Instruction file {} is empty", path.display())));
    }
    Ok(instruction)
}

/// Extracts the Prompt section from a markdown file
///
/// # Errors
/// Returns an error if the Prompt section cannot be found
fn extract_prompt_section(content: &str) -> core::result::Result<String, String> {
    let prompt_start = content
        .find("## Prompt")
        .ok_or_else(|| "Prompt section not found".to_owned())?;

    let prompt_content_start = content[prompt_start..]
        .find('\n')
        .ok_or_else(|| "Invalid prompt format".to_owned())?
        + prompt_start
        + 1;

    // ## Prompt is the last section of every prompt file
    Ok(content[prompt_content_start..].trim().to_owned())
}
