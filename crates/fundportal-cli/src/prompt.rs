use std::io::{self, Write};

use anyhow::Result;

/// Prompt for a line of input, returning it trimmed
pub fn line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Prompt with a default shown in brackets; empty input keeps the default
pub fn line_with_default(label: &str, default: &str) -> Result<String> {
    let input = line(&format!("{} [{}]", label, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

pub fn password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(format!("{}: ", label))?;
    Ok(password)
}
