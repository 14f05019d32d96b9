//! Lightweight lint for ".env"-style content
//!
//! Warnings are advisory: a malformed draft is still saved and synced, the
//! operator just gets told about it.

/// Check each non-blank, non-comment line for `KEY=value` shape.
pub fn lint(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some(eq_index) = trimmed.find('=') else {
            warnings.push(format!("Line {}: missing '='", index + 1));
            continue;
        };
        let key = trimmed[..eq_index].trim();
        if !is_valid_key(key) {
            warnings.push(format!("Line {}: invalid key {key:?}", index + 1));
        }
    }
    warnings
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}
