//! Transcript sanitization
//!
//! Light cleanup between the backend and delivery: trims whitespace and
//! drops the lone "you" token, a well-known whisper hallucination on
//! near-silent audio that would otherwise get typed into the focused app.

/// Clean raw transcript text; an empty return means "treat as no speech".
pub fn sanitize(text: &str) -> String {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return String::new();
    }

    let token = cleaned
        .to_lowercase()
        .trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '"' | '\'' | '`' | '(' | ')' | '[' | ']' | '{' | '}')
        })
        .to_string();

    if token == "you" {
        return String::new();
    }

    cleaned.to_string()
}
