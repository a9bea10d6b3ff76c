//! Shell argument escaping for `shell:` command lines.
//!
//! This is a convenience for building command lines from argument vectors,
//! not a security boundary; the device-side shell still sees one string.

/// Characters that may appear unquoted in a shell word.
fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | ',' | ':' | '@' | '%' | '/' | '=' | '-')
}

/// Escape one argument for the device shell.
///
/// Safe strings pass through untouched; everything else is wrapped in
/// single quotes with embedded quotes spliced out as `'"'"'`. An empty
/// argument becomes `''`.
pub fn escape(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    if arg.chars().all(is_safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "'\"'\"'"))
}

/// Escape each argument and join with single spaces.
pub fn join<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
