//! POSIX path helpers
//!
//! All paths inside the core are POSIX strings with `/` separators; host OS
//! separators are converted away at the boundaries (entry reader, archive).
//! These helpers mirror the usual lexical path rules: `clean` collapses
//! duplicate separators and resolves `.`/`..`, `join` concatenates then
//! cleans, `dir` returns everything before the final separator.

/// Lexically normalize a POSIX path.
///
/// - Collapses repeated `/`
/// - Removes `.` segments
/// - Resolves `..` against preceding segments; rooted paths drop `..` that
///   would escape the root, relative paths keep it
/// - The cleaned path of an empty input is `.`
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join path segments with `/`, ignoring empty ones, and clean the result.
///
/// Returns an empty string when every segment is empty.
pub fn join(parts: &[&str]) -> String {
    let non_empty: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    if non_empty.is_empty() {
        return String::new();
    }
    clean(&non_empty.join("/"))
}

/// The directory portion of a path: everything before the final `/`, cleaned.
///
/// A path without any separator has directory `.`. Note that a trailing
/// separator makes the last element empty, so `dir("a/b/")` is `a/b`.
pub fn dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => clean(&path[..=idx]),
        None => ".".to_string(),
    }
}

/// Whether a specifier begins with a Windows drive letter (`C:...`).
pub fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
