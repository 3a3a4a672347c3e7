// src/requirement/file.rs

//! Requirements file reading
//!
//! Only the line-level syntax is handled here: comments, blank lines and
//! backslash continuations. Directives such as `-r other.txt` are kept as
//! opaque lines and classified later.

use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Split requirements file content into logical lines
pub fn parse_requirements(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();

    for raw in content.lines() {
        let line = strip_comment(raw);

        if let Some(head) = line.strip_suffix('\\') {
            pending.push_str(head);
            pending.push(' ');
            continue;
        }

        pending.push_str(line);
        let joined = pending.split_whitespace().collect::<Vec<_>>().join(" ");
        pending.clear();

        if !joined.is_empty() {
            lines.push(joined);
        }
    }

    let trailing = pending.split_whitespace().collect::<Vec<_>>().join(" ");
    if !trailing.is_empty() {
        lines.push(trailing);
    }

    lines
}

/// A `#` starts a comment at the beginning of a line or after whitespace,
/// so URL fragments like `#egg=foo` survive.
fn strip_comment(line: &str) -> &str {
    let trimmed = line.trim_end();
    if trimmed.trim_start().starts_with('#') {
        return "";
    }
    match trimmed.find(" #").or_else(|| trimmed.find("\t#")) {
        Some(pos) => trimmed[..pos].trim_end(),
        None => trimmed,
    }
}

/// Read and split a requirements file
pub fn read_requirements_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let lines = parse_requirements(&content);
    debug!("Read {} requirement lines from {}", lines.len(), path.display());
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_comments_and_blank_lines() {
        let lines = parse_requirements("# header\n\nattrs>=19  # inline\n   \nrequests\n");
        assert_eq!(lines, vec!["attrs>=19", "requests"]);
    }

    #[test]
    fn test_fragment_is_not_a_comment() {
        let lines = parse_requirements("git+https://example.com/x.git#egg=x\n");
        assert_eq!(lines, vec!["git+https://example.com/x.git#egg=x"]);
    }

    #[test]
    fn test_continuation() {
        let lines = parse_requirements("attrs>=19,\\\n    <22\n-e .\n");
        assert_eq!(lines, vec!["attrs>=19, <22", "-e ."]);
    }

    #[test]
    fn test_trailing_continuation() {
        let lines = parse_requirements("six \\");
        assert_eq!(lines, vec!["six"]);
    }

    #[test]
    fn test_read_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "-r base.txt").unwrap();
        writeln!(file, "click>=7").unwrap();

        let lines = read_requirements_file(file.path()).unwrap();
        assert_eq!(lines, vec!["-r base.txt", "click>=7"]);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_requirements_file(&dir.path().join("nope.txt")).is_err());
    }
}
