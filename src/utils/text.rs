//! Free-text normalization for message content.

/// Normalize message text: strip the common indentation, drop trailing
/// whitespace on each line, collapse runs of blank lines into one, and trim
/// the result.
///
/// ```rust
/// use ai_fncall::utils::text::normalize;
///
/// let text = "
///     You are a helpful assistant.
///
///
///     Answer briefly.
/// ";
/// assert_eq!(normalize(text), "You are a helpful assistant.\n\nAnswer briefly.");
/// ```
pub fn normalize(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(|l| l.trim_end()).collect();

    let indent = lines
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| leading_whitespace(l))
        .min()
        .unwrap_or(0);

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    for line in &lines {
        if line.is_empty() {
            // Collapse blank runs and drop leading blanks
            if out.last().map_or(true, |prev| prev.is_empty()) {
                continue;
            }
            out.push("");
        } else {
            out.push(strip_chars(line, indent));
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }

    out.join("\n")
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn strip_chars(line: &str, n: usize) -> &str {
    match line.char_indices().nth(n) {
        Some((idx, _)) => &line[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedent_keeps_relative_indentation() {
        let text = "    steps:\n      - one\n      - two\n";
        assert_eq!(normalize(text), "steps:\n  - one\n  - two");
    }

    #[test]
    fn test_collapses_blank_runs() {
        assert_eq!(normalize("a\n\n\n\nb\n \n\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn test_trims_edges() {
        assert_eq!(normalize("\n\n   hello world   \n\n"), "hello world");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n  \n"), "");
    }

    #[test]
    fn test_multibyte_indentation() {
        assert_eq!(normalize("\u{3000}é\n\u{3000}ü"), "é\nü");
    }
}
