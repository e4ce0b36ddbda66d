//! Source positions.

use std::fmt;

/// A position in the decoded input.
///
/// `index` counts code points from the start of the stream; `line` and
/// `column` are zero-based.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Mark {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl Mark {
    pub fn new(index: usize, line: usize, column: usize) -> Self {
        Self {
            index,
            line,
            column,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line + 1, self.column + 1)
    }
}

/// Render the source line around `mark` with a caret under the position.
///
/// Long lines are cut around the mark and the cut sides are shown as
/// ` ... `. Returns `None` when the mark lies outside `buffer`.
pub fn render_snippet(buffer: &[char], mark: Mark, indent: usize, max_length: usize) -> Option<String> {
    if mark.index > buffer.len() {
        return None;
    }
    let is_break = |c: char| c == '\n' || c == '\r';
    let half = (max_length / 2).saturating_sub(1);

    let mut head = String::new();
    let mut start = mark.index;
    while start > 0 && !is_break(buffer[start - 1]) {
        start -= 1;
        if mark.index - start > half {
            head = " ... ".to_string();
            start = (start + 5).min(mark.index);
            break;
        }
    }

    let mut tail = String::new();
    let mut end = mark.index;
    while end < buffer.len() && !is_break(buffer[end]) {
        end += 1;
        if end - mark.index > half {
            tail = " ... ".to_string();
            end = end.saturating_sub(5).max(mark.index);
            break;
        }
    }

    let line: String = buffer[start..end].iter().collect();
    let pad = " ".repeat(indent);
    let caret_offset = head.chars().count() + (mark.index - start);
    Some(format!(
        "{pad}{head}{line}{tail}\n{pad}{}^",
        " ".repeat(caret_offset)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_snippet_points_at_column() {
        let buf = chars("first\nkey: [1, 2\nlast");
        let snippet = render_snippet(&buf, Mark::new(11, 1, 5), 4, 75).unwrap();
        assert_eq!(snippet, "    key: [1, 2\n         ^");
    }

    #[test]
    fn test_snippet_at_end_of_input() {
        let buf = chars("abc");
        let snippet = render_snippet(&buf, Mark::new(3, 0, 3), 0, 75).unwrap();
        assert_eq!(snippet, "abc\n   ^");
    }

    #[test]
    fn test_snippet_truncates_long_lines() {
        let text = "x".repeat(200);
        let buf = chars(&text);
        let snippet = render_snippet(&buf, Mark::new(100, 0, 100), 0, 40).unwrap();
        let first = snippet.lines().next().unwrap();
        assert!(first.starts_with(" ... "));
        assert!(first.ends_with(" ... "));
        assert!(first.chars().count() < 60);
    }

    #[test]
    fn test_snippet_with_tiny_width() {
        let buf = chars("abcdefghij");
        for width in 0..6 {
            let snippet = render_snippet(&buf, Mark::new(5, 0, 5), 2, width).unwrap();
            let (line, caret) = snippet.split_once('\n').unwrap();
            assert!(line.starts_with("   ... "), "{:?}", line);
            assert_eq!(caret.find('^'), Some(7), "{:?}", snippet);
        }
    }

    #[test]
    fn test_mark_display_is_one_based() {
        assert_eq!(Mark::new(0, 0, 0).to_string(), "line 1, column 1");
    }
}
