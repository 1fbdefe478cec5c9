/// Origin of one post-preprocessor line: a file (by index into the
/// deduplicated filename table) and an inclusive line range within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapping {
    pub filename_index: usize,
    pub start_line: usize,
    pub end_line: usize,
}

/// Table translating post-preprocessor line numbers back to original
/// file + line ranges. Built once alongside the pre-passed source and
/// read-only thereafter.
#[derive(Debug, Default)]
pub struct SourceMappings {
    // index 0 corresponds to line 1
    mappings: Vec<SourceMapping>,
    filenames: Vec<String>,
}

impl SourceMappings {
    /// Look up a 1-based post-preprocessor line number.
    pub fn get(&self, line_number: usize) -> Option<SourceMapping> {
        self.mappings.get(line_number.checked_sub(1)?).copied()
    }

    pub fn filename(&self, index: usize) -> Option<&str> {
        self.filenames.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    fn intern(&mut self, name: &str) -> usize {
        match self.filenames.iter().position(|f| f == name) {
            Some(i) => i,
            None => {
                self.filenames.push(name.to_string());
                self.filenames.len() - 1
            }
        }
    }
}

struct LineCommand<'a> {
    line: usize,
    filename: Option<std::borrow::Cow<'a, str>>,
}

/// Parse one input line as a preprocessor line marker: `# <n> "<file>"` or
/// `#line <n> "<file>"`, with optional trailing flags. Returns `None` for
/// anything else (including `#pragma` lines, which must survive for the
/// lexer).
fn parse_line_command(line: &[u8]) -> Option<LineCommand<'_>> {
    let mut rest = trim_ascii(line);
    rest = rest.strip_prefix(b"#")?;
    rest = trim_ascii_start(rest);
    if let Some(after) = rest.strip_prefix(b"line") {
        rest = trim_ascii_start(after);
    }
    if !rest.first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let mut line_number = 0usize;
    while let Some((&c, tail)) = rest.split_first() {
        if !c.is_ascii_digit() {
            break;
        }
        line_number = line_number.saturating_mul(10).saturating_add((c - b'0') as usize);
        rest = tail;
    }
    rest = trim_ascii_start(rest);
    let filename = if rest.first() == Some(&b'"') {
        Some(parse_quoted_filename(&rest[1..]))
    } else {
        None
    };
    Some(LineCommand {
        line: line_number.max(1),
        filename,
    })
}

fn parse_quoted_filename(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    let end = bytes
        .iter()
        .scan(false, |escaped, &b| {
            if *escaped {
                *escaped = false;
                Some(true)
            } else if b == b'\\' {
                *escaped = true;
                Some(true)
            } else {
                Some(b != b'"')
            }
        })
        .take_while(|&keep| keep)
        .count();
    let raw = &bytes[..end];
    if raw.contains(&b'\\') {
        // Preprocessors escape backslashes in Windows paths.
        let mut name = Vec::with_capacity(raw.len());
        let mut iter = raw.iter();
        while let Some(&b) = iter.next() {
            if b == b'\\' {
                name.push(*iter.next().unwrap_or(&b'\\'));
            } else {
                name.push(b);
            }
        }
        std::borrow::Cow::Owned(String::from_utf8_lossy(&name).into_owned())
    } else {
        String::from_utf8_lossy(raw)
    }
}

fn trim_ascii_start(mut bytes: &[u8]) -> &[u8] {
    while let Some((&c, tail)) = bytes.split_first() {
        if c == b' ' || c == b'\t' {
            bytes = tail;
        } else {
            break;
        }
    }
    bytes
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let mut bytes = trim_ascii_start(bytes);
    while let Some((&c, head)) = bytes.split_last() {
        if c == b' ' || c == b'\t' || c == b'\r' || c == b'\n' {
            bytes = head;
        } else {
            break;
        }
    }
    bytes
}

/// Strip line markers from preprocessor output, recording for each surviving
/// output line its origin file and line. Lines not covered by any marker map
/// to `default_filename`.
pub fn parse_and_remove_line_commands(
    source: &[u8],
    default_filename: &str,
) -> (Vec<u8>, SourceMappings) {
    let mut out = Vec::with_capacity(source.len());
    let mut mappings = SourceMappings::default();
    let mut current_file = mappings.intern(default_filename);
    let mut current_line = 1usize;

    for line in source.split_inclusive(|&b| b == b'\n') {
        if let Some(cmd) = parse_line_command(line) {
            let file = match cmd.filename {
                Some(name) => mappings.intern(&name),
                None => current_file,
            };
            // A forward jump within the same file means the preceding output
            // line swallowed the skipped original lines (folded
            // continuations); widen its range.
            if file == current_file && cmd.line > current_line {
                if let Some(last) = mappings.mappings.last_mut() {
                    if last.filename_index == file {
                        last.end_line = cmd.line - 1;
                    }
                }
            }
            current_file = file;
            current_line = cmd.line;
        } else {
            out.extend_from_slice(line);
            mappings.mappings.push(SourceMapping {
                filename_index: current_file,
                start_line: current_line,
                end_line: current_line,
            });
            current_line += 1;
        }
    }
    (out, mappings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_markers_maps_to_default() {
        let (out, map) = parse_and_remove_line_commands(b"a\nb\n", "in.rc");
        assert_eq!(out, b"a\nb\n");
        assert_eq!(map.len(), 2);
        let m = map.get(2).unwrap();
        assert_eq!(map.filename(m.filename_index), Some("in.rc"));
        assert_eq!((m.start_line, m.end_line), (2, 2));
    }

    #[test]
    fn markers_are_removed_and_tracked() {
        let src = b"# 1 \"foo.rc\"\nA\n# 10 \"bar.h\" 1\nB\nC\n";
        let (out, map) = parse_and_remove_line_commands(src, "in.rc");
        assert_eq!(out, b"A\nB\nC\n");
        let a = map.get(1).unwrap();
        assert_eq!(map.filename(a.filename_index), Some("foo.rc"));
        assert_eq!(a.start_line, 1);
        let b = map.get(2).unwrap();
        assert_eq!(map.filename(b.filename_index), Some("bar.h"));
        assert_eq!(b.start_line, 10);
        assert_eq!(map.get(3).unwrap().start_line, 11);
    }

    #[test]
    fn hash_line_form_accepted() {
        let src = b"#line 5 \"x.rc\"\nA\n";
        let (out, map) = parse_and_remove_line_commands(src, "in.rc");
        assert_eq!(out, b"A\n");
        assert_eq!(map.get(1).unwrap().start_line, 5);
    }

    #[test]
    fn pragma_lines_survive() {
        let src = b"#pragma code_page(65001)\nA\n";
        let (out, map) = parse_and_remove_line_commands(src, "in.rc");
        assert_eq!(out, src.as_slice());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn filenames_are_deduplicated() {
        let src = b"# 1 \"a.rc\"\nx\n# 8 \"b.h\"\ny\n# 3 \"a.rc\" 2\nz\n";
        let (_, map) = parse_and_remove_line_commands(src, "a.rc");
        let first = map.get(1).unwrap().filename_index;
        let last = map.get(3).unwrap().filename_index;
        assert_eq!(first, last);
    }

    #[test]
    fn forward_jump_widens_previous_range() {
        // Line 1 of foo.rc folded three continuation lines; the next marker
        // restates the line number past them.
        let src = b"# 1 \"foo.rc\"\nfolded\n# 4 \"foo.rc\"\nnext\n";
        let (_, map) = parse_and_remove_line_commands(src, "foo.rc");
        let m = map.get(1).unwrap();
        assert_eq!((m.start_line, m.end_line), (1, 3));
        assert_eq!(map.get(2).unwrap().start_line, 4);
    }

    #[test]
    fn escaped_backslashes_in_filenames() {
        let src = b"# 1 \"C:\\\\res\\\\app.rc\"\nx\n";
        let (_, map) = parse_and_remove_line_commands(src, "in.rc");
        let m = map.get(1).unwrap();
        assert_eq!(map.filename(m.filename_index), Some("C:\\res\\app.rc"));
    }
}
