#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    SawSlash,
    LineComment,
    BlockComment { multiline: bool },
    BlockCommentStar { multiline: bool },
    InSingleQuotes,
    InSingleQuotesEscape,
    InDoubleQuotes,
    InDoubleQuotesEscape,
}

/// Remove `//` and `/* */` comments, compacting the buffer in place.
/// Returns the new length; the output never exceeds the input length.
///
/// Comment markers inside `"…"`/`'…'` literals are inert. A backslash
/// escapes the byte after it inside a literal; a bare `\n` terminates the
/// literal (matching how the lexer treats an unfinished string). Line
/// comments keep their terminating newline (and a preceding `\r`). Block
/// comments that spanned at least one `\n` collapse to a single space,
/// same-line ones to nothing. A lone `\r` is not a newline.
///
/// The state machine runs over bytes, not code points. All state-driving
/// characters are ASCII and stay ASCII under every supported code page.
pub fn remove_comments_in_place(buf: &mut [u8]) -> usize {
    let mut out = 0usize;
    let mut state = State::Start;
    let mut index = 0usize;
    while index < buf.len() {
        let c = buf[index];
        match state {
            State::Start => match c {
                b'/' => state = State::SawSlash,
                b'"' => {
                    buf[out] = c;
                    out += 1;
                    state = State::InDoubleQuotes;
                }
                b'\'' => {
                    buf[out] = c;
                    out += 1;
                    state = State::InSingleQuotes;
                }
                _ => {
                    buf[out] = c;
                    out += 1;
                }
            },
            State::SawSlash => match c {
                b'/' => state = State::LineComment,
                b'*' => state = State::BlockComment { multiline: false },
                _ => {
                    buf[out] = b'/';
                    out += 1;
                    buf[out] = c;
                    out += 1;
                    state = match c {
                        b'"' => State::InDoubleQuotes,
                        b'\'' => State::InSingleQuotes,
                        _ => State::Start,
                    };
                }
            },
            State::LineComment => {
                if c == b'\n' {
                    // buf[index - 1] is ahead of the write cursor (writes
                    // stopped at the comment opener), so it is still the
                    // original source byte.
                    if index > 0 && buf[index - 1] == b'\r' {
                        buf[out] = b'\r';
                        out += 1;
                    }
                    buf[out] = b'\n';
                    out += 1;
                    state = State::Start;
                }
            }
            State::BlockComment { multiline } => match c {
                b'*' => state = State::BlockCommentStar { multiline },
                b'\n' => state = State::BlockComment { multiline: true },
                _ => {}
            },
            State::BlockCommentStar { multiline } => match c {
                b'/' => {
                    if multiline {
                        buf[out] = b' ';
                        out += 1;
                    }
                    state = State::Start;
                }
                b'*' => {}
                b'\n' => state = State::BlockComment { multiline: true },
                _ => state = State::BlockComment { multiline },
            },
            State::InSingleQuotes => {
                buf[out] = c;
                out += 1;
                state = match c {
                    b'\\' => State::InSingleQuotesEscape,
                    b'\'' | b'\n' => State::Start,
                    _ => State::InSingleQuotes,
                };
            }
            State::InSingleQuotesEscape => {
                buf[out] = c;
                out += 1;
                state = if c == b'\n' {
                    State::Start
                } else {
                    State::InSingleQuotes
                };
            }
            State::InDoubleQuotes => {
                buf[out] = c;
                out += 1;
                state = match c {
                    b'\\' => State::InDoubleQuotesEscape,
                    b'"' | b'\n' => State::Start,
                    _ => State::InDoubleQuotes,
                };
            }
            State::InDoubleQuotesEscape => {
                buf[out] = c;
                out += 1;
                state = if c == b'\n' {
                    State::Start
                } else {
                    State::InDoubleQuotes
                };
            }
        }
        index += 1;
    }
    // A trailing lone slash was never part of a comment.
    if state == State::SawSlash {
        buf[out] = b'/';
        out += 1;
    }
    out
}

/// Truncating wrapper over [`remove_comments_in_place`].
pub fn remove_comments(buf: &mut Vec<u8>) {
    let len = remove_comments_in_place(buf);
    buf.truncate(len);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removed(input: &str) -> String {
        let mut buf = input.as_bytes().to_vec();
        remove_comments(&mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn line_comment_keeps_newline() {
        assert_eq!(removed("//c\nA RCDATA {1}"), "\nA RCDATA {1}");
        assert_eq!(removed("a // b\nc"), "a \nc");
        assert_eq!(removed("a //b\r\nc"), "a \r\nc");
    }

    #[test]
    fn block_comment_same_line_vanishes() {
        assert_eq!(removed("blah/**/blah"), "blahblah");
        assert_eq!(removed("a/* x */b"), "ab");
    }

    #[test]
    fn block_comment_multiline_collapses_to_space() {
        assert_eq!(removed("blah/*\n*/blah"), "blah blah");
        assert_eq!(removed("a/* x\ny\nz */b"), "a b");
    }

    #[test]
    fn markers_inert_inside_literals() {
        assert_eq!(removed("\"// not a comment\""), "\"// not a comment\"");
        assert_eq!(removed("\"/* also not */\""), "\"/* also not */\"");
        assert_eq!(removed("'/'"), "'/'");
    }

    #[test]
    fn escaped_quote_does_not_close_literal() {
        assert_eq!(removed("\"a\\\"// still\" //x\n"), "\"a\\\"// still\" \n");
    }

    #[test]
    fn newline_terminates_literal() {
        // The literal ends at the newline, so the comment on the next line
        // is a real comment.
        assert_eq!(removed("\"abc\n// gone\nx"), "\"abc\n\nx");
    }

    #[test]
    fn lone_cr_is_not_a_newline() {
        // \r does not end a line comment.
        assert_eq!(removed("a //b\rc\nd"), "a \nd");
    }

    #[test]
    fn star_not_followed_by_slash_stays_in_block() {
        assert_eq!(removed("a/* * ** */b"), "ab");
    }

    #[test]
    fn unterminated_block_comment_dropped() {
        assert_eq!(removed("a/* never closed"), "a");
        assert_eq!(removed("a/"), "a/");
    }

    #[test]
    fn output_never_longer_and_idempotent() {
        let cases = [
            "plain text",
            "//\n//\n",
            "a/*\n*/b // c\n\"/*\"'//'",
            "/",
            "\"unfinished",
        ];
        for case in cases {
            let once = removed(case);
            assert!(once.len() <= case.len());
            assert_eq!(removed(&once), once, "not idempotent for {case:?}");
        }
    }

    #[test]
    fn newline_count_preserved_outside_comments() {
        let input = "a//x\nb/*y*/\nc\n";
        let output = removed(input);
        let count = |s: &str| s.bytes().filter(|&b| b == b'\n').count();
        assert_eq!(count(input), count(&output));
    }
}
