//! Terminal rendering for diagnostics.
//!
//! Rendering happens once, after a stage completes, so the per-message
//! styling burst can hold the stderr lock without interleaving. The writer
//! abstraction exposes `set_style`; when color is off every style change is
//! a no-op, so callers never branch on TTY-ness.

use std::io::{self, Write};

use pp::SourceMappings;

use crate::{Payload, Severity};

/// ANSI escape sequences for the styles rendering uses.
mod colors {
    pub const ERROR: &str = "\x1b[1;31m"; // bold red
    pub const WARNING: &str = "\x1b[1;33m"; // bold yellow
    pub const NOTE: &str = "\x1b[1;36m"; // bold cyan
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RESET: &str = "\x1b[0m";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Severity(Severity),
    Bold,
    Dim,
    Reset,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub color: bool,
}

struct StyledWriter<'w> {
    w: &'w mut dyn Write,
    color: bool,
}

impl StyledWriter<'_> {
    fn set_style(&mut self, style: Style) -> io::Result<()> {
        if !self.color {
            return Ok(());
        }
        let code = match style {
            Style::Severity(Severity::Error) => colors::ERROR,
            Style::Severity(Severity::Warning) => colors::WARNING,
            Style::Severity(Severity::Note) => colors::NOTE,
            Style::Bold => colors::BOLD,
            Style::Dim => colors::DIM,
            Style::Reset => colors::RESET,
        };
        self.w.write_all(code.as_bytes())
    }

    fn severity_tag(&mut self, severity: Severity) -> io::Result<()> {
        self.set_style(Style::Severity(severity))?;
        write!(self.w, "{}:", severity.label())?;
        self.set_style(Style::Reset)?;
        write!(self.w, " ")
    }
}

/// Render every token-based record against the source buffer, with
/// follow-up origin notes when a source mapping is available.
pub fn render_source_diagnostics(
    w: &mut dyn Write,
    diagnostics: &crate::Diagnostics,
    source: &[u8],
    mappings: Option<&SourceMappings>,
    config: RenderConfig,
) -> io::Result<()> {
    let mut sw = StyledWriter {
        w,
        color: config.color,
    };
    for record in diagnostics.iter() {
        let Payload::Source(d) = &record.payload else {
            continue;
        };
        let (line_start, line_end) = line_bounds(source, d.token.start);
        let prefix = display_text(&source[line_start..d.token.start.min(line_end)]);
        let column = prefix.chars().count() + 1;

        sw.set_style(Style::Bold)?;
        write!(
            sw.w,
            "<after preprocessor>:{}:{}: ",
            d.token.line_number, column
        )?;
        sw.set_style(Style::Reset)?;
        sw.severity_tag(record.severity)?;
        let mut message = String::new();
        let _ = d.write_message(&mut message, source, record.severity);
        writeln!(sw.w, "{message}")?;

        if d.print_source_line {
            let line = display_text(&source[line_start..line_end]);
            writeln!(sw.w, "{line}")?;
            let caret_len = d
                .token
                .end
                .min(line_end)
                .saturating_sub(d.token.start)
                .max(1);
            sw.set_style(Style::Severity(record.severity))?;
            write!(sw.w, "{}^", caret_padding(&prefix))?;
            for _ in 1..caret_len {
                write!(sw.w, "~")?;
            }
            sw.set_style(Style::Reset)?;
            writeln!(sw.w)?;
        }

        // Trace the line back to the file it came from, echoing the
        // original line(s) from disk when we can.
        if let Some(mappings) = mappings {
            if let Some(mapping) = mappings.get(d.token.line_number) {
                let filename = mappings
                    .filename(mapping.filename_index)
                    .unwrap_or("<unknown>");
                sw.severity_tag(Severity::Note)?;
                if mapping.start_line == mapping.end_line {
                    writeln!(
                        sw.w,
                        "this line originated from line {} of file '{}'",
                        mapping.start_line, filename
                    )?;
                } else {
                    writeln!(
                        sw.w,
                        "this line originated from lines {}-{} of file '{}'",
                        mapping.start_line, mapping.end_line, filename
                    )?;
                }
                match read_lines(filename, mapping.start_line, mapping.end_line) {
                    Ok(lines) => {
                        for line in lines {
                            sw.set_style(Style::Dim)?;
                            write!(sw.w, " | ")?;
                            sw.set_style(Style::Reset)?;
                            writeln!(sw.w, "{}", display_text(line.as_bytes()))?;
                        }
                    }
                    Err(err) => {
                        // Soft failure: the origin file may be gone or
                        // unreadable; never abort rendering over it.
                        sw.set_style(Style::Dim)?;
                        writeln!(sw.w, " | unable to read '{filename}': {err}")?;
                        sw.set_style(Style::Reset)?;
                    }
                }
            }
        }
    }
    sw.w.flush()
}

/// Render every CLI record against the argv the process was started with.
pub fn render_cli_diagnostics(
    w: &mut dyn Write,
    diagnostics: &crate::Diagnostics,
    args: &[String],
    config: RenderConfig,
) -> io::Result<()> {
    let mut sw = StyledWriter {
        w,
        color: config.color,
    };
    for record in diagnostics.iter() {
        let Payload::Cli(d) = &record.payload else {
            continue;
        };
        sw.set_style(Style::Bold)?;
        write!(sw.w, "<cli>: ")?;
        sw.set_style(Style::Reset)?;
        sw.severity_tag(record.severity)?;
        writeln!(sw.w, "{}", d.message)?;

        if !d.print_args || d.arg_index >= args.len() {
            continue;
        }
        let mut underline_offset = 0usize;
        let mut out = String::new();
        if d.arg_index > 0 {
            sw.set_style(Style::Dim)?;
            write!(sw.w, " ... ")?;
            sw.set_style(Style::Reset)?;
            underline_offset += 5;
        } else {
            write!(sw.w, " ")?;
            underline_offset += 1;
        }
        let arg = &args[d.arg_index];
        out.push_str(arg);
        let next_arg_offset = if d.arg_span.point_at_next_arg {
            let offset = out.chars().count() + 1;
            if let Some(next) = args.get(d.arg_index + 1) {
                out.push(' ');
                out.push_str(next);
            } else {
                out.push(' ');
            }
            Some(offset)
        } else {
            None
        };
        write!(sw.w, "{out}")?;
        if args.len() > d.arg_index + 1 + usize::from(d.arg_span.point_at_next_arg) {
            sw.set_style(Style::Dim)?;
            write!(sw.w, " ...")?;
            sw.set_style(Style::Reset)?;
        }
        writeln!(sw.w)?;

        // Underline: tildes over the option prefix and value, a caret at
        // the option name (or at the next argv entry).
        let mut underline = String::new();
        for _ in 0..underline_offset {
            underline.push(' ');
        }
        match next_arg_offset {
            Some(offset) => {
                for _ in 0..offset {
                    underline.push(' ');
                }
                underline.push('^');
            }
            None => {
                for i in 0..arg.chars().count() {
                    underline.push(if i == d.arg_span.name_offset { '^' } else { '~' });
                }
            }
        }
        sw.set_style(Style::Severity(record.severity))?;
        writeln!(sw.w, "{}", underline.trim_end())?;
        sw.set_style(Style::Reset)?;
    }
    sw.w.flush()
}

/// Byte offsets of the line containing `pos`, newline excluded.
fn line_bounds(source: &[u8], pos: usize) -> (usize, usize) {
    let pos = pos.min(source.len());
    let start = source[..pos]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = source[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| pos + i)
        .unwrap_or(source.len());
    (start, end)
}

/// Printable form of a source line: `\r` elided, other control bytes shown
/// as U+FFFD, invalid UTF-8 lossily replaced.
fn display_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in String::from_utf8_lossy(bytes).chars() {
        match chunk {
            '\r' => {}
            '\t' => out.push('\t'),
            c if (c as u32) < 0x20 || c == '\u{7F}' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out
}

/// Whitespace run that aligns a caret under `prefix`: tabs stay tabs so the
/// terminal expands them identically, everything else becomes a space.
fn caret_padding(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect()
}

fn read_lines(filename: &str, start_line: usize, end_line: usize) -> io::Result<Vec<String>> {
    let contents = std::fs::read_to_string(filename)?;
    let lines: Vec<String> = contents
        .lines()
        .skip(start_line.saturating_sub(1))
        .take(end_line.saturating_sub(start_line) + 1)
        .map(str::to_string)
        .collect();
    if lines.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("line {start_line} is past the end of the file"),
        ));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArgSpan, Diagnostics, ErrorCode, ErrorExtra};
    use lex::{Token, TokenId};

    fn token(start: usize, end: usize, line_number: usize) -> Token {
        Token {
            id: TokenId::Identifier,
            start,
            end,
            line_number,
        }
    }

    #[test]
    fn renders_source_error_with_caret() {
        let source = b"A RCDATA {\nB oops\n";
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_error(
            ErrorCode::ExpectedToken,
            token(13, 17, 2),
            ErrorExtra::ExpectedTokenId(TokenId::OpenBrace),
        );
        let mut out = Vec::new();
        render_source_diagnostics(&mut out, &diagnostics, source, None, RenderConfig::default())
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<after preprocessor>:2:3: error: expected '{', got 'oops'"));
        assert!(text.contains("B oops"));
        assert!(text.contains("  ^~~~"));
    }

    #[test]
    fn control_bytes_replaced_in_echoed_line() {
        let source = b"x \x01y\n";
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_error(ErrorCode::IllegalByteOutsideStringLiterals, token(2, 3, 1), ErrorExtra::None);
        let mut out = Vec::new();
        render_source_diagnostics(&mut out, &diagnostics, source, None, RenderConfig::default())
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("x \u{FFFD}y"));
        assert!(text.contains("character 0x01 is not allowed outside of string literals"));
    }

    #[test]
    fn origin_note_uses_source_mapping() {
        let (out_src, mappings) =
            pp::parse_and_remove_line_commands(b"# 7 \"orig.rc\"\nbad line\n", "in.rc");
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_error(ErrorCode::ExpectedToken, token(0, 3, 1), ErrorExtra::ExpectedTokenId(TokenId::Number));
        let mut rendered = Vec::new();
        render_source_diagnostics(
            &mut rendered,
            &diagnostics,
            &out_src,
            Some(&mappings),
            RenderConfig::default(),
        )
        .unwrap();
        let text = String::from_utf8(rendered).unwrap();
        assert!(text.contains("note: this line originated from line 7 of file 'orig.rc'"));
        // The origin file does not exist; the failure is reported softly.
        assert!(text.contains("unable to read 'orig.rc'"));
    }

    #[test]
    fn renders_cli_error_with_underline() {
        let args = vec!["resc".to_string(), "/sl".to_string(), "x".to_string()];
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_cli_error(
            1,
            ArgSpan {
                prefix_len: 1,
                name_offset: 1,
                value_offset: None,
                point_at_next_arg: true,
            },
            "invalid /SL value: x".to_string(),
        );
        let mut out = Vec::new();
        render_cli_diagnostics(&mut out, &diagnostics, &args, RenderConfig::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<cli>: error: invalid /SL value: x"));
        assert!(text.contains("/sl x"));
    }

    #[test]
    fn color_codes_only_when_enabled() {
        let source = b"z\n";
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_error(ErrorCode::UnfinishedStringLiteral, token(0, 1, 1), ErrorExtra::None);
        let mut plain = Vec::new();
        render_source_diagnostics(&mut plain, &diagnostics, source, None, RenderConfig { color: false }).unwrap();
        assert!(!plain.contains(&0x1b));
        let mut colored = Vec::new();
        render_source_diagnostics(&mut colored, &diagnostics, source, None, RenderConfig { color: true }).unwrap();
        assert!(colored.contains(&0x1b));
    }
}
