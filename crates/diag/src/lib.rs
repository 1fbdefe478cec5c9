//! Structured diagnostics for every pipeline stage.
//!
//! Stages append records as they detect problems and rendering happens in
//! one pass after the stage completes, in append order (which is detection
//! order, so notes directly follow the error they explain). A record is
//! either token-based (lex/parse/compile) or CLI-based (argv parsing).

mod render;

use std::fmt;

use lex::keywords::ResourceType;
use lex::{LexError, LexErrorCode, Token, TokenId};

pub use render::{render_cli_diagnostics, render_source_diagnostics, RenderConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

/// The closed set of source-level error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // lexical
    UnfinishedStringLiteral,
    StringLiteralTooLong,
    IllegalByte,
    IllegalByteOutsideStringLiterals,
    FoundCStyleEscapedQuote,
    InvalidCodePage,
    UnsupportedCodePage,
    // parse
    UnfinishedRawDataBlock,
    UnfinishedStringTableBlock,
    ExpectedToken,
    ExpectedSomethingElse,
    ResourceTypeCantUseRawData,
    IdMustBeOrdinal,
    // compile
    StringResourceAsNumericType,
    StringAlreadyDefined,
    ControlIdAlreadyDefined,
    UnableToOpenFile,
    InvalidFileFormat,
}

/// Extra payload whose meaning is keyed by the [`ErrorCode`]; a sum type so
/// the code-to-payload mapping stays a compile-time invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorExtra {
    None,
    ExpectedTokenId(TokenId),
    Number(u32),
    ExpectedTypes(ExpectedTypes),
    ResourceType(ResourceType),
}

/// A set of syntactic categories, for `expected_something_else`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpectedTypes {
    pub number: bool,
    pub number_expression: bool,
    pub string_literal: bool,
    pub identifier: bool,
    pub filename: bool,
}

impl fmt::Display for ExpectedTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.number, "number"),
            (self.number_expression, "number expression"),
            (self.string_literal, "quoted string literal"),
            (self.identifier, "identifier"),
            (self.filename, "filename"),
        ];
        let active: Vec<&str> = names.iter().filter(|(on, _)| *on).map(|&(_, n)| n).collect();
        match active.len() {
            0 => write!(f, "something else"),
            1 => write!(f, "{}", active[0]),
            _ => {
                let (last, rest) = active.split_last().unwrap();
                for (i, name) in rest.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}")?;
                }
                write!(f, " or {last}")
            }
        }
    }
}

/// Token-based payload: something went wrong at a span of the source.
#[derive(Debug, Clone, Copy)]
pub struct SourceDiagnostic {
    pub code: ErrorCode,
    pub token: Token,
    pub extra: ErrorExtra,
    /// Whether rendering should echo the offending source line.
    pub print_source_line: bool,
}

/// Sub-range info for one argv element.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgSpan {
    /// Length of the option prefix (`/`, `-`, or `--`).
    pub prefix_len: usize,
    /// Offset of the option name within the argv element.
    pub name_offset: usize,
    /// Offset of the option's value within the element, when concatenated.
    pub value_offset: Option<usize>,
    /// Point at the following argv entry instead (missing-value errors).
    pub point_at_next_arg: bool,
}

/// CLI-based payload: something went wrong in an argv element.
#[derive(Debug, Clone)]
pub struct CliDiagnostic {
    pub arg_index: usize,
    pub arg_span: ArgSpan,
    pub message: String,
    pub print_args: bool,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Source(SourceDiagnostic),
    Cli(CliDiagnostic),
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub payload: Payload,
}

/// Append-only diagnostic collection, threaded through the pipeline by
/// `&mut` and rendered once at the end.
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.records.push(diagnostic);
    }

    pub fn add_source(
        &mut self,
        severity: Severity,
        code: ErrorCode,
        token: Token,
        extra: ErrorExtra,
    ) {
        self.records.push(Diagnostic {
            severity,
            payload: Payload::Source(SourceDiagnostic {
                code,
                token,
                extra,
                print_source_line: true,
            }),
        });
    }

    pub fn add_error(&mut self, code: ErrorCode, token: Token, extra: ErrorExtra) {
        self.add_source(Severity::Error, code, token, extra);
    }

    pub fn add_warning(&mut self, code: ErrorCode, token: Token, extra: ErrorExtra) {
        self.add_source(Severity::Warning, code, token, extra);
    }

    pub fn add_note(&mut self, code: ErrorCode, token: Token, extra: ErrorExtra) {
        self.add_source(Severity::Note, code, token, extra);
    }

    /// Convert a lexer error into the corresponding record.
    pub fn add_lex_error(&mut self, err: &LexError) {
        let (code, extra) = match err.code {
            LexErrorCode::UnfinishedStringLiteral => {
                (ErrorCode::UnfinishedStringLiteral, ErrorExtra::None)
            }
            LexErrorCode::StringLiteralTooLong(max) => {
                (ErrorCode::StringLiteralTooLong, ErrorExtra::Number(max))
            }
            LexErrorCode::IllegalByte => (ErrorCode::IllegalByte, ErrorExtra::None),
            LexErrorCode::IllegalByteOutsideStringLiterals => {
                (ErrorCode::IllegalByteOutsideStringLiterals, ErrorExtra::None)
            }
            LexErrorCode::FoundCStyleEscapedQuote => {
                (ErrorCode::FoundCStyleEscapedQuote, ErrorExtra::None)
            }
            LexErrorCode::InvalidCodePage(id) => {
                (ErrorCode::InvalidCodePage, ErrorExtra::Number(id))
            }
            LexErrorCode::UnsupportedCodePage(id) => {
                (ErrorCode::UnsupportedCodePage, ErrorExtra::Number(id))
            }
        };
        self.add_error(code, err.token, extra);
    }

    /// Same as [`add_lex_error`] but demoted to a warning (`/w`).
    pub fn add_lex_warning(&mut self, err: &LexError) {
        self.add_lex_error(err);
        if let Some(last) = self.records.last_mut() {
            last.severity = Severity::Warning;
        }
    }

    pub fn add_cli_error(&mut self, arg_index: usize, arg_span: ArgSpan, message: String) {
        self.records.push(Diagnostic {
            severity: Severity::Error,
            payload: Payload::Cli(CliDiagnostic {
                arg_index,
                arg_span,
                message,
                print_args: true,
            }),
        });
    }

    pub fn add_cli_warning(&mut self, arg_index: usize, arg_span: ArgSpan, message: String) {
        self.records.push(Diagnostic {
            severity: Severity::Warning,
            payload: Payload::Cli(CliDiagnostic {
                arg_index,
                arg_span,
                message,
                print_args: true,
            }),
        });
    }

    pub fn add_cli_note(&mut self, arg_index: usize, arg_span: ArgSpan, message: String) {
        self.records.push(Diagnostic {
            severity: Severity::Note,
            payload: Payload::Cli(CliDiagnostic {
                arg_index,
                arg_span,
                message,
                print_args: true,
            }),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.records.iter()
    }
}

impl SourceDiagnostic {
    /// The rendered message text (everything after the severity tag).
    pub fn write_message(&self, f: &mut dyn fmt::Write, source: &[u8], severity: Severity) -> fmt::Result {
        let slice = || String::from_utf8_lossy(self.token.slice(source));
        let number = || match self.extra {
            ErrorExtra::Number(n) => n,
            _ => 0,
        };
        match (self.code, severity) {
            (ErrorCode::UnfinishedStringLiteral, _) => {
                write!(f, "unfinished string literal")
            }
            (ErrorCode::StringLiteralTooLong, _) => {
                write!(f, "string literal too long (max is currently {} characters)", number())
            }
            (ErrorCode::IllegalByte, _) => {
                let byte = self.token.slice(source).last().copied().unwrap_or(0);
                write!(f, "character {byte:#04X} is not allowed")
            }
            (ErrorCode::IllegalByteOutsideStringLiterals, _) => {
                let byte = self.token.slice(source).first().copied().unwrap_or(0);
                write!(f, "character {byte:#04X} is not allowed outside of string literals")
            }
            (ErrorCode::FoundCStyleEscapedQuote, _) => {
                write!(f, "escaping quotes with \\\" is not allowed (use \"\" instead)")
            }
            (ErrorCode::InvalidCodePage, _) => {
                write!(f, "invalid code page {} in #pragma code_page", number())
            }
            (ErrorCode::UnsupportedCodePage, _) => {
                write!(f, "unsupported code page {} in #pragma code_page", number())
            }
            (ErrorCode::UnfinishedRawDataBlock, _) => {
                write!(f, "unfinished raw data block, expected '}}' or 'END'")
            }
            (ErrorCode::UnfinishedStringTableBlock, _) => {
                write!(f, "unfinished STRINGTABLE block, expected '}}' or 'END'")
            }
            (ErrorCode::ExpectedToken, _) => {
                let expected = match self.extra {
                    ErrorExtra::ExpectedTokenId(id) => id.name(),
                    _ => "something else",
                };
                write!(f, "expected {expected}, got '{}'", slice())
            }
            (ErrorCode::ExpectedSomethingElse, _) => {
                let expected = match self.extra {
                    ErrorExtra::ExpectedTypes(types) => types,
                    _ => ExpectedTypes::default(),
                };
                write!(f, "expected {expected}; got '{}'", slice())
            }
            (ErrorCode::ResourceTypeCantUseRawData, _) => {
                let name = match self.extra {
                    ErrorExtra::ResourceType(t) => t.name(),
                    _ => "this resource type",
                };
                write!(f, "expected filename for {name} resource, raw data blocks are not allowed")
            }
            (ErrorCode::IdMustBeOrdinal, _) => {
                write!(f, "id must be an ordinal (number), got '{}'", slice())
            }
            (ErrorCode::StringResourceAsNumericType, Severity::Note) => {
                write!(f, "string resources are defined with STRINGTABLE statements")
            }
            (ErrorCode::StringResourceAsNumericType, _) => {
                write!(f, "the number 6 (RT_STRING) cannot be used as a resource type")
            }
            (ErrorCode::StringAlreadyDefined, Severity::Note) => {
                write!(f, "previous definition of the string with id {} here", number())
            }
            (ErrorCode::StringAlreadyDefined, _) => {
                let n = number();
                write!(f, "string with id {n} ({n:#X}) already defined for this language")
            }
            (ErrorCode::ControlIdAlreadyDefined, Severity::Note) => {
                write!(f, "previous definition of the control with id {} here", number())
            }
            (ErrorCode::ControlIdAlreadyDefined, _) => {
                write!(f, "control with id {} already defined for this dialog", number())
            }
            (ErrorCode::UnableToOpenFile, _) => {
                write!(f, "unable to open file '{}'", slice())
            }
            (ErrorCode::InvalidFileFormat, _) => {
                write!(f, "file '{}' is not in the expected format", slice())
            }
        }
    }
}
