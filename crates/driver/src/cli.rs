//! rc.exe-compatible command line parsing.
//!
//! Options use `/`, `-`, or `--` prefixes, case-insensitively. Values may
//! be separate argv entries or concatenated (`/FObar.res`), and
//! single-letter options pack (`/xvFObar.res`). Matching is
//! longest-prefix-first so `/no-preprocess` is not read as `/n /o ...`.
//! A declarative argument parser cannot express this grammar, hence the
//! hand-written scanner.

use std::collections::HashMap;
use std::path::Path;

use diag::{ArgSpan, Diagnostics};

pub const USAGE: &str = "\
Usage: resc [options] <input .rc> [<output .res>]

Options (case-insensitive; /, - and -- prefixes all work):
  /fo <path>        output filename (default: input stem + .res)
  /sl <1-100>       max string literal length as a percent of 8192
  /ln <tag>         default language by BCP-47 tag (e.g. en-us)
  /l <id>           default language by hex id (e.g. 409)
  /c <codepage>     default code page (1252 or 65001)
  /i <dir>          add an include path (repeatable)
  /d <name[=val]>   define a preprocessor symbol
  /u <name>         undefine a preprocessor symbol (sticky)
  /v                verbose
  /x                ignore the INCLUDE environment variable
  /n                null-terminate string table strings
  /y                silence duplicate control id warnings
  /w                warn instead of error on invalid code pages
  /r                accepted for rc.exe compatibility (no effect)
  /nologo           suppress the banner
  /no-preprocess    input is already preprocessed
  --                end of options
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolAction {
    Define(String),
    Undefine,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub input_filename: String,
    pub output_filename: String,
    pub extra_include_paths: Vec<String>,
    pub ignore_include_env_var: bool,
    pub preprocess: bool,
    pub default_language_id: Option<u16>,
    pub default_code_page: Option<codepage::CodePage>,
    pub verbose: bool,
    /// Undefine is sticky: once a symbol is undefined, later defines of
    /// it are ignored for the lifetime of the options.
    pub symbols: HashMap<String, SymbolAction>,
    pub null_terminate_string_table_strings: bool,
    pub max_string_literal_codepoints: usize,
    pub silence_duplicate_control_ids: bool,
    pub warn_instead_of_error_on_invalid_code_page: bool,
    pub nologo: bool,
    pub print_help_and_exit: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            input_filename: String::new(),
            output_filename: String::new(),
            extra_include_paths: Vec::new(),
            ignore_include_env_var: false,
            preprocess: true,
            default_language_id: None,
            default_code_page: None,
            verbose: false,
            symbols: HashMap::new(),
            null_terminate_string_table_strings: false,
            max_string_literal_codepoints: 8192,
            silence_duplicate_control_ids: false,
            warn_instead_of_error_on_invalid_code_page: false,
            nologo: false,
            print_help_and_exit: false,
        }
    }
}

/// Errors were recorded in the diagnostics; the sentinel halts startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseArgsError;

struct ArgParser<'d> {
    diagnostics: &'d mut Diagnostics,
    options: Options,
    input: Option<String>,
    output_positional: Option<String>,
    fo_arg: Option<usize>,
    positional_count: usize,
    failed: bool,
}

/// Where an option's value came from, for diagnostics.
struct ValueRef {
    text: String,
    arg_index: usize,
    span: ArgSpan,
}

pub fn parse_args(args: &[String], diagnostics: &mut Diagnostics) -> Result<Options, ParseArgsError> {
    let mut parser = ArgParser {
        diagnostics,
        options: Options::default(),
        input: None,
        output_positional: None,
        fo_arg: None,
        positional_count: 0,
        failed: false,
    };

    let mut i = 1usize;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--" {
            i += 1;
            break;
        }
        let prefix_len = if arg.starts_with("--") {
            2
        } else if arg.starts_with('/') || arg.starts_with('-') {
            1
        } else {
            0
        };
        if prefix_len == 0 || arg.len() == prefix_len {
            parser.positional(arg, i);
            i += 1;
            continue;
        }
        i = parser.scan_option_arg(args, i, prefix_len);
    }
    while i < args.len() {
        parser.positional(&args[i], i);
        i += 1;
    }
    parser.finish(args)
}

impl ArgParser<'_> {
    fn error(&mut self, arg_index: usize, span: ArgSpan, message: String) {
        self.diagnostics.add_cli_error(arg_index, span, message);
        self.failed = true;
    }

    /// Scan one `/`-style argv entry, which may pack several options.
    /// Returns the index of the next argv entry to look at.
    fn scan_option_arg(&mut self, args: &[String], arg_index: usize, prefix_len: usize) -> usize {
        let arg = &args[arg_index];
        let lower = arg.to_ascii_lowercase();
        let mut offset = prefix_len;
        let mut next = arg_index + 1;
        while offset < arg.len() {
            let rest = &lower[offset..];
            let span = ArgSpan {
                prefix_len,
                name_offset: offset,
                value_offset: None,
                point_at_next_arg: false,
            };
            // Longest-prefix-first over the option set.
            if let Some(after) = rest.strip_prefix("no-preprocess") {
                self.options.preprocess = false;
                offset = arg.len() - after.len();
            } else if let Some(after) = rest.strip_prefix("nologo") {
                self.options.nologo = true;
                offset = arg.len() - after.len();
            } else if rest.starts_with("fo") {
                let Some(value) = self.take_value(args, arg_index, offset, 2, &mut next) else {
                    break;
                };
                self.fo_arg = Some(arg_index);
                self.options.output_filename = value.text;
                offset = arg.len();
            } else if rest.starts_with("sl") {
                let Some(value) = self.take_value(args, arg_index, offset, 2, &mut next) else {
                    break;
                };
                self.apply_sl(&value);
                offset = arg.len();
            } else if rest.starts_with("ln") {
                let Some(value) = self.take_value(args, arg_index, offset, 2, &mut next) else {
                    break;
                };
                self.apply_language_tag(&value);
                offset = arg.len();
            } else if rest.starts_with('l') {
                let Some(value) = self.take_value(args, arg_index, offset, 1, &mut next) else {
                    break;
                };
                self.apply_language_id(&value);
                offset = arg.len();
            } else if rest.starts_with('c') {
                let Some(value) = self.take_value(args, arg_index, offset, 1, &mut next) else {
                    break;
                };
                self.apply_code_page(&value);
                offset = arg.len();
            } else if rest.starts_with('i') {
                let Some(value) = self.take_value(args, arg_index, offset, 1, &mut next) else {
                    break;
                };
                self.options.extra_include_paths.push(value.text);
                offset = arg.len();
            } else if rest.starts_with('d') {
                let Some(value) = self.take_value(args, arg_index, offset, 1, &mut next) else {
                    break;
                };
                self.apply_define(&value);
                offset = arg.len();
            } else if rest.starts_with('u') {
                let Some(value) = self.take_value(args, arg_index, offset, 1, &mut next) else {
                    break;
                };
                self.apply_undefine(&value);
                offset = arg.len();
            } else if rest.starts_with('v') {
                self.options.verbose = true;
                offset += 1;
            } else if rest.starts_with('x') {
                self.options.ignore_include_env_var = true;
                offset += 1;
            } else if rest.starts_with('n') {
                self.options.null_terminate_string_table_strings = true;
                offset += 1;
            } else if rest.starts_with('y') {
                self.options.silence_duplicate_control_ids = true;
                offset += 1;
            } else if rest.starts_with('w') {
                self.options.warn_instead_of_error_on_invalid_code_page = true;
                offset += 1;
            } else if rest.starts_with('r') {
                // rc.exe compatibility switch; nothing to do.
                offset += 1;
            } else if rest.starts_with('?') || rest.starts_with('h') {
                self.options.print_help_and_exit = true;
                offset += 1;
            } else {
                self.error(
                    arg_index,
                    span,
                    format!("invalid option: {}{}", &arg[..prefix_len], &arg[offset..]),
                );
                break;
            }
        }
        next
    }

    /// Fetch the value of a value-taking option: the remainder of the
    /// current argv entry if non-empty, otherwise the next entry.
    fn take_value(
        &mut self,
        args: &[String],
        arg_index: usize,
        name_offset: usize,
        name_len: usize,
        next: &mut usize,
    ) -> Option<ValueRef> {
        let arg = &args[arg_index];
        let value_offset = name_offset + name_len;
        if value_offset < arg.len() {
            return Some(ValueRef {
                text: arg[value_offset..].to_string(),
                arg_index,
                span: ArgSpan {
                    prefix_len: 0,
                    name_offset,
                    value_offset: Some(value_offset),
                    point_at_next_arg: false,
                },
            });
        }
        if *next < args.len() {
            let value = ValueRef {
                text: args[*next].clone(),
                arg_index: *next,
                span: ArgSpan::default(),
            };
            *next += 1;
            return Some(value);
        }
        self.error(
            arg_index,
            ArgSpan {
                prefix_len: 0,
                name_offset,
                value_offset: None,
                point_at_next_arg: true,
            },
            format!("missing value for option {}", &arg[name_offset..value_offset.min(arg.len())]),
        );
        None
    }

    fn apply_sl(&mut self, value: &ValueRef) {
        match value.text.parse::<u32>() {
            Ok(percent) if (1..=100).contains(&percent) => {
                // Rounded to nearest: /SL 66 is 5407, not 5406.
                self.options.max_string_literal_codepoints =
                    (percent as usize * 8192 + 50) / 100;
            }
            _ => {
                self.error(
                    value.arg_index,
                    value.span,
                    format!("invalid /SL value: {}", value.text),
                );
                self.diagnostics.add_cli_note(
                    value.arg_index,
                    value.span,
                    "the /SL value is a percent of 8192 and must be between 1 and 100".to_string(),
                );
            }
        }
    }

    fn apply_language_tag(&mut self, value: &ValueRef) {
        match compile::lang::from_tag(&value.text) {
            Some(id) => self.options.default_language_id = Some(id),
            None => self.error(
                value.arg_index,
                value.span,
                format!("invalid language tag: {}", value.text),
            ),
        }
    }

    fn apply_language_id(&mut self, value: &ValueRef) {
        // rc.exe reads /l values as hex, with or without a 0x prefix.
        let digits = value
            .text
            .strip_prefix("0x")
            .or_else(|| value.text.strip_prefix("0X"))
            .unwrap_or(&value.text);
        match u16::from_str_radix(digits, 16) {
            Ok(id) => self.options.default_language_id = Some(id),
            Err(_) => self.error(
                value.arg_index,
                value.span,
                format!("invalid language id: {}", value.text),
            ),
        }
    }

    fn apply_code_page(&mut self, value: &ValueRef) {
        let id = match value.text.parse::<u32>() {
            Ok(id) => id,
            Err(_) => {
                self.error(
                    value.arg_index,
                    value.span,
                    format!("invalid code page: {}", value.text),
                );
                return;
            }
        };
        match codepage::CodePage::from_identifier(id) {
            Ok(code_page) => self.options.default_code_page = Some(code_page),
            Err(codepage::CodePageError::Unsupported) => self.error(
                value.arg_index,
                value.span,
                format!("unsupported code page: {id}"),
            ),
            Err(codepage::CodePageError::Invalid) => self.error(
                value.arg_index,
                value.span,
                format!("invalid code page: {id}"),
            ),
        }
    }

    fn apply_define(&mut self, value: &ValueRef) {
        let (name, definition) = match value.text.split_once('=') {
            Some((name, definition)) => (name.to_string(), definition.to_string()),
            None => (value.text.clone(), "1".to_string()),
        };
        if !is_valid_identifier(&name) {
            self.diagnostics.add_cli_warning(
                value.arg_index,
                value.span,
                format!("symbol \"{name}\" is not a valid C identifier"),
            );
        }
        // Undefine is sticky.
        if self.options.symbols.get(&name) != Some(&SymbolAction::Undefine) {
            self.options.symbols.insert(name, SymbolAction::Define(definition));
        }
    }

    fn apply_undefine(&mut self, value: &ValueRef) {
        if !is_valid_identifier(&value.text) {
            self.diagnostics.add_cli_warning(
                value.arg_index,
                value.span,
                format!("symbol \"{}\" is not a valid C identifier", value.text),
            );
        }
        self.options
            .symbols
            .insert(value.text.clone(), SymbolAction::Undefine);
    }

    fn positional(&mut self, arg: &str, arg_index: usize) {
        self.positional_count += 1;
        match self.positional_count {
            1 => self.input = Some(arg.to_string()),
            2 => {
                if let Some(fo_arg) = self.fo_arg {
                    self.error(
                        arg_index,
                        ArgSpan::default(),
                        "output filename already specified".to_string(),
                    );
                    self.diagnostics.add_cli_note(
                        fo_arg,
                        ArgSpan {
                            prefix_len: 1,
                            name_offset: 1,
                            value_offset: None,
                            point_at_next_arg: false,
                        },
                        "output filename previously specified here".to_string(),
                    );
                } else {
                    self.output_positional = Some(arg.to_string());
                }
            }
            _ => self.error(
                arg_index,
                ArgSpan::default(),
                format!("unexpected argument: {arg}"),
            ),
        }
    }

    fn finish(mut self, args: &[String]) -> Result<Options, ParseArgsError> {
        if self.options.print_help_and_exit {
            return Ok(self.options);
        }
        match self.input {
            Some(input) => {
                if self.options.output_filename.is_empty() {
                    self.options.output_filename = match self.output_positional {
                        Some(output) => output,
                        None => default_output_filename(&input),
                    };
                }
                self.options.input_filename = input;
            }
            None => {
                let arg_index = args.len().saturating_sub(1);
                self.diagnostics.add(diag::Diagnostic {
                    severity: diag::Severity::Error,
                    payload: diag::Payload::Cli(diag::CliDiagnostic {
                        arg_index,
                        arg_span: ArgSpan::default(),
                        message: "missing input filename".to_string(),
                        print_args: false,
                    }),
                });
                self.failed = true;
            }
        }
        if self.failed {
            Err(ParseArgsError)
        } else {
            Ok(self.options)
        }
    }
}

/// Same directory and stem as the input, with a `.res` extension.
fn default_output_filename(input: &str) -> String {
    Path::new(input)
        .with_extension("res")
        .to_string_lossy()
        .into_owned()
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn parse_ok(list: &[&str]) -> Options {
        let mut diagnostics = Diagnostics::new();
        let options = parse_args(&args(list), &mut diagnostics).unwrap();
        assert!(!diagnostics.has_errors());
        options
    }

    fn parse_failing(list: &[&str]) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        let result = parse_args(&args(list), &mut diagnostics);
        assert!(result.is_err());
        assert!(diagnostics.has_errors());
        diagnostics
    }

    #[test]
    fn input_only_derives_output_name() {
        let options = parse_ok(&["resc", "dir/foo.rc"]);
        assert_eq!(options.input_filename, "dir/foo.rc");
        assert_eq!(options.output_filename, "dir/foo.res");
    }

    #[test]
    fn second_positional_is_the_output() {
        let options = parse_ok(&["resc", "foo.rc", "bar.res"]);
        assert_eq!(options.output_filename, "bar.res");
    }

    #[test]
    fn missing_input_is_fatal() {
        let diagnostics = parse_failing(&["resc", "/v"]);
        let diag::Payload::Cli(cli) = &diagnostics.iter().next().unwrap().payload else {
            panic!();
        };
        assert_eq!(cli.message, "missing input filename");
    }

    #[test]
    fn fo_value_concatenated_or_separate() {
        let options = parse_ok(&["resc", "/FObar.res", "foo.rc"]);
        assert_eq!(options.output_filename, "bar.res");
        let options = parse_ok(&["resc", "/fo", "bar.res", "foo.rc"]);
        assert_eq!(options.output_filename, "bar.res");
        let options = parse_ok(&["resc", "--fo", "bar.res", "foo.rc"]);
        assert_eq!(options.output_filename, "bar.res");
    }

    #[test]
    fn packed_single_letter_options() {
        let options = parse_ok(&["resc", "/xvFObar.res", "foo.rc"]);
        assert!(options.ignore_include_env_var);
        assert!(options.verbose);
        assert_eq!(options.output_filename, "bar.res");
    }

    #[test]
    fn fo_conflicts_with_positional_output() {
        let diagnostics = parse_failing(&["resc", "/fo", "a.res", "foo.rc", "b.res"]);
        let messages: Vec<&str> = diagnostics
            .iter()
            .filter_map(|d| match &d.payload {
                diag::Payload::Cli(c) => Some(c.message.as_str()),
                _ => None,
            })
            .collect();
        assert!(messages.contains(&"output filename already specified"));
        assert!(messages.contains(&"output filename previously specified here"));
    }

    #[test]
    fn sl_sets_the_literal_limit() {
        assert_eq!(parse_ok(&["resc", "/sl", "100", "f.rc"]).max_string_literal_codepoints, 8192);
        assert_eq!(parse_ok(&["resc", "/sl", "50", "f.rc"]).max_string_literal_codepoints, 4096);
        assert_eq!(parse_ok(&["resc", "/SL33", "f.rc"]).max_string_literal_codepoints, 2703);
        // Rounds to nearest, never truncates: 66% of 8192 is 5406.72.
        assert_eq!(parse_ok(&["resc", "/sl", "66", "f.rc"]).max_string_literal_codepoints, 5407);
        assert_eq!(parse_ok(&["resc", "/sl", "13", "f.rc"]).max_string_literal_codepoints, 1065);
        assert_eq!(parse_ok(&["resc", "f.rc"]).max_string_literal_codepoints, 8192);
    }

    #[test]
    fn sl_out_of_range_is_an_error_with_note() {
        for bad in ["0", "101", "banana"] {
            let diagnostics = parse_failing(&["resc", "/sl", bad, "f.rc"]);
            assert_eq!(diagnostics.len(), 2);
            let severities: Vec<diag::Severity> =
                diagnostics.iter().map(|d| d.severity).collect();
            assert_eq!(severities, vec![diag::Severity::Error, diag::Severity::Note]);
        }
    }

    #[test]
    fn undefine_is_sticky() {
        let options = parse_ok(&["resc", "/dfoo", "/ufoo", "/dfoo", "foo.rc"]);
        assert_eq!(options.symbols.get("foo"), Some(&SymbolAction::Undefine));
        // But defines of other symbols still land.
        let options = parse_ok(&["resc", "/ufoo", "/dbar=2", "foo.rc"]);
        assert_eq!(
            options.symbols.get("bar"),
            Some(&SymbolAction::Define("2".to_string()))
        );
    }

    #[test]
    fn invalid_define_name_is_a_warning_not_an_error() {
        let mut diagnostics = Diagnostics::new();
        let options = parse_args(&args(&["resc", "/d", "1bad", "foo.rc"]), &mut diagnostics).unwrap();
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 1);
        assert!(options.symbols.contains_key("1bad"));
    }

    #[test]
    fn language_tag_and_id() {
        assert_eq!(parse_ok(&["resc", "/ln", "de-DE", "f.rc"]).default_language_id, Some(0x0407));
        assert_eq!(parse_ok(&["resc", "/l", "409", "f.rc"]).default_language_id, Some(0x409));
        assert_eq!(parse_ok(&["resc", "/l", "0x409", "f.rc"]).default_language_id, Some(0x409));
        let diagnostics = parse_failing(&["resc", "/ln", "invalid", "f.rc"]);
        let diag::Payload::Cli(cli) = &diagnostics.iter().next().unwrap().payload else {
            panic!();
        };
        assert_eq!(cli.message, "invalid language tag: invalid");
    }

    #[test]
    fn code_page_option() {
        assert_eq!(
            parse_ok(&["resc", "/c", "65001", "f.rc"]).default_code_page,
            Some(codepage::CodePage::Utf8)
        );
        parse_failing(&["resc", "/c", "12", "f.rc"]);
        parse_failing(&["resc", "/c", "936", "f.rc"]);
    }

    #[test]
    fn long_options_win_over_packed_letters() {
        let options = parse_ok(&["resc", "/no-preprocess", "/nologo", "f.rc"]);
        assert!(!options.preprocess);
        assert!(options.nologo);
        // and they are not misread as /n /o ...
        assert!(!options.null_terminate_string_table_strings);
    }

    #[test]
    fn case_insensitive_options() {
        let options = parse_ok(&["resc", "/NOLOGO", "/V", "-X", "f.rc"]);
        assert!(options.nologo);
        assert!(options.verbose);
        assert!(options.ignore_include_env_var);
    }

    #[test]
    fn double_dash_ends_options() {
        let options = parse_ok(&["resc", "--", "/v"]);
        assert_eq!(options.input_filename, "/v");
        assert!(!options.verbose);
    }

    #[test]
    fn missing_value_is_an_error() {
        parse_failing(&["resc", "foo.rc", "/fo"]);
    }

    #[test]
    fn unknown_option_is_an_error() {
        parse_failing(&["resc", "/zzz", "foo.rc"]);
    }

    #[test]
    fn include_paths_accumulate() {
        let options = parse_ok(&["resc", "/i", "a", "/Ib", "f.rc"]);
        assert_eq!(options.extra_include_paths, vec!["a", "b"]);
    }
}
