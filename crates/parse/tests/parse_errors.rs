use diag::{Diagnostics, ErrorCode, Payload, Severity};
use lex::LexerOptions;
use parse::{parse_file, ParserOptions};

fn parse_err(src: &str) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let result = parse_file(
        src.as_bytes(),
        LexerOptions::default(),
        ParserOptions::default(),
        &mut diagnostics,
    );
    assert!(result.is_err(), "expected parse failure for {src:?}");
    assert!(diagnostics.has_errors());
    diagnostics
}

fn codes(diagnostics: &Diagnostics) -> Vec<ErrorCode> {
    diagnostics
        .iter()
        .filter_map(|d| match &d.payload {
            Payload::Source(s) => Some(s.code),
            Payload::Cli(_) => None,
        })
        .collect()
}

#[test]
fn unfinished_raw_data_block() {
    let diagnostics = parse_err("A RCDATA { 1, 2");
    assert_eq!(codes(&diagnostics), vec![ErrorCode::UnfinishedRawDataBlock]);
}

#[test]
fn unfinished_string_table_block() {
    let diagnostics = parse_err("STRINGTABLE BEGIN 1 \"one\"");
    assert_eq!(
        codes(&diagnostics),
        vec![ErrorCode::UnfinishedStringTableBlock]
    );
}

#[test]
fn icon_with_raw_data_block() {
    let diagnostics = parse_err("1 ICON { 0x00 }");
    assert_eq!(
        codes(&diagnostics),
        vec![ErrorCode::ResourceTypeCantUseRawData]
    );
}

#[test]
fn font_name_must_be_ordinal() {
    let diagnostics = parse_err("myfont FONT \"font.fnt\"");
    assert_eq!(codes(&diagnostics), vec![ErrorCode::IdMustBeOrdinal]);
}

#[test]
fn stringtable_id_must_be_ordinal() {
    let diagnostics = parse_err("STRINGTABLE { \"no id\" }");
    assert!(codes(&diagnostics).contains(&ErrorCode::IdMustBeOrdinal));
}

#[test]
fn expected_token_reports_the_actual_token() {
    let diagnostics = parse_err("LANGUAGE 9 9");
    assert_eq!(codes(&diagnostics), vec![ErrorCode::ExpectedToken]);
}

#[test]
fn recovery_continues_past_a_bad_statement() {
    // The second definition is still parsed (and is fine); the parse as a
    // whole fails because an error was recorded.
    let src = "A RCDATA ( }\nB RCDATA { 1 }";
    let diagnostics = parse_err(src);
    assert_eq!(diagnostics.len(), 1);
}

#[test]
fn error_collection_is_bounded() {
    // A pile of bad top-level statements must not produce unbounded
    // diagnostics.
    let src = ", , , , , , , , , , , , , , , , , , , , , , , , , , , , , ,";
    let diagnostics = parse_err(src);
    assert!(diagnostics.len() <= 20);
}

#[test]
fn lex_errors_flow_through_as_diagnostics() {
    let diagnostics = parse_err("A RCDATA { \"abc }");
    assert_eq!(codes(&diagnostics), vec![ErrorCode::UnfinishedStringLiteral]);
}

#[test]
fn invalid_code_page_pragma_demoted_by_option() {
    let mut diagnostics = Diagnostics::new();
    let src = "#pragma code_page(99999)\nA RCDATA { 1 }";
    let result = parse_file(
        src.as_bytes(),
        LexerOptions::default(),
        ParserOptions {
            warn_instead_of_error_on_invalid_code_page: true,
        },
        &mut diagnostics,
    );
    assert!(result.is_ok());
    assert!(!diagnostics.has_errors());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.iter().next().unwrap().severity, Severity::Warning);
}
