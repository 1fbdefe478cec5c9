use compile::{compile, CompileOptions};
use diag::Diagnostics;
use lex::LexerOptions;
use parse::{parse_file, ParserOptions};

fn compile_src(src: &str) -> Vec<u8> {
    let mut diagnostics = Diagnostics::new();
    let file = parse_file(
        src.as_bytes(),
        LexerOptions::default(),
        ParserOptions::default(),
        &mut diagnostics,
    )
    .unwrap();
    let mut out = Vec::new();
    compile(
        src.as_bytes(),
        &file,
        &CompileOptions::default(),
        &mut diagnostics,
        &mut out,
    )
    .unwrap();
    assert!(!diagnostics.has_errors());
    out
}

/// Split an emitted `.res` into records (dropping the 32-byte preface).
fn records(res: &[u8]) -> Vec<&[u8]> {
    let mut records = Vec::new();
    let mut pos = 0usize;
    while pos < res.len() {
        let data_size = u32::from_le_bytes(res[pos..pos + 4].try_into().unwrap()) as usize;
        let header_size = u32::from_le_bytes(res[pos + 4..pos + 8].try_into().unwrap()) as usize;
        let total = header_size + data_size + compile::res::pad_len(data_size);
        records.push(&res[pos..pos + total]);
        pos += total;
    }
    assert!(records[0].len() == 32, "first record must be the preface");
    records.remove(0);
    records
}

#[test]
fn file_begins_with_the_sentinel_record() {
    let out = compile_src("");
    assert_eq!(out.len(), 32);
    assert_eq!(&out[0..8], &[0, 0, 0, 0, 0x20, 0, 0, 0]);
    assert_eq!(&out[8..16], &[0xFF, 0xFF, 0, 0, 0xFF, 0xFF, 0, 0]);
}

#[test]
fn rcdata_record_layout() {
    // `A RCDATA {1}`: type = ordinal 10, name = "A", dataSize = 2,
    // data = 01 00.
    let out = compile_src("A RCDATA {1}");
    let records = records(&out);
    assert_eq!(records.len(), 1);
    let record = records[0];
    // dataSize
    assert_eq!(&record[0..4], &2u32.to_le_bytes());
    // type: 0xFFFF-prefixed ordinal 10
    assert_eq!(&record[8..12], &[0xFF, 0xFF, 10, 0]);
    // name: "A" NUL-terminated UTF-16
    assert_eq!(&record[12..16], &[b'A', 0, 0, 0]);
    let header_size = u32::from_le_bytes(record[4..8].try_into().unwrap()) as usize;
    // data follows the header, padded to a DWORD boundary
    assert_eq!(&record[header_size..header_size + 2], &[0x01, 0x00]);
    assert_eq!(record.len() % 4, 0);
}

#[test]
fn long_suffix_emits_a_dword() {
    let out = compile_src("A RCDATA { 1L, 2 }");
    let records = records(&out);
    let record = records[0];
    assert_eq!(&record[0..4], &6u32.to_le_bytes());
    let header_size = u32::from_le_bytes(record[4..8].try_into().unwrap()) as usize;
    assert_eq!(
        &record[header_size..header_size + 6],
        &[1, 0, 0, 0, 2, 0]
    );
}

#[test]
fn strings_in_raw_data_keep_their_encoding() {
    let out = compile_src("A RCDATA { \"ab\", L\"c\" }");
    let records = records(&out);
    let record = records[0];
    let header_size = u32::from_le_bytes(record[4..8].try_into().unwrap()) as usize;
    // narrow bytes then UTF-16LE
    assert_eq!(&record[header_size..header_size + 4], &[b'a', b'b', b'c', 0]);
}

#[test]
fn language_statement_scopes_records() {
    let src = "A RCDATA {1}\nLANGUAGE 7, 1\nB RCDATA {1}";
    let out = compile_src(src);
    let records = records(&out);
    assert_eq!(records.len(), 2);
    // dataSize(4) headerSize(4) type(4) name(4) dataVersion(4) memflags(2),
    // then the language id; fixed offsets since type and name are ordinals
    // or single characters here.
    let lang_of = |record: &[u8]| u16::from_le_bytes(record[22..24].try_into().unwrap());
    // default en-US
    assert_eq!(lang_of(records[0]), 0x0409);
    assert_eq!(lang_of(records[1]), (1 << 10) | 7);
}

#[test]
fn resource_level_language_overrides() {
    let out = compile_src("A RCDATA LANGUAGE 9, 2 {1}");
    let records = records(&out);
    assert_eq!(
        u16::from_le_bytes(records[0][22..24].try_into().unwrap()),
        0x0809
    );
}

#[test]
fn user_defined_type_name_is_uppercased() {
    let out = compile_src("1 mydata { 0 }");
    let records = records(&out);
    let record = records[0];
    // type: "MYDATA" as UTF-16LE
    let expected: Vec<u8> = "MYDATA\0"
        .encode_utf16()
        .flat_map(|u| u.to_le_bytes())
        .collect();
    assert_eq!(&record[8..8 + expected.len()], &expected[..]);
}

#[test]
fn numeric_type_six_is_rejected() {
    let src = "1 6 { \"s\" }";
    let mut diagnostics = Diagnostics::new();
    let file = parse_file(
        src.as_bytes(),
        LexerOptions::default(),
        ParserOptions::default(),
        &mut diagnostics,
    )
    .unwrap();
    let mut out = Vec::new();
    let result = compile(
        src.as_bytes(),
        &file,
        &CompileOptions::default(),
        &mut diagnostics,
        &mut out,
    );
    assert!(result.is_err());
    assert!(diagnostics.has_errors());
    // error + explanatory note
    assert_eq!(diagnostics.len(), 2);
}
