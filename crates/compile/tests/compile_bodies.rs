use compile::{compile, CompileOptions};
use diag::{Diagnostics, ErrorCode, Payload};
use lex::LexerOptions;
use parse::{parse_file, ParserOptions};

fn compile_src(src: &str) -> (Vec<u8>, Diagnostics) {
    compile_with(src, &CompileOptions::default())
}

fn compile_with(src: &str, options: &CompileOptions) -> (Vec<u8>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let file = parse_file(
        src.as_bytes(),
        LexerOptions::default(),
        ParserOptions::default(),
        &mut diagnostics,
    )
    .unwrap();
    let mut out = Vec::new();
    let _ = compile(src.as_bytes(), &file, options, &mut diagnostics, &mut out);
    (out, diagnostics)
}

/// Data of the first record after the preface.
fn first_data(res: &[u8]) -> Vec<u8> {
    let mut pos = 32;
    let data_size = u32::from_le_bytes(res[pos..pos + 4].try_into().unwrap()) as usize;
    let header_size = u32::from_le_bytes(res[pos + 4..pos + 8].try_into().unwrap()) as usize;
    pos += header_size;
    res[pos..pos + data_size].to_vec()
}

#[test]
fn dialog_template_header() {
    let src = "1 DIALOG 1, 2, 3, 4\nCAPTION \"Hi\"\nFONT 8, \"Tahoma\"\nBEGIN\nEND";
    let (out, diagnostics) = compile_src(src);
    assert!(!diagnostics.has_errors());
    let data = first_data(&out);
    let style = u32::from_le_bytes(data[0..4].try_into().unwrap());
    // defaults | WS_CAPTION | DS_SETFONT
    assert_eq!(style, 0x8088_0000 | 0x00C0_0000 | 0x40);
    // no controls
    assert_eq!(u16::from_le_bytes(data[8..10].try_into().unwrap()), 0);
    // x y cx cy
    assert_eq!(i16::from_le_bytes(data[10..12].try_into().unwrap()), 1);
    assert_eq!(i16::from_le_bytes(data[16..18].try_into().unwrap()), 4);
    // menu 0, class 0
    assert_eq!(&data[18..22], &[0, 0, 0, 0]);
    // caption "Hi"
    assert_eq!(&data[22..28], &[b'H', 0, b'i', 0, 0, 0]);
    // font point size
    assert_eq!(u16::from_le_bytes(data[28..30].try_into().unwrap()), 8);
}

#[test]
fn dialogex_template_signature() {
    let src = "1 DIALOGEX 0, 0, 10, 10, 55\nBEGIN\nEND";
    let (out, diagnostics) = compile_src(src);
    assert!(!diagnostics.has_errors());
    let data = first_data(&out);
    assert_eq!(u16::from_le_bytes(data[0..2].try_into().unwrap()), 1);
    assert_eq!(u16::from_le_bytes(data[2..4].try_into().unwrap()), 0xFFFF);
    assert_eq!(u32::from_le_bytes(data[4..8].try_into().unwrap()), 55);
}

#[test]
fn control_item_layout() {
    let src = "1 DIALOG 0, 0, 100, 50\nBEGIN\n  DEFPUSHBUTTON \"OK\", 1, 10, 20, 30, 14\nEND";
    let (out, diagnostics) = compile_src(src);
    assert!(!diagnostics.has_errors());
    let data = first_data(&out);
    assert_eq!(u16::from_le_bytes(data[8..10].try_into().unwrap()), 1);
    // Header: style(4) exstyle(4) cdit(2) x y cx cy (8) menu(2) class(2)
    // title(2, empty) = 24 bytes, then DWORD padding before the item.
    let item = 24 + compile::res::pad_len(24);
    let style = u32::from_le_bytes(data[item..item + 4].try_into().unwrap());
    // WS_CHILD | WS_VISIBLE | WS_TABSTOP | BS_DEFPUSHBUTTON
    assert_eq!(style, 0x5001_0001);
    let x = i16::from_le_bytes(data[item + 8..item + 10].try_into().unwrap());
    assert_eq!(x, 10);
    let id = u16::from_le_bytes(data[item + 16..item + 18].try_into().unwrap());
    assert_eq!(id, 1);
    // class: button ordinal
    assert_eq!(&data[item + 18..item + 22], &[0xFF, 0xFF, 0x80, 0]);
    // title "OK"
    assert_eq!(&data[item + 22..item + 28], &[b'O', 0, b'K', 0, 0, 0]);
}

#[test]
fn duplicate_control_ids_warn_unless_silenced() {
    let src = "1 DIALOG 0, 0, 10, 10\nBEGIN\n  EDITTEXT 5, 0, 0, 1, 1\n  EDITTEXT 5, 0, 2, 1, 1\nEND";
    let (_, diagnostics) = compile_src(src);
    assert!(!diagnostics.has_errors());
    let codes: Vec<ErrorCode> = diagnostics
        .iter()
        .filter_map(|d| match &d.payload {
            Payload::Source(s) => Some(s.code),
            _ => None,
        })
        .collect();
    assert_eq!(
        codes,
        vec![
            ErrorCode::ControlIdAlreadyDefined,
            ErrorCode::ControlIdAlreadyDefined,
        ]
    );

    let options = CompileOptions {
        silence_duplicate_control_ids: true,
        ..Default::default()
    };
    let (_, diagnostics) = compile_with(src, &options);
    assert!(diagnostics.is_empty());
}

#[test]
fn menu_records_nest_and_terminate() {
    let src = "1 MENU\nBEGIN\n  POPUP \"&File\"\n  BEGIN\n    MENUITEM \"Open\", 10\n  END\nEND";
    let (out, diagnostics) = compile_src(src);
    assert!(!diagnostics.has_errors());
    let data = first_data(&out);
    // MENUHEADER: version 0, headerSize 0
    assert_eq!(&data[0..4], &[0, 0, 0, 0]);
    // POPUP is the last top-level item: MF_POPUP | MF_END
    let flags = u16::from_le_bytes(data[4..6].try_into().unwrap());
    assert_eq!(flags, 0x0010 | 0x0080);
    // "&File" text follows (popups carry no id field)
    assert_eq!(u16::from_le_bytes(data[6..8].try_into().unwrap()), u16::from(b'&'));
    // After the NUL-terminated text: the nested MENUITEM, MF_END, id 10.
    let text_end = 6 + 2 * 6; // "&File" + NUL
    let item_flags = u16::from_le_bytes(data[text_end..text_end + 2].try_into().unwrap());
    assert_eq!(item_flags, 0x0080);
    let item_id = u16::from_le_bytes(data[text_end + 2..text_end + 4].try_into().unwrap());
    assert_eq!(item_id, 10);
}

#[test]
fn accelerator_table_marks_the_last_entry() {
    let src = "1 ACCELERATORS\nBEGIN\n  \"^A\", 10\n  66, 11, VIRTKEY, CONTROL\nEND";
    let (out, diagnostics) = compile_src(src);
    assert!(!diagnostics.has_errors());
    let data = first_data(&out);
    assert_eq!(data.len(), 16);
    // entry 0: no flags, ^A = 0x01
    assert_eq!(u16::from_le_bytes(data[0..2].try_into().unwrap()), 0);
    assert_eq!(u16::from_le_bytes(data[2..4].try_into().unwrap()), 0x01);
    assert_eq!(u16::from_le_bytes(data[4..6].try_into().unwrap()), 10);
    // entry 1: FVIRTKEY | FCONTROL | end marker
    assert_eq!(
        u16::from_le_bytes(data[8..10].try_into().unwrap()),
        0x01 | 0x08 | 0x80
    );
    assert_eq!(u16::from_le_bytes(data[10..12].try_into().unwrap()), 66);
}

#[test]
fn versioninfo_fixed_file_info() {
    let src = "1 VERSIONINFO\nFILEVERSION 1, 2, 3, 4\nBEGIN\nEND";
    let (out, diagnostics) = compile_src(src);
    assert!(!diagnostics.has_errors());
    let data = first_data(&out);
    // wLength covers the whole tree.
    assert_eq!(
        u16::from_le_bytes(data[0..2].try_into().unwrap()) as usize,
        data.len()
    );
    // wValueLength = 52 (VS_FIXEDFILEINFO), wType = 0
    assert_eq!(u16::from_le_bytes(data[2..4].try_into().unwrap()), 52);
    assert_eq!(u16::from_le_bytes(data[4..6].try_into().unwrap()), 0);
    // szKey
    let key: Vec<u16> = "VS_VERSION_INFO".encode_utf16().collect();
    let key_bytes: Vec<u8> = key.iter().flat_map(|u| u.to_le_bytes()).collect();
    assert_eq!(&data[6..6 + key_bytes.len()], &key_bytes[..]);
    // Fixed info signature, aligned after the key.
    let value_start = {
        let end = 6 + key_bytes.len() + 2;
        end + compile::res::pad_len(end)
    };
    assert_eq!(
        u32::from_le_bytes(data[value_start..value_start + 4].try_into().unwrap()),
        0xFEEF_04BD
    );
    let version_ms = u32::from_le_bytes(data[value_start + 8..value_start + 12].try_into().unwrap());
    assert_eq!(version_ms, (1 << 16) | 2);
}

#[test]
fn icon_file_produces_children_and_group() {
    let dir = std::env::temp_dir().join("resc-icon-test");
    std::fs::create_dir_all(&dir).unwrap();
    let ico_path = dir.join("two.ico");
    // Two 4-byte fake images; structure is all the compiler reads.
    let mut ico: Vec<u8> = Vec::new();
    ico.extend_from_slice(&0u16.to_le_bytes()); // reserved
    ico.extend_from_slice(&1u16.to_le_bytes()); // type: icon
    ico.extend_from_slice(&2u16.to_le_bytes()); // count
    for i in 0..2u8 {
        ico.extend_from_slice(&[16, 16, 0, 0]); // w h colors reserved
        ico.extend_from_slice(&1u16.to_le_bytes()); // planes
        ico.extend_from_slice(&32u16.to_le_bytes()); // bitcount
        ico.extend_from_slice(&4u32.to_le_bytes()); // bytes
        ico.extend_from_slice(&(38 + 4 * u32::from(i)).to_le_bytes()); // offset
    }
    ico.extend_from_slice(&[0xAA; 4]);
    ico.extend_from_slice(&[0xBB; 4]);
    std::fs::write(&ico_path, &ico).unwrap();

    let src = format!("1 ICON \"{}\"", ico_path.display().to_string().replace('\\', "\\\\"));
    let options = CompileOptions {
        search_paths: vec![std::path::PathBuf::from(".")],
        ..Default::default()
    };
    let (out, diagnostics) = compile_with(&src, &options);
    assert!(!diagnostics.has_errors(), "{diagnostics:?}");

    // Walk records: two RT_ICON children then one RT_GROUP_ICON.
    let mut pos = 32usize;
    let mut types = Vec::new();
    while pos < out.len() {
        let data_size = u32::from_le_bytes(out[pos..pos + 4].try_into().unwrap()) as usize;
        let header_size = u32::from_le_bytes(out[pos + 4..pos + 8].try_into().unwrap()) as usize;
        types.push(u16::from_le_bytes(out[pos + 10..pos + 12].try_into().unwrap()));
        pos += header_size + data_size + compile::res::pad_len(data_size);
    }
    assert_eq!(types, vec![3, 3, 14]);
}

#[test]
fn missing_file_reports_unable_to_open() {
    let (_, diagnostics) = compile_src("1 ICON \"definitely-not-here.ico\"");
    assert!(diagnostics.has_errors());
    let Payload::Source(s) = &diagnostics.iter().next().unwrap().payload else {
        panic!();
    };
    assert_eq!(s.code, ErrorCode::UnableToOpenFile);
}
