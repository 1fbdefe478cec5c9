//! AST -> `.res` compilation.
//!
//! Walks resource definitions in source order, resolves code-page-
//! dependent string encoding, numbers icon/cursor images, groups string
//! table entries into bundles of 16, and emits DWORD-aligned records.

pub mod lang;
pub mod literals;
pub mod res;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use diag::{Diagnostics, ErrorCode, ErrorExtra};
use lex::keywords::{eq_ignore_case, ResourceType};
use lex::{Token, TokenId};
use parse::ast::*;

use res::{memory_flags, NameOrOrdinal, ResourceHeader};

// Window and dialog style bits the serializers need.
const WS_VISIBLE: u32 = 0x1000_0000;
const WS_CHILD: u32 = 0x4000_0000;
const WS_POPUP: u32 = 0x8000_0000;
const WS_BORDER: u32 = 0x0080_0000;
const WS_CAPTION: u32 = 0x00C0_0000;
const WS_SYSMENU: u32 = 0x0008_0000;
const WS_GROUP: u32 = 0x0002_0000;
const WS_TABSTOP: u32 = 0x0001_0000;
const DS_SETFONT: u32 = 0x40;

const MF_POPUP: u16 = 0x0010;
const MF_END: u16 = 0x0080;
const MFT_SEPARATOR: u32 = 0x0800;

/// Compile errors are recorded as diagnostics; the sentinel halts the
/// pipeline without carrying a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileError;

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compile error")
    }
}

impl std::error::Error for CompileError {}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub default_language: u16,
    /// `/n`: append a terminating NUL to every non-empty STRINGTABLE
    /// entry (counted in the length prefix).
    pub null_terminate_string_table_strings: bool,
    /// `/y`: keep quiet about duplicate control ids in dialogs.
    pub silence_duplicate_control_ids: bool,
    /// Directories searched for file-based resources, in order.
    pub search_paths: Vec<PathBuf>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            default_language: lang::DEFAULT_LANGUAGE_ID,
            null_terminate_string_table_strings: false,
            silence_duplicate_control_ids: false,
            search_paths: vec![PathBuf::from(".")],
        }
    }
}

pub fn compile(
    source: &[u8],
    file: &RcFile,
    options: &CompileOptions,
    diagnostics: &mut Diagnostics,
    out: &mut Vec<u8>,
) -> Result<(), CompileError> {
    let had_errors = diagnostics.has_errors();
    let mut compiler = Compiler {
        source,
        options,
        diagnostics,
        language: options.default_language,
        version: 0,
        characteristics: 0,
        string_tables: BTreeMap::new(),
        next_image_id: 1,
        failed: false,
    };

    res::write_preface(out);
    for statement in &file.statements {
        match statement {
            TopLevelStatement::Language(language) => compiler.language = language.id(),
            TopLevelStatement::Version(version) => compiler.version = *version,
            TopLevelStatement::Characteristics(value) => compiler.characteristics = *value,
            TopLevelStatement::StringTable(table) => compiler.add_string_table(table),
            TopLevelStatement::Resource(def) => compiler.compile_resource(def, out)?,
        }
    }
    compiler.flush_string_tables(out);

    if compiler.failed || (!had_errors && compiler.diagnostics.has_errors()) {
        Err(CompileError)
    } else {
        Ok(())
    }
}

struct StringSlot {
    token: Token,
    string: StringLiteral,
}

struct Bundle {
    memory_flags: u16,
    version: u32,
    characteristics: u32,
    strings: [Option<StringSlot>; 16],
}

struct Compiler<'a, 'd> {
    source: &'a [u8],
    options: &'a CompileOptions,
    diagnostics: &'d mut Diagnostics,
    language: u16,
    version: u32,
    characteristics: u32,
    // (language, bundle index) -> 16 slots; BTreeMap iteration gives the
    // deterministic flush order.
    string_tables: BTreeMap<(u16, u32), Bundle>,
    next_image_id: u16,
    failed: bool,
}

impl Compiler<'_, '_> {
    fn slice(&self, token: Token) -> &[u8] {
        token.slice(self.source)
    }

    fn error(&mut self, code: ErrorCode, token: Token, extra: ErrorExtra) {
        self.diagnostics.add_error(code, token, extra);
        self.failed = true;
    }

    fn resolve_name(&self, token: Token) -> NameOrOrdinal {
        match token.id {
            TokenId::Number => {
                NameOrOrdinal::Ordinal(lex::parse_number_literal(self.slice(token)).value as u16)
            }
            TokenId::QuotedAsciiString | TokenId::QuotedWideString => {
                let units = literals::parse_to_utf16(self.slice(token), codepage::CodePage::Windows1252);
                NameOrOrdinal::Name(
                    units
                        .into_iter()
                        .map(|u| {
                            if (u as u8).is_ascii_lowercase() && u < 0x80 {
                                u - 0x20
                            } else {
                                u
                            }
                        })
                        .collect(),
                )
            }
            _ => NameOrOrdinal::from_name_bytes(self.slice(token), codepage::CodePage::Windows1252),
        }
    }

    fn apply_memory_flags(default: u16, explicit: &[MemoryFlag]) -> u16 {
        let mut flags = default;
        for flag in explicit {
            match flag {
                MemoryFlag::Moveable => flags |= memory_flags::MOVEABLE,
                MemoryFlag::Fixed => flags &= !(memory_flags::MOVEABLE | memory_flags::DISCARDABLE),
                MemoryFlag::Pure | MemoryFlag::Shared => flags |= memory_flags::PURE,
                MemoryFlag::Impure | MemoryFlag::Nonshared => flags &= !memory_flags::PURE,
                MemoryFlag::Preload => flags |= memory_flags::PRELOAD,
                MemoryFlag::Loadoncall => flags &= !memory_flags::PRELOAD,
                MemoryFlag::Discardable => flags |= memory_flags::DISCARDABLE,
            }
        }
        flags
    }

    fn default_memory_flags(type_: Option<ResourceType>) -> u16 {
        use memory_flags::*;
        match type_ {
            Some(ResourceType::Icon | ResourceType::Cursor) => MOVEABLE | DISCARDABLE,
            Some(
                ResourceType::GroupIcon
                | ResourceType::GroupCursor
                | ResourceType::Menu
                | ResourceType::MenuEx
                | ResourceType::Dialog
                | ResourceType::DialogEx
                | ResourceType::StringTable
                | ResourceType::FontDir
                | ResourceType::Font
                | ResourceType::Accelerators,
            ) => MOVEABLE | PURE | DISCARDABLE,
            _ => MOVEABLE | PURE,
        }
    }

    fn header_for(
        &self,
        def: &ResourceDef,
        type_: NameOrOrdinal,
        default_flags: u16,
    ) -> ResourceHeader {
        ResourceHeader {
            type_,
            name: self.resolve_name(def.name_token),
            data_version: 0,
            memory_flags: Self::apply_memory_flags(default_flags, &def.common.memory_flags),
            language: def.common.language.map(Language::id).unwrap_or(self.language),
            version: def.common.version.unwrap_or(self.version),
            characteristics: def.common.characteristics.unwrap_or(self.characteristics),
        }
    }

    fn compile_resource(&mut self, def: &ResourceDef, out: &mut Vec<u8>) -> Result<(), CompileError> {
        let predefined = match def.type_ {
            TypeSpec::Predefined { type_, token } => {
                if type_ == ResourceType::StringTable {
                    // Numeric type 6: RT_STRING records can only come from
                    // STRINGTABLE statements.
                    self.error(ErrorCode::StringResourceAsNumericType, token, ErrorExtra::None);
                    self.diagnostics.add_note(
                        ErrorCode::StringResourceAsNumericType,
                        token,
                        ErrorExtra::None,
                    );
                    return Ok(());
                }
                Some(type_)
            }
            _ => None,
        };

        let type_field = match def.type_ {
            TypeSpec::Predefined { type_, .. } => NameOrOrdinal::Ordinal(type_.ordinal()),
            TypeSpec::UserDefinedOrdinal { value, .. } => NameOrOrdinal::Ordinal(value),
            TypeSpec::UserDefinedName(token) => self.resolve_name(token),
        };

        // Icon and cursor files expand into several records.
        if matches!(predefined, Some(ResourceType::Icon | ResourceType::Cursor)) {
            if let ResourceBody::FileName(file_token) = &def.body {
                let is_cursor = predefined == Some(ResourceType::Cursor);
                return self.compile_icon_or_cursor(def, *file_token, is_cursor, out);
            }
        }

        let data = match &def.body {
            ResourceBody::RawData(entries) => self.encode_raw_data(entries),
            ResourceBody::FileName(token) => {
                let bytes = self.read_file(*token)?;
                match predefined {
                    Some(ResourceType::Bitmap) => self.strip_bitmap_file_header(*token, bytes)?,
                    _ => bytes,
                }
            }
            ResourceBody::Dialog(dialog) => self.serialize_dialog(dialog),
            ResourceBody::Menu(menu) => Self::serialize_menu(self.source, menu),
            ResourceBody::Accelerators(entries) => self.serialize_accelerators(entries),
            ResourceBody::VersionInfo(info) => self.serialize_version_info(info),
        };

        let header = self.header_for(def, type_field, Self::default_memory_flags(predefined));
        res::write_record(out, &header, &data);
        Ok(())
    }

    fn encode_raw_data(&self, entries: &[DataEntry]) -> Vec<u8> {
        let mut data = Vec::new();
        for entry in entries {
            match entry {
                DataEntry::Number(number) => {
                    if number.is_long {
                        data.extend_from_slice(&number.value.to_le_bytes());
                    } else {
                        data.extend_from_slice(&(number.value as u16).to_le_bytes());
                    }
                }
                DataEntry::String(literal) => {
                    let slice = self.slice(literal.token);
                    if literal.is_wide() {
                        data.extend_from_slice(&literals::parse_to_wide_bytes(
                            slice,
                            literal.code_page,
                        ));
                    } else {
                        data.extend_from_slice(&literals::parse_to_bytes(slice, literal.code_page));
                    }
                }
            }
        }
        data
    }

    fn filename_text(&self, token: Token) -> String {
        if token.is_string_literal() {
            literals::parse_to_string(self.slice(token), codepage::CodePage::Windows1252)
        } else {
            String::from_utf8_lossy(self.slice(token)).into_owned()
        }
    }

    fn read_file(&mut self, token: Token) -> Result<Vec<u8>, CompileError> {
        let name = self.filename_text(token);
        let path = Path::new(&name);
        if path.is_absolute() {
            if let Ok(bytes) = std::fs::read(path) {
                return Ok(bytes);
            }
        } else {
            for dir in &self.options.search_paths {
                if let Ok(bytes) = std::fs::read(dir.join(path)) {
                    return Ok(bytes);
                }
            }
        }
        self.error(ErrorCode::UnableToOpenFile, token, ErrorExtra::None);
        Err(CompileError)
    }

    fn strip_bitmap_file_header(
        &mut self,
        token: Token,
        bytes: Vec<u8>,
    ) -> Result<Vec<u8>, CompileError> {
        if bytes.len() < 14 || &bytes[0..2] != b"BM" {
            self.error(ErrorCode::InvalidFileFormat, token, ErrorExtra::None);
            return Err(CompileError);
        }
        Ok(bytes[14..].to_vec())
    }

    // ICONDIR parsing shared by .ico and .cur. Each image becomes one
    // RT_ICON/RT_CURSOR record; the group record references them by the
    // ordinals handed out here.
    fn compile_icon_or_cursor(
        &mut self,
        def: &ResourceDef,
        file_token: Token,
        is_cursor: bool,
        out: &mut Vec<u8>,
    ) -> Result<(), CompileError> {
        let bytes = self.read_file(file_token)?;
        let invalid = |c: &mut Self| {
            c.error(ErrorCode::InvalidFileFormat, file_token, ErrorExtra::None);
            Err(CompileError)
        };
        if bytes.len() < 6 {
            return invalid(self);
        }
        let dir_type = u16::from_le_bytes([bytes[2], bytes[3]]);
        let expected_type = if is_cursor { 2 } else { 1 };
        if u16::from_le_bytes([bytes[0], bytes[1]]) != 0 || dir_type != expected_type {
            return invalid(self);
        }
        let count = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;
        if bytes.len() < 6 + count * 16 {
            return invalid(self);
        }

        struct DirEntry {
            width: u8,
            height: u8,
            color_count: u8,
            planes: u16,
            bit_count: u16,
            bytes_in_res: u32,
            offset: u32,
            id: u16,
        }

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let e = &bytes[6 + i * 16..6 + (i + 1) * 16];
            entries.push(DirEntry {
                width: e[0],
                height: e[1],
                color_count: e[2],
                planes: u16::from_le_bytes([e[4], e[5]]),
                bit_count: u16::from_le_bytes([e[6], e[7]]),
                bytes_in_res: u32::from_le_bytes([e[8], e[9], e[10], e[11]]),
                offset: u32::from_le_bytes([e[12], e[13], e[14], e[15]]),
                id: 0,
            });
        }

        let language = def.common.language.map(Language::id).unwrap_or(self.language);
        let child_type = if is_cursor { 1u16 } else { 3u16 };

        for entry in &mut entries {
            let start = entry.offset as usize;
            let end = start + entry.bytes_in_res as usize;
            if end > bytes.len() || start > end {
                return invalid(self);
            }
            let image = &bytes[start..end];
            entry.id = self.next_image_id;
            self.next_image_id += 1;

            let mut data = Vec::with_capacity(image.len() + 4);
            if is_cursor {
                // In a .cur directory the planes/bit_count fields hold the
                // hotspot; it becomes the LOCALHEADER prefix of the data.
                put_u16(&mut data, entry.planes);
                put_u16(&mut data, entry.bit_count);
            }
            data.extend_from_slice(image);

            let header = ResourceHeader {
                type_: NameOrOrdinal::Ordinal(child_type),
                name: NameOrOrdinal::Ordinal(entry.id),
                data_version: 0,
                memory_flags: memory_flags::MOVEABLE | memory_flags::DISCARDABLE,
                language,
                version: def.common.version.unwrap_or(self.version),
                characteristics: def.common.characteristics.unwrap_or(self.characteristics),
            };
            res::write_record(out, &header, &data);
        }

        // The group record's entries mirror the ICONDIR but reference the
        // just-written records by id.
        let mut group = Vec::with_capacity(6 + count * 14);
        put_u16(&mut group, 0);
        put_u16(&mut group, dir_type);
        put_u16(&mut group, count as u16);
        for entry in &entries {
            if is_cursor {
                let (planes, bit_count) = dib_planes_and_bit_count(
                    &bytes[entry.offset as usize..(entry.offset + entry.bytes_in_res) as usize],
                );
                put_u16(&mut group, entry.width as u16);
                // Cursor group entries store the combined XOR+AND mask
                // height.
                put_u16(&mut group, (entry.height as u16) * 2);
                put_u16(&mut group, planes);
                put_u16(&mut group, bit_count);
                put_u32(&mut group, entry.bytes_in_res + 4);
            } else {
                group.push(entry.width);
                group.push(entry.height);
                group.push(entry.color_count);
                group.push(0);
                put_u16(&mut group, entry.planes);
                put_u16(&mut group, entry.bit_count);
                put_u32(&mut group, entry.bytes_in_res);
            }
            put_u16(&mut group, entry.id);
        }

        let group_type = if is_cursor { ResourceType::GroupCursor } else { ResourceType::GroupIcon };
        let header = self.header_for(
            def,
            NameOrOrdinal::Ordinal(group_type.ordinal()),
            Self::default_memory_flags(Some(group_type)),
        );
        res::write_record(out, &header, &group);
        Ok(())
    }

    fn serialize_dialog(&mut self, dialog: &Dialog) -> Vec<u8> {
        let default_style = WS_POPUP | WS_BORDER | WS_SYSMENU;
        let mut style = dialog
            .style
            .as_ref()
            .map(|s| s.evaluate(default_style))
            .unwrap_or(default_style);
        if dialog.caption.is_some() {
            style |= WS_CAPTION;
        }
        if dialog.font.is_some() {
            style |= DS_SETFONT;
        }
        let exstyle = dialog.exstyle.as_ref().map(|s| s.evaluate(0)).unwrap_or(0);

        let mut data = Vec::new();
        if dialog.ex {
            put_u16(&mut data, 1); // dlgVer
            put_u16(&mut data, 0xFFFF); // signature
            put_u32(&mut data, dialog.help_id.unwrap_or(0));
            put_u32(&mut data, exstyle);
            put_u32(&mut data, style);
        } else {
            put_u32(&mut data, style);
            put_u32(&mut data, exstyle);
        }
        put_u16(&mut data, dialog.controls.len() as u16);
        put_i16(&mut data, dialog.x);
        put_i16(&mut data, dialog.y);
        put_i16(&mut data, dialog.width);
        put_i16(&mut data, dialog.height);
        self.write_name_value(&mut data, dialog.menu.as_ref());
        self.write_name_value(&mut data, dialog.class.as_ref());
        match &dialog.caption {
            Some(caption) => {
                write_utf16_z(&mut data, &literals::parse_to_utf16(self.slice(caption.token), caption.code_page));
            }
            None => put_u16(&mut data, 0),
        }
        if let Some(font) = &dialog.font {
            put_u16(&mut data, font.point_size);
            if dialog.ex {
                put_u16(&mut data, font.weight);
                data.push(u8::from(font.italic));
                data.push(font.charset);
            }
            write_utf16_z(&mut data, &literals::parse_to_utf16(self.slice(font.typeface.token), font.typeface.code_page));
        }

        let mut seen_ids: HashMap<u32, Token> = HashMap::new();
        for control in &dialog.controls {
            if !self.options.silence_duplicate_control_ids {
                if let Some(&prior) = seen_ids.get(&control.id) {
                    self.diagnostics.add_warning(
                        ErrorCode::ControlIdAlreadyDefined,
                        control.id_token,
                        ErrorExtra::Number(control.id),
                    );
                    self.diagnostics.add_note(
                        ErrorCode::ControlIdAlreadyDefined,
                        prior,
                        ErrorExtra::Number(control.id),
                    );
                }
            }
            seen_ids.entry(control.id).or_insert(control.id_token);
            self.serialize_control(&mut data, control, dialog.ex);
        }
        data
    }

    fn write_name_value(&self, data: &mut Vec<u8>, value: Option<&NameValue>) {
        match value {
            None => put_u16(data, 0),
            Some(NameValue::Ordinal(ordinal)) => {
                put_u16(data, 0xFFFF);
                put_u16(data, *ordinal);
            }
            Some(NameValue::String(literal)) => {
                write_utf16_z(
                    data,
                    &literals::parse_to_utf16(self.slice(literal.token), literal.code_page),
                );
            }
            Some(NameValue::Ident(token)) => {
                let NameOrOrdinal::Name(units) =
                    NameOrOrdinal::from_name_bytes(self.slice(*token), codepage::CodePage::Windows1252)
                else {
                    unreachable!("from_name_bytes always builds a name");
                };
                write_utf16_z(data, &units);
            }
        }
    }

    fn serialize_control(&mut self, data: &mut Vec<u8>, control: &Control, ex: bool) {
        res::pad_to_dword(data);
        let style = control
            .style
            .as_ref()
            .map(|s| s.evaluate(default_control_style(control.kind)))
            .unwrap_or_else(|| default_control_style(control.kind));
        let exstyle = control.exstyle.as_ref().map(|s| s.evaluate(0)).unwrap_or(0);
        if ex {
            put_u32(data, control.help_id.unwrap_or(0));
            put_u32(data, exstyle);
            put_u32(data, style);
        } else {
            put_u32(data, style);
            put_u32(data, exstyle);
        }
        put_i16(data, control.x);
        put_i16(data, control.y);
        put_i16(data, control.width);
        put_i16(data, control.height);
        if ex {
            put_u32(data, control.id);
        } else {
            put_u16(data, control.id as u16);
        }

        match (&control.class, control.kind) {
            (Some(class), _) => match class {
                ControlClass::Ordinal(ordinal) => {
                    put_u16(data, 0xFFFF);
                    put_u16(data, *ordinal);
                }
                ControlClass::Name(literal) => {
                    let units =
                        literals::parse_to_utf16(self.slice(literal.token), literal.code_page);
                    match class_ordinal_from_units(&units) {
                        Some(ordinal) => {
                            put_u16(data, 0xFFFF);
                            put_u16(data, ordinal);
                        }
                        None => write_utf16_z(data, &units),
                    }
                }
                ControlClass::Ident(token) => {
                    let slice = self.slice(*token);
                    match class_ordinal_from_ident(slice) {
                        Some(ordinal) => {
                            put_u16(data, 0xFFFF);
                            put_u16(data, ordinal);
                        }
                        None => {
                            let NameOrOrdinal::Name(units) = NameOrOrdinal::from_name_bytes(
                                slice,
                                codepage::CodePage::Windows1252,
                            ) else {
                                unreachable!()
                            };
                            write_utf16_z(data, &units);
                        }
                    }
                }
            },
            (None, kind) => {
                put_u16(data, 0xFFFF);
                put_u16(data, control_class_ordinal(kind));
            }
        }

        match &control.text {
            Some(ControlText::String(literal)) => {
                write_utf16_z(
                    data,
                    &literals::parse_to_utf16(self.slice(literal.token), literal.code_page),
                );
            }
            Some(ControlText::Ordinal(ordinal)) => {
                put_u16(data, 0xFFFF);
                put_u16(data, *ordinal);
            }
            None => put_u16(data, 0),
        }
        // No creation data.
        put_u16(data, 0);
    }

    fn serialize_menu(source: &[u8], menu: &Menu) -> Vec<u8> {
        let mut data = Vec::new();
        if menu.ex {
            put_u16(&mut data, 1); // wVersion
            put_u16(&mut data, 4); // wOffset
            put_u32(&mut data, menu.help_id.unwrap_or(0));
        } else {
            put_u16(&mut data, 0);
            put_u16(&mut data, 0);
        }
        Self::write_menu_items(source, &mut data, &menu.items, menu.ex);
        data
    }

    fn write_menu_items(source: &[u8], data: &mut Vec<u8>, items: &[MenuItem], ex: bool) {
        for (index, item) in items.iter().enumerate() {
            let last = index + 1 == items.len();
            if ex {
                res::pad_to_dword(data);
                match item {
                    MenuItem::Separator => {
                        put_u32(data, MFT_SEPARATOR);
                        put_u32(data, 0);
                        put_u32(data, 0);
                        put_u16(data, if last { 0x80 } else { 0 });
                        put_u16(data, 0); // empty text
                    }
                    MenuItem::Item(item) => {
                        put_u32(data, item.item_type);
                        put_u32(data, item.state);
                        put_u32(data, item.id);
                        put_u16(data, if last { 0x80 } else { 0 });
                        write_utf16_z(
                            data,
                            &literals::parse_to_utf16(item.text.token.slice(source), item.text.code_page),
                        );
                    }
                    MenuItem::Popup(popup) => {
                        put_u32(data, popup.item_type);
                        put_u32(data, popup.state);
                        put_u32(data, popup.id);
                        put_u16(data, 0x01 | if last { 0x80 } else { 0 });
                        write_utf16_z(
                            data,
                            &literals::parse_to_utf16(popup.text.token.slice(source), popup.text.code_page),
                        );
                        res::pad_to_dword(data);
                        put_u32(data, popup.help_id);
                        Self::write_menu_items(source, data, &popup.items, ex);
                    }
                }
            } else {
                match item {
                    MenuItem::Separator => {
                        put_u16(data, if last { MF_END } else { 0 });
                        put_u16(data, 0);
                        put_u16(data, 0); // empty text
                    }
                    MenuItem::Item(item) => {
                        put_u16(data, item.flags | if last { MF_END } else { 0 });
                        put_u16(data, item.id as u16);
                        write_utf16_z(
                            data,
                            &literals::parse_to_utf16(item.text.token.slice(source), item.text.code_page),
                        );
                    }
                    MenuItem::Popup(popup) => {
                        put_u16(data, popup.flags | MF_POPUP | if last { MF_END } else { 0 });
                        write_utf16_z(
                            data,
                            &literals::parse_to_utf16(popup.text.token.slice(source), popup.text.code_page),
                        );
                        Self::write_menu_items(source, data, &popup.items, ex);
                    }
                }
            }
        }
    }

    fn serialize_accelerators(&mut self, entries: &[Accelerator]) -> Vec<u8> {
        let mut data = Vec::with_capacity(entries.len() * 8);
        for (index, accelerator) in entries.iter().enumerate() {
            let last = index + 1 == entries.len();
            let flags = accelerator.flags | if last { 0x80 } else { 0 };
            let key = match &accelerator.event {
                AcceleratorEvent::Number(value) => *value as u16,
                AcceleratorEvent::String(literal) => {
                    let units =
                        literals::parse_to_utf16(self.slice(literal.token), literal.code_page);
                    event_key_from_units(&units, accelerator.flags & 0x01 != 0)
                }
            };
            put_u16(&mut data, flags);
            put_u16(&mut data, key);
            put_u16(&mut data, accelerator.id as u16);
            put_u16(&mut data, 0);
        }
        data
    }

    fn serialize_version_info(&mut self, info: &VersionInfo) -> Vec<u8> {
        // VS_FIXEDFILEINFO, 52 bytes.
        let mut fixed = Vec::with_capacity(52);
        let file_version = info.file_version.unwrap_or([0; 4]);
        let product_version = info.product_version.unwrap_or([0; 4]);
        put_u32(&mut fixed, 0xFEEF_04BD); // signature
        put_u32(&mut fixed, 0x0001_0000); // strucVersion
        put_u32(&mut fixed, (u32::from(file_version[0]) << 16) | u32::from(file_version[1]));
        put_u32(&mut fixed, (u32::from(file_version[2]) << 16) | u32::from(file_version[3]));
        put_u32(&mut fixed, (u32::from(product_version[0]) << 16) | u32::from(product_version[1]));
        put_u32(&mut fixed, (u32::from(product_version[2]) << 16) | u32::from(product_version[3]));
        put_u32(&mut fixed, info.file_flags_mask);
        put_u32(&mut fixed, info.file_flags);
        put_u32(&mut fixed, info.file_os);
        put_u32(&mut fixed, info.file_type);
        put_u32(&mut fixed, info.file_subtype);
        put_u32(&mut fixed, 0); // dwFileDateMS
        put_u32(&mut fixed, 0); // dwFileDateLS

        let children: Vec<Vec<u8>> = info.root.iter().map(|n| self.build_version_node(n)).collect();
        build_version_block(&utf16_units("VS_VERSION_INFO"), 0, &fixed, 52, &children)
    }

    fn build_version_node(&self, node: &VersionNode) -> Vec<u8> {
        match node {
            VersionNode::Block { key, children } => {
                let key_units = literals::parse_to_utf16(self.slice(key.token), key.code_page);
                let built: Vec<Vec<u8>> =
                    children.iter().map(|n| self.build_version_node(n)).collect();
                build_version_block(&key_units, 1, &[], 0, &built)
            }
            VersionNode::Value { key, values } => {
                let key_units = literals::parse_to_utf16(self.slice(key.token), key.code_page);
                let any_string = values.iter().any(|v| matches!(v, DataEntry::String(_)));
                let mut value = Vec::new();
                if any_string {
                    let mut units: Vec<u16> = Vec::new();
                    for entry in values {
                        match entry {
                            DataEntry::String(literal) => units.extend(literals::parse_to_utf16(
                                self.slice(literal.token),
                                literal.code_page,
                            )),
                            DataEntry::Number(number) => units.push(number.value as u16),
                        }
                    }
                    units.push(0);
                    for unit in &units {
                        value.extend_from_slice(&unit.to_le_bytes());
                    }
                    // String values count in WORDs.
                    build_version_block(&key_units, 1, &value, units.len() as u16, &[])
                } else {
                    for entry in values {
                        if let DataEntry::Number(number) = entry {
                            put_u16(&mut value, number.value as u16);
                        }
                    }
                    // Binary values count in bytes.
                    build_version_block(&key_units, 0, &value, value.len() as u16, &[])
                }
            }
        }
    }

    fn add_string_table(&mut self, table: &StringTable) {
        let language = table
            .common
            .language
            .map(Language::id)
            .unwrap_or(self.language);
        let default_flags = Self::default_memory_flags(Some(ResourceType::StringTable));
        for entry in &table.entries {
            let bundle_id = entry.id >> 4;
            let slot_index = (entry.id & 0xF) as usize;
            let version = table.common.version.unwrap_or(self.version);
            let characteristics = table.common.characteristics.unwrap_or(self.characteristics);
            let bundle = self
                .string_tables
                .entry((language, bundle_id))
                .or_insert_with(|| Bundle {
                    memory_flags: Self::apply_memory_flags(default_flags, &table.common.memory_flags),
                    version,
                    characteristics,
                    strings: Default::default(),
                });
            match &bundle.strings[slot_index] {
                Some(prior) => {
                    let prior_token = prior.token;
                    self.diagnostics.add_error(
                        ErrorCode::StringAlreadyDefined,
                        entry.id_token,
                        ErrorExtra::Number(entry.id),
                    );
                    self.diagnostics.add_note(
                        ErrorCode::StringAlreadyDefined,
                        prior_token,
                        ErrorExtra::Number(entry.id),
                    );
                    self.failed = true;
                }
                None => {
                    bundle.strings[slot_index] = Some(StringSlot {
                        token: entry.id_token,
                        string: entry.string,
                    });
                }
            }
        }
    }

    /// Emit the accumulated bundles: 16 length-prefixed UTF-16 strings
    /// each, named `(id >> 4) + 1`.
    fn flush_string_tables(&mut self, out: &mut Vec<u8>) {
        let tables = std::mem::take(&mut self.string_tables);
        for ((language, bundle_id), bundle) in &tables {
            let mut data = Vec::new();
            for slot in &bundle.strings {
                match slot {
                    None => put_u16(&mut data, 0),
                    Some(slot) => {
                        let mut units = literals::parse_to_utf16(
                            self.slice(slot.string.token),
                            slot.string.code_page,
                        );
                        if self.options.null_terminate_string_table_strings {
                            units.push(0);
                        }
                        put_u16(&mut data, units.len() as u16);
                        for unit in &units {
                            data.extend_from_slice(&unit.to_le_bytes());
                        }
                    }
                }
            }
            let header = ResourceHeader {
                type_: NameOrOrdinal::Ordinal(ResourceType::StringTable.ordinal()),
                name: NameOrOrdinal::Ordinal((*bundle_id as u16) + 1),
                data_version: 0,
                memory_flags: bundle.memory_flags,
                language: *language,
                version: bundle.version,
                characteristics: bundle.characteristics,
            };
            res::write_record(out, &header, &data);
        }
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_i16(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&(value as i16).to_le_bytes());
}

fn write_utf16_z(out: &mut Vec<u8>, units: &[u16]) {
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(&0u16.to_le_bytes());
}

fn utf16_units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// One node of the VS_VERSIONINFO tree: `wLength wValueLength wType
/// szKey` then padded value and padded children; `wLength` is patched in
/// once the node is complete.
fn build_version_block(
    key: &[u16],
    w_type: u16,
    value: &[u8],
    value_length: u16,
    children: &[Vec<u8>],
) -> Vec<u8> {
    let mut node = Vec::new();
    put_u16(&mut node, 0); // wLength, patched below
    put_u16(&mut node, value_length);
    put_u16(&mut node, w_type);
    write_utf16_z(&mut node, key);
    res::pad_to_dword(&mut node);
    node.extend_from_slice(value);
    for child in children {
        res::pad_to_dword(&mut node);
        node.extend_from_slice(child);
    }
    let length = node.len() as u16;
    node[0..2].copy_from_slice(&length.to_le_bytes());
    node
}

fn default_control_style(kind: ControlKind) -> u32 {
    let base = WS_CHILD | WS_VISIBLE;
    base | match kind {
        ControlKind::Control => 0,
        ControlKind::LText => WS_GROUP,            // SS_LEFT
        ControlKind::CText => 0x1 | WS_GROUP,      // SS_CENTER
        ControlKind::RText => 0x2 | WS_GROUP,      // SS_RIGHT
        ControlKind::Icon => 0x3,                  // SS_ICON
        ControlKind::PushButton => WS_TABSTOP,     // BS_PUSHBUTTON
        ControlKind::DefPushButton => 0x1 | WS_TABSTOP,
        ControlKind::CheckBox => 0x2 | WS_TABSTOP,
        ControlKind::AutoCheckBox => 0x3 | WS_TABSTOP,
        ControlKind::RadioButton => 0x4,
        ControlKind::State3 => 0x5 | WS_TABSTOP,
        ControlKind::Auto3State => 0x6 | WS_TABSTOP,
        ControlKind::GroupBox => 0x7,
        ControlKind::UserButton => 0x8 | WS_TABSTOP,
        ControlKind::AutoRadioButton => 0x9,
        ControlKind::PushBox => 0xA | WS_TABSTOP,
        ControlKind::EditText => WS_BORDER | WS_TABSTOP, // ES_LEFT
        ControlKind::ComboBox => WS_TABSTOP,
        ControlKind::ListBox => 0x1 | WS_BORDER,   // LBS_NOTIFY
        ControlKind::ScrollBar => 0,               // SBS_HORZ
    }
}

fn control_class_ordinal(kind: ControlKind) -> u16 {
    match kind {
        ControlKind::Control => unreachable!("generic controls carry a class"),
        ControlKind::LText | ControlKind::RText | ControlKind::CText | ControlKind::Icon => 0x82,
        ControlKind::EditText => 0x81,
        ControlKind::ListBox => 0x83,
        ControlKind::ScrollBar => 0x84,
        ControlKind::ComboBox => 0x85,
        _ => 0x80, // the button family
    }
}

fn class_ordinal_from_ident(ident: &[u8]) -> Option<u16> {
    Some(match ident.first()?.to_ascii_lowercase() {
        b'b' if eq_ignore_case(ident, "button") => 0x80,
        b'e' if eq_ignore_case(ident, "edit") => 0x81,
        b's' if eq_ignore_case(ident, "static") => 0x82,
        b's' if eq_ignore_case(ident, "scrollbar") => 0x84,
        b'l' if eq_ignore_case(ident, "listbox") => 0x83,
        b'c' if eq_ignore_case(ident, "combobox") => 0x85,
        _ => return None,
    })
}

fn class_ordinal_from_units(units: &[u16]) -> Option<u16> {
    if units.len() > 16 || units.iter().any(|&u| u > 0x7F) {
        return None;
    }
    let bytes: Vec<u8> = units.iter().map(|&u| u as u8).collect();
    class_ordinal_from_ident(&bytes)
}

/// Resolve an accelerator event string: `"^C"` is a control character,
/// otherwise the first UTF-16 unit (uppercased for VIRTKEY events).
fn event_key_from_units(units: &[u16], virtkey: bool) -> u16 {
    match units {
        [caret, c, ..] if *caret == u16::from(b'^') => {
            let c = (*c as u8).to_ascii_uppercase();
            u16::from(c) & 0x1F
        }
        [first, ..] => {
            if virtkey {
                if let Some(c) = char::from_u32(u32::from(*first)) {
                    return c.to_ascii_uppercase() as u16;
                }
            }
            *first
        }
        [] => 0,
    }
}

fn dib_planes_and_bit_count(image: &[u8]) -> (u16, u16) {
    // BITMAPINFOHEADER starts with its own size; 40 marks the classic
    // header with planes at +12 and bit count at +14. PNG images keep
    // the directory defaults.
    if image.len() >= 16 && u32::from_le_bytes([image[0], image[1], image[2], image[3]]) == 40 {
        (
            u16::from_le_bytes([image[12], image[13]]),
            u16::from_le_bytes([image[14], image[15]]),
        )
    } else {
        (1, 32)
    }
}
