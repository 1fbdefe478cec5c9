use codepage::CodePage;
use lex::keywords::ResourceType;
use lex::Token;

#[derive(Debug, Default)]
pub struct RcFile {
    pub statements: Vec<TopLevelStatement>,
}

#[derive(Debug)]
pub enum TopLevelStatement {
    Language(Language),
    Version(u32),
    Characteristics(u32),
    StringTable(StringTable),
    Resource(ResourceDef),
}

/// `LANGUAGE primary, sublanguage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub primary: u16,
    pub sub: u16,
}

impl Language {
    /// The u16 language id written into record headers.
    pub fn id(self) -> u16 {
        (self.sub << 10) | (self.primary & 0x3FF)
    }
}

/// An evaluated numeric expression. `is_long` is sticky across operators:
/// any `L`-suffixed operand promotes the result to DWORD emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Number {
    pub value: u32,
    pub is_long: bool,
}

/// A string literal token plus the code page that was active when it was
/// lexed; the compiler needs it to decode the bytes.
#[derive(Debug, Clone, Copy)]
pub struct StringLiteral {
    pub token: Token,
    pub code_page: CodePage,
}

impl StringLiteral {
    pub fn is_wide(&self) -> bool {
        self.token.id == lex::TokenId::QuotedWideString
    }
}

#[derive(Debug)]
pub struct StringTable {
    pub common: CommonOptions,
    pub entries: Vec<StringTableEntry>,
}

#[derive(Debug)]
pub struct StringTableEntry {
    pub id: u32,
    pub id_token: Token,
    pub string: StringLiteral,
}

#[derive(Debug)]
pub struct ResourceDef {
    pub name_token: Token,
    pub type_: TypeSpec,
    pub common: CommonOptions,
    pub body: ResourceBody,
}

#[derive(Debug, Clone, Copy)]
pub enum TypeSpec {
    Predefined { type_: ResourceType, token: Token },
    /// Unknown identifier (or quoted string) in type position: a
    /// user-defined resource, named.
    UserDefinedName(Token),
    /// Numeric type id that is not one of the predefined ordinals.
    UserDefinedOrdinal { value: u16, token: Token },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFlag {
    Moveable,
    Fixed,
    Pure,
    Impure,
    Preload,
    Loadoncall,
    Discardable,
    Shared,
    Nonshared,
}

#[derive(Debug, Default)]
pub struct CommonOptions {
    pub memory_flags: Vec<MemoryFlag>,
    pub language: Option<Language>,
    pub version: Option<u32>,
    pub characteristics: Option<u32>,
}

#[derive(Debug)]
pub enum ResourceBody {
    RawData(Vec<DataEntry>),
    FileName(Token),
    Dialog(Dialog),
    Menu(Menu),
    Accelerators(Vec<Accelerator>),
    VersionInfo(VersionInfo),
}

#[derive(Debug)]
pub enum DataEntry {
    Number(Number),
    String(StringLiteral),
}

/// One `|`/`+`/`-`/`&`-joined term of a style mask. `NOT` terms clear
/// their bits from the accumulated value instead of applying the operator.
#[derive(Debug, Clone, Copy)]
pub struct StyleTerm {
    pub op: StyleOp,
    pub not: bool,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleOp {
    Or,
    And,
    Add,
    Sub,
}

#[derive(Debug, Clone, Default)]
pub struct StyleExpression {
    pub terms: Vec<StyleTerm>,
}

impl StyleExpression {
    /// Fold the terms over `default`, in source order.
    pub fn evaluate(&self, default: u32) -> u32 {
        let mut acc = default;
        for term in &self.terms {
            if term.not {
                acc &= !term.value;
            } else {
                acc = match term.op {
                    StyleOp::Or => acc | term.value,
                    StyleOp::And => acc & term.value,
                    StyleOp::Add => acc.wrapping_add(term.value),
                    StyleOp::Sub => acc.wrapping_sub(term.value),
                };
            }
        }
        acc
    }
}

#[derive(Debug)]
pub struct Dialog {
    pub ex: bool,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub help_id: Option<u32>,
    pub style: Option<StyleExpression>,
    pub exstyle: Option<StyleExpression>,
    pub caption: Option<StringLiteral>,
    pub class: Option<NameValue>,
    pub menu: Option<NameValue>,
    pub font: Option<FontStatement>,
    pub controls: Vec<Control>,
}

/// A `CLASS`/`MENU` dialog statement value: an ordinal, a quoted string,
/// or a bare name.
#[derive(Debug, Clone, Copy)]
pub enum NameValue {
    Ordinal(u16),
    String(StringLiteral),
    Ident(Token),
}

#[derive(Debug)]
pub struct FontStatement {
    pub point_size: u16,
    pub typeface: StringLiteral,
    pub weight: u16,
    pub italic: bool,
    pub charset: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Control,
    LText,
    RText,
    CText,
    PushButton,
    DefPushButton,
    CheckBox,
    AutoCheckBox,
    RadioButton,
    AutoRadioButton,
    State3,
    Auto3State,
    GroupBox,
    PushBox,
    UserButton,
    EditText,
    ComboBox,
    ListBox,
    ScrollBar,
    Icon,
}

impl ControlKind {
    pub fn from_ident(bytes: &[u8]) -> Option<ControlKind> {
        use lex::keywords::eq_ignore_case as eq;
        Some(match bytes.first()?.to_ascii_lowercase() {
            b'c' if eq(bytes, "control") => ControlKind::Control,
            b'c' if eq(bytes, "ctext") => ControlKind::CText,
            b'c' if eq(bytes, "checkbox") => ControlKind::CheckBox,
            b'c' if eq(bytes, "combobox") => ControlKind::ComboBox,
            b'l' if eq(bytes, "ltext") => ControlKind::LText,
            b'l' if eq(bytes, "listbox") => ControlKind::ListBox,
            b'r' if eq(bytes, "rtext") => ControlKind::RText,
            b'r' if eq(bytes, "radiobutton") => ControlKind::RadioButton,
            b'p' if eq(bytes, "pushbutton") => ControlKind::PushButton,
            b'p' if eq(bytes, "pushbox") => ControlKind::PushBox,
            b'd' if eq(bytes, "defpushbutton") => ControlKind::DefPushButton,
            b'a' if eq(bytes, "autocheckbox") => ControlKind::AutoCheckBox,
            b'a' if eq(bytes, "autoradiobutton") => ControlKind::AutoRadioButton,
            b'a' if eq(bytes, "auto3state") => ControlKind::Auto3State,
            b's' if eq(bytes, "state3") => ControlKind::State3,
            b's' if eq(bytes, "scrollbar") => ControlKind::ScrollBar,
            b'g' if eq(bytes, "groupbox") => ControlKind::GroupBox,
            b'u' if eq(bytes, "userbutton") => ControlKind::UserButton,
            b'e' if eq(bytes, "edittext") => ControlKind::EditText,
            b'i' if eq(bytes, "icon") => ControlKind::Icon,
            _ => return None,
        })
    }

    /// Whether the control statement takes a leading text field.
    pub fn has_text(self) -> bool {
        !matches!(
            self,
            ControlKind::EditText
                | ControlKind::ComboBox
                | ControlKind::ListBox
                | ControlKind::ScrollBar
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ControlText {
    String(StringLiteral),
    Ordinal(u16),
}

#[derive(Debug, Clone, Copy)]
pub enum ControlClass {
    Ordinal(u16),
    Name(StringLiteral),
    Ident(Token),
}

#[derive(Debug)]
pub struct Control {
    pub kind: ControlKind,
    pub text: Option<ControlText>,
    pub id: u32,
    pub id_token: Token,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub style: Option<StyleExpression>,
    pub exstyle: Option<StyleExpression>,
    pub help_id: Option<u32>,
    /// Only set for generic `CONTROL` statements.
    pub class: Option<ControlClass>,
}

#[derive(Debug)]
pub struct Menu {
    pub ex: bool,
    pub help_id: Option<u32>,
    pub items: Vec<MenuItem>,
}

#[derive(Debug)]
pub enum MenuItem {
    Separator,
    Item(MenuItemDef),
    Popup(PopupDef),
}

#[derive(Debug)]
pub struct MenuItemDef {
    pub text: StringLiteral,
    pub id: u32,
    /// `MF_*` option flags (normal menus).
    pub flags: u16,
    /// `MFT_*`/`MFS_*` (MENUEX only).
    pub item_type: u32,
    pub state: u32,
}

#[derive(Debug)]
pub struct PopupDef {
    pub text: StringLiteral,
    pub id: u32,
    pub flags: u16,
    pub item_type: u32,
    pub state: u32,
    pub help_id: u32,
    pub items: Vec<MenuItem>,
}

#[derive(Debug)]
pub struct Accelerator {
    pub event: AcceleratorEvent,
    pub event_token: Token,
    pub id: u32,
    /// `FVIRTKEY | FNOINVERT | FSHIFT | FCONTROL | FALT` as parsed.
    pub flags: u16,
}

#[derive(Debug, Clone, Copy)]
pub enum AcceleratorEvent {
    String(StringLiteral),
    Number(u32),
}

#[derive(Debug, Default)]
pub struct VersionInfo {
    pub file_version: Option<[u16; 4]>,
    pub product_version: Option<[u16; 4]>,
    pub file_flags_mask: u32,
    pub file_flags: u32,
    pub file_os: u32,
    pub file_type: u32,
    pub file_subtype: u32,
    pub root: Vec<VersionNode>,
}

#[derive(Debug)]
pub enum VersionNode {
    Block {
        key: StringLiteral,
        children: Vec<VersionNode>,
    },
    Value {
        key: StringLiteral,
        values: Vec<DataEntry>,
    },
}
