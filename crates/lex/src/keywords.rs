/// ASCII case-insensitive comparison against a precomputed-lowercase
/// keyword. Avoids per-call allocation.
pub fn eq_ignore_case(bytes: &[u8], lower: &str) -> bool {
    bytes.len() == lower.len()
        && bytes
            .iter()
            .zip(lower.bytes())
            .all(|(&a, b)| a.to_ascii_lowercase() == b)
}

/// Statement keywords recognized outside resource bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Language,
    Version,
    Characteristics,
    StringTable,
    Not,
}

pub fn to_keyword(bytes: &[u8]) -> Option<Keyword> {
    Some(match bytes.first()?.to_ascii_lowercase() {
        b'l' if eq_ignore_case(bytes, "language") => Keyword::Language,
        b'v' if eq_ignore_case(bytes, "version") => Keyword::Version,
        b'c' if eq_ignore_case(bytes, "characteristics") => Keyword::Characteristics,
        b's' if eq_ignore_case(bytes, "stringtable") => Keyword::StringTable,
        b'n' if eq_ignore_case(bytes, "not") => Keyword::Not,
        _ => return None,
    })
}

/// The predefined resource types. Anything else in type position is a
/// user-defined resource and follows raw-data body rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceType {
    Accelerators,
    Bitmap,
    Cursor,
    Dialog,
    DialogEx,
    DlgInclude,
    Font,
    FontDir,
    GroupCursor,
    GroupIcon,
    Html,
    Icon,
    Menu,
    MenuEx,
    MessageTable,
    PlugPlay,
    Rcdata,
    StringTable,
    VersionInfo,
    Vxd,
}

impl ResourceType {
    pub fn from_ident(bytes: &[u8]) -> Option<ResourceType> {
        Some(match bytes.first()?.to_ascii_lowercase() {
            b'a' if eq_ignore_case(bytes, "accelerators") => ResourceType::Accelerators,
            b'b' if eq_ignore_case(bytes, "bitmap") => ResourceType::Bitmap,
            b'c' if eq_ignore_case(bytes, "cursor") => ResourceType::Cursor,
            b'd' if eq_ignore_case(bytes, "dialog") => ResourceType::Dialog,
            b'd' if eq_ignore_case(bytes, "dialogex") => ResourceType::DialogEx,
            b'd' if eq_ignore_case(bytes, "dlginclude") => ResourceType::DlgInclude,
            b'f' if eq_ignore_case(bytes, "font") => ResourceType::Font,
            b'h' if eq_ignore_case(bytes, "html") => ResourceType::Html,
            b'i' if eq_ignore_case(bytes, "icon") => ResourceType::Icon,
            b'm' if eq_ignore_case(bytes, "menu") => ResourceType::Menu,
            b'm' if eq_ignore_case(bytes, "menuex") => ResourceType::MenuEx,
            b'm' if eq_ignore_case(bytes, "messagetable") => ResourceType::MessageTable,
            b'p' if eq_ignore_case(bytes, "plugplay") => ResourceType::PlugPlay,
            b'r' if eq_ignore_case(bytes, "rcdata") => ResourceType::Rcdata,
            b's' if eq_ignore_case(bytes, "stringtable") => ResourceType::StringTable,
            b'v' if eq_ignore_case(bytes, "versioninfo") => ResourceType::VersionInfo,
            b'v' if eq_ignore_case(bytes, "vxd") => ResourceType::Vxd,
            _ => return None,
        })
    }

    /// Interpret a numeric type id as a predefined type, if it names one.
    pub fn from_ordinal(value: u32) -> Option<ResourceType> {
        Some(match value {
            1 => ResourceType::Cursor,
            2 => ResourceType::Bitmap,
            3 => ResourceType::Icon,
            4 => ResourceType::Menu,
            5 => ResourceType::Dialog,
            6 => ResourceType::StringTable,
            7 => ResourceType::FontDir,
            8 => ResourceType::Font,
            9 => ResourceType::Accelerators,
            10 => ResourceType::Rcdata,
            11 => ResourceType::MessageTable,
            12 => ResourceType::GroupCursor,
            14 => ResourceType::GroupIcon,
            16 => ResourceType::VersionInfo,
            17 => ResourceType::DlgInclude,
            19 => ResourceType::PlugPlay,
            20 => ResourceType::Vxd,
            23 => ResourceType::Html,
            _ => return None,
        })
    }

    /// The `RT_*` ordinal written into the `.res` record header.
    pub fn ordinal(self) -> u16 {
        match self {
            ResourceType::Cursor => 1,
            ResourceType::Bitmap => 2,
            ResourceType::Icon => 3,
            ResourceType::Menu | ResourceType::MenuEx => 4,
            ResourceType::Dialog | ResourceType::DialogEx => 5,
            ResourceType::StringTable => 6,
            ResourceType::FontDir => 7,
            ResourceType::Font => 8,
            ResourceType::Accelerators => 9,
            ResourceType::Rcdata => 10,
            ResourceType::MessageTable => 11,
            ResourceType::GroupCursor => 12,
            ResourceType::GroupIcon => 14,
            ResourceType::VersionInfo => 16,
            ResourceType::DlgInclude => 17,
            ResourceType::PlugPlay => 19,
            ResourceType::Vxd => 20,
            ResourceType::Html => 23,
        }
    }

    /// Types whose body is a file reference; a raw data block after them is
    /// an error (`resource_type_cant_use_raw_data`).
    pub fn forbids_raw_data(self) -> bool {
        matches!(
            self,
            ResourceType::Icon
                | ResourceType::Cursor
                | ResourceType::Bitmap
                | ResourceType::Font
                | ResourceType::MessageTable
        )
    }

    /// Types whose name id must be an ordinal u16.
    pub fn requires_ordinal_name(self) -> bool {
        matches!(self, ResourceType::Font)
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Accelerators => "ACCELERATORS",
            ResourceType::Bitmap => "BITMAP",
            ResourceType::Cursor => "CURSOR",
            ResourceType::Dialog => "DIALOG",
            ResourceType::DialogEx => "DIALOGEX",
            ResourceType::DlgInclude => "DLGINCLUDE",
            ResourceType::Font => "FONT",
            ResourceType::FontDir => "FONTDIR",
            ResourceType::GroupCursor => "GROUP_CURSOR",
            ResourceType::GroupIcon => "GROUP_ICON",
            ResourceType::Html => "HTML",
            ResourceType::Icon => "ICON",
            ResourceType::Menu => "MENU",
            ResourceType::MenuEx => "MENUEX",
            ResourceType::MessageTable => "MESSAGETABLE",
            ResourceType::PlugPlay => "PLUGPLAY",
            ResourceType::Rcdata => "RCDATA",
            ResourceType::StringTable => "STRINGTABLE",
            ResourceType::VersionInfo => "VERSIONINFO",
            ResourceType::Vxd => "VXD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(to_keyword(b"LANGUAGE"), Some(Keyword::Language));
        assert_eq!(to_keyword(b"language"), Some(Keyword::Language));
        assert_eq!(to_keyword(b"StringTable"), Some(Keyword::StringTable));
        assert_eq!(to_keyword(b"banana"), None);
        assert_eq!(to_keyword(b""), None);
    }

    #[test]
    fn resource_types_from_ident() {
        assert_eq!(ResourceType::from_ident(b"rcdata"), Some(ResourceType::Rcdata));
        assert_eq!(ResourceType::from_ident(b"DIALOGEX"), Some(ResourceType::DialogEx));
        assert_eq!(ResourceType::from_ident(b"MyType"), None);
    }

    #[test]
    fn ordinals_round_trip_for_emittable_types() {
        assert_eq!(ResourceType::from_ordinal(10), Some(ResourceType::Rcdata));
        assert_eq!(ResourceType::Rcdata.ordinal(), 10);
        assert_eq!(ResourceType::from_ordinal(6), Some(ResourceType::StringTable));
        assert_eq!(ResourceType::from_ordinal(13), None);
    }

    #[test]
    fn raw_data_rules() {
        assert!(ResourceType::Icon.forbids_raw_data());
        assert!(ResourceType::Bitmap.forbids_raw_data());
        assert!(!ResourceType::Rcdata.forbids_raw_data());
        assert!(!ResourceType::Html.forbids_raw_data());
    }
}
