use std::fmt;

use codepage::CodePage;
use diag::{Diagnostics, ErrorCode, ErrorExtra, ExpectedTypes};
use lex::keywords::{self, Keyword, ResourceType};
use lex::{parse_number_literal, LexErrorCode, Lexer, LexerOptions, Token, TokenId};

use crate::ast::*;

/// Parse errors are recorded as diagnostics; this sentinel only signals
/// that the current construct is unrecoverable. Any recorded parse error
/// makes the overall parse fail after recovery ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error")
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// `/w`: invalid `#pragma code_page` becomes a warning and the pragma
    /// is ignored.
    pub warn_instead_of_error_on_invalid_code_page: bool,
}

/// Diagnostics are collected up to this bound; past it the parse gives up
/// entirely instead of producing error cascades.
const MAX_PARSE_ERRORS: usize = 20;

pub fn parse_file(
    source: &[u8],
    lexer_options: LexerOptions,
    options: ParserOptions,
    diagnostics: &mut Diagnostics,
) -> Result<RcFile, ParseError> {
    let mut parser = Parser {
        source,
        lexer: Lexer::new(source, lexer_options),
        token: Token {
            id: TokenId::Eof,
            start: 0,
            end: 0,
            line_number: 1,
        },
        diagnostics,
        options,
        error_count: 0,
    };
    parser.advance()?;
    parser.parse()
}

struct Parser<'a, 'd> {
    source: &'a [u8],
    lexer: Lexer<'a>,
    token: Token,
    diagnostics: &'d mut Diagnostics,
    options: ParserOptions,
    error_count: usize,
}

impl Parser<'_, '_> {
    fn advance(&mut self) -> Result<(), ParseError> {
        loop {
            match self.lexer.next() {
                Ok(token) => {
                    self.token = token;
                    return Ok(());
                }
                Err(err) => match err.code {
                    LexErrorCode::InvalidCodePage(_) | LexErrorCode::UnsupportedCodePage(_)
                        if self.options.warn_instead_of_error_on_invalid_code_page =>
                    {
                        // The lexer already skipped the pragma line.
                        self.diagnostics.add_lex_warning(&err);
                    }
                    _ => {
                        self.diagnostics.add_lex_error(&err);
                        self.error_count += 1;
                        return Err(ParseError);
                    }
                },
            }
        }
    }

    fn slice(&self) -> &[u8] {
        self.token.slice(self.source)
    }

    fn code_page(&self) -> CodePage {
        self.lexer.current_code_page()
    }

    fn is_kw(&self, lower: &str) -> bool {
        self.token.id == TokenId::Identifier && keywords::eq_ignore_case(self.slice(), lower)
    }

    fn record(&mut self, code: ErrorCode, token: Token, extra: ErrorExtra) {
        self.error_count += 1;
        if self.error_count <= MAX_PARSE_ERRORS {
            self.diagnostics.add_error(code, token, extra);
        }
    }

    fn exhausted(&self) -> bool {
        self.error_count >= MAX_PARSE_ERRORS
    }

    fn err_expected(&mut self, id: TokenId) -> ParseError {
        self.record(
            ErrorCode::ExpectedToken,
            self.token,
            ErrorExtra::ExpectedTokenId(id),
        );
        ParseError
    }

    fn err_expected_types(&mut self, types: ExpectedTypes) -> ParseError {
        self.record(
            ErrorCode::ExpectedSomethingElse,
            self.token,
            ErrorExtra::ExpectedTypes(types),
        );
        ParseError
    }

    fn expect(&mut self, id: TokenId) -> Result<(), ParseError> {
        if self.token.id == id {
            self.advance()
        } else {
            Err(self.err_expected(id))
        }
    }

    fn skip_comma(&mut self) -> Result<(), ParseError> {
        if self.token.id == TokenId::Comma {
            self.advance()?;
        }
        Ok(())
    }

    fn string_literal(&self) -> StringLiteral {
        StringLiteral {
            token: self.token,
            code_page: self.code_page(),
        }
    }

    /// Skip forward to a top-level statement boundary after an error:
    /// past the close of the innermost open block, or to EOF. Returns
    /// false when lexing can no longer continue.
    fn synchronize(&mut self) -> bool {
        let mut depth = 0usize;
        loop {
            if self.token.id == TokenId::Eof {
                return true;
            }
            if self.token.opens_block() {
                depth += 1;
            } else if self.token.closes_block() {
                if depth <= 1 {
                    return self.advance().is_ok();
                }
                depth -= 1;
            }
            if self.advance().is_err() {
                return false;
            }
        }
    }

    fn parse(&mut self) -> Result<RcFile, ParseError> {
        let mut file = RcFile::default();
        while self.token.id != TokenId::Eof {
            match self.parse_top_level() {
                Ok(statement) => file.statements.push(statement),
                Err(ParseError) => {
                    if self.exhausted() || !self.synchronize() {
                        break;
                    }
                }
            }
        }
        if self.error_count > 0 {
            Err(ParseError)
        } else {
            Ok(file)
        }
    }

    fn parse_top_level(&mut self) -> Result<TopLevelStatement, ParseError> {
        if self.token.id == TokenId::Identifier {
            match keywords::to_keyword(self.slice()) {
                Some(Keyword::Language) => {
                    return Ok(TopLevelStatement::Language(self.parse_language_statement()?));
                }
                Some(Keyword::Version) => {
                    self.advance()?;
                    return Ok(TopLevelStatement::Version(self.parse_expression()?.value));
                }
                Some(Keyword::Characteristics) => {
                    self.advance()?;
                    return Ok(TopLevelStatement::Characteristics(
                        self.parse_expression()?.value,
                    ));
                }
                Some(Keyword::StringTable) => {
                    return Ok(TopLevelStatement::StringTable(self.parse_string_table()?));
                }
                _ => {}
            }
        }
        match self.token.id {
            TokenId::Identifier
            | TokenId::Number
            | TokenId::QuotedAsciiString
            | TokenId::QuotedWideString => {
                Ok(TopLevelStatement::Resource(self.parse_resource_def()?))
            }
            _ => Err(self.err_expected_types(ExpectedTypes {
                number: true,
                identifier: true,
                string_literal: true,
                ..Default::default()
            })),
        }
    }

    /// `LANGUAGE primary, sublanguage`, current token is the keyword.
    fn parse_language_statement(&mut self) -> Result<Language, ParseError> {
        self.advance()?;
        let primary = self.parse_expression()?.value as u16;
        self.expect(TokenId::Comma)?;
        let sub = self.parse_expression()?.value as u16;
        Ok(Language { primary, sub })
    }

    fn parse_resource_def(&mut self) -> Result<ResourceDef, ParseError> {
        let name_token = self.token;
        self.advance()?;

        let type_token = self.token;
        let type_ = match type_token.id {
            TokenId::Identifier => match ResourceType::from_ident(self.slice()) {
                // `name STRINGTABLE` is never valid; string tables are
                // unnamed top-level statements.
                Some(ResourceType::StringTable) => {
                    return Err(self.err_expected_types(ExpectedTypes {
                        identifier: true,
                        number: true,
                        ..Default::default()
                    }));
                }
                Some(type_) => TypeSpec::Predefined {
                    type_,
                    token: type_token,
                },
                None => TypeSpec::UserDefinedName(type_token),
            },
            TokenId::Number => {
                let value = parse_number_literal(self.slice()).value;
                match ResourceType::from_ordinal(value) {
                    Some(type_) => TypeSpec::Predefined {
                        type_,
                        token: type_token,
                    },
                    None => TypeSpec::UserDefinedOrdinal {
                        value: value as u16,
                        token: type_token,
                    },
                }
            }
            TokenId::QuotedAsciiString | TokenId::QuotedWideString => {
                TypeSpec::UserDefinedName(type_token)
            }
            _ => {
                return Err(self.err_expected_types(ExpectedTypes {
                    identifier: true,
                    number: true,
                    ..Default::default()
                }));
            }
        };
        self.advance()?;

        if let TypeSpec::Predefined { type_, .. } = type_ {
            if type_.requires_ordinal_name() && name_token.id != TokenId::Number {
                self.record(
                    ErrorCode::IdMustBeOrdinal,
                    name_token,
                    ErrorExtra::ResourceType(type_),
                );
            }
        }

        let mut common = self.parse_common_options()?;
        let body = self.parse_body(&type_, &mut common)?;
        Ok(ResourceDef {
            name_token,
            type_,
            common,
            body,
        })
    }

    fn parse_common_options(&mut self) -> Result<CommonOptions, ParseError> {
        let mut common = CommonOptions::default();
        loop {
            if self.token.id != TokenId::Identifier {
                break;
            }
            if let Some(flag) = memory_flag_from_ident(self.slice()) {
                common.memory_flags.push(flag);
                self.advance()?;
                continue;
            }
            match keywords::to_keyword(self.slice()) {
                Some(Keyword::Language) => {
                    common.language = Some(self.parse_language_statement()?);
                }
                Some(Keyword::Version) => {
                    self.advance()?;
                    common.version = Some(self.parse_expression()?.value);
                }
                Some(Keyword::Characteristics) => {
                    self.advance()?;
                    common.characteristics = Some(self.parse_expression()?.value);
                }
                _ => break,
            }
        }
        Ok(common)
    }

    fn parse_body(
        &mut self,
        type_: &TypeSpec,
        common: &mut CommonOptions,
    ) -> Result<ResourceBody, ParseError> {
        if let TypeSpec::Predefined { type_, .. } = type_ {
            match type_ {
                ResourceType::Dialog => return Ok(ResourceBody::Dialog(self.parse_dialog(false, common)?)),
                ResourceType::DialogEx => return Ok(ResourceBody::Dialog(self.parse_dialog(true, common)?)),
                ResourceType::Menu => return Ok(ResourceBody::Menu(self.parse_menu(false)?)),
                ResourceType::MenuEx => return Ok(ResourceBody::Menu(self.parse_menu(true)?)),
                ResourceType::Accelerators => {
                    return Ok(ResourceBody::Accelerators(self.parse_accelerators()?));
                }
                ResourceType::VersionInfo => {
                    return Ok(ResourceBody::VersionInfo(self.parse_version_info()?));
                }
                t if t.forbids_raw_data() => {
                    if self.token.opens_block() {
                        let open = self.token;
                        self.record(
                            ErrorCode::ResourceTypeCantUseRawData,
                            open,
                            ErrorExtra::ResourceType(*t),
                        );
                        // Skip the block so parsing resumes cleanly; the
                        // recorded error already dooms the compile.
                        self.skip_block()?;
                        return Ok(ResourceBody::RawData(Vec::new()));
                    }
                    return Ok(ResourceBody::FileName(self.parse_filename()?));
                }
                _ => {}
            }
        }
        if self.token.opens_block() {
            Ok(ResourceBody::RawData(self.parse_raw_data_block()?))
        } else {
            Ok(ResourceBody::FileName(self.parse_filename()?))
        }
    }

    fn parse_filename(&mut self) -> Result<Token, ParseError> {
        match self.token.id {
            TokenId::Identifier
            | TokenId::Number
            | TokenId::QuotedAsciiString
            | TokenId::QuotedWideString => {
                let token = self.token;
                self.advance()?;
                Ok(token)
            }
            _ => Err(self.err_expected_types(ExpectedTypes {
                filename: true,
                ..Default::default()
            })),
        }
    }

    /// Consume a balanced block without interpreting it.
    fn skip_block(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        loop {
            if self.token.opens_block() {
                depth += 1;
            } else if self.token.closes_block() {
                depth -= 1;
                if depth == 0 {
                    return self.advance();
                }
            } else if self.token.id == TokenId::Eof {
                self.record(ErrorCode::UnfinishedRawDataBlock, self.token, ErrorExtra::None);
                return Err(ParseError);
            }
            self.advance()?;
        }
    }

    fn parse_raw_data_block(&mut self) -> Result<Vec<DataEntry>, ParseError> {
        // Opening `{` or `BEGIN`; the closer may be either flavor. EOF
        // errors anchor here so they land on a mappable line.
        let open_token = self.token;
        self.advance()?;
        let mut entries = Vec::new();
        loop {
            if self.token.closes_block() {
                self.advance()?;
                return Ok(entries);
            }
            match self.token.id {
                TokenId::Eof => {
                    self.record(
                        ErrorCode::UnfinishedRawDataBlock,
                        open_token,
                        ErrorExtra::None,
                    );
                    return Err(ParseError);
                }
                TokenId::QuotedAsciiString | TokenId::QuotedWideString => {
                    entries.push(DataEntry::String(self.string_literal()));
                    self.advance()?;
                }
                TokenId::Comma => self.advance()?,
                _ if self.is_expression_start() => {
                    entries.push(DataEntry::Number(self.parse_expression()?));
                }
                _ => {
                    return Err(self.err_expected_types(ExpectedTypes {
                        number: true,
                        number_expression: true,
                        string_literal: true,
                        ..Default::default()
                    }));
                }
            }
        }
    }

    fn is_expression_start(&self) -> bool {
        matches!(
            self.token.id,
            TokenId::Number | TokenId::Minus | TokenId::Tilde | TokenId::OpenParen
        )
    }

    /// `term { (+|-|&|\|) term }`, evaluated as u32 with wrap-on-overflow.
    fn parse_expression(&mut self) -> Result<Number, ParseError> {
        let mut acc = self.parse_term()?;
        loop {
            let op = self.token.id;
            if !matches!(op, TokenId::Plus | TokenId::Minus | TokenId::Pipe | TokenId::Amp) {
                return Ok(acc);
            }
            self.advance()?;
            let rhs = self.parse_term()?;
            let value = match op {
                TokenId::Plus => acc.value.wrapping_add(rhs.value),
                TokenId::Minus => acc.value.wrapping_sub(rhs.value),
                TokenId::Pipe => acc.value | rhs.value,
                TokenId::Amp => acc.value & rhs.value,
                _ => unreachable!(),
            };
            acc = Number {
                value,
                is_long: acc.is_long || rhs.is_long,
            };
        }
    }

    fn parse_term(&mut self) -> Result<Number, ParseError> {
        match self.token.id {
            TokenId::Number => {
                let literal = parse_number_literal(self.slice());
                self.advance()?;
                Ok(Number {
                    value: literal.value,
                    is_long: literal.is_long,
                })
            }
            TokenId::Minus => {
                self.advance()?;
                let operand = self.parse_term()?;
                Ok(Number {
                    value: operand.value.wrapping_neg(),
                    is_long: operand.is_long,
                })
            }
            TokenId::Tilde => {
                self.advance()?;
                let operand = self.parse_term()?;
                Ok(Number {
                    value: !operand.value,
                    is_long: operand.is_long,
                })
            }
            TokenId::OpenParen => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.expect(TokenId::CloseParen)?;
                Ok(inner)
            }
            _ => Err(self.err_expected_types(ExpectedTypes {
                number: true,
                number_expression: true,
                ..Default::default()
            })),
        }
    }

    fn parse_style_expression(&mut self) -> Result<StyleExpression, ParseError> {
        let mut terms = Vec::new();
        let mut op = StyleOp::Or;
        loop {
            let not = if self.is_kw("not") {
                self.advance()?;
                true
            } else {
                false
            };
            let value = self.parse_term()?.value;
            terms.push(StyleTerm { op, not, value });
            op = match self.token.id {
                TokenId::Plus => StyleOp::Add,
                TokenId::Minus => StyleOp::Sub,
                TokenId::Pipe => StyleOp::Or,
                TokenId::Amp => StyleOp::And,
                _ => return Ok(StyleExpression { terms }),
            };
            self.advance()?;
        }
    }

    fn expect_string_literal(&mut self) -> Result<StringLiteral, ParseError> {
        if self.token.is_string_literal() {
            let literal = self.string_literal();
            self.advance()?;
            Ok(literal)
        } else {
            Err(self.err_expected(TokenId::QuotedAsciiString))
        }
    }

    fn parse_string_table(&mut self) -> Result<StringTable, ParseError> {
        self.advance()?;
        let common = self.parse_common_options()?;
        if !self.token.opens_block() {
            return Err(self.err_expected(TokenId::OpenBrace));
        }
        let open_token = self.token;
        self.advance()?;
        let mut entries = Vec::new();
        loop {
            if self.token.closes_block() {
                self.advance()?;
                return Ok(StringTable { common, entries });
            }
            match self.token.id {
                TokenId::Eof => {
                    self.record(
                        ErrorCode::UnfinishedStringTableBlock,
                        open_token,
                        ErrorExtra::None,
                    );
                    return Err(ParseError);
                }
                TokenId::Comma => self.advance()?,
                TokenId::QuotedAsciiString | TokenId::QuotedWideString => {
                    // A string where an id belongs.
                    let token = self.token;
                    self.record(ErrorCode::IdMustBeOrdinal, token, ErrorExtra::None);
                    self.advance()?;
                }
                _ if self.is_expression_start() => {
                    let id_token = self.token;
                    let id = self.parse_expression()?.value;
                    self.skip_comma()?;
                    let string = self.expect_string_literal()?;
                    entries.push(StringTableEntry {
                        id,
                        id_token,
                        string,
                    });
                }
                _ => {
                    return Err(self.err_expected_types(ExpectedTypes {
                        number: true,
                        number_expression: true,
                        ..Default::default()
                    }));
                }
            }
        }
    }

    fn parse_dialog(
        &mut self,
        ex: bool,
        common: &mut CommonOptions,
    ) -> Result<Dialog, ParseError> {
        let x = self.parse_expression()?.value as i32;
        self.skip_comma()?;
        let y = self.parse_expression()?.value as i32;
        self.skip_comma()?;
        let width = self.parse_expression()?.value as i32;
        self.skip_comma()?;
        let height = self.parse_expression()?.value as i32;

        let mut dialog = Dialog {
            ex,
            x,
            y,
            width,
            height,
            help_id: None,
            style: None,
            exstyle: None,
            caption: None,
            class: None,
            menu: None,
            font: None,
            controls: Vec::new(),
        };

        // DIALOGEX takes an optional helpid after the coordinates.
        if ex && self.token.id == TokenId::Comma {
            self.advance()?;
            if self.is_expression_start() {
                dialog.help_id = Some(self.parse_expression()?.value);
            }
        }

        loop {
            if self.token.id != TokenId::Identifier {
                break;
            }
            if self.is_kw("style") {
                self.advance()?;
                dialog.style = Some(self.parse_style_expression()?);
            } else if self.is_kw("exstyle") {
                self.advance()?;
                dialog.exstyle = Some(self.parse_style_expression()?);
            } else if self.is_kw("caption") {
                self.advance()?;
                dialog.caption = Some(self.expect_string_literal()?);
            } else if self.is_kw("class") {
                self.advance()?;
                dialog.class = Some(self.parse_name_value()?);
            } else if self.is_kw("menu") {
                self.advance()?;
                dialog.menu = Some(self.parse_name_value()?);
            } else if self.is_kw("font") {
                self.advance()?;
                dialog.font = Some(self.parse_font_statement()?);
            } else if self.is_kw("language") {
                common.language = Some(self.parse_language_statement()?);
            } else if self.is_kw("version") {
                self.advance()?;
                common.version = Some(self.parse_expression()?.value);
            } else if self.is_kw("characteristics") {
                self.advance()?;
                common.characteristics = Some(self.parse_expression()?.value);
            } else {
                break;
            }
        }

        if !self.token.opens_block() {
            return Err(self.err_expected(TokenId::OpenBrace));
        }
        let open_token = self.token;
        self.advance()?;
        loop {
            if self.token.closes_block() {
                self.advance()?;
                return Ok(dialog);
            }
            if self.token.id == TokenId::Eof {
                self.record(
                    ErrorCode::ExpectedToken,
                    open_token,
                    ErrorExtra::ExpectedTokenId(TokenId::End),
                );
                return Err(ParseError);
            }
            let control = self.parse_control(ex)?;
            dialog.controls.push(control);
        }
    }

    fn parse_name_value(&mut self) -> Result<NameValue, ParseError> {
        match self.token.id {
            TokenId::QuotedAsciiString | TokenId::QuotedWideString => {
                let literal = self.string_literal();
                self.advance()?;
                Ok(NameValue::String(literal))
            }
            TokenId::Identifier => {
                let token = self.token;
                self.advance()?;
                Ok(NameValue::Ident(token))
            }
            _ if self.is_expression_start() => {
                Ok(NameValue::Ordinal(self.parse_expression()?.value as u16))
            }
            _ => Err(self.err_expected_types(ExpectedTypes {
                number: true,
                string_literal: true,
                identifier: true,
                ..Default::default()
            })),
        }
    }

    fn parse_font_statement(&mut self) -> Result<FontStatement, ParseError> {
        let point_size = self.parse_expression()?.value as u16;
        self.skip_comma()?;
        let typeface = self.expect_string_literal()?;
        let mut font = FontStatement {
            point_size,
            typeface,
            weight: 0,
            italic: false,
            charset: 1, // DEFAULT_CHARSET
        };
        // `, weight, italic, charset` in turn, each optional.
        if self.token.id == TokenId::Comma {
            self.advance()?;
            if self.is_expression_start() {
                font.weight = self.parse_expression()?.value as u16;
            }
        }
        if self.token.id == TokenId::Comma {
            self.advance()?;
            if self.is_expression_start() {
                font.italic = self.parse_expression()?.value != 0;
            }
        }
        if self.token.id == TokenId::Comma {
            self.advance()?;
            if self.is_expression_start() {
                font.charset = self.parse_expression()?.value as u8;
            }
        }
        Ok(font)
    }

    fn parse_control(&mut self, ex: bool) -> Result<Control, ParseError> {
        if self.token.id != TokenId::Identifier {
            return Err(self.err_expected_types(ExpectedTypes {
                identifier: true,
                ..Default::default()
            }));
        }
        let Some(kind) = ControlKind::from_ident(self.slice()) else {
            return Err(self.err_expected_types(ExpectedTypes {
                identifier: true,
                ..Default::default()
            }));
        };
        self.advance()?;

        let mut text = None;
        if kind.has_text() {
            text = Some(match self.token.id {
                TokenId::QuotedAsciiString | TokenId::QuotedWideString => {
                    let literal = self.string_literal();
                    self.advance()?;
                    ControlText::String(literal)
                }
                _ if self.is_expression_start() => {
                    ControlText::Ordinal(self.parse_expression()?.value as u16)
                }
                _ => {
                    return Err(self.err_expected_types(ExpectedTypes {
                        number: true,
                        string_literal: true,
                        ..Default::default()
                    }));
                }
            });
            self.skip_comma()?;
        }

        let id_token = self.token;
        let id = self.parse_expression()?.value;
        self.skip_comma()?;

        let mut class = None;
        let mut style = None;
        if kind == ControlKind::Control {
            class = Some(match self.token.id {
                TokenId::QuotedAsciiString | TokenId::QuotedWideString => {
                    let literal = self.string_literal();
                    self.advance()?;
                    ControlClass::Name(literal)
                }
                TokenId::Identifier => {
                    let token = self.token;
                    self.advance()?;
                    ControlClass::Ident(token)
                }
                _ if self.is_expression_start() => {
                    ControlClass::Ordinal(self.parse_expression()?.value as u16)
                }
                _ => {
                    return Err(self.err_expected_types(ExpectedTypes {
                        identifier: true,
                        string_literal: true,
                        ..Default::default()
                    }));
                }
            });
            self.skip_comma()?;
            style = Some(self.parse_style_expression()?);
            self.skip_comma()?;
        }

        let x = self.parse_expression()?.value as i32;
        self.skip_comma()?;
        let y = self.parse_expression()?.value as i32;
        self.skip_comma()?;
        let width = self.parse_expression()?.value as i32;
        self.skip_comma()?;
        let height = self.parse_expression()?.value as i32;

        let mut control = Control {
            kind,
            text,
            id,
            id_token,
            x,
            y,
            width,
            height,
            style,
            exstyle: None,
            help_id: None,
            class,
        };

        if kind != ControlKind::Control && self.token.id == TokenId::Comma {
            self.advance()?;
            if self.is_expression_start() || self.is_kw("not") {
                control.style = Some(self.parse_style_expression()?);
            }
        }
        if self.token.id == TokenId::Comma {
            self.advance()?;
            if self.is_expression_start() || self.is_kw("not") {
                control.exstyle = Some(self.parse_style_expression()?);
            }
        }
        if ex && self.token.id == TokenId::Comma {
            self.advance()?;
            if self.is_expression_start() {
                control.help_id = Some(self.parse_expression()?.value);
            }
        }
        Ok(control)
    }

    fn parse_menu(&mut self, ex: bool) -> Result<Menu, ParseError> {
        let mut menu = Menu {
            ex,
            help_id: None,
            items: Vec::new(),
        };
        // MENUEX takes an optional helpid before the block.
        if ex && self.is_expression_start() {
            menu.help_id = Some(self.parse_expression()?.value);
        }
        menu.items = self.parse_menu_items(ex)?;
        Ok(menu)
    }

    fn parse_menu_items(&mut self, ex: bool) -> Result<Vec<MenuItem>, ParseError> {
        if !self.token.opens_block() {
            return Err(self.err_expected(TokenId::OpenBrace));
        }
        let open_token = self.token;
        self.advance()?;
        let mut items = Vec::new();
        loop {
            if self.token.closes_block() {
                self.advance()?;
                return Ok(items);
            }
            if self.token.id == TokenId::Eof {
                self.record(
                    ErrorCode::ExpectedToken,
                    open_token,
                    ErrorExtra::ExpectedTokenId(TokenId::End),
                );
                return Err(ParseError);
            }
            if self.is_kw("menuitem") {
                self.advance()?;
                if self.is_kw("separator") {
                    self.advance()?;
                    items.push(MenuItem::Separator);
                    continue;
                }
                let text = self.expect_string_literal()?;
                let mut item = MenuItemDef {
                    text,
                    id: 0,
                    flags: 0,
                    item_type: 0,
                    state: 0,
                };
                self.skip_comma()?;
                if self.is_expression_start() {
                    item.id = self.parse_expression()?.value;
                }
                if ex {
                    // `[, type [, state]]`
                    if self.token.id == TokenId::Comma {
                        self.advance()?;
                        if self.is_expression_start() {
                            item.item_type = self.parse_expression()?.value;
                        }
                    }
                    if self.token.id == TokenId::Comma {
                        self.advance()?;
                        if self.is_expression_start() {
                            item.state = self.parse_expression()?.value;
                        }
                    }
                } else {
                    item.flags = self.parse_menu_item_flags()?;
                }
                items.push(MenuItem::Item(item));
            } else if self.is_kw("popup") {
                self.advance()?;
                let text = self.expect_string_literal()?;
                let mut popup = PopupDef {
                    text,
                    id: 0,
                    flags: 0,
                    item_type: 0,
                    state: 0,
                    help_id: 0,
                    items: Vec::new(),
                };
                if ex {
                    // `[, id [, type [, state [, helpid]]]]`
                    for slot in 0..4 {
                        if self.token.id != TokenId::Comma {
                            break;
                        }
                        self.advance()?;
                        if !self.is_expression_start() {
                            continue;
                        }
                        let value = self.parse_expression()?.value;
                        match slot {
                            0 => popup.id = value,
                            1 => popup.item_type = value,
                            2 => popup.state = value,
                            _ => popup.help_id = value,
                        }
                    }
                } else {
                    popup.flags = self.parse_menu_item_flags()?;
                }
                popup.items = self.parse_menu_items(ex)?;
                items.push(MenuItem::Popup(popup));
            } else {
                return Err(self.err_expected_types(ExpectedTypes {
                    identifier: true,
                    ..Default::default()
                }));
            }
        }
    }

    fn parse_menu_item_flags(&mut self) -> Result<u16, ParseError> {
        let mut flags = 0u16;
        loop {
            if self.token.id == TokenId::Comma {
                self.advance()?;
                continue;
            }
            if self.token.id != TokenId::Identifier {
                return Ok(flags);
            }
            let Some(flag) = menu_flag_from_ident(self.slice()) else {
                return Ok(flags);
            };
            flags |= flag;
            self.advance()?;
        }
    }

    fn parse_accelerators(&mut self) -> Result<Vec<Accelerator>, ParseError> {
        if !self.token.opens_block() {
            return Err(self.err_expected(TokenId::OpenBrace));
        }
        let open_token = self.token;
        self.advance()?;
        let mut entries = Vec::new();
        loop {
            if self.token.closes_block() {
                self.advance()?;
                return Ok(entries);
            }
            if self.token.id == TokenId::Eof {
                self.record(
                    ErrorCode::ExpectedToken,
                    open_token,
                    ErrorExtra::ExpectedTokenId(TokenId::End),
                );
                return Err(ParseError);
            }
            let event_token = self.token;
            let event = match self.token.id {
                TokenId::QuotedAsciiString | TokenId::QuotedWideString => {
                    let literal = self.string_literal();
                    self.advance()?;
                    AcceleratorEvent::String(literal)
                }
                _ if self.is_expression_start() => {
                    AcceleratorEvent::Number(self.parse_expression()?.value)
                }
                _ => {
                    return Err(self.err_expected_types(ExpectedTypes {
                        number: true,
                        string_literal: true,
                        ..Default::default()
                    }));
                }
            };
            self.skip_comma()?;
            let id = self.parse_expression()?.value;
            let mut flags = 0u16;
            loop {
                if self.token.id == TokenId::Comma {
                    self.advance()?;
                    continue;
                }
                if self.token.id != TokenId::Identifier {
                    break;
                }
                let Some(flag) = accelerator_flag_from_ident(self.slice()) else {
                    break;
                };
                flags |= flag;
                self.advance()?;
            }
            entries.push(Accelerator {
                event,
                event_token,
                id,
                flags,
            });
        }
    }

    fn parse_version_info(&mut self) -> Result<VersionInfo, ParseError> {
        let mut info = VersionInfo::default();
        loop {
            if self.token.id != TokenId::Identifier {
                break;
            }
            if self.is_kw("fileversion") {
                self.advance()?;
                info.file_version = Some(self.parse_version_numbers()?);
            } else if self.is_kw("productversion") {
                self.advance()?;
                info.product_version = Some(self.parse_version_numbers()?);
            } else if self.is_kw("fileflagsmask") {
                self.advance()?;
                info.file_flags_mask = self.parse_expression()?.value;
            } else if self.is_kw("fileflags") {
                self.advance()?;
                info.file_flags = self.parse_expression()?.value;
            } else if self.is_kw("fileos") {
                self.advance()?;
                info.file_os = self.parse_expression()?.value;
            } else if self.is_kw("filetype") {
                self.advance()?;
                info.file_type = self.parse_expression()?.value;
            } else if self.is_kw("filesubtype") {
                self.advance()?;
                info.file_subtype = self.parse_expression()?.value;
            } else {
                break;
            }
        }
        if !self.token.opens_block() {
            return Err(self.err_expected(TokenId::OpenBrace));
        }
        self.advance()?;
        let mut root = Vec::new();
        loop {
            if self.token.closes_block() {
                self.advance()?;
                info.root = root;
                return Ok(info);
            }
            root.push(self.parse_version_node()?);
        }
    }

    /// Up to four comma-separated u16 parts; missing parts are zero.
    fn parse_version_numbers(&mut self) -> Result<[u16; 4], ParseError> {
        let mut parts = [0u16; 4];
        parts[0] = self.parse_expression()?.value as u16;
        for part in parts.iter_mut().skip(1) {
            if self.token.id != TokenId::Comma {
                break;
            }
            self.advance()?;
            if !self.is_expression_start() {
                break;
            }
            *part = self.parse_expression()?.value as u16;
        }
        Ok(parts)
    }

    fn parse_version_node(&mut self) -> Result<VersionNode, ParseError> {
        if self.is_kw("block") {
            self.advance()?;
            let key = self.expect_string_literal()?;
            if !self.token.opens_block() {
                return Err(self.err_expected(TokenId::OpenBrace));
            }
            let open_token = self.token;
            self.advance()?;
            let mut children = Vec::new();
            loop {
                if self.token.closes_block() {
                    self.advance()?;
                    return Ok(VersionNode::Block { key, children });
                }
                if self.token.id == TokenId::Eof {
                    self.record(
                        ErrorCode::ExpectedToken,
                        open_token,
                        ErrorExtra::ExpectedTokenId(TokenId::End),
                    );
                    return Err(ParseError);
                }
                children.push(self.parse_version_node()?);
            }
        }
        if self.is_kw("value") {
            self.advance()?;
            let key = self.expect_string_literal()?;
            let mut values = Vec::new();
            loop {
                if self.token.id == TokenId::Comma {
                    self.advance()?;
                    continue;
                }
                if self.token.is_string_literal() {
                    values.push(DataEntry::String(self.string_literal()));
                    self.advance()?;
                } else if self.is_expression_start() {
                    values.push(DataEntry::Number(self.parse_expression()?));
                } else {
                    return Ok(VersionNode::Value { key, values });
                }
            }
        }
        Err(self.err_expected_types(ExpectedTypes {
            identifier: true,
            ..Default::default()
        }))
    }
}

fn memory_flag_from_ident(bytes: &[u8]) -> Option<MemoryFlag> {
    use keywords::eq_ignore_case as eq;
    Some(match bytes.first()?.to_ascii_lowercase() {
        b'm' if eq(bytes, "moveable") => MemoryFlag::Moveable,
        b'f' if eq(bytes, "fixed") => MemoryFlag::Fixed,
        b'p' if eq(bytes, "pure") => MemoryFlag::Pure,
        b'i' if eq(bytes, "impure") => MemoryFlag::Impure,
        b'p' if eq(bytes, "preload") => MemoryFlag::Preload,
        b'l' if eq(bytes, "loadoncall") => MemoryFlag::Loadoncall,
        b'd' if eq(bytes, "discardable") => MemoryFlag::Discardable,
        b's' if eq(bytes, "shared") => MemoryFlag::Shared,
        b'n' if eq(bytes, "nonshared") => MemoryFlag::Nonshared,
        _ => return None,
    })
}

fn menu_flag_from_ident(bytes: &[u8]) -> Option<u16> {
    use keywords::eq_ignore_case as eq;
    // MF_* values.
    Some(match bytes.first()?.to_ascii_lowercase() {
        b'c' if eq(bytes, "checked") => 0x0008,
        b'g' if eq(bytes, "grayed") => 0x0001,
        b'h' if eq(bytes, "help") => 0x4000,
        b'i' if eq(bytes, "inactive") => 0x0002,
        b'm' if eq(bytes, "menubarbreak") => 0x0020,
        b'm' if eq(bytes, "menubreak") => 0x0040,
        _ => return None,
    })
}

fn accelerator_flag_from_ident(bytes: &[u8]) -> Option<u16> {
    use keywords::eq_ignore_case as eq;
    // FVIRTKEY etc.; ASCII is accepted but adds no flag.
    Some(match bytes.first()?.to_ascii_lowercase() {
        b'a' if eq(bytes, "ascii") => 0x00,
        b'a' if eq(bytes, "alt") => 0x10,
        b'v' if eq(bytes, "virtkey") => 0x01,
        b'n' if eq(bytes, "noinvert") => 0x02,
        b's' if eq(bytes, "shift") => 0x04,
        b'c' if eq(bytes, "control") => 0x08,
        _ => return None,
    })
}
