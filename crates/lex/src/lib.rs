pub mod keywords;
mod lexer;
pub mod token;

pub use keywords::{Keyword, ResourceType};
pub use lexer::{LexError, LexErrorCode, Lexer, LexerOptions};
pub use token::{parse_number_literal, NumberLiteral, Token, TokenId};

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<Token> {
        let mut lx = Lexer::new(src.as_bytes(), LexerOptions::default());
        let mut toks = Vec::new();
        loop {
            let t = lx.next().unwrap();
            let done = t.id == TokenId::Eof;
            toks.push(t);
            if done {
                break;
            }
        }
        toks
    }

    #[test]
    fn lex_resource_definition() {
        let toks = lex_all("A RCDATA { 1, \"x\" }");
        let ids: Vec<TokenId> = toks.iter().map(|t| t.id).collect();
        assert_eq!(
            ids,
            vec![
                TokenId::Identifier,
                TokenId::Identifier,
                TokenId::OpenBrace,
                TokenId::Number,
                TokenId::Comma,
                TokenId::QuotedAsciiString,
                TokenId::CloseBrace,
                TokenId::Eof,
            ]
        );
    }

    #[test]
    fn begin_end_are_case_insensitive() {
        let toks = lex_all("Begin eND beginning");
        assert_eq!(toks[0].id, TokenId::Begin);
        assert_eq!(toks[1].id, TokenId::End);
        assert_eq!(toks[2].id, TokenId::Identifier);
    }

    #[test]
    fn line_numbers_match_newline_count() {
        let src = "a\nb\r\nc\rd";
        let toks = lex_all(src);
        assert_eq!(toks[0].line_number, 1);
        assert_eq!(toks[1].line_number, 2);
        // \r alone is not a newline, so c and d share line 3.
        assert_eq!(toks[2].line_number, 3);
        assert_eq!(toks[3].line_number, 3);
        for t in &toks {
            let newlines = src.as_bytes()[..t.start].iter().filter(|&&b| b == b'\n').count();
            assert_eq!(t.line_number, 1 + newlines);
        }
    }

    #[test]
    fn spans_index_into_source() {
        let src = "hello \"wo\"";
        let toks = lex_all(src);
        assert_eq!(toks[0].slice(src.as_bytes()), b"hello");
        assert_eq!(toks[1].slice(src.as_bytes()), b"\"wo\"");
    }

    #[test]
    fn wide_string_prefix() {
        let toks = lex_all("L\"wide\" l\"also\" Lnot");
        assert_eq!(toks[0].id, TokenId::QuotedWideString);
        assert_eq!(toks[1].id, TokenId::QuotedWideString);
        assert_eq!(toks[2].id, TokenId::Identifier);
    }

    #[test]
    fn doubled_quote_is_escape() {
        let toks = lex_all("\"a\"\"b\"");
        assert_eq!(toks[0].id, TokenId::QuotedAsciiString);
        assert_eq!(toks[0].end, 6);
        assert_eq!(toks[1].id, TokenId::Eof);
    }

    #[test]
    fn c_style_escaped_quote_is_an_error() {
        let mut lx = Lexer::new(b"\"a\\\"b\"", LexerOptions::default());
        let err = lx.next().unwrap_err();
        assert_eq!(err.code, LexErrorCode::FoundCStyleEscapedQuote);
    }

    #[test]
    fn unfinished_string_literal() {
        let mut lx = Lexer::new(b"\"abc", LexerOptions::default());
        assert_eq!(
            lx.next().unwrap_err().code,
            LexErrorCode::UnfinishedStringLiteral
        );
        let mut lx = Lexer::new(b"\"abc\ndef\"", LexerOptions::default());
        assert_eq!(
            lx.next().unwrap_err().code,
            LexErrorCode::UnfinishedStringLiteral
        );
    }

    #[test]
    fn string_literal_length_limit() {
        let options = LexerOptions {
            max_string_literal_codepoints: 3,
            ..Default::default()
        };
        let mut lx = Lexer::new(b"\"abc\"", options);
        assert_eq!(lx.next().unwrap().id, TokenId::QuotedAsciiString);
        let mut lx = Lexer::new(b"\"abcd\"", options);
        assert_eq!(
            lx.next().unwrap_err().code,
            LexErrorCode::StringLiteralTooLong(3)
        );
    }

    #[test]
    fn illegal_bytes() {
        let mut lx = Lexer::new(&[0x01], LexerOptions::default());
        assert_eq!(
            lx.next().unwrap_err().code,
            LexErrorCode::IllegalByteOutsideStringLiterals
        );
        let mut lx = Lexer::new(&[0x00], LexerOptions::default());
        assert_eq!(lx.next().unwrap_err().code, LexErrorCode::IllegalByte);
        // Inside a string literal the low controls are tolerated, NUL is not.
        let mut lx = Lexer::new(b"\"\x01\"", LexerOptions::default());
        assert!(lx.next().is_ok());
        let mut lx = Lexer::new(b"\"\x00\"", LexerOptions::default());
        assert_eq!(lx.next().unwrap_err().code, LexErrorCode::IllegalByte);
    }

    #[test]
    fn code_page_pragma_switches_decoding() {
        let src = b"#pragma code_page(65001)\nx";
        let mut lx = Lexer::new(src, LexerOptions::default());
        assert_eq!(lx.next().unwrap().id, TokenId::Identifier);
        assert_eq!(lx.current_code_page(), codepage::CodePage::Utf8);
    }

    #[test]
    fn code_page_pragma_invalid_is_recoverable() {
        let src = b"#pragma code_page(99999)\nx";
        let mut lx = Lexer::new(src, LexerOptions::default());
        let err = lx.next().unwrap_err();
        assert_eq!(err.code, LexErrorCode::InvalidCodePage(99999));
        // The pragma line was consumed; lexing can continue.
        let t = lx.next().unwrap();
        assert_eq!(t.id, TokenId::Identifier);
        assert_eq!(t.line_number, 2);
    }

    #[test]
    fn code_page_pragma_unsupported() {
        let src = b"#pragma code_page(936)\n";
        let mut lx = Lexer::new(src, LexerOptions::default());
        assert_eq!(
            lx.next().unwrap_err().code,
            LexErrorCode::UnsupportedCodePage(936)
        );
    }

    #[test]
    fn expression_operator_tokens() {
        let ids: Vec<TokenId> = lex_all("(1 + 2) | ~3 & -4")
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                TokenId::OpenParen,
                TokenId::Number,
                TokenId::Plus,
                TokenId::Number,
                TokenId::CloseParen,
                TokenId::Pipe,
                TokenId::Tilde,
                TokenId::Number,
                TokenId::Amp,
                TokenId::Minus,
                TokenId::Number,
                TokenId::Eof,
            ]
        );
    }

    #[test]
    fn unquoted_filename_is_one_identifier() {
        let toks = lex_all("icons\\app-v2.ico next");
        assert_eq!(toks[0].slice(b"icons\\app-v2.ico next"), b"icons\\app-v2.ico");
        assert_eq!(toks[1].id, TokenId::Identifier);
    }
}
