//! SPARQL tokenizer built on winnow.
//!
//! Produces tokens with byte spans into the source so the parser can keep the
//! exact text of every clause, including the whitespace and comments between
//! them.

use winnow::combinator::alt;
use winnow::error::{ContextError, ErrMode};
use winnow::stream::{Location, Stream};
use winnow::token::{any, take, take_while};
use winnow::{LocatingSlice, ModalResult, Parser};

use crate::error::QueryParseError;

/// Input type for the lexer - tracks position for spans.
pub type Input<'a> = LocatingSlice<&'a str>;

/// Byte range `[start, end)` of a token in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    fn new(kind: TokenKind, start: usize, end: usize) -> Self {
        Token {
            kind,
            span: Span { start, end },
        }
    }

    /// True for a bare word equal to `keyword`, ignoring ASCII case.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        matches!(&self.kind, TokenKind::Symbol(s) if *s == symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Integer,
    Decimal,
    Double,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `<...>`, stored without the angle brackets
    Iri(String),
    /// `prefix:local`
    PrefixedName { prefix: String, local: String },
    /// `prefix:` with no local part, as used in `PREFIX` declarations
    PrefixNs(String),
    /// `?name` or `$name`, stored without the sigil
    Var(String),
    /// String literal, unescaped
    String(String),
    /// `@en-GB`, stored without the `@`
    LangTag(String),
    Number { lexical: String, kind: NumberKind },
    /// `_:label`, stored without the `_:`
    BlankNode(String),
    /// Keywords, function names, `a`, `true`, `false`
    Word(String),
    Symbol(&'static str),
    Eof,
}

/// Tokenize a whole query, failing on the first invalid token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, QueryParseError> {
    let mut tokens = Vec::new();
    let mut input = LocatingSlice::new(source);

    loop {
        skip_ws_and_comments(&mut input);

        let start = input.current_token_start();
        if input.is_empty() {
            tokens.push(Token::new(TokenKind::Eof, start, start));
            break;
        }

        match next_token(&mut input) {
            Ok(kind) => {
                let end = input.current_token_start();
                tokens.push(Token::new(kind, start, end));
            }
            Err(_) => {
                let bad_char = source[start..].chars().next().unwrap_or('?');
                let message = match bad_char {
                    '"' | '\'' => "unterminated string literal".to_string(),
                    _ => format!("unexpected character '{}'", bad_char),
                };
                return Err(QueryParseError::at(source, start, message));
            }
        }
    }

    Ok(tokens)
}

fn backtrack<T>() -> ModalResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_iri_char(c: char) -> bool {
    !matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | '\x00'..='\x20')
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic()
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn is_varname_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\u{00B7}'
}

fn is_local_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.' | '%' | '\\')
}

fn skip_ws_and_comments(input: &mut Input<'_>) {
    loop {
        let _: ModalResult<&str> = take_while(0.., is_ws).parse_next(input);
        if input.starts_with('#') {
            let _: ModalResult<&str> = take_while(0.., |c: char| c != '\n').parse_next(input);
        } else {
            break;
        }
    }
}

fn next_token(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    alt((
        parse_iri_ref,
        parse_var,
        parse_blank_node,
        parse_string_literal,
        parse_lang_tag,
        parse_number,
        parse_prefixed_name_or_word,
        parse_symbol,
    ))
    .parse_next(input)
}

fn parse_iri_ref(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let start = input.checkpoint();
    '<'.parse_next(input)?;
    let iri: &str = take_while(0.., is_iri_char).parse_next(input)?;
    if !input.starts_with('>') {
        input.reset(&start);
        return backtrack();
    }
    let iri = iri.to_string();
    '>'.parse_next(input)?;
    Ok(TokenKind::Iri(iri))
}

fn parse_var(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let start = input.checkpoint();
    alt(('?', '$')).parse_next(input)?;
    let name: ModalResult<&str> = take_while(1.., is_varname_char).parse_next(input);
    match name {
        Ok(name) => Ok(TokenKind::Var(name.to_string())),
        Err(_) => {
            input.reset(&start);
            backtrack()
        }
    }
}

fn parse_blank_node(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    "_:".parse_next(input)?;
    let label: &str = take_while(1.., is_name_char).parse_next(input)?;
    Ok(TokenKind::BlankNode(label.to_string()))
}

fn parse_lang_tag(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    '@'.parse_next(input)?;
    let tag: &str =
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)?;
    Ok(TokenKind::LangTag(tag.to_string()))
}

fn parse_string_literal(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let quote = match input.chars().next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return backtrack(),
    };
    let long: String = std::iter::repeat(quote).take(3).collect();
    if input.starts_with(long.as_str()) {
        take(3usize).parse_next(input)?;
        let mut value = String::new();
        loop {
            if input.starts_with(long.as_str()) {
                take(3usize).parse_next(input)?;
                return Ok(TokenKind::String(value));
            }
            let c = any.parse_next(input)?;
            if c == '\\' {
                value.push(parse_escape(input)?);
            } else {
                value.push(c);
            }
        }
    }

    any.parse_next(input)?;
    let mut value = String::new();
    loop {
        let c = any.parse_next(input)?;
        match c {
            c if c == quote => return Ok(TokenKind::String(value)),
            '\\' => value.push(parse_escape(input)?),
            '\n' | '\r' => return backtrack(),
            c => value.push(c),
        }
    }
}

fn parse_escape(input: &mut Input<'_>) -> ModalResult<char> {
    let c = any.parse_next(input)?;
    match c {
        't' => Ok('\t'),
        'n' => Ok('\n'),
        'r' => Ok('\r'),
        'b' => Ok('\u{08}'),
        'f' => Ok('\u{0C}'),
        '"' | '\'' | '\\' => Ok(c),
        'u' | 'U' => {
            let len = if c == 'u' { 4usize } else { 8usize };
            let hex: &str = take(len).parse_next(input)?;
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map_or_else(backtrack, Ok)
        }
        _ => backtrack(),
    }
}

fn parse_number(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let rest: &str = input.as_ref();
    let bytes = rest.as_bytes();
    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let int_len = digits(0);
    if int_len == 0 {
        return backtrack();
    }
    let mut len = int_len;
    let mut kind = NumberKind::Integer;

    if bytes.get(len) == Some(&b'.') {
        let frac_len = digits(len + 1);
        if frac_len > 0 {
            len += 1 + frac_len;
            kind = NumberKind::Decimal;
        }
    }
    if matches!(bytes.get(len), Some(b'e') | Some(b'E')) {
        let mut exp = len + 1;
        if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        let exp_len = digits(exp);
        if exp_len > 0 {
            len = exp + exp_len;
            kind = NumberKind::Double;
        }
    }

    let lexical: &str = take(len).parse_next(input)?;
    Ok(TokenKind::Number {
        lexical: lexical.to_string(),
        kind,
    })
}

fn parse_prefixed_name_or_word(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let rest: &str = input.as_ref();
    let prefix = match rest.chars().next() {
        Some(':') => String::new(),
        Some(c) if is_name_start(c) => {
            // Names may contain '.', but never end with one: `ex:p ?o.` ends a triple.
            let mut len = 0;
            for (i, c) in rest.char_indices() {
                if is_name_char(c) || c == '.' {
                    len = i + c.len_utf8();
                } else {
                    break;
                }
            }
            let chars = rest[..len].trim_end_matches('.').chars().count();
            let word: &str = take(chars).parse_next(input)?;
            if !input.starts_with(':') {
                return Ok(TokenKind::Word(word.to_string()));
            }
            word.to_string()
        }
        _ => return backtrack(),
    };

    ':'.parse_next(input)?;
    let local = parse_local_name(input)?;
    if local.is_empty() {
        Ok(TokenKind::PrefixNs(prefix))
    } else {
        Ok(TokenKind::PrefixedName { prefix, local })
    }
}

fn parse_local_name(input: &mut Input<'_>) -> ModalResult<String> {
    let rest: &str = input.as_ref();
    let mut len = 0;
    for (i, c) in rest.char_indices() {
        if is_local_char(c) {
            len = i + c.len_utf8();
        } else {
            break;
        }
    }
    // A local name never ends with '.'
    let chars = rest[..len].trim_end_matches('.').chars().count();
    let raw: &str = take(chars).parse_next(input)?;
    Ok(raw.replace('\\', ""))
}

fn parse_symbol(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    const TWO: [&str; 6] = ["^^", "!=", "<=", ">=", "&&", "||"];
    const ONE: [&str; 21] = [
        "{", "}", "(", ")", "[", "]", ".", ",", ";", "=", "<", ">", "!", "+", "-", "*", "/",
        "|", "^", "?", "@",
    ];
    for symbol in TWO.iter().chain(ONE.iter()) {
        if input.starts_with(symbol) {
            take(symbol.len()).parse_next(input)?;
            return Ok(TokenKind::Symbol(*symbol));
        }
    }
    backtrack()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_triple_with_trailing_dot() {
        assert_eq!(
            kinds("?p ex:age ?a."),
            vec![
                TokenKind::Var("p".into()),
                TokenKind::PrefixedName {
                    prefix: "ex".into(),
                    local: "age".into()
                },
                TokenKind::Var("a".into()),
                TokenKind::Symbol("."),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_variable_sigils() {
        assert_eq!(
            kinds("?s $o ? "),
            vec![
                TokenKind::Var("s".into()),
                TokenKind::Var("o".into()),
                TokenKind::Symbol("?"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_prefix_declaration() {
        assert_eq!(
            kinds("PREFIX ex: <http://example.org/ns#>"),
            vec![
                TokenKind::Word("PREFIX".into()),
                TokenKind::PrefixNs("ex".into()),
                TokenKind::Iri("http://example.org/ns#".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_iri_versus_less_than() {
        let tokens = kinds("FILTER(?a < 10 && ?b <= 3)");
        assert!(tokens.contains(&TokenKind::Symbol("<")));
        assert!(tokens.contains(&TokenKind::Symbol("<=")));
        assert!(tokens.contains(&TokenKind::Symbol("&&")));
        assert!(!tokens.iter().any(|t| matches!(t, TokenKind::Iri(_))));
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds(r#""chat"@en-GB 'it\'s' 42 4.5 1e3"#),
            vec![
                TokenKind::String("chat".into()),
                TokenKind::LangTag("en-GB".into()),
                TokenKind::String("it's".into()),
                TokenKind::Number {
                    lexical: "42".into(),
                    kind: NumberKind::Integer
                },
                TokenKind::Number {
                    lexical: "4.5".into(),
                    kind: NumberKind::Decimal
                },
                TokenKind::Number {
                    lexical: "1e3".into(),
                    kind: NumberKind::Double
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans_skip_comments() {
        let source = "# header\n?s # trailing\n.";
        let tokens = tokenize(source).unwrap();
        assert_eq!(&source[tokens[0].span.start..tokens[0].span.end], "?s");
        assert_eq!(&source[tokens[1].span.start..tokens[1].span.end], ".");
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let err = tokenize("SELECT * WHERE { ?s ?p \"open }").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unterminated string"));
    }
}
