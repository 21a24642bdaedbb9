use std::{iter::Peekable, str::Chars};

use crate::{
    error::{ErrorMsg, SyntaxError},
    token::{Token, TokenKind},
};

#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    stream: Peekable<Chars<'a>>,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            stream: source.chars().peekable(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Produces the next token. Never fails: anything unrecognisable
    /// becomes an ILLEGAL token, and EOF repeats forever once reached.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.column;
        let Some(c) = self.advance() else {
            return self.make_token(TokenKind::EOF);
        };
        if let Some(kind) = self
            .stream
            .peek()
            .and_then(|&next| TokenKind::from_pair(c, next))
        {
            self.advance();
            return self.make_token(kind);
        }
        if c == '"' {
            return self.lex_string();
        }
        if c.is_ascii_digit() {
            return self.lex_number();
        }
        if c.is_ascii_alphabetic() || c == '_' {
            return self.lex_ident();
        }
        match TokenKind::from_char(c) {
            Some(kind) => self.make_token(kind),
            None => self.make_token(TokenKind::ILLEGAL),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            if self
                .advance_if(|c| c == ' ' || c == '\t' || c == '\r' || c == '\n')
                .is_some()
            {
                continue;
            }
            if self.advance_if(|c| c == '#').is_some() {
                self.advance_while(|c| c != '\n');
                continue;
            }
            break;
        }
    }

    fn lex_ident(&mut self) -> Token {
        self.advance_while(|c| c.is_ascii_alphanumeric() || c == '_');
        match TokenKind::from_keyword(self.lexeme()) {
            Some(kind) => self.make_token(kind),
            None => self.make_token(TokenKind::IDENT),
        }
    }

    /// Digit-and-dot runs with more than one dot are kept whole and
    /// flagged ILLEGAL, so `1.2.3` is one bad token rather than three.
    fn lex_number(&mut self) -> Token {
        self.advance_while(|c| c.is_ascii_digit() || c == '.');
        if self.lexeme().bytes().filter(|&b| b == b'.').count() > 1 {
            self.make_token(TokenKind::ILLEGAL)
        } else {
            self.make_token(TokenKind::NUMBER)
        }
    }

    fn lex_string(&mut self) -> Token {
        let mut text = String::new();
        let mut bad_escape = false;
        loop {
            let Some(c) = self.advance() else {
                // Unterminated
                return self.make_token(TokenKind::ILLEGAL);
            };
            match c {
                '"' => break,
                '\\' => match self.advance() {
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some('n') => text.push('\n'),
                    Some(_) => bad_escape = true,
                    None => return self.make_token(TokenKind::ILLEGAL),
                },
                _ => text.push(c),
            }
        }
        if bad_escape {
            self.make_token(TokenKind::ILLEGAL)
        } else {
            Token::new(TokenKind::STRING, text, self.start_line, self.start_column)
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme(), self.start_line, self.start_column)
    }

    fn lexeme(&self) -> &str {
        &self.source[self.start..self.current]
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.stream.next()?;
        self.current += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += c.len_utf8();
        }
        Some(c)
    }

    fn advance_if<F>(&mut self, cond: F) -> Option<char>
    where
        F: FnOnce(char) -> bool,
    {
        if self.stream.peek().filter(|&&c| cond(c)).is_some() {
            self.advance()
        } else {
            None
        }
    }

    fn advance_while<F>(&mut self, cond: F) -> Option<usize>
    where
        F: Fn(char) -> bool,
    {
        let mut count: usize = 0;
        while self.stream.peek().filter(|&&c| cond(c)).is_some() {
            count += 1;
            self.advance();
        }
        count.ne(&0).then_some(count)
    }
}

/// Eagerly drains a lexer into a replayable buffer, recording every
/// ILLEGAL token so lex errors can be reported in one batch before
/// parsing starts.
#[derive(Debug, Default)]
pub struct Collector {
    tokens: Vec<Token>,
    illegal: Vec<Token>,
    pos: usize,
}

impl Collector {
    pub fn collect(mut lexer: Lexer) -> Self {
        let mut tokens = Vec::default();
        let mut illegal = Vec::default();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::EOF;
            if token.kind == TokenKind::ILLEGAL {
                illegal.push(token.clone());
            }
            tokens.push(token);
            if done {
                break;
            }
        }
        Self {
            tokens,
            illegal,
            pos: 0,
        }
    }

    /// All lexed tokens, the trailing EOF included.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn check(&self) -> Result<(), Vec<SyntaxError>> {
        if self.illegal.is_empty() {
            return Ok(());
        }
        Err(self
            .illegal
            .iter()
            .map(|t| SyntaxError::new(ErrorMsg::IllegalToken, t))
            .collect())
    }

    pub fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token();
            if t.kind == TokenKind::EOF {
                break;
            }
            out.push(t.kind);
        }
        out
    }

    #[rstest]
    #[case("+", TokenKind::PLUS)]
    #[case("-", TokenKind::MINUS)]
    #[case("*", TokenKind::STAR)]
    #[case("/", TokenKind::SLASH)]
    #[case("//", TokenKind::SLASH_SLASH)]
    #[case("%", TokenKind::PERCENT)]
    #[case("^", TokenKind::CARET)]
    #[case("==", TokenKind::EQUAL_EQUAL)]
    #[case("!=", TokenKind::BANG_EQUAL)]
    #[case("<=", TokenKind::LESS_EQUAL)]
    #[case(">=", TokenKind::GREATER_EQUAL)]
    #[case("&&", TokenKind::AND)]
    #[case("||", TokenKind::OR)]
    #[case("=", TokenKind::ASSIGN)]
    #[case("!", TokenKind::BANG)]
    #[case("?", TokenKind::QUESTION)]
    #[case(":", TokenKind::COLON)]
    #[case("let", TokenKind::LET)]
    #[case("fn", TokenKind::FN)]
    #[case("repeat", TokenKind::REPEAT)]
    #[case("until", TokenKind::UNTIL)]
    #[case("export", TokenKind::EXPORT)]
    #[case("nil", TokenKind::NIL)]
    #[case("lettuce", TokenKind::IDENT)]
    #[case("_under", TokenKind::IDENT)]
    fn single_tokens(#[case] source: &str, #[case] expected: TokenKind) {
        assert_eq!(kinds(source), vec![expected]);
    }

    #[test]
    fn numbers() {
        let mut lexer = Lexer::new("42 3.14");
        let a = lexer.next_token();
        let b = lexer.next_token();
        assert_eq!((a.kind, a.lexeme.as_str()), (TokenKind::NUMBER, "42"));
        assert_eq!((b.kind, b.lexeme.as_str()), (TokenKind::NUMBER, "3.14"));
    }

    #[test]
    fn number_with_two_dots_is_illegal() {
        let mut lexer = Lexer::new("1.2.3");
        let t = lexer.next_token();
        assert_eq!((t.kind, t.lexeme.as_str()), (TokenKind::ILLEGAL, "1.2.3"));
        assert_eq!(lexer.next_token().kind, TokenKind::EOF);
    }

    #[test]
    fn string_escapes() {
        let mut lexer = Lexer::new(r#""a\"b\\c\nd""#);
        let t = lexer.next_token();
        assert_eq!(t.kind, TokenKind::STRING);
        assert_eq!(t.lexeme, "a\"b\\c\nd");
    }

    #[rstest]
    #[case(r#""bad \t escape""#)]
    #[case(r#""unterminated"#)]
    #[case("@")]
    fn illegal_tokens(#[case] source: &str) {
        assert_eq!(kinds(source), vec![TokenKind::ILLEGAL]);
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        let source = "let x = 1; # the answer\nx";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::LET,
                TokenKind::IDENT,
                TokenKind::ASSIGN,
                TokenKind::NUMBER,
                TokenKind::SEMICOLON,
                TokenKind::IDENT,
            ]
        );
    }

    #[test]
    fn positions() {
        let mut lexer = Lexer::new("let x\n  = 1");
        let t = lexer.next_token();
        assert_eq!((t.line, t.column), (1, 1));
        let t = lexer.next_token();
        assert_eq!((t.line, t.column), (1, 5));
        let t = lexer.next_token();
        assert_eq!((t.line, t.column), (2, 3));
        let t = lexer.next_token();
        assert_eq!((t.line, t.column), (2, 5));
    }

    #[test]
    fn eof_repeats() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next_token().kind, TokenKind::EOF);
        assert_eq!(lexer.next_token().kind, TokenKind::EOF);
    }

    #[test]
    fn collector_batches_illegal_tokens() {
        let collector = Collector::collect(Lexer::new("let $ = ~;"));
        let errors = collector.check().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].column, 5);
        assert_eq!(errors[1].column, 9);
    }

    #[test]
    fn collector_replays() {
        let mut collector = Collector::collect(Lexer::new("1 + 2"));
        assert!(collector.check().is_ok());
        let first = collector.next().cloned();
        collector.reset();
        assert_eq!(collector.next().cloned(), first);
        // 3 tokens plus EOF
        assert_eq!(collector.tokens().len(), 4);
    }
}
