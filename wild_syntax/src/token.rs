use std::fmt::Display;

/// The enum variants are in SCREAMING_SNAKE_CASE as they technically
/// represent constants, but Rust does not allow const enum variants.
#[allow(nonstandard_style)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenKind {
    // Symbols
    DOT,
    ASSIGN,
    SEMICOLON,
    COMMA,
    QUESTION,
    COLON,
    LPAREN,
    RPAREN,
    LBRACE,
    RBRACE,
    LBRACKET,
    RBRACKET,
    // Arithmetic
    PLUS,
    MINUS,
    STAR,
    SLASH,
    SLASH_SLASH,
    PERCENT,
    CARET,
    BANG,
    // Comparisons
    EQUAL_EQUAL,
    BANG_EQUAL,
    LESS,
    LESS_EQUAL,
    GREATER,
    GREATER_EQUAL,
    // Literals
    IDENT,
    NUMBER,
    STRING,
    // Keywords
    LET,
    FN,
    WHILE,
    DO,
    REPEAT,
    UNTIL,
    FOR,
    IN,
    RETURN,
    BREAK,
    CONTINUE,
    IMPORT,
    EXPORT,
    AND,
    OR,
    NOT,
    TRUE,
    FALSE,
    NIL,
    // Miscellaneous tokens
    ILLEGAL,
    EOF,
}

impl TokenKind {
    pub fn from_char(c: char) -> Option<Self> {
        let kind = match c {
            '.' => Self::DOT,
            '=' => Self::ASSIGN,
            ';' => Self::SEMICOLON,
            ',' => Self::COMMA,
            '?' => Self::QUESTION,
            ':' => Self::COLON,
            '(' => Self::LPAREN,
            ')' => Self::RPAREN,
            '{' => Self::LBRACE,
            '}' => Self::RBRACE,
            '[' => Self::LBRACKET,
            ']' => Self::RBRACKET,
            '+' => Self::PLUS,
            '-' => Self::MINUS,
            '*' => Self::STAR,
            '/' => Self::SLASH,
            '%' => Self::PERCENT,
            '^' => Self::CARET,
            '!' => Self::BANG,
            '<' => Self::LESS,
            '>' => Self::GREATER,
            _ => return None,
        };
        Some(kind)
    }

    /// Two-character operators, checked before the single-character table.
    pub fn from_pair(first: char, second: char) -> Option<Self> {
        let kind = match (first, second) {
            ('/', '/') => Self::SLASH_SLASH,
            ('=', '=') => Self::EQUAL_EQUAL,
            ('!', '=') => Self::BANG_EQUAL,
            ('<', '=') => Self::LESS_EQUAL,
            ('>', '=') => Self::GREATER_EQUAL,
            // Aliases for the `and`/`or` keywords
            ('&', '&') => Self::AND,
            ('|', '|') => Self::OR,
            _ => return None,
        };
        Some(kind)
    }

    pub fn from_keyword(kw: &str) -> Option<Self> {
        let kind = match kw {
            "let" => Self::LET,
            "fn" => Self::FN,
            "while" => Self::WHILE,
            "do" => Self::DO,
            "repeat" => Self::REPEAT,
            "until" => Self::UNTIL,
            "for" => Self::FOR,
            "in" => Self::IN,
            "return" => Self::RETURN,
            "break" => Self::BREAK,
            "continue" => Self::CONTINUE,
            "import" => Self::IMPORT,
            "export" => Self::EXPORT,
            "and" => Self::AND,
            "or" => Self::OR,
            "not" => Self::NOT,
            "true" => Self::TRUE,
            "false" => Self::FALSE,
            "nil" => Self::NIL,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.kind == TokenKind::EOF {
            f.write_str("end of file")
        } else {
            f.write_str(&self.lexeme)
        }
    }
}
