use crate::{
    ast::{
        Block, DocEntry, Expr, FnKind, InfixOp, LogicalOp, PrefixOp, Program, Stmt, StmtKind,
    },
    error::{ErrorMsg, SyntaxError},
    token::{Token, TokenKind},
};
use std::rc::Rc;

/// Binding powers, weakest first. Infix parsing continues while the
/// next operator binds tighter than the current level, and parses its
/// right operand at its own level, so every infix operator is
/// left-associative, the power operator included.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
enum Prec {
    Lowest,
    Ternary,
    Or,
    And,
    Cmp,
    Sum,
    Product,
    Prefix,
    Power,
    Postfix,
}

fn precedence(kind: TokenKind) -> Prec {
    match kind {
        TokenKind::QUESTION => Prec::Ternary,
        TokenKind::OR => Prec::Or,
        TokenKind::AND => Prec::And,
        TokenKind::EQUAL_EQUAL
        | TokenKind::BANG_EQUAL
        | TokenKind::LESS
        | TokenKind::LESS_EQUAL
        | TokenKind::GREATER
        | TokenKind::GREATER_EQUAL => Prec::Cmp,
        TokenKind::PLUS | TokenKind::MINUS => Prec::Sum,
        TokenKind::STAR | TokenKind::SLASH | TokenKind::SLASH_SLASH | TokenKind::PERCENT => {
            Prec::Product
        }
        TokenKind::CARET => Prec::Power,
        TokenKind::LPAREN | TokenKind::LBRACKET | TokenKind::DOT => Prec::Postfix,
        _ => Prec::Lowest,
    }
}

/// The parser works on the collector's buffered token slice (the
/// trailing EOF included) rather than an iterator, because brace
/// disambiguation needs arbitrary lookahead and rewind.
#[derive(Debug)]
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        debug_assert!(tokens.last().is_some_and(|t| t.kind == TokenKind::EOF));
        Self { tokens, pos: 0 }
    }

    /// Parses the whole stream, resynchronising at statement
    /// boundaries after an error so that every error in the source is
    /// reported in one pass. A partial program is never returned.
    pub fn parse_all(mut self) -> Result<Program, Vec<SyntaxError>> {
        let mut stmts = Vec::default();
        let mut errors = Vec::default();
        while self.peek().kind != TokenKind::EOF {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    errors.push(e);
                    self.sync();
                }
            }
        }
        errors.is_empty().then_some(Program { stmts }).ok_or(errors)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let (line, column) = {
            let t = self.peek();
            (t.line, t.column)
        };
        let (kind, needs_semi) = match self.peek().kind {
            TokenKind::LET => (self.parse_let()?, true),
            TokenKind::FN if self.peek_at(1).kind == TokenKind::IDENT => {
                (self.parse_fn_stmt()?, false)
            }
            TokenKind::RETURN => (self.parse_return()?, true),
            TokenKind::BREAK => {
                self.advance();
                (StmtKind::Break, true)
            }
            TokenKind::CONTINUE => {
                self.advance();
                (StmtKind::Continue, true)
            }
            TokenKind::IMPORT => (self.parse_import()?, true),
            TokenKind::EXPORT => {
                self.advance();
                (StmtKind::Export(self.parse_expr(Prec::Lowest)?), true)
            }
            _ => {
                let expr = self.parse_expr(Prec::Lowest)?;
                if self.peek().kind == TokenKind::ASSIGN {
                    let eq = self.advance().clone();
                    if !matches!(
                        expr,
                        Expr::Ident(_)
                            | Expr::Property { .. }
                            | Expr::Index { .. }
                            | Expr::Slice { .. }
                            | Expr::Key { .. }
                    ) {
                        return Err(SyntaxError::raw(
                            format!("{} {expr}", ErrorMsg::InvalidAssignment),
                            eq.line,
                            eq.column,
                        ));
                    }
                    let value = self.parse_expr(Prec::Lowest)?;
                    (
                        StmtKind::Assign {
                            target: expr,
                            value,
                        },
                        true,
                    )
                } else {
                    // Statements that end in a closing brace stand on
                    // their own without a semicolon.
                    let semi = !matches!(
                        expr,
                        Expr::Block(_)
                            | Expr::Loop { .. }
                            | Expr::While { .. }
                            | Expr::Repeat { .. }
                            | Expr::For { .. }
                    );
                    (StmtKind::Expr(expr), semi)
                }
            }
        };
        if needs_semi {
            self.expect_terminator()?;
        } else {
            self.advance_if(|t| t.kind == TokenKind::SEMICOLON);
        }
        Ok(Stmt { kind, line, column })
    }

    fn parse_let(&mut self) -> Result<StmtKind, SyntaxError> {
        // Consume the `let` keyword
        self.advance();
        let name = self
            .advance_or_err(TokenKind::IDENT, ErrorMsg::InvalidIdent)?
            .lexeme;
        self.advance_or_err(TokenKind::ASSIGN, ErrorMsg::UnexpectedToken)?;
        let value = self.parse_expr(Prec::Lowest)?;
        Ok(StmtKind::Let { name, value })
    }

    /// `fn name(a, b) { .. }` desugars to `let name = fn(a, b) { .. }`.
    fn parse_fn_stmt(&mut self) -> Result<StmtKind, SyntaxError> {
        // Consume the `fn` keyword
        self.advance();
        let name = self
            .advance_or_err(TokenKind::IDENT, ErrorMsg::InvalidIdent)?
            .lexeme;
        let (params, body) = self.parse_fn_rest()?;
        Ok(StmtKind::Let {
            name,
            value: Expr::FnLit {
                params,
                body: Rc::new(body),
                kind: FnKind::Function,
            },
        })
    }

    fn parse_return(&mut self) -> Result<StmtKind, SyntaxError> {
        // Consume the `return` keyword
        self.advance();
        if matches!(
            self.peek().kind,
            TokenKind::SEMICOLON | TokenKind::RBRACE | TokenKind::EOF
        ) {
            return Ok(StmtKind::Return(None));
        }
        Ok(StmtKind::Return(Some(self.parse_expr(Prec::Lowest)?)))
    }

    fn parse_import(&mut self) -> Result<StmtKind, SyntaxError> {
        // Consume the `import` keyword
        self.advance();
        let mut path = vec![self
            .advance_or_err(TokenKind::IDENT, ErrorMsg::InvalidIdent)?
            .lexeme];
        while self.advance_if(|t| t.kind == TokenKind::DOT).is_some() {
            path.push(
                self.advance_or_err(TokenKind::IDENT, ErrorMsg::InvalidIdent)?
                    .lexeme,
            );
        }
        Ok(StmtKind::Import(path))
    }

    fn parse_expr(&mut self, prec: Prec) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_prefix()?;
        loop {
            let kind = self.peek().kind;
            if kind == TokenKind::LBRACE {
                if self.brace_is_key_access() {
                    lhs = self.parse_key_access(lhs)?;
                    continue;
                }
                if prec < Prec::Ternary {
                    lhs = self.parse_loop_postfix(lhs)?;
                    continue;
                }
                break;
            }
            let next = precedence(kind);
            if next == Prec::Lowest || next <= prec {
                break;
            }
            lhs = match kind {
                TokenKind::QUESTION => self.parse_ternary(lhs)?,
                TokenKind::LPAREN => self.parse_call(lhs)?,
                TokenKind::LBRACKET => self.parse_index_or_slice(lhs)?,
                TokenKind::DOT => self.parse_property(lhs)?,
                TokenKind::AND | TokenKind::OR => {
                    let op = LogicalOp::from_token(self.advance().kind)
                        .expect("non-logical operators cannot be present here");
                    Expr::Logical {
                        lhs: Box::new(lhs),
                        op,
                        rhs: Box::new(self.parse_expr(next)?),
                    }
                }
                _ => {
                    let op = InfixOp::from_token(self.advance().kind)
                        .expect("non-infix operators cannot be present here");
                    Expr::Infix {
                        lhs: Box::new(lhs),
                        op,
                        rhs: Box::new(self.parse_expr(next)?),
                    }
                }
            };
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, SyntaxError> {
        if let Some(t) = self.advance_if(|t| {
            matches!(
                t.kind,
                TokenKind::BANG | TokenKind::NOT | TokenKind::MINUS
            )
        }) {
            let op = PrefixOp::from_token(t.kind)
                .expect("non-prefix operators cannot be present here");
            return Ok(Expr::Prefix {
                op,
                expr: Box::new(self.parse_expr(Prec::Prefix)?),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let t = self.advance().clone();
        let expr = match t.kind {
            TokenKind::NUMBER => Expr::Number(
                t.lexeme
                    .parse()
                    .expect("lexed number literals always parse"),
            ),
            TokenKind::STRING => Expr::Str(t.lexeme),
            TokenKind::TRUE => Expr::Boolean(true),
            TokenKind::FALSE => Expr::Boolean(false),
            TokenKind::NIL => Expr::Nil,
            TokenKind::IDENT => Expr::Ident(t.lexeme),
            TokenKind::LPAREN => {
                let inner = self.parse_expr(Prec::Lowest)?;
                self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingParen)?;
                inner
            }
            TokenKind::LBRACKET => self.parse_list()?,
            TokenKind::LBRACE => {
                self.pos -= 1;
                if self.brace_is_doc() {
                    self.parse_doc()?
                } else {
                    self.advance();
                    Expr::Block(self.parse_block_rest()?)
                }
            }
            TokenKind::FN => {
                let (params, body) = self.parse_fn_rest()?;
                Expr::FnLit {
                    params,
                    body: Rc::new(body),
                    kind: FnKind::Lambda,
                }
            }
            TokenKind::WHILE => {
                let cond = self.parse_expr(Prec::Lowest)?;
                self.advance_or_err(TokenKind::DO, ErrorMsg::UnexpectedToken)?;
                self.advance_or_err(TokenKind::LBRACE, ErrorMsg::MissingBrace)?;
                Expr::While {
                    cond: Box::new(cond),
                    body: self.parse_block_rest()?,
                }
            }
            TokenKind::REPEAT => {
                self.advance_or_err(TokenKind::LBRACE, ErrorMsg::MissingBrace)?;
                let body = self.parse_block_rest()?;
                self.advance_or_err(TokenKind::UNTIL, ErrorMsg::UnexpectedToken)?;
                Expr::Repeat {
                    body,
                    until: Box::new(self.parse_expr(Prec::Lowest)?),
                }
            }
            TokenKind::FOR => {
                let binding = if self.peek().kind == TokenKind::IDENT
                    && self.peek_at(1).kind == TokenKind::IN
                {
                    let name = self.advance().lexeme.clone();
                    self.advance();
                    Some(name)
                } else {
                    None
                };
                let iterable = self.parse_expr(Prec::Lowest)?;
                self.advance_or_err(TokenKind::DO, ErrorMsg::UnexpectedToken)?;
                self.advance_or_err(TokenKind::LBRACE, ErrorMsg::MissingBrace)?;
                Expr::For {
                    binding,
                    iterable: Box::new(iterable),
                    body: self.parse_block_rest()?,
                }
            }
            _ => return Err(SyntaxError::new(ErrorMsg::UnexpectedToken, &t)),
        };
        Ok(expr)
    }

    /// Parameter list and body of a function literal, after `fn [name]`.
    fn parse_fn_rest(&mut self) -> Result<(Vec<String>, Block), SyntaxError> {
        self.advance_or_err(TokenKind::LPAREN, ErrorMsg::UnexpectedToken)?;
        let mut params = vec![];
        while self.peek().kind != TokenKind::RPAREN {
            params.push(
                self.advance_or_err(TokenKind::IDENT, ErrorMsg::InvalidIdent)?
                    .lexeme,
            );
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                break;
            }
        }
        self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingParen)?;
        self.advance_or_err(TokenKind::LBRACE, ErrorMsg::MissingBrace)?;
        Ok((params, self.parse_block_rest()?))
    }

    /// Statements up to and including the closing brace. The opening
    /// brace has already been consumed.
    fn parse_block_rest(&mut self) -> Result<Block, SyntaxError> {
        let mut stmts = Vec::default();
        while !matches!(self.peek().kind, TokenKind::RBRACE | TokenKind::EOF) {
            stmts.push(self.parse_stmt()?);
        }
        self.advance_or_err(TokenKind::RBRACE, ErrorMsg::MissingBrace)?;
        Ok(Block { stmts })
    }

    fn parse_list(&mut self) -> Result<Expr, SyntaxError> {
        let mut items = vec![];
        while self.peek().kind != TokenKind::RBRACKET {
            items.push(self.parse_expr(Prec::Lowest)?);
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                break;
            }
        }
        self.advance_or_err(TokenKind::RBRACKET, ErrorMsg::MissingBracket)?;
        Ok(Expr::List(items))
    }

    fn parse_doc(&mut self) -> Result<Expr, SyntaxError> {
        // Consume the opening brace
        self.advance();
        let mut entries = vec![];
        while self.peek().kind != TokenKind::RBRACE {
            let entry = if self.peek().kind == TokenKind::IDENT
                && self.peek_at(1).kind == TokenKind::ASSIGN
            {
                let name = self.advance().lexeme.clone();
                self.advance();
                let mut value = self.parse_expr(Prec::Lowest)?;
                // Function literals in attribute position are methods
                // of the document under construction.
                if let Expr::FnLit { kind, .. } = &mut value {
                    *kind = FnKind::Method;
                }
                DocEntry::Attr { name, value }
            } else {
                let key = self.parse_expr(Prec::Lowest)?;
                self.advance_or_err(TokenKind::COLON, ErrorMsg::UnexpectedToken)?;
                DocEntry::Key {
                    key,
                    value: self.parse_expr(Prec::Lowest)?,
                }
            };
            entries.push(entry);
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                break;
            }
        }
        self.advance_or_err(TokenKind::RBRACE, ErrorMsg::MissingBrace)?;
        Ok(Expr::Doc(entries))
    }

    fn parse_ternary(&mut self, cond: Expr) -> Result<Expr, SyntaxError> {
        // Consume the question mark
        self.advance();
        let then = self.parse_expr(Prec::Lowest)?;
        let otherwise = if self.advance_if(|t| t.kind == TokenKind::COLON).is_some() {
            Some(Box::new(self.parse_expr(Prec::Lowest)?))
        } else {
            None
        };
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise,
        })
    }

    fn parse_call(&mut self, callee: Expr) -> Result<Expr, SyntaxError> {
        // Consume the opening parenthesis
        self.advance();
        let mut args = vec![];
        while self.peek().kind != TokenKind::RPAREN {
            args.push(self.parse_expr(Prec::Lowest)?);
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                break;
            }
        }
        self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingParen)?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
        })
    }

    fn parse_index_or_slice(&mut self, obj: Expr) -> Result<Expr, SyntaxError> {
        // Consume the opening bracket
        self.advance();
        let start = (self.peek().kind != TokenKind::COLON)
            .then(|| self.parse_expr(Prec::Lowest))
            .transpose()?;
        if self.advance_if(|t| t.kind == TokenKind::COLON).is_none() {
            self.advance_or_err(TokenKind::RBRACKET, ErrorMsg::MissingBracket)?;
            let index = start.ok_or_else(|| {
                SyntaxError::new(ErrorMsg::UnexpectedToken, self.peek())
            })?;
            return Ok(Expr::Index {
                obj: Box::new(obj),
                index: Box::new(index),
            });
        }
        let end = (self.peek().kind != TokenKind::RBRACKET)
            .then(|| self.parse_expr(Prec::Lowest))
            .transpose()?;
        self.advance_or_err(TokenKind::RBRACKET, ErrorMsg::MissingBracket)?;
        Ok(Expr::Slice {
            obj: Box::new(obj),
            start: start.map(Box::new),
            end: end.map(Box::new),
        })
    }

    fn parse_property(&mut self, obj: Expr) -> Result<Expr, SyntaxError> {
        // Consume the dot
        self.advance();
        let name = self
            .advance_or_err(TokenKind::IDENT, ErrorMsg::InvalidIdent)?
            .lexeme;
        Ok(Expr::Property {
            obj: Box::new(obj),
            name,
        })
    }

    fn parse_key_access(&mut self, obj: Expr) -> Result<Expr, SyntaxError> {
        // Consume the opening brace
        self.advance();
        let key = self.parse_expr(Prec::Lowest)?;
        self.advance_or_err(TokenKind::RBRACE, ErrorMsg::MissingBrace)?;
        Ok(Expr::Key {
            obj: Box::new(obj),
            key: Box::new(key),
        })
    }

    fn parse_loop_postfix(&mut self, cond: Expr) -> Result<Expr, SyntaxError> {
        // Consume the opening brace
        self.advance();
        Ok(Expr::Loop {
            cond: Box::new(cond),
            body: self.parse_block_rest()?,
        })
    }

    /// A postfix brace group is a key access when it holds a single
    /// expression: nothing at nesting depth one that could only belong
    /// to a statement. Everything else is a loop body. A body like
    /// `{ f() }` is indistinguishable from a key and reads as one;
    /// a trailing semicolon forces the loop reading.
    fn brace_is_key_access(&self) -> bool {
        let mut depth = 0usize;
        for t in &self.tokens[self.pos..] {
            match t.kind {
                TokenKind::LBRACE => depth += 1,
                TokenKind::RBRACE => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::SEMICOLON
                | TokenKind::ASSIGN
                | TokenKind::LET
                | TokenKind::RETURN
                | TokenKind::BREAK
                | TokenKind::CONTINUE
                | TokenKind::IMPORT
                | TokenKind::EXPORT
                    if depth == 1 =>
                {
                    return false;
                }
                TokenKind::EOF => break,
                _ => {}
            }
        }
        // An empty group cannot be a key
        self.peek_at(1).kind != TokenKind::RBRACE
    }

    /// Speculatively parses past the opening brace to decide between a
    /// document literal and a block expression, then rewinds. A
    /// document starts with `expr : expr`, or `ident = expr` followed
    /// by a comma or the closing brace.
    fn brace_is_doc(&mut self) -> bool {
        let mark = self.pos;
        // Consume the opening brace
        self.advance();
        let is_doc = self.speculate_doc_entry();
        self.pos = mark;
        is_doc
    }

    fn speculate_doc_entry(&mut self) -> bool {
        if self.peek().kind == TokenKind::RBRACE {
            return false;
        }
        if self.peek().kind == TokenKind::IDENT && self.peek_at(1).kind == TokenKind::ASSIGN {
            self.advance();
            self.advance();
            if self.parse_expr(Prec::Lowest).is_err() {
                return false;
            }
            return matches!(self.peek().kind, TokenKind::COMMA | TokenKind::RBRACE);
        }
        match self.parse_expr(Prec::Lowest) {
            Ok(_) => self.peek().kind == TokenKind::COLON,
            Err(_) => false,
        }
    }

    fn expect_terminator(&mut self) -> Result<(), SyntaxError> {
        if self
            .advance_if(|t| t.kind == TokenKind::SEMICOLON)
            .is_some()
            || matches!(self.peek().kind, TokenKind::RBRACE | TokenKind::EOF)
        {
            Ok(())
        } else {
            Err(SyntaxError::new(ErrorMsg::MissingSemicolon, self.peek()))
        }
    }

    fn sync(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::SEMICOLON => {
                    self.advance();
                    return;
                }
                TokenKind::LET
                | TokenKind::FN
                | TokenKind::WHILE
                | TokenKind::REPEAT
                | TokenKind::FOR
                | TokenKind::RETURN
                | TokenKind::BREAK
                | TokenKind::CONTINUE
                | TokenKind::IMPORT
                | TokenKind::EXPORT
                | TokenKind::RBRACE
                | TokenKind::EOF => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// The trailing EOF token is sticky, so peeking never runs off the
    /// end of the slice.
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> &Token {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        self.pos = (self.pos + 1).min(self.tokens.len());
        t
    }

    fn advance_if<F>(&mut self, cond: F) -> Option<Token>
    where
        F: FnOnce(&Token) -> bool,
    {
        if cond(self.peek()) && self.peek().kind != TokenKind::EOF {
            Some(self.advance().clone())
        } else {
            None
        }
    }

    fn advance_or_err(&mut self, kind: TokenKind, msg: ErrorMsg) -> Result<Token, SyntaxError> {
        if self.peek().kind == kind {
            Ok(self.advance().clone())
        } else {
            Err(SyntaxError::new(msg, self.peek()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::{Collector, Lexer};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse(source: &str) -> Program {
        let collector = Collector::collect(Lexer::new(source));
        collector.check().unwrap();
        Parser::new(collector.tokens()).parse_all().unwrap()
    }

    fn canon(source: &str) -> String {
        parse(source)
            .stmts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn parse_err(source: &str) -> Vec<SyntaxError> {
        let collector = Collector::collect(Lexer::new(source));
        collector.check().unwrap();
        Parser::new(collector.tokens()).parse_all().unwrap_err()
    }

    #[rstest]
    #[case("1 + 2 * 3;", "((1 + (2 * 3)));")]
    #[case("1 * 2 + 3;", "(((1 * 2) + 3));")]
    #[case("1 - 2 - 3;", "(((1 - 2) - 3));")]
    #[case("7 // 2 % 3;", "(((7 // 2) % 3));")]
    #[case("2 ^ 3 ^ 2;", "(((2 ^ 3) ^ 2));")]
    #[case("-2 ^ 2;", "((-(2 ^ 2)));")]
    #[case("!a == b;", "(((!a) == b));")]
    #[case("not a and b;", "(((!a) and b));")]
    #[case("a or b and c;", "((a or (b and c)));")]
    #[case("a < b == c > d;", "((((a < b) == c) > d));")]
    #[case("a + b < c * d;", "(((a + b) < (c * d)));")]
    fn precedence_ladder(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(canon(source), expected);
    }

    #[rstest]
    #[case("a.b[1](2, 3);", "a.b[1](2, 3);")]
    #[case("s[1:2];", "s[1:2];")]
    #[case("s[:2];", "s[:2];")]
    #[case("s[1:];", "s[1:];")]
    #[case("s[:];", "s[:];")]
    #[case("d{\"k\"};", "d{\"k\"};")]
    #[case("d{1 + 2};", "d{(1 + 2)};")]
    fn postfix_chains(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(canon(source), expected);
    }

    #[test]
    fn ternary() {
        assert_eq!(canon("x ? 1 : 2;"), "((x ? 1 : 2));");
        assert_eq!(canon("x ? 1;"), "((x ? 1 : nil));");
        assert_eq!(
            canon("a == 1 ? { 2; } : 3;"),
            "(((a == 1) ? { 2; } : 3));"
        );
    }

    #[test]
    fn let_and_assign() {
        assert_eq!(canon("let x = 1; x = 2;"), "let x = 1; x = 2;");
        assert_eq!(canon("a[0] = 1;"), "a[0] = 1;");
        assert_eq!(canon("a.b = 1;"), "a.b = 1;");
        assert_eq!(canon("a{\"k\"} = 1;"), "a{\"k\"} = 1;");
        assert_eq!(canon("a[1:2] = b;"), "a[1:2] = b;");
    }

    #[test]
    fn invalid_assignment_target() {
        let errors = parse_err("1 + 2 = 3;");
        assert!(errors[0].message.contains("cannot assign to"));
    }

    #[test]
    fn named_fn_desugars_to_let() {
        assert_eq!(
            canon("fn add(a, b) { return a + b; }"),
            "let add = fn(a, b) { return (a + b); };"
        );
    }

    #[test]
    fn loops() {
        assert_eq!(
            canon("while x < 3 do { x = x + 1; }"),
            "while (x < 3) do { x = x + 1; };"
        );
        assert_eq!(
            canon("repeat { x = x + 1; } until x == 3;"),
            "repeat { x = x + 1; } until (x == 3);"
        );
        assert_eq!(
            canon("for v in items do { print(v); }"),
            "for v in items do { print(v); };"
        );
        assert_eq!(canon("for items do { nop(); }"), "for items do { nop(); };");
    }

    #[test]
    fn dual_mode_loop_vs_key_access() {
        // A semicolon inside the braces forces the loop reading
        assert_eq!(canon("n { total = total + 1; }"), "n { total = total + 1; };");
        assert_eq!(canon("3 { f(); }"), "3 { f(); };");
        // A single bare expression reads as a key access
        assert_eq!(canon("d{k};"), "d{k};");
    }

    #[test]
    fn doc_vs_block() {
        assert_eq!(canon("{\"a\": 1, \"b\": 2};"), "{\"a\": 1, \"b\": 2};");
        assert_eq!(canon("{x = 1, y = 2};"), "{x = 1, y = 2};");
        assert_eq!(canon("{ let x = 1; x + 1; }"), "{ let x = 1; (x + 1); };");
        assert_eq!(canon("{};"), "{ };");
    }

    #[test]
    fn doc_attr_fn_is_method() {
        let program = parse("let d = {inc = fn(n) { return n + 1; }};");
        let StmtKind::Let { value: Expr::Doc(entries), .. } = &program.stmts[0].kind else {
            panic!("expected a document literal");
        };
        let DocEntry::Attr { value: Expr::FnLit { kind, .. }, .. } = &entries[0] else {
            panic!("expected an attribute entry holding a function");
        };
        assert_eq!(*kind, FnKind::Method);
    }

    #[test]
    fn lambda_outside_doc_stays_lambda() {
        let program = parse("let f = fn(n) { return n; };");
        let StmtKind::Let { value: Expr::FnLit { kind, .. }, .. } = &program.stmts[0].kind else {
            panic!("expected a function literal");
        };
        assert_eq!(*kind, FnKind::Lambda);
    }

    #[test]
    fn import_export() {
        assert_eq!(canon("import a.b.c;"), "import a.b.c;");
        assert_eq!(canon("export 1 + 2;"), "export (1 + 2);");
    }

    #[test]
    fn list_literal() {
        assert_eq!(canon("[1, \"two\", [3]];"), "[1, \"two\", [3]];");
    }

    #[test]
    fn stmt_positions() {
        let program = parse("let x = 1;\n  x = 2;");
        assert_eq!((program.stmts[0].line, program.stmts[0].column), (1, 1));
        assert_eq!((program.stmts[1].line, program.stmts[1].column), (2, 3));
    }

    #[test]
    fn errors_accumulate_across_statements() {
        let errors = parse_err("let = 1; let y 2;");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn missing_paren() {
        let errors = parse_err("(1 + 2;");
        assert!(errors[0].message.contains("missing closing parenthesis"));
    }

    #[test]
    fn missing_semicolon() {
        let errors = parse_err("let x = 1 let y = 2;");
        assert!(errors[0].message.contains("missing semicolon"));
    }
}
