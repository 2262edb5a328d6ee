/*
 * Binding Expression Parser
 *
 * Recursive descent parser for binding expressions. Parsed expressions are
 * cached per parser instance, keyed by source text and flags, so a binding
 * source is parsed once per application rather than once per binding.
 */

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bitflags::bitflags;

use super::ast::*;
use super::lexer::{Lexer, Token, EOF};
use crate::error::ParseError;

bitflags! {
    /// Parse flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParseFlags: u8 {
        /// Action expressions (event handlers) may contain assignments.
        const ACTION = 1 << 0;
    }
}

/// Parser for binding expressions
#[derive(Default)]
pub struct ExpressionParser {
    lexer: Lexer,
    cache: RefCell<HashMap<(String, u8), Rc<Expression>>>,
    interpolation_cache: RefCell<HashMap<String, Rc<Expression>>>,
}

impl ExpressionParser {
    pub fn new() -> Self {
        ExpressionParser {
            lexer: Lexer::new(),
            cache: RefCell::new(HashMap::new()),
            interpolation_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Parse a binding expression (property binding source).
    pub fn parse_binding(&self, input: &str) -> Result<Rc<Expression>, ParseError> {
        self.parse(input, ParseFlags::empty())
    }

    /// Parse an action expression (event handler).
    pub fn parse_action(&self, input: &str) -> Result<Rc<Expression>, ParseError> {
        self.parse(input, ParseFlags::ACTION)
    }

    pub fn parse(&self, input: &str, flags: ParseFlags) -> Result<Rc<Expression>, ParseError> {
        let key = (input.to_string(), flags.bits());
        if let Some(found) = self.cache.borrow().get(&key) {
            return Ok(found.clone());
        }
        let tokens = self.lexer.tokenize(input);
        for token in &tokens {
            if token.is_error() {
                return Err(ParseError::new(
                    ParseSpan::new(token.index, token.end),
                    token.str_value.clone(),
                ));
            }
        }
        let mut parse = ParseAst::new(input, tokens, flags);
        let expression = parse.parse_expression()?;
        parse.expect_end()?;
        let expression = Rc::new(expression);
        self.cache.borrow_mut().insert(key, expression.clone());
        Ok(expression)
    }

    /// Split `${expr}` segments out of template text. Returns `None` for
    /// plain text with no interpolation.
    pub fn parse_interpolation(&self, input: &str) -> Result<Option<Rc<Expression>>, ParseError> {
        if let Some(found) = self.interpolation_cache.borrow().get(input) {
            return Ok(Some(found.clone()));
        }
        let Some((parts, raw_expressions)) = split_interpolation(input)? else {
            return Ok(None);
        };
        let mut expressions = Vec::with_capacity(raw_expressions.len());
        for (source, offset) in raw_expressions {
            let parsed = self.parse(&source, ParseFlags::empty()).map_err(|e| {
                ParseError::new(
                    ParseSpan::new(e.span.start + offset, e.span.end + offset),
                    e.message,
                )
            })?;
            expressions.push((*parsed).clone());
        }
        let interpolation = Rc::new(Expression::Interpolation(Interpolation {
            span: ParseSpan::new(0, input.len()),
            parts,
            expressions,
        }));
        self.interpolation_cache
            .borrow_mut()
            .insert(input.to_string(), interpolation.clone());
        Ok(Some(interpolation))
    }

    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len() + self.interpolation_cache.borrow().len()
    }
}

type SplitResult = Option<(Vec<String>, Vec<(String, usize)>)>;

fn split_interpolation(input: &str) -> Result<SplitResult, ParseError> {
    let len = input.len();
    let mut parts = Vec::new();
    let mut expressions: Vec<(String, usize)> = Vec::new();
    let mut part_start = 0;
    let mut i = 0;

    while i < len {
        if input[i..].starts_with("${") {
            parts.push(input[part_start..i].to_string());
            let expr_start = i + 2;
            i = expr_start;
            let mut depth = 1;
            let mut quote: Option<char> = None;
            while i < len {
                let Some(ch) = input[i..].chars().next() else {
                    break;
                };
                if let Some(q) = quote {
                    if ch == '\\' {
                        i += 1;
                        if let Some(escaped) = input.get(i..).and_then(|s| s.chars().next()) {
                            i += escaped.len_utf8();
                        }
                        continue;
                    }
                    if ch == q {
                        quote = None;
                    }
                    i += ch.len_utf8();
                    continue;
                }
                match ch {
                    '\'' | '"' => quote = Some(ch),
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                i += ch.len_utf8();
            }
            if depth != 0 {
                return Err(ParseError::new(
                    ParseSpan::new(expr_start - 2, len),
                    "unterminated interpolation",
                ));
            }
            expressions.push((input[expr_start..i].to_string(), expr_start));
            i += 1;
            part_start = i;
            continue;
        }
        i += input[i..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
    }

    if expressions.is_empty() {
        return Ok(None);
    }
    parts.push(input[part_start..].to_string());
    Ok(Some((parts, expressions)))
}

/// One parse over a token stream.
struct ParseAst {
    input: String,
    tokens: Vec<Token>,
    index: usize,
    last_end: usize,
    flags: ParseFlags,
    eof: Token,
}

impl ParseAst {
    fn new(input: &str, tokens: Vec<Token>, flags: ParseFlags) -> Self {
        ParseAst {
            input: input.to_string(),
            tokens,
            index: 0,
            last_end: 0,
            flags,
            eof: EOF,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.index).unwrap_or(&self.eof)
    }

    fn peek_ahead(&self, n: usize) -> &Token {
        self.tokens.get(self.index + n).unwrap_or(&self.eof)
    }

    fn next_token(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() {
            self.last_end = token.end;
            self.index += 1;
        }
        token
    }

    fn start(&self) -> usize {
        let token = self.peek();
        if token.is_end() {
            self.input.len()
        } else {
            token.index
        }
    }

    fn span_from(&self, start: usize) -> ParseSpan {
        ParseSpan::new(start, self.last_end)
    }

    fn consume_optional_character(&mut self, ch: char) -> bool {
        if self.peek().is_character(ch) {
            self.next_token();
            true
        } else {
            false
        }
    }

    fn expect_character(&mut self, ch: char) -> Result<(), ParseError> {
        if self.consume_optional_character(ch) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{}'", ch)))
        }
    }

    fn consume_optional_operator(&mut self, operator: &str) -> bool {
        if self.peek().is_operator(operator) {
            self.next_token();
            true
        } else {
            false
        }
    }

    fn consume_binary_operator(&mut self, operators: &[&str]) -> Option<BinaryOp> {
        for operator in operators {
            if self.peek().is_operator(operator) {
                self.next_token();
                return BinaryOp::from_operator(operator);
            }
        }
        None
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if self.peek().is_identifier() {
            Ok(self.next_token().str_value)
        } else {
            Err(self.unexpected("expected identifier"))
        }
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        if self.peek().is_end() {
            Ok(())
        } else {
            Err(self.unexpected("expected end of expression"))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        if token.is_end() {
            ParseError::new(
                ParseSpan::new(self.input.len(), self.input.len()),
                format!("{}, found end of expression", expected),
            )
        } else {
            let text = if token.is_number() {
                token.num_value.to_string()
            } else {
                token.str_value.clone()
            };
            ParseError::new(
                ParseSpan::new(token.index, token.end),
                format!("{}, found '{}'", expected, text),
            )
        }
    }

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let target = self.parse_conditional()?;
        if self.consume_optional_operator("=") {
            if !self.flags.contains(ParseFlags::ACTION) {
                return Err(ParseError::new(
                    self.span_from(start),
                    "assignment is only allowed in action expressions",
                ));
            }
            if !target.is_assignable() {
                return Err(ParseError::new(
                    target.span(),
                    format!("expression of kind `{}` is not assignable", target.kind_name()),
                ));
            }
            let value = self.parse_assign()?;
            return Ok(Expression::Assign(Assign {
                span: self.span_from(start),
                target: Box::new(target),
                value: Box::new(value),
            }));
        }
        Ok(target)
    }

    fn parse_conditional(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let condition = self.parse_logical_or()?;
        if self.consume_optional_character('?') {
            let yes = self.parse_assign()?;
            self.expect_character(':')?;
            let no = self.parse_assign()?;
            return Ok(Expression::Conditional(Conditional {
                span: self.span_from(start),
                condition: Box::new(condition),
                yes: Box::new(yes),
                no: Box::new(no),
            }));
        }
        Ok(condition)
    }

    fn parse_logical_or(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_logical_and()?;
        while self.consume_optional_operator("||") {
            let right = self.parse_logical_and()?;
            left = self.binary(start, BinaryOp::LogicalOr, left, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_equality()?;
        while self.consume_optional_operator("&&") {
            let right = self.parse_equality()?;
            left = self.binary(start, BinaryOp::LogicalAnd, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_relational()?;
        while let Some(op) = self.consume_binary_operator(&["===", "!==", "==", "!="]) {
            let right = self.parse_relational()?;
            left = self.binary(start, op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_additive()?;
        while let Some(op) = self.consume_binary_operator(&["<=", ">=", "<", ">"]) {
            let right = self.parse_additive()?;
            left = self.binary(start, op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.consume_binary_operator(&["+", "-"]) {
            let right = self.parse_multiplicative()?;
            left = self.binary(start, op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut left = self.parse_unary()?;
        while let Some(op) = self.consume_binary_operator(&["*", "/", "%"]) {
            let right = self.parse_unary()?;
            left = self.binary(start, op, left, right);
        }
        Ok(left)
    }

    fn binary(&self, start: usize, operator: BinaryOp, left: Expression, right: Expression) -> Expression {
        Expression::Binary(Binary {
            span: self.span_from(start),
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let operator = if self.consume_optional_operator("!") {
            Some(UnaryOp::Not)
        } else if self.consume_optional_operator("-") {
            Some(UnaryOp::Negate)
        } else {
            None
        };
        match operator {
            Some(operator) => {
                let expr = self.parse_unary()?;
                Ok(Expression::Unary(Unary {
                    span: self.span_from(start),
                    operator,
                    expr: Box::new(expr),
                }))
            }
            None => self.parse_access_or_call(),
        }
    }

    fn parse_access_or_call(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let mut result = self.parse_primary()?;
        loop {
            if self.consume_optional_character('.') {
                let name = self.expect_identifier()?;
                if self.consume_optional_character('(') {
                    let args = self.parse_call_args()?;
                    result = Expression::CallMember(CallMember {
                        span: self.span_from(start),
                        object: Box::new(result),
                        name,
                        args,
                    });
                } else {
                    result = Expression::AccessMember(AccessMember {
                        span: self.span_from(start),
                        object: Box::new(result),
                        name,
                    });
                }
                continue;
            }
            if self.consume_optional_character('[') {
                let key = self.parse_expression()?;
                self.expect_character(']')?;
                result = Expression::AccessKeyed(AccessKeyed {
                    span: self.span_from(start),
                    object: Box::new(result),
                    key: Box::new(key),
                });
                continue;
            }
            break;
        }
        Ok(result)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let start = self.start();
        let token = self.peek().clone();

        if token.is_keyword("$this") || token.is_keyword("$parent") {
            return self.parse_scope_access(start);
        }
        if token.is_keyword("true") || token.is_keyword("false") {
            self.next_token();
            return Ok(self.literal(start, LiteralValue::Boolean(token.is_keyword("true"))));
        }
        if token.is_keyword("null") {
            self.next_token();
            return Ok(self.literal(start, LiteralValue::Null));
        }
        if token.is_keyword("undefined") {
            self.next_token();
            return Ok(self.literal(start, LiteralValue::Undefined));
        }
        if token.is_number() {
            self.next_token();
            return Ok(self.literal(start, LiteralValue::Number(token.num_value)));
        }
        if token.is_string() {
            self.next_token();
            return Ok(self.literal(start, LiteralValue::String(token.str_value)));
        }
        if token.is_identifier() {
            self.next_token();
            let name = token.str_value;
            if self.consume_optional_character('(') {
                let args = self.parse_call_args()?;
                return Ok(Expression::CallScope(CallScope {
                    span: self.span_from(start),
                    name,
                    args,
                    ancestor: 0,
                }));
            }
            return Ok(Expression::AccessScope(AccessScope {
                span: self.span_from(start),
                name,
                ancestor: 0,
            }));
        }
        if self.consume_optional_character('(') {
            let expression = self.parse_expression()?;
            self.expect_character(')')?;
            return Ok(expression);
        }
        if self.consume_optional_character('[') {
            let mut elements = Vec::new();
            if !self.consume_optional_character(']') {
                loop {
                    elements.push(self.parse_expression()?);
                    if !self.consume_optional_character(',') {
                        break;
                    }
                }
                self.expect_character(']')?;
            }
            return Ok(Expression::ArrayLiteral(ArrayLiteral {
                span: self.span_from(start),
                elements,
            }));
        }

        Err(self.unexpected("expected expression"))
    }

    /// `$this`, or a `$parent` chain, optionally followed by the accessed or
    /// called name it anchors.
    fn parse_scope_access(&mut self, start: usize) -> Result<Expression, ParseError> {
        let mut ancestor = if self.peek().is_keyword("$parent") { 1 } else { 0 };
        self.next_token();
        while self.peek().is_character('.') && self.peek_ahead(1).is_keyword("$parent") {
            self.next_token();
            self.next_token();
            ancestor += 1;
        }
        if self.peek().is_character('.') && self.peek_ahead(1).is_identifier() {
            self.next_token();
            let name = self.expect_identifier()?;
            if self.consume_optional_character('(') {
                let args = self.parse_call_args()?;
                return Ok(Expression::CallScope(CallScope {
                    span: self.span_from(start),
                    name,
                    args,
                    ancestor,
                }));
            }
            return Ok(Expression::AccessScope(AccessScope {
                span: self.span_from(start),
                name,
                ancestor,
            }));
        }
        Ok(Expression::AccessThis(AccessThis {
            span: self.span_from(start),
            ancestor,
        }))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut args = Vec::new();
        if self.consume_optional_character(')') {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.consume_optional_character(',') {
                break;
            }
        }
        self.expect_character(')')?;
        Ok(args)
    }

    fn literal(&self, start: usize, value: LiteralValue) -> Expression {
        Expression::Literal(Literal {
            span: self.span_from(start),
            value,
        })
    }
}
