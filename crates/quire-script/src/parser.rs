//! Recursive-descent parser producing [`Expr`] and [`Stmt`] trees.

use crate::ScriptError;
use crate::ast::{BinaryOp, CompareOp, Expr, Stmt, Target, UnaryOp};
use crate::lexer::{Mode, Tok, Token, tokenize};
use crate::value::Value;

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "elif", "else", "for", "while", "break", "continue",
    "pass", "True", "False", "None", "true", "false", "none",
];

/// Parse a single expression.
pub(crate) fn parse_expression(src: &str) -> Result<Expr, ScriptError> {
    let mut parser = Parser::new(tokenize(src, Mode::Expression)?);
    let expr = parser.expr_list()?;
    parser.expect(&Tok::Eof, "end of expression")?;
    Ok(expr)
}

/// Parse a sequence of statements.
pub(crate) fn parse_statements(src: &str) -> Result<Vec<Stmt>, ScriptError> {
    let mut parser = Parser::new(tokenize(src, Mode::Statements)?);
    let mut stmts = Vec::new();
    while !parser.at(&Tok::Eof) {
        if parser.eat(&Tok::Newline) {
            continue;
        }
        if parser.at(&Tok::Indent) {
            return Err(parser.error("unexpected indent"));
        }
        stmts.push(parser.statement()?);
    }
    Ok(stmts)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map_or(&Tok::Eof, |token| &token.tok)
    }

    fn peek_next(&self) -> &Tok {
        self.tokens
            .get(self.pos + 1)
            .map_or(&Tok::Eof, |token| &token.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |token| token.line)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Tok::Name(name) if name == keyword)
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::syntax(self.line(), message)
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Result<(), ScriptError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {}", describe(self.peek()))))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ScriptError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{keyword}', found {}",
                describe(self.peek())
            )))
        }
    }

    fn identifier(&mut self) -> Result<String, ScriptError> {
        match self.peek() {
            Tok::Name(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            other => Err(self.error(format!("expected a name, found {}", describe(other)))),
        }
    }

    // Statements

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        if self.eat_keyword("if") {
            return self.if_statement();
        }
        if self.eat_keyword("for") {
            let target = self.target()?;
            self.expect_keyword("in")?;
            let iter = self.expr_list()?;
            let body = self.block()?;
            return Ok(Stmt::For { target, iter, body });
        }
        if self.eat_keyword("while") {
            let cond = self.expression()?;
            let body = self.block()?;
            return Ok(Stmt::While { cond, body });
        }
        let stmt = self.simple_statement()?;
        self.end_of_statement()?;
        Ok(stmt)
    }

    fn end_of_statement(&mut self) -> Result<(), ScriptError> {
        if self.eat(&Tok::Newline) || self.at(&Tok::Eof) || self.at(&Tok::Dedent) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected end of statement, found {}",
                describe(self.peek())
            )))
        }
    }

    fn simple_statement(&mut self) -> Result<Stmt, ScriptError> {
        if self.eat_keyword("pass") {
            return Ok(Stmt::Pass);
        }
        if self.eat_keyword("break") {
            return Ok(Stmt::Break);
        }
        if self.eat_keyword("continue") {
            return Ok(Stmt::Continue);
        }

        let expr = self.expr_list()?;
        if self.eat(&Tok::Assign) {
            let target = into_target(expr).ok_or_else(|| self.error("cannot assign to expression"))?;
            let value = self.expr_list()?;
            return Ok(Stmt::Assign(target, value));
        }
        if self.eat(&Tok::PlusAssign) {
            let Expr::Name(name) = expr else {
                return Err(self.error("augmented assignment requires a plain name"));
            };
            let value = self.expr_list()?;
            return Ok(Stmt::AugAssign(name, value));
        }
        Ok(Stmt::Expr(expr))
    }

    fn if_statement(&mut self) -> Result<Stmt, ScriptError> {
        let mut branches = Vec::new();
        let cond = self.expression()?;
        let body = self.block()?;
        branches.push((cond, body));

        let mut otherwise = Vec::new();
        loop {
            if self.eat_keyword("elif") {
                let cond = self.expression()?;
                let body = self.block()?;
                branches.push((cond, body));
            } else if self.eat_keyword("else") {
                otherwise = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If {
            branches,
            otherwise,
        })
    }

    /// `: simple_stmt NEWLINE` or `: NEWLINE INDENT stmt+ DEDENT`.
    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(&Tok::Colon, "':'")?;
        if !self.eat(&Tok::Newline) {
            let stmt = self.simple_statement()?;
            self.end_of_statement()?;
            return Ok(vec![stmt]);
        }
        self.expect(&Tok::Indent, "an indented block")?;
        let mut body = Vec::new();
        while !self.eat(&Tok::Dedent) {
            if self.at(&Tok::Eof) {
                break;
            }
            if self.eat(&Tok::Newline) {
                continue;
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn target(&mut self) -> Result<Target, ScriptError> {
        let first = self.identifier()?;
        if !self.at(&Tok::Comma) {
            return Ok(Target::Name(first));
        }
        let mut names = vec![first];
        while self.eat(&Tok::Comma) {
            names.push(self.identifier()?);
        }
        Ok(Target::Tuple(names))
    }

    // Expressions

    /// Comma-separated expressions; more than one forms a list.
    fn expr_list(&mut self) -> Result<Expr, ScriptError> {
        let first = self.expression()?;
        if !self.at(&Tok::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Tok::Comma) {
            if self.at_expression_end() {
                break;
            }
            items.push(self.expression()?);
        }
        Ok(Expr::List(items))
    }

    fn at_expression_end(&self) -> bool {
        matches!(
            self.peek(),
            Tok::Newline | Tok::Eof | Tok::Assign | Tok::Colon | Tok::Dedent
        )
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        let expr = self.or_expr()?;
        if self.eat_keyword("if") {
            let cond = self.or_expr()?;
            self.expect_keyword("else")?;
            let otherwise = self.expression()?;
            return Ok(Expr::IfElse {
                cond: Box::new(cond),
                then: Box::new(expr),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(expr)
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ScriptError> {
        if self.eat_keyword("not") {
            let operand = self.not_expr()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let left = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.compare_op() {
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare(Box::new(left), rest))
        }
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek() {
            Tok::Eq => CompareOp::Eq,
            Tok::Ne => CompareOp::Ne,
            Tok::Lt => CompareOp::Lt,
            Tok::Le => CompareOp::Le,
            Tok::Gt => CompareOp::Gt,
            Tok::Ge => CompareOp::Ge,
            Tok::Name(name) if name == "in" => CompareOp::In,
            Tok::Name(name) if name == "not" => {
                if matches!(self.peek_next(), Tok::Name(next) if next == "in") {
                    self.pos += 2;
                    return Some(CompareOp::NotIn);
                }
                return None;
            }
            Tok::Name(name) if name == "is" => {
                self.pos += 1;
                if self.eat_keyword("not") {
                    return Some(CompareOp::IsNot);
                }
                return Some(CompareOp::Is);
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn arith(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinaryOp::Add,
                Tok::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinaryOp::Mul,
                Tok::Slash => BinaryOp::Div,
                Tok::DoubleSlash => BinaryOp::FloorDiv,
                Tok::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Tok::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        if self.eat(&Tok::Plus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary(UnaryOp::Pos, Box::new(operand)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.atom()?;
        loop {
            if self.eat(&Tok::Dot) {
                let name = match self.advance() {
                    Tok::Name(name) => name,
                    other => {
                        return Err(self.error(format!(
                            "expected attribute name, found {}",
                            describe(&other)
                        )));
                    }
                };
                expr = Expr::Attribute(Box::new(expr), name);
            } else if self.eat(&Tok::LBracket) {
                expr = self.subscript(expr)?;
            } else if self.eat(&Tok::LParen) {
                let (args, kwargs) = self.call_args()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    kwargs,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn subscript(&mut self, target: Expr) -> Result<Expr, ScriptError> {
        let start = if self.at(&Tok::Colon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        if self.eat(&Tok::Colon) {
            let end = if self.at(&Tok::RBracket) {
                None
            } else {
                Some(Box::new(self.expression()?))
            };
            self.expect(&Tok::RBracket, "']'")?;
            return Ok(Expr::Slice {
                target: Box::new(target),
                start,
                end,
            });
        }
        self.expect(&Tok::RBracket, "']'")?;
        let index = start.ok_or_else(|| self.error("empty subscript"))?;
        Ok(Expr::Index(Box::new(target), index))
    }

    fn call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ScriptError> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while !self.eat(&Tok::RParen) {
            if let (Tok::Name(name), Tok::Assign) = (self.peek(), self.peek_next()) {
                let name = name.clone();
                self.pos += 2;
                kwargs.push((name, self.expression()?));
            } else if kwargs.is_empty() {
                args.push(self.expression()?);
            } else {
                return Err(self.error("positional argument follows keyword argument"));
            }
            if !self.eat(&Tok::Comma) {
                self.expect(&Tok::RParen, "')'")?;
                break;
            }
        }
        Ok((args, kwargs))
    }

    fn atom(&mut self) -> Result<Expr, ScriptError> {
        match self.advance() {
            Tok::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Tok::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Tok::Str(mut s) => {
                // adjacent literals concatenate
                while let Tok::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Literal(Value::Str(s)))
            }
            Tok::Name(name) => match name.as_str() {
                "True" | "true" => Ok(Expr::Literal(Value::Bool(true))),
                "False" | "false" => Ok(Expr::Literal(Value::Bool(false))),
                "None" | "none" => Ok(Expr::Literal(Value::None)),
                keyword if KEYWORDS.contains(&keyword) => {
                    self.pos -= 1;
                    Err(self.error(format!("unexpected keyword '{keyword}'")))
                }
                _ => Ok(Expr::Name(name)),
            },
            Tok::LParen => {
                if self.eat(&Tok::RParen) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.expression()?;
                if self.eat(&Tok::RParen) {
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.eat(&Tok::Comma) {
                    if self.at(&Tok::RParen) {
                        break;
                    }
                    items.push(self.expression()?);
                }
                self.expect(&Tok::RParen, "')'")?;
                Ok(Expr::List(items))
            }
            Tok::LBracket => self.list_display(),
            Tok::LBrace => self.map_display(),
            other => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("unexpected {}", describe(&other))))
            }
        }
    }

    fn list_display(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Tok::RBracket) {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.expression()?;
        if self.eat_keyword("for") {
            let target = self.target()?;
            self.expect_keyword("in")?;
            let iter = self.or_expr()?;
            let cond = if self.eat_keyword("if") {
                Some(Box::new(self.or_expr()?))
            } else {
                None
            };
            self.expect(&Tok::RBracket, "']'")?;
            return Ok(Expr::Comprehension {
                element: Box::new(first),
                target,
                iter: Box::new(iter),
                cond,
            });
        }
        let mut items = vec![first];
        while self.eat(&Tok::Comma) {
            if self.at(&Tok::RBracket) {
                break;
            }
            items.push(self.expression()?);
        }
        self.expect(&Tok::RBracket, "']'")?;
        Ok(Expr::List(items))
    }

    fn map_display(&mut self) -> Result<Expr, ScriptError> {
        let mut entries = Vec::new();
        while !self.eat(&Tok::RBrace) {
            let key = self.expression()?;
            self.expect(&Tok::Colon, "':'")?;
            let value = self.expression()?;
            entries.push((key, value));
            if !self.eat(&Tok::Comma) {
                self.expect(&Tok::RBrace, "'}'")?;
                break;
            }
        }
        Ok(Expr::Map(entries))
    }
}

fn into_target(expr: Expr) -> Option<Target> {
    match expr {
        Expr::Name(name) => Some(Target::Name(name)),
        Expr::List(items) => items
            .into_iter()
            .map(|item| match item {
                Expr::Name(name) => Some(name),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(Target::Tuple),
        _ => None,
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Name(name) => format!("'{name}'"),
        Tok::Int(i) => format!("number {i}"),
        Tok::Float(f) => format!("number {f}"),
        Tok::Str(_) => "string literal".to_owned(),
        Tok::Newline => "end of line".to_owned(),
        Tok::Indent => "indent".to_owned(),
        Tok::Dedent => "dedent".to_owned(),
        Tok::Eof => "end of input".to_owned(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        let Expr::Binary(_, BinaryOp::Add, right) = expr else {
            panic!("expected addition at top level");
        };
        assert!(matches!(*right, Expr::Binary(_, BinaryOp::Mul, _)));
    }

    #[test]
    fn test_ternary_and_not_in() {
        let expr = parse_expression("'a' if x not in xs else 'b'").unwrap();
        let Expr::IfElse { cond, .. } = expr else {
            panic!("expected conditional expression");
        };
        assert!(matches!(*cond, Expr::Compare(_, ref ops) if ops[0].0 == CompareOp::NotIn));
    }

    #[test]
    fn test_call_with_kwargs() {
        let expr = parse_expression("sorted(pages, key='date', reverse=True)").unwrap();
        let Expr::Call { args, kwargs, .. } = expr else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        let names: Vec<&str> = kwargs.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["key", "reverse"]);
    }

    #[test]
    fn test_positional_after_keyword_rejected() {
        assert!(parse_expression("f(a=1, 2)").is_err());
    }

    #[test]
    fn test_comprehension() {
        let expr = parse_expression("[p.title for p in pages if 'post' in p]").unwrap();
        assert!(matches!(expr, Expr::Comprehension { cond: Some(_), .. }));
    }

    #[test]
    fn test_statement_blocks() {
        let stmts = parse_statements(
            "for p in pages:\n    if p.title:\n        print(p.title)\n    else:\n        pass\nx = 1\n",
        )
        .unwrap();
        assert_eq!(stmts.len(), 2);
        let Stmt::For { body, .. } = &stmts[0] else {
            panic!("expected for loop");
        };
        assert!(matches!(&body[0], Stmt::If { otherwise, .. } if otherwise.len() == 1));
    }

    #[test]
    fn test_one_line_block_and_tuple_target() {
        let stmts = parse_statements("for k, v in items: print(k)\na, b = 1, 2").unwrap();
        assert!(matches!(&stmts[0], Stmt::For { target: Target::Tuple(names), .. } if names.len() == 2));
        assert!(matches!(&stmts[1], Stmt::Assign(Target::Tuple(_), Expr::List(_))));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_statements("f() = 1").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_unexpected_indent() {
        assert!(parse_statements("x = 1\n    y = 2\n").is_err());
    }

    #[test]
    fn test_slice() {
        let expr = parse_expression("title[:3]").unwrap();
        assert!(matches!(expr, Expr::Slice { start: None, end: Some(_), .. }));
    }

    #[test]
    fn test_syntax_error_line() {
        let err = parse_statements("x = 1\ny = (2 +\n").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { .. }));
    }
}
