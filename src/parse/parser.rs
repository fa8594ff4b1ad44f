//! Recursive-descent parser for one equation line.

use super::ast::{BinOp, DateCmp, Expr, Form, ReadSet, Role, UnaryOp, VarRef};
use super::token::{lex, Token};
use super::ParseError;
use crate::store::{Quarter, SymbolTable, VarId};

/// A compiled equation line: the solver-facing pieces extracted from one
/// line of notation. Grouping and registration happen in the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEquation {
    pub target: VarId,
    pub form: Form,
    pub role: Role,
    pub rhs: Expr,
    pub reads: ReadSet,
    pub source: String,
    pub line: u32,
}

/// Parses `TARGET = expression`, interning variable names into `symbols`.
///
/// Fails without side effects on the expression level; interned names are
/// harmless (a symbol with no equation is just an exogenous candidate).
pub fn parse_equation(
    text: &str,
    line: u32,
    symbols: &mut SymbolTable,
) -> Result<ParsedEquation, ParseError> {
    let (lhs_text, rhs_text) = text
        .split_once('=')
        .ok_or_else(|| ParseError::Syntax { line, msg: "missing '='".into() })?;

    let lhs_toks = lex(lhs_text, line)?;
    let (target, form, forced_identity) = parse_target(&lhs_toks, lhs_text, line, symbols)?;

    let rhs_toks = lex(rhs_text, line)?;
    let mut parser = Parser { toks: rhs_toks, pos: 0, line, symbols, saw_diff: false };
    let rhs = parser.parse_expr()?;
    if parser.pos != parser.toks.len() {
        return Err(parser.syntax("trailing input after expression"));
    }

    let role = if forced_identity {
        Role::Identity
    } else if form == Form::Level && !parser.saw_diff {
        Role::Identity
    } else {
        Role::Behavioral
    };

    let mut reads = ReadSet::new();
    rhs.collect_reads(&mut reads);
    if form != Form::Level {
        // Non-level forms are anchored on the target's own lag.
        let anchor = VarRef { var: target, offset: -1 };
        if !reads.contains(&anchor) {
            reads.push(anchor);
        }
    }

    Ok(ParsedEquation { target, form, role, rhs, reads, source: text.trim().to_string(), line })
}

fn parse_target(
    toks: &[Token],
    text: &str,
    line: u32,
    symbols: &mut SymbolTable,
) -> Result<(VarId, Form, bool), ParseError> {
    let bad = || ParseError::BadTarget { line, target: text.trim().to_string() };

    let (toks, forced) = match toks {
        [Token::At(tag), rest @ ..] if tag == "identity" => (rest, true),
        _ => (toks, false),
    };

    match toks {
        [Token::Var(name)] => Ok((symbols.intern(name), Form::Level, forced)),
        [Token::Func(f), Token::LParen, Token::Var(name), Token::RParen] => match f.as_str() {
            "dlog" => Ok((symbols.intern(name), Form::LogDiff, forced)),
            "d" => Ok((symbols.intern(name), Form::Diff, forced)),
            _ => Err(bad()),
        },
        [Token::Var(a), Token::Slash, Token::Var(b), Token::LParen, Token::Minus, Token::Num(n), Token::RParen]
            if a == b && *n == 1.0 =>
        {
            Ok((symbols.intern(a), Form::Ratio, forced))
        }
        _ => Err(bad()),
    }
}

struct Parser<'a> {
    toks: Vec<Token>,
    pos: usize,
    line: u32,
    symbols: &'a mut SymbolTable,
    /// Whether the RHS contained a `d(...)`/`dlog(...)` difference term,
    /// which marks an otherwise level-form equation as behavioral.
    saw_diff: bool,
}

impl Parser<'_> {
    fn syntax(&self, msg: &str) -> ParseError {
        ParseError::Syntax { line: self.line, msg: msg.to_string() }
    }

    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: Token, what: &str) -> Result<(), ParseError> {
        if self.next().as_ref() == Some(&tok) {
            Ok(())
        } else {
            Err(self.syntax(&format!("expected {what}")))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand) });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_atom()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            // Right-associative; the exponent may carry its own sign.
            let exp = self.parse_unary()?;
            return Ok(Expr::Binary { op: BinOp::Pow, lhs: Box::new(base), rhs: Box::new(exp) });
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.next() {
            Some(Token::Num(v)) => Ok(Expr::Literal(v)),
            Some(Token::LParen) => {
                let e = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(e)
            }
            Some(Token::Var(name)) => {
                let var = self.symbols.intern(&name);
                let offset = if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let off = self.parse_offset(&name)?;
                    self.expect(Token::RParen, "')' after offset")?;
                    off
                } else {
                    0
                };
                Ok(Expr::Var(VarRef { var, offset }))
            }
            Some(Token::Func(name)) => self.parse_call(&name),
            Some(Token::At(name)) => self.parse_at_call(&name),
            Some(_) => Err(self.syntax("unexpected token")),
            None => Err(self.syntax("unexpected end of expression")),
        }
    }

    /// The parenthesised integer after a variable name: `(-1)`, `(2)`.
    fn parse_offset(&mut self, var: &str) -> Result<i32, ParseError> {
        let sign = match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                -1
            }
            Some(Token::Plus) => {
                self.pos += 1;
                1
            }
            _ => 1,
        };
        match self.next() {
            Some(Token::Num(v)) if v.fract() == 0.0 && v.abs() <= i32::MAX as f64 => {
                Ok(sign * v as i32)
            }
            _ => Err(self.syntax(&format!("expected integer offset after '{var}('"))),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, ParseError> {
        let unary = |op, e: Expr| Expr::Unary { op, operand: Box::new(e) };
        match name {
            "log" | "exp" | "abs" => {
                self.expect(Token::LParen, &format!("'(' after '{name}'"))?;
                let e = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                let op = match name {
                    "log" => UnaryOp::Log,
                    "exp" => UnaryOp::Exp,
                    _ => UnaryOp::Abs,
                };
                Ok(unary(op, e))
            }
            "dlog" => {
                self.expect(Token::LParen, "'(' after 'dlog'")?;
                let e = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                self.saw_diff = true;
                Ok(Expr::Binary {
                    op: BinOp::Sub,
                    lhs: Box::new(unary(UnaryOp::Log, e.clone())),
                    rhs: Box::new(unary(UnaryOp::Log, e.shift(1))),
                })
            }
            "d" => {
                self.expect(Token::LParen, "'(' after 'd'")?;
                let e = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                self.saw_diff = true;
                Ok(Expr::Binary {
                    op: BinOp::Sub,
                    lhs: Box::new(e.clone()),
                    rhs: Box::new(e.shift(1)),
                })
            }
            _ => Err(ParseError::UnknownFunction { line: self.line, name: name.to_string() }),
        }
    }

    fn parse_at_call(&mut self, name: &str) -> Result<Expr, ParseError> {
        match name {
            "movav" => {
                self.expect(Token::LParen, "'(' after '@movav'")?;
                let e = self.parse_expr()?;
                self.expect(Token::Comma, "',' in '@movav'")?;
                let window = match self.next() {
                    Some(Token::Num(v)) if v.fract() == 0.0 && v >= 1.0 && v <= 64.0 => v as u32,
                    _ => return Err(self.syntax("expected window length in '@movav'")),
                };
                self.expect(Token::RParen, "')'")?;
                // Trailing moving average: mean of the window ending now.
                let mut sum = e.clone();
                for k in 1..window {
                    sum = Expr::Binary {
                        op: BinOp::Add,
                        lhs: Box::new(sum),
                        rhs: Box::new(e.shift(k)),
                    };
                }
                Ok(Expr::Binary {
                    op: BinOp::Div,
                    lhs: Box::new(sum),
                    rhs: Box::new(Expr::Literal(window as f64)),
                })
            }
            "trend" => {
                self.expect(Token::LParen, "'(' after '@trend'")?;
                let base = self.parse_quarter_arg("@trend")?;
                self.expect(Token::RParen, "')'")?;
                Ok(Expr::Trend { base, offset: 0 })
            }
            "elem" => {
                self.expect(Token::LParen, "'(' after '@elem'")?;
                let var = match self.next() {
                    Some(Token::Var(v)) => self.symbols.intern(&v),
                    _ => return Err(self.syntax("expected variable in '@elem'")),
                };
                self.expect(Token::Comma, "',' in '@elem'")?;
                let at = self.parse_quarter_arg("@elem")?;
                self.expect(Token::RParen, "')'")?;
                Ok(Expr::Elem { var, at })
            }
            "recode" => self.parse_recode(),
            _ => Err(ParseError::UnknownFunction {
                line: self.line,
                name: format!("@{name}"),
            }),
        }
    }

    /// `@recode(@date <cmp> @dateval("YYYY:QQ"), a, b)`
    fn parse_recode(&mut self) -> Result<Expr, ParseError> {
        self.expect(Token::LParen, "'(' after '@recode'")?;
        match self.next() {
            Some(Token::At(d)) if d == "date" => {}
            _ => return Err(self.syntax("expected '@date' in '@recode'")),
        }
        let cmp = match self.next() {
            Some(Token::Eq) => DateCmp::Eq,
            Some(Token::Ge) => DateCmp::Ge,
            Some(Token::Le) => DateCmp::Le,
            Some(Token::Gt) => DateCmp::Gt,
            Some(Token::Lt) => DateCmp::Lt,
            _ => return Err(self.syntax("expected comparison in '@recode'")),
        };
        match self.next() {
            Some(Token::At(d)) if d == "dateval" => {}
            _ => return Err(self.syntax("expected '@dateval' in '@recode'")),
        }
        self.expect(Token::LParen, "'(' after '@dateval'")?;
        let pivot = self.parse_quarter_arg("@dateval")?;
        self.expect(Token::RParen, "')'")?;
        self.expect(Token::Comma, "',' in '@recode'")?;
        let if_true = self.parse_expr()?;
        self.expect(Token::Comma, "',' in '@recode'")?;
        let if_false = self.parse_expr()?;
        self.expect(Token::RParen, "')'")?;
        Ok(Expr::Recode {
            cmp,
            pivot,
            offset: 0,
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        })
    }

    /// A quarter argument, either bare (`1979Q4`) or quoted (`"2005:02"`).
    fn parse_quarter_arg(&mut self, ctx: &str) -> Result<Quarter, ParseError> {
        match self.next() {
            Some(Token::QuarterLit(q)) => Ok(q),
            Some(Token::Str(s)) => s
                .parse()
                .map_err(|_| self.syntax(&format!("bad quarter '{s}' in '{ctx}'"))),
            _ => Err(self.syntax(&format!("expected quarter literal in '{ctx}'"))),
        }
    }
}
