//! Lexer, recursive-descent parser and point-wise evaluation for formulas.
//!
//! Grammar:
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := NUMBER | IDENT | '(' expr ')'
//! ```

use std::iter::Peekable;
use std::str::CharIndices;

use crate::curves::ID_PREFIX;
use crate::error::{CoreError, PointError, Result};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LeftParen,
    RightParen,
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn syntax_error(offset: usize, reason: impl Into<String>) -> CoreError {
    CoreError::MalformedFormula {
        offset,
        reason: reason.into(),
    }
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            c if c.is_ascii_digit() || c == '.' => {
                let end = scan_number(src, &mut chars)?;
                let value = src[offset..end]
                    .parse::<f64>()
                    .map_err(|_| syntax_error(offset, format!("bad number `{}`", &src[offset..end])))?;
                tokens.push(Spanned {
                    token: Token::Number(value),
                    offset,
                });
                continue;
            }
            c if c == ID_PREFIX => {
                chars.next();
                let end = take_digits(src, &mut chars);
                if end == offset + c.len_utf8() {
                    return Err(syntax_error(offset, "curve identifier needs a number"));
                }
                tokens.push(Spanned {
                    token: Token::Ident(src[offset..end].to_string()),
                    offset,
                });
                continue;
            }
            other => return Err(syntax_error(offset, format!("unexpected character `{other}`"))),
        };
        chars.next();
        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

/// Consume ASCII digits, returning the byte offset just past them.
fn take_digits(src: &str, chars: &mut Peekable<CharIndices<'_>>) -> usize {
    while let Some(&(_, c)) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        chars.next();
    }
    chars.peek().map_or(src.len(), |&(i, _)| i)
}

/// `digits ['.' digits] [('e'|'E') ['+'|'-'] digits]`, also `.5`.
fn scan_number(src: &str, chars: &mut Peekable<CharIndices<'_>>) -> Result<usize> {
    let mut end = take_digits(src, chars);
    if let Some(&(_, '.')) = chars.peek() {
        chars.next();
        end = take_digits(src, chars);
    }
    if let Some(&(e_at, 'e' | 'E')) = chars.peek() {
        chars.next();
        if let Some(&(_, '+' | '-')) = chars.peek() {
            chars.next();
        }
        let before = chars.peek().map_or(src.len(), |&(i, _)| i);
        end = take_digits(src, chars);
        if end == before {
            return Err(syntax_error(e_at, "exponent needs digits"));
        }
    }
    Ok(end)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Value of a saved curve's y series at the current index.
    Curve(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Evaluate at one sample index. `lookup` yields the y value of a curve.
    pub fn eval<F>(&self, index: usize, lookup: &F) -> std::result::Result<f64, PointError>
    where
        F: Fn(&str, usize) -> std::result::Result<f64, PointError>,
    {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Curve(id) => lookup(id, index),
            Expr::Neg(inner) => Ok(-inner.eval(index, lookup)?),
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(index, lookup)?;
                let b = rhs.eval(index, lookup)?;
                match op {
                    BinOp::Add => Ok(a + b),
                    BinOp::Sub => Ok(a - b),
                    BinOp::Mul => Ok(a * b),
                    BinOp::Div if b == 0.0 => Err(PointError::DivisionByZero),
                    BinOp::Div => Ok(a / b),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Deepest allowed nesting of parentheses and unary signs.
pub const MAX_DEPTH: usize = 256;

/// Longest formula accepted, in tokens. Bounds the height of operator
/// chains, which are evaluated and dropped recursively.
pub const MAX_TOKENS: usize = 4096;

/// Parse a formula into an expression tree.
pub fn parse(src: &str) -> Result<Expr> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(syntax_error(0, "empty formula"));
    }
    if let Some(first_over) = tokens.get(MAX_TOKENS) {
        return Err(syntax_error(
            first_over.offset,
            format!("formula longer than {MAX_TOKENS} tokens"),
        ));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        len: src.len(),
        depth: 0,
    };
    let expr = parser.parse_expr()?;

    if let Some(extra) = parser.current() {
        return Err(syntax_error(
            extra.offset,
            format!("unexpected {:?} after expression", extra.token),
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    len: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn current(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    /// Enter one nesting level; callers step back out with `self.depth -= 1`.
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let offset = self.current().map_or(self.len, |s| s.offset);
            return Err(syntax_error(
                offset,
                format!("nesting deeper than {MAX_DEPTH} levels"),
            ));
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_term()?;
        while let Some(op) = self.current().and_then(|s| match s.token {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            _ => None,
        }) {
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.current().and_then(|s| match s.token {
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            _ => None,
        }) {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.current().map(|s| &s.token) {
            Some(Token::Minus) => {
                self.advance();
                self.descend()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::Plus) => {
                self.advance();
                self.descend()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(inner)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let spanned = self
            .current()
            .ok_or_else(|| syntax_error(self.len, "unexpected end of formula"))?;

        match &spanned.token {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(*n))
            }
            Token::Ident(id) => {
                self.advance();
                Ok(Expr::Curve(id.clone()))
            }
            Token::LeftParen => {
                self.advance();
                self.descend()?;
                let inner = self.parse_expr()?;
                self.depth -= 1;
                match self.current() {
                    Some(Spanned {
                        token: Token::RightParen,
                        ..
                    }) => {
                        self.advance();
                        Ok(inner)
                    }
                    Some(other) => Err(syntax_error(other.offset, "expected `)`")),
                    None => Err(syntax_error(self.len, "missing `)`")),
                }
            }
            other => Err(syntax_error(
                spanned.offset,
                format!("unexpected {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_curves(id: &str, _: usize) -> std::result::Result<f64, PointError> {
        Err(PointError::MissingSample {
            curve: id.to_string(),
            index: 0,
        })
    }

    fn eval_const(src: &str) -> f64 {
        parse(src).unwrap().eval(0, &no_curves).unwrap()
    }

    #[test]
    fn tokenizes_numbers_and_identifiers() {
        let tokens: Vec<Token> = tokenize("C12*2.5e-1 + .5")
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("C12".into()),
                Token::Star,
                Token::Number(0.25),
                Token::Plus,
                Token::Number(0.5),
            ]
        );
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval_const("1 + 2 * 3"), 7.0);
        assert_eq!(eval_const("(1 + 2) * 3"), 9.0);
        assert_eq!(eval_const("8 / 4 / 2"), 1.0);
        assert_eq!(eval_const("10 - 4 - 3"), 3.0);
        assert_eq!(eval_const("-2 * -(3 + 1)"), 8.0);
    }

    #[test]
    fn division_by_zero_is_a_point_error() {
        let expr = parse("1 / (2 - 2)").unwrap();
        assert_eq!(expr.eval(0, &no_curves), Err(PointError::DivisionByZero));
    }

    #[test]
    fn identifiers_go_through_lookup() {
        let expr = parse("C1 - C2").unwrap();
        let lookup = |id: &str, i: usize| -> std::result::Result<f64, PointError> {
            Ok(match id {
                "C1" => 10.0 * i as f64,
                _ => 1.0,
            })
        };
        assert_eq!(expr.eval(3, &lookup), Ok(29.0));
    }

    #[test]
    fn syntax_errors_carry_offsets() {
        for (src, offset) in [("1 +", 3), ("(1 + 2", 6), ("2 $ 3", 2), ("C + 1", 0), ("1 2", 2), ("", 0)] {
            match parse(src) {
                Err(CoreError::MalformedFormula { offset: got, .. }) => {
                    assert_eq!(got, offset, "formula {src:?}")
                }
                other => panic!("formula {src:?}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn runaway_nesting_is_rejected() {
        // level MAX_DEPTH + 1 is entered at offset MAX_DEPTH; the error points at the next token
        let parens = format!("{}1{}", "(".repeat(1_000), ")".repeat(1_000));
        assert!(matches!(
            parse(&parens),
            Err(CoreError::MalformedFormula { offset, .. }) if offset == MAX_DEPTH + 1
        ));

        let signs = format!("{}1", "-".repeat(1_000));
        assert!(matches!(
            parse(&signs),
            Err(CoreError::MalformedFormula { offset, .. }) if offset == MAX_DEPTH + 1
        ));
    }

    #[test]
    fn oversized_formulas_are_rejected_without_recursing() {
        let parens = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(
            parse(&parens),
            Err(CoreError::MalformedFormula { offset: MAX_TOKENS, .. })
        ));

        let long_sum = vec!["1"; 10_000].join("+");
        assert!(matches!(
            parse(&long_sum),
            Err(CoreError::MalformedFormula { .. })
        ));
    }

    #[test]
    fn nesting_up_to_the_limit_is_accepted() {
        let src = format!("{}2{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(eval_const(&src), 2.0);
        assert_eq!(eval_const("--+-3"), -3.0);
    }

    #[test]
    fn exponent_without_digits_is_rejected() {
        assert!(matches!(
            parse("1e+"),
            Err(CoreError::MalformedFormula { offset: 1, .. })
        ));
    }
}
