//! Equation parsing and sampling
//!
//! A small recursive-descent parser and evaluator for the expression
//! language the computation service accepts: arithmetic over one free
//! variable with the usual scientific function set. Parsing and evaluation
//! are pure; every failure travels the `Result` path so the worker thread
//! can report it instead of crashing.

use rayon::prelude::*;
use thiserror::Error;

/// Errors from parsing, evaluating, or sampling an equation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EquationError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("invalid sampling parameters: {0}")]
    InvalidSampling(String),

    #[error("domain error: expression has no finite values on [{x_min}, {x_max}]")]
    EmptyDomain { x_min: f64, x_max: f64 },
}

pub type EquationResult<T> = Result<T, EquationError>;

/// Sampling below this point count stays on the calling thread; larger
/// requests fan out across the rayon pool.
const PARALLEL_SAMPLE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Sqrt,
    Exp,
    Ln,
    Log,
    Log2,
    Abs,
    Floor,
    Ceil,
    Sign,
}

impl Func {
    fn from_name(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "sqrt" => Func::Sqrt,
            "exp" => Func::Exp,
            "ln" => Func::Ln,
            "log" | "log10" => Func::Log,
            "log2" => Func::Log2,
            "abs" => Func::Abs,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "sign" => Func::Sign,
            _ => return None,
        })
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Asin => x.asin(),
            Func::Acos => x.acos(),
            Func::Atan => x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            Func::Sqrt => x.sqrt(),
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Log => x.log10(),
            Func::Log2 => x.log2(),
            Func::Abs => x.abs(),
            Func::Floor => x.floor(),
            Func::Ceil => x.ceil(),
            Func::Sign => x.signum(),
        }
    }
}

fn constant(name: &str) -> Option<f64> {
    Some(match name {
        "pi" => std::f64::consts::PI,
        "e" => std::f64::consts::E,
        "tau" => std::f64::consts::TAU,
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call(Func, Box<Expr>),
}

impl Expr {
    fn eval(&self, variable: &str, x: f64) -> EquationResult<f64> {
        Ok(match self {
            Expr::Number(n) => *n,
            Expr::Variable(name) => {
                if name == variable {
                    x
                } else {
                    return Err(EquationError::UnknownIdentifier(name.clone()));
                }
            }
            Expr::Neg(inner) => -inner.eval(variable, x)?,
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(variable, x)?;
                let b = rhs.eval(variable, x)?;
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    // IEEE semantics: poles become infinities and render as
                    // gaps, they are not evaluation failures.
                    BinOp::Div => a / b,
                    BinOp::Pow => a.powf(b),
                }
            }
            Expr::Call(func, arg) => func.apply(arg.eval(variable, x)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn tokenize(mut self) -> EquationResult<Vec<(usize, Token)>> {
        let mut tokens = Vec::new();
        while self.pos < self.bytes.len() {
            let start = self.pos;
            let c = self.bytes[self.pos];
            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.pos += 1;
                }
                b'+' => {
                    self.pos += 1;
                    tokens.push((start, Token::Plus));
                }
                b'-' => {
                    self.pos += 1;
                    tokens.push((start, Token::Minus));
                }
                b'*' => {
                    // `**` is an alias for `^`
                    if self.bytes.get(self.pos + 1) == Some(&b'*') {
                        self.pos += 2;
                        tokens.push((start, Token::Caret));
                    } else {
                        self.pos += 1;
                        tokens.push((start, Token::Star));
                    }
                }
                b'/' => {
                    self.pos += 1;
                    tokens.push((start, Token::Slash));
                }
                b'^' => {
                    self.pos += 1;
                    tokens.push((start, Token::Caret));
                }
                b'(' => {
                    self.pos += 1;
                    tokens.push((start, Token::LParen));
                }
                b')' => {
                    self.pos += 1;
                    tokens.push((start, Token::RParen));
                }
                b'0'..=b'9' | b'.' => {
                    tokens.push((start, self.number()?));
                }
                c if c.is_ascii_alphabetic() || c == b'_' => {
                    let end = self.scan_while(|c| c.is_ascii_alphanumeric() || c == b'_');
                    tokens.push((start, Token::Ident(self.src[start..end].to_string())));
                }
                other => {
                    return Err(EquationError::Parse {
                        offset: start,
                        message: format!("unexpected character '{}'", other as char),
                    });
                }
            }
        }
        Ok(tokens)
    }

    fn scan_while(&mut self, pred: impl Fn(u8) -> bool) -> usize {
        while self.pos < self.bytes.len() && pred(self.bytes[self.pos]) {
            self.pos += 1;
        }
        self.pos
    }

    fn number(&mut self) -> EquationResult<Token> {
        let start = self.pos;
        self.scan_while(|c| c.is_ascii_digit());
        if self.bytes.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            self.scan_while(|c| c.is_ascii_digit());
        }
        // Optional exponent: only consume the 'e' when it really starts one,
        // so the constant `e` after a number is not swallowed.
        if matches!(self.bytes.get(self.pos), Some(b'e') | Some(b'E')) {
            let mut lookahead = self.pos + 1;
            if matches!(self.bytes.get(lookahead), Some(b'+') | Some(b'-')) {
                lookahead += 1;
            }
            if self.bytes.get(lookahead).is_some_and(|c| c.is_ascii_digit()) {
                self.pos = lookahead;
                self.scan_while(|c| c.is_ascii_digit());
            }
        }
        let text = &self.src[start..self.pos];
        text.parse::<f64>().map(Token::Number).map_err(|_| EquationError::Parse {
            offset: start,
            message: format!("malformed number '{}'", text),
        })
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    src_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.src_len, |(o, _)| *o)
    }

    fn error(&self, message: impl Into<String>) -> EquationError {
        EquationError::Parse {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn expect_rparen(&mut self) -> EquationResult<()> {
        match self.advance() {
            Some(Token::RParen) => Ok(()),
            _ => Err(self.error("expected ')'")),
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> EquationResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> EquationResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // unary := '-' unary | power
    // Power binds tighter than unary minus: -x^2 parses as -(x^2).
    fn unary(&mut self) -> EquationResult<Expr> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.power()
    }

    // power := atom ('^' unary)?   (right-associative)
    fn power(&mut self) -> EquationResult<Expr> {
        let base = self.atom()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            let exponent = self.unary()?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    // atom := number | ident | ident '(' expr ')' | '(' expr ')'
    fn atom(&mut self) -> EquationResult<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.advance();
                    let func = Func::from_name(&name)
                        .ok_or(EquationError::UnknownFunction(name))?;
                    let arg = self.expr()?;
                    self.expect_rparen()?;
                    Ok(Expr::Call(func, Box::new(arg)))
                } else if let Some(value) = constant(&name) {
                    Ok(Expr::Number(value))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            Some(_) | None => Err(self.error("expected a number, identifier, or '('")),
        }
    }
}

/// A parsed, reusable equation.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    ast: Expr,
}

impl Equation {
    pub fn parse(source: &str) -> EquationResult<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        if tokens.is_empty() {
            return Err(EquationError::Parse {
                offset: 0,
                message: "empty expression".to_string(),
            });
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            src_len: source.len(),
        };
        let ast = parser.expr()?;
        if parser.peek().is_some() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self { ast })
    }

    /// Evaluate with `variable` bound to `x`.
    pub fn eval(&self, variable: &str, x: f64) -> EquationResult<f64> {
        self.ast.eval(variable, x)
    }

    /// Sample `num_points` evenly spaced points across `[x_min, x_max]`,
    /// inclusive of both endpoints. A result where every value is non-finite
    /// is a domain error; isolated poles are kept as-is and rendered as gaps.
    pub fn sample(
        &self,
        variable: &str,
        x_min: f64,
        x_max: f64,
        num_points: usize,
    ) -> EquationResult<(Vec<f64>, Vec<f64>)> {
        if num_points < 2 {
            return Err(EquationError::InvalidSampling(format!(
                "need at least 2 points, got {}",
                num_points
            )));
        }
        if !(x_max > x_min) || !x_min.is_finite() || !x_max.is_finite() {
            return Err(EquationError::InvalidSampling(format!(
                "interval [{}, {}] is not a finite increasing range",
                x_min, x_max
            )));
        }

        let step = (x_max - x_min) / (num_points - 1) as f64;
        let mut x_values: Vec<f64> = (0..num_points).map(|i| x_min + i as f64 * step).collect();
        // Pin the last sample to the exact upper endpoint.
        x_values[num_points - 1] = x_max;

        let y_values: Vec<f64> = if num_points >= PARALLEL_SAMPLE_THRESHOLD {
            x_values
                .par_iter()
                .map(|&x| self.eval(variable, x))
                .collect::<EquationResult<_>>()?
        } else {
            x_values
                .iter()
                .map(|&x| self.eval(variable, x))
                .collect::<EquationResult<_>>()?
        };

        if y_values.iter().all(|y| !y.is_finite()) {
            return Err(EquationError::EmptyDomain { x_min, x_max });
        }
        Ok((x_values, y_values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str, x: f64) -> f64 {
        Equation::parse(src).unwrap().eval("x", x).unwrap()
    }

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(eval("1 + 2 * 3", 0.0), 7.0);
        assert_eq!(eval("(1 + 2) * 3", 0.0), 9.0);
        assert_eq!(eval("10 / 4", 0.0), 2.5);
        assert_eq!(eval("x - 3", 5.0), 2.0);
    }

    #[test]
    fn test_power_operators() {
        assert_eq!(eval("x**2", 3.0), 9.0);
        assert_eq!(eval("x^2", 3.0), 9.0);
        // Right-associative: 2^(3^2)
        assert_eq!(eval("2^3^2", 0.0), 512.0);
        // Power binds tighter than unary minus
        assert_eq!(eval("-2^2", 0.0), -4.0);
        // Negative exponent
        assert_eq!(eval("2^-1", 0.0), 0.5);
    }

    #[test]
    fn test_functions_and_constants() {
        assert_eq!(eval("sin(0)", 0.0), 0.0);
        assert!((eval("cos(pi)", 0.0) + 1.0).abs() < 1e-12);
        assert!((eval("ln(e)", 0.0) - 1.0).abs() < 1e-12);
        assert!((eval("tau - 2 * pi", 0.0)).abs() < 1e-12);
        assert_eq!(eval("sqrt(abs(0 - 16))", 0.0), 4.0);
        assert_eq!(eval("log(100)", 0.0), 2.0);
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(eval("1e3", 0.0), 1000.0);
        assert_eq!(eval("2.5e-2", 0.0), 0.025);
        assert_eq!(eval("2e+3", 0.0), 2000.0);
        // An 'e' that does not start an exponent is left for the next token;
        // with no implicit multiplication that makes "2e" trailing input.
        assert!(Equation::parse("2 e").is_err());
        assert!((eval("2 * e", 0.0) - 2.0 * std::f64::consts::E).abs() < 1e-12);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Equation::parse(""),
            Err(EquationError::Parse { .. })
        ));
        assert!(matches!(
            Equation::parse("1 +"),
            Err(EquationError::Parse { .. })
        ));
        assert!(matches!(
            Equation::parse("(x + 1"),
            Err(EquationError::Parse { .. })
        ));
        assert!(matches!(
            Equation::parse("x $ 2"),
            Err(EquationError::Parse { .. })
        ));
        assert!(matches!(
            Equation::parse("x + 1) * 2"),
            Err(EquationError::Parse { .. })
        ));
    }

    #[test]
    fn test_unknown_function_rejected_at_parse() {
        assert_eq!(
            Equation::parse("frobnicate(x)"),
            Err(EquationError::UnknownFunction("frobnicate".to_string()))
        );
    }

    #[test]
    fn test_unknown_identifier_rejected_at_eval() {
        let eq = Equation::parse("x + y").unwrap();
        assert_eq!(
            eq.eval("x", 1.0),
            Err(EquationError::UnknownIdentifier("y".to_string()))
        );
    }

    #[test]
    fn test_sample_inclusive_endpoints() {
        let eq = Equation::parse("x**2").unwrap();
        let (xs, ys) = eq.sample("x", -10.0, 10.0, 100).unwrap();
        assert_eq!(xs.len(), 100);
        assert_eq!(ys.len(), 100);
        assert!((xs[0] + 10.0).abs() < 1e-12);
        assert!((xs[99] - 10.0).abs() < 1e-12);
        assert!((ys[0] - 100.0).abs() < 1e-9);
        assert!((ys[99] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_parallel_path_matches_serial() {
        let eq = Equation::parse("sin(x) * x").unwrap();
        let n = PARALLEL_SAMPLE_THRESHOLD + 10;
        let (xs, ys) = eq.sample("x", 0.0, 100.0, n).unwrap();
        assert_eq!(xs.len(), n);
        assert_eq!(ys.len(), n);
        let probe = 777;
        assert!((ys[probe] - eq.eval("x", xs[probe]).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_sample_rejects_degenerate_requests() {
        let eq = Equation::parse("x").unwrap();
        assert!(matches!(
            eq.sample("x", 0.0, 1.0, 1),
            Err(EquationError::InvalidSampling(_))
        ));
        assert!(matches!(
            eq.sample("x", 1.0, 1.0, 10),
            Err(EquationError::InvalidSampling(_))
        ));
        assert!(matches!(
            eq.sample("x", f64::NAN, 1.0, 10),
            Err(EquationError::InvalidSampling(_))
        ));
    }

    #[test]
    fn test_sample_all_non_finite_is_domain_error() {
        let eq = Equation::parse("sqrt(0 - 1 - 0 * x)").unwrap();
        assert!(matches!(
            eq.sample("x", -10.0, 10.0, 50),
            Err(EquationError::EmptyDomain { .. })
        ));
    }

    #[test]
    fn test_sample_keeps_isolated_poles() {
        let eq = Equation::parse("1 / x").unwrap();
        let (_, ys) = eq.sample("x", -1.0, 1.0, 5).unwrap();
        // Midpoint hits x == 0 exactly; the pole survives as an infinity.
        assert!(ys[2].is_infinite());
        assert!(ys[0].is_finite());
    }
}
