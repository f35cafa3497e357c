// src/symbolic.rs
// Expression algebra in one time symbol `t`: exact differentiation (chain rule), light simplification,
// compilation into closures, and a small text parser for motion laws sent over the API.
// Derivatives are built as new expression trees, never approximated numerically.

use crate::error::{MotionError, MotionResult};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Elementary functions of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Abs,   // Evaluable, but no closed-form derivative at 0.
    Floor, // Evaluable, derivative undefined at the jumps.
    Sign,  // Evaluable, derivative undefined at 0.
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
            Func::Floor => "floor",
            Func::Sign => "sign",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let func = match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "exp" => Func::Exp,
            "ln" | "log" => Func::Ln,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "floor" => Func::Floor,
            "sign" => Func::Sign,
            _ => return None,
        };
        Some(func)
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
            Func::Floor => x.floor(),
            Func::Sign => {
                if x == 0.0 {
                    0.0
                } else {
                    x.signum()
                }
            }
        }
    }
}

/// Algebraic expression in the time symbol `t`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Time,
    /// Any symbol other than `t`; it has no value and no derivative.
    Symbol(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

/// Expression compiled to a closure of `t`.
pub struct CompiledExpr {
    source: Expr,
    func: Box<dyn Fn(f64) -> f64 + Send + Sync>,
}

impl CompiledExpr {
    pub fn eval(&self, t: f64) -> f64 {
        (self.func)(t)
    }

    pub fn eval_all(&self, instants: &[f64]) -> Vec<f64> {
        instants.iter().map(|&t| (self.func)(t)).collect()
    }

    pub fn source(&self) -> &Expr {
        &self.source
    }
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr").field("source", &format_args!("{}", self.source)).finish()
    }
}

impl Expr {
    pub fn t() -> Self {
        Expr::Time
    }

    pub fn constant(value: f64) -> Self {
        Expr::Const(value)
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn call(func: Func, arg: Expr) -> Self {
        Expr::Call(func, Box::new(arg))
    }

    pub fn sin(self) -> Self {
        Self::call(Func::Sin, self)
    }

    pub fn cos(self) -> Self {
        Self::call(Func::Cos, self)
    }

    pub fn tan(self) -> Self {
        Self::call(Func::Tan, self)
    }

    pub fn exp(self) -> Self {
        Self::call(Func::Exp, self)
    }

    pub fn ln(self) -> Self {
        Self::call(Func::Ln, self)
    }

    pub fn sqrt(self) -> Self {
        Self::call(Func::Sqrt, self)
    }

    pub fn abs(self) -> Self {
        Self::call(Func::Abs, self)
    }

    pub fn pow(self, exponent: impl Into<Expr>) -> Self {
        Expr::Pow(Box::new(self), Box::new(exponent.into()))
    }

    /// True when the expression does not depend on `t` (symbols count as dependent: they are unknown).
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Const(_) => true,
            Expr::Time | Expr::Symbol(_) => false,
            Expr::Neg(a) | Expr::Call(_, a) => a.is_constant(),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Pow(a, b) => {
                a.is_constant() && b.is_constant()
            }
        }
    }

    fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    /// Exact derivative with respect to `t`, simplified.
    pub fn derivative(&self) -> MotionResult<Expr> {
        Ok(self.diff()?.simplify())
    }

    fn diff(&self) -> MotionResult<Expr> {
        let d = match self {
            Expr::Const(_) => Expr::Const(0.0),
            Expr::Time => Expr::Const(1.0),
            Expr::Symbol(name) => {
                return Err(MotionError::unsupported(format!("free symbol `{name}` is not a function of t")))
            }
            Expr::Neg(a) => -a.diff()?,
            Expr::Add(a, b) => a.diff()? + b.diff()?,
            Expr::Sub(a, b) => a.diff()? - b.diff()?,
            // (ab)' = a'b + ab'
            Expr::Mul(a, b) => a.diff()? * (**b).clone() + (**a).clone() * b.diff()?,
            // (a/b)' = (a'b - ab') / b^2
            Expr::Div(a, b) => {
                (a.diff()? * (**b).clone() - (**a).clone() * b.diff()?) / (**b).clone().pow(2.0)
            }
            Expr::Pow(base, exponent) => {
                if exponent.is_constant() {
                    // (u^n)' = n u^(n-1) u'
                    let n = (**exponent).clone();
                    n.clone() * (**base).clone().pow(n - Expr::Const(1.0)) * base.diff()?
                } else {
                    // (u^v)' = u^v (v' ln u + v u' / u)
                    self.clone()
                        * (exponent.diff()? * (**base).clone().ln()
                            + (**exponent).clone() * base.diff()? / (**base).clone())
                }
            }
            Expr::Call(func, arg) => {
                let inner = arg.diff()?;
                let u = (**arg).clone();
                let outer = match func {
                    Func::Sin => u.cos(),
                    Func::Cos => -u.sin(),
                    Func::Tan => Expr::Const(1.0) / u.cos().pow(2.0),
                    Func::Exp => u.exp(),
                    Func::Ln => Expr::Const(1.0) / u,
                    Func::Sqrt => Expr::Const(0.5) / u.sqrt(),
                    Func::Abs | Func::Floor | Func::Sign => {
                        return Err(MotionError::unsupported(format!(
                            "`{}` has no closed-form derivative",
                            func.name()
                        )))
                    }
                };
                outer * inner
            }
        };
        Ok(d)
    }

    /// Constant folding plus the additive/multiplicative identities.
    pub fn simplify(&self) -> Expr {
        match self {
            Expr::Const(_) | Expr::Time | Expr::Symbol(_) => self.clone(),
            Expr::Neg(a) => match a.simplify() {
                Expr::Const(c) => Expr::Const(-c),
                Expr::Neg(inner) => *inner,
                other => Expr::Neg(Box::new(other)),
            },
            Expr::Add(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_const(), b.as_const()) {
                    (Some(x), Some(y)) => Expr::Const(x + y),
                    (Some(x), _) if x == 0.0 => b,
                    (_, Some(y)) if y == 0.0 => a,
                    _ => match b {
                        Expr::Neg(nb) => Expr::Sub(Box::new(a), nb),
                        b => Expr::Add(Box::new(a), Box::new(b)),
                    },
                }
            }
            Expr::Sub(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_const(), b.as_const()) {
                    (Some(x), Some(y)) => Expr::Const(x - y),
                    (Some(x), _) if x == 0.0 => Expr::Neg(Box::new(b)).simplify(),
                    (_, Some(y)) if y == 0.0 => a,
                    _ => match b {
                        Expr::Neg(nb) => Expr::Add(Box::new(a), nb),
                        b => Expr::Sub(Box::new(a), Box::new(b)),
                    },
                }
            }
            Expr::Mul(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_const(), b.as_const()) {
                    (Some(x), Some(y)) => Expr::Const(x * y),
                    (Some(x), _) if x == 0.0 => Expr::Const(0.0),
                    (_, Some(y)) if y == 0.0 => Expr::Const(0.0),
                    (Some(x), _) if x == 1.0 => b,
                    (_, Some(y)) if y == 1.0 => a,
                    (Some(x), _) if x == -1.0 => Expr::Neg(Box::new(b)).simplify(),
                    (_, Some(y)) if y == -1.0 => Expr::Neg(Box::new(a)).simplify(),
                    // Keep constants on the left so they fold with their neighbours.
                    (None, Some(_)) => Expr::Mul(Box::new(b), Box::new(a)).simplify_mul_chain(),
                    _ => Expr::Mul(Box::new(a), Box::new(b)).simplify_mul_chain(),
                }
            }
            Expr::Div(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_const(), b.as_const()) {
                    (Some(x), Some(y)) if y != 0.0 => Expr::Const(x / y),
                    (Some(x), _) if x == 0.0 => Expr::Const(0.0),
                    (_, Some(y)) if y == 1.0 => a,
                    _ => Expr::Div(Box::new(a), Box::new(b)),
                }
            }
            Expr::Pow(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_const(), b.as_const()) {
                    (Some(x), Some(y)) => Expr::Const(pow(x, y)),
                    (_, Some(y)) if y == 0.0 => Expr::Const(1.0),
                    (_, Some(y)) if y == 1.0 => a,
                    _ => Expr::Pow(Box::new(a), Box::new(b)),
                }
            }
            Expr::Call(func, a) => match a.simplify() {
                Expr::Const(c) => Expr::Const(func.apply(c)),
                inner => Expr::Call(*func, Box::new(inner)),
            },
        }
    }

    // c1 * (c2 * x) -> (c1*c2) * x, and pulls negations out of products.
    fn simplify_mul_chain(self) -> Expr {
        match self {
            Expr::Mul(a, b) => match (*a, *b) {
                (Expr::Const(c1), Expr::Mul(inner_a, inner_b)) if inner_a.as_const().is_some() => {
                    let c2 = inner_a.as_const().unwrap_or(1.0);
                    Expr::Mul(Box::new(Expr::Const(c1 * c2)), inner_b)
                }
                (Expr::Neg(na), b) => Expr::Neg(Box::new(Expr::Mul(na, Box::new(b)))),
                (a, Expr::Neg(nb)) => Expr::Neg(Box::new(Expr::Mul(Box::new(a), nb))),
                (a, b) => Expr::Mul(Box::new(a), Box::new(b)),
            },
            other => other,
        }
    }

    /// Direct tree-walking evaluation; free symbols evaluate to NaN.
    pub fn eval(&self, t: f64) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::Time => t,
            Expr::Symbol(_) => f64::NAN,
            Expr::Neg(a) => -a.eval(t),
            Expr::Add(a, b) => a.eval(t) + b.eval(t),
            Expr::Sub(a, b) => a.eval(t) - b.eval(t),
            Expr::Mul(a, b) => a.eval(t) * b.eval(t),
            Expr::Div(a, b) => a.eval(t) / b.eval(t),
            Expr::Pow(a, b) => pow(a.eval(t), b.eval(t)),
            Expr::Call(func, a) => func.apply(a.eval(t)),
        }
    }

    /// Compiles the tree into nested closures. Fails on free symbols.
    pub fn compile(&self) -> MotionResult<CompiledExpr> {
        Ok(CompiledExpr { source: self.clone(), func: self.build_closure()? })
    }

    fn build_closure(&self) -> MotionResult<Box<dyn Fn(f64) -> f64 + Send + Sync>> {
        let f: Box<dyn Fn(f64) -> f64 + Send + Sync> = match self {
            Expr::Const(c) => {
                let c = *c;
                Box::new(move |_| c)
            }
            Expr::Time => Box::new(|t| t),
            Expr::Symbol(name) => {
                return Err(MotionError::unsupported(format!("free symbol `{name}` cannot be evaluated")))
            }
            Expr::Neg(a) => {
                let a = a.build_closure()?;
                Box::new(move |t| -a(t))
            }
            Expr::Add(a, b) => {
                let (a, b) = (a.build_closure()?, b.build_closure()?);
                Box::new(move |t| a(t) + b(t))
            }
            Expr::Sub(a, b) => {
                let (a, b) = (a.build_closure()?, b.build_closure()?);
                Box::new(move |t| a(t) - b(t))
            }
            Expr::Mul(a, b) => {
                let (a, b) = (a.build_closure()?, b.build_closure()?);
                Box::new(move |t| a(t) * b(t))
            }
            Expr::Div(a, b) => {
                let (a, b) = (a.build_closure()?, b.build_closure()?);
                Box::new(move |t| a(t) / b(t))
            }
            Expr::Pow(a, b) => {
                if let Some(n) = b.as_const() {
                    let a = a.build_closure()?;
                    Box::new(move |t| pow(a(t), n))
                } else {
                    let (a, b) = (a.build_closure()?, b.build_closure()?);
                    Box::new(move |t| pow(a(t), b(t)))
                }
            }
            Expr::Call(func, a) => {
                let (func, a) = (*func, a.build_closure()?);
                Box::new(move |t| func.apply(a(t)))
            }
        };
        Ok(f)
    }

    /// Parses text such as `2 + sin(12*t)` or `t + 0.2*cos(12*t)`.
    /// Input longer than [`MAX_SOURCE_LEN`] bytes or nested deeper than [`MAX_DEPTH`] is rejected.
    pub fn parse(input: &str) -> MotionResult<Expr> {
        if input.len() > MAX_SOURCE_LEN {
            return Err(MotionError::invalid_expression(format!(
                "expression is {} bytes long, the limit is {MAX_SOURCE_LEN}",
                input.len()
            )));
        }
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0, depth: 0 };
        let expr = parser.expression()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(MotionError::invalid_expression(format!("unexpected `{tok}` in `{input}`"))),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Neg(_) => 3,
            Expr::Pow(..) => 4,
            Expr::Const(c) if *c < 0.0 => 3,
            _ => 5,
        }
    }
}

// Integer exponents go through powi so negative bases stay real.
fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f64 {
        base.powi(exponent as i32)
    } else {
        base.powf(exponent)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Writes `child`, parenthesized when it binds looser than `min`.
        fn wrap(f: &mut fmt::Formatter<'_>, child: &Expr, min: u8) -> fmt::Result {
            if child.precedence() < min {
                write!(f, "({child})")
            } else {
                write!(f, "{child}")
            }
        }
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Time => write!(f, "t"),
            Expr::Symbol(name) => write!(f, "{name}"),
            Expr::Neg(a) => {
                write!(f, "-")?;
                wrap(f, a, 4)
            }
            Expr::Add(a, b) => {
                wrap(f, a, 1)?;
                write!(f, " + ")?;
                wrap(f, b, 2)
            }
            Expr::Sub(a, b) => {
                wrap(f, a, 1)?;
                write!(f, " - ")?;
                wrap(f, b, 2)
            }
            Expr::Mul(a, b) => {
                wrap(f, a, 2)?;
                write!(f, "*")?;
                wrap(f, b, 3)
            }
            Expr::Div(a, b) => {
                wrap(f, a, 2)?;
                write!(f, "/")?;
                wrap(f, b, 4)
            }
            Expr::Pow(a, b) => {
                wrap(f, a, 5)?;
                write!(f, "^")?;
                wrap(f, b, 4)
            }
            Expr::Call(func, a) => write!(f, "{}({a})", func.name()),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

macro_rules! binary_op {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl<R: Into<Expr>> $trait<R> for Expr {
            type Output = Expr;
            fn $method(self, rhs: R) -> Expr {
                Expr::$variant(Box::new(self), Box::new(rhs.into()))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::$variant(Box::new(Expr::Const(self)), Box::new(rhs))
            }
        }
    };
}

binary_op!(Add, add, Add);
binary_op!(Sub, sub, Sub);
binary_op!(Mul, mul, Mul);
binary_op!(Div, div, Div);

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Op(c) => write!(f, "{c}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(input: &str) -> MotionResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // Exponent part only when a digit follows, so `2e` stays "2 e" for the error path.
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| MotionError::invalid_expression(format!("bad number `{text}`")))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c == '*' && chars.get(i + 1) == Some(&'*') {
            tokens.push(Token::Op('^')); // `**` is accepted as power.
            i += 2;
        } else if "+-*/^".contains(c) {
            tokens.push(Token::Op(c));
            i += 1;
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else {
            return Err(MotionError::invalid_expression(format!("unexpected character `{c}`")));
        }
    }
    if tokens.is_empty() {
        return Err(MotionError::invalid_expression("empty expression"));
    }
    Ok(tokens)
}

/// Longest accepted expression text, in bytes. Also bounds the depth of the parsed tree,
/// which every later pass (derivative, simplify, compile, drop) walks recursively.
pub const MAX_SOURCE_LEN: usize = 512;

/// Deepest accepted nesting of parentheses, calls, signs and exponents.
pub const MAX_DEPTH: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize, // Current recursion depth through `unary`.
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat_op(&mut self, op: char) -> bool {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> MotionResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            if self.eat_op('+') {
                lhs = lhs + self.term()?;
            } else if self.eat_op('-') {
                lhs = lhs - self.term()?;
            } else {
                return Ok(lhs);
            }
        }
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> MotionResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            if self.eat_op('*') {
                lhs = lhs * self.unary()?;
            } else if self.eat_op('/') {
                lhs = lhs / self.unary()?;
            } else {
                return Ok(lhs);
            }
        }
    }

    // Every recursive cycle of the grammar passes through here, so this is where nesting is bounded.
    fn unary(&mut self) -> MotionResult<Expr> {
        if self.depth >= MAX_DEPTH {
            return Err(MotionError::invalid_expression("expression nested too deeply"));
        }
        self.depth += 1;
        let result = self.signed();
        self.depth -= 1;
        result
    }

    // unary := ('-' | '+') unary | power
    fn signed(&mut self) -> MotionResult<Expr> {
        if self.eat_op('-') {
            Ok(-self.unary()?)
        } else if self.eat_op('+') {
            self.unary()
        } else {
            self.power()
        }
    }

    // power := primary ('^' unary)?   (right-associative)
    fn power(&mut self) -> MotionResult<Expr> {
        let base = self.primary()?;
        if self.eat_op('^') {
            Ok(base.pow(self.unary()?))
        } else {
            Ok(base)
        }
    }

    fn primary(&mut self) -> MotionResult<Expr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Const(n)),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    let func = Func::from_name(&name)
                        .ok_or_else(|| MotionError::invalid_expression(format!("unknown function `{name}`")))?;
                    self.pos += 1;
                    let arg = self.expression()?;
                    self.expect_rparen()?;
                    return Ok(Expr::call(func, arg));
                }
                match name.as_str() {
                    "t" => Ok(Expr::Time),
                    "pi" => Ok(Expr::Const(std::f64::consts::PI)),
                    "e" => Ok(Expr::Const(std::f64::consts::E)),
                    _ => Err(MotionError::invalid_expression(format!("unknown symbol `{name}`"))),
                }
            }
            Some(tok) => Err(MotionError::invalid_expression(format!("unexpected `{tok}`"))),
            None => Err(MotionError::invalid_expression("unexpected end of expression")),
        }
    }

    fn expect_rparen(&mut self) -> MotionResult<()> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            _ => Err(MotionError::invalid_expression("missing `)`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn central_difference(e: &Expr, t: f64) -> f64 {
        let h = 1e-6;
        (e.eval(t + h) - e.eval(t - h)) / (2.0 * h)
    }

    #[test]
    fn derivative_of_polynomial() {
        // d/dt (3t^2 + 2t) = 6t + 2
        let e = 3.0 * Expr::t().pow(2.0) + 2.0 * Expr::t();
        let d = e.derivative().unwrap();
        for t in [-1.5, 0.0, 0.7, 4.0] {
            assert_relative_eq!(d.eval(t), 6.0 * t + 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn chain_rule_through_trig() {
        let e = (12.0 * Expr::t()).sin();
        let d = e.derivative().unwrap();
        assert_relative_eq!(d.eval(0.3), 12.0 * (12.0f64 * 0.3).cos(), epsilon = 1e-12);
    }

    #[test]
    fn derivatives_agree_with_finite_differences() {
        let exprs = [
            "exp(-t) * cos(3*t)",
            "sqrt(1 + t^2)",
            "ln(2 + sin(t))",
            "t^t",
            "tan(t/4) / (1 + t)",
            "(2 + sin(12*t)) * cos(t + 0.2*cos(12*t))",
        ];
        for text in exprs {
            let e = Expr::parse(text).unwrap();
            let d = e.derivative().unwrap();
            for t in [0.4, 1.1, 2.3] {
                assert_relative_eq!(d.eval(t), central_difference(&e, t), epsilon = 1e-5, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn non_differentiable_functions_are_unsupported() {
        for text in ["abs(t)", "floor(t) + 1", "t * sign(t - 1)"] {
            let e = Expr::parse(text).unwrap();
            assert!(matches!(e.derivative(), Err(MotionError::UnsupportedMotionLaw(_))), "{text}");
        }
    }

    #[test]
    fn free_symbols_are_unsupported() {
        let e = Expr::symbol("omega") * Expr::t();
        assert!(matches!(e.derivative(), Err(MotionError::UnsupportedMotionLaw(_))));
        assert!(matches!(e.compile(), Err(MotionError::UnsupportedMotionLaw(_))));
    }

    #[test]
    fn compiled_matches_tree_evaluation() {
        let e = Expr::parse("2 + sin(12*t) - 0.5^t / (1 + t^2)").unwrap();
        let c = e.compile().unwrap();
        for t in [0.0, 0.25, 3.0, 9.75] {
            assert_eq!(c.eval(t), e.eval(t));
        }
    }

    #[test]
    fn simplify_folds_constants_and_identities() {
        let e = (Expr::constant(0.0) + Expr::t() * 1.0) * (2.0 * Expr::constant(3.0));
        assert_eq!(e.simplify(), Expr::Mul(Box::new(Expr::Const(6.0)), Box::new(Expr::Time)));
        assert_eq!(Expr::t().derivative().unwrap(), Expr::Const(1.0));
        assert_eq!(Expr::constant(5.0).derivative().unwrap(), Expr::Const(0.0));
    }

    #[test]
    fn parser_precedence() {
        assert_relative_eq!(Expr::parse("1 + 2 * 3").unwrap().eval(0.0), 7.0);
        assert_relative_eq!(Expr::parse("-2^2").unwrap().eval(0.0), -4.0);
        assert_relative_eq!(Expr::parse("2^3^2").unwrap().eval(0.0), 512.0);
        assert_relative_eq!(Expr::parse("2**-1").unwrap().eval(0.0), 0.5);
        assert_relative_eq!(Expr::parse("(1 + 2) * 3").unwrap().eval(0.0), 9.0);
        assert_relative_eq!(Expr::parse("1.5e2 + t").unwrap().eval(1.0), 151.0);
        assert_relative_eq!(Expr::parse("cos(pi)").unwrap().eval(0.0), -1.0);
    }

    #[test]
    fn parser_rejects_garbage() {
        for text in ["", "2 +", "sin(t", "foo(t)", "x + 1", "2 $ t", "(t))"] {
            assert!(matches!(Expr::parse(text), Err(MotionError::InvalidExpression(_))), "{text}");
        }
    }

    #[test]
    fn deep_nesting_is_rejected_not_recursed() {
        let parens = format!("{}t{}", "(".repeat(50_000), ")".repeat(50_000));
        let cases = [
            parens,
            "(".repeat(50_000),
            format!("{}t{}", "(".repeat(200), ")".repeat(200)),
            format!("{}t", "-".repeat(500)),
            format!("t{}", "^t".repeat(200)),
            format!("{}t{}", "cos(-".repeat(70), ")".repeat(70)),
        ];
        for text in &cases {
            assert!(matches!(Expr::parse(text), Err(MotionError::InvalidExpression(_))), "{} bytes", text.len());
        }
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let text = format!("{}t{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(Expr::parse(&text).unwrap(), Expr::Time);
        assert_relative_eq!(Expr::parse("--+-t").unwrap().eval(2.0), -2.0);
    }

    #[test]
    fn display_round_trips_through_parser() {
        let e = Expr::parse("(2 + sin(12*t)) * cos(t + 0.2*cos(12*t))").unwrap();
        let d = e.derivative().unwrap();
        let reparsed = Expr::parse(&d.to_string()).unwrap();
        for t in [0.0, 0.5, 1.7] {
            assert_relative_eq!(reparsed.eval(t), d.eval(t), epsilon = 1e-12);
        }
    }

    #[test]
    fn negative_base_integer_power_stays_real() {
        let e = Expr::parse("t^3").unwrap();
        assert_relative_eq!(e.compile().unwrap().eval(-2.0), -8.0);
    }
}
