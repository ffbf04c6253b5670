// procedural/expr.rs — the expression language of Expr modules
//
// Source text is parsed once into a small AST. The same tree is evaluated
// over two number types: `Dual3` for the value and its spatial gradient, and
// `Interval` for a conservative bound over the footprint. Both implement
// `Numeric`, so there is one evaluator.
//
// Grammar (lowest precedence first):
//   sum     := product (('+' | '-') product)*
//   product := unary (('*' | '/' | '%') unary)*
//   unary   := '-' unary | power
//   power   := primary ('^' unary)?
//   primary := number | name | name '(' sum (',' sum)* ')' | '(' sum ')'

use std::f64::consts::{E, PI};
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::error::{ProcError, Result};
use crate::math::{Dual3, Interval, Vec3};
use crate::procedural::modules::{signed_pow_dual, signed_pow_interval};

// ── Number types ────────────────────────────────────────────────────

/// Arithmetic the evaluator needs from a number type.
pub(crate) trait Numeric:
    Copy + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Div<Output = Self> + Neg<Output = Self>
{
    fn constant(v: f64) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn sqrt(self) -> Self;
    fn ln(self) -> Self;
    fn exp(self) -> Self;
    fn abs(self) -> Self;
    fn min(self, o: Self) -> Self;
    fn max(self, o: Self) -> Self;
    /// `atan2(self, x)`.
    fn atan2(self, x: Self) -> Self;
    fn pow(self, e: Self, constant_exponent: bool) -> Self;
    /// Floored remainder by `|m|`; 0 when `m` is 0.
    fn rem(self, m: Self) -> Self;
    fn bias(self, b: Self) -> Self;
    fn gain(self, g: Self) -> Self;
}

/// Exponent of the bias curve: `bias(0.5, b) == b`.
fn bias_exponent(b: f64) -> f64 {
    b.clamp(1e-6, 1.0 - 1e-6).ln() / 0.5f64.ln()
}

/// Perlin's bias: `v^(ln b / ln 0.5)` over `v` in [0, 1].
pub(crate) fn bias(v: f64, b: f64) -> f64 {
    if v <= 0.0 {
        return 0.0;
    }
    v.min(1.0).powf(bias_exponent(b))
}

/// d(bias)/dv
pub(crate) fn bias_slope(v: f64, b: f64) -> f64 {
    if v <= 0.0 || v >= 1.0 {
        return 0.0;
    }
    let e = bias_exponent(b);
    e * v.powf(e - 1.0)
}

/// Perlin's gain: two mirrored bias curves meeting at 0.5.
pub(crate) fn gain(v: f64, g: f64) -> f64 {
    if v < 0.5 {
        0.5 * bias(2.0 * v, 1.0 - g)
    } else {
        1.0 - 0.5 * bias(2.0 - 2.0 * v, 1.0 - g)
    }
}

/// d(gain)/dv
pub(crate) fn gain_slope(v: f64, g: f64) -> f64 {
    if v < 0.5 {
        bias_slope(2.0 * v, 1.0 - g)
    } else {
        bias_slope(2.0 - 2.0 * v, 1.0 - g)
    }
}

impl Numeric for Dual3 {
    fn constant(v: f64) -> Self {
        Dual3::constant(v)
    }
    fn sin(self) -> Self {
        Dual3::sin(self)
    }
    fn cos(self) -> Self {
        Dual3::cos(self)
    }
    fn sqrt(self) -> Self {
        Dual3::sqrt(self)
    }
    fn ln(self) -> Self {
        Dual3::ln(self)
    }
    fn exp(self) -> Self {
        Dual3::exp(self)
    }
    fn abs(self) -> Self {
        Dual3::abs(self)
    }
    fn min(self, o: Self) -> Self {
        Dual3::min(self, o)
    }
    fn max(self, o: Self) -> Self {
        Dual3::max(self, o)
    }
    fn atan2(self, x: Self) -> Self {
        Dual3::atan2(self, x)
    }
    fn pow(self, e: Self, constant_exponent: bool) -> Self {
        signed_pow_dual(self, e, constant_exponent)
    }
    fn rem(self, m: Self) -> Self {
        let modulus = m.val.abs();
        if modulus == 0.0 {
            return Dual3::constant(0.0);
        }
        let q = (self.val / modulus).floor();
        let sign = m.val.signum();
        Dual3::new(self.val - modulus * q, self.grad - m.grad * (sign * q))
    }
    fn bias(self, b: Self) -> Self {
        let v = bias(self.val, b.val);
        let slope = bias_slope(self.val, b.val);
        // d/db of v^(ln b / ln 0.5) = v^e ln(v) / (b ln 0.5)
        let db = if self.val > 0.0 && self.val < 1.0 && b.val > 0.0 && b.val < 1.0 {
            v * self.val.ln() / (b.val * 0.5f64.ln())
        } else {
            0.0
        };
        Dual3::new(v, self.grad * slope + b.grad * db)
    }
    fn gain(self, g: Self) -> Self {
        Dual3::new(gain(self.val, g.val), self.grad * gain_slope(self.val, g.val))
    }
}

impl Numeric for Interval {
    fn constant(v: f64) -> Self {
        Interval::point(v)
    }
    fn sin(self) -> Self {
        Interval::sin(self)
    }
    fn cos(self) -> Self {
        Interval::cos(self)
    }
    fn sqrt(self) -> Self {
        Interval::sqrt(self)
    }
    fn ln(self) -> Self {
        Interval::ln(self)
    }
    fn exp(self) -> Self {
        Interval::exp(self)
    }
    fn abs(self) -> Self {
        Interval::abs(self)
    }
    fn min(self, o: Self) -> Self {
        Interval::min(self, o)
    }
    fn max(self, o: Self) -> Self {
        Interval::max(self, o)
    }
    fn atan2(self, x: Self) -> Self {
        // Across the branch cut or around the origin the whole range is
        // reachable; elsewhere atan2 is monotone in each argument.
        if x.lo <= 0.0 && self.contains(0.0) {
            return Interval::new(-PI, PI);
        }
        Interval::corners(self, x, f64::atan2)
    }
    fn pow(self, e: Self, constant_exponent: bool) -> Self {
        signed_pow_interval(self, e, constant_exponent)
    }
    fn rem(self, m: Self) -> Self {
        if m.lo == m.hi {
            return Interval::rem(self, m.lo);
        }
        let top = m.lo.abs().max(m.hi.abs());
        Interval::new(0.0, top)
    }
    fn bias(self, b: Self) -> Self {
        Interval::corners(self, b, bias)
    }
    fn gain(self, g: Self) -> Self {
        // Monotone in v for every g.
        let lo = gain(self.lo, g.lo).min(gain(self.lo, g.hi));
        let hi = gain(self.hi, g.lo).max(gain(self.hi, g.hi));
        Interval::new(lo.min(hi), hi.max(lo))
    }
}

// ── AST ─────────────────────────────────────────────────────────────

/// Number of variable slots: x, y, z, t, input1, input2, input3.
pub const VAR_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Sin,
    Cos,
    Sqrt,
    Pow,
    Log,
    Angle,
    Min,
    Max,
    Abs,
    Exp,
    Bias,
    Gain,
}

impl Func {
    fn lookup(name: &str) -> Option<(Func, usize)> {
        Some(match name {
            "sin" => (Func::Sin, 1),
            "cos" => (Func::Cos, 1),
            "sqrt" => (Func::Sqrt, 1),
            "pow" => (Func::Pow, 2),
            "log" => (Func::Log, 1),
            "angle" => (Func::Angle, 2),
            "min" => (Func::Min, 2),
            "max" => (Func::Max, 2),
            "abs" => (Func::Abs, 1),
            "exp" => (Func::Exp, 1),
            "bias" => (Func::Bias, 2),
            "gain" => (Func::Gain, 2),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f64),
    Var(usize),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Pow {
        base: Box<Node>,
        exponent: Box<Node>,
        constant_exponent: bool,
    },
    Call(Func, Vec<Node>),
}

impl Node {
    fn is_constant(&self) -> bool {
        match self {
            Node::Const(_) => true,
            Node::Var(_) => false,
            Node::Neg(a) => a.is_constant(),
            Node::Binary(_, a, b) => a.is_constant() && b.is_constant(),
            Node::Pow { base, exponent, .. } => base.is_constant() && exponent.is_constant(),
            Node::Call(_, args) => args.iter().all(Node::is_constant),
        }
    }

    fn mark_vars(&self, used: &mut [bool; VAR_COUNT]) {
        match self {
            Node::Const(_) => {}
            Node::Var(i) => used[*i] = true,
            Node::Neg(a) => a.mark_vars(used),
            Node::Binary(_, a, b) => {
                a.mark_vars(used);
                b.mark_vars(used);
            }
            Node::Pow { base, exponent, .. } => {
                base.mark_vars(used);
                exponent.mark_vars(used);
            }
            Node::Call(_, args) => args.iter().for_each(|a| a.mark_vars(used)),
        }
    }

    fn eval<N: Numeric>(&self, vars: &[N; VAR_COUNT]) -> N {
        match self {
            Node::Const(v) => N::constant(*v),
            Node::Var(i) => vars[*i],
            Node::Neg(a) => -a.eval(vars),
            Node::Binary(op, a, b) => {
                let (a, b) = (a.eval(vars), b.eval(vars));
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Rem => a.rem(b),
                }
            }
            Node::Pow {
                base,
                exponent,
                constant_exponent,
            } => base.eval(vars).pow(exponent.eval(vars), *constant_exponent),
            Node::Call(f, args) => {
                let a = args[0].eval(vars);
                let b = || args[1].eval(vars);
                match f {
                    Func::Sin => a.sin(),
                    Func::Cos => a.cos(),
                    Func::Sqrt => a.sqrt(),
                    Func::Log => a.ln(),
                    Func::Abs => a.abs(),
                    Func::Exp => a.exp(),
                    Func::Pow => a.pow(b(), args[1].is_constant()),
                    // angle(x, y) is the polar angle of (x, y)
                    Func::Angle => b().atan2(a),
                    Func::Min => a.min(b()),
                    Func::Max => a.max(b()),
                    Func::Bias => a.bias(b()),
                    Func::Gain => a.gain(b()),
                }
            }
        }
    }
}

// ── Parser ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Name(String),
    Op(char),
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
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
            // Exponent: 1e-3, 2.5E+4
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
            let v = text
                .parse::<f64>()
                .map_err(|_| ProcError::Expression(format!("bad number '{text}'")))?;
            tokens.push(Token::Num(v));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            tokens.push(Token::Name(name.to_ascii_lowercase()));
        } else if "+-*/%^(),".contains(c) {
            tokens.push(Token::Op(c));
            i += 1;
        } else {
            return Err(ProcError::Expression(format!("unexpected character '{c}'")));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, op: char) -> bool {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: char) -> Result<()> {
        if self.eat(op) {
            Ok(())
        } else {
            Err(ProcError::Expression(format!("expected '{op}'")))
        }
    }

    fn sum(&mut self) -> Result<Node> {
        let mut node = self.product()?;
        loop {
            let op = if self.eat('+') {
                BinOp::Add
            } else if self.eat('-') {
                BinOp::Sub
            } else {
                return Ok(node);
            };
            node = Node::Binary(op, Box::new(node), Box::new(self.product()?));
        }
    }

    fn product(&mut self) -> Result<Node> {
        let mut node = self.unary()?;
        loop {
            let op = if self.eat('*') {
                BinOp::Mul
            } else if self.eat('/') {
                BinOp::Div
            } else if self.eat('%') {
                BinOp::Rem
            } else {
                return Ok(node);
            };
            node = Node::Binary(op, Box::new(node), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Node> {
        if self.eat('-') {
            return Ok(match self.unary()? {
                Node::Const(v) => Node::Const(-v),
                n => Node::Neg(Box::new(n)),
            });
        }
        self.power()
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.primary()?;
        if !self.eat('^') {
            return Ok(base);
        }
        let exponent = self.unary()?;
        Ok(Node::Pow {
            constant_exponent: exponent.is_constant(),
            base: Box::new(base),
            exponent: Box::new(exponent),
        })
    }

    fn primary(&mut self) -> Result<Node> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| ProcError::Expression("unexpected end of expression".into()))?;
        self.pos += 1;
        match token {
            Token::Num(v) => Ok(Node::Const(v)),
            Token::Op('(') => {
                let node = self.sum()?;
                self.expect(')')?;
                Ok(node)
            }
            Token::Op(c) => Err(ProcError::Expression(format!("unexpected '{c}'"))),
            Token::Name(name) => {
                if self.eat('(') {
                    let (func, arity) = Func::lookup(&name)
                        .ok_or_else(|| ProcError::Expression(format!("unknown function '{name}'")))?;
                    let mut args = vec![self.sum()?];
                    while self.eat(',') {
                        args.push(self.sum()?);
                    }
                    self.expect(')')?;
                    if args.len() != arity {
                        return Err(ProcError::Expression(format!(
                            "{name} takes {arity} argument(s), got {}",
                            args.len()
                        )));
                    }
                    return Ok(Node::Call(func, args));
                }
                Ok(match name.as_str() {
                    "x" => Node::Var(0),
                    "y" => Node::Var(1),
                    "z" => Node::Var(2),
                    "t" => Node::Var(3),
                    "input1" => Node::Var(4),
                    "input2" => Node::Var(5),
                    "input3" => Node::Var(6),
                    "e" => Node::Const(E),
                    "pi" => Node::Const(PI),
                    _ => return Err(ProcError::Expression(format!("unknown variable '{name}'"))),
                })
            }
        }
    }
}

// ── Program ─────────────────────────────────────────────────────────

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    root: Node,
    used: [bool; VAR_COUNT],
}

impl Program {
    pub fn parse(src: &str) -> Result<Program> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Err(ProcError::Expression("empty expression".into()));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.sum()?;
        if let Some(t) = parser.peek() {
            return Err(ProcError::Expression(format!("trailing input at {t:?}")));
        }
        let mut used = [false; VAR_COUNT];
        root.mark_vars(&mut used);
        Ok(Program { root, used })
    }

    /// The expression consisting of one variable slot.
    pub(crate) fn variable(slot: usize) -> Program {
        let mut used = [false; VAR_COUNT];
        used[slot] = true;
        Program {
            root: Node::Var(slot),
            used,
        }
    }

    /// Whether variable slot `i` (0..7) appears in the expression.
    pub fn uses(&self, slot: usize) -> bool {
        self.used.get(slot).copied().unwrap_or(false)
    }

    pub(crate) fn eval<N: Numeric>(&self, vars: &[N; VAR_COUNT]) -> N {
        self.root.eval(vars)
    }

    /// Plain value with every variable given as a number.
    pub fn value(&self, vars: [f64; VAR_COUNT]) -> f64 {
        let duals = vars.map(Dual3::constant);
        self.eval(&duals).val
    }

    /// Value and gradient, with x, y, z seeded as the unit axes.
    pub fn value_and_gradient(&self, vars: [f64; VAR_COUNT]) -> (f64, Vec3) {
        let mut duals = vars.map(Dual3::constant);
        for (axis, d) in duals.iter_mut().take(3).enumerate() {
            d.grad = Vec3::axis(axis);
        }
        let d = self.eval(&duals);
        (d.val, d.grad)
    }
}
