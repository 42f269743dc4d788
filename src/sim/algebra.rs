//! Exact single-variable simplifier for the equation solver
//!
//! Expressions are parsed into polynomials with rational coefficients
//! (negative exponents allowed for monomials) and rendered back to a
//! canonical string, highest degree first. Arithmetic is checked: overflow is
//! an error, never a wrap.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Largest exponent accepted in `^`
const MAX_EXPONENT: i64 = 16;
/// Longest decimal fraction accepted in a literal
const MAX_DECIMALS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlgebraError {
    #[error("{0}")]
    Parse(String),
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("cannot divide by a multi-term expression")]
    NonMonomialDivisor,
    #[error("exponent out of range")]
    Exponent,
    #[error("number too large")]
    Overflow,
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Reduced fraction with a positive denominator.
///
/// The numerator never holds `i64::MIN`, so negation and `abs` cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i64,
    den: i64,
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Whole number; `i64::MIN` saturates to `-i64::MAX`
    pub fn integer(n: i64) -> Self {
        Self {
            num: n.max(-i64::MAX),
            den: 1,
        }
    }

    pub fn new(num: i64, den: i64) -> Result<Self, AlgebraError> {
        Self::reduce(num as i128, den as i128)
    }

    fn reduce(num: i128, den: i128) -> Result<Self, AlgebraError> {
        if den == 0 {
            return Err(AlgebraError::DivisionByZero);
        }
        let g = gcd(num, den).max(1);
        let sign = if den < 0 { -1 } else { 1 };
        let num = i64::try_from(sign * num / g)
            .ok()
            .filter(|&n| n != i64::MIN)
            .ok_or(AlgebraError::Overflow)?;
        let den = i64::try_from(sign * den / g).map_err(|_| AlgebraError::Overflow)?;
        Ok(Self { num, den })
    }

    /// Parse an unsigned decimal literal such as `12` or `0.25`
    pub fn parse_decimal(text: &str) -> Result<Self, AlgebraError> {
        let bad = || AlgebraError::Parse(format!("bad number `{}`", text));
        let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(bad());
        }
        if frac.len() as u32 > MAX_DECIMALS {
            return Err(AlgebraError::Overflow);
        }
        let digits = format!("{}{}", whole, frac);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(bad());
        }
        let num: i128 = digits.parse().map_err(|_| AlgebraError::Overflow)?;
        Self::reduce(num, 10i128.pow(frac.len() as u32))
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn is_negative(&self) -> bool {
        self.num < 0
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn abs(&self) -> Self {
        Self {
            num: self.num.abs(),
            den: self.den,
        }
    }

    pub fn checked_add(self, other: Self) -> Result<Self, AlgebraError> {
        let num = self.num as i128 * other.den as i128 + other.num as i128 * self.den as i128;
        Self::reduce(num, self.den as i128 * other.den as i128)
    }

    pub fn checked_neg(self) -> Result<Self, AlgebraError> {
        Self::reduce(-(self.num as i128), self.den as i128)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, AlgebraError> {
        self.checked_add(other.checked_neg()?)
    }

    pub fn checked_mul(self, other: Self) -> Result<Self, AlgebraError> {
        Self::reduce(
            self.num as i128 * other.num as i128,
            self.den as i128 * other.den as i128,
        )
    }

    pub fn checked_div(self, other: Self) -> Result<Self, AlgebraError> {
        Self::reduce(
            self.num as i128 * other.den as i128,
            self.den as i128 * other.num as i128,
        )
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num as i128 * other.den as i128).cmp(&(other.num as i128 * self.den as i128))
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Sum of `coef * var^degree` terms; zero coefficients are never stored
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Poly {
    terms: BTreeMap<i32, Rational>,
}

impl Poly {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(value: Rational) -> Self {
        Self::monomial(value, 0)
    }

    pub fn var() -> Self {
        Self::monomial(Rational::ONE, 1)
    }

    pub fn monomial(coef: Rational, degree: i32) -> Self {
        let mut terms = BTreeMap::new();
        if !coef.is_zero() {
            terms.insert(degree, coef);
        }
        Self { terms }
    }

    /// Value when the polynomial has no variable terms
    pub fn as_constant(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::ZERO),
            1 => self.terms.get(&0).copied(),
            _ => None,
        }
    }

    /// Exactly `x`
    pub fn is_bare_variable(&self) -> bool {
        self.terms.len() == 1 && self.terms.get(&1) == Some(&Rational::ONE)
    }

    fn single_term(&self) -> Option<(i32, Rational)> {
        if self.terms.len() == 1 {
            self.terms.iter().next().map(|(&d, &c)| (d, c))
        } else {
            None
        }
    }

    fn insert_sum(&mut self, degree: i32, coef: Rational) -> Result<(), AlgebraError> {
        let sum = match self.terms.get(&degree) {
            Some(existing) => existing.checked_add(coef)?,
            None => coef,
        };
        if sum.is_zero() {
            self.terms.remove(&degree);
        } else {
            self.terms.insert(degree, sum);
        }
        Ok(())
    }

    pub fn add(&self, other: &Poly) -> Result<Poly, AlgebraError> {
        let mut out = self.clone();
        for (&degree, &coef) in &other.terms {
            out.insert_sum(degree, coef)?;
        }
        Ok(out)
    }

    pub fn neg(&self) -> Result<Poly, AlgebraError> {
        let mut out = Poly::zero();
        for (&degree, &coef) in &self.terms {
            out.terms.insert(degree, coef.checked_neg()?);
        }
        Ok(out)
    }

    pub fn sub(&self, other: &Poly) -> Result<Poly, AlgebraError> {
        self.add(&other.neg()?)
    }

    pub fn mul(&self, other: &Poly) -> Result<Poly, AlgebraError> {
        let mut out = Poly::zero();
        for (&da, &ca) in &self.terms {
            for (&db, &cb) in &other.terms {
                let degree = da.checked_add(db).ok_or(AlgebraError::Exponent)?;
                out.insert_sum(degree, ca.checked_mul(cb)?)?;
            }
        }
        Ok(out)
    }

    /// Divide by a single-term divisor
    pub fn div(&self, divisor: &Poly) -> Result<Poly, AlgebraError> {
        if divisor.terms.is_empty() {
            return Err(AlgebraError::DivisionByZero);
        }
        let (degree, coef) = divisor.single_term().ok_or(AlgebraError::NonMonomialDivisor)?;
        let inverse = Poly::monomial(
            Rational::ONE.checked_div(coef)?,
            degree.checked_neg().ok_or(AlgebraError::Exponent)?,
        );
        self.mul(&inverse)
    }

    pub fn pow(&self, exponent: i64) -> Result<Poly, AlgebraError> {
        if exponent.abs() > MAX_EXPONENT {
            return Err(AlgebraError::Exponent);
        }
        let base = if exponent < 0 {
            Poly::constant(Rational::ONE).div(self)?
        } else {
            self.clone()
        };
        let mut out = Poly::constant(Rational::ONE);
        for _ in 0..exponent.abs() {
            out = out.mul(&base)?;
        }
        Ok(out)
    }

    /// Substitute a value for the variable
    pub fn eval(&self, x: Rational) -> Result<Rational, AlgebraError> {
        let mut total = Rational::ZERO;
        for (&degree, &coef) in &self.terms {
            let mut power = Rational::ONE;
            for _ in 0..degree.unsigned_abs() {
                power = power.checked_mul(x)?;
            }
            if degree < 0 {
                power = Rational::ONE.checked_div(power)?;
            }
            total = total.checked_add(coef.checked_mul(power)?)?;
        }
        Ok(total)
    }

    /// Canonical text, highest degree first. `implicit` renders `2x` instead of `2*x`.
    pub fn render(&self, var: &str, implicit: bool) -> String {
        if self.terms.is_empty() {
            return "0".to_string();
        }
        let mut out = String::new();
        for (i, (&degree, coef)) in self.terms.iter().rev().enumerate() {
            let magnitude = coef.abs();
            match (i, coef.is_negative()) {
                (0, true) => out.push('-'),
                (0, false) => {}
                (_, true) => out.push_str(" - "),
                (_, false) => out.push_str(" + "),
            }
            if degree == 0 {
                out.push_str(&magnitude.to_string());
                continue;
            }
            if magnitude != Rational::ONE {
                if magnitude.is_integer() {
                    out.push_str(&magnitude.to_string());
                } else {
                    out.push_str(&format!("({})", magnitude));
                }
                if !implicit {
                    out.push('*');
                }
            }
            out.push_str(var);
            if degree != 1 {
                out.push_str(&format!("^{}", degree));
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Rational),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(text: &str) -> Result<Vec<Token>, AlgebraError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(Rational::parse_decimal(&literal)?));
            }
            c if c.is_alphabetic() => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            _ => {
                let token = match c {
                    '+' => Token::Plus,
                    '-' | '−' => Token::Minus,
                    '*' | '×' | '·' => Token::Star,
                    '/' | '÷' => Token::Slash,
                    '^' => Token::Caret,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    other => {
                        return Err(AlgebraError::Parse(format!("unexpected `{}`", other)));
                    }
                };
                tokens.push(token);
                chars.next();
            }
        }
    }
    Ok(tokens)
}

/// Recursive-descent parser over a token list
struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    var: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Poly, AlgebraError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value = value.add(&self.term()?)?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value = value.sub(&self.term()?)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<Poly, AlgebraError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value = value.mul(&self.unary()?)?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    value = value.div(&self.unary()?)?;
                }
                // Implicit multiplication: `2x`, `3(x + 1)`, `(x)(x)`
                Some(Token::Ident(_)) | Some(Token::LParen) => {
                    value = value.mul(&self.unary()?)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<Poly, AlgebraError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                self.unary()?.neg()
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Poly, AlgebraError> {
        let base = self.atom()?;
        if self.peek() != Some(&Token::Caret) {
            return Ok(base);
        }
        self.pos += 1;
        let negative = if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            true
        } else {
            false
        };
        let exponent = match self.next() {
            Some(Token::Num(n)) if n.is_integer() => n.num,
            _ => return Err(AlgebraError::Parse("exponent must be an integer".to_string())),
        };
        base.pow(if negative { -exponent } else { exponent })
    }

    fn atom(&mut self) -> Result<Poly, AlgebraError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Poly::constant(n)),
            Some(Token::Ident(name)) if name == self.var => Ok(Poly::var()),
            Some(Token::Ident(name)) => Err(AlgebraError::UnknownSymbol(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(AlgebraError::Parse("missing `)`".to_string())),
                }
            }
            Some(other) => Err(AlgebraError::Parse(format!("unexpected {:?}", other))),
            None => Err(AlgebraError::Parse("unexpected end of expression".to_string())),
        }
    }
}

/// Parse `text` as a polynomial in `var`
pub fn parse(text: &str, var: &str) -> Result<Poly, AlgebraError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(AlgebraError::Parse("empty expression".to_string()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        var,
    };
    let poly = parser.expr()?;
    match parser.peek() {
        None => Ok(poly),
        Some(token) => Err(AlgebraError::Parse(format!("trailing {:?}", token))),
    }
}

/// Parse and re-render in canonical form
pub fn simplify(text: &str, var: &str, implicit: bool) -> Result<String, AlgebraError> {
    parse(text, var).map(|poly| poly.render(var, implicit))
}
