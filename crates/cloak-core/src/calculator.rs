//! Arithmetic half of the keypad.
//!
//! The buffer holds the expression exactly as typed. Evaluation never fails:
//! anything that cannot produce a finite number (division by zero, overflow,
//! a malformed buffer) shows [`SENTINEL`].

use crate::config::Precedence;

pub const SENTINEL: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
            Operator::Rem => '%',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' | 'x' | '×' => Some(Operator::Mul),
            '/' | '÷' => Some(Operator::Div),
            '%' => Some(Operator::Rem),
            _ => None,
        }
    }

    fn is_multiplicative(self) -> bool {
        matches!(self, Operator::Mul | Operator::Div | Operator::Rem)
    }

    /// `None` on a zero divisor or a non-finite result.
    fn apply(self, lhs: f64, rhs: f64) -> Option<f64> {
        let value = match self {
            Operator::Add => lhs + rhs,
            Operator::Sub => lhs - rhs,
            Operator::Mul => lhs * rhs,
            Operator::Div if rhs == 0.0 => return None,
            Operator::Div => lhs / rhs,
            Operator::Rem if rhs == 0.0 => return None,
            Operator::Rem => lhs % rhs,
        };
        value.is_finite().then_some(value)
    }
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '%')
}

#[derive(Debug, Clone)]
pub struct Calculator {
    buffer: String,
    precedence: Precedence,
    fraction_digits: usize,
}

impl Calculator {
    pub fn new(precedence: Precedence, fraction_digits: usize) -> Self {
        Self {
            buffer: String::new(),
            precedence,
            fraction_digits,
        }
    }

    pub fn expression(&self) -> &str {
        &self.buffer
    }

    /// Operand currently being typed; a leading sign is not part of it.
    fn current_operand(&self) -> &str {
        let body_start = usize::from(self.buffer.starts_with('-'));
        let body = &self.buffer[body_start..];
        match body.rfind(is_operator_char) {
            Some(idx) => &body[idx + 1..],
            None => body,
        }
    }

    fn ends_with_operator(&self) -> bool {
        self.buffer.len() > 1 && self.buffer.ends_with(is_operator_char)
    }

    /// Values above 9 are ignored.
    pub fn push_digit(&mut self, digit: u8) {
        if digit > 9 {
            return;
        }
        if self.current_operand() == "0" {
            self.buffer.pop();
        }
        self.buffer.push(char::from(b'0' + digit));
    }

    /// Returns `false` when the press would put a second point in one operand.
    pub fn push_decimal(&mut self) -> bool {
        let operand = self.current_operand();
        if operand.contains('.') {
            return false;
        }
        if operand.is_empty() {
            self.buffer.push('0');
        }
        self.buffer.push('.');
        true
    }

    pub fn push_operator(&mut self, op: Operator) {
        if self.buffer.is_empty() || self.buffer == "-" {
            if op == Operator::Sub {
                self.buffer = "-".into();
            }
            return;
        }
        if self.buffer.ends_with('.') {
            self.buffer.pop();
        }
        if self.ends_with_operator() {
            self.buffer.pop();
        }
        self.buffer.push(op.symbol());
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Replaces the buffer with its value.
    pub fn equals(&mut self) -> String {
        if self.buffer.is_empty() {
            return SENTINEL.to_string();
        }
        let result = self.preview();
        self.buffer = if result == SENTINEL {
            String::new()
        } else {
            result.clone()
        };
        result
    }

    /// Value of the buffer as it would read after `=`, without committing.
    pub fn preview(&self) -> String {
        evaluate(&self.buffer, self.precedence, self.fraction_digits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(Operator),
}

fn tokenize(expr: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut number = String::new();
    for (idx, c) in expr.chars().enumerate() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let op = Operator::from_symbol(c)?;
        if idx == 0 && op == Operator::Sub {
            number.push('-');
            continue;
        }
        if number.is_empty() || number == "-" {
            return None;
        }
        tokens.push(Token::Num(parse_operand(&number)?));
        number.clear();
        tokens.push(Token::Op(op));
    }
    if !number.is_empty() && number != "-" {
        tokens.push(Token::Num(parse_operand(&number)?));
    }
    if matches!(tokens.last(), Some(Token::Op(_))) {
        tokens.pop();
    }
    Some(tokens)
}

fn parse_operand(text: &str) -> Option<f64> {
    text.trim_end_matches('.').parse::<f64>().ok()
}

fn split(tokens: &[Token]) -> Option<(f64, Vec<(Operator, f64)>)> {
    let mut iter = tokens.iter();
    let first = match iter.next()? {
        Token::Num(n) => *n,
        Token::Op(_) => return None,
    };
    let mut rest = Vec::new();
    while let Some(token) = iter.next() {
        match (token, iter.next()) {
            (Token::Op(op), Some(Token::Num(n))) => rest.push((*op, *n)),
            _ => return None,
        }
    }
    Some((first, rest))
}

fn eval_standard(first: f64, rest: &[(Operator, f64)]) -> Option<f64> {
    let mut sum = 0.0;
    let mut pending = Operator::Add;
    let mut term = first;
    for &(op, rhs) in rest {
        if op.is_multiplicative() {
            term = op.apply(term, rhs)?;
        } else {
            sum = pending.apply(sum, term)?;
            pending = op;
            term = rhs;
        }
    }
    pending.apply(sum, term)
}

fn eval_left_to_right(first: f64, rest: &[(Operator, f64)]) -> Option<f64> {
    rest.iter()
        .try_fold(first, |acc, &(op, rhs)| op.apply(acc, rhs))
}

/// Evaluates a keypad expression. A trailing operator is ignored.
pub fn evaluate(expr: &str, precedence: Precedence, fraction_digits: usize) -> String {
    let value = tokenize(expr)
        .filter(|tokens| !tokens.is_empty())
        .and_then(|tokens| split(&tokens))
        .and_then(|(first, rest)| match precedence {
            Precedence::Standard => eval_standard(first, &rest),
            Precedence::LeftToRight => eval_left_to_right(first, &rest),
        });
    match value {
        Some(v) => format_result(v, fraction_digits),
        None => SENTINEL.to_string(),
    }
}

/// Rounds to `fraction_digits` and trims trailing zeros.
pub fn format_result(value: f64, fraction_digits: usize) -> String {
    if !value.is_finite() {
        return SENTINEL.to_string();
    }
    let mut text = format!("{:.*}", fraction_digits, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = SENTINEL.to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> String {
        evaluate(expr, Precedence::Standard, 8)
    }

    fn typed(input: &str) -> Calculator {
        let mut calc = Calculator::new(Precedence::Standard, 8);
        for c in input.chars() {
            match c {
                '0'..='9' => calc.push_digit(c as u8 - b'0'),
                '.' => {
                    calc.push_decimal();
                }
                _ => calc.push_operator(Operator::from_symbol(c).unwrap()),
            }
        }
        calc
    }

    #[test]
    fn standard_precedence() {
        assert_eq!(eval("12+8*2"), "28");
        assert_eq!(eval("10-4/2"), "8");
        assert_eq!(eval("2*3+4*5"), "26");
        assert_eq!(eval("7%4+1"), "4");
    }

    #[test]
    fn left_to_right_precedence() {
        assert_eq!(evaluate("12+8*2", Precedence::LeftToRight, 8), "40");
        assert_eq!(evaluate("10-4/2", Precedence::LeftToRight, 8), "3");
    }

    #[test]
    fn division_by_zero_is_sentinel() {
        assert_eq!(eval("5/0"), "0");
        assert_eq!(eval("5%0"), "0");
        assert_eq!(eval("1+5/0*3"), "0");
    }

    #[test]
    fn overflow_is_sentinel() {
        let huge = format!("9{}", "9".repeat(308));
        assert_eq!(eval(&format!("{huge}*{huge}")), "0");
    }

    #[test]
    fn rounds_to_eight_places() {
        assert_eq!(eval("1/3"), "0.33333333");
        assert_eq!(eval("2/3"), "0.66666667");
        assert_eq!(eval("0.1+0.2"), "0.3");
        assert_eq!(evaluate("1/3", Precedence::Standard, 2), "0.33");
    }

    #[test]
    fn negative_results_and_leading_sign() {
        assert_eq!(eval("3-5"), "-2");
        assert_eq!(eval("-3*2"), "-6");
        assert_eq!(eval("0-0"), "0");
    }

    #[test]
    fn trailing_operator_ignored() {
        assert_eq!(eval("12+"), "12");
        assert_eq!(eval(""), "0");
        assert_eq!(eval("-"), "0");
    }

    #[test]
    fn consecutive_operators_collapse() {
        let calc = typed("5+*-3");
        assert_eq!(calc.expression(), "5-3");
    }

    #[test]
    fn second_decimal_rejected() {
        let mut calc = typed("1.5");
        assert!(!calc.push_decimal());
        assert_eq!(calc.expression(), "1.5");
        calc.push_operator(Operator::Add);
        assert!(calc.push_decimal());
        assert_eq!(calc.expression(), "1.5+0.");
    }

    #[test]
    fn leading_zero_replaced() {
        let calc = typed("007+0");
        assert_eq!(calc.expression(), "7+0");
    }

    #[test]
    fn operator_on_empty_buffer() {
        let mut calc = Calculator::new(Precedence::Standard, 8);
        calc.push_operator(Operator::Mul);
        assert_eq!(calc.expression(), "");
        calc.push_operator(Operator::Sub);
        assert_eq!(calc.expression(), "-");
    }

    #[test]
    fn equals_replaces_buffer() {
        let mut calc = typed("12+8*2");
        assert_eq!(calc.equals(), "28");
        assert_eq!(calc.expression(), "28");
        calc.push_operator(Operator::Div);
        calc.push_digit(4);
        assert_eq!(calc.equals(), "7");
    }

    #[test]
    fn equals_on_sentinel_resets() {
        let mut calc = typed("5/0");
        assert_eq!(calc.equals(), "0");
        assert_eq!(calc.expression(), "");
    }

    #[test]
    fn trailing_point_closed_before_operator() {
        let calc = typed("4.+1");
        assert_eq!(calc.expression(), "4+1");
    }
}
