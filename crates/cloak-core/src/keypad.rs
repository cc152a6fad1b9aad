//! Keypad: one key stream, two independent consumers.
//!
//! [`Calculator`] owns the visible expression. [`ProbeBuffer`] owns the
//! hidden unlock-code candidate. Neither reads the other's buffer, so a probe
//! can never change what the display shows.

use std::fmt;
use zeroize::Zeroizing;

use crate::calculator::{Calculator, Operator};
use crate::config::GatewayConfig;
use crate::error::{CloakError, Result};

pub const CODE_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Decimal,
    Operator(Operator),
    Equals,
    Clear,
    Backspace,
}

impl Key {
    /// `Key::Digit` for `0..=9`, `None` otherwise.
    pub fn digit(d: u8) -> Option<Key> {
        (d <= 9).then_some(Key::Digit(d))
    }

    pub fn from_char(c: char) -> Option<Key> {
        match c {
            '0'..='9' => Key::digit(c as u8 - b'0'),
            '.' => Some(Key::Decimal),
            '=' => Some(Key::Equals),
            'C' | 'c' => Some(Key::Clear),
            '<' => Some(Key::Backspace),
            other => Operator::from_symbol(other).map(Key::Operator),
        }
    }

    /// Parses a run of key labels such as `12+8*2=`. Whitespace is skipped.
    pub fn parse_sequence(input: &str) -> Result<Vec<Key>> {
        input
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| {
                Key::from_char(c).ok_or_else(|| CloakError::InvalidInput(format!("unknown key '{c}'")))
            })
            .collect()
    }
}

/// A full candidate taken out of the probe buffer.
///
/// Carries its own digits, so resolving it never looks at the live buffer.
pub struct ProbeTicket {
    code: Zeroizing<String>,
    cycle: u64,
}

impl ProbeTicket {
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Buffer cycle this ticket closed.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

impl fmt::Debug for ProbeTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeTicket")
            .field("code", &"****")
            .field("cycle", &self.cycle)
            .finish()
    }
}

/// Sliding window over the last [`CODE_LEN`] digits.
#[derive(Default)]
pub struct ProbeBuffer {
    digits: Zeroizing<String>,
    cycle: u64,
}

impl ProbeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Emits a ticket and empties the buffer once it holds a full code.
    /// Values above 9 are ignored.
    pub fn push(&mut self, digit: u8) -> Option<ProbeTicket> {
        if digit > 9 {
            return None;
        }
        self.digits.push(char::from(b'0' + digit));
        if self.digits.len() > CODE_LEN {
            self.digits.remove(0);
        }
        if self.digits.len() < CODE_LEN {
            return None;
        }
        let code = Zeroizing::new(std::mem::take(&mut *self.digits));
        let ticket = ProbeTicket {
            code,
            cycle: self.cycle,
        };
        self.cycle += 1;
        Some(ticket)
    }

    pub fn clear(&mut self) {
        self.digits.clear();
        self.cycle += 1;
    }
}

impl fmt::Debug for ProbeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeBuffer")
            .field("len", &self.digits.len())
            .field("cycle", &self.cycle)
            .finish()
    }
}

#[derive(Debug)]
pub struct KeyOutcome {
    /// Expression as typed, for the upper display line.
    pub expression: String,
    /// Evaluated value, for the main display line.
    pub display: String,
    pub probe: Option<ProbeTicket>,
}

#[derive(Debug)]
pub struct Keypad {
    calculator: Calculator,
    probe: ProbeBuffer,
}

impl Keypad {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            calculator: Calculator::new(config.precedence, config.display_fraction_digits),
            probe: ProbeBuffer::new(),
        }
    }

    pub fn press(&mut self, key: Key) -> KeyOutcome {
        let mut probe = None;
        let display = match key {
            Key::Digit(d) if d > 9 => self.calculator.preview(),
            Key::Digit(d) => {
                probe = self.probe.push(d);
                self.calculator.push_digit(d);
                self.calculator.preview()
            }
            Key::Decimal => {
                self.calculator.push_decimal();
                self.calculator.preview()
            }
            Key::Operator(op) => {
                self.calculator.push_operator(op);
                self.calculator.preview()
            }
            Key::Equals => self.calculator.equals(),
            Key::Clear => {
                self.calculator.clear();
                self.probe.clear();
                self.calculator.preview()
            }
            Key::Backspace => {
                self.calculator.backspace();
                self.calculator.preview()
            }
        };
        KeyOutcome {
            expression: self.calculator.expression().to_string(),
            display,
            probe,
        }
    }

    /// Drops a partial candidate without touching the expression.
    pub fn reset_probe(&mut self) {
        self.probe.clear();
    }

    pub fn probe_len(&self) -> usize {
        self.probe.len()
    }

    pub fn expression(&self) -> &str {
        self.calculator.expression()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press_all(keypad: &mut Keypad, input: &str) -> Vec<KeyOutcome> {
        Key::parse_sequence(input)
            .unwrap()
            .into_iter()
            .map(|k| keypad.press(k))
            .collect()
    }

    #[test]
    fn parses_labels() {
        let keys = Key::parse_sequence("1 .+=C<").unwrap();
        assert_eq!(
            keys,
            vec![
                Key::Digit(1),
                Key::Decimal,
                Key::Operator(Operator::Add),
                Key::Equals,
                Key::Clear,
                Key::Backspace,
            ]
        );
        assert!(Key::parse_sequence("12a").is_err());
    }

    #[test]
    fn fourth_digit_emits_ticket_and_clears() {
        let mut probe = ProbeBuffer::new();
        assert!(probe.push(4).is_none());
        assert!(probe.push(8).is_none());
        assert!(probe.push(2).is_none());
        let ticket = probe.push(1).unwrap();
        assert_eq!(ticket.code(), "4821");
        assert_eq!(ticket.cycle(), 0);
        assert!(probe.is_empty());
        assert_eq!(probe.cycle(), 1);
    }

    #[test]
    fn clear_advances_cycle() {
        let mut probe = ProbeBuffer::new();
        probe.push(1);
        probe.clear();
        assert!(probe.is_empty());
        assert_eq!(probe.cycle(), 1);
    }

    #[test]
    fn ticket_debug_hides_digits() {
        let mut probe = ProbeBuffer::new();
        for d in [9, 9, 1, 1] {
            if let Some(ticket) = probe.push(d) {
                let shown = format!("{ticket:?}");
                assert!(!shown.contains("9911"));
            }
        }
    }

    #[test]
    fn digits_feed_both_consumers() {
        let mut keypad = Keypad::new(&GatewayConfig::default());
        let outcomes = press_all(&mut keypad, "12+84");
        assert!(outcomes[..4].iter().all(|o| o.probe.is_none()));
        assert_eq!(outcomes[4].probe.as_ref().unwrap().code(), "1284");
        assert_eq!(outcomes[4].expression, "12+84");
        assert_eq!(outcomes[4].display, "96");
    }

    #[test]
    fn operators_do_not_enter_probe() {
        let mut keypad = Keypad::new(&GatewayConfig::default());
        let outcomes = press_all(&mut keypad, "1+2*3.4");
        let ticket = outcomes.iter().find_map(|o| o.probe.as_ref()).unwrap();
        assert_eq!(ticket.code(), "1234");
    }

    #[test]
    fn clear_resets_both_buffers() {
        let mut keypad = Keypad::new(&GatewayConfig::default());
        press_all(&mut keypad, "12");
        let outcome = keypad.press(Key::Clear);
        assert_eq!(outcome.expression, "");
        assert_eq!(outcome.display, "0");
        assert_eq!(keypad.probe_len(), 0);
    }

    #[test]
    fn backspace_leaves_probe_alone() {
        let mut keypad = Keypad::new(&GatewayConfig::default());
        press_all(&mut keypad, "123");
        keypad.press(Key::Backspace);
        assert_eq!(keypad.expression(), "12");
        assert_eq!(keypad.probe_len(), 3);
    }

    #[test]
    fn equals_evaluates() {
        let mut keypad = Keypad::new(&GatewayConfig::default());
        let outcomes = press_all(&mut keypad, "5/0=");
        assert_eq!(outcomes.last().unwrap().display, "0");
    }

    #[test]
    fn out_of_range_digit_is_ignored() {
        assert_eq!(Key::digit(7), Some(Key::Digit(7)));
        assert!(Key::digit(10).is_none());

        let mut keypad = Keypad::new(&GatewayConfig::default());
        press_all(&mut keypad, "12");
        for d in [10, 42, 208, 255] {
            let outcome = keypad.press(Key::Digit(d));
            assert!(outcome.probe.is_none());
            assert_eq!(outcome.expression, "12");
            assert_eq!(outcome.display, "12");
        }
        assert_eq!(keypad.probe_len(), 2);
    }
}
