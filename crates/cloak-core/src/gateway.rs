//! Routes keypad probe tickets into the session.
//!
//! The keypad stays locked for the whole press, including probe resolution,
//! so tickets resolve strictly in the order they were cut and a pending
//! storage read can never meet a buffer that was refilled behind it.
//! Lifecycle events reach the session first and do not wait on that lock.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{CloakError, Result};
use crate::keypad::{Key, Keypad, ProbeTicket};
use crate::models::Lifecycle;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOutcome {
    pub expression: String,
    pub display: String,
    /// True only on the press that moved the session from locked to unlocked.
    pub unlocked_now: bool,
}

pub struct Gateway {
    session: Arc<Session>,
    keypad: Mutex<Keypad>,
}

impl Gateway {
    pub fn new(session: Arc<Session>) -> Self {
        let keypad = Keypad::new(session.config());
        Self {
            session,
            keypad: Mutex::new(keypad),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn press(&self, key: Key) -> GatewayOutcome {
        let mut keypad = self.keypad.lock().await;
        let outcome = keypad.press(key);
        let unlocked_now = match outcome.probe {
            Some(ticket) => self.resolve(ticket).await,
            None => false,
        };
        drop(keypad);
        GatewayOutcome {
            expression: outcome.expression,
            display: outcome.display,
            unlocked_now,
        }
    }

    /// Presses every key in `input`. The outcome is the last press, with
    /// `unlocked_now` set if any press unlocked.
    pub async fn press_str(&self, input: &str) -> Result<GatewayOutcome> {
        let keys = Key::parse_sequence(input)?;
        if keys.is_empty() {
            return Err(CloakError::InvalidInput("no keys".into()));
        }
        let mut unlocked_now = false;
        let mut last = None;
        for key in keys {
            let outcome = self.press(key).await;
            unlocked_now |= outcome.unlocked_now;
            last = Some(outcome);
        }
        let mut outcome = last.ok_or_else(|| CloakError::InvalidInput("no keys".into()))?;
        outcome.unlocked_now = unlocked_now;
        Ok(outcome)
    }

    pub async fn on_lifecycle(&self, event: Lifecycle) {
        self.session.on_lifecycle(event);
        if !event.is_foreground() {
            self.keypad.lock().await.reset_probe();
        }
    }

    /// Full reset back to first run. Holds the keypad so no digit typed
    /// before the reset can join the next setup proposal.
    pub async fn reset(&self) -> Result<()> {
        let mut keypad = self.keypad.lock().await;
        self.session.reset().await?;
        keypad.reset_probe();
        Ok(())
    }

    pub async fn probe_len(&self) -> usize {
        self.keypad.lock().await.probe_len()
    }

    async fn resolve(&self, ticket: ProbeTicket) -> bool {
        if !self.session.is_setup_complete() {
            if let Err(e) = self.session.complete_setup(ticket.code()).await {
                warn!(error = %e, cycle = ticket.cycle(), "setup proposal not committed");
            }
            return false;
        }
        let was_unlocked = self.session.is_unlocked();
        let unlocked = self.session.verify_probe(ticket.code()).await;
        unlocked && !was_unlocked
    }
}
