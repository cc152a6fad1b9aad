//! Persisted and observable records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    /// Milliseconds since the Unix epoch, never lower than the previous entry.
    pub timestamp: i64,
    #[serde(default)]
    pub status: MessageStatus,
}

/// Platform foreground signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Foreground,
    Inactive,
    Background,
}

impl Lifecycle {
    pub fn is_foreground(self) -> bool {
        matches!(self, Lifecycle::Foreground)
    }
}

/// Coarse position in the gateway state machine, derived from [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// No unlock code yet; the first four digits will become it.
    FirstRun,
    /// Plain calculator with a code on file.
    Disguised,
    /// Unlocked with no partner.
    AwaitingPairing,
    PairedLocked,
    PairedUnlocked,
}

/// In-memory view of the session. Never persisted as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub is_unlocked: bool,
    pub is_paired: bool,
    pub is_setup_complete: bool,
    pub device_id: Option<String>,
    pub paired_with: Option<String>,
    pub messages: Vec<Message>,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        match (self.is_setup_complete, self.is_paired, self.is_unlocked) {
            (false, _, _) => Phase::FirstRun,
            (true, false, false) => Phase::Disguised,
            (true, false, true) => Phase::AwaitingPairing,
            (true, true, false) => Phase::PairedLocked,
            (true, true, true) => Phase::PairedUnlocked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_wire_shape() {
        let msg = Message {
            id: "m1".into(),
            text: "hi".into(),
            sender_id: "dev".into(),
            timestamp: 42,
            status: MessageStatus::Sent,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["senderId"], "dev");
        assert_eq!(value["status"], "sent");
        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn phase_follows_flags() {
        let mut state = SessionState::default();
        assert_eq!(state.phase(), Phase::FirstRun);
        state.is_setup_complete = true;
        assert_eq!(state.phase(), Phase::Disguised);
        state.is_unlocked = true;
        assert_eq!(state.phase(), Phase::AwaitingPairing);
        state.is_paired = true;
        assert_eq!(state.phase(), Phase::PairedUnlocked);
        state.is_unlocked = false;
        assert_eq!(state.phase(), Phase::PairedLocked);
    }
}
