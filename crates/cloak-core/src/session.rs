//! Session state controller.
//!
//! Single owner of [`SessionState`]. Every transition writes storage first
//! and publishes the new state only after the write settles. Observers get
//! snapshots through a `watch` channel.
//!
//! Locking always wins: `lock()` bumps an epoch, and an unlock whose probe
//! started under an older epoch is discarded when it finally resolves.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::GatewayConfig;
use crate::error::{CloakError, Result};
use crate::keypad::CODE_LEN;
use crate::models::{Lifecycle, Message, MessageStatus, SessionState};
use crate::pairing;
use crate::storage::{get_json, keys, set_json, BulkStore, SecretStore};

pub fn validate_unlock_code(code: &str) -> Result<()> {
    if code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(CloakError::InvalidInput(format!(
            "unlock code must be exactly {CODE_LEN} digits"
        )))
    }
}

/// Compares fixed-size digests so the cost does not depend on where the
/// candidate first differs.
fn codes_match(stored: &str, candidate: &str) -> bool {
    let a = Sha256::digest(stored.as_bytes());
    let b = Sha256::digest(candidate.as_bytes());
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

async fn load_or_create_device_id(secrets: &dyn SecretStore) -> Result<String> {
    if let Some(id) = secrets.secret_get(keys::DEVICE_ID).await? {
        return Ok(id);
    }
    let id = Uuid::new_v4().to_string();
    secrets.secret_set(keys::DEVICE_ID, &id).await?;
    info!(device_id = %id, "device identity created");
    Ok(id)
}

fn recover<T>(result: Result<Option<T>>, what: &str) -> Option<T> {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "{what} unavailable at startup; using default");
        None
    })
}

pub struct Session {
    secrets: Arc<dyn SecretStore>,
    bulk: Arc<dyn BulkStore>,
    config: GatewayConfig,
    state: watch::Sender<SessionState>,
    lock_epoch: AtomicU64,
    foreground: AtomicBool,
    /// Serializes read-modify-write cycles on the bulk store.
    writes: Mutex<()>,
}

impl Session {
    /// Loads persisted state. Storage failures degrade to unset defaults so
    /// the calculator always comes up.
    pub async fn start(
        secrets: Arc<dyn SecretStore>,
        bulk: Arc<dyn BulkStore>,
        config: GatewayConfig,
    ) -> Self {
        let device_id = match load_or_create_device_id(secrets.as_ref()).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "device identity unavailable at startup");
                None
            }
        };
        let is_setup_complete = recover(
            get_json::<bool>(bulk.as_ref(), keys::SETUP_COMPLETE).await,
            "setup flag",
        )
        .unwrap_or(false);
        let paired_with = recover(
            get_json::<String>(bulk.as_ref(), keys::PAIRED_WITH).await,
            "pairing link",
        );
        let messages = if paired_with.is_some() {
            recover(
                get_json::<Vec<Message>>(bulk.as_ref(), keys::MESSAGES).await,
                "message collection",
            )
            .unwrap_or_default()
        } else {
            Vec::new()
        };

        let initial = SessionState {
            is_unlocked: false,
            is_paired: paired_with.is_some(),
            is_setup_complete,
            device_id,
            paired_with,
            messages,
        };
        debug!(phase = ?initial.phase(), "session started");
        let (state, _) = watch::channel(initial);

        Self {
            secrets,
            bulk,
            config,
            state,
            lock_epoch: AtomicU64::new(0),
            foreground: AtomicBool::new(true),
            writes: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    // ── Observables ─────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.borrow().is_unlocked
    }

    pub fn is_paired(&self) -> bool {
        self.state.borrow().is_paired
    }

    pub fn is_setup_complete(&self) -> bool {
        self.state.borrow().is_setup_complete
    }

    pub fn paired_with(&self) -> Option<String> {
        self.state.borrow().paired_with.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.clone()
    }

    /// Device identity, created on first access. Retries storage if startup
    /// could not load it.
    pub async fn device_id(&self) -> Result<String> {
        if let Some(id) = self.known_device_id() {
            return Ok(id);
        }
        // Concurrent first callers must all see the one id that gets stored.
        let _writes = self.writes.lock().await;
        if let Some(id) = self.known_device_id() {
            return Ok(id);
        }
        let id = load_or_create_device_id(self.secrets.as_ref())
            .await
            .map_err(|e| {
                warn!(error = %e, "device identity still unavailable");
                CloakError::MissingIdentity
            })?;
        self.state.send_modify(|s| s.device_id = Some(id.clone()));
        Ok(id)
    }

    fn known_device_id(&self) -> Option<String> {
        self.state.borrow().device_id.clone()
    }

    // ── Lock / unlock ───────────────────────────────────────────────────────

    fn commit_unlock(&self, epoch: u64) -> bool {
        let mut allowed = false;
        self.state.send_if_modified(|s| {
            allowed = s.is_setup_complete
                && self.foreground.load(Ordering::SeqCst)
                && self.lock_epoch.load(Ordering::SeqCst) == epoch;
            if allowed && !s.is_unlocked {
                s.is_unlocked = true;
                return true;
            }
            false
        });
        allowed
    }

    /// Opens the private space. Refused while backgrounded or before setup.
    pub fn unlock(&self) -> bool {
        self.commit_unlock(self.lock_epoch.load(Ordering::SeqCst))
    }

    /// Idempotent; never touches storage.
    pub fn lock(&self) {
        let changed = self.state.send_if_modified(|s| {
            self.lock_epoch.fetch_add(1, Ordering::SeqCst);
            std::mem::replace(&mut s.is_unlocked, false)
        });
        if changed {
            info!("session locked");
        }
    }

    /// Leaving the foreground locks. Returning only re-enables unlocking.
    pub fn on_lifecycle(&self, event: Lifecycle) {
        let foreground = event.is_foreground();
        let was = self.foreground.swap(foreground, Ordering::SeqCst);
        if !foreground {
            self.lock();
        }
        if was != foreground {
            debug!(?event, "lifecycle transition");
        }
    }

    /// Resolves a full probe. Wrong codes, missing codes and storage errors
    /// all come back as a plain `false`.
    pub async fn verify_probe(&self, candidate: &str) -> bool {
        let epoch = self.lock_epoch.load(Ordering::SeqCst);
        let stored = match self.secrets.secret_get(keys::UNLOCK_CODE).await {
            Ok(Some(code)) => Zeroizing::new(code),
            Ok(None) => {
                debug!("probe resolved with no stored code");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "probe resolved without the stored code");
                return false;
            }
        };
        if !codes_match(&stored, candidate) {
            debug!("probe did not match");
            return false;
        }
        let unlocked = self.commit_unlock(epoch);
        if unlocked {
            info!("session unlocked");
        } else {
            debug!("matching probe discarded after lock");
        }
        unlocked
    }

    // ── Setup ───────────────────────────────────────────────────────────────

    /// Stores the first unlock code and marks setup complete.
    pub async fn complete_setup(&self, code: &str) -> Result<()> {
        validate_unlock_code(code)?;
        let _writes = self.writes.lock().await;
        let done = self.state.borrow().is_setup_complete;
        if done {
            return Err(CloakError::AlreadySetUp);
        }
        self.secrets.secret_set(keys::UNLOCK_CODE, code).await?;
        set_json(self.bulk.as_ref(), keys::SETUP_COMPLETE, &true).await?;
        self.state.send_modify(|s| s.is_setup_complete = true);
        info!("unlock code committed; setup complete");
        Ok(())
    }

    /// Replaces the unlock code. Only from inside the unlocked space.
    pub async fn change_code(&self, code: &str) -> Result<()> {
        validate_unlock_code(code)?;
        if !self.is_unlocked() {
            return Err(CloakError::Locked);
        }
        let _writes = self.writes.lock().await;
        self.secrets.secret_set(keys::UNLOCK_CODE, code).await?;
        info!("unlock code changed");
        Ok(())
    }

    // ── Pairing ─────────────────────────────────────────────────────────────

    pub async fn generate_pairing_code(&self) -> Result<String> {
        let len = self.config.pairing_code_len.max(pairing::MIN_CODE_LEN);
        let code = pairing::generate_code(len);
        let _writes = self.writes.lock().await;
        set_json(self.bulk.as_ref(), keys::PAIRING_CODE, &code).await?;
        info!("pairing code generated");
        Ok(code)
    }

    /// Links this install to `code`. Any code of the minimum length is
    /// accepted; nothing is verified against a remote peer. Re-joining the
    /// current partner succeeds without touching storage.
    pub async fn join_with_code(&self, code: &str) -> Result<bool> {
        let partner = pairing::validate_join_code(code)?;
        let _writes = self.writes.lock().await;
        let current = self.state.borrow().paired_with.clone();
        if current.as_deref() == Some(partner.as_str()) {
            debug!("already paired with that code");
            return Ok(true);
        }
        set_json(self.bulk.as_ref(), keys::PAIRED_WITH, &partner).await?;
        let messages = recover(self.load_messages().await.map(Some), "message collection")
            .unwrap_or_default();
        self.state.send_modify(|s| {
            s.is_paired = true;
            s.paired_with = Some(partner);
            s.messages = messages;
        });
        info!("paired");
        Ok(true)
    }

    /// Removes the link, any pending pairing code and every message.
    pub async fn unpair(&self) -> Result<()> {
        let _writes = self.writes.lock().await;
        // Link goes last so a partial failure still reads as paired.
        self.bulk.bulk_delete(keys::MESSAGES).await?;
        self.bulk.bulk_delete(keys::PAIRING_CODE).await?;
        self.bulk.bulk_delete(keys::PAIRED_WITH).await?;
        self.state.send_modify(|s| {
            s.is_paired = false;
            s.paired_with = None;
            s.messages.clear();
        });
        info!("unpaired; local messages destroyed");
        Ok(())
    }

    // ── Messages ────────────────────────────────────────────────────────────

    async fn load_messages(&self) -> Result<Vec<Message>> {
        Ok(get_json::<Vec<Message>>(self.bulk.as_ref(), keys::MESSAGES)
            .await?
            .unwrap_or_default())
    }

    pub async fn send_message(&self, text: &str) -> Result<Message> {
        if text.trim().is_empty() {
            return Err(CloakError::InvalidInput("message is empty".into()));
        }
        let sender_id = self.device_id().await?;
        let _writes = self.writes.lock().await;
        let mut messages = self.load_messages().await?;
        let now = Utc::now().timestamp_millis();
        let timestamp = messages.last().map_or(now, |last| last.timestamp.max(now));
        let message = Message {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            sender_id,
            timestamp,
            status: MessageStatus::Sent,
        };
        messages.push(message.clone());
        set_json(self.bulk.as_ref(), keys::MESSAGES, &messages).await?;
        self.state.send_modify(|s| s.messages = messages);
        debug!(id = %message.id, "message stored");
        Ok(message)
    }

    pub async fn refresh_messages(&self) -> Result<()> {
        let messages = self.load_messages().await?;
        self.state.send_if_modified(|s| {
            if s.messages == messages {
                return false;
            }
            s.messages = messages;
            true
        });
        Ok(())
    }

    /// Marks every stored message as read.
    pub async fn mark_read(&self) -> Result<usize> {
        let _writes = self.writes.lock().await;
        let mut messages = self.load_messages().await?;
        let mut changed = 0;
        for message in messages.iter_mut().filter(|m| m.status != MessageStatus::Read) {
            message.status = MessageStatus::Read;
            changed += 1;
        }
        if changed > 0 {
            set_json(self.bulk.as_ref(), keys::MESSAGES, &messages).await?;
        }
        self.state.send_modify(|s| s.messages = messages);
        Ok(changed)
    }

    // ── Reset ───────────────────────────────────────────────────────────────

    /// Returns the install to first-run. The device identity survives.
    pub async fn reset(&self) -> Result<()> {
        self.lock();
        let _writes = self.writes.lock().await;
        self.bulk.bulk_delete(keys::MESSAGES).await?;
        self.bulk.bulk_delete(keys::PAIRING_CODE).await?;
        self.bulk.bulk_delete(keys::PAIRED_WITH).await?;
        // Flag before secret: a flag without a code could never be unlocked.
        self.bulk.bulk_delete(keys::SETUP_COMPLETE).await?;
        self.secrets.secret_delete(keys::UNLOCK_CODE).await?;
        self.state.send_modify(|s| {
            *s = SessionState {
                device_id: s.device_id.take(),
                ..SessionState::default()
            };
        });
        warn!("session reset to first run");
        Ok(())
    }
}
