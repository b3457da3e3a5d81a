//! Translation session controller
//!
//! Single authority over one translation workflow. Intents from the
//! presentation layer arrive as method calls; every transition publishes a
//! fresh `SessionSnapshot` on a watch channel.
//!
//! Each `submit()` is tagged with a new `RequestToken`. When the gateway
//! settles, the result is applied only if its token is still the active one,
//! so cancelled or superseded responses are dropped whenever they arrive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::features::translator::{TranslateError, TranslateResult, TranslationGateway, TranslationRequest};
use crate::core::history::HistoryStore;
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::{
    character_count, exceeds_max_length, Language, RequestToken, SessionSnapshot, SessionState, SessionStatus,
    TranslationEntry,
};

/// Why a `submit()` was a no-op
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitRejection {
    AlreadyPending,
    Offline,
    EmptyInput,
    TooLong,
    Invalid(String),
}

/// A request handed to the gateway
#[derive(Debug)]
pub struct PendingRequest {
    token: RequestToken,
    handle: JoinHandle<()>,
}

impl PendingRequest {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    /// Wait until the gateway has settled and the response was reconciled
    /// (applied or discarded).
    pub async fn settled(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(token = self.token.0, error = %e, "translation task aborted");
        }
    }
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Issued(PendingRequest),
    Rejected(SubmitRejection),
}

impl SubmitOutcome {
    pub fn is_issued(&self) -> bool {
        matches!(self, SubmitOutcome::Issued(_))
    }
}

struct Shared {
    state: Mutex<SessionState>,
    next_token: AtomicU64,
    history: Arc<HistoryStore>,
    gateway: Arc<dyn TranslationGateway>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("session state mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn publish(&self, state: &SessionState) {
        self.snapshots.send_replace(SessionSnapshot {
            state: state.clone(),
            history: self.history.list(),
        });
    }

    /// Apply a settled gateway call.
    ///
    /// The token is checked and claimed under a brief lock. A successful
    /// translation is then recorded in history without holding the session
    /// lock, and applied to the state only if nothing else has moved the
    /// session on in the meantime.
    async fn reconcile(&self, token: RequestToken, request: TranslationRequest, result: TranslateResult) {
        let translation = {
            let mut state = self.lock_state();

            if state.active_request != Some(token) {
                tracing::warn!(
                    token = token.0,
                    active = ?state.active_request.map(|t| t.0),
                    "discarding superseded translation response"
                );
                return;
            }
            state.active_request = None;

            match result {
                Ok(translation) => translation,
                Err(TranslateError::Network(detail)) => {
                    tracing::warn!(token = token.0, %detail, "translation failed: offline");
                    state.status = SessionStatus::Offline;
                    self.publish(&state);
                    return;
                }
                Err(e) => {
                    tracing::warn!(token = token.0, error = %e, "translation failed");
                    state.status = SessionStatus::Failed;
                    state.last_error = Some(e.user_message().to_string());
                    self.publish(&state);
                    return;
                }
            }
        };

        let entry = TranslationEntry::new(
            request.text(),
            translation,
            request.source(),
            request.target(),
        );
        let displayed = entry.translation();

        let history = Arc::clone(&self.history);
        let appended = tokio::task::spawn_blocking(move || history.append(entry))
            .await
            .unwrap_or_else(|e| Err(AppError::System(format!("History write task failed: {}", e))));

        let mut state = self.lock_state();
        match appended {
            Ok(_) => state.storage_error = None,
            Err(e) => {
                tracing::error!(error = %e, "failed to record translation in history");
                state.storage_error = Some(e.to_string());
            }
        }

        // Still pending with no newer request: nobody cancelled, selected or
        // went offline while the history write ran
        if state.status == SessionStatus::Pending && state.active_request.is_none() {
            state.status = SessionStatus::Succeeded;
            state.last_error = None;
            state.last_result = Some(displayed);
            tracing::info!(token = token.0, source = %request.source(), target = %request.target(), "translation succeeded");
        } else {
            tracing::debug!(token = token.0, "session moved on while recording translation, kept in history only");
        }

        self.publish(&state);
    }
}

/// Cloneable handle to one session. Clones share the same state.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn TranslationGateway>,
        history: Arc<HistoryStore>,
        source_language: Language,
    ) -> Self {
        let state = SessionState::new(source_language);
        let (snapshots, _) = watch::channel(SessionSnapshot {
            state: state.clone(),
            history: history.list(),
        });

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                next_token: AtomicU64::new(0),
                history,
                gateway,
                snapshots,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock_state().clone()
    }

    pub fn history(&self) -> Vec<TranslationEntry> {
        self.shared.history.list()
    }

    /// Replace the draft. Over-length text is refused and the previous draft
    /// kept; returns whether the edit was applied.
    pub fn set_input(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        if exceeds_max_length(&text) {
            tracing::debug!(len = character_count(&text), "input edit over limit, keeping previous draft");
            return false;
        }

        let mut state = self.shared.lock_state();
        state.input_text = text;
        state.last_error = None;
        if state.status == SessionStatus::Failed {
            state.status = SessionStatus::Idle;
        }
        self.shared.publish(&state);
        true
    }

    pub fn clear_input(&self) {
        self.set_input(String::new());
    }

    /// Choose the source language; the target is always the other one.
    /// Picking the current target swaps the pair.
    pub fn set_source_language(&self, language: Language) {
        let mut state = self.shared.lock_state();
        if state.source_language == language {
            return;
        }
        tracing::debug!(from = %state.source_language, to = %language, "swapping language pair");
        state.source_language = language;
        state.target_language = language.complement();
        self.shared.publish(&state);
    }

    pub fn swap_languages(&self) {
        let target = self.shared.lock_state().target_language;
        self.set_source_language(target);
    }

    /// Issue a translation of the trimmed draft.
    ///
    /// Returns immediately; completion is observed through the snapshot.
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self) -> SubmitOutcome {
        let (token, request) = {
            let mut state = self.shared.lock_state();

            let rejection = match state.status {
                SessionStatus::Pending => Some(SubmitRejection::AlreadyPending),
                SessionStatus::Offline => Some(SubmitRejection::Offline),
                _ if state.input_text.trim().is_empty() => Some(SubmitRejection::EmptyInput),
                _ if exceeds_max_length(&state.input_text) => Some(SubmitRejection::TooLong),
                _ => None,
            };
            if let Some(rejection) = rejection {
                tracing::debug!(?rejection, "submit ignored");
                return SubmitOutcome::Rejected(rejection);
            }

            let request = match TranslationRequest::new(
                &state.input_text,
                state.source_language,
                state.target_language,
            ) {
                Ok(request) => request,
                Err(e) => return SubmitOutcome::Rejected(SubmitRejection::Invalid(e.to_string())),
            };

            let token = RequestToken(self.shared.next_token.fetch_add(1, Ordering::SeqCst) + 1);
            state.active_request = Some(token);
            state.status = SessionStatus::Pending;
            state.last_error = None;
            self.shared.publish(&state);
            (token, request)
        };

        tracing::debug!(token = token.0, "translation request issued");
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let result = shared.gateway.translate(&request).await;
            shared.reconcile(token, request, result).await;
        });

        SubmitOutcome::Issued(PendingRequest { token, handle })
    }

    /// Stop waiting for the in-flight request. The remote call may still
    /// complete; its result will be ignored. A response that already arrived
    /// and is being recorded can no longer be cancelled.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.lock_state();
        if state.status != SessionStatus::Pending || state.active_request.is_none() {
            return false;
        }
        tracing::debug!(token = ?state.active_request.map(|t| t.0), "request cancelled");
        state.status = SessionStatus::Idle;
        state.active_request = None;
        self.shared.publish(&state);
        true
    }

    /// Show a past translation. Any in-flight request is dropped so it cannot
    /// overwrite the selection. Returns `false` if the entry no longer exists.
    pub fn select_history_entry(&self, id: &str) -> bool {
        let Some(entry) = self.shared.history.get(id) else {
            tracing::debug!(id, "selected history entry not found");
            return false;
        };

        let mut state = self.shared.lock_state();
        state.input_text = entry.source_text.clone();
        state.source_language = entry.source_language;
        state.target_language = entry.target_language;
        state.last_result = Some(entry.translation());
        state.last_error = None;
        state.active_request = None;
        state.status = SessionStatus::Succeeded;
        self.shared.publish(&state);
        true
    }

    /// The displayed result is a copy and stays on screen.
    pub fn delete_history_entry(&self, id: &str) -> AppResult<bool> {
        let result = self.shared.history.remove(id);
        self.after_history_mutation(result)
    }

    pub fn clear_history(&self) -> AppResult<()> {
        let result = self.shared.history.clear();
        self.after_history_mutation(result)
    }

    fn after_history_mutation<T>(&self, result: AppResult<T>) -> AppResult<T> {
        let mut state = self.shared.lock_state();
        match &result {
            Ok(_) => state.storage_error = None,
            Err(e) => state.storage_error = Some(e.to_string()),
        }
        self.shared.publish(&state);
        result
    }

    /// Connectivity reported by the host. Going offline drops any in-flight
    /// request; coming back online re-enables `submit()`.
    pub fn set_connectivity(&self, online: bool) {
        let mut state = self.shared.lock_state();
        match (online, state.status) {
            (false, SessionStatus::Offline) => return,
            (false, _) => {
                state.active_request = None;
                state.status = SessionStatus::Offline;
                tracing::info!("connectivity lost");
            }
            (true, SessionStatus::Offline) => {
                state.status = SessionStatus::Idle;
                tracing::info!("connectivity restored");
            }
            (true, _) => return,
        }
        self.shared.publish(&state);
    }
}
