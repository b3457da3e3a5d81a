pub mod commands;
pub mod core;
pub mod shared;

use std::sync::Arc;

use crate::core::features::translator::GoogleTranslateGateway;
use crate::core::history::{HistoryStorage, HistoryStore, InMemoryHistoryStorage, RedbHistoryStorage};
use crate::core::session::SessionController;
use crate::shared::error::AppResult;
use crate::shared::settings::AppSettings;

/// Wire the gateway, history and controller from settings.
///
/// An unreadable history database aborts startup; one that cannot be opened
/// at all degrades to an in-memory history.
pub fn build_controller(settings: &AppSettings) -> AppResult<SessionController> {
    let gateway = GoogleTranslateGateway::new(&settings.translator)?;

    let storage: Arc<dyn HistoryStorage> = match settings
        .database_path()
        .and_then(|path| RedbHistoryStorage::open(&path))
    {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            tracing::warn!(error = %e, "history database unavailable, history will not persist");
            Arc::new(InMemoryHistoryStorage::new())
        }
    };

    let history = HistoryStore::open(storage, settings.history.capacity)?;

    Ok(SessionController::new(
        Arc::new(gateway),
        Arc::new(history),
        settings.default_source_language()?,
    ))
}

pub async fn run() -> AppResult<()> {
    let settings = match AppSettings::load().await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            AppSettings::default()
        }
    };

    let controller = build_controller(&settings)?;
    commands::run_repl(controller).await
}
