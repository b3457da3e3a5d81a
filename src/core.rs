//! Core translation logic: gateway, history store and session controller.

pub mod features;
pub mod history;
pub mod session;


pub use history::{HistoryStorage, HistoryStore, InMemoryHistoryStorage, RedbHistoryStorage};
pub use session::{PendingRequest, SessionController, SubmitOutcome, SubmitRejection};
