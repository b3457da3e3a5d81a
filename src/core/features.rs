//! Remote capabilities the session depends on.
//!
//! Each feature exposes a narrow async trait so the controller can be driven
//! by an in-memory fake in tests.

pub mod translator;

pub use translator::{GoogleTranslateGateway, TranslateError, TranslationGateway, TranslationRequest};
