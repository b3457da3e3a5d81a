//! Line-oriented front end
//!
//! Parses user intents from text lines, forwards them to the session
//! controller and renders snapshots. Holds no session state of its own.

use chrono::{DateTime, Local, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::core::session::{SessionController, SubmitOutcome, SubmitRejection};
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::{
    character_count, Language, SessionSnapshot, SessionStatus, TranslationEntry, MAX_LENGTH,
};

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the draft and translate it
    Translate(String),
    Language(Language),
    Swap,
    Cancel,
    History,
    Select(usize),
    Delete(usize),
    ClearHistory,
    ClearInput,
    Online,
    Offline,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> AppResult<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Command::Translate(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        let command = match (name, arg) {
            ("lang", Some(code)) => Command::Language(
                Language::from_code(code)
                    .ok_or_else(|| AppError::Validation(format!("Unsupported language: {}", code)))?,
            ),
            ("swap", None) => Command::Swap,
            ("cancel", None) => Command::Cancel,
            ("history", None) => Command::History,
            ("select", Some(n)) => Command::Select(parse_position(n)?),
            ("delete", Some(n)) => Command::Delete(parse_position(n)?),
            ("clear-history", None) => Command::ClearHistory,
            ("clear", None) => Command::ClearInput,
            ("online", None) => Command::Online,
            ("offline", None) => Command::Offline,
            ("help", None) => Command::Help,
            ("quit", None) | ("q", None) => Command::Quit,
            _ => return Err(AppError::Validation(format!("Unknown command: {}", line))),
        };
        Ok(command)
    }
}

/// 1-based history position as shown by `:history`
fn parse_position(raw: &str) -> AppResult<usize> {
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(AppError::Validation(format!("Expected a history number, got {}", raw))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Apply one command. Returns text to print and whether to keep going.
pub fn execute(controller: &SessionController, command: Command) -> AppResult<(String, Flow)> {
    let output = match command {
        Command::Translate(text) => {
            if !controller.set_input(text.clone()) {
                return Ok((
                    format!(
                        "Text exceeds maximum length of {} characters ({} entered)",
                        MAX_LENGTH,
                        character_count(&text)
                    ),
                    Flow::Continue,
                ));
            }
            match controller.submit() {
                SubmitOutcome::Issued(_) => "Translating...".to_string(),
                SubmitOutcome::Rejected(reason) => describe_rejection(&reason).to_string(),
            }
        }
        Command::Language(language) => {
            controller.set_source_language(language);
            describe_pair(controller)
        }
        Command::Swap => {
            controller.swap_languages();
            describe_pair(controller)
        }
        Command::Cancel => {
            if controller.cancel() {
                "Cancelled".to_string()
            } else {
                "Nothing to cancel".to_string()
            }
        }
        Command::History => render_history(&controller.history(), Utc::now()),
        Command::Select(position) => match entry_at(controller, position) {
            Some(entry) if controller.select_history_entry(&entry.id) => {
                render_snapshot(&controller.snapshot())
            }
            _ => format!("No history entry #{}", position),
        },
        Command::Delete(position) => match entry_at(controller, position) {
            Some(entry) => {
                controller.delete_history_entry(&entry.id)?;
                format!("Deleted #{}", position)
            }
            None => format!("No history entry #{}", position),
        },
        Command::ClearHistory => {
            controller.clear_history()?;
            "History cleared".to_string()
        }
        Command::ClearInput => {
            controller.clear_input();
            "Input cleared".to_string()
        }
        Command::Online => {
            controller.set_connectivity(true);
            "Online".to_string()
        }
        Command::Offline => {
            controller.set_connectivity(false);
            "Offline".to_string()
        }
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok((String::new(), Flow::Quit)),
    };
    Ok((output, Flow::Continue))
}

const HELP: &str = "\
Type text and press Enter to translate it.
  :lang en|ja      set the source language
  :swap            swap source and target
  :cancel          stop waiting for the current translation
  :history         list past translations
  :select <n>      show history entry n
  :delete <n>      delete history entry n
  :clear-history   delete all history
  :clear           clear the input
  :online/:offline report connectivity
  :quit";

fn entry_at(controller: &SessionController, position: usize) -> Option<TranslationEntry> {
    controller.history().into_iter().nth(position.checked_sub(1)?)
}

fn describe_pair(controller: &SessionController) -> String {
    let state = controller.state();
    format!(
        "{} → {}",
        state.source_language.display_name(),
        state.target_language.display_name()
    )
}

pub fn describe_rejection(reason: &SubmitRejection) -> &'static str {
    match reason {
        SubmitRejection::AlreadyPending => "A translation is already in progress",
        SubmitRejection::Offline => "You are offline. Use :online once the connection is back",
        SubmitRejection::EmptyInput => "Nothing to translate",
        SubmitRejection::TooLong => "Text exceeds maximum length",
        SubmitRejection::Invalid(_) => "This text cannot be translated",
    }
}

/// Render the visible result area for a snapshot.
pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let state = &snapshot.state;
    let mut out = String::new();

    match state.status {
        SessionStatus::Pending => out.push_str("Translating..."),
        SessionStatus::Offline => out.push_str("Offline: translation unavailable"),
        SessionStatus::Failed => {
            out.push_str(state.last_error.as_deref().unwrap_or("Translation failed"))
        }
        SessionStatus::Idle | SessionStatus::Succeeded => {}
    }

    if state.status != SessionStatus::Pending {
        if let Some(result) = &state.last_result {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!(
                "[{}] {}",
                state.target_language.display_name(),
                result.translated_text
            ));
            if state.source_language.requires_romanization() {
                if let Some(romanization) = &result.romanization {
                    out.push_str(&format!("\nRomanization (Romaji): {}", romanization));
                }
            }
        }
    }

    if let Some(storage_error) = &state.storage_error {
        out.push_str(&format!("\nHistory could not be saved: {}", storage_error));
    }
    out
}

pub fn render_history(history: &[TranslationEntry], now: DateTime<Utc>) -> String {
    if history.is_empty() {
        return "No translation history yet".to_string();
    }

    history
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "{:>3}. {} → {}  {}\n     {}\n     → {}",
                i + 1,
                entry.source_language.code().to_uppercase(),
                entry.target_language.code().to_uppercase(),
                format_timestamp(entry.timestamp, now),
                truncate_text(&entry.source_text, PREVIEW_CHARS),
                truncate_text(&entry.translated_text, PREVIEW_CHARS),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Relative age for recent entries, a date for older ones.
pub fn format_timestamp(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(timestamp);
    let minutes = age.num_minutes();
    let hours = age.num_hours();
    let days = age.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        timestamp.with_timezone(&Local).format("%Y-%m-%d").to_string()
    }
}

pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

/// Decides which snapshots are worth printing.
///
/// Pending snapshots are never printed and reset the last shown text, so a
/// repeated result is printed again. The watch channel may coalesce the
/// pending snapshot away; a new newest history entry also counts as a new
/// result.
pub struct SnapshotPrinter {
    last_shown: String,
    newest_entry: Option<String>,
}

impl SnapshotPrinter {
    pub fn new(initial: &SessionSnapshot) -> Self {
        Self {
            last_shown: render_snapshot(initial),
            newest_entry: newest_entry_id(initial),
        }
    }

    pub fn observe(&mut self, snapshot: &SessionSnapshot) -> Option<String> {
        let newest = newest_entry_id(snapshot);
        let new_entry = newest.is_some() && newest != self.newest_entry;
        self.newest_entry = newest;

        if snapshot.state.status == SessionStatus::Pending {
            self.last_shown.clear();
            return None;
        }

        let rendered = render_snapshot(snapshot);
        let changed = rendered != self.last_shown || new_entry;
        self.last_shown = rendered.clone();
        (changed && !rendered.is_empty()).then_some(rendered)
    }
}

fn newest_entry_id(snapshot: &SessionSnapshot) -> Option<String> {
    snapshot.history.first().map(|entry| entry.id.clone())
}

/// Read commands from stdin until `:quit` or end of input, printing each
/// settled translation as it arrives.
pub async fn run_repl(controller: SessionController) -> AppResult<()> {
    let mut snapshots = controller.subscribe();
    let renderer = tokio::spawn(async move {
        let mut printer = SnapshotPrinter::new(&snapshots.borrow());
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if let Some(rendered) = printer.observe(&snapshot) {
                println!("{}", rendered);
            }
        }
    });

    println!("{}", describe_pair(&controller));
    println!("{}", controller.state().source_language.placeholder());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        match execute(&controller, command) {
            Ok((_, Flow::Quit)) => break,
            Ok((output, Flow::Continue)) => {
                if !output.is_empty() {
                    println!("{}", output);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "command failed");
                println!("{}", e);
            }
        }
    }

    renderer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::{SessionState, Translation};
    use chrono::Duration;

    #[test]
    fn parses_plain_text_as_translation() {
        assert_eq!(
            Command::parse("Hello world\n").unwrap(),
            Command::Translate("Hello world".to_string())
        );
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse(":lang ja").unwrap(), Command::Language(Language::Ja));
        assert_eq!(Command::parse(":select 2").unwrap(), Command::Select(2));
        assert_eq!(Command::parse(":clear-history").unwrap(), Command::ClearHistory);
        assert_eq!(Command::parse(":q").unwrap(), Command::Quit);
        assert!(Command::parse(":lang fr").is_err());
        assert!(Command::parse(":delete 0").is_err());
        assert!(Command::parse(":bogus").is_err());
    }

    #[test]
    fn relative_timestamps() {
        let now = Utc::now();
        assert_eq!(format_timestamp(now - Duration::seconds(20), now), "Just now");
        assert_eq!(format_timestamp(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_timestamp(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_timestamp(now - Duration::days(2), now), "2d ago");
        assert!(format_timestamp(now - Duration::days(30), now).contains('-'));
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_text("short", 50), "short");
        assert_eq!(truncate_text("日本語のテキスト", 3), "日本語...");
    }

    #[test]
    fn romanization_only_rendered_for_japanese_source() {
        let mut state = SessionState::new(Language::Ja);
        state.status = SessionStatus::Succeeded;
        state.last_result = Some(Translation {
            translated_text: "Hello".to_string(),
            romanization: Some("Konnichiwa".to_string()),
        });
        let snapshot = SessionSnapshot { state: state.clone(), history: Vec::new() };
        assert!(render_snapshot(&snapshot).contains("Romanization (Romaji): Konnichiwa"));

        state.source_language = Language::En;
        state.target_language = Language::Ja;
        let snapshot = SessionSnapshot { state, history: Vec::new() };
        assert!(!render_snapshot(&snapshot).contains("Konnichiwa"));
    }

    #[test]
    fn failure_keeps_previous_result_visible() {
        let mut state = SessionState::new(Language::En);
        state.status = SessionStatus::Failed;
        state.last_error = Some("The translation service could not translate this text.".to_string());
        state.last_result = Some(Translation {
            translated_text: "こんにちは".to_string(),
            romanization: None,
        });
        let rendered = render_snapshot(&SessionSnapshot { state, history: Vec::new() });
        assert!(rendered.starts_with("The translation service"));
        assert!(rendered.contains("こんにちは"));
    }

    fn succeeded(text: &str, history: Vec<TranslationEntry>) -> SessionSnapshot {
        let mut state = SessionState::new(Language::En);
        state.status = SessionStatus::Succeeded;
        state.last_result = Some(Translation {
            translated_text: text.to_string(),
            romanization: None,
        });
        SessionSnapshot { state, history }
    }

    fn history_entry(source: &str, translated: &str) -> TranslationEntry {
        TranslationEntry::new(
            source,
            Translation { translated_text: translated.to_string(), romanization: None },
            Language::En,
            Language::Ja,
        )
    }

    #[test]
    fn repeated_result_is_printed_again() {
        let mut printer = SnapshotPrinter::new(&SessionSnapshot {
            state: SessionState::new(Language::En),
            history: Vec::new(),
        });

        let first = history_entry("Hello", "こんにちは");
        let done = succeeded("こんにちは", vec![first.clone()]);
        assert!(printer.observe(&done).is_some());
        assert_eq!(printer.observe(&done), None);

        let mut pending = done.clone();
        pending.state.status = SessionStatus::Pending;
        assert_eq!(printer.observe(&pending), None);
        let again = succeeded("こんにちは", vec![history_entry("Hello", "こんにちは"), first]);
        assert!(printer.observe(&again).unwrap().contains("こんにちは"));
    }

    #[test]
    fn coalesced_pending_still_prints_new_result() {
        let first = history_entry("Hello", "こんにちは");
        let done = succeeded("こんにちは", vec![first.clone()]);
        let mut printer = SnapshotPrinter::new(&done);

        let again = succeeded("こんにちは", vec![history_entry("Hello", "こんにちは"), first]);
        assert!(printer.observe(&again).is_some());
    }

    #[test]
    fn empty_history_message() {
        assert_eq!(render_history(&[], Utc::now()), "No translation history yet");
    }
}
