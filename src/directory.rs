//! Voice directory: the last fetched voice list and its request sequencing.
//!
//! A fetch is issued on every API key change and requests are never
//! cancelled, so answers can arrive out of order. Each fetch gets a
//! ticket and only the answer to the newest ticket is applied.

use tracing::{debug, error, info};

use crate::api::Voice;
use crate::error::StudioError;
use crate::session::{KeyValueStore, Session};

pub const FETCH_ERROR: &str = "Error fetching voices. Please check your API key.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Stale,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct VoiceDirectory {
    voices: Vec<Voice>,
    latest: u64,
}

impl VoiceDirectory {
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Start a fetch for `api_key`. Returns `None` for an empty key.
    pub fn begin_fetch(&mut self, api_key: &str) -> Option<FetchTicket> {
        if api_key.is_empty() {
            return None;
        }
        self.latest += 1;
        Some(FetchTicket(self.latest))
    }

    /// Apply the answer for `ticket`.
    ///
    /// A success replaces the list wholesale and defaults the selection to
    /// the first voice only when nothing is selected. An existing selection
    /// is kept even if the new list does not contain it. A failure leaves
    /// the list alone.
    pub fn apply<S: KeyValueStore>(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Voice>, StudioError>,
        session: &mut Session<S>,
    ) -> FetchOutcome {
        if ticket.0 != self.latest {
            debug!("Discarding voice list for ticket {} (latest {})", ticket.0, self.latest);
            return FetchOutcome::Stale;
        }

        match result {
            Ok(voices) => {
                info!("Loaded {} voices", voices.len());
                if session.state().selected_voice.is_empty() {
                    if let Some(first) = voices.first() {
                        session.set_selected_voice(&first.name);
                    }
                }
                self.voices = voices;
                FetchOutcome::Applied
            }
            Err(e) => {
                error!("Voice fetch failed: {e}");
                FetchOutcome::Failed(FETCH_ERROR.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryStore;

    fn voice(name: &str) -> Voice {
        Voice {
            name: name.into(),
            gender: "Female".into(),
            language_code: "en-US".into(),
        }
    }

    #[test]
    fn empty_key_issues_no_fetch() {
        let mut dir = VoiceDirectory::default();
        assert_eq!(dir.begin_fetch(""), None);
    }

    #[test]
    fn success_replaces_list_and_selects_first() {
        let mut dir = VoiceDirectory::default();
        let mut session = Session::load(MemoryStore::default());

        let ticket = dir.begin_fetch("k").unwrap();
        let outcome = dir.apply(ticket, Ok(vec![voice("A"), voice("B"), voice("C")]), &mut session);

        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(dir.voices().len(), 3);
        assert_eq!(session.state().selected_voice, "A");
    }

    #[test]
    fn prior_selection_is_preserved_even_if_missing() {
        let mut dir = VoiceDirectory::default();
        let mut session = Session::load(MemoryStore::default());
        session.set_selected_voice("Gone");

        let ticket = dir.begin_fetch("k").unwrap();
        dir.apply(ticket, Ok(vec![voice("A")]), &mut session);

        assert_eq!(session.state().selected_voice, "Gone");
    }

    #[test]
    fn failure_keeps_previous_voices() {
        let mut dir = VoiceDirectory::default();
        let mut session = Session::load(MemoryStore::default());

        let first = dir.begin_fetch("k").unwrap();
        dir.apply(first, Ok(vec![voice("A"), voice("B")]), &mut session);

        let second = dir.begin_fetch("k2").unwrap();
        let outcome = dir.apply(
            second,
            Err(StudioError::Http { status: 401, message: None }),
            &mut session,
        );

        assert_eq!(outcome, FetchOutcome::Failed(FETCH_ERROR.to_string()));
        assert_eq!(dir.voices().len(), 2);
    }

    #[test]
    fn older_answer_cannot_overwrite_newer() {
        let mut dir = VoiceDirectory::default();
        let mut session = Session::load(MemoryStore::default());

        let old = dir.begin_fetch("old-key").unwrap();
        let new = dir.begin_fetch("new-key").unwrap();

        assert_eq!(dir.apply(new, Ok(vec![voice("Fresh")]), &mut session), FetchOutcome::Applied);
        assert_eq!(dir.apply(old, Ok(vec![voice("Stale")]), &mut session), FetchOutcome::Stale);
        assert_eq!(dir.voices()[0].name, "Fresh");
        assert_eq!(session.state().selected_voice, "Fresh");
    }
}
