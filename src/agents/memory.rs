use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Session used by requests that do not name one
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Ordered turns of one conversation
///
/// Turns are only ever added as a question/answer pair, so the sequence
/// always alternates user and assistant.
#[derive(Debug, Default)]
pub struct ConversationMemory {
    turns: Mutex<Vec<Turn>>,
}

impl ConversationMemory {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the turns so far
    #[inline]
    pub fn turns(&self) -> Vec<Turn> {
        self.lock().clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Append a question and its answer as one step
    #[inline]
    pub fn record_exchange(&self, question: &str, answer: &str) {
        let mut turns = self.lock();
        turns.push(Turn {
            role: Role::User,
            text: question.to_string(),
        });
        turns.push(Turn {
            role: Role::Assistant,
            text: answer.to_string(),
        });
    }

    #[inline]
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Render the history as `User:` / `Assistant:` lines
    #[inline]
    pub fn render(&self) -> String {
        let turns = self.lock();
        let mut history = String::new();
        for turn in turns.iter() {
            // Writing to a String cannot fail
            let _ = writeln!(history, "{}: {}", turn.role.label(), turn.text);
        }
        history
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Turn>> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The two memories a session keeps
#[derive(Debug, Default)]
pub struct Session {
    /// History of document-grounded answers
    pub document: ConversationMemory,
    /// History of open conversation
    pub conversational: ConversationMemory,
}

impl Session {
    #[inline]
    pub fn clear(&self) {
        self.document.clear();
        self.conversational.clear();
    }
}

/// Sessions kept before the least recently used one is forgotten
pub const MAX_SESSIONS: usize = 1024;

#[derive(Debug)]
struct SessionEntry {
    session: Arc<Session>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Sessions {
    entries: HashMap<String, SessionEntry>,
    clock: u64,
}

/// In-process sessions keyed by client-supplied id
///
/// Holds at most `capacity` sessions; creating one more forgets the session
/// that was used least recently.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<Sessions>,
    capacity: usize,
}

impl Default for SessionStore {
    #[inline]
    fn default() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }
}

impl SessionStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            capacity: capacity.max(1),
        }
    }

    /// Fetch a session, creating it on first use
    #[inline]
    pub fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        let mut sessions = self.lock();
        sessions.clock += 1;
        let now = sessions.clock;

        if let Some(entry) = sessions.entries.get_mut(session_id) {
            entry.last_used = now;
            return Arc::clone(&entry.session);
        }

        if sessions.entries.len() >= self.capacity {
            let oldest = sessions
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!("Session limit reached, forgetting session {}", oldest);
                sessions.entries.remove(&oldest);
            }
        }

        let session = Arc::new(Session::default());
        sessions.entries.insert(
            session_id.to_string(),
            SessionEntry {
                session: Arc::clone(&session),
                last_used: now,
            },
        );
        session
    }

    /// Forget both memories of a session
    #[inline]
    pub fn clear(&self, session_id: &str) {
        let entry = self.lock().entries.remove(session_id);
        if let Some(entry) = entry {
            entry.session.clear();
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
