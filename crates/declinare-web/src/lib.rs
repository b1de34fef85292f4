//! Noun declension quiz over pre-processed wiktextract files.
//!
//! [`router`] serves the quiz pages. Each visitor's progress is a
//! [`quiz::SessionState`] kept in a [`session::SessionStore`] and advanced by
//! [`quiz::transition`].

pub mod handlers;
pub mod quiz;
pub mod session;

pub use handlers::{AppState, router};
pub use quiz::{Outcome, Question, QuizEvent, SessionState, transition};
pub use session::SessionStore;
