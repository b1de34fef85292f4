//! Quiz session state machine.
//!
//! The request layer owns a [`SessionState`] per visitor and feeds it through
//! [`transition`] together with a [`QuizEvent`]. The function is pure: it
//! never touches the session store or the corpus.

use rand::Rng;
use rand::seq::SliceRandom;

use declinare_corpus::{Sample, Tier};

/// A posed question and the form that answers it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Question {
    pub word: String,
    pub tags: Vec<String>,
    pub senses: Vec<String>,
    pub answer: String,
}

impl Question {
    /// Ask for one random valid declension of a sampled entry.
    pub fn pick<R: Rng + ?Sized>(sample: &Sample, rng: &mut R) -> Option<Self> {
        let form = sample.declensions.choose(rng)?;
        let answer = form.text()?.to_string();
        Some(Self {
            word: sample.entry.word.clone(),
            tags: form.tags.clone(),
            senses: sample
                .entry
                .flatten_senses()
                .into_iter()
                .map(str::to_string)
                .collect(),
            answer,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Verdict {
    pub question: Question,
    /// The answer as submitted, trimmed.
    pub given: String,
    pub correct: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    NoActiveQuestion,
    QuestionPending,
    FeedbackShown,
}

/// Everything the quiz remembers about one visitor between requests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionState {
    pub lang: String,
    pub tier: Tier,
    pub streak: u32,
    pub pending: Option<Question>,
    feedback_shown: bool,
}

impl SessionState {
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            tier: Tier::Full,
            streak: 0,
            pending: None,
            feedback_shown: false,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.pending.is_some() {
            Phase::QuestionPending
        } else if self.feedback_shown {
            Phase::FeedbackShown
        } else {
            Phase::NoActiveQuestion
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QuizEvent {
    /// Language and tier requested by a page load.
    Select { lang: String, tier: Tier },
    Pose(Question),
    Answer(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Unchanged,
    /// Language or tier changed: streak and pending question dropped.
    Reset,
    Posed,
    Judged(Verdict),
    NoPendingQuestion,
}

/// Case-insensitive comparison of trimmed answers.
pub fn is_correct(given: &str, expected: &str) -> bool {
    given.trim().to_lowercase() == expected.trim().to_lowercase()
}

pub fn transition(state: SessionState, event: QuizEvent) -> (SessionState, Outcome) {
    match event {
        QuizEvent::Select { lang, tier } => {
            if lang == state.lang && tier == state.tier {
                return (state, Outcome::Unchanged);
            }
            let next = SessionState {
                lang,
                tier,
                streak: 0,
                pending: None,
                feedback_shown: false,
            };
            (next, Outcome::Reset)
        }
        QuizEvent::Pose(question) => {
            let next = SessionState {
                pending: Some(question),
                feedback_shown: false,
                ..state
            };
            (next, Outcome::Posed)
        }
        QuizEvent::Answer(given) => {
            let Some(question) = state.pending.clone() else {
                return (state, Outcome::NoPendingQuestion);
            };
            let given = given.trim().to_string();
            let correct = is_correct(&given, &question.answer);
            let streak = if correct {
                state.streak.saturating_add(1)
            } else {
                0
            };
            let next = SessionState {
                streak,
                pending: None,
                feedback_shown: true,
                ..state
            };
            let verdict = Verdict {
                question,
                given,
                correct,
            };
            (next, Outcome::Judged(verdict))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declinare_types::{DictionaryEntry, Form, Sense};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn question(answer: &str) -> Question {
        Question {
            word: "hus".into(),
            tags: vec!["definite".into(), "plural".into()],
            senses: vec!["house".into()],
            answer: answer.into(),
        }
    }

    fn pending(lang: &str, streak: u32) -> SessionState {
        let state = SessionState {
            streak,
            ..SessionState::new(lang)
        };
        transition(state, QuizEvent::Pose(question("husen"))).0
    }

    #[test]
    fn compares_answers_case_insensitively() {
        assert!(is_correct("Husen", "husen"));
        assert!(is_correct("  husen\n", "husen"));
        assert!(is_correct("KUĆE", "kuće"));
        assert!(!is_correct("huset", "husen"));
    }

    #[test]
    fn walks_through_phases() {
        let state = SessionState::new("sv");
        assert_eq!(state.phase(), Phase::NoActiveQuestion);

        let (state, outcome) = transition(state, QuizEvent::Pose(question("husen")));
        assert_eq!(outcome, Outcome::Posed);
        assert_eq!(state.phase(), Phase::QuestionPending);

        let (state, outcome) = transition(state, QuizEvent::Answer(" Husen ".into()));
        let Outcome::Judged(verdict) = outcome else {
            panic!("expected a verdict");
        };
        assert!(verdict.correct);
        assert_eq!(verdict.given, "Husen");
        assert_eq!(state.streak, 1);
        assert_eq!(state.phase(), Phase::FeedbackShown);

        let (state, _) = transition(state, QuizEvent::Pose(question("huset")));
        assert_eq!(state.phase(), Phase::QuestionPending);
        assert_eq!(state.streak, 1);
    }

    #[test]
    fn wrong_answer_resets_streak() {
        let (state, outcome) = transition(pending("sv", 2), QuizEvent::Answer("totallywrong".into()));
        assert!(matches!(outcome, Outcome::Judged(Verdict { correct: false, .. })));
        assert_eq!(state.streak, 0);
        assert!(state.pending.is_none());
    }

    #[test]
    fn answer_without_question_changes_nothing() {
        let state = SessionState {
            streak: 3,
            ..SessionState::new("sv")
        };
        let (next, outcome) = transition(state.clone(), QuizEvent::Answer("husen".into()));
        assert_eq!(outcome, Outcome::NoPendingQuestion);
        assert_eq!(next, state);
    }

    #[test]
    fn switching_language_resets_streak_and_question() {
        let (state, outcome) = transition(
            pending("sv", 3),
            QuizEvent::Select {
                lang: "ro".into(),
                tier: Tier::Full,
            },
        );
        assert_eq!(outcome, Outcome::Reset);
        assert_eq!(state.lang, "ro");
        assert_eq!(state.streak, 0);
        assert!(state.pending.is_none());
        assert_eq!(state.phase(), Phase::NoActiveQuestion);
    }

    #[test]
    fn switching_tier_resets_but_same_selection_keeps_streak() {
        let (state, outcome) = transition(
            pending("sv", 4),
            QuizEvent::Select {
                lang: "sv".into(),
                tier: Tier::Full,
            },
        );
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(state.streak, 4);
        assert!(state.pending.is_some());

        let (state, outcome) = transition(
            state,
            QuizEvent::Select {
                lang: "sv".into(),
                tier: Tier::Top,
            },
        );
        assert_eq!(outcome, Outcome::Reset);
        assert_eq!(state.tier, Tier::Top);
        assert_eq!(state.streak, 0);
    }

    #[test]
    fn picks_question_from_sample() {
        let form = Form {
            form: Some("husen".into()),
            source: Some("declension".into()),
            tags: vec!["definite".into(), "plural".into()],
            ..Form::default()
        };
        let sample = Sample {
            entry: DictionaryEntry {
                word: "hus".into(),
                senses: vec![
                    Sense {
                        glosses: vec!["house".into()],
                        ..Sense::default()
                    },
                    Sense {
                        glosses: vec!["home".into()],
                        tags: vec!["obsolete".into()],
                        ..Sense::default()
                    },
                ],
                forms: vec![form.clone()],
                ..DictionaryEntry::default()
            },
            declensions: vec![form],
            attempts: 1,
        };
        let mut rng = StdRng::seed_from_u64(9);
        let q = Question::pick(&sample, &mut rng).unwrap();
        assert_eq!(q, question("husen"));

        let empty = Sample {
            declensions: Vec::new(),
            ..sample
        };
        assert!(Question::pick(&empty, &mut rng).is_none());
    }
}
