use std::sync::Arc;

use axum::Router;
use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

use declinare_corpus::{Languages, Sampler, Tier};

use crate::quiz::{Outcome, Question, QuizEvent, SessionState, Verdict, transition};
use crate::session::{self, SessionStore};

const WIKTIONARY_BASE: &str = "https://en.wiktionary.org/wiki/";

#[derive(Clone)]
pub struct AppState {
    pub languages: Arc<Languages>,
    pub sampler: Arc<Sampler>,
    pub sessions: Arc<SessionStore>,
    pub disable_cache: bool,
}

impl AppState {
    pub fn new(languages: Arc<Languages>, max_attempts: usize, sessions: SessionStore) -> Self {
        let sampler = Sampler::new(Arc::clone(&languages)).with_max_attempts(max_attempts);
        Self {
            languages,
            sampler: Arc::new(sampler),
            sessions: Arc::new(sessions),
            disable_cache: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QuizQuery {
    pub lang: Option<String>,
    /// `on` selects the top-500 tier; anything else the full list.
    pub top500: Option<String>,
}

impl QuizQuery {
    fn tier(&self) -> Tier {
        match self.top500.as_deref() {
            Some("on") => Tier::Top,
            _ => Tier::Full,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AnswerForm {
    #[serde(default)]
    pub user_answer: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/quiz", get(quiz))
        .route("/submit", post(submit))
        .route("/robots.txt", get(robots))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn index() -> Redirect {
    Redirect::to("/quiz")
}

async fn robots(State(state): State<AppState>) -> Response {
    let body = "User-agent: *\nDisallow: /submit\n";
    if state.disable_cache {
        return body.into_response();
    }
    let headers = HeaderMap::from_iter([
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        ),
        (
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=86400"),
        ),
    ]);
    (headers, body).into_response()
}

async fn quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<QuizQuery>,
) -> Response {
    let (session_id, fresh) = match session::session_id(&headers) {
        Some(id) => (id, false),
        None => (session::new_session_id(), true),
    };
    let current = state
        .sessions
        .load(&session_id)
        .unwrap_or_else(|| SessionState::new(state.languages.default_code()));

    let requested = params
        .lang
        .as_deref()
        .filter(|code| !code.is_empty())
        .unwrap_or(current.lang.as_str());
    let (lang, _) = state.languages.resolve(Some(requested));
    if lang != requested {
        debug!("unknown language {requested:?}, using {lang}");
    }
    let lang = lang.to_string();

    let (selected, outcome) = transition(
        current,
        QuizEvent::Select {
            lang,
            tier: params.tier(),
        },
    );
    if outcome == Outcome::Reset {
        debug!(
            "session switched to {} ({:?}), streak reset",
            selected.lang, selected.tier
        );
    }

    // The selection sticks even when no question can be drawn.
    state.sessions.save(&session_id, selected.clone());
    let new_session = fresh.then_some(session_id.as_str());

    let question = match draw_question(&state.sampler, &selected).await {
        Ok(question) => question,
        Err(err) => return with_session_cookie(err.into_response(), new_session),
    };

    let (next, _) = transition(selected, QuizEvent::Pose(question.clone()));
    let html = render_quiz(&state.languages, &next, &question, ANSWER_FORM_HTML);
    state.sessions.save(&session_id, next);
    page_response(html, new_session)
}

async fn draw_question(
    sampler: &Arc<Sampler>,
    session: &SessionState,
) -> Result<Question, ApiError> {
    let sampler = Arc::clone(sampler);
    let (lang, tier) = (session.lang.clone(), session.tier);
    let picked = tokio::task::spawn_blocking(move || {
        let mut rng = rand::thread_rng();
        sampler
            .sample(&lang, tier, &mut rng)
            .map(|sample| Question::pick(&sample, &mut rng))
    })
    .await
    .map_err(|err| {
        error!("sampling task failed: {err}");
        ApiError::Internal
    })?;
    match picked {
        Ok(Some(question)) => Ok(question),
        Ok(None) => Err(ApiError::NoEntry),
        Err(err) => {
            debug!("no question for {}: {err}", session.lang);
            Err(ApiError::NoEntry)
        }
    }
}

async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<AnswerForm>,
) -> Response {
    let Some((session_id, current)) = session::session_id(&headers)
        .and_then(|id| state.sessions.load(&id).map(|current| (id, current)))
    else {
        return Redirect::to("/quiz").into_response();
    };

    let (next, outcome) = transition(current, QuizEvent::Answer(form.user_answer));
    let Outcome::Judged(verdict) = outcome else {
        debug!("answer without a pending question");
        return Redirect::to("/quiz").into_response();
    };
    info!(
        "{} {}: {:?} for {:?}, streak {}",
        next.lang,
        if verdict.correct { "correct" } else { "wrong" },
        verdict.given,
        verdict.question.answer,
        next.streak
    );

    let panel = feedback_panel(&state.languages, &next, &verdict);
    let html = render_quiz(&state.languages, &next, &verdict.question, &panel);
    state.sessions.save(&session_id, next);
    page_response(html, None)
}

fn page_response(html: String, new_session: Option<&str>) -> Response {
    let response = (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Html(html),
    )
        .into_response();
    with_session_cookie(response, new_session)
}

fn with_session_cookie(mut response: Response, new_session: Option<&str>) -> Response {
    if let Some(cookie) = new_session.and_then(session::set_cookie) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No valid entry found")]
    NoEntry,
    #[error("internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

const BASE_HTML: &str = include_str!("../templates/base.html");
const STYLE_HTML: &str = include_str!("../templates/style.html");
const QUIZ_BODY_HTML: &str = include_str!("../templates/quiz_body.html");
const ANSWER_FORM_HTML: &str = include_str!("../templates/answer_form.html");
const FEEDBACK_HTML: &str = include_str!("../templates/feedback.html");

fn render_page(title: &str, body: &str) -> String {
    fill(
        BASE_HTML,
        &[("title", title), ("style", STYLE_HTML), ("body", body)],
    )
}

fn render_quiz(
    languages: &Languages,
    session: &SessionState,
    question: &Question,
    panel: &str,
) -> String {
    let senses: String = question
        .senses
        .iter()
        .map(|gloss| format!("<li>{}</li>", escape_html(gloss)))
        .collect();
    let top500_checked = if session.tier == Tier::Top { " checked" } else { "" };
    let options = language_options(languages, &session.lang);
    let streak = session.streak.to_string();
    let word = escape_html(&question.word);
    let tags = escape_html(&question.tags.join(", "));
    let body = fill(
        QUIZ_BODY_HTML,
        &[
            ("language_options", options.as_str()),
            ("top500_checked", top500_checked),
            ("streak", streak.as_str()),
            ("word", word.as_str()),
            ("tags", tags.as_str()),
            ("senses", senses.as_str()),
            ("panel", panel),
        ],
    );
    render_page("Noun Quiz", &body)
}

fn feedback_panel(languages: &Languages, session: &SessionState, verdict: &Verdict) -> String {
    let (_, lang) = languages.resolve(Some(session.lang.as_str()));
    let url = reference_url(&verdict.question.word, &lang.anchor());
    let (class, message) = if verdict.correct {
        ("correct", "Correct!")
    } else {
        ("wrong", "Incorrect.")
    };
    let top500_field = if session.tier == Tier::Top {
        r#"<input type="hidden" name="top500" value="on">"#
    } else {
        ""
    };
    let given = escape_html(&verdict.given);
    let answer = escape_html(&verdict.question.answer);
    let url = escape_html(&url);
    let word = escape_html(&verdict.question.word);
    let lang_code = escape_html(&session.lang);
    fill(
        FEEDBACK_HTML,
        &[
            ("verdict_class", class),
            ("verdict", message),
            ("given", given.as_str()),
            ("answer", answer.as_str()),
            ("reference_url", url.as_str()),
            ("word", word.as_str()),
            ("lang", lang_code.as_str()),
            ("top500_field", top500_field),
        ],
    )
}

fn language_options(languages: &Languages, selected: &str) -> String {
    languages
        .iter()
        .map(|(code, lang)| {
            let marker = if code == selected { " selected" } else { "" };
            format!(
                r#"<option value="{}"{marker}>{}</option>"#,
                escape_html(code),
                escape_html(&lang.name)
            )
        })
        .collect()
}

/// Wiktionary page for `word`, scrolled to the language section.
pub fn reference_url(word: &str, anchor: &str) -> String {
    format!("{WIKTIONARY_BASE}{}#{anchor}", word.replace(' ', "_"))
}

/// Substitute `{{name}}` placeholders in one pass; values are not rescanned.
fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let name = &after[..end];
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
