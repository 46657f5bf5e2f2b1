use crate::aggregate::{
    self, BackupSummary, DailyWord, HomeView, SearchResults, WordListing, WordView, WordsPage,
};
use crate::dictionary::{DEFAULT_DICTIONARY_URL, DEFAULT_LOOKUP_TIMEOUT, Dictionary, FreeDictionaryClient};
use crate::document::{Document, Note};
use crate::error::NotebookError;
use crate::languages::{DEFAULT_LANGUAGE, LANGUAGE_OPTIONS};
use crate::persistence::JsonFileRepository;
use crate::store::Notebook;
use askama::Template;
use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::Local;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

type SharedState = Arc<AppState>;

const JSON_EXPORT_NAME: &str = "vocab_backup.json";
const TEXT_EXPORT_NAME: &str = "vocab_backup.txt";

pub struct AppState {
    pub notebook: Notebook,
    pub dictionary: Arc<dyn Dictionary>,
    pub theme: WebTheme,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

impl FromStr for WebTheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tailwind" => Ok(WebTheme::Tailwind),
            "bootstrap" => Ok(WebTheme::Bootstrap),
            other => Err(format!("unknown theme {other:?} (expected tailwind or bootstrap)")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    button_class: &'static str,
    input_class: &'static str,
    panel_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-4xl w-full space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                input_class: "rounded-md border border-slate-300 px-3 py-2",
                panel_class: "bg-white shadow rounded p-4",
            },
            WebTheme::Bootstrap => Self {
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-10",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                button_class: "btn btn-primary",
                input_class: "form-control",
                panel_class: "card card-body mb-3",
            },
        }
    }

    fn head_tags(theme: WebTheme) -> (&'static str, &'static str) {
        match theme {
            WebTheme::Tailwind => (
                r#"<script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>"#,
                "",
            ),
            WebTheme::Bootstrap => (
                r#"<link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">"#,
                r#"<script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/js/bootstrap.bundle.min.js" integrity="sha384-FKyoEForCGlyvwx9Hj09JcYn3nv7wiPVlz7YYwJrWVcXK/BmnVDxM+D2scQbITxI" crossorigin="anonymous"></script>"#,
            ),
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub data_file: PathBuf,
    pub dictionary_url: String,
    pub lookup_timeout: Duration,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            data_file: PathBuf::from("data.json"),
            dictionary_url: DEFAULT_DICTIONARY_URL.to_string(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to build dictionary client: {0}")]
    Client(#[from] reqwest::Error),
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let dictionary = FreeDictionaryClient::new(config.dictionary_url.clone(), config.lookup_timeout)?;
    let state = Arc::new(AppState {
        notebook: Notebook::new(JsonFileRepository::new(config.data_file.clone())),
        dictionary: Arc::new(dictionary),
        theme: config.theme,
    });
    let router = build_router(state);
    info!(
        %config.addr,
        theme = %config.theme,
        data_file = %config.data_file.display(),
        dictionary = %config.dictionary_url,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

/// A failed request rendered as an HTML page.
#[derive(Debug)]
struct PageError {
    theme: WebTheme,
    status: StatusCode,
    message: String,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        (self.status, Html(render_error_page(self.theme, &self.message))).into_response()
    }
}

impl AppState {
    fn internal_error(&self, message: impl Into<String>) -> PageError {
        PageError {
            theme: self.theme,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn storage_error(&self, err: NotebookError) -> PageError {
        error!(error = %err, "notebook storage failed");
        self.internal_error(format!("Your notebook could not be saved or loaded: {err}"))
    }

    fn page<T: Template>(&self, title: &str, body: T) -> Result<Html<String>, PageError> {
        let body = body
            .render()
            .map_err(|err| self.internal_error(err.to_string()))?;
        Ok(Html(render_layout(self.theme, title, &body)))
    }
}

type PageResult = Result<Response, PageError>;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/search", get(search_page).post(search_submit))
        .route("/favorite/:language/:word", get(toggle_favorite))
        .route("/pin/:language/:word", get(toggle_pin))
        .route("/notes", get(notes_page).post(add_general_note))
        .route("/notes/:id/delete", post(delete_general_note))
        .route("/word/:language/:word/add_note", post(add_word_note))
        .route(
            "/word/:language/:word/notes/:id/delete",
            post(delete_word_note),
        )
        .route("/word/:language/:word/tag", post(add_word_tag))
        .route("/history/clear", post(clear_history))
        .route("/history/:word/delete", post(delete_history_entry))
        .route("/find", get(find_page))
        .route("/words", get(words_page))
        .route("/backup", get(backup_page))
        .route("/export/json", get(export_json))
        .route("/export/text", get(export_text))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    word: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NoteForm {
    note_text: Option<String>,
    important: Option<String>,
}

impl NoteForm {
    fn text(&self) -> &str {
        self.note_text.as_deref().unwrap_or_default()
    }

    fn important(&self) -> bool {
        self.important.as_deref() == Some("on")
    }
}

#[derive(Debug, Deserialize)]
struct TagForm {
    tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FindParams {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WordsParams {
    tag: Option<String>,
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "vocab-notebook" }))
}

async fn home(State(state): State<SharedState>) -> PageResult {
    let doc = state.notebook.load().map_err(|err| state.storage_error(err))?;
    let today = Local::now().date_naive();
    let view = aggregate::home_view(&doc, state.dictionary.as_ref(), today).await;
    let template = HomeTemplate::new(Chrome::new(state.theme), &doc, &view);
    Ok(state.page("Vocabulary notebook", template)?.into_response())
}

async fn search_submit(Form(form): Form<SearchParams>) -> Redirect {
    let word = form.word.as_deref().unwrap_or_default().trim();
    if word.is_empty() {
        return Redirect::to("/");
    }
    Redirect::to(&word_path(word, requested_language(form.language.as_deref())))
}

async fn search_page(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> PageResult {
    let word = params.word.as_deref().unwrap_or_default();
    let language = requested_language(params.language.as_deref());
    let view = aggregate::search_word(&state.notebook, state.dictionary.as_ref(), word, language)
        .await
        .map_err(|err| state.storage_error(err))?;
    let Some(view) = view else {
        return Ok(Redirect::to("/").into_response());
    };
    let title = format!("{} • Vocabulary notebook", view.word);
    let template = WordTemplate::new(Chrome::new(state.theme), &view);
    Ok(state.page(&title, template)?.into_response())
}

async fn toggle_favorite(
    State(state): State<SharedState>,
    Path((language, word)): Path<(String, String)>,
) -> PageResult {
    state
        .notebook
        .toggle_favorite(&word)
        .map_err(|err| state.storage_error(err))?;
    Ok(Redirect::to(&word_path(&word, &language)).into_response())
}

async fn toggle_pin(
    State(state): State<SharedState>,
    Path((language, word)): Path<(String, String)>,
) -> PageResult {
    state
        .notebook
        .toggle_pin(&word)
        .map_err(|err| state.storage_error(err))?;
    Ok(Redirect::to(&word_path(&word, &language)).into_response())
}

async fn notes_page(State(state): State<SharedState>) -> PageResult {
    let doc = state.notebook.load().map_err(|err| state.storage_error(err))?;
    let notes = doc
        .sorted_general_notes()
        .into_iter()
        .map(|note| NoteRow {
            delete_action: format!("/notes/{}/delete", note.id),
            note,
        })
        .collect();
    let template = NotesTemplate {
        chrome: Chrome::new(state.theme),
        notes,
    };
    Ok(state.page("Notes • Vocabulary notebook", template)?.into_response())
}

async fn add_general_note(
    State(state): State<SharedState>,
    Form(form): Form<NoteForm>,
) -> PageResult {
    state
        .notebook
        .add_general_note(form.text(), form.important())
        .map_err(|err| state.storage_error(err))?;
    Ok(Redirect::to("/notes").into_response())
}

async fn delete_general_note(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> PageResult {
    state
        .notebook
        .delete_general_note(id)
        .map_err(|err| state.storage_error(err))?;
    Ok(Redirect::to("/notes").into_response())
}

async fn add_word_note(
    State(state): State<SharedState>,
    Path((language, word)): Path<(String, String)>,
    Form(form): Form<NoteForm>,
) -> PageResult {
    state
        .notebook
        .add_word_note(&word, form.text(), form.important())
        .map_err(|err| state.storage_error(err))?;
    Ok(Redirect::to(&word_path(&word, &language)).into_response())
}

async fn delete_word_note(
    State(state): State<SharedState>,
    Path((language, word, id)): Path<(String, String, i64)>,
) -> PageResult {
    state
        .notebook
        .delete_word_note(&word, id)
        .map_err(|err| state.storage_error(err))?;
    Ok(Redirect::to(&word_path(&word, &language)).into_response())
}

async fn add_word_tag(
    State(state): State<SharedState>,
    Path((language, word)): Path<(String, String)>,
    Form(form): Form<TagForm>,
) -> PageResult {
    state
        .notebook
        .add_word_tag(&word, form.tag.as_deref().unwrap_or_default())
        .map_err(|err| state.storage_error(err))?;
    Ok(Redirect::to(&word_path(&word, &language)).into_response())
}

async fn delete_history_entry(
    State(state): State<SharedState>,
    Path(word): Path<String>,
) -> PageResult {
    state
        .notebook
        .delete_history_entry(&word)
        .map_err(|err| state.storage_error(err))?;
    Ok(Redirect::to("/").into_response())
}

async fn clear_history(State(state): State<SharedState>) -> PageResult {
    state
        .notebook
        .clear_history()
        .map_err(|err| state.storage_error(err))?;
    Ok(Redirect::to("/").into_response())
}

async fn find_page(
    State(state): State<SharedState>,
    Query(params): Query<FindParams>,
) -> PageResult {
    let doc = state.notebook.load().map_err(|err| state.storage_error(err))?;
    let query = params.q.unwrap_or_default();
    let results = aggregate::search_all(&doc, &query);
    let template = FindTemplate::new(
        Chrome::new(state.theme),
        &doc,
        query.trim(),
        results.as_ref(),
    );
    Ok(state.page("Search notebook • Vocabulary notebook", template)?.into_response())
}

async fn words_page(
    State(state): State<SharedState>,
    Query(params): Query<WordsParams>,
) -> PageResult {
    let doc = state.notebook.load().map_err(|err| state.storage_error(err))?;
    let page = aggregate::list_words(&doc, state.dictionary.as_ref(), params.tag.as_deref()).await;
    let template = WordsTemplate::new(Chrome::new(state.theme), &page);
    Ok(state.page("All words • Vocabulary notebook", template)?.into_response())
}

async fn backup_page(State(state): State<SharedState>) -> PageResult {
    let doc = state.notebook.load().map_err(|err| state.storage_error(err))?;
    let template = BackupTemplate {
        chrome: Chrome::new(state.theme),
        summary: BackupSummary::of(&doc),
    };
    Ok(state.page("Backup • Vocabulary notebook", template)?.into_response())
}

async fn export_json(State(state): State<SharedState>) -> PageResult {
    let doc = state.notebook.load().map_err(|err| state.storage_error(err))?;
    let body = aggregate::export_json(&doc).map_err(|err| state.internal_error(err.to_string()))?;
    Ok(attachment(mime::APPLICATION_JSON.as_ref(), JSON_EXPORT_NAME, body))
}

async fn export_text(State(state): State<SharedState>) -> PageResult {
    let doc = state.notebook.load().map_err(|err| state.storage_error(err))?;
    let body = aggregate::export_text(&doc);
    Ok(attachment(mime::TEXT_PLAIN_UTF_8.as_ref(), TEXT_EXPORT_NAME, body))
}

fn attachment(content_type: &str, filename: &str, body: String) -> Response {
    let disposition = format!("attachment; filename=\"{filename}\"");
    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn requested_language(language: Option<&str>) -> &str {
    match language.map(str::trim) {
        Some(code) if !code.is_empty() => code,
        _ => DEFAULT_LANGUAGE,
    }
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn word_path(word: &str, language: &str) -> String {
    format!(
        "/search?word={}&language={}",
        encode_component(word),
        encode_component(language)
    )
}

fn word_action(language: &str, word: &str, action: &str) -> String {
    format!(
        "/word/{}/{}/{action}",
        encode_component(language),
        encode_component(word)
    )
}

fn words_by_tag_path(tag: &str) -> String {
    format!("/words?tag={}", encode_component(tag))
}

fn render_layout(theme: WebTheme, title: &str, body: &str) -> String {
    let chrome = Chrome::new(theme);
    let (css_tag, js_tag) = Chrome::head_tags(theme);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{title}</title>
    {css_tag}
    {js_tag}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <nav class="flex flex-wrap gap-4 nav mb-6 text-sm font-semibold">
        <a href="/">Home</a>
        <a href="/words">All words</a>
        <a href="/notes">Notes</a>
        <a href="/find">Search notebook</a>
        <a href="/backup">Backup</a>
      </nav>
      <div class="{card_class}">
{body}
      </div>
    </main>
  </body>
</html>"#,
        title = html_escape(title),
        css_tag = css_tag,
        js_tag = js_tag,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        body = body,
    )
}

fn render_error_page(theme: WebTheme, message: &str) -> String {
    let chrome = Chrome::new(theme);
    let body = format!(
        r#"<h1 class="{headline_class}">Something went wrong</h1>
        <p class="{lede_class}">{message}</p>
        <a href="/" class="{button_class}">Back to home</a>"#,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        message = html_escape(message),
    );
    render_layout(theme, "Error • Vocabulary notebook", &body)
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

struct WordLink {
    word: String,
    href: String,
}

impl WordLink {
    fn search(word: &str, language: &str) -> Self {
        Self {
            word: word.to_string(),
            href: word_path(word, language),
        }
    }

    fn stored(doc: &Document, word: &str) -> Self {
        Self::search(word, aggregate::guessed_language(doc, word))
    }

    fn list(doc: &Document, words: &[String]) -> Vec<Self> {
        words.iter().map(|word| Self::stored(doc, word)).collect()
    }
}

struct HistoryRow {
    link: WordLink,
    delete_action: String,
}

struct LanguageChoice {
    code: &'static str,
    label: &'static str,
    selected: bool,
}

fn language_choices(selected: &str) -> Vec<LanguageChoice> {
    LANGUAGE_OPTIONS
        .iter()
        .map(|option| LanguageChoice {
            code: option.code,
            label: option.label,
            selected: option.code == selected,
        })
        .collect()
}

struct DailyCard {
    heading: &'static str,
    pick: DailyWord,
    href: String,
}

impl DailyCard {
    fn new(heading: &'static str, pick: Option<&DailyWord>) -> Option<Self> {
        pick.map(|pick| Self {
            heading,
            href: word_path(&pick.word, &pick.language_code),
            pick: pick.clone(),
        })
    }
}

#[derive(Template)]
#[template(
    source = r#"<div>
  <p class="{{ chrome.eyebrow_class }}">Personal dictionary</p>
  <h1 class="{{ chrome.headline_class }}">Vocabulary notebook</h1>
  <p class="{{ chrome.lede_class }}">Look up a word, then keep it with notes and tags.</p>
</div>

<form method="post" action="/search" class="flex flex-wrap gap-3 d-flex">
  <input class="{{ chrome.input_class }}" type="text" name="word" placeholder="Type a word" required>
  <select class="{{ chrome.input_class }}" name="language">
    {% for lang in languages %}
    <option value="{{ lang.code }}"{% if lang.selected %} selected{% endif %}>{{ lang.label }}</option>
    {% endfor %}
  </select>
  <button class="{{ chrome.button_class }}" type="submit">Look up</button>
</form>

{% for card in daily %}
<section class="{{ chrome.panel_class }}">
  <p class="{{ chrome.eyebrow_class }}">{{ card.heading }} · {{ card.pick.language_label }}</p>
  <h2 class="text-2xl font-bold"><a href="{{ card.href }}">{{ card.pick.word }}</a></h2>
  {% if card.pick.short_definition.is_some() %}
  <p>{{ card.pick.short_definition.as_ref().unwrap() }}</p>
  {% else %}
  <p class="text-slate-500 text-muted">No definition available right now.</p>
  {% endif %}
</section>
{% endfor %}

<section class="{{ chrome.panel_class }}">
  <h2 class="text-xl font-semibold">Pinned</h2>
  {% if pinned.is_empty() %}<p class="text-slate-500 text-muted">Nothing pinned yet.</p>{% endif %}
  <ul>{% for link in pinned %}<li><a href="{{ link.href }}">{{ link.word }}</a></li>{% endfor %}</ul>
</section>

<section class="{{ chrome.panel_class }}">
  <h2 class="text-xl font-semibold">Favourites</h2>
  {% if favorites.is_empty() %}<p class="text-slate-500 text-muted">No favourites yet.</p>{% endif %}
  <ul>{% for link in favorites %}<li><a href="{{ link.href }}">{{ link.word }}</a></li>{% endfor %}</ul>
</section>

<section class="{{ chrome.panel_class }}">
  <h2 class="text-xl font-semibold">Recent searches</h2>
  {% if history.is_empty() %}
  <p class="text-slate-500 text-muted">No searches yet.</p>
  {% else %}
  <ul>
    {% for row in history %}
    <li class="flex gap-2 d-flex">
      <a href="{{ row.link.href }}">{{ row.link.word }}</a>
      <form method="post" action="{{ row.delete_action }}"><button type="submit" aria-label="Remove from history">×</button></form>
    </li>
    {% endfor %}
  </ul>
  <form method="post" action="/history/clear"><button class="{{ chrome.button_class }}" type="submit">Clear history</button></form>
  {% endif %}
</section>"#,
    ext = "html"
)]
struct HomeTemplate {
    chrome: Chrome,
    languages: Vec<LanguageChoice>,
    daily: Vec<DailyCard>,
    pinned: Vec<WordLink>,
    favorites: Vec<WordLink>,
    history: Vec<HistoryRow>,
}

impl HomeTemplate {
    fn new(chrome: Chrome, doc: &Document, view: &HomeView) -> Self {
        let daily = [
            DailyCard::new("Word of the day", view.picks.general.as_ref()),
            DailyCard::new("Sanskrit study word", view.picks.study.as_ref()),
        ]
        .into_iter()
        .flatten()
        .collect();
        let history = view
            .history
            .iter()
            .map(|word| HistoryRow {
                link: WordLink::stored(doc, word),
                delete_action: format!("/history/{}/delete", encode_component(word)),
            })
            .collect();
        Self {
            chrome,
            languages: language_choices(DEFAULT_LANGUAGE),
            daily,
            pinned: WordLink::list(doc, &view.pinned),
            favorites: WordLink::list(doc, &view.favorites),
            history,
        }
    }
}

struct NoteRow {
    note: Note,
    delete_action: String,
}

struct TagLink {
    tag: String,
    href: String,
}

impl TagLink {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            href: words_by_tag_path(tag),
        }
    }
}

#[derive(Template)]
#[template(
    source = r#"<div>
  <p class="{{ chrome.eyebrow_class }}">Looked up in {{ language }}</p>
  <h1 class="{{ chrome.headline_class }}">{{ view.word }}</h1>
  <div class="flex flex-wrap gap-3 d-flex">
    <a class="{{ chrome.button_class }}" href="{{ favorite_href }}">{% if view.is_favorite %}★ Remove favourite{% else %}☆ Add favourite{% endif %}</a>
    <a class="{{ chrome.button_class }}" href="{{ pin_href }}">{% if view.is_pinned %}Unpin{% else %}Pin{% endif %}</a>
  </div>
</div>

<form method="get" action="/search" class="flex flex-wrap gap-3 d-flex">
  <input type="hidden" name="word" value="{{ view.word }}">
  <select class="{{ chrome.input_class }}" name="language">
    {% for lang in languages %}
    <option value="{{ lang.code }}"{% if lang.selected %} selected{% endif %}>{{ lang.label }}</option>
    {% endfor %}
  </select>
  <button class="{{ chrome.button_class }}" type="submit">Look up again</button>
</form>

{% if view.info.is_some() %}
{% let info = view.info.as_ref().unwrap() %}
<section class="{{ chrome.panel_class }}" id="definitions">
  <h2 class="text-xl font-semibold">Definitions</h2>
  <ol>
    {% for def in info.definitions %}
    <li><span class="text-slate-500 text-muted">{{ def.part_of_speech }}</span> {{ def.definition }}</li>
    {% endfor %}
  </ol>
  {% if !info.examples.is_empty() %}
  <h3 class="font-semibold">Examples</h3>
  <ul>{% for example in info.examples %}<li>{{ example }}</li>{% endfor %}</ul>
  {% endif %}
  {% if !info.synonyms.is_empty() %}
  <p><strong>Synonyms:</strong> {{ info.synonyms.join(", ") }}</p>
  {% endif %}
  {% if !info.translations.is_empty() %}
  <h3 class="font-semibold">Translations</h3>
  <ul>
    {% for t in info.translations %}
    <li>{{ t.language_name.as_deref().unwrap_or("?") }}: {{ t.word.as_deref().unwrap_or("") }}</li>
    {% endfor %}
  </ul>
  {% endif %}
  {% if info.source_url.is_some() %}
  <p class="text-sm"><a href="{{ info.source_url.as_ref().unwrap() }}">Source</a></p>
  {% endif %}
</section>
{% else %}
<section class="{{ chrome.panel_class }}" id="definitions">
  <p>No dictionary information found for this word.</p>
</section>
{% endif %}

<section class="{{ chrome.panel_class }}" id="tags">
  <h2 class="text-xl font-semibold">Tags</h2>
  <div class="flex flex-wrap gap-2 d-flex">
    {% for tag in tags %}<a href="{{ tag.href }}" class="px-2 py-1 rounded bg-slate-200 badge bg-secondary">{{ tag.tag }}</a>{% endfor %}
  </div>
  <form method="post" action="{{ tag_action }}" class="flex gap-2 d-flex mt-2">
    <input class="{{ chrome.input_class }}" type="text" name="tag" placeholder="Add a tag">
    <button class="{{ chrome.button_class }}" type="submit">Tag</button>
  </form>
</section>

<section class="{{ chrome.panel_class }}" id="notes">
  <h2 class="text-xl font-semibold">Notes</h2>
  <form method="post" action="{{ note_action }}">
    <textarea class="{{ chrome.input_class }} w-full" name="note_text" rows="3"></textarea>
    <label><input type="checkbox" name="important"> Important</label>
    <button class="{{ chrome.button_class }}" type="submit">Add note</button>
  </form>
  <ul>
    {% for row in notes %}
    <li>
      {% if row.note.important %}<strong>★</strong> {% endif %}{{ row.note.text }}
      <span class="text-xs text-slate-500 text-muted">{{ row.note.created_at }}</span>
      <form method="post" action="{{ row.delete_action }}"><button type="submit">Delete</button></form>
    </li>
    {% endfor %}
  </ul>
</section>"#,
    ext = "html"
)]
struct WordTemplate<'a> {
    chrome: Chrome,
    view: &'a WordView,
    language: &'a str,
    languages: Vec<LanguageChoice>,
    favorite_href: String,
    pin_href: String,
    tag_action: String,
    note_action: String,
    tags: Vec<TagLink>,
    notes: Vec<NoteRow>,
}

impl<'a> WordTemplate<'a> {
    fn new(chrome: Chrome, view: &'a WordView) -> Self {
        let language = view.language.as_str();
        let word = view.word.as_str();
        let notes = view
            .notes
            .iter()
            .map(|note| NoteRow {
                delete_action: word_action(language, word, &format!("notes/{}/delete", note.id)),
                note: note.clone(),
            })
            .collect();
        Self {
            chrome,
            view,
            language: crate::languages::language_label(language),
            languages: language_choices(language),
            favorite_href: format!(
                "/favorite/{}/{}",
                encode_component(language),
                encode_component(word)
            ),
            pin_href: format!(
                "/pin/{}/{}",
                encode_component(language),
                encode_component(word)
            ),
            tag_action: word_action(language, word, "tag"),
            note_action: word_action(language, word, "add_note"),
            tags: view.tags.iter().map(|tag| TagLink::new(tag)).collect(),
            notes,
        }
    }
}

#[derive(Template)]
#[template(
    source = r#"<div>
  <p class="{{ chrome.eyebrow_class }}">Notebook</p>
  <h1 class="{{ chrome.headline_class }}">General notes</h1>
</div>
<form method="post" action="/notes" class="{{ chrome.panel_class }}">
  <textarea class="{{ chrome.input_class }} w-full" name="note_text" rows="3"></textarea>
  <label><input type="checkbox" name="important"> Important</label>
  <button class="{{ chrome.button_class }}" type="submit">Add note</button>
</form>
{% if notes.is_empty() %}
<p class="{{ chrome.lede_class }}">No notes yet.</p>
{% else %}
<ul>
  {% for row in notes %}
  <li class="{{ chrome.panel_class }}">
    {% if row.note.important %}<strong>★</strong> {% endif %}{{ row.note.text }}
    <span class="text-xs text-slate-500 text-muted">{{ row.note.created_at }}</span>
    <form method="post" action="{{ row.delete_action }}"><button type="submit">Delete</button></form>
  </li>
  {% endfor %}
</ul>
{% endif %}"#,
    ext = "html"
)]
struct NotesTemplate {
    chrome: Chrome,
    notes: Vec<NoteRow>,
}

struct NoteHitRow {
    link: WordLink,
    note: Note,
}

struct TagHitRow {
    link: WordLink,
    tag: TagLink,
}

#[derive(Template)]
#[template(
    source = r#"<div>
  <p class="{{ chrome.eyebrow_class }}">Notebook</p>
  <h1 class="{{ chrome.headline_class }}">Search your notebook</h1>
</div>
<form method="get" action="/find" class="flex gap-3 d-flex">
  <input class="{{ chrome.input_class }}" type="text" name="q" value="{{ query }}" placeholder="Words, notes or tags">
  <button class="{{ chrome.button_class }}" type="submit">Search</button>
</form>
{% if !searched %}
<p class="{{ chrome.lede_class }}">No search performed yet.</p>
{% else if nothing_found %}
<p class="{{ chrome.lede_class }}">No matches for “{{ query }}”.</p>
{% else %}
{% if !words.is_empty() %}
<section class="{{ chrome.panel_class }}">
  <h2 class="text-xl font-semibold">Words</h2>
  <ul>{% for link in words %}<li><a href="{{ link.href }}">{{ link.word }}</a></li>{% endfor %}</ul>
</section>
{% endif %}
{% if !general_notes.is_empty() %}
<section class="{{ chrome.panel_class }}">
  <h2 class="text-xl font-semibold">General notes</h2>
  <ul>{% for note in general_notes %}<li>{% if note.important %}<strong>★</strong> {% endif %}{{ note.text }}</li>{% endfor %}</ul>
</section>
{% endif %}
{% if !word_notes.is_empty() %}
<section class="{{ chrome.panel_class }}">
  <h2 class="text-xl font-semibold">Word notes</h2>
  <ul>{% for hit in word_notes %}<li><a href="{{ hit.link.href }}">{{ hit.link.word }}</a>: {{ hit.note.text }}</li>{% endfor %}</ul>
</section>
{% endif %}
{% if !tags.is_empty() %}
<section class="{{ chrome.panel_class }}">
  <h2 class="text-xl font-semibold">Tags</h2>
  <ul>{% for hit in tags %}<li><a href="{{ hit.tag.href }}">{{ hit.tag.tag }}</a> on <a href="{{ hit.link.href }}">{{ hit.link.word }}</a></li>{% endfor %}</ul>
</section>
{% endif %}
{% endif %}"#,
    ext = "html"
)]
struct FindTemplate<'a> {
    chrome: Chrome,
    query: &'a str,
    searched: bool,
    nothing_found: bool,
    words: Vec<WordLink>,
    general_notes: Vec<Note>,
    word_notes: Vec<NoteHitRow>,
    tags: Vec<TagHitRow>,
}

impl<'a> FindTemplate<'a> {
    fn new(
        chrome: Chrome,
        doc: &Document,
        query: &'a str,
        results: Option<&SearchResults>,
    ) -> Self {
        let mut template = Self {
            chrome,
            query,
            searched: results.is_some(),
            nothing_found: results.is_some_and(SearchResults::is_empty),
            words: Vec::new(),
            general_notes: Vec::new(),
            word_notes: Vec::new(),
            tags: Vec::new(),
        };
        if let Some(results) = results {
            template.words = WordLink::list(doc, &results.words);
            template.general_notes = results.general_notes.clone();
            template.word_notes = results
                .word_notes
                .iter()
                .map(|hit| NoteHitRow {
                    link: WordLink::stored(doc, &hit.word),
                    note: hit.note.clone(),
                })
                .collect();
            template.tags = results
                .tags
                .iter()
                .map(|hit| TagHitRow {
                    link: WordLink::stored(doc, &hit.word),
                    tag: TagLink::new(&hit.tag),
                })
                .collect();
        }
        template
    }
}

struct ListingRow {
    link: WordLink,
    listing: WordListing,
    tags: Vec<TagLink>,
}

#[derive(Template)]
#[template(
    source = r#"<div>
  <p class="{{ chrome.eyebrow_class }}">Notebook</p>
  <h1 class="{{ chrome.headline_class }}">All words{% if selected_tag.is_some() %} tagged “{{ selected_tag.as_ref().unwrap() }}”{% endif %}</h1>
  <p class="{{ chrome.lede_class }}">{{ rows.len() }} word{% if rows.len() != 1 %}s{% endif %}.</p>
</div>
<div class="flex flex-wrap gap-2 d-flex">
  <a href="/words" class="px-2 py-1 rounded {% if selected_tag.is_none() %}bg-slate-900 text-white{% else %}bg-slate-200{% endif %}">All</a>
  {% for tag in tags %}<a href="{{ tag.href }}" class="px-2 py-1 rounded bg-slate-200 badge bg-secondary">{{ tag.tag }}</a>{% endfor %}
</div>
{% if rows.is_empty() %}
<p>No words yet.</p>
{% else %}
<div class="grid gap-2 md:grid-cols-2">
  {% for row in rows %}
  <div class="{{ chrome.panel_class }}">
    <p class="font-semibold"><a href="{{ row.link.href }}">{{ row.link.word }}</a>{% if row.listing.is_favorite %} ★{% endif %}{% if row.listing.is_pinned %} 📌{% endif %}</p>
    {% if row.listing.short_definition.is_some() %}
    <p class="text-sm">{{ row.listing.short_definition.as_ref().unwrap() }}</p>
    {% endif %}
    <p class="text-xs text-slate-500 text-muted">{% for tag in row.tags %}<a href="{{ tag.href }}">{{ tag.tag }}</a> {% endfor %}</p>
  </div>
  {% endfor %}
</div>
{% endif %}"#,
    ext = "html"
)]
struct WordsTemplate {
    chrome: Chrome,
    selected_tag: Option<String>,
    tags: Vec<TagLink>,
    rows: Vec<ListingRow>,
}

impl WordsTemplate {
    fn new(chrome: Chrome, page: &WordsPage) -> Self {
        let rows = page
            .words
            .iter()
            .map(|listing| ListingRow {
                link: WordLink::search(&listing.word, &listing.language_code),
                tags: listing.tags.iter().map(|tag| TagLink::new(tag)).collect(),
                listing: listing.clone(),
            })
            .collect();
        Self {
            chrome,
            selected_tag: page.selected_tag.clone(),
            tags: page.tags.iter().map(|tag| TagLink::new(tag)).collect(),
            rows,
        }
    }
}

#[derive(Template)]
#[template(
    source = r#"<div>
  <p class="{{ chrome.eyebrow_class }}">Notebook</p>
  <h1 class="{{ chrome.headline_class }}">Backup</h1>
  <p class="{{ chrome.lede_class }}">Download everything in your notebook.</p>
</div>
<table class="table">
  <tbody>
    <tr><th class="text-left">Favourites</th><td>{{ summary.favorites }}</td></tr>
    <tr><th class="text-left">Pinned</th><td>{{ summary.pinned }}</td></tr>
    <tr><th class="text-left">History</th><td>{{ summary.history }}</td></tr>
    <tr><th class="text-left">General notes</th><td>{{ summary.general_notes }}</td></tr>
    <tr><th class="text-left">Word notes</th><td>{{ summary.word_notes }} across {{ summary.noted_words }} words</td></tr>
    <tr><th class="text-left">Tagged words</th><td>{{ summary.tagged_words }}</td></tr>
  </tbody>
</table>
<div class="flex gap-3 d-flex">
  <a class="{{ chrome.button_class }}" href="/export/json">Download JSON</a>
  <a class="{{ chrome.button_class }}" href="/export/text">Download text</a>
</div>"#,
    ext = "html"
)]
struct BackupTemplate {
    chrome: Chrome,
    summary: BackupSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::LookupResult;
    use crate::persistence::{DocumentRepository, MemoryRepository};
    use crate::NotebookResult;
    use async_trait::async_trait;
    use axum::{body, http::Request};
    use tower::ServiceExt;

    struct OfflineDictionary;

    #[async_trait]
    impl Dictionary for OfflineDictionary {
        async fn lookup(&self, _word: &str, _language_code: &str) -> Option<LookupResult> {
            None
        }
    }

    struct BrokenRepository;

    impl DocumentRepository for BrokenRepository {
        fn load(&self) -> NotebookResult<Document> {
            Err(NotebookError::Read {
                path: PathBuf::from("data.json"),
                source: std::io::Error::other("disk gone"),
            })
        }

        fn save(&self, _document: &Document) -> NotebookResult<()> {
            Ok(())
        }
    }

    fn test_router() -> (Router, Arc<MemoryRepository>) {
        let repo = Arc::new(MemoryRepository::default());
        let state = Arc::new(AppState {
            notebook: Notebook::new(Arc::clone(&repo)),
            dictionary: Arc::new(OfflineDictionary),
            theme: WebTheme::Tailwind,
        });
        (build_router(state), repo)
    }

    async fn body_text(response: Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form(uri: &str, body: &'static str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap()
    }

    #[tokio::test]
    async fn home_renders_daily_picks() {
        let (router, _) = test_router();
        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        let html = body_text(response).await;
        assert!(html.contains("Word of the day"));
        assert!(html.contains("Sanskrit study word"));
    }

    #[tokio::test]
    async fn search_post_redirects_to_get() {
        let (router, _) = test_router();
        let response = router
            .oneshot(form("/search", "word=ice+cream&language=all"))
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/search?word=ice%20cream&language=all");

        let (router, _) = test_router();
        let response = router.oneshot(form("/search", "word=+&language=en")).await.unwrap();
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn search_page_records_history_and_tag() {
        let (router, repo) = test_router();
        let response = router
            .oneshot(
                Request::get("/search?word=karma&language=sa")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let html = body_text(response).await;
        assert!(html.contains("No dictionary information found"));
        let doc = repo.snapshot();
        assert_eq!(doc.history, vec!["karma"]);
        assert_eq!(doc.tags_for("karma"), ["sanskrit"]);
    }

    #[tokio::test]
    async fn stored_word_links_keep_their_language() {
        let (router, repo) = test_router();
        router
            .clone()
            .oneshot(
                Request::get("/search?word=karma&language=sa")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        for uri in ["/", "/find?q=karm"] {
            let response = router
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            let html = body_text(response).await;
            assert!(html.contains("/search?word=karma&amp;language=sa"), "{uri}");
            assert!(!html.contains("/search?word=karma&amp;language=en"), "{uri}");
        }
        assert_eq!(repo.snapshot().tags_for("karma"), ["sanskrit"]);
    }

    #[tokio::test]
    async fn favorite_toggle_persists_and_redirects() {
        let (router, repo) = test_router();
        let response = router
            .oneshot(
                Request::get("/favorite/sa/karma")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/search?word=karma&language=sa");
        assert_eq!(repo.snapshot().favorites, vec!["karma"]);
    }

    #[tokio::test]
    async fn general_notes_add_and_delete() {
        let (router, repo) = test_router();
        router
            .clone()
            .oneshot(form("/notes", "note_text=Revise+verbs&important=on"))
            .await
            .unwrap();
        let doc = repo.snapshot();
        assert_eq!(doc.general_notes.len(), 1);
        assert!(doc.general_notes[0].important);

        let id = doc.general_notes[0].id;
        let response = router
            .clone()
            .oneshot(form(&format!("/notes/{id}/delete"), ""))
            .await
            .unwrap();
        assert_eq!(location(&response), "/notes");
        assert!(repo.snapshot().general_notes.is_empty());

        let response = router
            .oneshot(Request::get("/notes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(body_text(response).await.contains("No notes yet."));
    }

    #[tokio::test]
    async fn word_notes_and_tags_via_forms() {
        let (router, repo) = test_router();
        router
            .clone()
            .oneshot(form("/word/sa/karma/add_note", "note_text=check+spelling"))
            .await
            .unwrap();
        router
            .clone()
            .oneshot(form("/word/sa/karma/tag", "tag=++Hindi+++Notes+"))
            .await
            .unwrap();
        let doc = repo.snapshot();
        assert_eq!(doc.tags_for("karma"), ["hindi notes"]);
        let id = doc.word_notes["karma"][0].id;

        router
            .oneshot(form(&format!("/word/sa/karma/notes/{id}/delete"), ""))
            .await
            .unwrap();
        assert!(!repo.snapshot().word_notes.contains_key("karma"));
    }

    #[tokio::test]
    async fn find_distinguishes_no_query_from_no_match() {
        let (router, _) = test_router();
        let response = router
            .clone()
            .oneshot(Request::get("/find").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(body_text(response).await.contains("No search performed"));

        let response = router
            .oneshot(
                Request::get("/find?q=xyz-no-match")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(body_text(response).await.contains("No matches"));
    }

    #[tokio::test]
    async fn words_page_filters_by_tag() {
        let (router, repo) = test_router();
        let mut doc = Document::default();
        doc.add_word_tag("amour", "french");
        doc.record_search("serene");
        repo.save(&doc).unwrap();

        let response = router
            .oneshot(
                Request::get("/words?tag=french")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("amour"));
        assert!(!html.contains(">serene<"));
    }

    #[tokio::test]
    async fn exports_are_attachments() {
        let (router, repo) = test_router();
        let mut doc = Document::default();
        doc.toggle_pin("tamas");
        repo.save(&doc).unwrap();

        let response = router
            .clone()
            .oneshot(Request::get("/export/json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains(JSON_EXPORT_NAME));
        let parsed: Document = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(parsed, doc);

        let response = router
            .oneshot(Request::get("/export/text").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert!(body_text(response).await.contains("== Pinned ==\n- tamas"));
    }

    #[tokio::test]
    async fn storage_failure_is_a_server_error() {
        let state = Arc::new(AppState {
            notebook: Notebook::new(BrokenRepository),
            dictionary: Arc::new(OfflineDictionary),
            theme: WebTheme::Bootstrap,
        });
        let response = build_router(state)
            .oneshot(Request::get("/backup").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("disk gone"));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (router, _) = test_router();
        let response = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    #[test]
    fn theme_parses_case_insensitively() {
        assert_eq!("Bootstrap".parse::<WebTheme>(), Ok(WebTheme::Bootstrap));
        assert!("neon".parse::<WebTheme>().is_err());
    }
}
