use std::cmp;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tokio::runtime::Runtime;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vocab_notebook::aggregate::{self, DailyWord, SearchResults, WordView, WordsPage};
use vocab_notebook::dictionary::DEFAULT_DICTIONARY_URL;
use vocab_notebook::{FreeDictionaryClient, JsonFileRepository, Note, Notebook};

#[derive(Parser, Debug)]
#[command(name = "vocab-notebook", about = "Personal vocabulary notebook", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Notebook document to read and write.
    #[arg(long, global = true, env = "VOCAB_NOTEBOOK_DATA", default_value = "data.json")]
    data_file: PathBuf,

    /// Base URL of the dictionary entries API.
    #[arg(
        long,
        global = true,
        env = "VOCAB_NOTEBOOK_DICTIONARY_URL",
        default_value = DEFAULT_DICTIONARY_URL
    )]
    dictionary_url: String,

    /// Seconds to wait for a dictionary response.
    #[arg(long, global = true, default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look a word up and record it in history.
    Lookup {
        word: String,
        /// Language code (en, hi, sa, ta, es, fr, de or all).
        #[arg(short, long, default_value = "en")]
        language: String,
    },
    /// Toggle a word in favourites.
    Favorite { word: String },
    /// Toggle a word in the pinned list.
    Pin { word: String },
    /// General notes.
    #[command(subcommand)]
    Note(NoteCommand),
    /// Notes attached to a word.
    #[command(subcommand)]
    WordNote(WordNoteCommand),
    /// Add a tag to a word.
    Tag { word: String, tag: String },
    /// Show or edit search history.
    History {
        /// Remove every history entry.
        #[arg(long)]
        clear: bool,
        /// Remove one word from history.
        #[arg(long, conflicts_with = "clear")]
        delete: Option<String>,
    },
    /// Search words, notes and tags.
    Find { query: String },
    /// List every known word.
    Words {
        /// Only words carrying this tag.
        #[arg(long)]
        tag: Option<String>,
    },
    /// Show today's word picks.
    Today,
    /// Write a backup to stdout.
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },
    /// Run the web interface.
    #[cfg(feature = "web")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        #[arg(long, default_value_t = vocab_notebook::web::WebTheme::Tailwind)]
        theme: vocab_notebook::web::WebTheme,
    },
}

#[derive(Subcommand, Debug)]
enum NoteCommand {
    /// Add a general note.
    Add {
        text: String,
        #[arg(long)]
        important: bool,
    },
    /// Delete a general note by id.
    Delete { id: i64 },
    /// List general notes, important first.
    List,
}

#[derive(Subcommand, Debug)]
enum WordNoteCommand {
    /// Attach a note to a word.
    Add {
        word: String,
        text: String,
        #[arg(long)]
        important: bool,
    },
    /// Delete a word note by id.
    Delete { word: String, id: i64 },
    /// List the notes for a word.
    List { word: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Json,
    Text,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.command);
    let notebook = Notebook::new(JsonFileRepository::new(&cli.data_file));
    let as_json = cli.json;

    match &cli.command {
        Command::Lookup { word, language } => handle_lookup(&cli, &notebook, word, language),
        Command::Favorite { word } => {
            let now_favorite = notebook.toggle_favorite(word)?;
            print_toggle(word, "favourites", now_favorite, as_json)
        }
        Command::Pin { word } => {
            let now_pinned = notebook.toggle_pin(word)?;
            print_toggle(word, "pinned", now_pinned, as_json)
        }
        Command::Note(command) => handle_note(&notebook, command, as_json),
        Command::WordNote(command) => handle_word_note(&notebook, command, as_json),
        Command::Tag { word, tag } => {
            let added = notebook.add_word_tag(word, tag)?;
            let tags = notebook.load()?.tags_for(word).to_vec();
            if as_json {
                let payload = json!({ "word": word, "added": added, "tags": tags });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if added {
                println!("Tagged {word}: {}", tags.join(", "));
            } else {
                println!("{word} already has that tag (or it was blank).");
            }
            Ok(())
        }
        Command::History { clear, delete } => {
            if *clear {
                notebook.clear_history()?;
            } else if let Some(word) = delete {
                notebook.delete_history_entry(word)?;
            }
            let history = notebook.load()?.history;
            if as_json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                print_word_list("Recent searches", &history);
            }
            Ok(())
        }
        Command::Find { query } => {
            let doc = notebook.load()?;
            let results = aggregate::search_all(&doc, query);
            if as_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_search_results(results.as_ref());
            }
            Ok(())
        }
        Command::Words { tag } => {
            let doc = notebook.load()?;
            let dictionary = dictionary_client(&cli)?;
            let page = block_on(aggregate::list_words(&doc, &dictionary, tag.as_deref()))?;
            if as_json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                print_words_table(&page);
            }
            Ok(())
        }
        Command::Today => {
            let dictionary = dictionary_client(&cli)?;
            let today = Local::now().date_naive();
            let picks = block_on(aggregate::words_of_the_day(&dictionary, today))?;
            if as_json {
                println!("{}", serde_json::to_string_pretty(&picks)?);
            } else {
                print_daily("Word of the day", picks.general.as_ref());
                print_daily("Sanskrit study word", picks.study.as_ref());
            }
            Ok(())
        }
        Command::Export { format } => {
            let doc = notebook.load()?;
            match format {
                ExportFormat::Json => println!("{}", aggregate::export_json(&doc)?),
                ExportFormat::Text => print!("{}", aggregate::export_text(&doc)),
            }
            Ok(())
        }
        #[cfg(feature = "web")]
        Command::Serve { addr, theme } => {
            let config = vocab_notebook::web::WebConfig {
                addr: *addr,
                theme: *theme,
                data_file: cli.data_file.clone(),
                dictionary_url: cli.dictionary_url.clone(),
                lookup_timeout: Duration::from_secs(cli.timeout_secs),
            };
            block_on(vocab_notebook::web::serve(config))??;
            Ok(())
        }
    }
}

fn init_tracing(command: &Command) {
    let default_filter = match command {
        #[cfg(feature = "web")]
        Command::Serve { .. } => "vocab_notebook=info,tower_http=info",
        _ => "warn",
    };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn block_on<F: std::future::Future>(future: F) -> Result<F::Output, Box<dyn Error>> {
    let runtime = Runtime::new()?;
    Ok(runtime.block_on(future))
}

fn dictionary_client(cli: &Cli) -> Result<FreeDictionaryClient, Box<dyn Error>> {
    let client = FreeDictionaryClient::new(
        cli.dictionary_url.clone(),
        Duration::from_secs(cli.timeout_secs),
    )?;
    Ok(client)
}

fn handle_lookup(
    cli: &Cli,
    notebook: &Notebook,
    word: &str,
    language: &str,
) -> Result<(), Box<dyn Error>> {
    let dictionary = dictionary_client(cli)?;
    let Some(view) = block_on(aggregate::search_word(notebook, &dictionary, word, language))??
    else {
        println!("Nothing to look up.");
        return Ok(());
    };
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_word_view(&view);
    }
    Ok(())
}

fn handle_note(
    notebook: &Notebook,
    command: &NoteCommand,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    match command {
        NoteCommand::Add { text, important } => {
            let id = notebook.add_general_note(text, *important)?;
            print_note_added(id, as_json)
        }
        NoteCommand::Delete { id } => {
            let removed = notebook.delete_general_note(*id)?;
            print_note_removed(*id, removed, as_json)
        }
        NoteCommand::List => {
            let notes = notebook.load()?.sorted_general_notes();
            if as_json {
                println!("{}", serde_json::to_string_pretty(&notes)?);
            } else {
                print_notes_table("General notes", &notes);
            }
            Ok(())
        }
    }
}

fn handle_word_note(
    notebook: &Notebook,
    command: &WordNoteCommand,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    match command {
        WordNoteCommand::Add {
            word,
            text,
            important,
        } => {
            let id = notebook.add_word_note(word, text, *important)?;
            print_note_added(id, as_json)
        }
        WordNoteCommand::Delete { word, id } => {
            let removed = notebook.delete_word_note(word, *id)?;
            print_note_removed(*id, removed, as_json)
        }
        WordNoteCommand::List { word } => {
            let notes = notebook.load()?.sorted_word_notes(word);
            if as_json {
                println!("{}", serde_json::to_string_pretty(&notes)?);
            } else {
                print_notes_table(&format!("Notes for {word}"), &notes);
            }
            Ok(())
        }
    }
}

fn print_toggle(word: &str, list: &str, member: bool, as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        let payload = json!({ "word": word, "list": list, "member": member });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if member {
        println!("Added {word} to {list}.");
    } else {
        println!("Removed {word} from {list}.");
    }
    Ok(())
}

fn print_note_added(id: Option<i64>, as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&json!({ "id": id }))?);
        return Ok(());
    }
    match id {
        Some(id) => println!("Saved note {id}."),
        None => println!("Note text was blank; nothing saved."),
    }
    Ok(())
}

fn print_note_removed(id: i64, removed: bool, as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        let payload = json!({ "id": id, "removed": removed });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if removed {
        println!("Deleted note {id}.");
    } else {
        println!("No note with id {id}.");
    }
    Ok(())
}

fn print_word_view(view: &WordView) {
    let mut flags = Vec::new();
    if view.is_favorite {
        flags.push("favourite");
    }
    if view.is_pinned {
        flags.push("pinned");
    }
    if flags.is_empty() {
        println!("Word: {}", view.word);
    } else {
        println!("Word: {} ({})", view.word, flags.join(", "));
    }
    if !view.tags.is_empty() {
        println!("Tags: {}", view.tags.join(", "));
    }

    match &view.info {
        Some(info) => {
            println!("\nDefinitions:");
            for def in &info.definitions {
                println!("- [{}] {}", def.part_of_speech, def.definition);
            }
            if !info.examples.is_empty() {
                println!("\nExamples:");
                for example in &info.examples {
                    println!("- {example}");
                }
            }
            if !info.synonyms.is_empty() {
                println!("\nSynonyms: {}", info.synonyms.join(", "));
            }
            if !info.translations.is_empty() {
                println!("\nTranslations:");
                for translation in &info.translations {
                    println!(
                        "- {}: {}",
                        translation.language_name.as_deref().unwrap_or("?"),
                        translation.word.as_deref().unwrap_or_default()
                    );
                }
            }
        }
        None => println!("\nNo dictionary information found."),
    }

    if !view.notes.is_empty() {
        println!();
        print_notes_table("Notes", &view.notes);
    }
}

fn print_notes_table(title: &str, notes: &[Note]) {
    if notes.is_empty() {
        println!("{title}: none.");
        return;
    }
    let width = notes
        .iter()
        .map(|note| note.id.to_string().len())
        .max()
        .unwrap_or(2)
        .max(2);
    println!("{title}:");
    println!("{:<width$}  {:<3}  {:<26}  {}", "ID", "!", "CREATED", "TEXT", width = width);
    println!("{:-<width$}  {:-<3}  {:-<26}  {}", "", "", "", "----", width = width);
    for note in notes {
        let marker = if note.important { "*" } else { "" };
        println!(
            "{:<width$}  {:<3}  {:<26}  {}",
            note.id,
            marker,
            note.created_at,
            note.text,
            width = width
        );
    }
}

fn print_word_list(title: &str, words: &[String]) {
    if words.is_empty() {
        println!("{title}: none.");
        return;
    }
    println!("{title}:");
    for word in words {
        println!("- {word}");
    }
}

fn print_search_results(results: Option<&SearchResults>) {
    let Some(results) = results else {
        println!("No search performed: the query was blank.");
        return;
    };
    if results.is_empty() {
        println!("No matches for \"{}\".", results.query);
        return;
    }
    if !results.words.is_empty() {
        print_word_list("Words", &results.words);
    }
    if !results.general_notes.is_empty() {
        print_notes_table("General notes", &results.general_notes);
    }
    if !results.word_notes.is_empty() {
        println!("Word notes:");
        for hit in &results.word_notes {
            println!("- {}: {}", hit.word, hit.note.text);
        }
    }
    if !results.tags.is_empty() {
        println!("Tags:");
        for hit in &results.tags {
            println!("- {} on {}", hit.tag, hit.word);
        }
    }
}

fn print_words_table(page: &WordsPage) {
    if page.words.is_empty() {
        match &page.selected_tag {
            Some(tag) => println!("No words tagged \"{tag}\"."),
            None => println!("No words yet."),
        }
        return;
    }
    let width = page
        .words
        .iter()
        .map(|listing| listing.word.chars().count())
        .max()
        .unwrap_or(4);
    let width = cmp::max(width, 4);
    println!("{:<width$}  {:<4}  {:<5}  {}", "WORD", "LANG", "FLAGS", "DEFINITION", width = width);
    println!("{:-<width$}  {:-<4}  {:-<5}  {}", "", "", "", "----------", width = width);
    for listing in &page.words {
        let flags = format!(
            "{}{}",
            if listing.is_favorite { "F" } else { "" },
            if listing.is_pinned { "P" } else { "" }
        );
        println!(
            "{:<width$}  {:<4}  {:<5}  {}",
            listing.word,
            listing.language_code,
            flags,
            listing.short_definition.as_deref().unwrap_or("-"),
            width = width
        );
    }
    if !page.tags.is_empty() {
        println!("\nTags: {}", page.tags.join(", "));
    }
}

fn print_daily(heading: &str, pick: Option<&DailyWord>) {
    let Some(pick) = pick else {
        return;
    };
    println!("{heading}: {} ({})", pick.word, pick.language_label);
    match &pick.short_definition {
        Some(definition) => println!("  {definition}"),
        None => println!("  No definition available right now."),
    }
}
