use std::fmt;
use std::sync::Arc;

use quiz_core::model::{AnswerEntry, QuestionKind, QuizResult, QuizSettings, UserId};
use quiz_core::time::Countdown;
use services::{
    Clock, QuizActor, QuizEngine, QuizEvent, QuizHandle, RemoteQuizApi, SessionError,
    decode_push_message,
};
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod input;

use input::{HELP, Input};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn env_number<T: std::str::FromStr>(
    var: &'static str,
    flag: &'static str,
) -> Result<Option<T>, ArgsError> {
    std::env::var(var)
        .ok()
        .map(|raw| parse_number(flag, raw))
        .transpose()
}

struct Args {
    db_url: String,
    user: UserId,
    remote_url: Option<String>,
    exam_size: Option<usize>,
    exam_seconds: Option<u32>,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] [--user <id>] [--remote <api_url>]");
    eprintln!("                      [--exam-size <n>] [--exam-seconds <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://quiz.sqlite3");
    eprintln!("  --user 1");
    eprintln!();
    eprintln!("With --remote, questions and progress come from the REST API;");
    eprintln!("the practice position is still kept in the local database.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_USER_ID, QUIZ_REMOTE_URL, QUIZ_EXAM_SIZE, QUIZ_EXAM_SECONDS, RUST_LOG");
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://quiz.sqlite3".into(), normalize_sqlite_url);
        let mut user = match std::env::var("QUIZ_USER_ID") {
            Ok(raw) => parse_user(raw)?,
            Err(_) => UserId::new(1),
        };
        let mut remote_url = std::env::var("QUIZ_REMOTE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let mut exam_size = env_number("QUIZ_EXAM_SIZE", "--exam-size")?;
        let mut exam_seconds = env_number("QUIZ_EXAM_SECONDS", "--exam-seconds")?;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => user = parse_user(require_value(args, "--user")?)?,
                "--remote" => remote_url = Some(require_value(args, "--remote")?),
                "--exam-size" => {
                    exam_size = Some(parse_number(
                        "--exam-size",
                        require_value(args, "--exam-size")?,
                    )?);
                }
                "--exam-seconds" => {
                    exam_seconds = Some(parse_number(
                        "--exam-seconds",
                        require_value(args, "--exam-seconds")?,
                    )?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user,
            remote_url,
            exam_size,
            exam_seconds,
        })
    }

    fn settings(&self) -> Result<QuizSettings, quiz_core::model::SettingsError> {
        let defaults = QuizSettings::default();
        QuizSettings::new(
            self.exam_size.unwrap_or(defaults.exam_size()),
            self.exam_seconds.unwrap_or(defaults.exam_duration_secs()),
            defaults.resume_debounce_ms(),
        )
    }
}

fn parse_user(raw: String) -> Result<UserId, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .map(UserId::new)
        .map_err(|_| ArgsError::InvalidUserId { raw })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    // stderr keeps the prompt on stdout readable.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_storage(
    args: &Args,
) -> Result<(Storage, Option<RemoteQuizApi>), Box<dyn std::error::Error>> {
    prepare_sqlite_file(&args.db_url)?;
    let local = Storage::sqlite(&args.db_url).await?;
    let Some(base_url) = &args.remote_url else {
        return Ok((local, None));
    };

    tracing::info!(remote = %base_url, "using remote question bank and progress");
    let api = RemoteQuizApi::new(base_url.clone());
    let storage = Storage {
        questions: Arc::new(api.clone()),
        progress: Arc::new(api.clone()),
        resume: local.resume,
    };
    Ok((storage, Some(api)))
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn print_result(result: &QuizResult) {
    println!(
        "{} finished: {}% ({}/{} correct, {} unanswered)",
        result.mode(),
        result.score(),
        result.correct(),
        result.total(),
        result.unanswered().len()
    );
    if !result.incorrect().is_empty() {
        let ids: Vec<String> = result.incorrect().iter().map(ToString::to_string).collect();
        println!("wrong: {}", ids.join(", "));
    }
}

async fn show(handle: &QuizHandle) -> Result<(), SessionError> {
    let snapshot = handle.snapshot().await?;
    let (Some(view), Some(question)) = (snapshot.view, snapshot.question) else {
        println!("no active quiz (type `help`)");
        return Ok(());
    };

    let timer = view
        .remaining_seconds
        .map(|secs| format!("  [{}]", Countdown::new(secs)))
        .unwrap_or_default();
    println!();
    println!(
        "{} {}/{}  answered {}{timer}",
        view.mode,
        view.current_index + 1,
        view.total,
        view.graded
    );
    let kind = match question.kind() {
        QuestionKind::Single => "",
        QuestionKind::Multiple => " (multiple)",
    };
    println!("[{}] {}{kind}", question.category(), question.text());

    let entry = snapshot.entry.unwrap_or_default();
    for option in question.options() {
        let mark = if entry.is_selected(option.id) { '*' } else { ' ' };
        println!(" {mark} {}. {}", option.id, option.text);
    }

    if entry.is_final() {
        let letters: Vec<String> = question
            .correct_answer()
            .sorted()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("answer: {}", letters.join(","));
        if !question.explanation().is_empty() {
            println!("{}", question.explanation());
        }
    } else if let AnswerEntry::Multiple { .. } = entry {
        println!("(`c` to confirm)");
    }

    if let Some(result) = snapshot.result {
        print_result(&result);
    }
    Ok(())
}

async fn print_stats(handle: &QuizHandle) -> Result<(), SessionError> {
    let stats = handle.snapshot().await?.stats;
    println!(
        "bank {} | answered {} | wrong {} | accuracy {:.1}%",
        stats.total_questions, stats.total_answered, stats.total_wrong, stats.accuracy
    );
    for (category, cat) in &stats.categories {
        println!(
            "  {category}: {}/{} done ({}%), accuracy {}%",
            cat.answered,
            cat.total,
            cat.progress_percent(),
            cat.accuracy_percent()
        );
    }
    Ok(())
}

async fn print_events(mut events: UnboundedReceiver<QuizEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            QuizEvent::Tick { remaining, .. } if remaining % 600 == 0 || remaining <= 10 => {
                println!("time left: {}", Countdown::new(remaining));
            }
            QuizEvent::Submitted { result, .. } => print_result(&result),
            QuizEvent::NoMistakes => println!("no mistakes to review"),
            QuizEvent::BankUpdated(change) => println!("bank updated: {change:?}"),
            _ => {}
        }
    }
}

//
// ─── LOOP ──────────────────────────────────────────────────────────────────────
//

struct Remote<'a> {
    api: &'a RemoteQuizApi,
    user: UserId,
}

async fn report(
    handle: &QuizHandle,
    remote: Option<&Remote<'_>>,
    text: &str,
) -> Result<(), SessionError> {
    let Some(remote) = remote else {
        println!("error reports need --remote");
        return Ok(());
    };
    let question = handle
        .snapshot()
        .await?
        .question
        .ok_or(SessionError::NotActive)?;
    match remote.api.report_error(remote.user, &question, None, text).await {
        Ok(()) => println!("reported question {}", question.id()),
        Err(e) => println!("report failed: {e}"),
    }
    Ok(())
}

/// Returns `false` when the user asked to quit.
async fn dispatch(
    handle: &QuizHandle,
    remote: Option<&Remote<'_>>,
    input: Input,
) -> Result<bool, SessionError> {
    match input {
        Input::Start(mode) => match handle.start(mode).await {
            Ok(_) => show(handle).await?,
            // Reported by the event printer.
            Err(SessionError::NoMistakes) => {}
            Err(e) => return Err(e),
        },
        Input::DrawAgain => {
            handle.draw_again().await?;
            show(handle).await?;
        }
        Input::Answer(letters) => {
            let snapshot = handle.snapshot().await?;
            let Some(question) = snapshot.question else {
                return Err(SessionError::NotActive);
            };
            match question.kind() {
                QuestionKind::Single => {
                    handle.select_single(question.id(), letters[0]).await?;
                }
                QuestionKind::Multiple => {
                    let current = snapshot.entry.unwrap_or_default();
                    for option in question.options().iter().map(|o| o.id) {
                        if current.is_selected(option) != letters.contains(&option) {
                            handle.toggle_multiple(question.id(), option).await?;
                        }
                    }
                    handle.confirm_multiple(question.id()).await?;
                }
            }
            show(handle).await?;
        }
        Input::Toggle(option) => {
            let question = handle
                .snapshot()
                .await?
                .question
                .ok_or(SessionError::NotActive)?;
            handle.toggle_multiple(question.id(), option).await?;
            show(handle).await?;
        }
        Input::Confirm => {
            let question = handle
                .snapshot()
                .await?
                .question
                .ok_or(SessionError::NotActive)?;
            handle.confirm_multiple(question.id()).await?;
            show(handle).await?;
        }
        Input::Next => {
            handle.next().await?;
            show(handle).await?;
        }
        Input::Prev => {
            handle.prev().await?;
            show(handle).await?;
        }
        Input::GoTo(index) => {
            handle.go_to(index).await?;
            show(handle).await?;
        }
        Input::Show => show(handle).await?,
        Input::Submit => {
            handle.submit().await?;
        }
        Input::Exit => {
            if handle.exit().await?.is_some() {
                println!("left the quiz");
            }
        }
        Input::Stats => print_stats(handle).await?,
        Input::Reload => {
            let count = handle.reload().await?;
            println!("{count} questions loaded");
        }
        Input::Push(raw) => match decode_push_message(&raw) {
            Some(event) => {
                handle.bank_event(event).await?;
            }
            None => println!("ignored push message"),
        },
        Input::Report(text) => report(handle, remote, &text).await?,
        Input::Help => println!("{HELP}"),
        Input::Quit => return Ok(false),
    }
    Ok(true)
}

async fn repl(
    handle: &QuizHandle,
    remote: Option<&Remote<'_>>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = match Input::parse(&line) {
            Ok(input) => input,
            Err(input::InputError::Empty) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match dispatch(handle, remote, input).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(SessionError::ActorClosed) => return Err(SessionError::ActorClosed.into()),
            Err(e) if e.is_guard() => println!("{e}"),
            Err(e) => println!("error: {e}"),
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();

    let settings = args.settings()?;
    let (storage, api) = open_storage(&args).await?;
    let engine = QuizEngine::new(args.user, settings, Clock::system(), storage);
    let (handle, events, actor) = QuizActor::spawn(engine);
    let printer = tokio::spawn(print_events(events));

    let count = handle.reload().await?;
    tracing::info!(user.id = %args.user, questions = count, "quiz ready");

    let remote = api.as_ref().map(|api| Remote {
        api,
        user: args.user,
    });
    let outcome = repl(&handle, remote.as_ref()).await;
    handle.shutdown().await?;
    actor.await?;
    printer.await?;
    outcome
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
