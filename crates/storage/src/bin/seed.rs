use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use storage::repository::{QuestionCatalog, QuestionRecord, QuestionSource};
use storage::sqlite::SqliteRepository;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    file: PathBuf,
    replace: bool,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFile,
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFile => write!(f, "--file is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite://quiz.sqlite3?mode=rwc".into());
        let mut file = std::env::var("QUIZ_BANK_FILE").ok().map(PathBuf::from);
        let mut replace = true;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--file" => {
                    file = Some(PathBuf::from(require_value(&mut args, "--file")?));
                }
                "--upsert" => replace = false,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            file: file.ok_or(ArgsError::MissingFile)?,
            replace,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- --file <bank.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://quiz.sqlite3?mode=rwc)");
    eprintln!("  --file <path>             Question bank JSON (array or {{\"questionBank\": [...]}})");
    eprintln!("  --upsert                  Merge into the existing bank instead of replacing it");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_BANK_FILE");
}

/// Bank files come either as a bare array or wrapped in a `questionBank` key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BankFile {
    Wrapped {
        #[serde(rename = "questionBank")]
        question_bank: Vec<QuestionRecord>,
    },
    Bare(Vec<QuestionRecord>),
}

impl BankFile {
    fn into_records(self) -> Vec<QuestionRecord> {
        match self {
            BankFile::Wrapped { question_bank } => question_bank,
            BankFile::Bare(records) => records,
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let raw = std::fs::read_to_string(&args.file)?;
    let file: BankFile = serde_json::from_str(&raw)?;
    let records = file.into_records();
    let read = records.len();
    let questions = QuestionRecord::decode_all(records);

    let repo = SqliteRepository::connect(&args.db_url).await?;
    repo.migrate().await?;

    if args.replace {
        repo.replace_all(&questions).await?;
    } else {
        for question in &questions {
            repo.upsert_question(question).await?;
        }
    }

    let total = repo.fetch_all().await?.len();
    println!(
        "Imported {} of {} questions from {} into {} ({} in bank)",
        questions.len(),
        read,
        args.file.display(),
        args.db_url,
        total
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
