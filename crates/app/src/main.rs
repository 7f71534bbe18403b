use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use services::{AppServices, Clock, ExportService, HttpSyncTarget, SyncTarget, SyncTargetConfig};
use study_core::catalog::{Lesson, Question, StaticCatalog};
use study_core::model::{Difficulty, LessonId, QuestionId, SlideId, Topic, UserId};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    MissingFlag { flag: &'static str },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required for this command"),
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

fn parse_number<T: std::str::FromStr>(
    flag: &'static str,
    raw: String,
) -> Result<T, ArgsError> {
    raw.parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- show     [--db <sqlite_url>] [--user-id <id>]");
    eprintln!("  cargo run -p app -- answer   --question <id> [--wrong] [--seconds <n>]");
    eprintln!("  cargo run -p app -- lesson   --lesson <id> --slide <id> [--seconds <n>]");
    eprintln!("  cargo run -p app -- rename   --name <name>");
    eprintln!("  cargo run -p app -- results");
    eprintln!("  cargo run -p app -- adaptive [--accuracy <pct>] [--mastered <topics>]");
    eprintln!("  cargo run -p app -- sync     [--timeout-secs <n>]");
    eprintln!("  cargo run -p app -- export");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:study.sqlite3");
    eprintln!("  --user-id 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL, STUDY_USER_ID, STUDY_SYNC_URL, STUDY_SYNC_TOKEN, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Show,
    Answer,
    Lesson,
    Rename,
    Results,
    Adaptive,
    Sync,
    Export,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "show" => Some(Self::Show),
            "answer" => Some(Self::Answer),
            "lesson" => Some(Self::Lesson),
            "rename" => Some(Self::Rename),
            "results" => Some(Self::Results),
            "adaptive" => Some(Self::Adaptive),
            "sync" => Some(Self::Sync),
            "export" => Some(Self::Export),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user_id: UserId,
    question: Option<QuestionId>,
    wrong: bool,
    seconds: i64,
    lesson: Option<LessonId>,
    slide: Option<SlideId>,
    name: Option<String>,
    accuracy: Option<f64>,
    mastered: HashSet<Topic>,
    timeout_secs: u64,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let db_url = std::env::var("STUDY_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://study.sqlite3".into(), normalize_sqlite_url);
        let user_id = std::env::var("STUDY_USER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| UserId::new(1), UserId::new);

        let mut parsed = Self {
            db_url,
            user_id,
            question: None,
            wrong: false,
            seconds: 0,
            lesson: None,
            slide: None,
            name: None,
            accuracy: None,
            mastered: HashSet::new(),
            timeout_secs: 30,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--user-id" => {
                    let value = require_value(args, "--user-id")?;
                    parsed.user_id = UserId::new(parse_number("--user-id", value)?);
                }
                "--question" => {
                    let value = require_value(args, "--question")?;
                    parsed.question = Some(QuestionId::new(parse_number("--question", value)?));
                }
                "--wrong" => parsed.wrong = true,
                "--seconds" => {
                    let value = require_value(args, "--seconds")?;
                    parsed.seconds = parse_number("--seconds", value)?;
                }
                "--lesson" => {
                    let value = require_value(args, "--lesson")?;
                    parsed.lesson = Some(LessonId::new(parse_number("--lesson", value)?));
                }
                "--slide" => {
                    let value = require_value(args, "--slide")?;
                    parsed.slide = Some(SlideId::new(parse_number("--slide", value)?));
                }
                "--name" => parsed.name = Some(require_value(args, "--name")?),
                "--accuracy" => {
                    let value = require_value(args, "--accuracy")?;
                    parsed.accuracy = Some(parse_number("--accuracy", value)?);
                }
                "--mastered" => {
                    let value = require_value(args, "--mastered")?;
                    for raw in value.split(',') {
                        if let Ok(topic) = Topic::new(raw) {
                            parsed.mastered.insert(topic);
                        }
                    }
                }
                "--timeout-secs" => {
                    let value = require_value(args, "--timeout-secs")?;
                    parsed.timeout_secs = parse_number("--timeout-secs", value)?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
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

/// Built-in demo content so every subcommand is exercisable out of the box.
/// A real deployment supplies its own catalog.
fn demo_catalog() -> StaticCatalog {
    let question = |id: u64, topic: &str, difficulty: Difficulty, prompt: &str| Question {
        id: QuestionId::new(id),
        topic: Topic::new(topic).expect("demo topics are non-empty"),
        difficulty,
        prompt: prompt.to_string(),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct_option: 0,
    };

    StaticCatalog::new(
        vec![
            question(1, "Energy", Difficulty::Beginner, "What do plants need to make food?"),
            question(2, "Energy", Difficulty::Intermediate, "Which energy is stored in a stretched spring?"),
            question(3, "Energy", Difficulty::Advanced, "What does a kilowatt-hour measure?"),
            question(4, "Forces", Difficulty::Beginner, "What pulls objects toward the ground?"),
            question(5, "Forces", Difficulty::Intermediate, "Which force slows a rolling ball?"),
            question(6, "Forces", Difficulty::Advanced, "What is the net force on a body at rest?"),
            question(7, "Waves", Difficulty::Beginner, "What carries sound to your ears?"),
            question(8, "Waves", Difficulty::Advanced, "What property sets a wave's pitch?"),
        ],
        vec![
            Lesson {
                id: LessonId::new(1),
                title: "Introduction to Energy".into(),
                slides: vec![SlideId::new(1), SlideId::new(2), SlideId::new(3)],
            },
            Lesson {
                id: LessonId::new(2),
                title: "Forces Around Us".into(),
                slides: vec![SlideId::new(4), SlideId::new(5)],
            },
        ],
    )
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    argv.remove(0);

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;

    let catalog = Arc::new(demo_catalog());
    let target: Option<Arc<dyn SyncTarget>> = SyncTargetConfig::from_env()
        .map(|config| Arc::new(HttpSyncTarget::new(config)) as Arc<dyn SyncTarget>);

    let app = AppServices::new_sqlite(
        &args.db_url,
        Clock::default_clock(),
        args.user_id,
        catalog.clone(),
        catalog,
        target,
    )
    .await?;

    match cmd {
        Command::Show => show(&app).await?,
        Command::Answer => {
            let question = args
                .question
                .ok_or(ArgsError::MissingFlag { flag: "--question" })?;
            let outcome = app
                .learning()
                .submit_answer(question, !args.wrong, args.seconds)
                .await?;
            println!(
                "recorded: {}/{} correct",
                outcome.progress.correct_answers(),
                outcome.progress.total_questions()
            );
            for badge in &outcome.new_badges {
                println!("badge earned: {} ({})", badge.title(), badge.id());
            }
            if let Some(result) = outcome.quiz_result {
                println!(
                    "session complete: {}% accuracy over {} questions",
                    result.accuracy(),
                    result.total_questions()
                );
            }
        }
        Command::Lesson => {
            let lesson = args
                .lesson
                .ok_or(ArgsError::MissingFlag { flag: "--lesson" })?;
            let slide = args
                .slide
                .ok_or(ArgsError::MissingFlag { flag: "--slide" })?;
            let outcome = app
                .learning()
                .complete_lesson_slide(lesson, slide, args.seconds)
                .await?;
            println!(
                "lessons completed: {}/{}",
                outcome.progress.completed_lessons_count(),
                outcome.progress.total_lessons_count()
            );
            for badge in &outcome.new_badges {
                println!("badge earned: {} ({})", badge.title(), badge.id());
            }
        }
        Command::Rename => {
            let name = args.name.ok_or(ArgsError::MissingFlag { flag: "--name" })?;
            let outcome = app.learning().rename_user(&name).await?;
            println!("renamed to {}", outcome.progress.display_name());
        }
        Command::Results => {
            let results = app.learning().get_quiz_results().await?;
            if results.is_empty() {
                println!("no quiz sessions recorded yet");
            }
            for result in results {
                println!(
                    "{}  {:>3}%  {:>2} questions  {} min",
                    result.completed_at().format("%Y-%m-%d %H:%M"),
                    result.accuracy(),
                    result.total_questions(),
                    result.total_time_minutes()
                );
            }
        }
        Command::Adaptive => {
            let accuracy = match args.accuracy {
                Some(accuracy) => accuracy,
                None => app.learning().get_progress().await?.accuracy(),
            };
            let pool = app.learning().get_adaptive_questions(accuracy, &args.mastered);
            println!(
                "{} questions at {:?} (accuracy {accuracy:.0})",
                pool.len(),
                Difficulty::for_accuracy(accuracy)
            );
            for question in pool {
                println!("  [{}] {} ({})", question.id, question.prompt, question.topic);
            }
        }
        Command::Sync => {
            let outcome = app
                .sync()
                .reconcile(Duration::from_secs(args.timeout_secs))
                .await?;
            println!("{outcome:?}");
        }
        Command::Export => {
            let export = app.exporter().export().await?;
            println!("{}", ExportService::to_json(&export)?);
        }
    }

    Ok(())
}

async fn show(app: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let progress = app.learning().get_progress().await?;
    println!("name:              {}", progress.display_name());
    println!(
        "answers:           {}/{} correct ({:.0}%)",
        progress.correct_answers(),
        progress.total_questions(),
        progress.accuracy()
    );
    println!(
        "lessons:           {}/{}",
        progress.completed_lessons_count(),
        progress.total_lessons_count()
    );
    println!("streak:            {} days", progress.streak_days());
    println!("time spent:        {} min", progress.time_spent_minutes());
    for badge in progress.badges() {
        println!("badge:             {} ({})", badge.title(), badge.id());
    }

    let status = app.sync().status().await?;
    println!("sync state:        {:?}", app.sync().state());
    println!("pending changes:   {}", status.pending_change_count());
    match status.last_sync_timestamp() {
        Some(at) => println!("last sync:         {}", at.format("%Y-%m-%d %H:%M")),
        None => println!("last sync:         never"),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
