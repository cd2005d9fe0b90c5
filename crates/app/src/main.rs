use std::fmt;

use course_core::model::{
    Chapter, ChapterId, ContentKind, ExamDraft, Module, ModuleId, QuestionDraft, QuestionKind,
    StudentId, Subject, SubjectId,
};
use course_core::sequencer::ChapterState;
use services::config::DEFAULT_LOG_LEVEL;
use services::{AppConfig, AppServices, AuthoringMode, Clock, ExamAuthoringError};
use storage::repository::{CourseRepository, Storage};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
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

fn parse_id(args: &mut impl Iterator<Item = String>, flag: &'static str) -> Result<u64, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .trim()
        .parse()
        .map_err(|_| ArgsError::InvalidId { flag, raw: value })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- migrate  [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- seed     [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- outline  --subject <id> --student <id> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- progress --student <id> [--subject <id>]... [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Environment (a .env file is read when present):");
    eprintln!("  COURSE_DB_URL         default sqlite://course.sqlite3");
    eprintln!("  COURSE_PASSING_SCORE  required, 0-100");
    eprintln!("  COURSE_MAX_ATTEMPTS   optional retake limit");
    eprintln!("  RUST_LOG              default {DEFAULT_LOG_LEVEL}");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Migrate,
    Seed,
    Outline,
    Progress,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "migrate" => Some(Self::Migrate),
            "seed" => Some(Self::Seed),
            "outline" => Some(Self::Outline),
            "progress" => Some(Self::Progress),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: Option<String>,
    student: Option<StudentId>,
    subjects: Vec<SubjectId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = Some(normalize_sqlite_url(value));
                }
                "--student" => {
                    parsed.student = Some(StudentId::new(parse_id(args, "--student")?));
                }
                "--subject" => {
                    parsed.subjects.push(SubjectId::new(parse_id(args, "--subject")?));
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

    fn require_student(&self) -> Result<StudentId, ArgsError> {
        self.student.ok_or(ArgsError::MissingFlag { flag: "--student" })
    }

    fn require_subject(&self) -> Result<SubjectId, ArgsError> {
        self.subjects
            .first()
            .copied()
            .ok_or(ArgsError::MissingFlag { flag: "--subject" })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
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
    if db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:") {
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

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn seed(app: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let courses = &app.storage().courses;
    let subject_id = SubjectId::new(1);
    courses
        .upsert_subject(&Subject::new(subject_id, "Introduction to Rust")?)
        .await?;

    let modules = [
        (1, "Getting started", ["Installing the toolchain", "Hello, Cargo"]),
        (2, "Ownership", ["Moves and copies", "Borrowing"]),
    ];
    for (m, title, chapters) in modules {
        let module_id = ModuleId::new(m);
        courses
            .upsert_module(&Module {
                id: module_id,
                subject_id,
                title: title.to_owned(),
                position: u32::try_from(m)?,
                published: true,
            })
            .await?;
        for (position, chapter_title) in (1_u32..).zip(chapters) {
            courses
                .upsert_chapter(&Chapter {
                    id: ChapterId::new(m * 100 + u64::from(position)),
                    module_id,
                    title: chapter_title.to_owned(),
                    position,
                    content: if position == 1 {
                        ContentKind::Video
                    } else {
                        ContentKind::Content
                    },
                    published: true,
                })
                .await?;
        }
    }

    let mut draft = ExamDraft::new("Getting started check");
    let mut cargo = QuestionDraft::new(QuestionKind::MultipleChoice);
    cargo.set_text("Which command creates a new package?");
    for (i, option) in ["cargo new", "cargo run", "rustc", "rustup"].into_iter().enumerate() {
        cargo.set_option_text(i, option);
    }
    cargo.mark_correct(0);
    draft.push_question(cargo);
    let mut edition = QuestionDraft::new(QuestionKind::TrueFalse);
    edition.set_text("Cargo.toml declares the crate edition.");
    edition.mark_correct(0);
    draft.push_question(edition);

    let mode = AuthoringMode::Create {
        module_id: ModuleId::new(1),
    };
    match app.authoring().save(mode, &draft).await {
        Ok(exam) => println!("seeded exam {} for module 1", exam.id()),
        Err(ExamAuthoringError::DuplicateExam { .. }) => println!("module 1 already has an exam"),
        Err(e) => return Err(e.into()),
    }
    println!("seeded subject {subject_id}");
    Ok(())
}

async fn outline(app: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let subject_id = args.require_subject()?;
    let student_id = args.require_student()?;
    let player = app.player(student_id, subject_id).await?;

    for module in player.sequence().outline().modules() {
        let marker = if player.exam_available(module.module.id) {
            " [exam available]"
        } else {
            ""
        };
        println!("{} {}{marker}", module.module.id, module.module.title);
        for chapter in &module.chapters {
            let state = match player.state_of(chapter.id) {
                ChapterState::Completed => "x",
                ChapterState::Current => ">",
                ChapterState::Available => " ",
                ChapterState::Locked => "-",
            };
            println!(
                "  [{state}] {} {} ({})",
                chapter.id,
                chapter.title,
                chapter.content.as_str()
            );
        }
    }
    Ok(())
}

async fn progress(app: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let student_id = args.require_student()?;
    let subjects = if args.subjects.is_empty() {
        app.storage()
            .courses
            .list_subjects()
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect()
    } else {
        args.subjects.clone()
    };

    let all = app
        .progress()
        .get_multiple_subjects_progress(student_id, &subjects)
        .await;
    for subject_id in &subjects {
        match all.get(subject_id) {
            Some(p) => println!(
                "subject {subject_id}: {}% ({}/{} chapters)",
                p.percentage(),
                p.completed_chapters(),
                p.total_chapters()
            ),
            None => println!("subject {subject_id}: unavailable"),
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = AppConfig::from_env()?;
    init_tracing(&config.rust_log);
    if let Some(db_url) = args.db_url.clone() {
        config.database_url = db_url;
    }
    config.database_url = normalize_sqlite_url(config.database_url);

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&config.database_url)?;
    tracing::info!(db = %config.database_url, ?cmd, "starting");

    if cmd == Command::Migrate {
        Storage::sqlite(&config.database_url).await?;
        println!("migrations applied to {}", config.database_url);
        return Ok(());
    }

    let app = AppServices::new_sqlite(&config, Clock::system()).await?;
    match cmd {
        Command::Migrate => Ok(()),
        Command::Seed => seed(&app).await,
        Command::Outline => outline(&app, &args).await,
        Command::Progress => progress(&app, &args).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(items: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = items.iter().map(|s| (*s).to_owned());
        Args::parse(&mut iter)
    }

    #[test]
    fn parses_repeated_subjects_and_student() {
        let args = parse(&["--student", "7", "--subject", "1", "--subject", "3"]).unwrap();
        assert_eq!(args.student, Some(StudentId::new(7)));
        assert_eq!(args.subjects, vec![SubjectId::new(1), SubjectId::new(3)]);
        assert!(args.db_url.is_none());
    }

    #[test]
    fn outline_and_progress_require_a_student() {
        let args = parse(&["--subject", "1"]).unwrap();
        assert_eq!(args.require_subject().unwrap(), SubjectId::new(1));
        assert!(matches!(
            args.require_student().unwrap_err(),
            ArgsError::MissingFlag { flag: "--student" }
        ));

        let args = parse(&["--student", "4"]).unwrap();
        assert_eq!(args.require_student().unwrap(), StudentId::new(4));
        assert!(matches!(
            args.require_subject().unwrap_err(),
            ArgsError::MissingFlag { flag: "--subject" }
        ));
    }

    #[test]
    fn rejects_bad_ids_and_unknown_flags() {
        assert!(matches!(
            parse(&["--student", "x"]).unwrap_err(),
            ArgsError::InvalidId { flag: "--student", .. }
        ));
        assert!(matches!(
            parse(&["--subject"]).unwrap_err(),
            ArgsError::MissingValue { flag: "--subject" }
        ));
        assert!(matches!(
            parse(&["--verbose"]).unwrap_err(),
            ArgsError::UnknownArg(_)
        ));
    }

    #[test]
    fn sqlite_urls_are_normalized() {
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/course.db".into()),
            "sqlite:///tmp/course.db"
        );
        assert_eq!(
            normalize_sqlite_url("/tmp/course.db".into()),
            "sqlite:///tmp/course.db"
        );
    }
}
