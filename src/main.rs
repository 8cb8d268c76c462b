use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use ignore::WalkBuilder;
use spellscan::cli::output::{self, OutputFormat};
use spellscan::classifier::registry::Resolution;
use spellscan::config::Overrides;
use spellscan::{checker, dict, CheckResult, Config};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spellscan")]
#[command(
    version,
    about = "Spell checks the comments, strings and prose of source and markup files",
    long_about = None
)]
struct Cli {
    /// Files or directories to check
    #[arg(value_name = "PATHS")]
    paths: Vec<PathBuf>,

    /// Fix findings in place (top suggestion, doubled words removed)
    #[arg(short, long)]
    fix: bool,

    /// Interactive mode for selecting corrections
    #[arg(short, long, requires = "fix")]
    interactive: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Exit with code 0 even if errors are found
    #[arg(long)]
    no_fail: bool,

    /// Language to check against; repeat for several (e.g. -l en_US -l de_DE)
    #[arg(short, long = "language")]
    languages: Vec<String>,

    /// Extra folder to search for hunspell dictionaries
    #[arg(long = "dictionary-folder", value_name = "DIR")]
    dictionary_folders: Vec<PathBuf>,

    /// Personal dictionary file
    #[arg(long)]
    personal_dict: Option<PathBuf>,

    /// Words matching this regex are never reported
    #[arg(long)]
    ignore_pattern: Vec<String>,

    /// Word that is never reported
    #[arg(long)]
    ignore_word: Vec<String>,

    /// Configuration file used instead of ./.spellscan.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report words whose case differs from the dictionary entry
    #[arg(long)]
    case_sensitive: bool,

    /// Do not report doubled words
    #[arg(long)]
    no_doubled_words: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, default_value = "text")]
    format: OutputFormat,

    /// Generate shell completion script
    #[arg(long, value_name = "SHELL")]
    completion: Option<Shell>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Print the classified spans of a file
    Classify {
        file: PathBuf,
    },
    /// Dictionary management
    Dict {
        #[command(subcommand)]
        action: DictCommands,
    },
}

#[derive(Parser, Debug)]
enum DictCommands {
    /// List installed dictionaries
    List,
    /// Download a dictionary
    Download {
        /// Language code (e.g., en_US, en_GB, fr_FR)
        language: String,
    },
    /// Update all downloaded dictionaries
    Update,
    /// Show dictionary info
    Info {
        /// Language code
        language: String,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config.clone(),
            languages: self.languages.clone(),
            dictionary_folders: self.dictionary_folders.clone(),
            personal_dictionary: self.personal_dict.clone(),
            ignore_patterns: self.ignore_pattern.clone(),
            ignored_words: self.ignore_word.clone(),
            case_sensitive: self.case_sensitive,
            no_doubled_words: self.no_doubled_words,
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("SPELLSCAN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle shell completion generation
    if let Some(shell) = cli.completion {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "spellscan", &mut io::stdout());
        return Ok(());
    }

    init_logging(cli.verbose);
    let colored = !cli.no_color;
    let config = Config::load(&cli.overrides())?;

    if let Some(command) = &cli.command {
        return handle_command(command, &config, colored, &cli.format);
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No files specified. Use --help for usage information.");
    }

    let checker = checker::SpellChecker::new(&config)?;
    let files = collect_files(&cli.paths, &checker);
    debug!(count = files.len(), "files to check");

    let mut total_errors = 0;
    let mut total_fixed = 0;
    let mut failed = false;

    if cli.fix {
        for file_path in &files {
            let result = if cli.interactive {
                checker.fix_interactive(file_path, colored)
            } else {
                checker.fix_auto(file_path)
            };
            match result {
                Ok(result) => {
                    output::print_errors(file_path, &result, colored);
                    total_errors += result.error_count;
                    total_fixed += result.fixed_count;
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    failed = true;
                }
            }
        }
        output::print_fix_summary(total_fixed, total_errors, files.len(), colored);
    } else {
        let results = checker.check_files(&files);
        let mut checked: Vec<(&Path, &CheckResult)> = Vec::with_capacity(results.len());
        for (file_path, result) in &results {
            match result {
                Ok(result) => {
                    total_errors += result.error_count;
                    checked.push((file_path.as_path(), result));
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    failed = true;
                }
            }
        }

        match cli.format {
            OutputFormat::Json => output::print_json_report(&checked),
            OutputFormat::Text => {
                for (file_path, result) in &checked {
                    output::print_errors(file_path, result, colored);
                }
                output::print_check_summary(total_errors, checked.len(), colored);
            }
        }
    }

    if failed || (total_errors > 0 && !cli.no_fail && !cli.fix) {
        std::process::exit(1);
    }

    Ok(())
}

/// Explicit files are always checked. Directories are walked honouring
/// ignore files, and only files whose extension maps to a classifier are
/// picked up from them.
fn collect_files(paths: &[PathBuf], checker: &checker::SpellChecker) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            eprintln!("Error: File not found: {}", path.display());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkBuilder::new(path)
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| entry.into_path())
            .filter(|file| {
                let extension = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
                matches!(checker.registry().resolve(extension), Resolution::Mapped(_))
            })
            .collect();
        found.sort();
        files.extend(found);
    }
    files
}

fn handle_command(
    command: &Commands,
    config: &Config,
    colored: bool,
    format: &OutputFormat,
) -> Result<()> {
    let mut folders = config.dictionary_folders.clone();
    folders.extend(dict::manager::default_folders());

    match command {
        Commands::Classify { file } => {
            let content = fs::read_to_string(file)
                .with_context(|| format!("Failed to read file: {}", file.display()))?;
            let registry = config.build_registry()?;
            let classification = registry.classify_path(file, &content);
            output::print_classification(file, &content, &classification, colored, format);
        }
        Commands::Dict { action } => match action {
            DictCommands::List => {
                dict::manager::list_dictionaries(&folders)?;
            }
            DictCommands::Download { language } => {
                dict::manager::download_dictionary(language)?;
            }
            DictCommands::Update => {
                dict::manager::update_dictionaries()?;
            }
            DictCommands::Info { language } => {
                dict::manager::show_info(language, &folders)?;
            }
        },
    }
    Ok(())
}
