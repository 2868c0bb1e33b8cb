use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::{Shell, generate};
use git_patchwork::diff::PatchDirection;
use git_patchwork::noise::{NoiseFilter, NoiseFilterConfig, SortMode};
use git_patchwork::words::{SegmentKind, diff_words};
use git_patchwork::{Patchwork, PatchworkError};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "git-patchwork", version)]
#[command(about = "Line-level patches, word diffs and file trees from git diff output")]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List changed lines with the numbers used to select them
    Show {
        #[command(flatten)]
        input: Input,
    },
    /// Print a patch for specific lines (e.g., file.nix:10..15,-20)
    Stage {
        /// File and line references (e.g., "flake.nix:137" or "flake.nix:10..15")
        #[arg(required = true)]
        file_refs: Vec<String>,
        /// Build a patch that unstages the lines instead
        #[arg(long)]
        reverse: bool,
        #[command(flatten)]
        input: Input,
    },
    /// List changed files after noise filtering
    Files {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        input: Input,
    },
    /// Show changed files as a directory tree
    Tree {
        /// Directories with at most this many files start expanded
        #[arg(long, default_value_t = 5)]
        expand_threshold: usize,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        input: Input,
    },
    /// Word-level difference between two lines
    Words { old: String, new: String },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Generate a man page
    Man,
}

#[derive(clap::Args)]
struct Input {
    /// Read diff text from this file instead of stdin
    #[arg(long, value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,
}

#[derive(clap::Args)]
struct FilterArgs {
    /// TOML file with noise filter settings
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    /// Hide generated files and build output
    #[arg(long)]
    hide_generated: bool,
    /// Hide package manager lockfiles
    #[arg(long)]
    hide_lockfiles: bool,
    /// Hide files matching this glob (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    excludes: Vec<String>,
    /// File order
    #[arg(long, value_enum)]
    sort: Option<SortArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Path,
    Type,
    Size,
}

impl From<SortArg> for SortMode {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Path => SortMode::Path,
            SortArg::Type => SortMode::ChangeType,
            SortArg::Size => SortMode::Size,
        }
    }
}

impl FilterArgs {
    /// File settings first, then flags on top
    fn build(self) -> Result<NoiseFilter, PatchworkError> {
        let mut config = match &self.config {
            Some(path) => NoiseFilterConfig::load(path)?,
            None => NoiseFilterConfig::default(),
        };
        config.hide_generated |= self.hide_generated;
        config.hide_lockfiles |= self.hide_lockfiles;
        config.custom_patterns.extend(self.excludes);
        if let Some(sort) = self.sort {
            config.sort = sort.into();
        }
        debug!(?config, "noise filter settings");
        Ok(NoiseFilter::new(config)?)
    }
}

impl Input {
    fn load(&self) -> Result<Patchwork, PatchworkError> {
        let text = match &self.input {
            Some(path) => read_file(path)?,
            None => {
                let mut text = String::new();
                io::stdin()
                    .read_to_string(&mut text)
                    .map_err(|e| PatchworkError::ReadInput {
                        source_name: "stdin".to_string(),
                        message: e.to_string(),
                    })?;
                text
            }
        };
        Ok(Patchwork::new(&text))
    }
}

fn read_file(path: &Path) -> Result<String, PatchworkError> {
    std::fs::read_to_string(path).map_err(|e| PatchworkError::ReadInput {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Show { input } => {
            print!("{}", input.load()?.show());
        }
        Commands::Stage {
            file_refs,
            reverse,
            input,
        } => {
            let work = input.load()?;
            let direction = if reverse {
                PatchDirection::Unstage
            } else {
                PatchDirection::Stage
            };
            print!(
                "{}",
                work.stage_many(file_refs.iter().map(String::as_str), direction)?
            );
        }
        Commands::Files { filter, input } => {
            let work = input.load()?;
            for file in work.files(&filter.build()?) {
                println!(
                    "{} {} +{} -{}",
                    file.change_type().status_letter(),
                    file.path(),
                    file.additions(),
                    file.deletions()
                );
            }
        }
        Commands::Tree {
            expand_threshold,
            filter,
            input,
        } => {
            let tree = input.load()?.tree(&filter.build()?);
            let expanded = tree.expanded_by_default(expand_threshold);
            for row in tree.flatten(&expanded) {
                let indent = "  ".repeat(row.depth);
                let node = row.node;
                if node.is_directory() {
                    let marker = if row.expanded { 'v' } else { '>' };
                    println!(
                        "{indent}{marker} {}/ ({} files, +{} -{})",
                        node.name,
                        node.file_count(),
                        node.total_additions(),
                        node.total_deletions()
                    );
                } else {
                    println!(
                        "{indent}  {} +{} -{}",
                        node.name,
                        node.total_additions(),
                        node.total_deletions()
                    );
                }
            }
        }
        Commands::Words { old, new } => {
            for segment in diff_words(&old, &new) {
                let tag = match segment.kind {
                    SegmentKind::Unchanged => ' ',
                    SegmentKind::Added => '+',
                    SegmentKind::Removed => '-',
                };
                println!("{tag}{:?}", segment.text);
            }
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "git-patchwork", &mut io::stdout());
        }
        Commands::Man => {
            let man = clap_mangen::Man::new(Cli::command());
            man.render(&mut io::stdout())?;
        }
    }

    Ok(())
}
