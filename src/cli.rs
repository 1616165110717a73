use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "linear-timeline")]
#[command(about = "Project timelines, end-date estimates and dependencies from Linear", version)]
#[command(after_help = "EXAMPLES:
    linear-timeline projects                     Timeline of every project
    linear-timeline projects --team ENG          Only projects of one team
    linear-timeline deps                         Blocking relations and cycles
    linear-timeline estimate <project-id>        How an end date was derived")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Log requests, retries and cache activity to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the project timeline
    #[command(after_help = "EXAMPLES:
    linear-timeline projects
    linear-timeline projects --team ENG
    linear-timeline projects --from 2024-01-01 --to 2024-06-30
    linear-timeline projects --refresh --json")]
    Projects(ProjectsArgs),
    /// Show project dependencies, cycles and a blockers-first order
    #[command(after_help = "EXAMPLES:
    linear-timeline deps
    linear-timeline deps --json")]
    Deps {
        /// Ignore cached data
        #[arg(long)]
        refresh: bool,
    },
    /// Explain the effective end date of one project
    #[command(after_help = "EXAMPLES:
    linear-timeline estimate 5a2c9f1e-0b6d-4c55-9a3e-2f1d7c8e4b10")]
    Estimate {
        /// Project ID
        project_id: String,
    },
    /// Check the configured API key
    Whoami,
    /// Generate shell completions
    #[command(after_help = "EXAMPLES:
    linear-timeline completions bash > ~/.bash_completion.d/linear-timeline
    linear-timeline completions zsh > ~/.zfunc/_linear-timeline
    linear-timeline completions fish > ~/.config/fish/completions/linear-timeline.fish")]
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
    /// Initialize configuration file interactively
    Init,
}

#[derive(Args, Clone)]
pub struct ProjectsArgs {
    /// Only projects of this team (name, case-insensitive)
    #[arg(long)]
    pub team: Option<String>,

    /// Only projects still running on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Only projects starting on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Ignore cached data
    #[arg(long)]
    pub refresh: bool,
}
