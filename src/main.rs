use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(version)]
#[command(about = "In-app help assistant with offline cache and guided steps")]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a .helpdesk directory
    Init {
        /// Directory to initialize .helpdesk in
        #[arg(short, long, default_value = ".")]
        path: String,

        /// Knowledge file or directory to use
        #[arg(short, long)]
        knowledge: Option<String>,
    },

    /// Load knowledge and cache it for offline use
    Load {
        /// Knowledge file or directory (defaults to the configured one)
        path: Option<String>,
    },

    /// Ask a single question
    Ask {
        /// The question
        query: String,

        /// Section the question is asked from
        #[arg(short, long)]
        section: Option<String>,

        /// Resolve the section from an app route instead
        #[arg(short, long, conflicts_with = "section")]
        route: Option<String>,
    },

    /// Interactive help session
    Chat {
        /// Section the session starts in
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Record a visit to a section
    Visit {
        /// Section id
        section: String,
    },

    /// Show suggestions for a section without recording a visit
    Suggest {
        /// Section id
        section: String,
    },

    /// Walk through an entry's steps
    Guide {
        /// Entry id
        entry_id: String,

        /// Steps already completed (comma-separated, from 1)
        #[arg(short, long, default_value = "")]
        done: String,

        /// Steps skipped (comma-separated, from 1)
        #[arg(long, default_value = "")]
        skip: String,

        /// Minutes already spent on the guide
        #[arg(short, long, default_value = "0")]
        minutes: u64,

        /// Explanation level: beginner, intermediate or advanced
        #[arg(short, long, default_value = "intermediate")]
        level: String,
    },

    /// Search the offline cache directly
    Search {
        /// Search text
        query: String,

        /// Restrict to a section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Show offline status
    Status,

    /// Mark the app online and sync the cache
    Online,

    /// Mark the app offline
    Offline,

    /// Show cache and behavior statistics
    Stats,

    /// Export cached entries
    Export {
        /// Format: json or md
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Clear stored data
    Clear {
        /// Clear the behavior record
        #[arg(long)]
        behavior: bool,

        /// Clear the offline cache
        #[arg(long)]
        cache: bool,
    },

    /// View or set configuration
    Config {
        /// Config key
        key: Option<String>,

        /// Value to set
        value: Option<String>,

        /// Write to the global config instead of the store's
        #[arg(short, long)]
        global: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Init { path, knowledge } => cli::help::run_init(&path, knowledge.as_deref()),
        Commands::Load { path } => cli::help::run_load(path.as_deref()),
        Commands::Ask { query, section, route } => {
            cli::help::run_ask(&query, section.as_deref(), route.as_deref())
        }
        Commands::Chat { section } => cli::help::run_chat(section.as_deref()),
        Commands::Visit { section } => cli::help::run_visit(&section),
        Commands::Suggest { section } => cli::help::run_suggest(&section),
        Commands::Guide {
            entry_id,
            done,
            skip,
            minutes,
            level,
        } => cli::guide::run_guide(&entry_id, &done, &skip, minutes, &level),
        Commands::Search { query, section } => cli::cache::run_search(&query, section.as_deref()),
        Commands::Status => cli::cache::run_status(),
        Commands::Online => cli::cache::run_online(),
        Commands::Offline => cli::cache::run_offline(),
        Commands::Stats => cli::cache::run_stats(),
        Commands::Export { format } => cli::cache::run_export(&format),
        Commands::Clear { behavior, cache } => cli::cache::run_clear(behavior, cache),
        Commands::Config { key, value, global } => {
            cli::config::run_config(key.as_deref(), value.as_deref(), global)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
