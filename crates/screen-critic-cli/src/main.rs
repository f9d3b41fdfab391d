//! ScreenCritic — entry point.

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use screen_critic::{critique_prompt, Caption, Tone};
use screen_critic_cli::config::{load_dotenv, Overrides, Settings};
use screen_critic_cli::run::run_once;

#[derive(Parser)]
#[command(
    name = "screen-critic",
    about = "Caption a screenshot and have a language model review it like a painting",
    version
)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Directory holding the engine's screenshot and review files.
    #[arg(long)]
    assets_dir: Option<PathBuf>,

    /// Screenshot to review (default: <assets-dir>/CameraScreenshot.png).
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Where to write the review (default: <assets-dir>/Python/ReplyText.txt).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Critic tone: negative, neutral or positive.
    #[arg(short, long)]
    tone: Option<Tone>,

    /// Chat model used for the review.
    #[arg(long)]
    model: Option<String>,

    /// Print the run report as JSON instead of the review text.
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    /// Subcommand values win over top-level ones.
    fn or(self, fallback: RunArgs) -> RunArgs {
        RunArgs {
            assets_dir: self.assets_dir.or(fallback.assets_dir),
            image: self.image.or(fallback.image),
            output: self.output.or(fallback.output),
            tone: self.tone.or(fallback.tone),
            model: self.model.or(fallback.model),
            json: self.json || fallback.json,
        }
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            assets_dir: self.assets_dir.clone(),
            image: self.image.clone(),
            output: self.output.clone(),
            tone: self.tone,
            model: self.model.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Caption the screenshot, generate a review, and write it out (default).
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Print the prompt that would be sent for a caption, without any network calls.
    Prompt {
        /// Caption text to embed.
        caption: String,

        /// Critic tone: negative, neutral or positive.
        #[arg(short, long, default_value = "negative")]
        tone: Tone,
    },

    /// Print the resolved configuration as JSON (credentials masked).
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   screen-critic completions bash > ~/.local/share/bash-completion/completions/screen-critic
    ///   screen-critic completions zsh > ~/.zfunc/_screen-critic
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before the filter, so RUST_LOG may come from .env.
    let dotenv = load_dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(Some(path)) => tracing::debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
    }

    match cli.command.unwrap_or(Commands::Run {
        args: RunArgs::default(),
    }) {
        Commands::Run { args } => {
            let args = args.or(cli.run);
            let settings = Settings::resolve(&args.overrides())?;

            match run_once(&settings).await {
                Ok(report) => {
                    if args.json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        println!("{}", report.review.into_inner());
                    }
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(e.exit_code());
                }
            }
        }

        Commands::Prompt { caption, tone } => {
            let caption = Caption::new(caption)?;
            println!("{}", critique_prompt(&caption, tone));
        }

        Commands::Info => {
            let settings = Settings::resolve(&cli.run.overrides())?;
            println!("{}", serde_json::to_string_pretty(&settings.redacted_json())?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "screen-critic", &mut std::io::stdout());
        }
    }

    Ok(())
}
