use anyhow::Result;
use clap::Parser;
use dotgit::areas::repository::Repository;
use dotgit::artifacts::core::config::GraphConfig;
use dotgit::artifacts::graph::snapshot::HeadVisibility;
use dotgit::artifacts::watch::renderer::{DEFAULT_RENDERER, RendererCommand};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dotgit",
    version = "0.1.0",
    about = "Draw a git repository's object graph with Graphviz",
    long_about = "Writes every blob, tree, commit and reference of a repository as a \
    Graphviz digraph on stdout. With --watch, the graph is piped into a renderer \
    and redrawn whenever the repository changes.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
"
)]
struct Cli {
    #[arg(
        index = 1,
        help = "The repository to draw (work tree or git directory); discovered from the current directory when omitted"
    )]
    path: Option<PathBuf>,

    #[arg(short, long, help = "Redraw the graph in a renderer whenever the repository changes")]
    watch: bool,

    #[arg(long, help = "Leave HEAD out when it points at nothing (fresh repository, unborn branch)")]
    no_broken_head: bool,

    #[arg(
        long,
        env = "DOTGIT_RENDERER",
        default_value = DEFAULT_RENDERER,
        help = "Renderer command fed the graph on stdin in watch mode"
    )]
    renderer: RendererCommand,

    #[arg(
        long,
        env = "DOTGIT_DEBOUNCE_MS",
        default_value_t = 1000,
        help = "Quiet period in milliseconds before redrawing in watch mode"
    )]
    debounce_ms: u64,
}

impl Cli {
    fn config(&self) -> GraphConfig {
        let head = if self.no_broken_head {
            HeadVisibility::HideBroken
        } else {
            HeadVisibility::Show
        };

        GraphConfig::new(
            head,
            self.renderer.clone(),
            Duration::from_millis(self.debounce_ms),
        )
    }

    fn open_repository(&self) -> Result<Repository> {
        match &self.path {
            Some(path) => Repository::open(path),
            None => Repository::discover(&std::env::current_dir()?),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.config();
    let repository = cli.open_repository()?;

    if cli.watch {
        repository.watch(config).await?;
    } else {
        let stdout = std::io::stdout();
        let mut writer = BufWriter::new(stdout.lock());
        repository.dump(config.head, &mut writer)?;
        writer.flush()?;
    }

    Ok(())
}
