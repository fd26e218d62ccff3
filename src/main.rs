use std::fs;
use std::path::{Path, PathBuf};
use std::pin::pin;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::{Stream, TryStreamExt};

use logwindow_backend::MemoryBackend;
use logwindow_logs::{
    FilterSource, FollowOptions, LogEvent, Origin, QuerySource, StreamSource, TextSource,
};

mod config;
mod output;

use config::Config;

/// logwindow - paged, windowed and live access to log streams
#[derive(Parser, Debug)]
#[command(name = "logwindow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Replay fixture describing the log group (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    fixture: Option<PathBuf>,

    /// Config file (defaults to $LOGWINDOW_CONFIG when set)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Prefix each event with its timestamp
    #[arg(long, global = true)]
    timestamps: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the first events of every stream
    Head {
        /// Number of events per stream
        #[arg(short = 'n')]
        n: Option<usize>,
    },

    /// Show the last events of every stream
    Tail {
        /// Number of events per stream
        #[arg(short = 'n')]
        n: Option<usize>,

        /// Keep polling for new events
        #[arg(short = 'f')]
        follow: bool,

        /// Seconds between polls while following
        #[arg(short = 'i', long)]
        interval: Option<u64>,
    },

    /// Show the full history of every stream
    Cat {
        /// Keep polling for new events
        #[arg(short = 'f')]
        follow: bool,

        /// Seconds between polls while following
        #[arg(short = 'i', long)]
        interval: Option<u64>,
    },

    /// Search streams with a filter pattern, grouped by stream
    Filter {
        /// Filter pattern evaluated by the log service
        #[arg(short = 'e', long)]
        expression: String,

        #[command(flatten)]
        scope: Scope,
    },

    /// Extract values anchored at the start of matching events
    Match(RegexArgs),

    /// Extract the first occurrence of a regex in matching events
    Find(RegexArgs),
}

/// Streams a search covers (all streams when neither is given)
#[derive(clap::Args, Debug, Default)]
struct Scope {
    /// Only streams whose name starts with this prefix
    #[arg(long, conflicts_with = "stream")]
    prefix: Option<String>,

    /// Only these streams (repeatable)
    #[arg(long = "stream", value_name = "NAME")]
    stream: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct RegexArgs {
    /// Filter pattern evaluated by the log service
    #[arg(short = 'e', long, default_value = "")]
    expression: String,

    /// Regex applied to each event message
    #[arg(short = 'r', long)]
    regex: String,

    /// Search this text file instead of the log group
    #[arg(long, value_name = "FILE")]
    text: Option<PathBuf>,

    #[command(flatten)]
    scope: Scope,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never mix with events on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let timestamps = args.timestamps || config.timestamps;
    let fixture = args.fixture.as_deref();

    match args.command {
        Command::Head { n } => {
            let backend = open_backend(fixture, &config)?;
            let n = n.unwrap_or(config.lines);
            for name in backend.stream_names() {
                let source = StreamSource::new(&backend, backend.group(), name);
                output::print_header(source.stream_name());
                print_events(source.head(n)?, timestamps).await?;
            }
        }

        Command::Tail {
            n,
            follow,
            interval,
        } => {
            let backend = open_backend(fixture, &config)?;
            let n = n.unwrap_or(config.lines);
            let interval = interval.unwrap_or(config.interval_secs);
            for name in backend.stream_names() {
                let source = StreamSource::new(&backend, backend.group(), name);
                output::print_header(source.stream_name());
                if follow {
                    let limit = follow_limit(n)?;
                    let options = FollowOptions::default()
                        .from_origin(Origin::Tail)
                        .with_limit(Some(limit))
                        .with_interval_secs(interval);
                    print_events(source.follow(options), timestamps).await?;
                } else {
                    print_events(source.tail(n)?, timestamps).await?;
                }
            }
        }

        Command::Cat { follow, interval } => {
            let backend = open_backend(fixture, &config)?;
            let interval = interval.unwrap_or(config.interval_secs);
            for name in backend.stream_names() {
                let source = StreamSource::new(&backend, backend.group(), name);
                output::print_header(source.stream_name());
                if follow {
                    let options = FollowOptions::default().with_interval_secs(interval);
                    print_events(source.follow(options), timestamps).await?;
                } else {
                    print_events(source.cat(), timestamps).await?;
                }
            }
        }

        Command::Filter { expression, scope } => {
            let backend = open_backend(fixture, &config)?;
            let source = search_source(&backend, scope)?;
            let groups = source.filter(&expression).await?;
            output::print_groups(&groups, |event| {
                output::format_line(&event.message, event.time(), timestamps)
            });
        }

        Command::Match(cmd) => {
            let backend;
            let source = match &cmd.text {
                Some(path) => text_source(path)?,
                None => {
                    backend = open_backend(fixture, &config)?;
                    search_source(&backend, cmd.scope)?
                }
            };
            let groups = source.match_regex(&cmd.expression, &cmd.regex).await?;
            output::print_groups(&groups, output::plain);
        }

        Command::Find(cmd) => {
            let backend;
            let source = match &cmd.text {
                Some(path) => text_source(path)?,
                None => {
                    backend = open_backend(fixture, &config)?;
                    search_source(&backend, cmd.scope)?
                }
            };
            let groups = source.find(&cmd.expression, &cmd.regex).await?;
            output::print_groups(&groups, output::plain);
        }
    }

    Ok(())
}

/// Load the log group named by `--fixture` or the config file
fn open_backend(fixture: Option<&Path>, config: &Config) -> Result<MemoryBackend> {
    let path = fixture
        .or(config.fixture.as_deref())
        .context("No log group to read: pass --fixture or set `fixture` in the config file")?;

    let mut backend = MemoryBackend::load(path)
        .with_context(|| format!("Failed to load fixture {}", path.display()))?;
    if let Some(page_size) = config.page_size {
        backend = backend.with_page_size(page_size);
    }

    tracing::debug!(
        group = backend.group(),
        streams = backend.stream_names().len(),
        "loaded log group"
    );
    Ok(backend)
}

/// Search over the streams picked by `scope`, or every stream in the group
fn search_source(backend: &MemoryBackend, scope: Scope) -> Result<QuerySource<'_, MemoryBackend>> {
    let names = if scope.stream.is_empty() && scope.prefix.is_none() {
        backend.stream_names()
    } else {
        scope.stream
    };
    let source = FilterSource::from_parts(backend, backend.group(), Some(names), scope.prefix)?;
    Ok(source.into())
}

fn text_source<'a>(path: &Path) -> Result<QuerySource<'a, MemoryBackend>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file {}", path.display()))?;
    Ok(TextSource::new(text).into())
}

/// Events to show before following; the log service rejects a zero limit
fn follow_limit(n: usize) -> Result<u32> {
    anyhow::ensure!(n > 0, "-n must be at least 1 when following");
    u32::try_from(n).context("-n is too large to follow")
}

async fn print_events<S>(events: S, timestamps: bool) -> Result<()>
where
    S: Stream<Item = logwindow_logs::Result<LogEvent>>,
{
    let mut events = pin!(events);
    while let Some(event) = events.try_next().await? {
        println!("{}", output::format_line(&event.message, event.time(), timestamps));
    }
    println!();
    Ok(())
}
