use clap::{Parser, ValueEnum};
use http_dispatch::http::dispatch::Dispatch;
use http_dispatch::http::named::NameDispatcher;
use http_dispatch::http::server::Server;
use http_dispatch::pages::{self, Pages};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "http-dispatch")]
#[command(about = "Serve the demo pages through a path/method dispatcher", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:4221")]
    addr: String,

    /// Number of worker threads handling connections
    #[arg(long, default_value = "10")]
    workers: NonZeroUsize,

    /// How requests are resolved to handlers
    #[arg(long, value_enum, default_value_t = Strategy::Registry)]
    strategy: Strategy,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    /// Explicit (path, method) registration table
    Registry,
    /// Handler names derived from the path, e.g. `/pagetwo` + POST -> `Pagetwo_POST`
    Named,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "http_dispatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let dispatcher: Arc<dyn Dispatch> = match args.strategy {
        Strategy::Registry => Arc::new(pages::router()),
        Strategy::Named => Arc::new(NameDispatcher::new(Pages)),
    };

    tracing::info!(strategy = ?args.strategy, workers = args.workers.get(), "starting");

    let server = Server::from_tcp_addr(&args.addr, args.workers.get(), dispatcher)?;
    server.run()?;

    Ok(())
}
