use clap::Parser;
use mimalloc::MiMalloc;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{info, Level};
use zine_publish::config::ServiceConfig;
use zine_publish::http::{gen_router, AppState};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Publish zines to IPFS and keep the registry of published zines current.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[clap(flatten)]
    service: ServiceConfig,

    /// The address to listen on.
    #[clap(flatten)]
    listen_args: tokio_listener::ListenerAddressLFlag,

    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[cfg(feature = "otlp")]
    /// Whether to configure OTLP. Set --otlp=false to disable.
    #[arg(long, default_missing_value = "true", default_value = "true", num_args(0..=1), require_equals(true), action(clap::ArgAction::Set))]
    otlp: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let tracing_handle = {
        #[allow(unused_mut)]
        let mut builder = zine_tracing::TracingBuilder::default()
            .level(cli.log_level)
            .json(cli.log_json);
        #[cfg(feature = "otlp")]
        {
            if cli.otlp {
                builder = builder.enable_otlp("zine.publish");
            }
        }
        builder.build()?
    };

    let services = cli.service.build_services(zine_ipfs::http::client())?;
    let state = AppState::new(services, cli.service.env_report());

    let app = gen_router().with_state(state).layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http().make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                ),
            )
            .map_request(zine_tracing::propagate::axum::accept_trace),
    );

    let listen_address = &cli.listen_args.listen_address.unwrap_or_else(|| {
        "[::]:8000"
            .parse()
            .expect("invalid fallback listen address")
    });

    let listener = tokio_listener::Listener::bind(
        listen_address,
        &Default::default(),
        &cli.listen_args.listener_options,
    )
    .await?;

    info!(listen_address=%listen_address, "starting daemon");

    let served = tokio_listener::axum07::serve(
        listener,
        app.into_make_service_with_connect_info::<tokio_listener::SomeSocketAddrClonable>(),
    )
    .await;

    tracing_handle.shutdown().await?;
    Ok(served?)
}
