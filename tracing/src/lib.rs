use tokio::sync::{mpsc, oneshot};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(feature = "otlp")]
use opentelemetry::KeyValue;
#[cfg(feature = "otlp")]
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace::BatchConfigBuilder, Resource};

pub mod propagate;

type FlushRequest = Option<oneshot::Sender<()>>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid RUST_LOG: {0}")]
    Filter(#[from] tracing_subscriber::filter::FromEnvError),

    #[error(transparent)]
    MpscSend(#[from] mpsc::error::SendError<FlushRequest>),

    #[error(transparent)]
    OneshotRecv(#[from] oneshot::error::RecvError),

    #[cfg(feature = "otlp")]
    #[error("unable to set up OTLP export: {0}")]
    Otlp(#[from] opentelemetry::trace::TraceError),
}

/// Handle to the installed subscriber.
/// Keep it around for as long as the process should emit traces, and call
/// [TracingHandle::shutdown] before exiting so buffered spans get exported.
#[derive(Clone, Default)]
pub struct TracingHandle {
    tx: Option<mpsc::Sender<FlushRequest>>,
}

impl TracingHandle {
    /// Request a flush of all attached exporters.
    /// Returns immediately; pass a [oneshot::Sender] to be notified once the
    /// flush completed. Without exporters this only notifies the sender.
    pub async fn flush(&self, msg: FlushRequest) -> Result<(), Error> {
        match &self.tx {
            Some(tx) => Ok(tx.send(msg).await?),
            None => {
                if let Some(done) = msg {
                    let _ = done.send(());
                }
                Ok(())
            }
        }
    }

    /// Flush all attached exporters and wait for the flush to complete.
    pub async fn shutdown(&self) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.flush(Some(tx)).await?;
        rx.await?;
        Ok(())
    }
}

pub struct TracingBuilder {
    level: Level,
    json: bool,

    #[cfg(feature = "otlp")]
    service_name: Option<&'static str>,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            json: false,

            #[cfg(feature = "otlp")]
            service_name: None,
        }
    }
}

impl TracingBuilder {
    /// Default log level for all layers. RUST_LOG takes precedence.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    /// Emit one JSON object per event instead of the compact text format.
    pub fn json(mut self, json: bool) -> TracingBuilder {
        self.json = json;
        self
    }

    /// Export spans via OTLP, reporting as `service_name`.
    #[cfg(feature = "otlp")]
    pub fn enable_otlp(mut self, service_name: &'static str) -> TracingBuilder {
        self.service_name = Some(service_name);
        self
    }

    /// Install the global subscriber.
    ///
    /// Events are written to stderr, filtered by an [EnvFilter] built from
    /// RUST_LOG with the configured level as default directive. The filter
    /// applies to the OTLP layer too, if one is configured.
    pub fn build(self) -> Result<TracingHandle, Error> {
        let filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env()?;

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(
                self.json
                    .then(|| fmt::Layer::new().with_writer(std::io::stderr).json()),
            )
            .with(
                (!self.json)
                    .then(|| fmt::Layer::new().with_writer(std::io::stderr).compact()),
            );

        #[cfg(feature = "otlp")]
        {
            if let Some(service_name) = self.service_name {
                opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

                let (tracer, tx) = gen_otlp_tracer(service_name)?;
                subscriber
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .try_init()?;

                return Ok(TracingHandle { tx: Some(tx) });
            }
        }

        subscriber.try_init()?;

        Ok(TracingHandle { tx: None })
    }
}

/// Sets up the OTLP batch exporter and spawns a task serving flush requests.
/// Returns the tracer and the sending side of the flush channel.
#[cfg(feature = "otlp")]
fn gen_otlp_tracer(
    service_name: &'static str,
) -> Result<
    (
        impl opentelemetry::trace::Tracer + tracing_opentelemetry::PreSampledTracer,
        mpsc::Sender<FlushRequest>,
    ),
    Error,
> {
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic())
        .with_batch_config(
            // Export on the schedule rather than whenever a (small) batch
            // fills up, and keep the noise down if no collector is listening.
            BatchConfigBuilder::default()
                .with_max_export_batch_size(4096)
                .with_max_queue_size(4096 * 4)
                .with_scheduled_delay(std::time::Duration::from_secs(10))
                .build(),
        )
        .with_trace_config(
            opentelemetry_sdk::trace::config()
                .with_resource(Resource::new([KeyValue::new("service.name", service_name)])),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    let tracer_provider = tracer.provider().ok_or_else(|| {
        opentelemetry::trace::TraceError::Other("OTLP tracer without provider".into())
    })?;

    let (tx, mut rx) = mpsc::channel::<FlushRequest>(16);

    tokio::spawn(async move {
        while let Some(done) = rx.recv().await {
            // force_flush blocks, keep it off the runtime threads.
            let _ = tokio::task::spawn_blocking({
                let tracer_provider = tracer_provider.clone();
                move || tracer_provider.force_flush()
            })
            .await;

            if let Some(done) = done {
                let _ = done.send(());
            }
        }
    });

    Ok((tracer, tx))
}
