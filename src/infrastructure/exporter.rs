use crate::domain::registry::{MetricRegistry, MetricSnapshot};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use warp::Filter;

/// Content type of the text exposition format
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Renders metric snapshots into the Prometheus text exposition format.
///
/// Every metric gets a `# HELP` and `# TYPE` line; metrics that have never
/// been set simply render no sample lines.
pub fn render_exposition(metrics: &[MetricSnapshot]) -> String {
    let mut out = String::new();
    for metric in metrics {
        out.push_str(&format!("# HELP {} {}\n", metric.name, metric.help));
        out.push_str(&format!("# TYPE {} gauge\n", metric.name));
        for sample in &metric.samples {
            if sample.labels.is_empty() {
                out.push_str(&format!("{} {}\n", metric.name, sample.value));
            } else {
                let rendered: Vec<String> = sample
                    .labels
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
                    .collect();
                out.push_str(&format!(
                    "{}{{{}}} {}\n",
                    metric.name,
                    rendered.join(","),
                    sample.value
                ));
            }
        }
    }
    out
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Scrape handler holding a shared reference to the registry.
///
/// Constructed once at startup and handed to the HTTP layer; each request
/// takes an independent snapshot, so no per-request state exists.
#[derive(Debug, Clone)]
pub struct MetricsHandler {
    registry: Arc<MetricRegistry>,
}

impl MetricsHandler {
    /// Creates a handler over the shared registry
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self { registry }
    }

    /// Renders the current registry contents
    pub fn scrape(&self) -> String {
        render_exposition(&self.registry.snapshot())
    }
}

/// GET on any path answers with the current exposition body
pub fn routes(
    handler: MetricsHandler,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::get().map(move || {
        warp::reply::with_header(handler.scrape(), "content-type", EXPOSITION_CONTENT_TYPE)
    })
}

/// Serves the metrics endpoint until shutdown is signalled.
///
/// Bind failures are startup faults and surface as `Err`.
pub async fn serve(
    handler: MetricsHandler,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), warp::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let (bound, server) =
        warp::serve(routes(handler)).try_bind_with_graceful_shutdown(addr, async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
            info!("Metrics server shutting down");
        })?;

    info!("Metrics endpoint listening on http://{}", bound);
    server.await;
    Ok(())
}
