use adserve_core::error::{AdServeError, AdServeResult};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::debug;

pub(crate) fn build_client(source_name: &'static str, timeout: Duration) -> AdServeResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| AdServeError::Config(format!("{source_name} client: {e}")))
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn fetch_failed(source_name: &'static str, message: String) -> AdServeError {
    metrics::counter!("sources.fetch_errors", "source" => source_name).increment(1);
    AdServeError::fetch(source_name, message)
}

/// GET a JSON document. Transport failures, timeouts and non-2xx statuses
/// are fetch errors; an undecodable body is a parse error.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    source_name: &'static str,
    url: &str,
) -> AdServeResult<T> {
    let start = Instant::now();

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_failed(source_name, format!("GET {url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_failed(
            source_name,
            format!("GET {url}: unexpected status {status}"),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| fetch_failed(source_name, format!("GET {url}: reading body: {e}")))?;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    metrics::histogram!("sources.fetch_latency_ms", "source" => source_name).record(elapsed_ms as f64);
    debug!(source = source_name, url = %url, bytes = body.len(), elapsed_ms, "Fetched collaborator document");

    serde_json::from_slice(&body).map_err(|e| {
        metrics::counter!("sources.parse_errors", "source" => source_name).increment(1);
        AdServeError::parse(source_name, format!("GET {url}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Records `sources.fetch_errors` and drops everything else.
    #[derive(Default)]
    struct FetchErrorRecorder {
        fetch_errors: Arc<AtomicU64>,
    }

    impl Recorder for FetchErrorRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            if key.name() == "sources.fetch_errors" {
                Counter::from_arc(self.fetch_errors.clone())
            } else {
                Counter::noop()
            }
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    /// Fetch `path` (from `router` when given, otherwise from a closed port)
    /// and report the result with the number of fetch errors counted.
    fn fetch_counting_errors(router: Option<Router>, path: &str) -> (AdServeResult<Vec<u64>>, u64) {
        let recorder = FetchErrorRecorder::default();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let client = build_client("test", Duration::from_millis(500)).unwrap();

        let result = metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                match router {
                    Some(router) => {
                        tokio::spawn(async move {
                            axum::serve(listener, router).await.unwrap();
                        });
                    }
                    None => drop(listener),
                }
                get_json(&client, "test", &join_url(&format!("http://{addr}"), path)).await
            })
        });
        (result, recorder.fetch_errors.load(Ordering::SeqCst))
    }

    #[test]
    fn test_connection_failure_counts_as_fetch_error() {
        let (result, errors) = fetch_counting_errors(None, "/stats");
        assert!(matches!(result, Err(AdServeError::Fetch { .. })));
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_error_status_counts_as_fetch_error() {
        let router = Router::new().route("/stats", get(|| async { StatusCode::BAD_GATEWAY }));
        let (result, errors) = fetch_counting_errors(Some(router), "/stats");
        assert!(matches!(result, Err(AdServeError::Fetch { .. })));
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_decode_failure_is_not_a_fetch_error() {
        let router = Router::new().route("/stats", get(|| async { "not json" }));
        let (result, errors) = fetch_counting_errors(Some(router), "/stats");
        assert!(matches!(result, Err(AdServeError::Parse { .. })));
        assert_eq!(errors, 0);
    }

    #[test]
    fn test_join_url_trims_trailing_slash() {
        assert_eq!(join_url("http://host:9/", "/mean_ctr"), "http://host:9/mean_ctr");
        assert_eq!(join_url("http://host:9", "/mean_ctr"), "http://host:9/mean_ctr");
    }
}
