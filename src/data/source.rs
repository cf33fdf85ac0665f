use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use super::loader::{self, LoadError};
use super::model::Dataset;
use crate::config::{AppConfig, SourceSelector};

/// Substring identifying the platform's package channels.
pub const PLATFORM_HOST: &str = "nidap.nih.gov";

// ---------------------------------------------------------------------------
// Source resolution
// ---------------------------------------------------------------------------

/// Where the dataset is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Local(PathBuf),
    Catalog {
        base_url: String,
        dataset: String,
        token: Option<String>,
    },
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Local(path) => write!(f, "{}", path.display()),
            DataSource::Catalog {
                base_url, dataset, ..
            } => write!(f, "catalog '{dataset}' at {base_url}"),
        }
    }
}

/// Pick the data source for `config`.  `Auto` runs platform detection.
pub fn resolve_source(config: &AppConfig) -> DataSource {
    resolve_source_with(config, platform_is_detected)
}

/// Like [`resolve_source`] with an injected detector.
pub fn resolve_source_with(config: &AppConfig, detect: impl FnOnce() -> bool) -> DataSource {
    let remote = match config.source {
        SourceSelector::Local => false,
        SourceSelector::Catalog => true,
        SourceSelector::Auto => detect(),
    };
    if remote {
        DataSource::Catalog {
            base_url: config.catalog_url.clone(),
            dataset: config.dataset.clone(),
            token: config.catalog_token.clone(),
        }
    } else {
        DataSource::Local(config.local_path.clone())
    }
}

/// Whether the configured conda channels point at the platform host.
/// Any failure to run conda counts as "not detected".
pub fn platform_is_detected() -> bool {
    let output = match Command::new("conda")
        .args(["config", "--show", "channels"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            log::warn!(
                "`conda config --show channels` exited with {}; assuming local data",
                output.status
            );
            return false;
        }
        Err(e) => {
            log::warn!("could not run conda for platform detection ({e}); assuming local data");
            return false;
        }
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detected = channels_reference_host(&stdout, PLATFORM_HOST);
    log::debug!("platform detection: {detected}");
    detected
}

/// Scan `conda config --show channels` output.  The first line is the
/// `channels:` header; each following line is one channel entry.
pub fn channels_reference_host(output: &str, host: &str) -> bool {
    output.lines().skip(1).any(|line| line.contains(host))
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Materialises a dataset from a source.
pub trait Fetcher {
    fn fetch(&self, source: &DataSource) -> Result<Dataset, LoadError>;
}

/// Reads local files from disk and catalog datasets over HTTP.
pub struct DefaultFetcher {
    timeout: Duration,
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
        }
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch(&self, source: &DataSource) -> Result<Dataset, LoadError> {
        match source {
            DataSource::Local(path) => loader::load_file(path),
            DataSource::Catalog {
                base_url,
                dataset,
                token,
            } => {
                let http = catalog_client(self.timeout)?;
                fetch_catalog_table(&http, base_url, dataset, token.as_deref())
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct CatalogErrorBody {
    #[serde(alias = "errorName", alias = "error")]
    message: String,
}

/// URL of the Parquet export of `dataset`.
pub fn catalog_table_url(base_url: &str, dataset: &str) -> String {
    format!(
        "{}/datasets/{}/table?format=parquet",
        base_url.trim_end_matches('/'),
        dataset
    )
}

fn catalog_client(timeout: Duration) -> reqwest::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(concat!("halo-viewer/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// Download the Parquet export of `dataset`.  A non-success status becomes
/// [`LoadError::Catalog`] carrying the server's error message.
fn fetch_catalog_table(
    http: &reqwest::blocking::Client,
    base_url: &str,
    dataset: &str,
    token: Option<&str>,
) -> Result<Dataset, LoadError> {
    let url = catalog_table_url(base_url, dataset);
    log::info!("fetching dataset '{dataset}' from {url}");
    let mut request = http.get(&url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let resp = request.send()?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<CatalogErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        return Err(LoadError::Catalog {
            dataset: dataset.to_string(),
            status: status.as_u16(),
            message,
        });
    }

    let payload = resp.bytes()?;
    loader::read_parquet(payload)
}

// ---------------------------------------------------------------------------
// Session cache
// ---------------------------------------------------------------------------

/// Singleton memo of the loaded dataset.  Failed loads are not cached, so the
/// next call retries.
pub struct DatasetCache<F = DefaultFetcher> {
    source: DataSource,
    fetcher: F,
    dataset: Option<Arc<Dataset>>,
}

impl DatasetCache<DefaultFetcher> {
    pub fn new(source: DataSource) -> Self {
        Self::with_fetcher(source, DefaultFetcher::default())
    }
}

impl<F: Fetcher> DatasetCache<F> {
    pub fn with_fetcher(source: DataSource, fetcher: F) -> Self {
        Self {
            source,
            fetcher,
            dataset: None,
        }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.dataset.is_some()
    }

    /// The cached dataset, loading it on first use.
    pub fn get_or_load(&mut self) -> Result<Arc<Dataset>, LoadError> {
        if let Some(ds) = &self.dataset {
            return Ok(Arc::clone(ds));
        }
        match self.fetcher.fetch(&self.source) {
            Ok(ds) => {
                log::info!(
                    "Loaded {} rows x {} columns from {}",
                    ds.len(),
                    ds.columns().len(),
                    self.source
                );
                let ds = Arc::new(ds);
                self.dataset = Some(Arc::clone(&ds));
                Ok(ds)
            }
            Err(e) => {
                log::error!("Failed to load {}: {e}", self.source);
                Err(e)
            }
        }
    }

    /// Drop the cached dataset; the next access reloads.
    pub fn invalidate(&mut self) {
        self.dataset = None;
    }

    /// Point the cache at a different source and drop what it holds.
    pub fn switch_source(&mut self, source: DataSource) {
        self.source = source;
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;
    use crate::data::model::{CellValue, ColumnInfo, ColumnType};

    struct CountingFetcher {
        calls: Cell<usize>,
        fail: Cell<bool>,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
                fail: Cell::new(false),
            }
        }
    }

    impl Fetcher for CountingFetcher {
        fn fetch(&self, source: &DataSource) -> Result<Dataset, LoadError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail.get() {
                return Err(LoadError::Malformed(format!("cannot read {source}")));
            }
            Ok(Dataset::new(
                vec![ColumnInfo::new("n", ColumnType::Integer)],
                vec![vec![CellValue::Integer(self.calls.get() as i64)]],
            )
            .unwrap())
        }
    }

    fn local() -> DataSource {
        DataSource::Local(PathBuf::from("Dummy_dashboardV2.csv"))
    }

    #[test]
    fn test_cache_loads_once() {
        let mut cache = DatasetCache::with_fetcher(local(), CountingFetcher::new());
        assert!(!cache.is_loaded());
        let first = cache.get_or_load().unwrap();
        let second = cache.get_or_load().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.fetcher.calls.get(), 1);
    }

    #[test]
    fn test_invalidate_reloads() {
        let mut cache = DatasetCache::with_fetcher(local(), CountingFetcher::new());
        cache.get_or_load().unwrap();
        cache.invalidate();
        let ds = cache.get_or_load().unwrap();
        assert_eq!(cache.fetcher.calls.get(), 2);
        assert_eq!(ds.row(0).unwrap()[0], CellValue::Integer(2));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let mut cache = DatasetCache::with_fetcher(local(), CountingFetcher::new());
        cache.fetcher.fail.set(true);
        assert!(cache.get_or_load().is_err());
        assert!(!cache.is_loaded());
        cache.fetcher.fail.set(false);
        assert!(cache.get_or_load().is_ok());
        assert_eq!(cache.fetcher.calls.get(), 2);
    }

    #[test]
    fn test_switch_source_invalidates() {
        let mut cache = DatasetCache::with_fetcher(local(), CountingFetcher::new());
        cache.get_or_load().unwrap();
        cache.switch_source(DataSource::Local(PathBuf::from("other.csv")));
        assert!(!cache.is_loaded());
        assert_eq!(cache.source(), &DataSource::Local(PathBuf::from("other.csv")));
    }

    #[test]
    fn test_channel_output_parsing() {
        let on_platform = "channels:\n  - https://nidap.nih.gov/conda/main\n  - defaults\n";
        let elsewhere = "channels:\n  - conda-forge\n  - defaults\n";
        assert!(channels_reference_host(on_platform, PLATFORM_HOST));
        assert!(!channels_reference_host(elsewhere, PLATFORM_HOST));
        assert!(!channels_reference_host("", PLATFORM_HOST));
        // the header line is never treated as a channel
        assert!(!channels_reference_host("nidap.nih.gov:\n", PLATFORM_HOST));
    }

    #[test]
    fn test_explicit_selectors_skip_detection() {
        let cfg = AppConfig {
            source: SourceSelector::Local,
            ..AppConfig::default()
        };
        let source = resolve_source_with(&cfg, || panic!("detection must not run"));
        assert_eq!(source, DataSource::Local(cfg.local_path.clone()));

        let cfg = AppConfig {
            source: SourceSelector::Catalog,
            ..AppConfig::default()
        };
        let source = resolve_source_with(&cfg, || panic!("detection must not run"));
        assert!(matches!(source, DataSource::Catalog { ref dataset, .. } if dataset == "dummy_dashboardv2"));
    }

    #[test]
    fn test_auto_uses_detection_result() {
        let cfg = AppConfig::default();
        assert!(matches!(
            resolve_source_with(&cfg, || true),
            DataSource::Catalog { .. }
        ));
        assert!(matches!(
            resolve_source_with(&cfg, || false),
            DataSource::Local(_)
        ));
    }

    /// Serve one canned HTTP response on a local port.  The handle yields the
    /// request head the client sent.
    fn serve_once(
        status: &'static str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = Vec::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                head.push(line.trim_end().to_string());
            }
            let preamble = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(preamble.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
            head
        });
        (base_url, handle)
    }

    fn test_client() -> reqwest::blocking::Client {
        reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    fn parquet_table() -> Vec<u8> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Receipt_ID", DataType::Utf8, false),
            Field::new("cell_count", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["R001", "R002"])),
                Arc::new(Int64Array::from(vec![120, 340])),
            ],
        )
        .unwrap();
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        buf
    }

    #[test]
    fn test_catalog_error_status_carries_server_message() {
        let body = br#"{"errorCode":"NOT_FOUND","errorName":"Dataset not found"}"#.to_vec();
        let (base_url, server) = serve_once("404 Not Found", "application/json", body);

        let err = fetch_catalog_table(&test_client(), &base_url, "dummy_dashboardv2", None)
            .unwrap_err();
        match err {
            LoadError::Catalog {
                dataset,
                status,
                message,
            } => {
                assert_eq!(dataset, "dummy_dashboardv2");
                assert_eq!(status, 404);
                assert_eq!(message, "Dataset not found");
            }
            other => panic!("expected a catalog error, got {other:?}"),
        }
        let head = server.join().unwrap();
        assert_eq!(
            head[0],
            "GET /datasets/dummy_dashboardv2/table?format=parquet HTTP/1.1"
        );
    }

    #[test]
    fn test_catalog_error_without_json_body_keeps_raw_text() {
        let body = b"upstream unavailable".to_vec();
        let (base_url, server) = serve_once("503 Service Unavailable", "text/plain", body);

        let err = fetch_catalog_table(&test_client(), &base_url, "dummy_dashboardv2", None)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Catalog { status: 503, ref message, .. } if message == "upstream unavailable"
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_catalog_parquet_body_is_decoded() {
        let (base_url, server) =
            serve_once("200 OK", "application/octet-stream", parquet_table());

        let ds = fetch_catalog_table(
            &test_client(),
            &base_url,
            "dummy_dashboardv2",
            Some("secret"),
        )
        .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.columns()[1], ColumnInfo::new("cell_count", ColumnType::Integer));
        assert_eq!(
            ds.row(1).unwrap(),
            &[CellValue::Text("R002".into()), CellValue::Integer(340)]
        );

        let head = server.join().unwrap();
        assert!(
            head.iter()
                .any(|line| line.eq_ignore_ascii_case("authorization: Bearer secret"))
        );
    }

    #[test]
    fn test_catalog_url() {
        assert_eq!(
            catalog_table_url("https://catalog.example/api/", "dummy_dashboardv2"),
            "https://catalog.example/api/datasets/dummy_dashboardv2/table?format=parquet"
        );
    }
}
