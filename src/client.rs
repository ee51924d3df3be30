//! Docker Engine API access.
//!
//! [`SwarmApi`] is the seam between the discovery pipelines and the cluster:
//! the two list calls they need and nothing else. [`DockerClient`] implements
//! it over a unix socket or HTTP(S).

use std::collections::BTreeMap;
use std::future::Future;
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use url::Url;

use crate::error::TransportError;
use crate::model::{Node, Task};

#[cfg(unix)]
mod unix;

/// Endpoint used when the `host` argument is unset.
pub const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";

/// Highest Engine API version this client speaks.
pub const MAX_API_VERSION: &str = "1.47";

/// Version assumed when the daemon does not advertise one.
const FALLBACK_API_VERSION: &str = "1.24";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Cluster queries required by discovery.
pub trait SwarmApi {
    /// Lists swarm nodes, optionally filtered server-side by role.
    fn list_nodes(
        &self,
        role: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Node>, TransportError>> + Send;

    /// Lists the tasks of one fully-qualified service.
    fn list_tasks(
        &self,
        service: &str,
    ) -> impl Future<Output = Result<Vec<Task>, TransportError>> + Send;
}

/// Picks the endpoint: the `host` argument, or [`DEFAULT_HOST`] when it is empty.
///
/// The process environment is not consulted.
#[must_use]
pub fn select_host(arg: &str) -> String {
    match arg {
        "" => DEFAULT_HOST.to_string(),
        host => host.to_string(),
    }
}

#[derive(Debug)]
enum Transport {
    #[cfg(unix)]
    Unix(PathBuf),
    Http {
        client: reqwest::Client,
        base: Url,
    },
}

/// Status, negotiated-version header and body of one response.
struct Response {
    status: u16,
    api_version: Option<String>,
    body: Vec<u8>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// A short-lived Docker Engine API client.
///
/// Built per resolution call and dropped when the call returns. The API
/// version is negotiated on the first request.
#[derive(Debug)]
pub struct DockerClient {
    transport: Transport,
    version: OnceCell<String>,
}

impl DockerClient {
    /// Builds a client for `host` (`unix://`, `tcp://`, `http://` or `https://`).
    ///
    /// No connection is made until the first request.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not a URL, uses another scheme, names a
    /// unix socket without a path, or the HTTP client cannot be built.
    pub fn new(host: &str) -> Result<Self, TransportError> {
        let url = match host.strip_prefix("tcp://") {
            Some(rest) => Url::parse(&format!("http://{rest}"))?,
            None => Url::parse(host)?,
        };

        let transport = match url.scheme() {
            #[cfg(unix)]
            "unix" => match url.path() {
                "" => return Err(TransportError::MissingSocketPath(host.to_string())),
                path => Transport::Unix(PathBuf::from(path)),
            },
            "http" | "https" => {
                let client = reqwest::Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .user_agent(USER_AGENT)
                    .build()?;

                Transport::Http { client, base: url }
            }
            other => return Err(TransportError::UnsupportedScheme(other.to_string())),
        };

        Ok(Self {
            transport,
            version: OnceCell::new(),
        })
    }

    /// Negotiated API version, pinging the daemon on first use.
    async fn api_version(&self) -> Result<&str, TransportError> {
        self.version
            .get_or_try_init(|| async {
                let response = self.send("/_ping").await?;
                success(&response)?;

                let version = negotiate(response.api_version.as_deref());
                tracing::debug!("using Docker API version {version}");
                Ok::<_, TransportError>(version)
            })
            .await
            .map(String::as_str)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        filters: &[(&str, &str)],
    ) -> Result<T, TransportError> {
        let version = self.api_version().await?;
        let mut path = format!("/v{version}{endpoint}");

        if !filters.is_empty() {
            let encoded = encode_filters(filters)?;
            path.push_str("?filters=");
            path.extend(url::form_urlencoded::byte_serialize(encoded.as_bytes()));
        }

        let response = self.send(&path).await?;
        success(&response)?;

        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn send(&self, path: &str) -> Result<Response, TransportError> {
        tracing::trace!("GET {path}");

        match &self.transport {
            #[cfg(unix)]
            Transport::Unix(socket) => {
                let response = tokio::time::timeout(REQUEST_TIMEOUT, unix::get(socket, path))
                    .await
                    .map_err(|_| TransportError::Timeout(REQUEST_TIMEOUT))??;

                Ok(Response {
                    status: response.status,
                    api_version: response.header("api-version").map(str::to_string),
                    body: response.body,
                })
            }

            Transport::Http { client, base } => {
                let url = format!("{}{path}", base.as_str().trim_end_matches('/'));
                let response = client.get(url).send().await.map_err(|e| {
                    if e.is_timeout() {
                        TransportError::Timeout(REQUEST_TIMEOUT)
                    } else {
                        TransportError::Http(e)
                    }
                })?;

                let status = response.status().as_u16();
                let api_version = response
                    .headers()
                    .get("api-version")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = response.bytes().await?.to_vec();

                Ok(Response {
                    status,
                    api_version,
                    body,
                })
            }
        }
    }
}

impl SwarmApi for DockerClient {
    async fn list_nodes(&self, role: Option<&str>) -> Result<Vec<Node>, TransportError> {
        let filters: Vec<(&str, &str)> = role.map(|role| ("role", role)).into_iter().collect();
        self.get_json("/nodes", &filters).await
    }

    async fn list_tasks(&self, service: &str) -> Result<Vec<Task>, TransportError> {
        self.get_json("/tasks", &[("service", service)]).await
    }
}

/// Fails with the daemon's message unless the status is 2xx.
fn success(response: &Response) -> Result<(), TransportError> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }

    let message = serde_json::from_slice::<ErrorBody>(&response.body).map_or_else(
        |_| String::from_utf8_lossy(&response.body).trim().to_string(),
        |body| body.message,
    );

    Err(TransportError::Status {
        status: response.status,
        message,
    })
}

/// Picks the lower of the daemon's version and [`MAX_API_VERSION`].
fn negotiate(server: Option<&str>) -> String {
    let server = server
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(FALLBACK_API_VERSION);

    match (parse_version(server), parse_version(MAX_API_VERSION)) {
        (Some(theirs), Some(ours)) if theirs < ours => server.to_string(),
        _ => MAX_API_VERSION.to_string(),
    }
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Encodes filters the way the Engine expects: `{"role":{"manager":true}}`.
fn encode_filters(filters: &[(&str, &str)]) -> Result<String, TransportError> {
    let mut map: BTreeMap<&str, BTreeMap<&str, bool>> = BTreeMap::new();
    for &(key, value) in filters {
        map.entry(key).or_default().insert(value, true);
    }

    Ok(serde_json::to_string(&map)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_host_prefers_argument() {
        assert_eq!(select_host("tcp://10.0.0.1:2375"), "tcp://10.0.0.1:2375");
        assert_eq!(select_host("unix:///other.sock"), "unix:///other.sock");
    }

    #[test]
    fn select_host_defaults_to_local_socket() {
        assert_eq!(select_host(""), DEFAULT_HOST);
        assert_eq!(select_host(""), "unix:///var/run/docker.sock");
    }

    #[test]
    fn negotiate_picks_lower_version() {
        assert_eq!(negotiate(Some("1.41")), "1.41");
        assert_eq!(negotiate(Some("1.47")), "1.47");
        assert_eq!(negotiate(Some("1.48")), "1.47");
        assert_eq!(negotiate(Some("2.0")), "1.47");
    }

    #[test]
    fn negotiate_without_server_version() {
        assert_eq!(negotiate(None), "1.24");
        assert_eq!(negotiate(Some("  ")), "1.24");
        assert_eq!(negotiate(Some("garbage")), MAX_API_VERSION);
    }

    #[test]
    fn encode_filters_as_nested_map() {
        assert_eq!(
            encode_filters(&[("role", "manager")]).unwrap(),
            r#"{"role":{"manager":true}}"#
        );
        assert_eq!(
            encode_filters(&[("service", "ns_web"), ("desired-state", "running")]).unwrap(),
            r#"{"desired-state":{"running":true},"service":{"ns_web":true}}"#
        );
    }

    #[test]
    fn new_accepts_known_schemes() {
        let tcp = DockerClient::new("tcp://127.0.0.1:2375").unwrap();
        assert!(matches!(
            tcp.transport,
            Transport::Http { ref base, .. } if base.as_str() == "http://127.0.0.1:2375/"
        ));

        let https = DockerClient::new("https://docker.example.com:2376").unwrap();
        assert!(matches!(https.transport, Transport::Http { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn new_unix_socket_path() {
        let client = DockerClient::new(DEFAULT_HOST).unwrap();
        assert!(matches!(
            client.transport,
            Transport::Unix(ref path) if path.as_os_str() == "/var/run/docker.sock"
        ));
    }

    #[test]
    fn new_rejects_bad_hosts() {
        assert!(matches!(
            DockerClient::new("npipe:////./pipe/docker_engine"),
            Err(TransportError::UnsupportedScheme(scheme)) if scheme == "npipe"
        ));
        assert!(matches!(
            DockerClient::new("not a url"),
            Err(TransportError::Url(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn new_rejects_unix_host_without_path() {
        for host in ["unix://docker.sock", "unix://", "unix:"] {
            let err = DockerClient::new(host).unwrap_err();
            assert!(
                matches!(err, TransportError::MissingSocketPath(ref h) if h == host),
                "{host}: {err}"
            );
        }
    }

    #[test]
    fn success_extracts_daemon_message() {
        let response = Response {
            status: 503,
            api_version: None,
            body: br#"{"message":"This node is not a swarm manager."}"#.to_vec(),
        };

        let Err(TransportError::Status { status, message }) = success(&response) else {
            panic!("expected a status error");
        };
        assert_eq!(status, 503);
        assert_eq!(message, "This node is not a swarm manager.");
    }

    #[test]
    fn success_falls_back_to_raw_body() {
        let response = Response {
            status: 500,
            api_version: None,
            body: b"boom\n".to_vec(),
        };

        assert!(matches!(
            success(&response),
            Err(TransportError::Status { message, .. }) if message == "boom"
        ));
    }

    #[cfg(unix)]
    mod unix_socket {
        use std::path::{Path, PathBuf};
        use std::sync::atomic::{AtomicUsize, Ordering};

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::UnixListener;
        use tokio::task::JoinHandle;

        use super::super::*;

        static SOCKETS: AtomicUsize = AtomicUsize::new(0);

        /// Serves one canned response per connection and returns the request heads.
        fn serve(responses: Vec<String>) -> (PathBuf, JoinHandle<Vec<String>>) {
            let path = std::env::temp_dir().join(format!(
                "dockerswarm-discover-{}-{}.sock",
                std::process::id(),
                SOCKETS.fetch_add(1, Ordering::Relaxed)
            ));
            let _ = std::fs::remove_file(&path);
            let listener = UnixListener::bind(&path).unwrap();

            let handle = tokio::spawn(async move {
                let mut requests = Vec::new();

                for response in responses {
                    let (mut stream, _) = listener.accept().await.unwrap();
                    let mut head = Vec::new();
                    let mut buf = [0_u8; 1024];

                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        let n = stream.read(&mut buf).await.unwrap();
                        if n == 0 {
                            break;
                        }
                        head.extend_from_slice(&buf[..n]);
                    }

                    requests.push(String::from_utf8(head).unwrap());
                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.shutdown().await.unwrap();
                }

                requests
            });

            (path, handle)
        }

        fn socket_host(path: &Path) -> String {
            format!("unix://{}", path.display())
        }

        fn ok(headers: &str, body: &str) -> String {
            format!(
                "HTTP/1.1 200 OK\r\n{headers}Content-Length: {}\r\n\r\n{body}",
                body.len()
            )
        }

        #[tokio::test]
        async fn negotiates_then_lists_nodes_with_role_filter() {
            let nodes = r#"[{
                "ID": "n1",
                "Spec": {"Availability": "active"},
                "Status": {"State": "ready", "Addr": "10.0.0.1"}
            }]"#;
            let (path, server) = serve(vec![
                ok("Api-Version: 1.45\r\n", "OK"),
                ok("Content-Type: application/json\r\n", nodes),
            ]);

            let client = DockerClient::new(&socket_host(&path)).unwrap();
            let listed = client.list_nodes(Some("manager")).await.unwrap();

            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].status.addr, "10.0.0.1");

            let requests = server.await.unwrap();
            assert!(requests[0].starts_with("GET /_ping HTTP/1.1\r\n"));
            let filters = "%7B%22role%22%3A%7B%22manager%22%3Atrue%7D%7D";
            let expected = format!("GET /v1.45/nodes?filters={filters} HTTP/1.1\r\n");
            assert!(requests[1].starts_with(&expected));

            let _ = std::fs::remove_file(path);
        }

        #[tokio::test]
        async fn negotiates_only_once() {
            let (path, server) = serve(vec![
                ok("Api-Version: 1.50\r\n", "OK"),
                ok("", "[]"),
                ok("", "[]"),
            ]);

            let client = DockerClient::new(&socket_host(&path)).unwrap();
            assert!(client.list_tasks("default_web").await.unwrap().is_empty());
            assert!(client.list_nodes(None).await.unwrap().is_empty());

            let requests = server.await.unwrap();
            assert_eq!(requests.len(), 3);
            assert!(requests[1].starts_with("GET /v1.47/tasks?filters="));
            assert!(requests[2].starts_with("GET /v1.47/nodes HTTP/1.1\r\n"));

            let _ = std::fs::remove_file(path);
        }

        #[tokio::test]
        async fn daemon_errors_surface_as_status() {
            let body = r#"{"message":"This node is not a swarm manager."}"#;
            let (path, server) = serve(vec![
                ok("Api-Version: 1.47\r\n", "OK"),
                format!(
                    "HTTP/1.1 503 Service Unavailable\r\nContent-Length: {}\r\n\r\n{body}",
                    body.len()
                ),
            ]);

            let client = DockerClient::new(&socket_host(&path)).unwrap();
            let err = client.list_tasks("default_web").await.unwrap_err();

            assert!(matches!(err, TransportError::Status { status: 503, .. }));
            server.await.unwrap();

            let _ = std::fs::remove_file(path);
        }

        #[tokio::test]
        async fn missing_socket_is_io_error() {
            let host = "unix:///nonexistent/dockerswarm-discover.sock";
            let client = DockerClient::new(host).unwrap();
            let err = client.list_nodes(None).await.unwrap_err();

            assert!(matches!(err, TransportError::Io(_)));
        }
    }
}
