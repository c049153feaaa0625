use crate::domain::{LogEntry, RemoteError, ValidationVerdict};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const BIN_NAME: &str = env!("CARGO_PKG_NAME");

/// Cap on response bodies. The log file grows until it is cleared.
const MAX_BODY_BYTES: u64 = 1024 * 1024 * 1024;

/// The monitor service as seen by this client.
pub trait MonitorService: Send + Sync {
    fn fetch_logs(&self) -> Result<Vec<LogEntry>, RemoteError>;
    fn validate_directory(&self, directory: &str) -> Result<ValidationVerdict, RemoteError>;
    fn start(&self, directory: &str) -> Result<String, RemoteError>;
    fn stop(&self, directory: &str) -> Result<String, RemoteError>;
    fn clear_logs(&self) -> Result<(), RemoteError>;
    fn download_logs_csv(&self) -> Result<Vec<u8>, RemoteError>;
}

#[derive(Debug, Serialize)]
struct DirectoryRequest<'a> {
    directory: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

struct Reply {
    status: u16,
    success: bool,
    body: String,
}

impl Reply {
    fn status_body(&self) -> Option<StatusBody> {
        serde_json::from_str::<StatusBody>(&self.body).ok()
    }

    fn rejection(&self) -> RemoteError {
        let body = self.status_body().unwrap_or_default();
        let message = body
            .status
            .or(body.error)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {}", self.status));
        RemoteError::Rejected {
            status: self.status,
            message,
        }
    }
}

pub struct HttpMonitorService {
    agent: ureq::Agent,
    base_url: Url,
    timeout: Duration,
    body_limit: u64,
}

impl HttpMonitorService {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            agent: make_agent(timeout),
            base_url,
            timeout,
            body_limit: MAX_BODY_BYTES,
        }
    }

    #[cfg(test)]
    fn with_body_limit(mut self, body_limit: u64) -> Self {
        self.body_limit = body_limit;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(path)
            .map_err(|error| RemoteError::Transport(format!("invalid endpoint {path}: {error}")))
    }

    fn get(&self, path: &str) -> Result<ureq::http::Response<ureq::Body>, RemoteError> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "GET");
        self.agent
            .get(url.as_str())
            .header("User-Agent", &user_agent())
            .call()
            .map_err(|error| self.map_error(error))
    }

    fn post_directory(&self, path: &str, directory: &str) -> Result<Reply, RemoteError> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, directory, "POST");
        let response = self
            .agent
            .post(url.as_str())
            .header("User-Agent", &user_agent())
            .send_json(&DirectoryRequest { directory })
            .map_err(|error| self.map_error(error))?;
        self.read_reply(response)
    }

    fn read_reply(
        &self,
        mut response: ureq::http::Response<ureq::Body>,
    ) -> Result<Reply, RemoteError> {
        let status = response.status();
        let body = response
            .body_mut()
            .with_config()
            .limit(self.body_limit)
            .read_to_string()
            .map_err(|error| self.map_error(error))?;
        Ok(Reply {
            status: status.as_u16(),
            success: status.is_success(),
            body,
        })
    }

    fn map_error(&self, error: ureq::Error) -> RemoteError {
        match error {
            ureq::Error::Timeout(_) => RemoteError::Timeout(self.timeout),
            ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
                RemoteError::Timeout(self.timeout)
            }
            ureq::Error::BodyExceedsLimit(limit) => {
                RemoteError::Decode(format!("response body is larger than {limit} bytes"))
            }
            other => RemoteError::Transport(other.to_string()),
        }
    }
}

impl MonitorService for HttpMonitorService {
    fn fetch_logs(&self) -> Result<Vec<LogEntry>, RemoteError> {
        let response = self.get("logs")?;
        let reply = self.read_reply(response)?;
        if !reply.success {
            return Err(reply.rejection());
        }
        serde_json::from_str::<Vec<LogEntry>>(&reply.body)
            .map_err(|error| RemoteError::Decode(error.to_string()))
    }

    fn validate_directory(&self, directory: &str) -> Result<ValidationVerdict, RemoteError> {
        let reply = self.post_directory("validate_directory", directory)?;
        let status = reply.status_body().and_then(|body| body.status);
        match status.as_deref() {
            Some("valid") if reply.success => Ok(ValidationVerdict::Valid),
            Some(_) => Ok(ValidationVerdict::Invalid),
            None if reply.success => Err(RemoteError::Decode(
                "validation response has no status field".to_string(),
            )),
            None => Err(reply.rejection()),
        }
    }

    fn start(&self, directory: &str) -> Result<String, RemoteError> {
        let reply = self.post_directory("start", directory)?;
        if !reply.success {
            return Err(reply.rejection());
        }
        Ok(reply
            .status_body()
            .and_then(|body| body.status)
            .unwrap_or_else(|| "Monitoring started".to_string()))
    }

    fn stop(&self, directory: &str) -> Result<String, RemoteError> {
        let reply = self.post_directory("stop", directory)?;
        if !reply.success {
            return Err(reply.rejection());
        }
        Ok(reply
            .status_body()
            .and_then(|body| body.status)
            .unwrap_or_else(|| "Monitoring stopped".to_string()))
    }

    fn clear_logs(&self) -> Result<(), RemoteError> {
        let url = self.endpoint("clear_logs")?;
        tracing::debug!(%url, "POST");
        let response = self
            .agent
            .post(url.as_str())
            .header("User-Agent", &user_agent())
            .send_empty()
            .map_err(|error| self.map_error(error))?;
        let reply = self.read_reply(response)?;
        if !reply.success {
            return Err(reply.rejection());
        }
        Ok(())
    }

    fn download_logs_csv(&self) -> Result<Vec<u8>, RemoteError> {
        let mut response = self.get("download_logs")?;
        let status = response.status();
        if !status.is_success() {
            let reply = self.read_reply(response)?;
            return Err(reply.rejection());
        }
        response
            .body_mut()
            .with_config()
            .limit(self.body_limit)
            .read_to_vec()
            .map_err(|error| self.map_error(error))
    }
}

fn user_agent() -> String {
    format!("{BIN_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

fn make_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    config.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buffer: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = stream.read(&mut chunk).expect("read");
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            let Some(head_end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= head_end + 4 + content_length {
                break;
            }
        }
        String::from_utf8_lossy(&buffer).to_string()
    }

    /// Answers exactly one request with the given status line and JSON body.
    fn serve_once(status_line: &'static str, body: impl Into<String>) -> (Url, JoinHandle<String>) {
        let body = body.into();
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            // The client may hang up early once it hits its body limit.
            let _ = stream.write_all(response.as_bytes());
            request
        });
        let url = Url::parse(&format!("http://{addr}/")).expect("url");
        (url, handle)
    }

    fn service(url: Url) -> HttpMonitorService {
        HttpMonitorService::new(url, Duration::from_secs(5))
    }

    fn request_body(request: &str) -> serde_json::Value {
        let (_, body) = request.split_once("\r\n\r\n").expect("request body");
        serde_json::from_str(body).expect("json body")
    }

    fn modified_rows(count: usize) -> String {
        let rows = (0..count)
            .map(|index| {
                format!(
                    r#"{{"timestamp":"2024-05-01 10:00:00","level":"INFO","message":"MODIFIED: /srv/data/file-{index:06}.txt has been modified."}}"#
                )
            })
            .collect::<Vec<_>>();
        format!("[{}]", rows.join(","))
    }

    #[test]
    fn fetch_logs_decodes_entries_in_service_order() {
        let (url, server) = serve_once(
            "200 OK",
            r#"[{"timestamp":"t1","level":"INFO","message":"ADDED: a"},{"timestamp":"t2","message":"DELETED: b"}]"#,
        );
        let entries = service(url).fetch_logs().expect("fetch");
        let request = server.join().expect("server");
        assert!(request.starts_with("GET /logs "));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, "t1");
        assert_eq!(entries[1].message, "DELETED: b");
    }

    #[test]
    fn validate_posts_directory_and_reads_valid_status() {
        let (url, server) = serve_once("200 OK", r#"{"status":"valid"}"#);
        let verdict = service(url).validate_directory("/tmp").expect("validate");
        let request = server.join().expect("server");
        assert_eq!(verdict, ValidationVerdict::Valid);
        assert!(request.starts_with("POST /validate_directory "));
        assert_eq!(request_body(&request)["directory"], "/tmp");
    }

    #[test]
    fn fetch_logs_reads_bodies_past_ten_mebibytes() {
        let body = modified_rows(80_000);
        assert!(body.len() > 10 * 1024 * 1024);
        let (url, server) = serve_once("200 OK", body);
        let entries = service(url).fetch_logs().expect("fetch");
        server.join().expect("server");
        assert_eq!(entries.len(), 80_000);
        assert_eq!(entries[79_999].category(), crate::domain::ChangeCategory::Modified);
    }

    #[test]
    fn download_reads_bodies_past_ten_mebibytes() {
        let body = "timestamp,message\n".repeat(700_000);
        assert!(body.len() > 10 * 1024 * 1024);
        let expected = body.len();
        let (url, server) = serve_once("200 OK", body);
        let csv = service(url).download_logs_csv().expect("download");
        server.join().expect("server");
        assert_eq!(csv.len(), expected);
    }

    #[test]
    fn body_over_the_limit_is_a_decode_error() {
        let (url, server) = serve_once("200 OK", modified_rows(10));
        let result = service(url).with_body_limit(64).fetch_logs();
        server.join().expect("server");
        assert!(matches!(result, Err(RemoteError::Decode(_))), "{result:?}");
    }

    #[test]
    fn validate_treats_explicit_invalid_status_on_400_as_invalid() {
        let (url, server) = serve_once("400 Bad Request", r#"{"status":"invalid"}"#);
        let verdict = service(url).validate_directory("/nope").expect("validate");
        server.join().expect("server");
        assert_eq!(verdict, ValidationVerdict::Invalid);
    }

    #[test]
    fn validate_without_status_on_error_is_a_rejection() {
        let (url, server) = serve_once("500 Internal Server Error", "oops");
        let result = service(url).validate_directory("/tmp");
        server.join().expect("server");
        assert_eq!(
            result,
            Err(RemoteError::Rejected {
                status: 500,
                message: "HTTP 500".to_string()
            })
        );
    }

    #[test]
    fn start_failure_surfaces_service_message() {
        let (url, server) = serve_once("400 Bad Request", r#"{"status":"already running"}"#);
        let result = service(url).start("/tmp");
        server.join().expect("server");
        assert_eq!(
            result,
            Err(RemoteError::Rejected {
                status: 400,
                message: "already running".to_string()
            })
        );
    }

    #[test]
    fn stop_returns_status_text() {
        let (url, server) = serve_once("200 OK", r#"{"status":"Monitoring Stopped!"}"#);
        let status = service(url).stop("/tmp").expect("stop");
        let request = server.join().expect("server");
        assert_eq!(status, "Monitoring Stopped!");
        assert!(request.starts_with("POST /stop "));
    }

    #[test]
    fn clear_failure_uses_error_field() {
        let (url, server) = serve_once(
            "500 Internal Server Error",
            r#"{"error":"permission denied"}"#,
        );
        let result = service(url).clear_logs();
        server.join().expect("server");
        assert_eq!(
            result,
            Err(RemoteError::Rejected {
                status: 500,
                message: "permission denied".to_string()
            })
        );
    }

    #[test]
    fn unreachable_service_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let url = Url::parse(&format!("http://{addr}/")).expect("url");
        let result = service(url).fetch_logs();
        assert!(matches!(result, Err(RemoteError::Transport(_))));
    }

    #[test]
    fn silent_service_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            thread::sleep(Duration::from_millis(1500));
            drop(stream);
        });
        let url = Url::parse(&format!("http://{addr}/")).expect("url");
        let timeout = Duration::from_millis(200);
        let result = HttpMonitorService::new(url, timeout).fetch_logs();
        server.join().expect("server");
        assert_eq!(result, Err(RemoteError::Timeout(timeout)));
    }
}
