use core::time::Duration;
use std::{io, time::Instant};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use http::{header, HeaderValue, Method, Request, Uri};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::cfg::BasicAuth;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build request URI: {0}")]
    Uri(#[from] http::uri::InvalidUri),
    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),
    #[error("failed to connect to {addr}: {err}")]
    Connect { addr: String, err: io::Error },
    #[error("request failed: {0}")]
    Http(#[from] hyper::Error),
}

/// Outcome of a single successful probe.
///
/// Produced for any received HTTP response, regardless of status code.
#[derive(Debug)]
pub struct ProbeOutput {
    /// Full target URL of the request.
    pub target: String,
    /// HTTP status code of the response.
    pub code: u16,
    /// Connection setup time, when a new connection was established.
    pub connect: Option<Duration>,
    /// Total wall-clock time from request start to full body drain.
    pub total: Duration,
}

/// Executes timed GET probes against a single target service.
///
/// Holds at most one open connection, reused across probes and dropped
/// on any failure. Reconnection happens inside the next probe's timing
/// window, so totals include connection setup exactly when it was paid.
#[derive(Debug)]
pub struct Prober {
    /// Target endpoint in `host:port` form.
    addr: String,
    /// Host header value.
    host: HeaderValue,
    /// Path prefix of the target service, no trailing slash.
    base_path: String,
    /// Scheme and authority, for display URLs.
    origin: String,
    /// Precomputed basic auth header.
    auth: Option<HeaderValue>,
    /// Established connection, if any.
    conn: Option<SendRequest<Empty<Bytes>>>,
}

impl Prober {
    /// Constructs a prober from an already validated base URL.
    pub fn new(base: &Uri, auth: Option<&BasicAuth>) -> Self {
        let authority = base.authority().expect("the base URL is validated at config load");
        let host = authority.host();
        let port = base.port_u16().unwrap_or(80);
        let addr = if host.contains(':') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };

        Self {
            addr,
            host: HeaderValue::from_str(authority.as_str()).expect("a valid authority is a valid header value"),
            base_path: base.path().trim_end_matches('/').to_string(),
            origin: format!("http://{authority}"),
            auth: auth.map(basic_auth_header),
            conn: None,
        }
    }

    /// Executes a single GET against the given catalog path.
    ///
    /// The total covers the whole round trip: connection setup when one
    /// had to be established, request transmission, time to the
    /// response and the full body drain.
    pub async fn execute(&mut self, path: &str) -> Result<ProbeOutput, ProbeError> {
        let uri = self.request_uri(path)?;
        let target = format!("{}{}", self.origin, uri);

        let now = Instant::now();
        let (code, connect) = self.do_execute(&uri).await?;

        let m = ProbeOutput {
            target,
            code,
            connect,
            total: now.elapsed(),
        };

        Ok(m)
    }

    async fn do_execute(&mut self, uri: &Uri) -> Result<(u16, Option<Duration>), ProbeError> {
        let mut connect = None;
        let mut sender = match self.conn.take() {
            Some(sender) if !sender.is_closed() => sender,
            _ => {
                let now = Instant::now();
                let sender = self.reconnect().await?;
                connect = Some(now.elapsed());

                sender
            }
        };

        let mut req = Request::builder()
            .method(Method::GET)
            .uri(uri.clone())
            .header(header::HOST, self.host.clone())
            .header(header::CONTENT_TYPE, "application/fhir+json");
        if let Some(auth) = &self.auth {
            req = req.header(header::AUTHORIZATION, auth.clone());
        }
        let req = req.body(Empty::new())?;

        let mut resp = sender.send_request(req).await?;
        let code = resp.status().as_u16();

        // Drain the whole body so the total reflects real completion
        // and the connection can be reused.
        while let Some(frame) = resp.frame().await {
            frame?;
        }

        self.conn = Some(sender);

        Ok((code, connect))
    }

    async fn reconnect(&self) -> Result<SendRequest<Empty<Bytes>>, ProbeError> {
        let stream = TcpStream::connect(&self.addr).await.map_err(|err| ProbeError::Connect {
            addr: self.addr.clone(),
            err,
        })?;

        let (sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
        tokio::task::spawn(async move {
            if let Err(err) = conn.await {
                log::debug!("connection closed: {err}");
            }
        });

        Ok(sender)
    }

    /// Joins the base path with a catalog path into an origin-form URI.
    fn request_uri(&self, path: &str) -> Result<Uri, ProbeError> {
        let path = path.trim_start_matches('/');
        let uri = Uri::try_from(format!("{}/{path}", self.base_path))?;

        Ok(uri)
    }
}

fn basic_auth_header(auth: &BasicAuth) -> HeaderValue {
    let token = STANDARD.encode(format!("{}:{}", auth.user, auth.password));
    let mut value =
        HeaderValue::try_from(format!("Basic {token}")).expect("base64 output is a valid header value");
    value.set_sensitive(true);

    value
}

#[cfg(test)]
mod test {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    use super::*;

    fn response(code: u16, reason: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {code} {reason}\r\nContent-Length: {}\r\nConnection: keep-alive\r\n\r\n{body}",
            body.len()
        )
    }

    async fn read_head(sock: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = sock.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before request head");
            buf.extend_from_slice(&chunk[..n]);
        }

        String::from_utf8(buf).unwrap()
    }

    /// Serves a single request on the first accepted connection and
    /// returns the captured request head.
    fn serve_once(listener: TcpListener, resp: String) -> JoinHandle<String> {
        tokio::spawn(async move {
            let (mut sock, ..) = listener.accept().await.unwrap();
            let head = read_head(&mut sock).await;
            sock.write_all(resp.as_bytes()).await.unwrap();

            head
        })
    }

    async fn prober_for(listener: &TcpListener, base_path: &str, auth: Option<&BasicAuth>) -> Prober {
        let addr = listener.local_addr().unwrap();
        let base: Uri = format!("http://{addr}{base_path}").parse().unwrap();

        Prober::new(&base, auth)
    }

    #[tokio::test]
    async fn test_execute_get_with_fixed_content_type() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut prober = prober_for(&listener, "/fhir", None).await;
        let server = serve_once(listener, response(200, "OK", "{}"));

        let out = prober.execute("/Patient").await.unwrap();
        assert_eq!(out.code, 200);
        assert!(out.connect.is_some());
        assert!(out.total >= out.connect.unwrap());

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /fhir/Patient HTTP/1.1\r\n"), "head: {head}");
        assert!(head.to_lowercase().contains("content-type: application/fhir+json"));
    }

    #[tokio::test]
    async fn test_non_2xx_is_a_successful_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut prober = prober_for(&listener, "/fhir", None).await;
        let server = serve_once(listener, response(500, "Internal Server Error", "oops"));

        let out = prober.execute("/Patient").await.unwrap();
        assert_eq!(out.code, 500);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_basic_auth_header_is_applied() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let auth = BasicAuth {
            user: "user".into(),
            password: "pass".into(),
        };
        let mut prober = prober_for(&listener, "", Some(&auth)).await;
        let server = serve_once(listener, response(200, "OK", ""));

        prober.execute("/Patient").await.unwrap();

        let head = server.await.unwrap().to_lowercase();
        // "user:pass" in base64.
        assert!(head.contains("authorization: basic dxnlcjpwyxnz"), "head: {head}");
    }

    #[tokio::test]
    async fn test_connection_is_reused_across_probes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut prober = prober_for(&listener, "/fhir", None).await;

        let server: JoinHandle<usize> = tokio::spawn(async move {
            let (mut sock, ..) = listener.accept().await.unwrap();
            for _ in 0..2 {
                read_head(&mut sock).await;
                sock.write_all(response(200, "OK", "ok").as_bytes()).await.unwrap();
            }

            // A single accepted connection served both requests.
            1
        });

        let first = prober.execute("/Patient").await.unwrap();
        let second = prober.execute("/Observation").await.unwrap();
        assert!(first.connect.is_some());
        assert!(second.connect.is_none());

        assert_eq!(server.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut prober = prober_for(&listener, "/fhir", None).await;
        drop(listener);

        let err = prober.execute("/Patient").await.unwrap_err();
        assert!(matches!(err, ProbeError::Connect { .. }), "err: {err}");
    }

    #[tokio::test]
    async fn test_request_uri_join() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let prober = prober_for(&listener, "/fhir/", None).await;

        assert_eq!(prober.request_uri("/Patient").unwrap(), "/fhir/Patient");
        assert_eq!(prober.request_uri("Patient").unwrap(), "/fhir/Patient");
        assert_eq!(
            prober.request_uri("/Patient?_count=10").unwrap(),
            "/fhir/Patient?_count=10"
        );

        let prober = prober_for(&listener, "", None).await;
        assert_eq!(prober.request_uri("/Patient").unwrap(), "/Patient");
    }

    #[tokio::test]
    async fn test_request_uri_rejects_malformed_paths() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let prober = prober_for(&listener, "/fhir", None).await;

        let err = prober.request_uri("/Patient name").unwrap_err();
        assert!(matches!(err, ProbeError::Uri(..)), "err: {err}");
    }
}
