//! Local HTTP server for development mode.
//!
//! Serves the bundle output directory on localhost so the webview can be
//! loaded in a browser while its sources are edited. `/__build` reports the
//! latest published artifact set.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::domain::{AppError, BuildArtifactSet, Result, ASSETS_DIR, SCRIPT_FILE_NAME, STYLESHEET_FILE_NAME};

/// Path reporting the latest build as JSON.
pub const BUILD_STATUS_PATH: &str = "/__build";

const INDEX_PAGE: &str = concat!(
    "<!DOCTYPE html>\n",
    "<html>\n<head>\n<meta charset=\"utf-8\">\n",
    "<title>React Native IDE</title>\n",
    "<link rel=\"stylesheet\" href=\"./webview.css\">\n",
    "</head>\n<body>\n<div id=\"root\"></div>\n",
    "<script src=\"./webview.js\"></script>\n",
    "</body>\n</html>\n",
);

/// Serves one output directory.
pub struct DevServer {
    listener: TcpListener,
    out_dir: Arc<PathBuf>,
    latest: watch::Receiver<Option<BuildArtifactSet>>,
}

impl DevServer {
    /// Bind to `127.0.0.1:port`. Port 0 picks a free port.
    ///
    /// # Errors
    /// Returns error if the port cannot be bound.
    pub async fn bind(
        port: u16,
        out_dir: impl Into<PathBuf>,
        latest: watch::Receiver<Option<BuildArtifactSet>>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| AppError::io(format!("failed to bind dev server to port {port}"), e))?;

        Ok(Self {
            listener,
            out_dir: Arc::new(out_dir.into()),
            latest,
        })
    }

    /// Address the server listens on.
    ///
    /// # Errors
    /// Returns error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| AppError::io("failed to read dev server address", e))
    }

    /// Accept connections until the listener fails.
    ///
    /// # Errors
    /// Returns error if accepting a connection fails.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| AppError::io("dev server accept failed", e))?;

            let out_dir = Arc::clone(&self.out_dir);
            let latest = self.latest.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let out_dir = Arc::clone(&out_dir);
                    let latest = latest.clone();
                    async move {
                        Ok::<_, Infallible>(
                            respond(req.method(), req.uri().path(), &out_dir, &latest).await,
                        )
                    }
                });

                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    tracing::debug!(%peer, error = %e, "Dev server connection ended with error");
                }
            });
        }
    }
}

/// Answer one request.
pub async fn respond(
    method: &Method,
    path: &str,
    out_dir: &Path,
    latest: &watch::Receiver<Option<BuildArtifactSet>>,
) -> Response<Full<Bytes>> {
    if method != Method::GET && method != Method::HEAD {
        return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    let response = match path {
        "/" | "/index.html" => reply(StatusCode::OK, "text/html; charset=utf-8", INDEX_PAGE),
        BUILD_STATUS_PATH => build_status(latest),
        _ => serve_file(out_dir, path).await,
    };
    tracing::debug!(%method, path, status = %response.status(), "Dev server request");

    if method == Method::HEAD {
        let (parts, _) = response.into_parts();
        return Response::from_parts(parts, Full::new(Bytes::new()));
    }
    response
}

fn build_status(latest: &watch::Receiver<Option<BuildArtifactSet>>) -> Response<Full<Bytes>> {
    let body = match latest.borrow().as_ref() {
        Some(artifacts) => serde_json::to_vec(artifacts),
        None => return text(StatusCode::SERVICE_UNAVAILABLE, "no build yet"),
    };
    match body {
        Ok(body) => reply(StatusCode::OK, "application/json", body),
        Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn serve_file(out_dir: &Path, path: &str) -> Response<Full<Bytes>> {
    let Some(relative) = safe_relative(path) else {
        return text(StatusCode::BAD_REQUEST, "bad path");
    };

    match tokio::fs::read(out_dir.join(&relative)).await {
        Ok(bytes) => {
            let mut response = reply(StatusCode::OK, content_type(&relative), bytes);
            response
                .headers_mut()
                .insert(CACHE_CONTROL, cache_policy(&relative));
            response
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            text(StatusCode::NOT_FOUND, "not found")
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "Dev server read failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, "read failed")
        }
    }
}

/// Request path as a path below the output directory. Anything that could
/// leave it is refused.
fn safe_relative(path: &str) -> Option<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    let mut components = relative.components().peekable();
    components.peek()?;
    components
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| relative.to_path_buf())
}

/// Hashed assets never change under the same name; the fixed entry names do.
fn cache_policy(relative: &Path) -> HeaderValue {
    if relative.starts_with(ASSETS_DIR) {
        HeaderValue::from_static("public, max-age=31536000, immutable")
    } else {
        HeaderValue::from_static("no-cache")
    }
}

fn content_type(path: &Path) -> &'static str {
    if path == Path::new(SCRIPT_FILE_NAME) {
        return "text/javascript; charset=utf-8";
    }
    if path == Path::new(STYLESHEET_FILE_NAME) {
        return "text/css; charset=utf-8";
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        _ => "application/octet-stream",
    }
}

fn reply(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn text(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    reply(status, "text/plain; charset=utf-8", message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::fs;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn artifacts(out_dir: &Path) -> BuildArtifactSet {
        BuildArtifactSet {
            out_dir: out_dir.to_path_buf(),
            script: SCRIPT_FILE_NAME.into(),
            stylesheet: STYLESHEET_FILE_NAME.into(),
            assets: vec![],
        }
    }

    fn out_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("webview.js"), "render();").unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets/logo-1a2b3c4d.svg"), "<svg/>").unwrap();
        dir
    }

    async fn body(response: Response<Full<Bytes>>) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_serves_bundle_files() {
        let dir = out_dir();
        let (_tx, rx) = watch::channel(None);

        let script = respond(&Method::GET, "/webview.js", dir.path(), &rx).await;
        assert_eq!(script.status(), StatusCode::OK);
        assert_eq!(script.headers()[CONTENT_TYPE], "text/javascript; charset=utf-8");
        assert_eq!(script.headers()[CACHE_CONTROL], "no-cache");
        assert_eq!(body(script).await, b"render();");

        let asset = respond(&Method::GET, "/assets/logo-1a2b3c4d.svg", dir.path(), &rx).await;
        assert_eq!(asset.headers()[CONTENT_TYPE], "image/svg+xml");
        assert!(asset.headers()[CACHE_CONTROL]
            .to_str()
            .unwrap()
            .contains("immutable"));
    }

    #[tokio::test]
    async fn test_index_page_loads_the_bundle() {
        let dir = out_dir();
        let (_tx, rx) = watch::channel(None);

        let page = respond(&Method::GET, "/", dir.path(), &rx).await;
        let html = String::from_utf8(body(page).await).unwrap();
        assert!(html.contains("./webview.js"));
        assert!(html.contains("./webview.css"));
    }

    #[tokio::test]
    async fn test_refuses_paths_outside_output() {
        let dir = out_dir();
        let (_tx, rx) = watch::channel(None);

        let escape = respond(&Method::GET, "/../secret.txt", dir.path(), &rx).await;
        assert_eq!(escape.status(), StatusCode::BAD_REQUEST);
        let missing = respond(&Method::GET, "/nope.js", dir.path(), &rx).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let post = respond(&Method::POST, "/webview.js", dir.path(), &rx).await;
        assert_eq!(post.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_build_status_follows_latest_build() {
        let dir = out_dir();
        let (tx, rx) = watch::channel(None);

        let pending = respond(&Method::GET, BUILD_STATUS_PATH, dir.path(), &rx).await;
        assert_eq!(pending.status(), StatusCode::SERVICE_UNAVAILABLE);

        tx.send_replace(Some(artifacts(dir.path())));
        let ready = respond(&Method::GET, BUILD_STATUS_PATH, dir.path(), &rx).await;
        assert_eq!(ready.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body(ready).await).unwrap();
        assert_eq!(json["script"], "webview.js");
    }

    #[tokio::test]
    async fn test_head_has_headers_but_no_body() {
        let dir = out_dir();
        let (_tx, rx) = watch::channel(None);

        let head = respond(&Method::HEAD, "/webview.js", dir.path(), &rx).await;
        assert_eq!(head.status(), StatusCode::OK);
        assert_eq!(head.headers()[CONTENT_TYPE], "text/javascript; charset=utf-8");
        assert!(body(head).await.is_empty());
    }

    #[tokio::test]
    async fn test_server_answers_over_tcp() {
        let dir = out_dir();
        let (_tx, rx) = watch::channel(None);
        let server = DevServer::bind(0, dir.path(), rx).await.unwrap();
        let addr = server.local_addr().unwrap();
        let task = tokio::spawn(server.run());

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /webview.js HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let raw = String::from_utf8_lossy(&raw);

        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.ends_with("render();"));
        task.abort();
    }
}
