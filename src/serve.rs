//! Development file server for `pagesmith serve`.
//!
//! A blocking [`tiny_http`] server over the site's `build/` directory:
//!
//! - exact file match → the file, with a content type guessed from its
//!   extension
//! - directory with `index.html` → that `index.html`
//! - anything else, including paths that try to climb out with `..` → 404
//!
//! There is no file watching; rerun `pagesmith build` (or restart `serve`) to
//! pick up changes.

use crate::build::BUILD_DIR;
use std::fs;
use std::io::{self, Cursor};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{debug, info, warn};

/// Port used when none is given on the command line.
pub const DEFAULT_PORT: u16 = 8000;

/// How many successive ports to try before giving up.
const MAX_PORT_RETRIES: u16 = 10;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("failed to bind after {attempts} attempts (ports {first}-{last}): {message}")]
    Bind {
        attempts: u16,
        first: u16,
        last: u16,
        message: String,
    },
    #[error("nothing to serve: {0} does not exist, run `pagesmith build` first")]
    MissingBuildDir(PathBuf),
}

/// Serve `<site_root>/build` on localhost until the process is killed.
pub fn serve(site_root: &Path, port: u16) -> Result<(), ServeError> {
    let root = site_root.join(BUILD_DIR);
    if !root.is_dir() {
        return Err(ServeError::MissingBuildDir(root));
    }

    let (server, addr) = try_bind_port(IpAddr::V4(Ipv4Addr::LOCALHOST), port)?;
    println!("==> Serving {} at http://{}", root.display(), addr);
    info!("listening on {addr}");

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &root) {
            warn!("request error: {e}");
        }
    }
    Ok(())
}

/// Bind to `base_port`, moving up one port at a time while it is taken.
fn try_bind_port(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr), ServeError> {
    let mut last_error = String::new();
    let mut last_port = base_port;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        last_port = port;
        let addr = SocketAddr::new(interface, port);
        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    println!("port {base_port} in use, using {port} instead");
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(ServeError::Bind {
        attempts: MAX_PORT_RETRIES,
        first: base_port,
        last: last_port,
        message: last_error,
    })
}

fn handle_request(request: Request, root: &Path) -> io::Result<()> {
    debug!("{} {}", request.method(), request.url());
    match resolve_request_path(root, request.url()) {
        Some(path) => serve_file(request, &path),
        None => serve_not_found(request),
    }
}

/// Map a request URL to a file under `root`.
///
/// Query strings are dropped and percent-escapes decoded. Returns `None`
/// for anything outside `root` or not backed by a file.
pub fn resolve_request_path(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let decoded = urlencoding::decode(path).ok()?;
    let relative = Path::new(decoded.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let local = root.join(relative);
    if local.is_file() {
        return Some(local);
    }
    let index = local.join("index.html");
    index.is_file().then_some(index)
}

fn serve_file(request: Request, path: &Path) -> io::Result<()> {
    let content = fs::read(path)?;
    let response = Response::from_data(content).with_header(content_type(guess_content_type(path))?);
    request.respond(response)
}

fn serve_not_found(request: Request) -> io::Result<()> {
    let body = "404 Not Found";
    let response = Response::new(
        StatusCode(404),
        vec![content_type("text/plain; charset=utf-8")?],
        Cursor::new(body),
        Some(body.len()),
        None,
    );
    request.respond(response)
}

fn content_type(value: &str) -> io::Result<Header> {
    Header::from_bytes(&b"Content-Type"[..], value.as_bytes())
        .map_err(|()| io::Error::new(io::ErrorKind::InvalidData, "invalid header value"))
}

/// Guess MIME content type from file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
