//! > A local preview server for static sites
//!
//! `site_preview` serves a directory of static files over plain HTTP so a
//! site can be eyeballed in a browser before it is published.  It prioritizes
//! small size and compile times over speed, scalability, or security; keep it
//! off the open internet.
//!
//! # Example
//!
//! ```rust,no_run
//! let path = std::env::current_dir().unwrap();
//! let server = site_preview::Server::new(&path);
//!
//! println!("Serving {}", path.display());
//! println!("See http://{}", server.addr());
//! println!("Hit CTRL-C to stop");
//!
//! server.serve().unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::str::FromStr;
use std::sync::{RwLock, TryLockError};

/// Custom server settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerBuilder {
    source: std::path::PathBuf,
    hostname: Option<String>,
    port: Option<u16>,
}

impl ServerBuilder {
    pub fn new(source: impl Into<std::path::PathBuf>) -> Self {
        Self {
            source: source.into(),
            hostname: None,
            port: None,
        }
    }

    /// Override the hostname
    ///
    /// Defaults to `localhost`; pass `0.0.0.0` to serve on all interfaces.
    pub fn hostname(&mut self, hostname: impl Into<String>) -> &mut Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Override the port
    ///
    /// By default, the first available port is selected.
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    /// Create a server
    ///
    /// This is needed for accessing the dynamically assigned port
    pub fn build(&self) -> Server {
        let source = self.source.clone();
        let hostname = self.hostname.as_deref().unwrap_or("localhost");
        let port = self
            .port
            .or_else(|| get_available_port(hostname))
            // Just have `serve` error out
            .unwrap_or(8000);

        Server {
            source,
            addr: format!("{hostname}:{port}"),
            port,
            server: RwLock::new(None),
        }
    }

    /// Start the webserver
    pub fn serve(&self) -> Result<(), Error> {
        self.build().serve()
    }
}

pub struct Server {
    source: std::path::PathBuf,
    addr: String,
    port: u16,
    server: RwLock<Option<tiny_http::Server>>,
}

impl Server {
    /// Serve on the first available port on localhost
    pub fn new(source: impl Into<std::path::PathBuf>) -> Self {
        ServerBuilder::new(source).build()
    }

    /// The location being served
    pub fn source(&self) -> &std::path::Path {
        self.source.as_path()
    }

    /// The address the server is available at
    ///
    /// This is useful for telling users how to access the served up files since the port is
    /// dynamically assigned by default.
    pub fn addr(&self) -> &str {
        self.addr.as_str()
    }

    /// The port the server is bound to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the server currently holds its listening socket
    pub fn is_running(&self) -> bool {
        matches!(self.server.read().as_deref(), Ok(Some(_)))
    }

    /// Bind the listening socket without serving yet
    ///
    /// Lets callers report bind failures (and open browsers) before committing
    /// the current thread to the accept loop.  A no-op when already bound.
    pub fn bind(&self) -> Result<(), Error> {
        match self.server.try_write().as_deref_mut() {
            Ok(Some(_)) => Ok(()),
            Ok(server @ None) => {
                *server = Some(tiny_http::Server::http(self.addr()).map_err(Error::bind)?);
                Ok(())
            }
            Err(TryLockError::WouldBlock) => Err(Error::new("the server is running")),
            Err(error @ TryLockError::Poisoned(_)) => Err(Error::new(error)),
        }
    }

    /// Serve requests, blocking the current thread
    ///
    /// Requests are handled one at a time, in the order they are accepted.
    /// Returns once [`Server::close`] is called; the socket is released before
    /// returning.
    pub fn serve(&self) -> Result<(), Error> {
        self.bind()?;

        {
            let server = self.server.read().map_err(Error::new)?;
            // `bind` either stored a listener or errored out
            let server = server.as_ref().expect("bound above");
            for request in server.incoming_requests() {
                log::debug!("{} {}", request.method(), request.url());
                if let Err(e) = static_file_handler(self.source(), request) {
                    log::error!("{e}");
                }
            }
        }

        *self.server.write().map_err(Error::new)? = None;

        Ok(())
    }

    /// Closes the server gracefully
    ///
    /// Unblocks a concurrent [`Server::serve`]; safe to call from another
    /// thread or a signal handler, and idempotent.
    pub fn close(&self) {
        if let Ok(Some(server)) = self.server.read().as_deref() {
            server.unblock();
        }
    }
}

/// Serve Error
#[derive(Debug)]
pub struct Error {
    message: String,
    addr_in_use: bool,
}

impl Error {
    fn new(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
            addr_in_use: false,
        }
    }

    fn bind(error: Box<dyn std::error::Error + Send + Sync + 'static>) -> Self {
        let addr_in_use = error
            .downcast_ref::<std::io::Error>()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::AddrInUse);
        Self {
            message: error.to_string(),
            addr_in_use,
        }
    }

    /// Whether the bind address was already held by another listener
    ///
    /// Checked through [`std::io::ErrorKind::AddrInUse`] rather than a raw
    /// errno, so it holds across platforms.
    pub fn is_addr_in_use(&self) -> bool {
        self.addr_in_use
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.message.fmt(fmt)
    }
}

impl std::error::Error for Error {}

fn static_file_handler(root: &std::path::Path, req: tiny_http::Request) -> Result<(), Error> {
    match route(root, req.url()) {
        Route::File(path) => {
            let file = std::fs::File::open(&path).map_err(Error::new)?;
            let mut response = tiny_http::Response::from_file(file);
            if let Some(mime) = mime_guess::MimeGuess::from_path(&path).first_raw() {
                let content_type = format!("Content-Type: {mime}");
                let content_type =
                    tiny_http::Header::from_str(&content_type).expect("formatted correctly");
                response.add_header(content_type);
            }
            req.respond(response).map_err(Error::new)
        }
        Route::Redirect(location) => {
            let location = format!("Location: {location}");
            req.respond(
                tiny_http::Response::empty(301)
                    .with_header(tiny_http::Header::from_str(&location).expect("formatted correctly")),
            )
            .map_err(Error::new)
        }
        Route::NotFound => {
            // write a simple body for the 404 page
            req.respond(
                tiny_http::Response::from_string(
                    "<h1> <center> 404: Page not found </center> </h1>",
                )
                .with_status_code(404)
                .with_header(
                    tiny_http::Header::from_str("Content-Type: text/html")
                        .expect("formatted correctly"),
                ),
            )
            .map_err(Error::new)
        }
    }
}

/// Where a request URL leads under the serving root
#[derive(Clone, Debug, PartialEq, Eq)]
enum Route {
    File(std::path::PathBuf),
    /// Directory hit without a trailing slash; relative links inside its
    /// index only resolve once the browser is on the slashed form.
    Redirect(String),
    NotFound,
}

/// Map a request URL to a file under `root`
///
/// Directory requests fall back to the `index.html` inside them. Requests
/// that try to climb out of `root` resolve to [`Route::NotFound`].
fn route(root: &std::path::Path, url: &str) -> Route {
    // strip off any querystring so the file lookup isn't defeated by
    // cachebusting
    let raw_path = match url.find('?') {
        Some(position) => &url[..position],
        None => url,
    };

    // browsers escape spaces and friends before sending the request
    let Ok(req_path) = urlencoding::decode(raw_path) else {
        return Route::NotFound;
    };

    // refuse `..` components so the lookup stays inside the serving root
    let rel_path = std::path::Path::new(req_path.trim_start_matches('/'));
    if !rel_path.components().all(|component| {
        matches!(
            component,
            std::path::Component::Normal(_) | std::path::Component::CurDir
        )
    }) {
        return Route::NotFound;
    }

    let path = root.join(rel_path);
    if path.is_file() {
        return Route::File(path);
    }

    if path.is_dir() {
        if !raw_path.ends_with('/') {
            return Route::Redirect(format!("{raw_path}/"));
        }
        let index = path.join("index.html");
        if index.is_file() {
            return Route::File(index);
        }
    }

    Route::NotFound
}

fn get_available_port(host: &str) -> Option<u16> {
    // Start after "well-known" ports (0–1023) as they require superuser
    // privileges on UNIX-like operating systems.
    (1024..9000).find(|port| port_is_available(host, *port))
}

fn port_is_available(host: &str, port: u16) -> bool {
    std::net::TcpListener::bind((host, port)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();
        std::fs::write(dir.path().join("styles.css"), "body {}").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("index.html"), "<p>docs</p>").unwrap();
        dir
    }

    #[test]
    fn root_resolves_to_the_entry_file() {
        let site = site();
        let expected = Route::File(site.path().join("index.html"));
        assert_eq!(route(site.path(), "/"), expected);
    }

    #[test]
    fn plain_files_resolve_directly() {
        let site = site();
        let expected = Route::File(site.path().join("styles.css"));
        assert_eq!(route(site.path(), "/styles.css"), expected);
    }

    #[test]
    fn querystrings_are_ignored() {
        let site = site();
        let expected = Route::File(site.path().join("styles.css"));
        assert_eq!(route(site.path(), "/styles.css?v=2"), expected);
    }

    #[test]
    fn directories_with_a_slash_fall_back_to_their_index() {
        let site = site();
        let expected = Route::File(site.path().join("docs").join("index.html"));
        assert_eq!(route(site.path(), "/docs/"), expected);
    }

    #[test]
    fn directories_without_a_slash_redirect() {
        let site = site();
        let expected = Route::Redirect("/docs/".to_owned());
        assert_eq!(route(site.path(), "/docs"), expected);
    }

    #[test]
    fn escaped_paths_are_decoded() {
        let site = site();
        std::fs::write(site.path().join("my page.html"), "<p>hi</p>").unwrap();
        let expected = Route::File(site.path().join("my page.html"));
        assert_eq!(route(site.path(), "/my%20page.html"), expected);
    }

    #[test]
    fn parent_components_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("site");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("index.html"), "<p>home</p>").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "hunter2").unwrap();

        assert_eq!(route(&root, "/../secret.txt"), Route::NotFound);
        assert_eq!(route(&root, "/%2e%2e/secret.txt"), Route::NotFound);
        assert_eq!(route(&root, "/docs/../../secret.txt"), Route::NotFound);
    }

    #[test]
    fn unknown_paths_resolve_to_nothing() {
        let site = site();
        assert_eq!(route(site.path(), "/missing.png"), Route::NotFound);
    }
}
