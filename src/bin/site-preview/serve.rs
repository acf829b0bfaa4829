use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;

use crate::args::Args;
use crate::error::Result;

pub(crate) fn run(args: &Args) -> Result<()> {
    let root = match args.root.as_deref() {
        Some(path) => dunce::canonicalize(path)
            .with_context(|| format!("failed to resolve `{}`", path.display()))?,
        None => exe_dir()?,
    };
    std::env::set_current_dir(&root)
        .with_context(|| format!("failed to enter `{}`", root.display()))?;

    if !root.join("index.html").is_file() {
        anyhow::bail!(
            "index.html not found in `{}`; run this from your site directory or pass `--root`",
            root.display()
        );
    }

    let mut server = site_preview::ServerBuilder::new(&root);
    server.hostname("0.0.0.0");
    server.port(args.port);
    let server = Arc::new(server.build());

    if let Err(e) = server.bind() {
        if e.is_addr_in_use() {
            anyhow::bail!(
                "port {} is already in use; try the next one: `site-preview {}`",
                args.port,
                args.port.saturating_add(1)
            );
        }
        return Err(e).context("failed to start the server");
    }

    let url = format!("http://localhost:{}", server.port());
    log::info!("Serving {} through static file server", root.display());
    log::info!("Server running at {url}");
    log::info!("Ctrl-c to stop the server");

    if !args.no_open {
        open_browser(&url);
    }

    let handle = Arc::clone(&server);
    ctrlc::set_handler(move || handle.close())
        .context("failed to install the interrupt handler")?;

    serve(&server)?;
    log::info!("Server stopped");

    Ok(())
}

fn serve(server: &site_preview::Server) -> Result<()> {
    server.serve().context("the server failed")?;
    Ok(())
}

fn open_browser(url: &str) {
    match open::that(url) {
        Ok(()) => log::info!("Please check your browser!"),
        Err(why) => log::warn!("Failed to open a browser: {why}"),
    }
}

fn exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate the running executable")?;
    let dir = exe
        .parent()
        .context("the running executable has no parent directory")?;
    Ok(dunce::canonicalize(dir)?)
}
