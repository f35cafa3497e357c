// src/main.rs
// HTTP entry point: parses server options, initialises logging, mounts the JSON API and, when given,
// the directory holding the external renderer's static assets.

use actix_files::Files;
use actix_web::{middleware, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use planar_motion_sim::config::ServerArgs;
use planar_motion_sim::ui::configure_api;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(dir) = &args.static_dir {
        anyhow::ensure!(dir.is_dir(), "static directory {} does not exist", dir.display());
    }

    let bind = (args.host.clone(), args.port);
    info!(host = %bind.0, port = bind.1, static_dir = ?args.static_dir, "starting server");

    let static_dir = args.static_dir.clone();
    let mut server = HttpServer::new(move || {
        let app = App::new().wrap(middleware::Logger::default()).configure(configure_api);
        match &static_dir {
            Some(dir) => app.service(Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    });
    if let Some(workers) = args.workers {
        server = server.workers(workers);
    }

    server
        .bind(bind)
        .with_context(|| format!("failed to bind {}:{}", args.host, args.port))?
        .run()
        .await
        .context("server terminated with an error")
}
