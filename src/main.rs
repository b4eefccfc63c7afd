#![deny(unused_crate_dependencies)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod api;
mod cache;
mod clock;
mod config;
mod error;
mod fetch;
mod parse;
mod scheduler;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::{
    api::AppState,
    cache::{FileStore, Multithreaded},
    clock::{Clock, SystemClock},
    config::Config,
    fetch::{make_client, HttpSource, PageSource},
    scheduler::{Schedule, Scheduler},
};

pub use error::{Error, Result};

#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> core::result::Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let config = Config::from_env()?;
    log::info!("Server starting with {config:?}");

    let client = make_client(config.fetch_timeout)?;
    let source: Arc<dyn PageSource> = Arc::new(HttpSource::new(client, config.menu_url.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(Multithreaded::new(
        FileStore::open(&config.data_dir),
        source,
        Arc::clone(&clock),
    ));

    cache.load_current_menu().await;

    let scheduler = Arc::new(Scheduler::new(Schedule::weekly(), clock));
    tokio::spawn(Arc::clone(&scheduler).run(Arc::clone(&cache)));

    let app = api::router(AppState { cache, scheduler });
    let listener = TcpListener::bind(config.addr)
        .await
        .map_err(|e| format!("failed to listen on {}: {e}", config.addr))?;
    log::info!("listening on http://{}", config.addr);
    axum::serve(listener, app).await?;
    Ok(())
}
