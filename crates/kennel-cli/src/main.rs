//! Kennel CLI - Main Entry Point
//!
//! Runs the dog service against an in-memory record store. Requests are
//! `METHOD PATH [k=v&k=v]` lines, taken from the arguments or, when none are
//! given, read from stdin until EOF.
//!
//! Usage:
//!     kennel "GET /dog" "POST /dog name=Rex&breed=Pug" "DELETE /dog/2"
//!     printf 'GET /dog\nPUT /dog\n' | kennel --log-level debug

mod logging;

use std::io::Write;

use clap::Parser;
use kennel::request::{content_type, error_response};
use kennel::{AppConfig, DogService, MigrationPolicy, Request, Response, StatusCode};
use kennel_core::storage::{Database, MemoryFactory};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "kennel")]
#[command(about = "Serve dog requests from an in-memory record store")]
#[command(version)]
struct Args {
    /// Database name
    #[arg(long, default_value = "myDB")]
    db_name: String,

    /// Database version; opening above the stored version runs the migration
    #[arg(long, default_value_t = 1)]
    db_version: u32,

    /// What a migration does with an existing dogs store (recreate, preserve)
    #[arg(long, default_value = "recreate")]
    migration: MigrationPolicy,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Requests to run, e.g. "GET /dog" or "POST /dog name=Rex&breed=Pug"
    requests: Vec<String>,
}

impl Args {
    fn config(&self) -> AppConfig {
        AppConfig {
            db_name: self.db_name.clone(),
            db_version: self.db_version,
            migration: self.migration,
        }
    }
}

/// Status line followed by the body.
fn render(response: &Response) -> String {
    format!(
        "{} {}\n{}",
        response.status().as_u16(),
        content_type(response),
        response.body()
    )
}

/// Run one request line and return what to print for it.
async fn serve_line<D: Database>(service: &DogService<D>, line: &str) -> String {
    let request = match Request::parse_line(line) {
        Ok(request) => request,
        Err(err) => {
            warn!(line, error = %err, "skipping request");
            return render(&error_response(err.status(), err.to_string()));
        }
    };

    match service.handle(&request).await {
        Some(response) => render(&response),
        None => render(&error_response(
            StatusCode::NOT_FOUND,
            format!("no route for {} {}", request.method, request.path),
        )),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(&args.log_level);

    info!("Starting kennel v{}", env!("CARGO_PKG_VERSION"));

    let factory = MemoryFactory::new();
    let service = kennel::start(&factory, args.config()).await?;

    let mut stdout = std::io::stdout().lock();

    if !args.requests.is_empty() {
        for line in &args.requests {
            writeln!(stdout, "{}", serve_line(&service, line).await)?;
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        writeln!(stdout, "{}", serve_line(&service, line).await)?;
        stdout.flush()?;
    }

    Ok(())
}
