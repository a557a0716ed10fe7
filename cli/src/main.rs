//! Studio CLI: start a production session and drive it interactively.
//!
//! `studio "경제 유튜브 채널"` starts a session and drops into a REPL;
//! every line is sent to the orchestrator as user feedback. `--json`
//! switches to streamed JSON events (one per line), `--session` resumes an
//! existing session, `--delete` removes one.

use std::io::Write as _;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use studio::{InMemorySessionStore, Orchestrator, Registry, SessionStore, SqliteSessionStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "studio")]
#[command(about = "Studio — drive a content production session from the CLI")]
struct Args {
    /// Initial request (e.g. channel topic). Omit with --session to resume.
    request: Option<String>,

    /// Session ID to resume (or to use for a new session)
    #[arg(short, long, value_name = "ID")]
    session: Option<String>,

    /// Output streamed JSON events instead of plain text
    #[arg(long)]
    json: bool,

    /// Delete the given session and exit
    #[arg(long, value_name = "ID")]
    delete: Option<String>,

    /// Keep session state in memory only (no SQLite file)
    #[arg(long)]
    ephemeral: bool,
}

fn print_response(response: &studio::Response) {
    println!("\n[{}] {}\n", response.current_stage, response.message);
    if !response.images.is_empty() {
        println!("({} image(s) attached)", response.images.len());
    }
}

async fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    std::io::stdout().flush().ok()?;
    let (n, buf) = tokio::task::spawn_blocking(|| {
        let mut buf = String::new();
        let n = std::io::stdin().read_line(&mut buf).unwrap_or(0);
        (n, buf)
    })
    .await
    .ok()?;
    if n == 0 {
        return None; // EOF
    }
    Some(buf.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = env_config::load_and_apply("studio", None) {
        tracing::warn!(error = %e, "config load failed, continuing with process env");
    }
    let settings = env_config::Settings::from_env();
    let registry = Registry::from_settings(&settings);

    let store: Arc<dyn SessionStore> = if args.ephemeral {
        Arc::new(InMemorySessionStore::new())
    } else {
        Arc::new(SqliteSessionStore::new(registry.paths.sessions_db())?)
    };
    let orchestrator = Arc::new(Orchestrator::new(registry, store));

    if let Some(ref session_id) = args.delete {
        let deleted = orchestrator.delete_session(session_id).await?;
        println!("deleted: {deleted:?}");
        return Ok(());
    }

    let session_id = args
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if let Some(ref request) = args.request {
        let response = orchestrator
            .start_workflow(request, Some(session_id.clone()))
            .await?;
        if args.json {
            println!("{}", serde_json::to_string(&response)?);
        } else {
            println!("session: {session_id}");
            print_response(&response);
        }
    } else if args.session.is_none() {
        eprintln!("pass an initial request, or --session <ID> to resume");
        std::process::exit(2);
    }

    loop {
        let Some(line) = read_line("> ").await else {
            break;
        };
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        if args.json {
            let mut stream = orchestrator
                .process_message_stream(&session_id, &line, &[])
                .await;
            while let Some(event) = stream.next().await {
                println!("{event}");
            }
        } else {
            match orchestrator.process_message(&session_id, &line, &[]).await {
                Ok(response) => {
                    print_response(&response);
                    if response.current_stage == "completed" {
                        break;
                    }
                }
                Err(e) => eprintln!("error: {e}"),
            }
        }
    }

    Ok(())
}
