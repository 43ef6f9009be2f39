// Browser agent console
//
// Terminal front end for the remote browser-automation agent: sends commands
// over HTTP and prints the stream-driven session view.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use browser_agent_console::{
    CommandChannel, ConnectionManager, ConsoleOptions, ConsoleOptionsBuilder, HttpCommandChannel,
    LogEntry, Provider, ReconnectPolicy, Session, SessionController, SessionState, TaskRequest,
    UploadFile, WebSocketConnector, image_data_url, write_csv, write_json,
};

#[derive(Debug, Parser)]
#[command(name = "browser-agent-console", version, about = "Drive a remote browser-automation agent")]
struct Cli {
    /// Backend root URL
    #[arg(long, global = true, env = "AGENT_CONSOLE_URL")]
    url: Option<String>,

    /// Command timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a task and follow it until it finishes
    Run(RunArgs),
    /// Pause the running task
    Pause,
    /// Resume the paused task
    Resume,
    /// Stop the current task
    Stop,
    /// Print the backend's status report
    Status,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Natural-language task for the agent
    #[arg(long, short)]
    task: String,

    /// Model identifier (defaults to DEFAULT_MODEL or gemini-pro)
    #[arg(long)]
    model: Option<String>,

    /// LLM provider (openai, gemini, anthropic); inferred from the model when absent
    #[arg(long)]
    provider: Option<Provider>,

    /// API key for the provider
    #[arg(long, env = "AGENT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Document to upload as task context
    #[arg(long, value_name = "PATH")]
    document: Option<PathBuf>,

    /// Image to attach as task context
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Page the agent should start from
    #[arg(long, value_name = "URL")]
    start_url: Option<String>,

    /// Step limit for the agent
    #[arg(long)]
    max_steps: Option<u32>,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Back off exponentially and give up after five reconnect attempts
    #[arg(long)]
    exponential_reconnect: bool,

    /// Write results as CSV
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Write results as JSON
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut builder = ConsoleOptionsBuilder::from_env()?;
    if let Some(url) = &cli.url {
        builder = builder.base_url(url.clone());
    }
    if let Some(secs) = cli.timeout {
        builder = builder.command_timeout(Duration::from_secs(secs));
    }

    match cli.command {
        Command::Run(args) => {
            if args.exponential_reconnect {
                builder = builder.reconnect(ReconnectPolicy::exponential());
            }
            let options = builder.build()?;
            run(&options, args).await
        }
        Command::Pause => {
            let channel = HttpCommandChannel::new(&builder.build()?)?;
            channel.pause().await?;
            println!("Pause requested");
            Ok(())
        }
        Command::Resume => {
            let channel = HttpCommandChannel::new(&builder.build()?)?;
            channel.resume().await?;
            println!("Resume requested");
            Ok(())
        }
        Command::Stop => {
            let channel = HttpCommandChannel::new(&builder.build()?)?;
            channel.stop().await?;
            println!("Stop requested");
            Ok(())
        }
        Command::Status => {
            let channel = HttpCommandChannel::new(&builder.build()?)?;
            let report = channel.status().await?;
            println!("status:          {}", report.status);
            if let Some(steps) = report.steps_completed {
                println!("steps completed: {steps}");
            }
            if let Some(count) = report.results_count {
                println!("results:         {count}");
            }
            Ok(())
        }
    }
}

async fn run(options: &ConsoleOptions, args: RunArgs) -> Result<()> {
    log::debug!("Options: {options:?}");

    let mut connection = ConnectionManager::new(
        WebSocketConnector::new(options.stream_url()?),
        options.reconnect,
        options.keepalive,
    );
    let events = connection
        .take_events()
        .context("event receiver already taken")?;
    let mut transitions = connection.subscribe_status();
    if let Err(e) = connection.open().await {
        log::warn!("Agent stream unavailable, retrying in the background: {e}");
    }

    let controller = SessionController::spawn(HttpCommandChannel::new(options)?, events, options);
    let outcome = follow(&controller, &mut transitions, &args).await;

    let session = controller.snapshot();
    let exported = export(&session, &args).await;

    let _ = controller.shutdown().await;
    connection.close().await?;

    outcome?;
    exported?;
    print_summary(&session);
    Ok(())
}

async fn follow(
    controller: &SessionController,
    transitions: &mut tokio::sync::broadcast::Receiver<browser_agent_console::Connection>,
    args: &RunArgs,
) -> Result<()> {
    if let Some(path) = &args.document {
        let file = UploadFile::from_path(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let document = controller.upload(file).await?;
        println!("Uploaded {}", document.filename);
    }

    let task = build_task(args).await?;
    let task_id = controller.start(task).await?;
    if let Some(id) = task_id {
        log::info!("Task {id} accepted");
    }

    let mut view = controller.subscribe();
    let mut printed = 0;
    let mut seen_active = false;
    let mut stop_sent = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let session = view.borrow_and_update().clone();
        printed = print_entries(&session.log, printed);

        if session.state.is_active() {
            seen_active = true;
        } else if matches!(session.state, SessionState::Completed | SessionState::Error)
            || (seen_active && !session.awaiting_confirmation)
        {
            break;
        }

        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Ok(connection) = transitions.recv() => {
                println!("[stream] {} (retry {})", connection.status, connection.retry_count);
            }
            signal = &mut ctrl_c, if !stop_sent => {
                signal.context("waiting for Ctrl-C")?;
                stop_sent = true;
                println!("Stopping...");
                if let Err(e) = controller.stop().await {
                    log::error!("Stop failed: {e}");
                }
            }
        }
    }
    Ok(())
}

async fn build_task(args: &RunArgs) -> Result<TaskRequest> {
    let mut task = TaskRequest::new(args.task.clone());
    if let Some(model) = &args.model {
        task = task.model(model.clone());
    }
    if let Some(provider) = args.provider {
        task = task.provider(provider);
    }
    if let Some(key) = &args.api_key {
        task = task.api_key(key.clone());
    }
    if let Some(path) = &args.image {
        let file = UploadFile::from_path(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let content_type = file.content_type.as_deref().unwrap_or("image/png");
        task = task.image(image_data_url(content_type, &file.bytes));
    }
    if let Some(url) = &args.start_url {
        task = task.context_value("url", url.clone());
    }
    if let Some(steps) = args.max_steps {
        task = task.max_steps(steps);
    }
    if args.headless {
        task = task.headless(true);
    }
    Ok(task)
}

async fn export(session: &Session, args: &RunArgs) -> Result<()> {
    if let Some(path) = &args.csv {
        write_csv(path, &session.results)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.json {
        write_json(path, &session.results)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn print_entries(log: &[LogEntry], already_printed: usize) -> usize {
    for entry in log.iter().skip(already_printed) {
        println!(
            "[{}] {:>5} {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.level,
            entry.message
        );
    }
    log.len()
}

fn print_summary(session: &Session) {
    println!();
    println!("Final state: {}", session.state);
    if let Some(url) = &session.current_url {
        println!("Last page:   {url}");
    }
    println!("Results:     {}", session.results.len());
    for record in &session.results {
        let label = record.label().unwrap_or_else(|| "-".to_string());
        match record.value() {
            Some(value) => println!("  {label}: {value}"),
            None => println!("  {label}"),
        }
    }
}
