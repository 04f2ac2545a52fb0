use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use qt_client::{LineConsole, Overrides, PromptLanguage, SaveMode, Session, Settings};

#[derive(Parser, Debug)]
#[command(name = "qt-client")]
#[command(author, version, long_about = None)]
#[command(about = "Interactive client for the QT clustering server")]
struct Args {
    /// Clustering server host
    host: String,

    /// Clustering server port
    port: u16,

    /// Seconds to wait for a server reply (0 waits forever)
    #[arg(long)]
    read_timeout_secs: Option<u64>,

    /// Seconds to wait for the connection (0 waits forever)
    #[arg(long)]
    connect_timeout_secs: Option<u64>,

    /// When to save clusters after a run: always, ask or never
    #[arg(long)]
    save_mode: Option<SaveMode>,

    /// Prompt language: en or it
    #[arg(long)]
    language: Option<PromptLanguage>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let settings = Settings::load()
        .context("Failed to load configuration")?
        .with_overrides(Overrides {
            read_timeout_secs: args.read_timeout_secs,
            connect_timeout_secs: args.connect_timeout_secs,
            save_mode: args.save_mode,
            language: args.language,
        });
    info!("⚙️ Settings: {:?}", settings);

    let mut session = match Session::connect(
        &args.host,
        args.port,
        &settings.transport(),
        settings.flow(),
    ) {
        Ok(session) => session,
        Err(e) => {
            error!("❌ {}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    info!("🔗 Connected to {}", session.client().peer());

    let mut console = LineConsole::stdio();
    session.run(&mut console).context("Session aborted")?;

    Ok(())
}
