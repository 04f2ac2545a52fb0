use clap::Parser;
use log::info;
use qt_protocol::{MockQtServer, MockScript, MockServerConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mock_qt_server")]
#[command(about = "Mock QT clustering server answering from a JSON script")]
struct Args {
    /// Address to bind the TCP server to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    address: String,

    /// JSON script describing tables, cluster count and stored files
    #[arg(short, long)]
    script: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    info!("🚀 Starting mock clustering server with args: {:?}", args);

    let script = match &args.script {
        Some(path) => MockScript::from_json_file(path)?,
        None => MockScript::default(),
    };

    let mut server = MockQtServer::new(MockServerConfig {
        bind_address: args.address,
        script,
    });

    let should_stop = Arc::new(AtomicBool::new(false));
    let should_stop_clone = should_stop.clone();
    ctrlc::set_handler(move || {
        info!("🛑 Received Ctrl+C, shutting down...");
        should_stop_clone.store(true, Ordering::Relaxed);
    })?;

    let port = server.start()?;
    info!("🧪 Mock clustering server started on port {}", port);

    while !should_stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    server.stop();
    info!("🛑 Mock clustering server stopped");

    Ok(())
}
