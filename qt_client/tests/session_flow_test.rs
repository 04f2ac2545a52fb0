//! End-to-end session tests against the mock clustering server

use qt_client::{FlowConfig, LineConsole, SaveMode, Session, SessionState};
use qt_protocol::{
    MockQtServer, MockScript, MockServerConfig, MockServerHandle, TransportConfig, Value,
};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

fn start_server() -> MockServerHandle {
    start_scripted_server(MockScript {
        tables: vec!["playtennis".to_string()],
        cluster_count: 2,
        ..MockScript::default()
    })
}

fn start_scripted_server(script: MockScript) -> MockServerHandle {
    let config = MockServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        script,
    };
    MockQtServer::new(config)
        .start_background()
        .expect("Failed to start mock server")
}

fn transport() -> TransportConfig {
    TransportConfig {
        connect_timeout: Some(Duration::from_secs(2)),
        read_timeout: Some(Duration::from_secs(5)),
        write_timeout: Some(Duration::from_secs(5)),
    }
}

#[test_log::test]
fn test_cluster_save_and_reload() {
    let server = start_server();
    let mut session =
        Session::connect("127.0.0.1", server.port, &transport(), FlowConfig::default())
            .expect("Failed to connect");
    assert_eq!(session.state(), SessionState::Idle);

    let input = "2\nplaytennis\n1.5\ntennis.dat\nn\ny\n1\ntennis.dat\nn\n";
    let mut console = LineConsole::new(input.as_bytes(), Vec::new(), Vec::new());

    session.run(&mut console).unwrap();

    let output = String::from_utf8(console.output().clone()).unwrap();
    assert!(output.contains("Number of Clusters:2"));
    assert_eq!(
        output
            .matches("2 clusters on playtennis (radius 1.5)")
            .count(),
        2,
        "description shown after clustering and after reload"
    );
    assert!(console.errors().is_empty());
    assert_eq!(session.state(), SessionState::Clustered);

    assert_eq!(
        server.received(),
        vec![
            vec![Value::Int(0), Value::from("playtennis")],
            vec![Value::Int(1), Value::Float(1.5)],
            vec![Value::Int(2), Value::from("tennis.dat")],
            vec![Value::Int(3), Value::from("tennis.dat")],
        ]
    );
}

#[test_log::test]
fn test_server_errors_are_reported_and_recovered() {
    let server = start_server();
    let flow = FlowConfig {
        save_mode: SaveMode::Never,
        ..FlowConfig::default()
    };
    let mut session = Session::connect("127.0.0.1", server.port, &transport(), flow).unwrap();

    // Unknown table, then a missing file, then a working clustering run
    let input = "2\nIris\n1\nnothing.dat\ny\n2\nplaytennis\n3\nn\nn\n";
    let mut console = LineConsole::new(input.as_bytes(), Vec::new(), Vec::new());

    session.run(&mut console).unwrap();

    let errors = String::from_utf8(console.errors().clone()).unwrap();
    assert!(errors.contains("table not found"));
    assert!(errors.contains("file not found: nothing.dat"));
    assert_eq!(session.state(), SessionState::Clustered);
    assert_eq!(server.received().len(), 4);
}

#[test_log::test]
fn test_timeout_ends_session_without_further_requests() {
    let server = start_scripted_server(MockScript {
        reply_delay_ms: 600,
        ..MockScript::default()
    });
    let transport = TransportConfig {
        read_timeout: Some(Duration::from_millis(200)),
        ..transport()
    };
    let mut session =
        Session::connect("127.0.0.1", server.port, &transport, FlowConfig::default()).unwrap();

    // Anything after the timed out table load must stay unsent
    let input = "2\nplaytennis\n1\nout.dat\ny\n1\nclusters.dat\n";
    let mut console = LineConsole::new(input.as_bytes(), Vec::new(), Vec::new());

    session.run(&mut console).unwrap();

    let errors = String::from_utf8(console.errors().clone()).unwrap();
    assert!(errors.contains("Timed out waiting for the server"));
    assert!(errors.contains("Connection to the server lost."));
    assert_eq!(session.state(), SessionState::Disconnected);

    std::thread::sleep(Duration::from_millis(800));
    assert_eq!(server.received(), vec![vec![Value::Int(0), Value::from("playtennis")]]);
}

#[test]
fn test_binary_rejects_missing_arguments() {
    let status = Command::new(env!("CARGO_BIN_EXE_qt-client"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());

    let status = Command::new(env!("CARGO_BIN_EXE_qt-client"))
        .args(["localhost", "not-a-port"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn test_binary_exits_when_server_unreachable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let status = Command::new(env!("CARGO_BIN_EXE_qt-client"))
        .args(["127.0.0.1", &port.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_binary_runs_scripted_session() {
    let server = start_server();

    let mut child = Command::new(env!("CARGO_BIN_EXE_qt-client"))
        .args(["127.0.0.1", &server.port.to_string(), "--save-mode", "never"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"2\nplaytennis\n0.75\nn\nn\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 clusters on playtennis (radius 0.75)"));
}
