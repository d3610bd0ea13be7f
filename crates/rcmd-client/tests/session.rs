//! End-to-end client sessions over loopback
//!
//! A scripted server stands in for rlogind/rshd. Source ports come from a
//! high range so the tests run without privileges.

use std::io;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use rcmd_client::{handshake, mux, session, Closed, SignalBridge, Target};
use rcmd_core::{ClientConfig, Connector, PortRange, RawModeGuard, RcmdError, TerminalControl};
use rcmd_protocol::io::read_string;
use rcmd_protocol::{LoginRequest, ShellRequest, WindowSize};

/// Terminal whose size the test can change between notifications
#[derive(Clone)]
struct ScriptedTerminal {
    size: Arc<Mutex<WindowSize>>,
}

impl ScriptedTerminal {
    fn new(rows: u16, cols: u16) -> Self {
        Self {
            size: Arc::new(Mutex::new(WindowSize::new(rows, cols))),
        }
    }

    fn resize(&self, rows: u16, cols: u16) {
        *self.size.lock().unwrap() = WindowSize::new(rows, cols);
    }
}

impl TerminalControl for ScriptedTerminal {
    fn window_size(&self) -> io::Result<WindowSize> {
        Ok(*self.size.lock().unwrap())
    }

    fn speed(&self) -> Option<String> {
        Some("38400".into())
    }

    fn enter_raw_mode(&self) -> io::Result<RawModeGuard> {
        Ok(RawModeGuard::noop())
    }
}

fn test_config(high: u16) -> ClientConfig {
    ClientConfig {
        ports: PortRange::new(high, high - 199).unwrap(),
        report_progress: false,
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn test_login_forwards_keystrokes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let service = listener.local_addr().unwrap().port().to_string();
    let config = test_config(43999);

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        assert_eq!(read_string(&mut stream, "empty").await.unwrap(), "");
        assert_eq!(read_string(&mut stream, "client user").await.unwrap(), "alice");
        assert_eq!(read_string(&mut stream, "server user").await.unwrap(), "bob");
        assert_eq!(read_string(&mut stream, "terminal").await.unwrap(), "xterm/38400");
        stream.write_all(&[0]).await.unwrap();

        let mut initial = [0u8; 12];
        stream.read_exact(&mut initial).await.unwrap();
        assert_eq!(initial, WindowSize::new(24, 80).to_bytes());

        let mut typed = [0u8; 3];
        stream.read_exact(&mut typed).await.unwrap();
        assert_eq!(&typed, b"ls\n");
        stream.write_all(b"file.txt\r\n").await.unwrap();
    });

    let primary = Connector::new(config.ports)
        .connect_login("127.0.0.1", &service)
        .await
        .unwrap();
    let mut stream = primary.stream;
    let request = LoginRequest::new("alice", "bob", "xterm", "38400");
    handshake::login(&mut stream, &request).await.unwrap();

    let (mut keyboard, input) = tokio::io::duplex(64);
    let (output, mut screen) = tokio::io::duplex(64);
    keyboard.write_all(b"ls\n").await.unwrap();

    let terminal = ScriptedTerminal::new(24, 80);
    let mut resize = SignalBridge::unregistered().unwrap();
    let closed = mux::login(stream, input, output, &terminal, &mut resize)
        .await
        .unwrap();

    assert_eq!(closed, Closed::Connection);
    let mut echoed = vec![0u8; 10];
    screen.read_exact(&mut echoed).await.unwrap();
    assert_eq!(echoed, b"file.txt\r\n");
    server.await.unwrap();
}

#[tokio::test]
async fn test_login_resize_sends_record() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let service = listener.local_addr().unwrap().port().to_string();
    let config = test_config(43699);

    let (resized_tx, resized_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for field in ["empty", "client user", "server user", "terminal"] {
            read_string(&mut stream, field).await.unwrap();
        }
        stream.write_all(&[0]).await.unwrap();

        let mut record = [0u8; 12];
        stream.read_exact(&mut record).await.unwrap();
        assert_eq!(record, WindowSize::new(24, 80).to_bytes());

        let _ = resized_tx.send(());
        stream.read_exact(&mut record).await.unwrap();
        assert_eq!(
            record,
            [0xFF, 0xFF, 0x73, 0x73, 0x00, 0x28, 0x00, 0x64, 0x00, 0x00, 0x00, 0x00]
        );
    });

    let primary = Connector::new(config.ports)
        .connect_login("127.0.0.1", &service)
        .await
        .unwrap();
    let mut stream = primary.stream;
    handshake::login(&mut stream, &LoginRequest::new("alice", "alice", "vt100", "9600"))
        .await
        .unwrap();

    let (_keyboard, input) = tokio::io::duplex(64);
    let (output, _screen) = tokio::io::duplex(64);
    let terminal = ScriptedTerminal::new(24, 80);
    let mut resize = SignalBridge::unregistered().unwrap();

    // Stand-in for SIGWINCH: change the size, then post a token
    let window = terminal.clone();
    let notifier = resize.notifier().unwrap();
    tokio::spawn(async move {
        if resized_rx.await.is_ok() {
            window.resize(40, 100);
            notifier.post();
        }
    });

    let closed = mux::login(stream, input, output, &terminal, &mut resize)
        .await
        .unwrap();
    assert_eq!(closed, Closed::Connection);
    server.await.unwrap();
}

#[tokio::test]
async fn test_shell_rejection_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let service = listener.local_addr().unwrap().port().to_string();
    let config = test_config(43399);

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for field in ["stderr port", "client user", "server user", "command"] {
            read_string(&mut stream, field).await.unwrap();
        }
        stream.write_all(b"\x01Authentication failure\n").await.unwrap();
    });

    let target = Target::new("127.0.0.1", service, "alice", Some("root".into()));
    let err = session::shell(&config, &target, &["id".to_string()], false)
        .await
        .unwrap_err();

    match err {
        RcmdError::HandshakeRejected { code, reason } => {
            assert_eq!(code, Some(1));
            assert_eq!(reason.as_deref(), Some("Authentication failure"));
        }
        other => panic!("unexpected error: {other}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_shell_request_carries_joined_command() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let service = listener.local_addr().unwrap().port().to_string();
    let config = test_config(43099);

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut byte = [0u8; 1];
        while raw.iter().filter(|&&b| b == 0).count() < 4 {
            stream.read_exact(&mut byte).await.unwrap();
            raw.push(byte[0]);
        }
        stream.write_all(&[0]).await.unwrap();
        raw
    });

    let (primary, listener) = Connector::new(config.ports)
        .connect_shell("127.0.0.1", &service)
        .await
        .unwrap();
    let mut stream = primary.stream;
    let request = ShellRequest::from_words(
        Some(listener.port()),
        "alice",
        "alice",
        &["ls", "-la"],
    );
    handshake::shell(&mut stream, &request).await.unwrap();

    let raw = server.await.unwrap();
    let expected = format!("{}\0alice\0alice\0ls -la\0", listener.port());
    assert_eq!(raw, expected.as_bytes());
}
