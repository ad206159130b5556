//! `--enableSSL`: the agent mints a certificate on first start, reuses it on
//! the next, and serves wss that a client trusting that cert can join.

use std::fs;
use std::io::BufReader;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use rustls::{ClientConfig, RootCertStore};
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message, Connector};

struct Agent(Child);

impl Drop for Agent {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn free_port() -> u16 {
    let l = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    l.local_addr().unwrap().port()
}

fn start_agent(xdg: &Path, root: &Path, port: u16) -> Agent {
    let child = Command::new(env!("CARGO_BIN_EXE_cgtop_agent"))
        .env("XDG_CONFIG_HOME", xdg)
        .args(["--enableSSL", "--bind", "127.0.0.1", "-p", &port.to_string()])
        .arg("--root")
        .arg(root)
        .spawn()
        .expect("spawn agent");
    Agent(child)
}

fn wait_listening(port: u16) {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        if std::net::TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("agent never listened on {port}");
}

fn trusting(cert: &Path) -> ClientConfig {
    let mut roots = RootCertStore::empty();
    let mut rd = BufReader::new(fs::File::open(cert).expect("open cert"));
    for c in rustls_pemfile::certs(&mut rd) {
        roots.add(c.expect("pem cert")).expect("add root");
    }
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_root_certificates(roots)
        .with_no_client_auth()
}

fn cert_paths(xdg: &Path) -> (PathBuf, PathBuf) {
    let dir = xdg.join("cgtop_agent").join("tls");
    (dir.join("cert.pem"), dir.join("key.pem"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wss_handshake_trusts_generated_cert_for_localhost() {
    let td = tempfile::tempdir().expect("tempdir");
    let xdg = td.path().join("config");
    let root = td.path().join("cg");
    fs::create_dir_all(root.join("a")).unwrap();
    let (cert, key) = cert_paths(&xdg);

    let port = free_port();
    let agent = start_agent(&xdg, &root, port);
    wait_listening(port);
    assert!(cert.exists() && key.exists());
    assert!(fs::read_to_string(&key).unwrap().contains("PRIVATE KEY"));

    // Hostname verification against "localhost" only passes if the SAN lists it.
    let connector = Connector::Rustls(Arc::new(trusting(&cert)));
    let url = format!("wss://localhost:{port}/ws");
    let (mut ws, _) = connect_async_tls_with_config(url.as_str(), None, false, Some(connector))
        .await
        .expect("wss handshake");
    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("no frame in time");
    match frame {
        Some(Ok(Message::Text(t))) => assert!(t.contains("\"location\":\"/\""), "{t}"),
        other => panic!("unexpected frame {other:?}"),
    }
    drop(ws);
    drop(agent);

    // A restart keeps the existing material.
    let before = fs::read_to_string(&cert).unwrap();
    let port = free_port();
    let _agent = start_agent(&xdg, &root, port);
    wait_listening(port);
    assert_eq!(fs::read_to_string(&cert).unwrap(), before);
}
