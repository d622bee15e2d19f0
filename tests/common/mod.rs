//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use summary_relay::config::{RelayConfig, SummarizerConfig};
use summary_relay::{HttpServer, Shutdown};

/// A summarizer that runs `script` with `sh -c`; the URL arrives as `$1`.
pub fn sh_summarizer(script: &str) -> SummarizerConfig {
    SummarizerConfig {
        program: "sh".into(),
        args: vec!["-c".into(), script.into(), "summarizer".into()],
        ..SummarizerConfig::default()
    }
}

/// Default config with the given summarizer and no static directory.
pub fn config_with(summarizer: SummarizerConfig) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.summarizer = summarizer;
    config.static_files.dir = None;
    config
}

/// A running relay on an ephemeral port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestRelay {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Bind and start a relay server in the background.
pub async fn start_relay(config: RelayConfig) -> TestRelay {
    let listener = tokio::net::TcpListener::bind(&config.listener.bind_address)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.clone());

    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestRelay { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// True while a process with this pid exists.
#[allow(dead_code)]
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("kill -0 {pid} 2>/dev/null"))
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
