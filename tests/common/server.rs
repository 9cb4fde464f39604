//! Test server management.
//!
//! Spawns and manages beed instances for integration testing.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;

/// A test server instance.
pub struct TestServer {
    child: Child,
    web_port: u16,
    realtime_port: u16,
    data_dir: PathBuf,
}

impl TestServer {
    /// Spawn a daemon with the web transport on `base_port` and the realtime
    /// transport on `base_port + 1`. The console is disabled. `system.Info`
    /// is free; everything else needs a session grant.
    pub async fn spawn(base_port: u16) -> anyhow::Result<Self> {
        let web_port = base_port;
        let realtime_port = base_port + 1;
        let data_dir = std::env::temp_dir().join(format!("beed-test-{base_port}"));
        std::fs::create_dir_all(&data_dir)?;

        let config_path = data_dir.join("bee.toml");
        let config_content = format!(
            r#"
[server]
name = "test-hive"

[database]
url = "sqlite://{}/test.db"

[console]
enabled = false

[web]
address = "127.0.0.1:{web_port}"

[realtime]
address = "127.0.0.1:{realtime_port}"

[[free_actions]]
m = "system"
c = "Info"
"#,
            data_dir.display()
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_beed"))
            .arg(&config_path)
            .stdin(Stdio::null())
            .spawn()?;

        let server = Self {
            child,
            web_port,
            realtime_port,
            data_dir,
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    /// Wait until both listeners accept connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            let web = tokio::net::TcpStream::connect(("127.0.0.1", self.web_port)).await;
            let realtime = tokio::net::TcpStream::connect(("127.0.0.1", self.realtime_port)).await;
            if web.is_ok() && realtime.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    pub fn web_address(&self) -> String {
        format!("127.0.0.1:{}", self.web_port)
    }

    pub fn realtime_url(&self) -> String {
        format!("ws://127.0.0.1:{}/", self.realtime_port)
    }

    /// Open a realtime connection to this server.
    pub async fn connect(&self) -> anyhow::Result<super::client::RealtimeClient> {
        super::client::RealtimeClient::connect(&self.realtime_url()).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}
