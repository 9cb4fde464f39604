//! Console transport.
//!
//! Lines starting with `@` are operator sigils handled here; everything else
//! is a command in `module/Class/function key=value ...` form, dispatched in
//! the console namespace with no permission check. Output goes to a line
//! sink so the console can be driven from stdin or from tests.

use super::{Dispatcher, Outcome};
use crate::bus::BusHook;
use crate::handlers::Caller;
use crate::state::{Client, Transport};
use async_trait::async_trait;
use bee_proto::{Value, parse_console};
use chrono::Local;
use futures_util::future::BoxFuture;
use serde_json::Value as Json;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const RECURSION_WARNING: &str = "We can't allow recursion!";

const HELP_TEXT: &[&str] = &[
    "@reload_shortcuts (@rl) : Reload shortcuts yaml",
    "@exit (@e) : Exit",
    "@clear (@c) : Clear screen",
    "@cdebug : Switch debug",
    "@date (@dt) : Print datetime",
    "@uptime (@up) : Print app up and running time",
    "@reload_conf (@rc) : Reload config file",
    "@run <file> : Run any command file, under the run directory",
    "@cmdtocsv <file> : Print a command file's parameters as CSV",
    "Getting help",
    "module/Class/function _help=1",
    "Reloading action",
    "module/Class/function _reload=1",
    "Parameter(s) syntax",
    "param='b+ True' param=True, [,b+] True,False,True",
    "param='d+ 1.3' param=Decimal(1.3), [,d+] 1.2,1.4,0.7",
    "param='f+ 1.4' param=float(1.4), [|f+] 1.4|1.5|1.7",
    "param='dt+ 17/11/2018 17:49:33' param=datetime(2018, 11, 17, 17, 49, 33), [|dt+] 17/11/2018 17:49:33|18/11/2018 17:49:33",
    "param='date+ 17/11/2018' param=date(2018, 11, 17), [,date+] 17/11/2018,18/11/2018",
    "param='i+ 3' param=int(3), [,i+] 3,4,5",
    "param='s+ hello' param=str(hello), [,s+] a,b,c",
];

/// Whether the console should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleFlow {
    Continue,
    Exit,
}

/// An operator console bound to one registered console client.
pub struct Console {
    dispatcher: Arc<Dispatcher>,
    client: Client,
    caller: Caller,
    out: mpsc::UnboundedSender<String>,
}

impl Console {
    pub fn new(dispatcher: Arc<Dispatcher>, out: mpsc::UnboundedSender<String>) -> Self {
        let client = dispatcher
            .hive()
            .sessions
            .add_client(Transport::Console, None, None);
        let caller = Caller {
            session: Arc::clone(&client.session),
            client: Some(client.clone()),
        };
        Self {
            dispatcher,
            client,
            caller,
            out,
        }
    }

    fn say(&self, line: impl Into<String>) {
        // A closed sink means nobody is reading; output is dropped.
        let _ = self.out.send(line.into());
    }

    /// Handle one console line.
    pub async fn dispatch_console(&self, line: &str) -> ConsoleFlow {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleFlow::Continue;
        }
        if line.starts_with('@') {
            return self.sigil(line).await;
        }
        let outcome = self.dispatcher.dispatch_console(&self.caller, line).await;
        self.report(&outcome);
        ConsoleFlow::Continue
    }

    fn report(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Succeeded(Value::Null) | Outcome::Spawned => {}
            Outcome::Succeeded(value) => {
                let json = value.to_json();
                self.say(serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string()));
            }
            Outcome::HelpReturned(doc) => self.say(doc.as_str()),
            other => {
                if let Some(err) = other.error() {
                    self.say(format!("error: {err}"));
                }
            }
        }
    }

    async fn sigil(&self, cmd: &str) -> ConsoleFlow {
        let hive = self.dispatcher.hive();
        match cmd {
            "@reload_shortcuts" | "@rl" => match self.dispatcher.shortcuts().reload() {
                Ok(_) => self.say("--ok--"),
                Err(e) => self.say(format!("error: {e}")),
            },
            "@exit" | "@e" => {
                self.say("bye...");
                return ConsoleFlow::Exit;
            }
            "@clear" | "@clr" | "@c" => self.say("\x1b[2J\x1b[H"),
            "@cdebug" => {
                let on = hive.registry.toggle_debug();
                self.say(format!("--debug: {on}--"));
            }
            "@date" | "@dt" => self.say(Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
            "@uptime" | "@up" => self.say(format!("{} ago.", hive.uptime())),
            "@reload_conf" | "@rc" => match hive.config.reload() {
                Ok(config) => match self
                    .dispatcher
                    .authority()
                    .replace_free_rules(&config.free_actions)
                {
                    Ok(_) => {
                        info!(path = %hive.config.path().display(), "Configuration reloaded");
                        self.say("--ok--");
                    }
                    Err(e) => self.say(format!("error: {e}")),
                },
                Err(e) => self.say(format!("error: {e}")),
            },
            "@?" => {
                for line in HELP_TEXT {
                    self.say(*line);
                }
            }
            _ => {
                if let Some(name) = cmd.strip_prefix("@cmdtocsv") {
                    self.cmd_to_csv(name.trim()).await;
                } else if let Some(name) = cmd.strip_prefix("@run") {
                    return self.run_file(name.trim().to_string(), false).await;
                } else {
                    self.say(format!("unknown command {cmd}, try @?"));
                }
            }
        }
        ConsoleFlow::Continue
    }

    /// `run/<name>.cmd` style resolution against the configured run directory.
    fn command_file(&self, name: &str) -> PathBuf {
        let run_dir = self.dispatcher.hive().config().console.run_dir.clone();
        let file = if name.ends_with(".cmd") {
            PathBuf::from(name)
        } else {
            PathBuf::from(format!("{name}.cmd"))
        };
        if file.is_absolute() || file.starts_with(&run_dir) {
            file
        } else {
            run_dir.join(file)
        }
    }

    /// Run every line of a command file. An included file may not include
    /// further files.
    fn run_file(&self, name: String, nested: bool) -> BoxFuture<'_, ConsoleFlow> {
        Box::pin(async move {
            let path = self.command_file(&name);
            let Some(text) = self.read_command_file(&path).await else {
                return ConsoleFlow::Continue;
            };
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if let Some(inner) = line.strip_prefix("@run") {
                    if nested {
                        self.say(RECURSION_WARNING);
                    } else if self.run_file(inner.trim().to_string(), true).await
                        == ConsoleFlow::Exit
                    {
                        return ConsoleFlow::Exit;
                    }
                    continue;
                }
                if nested {
                    self.say(format!("{} -{}-", "+".repeat(20), path.display()));
                } else {
                    self.say("+".repeat(20));
                }
                let flow = self.dispatch_console(line).await;
                self.say("-".repeat(20));
                if flow == ConsoleFlow::Exit {
                    return ConsoleFlow::Exit;
                }
            }
            ConsoleFlow::Continue
        })
    }

    async fn cmd_to_csv(&self, name: &str) {
        let path = self.command_file(name);
        let Some(text) = self.read_command_file(&path).await else {
            return;
        };
        let mut keys: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('@') {
                continue;
            }
            match parse_console(line) {
                Ok(expr) => {
                    if keys.is_empty() {
                        keys = expr.data.keys().cloned().collect();
                    }
                    rows.push(expr.data.values().map(ToString::to_string).collect());
                }
                Err(e) => self.say(format!("error: {e}")),
            }
        }
        self.say(to_csv(&keys, &rows));
    }

    async fn read_command_file(&self, path: &Path) -> Option<String> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Some(text),
            Err(e) => {
                self.say(format!("error: {}: {e}", path.display()));
                None
            }
        }
    }

    /// Log the console client out and forget it.
    pub fn close(&self) {
        self.dispatcher.hive().sessions.remove_client(self.client.conn);
    }
}

fn to_csv(keys: &[String], rows: &[Vec<String>]) -> String {
    let mut csv = String::new();
    let lines = (!keys.is_empty()).then_some(keys).into_iter().chain(rows.iter().map(Vec::as_slice));
    for fields in lines {
        let line: Vec<Cow<'_, str>> = fields.iter().map(|f| csv_field(f)).collect();
        csv.push_str(&line.join(","));
        csv.push('\n');
    }
    csv
}

fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Read stdin until EOF, `@exit` or shutdown. `@exit` cancels `shutdown`.
pub async fn run_console(console: Console, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                if console.dispatch_console(&line).await == ConsoleFlow::Exit {
                    shutdown.cancel();
                    break;
                }
            }
            Ok(None) => {
                info!("Console input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Console read failed");
                break;
            }
        }
    }
    console.close();
}

/// A line sink that writes to stdout.
pub fn stdout_sink() -> mpsc::UnboundedSender<String> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(mut line) = rx.recv().await {
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });
    tx
}

/// `console_message` hook: prints bus notices for the operator. Command
/// failures are already printed inline and are skipped.
pub struct ConsoleEcho {
    out: mpsc::UnboundedSender<String>,
}

impl ConsoleEcho {
    pub fn new(out: mpsc::UnboundedSender<String>) -> Self {
        Self { out }
    }
}

#[async_trait]
impl BusHook for ConsoleEcho {
    async fn call(&self, channel: &str, params: Json) {
        if matches!(channel, "error" | "exp") {
            return;
        }
        let _ = self.out.send(format!("[{channel}] {params}"));
    }
}
