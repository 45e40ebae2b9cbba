//! Purpose: Shared process harness for the integration tests.
//! Exports: `TestBridge`, `TestRelay`, `write_archive_fixture`, `TestResult`.
//! Role: Spawns the real `recaf-mcp` binary on loopback and drives it.
//! Invariants: Every wait is bounded; child processes are killed on drop.
#![allow(dead_code)]

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, sleep};
use std::time::{Duration, Instant};

use serde_json::{Value, json};

pub type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

static SERVER_LOCK: Mutex<()> = Mutex::new(());

pub struct TestBridge {
    child: Child,
    pub port: u16,
    pub base_url: String,
    _server_guard: MutexGuard<'static, ()>,
}

impl TestBridge {
    pub fn start(log_dir: &Path) -> TestResult<Self> {
        let guard = SERVER_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let mut last_err: Option<Box<dyn std::error::Error>> = None;
        for attempt in 0..3 {
            let port = pick_port()?;
            let log_path = log_dir.join(format!("bridge-{attempt}.log"));
            let log = File::create(&log_path)?;
            let mut child = Command::new(env!("CARGO_BIN_EXE_recaf-mcp"))
                .arg("bridge")
                .arg("--port")
                .arg(port.to_string())
                .stdout(Stdio::null())
                .stderr(Stdio::from(log))
                .spawn()?;
            let addr: SocketAddr = format!("127.0.0.1:{port}").parse()?;
            match wait_for_server(&mut child, addr, &log_path) {
                Ok(()) => {
                    return Ok(Self {
                        child,
                        port,
                        base_url: format!("http://{addr}"),
                        _server_guard: guard,
                    });
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| "bridge failed to start".into()))
    }

    /// POSTs `body` and returns `(status, json)`, including non-2xx replies.
    pub fn post(&self, path: &str, body: &Value) -> TestResult<(u16, Value)> {
        let url = format!("{}{path}", self.base_url);
        let result = ureq::post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string());
        read(result)
    }

    pub fn get(&self, path: &str) -> TestResult<(u16, Value)> {
        let url = format!("{}{path}", self.base_url);
        read(ureq::get(&url).call())
    }
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn read(result: Result<ureq::Response, ureq::Error>) -> TestResult<(u16, Value)> {
    let resp = match result {
        Ok(resp) => resp,
        Err(ureq::Error::Status(_, resp)) => resp,
        Err(err) => return Err(err.into()),
    };
    let status = resp.status();
    let body: Value = serde_json::from_str(&resp.into_string()?)?;
    Ok((status, body))
}

/// The relay process with piped stdio; stdout lines arrive on a channel.
pub struct TestRelay {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    next_id: i64,
}

impl TestRelay {
    pub fn start(bridge_port: u16, log_dir: &Path) -> TestResult<Self> {
        let log = File::create(log_dir.join("relay.log"))?;
        let mut child = Command::new(env!("CARGO_BIN_EXE_recaf-mcp"))
            .arg("relay")
            .arg("--bridge-port")
            .arg(bridge_port.to_string())
            .env("RUST_LOG", "debug")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log))
            .spawn()?;
        let stdin = child.stdin.take().ok_or("relay stdin missing")?;
        let stdout = child.stdout.take().ok_or("relay stdout missing")?;
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Ok(Self {
            child,
            stdin,
            lines,
            next_id: 0,
        })
    }

    pub fn send_raw(&mut self, line: &str) -> TestResult<()> {
        self.send_bytes(line.as_bytes())
    }

    /// Writes `bytes` plus a newline, whether or not they are valid UTF-8.
    pub fn send_bytes(&mut self, bytes: &[u8]) -> TestResult<()> {
        self.stdin.write_all(bytes)?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Sends a request and waits for the response carrying its id.
    pub fn request(&mut self, method: &str, params: Value) -> TestResult<Value> {
        self.next_id += 1;
        let id = self.next_id;
        let message = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        self.send_raw(&message.to_string())?;
        let response = self.next_line(Duration::from_secs(10))?;
        if response["id"] != json!(id) {
            return Err(format!("expected id {id}, got {response}").into());
        }
        Ok(response)
    }

    /// Calls a tool and returns `(isError, parsed text)`.
    pub fn call_tool(&mut self, name: &str, arguments: Value) -> TestResult<(bool, Value)> {
        let response = self.request("tools/call", json!({"name": name, "arguments": arguments}))?;
        let result = &response["result"];
        let is_error = result["isError"].as_bool().ok_or("isError missing")?;
        let text = result["content"][0]["text"].as_str().ok_or("text missing")?;
        Ok((is_error, serde_json::from_str(text)?))
    }

    pub fn next_line(&self, timeout: Duration) -> TestResult<Value> {
        let line = self.lines.recv_timeout(timeout)?;
        Ok(serde_json::from_str(&line)?)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Writes a workspace archive with the given classes and returns its path.
pub fn write_archive_fixture(dir: &Path, name: &str, classes: Vec<Value>) -> TestResult<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, json!({ "classes": classes, "files": [] }).to_string())?;
    Ok(path)
}

pub fn class(name: &str) -> Value {
    json!({"name": name, "superName": "java/lang/Object", "access": 1})
}

pub fn class_with_source(name: &str, source: &str) -> Value {
    json!({"name": name, "superName": "java/lang/Object", "access": 1, "source": source})
}

fn pick_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

fn wait_for_server(child: &mut Child, addr: SocketAddr, log_path: &Path) -> TestResult<()> {
    let url = format!("http://{addr}/health");
    let start = Instant::now();
    loop {
        if let Ok(resp) = ureq::get(&url).call() {
            if resp.status() == 200 {
                return Ok(());
            }
        }
        if let Some(status) = child.try_wait()? {
            let stderr = std::fs::read_to_string(log_path).unwrap_or_default();
            let detail = stderr.trim();
            return Err(format!(
                "bridge exited before ready (status: {status}, stderr: {})",
                if detail.is_empty() { "<empty>" } else { detail }
            )
            .into());
        }
        if start.elapsed() > Duration::from_secs(8) {
            return Err("timed out waiting for bridge".into());
        }
        sleep(Duration::from_millis(20));
    }
}
