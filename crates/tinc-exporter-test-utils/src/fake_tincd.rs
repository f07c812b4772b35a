//! A scripted stand-in for a running tinc daemon.
//!
//! [`FakeTincd`] owns a temporary runtime directory holding a pidfile and a
//! listening control socket. Each connection is answered from a script keyed
//! by the request line (`"18 3"`, `"18 13"`, ...), and everything the client
//! sends is recorded for assertions.
//!
//! ```ignore
//! let fake = FakeTincd::builder()
//!     .network("vpn")
//!     .respond("18 3", dump_nodes(&[NodeLine::new("alpha")]))
//!     .spawn()
//!     .await;
//! let config = TestConfigBuilder::new()
//!     .run_dir(fake.run_dir())
//!     .network(fake.network())
//!     .build();
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;
use tracing::debug;

/// Echo prefix of a node dump.
pub const DUMP_NODES: &str = "18 3";
/// Echo prefix of a traffic dump.
pub const DUMP_TRAFFIC: &str = "18 13";

#[derive(Debug, Clone)]
struct Reply {
    lines: Vec<String>,
    hold_open: bool,
}

/// Builder for [`FakeTincd`].
pub struct FakeTincdBuilder {
    network: String,
    pid: u32,
    cookie: String,
    port: String,
    replies: HashMap<String, Reply>,
}

impl FakeTincdBuilder {
    pub fn network(mut self, network: &str) -> Self {
        self.network = network.to_string();
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn cookie(mut self, cookie: &str) -> Self {
        self.cookie = cookie.to_string();
        self
    }

    pub fn port(mut self, port: &str) -> Self {
        self.port = port.to_string();
        self
    }

    /// Answer `request` with `lines`, then close the connection.
    pub fn respond<I, S>(mut self, request: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies.insert(
            request.to_string(),
            Reply {
                lines: lines.into_iter().map(Into::into).collect(),
                hold_open: false,
            },
        );
        self
    }

    /// Answer `request` with `lines` and keep the connection open until the
    /// client goes away.
    pub fn respond_and_hold<I, S>(mut self, request: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies.insert(
            request.to_string(),
            Reply {
                lines: lines.into_iter().map(Into::into).collect(),
                hold_open: true,
            },
        );
        self
    }

    /// Write the pidfile, bind the control socket, and start serving.
    pub async fn spawn(self) -> FakeTincd {
        let dir = TempDir::new().expect("failed to create runtime dir");
        let stem = if self.network.is_empty() {
            "tinc".to_string()
        } else {
            format!("tinc.{}", self.network)
        };
        let pidfile_path = dir.path().join(format!("{stem}.pid"));
        let socket_path = dir.path().join(format!("{stem}.socket"));

        tokio::fs::write(
            &pidfile_path,
            format!("{} {} 127.0.0.1 port {}\n", self.pid, self.cookie, self.port),
        )
        .await
        .expect("failed to write pidfile");

        let listener = UnixListener::bind(&socket_path).expect("failed to bind control socket");
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let session = Arc::new(Session {
            cookie: self.cookie,
            pid: self.pid,
            replies: self.replies,
            received: Arc::clone(&received),
        });
        let counter = Arc::clone(&connections);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    if let Err(e) = session.handle(stream).await {
                        debug!(error = %e, "fake tincd connection ended");
                    }
                });
            }
        });

        FakeTincd {
            dir,
            network: self.network,
            pid: self.pid,
            pidfile_path,
            socket_path,
            received,
            connections,
            task,
        }
    }
}

struct Session {
    cookie: String,
    pid: u32,
    replies: HashMap<String, Reply>,
    received: Arc<Mutex<Vec<String>>>,
}

impl Session {
    fn record(&self, line: &str) {
        self.received
            .lock()
            .expect("received lines poisoned")
            .push(line.to_string());
    }

    async fn handle(&self, stream: UnixStream) -> std::io::Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let hello = line.trim_end().to_string();
        self.record(&hello);
        if hello != format!("0 ^{} 0", self.cookie) {
            return Ok(());
        }
        write_half
            .write_all(format!("0 faketincd 17\n4 0 {}\n", self.pid).as_bytes())
            .await?;

        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let request = line.trim_end().to_string();
        self.record(&request);

        let Some(reply) = self.replies.get(&request) else {
            return Ok(());
        };
        for reply_line in &reply.lines {
            write_half.write_all(reply_line.as_bytes()).await?;
            write_half.write_all(b"\n").await?;
        }
        write_half.flush().await?;

        if reply.hold_open {
            line.clear();
            while reader.read_line(&mut line).await? > 0 {
                line.clear();
            }
        }
        Ok(())
    }
}

/// A running fake daemon. Stops serving and removes its files on drop.
pub struct FakeTincd {
    dir: TempDir,
    network: String,
    pid: u32,
    pidfile_path: PathBuf,
    socket_path: PathBuf,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeTincd {
    pub fn builder() -> FakeTincdBuilder {
        FakeTincdBuilder {
            network: String::new(),
            pid: 4242,
            cookie: "f00dcafe".to_string(),
            port: "655".to_string(),
            replies: HashMap::new(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn pidfile_path(&self) -> &Path {
        &self.pidfile_path
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Every line received so far, across all connections.
    pub fn received(&self) -> Vec<String> {
        self.received
            .lock()
            .expect("received lines poisoned")
            .clone()
    }

    /// Number of accepted control connections.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Replace the pidfile contents.
    pub async fn write_pidfile(&self, contents: &str) {
        tokio::fs::write(&self.pidfile_path, contents)
            .await
            .expect("failed to rewrite pidfile");
    }

    /// Stop accepting connections and remove the socket file.
    pub async fn stop_listening(&self) {
        self.task.abort();
        let _ = tokio::fs::remove_file(&self.socket_path).await;
    }
}

impl Drop for FakeTincd {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One node dump record, rendered without its echo prefix.
#[derive(Debug, Clone)]
pub struct NodeLine {
    pub name: String,
    pub host: String,
    pub status: u32,
    pub nexthop: String,
    pub via: String,
    pub pmtu: i32,
    pub min_mtu: i32,
    /// Milliseconds.
    pub udp_ping_rtt: f64,
    pub in_packets: u64,
    pub in_bytes: u64,
    pub out_packets: u64,
    pub out_bytes: u64,
}

impl NodeLine {
    /// A reachable peer talking directly over UDP.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            host: "10.0.0.1".to_string(),
            status: 0x1a,
            nexthop: name.to_string(),
            via: name.to_string(),
            pmtu: 1400,
            min_mtu: 1400,
            udp_ping_rtt: 2.5,
            in_packets: 0,
            in_bytes: 0,
            out_packets: 0,
            out_bytes: 0,
        }
    }

    /// The daemon's own entry.
    pub fn myself(name: &str) -> Self {
        Self {
            host: "MYSELF".to_string(),
            status: 0x18,
            udp_ping_rtt: 0.0,
            ..Self::new(name)
        }
    }

    pub fn status(mut self, status: u32) -> Self {
        self.status = status;
        self
    }

    pub fn route(mut self, nexthop: &str, via: &str) -> Self {
        self.nexthop = nexthop.to_string();
        self.via = via.to_string();
        self
    }

    pub fn mtu(mut self, pmtu: i32, min_mtu: i32) -> Self {
        self.pmtu = pmtu;
        self.min_mtu = min_mtu;
        self
    }

    pub fn rtt_ms(mut self, rtt: f64) -> Self {
        self.udp_ping_rtt = rtt;
        self
    }

    pub fn traffic(mut self, in_packets: u64, in_bytes: u64, out_packets: u64, out_bytes: u64) -> Self {
        self.in_packets = in_packets;
        self.in_bytes = in_bytes;
        self.out_packets = out_packets;
        self.out_bytes = out_bytes;
        self
    }

    pub fn render(&self) -> String {
        format!(
            "{name} {name}-id {host} port 655 0 0 0 0 1000000c {status:x} {nexthop} {via} 1 {pmtu} {min} 1518 1700000000 {rtt} {ip} {ib} {op} {ob}",
            name = self.name,
            host = self.host,
            status = self.status,
            nexthop = self.nexthop,
            via = self.via,
            pmtu = self.pmtu,
            min = self.min_mtu,
            rtt = self.udp_ping_rtt,
            ip = self.in_packets,
            ib = self.in_bytes,
            op = self.out_packets,
            ob = self.out_bytes,
        )
    }
}

/// Full reply to a node dump: tagged records followed by the sentinel.
pub fn dump_nodes(nodes: &[NodeLine]) -> Vec<String> {
    nodes
        .iter()
        .map(|n| format!("{DUMP_NODES} {}", n.render()))
        .chain(std::iter::once(DUMP_NODES.to_string()))
        .collect()
}

/// Full reply to a traffic dump from `(name, in_pkts, in_bytes, out_pkts, out_bytes)`.
pub fn dump_traffic(rows: &[(&str, u64, u64, u64, u64)]) -> Vec<String> {
    rows.iter()
        .map(|(name, ip, ib, op, ob)| format!("{DUMP_TRAFFIC} {name} {ip} {ib} {op} {ob}"))
        .chain(std::iter::once(DUMP_TRAFFIC.to_string()))
        .collect()
}
