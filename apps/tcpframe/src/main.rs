use std::{net::Ipv4Addr, thread, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tcpframe_net::{FrameIo, FrameLimits, Message, Status, TcpConnection, TcpListener};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Parser)]
#[command(name = "tcpframe", version, about = "Length-prefixed TCP message echo demo")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    // Accept clients one at a time and echo every message back.
    Server {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        bind: Ipv4Addr,

        #[arg(long)]
        port: u16,

        /// Reject frames longer than this many bytes
        #[arg(long)]
        max_frame_len: Option<u32>,
    },

    // Connect, send one message, print the echoed response.
    Client {
        #[arg(long, default_value = "127.0.0.1")]
        address: Ipv4Addr,

        #[arg(long)]
        port: u16,

        // Message to send
        #[arg(long)]
        msg: String,

        /// Connect timeout in milliseconds (0 = plain blocking connect)
        #[arg(long, default_value_t = 0)]
        timeout_ms: u64,

        /// Drive send/receive in non-blocking mode by polling
        #[arg(long, default_value_t = false)]
        nonblocking: bool,

        /// Print the echo as hex instead of text
        #[arg(long, default_value_t = false)]
        hex: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Server { bind, port, max_frame_len } => run_server(bind, port, max_frame_len),
        Command::Client { address, port, msg, timeout_ms, nonblocking, hex } => {
            run_client(address, port, msg, Duration::from_millis(timeout_ms), nonblocking, hex)
        }
    }
}

fn run_server(bind: Ipv4Addr, port: u16, max_frame_len: Option<u32>) -> Result<()> {
    let limits = max_frame_len.map_or(FrameLimits::DEFAULT, FrameLimits::new);
    let listener = TcpListener::bind(bind, port)
        .with_context(|| format!("failed to bind {bind}:{port}"))?
        .with_limits(limits);

    info!(%bind, port = listener.local_port(), "tcpframe server listening");

    loop {
        let mut conn = match listener.accept() {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let peer = conn.remote_address();
        info!(?peer, port = conn.remote_port(), "client connected");

        // Echo until the client goes away
        let mut msg = Message::new();
        loop {
            match conn.receive_message(&mut msg) {
                Status::Done => {
                    info!(len = msg.len(), "recv");
                    if let Err(e) = check(conn.send_message(&mut msg), &conn, "echo") {
                        warn!(error = %e, "connection ended");
                        break;
                    }
                }
                status => {
                    match conn.last_error() {
                        Some(e) => info!(%status, error = %e, "connection ended"),
                        None => info!(%status, "connection ended"),
                    }
                    break;
                }
            }
        }
        conn.disconnect();
    }
}

fn run_client(
    address: Ipv4Addr,
    port: u16,
    msg: String,
    timeout: Duration,
    nonblocking: bool,
    hex: bool,
) -> Result<()> {
    let mut conn = TcpConnection::new();

    let status = conn.connect(address, port, timeout);
    check(status, &conn, "connect").with_context(|| format!("cannot reach {address}:{port}"))?;
    info!(local_port = conn.local_port(), "connected");

    if nonblocking {
        conn.set_blocking(false);
    }

    let mut out = Message::from(msg.into_bytes());
    drive(&mut conn, "send", |c| c.send_message(&mut out))?;

    let mut echo = Message::new();
    drive(&mut conn, "receive", |c| c.receive_message(&mut echo))?;

    if hex {
        println!("{}", hex::encode(echo.payload()));
    } else {
        println!("{}", String::from_utf8_lossy(echo.payload()));
    }

    conn.disconnect();
    Ok(())
}

// Re-issue a resumable operation until it stops reporting progress-pending.
fn drive(
    conn: &mut TcpConnection,
    what: &str,
    mut op: impl FnMut(&mut TcpConnection) -> Status,
) -> Result<()> {
    loop {
        match op(conn) {
            Status::Partial | Status::NotReady => thread::sleep(POLL_INTERVAL),
            status => return check(status, conn, what),
        }
    }
}

fn check(status: Status, conn: &TcpConnection, what: &str) -> Result<()> {
    if status == Status::Done {
        return Ok(());
    }

    match conn.last_error() {
        Some(e) => Err(anyhow!("{what} failed ({status}): {e}")),
        None => Err(anyhow!("{what} failed ({status})")),
    }
}
