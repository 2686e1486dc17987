use std::net::Ipv4Addr;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tcpframe_net::{FrameIo, Message, NetError, Status, TcpConnection, TcpListener};

fn listener() -> TcpListener {
    TcpListener::bind(Ipv4Addr::LOCALHOST, 0).unwrap()
}

fn connect(port: u16) -> TcpConnection {
    let mut conn = TcpConnection::new();
    assert_eq!(conn.connect(Ipv4Addr::LOCALHOST, port, Duration::ZERO), Status::Done);
    conn
}

// Poll a non-blocking receive until it stops returning NotReady.
fn receive_polling(conn: &mut TcpConnection, msg: &mut Message) -> Status {
    for _ in 0..2000 {
        match conn.receive_message(msg) {
            Status::NotReady => thread::sleep(Duration::from_millis(5)),
            other => return other,
        }
    }
    panic!("message never arrived");
}

#[test]
fn echo_round_trip_over_loopback() {
    let listener = listener();
    let port = listener.local_port();

    let server = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        let mut msg = Message::new();
        assert_eq!(conn.receive_message(&mut msg), Status::Done);
        assert_eq!(conn.send_message(&mut msg), Status::Done);
        conn.remote_port()
    });

    let mut client = connect(port);
    assert!(client.is_connected());
    assert_eq!(client.remote_address(), Some(Ipv4Addr::LOCALHOST));
    assert_eq!(client.remote_port(), port);
    assert_ne!(client.local_port(), 0);

    let mut msg = Message::from(&b"hello over tcp"[..]);
    assert_eq!(client.send_message(&mut msg), Status::Done);

    let mut echo = Message::new();
    assert_eq!(client.receive_message(&mut echo), Status::Done);
    assert_eq!(echo.payload(), b"hello over tcp");

    let seen_port = server.join().unwrap();
    assert_eq!(seen_port, client.local_port());
}

#[test]
fn empty_and_large_messages_round_trip() {
    let listener = listener();
    let port = listener.local_port();

    let server = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        let mut msg = Message::new();
        for _ in 0..2 {
            assert_eq!(conn.receive_message(&mut msg), Status::Done);
            assert_eq!(conn.send_message(&mut msg), Status::Done);
        }
    });

    let mut client = connect(port);
    let large: Vec<u8> = (0..300_000u32).map(|i| (i * 7 % 256) as u8).collect();

    for payload in [Vec::new(), large] {
        let mut msg = Message::from(payload.clone());
        assert_eq!(client.send_message(&mut msg), Status::Done);

        let mut echo = Message::new();
        assert_eq!(client.receive_message(&mut echo), Status::Done);
        assert_eq!(echo.payload(), &payload[..]);
    }

    server.join().unwrap();
}

#[test]
fn timed_connect_succeeds_and_keeps_blocking_mode() {
    let listener = listener();
    let port = listener.local_port();

    let mut conn = TcpConnection::new();
    assert_eq!(
        conn.connect(Ipv4Addr::LOCALHOST, port, Duration::from_secs(2)),
        Status::Done
    );
    assert!(conn.is_blocking());
    assert_eq!(conn.remote_port(), port);

    let _accepted = listener.accept().unwrap();
}

#[test]
fn refused_connect_returns_error_promptly() {
    let port = {
        let listener = listener();
        listener.local_port()
    };

    for timeout in [Duration::ZERO, Duration::from_secs(2)] {
        let mut conn = TcpConnection::new();
        let started = Instant::now();

        assert_eq!(conn.connect(Ipv4Addr::LOCALHOST, port, timeout), Status::Error);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(conn.last_error(), Some(NetError::Refused { .. })));
        assert!(!conn.is_connected());
        assert_eq!(conn.local_port(), 0);
        assert!(conn.is_blocking());
    }
}

// Loopback listener with a full accept queue: new handshakes go unanswered.
#[cfg(target_os = "linux")]
fn saturated_listener() -> (std::net::TcpListener, Vec<std::net::TcpStream>) {
    use std::os::unix::io::AsRawFd;

    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    // SAFETY: re-listen on a bound socket we own.
    assert_eq!(unsafe { libc::listen(listener.as_raw_fd(), 0) }, 0);
    let addr = listener.local_addr().unwrap();

    let mut queued = Vec::new();
    for _ in 0..16 {
        match std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(200)) {
            Ok(stream) => queued.push(stream),
            Err(_) => return (listener, queued),
        }
    }
    panic!("accept queue never filled");
}

#[cfg(target_os = "linux")]
#[test]
fn timed_connect_to_unresponsive_endpoint_times_out() {
    let (listener, _queued) = saturated_listener();
    let port = listener.local_addr().unwrap().port();
    let timeout = Duration::from_millis(300);

    let mut conn = TcpConnection::new();
    let started = Instant::now();
    let status = conn.connect(Ipv4Addr::LOCALHOST, port, timeout);
    let elapsed = started.elapsed();

    assert_eq!(status, Status::NotReady);
    assert!(elapsed >= timeout, "took {elapsed:?}");
    assert!(elapsed < timeout + Duration::from_secs(1), "took {elapsed:?}");
    assert!(matches!(conn.last_error(), Some(NetError::TimedOut { timeout: t, .. }) if *t == timeout));
    assert!(conn.is_blocking());
    assert!(!conn.is_connected());
    assert_eq!(conn.local_port(), 0);
}

#[test]
fn non_blocking_receive_resumes_where_it_left_off() {
    let listener = listener();
    let port = listener.local_port();
    let (go_tx, go_rx) = mpsc::channel::<()>();

    let server = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        let mut wire = 5u32.to_be_bytes().to_vec();
        wire.extend_from_slice(b"split");

        assert_eq!(conn.send_bytes(&wire[..2]), (Status::Done, 2));
        go_rx.recv().unwrap();
        assert_eq!(conn.send_bytes(&wire[2..]), (Status::Done, 7));
        go_rx.recv().unwrap();
    });

    let mut client = connect(port);
    client.set_blocking(false);
    assert!(!client.is_blocking());

    let mut msg = Message::new();
    let mut waited = 0;
    while client.pending_len() < 2 {
        assert_eq!(client.receive_message(&mut msg), Status::NotReady);
        thread::sleep(Duration::from_millis(5));
        waited += 1;
        assert!(waited < 2000, "prefix bytes never arrived");
    }

    for _ in 0..5 {
        assert_eq!(client.receive_message(&mut msg), Status::NotReady);
        assert_eq!(client.pending_len(), 2);
        assert!(msg.is_empty());
    }

    go_tx.send(()).unwrap();
    assert_eq!(receive_polling(&mut client, &mut msg), Status::Done);
    assert_eq!(msg.payload(), b"split");
    assert_eq!(client.pending_len(), 0);

    go_tx.send(()).unwrap();
    server.join().unwrap();
}

#[test]
fn non_blocking_send_reports_partial_and_resumes() {
    let listener = listener();
    let port = listener.local_port();
    let (go_tx, go_rx) = mpsc::channel::<()>();

    let payload: Vec<u8> = (0..32 * 1024 * 1024u32).map(|i| (i % 253) as u8).collect();
    let expected = payload.clone();

    let server = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        go_rx.recv().unwrap();

        let mut msg = Message::new();
        assert_eq!(conn.receive_message(&mut msg), Status::Done);
        assert!(msg.payload() == &expected[..]);
    });

    let mut client = connect(port);
    client.set_blocking(false);

    let mut msg = Message::from(payload);
    let first = client.send_message(&mut msg);
    assert_eq!(first, Status::Partial);
    assert!(msg.is_send_pending());

    go_tx.send(()).unwrap();
    let mut rounds = 0;
    loop {
        match client.send_message(&mut msg) {
            Status::Done => break,
            Status::Partial | Status::NotReady => {
                rounds += 1;
                assert!(rounds < 20_000, "send never completed");
                thread::sleep(Duration::from_millis(1));
            }
            other => panic!("unexpected status {other:?}"),
        }
    }
    assert!(!msg.is_send_pending());

    server.join().unwrap();
}

#[test]
fn peer_close_surfaces_as_disconnected() {
    let listener = listener();
    let port = listener.local_port();

    let server = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        assert_eq!(conn.send_bytes(&[0, 0, 0, 9, 1, 2]), (Status::Done, 6));
    });

    let mut client = connect(port);
    server.join().unwrap();

    let mut msg = Message::new();
    assert_eq!(client.receive_message(&mut msg), Status::Disconnected);
    assert!(matches!(client.last_error(), Some(NetError::Framing(_))));

    client.disconnect();
    assert_eq!(client.pending_len(), 0);
}

#[test]
fn reconnect_starts_with_fresh_state() {
    let first = listener();
    let first_port = first.local_port();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let first_server = thread::spawn(move || {
        let mut conn = first.accept().unwrap();
        // Prefix plus part of the payload, then stall.
        assert_eq!(conn.send_bytes(&[0, 0, 0, 10, b'x', b'y']), (Status::Done, 6));
        done_rx.recv().unwrap();
    });

    let mut client = connect(first_port);
    client.set_blocking(false);

    let mut msg = Message::new();
    let mut waited = 0;
    while client.pending_len() < 6 {
        assert_eq!(client.receive_message(&mut msg), Status::NotReady);
        thread::sleep(Duration::from_millis(5));
        waited += 1;
        assert!(waited < 2000, "partial frame never arrived");
    }

    client.disconnect();
    client.disconnect();
    assert_eq!(client.pending_len(), 0);
    assert_eq!(client.local_port(), 0);
    assert_eq!(client.remote_address(), None);
    assert_eq!(client.remote_port(), 0);
    done_tx.send(()).unwrap();
    first_server.join().unwrap();

    let second = listener();
    let second_port = second.local_port();
    let second_server = thread::spawn(move || {
        let mut conn = second.accept().unwrap();
        let mut msg = Message::from(&b"fresh"[..]);
        assert_eq!(conn.send_message(&mut msg), Status::Done);
    });

    client.set_blocking(true);
    assert_eq!(
        client.connect(Ipv4Addr::LOCALHOST, second_port, Duration::from_secs(2)),
        Status::Done
    );
    assert_eq!(client.receive_message(&mut msg), Status::Done);
    assert_eq!(msg.payload(), b"fresh");

    second_server.join().unwrap();
}

#[test]
fn operations_without_a_connection_fail_cleanly() {
    let mut conn = TcpConnection::new();
    conn.disconnect();

    let mut msg = Message::from(&b"nowhere"[..]);
    assert_eq!(conn.send_message(&mut msg), Status::Error);
    assert!(matches!(conn.last_error(), Some(NetError::NotConnected)));

    let mut buf = [0u8; 8];
    assert_eq!(conn.receive_bytes(&mut buf), (Status::Error, 0));
    assert_eq!(conn.send_all(b"x"), Status::Error);

    assert_eq!(conn.local_port(), 0);
    assert_eq!(conn.remote_address(), None);
    assert_eq!(conn.remote_port(), 0);
    assert!(!conn.is_connected());
}
