use metricsd::{Configuration, Dispatcher, Options};
use std::{net::UdpSocket, sync::Arc, time::Duration};

fn init_logging() { let _ = env_logger::builder().is_test(true).try_init(); }

/// Binds a local UDP socket standing in for the metricsd server.
fn server() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("failed to bind server socket");
    socket
        .set_read_timeout(Some(Duration::from_millis(500)))
        .expect("failed to set read timeout");
    let port = socket.local_addr().expect("no local addr").port();
    (socket, port)
}

fn recv(socket: &UdpSocket) -> Option<String> {
    let mut buf = [0u8; 16384];
    socket
        .recv(&mut buf)
        .ok()
        .map(|n| String::from_utf8_lossy(&buf[..n]).into_owned())
}

fn client(port: u16) -> Configuration { Dispatcher::builder().host("127.0.0.1").port(port) }

#[test]
fn test_writes_gauge_to_network() {
    init_logging();
    let (server, port) = server();
    let (sink, _controller) = client(port).spawn().unwrap();

    sink.update_gauge("metric.name", 1234);
    assert_eq!(recv(&server).as_deref(), Some("metric.name:1234|g\n"));
}

#[test]
fn test_default_host_is_localhost() {
    init_logging();
    let (server, port) = server();
    let (sink, controller) = Configuration::from(Options {
        port: Some(port),
        ..Default::default()
    })
    .spawn()
    .unwrap();
    assert_eq!(controller.host(), "localhost");

    sink.update_gauge("metric.name", 1234);
    assert_eq!(recv(&server).as_deref(), Some("metric.name:1234|g\n"));
}

#[test]
fn test_prefixed_meter() {
    init_logging();
    let (server, port) = server();
    let (sink, _controller) = client(port).prefix("prod").spawn().unwrap();

    sink.mark("visitors");
    assert_eq!(recv(&server).as_deref(), Some("prod.visitors\n"));
}

#[test]
fn test_counter_increment_then_decrement() {
    init_logging();
    let (server, port) = server();
    let (sink, _controller) = client(port).spawn().unwrap();
    let counter = sink.count("jobs").unwrap();

    counter.increment_by(5);
    counter.decrement_by(5);
    assert_eq!(recv(&server).as_deref(), Some("jobs:5|c\n"));
    assert_eq!(recv(&server).as_deref(), Some("jobs:-5|c\n"));
}

#[test]
fn test_disabled_never_opens_socket() {
    init_logging();
    let (server, port) = server();
    let (sink, controller) = client(port).enabled(false).spawn().unwrap();
    assert!(!controller.enabled());

    sink.write("metric.name:1234|g");
    sink.update_counter("a", 1);
    sink.mark("m");

    let status = controller.status().unwrap();
    assert!(!status.socket_open);
    assert_eq!(status.buffered_lines, 0);
    assert_eq!(recv(&server), None);

    controller.set_enabled(true);
    sink.mark("m");
    assert_eq!(recv(&server).as_deref(), Some("m\n"));
    assert!(controller.status().unwrap().socket_open);
}

#[test]
fn test_batches_lines_into_one_datagram() {
    init_logging();
    let (server, port) = server();
    let (sink, controller) = client(port)
        .batch(true)
        .batch_interval(Duration::from_secs(60))
        .spawn()
        .unwrap();

    sink.write("metric.name:1234|g\n");
    sink.write("metric.name2:2345|h\n");

    let status = controller.status().unwrap();
    assert_eq!(status.buffered_lines, 2);
    assert_eq!(status.buffered_bytes, 39);
    assert!(!status.socket_open);

    controller.flush();
    assert_eq!(recv(&server).as_deref(), Some("metric.name:1234|g\nmetric.name2:2345|h\n"));
    assert_eq!(recv(&server), None);
}

#[test]
fn test_batch_timer_flushes() {
    init_logging();
    let (server, port) = server();
    let (sink, _controller) = client(port)
        .batch(true)
        .batch_interval(Duration::from_millis(20))
        .spawn()
        .unwrap();

    sink.write("metric.name:1234|g\n");
    sink.write("metric.name2:2345|h\n");
    assert_eq!(recv(&server).as_deref(), Some("metric.name:1234|g\nmetric.name2:2345|h\n"));
}

#[test]
fn test_batch_flushes_before_datagrams_get_too_big() {
    init_logging();
    let (server, port) = server();
    let (sink, controller) = client(port)
        .batch(true)
        .batch_interval(Duration::from_secs(60))
        .spawn()
        .unwrap();

    let mut lines = Vec::new();
    for i in 0..1000 {
        lines.push(format!("prefixed.metric{}.value:12345|g\n", i));
    }
    let longest = lines.iter().map(|l| l.len()).max().unwrap();
    for line in &lines {
        sink.write(line);
    }

    // The flush timer is a minute away, so anything received was flushed for size.
    let mut received = String::new();
    let status = controller.status().unwrap();
    while received.len() + status.buffered_bytes < lines.concat().len() {
        let datagram = recv(&server).expect("missing size-triggered flush");
        assert!(datagram.len() < 8164 + longest);
        received.push_str(&datagram);
    }

    if status.buffered_bytes > 0 {
        controller.flush();
        received.push_str(&recv(&server).unwrap());
    }
    assert_eq!(received, lines.concat());
}

#[test]
fn test_batch_toggled_off_sends_individually() {
    init_logging();
    let (server, port) = server();
    let (sink, controller) = client(port)
        .batch(true)
        .batch_interval(Duration::from_millis(20))
        .spawn()
        .unwrap();
    assert!(controller.batch());

    controller.set_batch(false);
    assert!(!controller.batch());

    sink.write("metric.name:1234|g\n");
    sink.write("metric.name2:2345|h\n");
    assert_eq!(recv(&server).as_deref(), Some("metric.name:1234|g\n"));
    assert_eq!(recv(&server).as_deref(), Some("metric.name2:2345|h\n"));
    assert!(!controller.status().unwrap().batch);
}

#[test]
fn test_batch_toggled_off_then_on() {
    init_logging();
    let (server, port) = server();
    let (sink, controller) = client(port)
        .batch(true)
        .batch_interval(Duration::from_millis(20))
        .spawn()
        .unwrap();

    controller.set_batch(false);
    controller.set_batch(true);

    sink.write("metric.name:1234|g\n");
    sink.write("metric.name2:2345|h\n");
    assert_eq!(recv(&server).as_deref(), Some("metric.name:1234|g\nmetric.name2:2345|h\n"));
}

#[test]
fn test_toggle_off_does_not_flush_buffer() {
    init_logging();
    let (server, port) = server();
    let (sink, controller) = client(port)
        .batch(true)
        .batch_interval(Duration::from_secs(60))
        .spawn()
        .unwrap();

    // Frames are handled in order, so the write lands in the buffer before batching stops.
    sink.write("stale:1|c");
    controller.set_batch(false);

    let status = controller.status().unwrap();
    assert_eq!(status.buffered_lines, 1);
    assert_eq!(recv(&server), None);

    sink.write("fresh:1|c");
    assert_eq!(recv(&server).as_deref(), Some("fresh:1|c\n"));
}

#[test]
fn test_provided_socket_is_used() {
    init_logging();
    let (server, port) = server();
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
    let local = socket.local_addr().unwrap();
    let (sink, controller) = client(port).socket(socket).spawn().unwrap();
    assert!(controller.socket().is_some());

    sink.inc("hits");
    let mut buf = [0u8; 64];
    let (n, from) = server.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"hits:1|c\n");
    assert_eq!(from, local);
    assert!(!controller.status().unwrap().socket_open);
}

#[test]
fn test_close_releases_socket() {
    init_logging();
    let (server, port) = server();
    let (sink, controller) = client(port).spawn().unwrap();

    controller.close();
    sink.inc("a");
    assert_eq!(recv(&server).as_deref(), Some("a:1|c\n"));
    assert!(controller.status().unwrap().socket_open);

    controller.close();
    assert!(!controller.status().unwrap().socket_open);

    sink.inc("b");
    assert_eq!(recv(&server).as_deref(), Some("b:1|c\n"));
}

#[test]
fn test_timer_end_to_end() {
    init_logging();
    let (server, port) = server();
    let (sink, _controller) = client(port).spawn().unwrap();

    let mut timer = sink.time(Some("render"));
    std::thread::sleep(Duration::from_millis(2));
    let elapsed = timer.stop(None).unwrap();
    assert!(elapsed >= Duration::from_millis(2));
    assert!(timer.stop(None).is_none());

    let line = recv(&server).unwrap();
    assert!(line.starts_with("render:"));
    assert!(line.ends_with("|h\n"));
    assert_eq!(recv(&server), None);
}
