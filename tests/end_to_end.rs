use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mmio_sockdev::emulator::map::{CTRL, STATUS, TXDATA};
use mmio_sockdev::emulator::{DeviceServer, RegisterMap, SessionSummary};
use mmio_sockdev::{MmioManager, SockDev, SockDevConfig};

/// Starts an emulator on an ephemeral port that serves `sessions` clients and
/// records everything written to TXDATA.
fn spawn_server(
    sessions: usize,
) -> (SocketAddr, Arc<Mutex<Vec<u8>>>, JoinHandle<Vec<SessionSummary>>) {
    let mut server = DeviceServer::bind("127.0.0.1:0", RegisterMap::sockdev()).unwrap();
    let printed = Arc::new(Mutex::new(Vec::new()));
    let printed_clone = printed.clone();
    server.set_output_handler(move |byte| printed_clone.lock().unwrap().push(byte));

    let addr = server.local_addr().unwrap();
    let handle = thread::spawn(move || {
        (0..sessions)
            .map(|_| server.serve_one().unwrap())
            .collect()
    });
    (addr, printed, handle)
}

#[test]
fn test_hello_end_to_end() {
    let (addr, printed, server) = spawn_server(1);
    let dev = SockDev::connect(addr, &SockDevConfig::default()).unwrap();

    dev.write_register(CTRL.into(), 4, 1).unwrap();
    for &c in b"Hello" {
        dev.write_register(TXDATA.into(), 1, c.into()).unwrap();
    }
    assert_eq!(dev.read_register(STATUS.into(), 4).unwrap(), 1);
    assert_eq!(*printed.lock().unwrap(), b"Hello");
    assert_eq!(dev.fault_count(), 0);

    drop(dev);
    let summaries = server.join().unwrap();
    assert_eq!(summaries[0].frames, 7);
    assert!(summaries[0].reason.is_clean());
}

#[test]
fn test_ctrl_state_is_per_connection() {
    let (addr, _printed, server) = spawn_server(2);

    let dev = SockDev::connect(addr, &SockDevConfig::default()).unwrap();
    assert_eq!(dev.read_register(CTRL.into(), 4).unwrap(), 1);
    dev.write_register(CTRL.into(), 4, 0).unwrap();
    assert_eq!(dev.read_register(CTRL.into(), 4).unwrap(), 0);
    assert_eq!(dev.read_register(STATUS.into(), 4).unwrap() & 1, 1);
    drop(dev);

    let dev = SockDev::connect(addr, &SockDevConfig::default()).unwrap();
    assert_eq!(dev.read_register(CTRL.into(), 4).unwrap(), 1);
    drop(dev);

    server.join().unwrap();
}

#[test]
fn test_disconnect_during_read_returns_zero() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = [0u8; 6];
        stream.read_exact(&mut request).unwrap();
        request
        // stream dropped here without answering
    });

    let dev = SockDev::connect(addr, &SockDevConfig::default()).unwrap();
    assert_eq!(dev.read_register(STATUS.into(), 4).unwrap(), 0);
    assert_eq!(dev.fault_count(), 1);
    assert_eq!(peer.join().unwrap(), [b'R', 0x04, 0, 0, 0, 4]);
}

#[test]
fn test_read_timeout_abandons_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = [0u8; 6];
        stream.read_exact(&mut request).unwrap();

        // Answer too late, then answer a STATUS read that should never come.
        thread::sleep(Duration::from_millis(400));
        let _ = stream.write_all(&[0xAA; 4]);
        let _ = stream.write_all(&[0x01, 0, 0, 0]);

        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
        (request, rest)
    });

    let config = SockDevConfig {
        read_timeout: Some(Duration::from_millis(100)),
    };
    let dev = SockDev::connect(addr, &config).unwrap();
    assert_eq!(dev.read_register(CTRL.into(), 4).unwrap(), 0);
    assert_eq!(dev.fault_count(), 1);
    assert!(dev.is_broken());

    thread::sleep(Duration::from_millis(500));
    assert_eq!(dev.read_register(STATUS.into(), 4).unwrap(), 0);
    dev.write_register(TXDATA.into(), 1, b'A'.into()).unwrap();
    assert_eq!(dev.fault_count(), 3);

    // The shutdown after the timeout ends the peer's session, and nothing
    // after the first request ever reached it.
    let (request, rest) = peer.join().unwrap();
    assert_eq!(request, [b'R', 0x08, 0, 0, 0, 4]);
    assert!(rest.is_empty());
}

#[test]
fn test_concurrent_clients_share_one_stream() {
    const THREADS: u8 = 4;
    const CHARS: usize = 50;

    let (addr, printed, server) = spawn_server(1);
    let dev = Arc::new(SockDev::connect(addr, &SockDevConfig::default()).unwrap());

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let dev = dev.clone();
            thread::spawn(move || {
                for _ in 0..CHARS {
                    assert_eq!(dev.read_register(STATUS.into(), 4).unwrap(), 1);
                    dev.write_register(TXDATA.into(), 1, u64::from(b'a' + t)).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Flushes every earlier write through the emulator before checking output.
    assert_eq!(dev.read_register(CTRL.into(), 4).unwrap(), 1);
    assert_eq!(dev.fault_count(), 0);
    let printed = printed.lock().unwrap().clone();
    for t in 0..THREADS {
        assert_eq!(printed.iter().filter(|&&c| c == b'a' + t).count(), CHARS);
    }

    drop(dev);
    let summaries = server.join().unwrap();
    assert_eq!(summaries[0].frames, u64::from(THREADS) * CHARS as u64 * 2 + 1);
}

#[test]
fn test_bridge_mapped_in_host_address_space() {
    const BASE: u64 = 0x1002_0000;

    let (addr, printed, server) = spawn_server(1);
    let dev = SockDev::connect(addr, &SockDevConfig::default()).unwrap();

    let mut bus = MmioManager::default();
    bus.register_device(BASE, Box::new(dev)).unwrap();

    bus.handle_write(BASE + u64::from(CTRL), 4, 1).unwrap();
    for &c in b"Hi\n" {
        assert_eq!(bus.handle_read(BASE + u64::from(STATUS), 4).unwrap() & 1, 1);
        bus.handle_write(BASE + u64::from(TXDATA), 1, c.into()).unwrap();
    }
    assert_eq!(bus.handle_read(BASE + u64::from(CTRL), 1).unwrap(), 1);
    assert_eq!(*printed.lock().unwrap(), b"Hi\n");

    drop(bus);
    server.join().unwrap();
}
