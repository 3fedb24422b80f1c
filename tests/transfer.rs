//! End-to-end transfers over the loopback interface.
//!
//! Each test binds real UDP sockets on 127.0.0.1 and runs the receiver as a
//! separate tokio task, so both endpoints make progress concurrently.

use std::time::Duration;

use tokio::sync::watch;
use udp_arq::{
    loss::{policy_for, NeverDrop},
    packet::Packet,
    sender::Outcome,
    socket::{DatagramChannel, Socket, MAX_DATAGRAM},
    Receiver, SenderConfig, Sender,
};

/// Bind a socket to an OS-assigned port on loopback.
async fn ephemeral() -> Socket {
    let addr = "127.0.0.1:0".parse().unwrap();
    Socket::bind(addr).await.expect("bind failed")
}

// ---------------------------------------------------------------------------
// Test 1: lossless transfer, no retransmissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_lossless_transfer_sends_each_packet_once() {
    let rx_sock = ephemeral().await;
    let rx_addr = rx_sock.local_addr;
    let (stop_tx, stop_rx) = watch::channel(false);

    let receiver = tokio::spawn(async move {
        let mut r = Receiver::new(NeverDrop);
        r.serve(&rx_sock, stop_rx).await.expect("serve")
    });

    let config = SenderConfig {
        total_packets: 10,
        window_size: 4,
        timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let sender = Sender::new(ephemeral().await, rx_addr, config).expect("config");
    let report = sender.run(watch::channel(false).1).await;

    stop_tx.send(true).unwrap();
    let rx_stats = receiver.await.unwrap();

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.delivered, 10);
    assert_eq!(report.stats.sends, 10);
    assert_eq!(report.stats.retransmissions, 0);
    assert_eq!(rx_stats.first_deliveries, 10);
    assert_eq!(rx_stats.duplicates, 0);
    assert_eq!(rx_stats.acks_sent, 10);
}

// ---------------------------------------------------------------------------
// Test 2: suppressed ACKs are recovered by retransmission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_lossy_acks_still_complete() {
    let rx_sock = ephemeral().await;
    let rx_addr = rx_sock.local_addr;
    let (stop_tx, stop_rx) = watch::channel(false);

    let receiver = tokio::spawn(async move {
        let mut r = Receiver::new(policy_for(0.3, Some(7)).expect("policy"));
        let stats = r.serve(&rx_sock, stop_rx).await.expect("serve");
        (stats, r.seen().len())
    });

    let config = SenderConfig {
        total_packets: 60,
        window_size: 8,
        timeout: Duration::from_millis(30),
        poll_interval: Duration::from_millis(10),
        progress_interval: 20,
        ..Default::default()
    };
    let sender = Sender::new(ephemeral().await, rx_addr, config).expect("config");
    let report = tokio::time::timeout(Duration::from_secs(30), sender.run(watch::channel(false).1))
        .await
        .expect("transfer did not finish");

    stop_tx.send(true).unwrap();
    let (rx_stats, seen) = receiver.await.unwrap();

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.delivered, 60);
    assert!(report.failed.is_empty());
    assert!(report.stats.retransmissions > 0);
    assert!(rx_stats.acks_suppressed > 0);
    assert!(rx_stats.duplicates > 0);
    assert_eq!(seen, 60);
}

// ---------------------------------------------------------------------------
// Test 3: the receiver answers on the wire exactly as documented
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_receiver_wire_behaviour() {
    let rx_sock = ephemeral().await;
    let rx_addr = rx_sock.local_addr;
    let (stop_tx, stop_rx) = watch::channel(false);

    let receiver = tokio::spawn(async move {
        let mut r = Receiver::new(NeverDrop);
        r.serve(&rx_sock, stop_rx).await.expect("serve")
    });

    let peer = ephemeral().await;
    let mut buf = [0u8; MAX_DATAGRAM];

    // Wrong magic, right length: no answer.  DATA(5) twice: two ACK(5).
    let mut bad = Packet::data(3).encode();
    bad[0] ^= 0xFF;
    peer.send_to(&bad, rx_addr).await.unwrap();
    peer.send_to(&Packet::data(5).encode(), rx_addr).await.unwrap();
    peer.send_to(&Packet::data(5).encode(), rx_addr).await.unwrap();

    for _ in 0..2 {
        let (n, from) = tokio::time::timeout(Duration::from_secs(5), peer.recv_from(&mut buf))
            .await
            .expect("ACK timeout")
            .unwrap();
        assert_eq!(from, rx_addr);
        assert_eq!(Packet::decode(&buf[..n]).unwrap(), Packet::ack(5));
    }

    stop_tx.send(true).unwrap();
    let stats = receiver.await.unwrap();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.first_deliveries, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.acks_sent, 2);
}
