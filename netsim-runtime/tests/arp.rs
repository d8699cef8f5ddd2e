use netsim_packets::{ArpOp, EtherPayload, EthernetFrame, MacAddr};
use netsim_runtime::link::{TappedFrame, WireSide};
use netsim_runtime::utils::test::harness::{self, mac};
use netsim_runtime::utils::test::{packet_generators, set_logger_for_test};
use netsim_runtime::{Error, HostConfig};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::time::Instant;

const ALPHA: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const BETA: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
const NOBODY: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 77);

fn is_arp_request(frame: &EthernetFrame) -> bool {
    match &frame.payload {
        EtherPayload::Arp(packet) => packet.op == ArpOp::Request,
        _ => false,
    }
}

fn requests_from(side: WireSide, frames: &[TappedFrame]) -> usize {
    frames
        .iter()
        .filter(|tapped| tapped.from == side && is_arp_request(&tapped.frame))
        .count()
}

#[tokio::test(start_paused = true)]
async fn resolves_neighbor_then_answers_from_cache() {
    set_logger_for_test();
    let lan = harness::two_host_lan();

    assert_eq!(lan.alpha.resolve_ipv4("eth0", BETA).await, Ok(mac(2)));
    harness::settle().await;

    let frames = harness::drain_tap(&lan.tap);
    assert_eq!(requests_from(WireSide::A, &frames), 1);
    // The request taught beta where alpha lives.
    assert!(lan
        .beta
        .arp_table()
        .iter()
        .any(|(ip, entry)| *ip == ALPHA && entry.mac == mac(1)));

    assert_eq!(lan.alpha.resolve_ipv4("eth0", BETA).await, Ok(mac(2)));
    assert!(harness::drain_tap(&lan.tap).is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_resolutions_share_one_request() {
    set_logger_for_test();
    let lan = harness::two_host_lan();

    let (first, second) = tokio::join!(
        lan.alpha.resolve_ipv4("eth0", BETA),
        lan.alpha.resolve_ipv4("eth0", BETA)
    );

    assert_eq!(first, Ok(mac(2)));
    assert_eq!(second, Ok(mac(2)));
    assert_eq!(requests_from(WireSide::A, &harness::drain_tap(&lan.tap)), 1);
}

#[tokio::test(start_paused = true)]
async fn each_waiter_keeps_its_own_deadline() {
    set_logger_for_test();
    let config = HostConfig::default().resolution_timeout(Duration::from_secs(1));
    let (host, probe) = harness::probed_host(config);
    let start = Instant::now();

    let (early, late) = tokio::join!(
        async {
            let outcome = host.resolve_ipv4("eth0", NOBODY).await;
            (outcome, start.elapsed())
        },
        async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let outcome = host.resolve_ipv4("eth0", NOBODY).await;
            (outcome, start.elapsed())
        }
    );

    let timeout = Err(Error::ResolutionTimeout(IpAddr::V4(NOBODY)));
    assert_eq!(early.0, timeout);
    assert_eq!(late.0, timeout);
    assert!(early.1 >= Duration::from_secs(1) && early.1 < Duration::from_millis(1500));
    assert!(late.1 >= Duration::from_millis(1500));

    let asked = probe
        .received()
        .iter()
        .filter(|frame| is_arp_request(frame))
        .count();
    assert_eq!(asked, 1);
    assert!(host.arp_table().is_empty());
}

#[tokio::test(start_paused = true)]
async fn answers_requests_for_own_address_only() {
    set_logger_for_test();
    let (host, probe) = harness::probed_host(HostConfig::default());
    let stranger = Ipv4Addr::new(10, 0, 0, 9);

    probe.inject(packet_generators::arp_request(mac(9), stranger, NOBODY));
    probe.inject(packet_generators::arp_request(mac(9), stranger, ALPHA));
    harness::settle().await;

    let received = probe.received();
    assert_eq!(received.len(), 1);
    let reply = &received[0];
    assert_eq!(reply.dest_mac, mac(9));
    match &reply.payload {
        EtherPayload::Arp(packet) => {
            assert_eq!(packet.op, ArpOp::Reply);
            assert_eq!(packet.sender_protocol_addr, ALPHA);
            assert_eq!(packet.sender_hardware_addr, mac(1));
            assert_eq!(packet.target_protocol_addr, stranger);
        }
        other => panic!("expected an ARP reply, got {:?}", other),
    }
    assert!(host
        .arp_table()
        .iter()
        .any(|(ip, entry)| *ip == stranger && entry.mac == mac(9)));
}

#[tokio::test(start_paused = true)]
async fn unsolicited_reply_updates_the_cache() {
    set_logger_for_test();
    let (host, probe) = harness::probed_host(HostConfig::default());
    let stranger = Ipv4Addr::new(10, 0, 0, 9);

    probe.inject(packet_generators::arp_reply(mac(9), stranger, mac(1), ALPHA));
    probe.inject(packet_generators::arp_reply(mac(10), stranger, mac(1), ALPHA));
    harness::settle().await;

    assert_eq!(host.resolve_ipv4("eth0", stranger).await, Ok(mac(10)));
    assert!(probe.received().is_empty());
}

#[tokio::test(start_paused = true)]
async fn special_destinations_need_no_request() {
    set_logger_for_test();
    let lan = harness::two_host_lan();

    assert_eq!(lan.alpha.resolve_ipv4("eth0", ALPHA).await, Ok(mac(1)));
    assert_eq!(
        lan.alpha.resolve_ipv4("eth0", Ipv4Addr::BROADCAST).await,
        Ok(MacAddr::BROADCAST)
    );
    assert_eq!(
        lan.alpha.resolve_ipv4("eth0", Ipv4Addr::new(10, 0, 0, 255)).await,
        Ok(MacAddr::BROADCAST)
    );
    assert_eq!(
        lan.alpha.resolve_ipv4("eth0", Ipv4Addr::new(224, 0, 0, 251)).await,
        Ok(MacAddr::new([0x01, 0x00, 0x5e, 0x00, 0x00, 0xfb]))
    );
    assert!(harness::drain_tap(&lan.tap).is_empty());
}

#[tokio::test(start_paused = true)]
async fn resolution_errors() {
    set_logger_for_test();
    let lan = harness::two_host_lan();
    assert_eq!(
        lan.alpha.resolve_ipv4("eth9", BETA).await,
        Err(Error::UnknownInterface("eth9".to_string()))
    );

    lan.wire.set_link_up(false);
    assert_eq!(
        lan.alpha.resolve_ipv4("eth0", BETA).await,
        Err(Error::LinkDown("eth0".to_string()))
    );

    let wire = netsim_runtime::link::Wire::new();
    let bare = harness::started_host("bare", HostConfig::default(), mac(5), wire.end_a());
    assert_eq!(
        bare.resolve_ipv4("eth0", BETA).await,
        Err(Error::NoAddress("eth0".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn probe_detects_a_squatter() {
    set_logger_for_test();
    let lan = harness::two_host_lan();
    let free = Ipv4Addr::new(10, 0, 0, 3);
    let limit = Duration::from_millis(500);

    assert_eq!(lan.alpha.probe_address("eth0", BETA, limit).await, Ok(true));
    assert_eq!(lan.alpha.probe_address("eth0", free, limit).await, Ok(false));
}
