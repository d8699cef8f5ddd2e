use netsim_packets::{EtherPayload, IcmpMessage, Ipv4Payload};
use netsim_runtime::host::EchoFailure;
use netsim_runtime::utils::test::harness::{self, mac, v6};
use netsim_runtime::utils::test::{packet_generators, set_logger_for_test};
use netsim_runtime::HostConfig;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

const SOLO: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const STRANGER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 9);
const SERVER: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 2);
const LEFT_GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 1);

fn second() -> Duration {
    Duration::from_secs(1)
}

#[tokio::test(start_paused = true)]
async fn ping_across_the_lan() {
    set_logger_for_test();
    let lan = harness::two_host_lan();
    let beta = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    let results = lan.alpha.ping(beta, 3, second()).await;

    assert_eq!(results.len(), 3);
    for (index, result) in results.iter().enumerate() {
        assert_eq!(usize::from(result.seq), index + 1);
        assert!(result.success);
        assert_eq!(result.ttl, Some(64));
        assert_eq!(result.from, Some(beta));
        assert_eq!(result.bytes, 64);
        assert!(result.rtt.is_some());
        assert_eq!(result.failure, None);
    }
}

#[tokio::test(start_paused = true)]
async fn ping_through_the_router_loses_one_ttl() {
    set_logger_for_test();
    let lab = harness::routed_pair();

    let results = lab.client.ping(IpAddr::V4(SERVER), 2, second()).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.success));
    assert!(results.iter().all(|result| result.ttl == Some(63)));
    assert!(lab.router.forwarded() >= 4);
}

#[tokio::test(start_paused = true)]
async fn ping_own_address_never_touches_the_wire() {
    set_logger_for_test();
    let lan = harness::two_host_lan();
    let own = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

    let results = lan.alpha.ping(own, 2, second()).await;
    let loopback = lan.alpha.ping(IpAddr::V4(Ipv4Addr::LOCALHOST), 1, second()).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.success && result.rtt == Some(Duration::from_secs(0))));
    assert_eq!(loopback.len(), 1);
    assert!(loopback[0].success);
    assert!(harness::drain_tap(&lan.tap).is_empty());
}

#[tokio::test(start_paused = true)]
async fn ping_without_route_or_neighbor_gives_nothing() {
    set_logger_for_test();
    let lan = harness::two_host_lan_with(HostConfig::default().resolution_timeout(second()));

    let off_net = lan.alpha.ping(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 3, second()).await;
    let absent = lan.alpha.ping(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 77)), 3, second()).await;

    assert!(off_net.is_empty());
    assert!(absent.is_empty());
}

#[tokio::test(start_paused = true)]
async fn silent_target_times_out_per_request() {
    set_logger_for_test();
    let (host, probe) = harness::probed_host(HostConfig::default());
    probe.inject(packet_generators::arp_reply(mac(9), STRANGER, mac(1), SOLO));
    harness::settle().await;

    let results = host.ping(IpAddr::V4(STRANGER), 2, second()).await;

    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(!result.success);
        assert_eq!(result.failure, Some(EchoFailure::Timeout));
        assert_eq!(result.rtt, None);
    }
    let requests = probe
        .received()
        .into_iter()
        .filter(|frame| match &frame.payload {
            EtherPayload::Ipv4(packet) => match &packet.payload {
                Ipv4Payload::Icmp(IcmpMessage::EchoRequest { .. }) => true,
                _ => false,
            },
            _ => false,
        })
        .count();
    assert_eq!(requests, 2);
}

#[tokio::test(start_paused = true)]
async fn destination_unreachable_fails_the_pending_echo() {
    set_logger_for_test();
    let (host, probe) = harness::probed_host(HostConfig::default());
    let reporter = Ipv4Addr::new(10, 0, 0, 254);
    probe.inject(packet_generators::arp_reply(mac(9), STRANGER, mac(1), SOLO));
    harness::settle().await;

    let (results, _) = tokio::join!(host.ping(IpAddr::V4(STRANGER), 1, Duration::from_secs(5)), async {
        harness::settle().await;
        probe.inject(packet_generators::dst_unreachable(
            mac(9),
            mac(1),
            reporter,
            SOLO,
            STRANGER,
        ));
    });

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(results[0].from, Some(IpAddr::V4(reporter)));
    assert_eq!(
        results[0].failure,
        Some(EchoFailure::Unreachable {
            from: IpAddr::V4(reporter),
            code: 1
        })
    );
}

#[tokio::test(start_paused = true)]
async fn echo_requests_are_answered_unless_corrupt() {
    set_logger_for_test();
    let (_host, probe) = harness::probed_host(HostConfig::default());
    let request = packet_generators::echo_request(mac(9), mac(1), STRANGER, SOLO, 7, 1);

    probe.inject(packet_generators::with_bad_checksum(request.clone()));
    harness::settle().await;
    assert!(probe.received().is_empty());

    probe.inject(request);
    harness::settle().await;
    let received = probe.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].dest_mac, mac(9));
    match &received[0].payload {
        EtherPayload::Ipv4(packet) => {
            assert_eq!(packet.src_addr, SOLO);
            assert_eq!(packet.dest_addr, STRANGER);
            assert_eq!(packet.ttl, 64);
            assert!(packet.validate_checksum());
            match &packet.payload {
                Ipv4Payload::Icmp(IcmpMessage::EchoReply {
                    identifier,
                    sequence,
                    data,
                }) => {
                    assert_eq!((*identifier, *sequence), (7, 1));
                    assert_eq!(data.len(), 56);
                }
                other => panic!("expected an echo reply, got {:?}", other),
            }
        }
        other => panic!("expected IPv4, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn broadcast_echo_is_answered_from_the_interface_address() {
    set_logger_for_test();
    let (_host, probe) = harness::probed_host(HostConfig::default().default_ttl(128));
    let directed = Ipv4Addr::new(10, 0, 0, 255);

    probe.inject(packet_generators::echo_request(
        mac(9),
        netsim_packets::MacAddr::BROADCAST,
        STRANGER,
        directed,
        3,
        9,
    ));
    harness::settle().await;

    let received = probe.received();
    assert_eq!(received.len(), 1);
    match &received[0].payload {
        EtherPayload::Ipv4(packet) => {
            assert_eq!(packet.src_addr, SOLO);
            assert_eq!(packet.ttl, 128);
        }
        other => panic!("expected IPv4, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn traceroute_walks_the_path() {
    set_logger_for_test();
    let lab = harness::routed_pair();

    let hops = lab.client.traceroute(IpAddr::V4(SERVER), 10, second()).await;

    assert_eq!(hops.len(), 2);
    assert_eq!(hops[0].hop, 1);
    assert_eq!(hops[0].responder, Some(IpAddr::V4(LEFT_GATEWAY)));
    assert!(!hops[0].reached);
    assert_eq!(
        hops[0].failure,
        Some(EchoFailure::TimeExceeded {
            from: IpAddr::V4(LEFT_GATEWAY)
        })
    );
    assert_eq!(hops[1].hop, 2);
    assert_eq!(hops[1].responder, Some(IpAddr::V4(SERVER)));
    assert!(hops[1].reached);
    assert!(hops[1].rtt.is_some());
}

#[tokio::test(start_paused = true)]
async fn traceroute_keeps_probing_past_unreachable() {
    set_logger_for_test();
    let lab = harness::routed_pair();
    let nowhere = IpAddr::V4(Ipv4Addr::new(10, 0, 9, 9));
    let unreachable = Some(EchoFailure::Unreachable {
        from: IpAddr::V4(LEFT_GATEWAY),
        code: 0,
    });

    let pings = lab.client.ping(nowhere, 1, second()).await;
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].failure, unreachable);

    let hops = lab.client.traceroute(nowhere, 4, second()).await;
    assert_eq!(hops.len(), 4);
    assert_eq!(
        hops[0].failure,
        Some(EchoFailure::TimeExceeded {
            from: IpAddr::V4(LEFT_GATEWAY)
        })
    );
    for (index, hop) in hops.iter().enumerate().skip(1) {
        assert_eq!(usize::from(hop.hop), index + 1);
        assert!(!hop.reached);
        assert_eq!(hop.responder, Some(IpAddr::V4(LEFT_GATEWAY)));
        assert_eq!(hop.failure, unreachable);
    }
}

#[tokio::test(start_paused = true)]
async fn traceroute_with_no_hops_sends_nothing() {
    set_logger_for_test();
    let lab = harness::routed_pair();
    let tap = lab.left.tap();

    assert!(lab.client.traceroute(IpAddr::V4(SERVER), 0, second()).await.is_empty());
    assert!(harness::drain_tap(&tap).is_empty());
}

#[tokio::test(start_paused = true)]
async fn ipv6_ping_and_traceroute_through_the_router() {
    set_logger_for_test();
    let lab = harness::routed_pair();
    let server = IpAddr::V6(v6("2001:db8:2::2"));

    let results = lab.client.ping(server, 2, second()).await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.success));
    assert!(results.iter().all(|result| result.ttl == Some(63)));
    assert!(results.iter().all(|result| result.from == Some(server)));

    let hops = lab.client.traceroute(server, 10, second()).await;
    assert_eq!(hops.len(), 2);
    assert_eq!(hops[0].responder, Some(IpAddr::V6(v6("2001:db8:1::1"))));
    assert!(hops[1].reached);
}
