use crate::config::HostConfig;
use crate::host::Host;
use crate::link::{Port, TappedFrame, Wire, WireEnd};
use crate::utils::test::router::LabRouter;
use crossbeam::channel::{unbounded, Receiver};
use netsim_packets::{EthernetFrame, MacAddr};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

/// The harness helps tests abstract away wiring and the tokio scheduler. Tests should keep the
/// "Given, When, Then" structure (https://martinfowler.com/bliki/GivenWhenThen.html).
///
/// "Given" is a topology: hosts with configured interfaces, plugged into wires, dispatchers
/// started. The builders below return one ready to use. They spawn tasks, so call them from
/// inside a tokio runtime (`#[tokio::test]`).
///
/// "When" is an operation on a host: a ping, a lease request, an injected frame.
///
/// "Then" inspects host state, the frames a wire tap saw, or the frames a probe port received.

/// Locally administered MAC ending in `n`.
pub fn mac(n: u8) -> MacAddr {
    MacAddr::new([0x02, 0, 0, 0, 0, n])
}

fn mask(prefix_len: u8) -> Ipv4Addr {
    netsim_packets::ipv4_mask(prefix_len)
}

/// Lets every spawned dispatcher drain its inbox. With a paused clock the sleep completes
/// instantly once all tasks are idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Everything the tap has seen since the last drain.
pub fn drain_tap(tap: &Receiver<TappedFrame>) -> Vec<TappedFrame> {
    tap.try_iter().collect()
}

/// Two hosts on one wire: alpha 10.0.0.1/24 (02:00:00:00:00:01) on side A, beta 10.0.0.2/24
/// (02:00:00:00:00:02) on side B.
pub struct Lan {
    pub alpha: Host,
    pub beta: Host,
    pub wire: Wire,
    pub tap: Receiver<TappedFrame>,
}

pub fn two_host_lan() -> Lan {
    two_host_lan_with(HostConfig::default())
}

pub fn two_host_lan_with(config: HostConfig) -> Lan {
    let wire = Wire::new();
    let tap = wire.tap();
    let alpha = started_host("alpha", config.clone(), mac(1), wire.end_a());
    let beta = started_host("beta", config, mac(2), wire.end_b());
    configure(&alpha, Ipv4Addr::new(10, 0, 0, 1), 24);
    configure(&beta, Ipv4Addr::new(10, 0, 0, 2), 24);
    Lan {
        alpha,
        beta,
        wire,
        tap,
    }
}

/// A started host with one interface, eth0, plugged into `port` and not yet addressed.
pub fn started_host(name: &str, config: HostConfig, mac: MacAddr, port: Arc<WireEnd>) -> Host {
    let host = Host::new(name, config);
    attach(&host, mac, port);
    host
}

/// Adds eth0 on `port` to an existing host and starts its dispatcher.
pub fn attach(host: &Host, mac: MacAddr, port: Arc<WireEnd>) {
    if let Err(err) = host.add_interface("eth0", mac, port) {
        panic!("could not add eth0 to {}: {}", host.name(), err);
    }
    host.start();
}

pub fn configure(host: &Host, addr: Ipv4Addr, prefix_len: u8) {
    if let Err(err) = host.configure_interface("eth0", addr, mask(prefix_len)) {
        panic!("could not configure {}: {}", host.name(), err);
    }
}

/// A test-controlled station: the far end of a wire whose near end belongs to a host. Frames
/// injected here arrive at the host; frames the host sends are collected.
pub struct Probe {
    pub wire: Wire,
    port: Arc<WireEnd>,
    received: Receiver<EthernetFrame>,
}

impl Probe {
    pub fn inject(&self, frame: EthernetFrame) -> bool {
        self.port.send_frame(frame)
    }

    pub fn received(&self) -> Vec<EthernetFrame> {
        self.received.try_iter().collect()
    }
}

/// One host, "solo" with 10.0.0.1/24 on eth0 (02:00:00:00:00:01), facing a `Probe`.
pub fn probed_host(config: HostConfig) -> (Host, Probe) {
    let wire = Wire::new();
    let host = started_host("solo", config, mac(1), wire.end_a());
    configure(&host, Ipv4Addr::new(10, 0, 0, 1), 24);

    let (sender, received) = unbounded();
    let port = wire.end_b();
    port.on_frame(Box::new(move |frame| {
        let _ = sender.send(frame);
    }));
    (
        host,
        Probe {
            wire,
            port,
            received,
        },
    )
}

/// client (10.0.1.2/24, 2001:db8:1::2/64) - router - server (10.0.2.2/24, 2001:db8:2::2/64).
/// The router holds .1 and ::1 on both sides and is each host's default gateway.
pub struct Routed {
    pub client: Host,
    pub server: Host,
    pub router: LabRouter,
    pub left: Wire,
    pub right: Wire,
}

pub fn routed_pair() -> Routed {
    routed_pair_with(HostConfig::default())
}

pub fn routed_pair_with(config: HostConfig) -> Routed {
    let left = Wire::new();
    let right = Wire::new();

    let router = LabRouter::new("router");
    router.add_port("left", mac(0x11), Ipv4Addr::new(10, 0, 1, 1), 24, left.end_b());
    router.add_port("right", mac(0x12), Ipv4Addr::new(10, 0, 2, 1), 24, right.end_a());
    router.add_ipv6("left", v6("2001:db8:1::1"), 64);
    router.add_ipv6("right", v6("2001:db8:2::1"), 64);
    router.start();

    let client = started_host("client", config.clone(), mac(1), left.end_a());
    configure(&client, Ipv4Addr::new(10, 0, 1, 2), 24);
    let server = started_host("server", config, mac(2), right.end_b());
    configure(&server, Ipv4Addr::new(10, 0, 2, 2), 24);

    for (host, own, gateway) in [
        (&client, "2001:db8:1::2", Ipv4Addr::new(10, 0, 1, 1)),
        (&server, "2001:db8:2::2", Ipv4Addr::new(10, 0, 2, 1)),
    ]
    .iter()
    {
        let result = host
            .configure_ipv6("eth0", v6(own), 64)
            .and_then(|_| host.set_default_gateway(*gateway));
        if let Err(err) = result {
            panic!("could not configure {}: {}", host.name(), err);
        }
    }
    let v6_gateways = [
        (&client, v6("2001:db8:1::1")),
        (&server, v6("2001:db8:2::1")),
    ];
    for (host, gateway) in v6_gateways.iter() {
        if let Err(err) = host.set_ipv6_default_gateway(*gateway, "eth0") {
            panic!("could not configure {}: {}", host.name(), err);
        }
    }

    Routed {
        client,
        server,
        router,
        left,
        right,
    }
}

pub fn v6(addr: &str) -> Ipv6Addr {
    match addr.parse() {
        Ok(addr) => addr,
        Err(err) => panic!("bad IPv6 literal {}: {}", addr, err),
    }
}
