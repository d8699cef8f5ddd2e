//! Drives the host stack simulator from the command line against a built-in lab:
//!
//! ```text
//! client 10.0.1.2 ---- 10.0.1.1 router 10.0.2.1 ---- 10.0.2.2 server
//!        2001:db8:1::2    2001:db8:1::1  2001:db8:2::1    2001:db8:2::2
//! ```
//!
//! plus, for `dhcp`, a single client facing a DHCP server at 192.168.1.1.
use anyhow::{anyhow, Context, Result};
use clap::{value_t, App, AppSettings, Arg, ArgMatches, SubCommand};
use netsim_runtime::dhcp::DhcpLease;
use netsim_runtime::host::{EchoFailure, PingResult, TracerouteHop};
use netsim_runtime::link::{Port, Wire};
use netsim_runtime::utils::test::dhcp_server::{FakeDhcpServer, ServerMode};
use netsim_runtime::utils::test::harness::{self, Routed};
use netsim_runtime::{DhcpConfig, Host, HostConfig};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn app() -> App<'static, 'static> {
    let target = Arg::with_name("target")
        .value_name("ADDRESS")
        .help("IPv4 or IPv6 address to probe from the client")
        .default_value("10.0.2.2");
    let timeout = Arg::with_name("timeout")
        .short("t")
        .long("timeout")
        .value_name("MILLIS")
        .help("How long to wait for each answer [default: the host's ping timeout]")
        .takes_value(true);

    App::new("netsim")
        .version("0.1.0")
        .about("Host network stack simulator: ARP, NDP, IPv4/IPv6, ICMP, routing and DHCP")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log protocol activity (RUST_LOG overrides)"),
        )
        .subcommand(
            SubCommand::with_name("ping")
                .about("Sends ICMP echo requests from the client")
                .arg(target.clone())
                .arg(
                    Arg::with_name("count")
                        .short("c")
                        .long("count")
                        .value_name("N")
                        .takes_value(true)
                        .default_value("4"),
                )
                .arg(timeout.clone()),
        )
        .subcommand(
            SubCommand::with_name("traceroute")
                .about("Maps the path from the client to a target")
                .arg(target)
                .arg(
                    Arg::with_name("max-hops")
                        .short("m")
                        .long("max-hops")
                        .value_name("N")
                        .takes_value(true)
                        .default_value("30"),
                )
                .arg(timeout),
        )
        .subcommand(
            SubCommand::with_name("dhcp")
                .about("Runs the DHCP client against the lab server")
                .arg(
                    Arg::with_name("offline")
                        .long("offline")
                        .help("Keep the server from answering"),
                )
                .arg(
                    Arg::with_name("synthesize")
                        .long("synthesize")
                        .help("Fall back to a synthesized lease when no server answers"),
                )
                .arg(
                    Arg::with_name("release")
                        .long("release")
                        .help("Release the lease before exiting"),
                ),
        )
        .subcommand(
            SubCommand::with_name("routes").about("Prints the client's routing tables"),
        )
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn target(args: &ArgMatches) -> Result<IpAddr> {
    let raw = args.value_of("target").context("no target given")?;
    raw.parse()
        .with_context(|| format!("{} is not an IP address", raw))
}

fn timeout(args: &ArgMatches, host: &Host) -> Duration {
    match args.value_of("timeout") {
        Some(_) => Duration::from_millis(value_t!(args, "timeout", u64).unwrap_or_else(|e| e.exit())),
        None => host.config().ping_timeout,
    }
}

/// Sets up the routed lab and has the router advertise its IPv6 prefix to the client.
async fn lab() -> Routed {
    let lab = harness::routed_pair();
    lab.router.advertise("left", 1800);
    harness::settle().await;
    lab
}

fn describe_failure(failure: &EchoFailure) -> String {
    match failure {
        EchoFailure::Timeout => "Request timed out".to_string(),
        EchoFailure::LinkDown => "Link down".to_string(),
        EchoFailure::Unreachable { from, code } => {
            format!("From {}: Destination unreachable (code {})", from, code)
        }
        EchoFailure::TimeExceeded { from } => format!("From {}: Time exceeded", from),
    }
}

fn print_ping(target: IpAddr, results: &[PingResult]) {
    for result in results {
        match (&result.failure, result.rtt) {
            (None, Some(rtt)) => println!(
                "{} bytes from {}: icmp_seq={} ttl={} time={:.3} ms",
                result.bytes,
                result.from.unwrap_or(target),
                result.seq,
                result.ttl.unwrap_or(0),
                rtt.as_secs_f64() * 1000.0
            ),
            (Some(failure), _) => println!("icmp_seq={} {}", result.seq, describe_failure(failure)),
            (None, None) => println!("icmp_seq={} no answer", result.seq),
        }
    }
    let received = results.iter().filter(|result| result.success).count();
    let loss = if results.is_empty() {
        100.0
    } else {
        100.0 * (results.len() - received) as f64 / results.len() as f64
    };
    println!("--- {} ping statistics ---", target);
    println!(
        "{} packets transmitted, {} received, {:.0}% packet loss",
        results.len(),
        received,
        loss
    );
}

async fn ping(args: &ArgMatches<'_>) -> Result<()> {
    let target = target(args)?;
    let count = value_t!(args, "count", u16).unwrap_or_else(|e| e.exit());
    let lab = lab().await;
    let results = lab.client.ping(target, count, timeout(args, &lab.client)).await;
    if results.is_empty() {
        return Err(anyhow!("{}: no route to host", target));
    }
    println!("PING {} from {}", target, lab.client.name());
    print_ping(target, &results);
    Ok(())
}

fn print_hop(hop: &TracerouteHop) {
    match (hop.responder, hop.rtt) {
        (Some(responder), Some(rtt)) => println!(
            "{:>2}  {}  {:.3} ms{}",
            hop.hop,
            responder,
            rtt.as_secs_f64() * 1000.0,
            match &hop.failure {
                Some(EchoFailure::Unreachable { .. }) => " !N",
                _ => "",
            }
        ),
        _ => println!("{:>2}  *", hop.hop),
    }
}

async fn traceroute(args: &ArgMatches<'_>) -> Result<()> {
    let target = target(args)?;
    let max_hops = value_t!(args, "max-hops", u8).unwrap_or_else(|e| e.exit());
    let lab = lab().await;
    println!("traceroute to {}, {} hops max", target, max_hops);
    let hops = lab.client.traceroute(target, max_hops, timeout(args, &lab.client)).await;
    if hops.is_empty() {
        return Err(anyhow!("{}: no route to host", target));
    }
    hops.iter().for_each(print_hop);
    Ok(())
}

fn print_lease(lease: &DhcpLease) {
    println!("lease on {}{}", lease.iface, if lease.synthesized { " (synthesized)" } else { "" });
    println!("  address      {}/{}", lease.ip, lease.prefix_len());
    if let Some(gateway) = lease.gateway {
        println!("  gateway      {}", gateway);
    }
    for dns in &lease.dns_servers {
        println!("  dns          {}", dns);
    }
    println!("  server       {}", lease.server_identifier);
    println!("  lease time   {}s", lease.lease_duration.as_secs());
    println!("  renew (T1)   {}s", lease.renewal_time.as_secs());
    println!("  rebind (T2)  {}s", lease.rebinding_time.as_secs());
}

async fn dhcp(args: &ArgMatches<'_>) -> Result<()> {
    let wire = Wire::new();
    let dhcp_config = DhcpConfig::default().synthesize_fallback(args.is_present("synthesize"));
    let client = Host::with_dhcp_config("client", HostConfig::default(), dhcp_config);
    harness::attach(&client, harness::mac(1), wire.end_a());
    // Nobody else on the segment: the conflict probe goes unanswered.
    wire.end_b().on_frame(Box::new(|_| {}));

    let server = Arc::new(FakeDhcpServer::lab());
    if args.is_present("offline") {
        server.set_mode(ServerMode::Offline);
    }
    client.add_dhcp_server(server);

    let outcome = client.request_lease("eth0").await;
    for line in client.dhcp_logs("eth0") {
        println!("{}", line);
    }
    let lease = outcome.context("DHCP failed")?;
    print_lease(&lease);
    println!("state: {}", client.dhcp_state("eth0"));

    if args.is_present("release") {
        client.release_lease("eth0").context("release failed")?;
        println!("released; state: {}", client.dhcp_state("eth0"));
    }
    Ok(())
}

async fn routes() -> Result<()> {
    let lab = lab().await;
    println!("IPv4 routes of {}:", lab.client.name());
    for route in lab.client.routing_table() {
        println!("  {}", route);
    }
    println!("IPv6 routes of {}:", lab.client.name());
    for route in lab.client.ipv6_routing_table() {
        println!("  {}", route);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = app().get_matches();
    init_logging(matches.is_present("verbose"));

    match matches.subcommand() {
        ("ping", Some(args)) => ping(args).await,
        ("traceroute", Some(args)) => traceroute(args).await,
        ("dhcp", Some(args)) => dhcp(args).await,
        ("routes", Some(_)) => routes().await,
        (other, _) => Err(anyhow!("unknown command {}", other)),
    }
}
