use crate::config::DhcpConfig;
use crate::dhcp::{
    ConflictChecker, DhcpError, DhcpLease, DhcpResult, DhcpServer, DhcpState, InterfaceConfigSink,
    NoConflicts,
};
use netsim_packets::{DhcpMessage, DhcpMessageType, MacAddr};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LeaseTimer {
    Renewal,
    Rebinding,
    Expiration,
}

struct IfaceState {
    state: DhcpState,
    xid: u32,
    lease: Option<DhcpLease>,
    last_known_lease: Option<DhcpLease>,
    logs: Vec<String>,
    timers: Vec<JoinHandle<()>>,
    /// Bumped whenever the armed timers are superseded. A timer that fires with an older
    /// generation does nothing.
    generation: u64,
    process_running: bool,
}

impl IfaceState {
    fn new() -> IfaceState {
        IfaceState {
            state: DhcpState::Init,
            xid: 0,
            lease: None,
            last_known_lease: None,
            logs: Vec::new(),
            timers: Vec::new(),
            generation: 0,
            process_running: false,
        }
    }

    fn cancel_timers(&mut self) {
        self.generation += 1;
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}

enum ServerReply {
    Ack(DhcpMessage),
    Nak(Ipv4Addr),
}

enum Selection {
    Bound(DhcpLease),
    Declined,
}

struct ClientInner {
    host: String,
    config: DhcpConfig,
    servers: Mutex<Vec<Arc<dyn DhcpServer>>>,
    checker: Mutex<Arc<dyn ConflictChecker>>,
    sink: Arc<dyn InterfaceConfigSink>,
    ifaces: Mutex<HashMap<String, IfaceState>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        for state in self.ifaces.get_mut().values_mut() {
            state.cancel_timers();
        }
    }
}

/// Per-interface DHCP lease state machines of one host.
#[derive(Clone)]
pub struct DhcpClient {
    inner: Arc<ClientInner>,
}

/// Clears `process_running` however the acquisition ends, including when its future is dropped.
struct RunningGuard<'a> {
    client: &'a DhcpClient,
    iface: &'a str,
}

impl<'a> Drop for RunningGuard<'a> {
    fn drop(&mut self) {
        self.client
            .with_state(self.iface, |state| state.process_running = false);
    }
}

impl DhcpClient {
    pub fn new(host: &str, config: DhcpConfig, sink: Arc<dyn InterfaceConfigSink>) -> DhcpClient {
        DhcpClient {
            inner: Arc::new(ClientInner {
                host: host.to_string(),
                config,
                servers: Mutex::new(Vec::new()),
                checker: Mutex::new(Arc::new(NoConflicts)),
                sink,
                ifaces: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &DhcpConfig {
        &self.inner.config
    }

    pub fn add_server(&self, server: Arc<dyn DhcpServer>) {
        self.inner.servers.lock().push(server);
    }

    pub fn set_conflict_checker(&self, checker: Arc<dyn ConflictChecker>) {
        *self.inner.checker.lock() = checker;
    }

    pub fn state(&self, iface: &str) -> DhcpState {
        self.inner
            .ifaces
            .lock()
            .get(iface)
            .map(|state| state.state)
            .unwrap_or(DhcpState::Init)
    }

    pub fn logs(&self, iface: &str) -> Vec<String> {
        self.inner
            .ifaces
            .lock()
            .get(iface)
            .map(|state| state.logs.clone())
            .unwrap_or_default()
    }

    pub fn lease(&self, iface: &str) -> Option<DhcpLease> {
        self.inner
            .ifaces
            .lock()
            .get(iface)
            .and_then(|state| state.lease.clone())
    }

    pub fn last_known_lease(&self, iface: &str) -> Option<DhcpLease> {
        self.inner
            .ifaces
            .lock()
            .get(iface)
            .and_then(|state| state.last_known_lease.clone())
    }

    /// Runs the client until `iface` is bound or the attempt fails. A still-valid remembered
    /// lease is tried first through INIT-REBOOT; otherwise, or when that is refused, the full
    /// DISCOVER/OFFER/REQUEST/ACK exchange runs. An interface that is already bound returns its
    /// current lease.
    pub async fn request_lease(&self, iface: &str) -> DhcpResult<DhcpLease> {
        let mac = self.hardware_address(iface)?;
        let bound = self.with_state(iface, |state| {
            if state.process_running {
                return Err(DhcpError::InProgress(iface.to_string()));
            }
            if state.state == DhcpState::Bound {
                if let Some(lease) = &state.lease {
                    return Ok(Some(lease.clone()));
                }
            }
            state.process_running = true;
            Ok(None)
        })?;
        if let Some(lease) = bound {
            return Ok(lease);
        }

        let _running = RunningGuard {
            client: self,
            iface,
        };
        self.acquire(iface, mac).await
    }

    /// Gives the lease back: DHCPRELEASE to the leasing server, timers cancelled, lease and
    /// remembered lease forgotten, interface unconfigured.
    pub fn release_lease(&self, iface: &str) -> DhcpResult<()> {
        let mac = self.hardware_address(iface)?;
        let lease = self.with_state(iface, |state| {
            let lease = state
                .lease
                .take()
                .ok_or_else(|| DhcpError::NoLease(iface.to_string()))?;
            state.cancel_timers();
            state.last_known_lease = None;
            self.record(
                iface,
                state,
                format!(
                    "DHCPRELEASE of {} sent to {}",
                    lease.ip, lease.server_identifier
                ),
            );
            self.transition(iface, state, DhcpState::Init);
            Ok(lease)
        })?;

        if let Some(server) = self.leasing_server(&lease) {
            let release = DhcpMessage::release(rand::random(), mac, lease.ip, lease.server_identifier);
            server.process_release(&release);
        }
        self.inner.sink.clear_lease(iface);
        Ok(())
    }

    async fn acquire(&self, iface: &str, mac: MacAddr) -> DhcpResult<DhcpLease> {
        if let Some(previous) = self.reusable_lease(iface) {
            if let Some(lease) = self.init_reboot(iface, mac, &previous).await {
                return Ok(lease);
            }
        }

        let mut declines = 0;
        loop {
            match self.select_and_request(iface, mac).await? {
                Selection::Bound(lease) => return Ok(lease),
                Selection::Declined => {
                    declines += 1;
                    if declines >= self.inner.config.decline_limit {
                        self.with_state(iface, |state| {
                            self.record(
                                iface,
                                state,
                                format!("giving up after {} declined offers", declines),
                            );
                        });
                        return Err(DhcpError::TooManyDeclines {
                            iface: iface.to_string(),
                            declines,
                        });
                    }
                }
            }
        }
    }

    async fn init_reboot(
        &self,
        iface: &str,
        mac: MacAddr,
        previous: &DhcpLease,
    ) -> Option<DhcpLease> {
        let servers = self.servers();
        let xid: u32 = rand::random();
        self.with_state(iface, |state| {
            state.xid = xid;
            self.transition(iface, state, DhcpState::InitReboot);
            self.transition(iface, state, DhcpState::Rebooting);
            self.record(
                iface,
                state,
                format!(
                    "DHCPREQUEST (INIT-REBOOT) for previous address {} (xid 0x{:08x})",
                    previous.ip, xid
                ),
            );
        });

        let request = DhcpMessage::request_init_reboot(xid, mac, previous.ip);
        match self.first_reply(iface, xid, &servers, &request) {
            Some(ServerReply::Ack(ack)) => {
                let lease = self.lease_from_ack(iface, &ack, xid);
                if self.conflicts(iface, lease.ip).await {
                    self.decline(iface, mac, &lease);
                    return None;
                }
                Some(self.bind(iface, lease, "DHCPACK for previous address"))
            }
            Some(ServerReply::Nak(server)) => {
                self.with_state(iface, |state| {
                    state.last_known_lease = None;
                    self.record(
                        iface,
                        state,
                        format!("DHCPNAK from {}: previous address refused", server),
                    );
                    self.transition(iface, state, DhcpState::Init);
                });
                None
            }
            None => {
                self.with_state(iface, |state| {
                    self.record(iface, state, "no answer to INIT-REBOOT".to_string());
                    self.transition(iface, state, DhcpState::Init);
                });
                None
            }
        }
    }

    async fn select_and_request(&self, iface: &str, mac: MacAddr) -> DhcpResult<Selection> {
        let servers = self.servers();
        let xid: u32 = rand::random();
        self.with_state(iface, |state| {
            state.xid = xid;
            self.transition(iface, state, DhcpState::Selecting);
            self.record(
                iface,
                state,
                format!(
                    "DHCPDISCOVER sent to {} server(s) (xid 0x{:08x})",
                    servers.len(),
                    xid
                ),
            );
        });

        let discover = DhcpMessage::discover(xid, mac);
        let mut chosen = None;
        for server in &servers {
            let offer = match server.process_discover(&discover) {
                Some(offer) => offer,
                None => continue,
            };
            if offer.xid != xid {
                self.foreign_xid(iface, &offer, xid);
                continue;
            }
            if offer.message_type != DhcpMessageType::Offer {
                self.unexpected(iface, &offer);
                continue;
            }
            chosen = Some(offer);
            break;
        }

        let offer = match chosen {
            Some(offer) => offer,
            None if self.inner.config.synthesize_fallback => {
                return Ok(Selection::Bound(self.bind_synthesized(iface, mac, xid)));
            }
            None => {
                self.with_state(iface, |state| {
                    self.record(iface, state, "no DHCPOFFER received".to_string());
                    self.transition(iface, state, DhcpState::Init);
                });
                return Err(DhcpError::NoOffers(iface.to_string()));
            }
        };

        let server_id = offer.server_id().unwrap_or(offer.siaddr);
        self.with_state(iface, |state| {
            self.record(
                iface,
                state,
                format!("DHCPOFFER of {} from {}", offer.yiaddr, server_id),
            );
            self.transition(iface, state, DhcpState::Requesting);
            self.record(
                iface,
                state,
                format!("DHCPREQUEST for {} sent to {}", offer.yiaddr, server_id),
            );
        });

        let request = DhcpMessage::request_selecting(xid, mac, offer.yiaddr, server_id);
        match self.first_reply(iface, xid, &servers, &request) {
            Some(ServerReply::Ack(ack)) => {
                let lease = self.lease_from_ack(iface, &ack, xid);
                if self.conflicts(iface, lease.ip).await {
                    self.decline(iface, mac, &lease);
                    return Ok(Selection::Declined);
                }
                Ok(Selection::Bound(self.bind(iface, lease, "DHCPACK")))
            }
            Some(ServerReply::Nak(server)) => {
                self.with_state(iface, |state| {
                    self.record(iface, state, format!("DHCPNAK from {}", server));
                    self.transition(iface, state, DhcpState::Init);
                });
                Err(DhcpError::Nak {
                    iface: iface.to_string(),
                    server,
                })
            }
            None => {
                self.with_state(iface, |state| {
                    self.record(iface, state, "no DHCPACK received".to_string());
                    self.transition(iface, state, DhcpState::Init);
                });
                Err(DhcpError::NoAck(iface.to_string()))
            }
        }
    }

    /// The first ACK or NAK carrying our XID. Replies with another XID are logged and skipped.
    fn first_reply(
        &self,
        iface: &str,
        xid: u32,
        servers: &[Arc<dyn DhcpServer>],
        request: &DhcpMessage,
    ) -> Option<ServerReply> {
        for server in servers {
            let reply = match server.process_request(request) {
                Some(reply) => reply,
                None => continue,
            };
            if reply.xid != xid {
                self.foreign_xid(iface, &reply, xid);
                continue;
            }
            match reply.message_type {
                DhcpMessageType::Ack => return Some(ServerReply::Ack(reply)),
                DhcpMessageType::Nak => {
                    let server_id = reply.server_id().unwrap_or_else(|| server.server_identifier());
                    return Some(ServerReply::Nak(server_id));
                }
                _ => self.unexpected(iface, &reply),
            }
        }
        None
    }

    async fn conflicts(&self, iface: &str, ip: Ipv4Addr) -> bool {
        let checker = Arc::clone(&*self.inner.checker.lock());
        checker.check(iface, ip).await
    }

    fn decline(&self, iface: &str, mac: MacAddr, lease: &DhcpLease) {
        warn!(host = %self.inner.host, iface, ip = %lease.ip, "offered address already in use");
        if let Some(server) = self.leasing_server(lease) {
            let decline = DhcpMessage::decline(lease.xid, mac, lease.ip, lease.server_identifier);
            server.process_decline(&decline);
        }
        self.with_state(iface, |state| {
            self.record(
                iface,
                state,
                format!(
                    "address {} is already in use: DHCPDECLINE sent to {}",
                    lease.ip, lease.server_identifier
                ),
            );
            self.transition(iface, state, DhcpState::Init);
        });
    }

    fn bind(&self, iface: &str, lease: DhcpLease, reason: &str) -> DhcpLease {
        self.with_state(iface, |state| {
            state.cancel_timers();
            state.xid = lease.xid;
            state.lease = Some(lease.clone());
            state.last_known_lease = Some(lease.clone());
            self.record(
                iface,
                state,
                format!(
                    "{}: bound to {}/{} from {} for {}s (T1 {}s, T2 {}s)",
                    reason,
                    lease.ip,
                    lease.prefix_len(),
                    lease.server_identifier,
                    lease.lease_duration.as_secs(),
                    lease.renewal_time.as_secs(),
                    lease.rebinding_time.as_secs()
                ),
            );
            self.transition(iface, state, DhcpState::Bound);
            self.arm_timers(iface, state, &lease);
        });
        self.inner.sink.apply_lease(iface, &lease);
        lease
    }

    fn bind_synthesized(&self, iface: &str, mac: MacAddr, xid: u32) -> DhcpLease {
        warn!(
            host = %self.inner.host,
            iface,
            "no DHCP server answered, synthesizing a fallback lease (non-RFC behavior)"
        );
        let lease = DhcpLease::synthesized(
            iface,
            mac,
            self.inner.config.default_lease_time,
            xid,
            Instant::now(),
        );
        self.bind(iface, lease, "synthesized fallback lease (non-RFC behavior)")
    }

    fn arm_timers(&self, iface: &str, state: &mut IfaceState, lease: &DhcpLease) {
        let generation = state.generation;
        let schedule = [
            (LeaseTimer::Renewal, lease.renewal_at()),
            (LeaseTimer::Rebinding, lease.rebinding_at()),
            (LeaseTimer::Expiration, lease.expiration),
        ];
        for &(timer, deadline) in schedule.iter() {
            let client: Weak<ClientInner> = Arc::downgrade(&self.inner);
            let iface = iface.to_string();
            state.timers.push(tokio::spawn(async move {
                sleep_until(deadline).await;
                if let Some(inner) = client.upgrade() {
                    DhcpClient { inner }.on_timer(&iface, timer, generation);
                }
            }));
        }
    }

    fn on_timer(&self, iface: &str, timer: LeaseTimer, generation: u64) {
        let lease = self.with_state(iface, |state| {
            if state.generation != generation {
                debug!(host = %self.inner.host, iface, ?timer, "stale lease timer ignored");
                return None;
            }
            let applies = match timer {
                LeaseTimer::Renewal => state.state == DhcpState::Bound,
                LeaseTimer::Rebinding => {
                    state.state == DhcpState::Bound || state.state == DhcpState::Renewing
                }
                // Any state: a failed re-acquisition goes back to Init still holding the lease.
                LeaseTimer::Expiration => true,
            };
            if applies {
                state.lease.clone()
            } else {
                None
            }
        });
        let lease = match lease {
            Some(lease) => lease,
            None => return,
        };

        match timer {
            LeaseTimer::Renewal => self.renew(iface, &lease),
            LeaseTimer::Rebinding => self.rebind(iface, &lease),
            LeaseTimer::Expiration => self.drop_lease(
                iface,
                format!("lease on {} expired", lease.ip),
                false,
            ),
        }
    }

    /// T1: unicast REQUEST to the server that granted the lease.
    fn renew(&self, iface: &str, lease: &DhcpLease) {
        let mac = match self.inner.sink.hardware_address(iface) {
            Some(mac) => mac,
            None => return,
        };
        let xid: u32 = rand::random();
        self.with_state(iface, |state| {
            state.xid = xid;
            self.transition(iface, state, DhcpState::Renewing);
            self.record(
                iface,
                state,
                format!(
                    "T1 reached: DHCPREQUEST to {} to renew {}",
                    lease.server_identifier, lease.ip
                ),
            );
        });
        let request = DhcpMessage::request_extend(xid, mac, lease.ip, false);
        let servers: Vec<_> = self.leasing_server(lease).into_iter().collect();
        self.extend(iface, xid, &servers, &request, "waiting for T2");
    }

    /// T2: broadcast REQUEST to every server.
    fn rebind(&self, iface: &str, lease: &DhcpLease) {
        let mac = match self.inner.sink.hardware_address(iface) {
            Some(mac) => mac,
            None => return,
        };
        let xid: u32 = rand::random();
        self.with_state(iface, |state| {
            state.xid = xid;
            self.transition(iface, state, DhcpState::Rebinding);
            self.record(
                iface,
                state,
                format!("T2 reached: broadcasting DHCPREQUEST to rebind {}", lease.ip),
            );
        });
        let request = DhcpMessage::request_extend(xid, mac, lease.ip, true);
        let servers = self.servers();
        self.extend(iface, xid, &servers, &request, "waiting for expiration");
    }

    fn extend(
        &self,
        iface: &str,
        xid: u32,
        servers: &[Arc<dyn DhcpServer>],
        request: &DhcpMessage,
        on_silence: &str,
    ) {
        match self.first_reply(iface, xid, servers, request) {
            Some(ServerReply::Ack(ack)) => {
                let lease = self.lease_from_ack(iface, &ack, xid);
                self.bind(iface, lease, "DHCPACK, lease extended");
            }
            Some(ServerReply::Nak(server)) => {
                self.drop_lease(iface, format!("DHCPNAK from {}, lease lost", server), true);
            }
            None => self.with_state(iface, |state| {
                self.record(iface, state, format!("no answer, {}", on_silence));
            }),
        }
    }

    fn drop_lease(&self, iface: &str, reason: String, forget_last_known: bool) {
        self.with_state(iface, |state| {
            state.cancel_timers();
            state.lease = None;
            if forget_last_known {
                state.last_known_lease = None;
            }
            self.record(iface, state, reason);
            // A running acquisition owns the state from here on.
            if !state.process_running {
                self.transition(iface, state, DhcpState::Init);
            }
        });
        self.inner.sink.clear_lease(iface);
    }

    fn lease_from_ack(&self, iface: &str, ack: &DhcpMessage, xid: u32) -> DhcpLease {
        DhcpLease::from_ack(
            iface,
            ack,
            xid,
            self.inner.config.default_lease_time,
            Instant::now(),
        )
    }

    fn reusable_lease(&self, iface: &str) -> Option<DhcpLease> {
        let now = Instant::now();
        self.with_state(iface, |state| {
            state
                .last_known_lease
                .clone()
                .filter(|lease| !lease.synthesized && !lease.is_expired(now))
        })
    }

    fn leasing_server(&self, lease: &DhcpLease) -> Option<Arc<dyn DhcpServer>> {
        self.servers()
            .into_iter()
            .find(|server| server.server_identifier() == lease.server_identifier)
    }

    fn servers(&self) -> Vec<Arc<dyn DhcpServer>> {
        self.inner.servers.lock().clone()
    }

    fn hardware_address(&self, iface: &str) -> DhcpResult<MacAddr> {
        self.inner
            .sink
            .hardware_address(iface)
            .ok_or_else(|| DhcpError::UnknownInterface(iface.to_string()))
    }

    fn foreign_xid(&self, iface: &str, message: &DhcpMessage, expected: u32) {
        warn!(
            host = %self.inner.host,
            iface,
            xid = message.xid,
            expected,
            "ignoring DHCP reply with mismatched xid"
        );
        self.with_state(iface, |state| {
            self.record(
                iface,
                state,
                format!(
                    "ignored {} with xid 0x{:08x} (expected 0x{:08x})",
                    message.message_type.name(),
                    message.xid,
                    expected
                ),
            );
        });
    }

    fn unexpected(&self, iface: &str, message: &DhcpMessage) {
        self.with_state(iface, |state| {
            self.record(
                iface,
                state,
                format!("ignored unexpected {}", message.message_type.name()),
            );
        });
    }

    fn with_state<R>(&self, iface: &str, f: impl FnOnce(&mut IfaceState) -> R) -> R {
        let mut ifaces = self.inner.ifaces.lock();
        let state = ifaces
            .entry(iface.to_string())
            .or_insert_with(IfaceState::new);
        f(state)
    }

    fn record(&self, iface: &str, state: &mut IfaceState, line: String) {
        info!(host = %self.inner.host, iface, "{}", line);
        state.logs.push(line);
    }

    fn transition(&self, iface: &str, state: &mut IfaceState, next: DhcpState) {
        if state.state != next {
            debug!(host = %self.inner.host, iface, from = %state.state, to = %next, "dhcp state change");
            state.state = next;
        }
    }
}
