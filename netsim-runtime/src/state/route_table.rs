use crate::error::{Error, Result};
use netsim_packets::{ipv4_mask, ipv4_network, ipv6_in_prefix, ipv6_prefix};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Where a route came from. Connected and default routes are unique per interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Connected,
    Static,
    Default,
    /// On-link prefix learned from a Router Advertisement.
    Ra,
}

impl RouteKind {
    fn unique_per_iface(self) -> bool {
        match self {
            RouteKind::Connected | RouteKind::Default => true,
            RouteKind::Static | RouteKind::Ra => false,
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RouteKind::Connected => "connected",
            RouteKind::Static => "static",
            RouteKind::Default => "default",
            RouteKind::Ra => "ra",
        };
        f.write_str(name)
    }
}

/// Address families the routing table understands.
pub trait RouteAddr: Copy + Eq + fmt::Display + fmt::Debug {
    const MAX_PREFIX_LEN: u8;

    /// `self` with every bit past `prefix_len` cleared.
    fn network(self, prefix_len: u8) -> Self;

    fn in_network(self, network: Self, prefix_len: u8) -> bool;
}

impl RouteAddr for Ipv4Addr {
    const MAX_PREFIX_LEN: u8 = 32;

    fn network(self, prefix_len: u8) -> Self {
        ipv4_network(self, ipv4_mask(prefix_len))
    }

    fn in_network(self, network: Self, prefix_len: u8) -> bool {
        self.network(prefix_len) == network.network(prefix_len)
    }
}

impl RouteAddr for Ipv6Addr {
    const MAX_PREFIX_LEN: u8 = 128;

    fn network(self, prefix_len: u8) -> Self {
        ipv6_prefix(self, prefix_len)
    }

    fn in_network(self, network: Self, prefix_len: u8) -> bool {
        ipv6_in_prefix(self, network, prefix_len)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route<A> {
    pub network: A,
    pub prefix_len: u8,
    /// None for on-link routes.
    pub next_hop: Option<A>,
    pub iface: String,
    pub kind: RouteKind,
    pub metric: u32,
}

pub type Ipv4Route = Route<Ipv4Addr>;
pub type Ipv6Route = Route<Ipv6Addr>;

impl<A: RouteAddr> Route<A> {
    pub fn new(
        network: A,
        prefix_len: u8,
        next_hop: Option<A>,
        iface: &str,
        kind: RouteKind,
        metric: u32,
    ) -> Result<Self> {
        if prefix_len > A::MAX_PREFIX_LEN {
            return Err(Error::InvalidPrefix(prefix_len));
        }
        Ok(Route {
            network: network.network(prefix_len),
            prefix_len,
            next_hop,
            iface: iface.to_string(),
            kind,
            metric,
        })
    }

    pub fn matches(&self, dest: A) -> bool {
        dest.in_network(self.network, self.prefix_len)
    }

    /// Same destination and interface. Used to tell explicit entries from derived ones.
    pub fn same_destination(&self, other: &Route<A>) -> bool {
        self.network == other.network
            && self.prefix_len == other.prefix_len
            && self.iface == other.iface
    }
}

impl Ipv4Route {
    pub fn mask(&self) -> Ipv4Addr {
        ipv4_mask(self.prefix_len)
    }
}

impl<A: RouteAddr> fmt::Display for Route<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{} ", self.network, self.prefix_len)?;
        match self.next_hop {
            Some(hop) => write!(f, "via {} ", hop)?,
            None => f.write_str("on-link ")?,
        }
        write!(f, "dev {} {} metric {}", self.iface, self.kind, self.metric)
    }
}

/// The outcome of a lookup: which interface to send on and whose MAC to resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRoute<A> {
    pub iface: String,
    pub next_hop: A,
    pub route: Route<A>,
}

/// Longest prefix wins, then lowest metric, then whichever entry came first.
pub fn longest_prefix_match<'a, A: RouteAddr>(
    routes: impl IntoIterator<Item = &'a Route<A>>,
    dest: A,
) -> Option<&'a Route<A>>
where
    A: 'a,
{
    let mut best: Option<&Route<A>> = None;
    for route in routes.into_iter().filter(|route| route.matches(dest)) {
        best = match best {
            Some(current)
                if (route.prefix_len, std::cmp::Reverse(route.metric))
                    <= (current.prefix_len, std::cmp::Reverse(current.metric)) =>
            {
                Some(current)
            }
            _ => Some(route),
        };
    }
    best
}

/// Ordered route entries for one address family.
#[derive(Clone, Debug, Default)]
pub struct RouteTable<A> {
    routes: Vec<Route<A>>,
}

pub type Ipv4RouteTable = RouteTable<Ipv4Addr>;
pub type Ipv6RouteTable = RouteTable<Ipv6Addr>;

impl<A: RouteAddr> RouteTable<A> {
    pub fn new() -> Self {
        RouteTable { routes: Vec::new() }
    }

    /// Inserts `route`. A connected or default route replaces the one of the same kind on the
    /// same interface; any other kind replaces an entry with the same destination, kind and
    /// interface.
    pub fn add(&mut self, route: Route<A>) {
        let position = self.routes.iter().position(|existing| {
            existing.kind == route.kind
                && existing.iface == route.iface
                && (route.kind.unique_per_iface() || existing.same_destination(&route))
        });
        match position {
            Some(index) => self.routes[index] = route,
            None => self.routes.push(route),
        }
    }

    /// Removes every entry for `network/prefix_len`, whatever its kind or interface.
    pub fn remove(&mut self, network: A, prefix_len: u8) -> Result<Vec<Route<A>>> {
        let network = network.network(prefix_len);
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .routes
            .drain(..)
            .partition(|route| route.network == network && route.prefix_len == prefix_len);
        self.routes = kept;
        if removed.is_empty() {
            return Err(Error::RouteNotFound(format!("{}/{}", network, prefix_len)));
        }
        Ok(removed)
    }

    /// Removes the `kind` entries for `network/prefix_len` leaving through `iface`. Other kinds
    /// for the same destination stay.
    pub fn remove_matching(&mut self, network: A, prefix_len: u8, kind: RouteKind, iface: &str) -> Vec<Route<A>> {
        let network = network.network(prefix_len);
        let (removed, kept): (Vec<_>, Vec<_>) = self.routes.drain(..).partition(|route| {
            route.kind == kind
                && route.iface == iface
                && route.network == network
                && route.prefix_len == prefix_len
        });
        self.routes = kept;
        removed
    }

    pub fn remove_kind(&mut self, iface: &str, kind: RouteKind) {
        self.routes
            .retain(|route| !(route.iface == iface && route.kind == kind));
    }

    pub fn clear_kind(&mut self, kind: RouteKind) {
        self.routes.retain(|route| route.kind != kind);
    }

    /// Forgets everything that leaves through `iface`.
    pub fn remove_iface(&mut self, iface: &str) {
        self.routes.retain(|route| route.iface != iface);
    }

    pub fn lookup(&self, dest: A) -> Option<&Route<A>> {
        longest_prefix_match(&self.routes, dest)
    }

    /// The explicit entries followed by every `derived` entry whose destination is not already
    /// covered by an explicit one.
    pub fn effective(&self, derived: impl IntoIterator<Item = Route<A>>) -> Vec<Route<A>> {
        let mut routes = self.routes.clone();
        for route in derived {
            if !routes
                .iter()
                .any(|existing| existing.kind == route.kind && existing.same_destination(&route))
            {
                routes.push(route);
            }
        }
        routes
    }

    pub fn routes(&self) -> &[Route<A>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Turns a matched route into the hop to resolve: the gateway, or the destination itself for
/// on-link routes.
pub fn resolve_with<A: RouteAddr>(routes: &[Route<A>], dest: A) -> Option<ResolvedRoute<A>> {
    longest_prefix_match(routes, dest).map(|route| ResolvedRoute {
        iface: route.iface.clone(),
        next_hop: route.next_hop.unwrap_or(dest),
        route: route.clone(),
    })
}
