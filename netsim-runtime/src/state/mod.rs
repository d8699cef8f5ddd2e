mod arp_table;
pub use self::arp_table::*;

mod neighbor_cache;
pub use self::neighbor_cache::*;

mod pending;
pub use self::pending::*;

mod route_table;
pub use self::route_table::*;
