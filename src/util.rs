use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const BIND_ADDR: &str = "TELEMETRY_BIND_ADDR";

pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 5000);

pub fn get_bind_addr() -> Option<SocketAddr> {
    let addr_from_env = std::env::var(BIND_ADDR).ok()?;
    addr_from_env.parse().ok()
}

const DB_PATH: &str = "TELEMETRY_DB_PATH";

pub fn get_db_path() -> Option<PathBuf> {
    let path_from_env = std::env::var(DB_PATH).ok()?;
    (!path_from_env.trim().is_empty()).then(|| PathBuf::from(path_from_env))
}
