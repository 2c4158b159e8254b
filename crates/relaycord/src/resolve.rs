//! Turns a configured server address into a canonical [`ServerAddress`].
//!
//! Accepted forms:
//!
//! - `a.b.c.d:port` is used as-is
//! - `a.b.c.d` gets the default game port
//! - `host` or `host:port` is looked up, SRV `_minecraft._tcp.host`
//!   first (its port wins), then the host's A records

use std::net::{Ipv4Addr, SocketAddrV4};

use hickory_resolver::TokioResolver;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use relaycord_protocol::ServerAddress;

/// Port a game server listens on when none is given.
pub const DEFAULT_PORT: u16 = 25565;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid server address: {0}")]
    Invalid(String),

    #[error("no address records for {0}")]
    NotFound(String),

    #[error("lookup failed: {0}")]
    Lookup(#[from] hickory_resolver::ResolveError),
}

/// What an address string asks for before any lookup happens.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Literal(ServerAddress),
    Host { name: String, port: u16 },
}

fn parse_target(address: &str) -> Result<Target, ResolveError> {
    let address = address.trim();
    if let Ok(addr) = address.parse::<SocketAddrV4>() {
        return Ok(Target::Literal(ServerAddress::new(addr)));
    }
    if let Ok(ip) = address.parse::<Ipv4Addr>() {
        return Ok(Target::Literal(ServerAddress::new(SocketAddrV4::new(
            ip,
            DEFAULT_PORT,
        ))));
    }

    let invalid = || ResolveError::Invalid(address.to_string());
    let (name, port) = match address.split_once(':') {
        Some((name, port)) => (name, port.parse::<u16>().map_err(|_| invalid())?),
        None => (address, DEFAULT_PORT),
    };
    if name.is_empty() || name.contains(':') || name.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    Ok(Target::Host {
        name: name.to_string(),
        port,
    })
}

/// DNS-backed address resolver.
pub struct Resolver {
    dns: TokioResolver,
}

impl Resolver {
    /// Uses the system's resolver configuration, or public DNS when it
    /// cannot be read.
    pub fn from_system() -> Self {
        let dns = match TokioResolver::builder_tokio() {
            Ok(builder) => builder.build(),
            Err(e) => {
                tracing::warn!(error = %e, "system resolver config unreadable, using public DNS");
                TokioResolver::builder_with_config(
                    ResolverConfig::cloudflare(),
                    TokioConnectionProvider::default(),
                )
                .build()
            }
        };
        Self { dns }
    }

    pub async fn resolve(&self, address: &str) -> Result<ServerAddress, ResolveError> {
        let (name, port) = match parse_target(address)? {
            Target::Literal(addr) => return Ok(addr),
            Target::Host { name, port } => (name, port),
        };

        match self.dns.srv_lookup(format!("_minecraft._tcp.{name}")).await {
            Ok(srv) => {
                if let Some(record) = srv.iter().next() {
                    let target = record.target().to_utf8();
                    let ip = self.first_ipv4(&target).await?;
                    return Ok(ServerAddress::new(SocketAddrV4::new(ip, record.port())));
                }
            }
            Err(e) => {
                tracing::debug!(host = %name, error = %e, "no SRV record, falling back to A");
            }
        }

        let ip = self.first_ipv4(&name).await?;
        Ok(ServerAddress::new(SocketAddrV4::new(ip, port)))
    }

    async fn first_ipv4(&self, host: &str) -> Result<Ipv4Addr, ResolveError> {
        let lookup = self.dns.ipv4_lookup(host).await?;
        lookup
            .iter()
            .next()
            .map(|a| a.0)
            .ok_or_else(|| ResolveError::NotFound(host.to_string()))
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_ip_and_port_is_literal() {
        let target = parse_target("10.0.0.1:25566").unwrap();
        assert_eq!(target, Target::Literal("10.0.0.1:25566".parse().unwrap()));
    }

    #[test]
    fn test_parse_target_bare_ip_gets_default_port() {
        let target = parse_target("10.0.0.1").unwrap();
        assert_eq!(target, Target::Literal("10.0.0.1:25565".parse().unwrap()));
    }

    #[test]
    fn test_parse_target_hostname_keeps_port() {
        assert_eq!(
            parse_target("mc.example.org:25570").unwrap(),
            Target::Host {
                name: "mc.example.org".into(),
                port: 25570
            }
        );
        assert_eq!(
            parse_target("mc.example.org").unwrap(),
            Target::Host {
                name: "mc.example.org".into(),
                port: DEFAULT_PORT
            }
        );
    }

    #[test]
    fn test_parse_target_malformed_is_invalid() {
        for address in ["", "host:port", "a:b:c", "mc.example.org:70000", ":25565"] {
            assert!(
                matches!(parse_target(address), Err(ResolveError::Invalid(_))),
                "{address:?}"
            );
        }
    }
}
