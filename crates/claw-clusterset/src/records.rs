//! Address record synthesis.
//!
//! Every parseable address of every matched node becomes one A or AAAA record,
//! in node order and then address order. Literals that do not parse are
//! skipped and counted.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::normalize_query_name;
use crate::node::Node;

/// DNS record type of a synthesized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record.
    A,
    /// IPv6 address record.
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// The record type for an address.
    #[must_use]
    pub const fn for_address(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Self::A,
            IpAddr::V6(_) => Self::Aaaa,
        }
    }

    /// The mnemonic used in zone files.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed address record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Query name with trailing dot.
    pub name: String,
    /// A or AAAA.
    pub record_type: RecordType,
    /// The address. Displays in canonical form, so `fd11:0::1` from the
    /// directory is answered as `fd11::1`.
    pub address: IpAddr,
    /// Time to live in seconds.
    pub ttl: u32,
}

impl AddressRecord {
    /// Creates a record, deriving the type from the address.
    #[must_use]
    pub fn new(name: &str, address: IpAddr, ttl: u32) -> Self {
        Self {
            name: normalize_query_name(name),
            record_type: RecordType::for_address(&address),
            address,
            ttl,
        }
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} IN {} {}",
            self.name, self.ttl, self.record_type, self.address
        )
    }
}

/// Output of [`RecordSynthesizer::synthesize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    /// The records, in node then address order.
    pub records: Vec<AddressRecord>,
    /// Number of address literals that could not be parsed.
    pub malformed: usize,
}

/// Turns matched nodes into address records.
#[derive(Debug, Clone, Copy)]
pub struct RecordSynthesizer {
    ttl: u32,
}

impl RecordSynthesizer {
    /// Creates a synthesizer emitting records with `ttl` seconds.
    #[must_use]
    pub const fn new(ttl: u32) -> Self {
        Self { ttl }
    }

    /// The TTL applied to every record.
    #[must_use]
    pub const fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Builds records for `nodes` answering `query_name`.
    ///
    /// An address shared by several nodes yields a single record.
    #[must_use]
    pub fn synthesize<'a, I>(&self, query_name: &str, nodes: I) -> Synthesis
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let name = normalize_query_name(query_name);
        let mut seen = HashSet::new();
        let mut out = Synthesis::default();

        for node in nodes {
            for address in &node.addresses {
                let Some(ip) = address.ip() else {
                    warn!(
                        node_id = %node.id,
                        address = %address,
                        "Skipping malformed node address"
                    );
                    out.malformed += 1;
                    continue;
                };
                if seen.insert(ip) {
                    out.records.push(AddressRecord {
                        name: name.clone(),
                        record_type: RecordType::for_address(&ip),
                        address: ip,
                        ttl: self.ttl,
                    });
                }
            }
        }

        out
    }
}

impl Default for RecordSynthesizer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TTL_SECS)
    }
}
