use crate::config;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_NETWORK: &str = "unknown_network";
pub const UNKNOWN_STATION: &str = "unknown_station";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub serial: String,
    pub network: String,
    pub station: String,
}

/// Immutable serial -> (network, station) table.
///
/// Entries keep the order of the configuration. A serial listed under more
/// than one network is not rejected; lookups return the first entry in table
/// order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    pub fn from_config(cfg: &config::Registry) -> Self {
        let entries = cfg
            .networks
            .iter()
            .flat_map(|net| {
                net.stations.iter().map(|(serial, station)| RegistryEntry {
                    serial: serial.trim().to_string(),
                    network: net.name.clone(),
                    station: station.clone(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn lookup(&self, serial: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.serial == serial)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub serial: String,
    pub network: String,
    pub station: String,
}

impl DeviceIdentity {
    pub fn is_known(&self) -> bool {
        !(self.network == UNKNOWN_NETWORK && self.station == UNKNOWN_STATION)
    }
}

/// Resolves a serial as read from the device (surrounding whitespace is
/// ignored). Unregistered serials get the `unknown_*` sentinel pair so the
/// session can still build an archive path.
pub fn resolve(serial: &str, registry: &Registry) -> DeviceIdentity {
    let serial = serial.trim();
    match registry.lookup(serial) {
        Some(entry) => DeviceIdentity {
            serial: serial.to_string(),
            network: entry.network.clone(),
            station: entry.station.clone(),
        },
        None => DeviceIdentity {
            serial: serial.to_string(),
            network: UNKNOWN_NETWORK.to_string(),
            station: UNKNOWN_STATION.to_string(),
        },
    }
}
