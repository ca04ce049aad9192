//! GeoIP lookup service using a MaxMind GeoLite2/GeoIP2 MMDB.
//!
//! The reader is explicitly constructed and passed where needed instead of
//! living in a process-wide global, so tests can run without a database file.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

/// Sentinel country used whenever a lookup cannot resolve.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Country-level IP geolocation backed by a memory-mapped MaxMind database.
///
/// A service constructed without a database path is valid and resolves every
/// lookup to [`UNKNOWN_COUNTRY`]; lookups never fail.
pub struct GeoIpService {
    reader: Option<Arc<Reader<Mmap>>>,
}

impl GeoIpService {
    /// Create a new GeoIP service from an optional MMDB file path.
    pub fn new(db_path: Option<&str>) -> Result<Self> {
        let reader = if let Some(path) = db_path {
            let reader = unsafe { Reader::open_mmap(path) }
                .with_context(|| format!("Failed to open GeoIP database at {}", path))?;
            Some(Arc::new(reader))
        } else {
            None
        };

        Ok(Self { reader })
    }

    /// Lookup the ISO country code for an IP address.
    ///
    /// Returns [`UNKNOWN_COUNTRY`] when no database is loaded, the address
    /// is not in the database, or the record has no country section.
    pub fn lookup(&self, ip: IpAddr) -> String {
        if let Some(ref reader) = self.reader {
            if let Ok(result) = reader.lookup(ip) {
                if let Ok(Some(country)) = result.decode::<geoip2::Country>() {
                    if let Some(iso_code) = country.country.iso_code {
                        return iso_code.to_string();
                    }
                }
            }
        }

        UNKNOWN_COUNTRY.to_string()
    }

    /// Lookup from a textual IP. Unparsable addresses resolve to
    /// [`UNKNOWN_COUNTRY`] instead of erroring.
    pub fn lookup_str(&self, ip: &str) -> String {
        match ip.parse::<IpAddr>() {
            Ok(addr) => self.lookup(addr),
            Err(_) => UNKNOWN_COUNTRY.to_string(),
        }
    }
}

impl Clone for GeoIpService {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
        }
    }
}
