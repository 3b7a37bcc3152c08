use std::io::BufRead;

use super::http::read_line;

#[derive(Debug, Clone, PartialEq, Default)]
/// A `STR` record of a caster sourcetable
pub struct StreamEntry {
    /// Mountpoint name
    pub mountpoint: String,
    /// Source identifier, usually the nearest city
    pub identifier: String,
    /// Data format, e.g. `RTCM 3.2`
    pub format: String,
    /// Message types and rates
    pub format_details: String,
    /// Carrier phase information, 0 none, 1 L1, 2 L1+L2
    pub carrier: u8,
    /// Navigation systems, e.g. `GPS+GLO`
    pub nav_system: String,
    /// Network name
    pub network: String,
    /// ISO 3166 country code
    pub country: String,
    /// Approximate latitude of the source
    pub latitude: f64,
    /// Approximate longitude of the source
    pub longitude: f64,
    /// The caster expects GGA sentences from the client
    pub nmea: bool,
    /// Network solution (virtual reference station) rather than a single base
    pub network_solution: bool,
    /// Generating hardware or software
    pub generator: String,
    /// Compression or encryption algorithm
    pub compression: String,
    /// Authentication: `N` none, `B` basic, `D` digest
    pub authentication: String,
    /// Usage is charged
    pub fee: bool,
    /// Bitrate in bits per second
    pub bitrate: u32,
}

impl StreamEntry {
    /// Parse a `STR;...` line
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.trim_end().split(';').collect();
        if fields.len() < 12 || fields[0] != "STR" {
            return None;
        }
        let field = |i: usize| fields.get(i).copied().unwrap_or_default().trim();
        Some(Self {
            mountpoint: field(1).to_string(),
            identifier: field(2).to_string(),
            format: field(3).to_string(),
            format_details: field(4).to_string(),
            carrier: field(5).parse().unwrap_or_default(),
            nav_system: field(6).to_string(),
            network: field(7).to_string(),
            country: field(8).to_string(),
            latitude: field(9).parse().unwrap_or_default(),
            longitude: field(10).parse().unwrap_or_default(),
            nmea: field(11) == "1",
            network_solution: field(12) == "1",
            generator: field(13).to_string(),
            compression: field(14).to_string(),
            authentication: field(15).to_string(),
            fee: field(16) == "Y",
            bitrate: field(17).parse().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// The list of streams a caster offers
pub struct Sourcetable {
    /// Stream records in caster order
    pub streams: Vec<StreamEntry>,
}

impl Sourcetable {
    /// Read records until `ENDSOURCETABLE` or end of stream
    pub fn read<R: BufRead + ?Sized>(reader: &mut R) -> std::io::Result<Self> {
        let mut streams = Vec::new();
        while let Some(line) = read_line(reader)? {
            if line.starts_with("ENDSOURCETABLE") {
                break;
            }
            if let Some(entry) = StreamEntry::parse(&line) {
                streams.push(entry);
            }
        }
        Ok(Self { streams })
    }

    /// The record for `mountpoint`, if offered
    pub fn has_stream(&self, mountpoint: &str) -> Option<&StreamEntry> {
        self.streams.iter().find(|s| s.mountpoint == mountpoint)
    }

    /// Whether `mountpoint` expects GGA feedback
    pub fn requires_nmea(&self, mountpoint: &str) -> Result<bool, super::NtripError> {
        self.has_stream(mountpoint)
            .map(|s| s.nmea)
            .ok_or_else(|| super::NtripError::MountpointNotFound(mountpoint.to_string()))
    }
}
