//! PMTK command sentences for MediaTek based receivers.

/// Enable GLL, RMC, VTG, GGA, GSA and GSV output once per fix
pub const SENTENCE_MASK: &str = "PMTK314,1,1,1,1,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0";
/// Fix update interval of 1000 ms
pub const UPDATE_RATE: &str = "PMTK220,1000";

/// XOR checksum of an NMEA payload (the bytes between `$` and `*`)
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, &x| acc ^ x)
}

/// Frame a payload as `$<payload>*<checksum>\r\n`
pub fn add_checksum(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 6);
    out.push(b'$');
    out.extend_from_slice(payload);
    out.extend_from_slice(format!("*{:02X}\r\n", checksum(payload)).as_bytes());
    out
}

/// PMTK251 baud rate command
pub fn baud_rate(baud: u32) -> Vec<u8> {
    add_checksum(format!("PMTK251,{baud}").as_bytes())
}
