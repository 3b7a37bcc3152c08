use std::fmt::{self, Display, Formatter};
use std::io::{self, BufRead, ErrorKind, Read};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use lazy_static::lazy_static;
use regex::Regex;

pub(crate) const USER_AGENT: &str = concat!("NTRIP rtk-gps/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Protocol {
    /// HTTP/1.x, NTRIP 2.0
    Http,
    /// `ICY`, the NTRIP 1.0 stream reply
    Icy,
    /// `SOURCETABLE`, the NTRIP 1.0 sourcetable reply
    Sourcetable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StatusLine {
    pub protocol: Protocol,
    pub version: String,
    pub code: u16,
    pub reason: String,
}

impl StatusLine {
    pub fn parse(line: &str) -> Option<Self> {
        lazy_static! {
            static ref RE: Regex = Regex::new(
                r"^(?P<proto>HTTP/\d\.\d|ICY|SOURCETABLE) (?P<code>\d{3})(?: (?P<reason>.*))?$"
            )
            .expect("Failed to compile regex");
        }
        let caps = RE.captures(line.trim_end())?;
        let protocol = match &caps["proto"] {
            "ICY" => Protocol::Icy,
            "SOURCETABLE" => Protocol::Sourcetable,
            _ => Protocol::Http,
        };
        Some(Self {
            protocol,
            version: caps["proto"].to_string(),
            code: caps["code"].parse().ok()?,
            reason: caps
                .name("reason")
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        })
    }

    pub fn is_ok(&self) -> bool {
        self.code == 200
    }
}

impl Display for StatusLine {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.code, self.reason)
    }
}

/// One line without its CR/LF terminator, `None` at end of stream
pub(crate) fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

#[derive(Debug, Default)]
pub(crate) struct Headers(Vec<(String, String)>);

impl Headers {
    /// Read header lines up to and including the blank separator line
    pub fn read<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let mut headers = Vec::new();
        while let Some(line) = read_line(reader)? {
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }
        Ok(Self(headers))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_chunked(&self) -> bool {
        self.get("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }
}

/// `GET` request as sent to NTRIP 2.0 casters
pub(crate) fn request(path: &str, host: &str, authorization: Option<&str>) -> String {
    let mut req = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Accept: */*\r\n\
         Ntrip-Version: Ntrip/2.0\r\n\
         User-Agent: {USER_AGENT}\r\n"
    );
    if let Some(auth) = authorization {
        req.push_str(&format!("Authorization: Basic {auth}\r\n"));
    }
    req.push_str("\r\n");
    req
}

/// Base64 `user:password`, `None` when both are empty
pub(crate) fn basic_auth(username: &str, password: &str) -> Option<String> {
    if username.is_empty() && password.is_empty() {
        None
    } else {
        Some(BASE64.encode(format!("{username}:{password}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk {
    Size,
    Data(usize),
    Trailer,
    Done,
}

/// Decodes `Transfer-Encoding: chunked`.
///
/// Partial size lines are kept across read errors.
pub(crate) struct ChunkedReader<R> {
    inner: R,
    state: Chunk,
    line: Vec<u8>,
}

impl<R: BufRead> ChunkedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            state: Chunk::Size,
            line: Vec::new(),
        }
    }

    /// Accumulate into `self.line` until LF, false at end of stream
    fn fill_line(&mut self) -> io::Result<bool> {
        loop {
            let (complete, used) = {
                let available = self.inner.fill_buf()?;
                if available.is_empty() {
                    return Ok(false);
                }
                match available.iter().position(|&b| b == b'\n') {
                    Some(i) => {
                        self.line.extend_from_slice(&available[..i]);
                        (true, i + 1)
                    }
                    None => {
                        self.line.extend_from_slice(available);
                        (false, available.len())
                    }
                }
            };
            self.inner.consume(used);
            if complete {
                return Ok(true);
            }
        }
    }
}

impl<R: BufRead> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.state {
                Chunk::Done => return Ok(0),
                Chunk::Size => {
                    if !self.fill_line()? {
                        return Ok(0);
                    }
                    let line = String::from_utf8_lossy(&self.line).into_owned();
                    self.line.clear();
                    let size = line.split(';').next().unwrap_or_default().trim();
                    if size.is_empty() {
                        continue;
                    }
                    let size = usize::from_str_radix(size, 16).map_err(|_| {
                        io::Error::new(ErrorKind::InvalidData, format!("bad chunk size {size:?}"))
                    })?;
                    self.state = if size == 0 {
                        Chunk::Done
                    } else {
                        Chunk::Data(size)
                    };
                }
                Chunk::Data(remaining) => {
                    if buf.is_empty() {
                        return Ok(0);
                    }
                    let max = remaining.min(buf.len());
                    let n = self.inner.read(&mut buf[..max])?;
                    if n == 0 {
                        return Ok(0);
                    }
                    self.state = if n == remaining {
                        Chunk::Trailer
                    } else {
                        Chunk::Data(remaining - n)
                    };
                    return Ok(n);
                }
                Chunk::Trailer => {
                    if !self.fill_line()? {
                        return Ok(0);
                    }
                    self.line.clear();
                    self.state = Chunk::Size;
                }
            }
        }
    }
}

/// Body of a caster response
pub(crate) enum ResponseBody<R> {
    Identity(R),
    Chunked(ChunkedReader<R>),
}

impl<R: BufRead> ResponseBody<R> {
    pub fn new(reader: R, chunked: bool) -> Self {
        if chunked {
            ResponseBody::Chunked(ChunkedReader::new(reader))
        } else {
            ResponseBody::Identity(reader)
        }
    }
}

impl<R: BufRead> Read for ResponseBody<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ResponseBody::Identity(r) => r.read(buf),
            ResponseBody::Chunked(r) => r.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn status_lines() {
        let icy = StatusLine::parse("ICY 200 OK\r\n").unwrap();
        assert_eq!(icy.protocol, Protocol::Icy);
        assert!(icy.is_ok());

        let http = StatusLine::parse("HTTP/1.1 401 Unauthorized").unwrap();
        assert_eq!(http.protocol, Protocol::Http);
        assert_eq!(http.code, 401);
        assert_eq!(http.reason, "Unauthorized");
        assert_eq!(http.to_string(), "HTTP/1.1 401 Unauthorized");

        let table = StatusLine::parse("SOURCETABLE 200 OK").unwrap();
        assert_eq!(table.protocol, Protocol::Sourcetable);

        assert_eq!(StatusLine::parse("Server: NTRIP Caster"), None);
        assert_eq!(StatusLine::parse(""), None);
    }

    #[test]
    fn headers_until_blank_line() {
        let mut data = Cursor::new(
            b"Content-Type: gnss/data\r\nTransfer-Encoding: Chunked\r\n\r\nbody".to_vec(),
        );
        let headers = Headers::read(&mut data).unwrap();
        assert_eq!(headers.get("content-type"), Some("gnss/data"));
        assert!(headers.is_chunked());
        let mut rest = String::new();
        data.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "body");
    }

    #[test]
    fn chunked_body() {
        let data = b"4\r\nWiki\r\n6;ext=1\r\npedia \r\nE\r\nin \r\n\r\nchunks.\r\n0\r\n\r\n".to_vec();
        let mut body = ResponseBody::new(Cursor::new(data), true);
        let mut out = String::new();
        body.read_to_string(&mut out).unwrap();
        assert_eq!(out, "Wikipedia in \r\n\r\nchunks.");
    }

    #[test]
    fn bad_chunk_size() {
        let mut body = ChunkedReader::new(Cursor::new(b"zz\r\n".to_vec()));
        let err = body.read(&mut [0; 8]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn request_headers() {
        let auth = basic_auth("user", "pwd");
        assert_eq!(auth.as_deref(), Some("dXNlcjpwd2Q="));
        assert_eq!(basic_auth("", ""), None);
        let req = request("/NYC", "caster:2101", auth.as_deref());
        assert!(req.starts_with("GET /NYC HTTP/1.1\r\nHost: caster:2101\r\n"));
        assert!(req.contains("Ntrip-Version: Ntrip/2.0\r\n"));
        assert!(req.contains("Authorization: Basic dXNlcjpwd2Q=\r\n"));
        assert!(req.ends_with("\r\n\r\n"));
    }
}
