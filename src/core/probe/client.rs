//! Minimalistic HTTP/HTTPS client: one `HEAD` request, timestamped at the
//! instant its first reply byte arrives, bounded by a wall-clock deadline.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::core::clue::HeaderField;
use crate::core::probe::url::{self, Scheme};
use crate::error::{HalberdError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
const TERMINATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 4096;

/// Outcome of one probe attempt. `Miss` covers read timeouts and benign
/// socket errors -- recoverable, counted in stats, never fatal to the
/// scan. Fatal conditions (connection refused, unknown reply) surface as
/// `Err` instead.
#[derive(Debug)]
pub enum ProbeOutcome {
    Reply {
        /// UTC seconds at which the first reply byte arrived.
        timestamp: i64,
        headers: Vec<HeaderField>,
    },
    Miss,
}

pub struct ProbeClient {
    timeout: Duration,
}

impl Default for ProbeClient {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ProbeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Perform one `HEAD` request against `address` for `url`.
    ///
    /// `address` may differ from the URL's hostname: the caller has
    /// already resolved and chosen an IP, and the hostname is used only
    /// for the `Host:` header and (for https) TLS SNI.
    pub async fn get_headers(&self, address: IpAddr, raw_url: &str) -> Result<ProbeOutcome> {
        let parsed = url::parse(raw_url)?;
        let socket_addr = SocketAddr::new(address, parsed.port);

        let connect = tokio::time::timeout(self.timeout, TcpStream::connect(socket_addr)).await;
        let stream = match connect {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                return Err(HalberdError::ConnectionRefused(format!(
                    "{socket_addr}: {e}"
                )));
            }
            Ok(Err(_)) | Err(_) => return Ok(ProbeOutcome::Miss),
        };

        let request = build_request(&parsed);

        let raw = match parsed.scheme {
            Scheme::Http => self.exchange(stream, &request).await,
            Scheme::Https => {
                let connector = native_tls::TlsConnector::new()
                    .map_err(|e| HalberdError::InvalidUrl(format!("tls init: {e}")))?;
                let connector = tokio_native_tls::TlsConnector::from(connector);
                let handshake =
                    tokio::time::timeout(self.timeout, connector.connect(&parsed.host, stream))
                        .await;
                match handshake {
                    Ok(Ok(tls_stream)) => self.exchange(tls_stream, &request).await,
                    Ok(Err(_)) | Err(_) => Ok(ProbeOutcome::Miss),
                }
            }
        }?;

        Ok(raw)
    }

    async fn exchange<S>(&self, mut stream: S, request: &[u8]) -> Result<ProbeOutcome>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        if stream.write_all(request).await.is_err() {
            return Ok(ProbeOutcome::Miss);
        }

        let read = tokio::time::timeout(self.timeout, read_until_terminator(&mut stream)).await;
        let buf = match read {
            Ok(Ok(buf)) => buf,
            Ok(Err(_)) | Err(_) => return Ok(ProbeOutcome::Miss),
        };

        let (timestamp, text) = buf;

        if !text.starts_with("HTTP/") {
            return Err(HalberdError::UnknownReply(
                text.lines().next().unwrap_or_default().to_string(),
            ));
        }

        let header_block = match text.find("\r\n") {
            Some(idx) => &text[idx + 2..],
            None => "",
        };

        Ok(ProbeOutcome::Reply {
            timestamp,
            headers: parse_header_block(header_block),
        })
    }
}

/// Read until `\r\n\r\n` is seen or the connection closes. Returns the UTC
/// second of the first nonempty chunk together with everything read before
/// the status-line terminator.
async fn read_until_terminator<S>(stream: &mut S) -> Result<(i64, String)>
where
    S: AsyncReadExt + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut timestamp = None;

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break; // connection closed
        }
        if timestamp.is_none() {
            timestamp = Some(Utc::now().timestamp());
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(pos) = find_subslice(&buf, TERMINATOR) {
            let text = String::from_utf8_lossy(&buf[..pos + TERMINATOR.len()]).to_string();
            return Ok((timestamp.unwrap(), text));
        }
    }

    let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp());
    Ok((timestamp, String::from_utf8_lossy(&buf).to_string()))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn build_request(parsed: &url::ParsedUrl) -> Vec<u8> {
    format!(
        "HEAD {target} HTTP/1.0\r\n\
         Host: {host}\r\n\
         Pragma: no-cache\r\n\
         Cache-control: no-cache\r\n\
         Connection: Keep-Alive\r\n\
         User-Agent: halberd/0.1\r\n\
         Accept: */*\r\n\
         Accept-Language: en\r\n\
         Accept-Charset: iso-8859-1,*,utf-8\r\n\r\n",
        target = parsed.request_target,
        host = parsed.host,
    )
    .into_bytes()
}

/// Split a header block into ordered (name, value) pairs, one per line,
/// at the first `:` (robust against non-canonical whitespace in value).
pub fn parse_header_block(block: &str) -> Vec<HeaderField> {
    block
        .split("\r\n")
        .flat_map(|line| line.split('\n'))
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.to_string(), value.trim_start().to_string()))
        .collect()
}
