//! Control channel client: one connection per query.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, trace};

use super::error::ControlError;
use super::locator::{Cookie, DaemonDescriptor, Locator};
use super::request::{CTL_VERSION_CURRENT, ControlRequest, RequestType};
use crate::node::NodeRecord;
use crate::scan::{LineDecoder, LineOutcome};
use crate::traffic::TrafficRecord;

/// Client for a tinc daemon's control socket.
///
/// Holds no connection; every query reads the pidfile and dials anew.
#[derive(Debug, Clone)]
pub struct ControlClient {
    locator: Locator,
}

impl ControlClient {
    pub fn new(locator: Locator) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Read the daemon's pidfile.
    pub async fn query_descriptor(&self) -> Result<DaemonDescriptor, ControlError> {
        self.locator.read_descriptor().await
    }

    /// Dump every node the daemon knows about, itself included.
    pub async fn query_nodes(&self) -> Result<Vec<NodeRecord>, ControlError> {
        self.query(ControlRequest::DUMP_NODES).await
    }

    /// Dump per-node traffic counters.
    pub async fn query_traffic(&self) -> Result<Vec<TrafficRecord>, ControlError> {
        self.query(ControlRequest::DUMP_TRAFFIC).await
    }

    /// Send `request` and decode every matching response line as `D`.
    ///
    /// A line that fails to decode fails the whole query; records decoded
    /// before it are dropped.
    pub async fn query<D: LineDecoder>(
        &self,
        request: ControlRequest,
    ) -> Result<Vec<D>, ControlError> {
        let descriptor = self.locator.read_descriptor().await?;

        let socket_path = self.locator.socket_path();
        let stream = UnixStream::connect(&socket_path).await.map_err(|source| {
            ControlError::TransportUnavailable {
                path: socket_path.clone(),
                source,
            }
        })?;
        debug!(
            socket = %socket_path.display(),
            pid = descriptor.pid,
            request = %request,
            "control request"
        );

        let (reader, mut writer) = stream.into_split();
        send_request(&mut writer, &descriptor.cookie, request).await?;

        let mut records = Vec::new();
        read_response(BufReader::new(reader), request, |line| {
            match D::decode_line(line)? {
                LineOutcome::Record(record) => {
                    records.push(record);
                    Ok(LineOutcome::Record(()))
                }
                LineOutcome::Stop => Ok(LineOutcome::Stop),
            }
        })
        .await?;

        debug!(request = %request, records = records.len(), "control response complete");
        Ok(records)
    }
}

/// Write the authentication handshake followed by the request line.
pub async fn send_request<W>(
    writer: &mut W,
    cookie: &Cookie,
    request: ControlRequest,
) -> Result<(), ControlError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let payload = format!(
        "{} ^{} {}\n{}\n",
        RequestType::Id.code(),
        cookie.expose(),
        CTL_VERSION_CURRENT,
        request
    );
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read response lines for `request` until tincd echoes the request back.
///
/// Lines tagged with another prefix belong to other conversations on the
/// channel and are skipped. Tagged lines are handed to `on_line` with the
/// prefix removed; it may end the response early with [`LineOutcome::Stop`].
pub async fn read_response<R, F>(
    reader: R,
    request: ControlRequest,
    mut on_line: F,
) -> Result<(), ControlError>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(&str) -> Result<LineOutcome<()>, crate::scan::DecodeError>,
{
    let echo = request.echo();
    let tag = format!("{echo} ");
    let mut lines = reader.lines();

    while let Some(raw) = lines.next_line().await? {
        let line = raw.trim();
        if line == echo {
            return Ok(());
        }
        let Some(payload) = line.strip_prefix(&tag) else {
            trace!(line, "skipping unrelated control line");
            continue;
        };
        match on_line(payload) {
            Ok(LineOutcome::Record(())) => {}
            Ok(LineOutcome::Stop) => return Ok(()),
            Err(source) => {
                return Err(ControlError::ProtocolViolation {
                    line: line.to_string(),
                    source,
                });
            }
        }
    }

    Err(ControlError::StreamClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::request::Request;
    use pretty_assertions::assert_eq;

    async fn collect<D: LineDecoder>(
        input: &str,
        request: ControlRequest,
    ) -> Result<Vec<D>, ControlError> {
        let mut records = Vec::new();
        read_response(input.as_bytes(), request, |line| match D::decode_line(line)? {
            LineOutcome::Record(r) => {
                records.push(r);
                Ok(LineOutcome::Record(()))
            }
            LineOutcome::Stop => Ok(LineOutcome::Stop),
        })
        .await?;
        Ok(records)
    }

    #[tokio::test]
    async fn test_handshake_bytes() {
        let mut out = Vec::new();
        send_request(&mut out, &Cookie::new("abc123"), ControlRequest::DUMP_NODES)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0 ^abc123 0\n18 3\n");
    }

    #[tokio::test]
    async fn test_sentinel_ends_response() {
        let request = ControlRequest {
            request_type: RequestType::Control,
            request: Request::DumpTraffic,
        };
        let input = "18 13 nodeA 1 2 3 4\n18 13\n18 13 nodeB 5 6 7 8\n";
        let records: Vec<TrafficRecord> = collect(input, request).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "nodeA");
    }

    #[tokio::test]
    async fn test_unrelated_lines_are_skipped() {
        let input = concat!(
            "0 alpha 17.7\n",
            "4 0 4242\n",
            "18 4 alpha beta 10.0.0.2 port 655 0 1\n",
            "18 13 nodeA 1 2 3 4\n",
            "18 130 garbage\n",
            "18 13 nodeB 5 6 7 8\n",
            "18 13\n",
        );
        let records: Vec<TrafficRecord> =
            collect(input, ControlRequest::DUMP_TRAFFIC).await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["nodeA", "nodeB"]);
    }

    #[tokio::test]
    async fn test_decoder_stop_is_not_an_error() {
        let input = "18 13 nodeA 1 2 3 4\n18 13 0 0\n";
        let records: Vec<TrafficRecord> =
            collect(input, ControlRequest::DUMP_TRAFFIC).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_eof_before_sentinel() {
        let input = "18 3 nodeA idA 10.0.0.1 port 655 0 0 0 0 12 32 nodeA nodeA 0 1400 1300 1400 1000000 2.5 10 1000 20 2000\n";
        let result: Result<Vec<NodeRecord>, _> = collect(input, ControlRequest::DUMP_NODES).await;
        assert!(matches!(result, Err(ControlError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_decode_failure_is_protocol_violation() {
        let input = "18 13 nodeA 1 2 3 4\n18 13 nodeB x 2 3 4\n18 13\n";
        let result: Result<Vec<TrafficRecord>, _> =
            collect(input, ControlRequest::DUMP_TRAFFIC).await;
        match result {
            Err(ControlError::ProtocolViolation { line, .. }) => {
                assert_eq!(line, "18 13 nodeB x 2 3 4");
            }
            other => panic!("expected protocol violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_crlf_lines_are_trimmed() {
        let input = "18 13 nodeA 1 2 3 4\r\n18 13\r\n";
        let records: Vec<TrafficRecord> =
            collect(input, ControlRequest::DUMP_TRAFFIC).await.unwrap();
        assert_eq!(records[0].out_bytes, 4);
    }
}
