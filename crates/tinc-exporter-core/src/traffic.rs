//! Per-node traffic counters from `dump traffic`.

use serde::{Deserialize, Serialize};

use crate::scan::{DecodeError, Fields, LineDecoder, LineOutcome};

/// One row of a `dump traffic` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub name: String,
    pub in_packets: u64,
    pub in_bytes: u64,
    pub out_packets: u64,
    pub out_bytes: u64,
}

impl LineDecoder for TrafficRecord {
    fn decode_line(line: &str) -> Result<LineOutcome<Self>, DecodeError> {
        // Some daemons close the dump with a two-field trailer line.
        if line.split_whitespace().count() == 2 {
            return Ok(LineOutcome::Stop);
        }

        let mut f = Fields::new(line);
        let record = TrafficRecord {
            name: f.text("name")?.to_string(),
            in_packets: f.parse("in_packets")?,
            in_bytes: f.parse("in_bytes")?,
            out_packets: f.parse("out_packets")?,
            out_bytes: f.parse("out_bytes")?,
        };
        f.finish()?;
        Ok(LineOutcome::Record(record))
    }
}
