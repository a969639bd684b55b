//! Binary telemetry frame decoding.
//!
//! Senders push one fixed 36-byte little-endian frame per inertial sample:
//!
//! ```text
//! [u8 version][u8 flags][u16 seq][f64 ts_ms]
//! [f32 ax][f32 ay][f32 az][f32 gx][f32 gy][f32 gz]
//! ```
//!
//! Acceleration is in m/s^2, angular velocity in rad/s. A short or
//! unparseable frame decodes to all-null fields; it never errors and never
//! tears down the session.

use bytes::{Buf, BufMut};
use serde::Serialize;

/// Size of one wire frame in bytes.
pub const FRAME_LEN: usize = 36;

/// One decoded inertial sample.
///
/// Every field is optional: a malformed frame yields the all-`None` value.
/// `version` and `flags` are protocol plumbing and are not part of the
/// broadcast JSON projection.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TelemetryFrame {
    #[serde(skip)]
    pub version: Option<u8>,
    #[serde(skip)]
    pub flags: Option<u8>,
    pub seq: Option<u16>,
    /// Milliseconds since epoch, as reported by the sender
    pub ts: Option<f64>,
    pub ax: Option<f32>,
    pub ay: Option<f32>,
    pub az: Option<f32>,
    pub gx: Option<f32>,
    pub gy: Option<f32>,
    pub gz: Option<f32>,
}

impl TelemetryFrame {
    /// True when no telemetry field was recovered.
    pub fn is_null(&self) -> bool {
        self.seq.is_none() && self.ts.is_none() && self.ax.is_none()
    }

    /// Re-encode a fully populated frame to its wire form.
    ///
    /// Returns `None` when any field is missing, i.e. the frame came from
    /// a malformed input.
    pub fn encode(&self) -> Option<[u8; FRAME_LEN]> {
        let mut out = [0u8; FRAME_LEN];
        {
            let mut buf = &mut out[..];
            buf.put_u8(self.version?);
            buf.put_u8(self.flags?);
            buf.put_u16_le(self.seq?);
            buf.put_f64_le(self.ts?);
            buf.put_f32_le(self.ax?);
            buf.put_f32_le(self.ay?);
            buf.put_f32_le(self.az?);
            buf.put_f32_le(self.gx?);
            buf.put_f32_le(self.gy?);
            buf.put_f32_le(self.gz?);
        }
        Some(out)
    }
}

/// Decode the first 36 bytes of `data` as a telemetry frame.
///
/// Inputs shorter than [`FRAME_LEN`] produce the all-null frame; trailing
/// bytes beyond the frame are ignored.
pub fn decode(data: &[u8]) -> TelemetryFrame {
    if data.len() < FRAME_LEN {
        return TelemetryFrame::default();
    }

    let mut buf = &data[..FRAME_LEN];
    TelemetryFrame {
        version: Some(buf.get_u8()),
        flags: Some(buf.get_u8()),
        seq: Some(buf.get_u16_le()),
        ts: Some(buf.get_f64_le()),
        ax: Some(buf.get_f32_le()),
        ay: Some(buf.get_f32_le()),
        az: Some(buf.get_f32_le()),
        gx: Some(buf.get_f32_le()),
        gy: Some(buf.get_f32_le()),
        gz: Some(buf.get_f32_le()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> TelemetryFrame {
        TelemetryFrame {
            version: Some(1),
            flags: Some(0),
            seq: Some(7),
            ts: Some(1000.5),
            ax: Some(0.1),
            ay: Some(0.2),
            az: Some(9.8),
            gx: Some(0.0),
            gy: Some(0.0),
            gz: Some(0.0),
        }
    }

    #[test]
    fn test_round_trip() {
        let bytes = sample_frame().encode().unwrap();
        let decoded = decode(&bytes);
        assert_eq!(decoded, sample_frame());
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn test_short_input_decodes_to_null_fields() {
        for len in 0..FRAME_LEN {
            let frame = decode(&vec![0u8; len]);
            assert!(frame.is_null(), "len {len} should decode to null fields");
            assert_eq!(frame, TelemetryFrame::default());
        }
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut bytes = sample_frame().encode().unwrap().to_vec();
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode(&bytes), sample_frame());
    }

    #[test]
    fn test_little_endian_layout() {
        let bytes = sample_frame().encode().unwrap();
        assert_eq!(bytes[0], 1); // version
        assert_eq!(bytes[1], 0); // flags
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 7); // seq
        let ts = f64::from_le_bytes(bytes[4..12].try_into().unwrap());
        assert_eq!(ts, 1000.5);
        let az = f32::from_le_bytes(bytes[20..24].try_into().unwrap());
        assert_eq!(az, 9.8);
    }

    #[test]
    fn test_null_frame_does_not_encode() {
        assert_eq!(TelemetryFrame::default().encode(), None);
    }

    #[test]
    fn test_json_projection_skips_protocol_fields() {
        let value = serde_json::to_value(sample_frame()).unwrap();
        assert!(value.get("version").is_none());
        assert!(value.get("flags").is_none());
        assert_eq!(value["seq"], 7);
    }
}
