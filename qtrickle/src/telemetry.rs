//! Per-interval telemetry records.
//!
//! The timer emits a [`Record`] through [`Node::emit_telemetry`] at every interval boundary and
//! every reset (but not on the DAG root). The layout is little-endian and fixed within a version of
//! this crate, but it is not meant as a stable wire format:
//!
//! | Offset | Size | Field |
//! |-------:|-----:|-------|
//! | 0  | 1 | kind (0 boundary, 1 reset) |
//! | 1  | 1 | flags (bit 0 transmitted, bit 1 explored) |
//! | 2  | 2 | number of intervals started |
//! | 4  | 2 | number of resets |
//! | 6  | 1 | consistency counter `C` |
//! | 7  | 1 | redundancy constant `K` |
//! | 8  | 1 | neighbor count |
//! | 9  | 1 | reward (signed) |
//! | 10 | 2 | minimal cell ops by others in the listen window |
//! | 12 | 2 | minimal cells in the listen window |
//! | 14 | 2 | DIOs transmitted |
//! | 16 | 2 | DIOs suppressed |
//! | 18 | 4 | interval `I` in ms |
//! | 22 | 4 | `T` in ms |
//! | 26 | 14 | `pbusy`, `pqu`, `psent`, `preset`, `pstable`, `ptransmit`, epsilon |
//!
//! Probabilities are encoded as `u16` fixed-point values scaled by [`FIXED_POINT_SCALE`].
//!
//! [`Node::emit_telemetry`]: ../config/trait.Node.html#method.emit_telemetry
//! [`FIXED_POINT_SCALE`]: ../constant.FIXED_POINT_SCALE.html

use crate::{
    bytes::{ByteReader, ByteWriter, FromBytes, ToBytes},
    estimator::Estimates,
    time::Duration,
    Error, FIXED_POINT_SCALE,
};
use bitflags::bitflags;

enum_with_unknown! {
    /// Event that produced a [`Record`].
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum RecordKind(u8) {
        /// End of an interval.
        Boundary = 0,
        /// The timer was reset.
        Reset = 1,
    }
}

bitflags! {
    pub struct RecordFlags: u8 {
        /// A DIO was transmitted in the interval.
        const TRANSMITTED = 0x01;
        /// The decision was made by exploring.
        const EXPLORED    = 0x02;
    }
}

/// Converts a probability to fixed point, rounding to the nearest step and saturating.
pub fn to_fixed(p: f32) -> u16 {
    // `as` saturates, and maps NaN to 0
    (p * FIXED_POINT_SCALE + 0.5) as u16
}

/// Converts a fixed point value back to a probability.
pub fn from_fixed(raw: u16) -> f32 {
    f32::from(raw) / FIXED_POINT_SCALE
}

/// Fixed-point probabilities carried by a [`Record`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FixedProbabilities {
    pub pbusy: u16,
    pub pqu: u16,
    pub psent: u16,
    pub preset: u16,
    pub pstable: u16,
    pub ptransmit: u16,
    pub epsilon: u16,
}

impl FixedProbabilities {
    pub fn new(estimates: &Estimates, epsilon: f32) -> Self {
        Self {
            pbusy: to_fixed(estimates.pbusy),
            pqu: to_fixed(estimates.pqu),
            psent: to_fixed(estimates.psent),
            preset: to_fixed(estimates.preset),
            pstable: to_fixed(estimates.pstable),
            ptransmit: to_fixed(estimates.ptransmit),
            epsilon: to_fixed(epsilon),
        }
    }
}

/// A telemetry record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordKind,
    pub flags: RecordFlags,
    pub n_states: u16,
    pub n_reset: u16,
    pub c: u8,
    pub k: u8,
    pub n_nbr: u8,
    pub reward: i8,
    pub used: u16,
    pub n_cells: u16,
    pub dio_transmit: u16,
    pub dio_suppress: u16,
    pub interval: Duration,
    pub t: Duration,
    pub probabilities: FixedProbabilities,
}

impl Record {
    /// Encoded size of a record in bytes.
    pub const SIZE: usize = 40;

    /// Encodes `self` into a fixed-size buffer.
    pub fn to_array(&self) -> Result<[u8; Self::SIZE], Error> {
        let mut buf = [0; Self::SIZE];
        self.to_bytes(&mut ByteWriter::new(&mut buf))?;
        Ok(buf)
    }

    /// Decodes a record that must span all of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let record = Self::from_bytes(&mut reader)?;
        if reader.is_empty() {
            Ok(record)
        } else {
            Err(Error::IncompleteParse)
        }
    }
}

impl ToBytes for Record {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u8(self.kind.into())?;
        writer.write_u8(self.flags.bits())?;
        writer.write_u16_le(self.n_states)?;
        writer.write_u16_le(self.n_reset)?;
        writer.write_u8(self.c)?;
        writer.write_u8(self.k)?;
        writer.write_u8(self.n_nbr)?;
        writer.write_i8(self.reward)?;
        writer.write_u16_le(self.used)?;
        writer.write_u16_le(self.n_cells)?;
        writer.write_u16_le(self.dio_transmit)?;
        writer.write_u16_le(self.dio_suppress)?;
        writer.write_u32_le(self.interval.as_millis())?;
        writer.write_u32_le(self.t.as_millis())?;
        let p = &self.probabilities;
        for value in [
            p.pbusy,
            p.pqu,
            p.psent,
            p.preset,
            p.pstable,
            p.ptransmit,
            p.epsilon,
        ] {
            writer.write_u16_le(value)?;
        }
        Ok(())
    }
}

impl<'a> FromBytes<'a> for Record {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        let kind = match RecordKind::from(bytes.read_u8()?) {
            RecordKind::Unknown(_) => return Err(Error::InvalidValue),
            kind => kind,
        };
        Ok(Self {
            kind,
            flags: RecordFlags::from_bits_truncate(bytes.read_u8()?),
            n_states: bytes.read_u16_le()?,
            n_reset: bytes.read_u16_le()?,
            c: bytes.read_u8()?,
            k: bytes.read_u8()?,
            n_nbr: bytes.read_u8()?,
            reward: bytes.read_i8()?,
            used: bytes.read_u16_le()?,
            n_cells: bytes.read_u16_le()?,
            dio_transmit: bytes.read_u16_le()?,
            dio_suppress: bytes.read_u16_le()?,
            interval: Duration::from_millis(bytes.read_u32_le()?),
            t: Duration::from_millis(bytes.read_u32_le()?),
            probabilities: FixedProbabilities {
                pbusy: bytes.read_u16_le()?,
                pqu: bytes.read_u16_le()?,
                psent: bytes.read_u16_le()?,
                preset: bytes.read_u16_le()?,
                pstable: bytes.read_u16_le()?,
                ptransmit: bytes.read_u16_le()?,
                epsilon: bytes.read_u16_le()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        let estimates = Estimates {
            pbusy: 0.25,
            pqu: 0.1,
            psent: 1.0,
            preset: 0.5,
            pstable: 0.5,
            ptransmit: 0.3333,
            ..Estimates::INITIAL
        };
        Record {
            kind: RecordKind::Reset,
            flags: RecordFlags::TRANSMITTED,
            n_states: 0x0102,
            n_reset: 3,
            c: 4,
            k: 5,
            n_nbr: 6,
            reward: -1,
            used: 7,
            n_cells: 8,
            dio_transmit: 9,
            dio_suppress: 10,
            interval: Duration::from_millis(4096),
            t: Duration::from_millis(3000),
            probabilities: FixedProbabilities::new(&estimates, 0.01),
        }
    }

    #[test]
    fn fixed_point() {
        assert_eq!(to_fixed(0.0), 0);
        assert_eq!(to_fixed(1.0), 10_000);
        assert_eq!(to_fixed(0.3), 3000);
        assert_eq!(to_fixed(-0.5), 0);
        assert_eq!(to_fixed(100.0), u16::MAX);
        assert_eq!(to_fixed(f32::NAN), 0);
        assert_eq!(from_fixed(2500), 0.25);
    }

    #[test]
    fn layout() {
        let bytes = record().to_array().unwrap();
        assert_eq!(
            bytes[..26],
            [
                1, 0x01, 0x02, 0x01, 3, 0, 4, 5, 6, 0xff, 7, 0, 8, 0, 9, 0, 10, 0, 0x00, 0x10, 0,
                0, 0xb8, 0x0b, 0, 0,
            ]
        );
        // pbusy = 2500, pqu = 1000, psent = 10000
        assert_eq!(bytes[26..32], [0xc4, 0x09, 0xe8, 0x03, 0x10, 0x27]);
        // ptransmit = 3333, epsilon = 100
        assert_eq!(bytes[36..], [0x05, 0x0d, 0x64, 0x00]);

        assert_eq!(Record::decode(&bytes).unwrap(), record());
    }

    #[test]
    fn decode_errors() {
        let bytes = record().to_array().unwrap();
        assert_eq!(Record::decode(&bytes[..39]), Err(Error::Eof));

        let mut long = [0; Record::SIZE + 1];
        long[..Record::SIZE].copy_from_slice(&bytes);
        assert_eq!(Record::decode(&long), Err(Error::IncompleteParse));

        let mut bad_kind = bytes;
        bad_kind[0] = 7;
        assert_eq!(Record::decode(&bad_kind), Err(Error::InvalidValue));
    }

    #[test]
    fn short_buffer() {
        let mut buf = [0; 10];
        assert_eq!(
            record().to_bytes(&mut ByteWriter::new(&mut buf)),
            Err(Error::Eof)
        );
    }
}
