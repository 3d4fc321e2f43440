use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Size of one encoded record in bytes.
pub const RECORD_BYTES: usize = 16;

/// A single stream event.
///
/// Records are plain values: every transform produces new field values rather
/// than sharing state, and arrays of records are the unit of storage and
/// transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Record {
    /// Logical stream this record belongs to.
    pub stream_id: i16,
    /// Origin host of the record.
    pub source_id: i16,
    /// Opaque key.
    pub key: i32,
    /// Signed delta applied to the key's count (may be negative).
    pub update_count: i32,
    /// Event time; non-decreasing within a well-formed sequence.
    pub timestamp: i32,
}

impl Record {
    #[must_use]
    pub const fn new(
        stream_id: i16,
        source_id: i16,
        key: i32,
        update_count: i32,
        timestamp: i32,
    ) -> Self {
        Self {
            stream_id,
            source_id,
            key,
            update_count,
            timestamp,
        }
    }

    /// Encodes this record into the first [`RECORD_BYTES`] bytes of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`RECORD_BYTES`].
    pub fn encode(&self, buf: &mut [u8]) {
        LittleEndian::write_i16(&mut buf[0..2], self.stream_id);
        LittleEndian::write_i16(&mut buf[2..4], self.source_id);
        LittleEndian::write_i32(&mut buf[4..8], self.key);
        LittleEndian::write_i32(&mut buf[8..12], self.update_count);
        LittleEndian::write_i32(&mut buf[12..16], self.timestamp);
    }

    /// Decodes a record from the first [`RECORD_BYTES`] bytes of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`RECORD_BYTES`].
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            stream_id: LittleEndian::read_i16(&buf[0..2]),
            source_id: LittleEndian::read_i16(&buf[2..4]),
            key: LittleEndian::read_i32(&buf[4..8]),
            update_count: LittleEndian::read_i32(&buf[8..12]),
            timestamp: LittleEndian::read_i32(&buf[12..16]),
        }
    }

    /// Appends the encoding of every record in `records` to `out`.
    pub fn encode_all(records: &[Record], out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + records.len() * RECORD_BYTES, 0);
        for (rec, chunk) in records
            .iter()
            .zip(out[start..].chunks_exact_mut(RECORD_BYTES))
        {
            rec.encode(chunk);
        }
    }

    /// Decodes a packed byte buffer into records.
    ///
    /// Returns `None` if the buffer length is not a multiple of
    /// [`RECORD_BYTES`] (the bytes do not describe a record array).
    #[must_use]
    pub fn decode_all(bytes: &[u8]) -> Option<Vec<Record>> {
        if bytes.len() % RECORD_BYTES != 0 {
            return None;
        }
        Some(bytes.chunks_exact(RECORD_BYTES).map(Record::decode).collect())
    }

    /// Writes this record to a byte stream.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_i16::<LittleEndian>(self.stream_id)?;
        w.write_i16::<LittleEndian>(self.source_id)?;
        w.write_i32::<LittleEndian>(self.key)?;
        w.write_i32::<LittleEndian>(self.update_count)?;
        w.write_i32::<LittleEndian>(self.timestamp)?;
        Ok(())
    }

    /// Reads one record from a byte stream.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            stream_id: r.read_i16::<LittleEndian>()?,
            source_id: r.read_i16::<LittleEndian>()?,
            key: r.read_i32::<LittleEndian>()?,
            update_count: r.read_i32::<LittleEndian>()?,
            timestamp: r.read_i32::<LittleEndian>()?,
        })
    }

    /// Returns a copy with the update count negated and the timestamp moved
    /// by `delta`: the record that cancels this one `delta` time units later.
    #[must_use]
    pub fn closing_twin(&self, delta: i32) -> Self {
        Self {
            update_count: self.update_count.wrapping_neg(),
            timestamp: self.timestamp.wrapping_add(delta),
            ..*self
        }
    }
}

/// Returns `true` if `records` is sorted non-decreasing by timestamp.
#[must_use]
pub fn is_sorted_by_ts(records: &[Record]) -> bool {
    records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}
