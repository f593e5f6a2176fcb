//! Little-endian cursor over ROS1 serialized message bytes.

use crate::error::{BagError, BagResult};

/// ROS1 `time` / `duration` as stored on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct RosTime {
    pub sec: u32,
    pub nsec: u32,
}

impl RosTime {
    pub fn as_nanos(&self) -> u64 {
        (self.sec as u64) * 1_000_000_000 + (self.nsec as u64)
    }
}

pub struct MsgReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> MsgReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize, field: &'static str) -> BagResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(BagError::Truncated {
                field,
                offset: self.pos,
                needed: n,
                len: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> BagResult<[u8; N]> {
        let bytes = self.take(N, field)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self, field: &'static str) -> BagResult<u8> {
        Ok(self.take(1, field)?[0])
    }

    pub fn read_u16(&mut self, field: &'static str) -> BagResult<u16> {
        Ok(u16::from_le_bytes(self.array(field)?))
    }

    pub fn read_u32(&mut self, field: &'static str) -> BagResult<u32> {
        Ok(u32::from_le_bytes(self.array(field)?))
    }

    pub fn read_u64(&mut self, field: &'static str) -> BagResult<u64> {
        Ok(u64::from_le_bytes(self.array(field)?))
    }

    pub fn read_i8(&mut self, field: &'static str) -> BagResult<i8> {
        Ok(self.read_u8(field)? as i8)
    }

    pub fn read_i16(&mut self, field: &'static str) -> BagResult<i16> {
        Ok(i16::from_le_bytes(self.array(field)?))
    }

    pub fn read_i32(&mut self, field: &'static str) -> BagResult<i32> {
        Ok(i32::from_le_bytes(self.array(field)?))
    }

    pub fn read_i64(&mut self, field: &'static str) -> BagResult<i64> {
        Ok(i64::from_le_bytes(self.array(field)?))
    }

    pub fn read_f32(&mut self, field: &'static str) -> BagResult<f32> {
        Ok(f32::from_le_bytes(self.array(field)?))
    }

    pub fn read_f64(&mut self, field: &'static str) -> BagResult<f64> {
        Ok(f64::from_le_bytes(self.array(field)?))
    }

    pub fn read_time(&mut self, field: &'static str) -> BagResult<RosTime> {
        let sec = self.read_u32(field)?;
        let nsec = self.read_u32(field)?;
        Ok(RosTime { sec, nsec })
    }

    /// uint32 length prefix followed by the bytes
    pub fn read_bytes(&mut self, field: &'static str) -> BagResult<&'a [u8]> {
        let len = self.read_u32(field)? as usize;
        self.take(len, field)
    }

    pub fn read_string(&mut self, field: &'static str) -> BagResult<String> {
        let bytes = self.read_bytes(field)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
