//! Fixed-size packet cursor used by every DNS read and write.
//!
//! A `PacketCursor` wraps a 512-byte buffer (the classic UDP DNS limit) and a
//! position. Reads are bounded by the bytes actually present, writes by the
//! buffer capacity; neither ever fills in zeros on an overrun.

use nom::number::complete::{be_u16, be_u32, be_u8};
use tracing::debug;

use crate::errors::PacketError;

/// Maximum DNS message size carried over UDP without EDNS0
pub const MAX_PACKET_SIZE: usize = 512;

/// Maximum length of a single label in a domain name
pub const MAX_LABEL_LEN: usize = 63;

/// Pointer jumps allowed while reading one name
pub const MAX_JUMPS: usize = 5;

type NomError<'a> = nom::error::Error<&'a [u8]>;

#[derive(Debug, Clone)]
pub struct PacketCursor {
    buf: [u8; MAX_PACKET_SIZE],
    pos: usize,
    // High-water mark of valid bytes, received or written
    len: usize,
}

impl PacketCursor {
    /// Create an empty cursor ready for writing
    pub fn new() -> Self {
        Self {
            buf: [0; MAX_PACKET_SIZE],
            pos: 0,
            len: 0,
        }
    }

    /// Create a cursor over a received datagram, positioned at its start
    pub fn from_bytes(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() > MAX_PACKET_SIZE {
            return Err(PacketError::BufferOverrun {
                position: MAX_PACKET_SIZE,
                requested: data.len() - MAX_PACKET_SIZE,
            });
        }

        let mut cursor = Self::new();
        cursor.buf[..data.len()].copy_from_slice(data);
        cursor.len = data.len();
        Ok(cursor)
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The valid bytes of the buffer; for a written packet, what goes on the wire
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn overrun(&self, position: usize, requested: usize) -> PacketError {
        PacketError::BufferOverrun {
            position,
            requested,
        }
    }

    fn remaining(&self) -> &[u8] {
        &self.buf[self.pos.min(self.len)..self.len]
    }

    /// Move the cursor forward without reading
    pub fn advance(&mut self, steps: usize) -> Result<(), PacketError> {
        if self.pos + steps > self.len {
            return Err(self.overrun(self.pos, steps));
        }
        self.pos += steps;
        Ok(())
    }

    /// Move the cursor to an absolute offset within the valid bytes
    pub fn seek(&mut self, pos: usize) -> Result<(), PacketError> {
        if pos > self.len {
            return Err(self.overrun(pos, 0));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        let (_, value) =
            be_u8::<_, NomError>(self.remaining()).map_err(|_| self.overrun(self.pos, 1))?;
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, PacketError> {
        let (_, value) =
            be_u16::<_, NomError>(self.remaining()).map_err(|_| self.overrun(self.pos, 2))?;
        self.pos += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32, PacketError> {
        let (_, value) =
            be_u32::<_, NomError>(self.remaining()).map_err(|_| self.overrun(self.pos, 4))?;
        self.pos += 4;
        Ok(value)
    }

    /// Read the byte at `pos` without moving the cursor
    pub fn peek_at(&self, pos: usize) -> Result<u8, PacketError> {
        if pos >= self.len {
            return Err(self.overrun(pos, 1));
        }
        Ok(self.buf[pos])
    }

    /// Borrow `len` bytes starting at `start` without moving the cursor
    pub fn read_range(&self, start: usize, len: usize) -> Result<&[u8], PacketError> {
        if start + len > self.len {
            return Err(self.overrun(start, len));
        }
        Ok(&self.buf[start..start + len])
    }

    /// Read a possibly compressed domain name.
    ///
    /// Only the first compression pointer moves the cursor (past the two
    /// pointer bytes); everything after a jump is read through `peek_at`.
    pub fn read_name(&mut self) -> Result<String, PacketError> {
        let mut pos = self.pos;
        let mut jumped = false;
        let mut jumps = 0;
        let mut name = String::new();

        loop {
            let len = self.peek_at(pos)?;

            if len & 0xC0 == 0xC0 {
                if jumps == MAX_JUMPS {
                    return Err(PacketError::CompressionLoop {
                        max_jumps: MAX_JUMPS,
                    });
                }

                let low = self.peek_at(pos + 1)?;
                if !jumped {
                    self.seek(pos + 2)?;
                }

                pos = (((len & 0x3F) as usize) << 8) | low as usize;
                jumped = true;
                jumps += 1;
                continue;
            }

            // 0b01 and 0b10 prefixes are reserved
            if len & 0xC0 != 0 {
                return Err(PacketError::InvalidLabelLength(len));
            }

            pos += 1;
            if len == 0 {
                break;
            }

            let label = self.read_range(pos, len as usize)?;
            if !name.is_empty() {
                name.push('.');
            }
            name.push_str(&String::from_utf8_lossy(label));
            pos += len as usize;
        }

        if !jumped {
            self.seek(pos)?;
        }

        if jumps > 0 {
            debug!(name = %name, jumps, "Read compressed domain name");
        }

        Ok(name)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), PacketError> {
        if self.pos >= MAX_PACKET_SIZE {
            return Err(self.overrun(self.pos, 1));
        }
        self.buf[self.pos] = value;
        self.pos += 1;
        self.len = self.len.max(self.pos);
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        if self.pos + bytes.len() > MAX_PACKET_SIZE {
            return Err(self.overrun(self.pos, bytes.len()));
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        self.len = self.len.max(self.pos);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), PacketError> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), PacketError> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Overwrite two bytes that were already written, e.g. a length placeholder
    pub fn set_u16(&mut self, pos: usize, value: u16) -> Result<(), PacketError> {
        if pos + 2 > self.len {
            return Err(self.overrun(pos, 2));
        }
        self.buf[pos..pos + 2].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Write a domain name as uncompressed labels.
    /// Empty labels (e.g. from a trailing dot) are skipped.
    pub fn write_name(&mut self, name: &str) -> Result<(), PacketError> {
        for label in name.split('.').filter(|label| !label.is_empty()) {
            if label.len() > MAX_LABEL_LEN {
                return Err(PacketError::LabelTooLong {
                    label: label.to_string(),
                });
            }

            self.write_u8(label.len() as u8)?;
            self.write_bytes(label.as_bytes())?;
        }

        self.write_u8(0)
    }
}

impl Default for PacketCursor {
    fn default() -> Self {
        Self::new()
    }
}
