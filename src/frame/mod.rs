//! Websocket data frame.
//!
//! [RFC-6455 Section5](https://datatracker.ietf.org/doc/html/rfc6455#section-5)
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```
//!
//! This codec serves the accepting side only: inbound client frames carry a
//! mask key, outbound server frames never do.

pub mod flag;
pub mod length;
pub mod mask;

pub use flag::{Fin, OpCode};
pub use length::PayloadLen;
pub use mask::Mask;

use crate::bleed::Writer;
use crate::error::FrameError;

/// Longest possible unmasked head: 2 flag bytes + 8 length bytes.
pub const MAX_SERVER_HEAD_LEN: usize = 2 + 8;

/// Websocket frame head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHead {
    pub fin: Fin,
    pub opcode: OpCode,
    pub mask: Mask,
    pub length: PayloadLen,
}

impl FrameHead {
    /// Constructor.
    #[inline]
    pub const fn new(fin: Fin, opcode: OpCode, mask: Mask, length: PayloadLen) -> Self {
        Self {
            fin,
            opcode,
            mask,
            length,
        }
    }

    /// Encode to provided buffer, returns the count of written bytes.
    /// The caller should ensure the buffer is large enough,
    /// otherwise a [`FrameError::NotEnoughCapacity`] error will be returned.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, FrameError> {
        let mut writer = Writer::new(buf);

        macro_rules! writex {
            ($dst: expr) => {
                if writer.remaining() < $dst.len() {
                    return Err(FrameError::NotEnoughCapacity);
                } else {
                    unsafe {
                        writer.write_unchecked($dst);
                    }
                }
            };
        }

        // fin, opcode
        let b1 = self.fin as u8 | self.opcode as u8;

        // mask, payload length
        let b2 = self.mask.to_flag() | self.length.to_flag();

        writex!(&[b1, b2]);

        // extended payload length
        match &self.length {
            PayloadLen::Standard(_) => {}
            PayloadLen::Extended1(v) => writex!(&v.to_be_bytes()),
            PayloadLen::Extended2(v) => writex!(&v.to_be_bytes()),
        };

        // mask key
        if let Mask::Key(k) = &self.mask {
            writex!(k);
        }

        Ok(writer.pos())
    }

    /// Unchecked version of [`encode`](Self::encode).
    ///
    /// # Safety
    ///
    /// Caller must ensure buffer is large enough. It is **Undefined Behavior**
    /// if the buffer is not large enough.
    pub unsafe fn encode_unchecked(&self, buf: &mut [u8]) -> usize {
        let mut writer = Writer::new(buf);

        // fin, opcode
        let b1 = self.fin as u8 | self.opcode as u8;

        // mask, payload length
        let b2 = self.mask.to_flag() | self.length.to_flag();

        writer.write_unchecked(&[b1, b2]);

        // extended payload length
        match &self.length {
            PayloadLen::Standard(_) => {}
            PayloadLen::Extended1(v) => {
                writer.write_unchecked(&v.to_be_bytes());
            }
            PayloadLen::Extended2(v) => {
                writer.write_unchecked(&v.to_be_bytes());
            }
        };

        // mask key
        if let Mask::Key(k) = &self.mask {
            writer.write_unchecked(k);
        }

        writer.pos()
    }

    /// Parse from provided buffer, returns [`FrameHead`] and the count of
    /// read bytes if the parse succeeds.
    /// If there is not enough data to parse, a [`FrameError::NotEnoughData`]
    /// error will be returned.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), FrameError> {
        if buf.len() < 2 {
            return Err(FrameError::NotEnoughData);
        }

        // fin, opcode
        let b1 = buf[0];

        // mask, payload length
        let b2 = buf[1];

        let fin = Fin::from_flag(b1)?;
        let opcode = OpCode::from_flag(b1)?;

        let mut n: usize = 2;
        let mut length = PayloadLen::from_flag(b2);

        match length {
            PayloadLen::Standard(_) => {}
            PayloadLen::Extended1(_) => {
                if buf.len() < n + 2 {
                    return Err(FrameError::NotEnoughData);
                }

                length = PayloadLen::from_byte2([buf[2], buf[3]]);

                n += 2;
            }
            PayloadLen::Extended2(_) => {
                if buf.len() < n + 8 {
                    return Err(FrameError::NotEnoughData);
                }

                let mut b8 = [0_u8; 8];
                b8.copy_from_slice(&buf[2..10]);
                length = PayloadLen::from_byte8(b8);

                n += 8;
            }
        };

        let mask = if b2 & 0x80 != 0 {
            if buf.len() < n + 4 {
                return Err(FrameError::NotEnoughData);
            }

            let mut key = [0_u8; 4];
            key.copy_from_slice(&buf[n..n + 4]);

            n += 4;

            Mask::Key(key)
        } else {
            Mask::None
        };

        Ok((
            FrameHead {
                fin,
                opcode,
                mask,
                length,
            },
            n,
        ))
    }
}
