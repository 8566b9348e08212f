//! Wire protocol shared by `screen-server` and `screen-client`.
//!
//! Framed stream over a single TCP connection:
//! - magic: 4 bytes "SCRN" (once, at connection start, in each direction)
//! - version: u16 LE (once, at connection start)
//! - then repeated frames:
//!   - kind: u8
//!   - len: u32 LE
//!   - payload: [u8; len]
//!
//! Two message kinds carry the playback protocol:
//! - `CONTROL` (client → server): one user action against one screen;
//! - `SYNC` (server → client): a full snapshot of one screen's state.
//!
//! `REMOVE` (server → client) tells clients a location no longer hosts a screen.
//!
//! All integers are little-endian. Strings are `u16 len` + UTF-8 bytes and are
//! capped at [`MAX_URL_BYTES`]. The protocol carries no sequence numbers: it
//! relies on the transport delivering frames in order.

use std::io::{self, Read, Write};

use screen_types::Location;

pub const MAGIC: [u8; 4] = *b"SCRN";
pub const VERSION: u16 = 1;

/// Longest URL accepted on the wire, in bytes.
pub const MAX_URL_BYTES: usize = 2048;

/// Upper bound for any frame payload; larger headers are rejected before allocating.
pub const MAX_FRAME_LEN: u32 = 16 * 1024;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Client → server: playback control command.
    Control = 0x10,
    /// Server → client: full state snapshot for one screen.
    Sync = 0x20,
    /// Server → client: a screen was unregistered.
    Remove = 0x21,

    Error = 0x7F,
}

impl FrameKind {
    pub fn from_u8(b: u8) -> io::Result<Self> {
        let k = match b {
            0x10 => FrameKind::Control,
            0x20 => FrameKind::Sync,
            0x21 => FrameKind::Remove,
            0x7F => FrameKind::Error,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown frame kind {b:#x}"),
                ));
            }
        };
        Ok(k)
    }
}

/// Action carried by a control message.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Play = 0,
    Pause = 1,
    Stop = 2,
    SetUrl = 3,
    SetVolume = 4,
    Seek = 5,
}

impl ActionKind {
    pub fn from_u8(b: u8) -> io::Result<Self> {
        let a = match b {
            0 => ActionKind::Play,
            1 => ActionKind::Pause,
            2 => ActionKind::Stop,
            3 => ActionKind::SetUrl,
            4 => ActionKind::SetVolume,
            5 => ActionKind::Seek,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown action {b}"),
                ));
            }
        };
        Ok(a)
    }
}

/// Client → server control command.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMessage {
    pub location: Location,
    pub action: ActionKind,
    /// Only meaningful for [`ActionKind::SetUrl`].
    pub url: String,
    /// Only meaningful for [`ActionKind::SetVolume`].
    pub volume: f32,
    /// Only meaningful for [`ActionKind::Seek`].
    pub seek_position: i64,
}

impl ControlMessage {
    fn with(location: Location, action: ActionKind) -> Self {
        Self {
            location,
            action,
            url: String::new(),
            volume: 1.0,
            seek_position: 0,
        }
    }

    pub fn play(location: Location) -> Self {
        Self::with(location, ActionKind::Play)
    }

    pub fn pause(location: Location) -> Self {
        Self::with(location, ActionKind::Pause)
    }

    pub fn stop(location: Location) -> Self {
        Self::with(location, ActionKind::Stop)
    }

    pub fn set_url(location: Location, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::with(location, ActionKind::SetUrl)
        }
    }

    pub fn set_volume(location: Location, volume: f32) -> Self {
        Self {
            volume,
            ..Self::with(location, ActionKind::SetVolume)
        }
    }

    pub fn seek(location: Location, position: i64) -> Self {
        Self {
            seek_position: position,
            ..Self::with(location, ActionKind::Seek)
        }
    }
}

/// Server → client snapshot of one screen.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncMessage {
    pub location: Location,
    pub url: String,
    pub playing: bool,
    pub position: i64,
    pub volume: f32,
}

/// Connection prelude: magic + version.
pub fn write_prelude(mut w: impl Write) -> io::Result<()> {
    w.write_all(&MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;
    Ok(())
}

/// Read and validate the connection prelude.
pub fn read_prelude(mut r: impl Read) -> io::Result<()> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
    }

    let mut ver = [0u8; 2];
    r.read_exact(&mut ver)?;
    let version = u16::from_le_bytes(ver);
    if version != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported version {version}"),
        ));
    }

    Ok(())
}

/// Write a frame header + payload.
pub fn write_frame(mut w: impl Write, kind: FrameKind, payload: &[u8]) -> io::Result<()> {
    let frame = encode_frame(kind, payload)?;
    w.write_all(&frame)?;
    Ok(())
}

/// Encode a frame into a single buffer (header + payload).
pub fn encode_frame(kind: FrameKind, payload: &[u8]) -> io::Result<Vec<u8>> {
    let len: u32 = payload
        .len()
        .try_into()
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "payload too large"))?;

    let mut out = Vec::with_capacity(1 + 4 + payload.len());
    out.push(kind as u8);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Read a frame header and return `(kind, len)`.
///
/// The caller should then read exactly `len` bytes of payload.
pub fn read_frame_header(mut r: impl Read) -> io::Result<(FrameKind, u32)> {
    let mut kindb = [0u8; 1];
    r.read_exact(&mut kindb)?;
    let kind = FrameKind::from_u8(kindb[0])?;

    let mut lenb = [0u8; 4];
    r.read_exact(&mut lenb)?;
    let len = u32::from_le_bytes(lenb);
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large ({len} bytes)"),
        ));
    }
    Ok((kind, len))
}

/// Read one complete frame (header + payload).
pub fn read_frame(mut r: impl Read) -> io::Result<(FrameKind, Vec<u8>)> {
    let (kind, len) = read_frame_header(&mut r)?;
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    Ok((kind, payload))
}

/// Encode a `CONTROL` payload:
/// - x, y, z:  i32 LE each
/// - action:   u8
/// - url:      u16 LE len + UTF-8 (max 2048 bytes)
/// - volume:   f32 LE
/// - seek:     i64 LE
pub fn encode_control(msg: &ControlMessage) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(12 + 1 + 2 + msg.url.len() + 4 + 8);
    put_location(&mut out, msg.location);
    out.push(msg.action as u8);
    put_string(&mut out, &msg.url)?;
    out.extend_from_slice(&msg.volume.to_le_bytes());
    out.extend_from_slice(&msg.seek_position.to_le_bytes());
    Ok(out)
}

/// Decode a `CONTROL` payload.
pub fn decode_control(payload: &[u8]) -> io::Result<ControlMessage> {
    let mut cur = PayloadReader::new(payload, "CONTROL");
    let location = cur.location()?;
    let action = ActionKind::from_u8(cur.u8()?)?;
    let url = cur.string()?;
    let volume = f32::from_le_bytes(cur.array()?);
    let seek_position = i64::from_le_bytes(cur.array()?);
    cur.finish()?;
    Ok(ControlMessage {
        location,
        action,
        url,
        volume,
        seek_position,
    })
}

/// Encode a `SYNC` payload:
/// - x, y, z:  i32 LE each
/// - url:      u16 LE len + UTF-8 (max 2048 bytes)
/// - playing:  u8 (0/1)
/// - position: i64 LE
/// - volume:   f32 LE
pub fn encode_sync(msg: &SyncMessage) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(12 + 2 + msg.url.len() + 1 + 8 + 4);
    put_location(&mut out, msg.location);
    put_string(&mut out, &msg.url)?;
    out.push(if msg.playing { 1 } else { 0 });
    out.extend_from_slice(&msg.position.to_le_bytes());
    out.extend_from_slice(&msg.volume.to_le_bytes());
    Ok(out)
}

/// Decode a `SYNC` payload.
pub fn decode_sync(payload: &[u8]) -> io::Result<SyncMessage> {
    let mut cur = PayloadReader::new(payload, "SYNC");
    let location = cur.location()?;
    let url = cur.string()?;
    let playing = cur.u8()? != 0;
    let position = i64::from_le_bytes(cur.array()?);
    let volume = f32::from_le_bytes(cur.array()?);
    cur.finish()?;
    Ok(SyncMessage {
        location,
        url,
        playing,
        position,
        volume,
    })
}

/// Encode a `REMOVE` payload: x, y, z as i32 LE.
pub fn encode_remove(location: Location) -> Vec<u8> {
    let mut out = Vec::with_capacity(12);
    put_location(&mut out, location);
    out
}

/// Decode a `REMOVE` payload.
pub fn decode_remove(payload: &[u8]) -> io::Result<Location> {
    let mut cur = PayloadReader::new(payload, "REMOVE");
    let location = cur.location()?;
    cur.finish()?;
    Ok(location)
}

/// Encode an `ERROR` payload: u16 len + UTF-8 message (truncated to fit).
pub fn encode_error(message: &str) -> Vec<u8> {
    let mut end = message.len().min(MAX_URL_BYTES);
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    let bytes = &message.as_bytes()[..end];
    let mut out = Vec::with_capacity(2 + bytes.len());
    out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(bytes);
    out
}

/// Decode an `ERROR` payload.
pub fn decode_error(payload: &[u8]) -> io::Result<String> {
    let mut cur = PayloadReader::new(payload, "ERROR");
    let message = cur.string()?;
    cur.finish()?;
    Ok(message)
}

/// Encode a complete `CONTROL` frame.
pub fn control_frame(msg: &ControlMessage) -> io::Result<Vec<u8>> {
    encode_frame(FrameKind::Control, &encode_control(msg)?)
}

/// Encode a complete `SYNC` frame.
pub fn sync_frame(msg: &SyncMessage) -> io::Result<Vec<u8>> {
    encode_frame(FrameKind::Sync, &encode_sync(msg)?)
}

/// Encode a complete `REMOVE` frame.
pub fn remove_frame(location: Location) -> io::Result<Vec<u8>> {
    encode_frame(FrameKind::Remove, &encode_remove(location))
}

fn put_location(out: &mut Vec<u8>, loc: Location) {
    out.extend_from_slice(&loc.x.to_le_bytes());
    out.extend_from_slice(&loc.y.to_le_bytes());
    out.extend_from_slice(&loc.z.to_le_bytes());
}

fn put_string(out: &mut Vec<u8>, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > MAX_URL_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "url too long"));
    }
    out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

/// Bounds-checked cursor over a payload.
struct PayloadReader<'a> {
    buf: &'a [u8],
    off: usize,
    what: &'static str,
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, off: 0, what }
    }

    fn truncated(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("truncated {} payload", self.what),
        )
    }

    fn take(&mut self, n: usize) -> io::Result<&'a [u8]> {
        if self.off + n > self.buf.len() {
            return Err(self.truncated());
        }
        let out = &self.buf[self.off..self.off + n];
        self.off += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> io::Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn location(&mut self) -> io::Result<Location> {
        let x = i32::from_le_bytes(self.array()?);
        let y = i32::from_le_bytes(self.array()?);
        let z = i32::from_le_bytes(self.array()?);
        Ok(Location::new(x, y, z))
    }

    fn string(&mut self) -> io::Result<String> {
        let len = u16::from_le_bytes(self.array()?) as usize;
        if len > MAX_URL_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} url exceeds {MAX_URL_BYTES} bytes", self.what),
            ));
        }
        let bytes = self.take(len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} url not utf-8", self.what),
            )
        })?;
        Ok(s.to_string())
    }

    fn finish(&self) -> io::Result<()> {
        if self.off != self.buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} length mismatch", self.what),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn loc() -> Location {
        Location::new(-12, 64, 300)
    }

    #[test]
    fn prelude_roundtrip_ok() {
        let mut buf = Vec::new();
        write_prelude(&mut buf).unwrap();
        let mut cur = Cursor::new(buf);
        read_prelude(&mut cur).unwrap();
    }

    #[test]
    fn prelude_rejects_bad_magic() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"ABRD");
        buf.extend_from_slice(&VERSION.to_le_bytes());
        let err = read_prelude(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn prelude_rejects_bad_version() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&(VERSION + 1).to_le_bytes());
        let err = read_prelude(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn control_frame_roundtrip_through_stream() {
        let msg = ControlMessage::set_url(loc(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        let mut buf = Vec::new();
        write_frame(&mut buf, FrameKind::Control, &encode_control(&msg).unwrap()).unwrap();

        let (kind, payload) = read_frame(&mut Cursor::new(buf)).unwrap();
        assert_eq!(kind, FrameKind::Control);
        assert_eq!(decode_control(&payload).unwrap(), msg);
    }

    #[test]
    fn control_payload_layout_is_fixed() {
        let msg = ControlMessage::seek(Location::new(1, 2, 3), 0x0102);
        let payload = encode_control(&msg).unwrap();
        assert_eq!(payload.len(), 12 + 1 + 2 + 4 + 8);
        assert_eq!(&payload[0..4], &1i32.to_le_bytes());
        assert_eq!(payload[12], ActionKind::Seek as u8);
        assert_eq!(&payload[13..15], &[0, 0]);
        assert_eq!(&payload[15..19], &1.0f32.to_le_bytes());
        assert_eq!(&payload[19..27], &0x0102i64.to_le_bytes());
    }

    #[test]
    fn sync_roundtrip() {
        let msg = SyncMessage {
            location: loc(),
            url: "https://www.youtube.com/watch?v=abc12345678".to_string(),
            playing: true,
            position: 42_000,
            volume: 0.25,
        };
        let frame = sync_frame(&msg).unwrap();
        let (kind, payload) = read_frame(&mut Cursor::new(frame)).unwrap();
        assert_eq!(kind, FrameKind::Sync);
        assert_eq!(decode_sync(&payload).unwrap(), msg);
    }

    #[test]
    fn encode_rejects_oversize_url() {
        let msg = ControlMessage::set_url(loc(), "a".repeat(MAX_URL_BYTES + 1));
        let err = encode_control(&msg).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let ok = ControlMessage::set_url(loc(), "a".repeat(MAX_URL_BYTES));
        assert!(encode_control(&ok).is_ok());
    }

    #[test]
    fn decode_rejects_oversize_url_length() {
        let mut payload = Vec::new();
        put_location(&mut payload, loc());
        payload.push(ActionKind::SetUrl as u8);
        payload.extend_from_slice(&((MAX_URL_BYTES + 1) as u16).to_le_bytes());
        payload.extend(std::iter::repeat_n(b'a', MAX_URL_BYTES + 1));
        payload.extend_from_slice(&1.0f32.to_le_bytes());
        payload.extend_from_slice(&0i64.to_le_bytes());
        let err = decode_control(&payload).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn decode_rejects_unknown_action() {
        let mut payload = encode_control(&ControlMessage::play(loc())).unwrap();
        payload[12] = 9;
        let err = decode_control(&payload).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn decode_rejects_truncated_and_trailing_bytes() {
        let payload = encode_sync(&SyncMessage {
            location: loc(),
            url: String::new(),
            playing: false,
            position: 0,
            volume: 1.0,
        })
        .unwrap();
        assert!(decode_sync(&payload[..payload.len() - 1]).is_err());
        let mut longer = payload.clone();
        longer.push(0);
        assert!(decode_sync(&longer).is_err());
    }

    #[test]
    fn header_rejects_oversize_frame() {
        let mut buf = vec![FrameKind::Sync as u8];
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_le_bytes());
        let err = read_frame_header(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn error_payload_roundtrip() {
        let payload = encode_error("unknown screen 1,2,3");
        assert_eq!(decode_error(&payload).unwrap(), "unknown screen 1,2,3");
    }

    #[test]
    fn remove_frame_carries_only_location() {
        let frame = remove_frame(loc()).unwrap();
        let (kind, payload) = read_frame(&mut Cursor::new(frame)).unwrap();
        assert_eq!(kind, FrameKind::Remove);
        assert_eq!(payload.len(), 12);
        assert_eq!(decode_remove(&payload).unwrap(), loc());
        assert!(decode_remove(&payload[..11]).is_err());
    }
}
