//! Little-endian readers over in-memory byte buffers.
//!
//! Every fixed-layout decoder in `formats` works off a `Cursor<&[u8]>`; these
//! helpers fail with `UnexpectedEof` instead of reading past the end of the
//! buffer.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

pub fn read_u8(cursor: &mut Cursor<&[u8]>) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    cursor.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u16_le(cursor: &mut Cursor<&[u8]>) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    cursor.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32_le(cursor: &mut Cursor<&[u8]>) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_bytes(cursor: &mut Cursor<&[u8]>, length: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; length];
    cursor.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn seek_to(cursor: &mut Cursor<&[u8]>, position: u64) -> io::Result<()> {
    if position > cursor.get_ref().len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "Cannot seek to {} in a {}-byte buffer",
                position,
                cursor.get_ref().len()
            ),
        ));
    }
    cursor.seek(SeekFrom::Start(position))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_values() {
        let data: &[u8] = &[0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut cursor = Cursor::new(data);
        assert_eq!(read_u8(&mut cursor).unwrap(), 0x01);
        assert_eq!(read_u16_le(&mut cursor).unwrap(), 0x1234);
        assert_eq!(read_u32_le(&mut cursor).unwrap(), 0x1234_5678);
    }

    #[test]
    fn truncated_buffer_is_unexpected_eof() {
        let data: &[u8] = &[0xAA, 0xBB];
        let mut cursor = Cursor::new(data);
        assert_eq!(read_u8(&mut cursor).unwrap(), 0xAA);
        let err = read_u32_le(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let data: &[u8] = &[0; 4];
        let mut cursor = Cursor::new(data);
        assert!(seek_to(&mut cursor, 4).is_ok());
        assert!(seek_to(&mut cursor, 5).is_err());
    }

    #[test]
    fn read_bytes_checks_remaining_length() {
        let data: &[u8] = &[1, 2, 3];
        let mut cursor = Cursor::new(data);
        assert_eq!(read_bytes(&mut cursor, 3).unwrap(), vec![1, 2, 3]);
        let mut cursor = Cursor::new(data);
        assert!(read_bytes(&mut cursor, 4).is_err());
    }
}
