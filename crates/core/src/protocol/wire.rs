//! Length-prefixed framing: `u32` big-endian byte count, then that many bytes.

use std::io::{self, Read, Write};

use super::ProtocolError;

const PREFIX_LEN: usize = 4;

/// Read bytes until `buf` is full or the stream ends. Returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read one framed message body.
///
/// `Ok(None)` means end of stream: fewer than four prefix bytes arrived.
/// A body shorter than its declared length is [`ProtocolError::Truncated`].
pub fn read_message<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut prefix = [0u8; PREFIX_LEN];
    if read_full(reader, &mut prefix)? < PREFIX_LEN {
        return Ok(None);
    }
    let expected = u32::from_be_bytes(prefix) as usize;

    let mut body = Vec::new();
    reader.take(expected as u64).read_to_end(&mut body)?;
    if body.len() < expected {
        return Err(ProtocolError::Truncated {
            expected,
            actual: body.len(),
        });
    }
    Ok(Some(body))
}

/// Write one framed message and flush it.
pub fn write_message<W: Write>(writer: &mut W, body: &[u8]) -> Result<(), ProtocolError> {
    let len = u32::try_from(body.len()).map_err(|_| ProtocolError::Oversized(body.len()))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(body)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    #[test]
    fn test_write_then_read() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"hello").unwrap();
        write_message(&mut buf, b"").unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 5]);

        let mut reader = Cursor::new(buf);
        assert_eq!(read_message(&mut reader).unwrap(), Some(b"hello".to_vec()));
        assert_eq!(read_message(&mut reader).unwrap(), Some(Vec::new()));
        assert_eq!(read_message(&mut reader).unwrap(), None);
    }

    #[rstest]
    #[case::empty(&[])]
    #[case::partial_prefix(&[0, 0, 1])]
    fn test_short_prefix_is_end_of_stream(#[case] bytes: &[u8]) {
        let mut reader = Cursor::new(bytes.to_vec());
        assert!(read_message(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_short_body_is_truncated() {
        let mut reader = Cursor::new(vec![0, 0, 0, 10, 1, 2, 3]);
        let err = read_message(&mut reader).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated {
                expected: 10,
                actual: 3
            }
        ));
    }

    /// Delivers one byte per read call.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = buf.len().min(1);
            self.0.read(&mut buf[..end])
        }
    }

    #[test]
    fn test_reassembles_split_reads() {
        let mut reader = Trickle(Cursor::new(vec![0, 0, 0, 3, 7, 8, 9]));
        assert_eq!(read_message(&mut reader).unwrap(), Some(vec![7, 8, 9]));
    }
}
