//! Character sources feeding the streaming scanner.

use std::io::{self, Read};
use std::str::Chars;

/// Size of the byte chunk pulled from a reader per refill.
const BYTE_CHUNK: usize = 4096;

/// A pull-based source of characters.
///
/// `read` fills as much of `buf` as it can and returns the number of
/// characters written; zero means the source is exhausted.
pub trait CharSource {
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize>;
}

/// Source over an in-memory string.
pub struct StrSource<'a> {
    chars: Chars<'a>,
}

impl<'a> StrSource<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { chars: text.chars() }
    }
}

impl CharSource for StrSource<'_> {
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let mut count = 0;
        for slot in buf.iter_mut() {
            match self.chars.next() {
                Some(c) => {
                    *slot = c;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

/// Incremental UTF-8 decoder over any [`Read`].
///
/// Multi-byte sequences split across reads are carried over to the next
/// refill; malformed input is reported as [`io::ErrorKind::InvalidData`].
pub struct Utf8Source<R> {
    reader: R,
    pending: Vec<u8>,
    eof: bool,
}

impl<R: Read> Utf8Source<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            eof: false,
        }
    }

    /// Decode as many complete characters from `pending` as fit in `buf`.
    fn decode_into(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(err) => {
                if err.valid_up_to() == 0 && err.error_len().is_some() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "template source is not valid UTF-8",
                    ));
                }
                err.valid_up_to()
            }
        };

        let text = std::str::from_utf8(&self.pending[..valid])
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        let mut count = 0;
        let mut used = 0;
        for c in text.chars() {
            if count == buf.len() {
                break;
            }
            buf[count] = c;
            count += 1;
            used += c.len_utf8();
        }
        self.pending.drain(..used);
        Ok(count)
    }
}

impl<R: Read> CharSource for Utf8Source<R> {
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut chunk = [0u8; BYTE_CHUNK];
        loop {
            let decoded = self.decode_into(buf)?;
            if decoded > 0 {
                return Ok(decoded);
            }
            if self.eof {
                if self.pending.is_empty() {
                    return Ok(0);
                }
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "template source ends inside a UTF-8 sequence",
                ));
            }
            match self.reader.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut dyn CharSource, size: usize) -> String {
        let mut buf = vec!['\0'; size];
        let mut out = String::new();
        loop {
            let n = source.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend(&buf[..n]);
        }
        out
    }

    #[test]
    fn test_str_source_small_buffer() {
        let mut source = StrSource::new("héllo wörld");
        assert_eq!(drain(&mut source, 3), "héllo wörld");
    }

    /// Reader yielding one byte per call, to split multi-byte sequences.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.split_first() {
                Some((b, rest)) if !buf.is_empty() => {
                    buf[0] = *b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn test_utf8_source_split_sequences() {
        let text = "ünïcødé → {{ok}}";
        let mut source = Utf8Source::new(Trickle(text.as_bytes()));
        assert_eq!(drain(&mut source, 2), text);
    }

    #[test]
    fn test_utf8_source_rejects_invalid_bytes() {
        let mut source = Utf8Source::new(&[b'a', 0xff, b'b'][..]);
        let mut buf = ['\0'; 8];
        assert_eq!(source.read(&mut buf).unwrap(), 1);
        let err = source.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_utf8_source_truncated_sequence() {
        let mut source = Utf8Source::new(&[b'a', 0xc3][..]);
        let mut buf = ['\0'; 8];
        assert_eq!(source.read(&mut buf).unwrap(), 1);
        assert!(source.read(&mut buf).is_err());
    }
}
