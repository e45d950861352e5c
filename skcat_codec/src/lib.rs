use tokio_util::bytes::{BufMut, Bytes, BytesMut};

const OPEN: u8 = b'{';
const CLOSE: u8 = b'}';
const LF: u8 = b'\n';

/// Writes received chunks verbatim, separating what look like consecutive top-level
/// objects with a line break.
///
/// The stream carries no delimiters between messages, so the boundary is guessed from the
/// first and last byte of each chunk only: braces are not counted, string contents are
/// not skipped and an object split over several chunks is not recognised.
#[derive(Debug, Default, Clone)]
pub struct StreamPrinter {
    /// The last chunk that armed the printer ended with `}` and no break has been emitted
    /// since.
    boundary: bool,
}

impl StreamPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the next chunk starting with `{` will be preceded by a line break.
    pub fn at_boundary(&self) -> bool {
        self.boundary
    }

    /// Updates the boundary flag for `chunk` and reports whether a break must be written
    /// before it.
    fn separate(&mut self, chunk: &[u8]) -> bool {
        let (Some(&first), Some(&last)) = (chunk.first(), chunk.last()) else {
            return false;
        };

        if !self.boundary && last == CLOSE {
            self.boundary = true;
            false
        } else if self.boundary && first == OPEN {
            self.boundary = false;
            true
        } else {
            false
        }
    }
}

impl tokio_util::codec::Encoder<Bytes> for StreamPrinter {
    type Error = std::io::Error;

    fn encode(&mut self, chunk: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let separate = self.separate(&chunk);
        log::trace!(
            "Printing {} bytes (separated: {separate}, boundary: {})",
            chunk.len(),
            self.boundary
        );

        dst.reserve(chunk.len() + usize::from(separate));
        if separate {
            dst.put_u8(LF);
        }
        dst.put_slice(&chunk);

        Ok(())
    }
}

#[cfg(test)]
mod boundary {
    use crate::StreamPrinter;
    use tokio_util::bytes::{Bytes, BytesMut};
    use tokio_util::codec::Encoder;

    fn print(chunks: &[&'static str]) -> (String, StreamPrinter) {
        let mut printer = StreamPrinter::new();
        let mut dst = BytesMut::new();
        for chunk in chunks {
            printer
                .encode(Bytes::from_static(chunk.as_bytes()), &mut dst)
                .expect("Encoding into memory cannot fail");
        }
        (String::from_utf8(dst.to_vec()).unwrap(), printer)
    }

    #[test]
    fn consecutive_objects() {
        let (out, printer) = print(&[r#"{"a":1}"#, r#"{"b":2}"#]);
        assert_eq!(out, "{\"a\":1}\n{\"b\":2}");
        assert!(!printer.at_boundary());
    }

    #[test]
    fn third_object_is_not_separated() {
        // The second chunk clears the flag without re-arming it, even though it ends in `}`.
        let (out, printer) = print(&["{1}", "{2}", "{3}"]);
        assert_eq!(out, "{1}\n{2}{3}");
        assert!(printer.at_boundary());
    }

    #[test]
    fn object_split_over_two_chunks() {
        let (out, _) = print(&[r#"{"a":"#, r#"1}"#, r#"{"b":"#, "2}"]);
        assert_eq!(out, "{\"a\":1}\n{\"b\":2}");
    }

    #[test]
    fn only_closing_brace_arms() {
        let (out, printer) = print(&["hello", "world"]);
        assert_eq!(out, "helloworld");
        assert!(!printer.at_boundary());

        let (_, printer) = print(&["trailing }"]);
        assert!(printer.at_boundary());
    }

    #[test]
    fn armed_flag_waits_for_opening_brace() {
        let (out, printer) = print(&["{x}", "plain", "more}", "{y}"]);
        assert_eq!(out, "{x}plainmore}\n{y}");
        assert!(!printer.at_boundary());
    }

    #[test]
    fn braces_in_strings_misfire() {
        let (out, _) = print(&[r#"{"s":"}"}"#, r#"{"t":"{"}"#]);
        assert_eq!(out, "{\"s\":\"}\"}\n{\"t\":\"{\"}");
    }

    #[test]
    fn empty_chunk_is_ignored() {
        let (out, printer) = print(&["{a}", "", "{b}"]);
        assert_eq!(out, "{a}\n{b}");
        assert!(!printer.at_boundary());

        let (out, printer) = print(&[""]);
        assert_eq!(out, "");
        assert!(!printer.at_boundary());
    }

    #[test]
    fn flag_follows_transitions() {
        let chunks = ["}", "x}", "{", "{", "}", "}", "{}"];
        let expected = [true, true, false, false, true, true, false];

        let mut printer = StreamPrinter::new();
        let mut dst = BytesMut::new();
        for (chunk, expected) in chunks.iter().zip(expected) {
            printer
                .encode(Bytes::from_static(chunk.as_bytes()), &mut dst)
                .unwrap();
            assert_eq!(printer.at_boundary(), expected, "after {chunk:?}");
        }
        assert_eq!(&dst[..], b"}x}\n{{}}\n{}");
    }
}
