use crate::domain::{AltKey, BS, DEL, ESC, KeyStroke};
use std::io::{self, BufRead, BufReader, Read};
use tracing::debug;

const MAX_CSI_LEN: usize = 16;

/// Where decoded bytes come from. Implemented by the raw stdin reader, the
/// line-buffered fallback and the in-memory fixtures used by tests.
pub trait ByteSource {
    /// Next byte, or `None` at end of input.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Whether another byte can be read without waiting on the user.
    fn has_pending(&mut self) -> bool;

    /// Puts one byte back so the next read returns it. Holds a single byte.
    fn unread(&mut self, byte: u8);
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DecodeMode {
    /// Terminal in raw mode: every byte arrives as typed.
    #[default]
    Raw,
    /// Piped or cooked input: only line-level control characters mean anything.
    Buffered,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Decoded {
    Key(KeyStroke),
    /// Bytes were consumed but formed nothing usable.
    Nothing,
    Eof,
}

/// Turns bytes into [`KeyStroke`]s, one logical key per call.
///
/// No partial state survives between calls: a sequence cut short is dropped
/// and decoding resumes at whatever byte comes next. A UTF-8 sequence broken
/// by a non-continuation byte hands that byte back to the source.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyDecoder {
    mode: DecodeMode,
}

impl KeyDecoder {
    pub fn new(mode: DecodeMode) -> Self {
        Self { mode }
    }

    pub fn next_key<S: ByteSource + ?Sized>(&self, source: &mut S) -> io::Result<Decoded> {
        let Some(byte) = source.read_byte()? else {
            return Ok(Decoded::Eof);
        };
        let decoded = match self.mode {
            DecodeMode::Raw => self.decode_raw(byte, source),
            DecodeMode::Buffered => self.decode_buffered(byte, source),
        };
        Ok(decoded)
    }

    fn decode_raw<S: ByteSource + ?Sized>(&self, byte: u8, source: &mut S) -> Decoded {
        match byte {
            ESC => decode_escape(source),
            1..=26 => Decoded::Key(KeyStroke::Ctrl((b'a' + byte - 1) as char)),
            0 | 28..=31 | DEL => Decoded::Key(KeyStroke::Raw(vec![byte])),
            0x20..=0x7e => Decoded::Key(KeyStroke::Char(byte as char)),
            _ => decode_utf8(byte, source)
                .map(|ch| Decoded::Key(KeyStroke::Char(ch)))
                .unwrap_or(Decoded::Nothing),
        }
    }

    fn decode_buffered<S: ByteSource + ?Sized>(&self, byte: u8, source: &mut S) -> Decoded {
        match byte {
            b'\n' | b'\r' => Decoded::Key(KeyStroke::enter()),
            b'\t' => Decoded::Key(KeyStroke::tab()),
            BS | DEL => Decoded::Key(KeyStroke::backspace()),
            ESC => decode_escape(source),
            0..=0x1f => Decoded::Nothing,
            0x20..=0x7e => Decoded::Key(KeyStroke::Char(byte as char)),
            _ => decode_utf8(byte, source)
                .map(|ch| Decoded::Key(KeyStroke::Char(ch)))
                .unwrap_or(Decoded::Nothing),
        }
    }
}

/// Reads the next byte of a sequence already in progress. Errors and EOF end
/// the sequence.
fn continuation<S: ByteSource + ?Sized>(source: &mut S) -> Option<u8> {
    match source.read_byte() {
        Ok(byte) => byte,
        Err(error) => {
            debug!(%error, "read failed inside a key sequence");
            None
        }
    }
}

fn decode_escape<S: ByteSource + ?Sized>(source: &mut S) -> Decoded {
    // A lone ESC is the Escape key only when nothing else is already waiting.
    if !source.has_pending() {
        return Decoded::Key(KeyStroke::Escape);
    }
    let Some(next) = continuation(source) else {
        return Decoded::Nothing;
    };
    match next {
        b'[' => decode_csi(source),
        b'O' => match continuation(source) {
            Some(last) => Decoded::Key(KeyStroke::Raw(vec![ESC, b'O', last])),
            None => Decoded::Nothing,
        },
        DEL | BS => Decoded::Key(KeyStroke::Alt(AltKey::Backspace)),
        ESC => Decoded::Key(KeyStroke::Escape),
        0x20..=0x7e => Decoded::Key(KeyStroke::Alt(AltKey::Char(next as char))),
        0x80.. => decode_utf8(next, source)
            .map(|ch| Decoded::Key(KeyStroke::Alt(AltKey::Char(ch))))
            .unwrap_or(Decoded::Nothing),
        _ => {
            debug!(byte = next, "discarded escape with control byte");
            Decoded::Nothing
        }
    }
}

fn decode_csi<S: ByteSource + ?Sized>(source: &mut S) -> Decoded {
    let mut params = Vec::new();
    loop {
        let Some(byte) = continuation(source) else {
            return Decoded::Nothing;
        };
        match byte {
            b'A'..=b'Z' | b'~' => return finish_csi(&params, byte),
            0x40..=0x7e => {
                debug!(final_byte = byte, "discarded unsupported CSI sequence");
                return Decoded::Nothing;
            }
            _ => {
                params.push(byte);
                if params.len() > MAX_CSI_LEN {
                    debug!("discarded overlong CSI sequence");
                    return Decoded::Nothing;
                }
            }
        }
    }
}

fn finish_csi(params: &[u8], final_byte: u8) -> Decoded {
    let modifier = params
        .iter()
        .rposition(|byte| *byte == b';')
        .map(|split| &params[split + 1..]);
    let word_modifier = modifier.is_some_and(|value| {
        value
            .iter()
            .any(|byte| matches!(byte, b'3' | b'5' | b'9'))
    });

    if word_modifier {
        let alt = match final_byte {
            b'A' => Some(AltKey::Up),
            b'B' => Some(AltKey::Down),
            b'C' => Some(AltKey::Right),
            b'D' => Some(AltKey::Left),
            _ => None,
        };
        if let Some(alt) = alt {
            return Decoded::Key(KeyStroke::Alt(alt));
        }
    }

    let mut bytes = Vec::with_capacity(params.len() + 3);
    bytes.extend_from_slice(&[ESC, b'[']);
    bytes.extend_from_slice(params);
    bytes.push(final_byte);
    Decoded::Key(KeyStroke::Raw(bytes))
}

fn decode_utf8<S: ByteSource + ?Sized>(lead: u8, source: &mut S) -> Option<char> {
    let width = match lead {
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => {
            debug!(byte = lead, "discarded invalid UTF-8 lead byte");
            return None;
        }
    };
    let mut buf = [lead, 0, 0, 0];
    for slot in buf.iter_mut().take(width).skip(1) {
        let byte = continuation(source)?;
        if byte & 0xc0 != 0x80 {
            debug!(byte, "discarded broken UTF-8 sequence");
            source.unread(byte);
            return None;
        }
        *slot = byte;
    }
    std::str::from_utf8(&buf[..width])
        .ok()
        .and_then(|text| text.chars().next())
}

/// Buffered reader over any byte stream. Used for non-terminal stdin.
pub struct ReaderSource<R> {
    reader: BufReader<R>,
    pushed: Option<u8>,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pushed: None,
        }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(byte) = self.pushed.take() {
            return Ok(Some(byte));
        }
        let buf = self.reader.fill_buf()?;
        let Some(byte) = buf.first().copied() else {
            return Ok(None);
        };
        self.reader.consume(1);
        Ok(Some(byte))
    }

    fn has_pending(&mut self) -> bool {
        self.pushed.is_some() || !self.reader.buffer().is_empty()
    }

    fn unread(&mut self, byte: u8) {
        self.pushed = Some(byte);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory source. `pending` limits how many queued bytes count as
    /// already arrived, so a lone ESC can be told apart from a sequence.
    pub(crate) struct SliceSource {
        bytes: VecDeque<u8>,
        split_escapes: bool,
    }

    impl SliceSource {
        pub(crate) fn new(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.iter().copied().collect(),
                split_escapes: false,
            }
        }

        /// Every ESC is reported as having nothing buffered behind it.
        pub(crate) fn slow(bytes: &[u8]) -> Self {
            Self {
                split_escapes: true,
                ..Self::new(bytes)
            }
        }
    }

    impl ByteSource for SliceSource {
        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            Ok(self.bytes.pop_front())
        }

        fn has_pending(&mut self) -> bool {
            !self.split_escapes && !self.bytes.is_empty()
        }

        fn unread(&mut self, byte: u8) {
            self.bytes.push_front(byte);
        }
    }

    struct FailingSource {
        bytes: VecDeque<u8>,
    }

    impl ByteSource for FailingSource {
        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            match self.bytes.pop_front() {
                Some(byte) => Ok(Some(byte)),
                None => Err(io::Error::new(io::ErrorKind::Interrupted, "gone")),
            }
        }

        fn has_pending(&mut self) -> bool {
            true
        }

        fn unread(&mut self, byte: u8) {
            self.bytes.push_front(byte);
        }
    }

    fn decode_all(mode: DecodeMode, source: &mut dyn ByteSource) -> Vec<Decoded> {
        let decoder = KeyDecoder::new(mode);
        let mut out = Vec::new();
        loop {
            match decoder.next_key(source).expect("decode") {
                Decoded::Eof => break,
                other => out.push(other),
            }
        }
        out
    }

    fn keys(bytes: &[u8]) -> Vec<Decoded> {
        decode_all(DecodeMode::Raw, &mut SliceSource::new(bytes))
    }

    fn key(stroke: KeyStroke) -> Decoded {
        Decoded::Key(stroke)
    }

    #[test]
    fn printable_and_control_bytes() {
        assert_eq!(
            keys(b"a\x01\x0d\x7f"),
            vec![
                key(KeyStroke::Char('a')),
                key(KeyStroke::Ctrl('a')),
                key(KeyStroke::enter()),
                key(KeyStroke::backspace()),
            ]
        );
        assert_eq!(keys(&[0x1c]), vec![key(KeyStroke::Raw(vec![0x1c]))]);
    }

    #[test]
    fn utf8_runes_decode_whole() {
        assert_eq!(
            keys("é語🙂".as_bytes()),
            vec![
                key(KeyStroke::Char('é')),
                key(KeyStroke::Char('語')),
                key(KeyStroke::Char('🙂')),
            ]
        );
    }

    #[test]
    fn csi_and_ss3_sequences() {
        assert_eq!(
            keys(b"\x1b[A\x1bOB\x1b[3~\x1b[1~"),
            vec![
                key(KeyStroke::up()),
                key(KeyStroke::raw(b"\x1bOB")),
                key(KeyStroke::raw(b"\x1b[3~")),
                key(KeyStroke::raw(b"\x1b[1~")),
            ]
        );
    }

    #[test]
    fn modified_arrows_become_word_motions() {
        assert_eq!(
            keys(b"\x1b[1;3D\x1b[1;5C\x1b[1;9A\x1b[1;2C"),
            vec![
                key(KeyStroke::Alt(AltKey::Left)),
                key(KeyStroke::Alt(AltKey::Right)),
                key(KeyStroke::Alt(AltKey::Up)),
                key(KeyStroke::raw(b"\x1b[1;2C")),
            ]
        );
    }

    #[test]
    fn alt_prefixed_keys() {
        assert_eq!(
            keys(b"\x1bb\x1bf\x1b\x7f\x1b\x08"),
            vec![
                key(KeyStroke::Alt(AltKey::Char('b'))),
                key(KeyStroke::Alt(AltKey::Char('f'))),
                key(KeyStroke::Alt(AltKey::Backspace)),
                key(KeyStroke::Alt(AltKey::Backspace)),
            ]
        );
    }

    #[test]
    fn lone_escape_only_without_pending_input() {
        assert_eq!(keys(b"\x1b"), vec![key(KeyStroke::Escape)]);

        let decoded = decode_all(DecodeMode::Raw, &mut SliceSource::slow(b"\x1b[A"));
        assert_eq!(
            decoded,
            vec![
                key(KeyStroke::Escape),
                key(KeyStroke::Char('[')),
                key(KeyStroke::Char('A')),
            ]
        );
    }

    #[test]
    fn truncated_sequences_are_dropped_without_corrupting_the_next_key() {
        let mut source = SliceSource::new(b"\x1b[1;");
        assert_eq!(decode_all(DecodeMode::Raw, &mut source), vec![Decoded::Nothing]);

        assert_eq!(
            keys(b"\x1b[200aq"),
            vec![Decoded::Nothing, key(KeyStroke::Char('q'))]
        );

        let mut failing = FailingSource {
            bytes: VecDeque::from(vec![ESC, b'[', b'1']),
        };
        let decoder = KeyDecoder::new(DecodeMode::Raw);
        assert_eq!(decoder.next_key(&mut failing).expect("decode"), Decoded::Nothing);
        assert!(decoder.next_key(&mut failing).is_err());
    }

    #[test]
    fn overlong_csi_is_discarded() {
        let mut bytes = b"\x1b[".to_vec();
        bytes.extend(std::iter::repeat_n(b'1', 40));
        bytes.push(b'A');
        let decoded = keys(&bytes);
        assert_eq!(decoded.first(), Some(&Decoded::Nothing));
        assert!(!decoded.contains(&key(KeyStroke::up())));
    }

    #[test]
    fn invalid_utf8_is_skipped() {
        assert_eq!(
            keys(&[0xff, b'x', 0xe6, b'y']),
            vec![
                Decoded::Nothing,
                key(KeyStroke::Char('x')),
                Decoded::Nothing,
                key(KeyStroke::Char('y')),
            ]
        );
    }

    #[test]
    fn key_after_a_cut_rune_is_still_decoded() {
        assert_eq!(
            keys(&[0xe6, b'q']),
            vec![Decoded::Nothing, key(KeyStroke::Char('q'))]
        );
        assert_eq!(
            keys(&[0xe2, 0x82, ESC, b'[', b'A', 0xc3, 0xa9]),
            vec![
                Decoded::Nothing,
                key(KeyStroke::up()),
                key(KeyStroke::Char('é')),
            ]
        );

        let decoded = decode_all(DecodeMode::Buffered, &mut ReaderSource::new(&[0xf0, b'\n'][..]));
        assert_eq!(decoded, vec![Decoded::Nothing, key(KeyStroke::enter())]);
    }

    #[test]
    fn buffered_mode_keeps_line_semantics() {
        let decoded = decode_all(
            DecodeMode::Buffered,
            &mut ReaderSource::new(&b"st\x01\t\x08\n"[..]),
        );
        assert_eq!(
            decoded,
            vec![
                key(KeyStroke::Char('s')),
                key(KeyStroke::Char('t')),
                Decoded::Nothing,
                key(KeyStroke::tab()),
                key(KeyStroke::backspace()),
                key(KeyStroke::enter()),
            ]
        );
    }
}
