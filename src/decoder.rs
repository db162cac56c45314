//! Incremental line decoding for streamed response bodies.
//!
//! Bytes arrive in arbitrary chunks. A multi-byte character may straddle two
//! chunks and a line almost always does, so both are carried over until the
//! rest arrives. Whatever is still buffered when the body ends is an
//! unterminated record and is dropped.

/// Streaming UTF-8 decoder.
///
/// Incomplete trailing sequences are held back until the next chunk; invalid
/// sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` and append the text to `out`.
    pub fn decode_into(&mut self, chunk: &[u8], out: &mut String) {
        let mut carried = std::mem::take(&mut self.pending);
        let mut input: &[u8] = if carried.is_empty() {
            chunk
        } else {
            carried.extend_from_slice(chunk);
            &carried
        };

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    // `valid` is well-formed, so this borrows without replacing.
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            self.pending.extend_from_slice(rest);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Number of bytes waiting for the rest of their character.
    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Splits a byte stream into `\n`-terminated lines.
///
/// Lines are yielded without the terminator. A trailing `\r` is left in
/// place; record parsing trims it.
///
/// # Example
/// ```
/// use chatwire::decoder::LineDecoder;
///
/// let mut decoder = LineDecoder::new();
/// assert_eq!(decoder.feed(b"data: a\nda").collect::<Vec<_>>(), vec!["data: a"]);
/// assert_eq!(decoder.feed(b"ta: b\n").collect::<Vec<_>>(), vec!["data: b"]);
/// ```
#[derive(Debug, Default)]
pub struct LineDecoder {
    utf8: Utf8Decoder,
    buffer: String,
    /// Start of the first line not yet handed out.
    consumed: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the lines it completes, in order.
    ///
    /// Lines are split off lazily as the iterator is advanced. Anything not
    /// consumed stays buffered and is yielded by the next `feed`.
    pub fn feed(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.compact();
        self.utf8.decode_into(chunk, &mut self.buffer);
        Lines { decoder: self }
    }

    fn compact(&mut self) {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
    }

    fn next_line(&mut self) -> Option<String> {
        let rest = &self.buffer[self.consumed..];
        let pos = rest.find('\n')?;
        let line = rest[..pos].to_string();
        self.consumed += pos + 1;
        Some(line)
    }

    /// The unterminated tail currently held back.
    #[cfg(test)]
    fn carry(&self) -> &str {
        &self.buffer[self.consumed..]
    }

    /// End of input. The unterminated tail is discarded and returned for
    /// diagnostics; it must not be treated as a record.
    pub fn finish(mut self) -> String {
        self.compact();
        self.buffer
    }
}

/// Lines completed by one [`LineDecoder::feed`] call.
pub struct Lines<'a> {
    decoder: &'a mut LineDecoder,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.decoder.next_line()
    }
}
