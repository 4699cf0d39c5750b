//! Minimal HTTP/1.1 response reading over an [`embedded_io_async::Read`]
//! stream

use airnode_hal::UploadResponse;
use embedded_io_async::Read;

use crate::error::HttpError;
use crate::fmt::Dbg;

const STATUS_LINE_CAPACITY: usize = 64;
const HEADER_LINE_CAPACITY: usize = 256;

/// Read one `\n`-terminated line into `buf`
///
/// The terminator is not stored; a trailing `\r` is. Bytes past the end of
/// `buf` are consumed and dropped. Returns `Ok(None)` on end of stream
/// with nothing read.
pub async fn read_line<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<Option<usize>, R::Error> {
    let mut len = 0;
    let mut any = false;
    let mut byte = [0u8; 1];

    loop {
        if reader.read(&mut byte).await? == 0 {
            return Ok(any.then_some(len));
        }
        any = true;
        if byte[0] == b'\n' {
            return Ok(Some(len));
        }
        if len < buf.len() {
            buf[len] = byte[0];
            len += 1;
        }
    }
}

/// Status code from `HTTP/1.1 200 OK`
pub fn parse_status_line(line: &str) -> Option<u16> {
    let mut fields = line.split_ascii_whitespace();
    if !fields.next()?.starts_with("HTTP/") {
        return None;
    }
    let code = fields.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

/// Read a whole response: status line, headers (skipped), and as much of
/// the body as [`UploadResponse`] keeps
///
/// Expects the server to close the stream after the body.
pub async fn read_response<R: Read>(reader: &mut R) -> Result<UploadResponse, HttpError> {
    let mut line = [0u8; HEADER_LINE_CAPACITY];

    let len = read_line(reader, &mut line[..STATUS_LINE_CAPACITY])
        .await
        .map_err(|e| {
            warn!("Read error on status line: {:?}", Dbg(&e));
            HttpError::Transport
        })?
        .ok_or(HttpError::Closed)?;
    let status = core::str::from_utf8(&line[..len])
        .ok()
        .and_then(parse_status_line)
        .ok_or(HttpError::MalformedStatus)?;

    loop {
        let len = read_line(reader, &mut line)
            .await
            .map_err(|_| HttpError::Transport)?;
        match len {
            None => return Ok(UploadResponse::new(status)),
            Some(0) => break,
            Some(1) if line[0] == b'\r' => break,
            Some(_) => {}
        }
    }

    let mut response = UploadResponse::new(status);
    let capacity = response.body.capacity();
    let mut body = [0u8; HEADER_LINE_CAPACITY];
    let mut filled = 0;
    while filled < capacity {
        match reader.read(&mut body[filled..capacity]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            // the status is what matters; a cut-off body is only diagnostic
            Err(_) => break,
        }
    }

    let text = match core::str::from_utf8(&body[..filled]) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&body[..e.valid_up_to()]).unwrap_or_default(),
    };
    // `text` never exceeds the body capacity
    let _ = response.body.push_str(text);
    Ok(response)
}
