#![deny(unsafe_code)]
#![deny(warnings)]
//! HTTPS record upload
//!
//! Each record is stored with one `PUT` to
//! `/data/<board-id>/historial/<key>.json` on the configured host, over a
//! fresh TLS connection (`Connection: close`).

use core::fmt::Write as _;

use airnode_core::http;
use airnode_hal::{SecureTransport, UploadResponse, UploadSink};
use defmt::{debug, info, warn};
use embedded_io_async::Write;
use heapless::String;

use crate::device_id::BoardId;

use super::error::NetworkError;
use super::tls::TlsTransport;

const REQUEST_HEAD_CAPACITY: usize = 320;

/// [`UploadSink`] that PUTs JSON records over HTTPS
pub struct HttpsUploader {
    transport: TlsTransport,
    host: &'static str,
    port: u16,
    board_id: BoardId,
}

impl HttpsUploader {
    pub fn new(transport: TlsTransport, host: &'static str, port: u16, board_id: BoardId) -> Self {
        Self {
            transport,
            host,
            port,
            board_id,
        }
    }

    fn request_head(
        &self,
        key: &str,
        content_length: usize,
    ) -> Result<String<REQUEST_HEAD_CAPACITY>, NetworkError> {
        let mut head = String::new();
        write!(
            head,
            "PUT /data/{}/historial/{}.json HTTP/1.1\r\n\
             Host: {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n",
            self.board_id, key, self.host, content_length
        )
        .map_err(|_| NetworkError::RequestTooLarge)?;
        Ok(head)
    }
}

impl UploadSink for HttpsUploader {
    type Error = NetworkError;

    async fn put(&mut self, key: &str, payload: &str) -> Result<UploadResponse, NetworkError> {
        let head = self.request_head(key, payload.len())?;
        debug!("PUT /data/{}/historial/{}.json", self.board_id.as_str(), key);

        let mut stream = self.transport.connect(self.host, self.port).await?;
        stream.write_all(head.as_bytes()).await?;
        stream.write_all(payload.as_bytes()).await?;
        stream.flush().await?;

        let response = http::read_response(&mut stream).await;
        stream.close().await;
        let response = response.map_err(|e| {
            warn!("Upload response unreadable: {}", e);
            NetworkError::from(e)
        })?;

        info!("Upload answered {}", response.status);
        Ok(response)
    }
}
