//! Node-style response output (`setHeader` / `writeHead` / `end`) for hosts
//! that stream into a sink instead of returning a response value.

use anyhow::Context;
use axum::body::{to_bytes, Bytes};
use axum::http::StatusCode;
use axum::response::Response;

pub trait ResponseSink {
    fn set_header(&mut self, name: &str, value: &str);
    fn write_head(&mut self, status: StatusCode);
    fn end(&mut self, body: Bytes);
}

/// Writes `response` through `sink`: headers, then status, then the whole
/// body.
pub async fn write_response<S>(response: Response, sink: &mut S) -> anyhow::Result<()>
where
    S: ResponseSink + ?Sized,
{
    let (parts, body) = response.into_parts();
    for (name, value) in parts.headers.iter() {
        match value.to_str() {
            Ok(value) => sink.set_header(name.as_str(), value),
            Err(_) => tracing::warn!(header = %name, "Dropping non-ASCII header value"),
        }
    }
    sink.write_head(parts.status);

    let bytes = to_bytes(body, usize::MAX)
        .await
        .context("Failed to read response body")?;
    sink.end(bytes);
    Ok(())
}

/// Sink that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct BufferedSink {
    pub status: Option<StatusCode>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub ended: bool,
}

impl BufferedSink {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl ResponseSink for BufferedSink {
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_head(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn end(&mut self, body: Bytes) {
        self.body = body;
        self.ended = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn writes_headers_status_and_body() {
        let response = (
            StatusCode::CREATED,
            [(header::CACHE_CONTROL, "no-store")],
            "hello",
        )
            .into_response();

        let mut sink = BufferedSink::default();
        write_response(response, &mut sink).await.unwrap();

        assert_eq!(sink.status, Some(StatusCode::CREATED));
        assert_eq!(sink.header("cache-control"), Some("no-store"));
        assert_eq!(sink.text(), "hello");
        assert!(sink.ended);
    }
}
