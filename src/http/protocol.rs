use crate::framing::ResponsePayload;
use http::header::{
    HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, CONNECTION, CONTENT_LENGTH,
    CONTENT_TYPE, SERVER,
};
use http::{Method, Response, StatusCode};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Maximum number of request headers parsed
pub const MAX_HEADERS: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Incomplete request")]
    IncompleteRequest,
    #[error("Request head too large: {0} bytes")]
    RequestTooLarge(usize),
}

impl HttpProtocolError {
    /// Status to answer with, if the client is still worth answering
    pub fn response_status(&self) -> Option<StatusCode> {
        match self {
            HttpProtocolError::HttpParse(_) | HttpProtocolError::InvalidRequest(_) => {
                Some(StatusCode::BAD_REQUEST)
            }
            HttpProtocolError::RequestTooLarge(_) => {
                Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
            }
            HttpProtocolError::Io(_) | HttpProtocolError::IncompleteRequest => None,
        }
    }
}

/// The parts of a request that are forwarded to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
}

impl RequestHead {
    /// The line sent over serial, e.g. `GET /api/status`
    pub fn request_line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET.as_str()
    }
}

/// Parses a request head; `Ok(None)` means more bytes are needed
pub fn parse_request_head(buf: &[u8]) -> Result<Option<RequestHead>, HttpProtocolError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(buf) {
        Ok(httparse::Status::Complete(_)) => {
            let method = req
                .method
                .ok_or_else(|| HttpProtocolError::InvalidRequest("missing method".to_string()))?;
            let path = req
                .path
                .ok_or_else(|| HttpProtocolError::InvalidRequest("missing path".to_string()))?;
            Ok(Some(RequestHead {
                method: method.to_string(),
                path: path.to_string(),
            }))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(e) => Err(HttpProtocolError::HttpParse(format!(
            "Failed to parse request head: {e}"
        ))),
    }
}

/// Reads from `stream` until a complete request head has arrived
///
/// Any request body is left unread; only the head matters to the device.
pub async fn read_request_head<R>(
    stream: &mut R,
    max_size: usize,
) -> Result<RequestHead, HttpProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(HttpProtocolError::IncompleteRequest);
        }
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(head) = parse_request_head(&buffer)? {
            return Ok(head);
        }
        if buffer.len() >= max_size {
            return Err(HttpProtocolError::RequestTooLarge(buffer.len()));
        }
    }
}

/// Serializes a response as HTTP/1.1 bytes
pub fn encode_response(response: &Response<Vec<u8>>) -> Vec<u8> {
    let status = response.status();
    let body = response.body();
    let mut out = Vec::with_capacity(128 + body.len());

    out.extend_from_slice(
        format!(
            "HTTP/1.1 {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )
        .as_bytes(),
    );
    for (name, value) in response.headers() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

fn build_response(
    status: StatusCode,
    content_type: &'static str,
    body: Vec<u8>,
    server_name: Option<&str>,
) -> Response<Vec<u8>> {
    let length = body.len();
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    if let Some(value) = server_name.and_then(|name| HeaderValue::from_str(name).ok()) {
        headers.insert(SERVER, value);
    }
    response
}

/// Renders what the device sent
///
/// A payload that already starts with an HTTP/1.1 status line is passed
/// through byte for byte. Anything else is treated as HTML content and
/// wrapped in a `200 OK`.
pub fn render_payload(payload: &ResponsePayload, server_name: Option<&str>) -> Vec<u8> {
    if payload.is_http_response() {
        return payload.as_bytes().to_vec();
    }

    let mut response = build_response(
        StatusCode::OK,
        "text/html",
        payload.as_bytes().to_vec(),
        server_name,
    );
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    encode_response(&response)
}

/// Renders a bridge-generated plain-text response
pub fn render_status(
    status: StatusCode,
    message: &str,
    server_name: Option<&str>,
    extra_headers: &[(HeaderName, &'static str)],
) -> Vec<u8> {
    let mut response = build_response(
        status,
        "text/plain",
        message.as_bytes().to_vec(),
        server_name,
    );
    for (name, value) in extra_headers {
        response
            .headers_mut()
            .insert(name.clone(), HeaderValue::from_static(value));
    }
    encode_response(&response)
}

/// `405` for anything but GET
pub fn render_method_not_allowed(method: &str, server_name: Option<&str>) -> Vec<u8> {
    render_status(
        StatusCode::METHOD_NOT_ALLOWED,
        &format!("Method {method} not allowed. Only GET requests are forwarded."),
        server_name,
        &[(ALLOW, "GET")],
    )
}
