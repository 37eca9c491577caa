use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use thiserror::Error;
use url::Url;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_BUFFER_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("redirect URL `{0}` has no usable host and port")]
    InvalidRedirectUrl(String),
    #[error("failed to bind redirect listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("redirect listener failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no authorization redirect received within {0:?}")]
    Timeout(Duration),
    #[error("malformed redirect request")]
    MalformedRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub enum CallbackReply {
    Success,
    Failure(String),
}

#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
}

impl CallbackListener {
    pub fn bind_for(redirect_url: &Url) -> Result<Self, CallbackError> {
        let host = redirect_url
            .host_str()
            .ok_or_else(|| CallbackError::InvalidRedirectUrl(redirect_url.to_string()))?;
        let port = redirect_url
            .port_or_known_default()
            .ok_or_else(|| CallbackError::InvalidRedirectUrl(redirect_url.to_string()))?;
        let addr = format!("{host}:{port}");

        let resolved: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|source| CallbackError::Bind {
                addr: addr.clone(),
                source,
            })?
            .collect();
        let listener = TcpListener::bind(&resolved[..])
            .map_err(|source| CallbackError::Bind { addr, source })?;

        Ok(Self { listener })
    }

    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listener }
    }

    /// Accepts one connection, parses its query, answers with the page chosen by
    /// `reply`, and consumes the listener so the port is released on return.
    pub fn accept_one<F>(self, timeout: Duration, reply: F) -> Result<CallbackParams, CallbackError>
    where
        F: FnOnce(&CallbackParams) -> CallbackReply,
    {
        let mut stream = self.wait_for_connection(timeout)?;
        stream.set_nonblocking(false)?;
        let read_timeout = READ_TIMEOUT.min(timeout);
        stream.set_read_timeout(Some(read_timeout))?;

        let request = read_request_head(&mut stream, read_timeout)?;
        let params = match parse_request_line(&request) {
            Some(params) => params,
            None => {
                write_page(&mut stream, "400 Bad Request", "Authorization failed", "Malformed request.");
                return Err(CallbackError::MalformedRequest);
            }
        };

        match reply(&params) {
            CallbackReply::Success => write_page(
                &mut stream,
                "200 OK",
                "Authorization successful",
                "You can close this window and return to the terminal.",
            ),
            CallbackReply::Failure(message) => {
                write_page(&mut stream, "400 Bad Request", "Authorization failed", &message)
            }
        }

        Ok(params)
    }

    fn wait_for_connection(&self, timeout: Duration) -> Result<TcpStream, CallbackError> {
        self.listener.set_nonblocking(true)?;
        let started = Instant::now();

        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::debug!(peer = %peer, "redirect connection accepted");
                    return Ok(stream);
                }
                Err(error) if error.kind() == ErrorKind::WouldBlock => {
                    if started.elapsed() >= timeout {
                        return Err(CallbackError::Timeout(timeout));
                    }
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(error) => return Err(CallbackError::Io(error)),
            }
        }
    }
}

fn read_request_head(stream: &mut TcpStream, read_timeout: Duration) -> Result<String, CallbackError> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0_u8; 1024];

    loop {
        let read = match stream.read(&mut chunk) {
            Ok(read) => read,
            Err(error) if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(CallbackError::Timeout(read_timeout));
            }
            Err(error) => return Err(CallbackError::Io(error)),
        };
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= REQUEST_BUFFER_SIZE {
            break;
        }
    }

    if buffer.is_empty() {
        return Err(CallbackError::MalformedRequest);
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn parse_request_line(request: &str) -> Option<CallbackParams> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let _method = parts.next()?;
    let target = parts.next()?;

    let url = Url::parse("http://localhost").ok()?.join(target).ok()?;
    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        let value = Some(value.into_owned());
        match key.as_ref() {
            "code" => params.code = value,
            "state" => params.state = value,
            "error" => params.error = value,
            "error_description" => params.error_description = value,
            _ => {}
        }
    }

    Some(params)
}

fn write_page(stream: &mut TcpStream, status: &str, title: &str, message: &str) {
    let body = format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n\
         <body style=\"font-family: system-ui; text-align: center; padding: 50px;\">\n\
         <h1>{title}</h1>\n<p>{message}</p>\n</body>\n</html>"
    );
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    if let Err(error) = stream
        .write_all(response.as_bytes())
        .and_then(|()| stream.flush())
    {
        tracing::warn!(error = %error, "failed to answer redirect request");
    }
}
