//! Minimal HTTP/1.1 server for exercising the client against real sockets.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// What the test server sends back for one connection.
#[derive(Debug, Clone)]
pub enum ChunkedReply {
    /// Non-streaming response with the given status and body.
    Status { status: u16, body: String },
    /// A `200 OK` JSON response.
    Json(String),
    /// A chunked `text/plain` stream, one HTTP chunk per entry. With
    /// `truncate` the connection is dropped instead of sending the final
    /// zero-length chunk.
    Chunks { chunks: Vec<String>, truncate: bool },
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

pub struct TestServer {
    pub url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Wait for the server to finish and return the first request it saw.
    pub async fn captured(self) -> Option<CapturedRequest> {
        self.all_captured().await.into_iter().next()
    }

    pub async fn all_captured(self) -> Vec<CapturedRequest> {
        let _ = self.handle.await;
        let guard = self.requests.lock().await;
        guard.clone()
    }
}

pub async fn spawn_chunked_server(reply: ChunkedReply) -> TestServer {
    spawn_http_server(vec![reply]).await
}

/// Serve `replies` in order, one per accepted connection.
pub async fn spawn_http_server(replies: Vec<ChunkedReply>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&requests);

    let handle = tokio::spawn(async move {
        for reply in replies {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            match read_http_request(&mut stream).await {
                Ok(request) => captured.lock().await.push(request),
                Err(_) => return,
            }
            let _ = write_reply(&mut stream, reply).await;
        }
    });

    TestServer {
        url: format!("http://{addr}"),
        requests,
        handle,
    }
}

async fn write_reply(stream: &mut TcpStream, reply: ChunkedReply) -> std::io::Result<()> {
    match reply {
        ChunkedReply::Status { status, body } => {
            let head = format!(
                "HTTP/1.1 {status} Error\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(body.as_bytes()).await?;
        }
        ChunkedReply::Json(body) => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(body.as_bytes()).await?;
        }
        ChunkedReply::Chunks { chunks, truncate } => {
            stream
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                )
                .await?;
            for chunk in chunks {
                let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                stream.write_all(frame.as_bytes()).await?;
                stream.flush().await?;
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            if truncate {
                return Ok(());
            }
            stream.write_all(b"0\r\n\r\n").await?;
        }
    }
    stream.flush().await?;
    stream.shutdown().await
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.unwrap_or(buffer.len());
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let mut parts = line.splitn(2, ':');
        let Some(name) = parts.next() else {
            continue;
        };
        let value = parts.next().unwrap_or_default().trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}
