//! Raw-TCP mock servers for integration tests.
//!
//! Each server accepts a single connection on an ephemeral port, records what
//! the client wrote and answers with canned bytes.

#![allow(dead_code)]

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What a proxy saw: the CONNECT head and, once tunnelled, the inner request.
#[derive(Debug)]
pub struct ProxyRecord {
    pub connect: String,
    pub request: Option<String>,
}

/// Read one request (head plus Content-Length body) from `reader`.
pub async fn read_request<R>(reader: &mut R) -> String
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut head = String::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.unwrap();
        assert!(n > 0, "client closed before the end of the head");
        head.push_str(&line);
        if line == "\r\n" {
            break;
        }
    }

    let length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(n, _)| n.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.unwrap();
    head.push_str(&String::from_utf8_lossy(&body));
    head
}

async fn answer(socket: TcpStream, response: &'static [u8]) -> String {
    let mut reader = BufReader::new(socket);
    let request = read_request(&mut reader).await;
    let mut socket = reader.into_inner();
    socket.write_all(response).await.unwrap();
    let _ = socket.shutdown().await;
    request
}

/// Target server answering one request with `response`. Resolves to the raw request.
pub async fn start_target(response: &'static [u8]) -> (SocketAddr, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        answer(socket, response).await
    });
    (addr, handle)
}

/// CONNECT proxy answering the CONNECT with `status_line`.
///
/// On `200` it plays the tunnelled target itself and answers the inner
/// request with `response`.
pub async fn start_proxy(
    status_line: &'static str,
    response: &'static [u8],
) -> (SocketAddr, JoinHandle<ProxyRecord>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(socket);
        let connect = read_request(&mut reader).await;

        let mut socket = reader.into_inner();
        socket
            .write_all(format!("HTTP/1.1 {}\r\n\r\n", status_line).as_bytes())
            .await
            .unwrap();

        if !status_line.starts_with("200") {
            let _ = socket.shutdown().await;
            return ProxyRecord {
                connect,
                request: None,
            };
        }

        let request = answer(socket, response).await;
        ProxyRecord {
            connect,
            request: Some(request),
        }
    });
    (addr, handle)
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
    request
        .split("\r\n\r\n")
        .next()?
        .lines()
        .skip(1)
        .filter_map(|l| l.split_once(':'))
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
}

/// Lowercased header names of `request`, sorted.
pub fn header_names(request: &str) -> Vec<String> {
    let mut names: Vec<String> = request
        .split("\r\n\r\n")
        .next()
        .unwrap_or_default()
        .lines()
        .skip(1)
        .filter_map(|l| l.split_once(':'))
        .map(|(n, _)| n.trim().to_ascii_lowercase())
        .collect();
    names.sort();
    names
}
