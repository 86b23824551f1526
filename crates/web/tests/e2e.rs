use std::time::Duration;

use brook_http::protocol::{ResponseHead, TransferEncoding};
use brook_http::{RunningServer, Server, ServerConfig};
use brook_web::app::{EchoApp, HelloWorldApp, SimpleResponder};
use brook_web::router::{Router, Verb};
use brook_web::Coordinator;
use bytes::Bytes;
use http::StatusCode;
use indoc::indoc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

async fn start(config: ServerConfig) -> RunningServer {
    let greet = SimpleResponder::new(|_req, path, body| {
        let name = path.parameter("name").unwrap_or("stranger");
        let greeting = path.query("greeting").unwrap_or("Hello");
        let body = Bytes::from(format!("{greeting}, {name}! ({} bytes)", body.len()));
        (ResponseHead::new(StatusCode::OK, TransferEncoding::Identity(body.len() as u64)), body)
    });
    let router = Router::builder()
        .route(Verb::Post, "/echo", EchoApp)
        .route(Verb::Get, "/helloworld", HelloWorldApp)
        .route(Verb::Post, "/hello/{name}", greet)
        .build()
        .unwrap();

    Server::builder()
        .address("127.0.0.1:0")
        .config(config)
        .handler(Coordinator::new(router))
        .build()
        .unwrap()
        .start()
        .await
        .unwrap()
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(server: &RunningServer) -> Self {
        let (reader, writer) = TcpStream::connect(server.local_addr()).await.unwrap().into_split();
        Self { reader: BufReader::new(reader), writer }
    }

    async fn send(&mut self, request: &[u8]) {
        self.writer.write_all(request).await.unwrap();
    }

    async fn response(&mut self) -> Response {
        read_response(&mut self.reader).await
    }

    /// Waits until the server closed the connection.
    async fn closed(&mut self) -> bool {
        let mut rest = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), self.reader.read_to_end(&mut rest)).await;
        matches!(read, Ok(Ok(0)))
    }
}

#[derive(Debug)]
struct Response {
    version: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    fn body(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

async fn read_response<R: AsyncBufRead + Unpin>(reader: &mut R) -> Response {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    let mut status_line = line.trim_end().splitn(3, ' ');
    let version = status_line.next().unwrap().to_owned();
    let status = status_line.next().unwrap().parse().unwrap();

    let mut headers = Vec::new();
    loop {
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        let (name, value) = header.split_once(':').unwrap();
        headers.push((name.to_owned(), value.trim().to_owned()));
    }

    let mut response = Response { version, status, headers, body: Vec::new() };
    if response.header("transfer-encoding") == Some("chunked") {
        loop {
            line.clear();
            reader.read_line(&mut line).await.unwrap();
            let size = usize::from_str_radix(line.trim_end(), 16).unwrap();
            let mut chunk = vec![0; size + 2];
            reader.read_exact(&mut chunk).await.unwrap();
            assert!(chunk.ends_with(b"\r\n"));
            if size == 0 {
                break;
            }
            response.body.extend_from_slice(&chunk[..size]);
        }
    } else if let Some(length) = response.header("content-length") {
        let mut body = vec![0; length.parse().unwrap()];
        reader.read_exact(&mut body).await.unwrap();
        response.body = body;
    }
    response
}

#[tokio::test]
async fn echo_returns_the_request_body() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    client.send(b"POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 14\r\n\r\nThis is a test").await;
    let response = client.response().await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("X-foo"), Some("bar"));
    assert_eq!(response.header("Transfer-Encoding"), Some("chunked"));
    assert_eq!(response.body(), "This is a test");
    server.shutdown().await;
}

#[tokio::test]
async fn echo_streams_a_chunked_upload() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    client.send(b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").await;
    client.send(b"5\r\nhello\r\n").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send(b"6\r\n world\r\n0\r\n\r\n").await;

    let response = client.response().await;
    assert_eq!(response.body(), "hello world");
    server.shutdown().await;
}

#[tokio::test]
async fn echo_answers_expect_continue_first() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    client.send(b"POST /echo HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 2\r\n\r\n").await;
    let interim = client.response().await;
    assert_eq!(interim.status, 100);
    assert!(interim.headers.is_empty());

    client.send(b"hi").await;
    let response = client.response().await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body(), "hi");
    server.shutdown().await;
}

#[tokio::test]
async fn hello_world_is_chunked() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    client.send(b"GET /helloworld HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    let response = client.response().await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body(), "Hello, World!");
    assert_eq!(response.header("Connection"), Some("Keep-Alive"));
    assert_eq!(response.header("Keep-Alive"), Some("timeout=5, max=99"));
    server.shutdown().await;
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    client.send(b"GET /nowhere HTTP/1.1\r\n\r\n").await;
    let response = client.response().await;
    assert_eq!(response.status, 404);
    assert_eq!(response.header("Content-Length"), Some("0"));

    // wrong method on a known path
    client.send(b"DELETE /echo HTTP/1.1\r\n\r\n").await;
    assert_eq!(client.response().await.status, 404);
    server.shutdown().await;
}

#[tokio::test]
async fn keep_alive_allowance_counts_down_to_close() {
    let server = start(ServerConfig::default().max_requests(3)).await;
    let mut client = Client::connect(&server).await;

    let mut advertised = Vec::new();
    for _ in 0..3 {
        client.send(b"GET /helloworld HTTP/1.1\r\n\r\n").await;
        let response = client.response().await;
        assert_eq!(response.body(), "Hello, World!");
        advertised.push((response.header("Connection").map(str::to_owned), response.header("Keep-Alive").map(str::to_owned)));
    }

    assert_eq!(
        advertised,
        vec![
            (Some("Keep-Alive".to_owned()), Some("timeout=5, max=2".to_owned())),
            (Some("Keep-Alive".to_owned()), Some("timeout=5, max=1".to_owned())),
            (Some("Close".to_owned()), None),
        ]
    );
    assert!(client.closed().await);
    assert_eq!(server.stats().requests, 3);
    server.shutdown().await;
}

#[tokio::test]
async fn http_10_closes_unless_asked() {
    let server = start(ServerConfig::default()).await;

    let mut client = Client::connect(&server).await;
    client.send(b"GET /helloworld HTTP/1.0\r\n\r\n").await;
    let response = client.response().await;
    assert_eq!(response.version, "HTTP/1.0");
    assert_eq!(response.header("Connection"), Some("Close"));
    assert!(client.closed().await);

    let mut client = Client::connect(&server).await;
    let request = indoc! {"
        GET /helloworld HTTP/1.0
        Connection: keep-alive

    "};
    client.send(request.as_bytes()).await;
    let response = client.response().await;
    assert_eq!(response.header("Connection"), Some("Keep-Alive"));
    assert_eq!(response.body(), "Hello, World!");
    server.shutdown().await;
}

#[tokio::test]
async fn simple_responder_gets_path_and_query() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    client.send(b"POST /hello/brook?greeting=Howdy HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc").await;
    let response = client.response().await;
    assert_eq!(response.body(), "Howdy, brook! (3 bytes)");
    server.shutdown().await;
}

#[tokio::test]
async fn malformed_request_is_rejected() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    client.send(b"POST /echo HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\nabc").await;
    let response = client.response().await;
    assert_eq!(response.status, 400);
    assert_eq!(response.header("Connection"), Some("Close"));
    assert!(client.closed().await);
    server.shutdown().await;
}

#[tokio::test]
async fn idle_connection_is_reaped() {
    let server = start(ServerConfig::default().keep_alive_timeout(Duration::from_secs(1))).await;
    let mut client = Client::connect(&server).await;

    client.send(b"GET /helloworld HTTP/1.1\r\n\r\n").await;
    let response = client.response().await;
    assert_eq!(response.header("Keep-Alive"), Some("timeout=1, max=99"));

    assert!(client.closed().await);
    // the reaper counts after it closed the socket
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.stats().reaped, 1);
    assert_eq!(server.connections(), 0);
    server.shutdown().await;
}
