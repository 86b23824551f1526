use std::env;

use brook_http::protocol::{ResponseHead, TransferEncoding};
use brook_http::{Server, ServerConfig};
use brook_web::app::{EchoApp, HelloWorldApp, SimpleResponder};
use brook_web::router::{Router, Verb};
use brook_web::Coordinator;
use bytes::Bytes;
use http::StatusCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let address = env::var("BROOK_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_owned());

    let greet = SimpleResponder::new(|_req, path, _body| {
        let name = path.parameter("name").unwrap_or("stranger");
        let greeting = path.query("greeting").unwrap_or("Hello");
        let body = Bytes::from(format!("{greeting}, {name}!"));
        (ResponseHead::new(StatusCode::OK, TransferEncoding::Identity(body.len() as u64)), body)
    });

    let router = Router::builder()
        .route(Verb::Post, "/echo", EchoApp)
        .route(Verb::Get, "/helloworld", HelloWorldApp)
        .route(Verb::Get, "/hello/{name}", greet)
        .build()
        .expect("routes don't conflict");

    let server = match Server::builder().address(address.as_str()).config(ServerConfig::default()).handler(Coordinator::new(router)).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, address = %address, "invalid server setup");
            return;
        }
    };

    info!(address = %address, "press ctrl-c to stop");
    if let Err(e) = server.run().await {
        error!(cause = %e, "server failed");
    }
}
