//! Routing and sample applications on top of `brook-http`.
//!
//! A [`Router`] maps a method and a path pattern to a [`RouteHandler`]. The
//! [`Coordinator`] plugs a router into the engine as its
//! [`Handler`](brook_http::handler::Handler) and answers `404` itself when
//! nothing matches.
//!
//! ```
//! use brook_web::app::{EchoApp, HelloWorldApp};
//! use brook_web::router::{Router, Verb};
//! use brook_web::Coordinator;
//!
//! let router = Router::builder()
//!     .route(Verb::Post, "/echo", EchoApp)
//!     .route(Verb::Get, "/helloworld", HelloWorldApp)
//!     .build()
//!     .unwrap();
//! let coordinator = Coordinator::new(router);
//! # let _ = coordinator;
//! ```

mod coordinator;

pub mod app;
pub mod router;

pub use coordinator::Coordinator;
pub use router::{PathComponents, RouteHandler, Router, Verb, route_fn};
