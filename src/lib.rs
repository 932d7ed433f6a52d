//! Movie mesh: service registry, resilient remote calls and the metadata,
//! rating and movie services built on top of them.

pub mod config;
pub mod discovery;
pub mod gateway;
pub mod limiter;
pub mod logging;
pub mod model;
pub mod server;
pub mod services;
pub mod storage;

pub mod pb {
    tonic::include_proto!("movie_mesh");
}
