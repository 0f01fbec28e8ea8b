//! Test harness module

mod server;

pub use server::TestServer;
