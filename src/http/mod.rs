pub mod handler;
pub mod resolver;
pub mod timed_io;
pub mod timing;
pub mod tls;
