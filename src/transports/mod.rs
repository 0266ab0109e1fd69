//! Transport backends
//!
//! - [`inproc`]: in-process sockets over tokio channels, always available
//! - [`zmq`](self::zmq): ZeroMQ sockets, behind the `zmq` cargo feature

pub mod inproc;

#[cfg(feature = "zmq")]
pub mod zmq;

pub use inproc::{Context, InprocPublisher, InprocRouter, InprocSubscriber};

#[cfg(feature = "zmq")]
pub use self::zmq::{ZmqContext, ZmqPublisher, ZmqRouter, ZmqSubscriber};
