#![doc = include_str!("../../README.md")]

pub mod codec;
pub mod error;
pub mod mmap;
pub mod packet;
pub mod pipeline;
pub mod processor;
pub mod program;
pub mod ring;
pub mod service;
pub mod socket;
pub mod stats;
pub mod umem;

pub use error::{PacketError, PipelineError, ProgramError, RingError, ServiceError};
pub use packet::Packet;
pub use pipeline::{Pipeline, PipelineConfig};
pub use processor::{Action, Processor};
pub use program::{AttachFlags, Program};
pub use ring::XdpDesc;
pub use service::{InterfaceConfig, Service, ServiceConfig};
pub use socket::{Socket, SocketOptions};
pub use stats::{Stats, StatsSnapshot};
