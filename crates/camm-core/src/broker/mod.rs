//! # Broker Module
//!
//! The job handoff between the optimizer and the workflow engine, carried over a
//! STOMP message broker.
//!
//! ## Overview
//!
//! 1. The optimizer driver builds a [`JobRequest`] whose `amq_results_queue` names a
//!    reply queue dedicated to its instance, and posts it on the params-ready queue
//!    through a [`Requester`], which then waits for the answer.
//! 2. A [`Listener`] subscribed to the params-ready queue turns the job into a
//!    workflow-engine command line and launches it through a [`ProcessSpawner`],
//!    without waiting for it.
//! 3. The workflow posts a [`JobReply`] carrying the cost function on the reply
//!    queue, which releases the requester.
//!
//! Both sides talk to the broker through the [`Connection`] trait, implemented over
//! TCP by [`StompConnection`] and in-process by [`MemoryBroker`].

mod error;

pub mod config;
pub mod connection;
pub mod listener;
pub mod memory;
pub mod message;
pub mod progress;
pub mod rendezvous;
pub mod requester;
pub mod spawner;
pub mod status;
pub mod stomp;

pub use config::{BrokerAddress, BrokerConfig, BrokerConfigBuilder, ConfigError, LaunchConfig, QueueConfig};
pub use connection::{Connection, Message};
pub use error::BrokerError;
pub use listener::{Listener, ListenerStats};
pub use memory::MemoryBroker;
pub use message::{Destination, JobReply, JobRequest, JobStatus, StatusReport};
pub use progress::{Progress, ProgressReporter};
pub use requester::Requester;
pub use spawner::{LaunchHandle, ProcessSpawner, TokioSpawner};
pub use stomp::StompConnection;
