#![deny(missing_docs)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Docker Swarm address discovery.
//!
//! A discovery provider that asks a Swarm manager's Engine API for either the
//! advertised addresses of the cluster's nodes or the overlay addresses of a
//! service's running tasks. Each call builds its own client, makes one or two
//! list requests, and returns a deduplicated address list. Nothing is cached
//! or watched.
//!
//! # Features
//!
//! - **Node discovery**: addresses of `ready`, `active` nodes, optionally by role
//! - **Service discovery**: task addresses on a stack network, CIDR suffix removed
//! - **Host networking**: node addresses of the service's running tasks
//! - **Framework arguments**: the usual `key=value` argument string
//!
//! # Usage
//!
//! ```ignore
//! use dockerswarm_discover::{Args, Discover, Provider};
//!
//! // Addresses of every running replica of `shop_web` on the `shop_backend` network
//! let args: Args = "provider=dockerswarm type=service namespace=shop service=web network=backend"
//!     .parse()?;
//! let addrs = Provider.addrs(&args).await?;
//!
//! // Addresses of all manager nodes
//! let args: Args = "provider=dockerswarm type=node role=manager".parse()?;
//! let managers = Provider.addrs(&args).await?;
//! ```
//!
//! Hosts that already hold a client can implement [`SwarmApi`] and call
//! [`Provider::addrs_with`] instead.

mod args;
mod client;
mod error;
pub mod model;
mod swarm;

pub use args::{Args, DEFAULT_NAMESPACE, DEFAULT_NETWORK};
pub use client::{DEFAULT_HOST, DockerClient, MAX_API_VERSION, SwarmApi, select_host};
pub use error::{Error, Result, TransportError};
pub use swarm::{
    BoxFuture, Discover, DiscoveryType, Provider, node_addrs, service_addrs, strip_prefix_len,
    task_addrs,
};
