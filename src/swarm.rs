//! Docker Swarm address discovery.
//!
//! Resolves either the advertised addresses of swarm nodes or the overlay
//! addresses of a service's running tasks.
//!
//! # How It Works
//!
//! 1. Checks the request is addressed to the `dockerswarm` provider
//! 2. Builds a [`DockerClient`] for the configured host, owned by the call
//! 3. Dispatches on the `type` argument to the node or service pipeline
//! 4. Filters the listed nodes or tasks and returns their addresses in
//!    list order, without duplicates
//!
//! # Example
//!
//! ```ignore
//! use dockerswarm_discover::{Args, Discover, Provider};
//!
//! let args: Args = "provider=dockerswarm type=service namespace=shop service=web network=backend"
//!     .parse()?;
//! let addrs = Provider.addrs(&args).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use crate::args::Args;
use crate::client::{DockerClient, SwarmApi, select_host};
use crate::error::{Error, Result, TransportError};
use crate::model::{Node, NodeAvailability, NodeState, Task, TaskState};

/// Boxed future returned by [`Discover::addrs`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A discovery backend the host framework selects by name.
pub trait Discover {
    /// Registered provider name, matched against the `provider` argument.
    fn name(&self) -> &'static str;

    /// Documentation of the arguments this provider understands.
    fn help(&self) -> &'static str;

    /// Resolves `args` to a list of addresses.
    fn addrs<'a>(&'a self, args: &'a Args) -> BoxFuture<'a, Result<Vec<String>>>;
}

const HELP: &str = r#"Docker Swarm:

    provider:         "dockerswarm"
    host:             "tcp://host:port", "http(s)://host:port" or "unix:///path/to/socket"
                      (defaults to "unix:///var/run/docker.sock").

    type:             "node"
    role:             "manager", "worker" or "all" (defaults to "all").

    type:             "service"
    namespace:        Namespace to search for services (defaults to "default").
    service:          Service name to search for (required).
    network:          Network to take task addresses from, resolved as
                      "{namespace}_{network}" (defaults to "{namespace}_default").
    host_network:     "true" to return the addresses of the nodes running the
                      service's tasks instead of overlay addresses (defaults to "false").
"#;

/// Which pipeline a request selects through the `type` argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryType {
    /// Swarm node addresses.
    Node,
    /// Task addresses of one service.
    Service,
}

impl FromStr for DiscoveryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "node" => Ok(Self::Node),
            "service" => Ok(Self::Service),
            other => Err(Error::InvalidDiscoveryType(other.to_string())),
        }
    }
}

impl fmt::Display for DiscoveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Node => "node",
            Self::Service => "service",
        })
    }
}

/// The Docker Swarm discovery provider.
#[derive(Clone, Copy, Debug, Default)]
pub struct Provider;

impl Provider {
    /// Name this provider is registered under.
    pub const NAME: &'static str = "dockerswarm";

    /// Documentation of the recognized arguments and their defaults.
    #[must_use]
    pub fn help() -> &'static str {
        HELP
    }

    /// Resolves `args` against an existing client instead of building one.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidProvider`] before any request is made when `provider`
    /// is not `dockerswarm`, then any error of the selected pipeline.
    pub async fn addrs_with<C: SwarmApi>(client: &C, args: &Args) -> Result<Vec<String>> {
        check_provider(args)?;
        dispatch(client, args).await
    }

    async fn resolve(args: &Args) -> Result<Vec<String>> {
        check_provider(args)?;

        let host = select_host(args.host());
        let client = match DockerClient::new(&host) {
            Ok(client) => client,
            Err(source) => return Err(Error::ClientConstructionFailed { host, source }),
        };

        // The client is dropped on every return path below.
        dispatch(&client, args).await
    }
}

impl Discover for Provider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn help(&self) -> &'static str {
        HELP
    }

    fn addrs<'a>(&'a self, args: &'a Args) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(Self::resolve(args))
    }
}

fn check_provider(args: &Args) -> Result<()> {
    match args.provider() {
        Provider::NAME => Ok(()),
        other => Err(Error::InvalidProvider(other.to_string())),
    }
}

async fn dispatch<C: SwarmApi>(client: &C, args: &Args) -> Result<Vec<String>> {
    match args.discovery_type().parse::<DiscoveryType>()? {
        DiscoveryType::Node => node_addrs(client, args).await,
        DiscoveryType::Service => service_addrs(client, args).await,
    }
}

fn upstream(operation: &'static str) -> impl FnOnce(TransportError) -> Error {
    move |source| Error::UpstreamQueryFailed { operation, source }
}

/// Returns the advertised addresses of ready, active nodes.
///
/// The `role` argument (`manager`, `worker` or `all`) is applied server-side.
///
/// # Errors
///
/// [`Error::UpstreamQueryFailed`] when the node list cannot be fetched.
pub async fn node_addrs<C: SwarmApi>(client: &C, args: &Args) -> Result<Vec<String>> {
    let nodes = client
        .list_nodes(args.role())
        .await
        .map_err(upstream("list nodes"))?;

    Ok(eligible_node_addrs(&nodes))
}

fn eligible_node_addrs(nodes: &[Node]) -> Vec<String> {
    let mut addrs = Vec::new();

    for node in nodes {
        let hostname = &node.description.hostname;

        if node.status.state != NodeState::Ready {
            tracing::debug!("discover-dockerswarm: ignoring node {hostname:?}, not ready state");
            continue;
        }

        if node.spec.availability != NodeAvailability::Active {
            tracing::debug!(
                "discover-dockerswarm: ignoring node {hostname:?}, not active availability"
            );
            continue;
        }

        addrs.push(node.status.addr.clone());
    }

    addrs
}

/// Returns the addresses of a service's running tasks.
///
/// With `host_network=true` these are the advertised addresses of the nodes
/// the tasks run on; otherwise see [`task_addrs`].
///
/// # Errors
///
/// [`Error::MissingServiceName`] or [`Error::InvalidArgument`] before any
/// request is made, [`Error::UpstreamQueryFailed`] when listing fails.
pub async fn service_addrs<C: SwarmApi>(client: &C, args: &Args) -> Result<Vec<String>> {
    let service = args.qualified_service()?;
    let host_network = args.host_network()?;

    let tasks = client
        .list_tasks(&service)
        .await
        .map_err(upstream("list tasks"))?;

    if host_network {
        let nodes = client
            .list_nodes(None)
            .await
            .map_err(upstream("list nodes"))?;

        return host_addrs(&tasks, &nodes, args);
    }

    task_addrs(&tasks, args)
}

/// Extracts overlay addresses from `tasks`.
///
/// Only running tasks count, and only their attachments to the network named
/// `{namespace}_{network}`. Addresses have their CIDR suffix removed and are
/// returned in first-seen order without duplicates. The service name is
/// validated here as well so the function can be used on its own.
///
/// # Errors
///
/// [`Error::MissingServiceName`] when `service` is empty.
pub fn task_addrs(tasks: &[Task], args: &Args) -> Result<Vec<String>> {
    if args.get("namespace").is_empty() {
        tracing::debug!("discover-dockerswarm: using default namespace");
    }

    let service = args.qualified_service()?;

    if args.get("network").is_empty() {
        tracing::debug!("discover-dockerswarm: using default network");
    }

    let network_selector = args.network_selector();
    let mut addrs: Vec<String> = Vec::new();

    for task in tasks {
        if task.status.state != TaskState::Running {
            tracing::debug!(
                "discover-dockerswarm: ignoring task {:?}, not running state",
                task.display_name(&service)
            );
            continue;
        }

        let attachments = task
            .networks_attachments
            .iter()
            .filter(|attachment| attachment.network.spec.name == network_selector);

        for attachment in attachments {
            for addr in &attachment.addresses {
                let addr = strip_prefix_len(addr);
                if !addrs.iter().any(|known| known == addr) {
                    addrs.push(addr.to_string());
                }
            }
        }
    }

    Ok(addrs)
}

/// Returns the addresses of the nodes running `tasks`, deduplicated.
fn host_addrs(tasks: &[Task], nodes: &[Node], args: &Args) -> Result<Vec<String>> {
    let service = args.qualified_service()?;
    let mut addrs: Vec<String> = Vec::new();

    for task in tasks {
        if task.status.state != TaskState::Running {
            tracing::debug!(
                "discover-dockerswarm: ignoring task {:?}, not running state",
                task.display_name(&service)
            );
            continue;
        }

        let Some(node) = nodes.iter().find(|node| node.id == task.node_id) else {
            tracing::debug!(
                "discover-dockerswarm: ignoring task {:?}, node {:?} not found",
                task.display_name(&service),
                task.node_id
            );
            continue;
        };

        if !addrs.contains(&node.status.addr) {
            addrs.push(node.status.addr.clone());
        }
    }

    Ok(addrs)
}

/// Removes a CIDR prefix length: `10.0.0.5/24` becomes `10.0.0.5`.
///
/// Addresses without a `/` are returned unchanged.
#[must_use]
pub fn strip_prefix_len(addr: &str) -> &str {
    addr.split_once('/').map_or(addr, |(ip, _)| ip)
}
