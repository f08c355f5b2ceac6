pub mod batch;
pub mod driver;
pub mod ident;
pub mod interval;
pub mod network;
pub mod node;
pub mod reference;
pub mod replication;
pub mod report;
pub mod routing;
pub mod simulation;
pub mod statistic;
pub mod theory;
pub mod time;
pub mod units;
pub mod variate;

pub use batch::{BatchMeans, BatchOutcome};
pub use driver::{read_config, run, Config, Error, Mode, Outcome};
pub use ident::{NodeId, StreamId};
pub use network::{ConfigError, Network, NodeDesc};
pub use replication::{ReplicationOutcome, Replications, Reseed};
pub use report::Report;
pub use routing::{Destination, Row, RoutingTable};
pub use simulation::{CalendarExhausted, Simulation};
pub use statistic::{Degenerate, Statistic};
pub use time::{Delta, Time};
pub use variate::{MultiStream, Sampler, Variate, VariateSource};
