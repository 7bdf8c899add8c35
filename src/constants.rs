//! Reference values for the lamp cluster. Everything here can be overridden
//! from the config file; these are only the defaults.

use std::net::Ipv4Addr;

/// Number of vertical stacks of nodes in the cluster.
pub const STACKS: usize = 4;
/// Number of nodes in each stack, and the pixel height of the display.
pub const ROWS: usize = 5;
/// Lamps on each node (a Blinkt! strip has 8).
pub const LAMPS: usize = 8;

/// Port every receiver node listens on.
pub const NODE_PORT: u16 = 13000;
/// Local port the controller sends from.
pub const CONTROLLER_PORT: u16 = 13001;

/// Subnet the nodes live on; hosts are numbered `10*(stack+1) + row+1`.
pub const NODE_SUBNET: Ipv4Addr = Ipv4Addr::new(192, 168, 254, 0);
/// Directed broadcast address for the node subnet.
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 254, 255);

/// Upper bound on a single datagram send.
pub const SEND_TIMEOUT_MS: u64 = 250;

/// Seconds between one-column scroll steps.
pub const SLEEP_SECONDS: f64 = 0.1;

pub const DEFAULT_FOREGROUND: &str = "white";
pub const DEFAULT_BACKGROUND: &str = "black";

/// Blinkt! LEDs are painfully bright at full power.
pub const RECEIVER_BRIGHTNESS: f32 = 0.1;

/// Largest datagram the receiver will accept.
pub const RECEIVE_BUFFER: usize = 1024;
