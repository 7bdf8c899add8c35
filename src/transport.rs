/*
 *  transport.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Node address table and UDP unicast/broadcast
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use log::{debug, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot bind UDP socket on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
    #[error("send to {addr} failed: {source}")]
    Send { addr: SocketAddr, source: io::Error },
    #[error("receive failed: {0}")]
    Receive(#[from] io::Error),
    #[error("no node at stack {stack}, row {row}")]
    NoSuchNode { stack: usize, row: usize },
}

/// Where each node lives, indexed by `(stack, row)`. Built once from
/// configuration and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTable {
    stacks: usize,
    rows: usize,
    // stack-major
    nodes: Vec<SocketAddr>,
}

impl NodeTable {
    /// Build from one address list per stack; every stack must have the
    /// same number of rows.
    pub fn from_stacks(stacks: Vec<Vec<SocketAddr>>) -> Option<Self> {
        let rows = stacks.first().map_or(0, Vec::len);
        if rows == 0 || stacks.iter().any(|s| s.len() != rows) {
            return None;
        }
        Some(NodeTable { stacks: stacks.len(), rows, nodes: stacks.concat() })
    }

    /// The cluster numbering: the node at `(stack, row)` is host
    /// `10 * (stack + 1) + row + 1` on `subnet`, so stack 0 row 0 is `.11`.
    ///
    /// Callers must keep `rows <= 9` and the largest host below 255.
    pub fn numbered(subnet: Ipv4Addr, stacks: usize, rows: usize, port: u16) -> Self {
        let [a, b, c, _] = subnet.octets();
        let nodes = (0..stacks)
            .flat_map(|stack| (0..rows).map(move |row| (stack, row)))
            .map(|(stack, row)| {
                let host = (10 * (stack + 1) + row + 1) as u8;
                SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(a, b, c, host), port))
            })
            .collect();
        NodeTable { stacks, rows, nodes }
    }

    pub fn stacks(&self) -> usize {
        self.stacks
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn get(&self, stack: usize, row: usize) -> Option<SocketAddr> {
        if stack >= self.stacks || row >= self.rows {
            return None;
        }
        self.nodes.get(stack * self.rows + row).copied()
    }

    /// `(stack, row, address)` for every node.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, SocketAddr)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(move |(i, addr)| (i / self.rows, i % self.rows, *addr))
    }
}

/// Best-effort datagram delivery to the node grid.
///
/// `Ok` means the datagram left this host, nothing more; there is no
/// acknowledgement and no retry.
pub trait Fanout: Send + Sync {
    fn unicast(&self, stack: usize, row: usize, payload: &[u8]) -> Result<(), TransportError>;
    fn broadcast(&self, payload: &[u8]) -> Result<(), TransportError>;
}

/// Open a UDP socket that can send broadcasts and rebinds immediately
/// after a restart.
pub fn open_socket(local: SocketAddr, send_timeout: Option<Duration>) -> Result<UdpSocket, TransportError> {
    let bind_err = |source| TransportError::Bind { addr: local, source };

    let socket = Socket::new(Domain::for_address(local), Type::DGRAM, Some(Protocol::UDP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.set_broadcast(true).map_err(bind_err)?;
    socket.set_write_timeout(send_timeout).map_err(bind_err)?;
    socket.bind(&local.into()).map_err(bind_err)?;
    Ok(socket.into())
}

/// The controller's view of the cluster: the node table, the broadcast
/// endpoint and the socket everything is sent from. The socket closes when
/// the grid is dropped.
#[derive(Debug)]
pub struct NodeGrid {
    table: NodeTable,
    broadcast: SocketAddr,
    mirror: Option<SocketAddr>,
    socket: UdpSocket,
}

impl NodeGrid {
    pub fn bind(
        table: NodeTable,
        broadcast: SocketAddr,
        local: SocketAddr,
        send_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let socket = open_socket(local, Some(send_timeout))?;
        info!(
            "Node grid {}x{} bound on {}, broadcast {}",
            table.stacks(),
            table.rows(),
            socket.local_addr().unwrap_or(local),
            broadcast
        );
        Ok(NodeGrid { table, broadcast, mirror: None, socket })
    }

    /// Copy every unicast to `mirror` as well, for watching traffic from a
    /// bench node.
    pub fn with_mirror(mut self, mirror: Option<SocketAddr>) -> Self {
        if let Some(addr) = mirror {
            info!("Mirroring node traffic to {}", addr);
        }
        self.mirror = mirror;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn send(&self, payload: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        self.socket
            .send_to(payload, addr)
            .map(|_| ())
            .map_err(|source| TransportError::Send { addr, source })
    }
}

impl Fanout for NodeGrid {
    fn unicast(&self, stack: usize, row: usize, payload: &[u8]) -> Result<(), TransportError> {
        let addr = self.table.get(stack, row).ok_or(TransportError::NoSuchNode { stack, row })?;
        debug!("stack {} row {} -> {}: {}", stack, row, addr, String::from_utf8_lossy(payload));
        self.send(payload, addr)?;
        if let Some(mirror) = self.mirror {
            if let Err(e) = self.send(payload, mirror) {
                warn!("Mirror {}", e);
            }
        }
        Ok(())
    }

    fn broadcast(&self, payload: &[u8]) -> Result<(), TransportError> {
        debug!("broadcast -> {}: {}", self.broadcast, String::from_utf8_lossy(payload));
        self.send(payload, self.broadcast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        socket
    }

    fn recv(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 256];
        let (n, _) = socket.recv_from(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_numbered_table_matches_cluster_layout() {
        let table = NodeTable::numbered(Ipv4Addr::new(192, 168, 254, 0), 4, 5, 13000);
        assert_eq!(table.stacks(), 4);
        assert_eq!(table.rows(), 5);
        assert_eq!(table.get(0, 0), Some("192.168.254.11:13000".parse().unwrap()));
        assert_eq!(table.get(1, 4), Some("192.168.254.25:13000".parse().unwrap()));
        assert_eq!(table.get(3, 4), Some("192.168.254.45:13000".parse().unwrap()));
        assert_eq!(table.get(4, 0), None);
        assert_eq!(table.get(0, 5), None);
        assert_eq!(table.iter().count(), 20);
        assert!(table.iter().all(|(s, r, a)| table.get(s, r) == Some(a)));
    }

    #[test]
    fn test_from_stacks_requires_rectangle() {
        let a: SocketAddr = "10.0.0.1:1".parse().unwrap();
        let b: SocketAddr = "10.0.0.2:1".parse().unwrap();
        let table = NodeTable::from_stacks(vec![vec![a], vec![b]]).unwrap();
        assert_eq!(table.get(1, 0), Some(b));
        assert!(NodeTable::from_stacks(vec![vec![a, b], vec![a]]).is_none());
        assert!(NodeTable::from_stacks(vec![]).is_none());
    }

    #[test]
    fn test_unicast_reaches_only_that_node() {
        let nodes: Vec<UdpSocket> = (0..2).map(|_| listener()).collect();
        let table = NodeTable::from_stacks(vec![
            vec![nodes[0].local_addr().unwrap()],
            vec![nodes[1].local_addr().unwrap()],
        ])
        .unwrap();
        let grid = NodeGrid::bind(table, loopback(), loopback(), Duration::from_millis(250)).unwrap();

        grid.unicast(1, 0, b"show").unwrap();
        assert_eq!(recv(&nodes[1]), "show");

        nodes[0].set_nonblocking(true).unwrap();
        let mut buf = [0u8; 16];
        assert!(nodes[0].recv_from(&mut buf).is_err());
    }

    #[test]
    fn test_unicast_unknown_node() {
        let table = NodeTable::from_stacks(vec![vec![loopback()]]).unwrap();
        let grid = NodeGrid::bind(table, loopback(), loopback(), Duration::from_millis(250)).unwrap();
        assert!(matches!(
            grid.unicast(2, 0, b"show"),
            Err(TransportError::NoSuchNode { stack: 2, row: 0 })
        ));
    }

    #[test]
    fn test_broadcast_and_mirror() {
        let node = listener();
        let everyone = listener();
        let mirror = listener();
        let table = NodeTable::from_stacks(vec![vec![node.local_addr().unwrap()]]).unwrap();
        let grid = NodeGrid::bind(table, everyone.local_addr().unwrap(), loopback(), Duration::from_millis(250))
            .unwrap()
            .with_mirror(Some(mirror.local_addr().unwrap()));

        grid.broadcast(b"off").unwrap();
        assert_eq!(recv(&everyone), "off");

        grid.unicast(0, 0, b"set,0,1,2,3").unwrap();
        assert_eq!(recv(&node), "set,0,1,2,3");
        assert_eq!(recv(&mirror), "set,0,1,2,3");
    }

    #[test]
    fn test_socket_options_set_before_bind() {
        let socket = open_socket(loopback(), Some(Duration::from_millis(250))).unwrap();
        let sock = socket2::SockRef::from(&socket);
        assert!(sock.reuse_address().unwrap());
        assert!(sock.broadcast().unwrap());
        assert!(sock.write_timeout().unwrap().is_some());

        // a second controller can take the port while the first still holds it
        let addr = socket.local_addr().unwrap();
        let second = open_socket(addr, None).unwrap();
        assert_eq!(second.local_addr().unwrap(), addr);
    }

    #[test]
    fn test_rebind_same_port() {
        let first = open_socket(loopback(), None).unwrap();
        let addr = first.local_addr().unwrap();
        drop(first);
        assert!(open_socket(addr, None).is_ok());
    }
}
