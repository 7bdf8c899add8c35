/*
 *  receiver.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Node side of the wire protocol: decode datagrams, drive the lamps
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

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::UdpSocket;

use crate::Flow;
use crate::constants::RECEIVE_BUFFER;
use crate::lamps::{LampDriver, LampError};
use crate::protocol::{Message, ProtocolError};
use crate::transport::{TransportError, open_socket};

/// Bind the node's listening socket.
pub fn bind(addr: SocketAddr) -> Result<UdpSocket, TransportError> {
    let bind_err = |source| TransportError::Bind { addr, source };
    let socket = open_socket(addr, None)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    let socket = UdpSocket::from_std(socket).map_err(bind_err)?;
    info!("Receiver listening on {}", socket.local_addr().unwrap_or(addr));
    Ok(socket)
}

const RETRY_FIRST: Duration = Duration::from_millis(50);
const RETRY_LIMIT: Duration = Duration::from_secs(2);

/// Delay before retrying a failed receive, doubling while the failures keep
/// coming and starting over after a good datagram.
#[derive(Debug, Default)]
struct Backoff {
    delay: Option<Duration>,
}

impl Backoff {
    fn fail(&mut self) -> Duration {
        let delay = match self.delay {
            None => RETRY_FIRST,
            Some(d) => (d * 2).min(RETRY_LIMIT),
        };
        self.delay = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.delay = None;
    }
}

/// One node's receive loop state. There is no "shown" state: `set` stages,
/// `show` flushes whatever is staged, every time.
pub struct Receiver<D: LampDriver> {
    lamps: D,
    handled: u64,
    discarded: u64,
}

impl<D: LampDriver> Receiver<D> {
    pub fn new(lamps: D) -> Self {
        Receiver { lamps, handled: 0, discarded: 0 }
    }

    pub fn lamps(&self) -> &D {
        &self.lamps
    }

    /// Datagrams applied so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Datagrams rejected as malformed or unknown.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Decode and apply one datagram. Bad datagrams are logged and dropped.
    pub fn handle(&mut self, datagram: &[u8]) -> Flow {
        let message = match Message::decode(datagram, self.lamps.lamp_count()) {
            Ok(message) => message,
            Err(ProtocolError::UnknownCommand(command)) => {
                warn!("unknown command {:?}", command);
                self.discarded += 1;
                return Flow::Continue;
            }
            Err(e) => {
                warn!("Discarding datagram: {}", e);
                self.discarded += 1;
                return Flow::Continue;
            }
        };

        self.handled += 1;
        match self.apply(message) {
            Ok(flow) => flow,
            Err(e) => {
                warn!("Lamp driver: {}", e);
                Flow::Continue
            }
        }
    }

    fn apply(&mut self, message: Message) -> Result<Flow, LampError> {
        match message {
            Message::Set(updates) => {
                for update in updates {
                    self.lamps.set_pixel(update.index, update.rgb)?;
                }
            }
            Message::Show => self.lamps.show()?,
            Message::Off => {
                self.lamps.clear()?;
                self.lamps.show()?;
            }
            Message::Shutdown => {
                info!("Shutdown received");
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    /// Handle datagrams one at a time until a `shutdown` arrives.
    ///
    /// Receive errors are reported and the loop carries on after a pause.
    pub async fn run(&mut self, socket: &UdpSocket) {
        let mut buf = vec![0u8; RECEIVE_BUFFER.max(self.lamps.lamp_count() * 16 + 8)];
        let mut backoff = Backoff::default();
        loop {
            let (len, from) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    let delay = backoff.fail();
                    warn!("{}, retrying in {:?}", TransportError::Receive(e), delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };
            backoff.reset();
            debug!("{} <- {}", String::from_utf8_lossy(&buf[..len]), from);
            if self.handle(&buf[..len]) == Flow::Stop {
                break;
            }
        }
        info!("Receiver stopped after {} messages ({} discarded)", self.handled, self.discarded);
    }
}
