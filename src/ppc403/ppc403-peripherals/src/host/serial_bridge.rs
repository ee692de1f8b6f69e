use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use log::{debug, info, trace, warn};

use ppc403_core::periph::{SerialRx, SerialTx};

use crate::utils::format_bytes;

/// Bridges the serial port to one TCP client at a time. Bytes sent while no
/// client is connected are queued and flushed to the next one.
pub struct SerialBridge {
    local_addr: SocketAddr,
    tx: SerialBridgeTx,
    rx: SerialBridgeRx,
}

/// Transmit half, plugged into the core as its `SerialTx`
pub struct SerialBridgeTx {
    outgoing: Sender<u8>,
}

/// Receive half. The board polls `try_recv` for byte-at-a-time delivery;
/// receive DMA pulls through `SerialRx`.
pub struct SerialBridgeRx {
    incoming: Receiver<u8>,
}

// Accepts clients and forwards queued transmit bytes to the current one
fn bridge_thread(listener: TcpListener, outgoing: Receiver<u8>, incoming: Sender<u8>) {
    // Byte whose write failed, sent first to the next client
    let mut pending = None;

    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Serial bridge accept failed: {}", e);
                continue;
            }
        };
        info!("Serial client connected: {:?}", stream.peer_addr());
        let _ = stream.set_nodelay(true);

        match stream.try_clone() {
            Ok(reader) => {
                let incoming = incoming.clone();
                std::thread::spawn(move || reader_thread(reader, incoming));
            }
            Err(e) => {
                warn!("Serial bridge could not split stream: {}", e);
                continue;
            }
        }

        if !forward(&outgoing, &mut pending, &mut stream) {
            // Transmit half dropped, emulation is gone
            return;
        }
        info!("Serial client disconnected");
    }
}

/// Copy transmit bytes into `sink` until a write fails (true, the byte is
/// left in `pending`) or the transmit half is dropped (false)
fn forward<W: Write>(outgoing: &Receiver<u8>, pending: &mut Option<u8>, sink: &mut W) -> bool {
    loop {
        let byte = match pending.take() {
            Some(byte) => byte,
            None => match outgoing.recv() {
                Ok(byte) => byte,
                Err(_) => return false,
            },
        };
        if sink.write_all(&[byte]).is_err() {
            *pending = Some(byte);
            return true;
        }
    }
}

fn reader_thread(mut stream: TcpStream, incoming: Sender<u8>) {
    let mut buf = [0u8; 256];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        trace!("Serial rx: {}", format_bytes(&buf[..n]));
        for byte in &buf[..n] {
            if incoming.send(*byte).is_err() {
                return;
            }
        }
    }
}

impl SerialBridge {
    /// Listen on `addr` and start the bridge thread
    pub fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let (out_tx, out_rx) = unbounded();
        let (in_tx, in_rx) = unbounded();

        std::thread::spawn(move || bridge_thread(listener, out_rx, in_tx));
        info!("Serial bridge listening on {}", local_addr);

        Ok(SerialBridge {
            local_addr,
            tx: SerialBridgeTx { outgoing: out_tx },
            rx: SerialBridgeRx { incoming: in_rx },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn split(self) -> (SerialBridgeTx, SerialBridgeRx) {
        (self.tx, self.rx)
    }
}

impl SerialTx for SerialBridgeTx {
    fn transmit(&mut self, data: u8) {
        if self.outgoing.send(data).is_err() {
            debug!("Serial bridge closed, dropping 0x{:02X}", data);
        }
    }
}

impl SerialBridgeRx {
    /// Next received byte, if one is waiting
    pub fn try_recv(&self) -> Option<u8> {
        match self.incoming.try_recv() {
            Ok(byte) => Some(byte),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl SerialRx for SerialBridgeRx {
    /// Fill from whatever has arrived. The line idles at zero, so a short
    /// read leaves the tail of the block cleared.
    fn receive_block(&mut self, buf: &mut [u8]) {
        let mut received = 0;
        for slot in buf.iter_mut() {
            *slot = match self.try_recv() {
                Some(byte) => {
                    received += 1;
                    byte
                }
                None => 0,
            };
        }
        if received < buf.len() {
            debug!("Serial receive block short: {} of {} bytes", received, buf.len());
        }
    }
}
