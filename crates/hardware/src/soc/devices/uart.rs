//! The polling UART: a byte-wide serial port bridged to a TCP socket.
//!
//! The receive FIFO is stored as tracked word cells, so received bytes are
//! part of history and replay like everything else. Transmitted bytes leave
//! the simulation, so each transmit marks its cycle with an I/O barrier and
//! rewinding across it is refused.
//!
//! Register block (word-aligned):
//! - `+0x0` status: read `[0]`=RX available, `[1]`=TX busy; write clears the FIFO
//! - `+0x4` rxdata: read-only, pops one byte
//! - `+0x8` txdata: write-only, sends one byte

use crate::common::{Fault, Stage};
use crate::core::machine::SharedMachine;
use crate::core::state::{CellId, StateLog};
use crate::soc::memmap::{MemMap, ReadHandler, WriteHandler};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// FIFO capacity in bytes (one tracked word per byte).
pub const BUF_WORDS: usize = 16;

/// Status bit: a received byte is waiting.
pub const STATUS_RX_AVAIL: u32 = 1 << 0;
/// Status bit: no client connected, transmits will be dropped.
pub const STATUS_TX_BUSY: u32 = 1 << 1;

/// Sentinel head value meaning the FIFO is empty.
const EMPTY: u32 = 0xFFFF_FFFF;

const ACCEPT_POLL: Duration = Duration::from_millis(100);
const BAUD_SLEEP: Duration = Duration::from_millis(1);

const WELCOME: &str = "\
>>MSG<< You are now connected to the UART polling device\n\
>>MSG<< Lines prefixed with '>>MSG<<' are sent from this\n\
>>MSG<< UART <--> network bridge, not the connected device\n\
>>MSG<< To send a message, simply type and press the return key\n\
>>MSG<< All characters, up to and including the \\n will be sent\n";

const GOODBYE: &str = "\
\n\
>>MSG<< The polling UART device has shut down. Good bye.\n";

/// State shared between the register handlers and the bridge thread.
#[derive(Debug)]
pub struct UartShared {
    client: Mutex<Option<TcpStream>>,
    shutdown: AtomicBool,
}

impl UartShared {
    fn client_connected(&self) -> bool {
        self.lock_client().is_some()
    }

    fn lock_client(&self) -> std::sync::MutexGuard<'_, Option<TcpStream>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Asks the bridge thread to exit at its next poll.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug)]
struct UartCells {
    buf: CellId,
    head: CellId,
    tail: CellId,
}

/// The polling UART device.
#[derive(Clone, Debug)]
pub struct PollUart {
    base: u32,
    cells: UartCells,
    shared: Arc<UartShared>,
}

impl PollUart {
    /// Allocates the FIFO and index cells.
    pub fn new(log: &mut StateLog, base: u32) -> Self {
        let cells = UartCells {
            buf: log.alloc_cells("uart_buf", BUF_WORDS, 0),
            head: log.alloc_cell("uart_head", EMPTY),
            tail: log.alloc_cell("uart_tail", 0),
        };
        Self {
            base,
            cells,
            shared: Arc::new(UartShared {
                client: Mutex::new(None),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// The shared handle the driver uses to shut the bridge down.
    pub fn shared(&self) -> Arc<UartShared> {
        Arc::clone(&self.shared)
    }

    /// Registers the three registers with their natural access kinds, so the
    /// memory map itself refuses reads of txdata and writes of rxdata.
    pub fn register(&self, map: &mut MemMap) -> Result<(), Fault> {
        let status = self.base;
        let rxdata = self.base + 4;
        let txdata = self.base + 8;
        map.register_read_word(status, status + 4, Box::new(self.clone()))?;
        map.register_write_word(status, status + 4, Box::new(self.clone()))?;
        map.register_read_word(rxdata, rxdata + 4, Box::new(RxData(self.cells)))?;
        map.register_write_word(txdata, txdata + 4, Box::new(TxData(Arc::clone(&self.shared))))
    }

    /// Spawns the TCP bridge thread.
    pub fn spawn_bridge(
        &self,
        machine: SharedMachine,
        port: u16,
    ) -> std::io::Result<JoinHandle<()>> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        info!(
            port = listener.local_addr().map(|a| a.port()).unwrap_or(port),
            "UART listening (use `nc -4 localhost <port>` to communicate)"
        );
        let shared = Arc::clone(&self.shared);
        let cells = self.cells;
        Ok(thread::Builder::new()
            .name("uart-bridge".into())
            .spawn(move || bridge_loop(&listener, &shared, &machine, cells))?)
    }
}

// Status register: read composes the two bits live, write clears the FIFO.
impl ReadHandler for PollUart {
    fn read_word(&self, log: &mut StateLog, _addr: u32) -> Result<u32, Fault> {
        let mut status = 0;
        if log.get(self.cells.head) != EMPTY {
            status |= STATUS_RX_AVAIL;
        }
        if !self.shared.client_connected() {
            status |= STATUS_TX_BUSY;
        }
        Ok(status)
    }
}

impl WriteHandler for PollUart {
    fn write_word(
        &self,
        log: &mut StateLog,
        _stage: Stage,
        _addr: u32,
        _val: u32,
    ) -> Result<(), Fault> {
        log.write_async(Stage::Unknown, self.cells.head, EMPTY);
        log.write_async(Stage::Unknown, self.cells.tail, 0);
        Ok(())
    }
}

struct RxData(UartCells);

impl ReadHandler for RxData {
    fn read_word(&self, log: &mut StateLog, _addr: u32) -> Result<u32, Fault> {
        let head = log.get(self.0.head);
        if head == EMPTY {
            debug!("UART RX read while RX pending was false");
            // Reads of an empty FIFO return stale buffer contents; slot 3
            // matches the original hardware's observed behavior.
            return Ok(log.get(self.0.buf.offset(3)) & 0xFF);
        }
        let val = log.get(self.0.buf.offset(head as usize)) & 0xFF;
        let next = (head as usize + 1) % BUF_WORDS;
        let tail = log.get(self.0.tail) as usize;
        let new_head = if next == tail { EMPTY } else { next as u32 };
        log.write_async(Stage::Unknown, self.0.head, new_head);
        Ok(val)
    }
}

struct TxData(Arc<UartShared>);

impl WriteHandler for TxData {
    fn write_word(
        &self,
        log: &mut StateLog,
        _stage: Stage,
        _addr: u32,
        val: u32,
    ) -> Result<(), Fault> {
        let mut client = self.0.lock_client();
        match client.as_mut() {
            None => {
                // No connected client (TX is busy); the byte is dropped.
                debug!("UART TX ignored as client is busy");
            }
            Some(stream) => {
                if stream.write_all(&[val as u8]).is_err() {
                    warn!("lost connection to UART client");
                    *client = None;
                } else {
                    drop(client);
                    // The byte is on the wire; this cycle can never be
                    // rewound across.
                    log.mark_io_barrier();
                }
            }
        }
        Ok(())
    }
}

fn bridge_loop(
    listener: &TcpListener,
    shared: &Arc<UartShared>,
    machine: &SharedMachine,
    cells: UartCells,
) {
    loop {
        let stream = loop {
            match listener.accept() {
                Ok((stream, _)) => break stream,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if shared.shutting_down() {
                        info!("polling UART device shut down");
                        return;
                    }
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    warn!(error = %e, "UART accept failed");
                    return;
                }
            }
        };

        info!("UART connected");
        let mut rx = stream;
        if rx.write_all(WELCOME.as_bytes()).is_err() || rx.set_nonblocking(true).is_err() {
            continue;
        }
        if let Ok(tx) = rx.try_clone() {
            *shared.lock_client() = Some(tx);
        }

        let mut byte = [0u8; 1];
        loop {
            thread::sleep(BAUD_SLEEP);
            if shared.shutting_down() {
                let _ = rx.write_all(GOODBYE.as_bytes());
                *shared.lock_client() = None;
                info!("polling UART device shut down");
                return;
            }
            match rx.read(&mut byte) {
                Ok(0) => {
                    info!("UART client has closed connection");
                    break;
                }
                Ok(_) => {
                    let mut m = machine.lock();
                    let log = &mut m.log;
                    let tail = log.get(cells.tail) as usize;
                    log.write_async(Stage::Unknown, cells.buf.offset(tail), u32::from(byte[0]));
                    if log.get(cells.head) == EMPTY {
                        log.write_async(Stage::Unknown, cells.head, tail as u32);
                    }
                    log.write_async(Stage::Unknown, cells.tail, ((tail + 1) % BUF_WORDS) as u32);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    warn!(error = %e, "lost connection to UART client");
                    break;
                }
            }
        }
        *shared.lock_client() = None;
    }
}
