//! In-memory loopback transport
//!
//! The transport half is owned by the session; the [`LoopbackHandle`]
//! is the far end of the wire. Tests use it to inject received bytes,
//! inspect what was written and simulate device faults.

use super::{LineConfig, Transport, TransportError, TransportType};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
struct LoopbackState {
    open: bool,
    active: Option<LineConfig>,
    /// Device → host bytes not yet read
    rx: VecDeque<u8>,
    /// Host → device bytes, in write order
    written: Vec<u8>,
    /// Copy written bytes back into `rx`
    echo: bool,
    fail_open: Option<String>,
    unplugged: bool,
    write_timeout: bool,
    reject_writes: bool,
}

/// Loopback transport
#[derive(Debug)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
}

/// Far end of a [`LoopbackTransport`]
#[derive(Debug, Clone)]
pub struct LoopbackHandle {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackTransport {
    /// Create a connected transport/handle pair
    pub fn pair() -> (Self, LoopbackHandle) {
        let state = Arc::new(Mutex::new(LoopbackState::default()));
        (
            Self {
                state: state.clone(),
            },
            LoopbackHandle { state },
        )
    }

    /// Create a transport that echoes every write back as received data
    pub fn echo() -> (Self, LoopbackHandle) {
        let (transport, handle) = Self::pair();
        handle.set_echo(true);
        (transport, handle)
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self, config: &LineConfig) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_open.clone() {
            state.open = false;
            state.active = None;
            return Err(TransportError::ConnectionFailed(reason));
        }
        state.open = true;
        state.unplugged = false;
        state.active = Some(config.clone());
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.open = false;
        state.active = None;
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        let state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.unplugged {
            return Err(TransportError::Disconnected(port_of(&state)));
        }
        Ok(state.rx.len())
    }

    fn read(&mut self, max: usize) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.unplugged {
            return Err(TransportError::Disconnected(port_of(&state)));
        }
        let n = max.min(state.rx.len());
        let data: Vec<u8> = state.rx.drain(..n).collect();
        Ok(Bytes::from(data))
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.unplugged {
            return Err(TransportError::Disconnected(port_of(&state)));
        }
        if state.write_timeout {
            return Err(TransportError::Timeout);
        }
        if state.reject_writes {
            return Err(TransportError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "payload rejected by device",
            )));
        }
        state.written.extend_from_slice(data);
        if state.echo {
            state.rx.extend(data.iter().copied());
        }
        Ok(())
    }

    fn active_config(&self) -> Option<LineConfig> {
        self.state.lock().active.clone()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Loopback
    }
}

fn port_of(state: &LoopbackState) -> String {
    state
        .active
        .as_ref()
        .map(|c| c.port.clone())
        .unwrap_or_default()
}

impl LoopbackHandle {
    /// Queue bytes as if the device had sent them
    pub fn push_rx(&self, data: &[u8]) {
        self.state.lock().rx.extend(data.iter().copied());
    }

    /// Bytes queued for the host and not yet read
    pub fn pending_rx(&self) -> usize {
        self.state.lock().rx.len()
    }

    /// Everything written by the host so far
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Take and clear everything written by the host so far
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().written)
    }

    /// Echo writes back to the host
    pub fn set_echo(&self, echo: bool) {
        self.state.lock().echo = echo;
    }

    /// Make subsequent opens fail with `reason`; `None` clears the fault
    pub fn fail_open(&self, reason: Option<&str>) {
        self.state.lock().fail_open = reason.map(str::to_string);
    }

    /// Simulate the device being unplugged; cleared by the next open
    pub fn unplug(&self) {
        self.state.lock().unplugged = true;
    }

    /// Make writes time out
    pub fn set_write_timeout(&self, timeout: bool) {
        self.state.lock().write_timeout = timeout;
    }

    /// Make writes fail as rejected payloads
    pub fn set_reject_writes(&self, reject: bool) {
        self.state.lock().reject_writes = reject;
    }

    /// Whether the transport side is open
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Configuration the transport side was opened with
    pub fn active_config(&self) -> Option<LineConfig> {
        self.state.lock().active.clone()
    }
}
