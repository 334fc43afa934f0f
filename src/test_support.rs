//! Scripted bus transport shared by the driver and poller tests: records
//! every write frame and answers reads from a queue of canned responses.

use std::collections::VecDeque;

use crate::bus::BusTransport;
use crate::errors::TransportError;

pub(crate) struct ScriptedBus {
    /// Write frames that reached the bus, in order.
    pub writes: Vec<Vec<u8>>,
    /// Total write transactions attempted, including failed ones.
    pub write_attempts: usize,
    /// Canned responses handed out per read transaction.
    pub reads: VecDeque<Vec<u8>>,
    /// Fail this many upcoming write transactions before succeeding again.
    pub fail_next_writes: usize,
    /// Re-enqueue each canned response after use, for steady-state runs.
    pub cycle_reads: bool,
}

impl ScriptedBus {
    pub fn new() -> Self {
        Self {
            writes: Vec::new(),
            write_attempts: 0,
            reads: VecDeque::new(),
            fail_next_writes: 0,
            cycle_reads: false,
        }
    }

    pub fn push_read(&mut self, response: Vec<u8>) {
        self.reads.push_back(response);
    }
}

impl BusTransport for ScriptedBus {
    fn transact(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), TransportError> {
        if !write.is_empty() {
            self.write_attempts += 1;
            if self.fail_next_writes > 0 {
                self.fail_next_writes = self.fail_next_writes.saturating_sub(1);
                return Err(TransportError::Unavailable("write not acknowledged".into()));
            }
            self.writes.push(write.to_vec());
        }
        if !read.is_empty() {
            let canned = self
                .reads
                .pop_front()
                .ok_or_else(|| TransportError::Unavailable("no canned response left".into()))?;
            read.copy_from_slice(&canned);
            if self.cycle_reads {
                self.reads.push_back(canned);
            }
        }
        Ok(())
    }
}
