use crate::address;
use crate::cache::{BlockRef, Command, MissHandler};

static LOGGER: std::sync::Once = std::sync::Once::new();

pub fn init_logging() {
    LOGGER.call_once(|| {
        env_logger::builder().is_test(true).init();
    });
}

/// A miss handler call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Call {
    pub cmd: Command,
    pub block_addr: address,
    pub now: u64,
}

/// Miss handler with a fixed latency that records every call.
///
/// Reads fill the block data (if any) with the low bytes of the
/// addresses it covers.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub latency: u64,
    pub calls: Vec<Call>,
}

impl Recorder {
    #[must_use]
    pub fn new(latency: u64) -> Self {
        Self {
            latency,
            calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn writes(&self) -> Vec<address> {
        self.calls
            .iter()
            .filter(|call| call.cmd == Command::WRITE)
            .map(|call| call.block_addr)
            .collect()
    }

    #[must_use]
    pub fn reads(&self) -> Vec<address> {
        self.calls
            .iter()
            .filter(|call| call.cmd == Command::READ)
            .map(|call| call.block_addr)
            .collect()
    }
}

impl MissHandler for Recorder {
    fn access(
        &mut self,
        cmd: Command,
        block_addr: address,
        _block_size: u32,
        block: BlockRef<'_>,
        now: u64,
    ) -> u64 {
        self.calls.push(Call {
            cmd,
            block_addr,
            now,
        });
        if let (Command::READ, Some(data)) = (cmd, block.data) {
            for (i, byte) in data.iter_mut().enumerate() {
                *byte = (block_addr as usize + i) as u8;
            }
        }
        self.latency
    }
}
