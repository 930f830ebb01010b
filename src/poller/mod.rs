#[cfg(test)]
mod test;

use std::fs::File;
use std::io::Result;

use libc::epoll_event;

use crate::ffi::syscall;

/// Ready endpoints handled per wait.
pub(crate) const MAX_READY: usize = 16;

/// Upper bound on one wait in milliseconds. Also bounds how long the
/// acquisition thread takes to notice the stop flag.
pub(crate) const WAIT_MS: i32 = 50;

/// Discriminator carried in the readiness payload. Resolving a wake-up to
/// its owner is a slot lookup, not a scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Token {
    /// The hotplug notification source.
    Hotplug,
    /// A registry slot plus the generation it was attached under.
    Device { slot: u32, gen: u32 },
}

const HOTPLUG: u64 = u64::MAX;

impl Token {
    pub fn encode(self) -> u64 {
        match self {
            // Device slots are bounded far below u32::MAX, so the sentinel
            // cannot collide with an encoded slot/generation pair.
            Token::Hotplug => HOTPLUG,
            Token::Device { slot, gen } => ((gen as u64) << 32) | slot as u64,
        }
    }

    pub fn decode(raw: u64) -> Self {
        if raw == HOTPLUG {
            Token::Hotplug
        } else {
            Token::Device {
                slot: raw as u32,
                gen: (raw >> 32) as u32,
            }
        }
    }
}

/// Readiness multiplexer over all endpoint handles plus the hotplug
/// notification source. A thin adapter over epoll; it does not parse
/// anything.
pub(crate) struct Poller {
    epoll: File,
}

impl Poller {
    pub fn new() -> Result<Self> {
        Ok(Self {
            epoll: syscall::epoll_create1(libc::EPOLL_CLOEXEC)?,
        })
    }

    pub fn add(&self, file: &File, token: Token) -> Result<()> {
        let mut ev = epoll_event {
            events: libc::EPOLLIN as u32,
            u64: token.encode(),
        };
        syscall::epoll_ctl(&self.epoll, libc::EPOLL_CTL_ADD, file, &mut ev)
    }

    pub fn del(&self, file: &File) -> Result<()> {
        syscall::epoll_del(&self.epoll, file)
    }

    /// Waits up to `timeout_ms` for readiness and returns the ready set.
    pub fn wait<'a>(
        &self,
        events: &'a mut [epoll_event],
        timeout_ms: i32,
    ) -> Result<&'a [epoll_event]> {
        syscall::epoll_wait(&self.epoll, events, timeout_ms)
    }
}
