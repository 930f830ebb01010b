use std::fs::File;
use std::os::fd::FromRawFd;

use libc::epoll_event;

use super::{Poller, Token, MAX_READY};

#[test]
fn test_token_roundtrip() {
    assert_eq!(Token::decode(Token::Hotplug.encode()), Token::Hotplug);
    for (slot, gen) in [(0, 0), (127, 1), (3, u32::MAX)] {
        let token = Token::Device { slot, gen };
        assert_eq!(Token::decode(token.encode()), token);
    }
}

fn pipe() -> (File, File) {
    let mut fds = [0; 2];
    assert_eq!(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) }, 0);
    unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
}

#[test]
fn test_wait_reports_ready_token() {
    let poller = Poller::new().unwrap();
    let (rx, tx) = pipe();
    let token = Token::Device { slot: 5, gen: 2 };
    poller.add(&rx, token).unwrap();

    let mut buf = [epoll_event { events: 0, u64: 0 }; MAX_READY];
    assert!(poller.wait(&mut buf, 0).unwrap().is_empty());

    assert_eq!(unsafe { libc::write(std::os::fd::AsRawFd::as_raw_fd(&tx), b"x".as_ptr() as _, 1) }, 1);
    let ready = poller.wait(&mut buf, 1000).unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(Token::decode(ready[0].u64), token);

    poller.del(&rx).unwrap();
    let mut buf = [epoll_event { events: 0, u64: 0 }; MAX_READY];
    assert!(poller.wait(&mut buf, 0).unwrap().is_empty());
}
