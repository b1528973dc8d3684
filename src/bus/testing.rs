//! In-memory transport for tests

use std::cell::RefCell;
use std::rc::Rc;

use super::transport::{Method, Ticket, Token, Transport};

/// Everything a `FakeTransport` was asked to do
#[derive(Debug, Default)]
pub struct FakeLog {
    pub calls: Vec<Ticket>,
    pub subscribed: Vec<Token>,
    pub watched: Vec<Token>,
    pub unregistered: Vec<Token>,
}

impl FakeLog {
    pub fn count(&self, method: Method) -> usize {
        self.calls.iter().filter(|t| t.method == method).count()
    }

    pub fn last_call(&self) -> Option<Ticket> {
        self.calls.last().copied()
    }
}

/// Records requests; replies and signals are injected by the test
pub struct FakeTransport {
    log: Rc<RefCell<FakeLog>>,
}

impl FakeTransport {
    pub fn new() -> (Self, Rc<RefCell<FakeLog>>) {
        let log = Rc::new(RefCell::new(FakeLog::default()));
        (
            Self {
                log: Rc::clone(&log),
            },
            log,
        )
    }
}

impl Transport for FakeTransport {
    fn call(&self, ticket: Ticket) {
        self.log.borrow_mut().calls.push(ticket);
    }

    fn subscribe_state_changed(&mut self, token: Token) {
        self.log.borrow_mut().subscribed.push(token);
    }

    fn watch_presence(&mut self, token: Token) {
        self.log.borrow_mut().watched.push(token);
    }

    fn unregister(&mut self, token: Token) {
        self.log.borrow_mut().unregistered.push(token);
    }
}
