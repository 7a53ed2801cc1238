//! Chain-of-responsibility dispatch for inbound SCMP messages. The path
//! cache is the canonical node; applications may append their own.

use crate::hdr::ScmpMessage;

/// A single node in the SCMP handler chain. Returning `false` from
/// [`ScmpHandler::handle_callback`] halts further propagation; returning
/// `true` lets the dispatch continue to the next node.
pub trait ScmpHandler {
    /// Reacts to a received SCMP message. The path cache's implementation
    /// always returns `true`: a cache invalidation observes traffic, it
    /// does not gate it.
    fn handle_callback(&mut self, msg: &ScmpMessage) -> bool;
}

/// An ordered chain of [`ScmpHandler`]s, dispatched head-first in
/// registration order.
#[derive(Default)]
pub struct ScmpHandlerChain {
    handlers: Vec<Box<dyn ScmpHandler>>,
}

impl ScmpHandlerChain {
    /// Builds an empty chain.
    pub fn new() -> Self {
        ScmpHandlerChain { handlers: Vec::new() }
    }

    /// Appends a node to the end of the chain.
    pub fn push(&mut self, handler: Box<dyn ScmpHandler>) {
        self.handlers.push(handler);
    }

    /// Walks the chain from the head, calling each node in turn. Stops at
    /// the first node that returns `false`.
    pub fn dispatch(&mut self, msg: &ScmpMessage) {
        for handler in &mut self.handlers {
            if !handler.handle_callback(msg) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHandler {
        calls: std::rc::Rc<std::cell::Cell<u32>>,
        keep_going: bool,
    }

    impl ScmpHandler for CountingHandler {
        fn handle_callback(&mut self, _msg: &ScmpMessage) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.keep_going
        }
    }

    #[test]
    fn dispatch_visits_every_node_in_order() {
        let a_calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let b_calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut chain = ScmpHandlerChain::new();
        chain.push(Box::new(CountingHandler { calls: a_calls.clone(), keep_going: true }));
        chain.push(Box::new(CountingHandler { calls: b_calls.clone(), keep_going: true }));

        chain.dispatch(&ScmpMessage::DstUnreach);

        assert_eq!(a_calls.get(), 1);
        assert_eq!(b_calls.get(), 1);
    }

    #[test]
    fn a_handler_returning_false_halts_the_chain() {
        let a_calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let b_calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut chain = ScmpHandlerChain::new();
        chain.push(Box::new(CountingHandler { calls: a_calls.clone(), keep_going: false }));
        chain.push(Box::new(CountingHandler { calls: b_calls.clone(), keep_going: true }));

        chain.dispatch(&ScmpMessage::DstUnreach);

        assert_eq!(a_calls.get(), 1);
        assert_eq!(b_calls.get(), 0);
    }
}
