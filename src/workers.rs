//! Ready-made workers.

use crate::errors::WorkerError;
use crate::pack::Payload;
use crate::worker::{Courier, Flow, Worker};

/// Echoes every received item back to its sender.
///
/// The smallest useful worker; doubles as the canonical example of the
/// handle-and-reply shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoWorker;

impl<T: Payload> Worker<T> for EchoWorker {
    fn kind(&self) -> &str {
        "echo"
    }

    fn handle(&mut self, courier: &mut Courier<T>, sender: &str, item: T) -> Result<Flow, WorkerError> {
        courier.send_to(sender, item)?;
        Ok(Flow::Continue)
    }
}

/// Forwards every received item to its own recipient list, tagging nothing.
///
/// Useful as a fan-out hub between a producer and several consumers.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelayWorker;

impl<T: Payload> Worker<T> for RelayWorker {
    fn kind(&self) -> &str {
        "relay"
    }

    fn handle(&mut self, courier: &mut Courier<T>, _sender: &str, item: T) -> Result<Flow, WorkerError> {
        courier.send(item)?;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::pack::Pack;
    use crate::queue::PackQueue;
    use crate::worker::spawn_worker;

    fn settle<T: Payload>(queue: &PackQueue<T>, want: usize, deadline_ms: u64) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_millis(deadline_ms);
        while std::time::Instant::now() < deadline {
            if queue.len() == want {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        queue.len() == want
    }

    #[test]
    fn test_echo_replies_to_sender() {
        let queue = Arc::new(PackQueue::new());
        let mut handle = spawn_worker(
            "echo",
            Vec::new(),
            Arc::clone(&queue),
            Duration::from_millis(1),
            EchoWorker,
        )
        .unwrap();

        queue.produce(Pack::new("ping".to_string(), "user", "echo"));
        // Wait for the reply, not just any queue length: the original pack
        // also counts as one element until the worker takes it.
        let deadline = std::time::Instant::now() + Duration::from_millis(1000);
        while std::time::Instant::now() < deadline {
            let held = queue.hold();
            if held.peek().map(|p| p.recipient == "user").unwrap_or(false) {
                break;
            }
            drop(held);
            std::thread::sleep(Duration::from_millis(2));
        }
        let reply = queue.consume().unwrap();
        assert_eq!(reply.sender, "echo");
        assert_eq!(reply.recipient, "user");
        assert_eq!(reply.item, "ping");

        handle.close();
        handle.join();
    }

    #[test]
    fn test_relay_fans_out() {
        let queue = Arc::new(PackQueue::new());
        let mut handle = spawn_worker(
            "hub",
            vec!["alice".to_string(), "bob".to_string()],
            Arc::clone(&queue),
            Duration::from_millis(1),
            RelayWorker,
        )
        .unwrap();

        queue.produce(Pack::new("news".to_string(), "user", "hub"));
        assert!(settle(&queue, 2, 1000));
        handle.close();
        handle.join();

        let out = queue.drain();
        assert_eq!(out[0].recipient, "alice");
        assert_eq!(out[1].recipient, "bob");
        assert!(out.iter().all(|p| p.sender == "hub" && p.item == "news"));
    }
}
