//! Text node on an in-memory serial link.

use doorlink_master::SerialMonitor;
use doorlink_node::{NodeExit, Result, TextNode};
use tokio::io::{DuplexStream, duplex};
use tokio::task::JoinHandle;

/// Buffer size of each direction of the link.
const LINK_BUFFER: usize = 4096;

/// Run `node` on one end of a duplex stream and return a monitor on the
/// other.
#[must_use]
pub fn connect(node: TextNode) -> (JoinHandle<Result<NodeExit>>, SerialMonitor<DuplexStream>) {
    let (node_end, monitor_end) = duplex(LINK_BUFFER);
    let task = tokio::spawn(node.run(node_end));
    (task, SerialMonitor::new(monitor_end))
}
