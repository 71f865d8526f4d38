//! JSON request/response channel between the control side and a page.

pub mod agent;
pub mod client;
pub mod protocol;

pub use agent::PageAgent;
pub use client::{Connector, LocalConnector, MarketplaceClient};
pub use protocol::{Frame, Message, Reply, Request};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One end of a duplex channel carrying serialized frames
#[derive(Debug)]
pub struct Port {
    pub tx: UnboundedSender<String>,
    pub rx: UnboundedReceiver<String>,
}

/// Two connected ports: (control side, page side)
pub fn duplex() -> (Port, Port) {
    let (to_page, from_control) = mpsc::unbounded_channel();
    let (to_control, from_page) = mpsc::unbounded_channel();
    (
        Port {
            tx: to_page,
            rx: from_page,
        },
        Port {
            tx: to_control,
            rx: from_control,
        },
    )
}
