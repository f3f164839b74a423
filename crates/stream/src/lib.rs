pub mod buffer;
pub mod consumer;
pub mod feed;
pub mod frame;
pub mod state;

pub use buffer::ActivityBuffer;
pub use consumer::{FrameStream, StreamConsumer, StreamSource};
pub use feed::{ActivityFeed, BridgeSource, FrameFeed};
pub use frame::Frame;
pub use state::{ConnectionStatus, ConsumerState, FrameOutcome};
