pub mod bridge;
pub mod filter;
pub mod health;
pub mod history;
pub mod subscription;

pub use bridge::EventBridge;
pub use filter::EventFilter;
pub use health::GatewayMonitor;
pub use history::EventHistory;
pub use subscription::Subscription;
