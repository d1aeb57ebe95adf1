pub mod http;
pub mod mock;

pub use http::HttpAgentClient;
pub use mock::{MockAgentClient, MockRegistry, MockReply};
