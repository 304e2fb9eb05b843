//! Platform-facing components: transport, script cache, resolution

pub mod remote;
pub mod resolver;
pub mod script;
pub mod transport;

pub use remote::RemoteCipherClient;
pub use resolver::{SentinelRules, StreamFormat, TransformOutcome, UrlResolver};
pub use script::{PlayerScriptCache, PlayerScriptHandle};
pub use transport::{HttpTransport, Transport};
