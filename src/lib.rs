pub mod audio;
pub mod client;
pub mod config;
pub mod engine;
pub mod http;
pub mod protocol;
pub mod session;
pub mod transport;

pub use audio::{AudioFile, ChunkConfig};
pub use client::{ChannelHandler, ClientError, ClientEvent, ClientSession, ClientStats, FrameHandler};
pub use config::Config;
pub use engine::{ConfiguredEngineFactory, EngineFactory, RenderEngine};
pub use http::{create_router, AppState};
pub use protocol::{ControlSignal, DecodedMessage, FrameEncoder, StatusMessage};
pub use session::{ServerSession, SessionConfig, SessionState, SessionStats};
