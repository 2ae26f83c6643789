// Media backends

pub mod youtube;
pub mod ytdlp;

pub use youtube::{PlayerClient, YouTubeStreamBackend};
pub use ytdlp::YtDlpBackend;
