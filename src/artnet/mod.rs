pub mod input;
pub mod output;
pub mod packet;

pub use input::ArtnetInput;
pub use output::{ArtnetBroadcast, ArtnetOutput};
pub use packet::ARTNET_PORT;
