pub mod input;
pub mod output;

pub use input::MtcInput;
pub use output::{MtcMessage, MtcOutput};
