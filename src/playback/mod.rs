pub mod player;

pub use player::{BodyPlayer, BodyPlayerDelegate, PlayStatus, RenderContext};
