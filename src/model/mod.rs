pub mod player;
pub mod room;
pub mod round;
pub mod settings;
pub mod team;

pub use player::{Player, PowerUp, TimelineCard};
pub use room::{Phase, Room};
pub use round::Round;
pub use settings::{Difficulty, GameMode, Settings, SettingsPatch};
pub use team::Team;
