use serde::{Deserialize, Serialize};

use super::player::TimelineCard;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub score: i64,
    pub timeline_cards: Vec<TimelineCard>,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Team {
            id: id.into(),
            name: name.into(),
            score: 0,
            timeline_cards: Vec::new(),
        }
    }
}
