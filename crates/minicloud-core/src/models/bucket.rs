use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: i64,
    pub name: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<NaiveDateTime>,
}

impl Bucket {
    pub fn display_created(&self) -> String {
        match self.created_at {
            Some(at) => at.format("%b %d, %Y %H:%M").to_string(),
            None => "-".to_string(),
        }
    }
}
