use serde::{Deserialize, Serialize};

use super::MovieId;

// Справочные данные каталога, этот сервис их только читает
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub year: i32,
    pub description: String,
    pub image_url: String,
    pub genres: Vec<String>,
    pub cast: Vec<String>,
}
