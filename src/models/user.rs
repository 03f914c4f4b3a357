use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

use super::UserId;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub birthdate: Option<NaiveDate>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
}

impl User {
    // Найти пользователя по id (проверка, что владелец токена существует)
    pub async fn find_by_id(id: UserId, db: &crate::database::Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, birthdate, email, password, role FROM users WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&db.pool)
        .await
    }
}
