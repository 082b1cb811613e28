use chrono::{NaiveDateTime, Utc};
use rand::{Rng, distr::Alphanumeric};

#[derive(Debug)]
pub struct AuthSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAuthSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl From<DbAuthSession> for AuthSession {
    fn from(db: DbAuthSession) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            token: db.token,
            created_at: db.created_at,
            expires_at: db.expires_at,
        }
    }
}

impl AuthSession {
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }

    pub fn generate_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect()
    }
}
