use chrono::Utc;

use secrecy::Secret;

use sqlx::SqliteExecutor;

use uuid::Uuid;

use crate::domain::EmailAddress;
use crate::error::Result;
use crate::model::{NewUser, UserCredentials};

pub struct UsersRepo;

impl UsersRepo {
    #[tracing::instrument("Insert a new user record", skip(executor, new_user), fields(email = %new_user.email))]
    pub async fn insert<'conn>(executor: impl SqliteExecutor<'conn>, new_user: &NewUser) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            "insert into users(id, email, full_name, password_hash, is_admin, created_at) \
             values (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(new_user.email.as_ref())
        .bind(new_user.full_name.as_deref())
        .bind(&new_user.password_hash)
        .bind(new_user.is_admin)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(id)
    }

    #[tracing::instrument("Fetch user credentials by email", skip(executor))]
    pub async fn fetch_credentials_by_email<'conn>(
        executor: impl SqliteExecutor<'conn>,
        email: &EmailAddress,
    ) -> Result<Option<UserCredentials>> {
        let row = sqlx::query_as::<_, (Uuid, String, bool)>(
            "select id, password_hash, is_admin from users where email = ?",
        )
        .bind(email.as_ref())
        .fetch_optional(executor)
        .await?;

        Ok(row.map(|(id, password_hash, is_admin)| UserCredentials {
            id,
            password_hash: Secret::new(password_hash),
            is_admin,
        }))
    }
}
