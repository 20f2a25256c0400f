use secrecy::Secret;

use uuid::Uuid;

use crate::domain::EmailAddress;

#[derive(Debug)]
pub struct NewUser {
    pub email: EmailAddress,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
}

#[derive(Debug)]
pub struct UserCredentials {
    pub id: Uuid,
    pub password_hash: Secret<String>,
    pub is_admin: bool,
}
