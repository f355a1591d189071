//! Seeded, read-only user records with argon2 password hashes.

use std::collections::HashMap;

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use gadget_tonic_core::{
    Error, Result,
    types::{ROLE_ADMIN, ROLE_USER},
};
use parking_lot::RwLock;

/// One service account. The password is only ever held as an argon2 hash.
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub role: String,
    hashed_password: String,
}

impl User {
    pub fn new(username: &str, password: &str, role: &str) -> Result<Self> {
        let salt = SaltString::generate(&mut OsRng);

        let hashed_password = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Storage {
                context: format!("cannot hash password: {e}"),
            })?
            .to_string();

        Ok(Self {
            username: username.to_string(),
            role: role.to_string(),
            hashed_password,
        })
    }

    pub fn verify_password(&self, password: &str) -> bool {
        PasswordHash::new(&self.hashed_password)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

/// Map from username to user, populated at seeding time and read-only from
/// then on (the lock discipline still guards the seeding writes).
#[derive(Debug, Default)]
pub struct UserStore {
    users: RwLock<HashMap<String, User>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, user: User) -> Result<()> {
        let mut users = self.users.write();

        if users.contains_key(&user.username) {
            return Err(Error::AlreadyExists {
                id: user.username,
            });
        }

        users.insert(user.username.clone(), user);
        Ok(())
    }

    pub fn find(&self, username: &str) -> Option<User> {
        self.users.read().get(username).cloned()
    }
}

/// Seeds the development accounts: `admin1` with the admin role and `user1`
/// with the user role, both with the password `secret`.
pub fn seed_default_users(store: &UserStore) -> Result<()> {
    for (username, password, role) in [
        ("admin1", "secret", ROLE_ADMIN),
        ("user1", "secret", ROLE_USER),
    ] {
        store.save(User::new(username, password, role)?)?;
    }

    Ok(())
}
