//! Passwort-Hashing mit Argon2id
//!
//! Der Identity-Service kennt nur den Trait [`PasswortHasher`]; die
//! Standard-Implementierung nutzt Argon2id und speichert PHC-Strings
//! (Algorithmus, Parameter und Salt stecken im Hash selbst).

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::error::{AuthError, AuthResult};

/// Einweg-Hashing fuer Passwoerter
pub trait PasswortHasher: Send + Sync {
    /// Hasht ein Passwort mit zufaelligem Salt
    fn hashen(&self, passwort: &str) -> AuthResult<String>;

    /// Prueft ein Passwort gegen einen gespeicherten Hash.
    ///
    /// Ein falsches Passwort ist `Ok(false)`. `Err` bedeutet, dass der Hash
    /// selbst nicht auswertbar ist.
    fn verifizieren(&self, passwort: &str, hash: &str) -> AuthResult<bool>;
}

/// Argon2id-Hasher
///
/// Ohne eigene Parameter gelten die Standardwerte der argon2-Bibliothek.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    params: Option<Params>,
}

impl Argon2Hasher {
    /// Hasher mit eigenem Arbeitsaufwand (Speicher in KiB, Iterationen, Parallelitaet)
    pub fn mit_parametern(m_kib: u32, t_cost: u32, p_cost: u32) -> AuthResult<Self> {
        let params = Params::new(m_kib, t_cost, p_cost, None)
            .map_err(|e| AuthError::PasswortHashing(format!("Ungueltige Argon2-Parameter: {e}")))?;
        Ok(Self {
            params: Some(params),
        })
    }

    fn instanz(&self) -> Argon2<'static> {
        match &self.params {
            Some(params) => Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone()),
            None => Argon2::default(),
        }
    }
}

impl PasswortHasher for Argon2Hasher {
    fn hashen(&self, passwort: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.instanz()
            .hash_password(passwort.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::PasswortHashing(e.to_string()))
    }

    fn verifizieren(&self, passwort: &str, hash: &str) -> AuthResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::PasswortHashing(format!("Ungueltiges Hash-Format: {e}")))?;

        match self.instanz().verify_password(passwort.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::PasswortHashing(e.to_string())),
        }
    }
}
