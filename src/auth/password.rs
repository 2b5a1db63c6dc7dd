//! Argon2id によるパスワードハッシュ。
//!
//! 保存値は PHC 形式文字列のバイト列。ソルトは呼び出しごとに生成する。

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version};

use crate::auth::domain::{AuthError, AuthResult};

/// ドメインサービスが使うハッシュ操作
pub trait CredentialHasher: Clone + Send + Sync + 'static {
    fn hash(&self, password: &str) -> AuthResult<Vec<u8>>;
    fn verify(&self, password: &str, stored: &[u8]) -> AuthResult<bool>;
}

#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// `cost` は Argon2 の反復回数 (t_cost)。メモリコストは既定値
    pub fn new(cost: u32) -> AuthResult<Self> {
        Self::with_params(Params::DEFAULT_M_COST, cost, Params::DEFAULT_P_COST)
    }

    pub fn with_params(memory_kib: u32, cost: u32, parallelism: u32) -> AuthResult<Self> {
        let params = Params::new(memory_kib, cost, parallelism, None)
            .map_err(|e| AuthError::ConfigError(format!("invalid argon2 params: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, password: &str) -> AuthResult<Vec<u8>> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::InternalError(format!("failed to hash password: {e}")))?;
        Ok(hash.to_string().into_bytes())
    }

    /// 一致すれば `Ok(true)`、不一致は `Ok(false)`。
    /// 保存値が壊れている場合のみエラー
    pub fn verify(&self, password: &str, stored: &[u8]) -> AuthResult<bool> {
        let stored = std::str::from_utf8(stored)
            .map_err(|e| AuthError::InternalError(format!("stored hash is not utf-8: {e}")))?;
        let parsed = PasswordHash::new(stored)
            .map_err(|e| AuthError::InternalError(format!("invalid hash format: {e}")))?;

        // 検証はハッシュ側に埋め込まれたパラメータを使う
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::InternalError(format!("verify error: {e}"))),
        }
    }
}

impl CredentialHasher for PasswordHasher {
    fn hash(&self, password: &str) -> AuthResult<Vec<u8>> {
        PasswordHasher::hash(self, password)
    }

    fn verify(&self, password: &str, stored: &[u8]) -> AuthResult<bool> {
        PasswordHasher::verify(self, password, stored)
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .finish()
    }
}
