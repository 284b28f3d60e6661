use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::users::map_user;
use crate::domain::user::User;
use crate::infra::db::Db;

const EMAIL_VERIFICATION_TTL_HOURS: i64 = 24;
const PASSWORD_RESET_TTL_HOURS: i64 = 1;
const COMPANY_APPROVAL_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    typ: String,
    exp: usize,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

/// Newly registered user plus the raw verification token to email out.
#[derive(Debug)]
pub struct Registration {
    pub user: User,
    pub verification_token: String,
}

#[derive(Debug)]
pub enum LoginOutcome {
    Success(TokenPair),
    InvalidCredentials,
    EmailUnverified,
    CompanyUnverified,
    Inactive,
}

#[derive(Debug)]
pub enum VerifyEmailOutcome {
    InvalidToken,
    Expired,
    AlreadyVerified,
    /// Email flag set. `approval_token` is present when the account still
    /// waits for company approval and the approver should be emailed.
    Verified {
        user: User,
        approval_token: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    Approve,
    Reject,
}

#[derive(Debug)]
pub enum ApprovalOutcome {
    InvalidToken,
    AlreadyProcessed { status: String },
    Expired,
    UserMissing,
    Approved { user: User },
    Rejected { user_name: String, user_email: String },
}

#[derive(Debug)]
pub enum ResetPasswordOutcome {
    InvalidToken,
    AlreadyUsed,
    Expired,
    UserMissing,
    Done { user: User },
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    jwt_secret: String,
    access_ttl_minutes: u64,
    refresh_ttl_days: u64,
}

impl AuthService {
    pub fn new(db: Db, jwt_secret: String, access_ttl_minutes: u64, refresh_ttl_days: u64) -> Self {
        Self {
            db,
            jwt_secret,
            access_ttl_minutes,
            refresh_ttl_days,
        }
    }

    /// Create an unverified, inactive account and its 24 h email
    /// verification token. Duplicate emails surface as the users_email_key
    /// unique violation.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        department: &str,
        role: &str,
    ) -> Result<Registration> {
        let password_hash = hash_password(password)?;
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "INSERT INTO users (email, name, password_hash, department, role, is_admin, \
                                is_active, email_verified, company_verified) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, FALSE, FALSE) \
             RETURNING id, email, name, department, role, is_admin, is_active, \
                       email_verified, company_verified, avatar_url, created_at, updated_at",
        )
        .bind(email.trim().to_lowercase())
        .bind(name.trim())
        .bind(password_hash)
        .bind(department.trim())
        .bind(role)
        .bind(role == "admin")
        .fetch_one(&mut *tx)
        .await?;
        let user = map_user(&row);

        let verification_token = generate_token();
        let expires_at = OffsetDateTime::now_utc() + Duration::hours(EMAIL_VERIFICATION_TTL_HOURS);
        sqlx::query(
            "INSERT INTO email_verifications (user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3)",
        )
        .bind(user.id)
        .bind(hash_token(&verification_token))
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Registration {
            user,
            verification_token,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let row = sqlx::query(
            "SELECT id, email, name, department, role, is_admin, is_active, email_verified, \
                    company_verified, avatar_url, created_at, updated_at, password_hash \
             FROM users WHERE email = $1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(LoginOutcome::InvalidCredentials),
        };

        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Ok(LoginOutcome::InvalidCredentials);
        }

        let user = map_user(&row);
        if !user.email_verified {
            return Ok(LoginOutcome::EmailUnverified);
        }
        if !user.company_verified {
            return Ok(LoginOutcome::CompanyUnverified);
        }
        if !user.is_active {
            return Ok(LoginOutcome::Inactive);
        }

        Ok(LoginOutcome::Success(self.issue_token_pair(user.id)?))
    }

    /// Re-issue a token pair from a valid refresh token. Stateless: the
    /// claims are the source of truth, but the user must still exist.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<TokenPair>> {
        let claims = match self.decode_claims(refresh_token) {
            Some(claims) if claims.typ == "refresh" => claims,
            _ => return Ok(None),
        };

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(claims.sub)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Ok(None);
        }

        Ok(Some(self.issue_token_pair(claims.sub)?))
    }

    pub async fn authenticate_access_token(&self, token: &str) -> Result<Option<User>> {
        let claims = match self.decode_claims(token) {
            Some(claims) if claims.typ == "access" => claims,
            _ => return Ok(None),
        };

        let row = sqlx::query(
            "SELECT id, email, name, department, role, is_admin, is_active, email_verified, \
                    company_verified, avatar_url, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(claims.sub)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| map_user(&row)))
    }

    /// Consume an email-verification token. Activates the account when the
    /// company has already vouched for it; otherwise (re)arms the single
    /// pending company-approval request and hands back its raw token.
    pub async fn verify_email(&self, token: &str) -> Result<VerifyEmailOutcome> {
        let token_hash = hash_token(token);
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.pool().begin().await?;

        let verification = sqlx::query(
            "SELECT id, user_id, expires_at, consumed \
             FROM email_verifications WHERE token_hash = $1",
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let verification = match verification {
            Some(row) => row,
            None => return Ok(VerifyEmailOutcome::InvalidToken),
        };
        if verification.get::<bool, _>("consumed") {
            return Ok(VerifyEmailOutcome::AlreadyVerified);
        }
        if verification.get::<OffsetDateTime, _>("expires_at") < now {
            return Ok(VerifyEmailOutcome::Expired);
        }

        let user_id: Uuid = verification.get("user_id");
        let user_row = sqlx::query(
            "SELECT id, email, name, department, role, is_admin, is_active, email_verified, \
                    company_verified, avatar_url, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let user_row = match user_row {
            Some(row) => row,
            None => return Ok(VerifyEmailOutcome::InvalidToken),
        };
        let mut user = map_user(&user_row);

        user.email_verified = true;
        let mut approval_token = None;

        if user.company_verified {
            user.is_active = true;
        } else {
            user.is_active = false;
            let raw = generate_token();
            let expires_at = now + Duration::days(COMPANY_APPROVAL_TTL_DAYS);

            let updated = sqlx::query(
                "UPDATE company_approval_requests \
                 SET token_hash = $1, expires_at = $2, resolved_at = NULL \
                 WHERE user_id = $3 AND status = 'pending'",
            )
            .bind(hash_token(&raw))
            .bind(expires_at)
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                sqlx::query(
                    "INSERT INTO company_approval_requests (user_id, token_hash, expires_at, status) \
                     VALUES ($1, $2, $3, 'pending')",
                )
                .bind(user.id)
                .bind(hash_token(&raw))
                .bind(expires_at)
                .execute(&mut *tx)
                .await?;
            }
            approval_token = Some(raw);
        }

        sqlx::query(
            "UPDATE users SET email_verified = TRUE, is_active = $1, updated_at = now() \
             WHERE id = $2",
        )
        .bind(user.is_active)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE email_verifications SET consumed = TRUE, consumed_at = $1 WHERE id = $2",
        )
        .bind(now)
        .bind(verification.get::<Uuid, _>("id"))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(VerifyEmailOutcome::Verified {
            user,
            approval_token,
        })
    }

    /// Decide a company-approval request. A decided request is never
    /// reopened; an expired token flips to 'expired' at decision time.
    /// Rejection removes the account entirely.
    pub async fn decide_company_approval(
        &self,
        token: &str,
        action: ApprovalAction,
        action_ip: Option<String>,
        approver_email: Option<&str>,
    ) -> Result<ApprovalOutcome> {
        let token_hash = hash_token(token);
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.pool().begin().await?;

        let request = sqlx::query(
            "SELECT id, user_id, status, expires_at \
             FROM company_approval_requests WHERE token_hash = $1",
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let request = match request {
            Some(row) => row,
            None => return Ok(ApprovalOutcome::InvalidToken),
        };
        let request_id: Uuid = request.get("id");
        let status: String = request.get("status");
        if status != "pending" {
            return Ok(ApprovalOutcome::AlreadyProcessed { status });
        }
        if request.get::<OffsetDateTime, _>("expires_at") < now {
            sqlx::query(
                "UPDATE company_approval_requests SET status = 'expired', resolved_at = $1 \
                 WHERE id = $2",
            )
            .bind(now)
            .bind(request_id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(ApprovalOutcome::Expired);
        }

        let user_id: Uuid = request.get("user_id");
        let user_row = sqlx::query(
            "SELECT id, email, name, department, role, is_admin, is_active, email_verified, \
                    company_verified, avatar_url, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_row) = user_row else {
            sqlx::query(
                "UPDATE company_approval_requests SET status = 'rejected', resolved_at = $1 \
                 WHERE id = $2",
            )
            .bind(now)
            .bind(request_id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(ApprovalOutcome::UserMissing);
        };
        let mut user = map_user(&user_row);

        match action {
            ApprovalAction::Approve => {
                user.company_verified = true;
                user.is_active = user.email_verified;
                sqlx::query(
                    "UPDATE users SET company_verified = TRUE, is_active = $1, updated_at = now() \
                     WHERE id = $2",
                )
                .bind(user.is_active)
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    "UPDATE company_approval_requests \
                     SET status = 'approved', resolved_at = $1, action_ip = $2, action_email = $3 \
                     WHERE id = $4",
                )
                .bind(now)
                .bind(&action_ip)
                .bind(approver_email)
                .bind(request_id)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(ApprovalOutcome::Approved { user })
            }
            ApprovalAction::Reject => {
                sqlx::query(
                    "UPDATE company_approval_requests \
                     SET status = 'rejected', resolved_at = $1, action_ip = $2, action_email = $3 \
                     WHERE id = $4",
                )
                .bind(now)
                .bind(&action_ip)
                .bind(approver_email)
                .bind(request_id)
                .execute(&mut *tx)
                .await?;
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(user.id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(ApprovalOutcome::Rejected {
                    user_name: user.name,
                    user_email: user.email,
                })
            }
        }
    }

    /// Create a 1 h password-reset token. Returns None for unknown emails
    /// so the route can answer with the same generic message either way.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<(User, String)>> {
        let row = sqlx::query(
            "SELECT id, email, name, department, role, is_admin, is_active, email_verified, \
                    company_verified, avatar_url, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(self.db.pool())
        .await?;

        let user = match row {
            Some(row) => map_user(&row),
            None => return Ok(None),
        };

        let token = generate_token();
        let expires_at = OffsetDateTime::now_utc() + Duration::hours(PASSWORD_RESET_TTL_HOURS);
        sqlx::query(
            "INSERT INTO password_resets (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user.id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .execute(self.db.pool())
        .await?;

        Ok(Some((user, token)))
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<ResetPasswordOutcome> {
        let token_hash = hash_token(token);
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.pool().begin().await?;

        let reset = sqlx::query(
            "SELECT id, user_id, expires_at, consumed FROM password_resets WHERE token_hash = $1",
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let reset = match reset {
            Some(row) => row,
            None => return Ok(ResetPasswordOutcome::InvalidToken),
        };
        if reset.get::<bool, _>("consumed") {
            return Ok(ResetPasswordOutcome::AlreadyUsed);
        }
        if reset.get::<OffsetDateTime, _>("expires_at") < now {
            return Ok(ResetPasswordOutcome::Expired);
        }

        let user_id: Uuid = reset.get("user_id");
        let user_row = sqlx::query(
            "SELECT id, email, name, department, role, is_admin, is_active, email_verified, \
                    company_verified, avatar_url, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let user = match user_row {
            Some(row) => map_user(&row),
            None => return Ok(ResetPasswordOutcome::UserMissing),
        };

        let password_hash = hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(password_hash)
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE password_resets SET consumed = TRUE, consumed_at = $1 WHERE id = $2")
            .bind(now)
            .bind(reset.get::<Uuid, _>("id"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ResetPasswordOutcome::Done { user })
    }

    pub fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        let now = OffsetDateTime::now_utc();
        let access_expires_at = now + Duration::minutes(self.access_ttl_minutes as i64);
        let refresh_expires_at = now + Duration::days(self.refresh_ttl_days as i64);

        let access_token = self.encode_claims(&Claims {
            sub: user_id,
            typ: "access".to_string(),
            exp: access_expires_at.unix_timestamp() as usize,
        })?;
        let refresh_token = self.encode_claims(&Claims {
            sub: user_id,
            typ: "refresh".to_string(),
            exp: refresh_expires_at.unix_timestamp() as usize,
        })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String> {
        jsonwebtoken::encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|err| anyhow!("failed to encode token: {}", err))
    }

    fn decode_claims(&self, token: &str) -> Option<Claims> {
        jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .ok()
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Single-use tokens are stored as digests; only the emailed link carries
/// the raw value.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..43)
        .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
        .collect()
}

pub(crate) fn lookup_user_query() -> &'static str {
    "SELECT id, email, name, department, role, is_admin, is_active, email_verified, \
            company_verified, avatar_url, created_at, updated_at \
     FROM users WHERE id = $1"
}

pub(crate) async fn load_user(db: &Db, user_id: Uuid) -> Result<Option<User>> {
    let row: Option<PgRow> = sqlx::query(lookup_user_query())
        .bind(user_id)
        .fetch_optional(db.pool())
        .await?;
    Ok(row.map(|row| map_user(&row)))
}
