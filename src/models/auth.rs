//! Authentication models and utilities

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::User;
use crate::models::UserRole;

/// JWT token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub username: String,
    pub role: UserRole,
    pub iat: i64,    // Issued at
    pub exp: i64,    // Expiration
    pub iss: String, // Issuer
}

impl Claims {
    /// Create new claims for a user
    pub fn new(user: &User, expiration: i64, issuer: String) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: now.timestamp() + expiration,
            iss: issuer,
        }
    }

    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Authentication token pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// JWT token service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_expiration: i64,
    refresh_expiration: i64,
}

impl JwtService {
    /// Create new JWT service
    pub fn new(
        secret: &str,
        issuer: String,
        access_expiration: i64,
        refresh_expiration: i64,
    ) -> Result<Self, AppError> {
        if secret.len() < 32 {
            return Err(AppError::Config(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.set_issuer(&[&issuer]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
            issuer,
            access_expiration,
            refresh_expiration,
        })
    }

    /// Generate access token
    pub fn generate_access_token(&self, user: &User) -> Result<String, AppError> {
        let claims = Claims::new(user, self.access_expiration, self.issuer.clone());
        self.encode_token(&claims)
    }

    /// Generate refresh token
    pub fn generate_refresh_token(&self, user: &User) -> Result<String, AppError> {
        let claims = Claims::new(user, self.refresh_expiration, self.issuer.clone());
        self.encode_token(&claims)
    }

    /// Generate token pair
    pub fn generate_token_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        let access_token = self.generate_access_token(user)?;
        let refresh_token = self.generate_refresh_token(user)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_expiration as u64,
        })
    }

    /// Verify and decode token
    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Encode token
    fn encode_token(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::Authentication(format!("Failed to encode token: {}", e)))
    }
}

/// Password utilities
pub struct PasswordUtils;

impl PasswordUtils {
    /// Hash password with bcrypt
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Authentication(format!("Failed to hash password: {}", e)))
    }

    /// Verify password against hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
        bcrypt::verify(password, hash)
            .map_err(|e| AppError::Authentication(format!("Failed to verify password: {}", e)))
    }

    /// Generate an opaque alphanumeric token (certificate serials)
    pub fn generate_serial(len: usize) -> String {
        use rand::distributions::Alphanumeric;
        use rand::{thread_rng, Rng};

        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    /// Validate password strength
    pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
        if password.len() < 8 {
            return Err(AppError::BadRequest(
                "Password must be at least 8 characters long".to_string(),
            ));
        }

        if password.len() > 128 {
            return Err(AppError::BadRequest(
                "Password must be less than 128 characters long".to_string(),
            ));
        }

        let has_uppercase = password.chars().any(|c| c.is_uppercase());
        let has_lowercase = password.chars().any(|c| c.is_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());

        if !has_uppercase || !has_lowercase || !has_digit {
            return Err(AppError::BadRequest(
                "Password must contain upper and lower case letters and a digit".to_string(),
            ));
        }

        Ok(())
    }
}

/// Authentication context for requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub token_issued_at: DateTime<Utc>,
    pub token_expires_at: DateTime<Utc>,
}

impl TryFrom<Claims> for AuthContext {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, AppError> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Authentication("Invalid user ID in token".to_string()))?;

        Ok(Self {
            user_id,
            username: claims.username,
            role: claims.role,
            token_issued_at: DateTime::from_timestamp(claims.iat, 0).unwrap_or_else(Utc::now),
            token_expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
        })
    }
}

impl AuthContext {
    /// Check if user has a specific role
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_instructor(&self) -> bool {
        self.role == UserRole::Instructor
    }

    pub fn is_learner(&self) -> bool {
        self.role == UserRole::Learner
    }

    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.token_expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            username: "karim".to_string(),
            email: "karim@example.com".to_string(),
            password_hash: String::new(),
            display_name: "Karim".to_string(),
            role,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_validation() {
        assert!(PasswordUtils::validate_password_strength("").is_err());
        assert!(PasswordUtils::validate_password_strength("weak").is_err());
        assert!(PasswordUtils::validate_password_strength("weakpassword").is_err());
        assert!(PasswordUtils::validate_password_strength("Weakpassword").is_err());
        assert!(PasswordUtils::validate_password_strength("Strongpass1").is_ok());
    }

    #[test]
    fn test_jwt_service_creation() {
        assert!(JwtService::new("short", "test".to_string(), 3600, 86400).is_err());
        assert!(JwtService::new(
            "this_is_a_very_long_secret_key_32_chars",
            "test".to_string(),
            3600,
            86400
        )
        .is_ok());
    }

    #[test]
    fn test_token_round_trip() {
        let service = JwtService::new(
            "this_is_a_very_long_secret_key_32_chars",
            "cursus".to_string(),
            3600,
            86400,
        )
        .unwrap();

        let user = sample_user(UserRole::Instructor);
        let token = service.generate_access_token(&user).unwrap();
        let claims = service.verify_token(&token).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, UserRole::Instructor);
        assert!(!claims.is_expired());

        let ctx = AuthContext::try_from(claims).unwrap();
        assert_eq!(ctx.user_id, user.id);
        assert!(ctx.is_instructor());
        assert!(!ctx.is_admin());
    }

    #[test]
    fn test_serial_generation() {
        let serial = PasswordUtils::generate_serial(16);
        assert_eq!(serial.len(), 16);
        assert!(serial.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
