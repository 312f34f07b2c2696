use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::ScopeClaims;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a per-request scope token. A token never outlives the request
/// it was minted for by more than this.
const SCOPE_TOKEN_TTL_SECS: u64 = 300;

const SCOPE_ROLE: &str = "tenant_service";

/// Mint the storage scope token for one request. The `tenant_id` claim is
/// what the row-level-security policies key on.
pub fn mint_scope_token(
    tenant_id: Uuid,
    credential_id: Uuid,
    secret: &str,
) -> Result<String, String> {
    if secret.is_empty() {
        return Err("Scope token secret is not set".to_string());
    }

    let now = chrono::Utc::now().timestamp() as u64;
    let claims = ScopeClaims {
        sub: credential_id.to_string(),
        tenant_id: tenant_id.to_string(),
        role: SCOPE_ROLE.to_string(),
        iat: now,
        exp: now + SCOPE_TOKEN_TTL_SECS,
    };

    let header_b64 = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims_json =
        serde_json::to_string(&claims).map_err(|e| format!("Failed to encode claims: {}", e))?;
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json.as_bytes());

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature_b64))
}

pub fn validate_scope_token(token: &str, secret: &str) -> Result<ScopeClaims, String> {
    if secret.is_empty() {
        return Err("Scope token secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err("Failed to create HMAC".to_string()),
    };
    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Scope token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: ScopeClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        }
    };

    let now = chrono::Utc::now().timestamp() as u64;
    if claims.exp < now {
        debug!("Scope token expired at {} (now: {})", claims.exp, now);
        return Err("Token expired".to_string());
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-scope-secret-long-enough-for-hmac";

    #[test]
    fn minted_token_round_trips() {
        let tenant_id = Uuid::new_v4();
        let credential_id = Uuid::new_v4();

        let token = mint_scope_token(tenant_id, credential_id, SECRET).unwrap();
        let claims = validate_scope_token(&token, SECRET).unwrap();

        assert_eq!(claims.tenant_id, tenant_id.to_string());
        assert_eq!(claims.sub, credential_id.to_string());
        assert_eq!(claims.role, "tenant_service");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint_scope_token(Uuid::new_v4(), Uuid::new_v4(), SECRET).unwrap();
        assert!(validate_scope_token(&token, "a-different-secret").is_err());
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let token = mint_scope_token(Uuid::new_v4(), Uuid::new_v4(), SECRET).unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();

        let forged = serde_json::json!({
            "sub": Uuid::new_v4().to_string(),
            "tenant_id": Uuid::new_v4().to_string(),
            "role": "tenant_service",
            "iat": 0,
            "exp": u64::MAX,
        });
        parts[1] = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(forged.to_string().as_bytes());

        assert!(validate_scope_token(&parts.join("."), SECRET).is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(mint_scope_token(Uuid::new_v4(), Uuid::new_v4(), "").is_err());
    }
}
