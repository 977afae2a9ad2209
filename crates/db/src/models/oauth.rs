use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// OAuth provider configured by the operator
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct OAuthService {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub authorization_url: String,
    pub token_url: String,
    pub userinfo_url: Option<String>,
    pub scopes: String, // space or comma separated
    pub client_id: String,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub client_secret: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthService {
    pub fn scope_list(&self) -> Vec<String> {
        split_scopes(&self.scopes)
    }
}

/// Scopes may be stored comma- or space-separated.
pub fn split_scopes(scopes: &str) -> Vec<String> {
    scopes
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateOAuthService {
    pub name: String,
    pub display_name: String,
    pub authorization_url: String,
    pub token_url: String,
    pub userinfo_url: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub client_id: String,
    pub client_secret: String,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateOAuthService {
    pub display_name: Option<String>,
    pub authorization_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub enabled: Option<bool>,
}

/// Tokens granted by a subscriber for one OAuth service
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct OAuthConnection {
    pub id: Uuid,
    pub service_id: Uuid,
    pub subscriber_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scopes: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthConnection {
    /// Connections without an expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateOAuthConnection {
    pub service_id: Uuid,
    pub subscriber_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

const SERVICE_COLUMNS: &str = "id, name, display_name, authorization_url, token_url, userinfo_url, \
                               scopes, client_id, client_secret, enabled, created_at, updated_at";

const CONNECTION_COLUMNS: &str = "id, service_id, subscriber_id, access_token, refresh_token, \
                                  scopes, expires_at, created_at, updated_at";

impl OAuthService {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, OAuthService>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM oauth_services ORDER BY name"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, OAuthService>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM oauth_services WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, OAuthService>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM oauth_services WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateOAuthService,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, OAuthService>(&format!(
            r#"INSERT INTO oauth_services
                   (id, name, display_name, authorization_url, token_url, userinfo_url,
                    scopes, client_id, client_secret, enabled)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING {SERVICE_COLUMNS}"#
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.display_name)
        .bind(&data.authorization_url)
        .bind(&data.token_url)
        .bind(&data.userinfo_url)
        .bind(data.scopes.join(" "))
        .bind(&data.client_id)
        .bind(&data.client_secret)
        .bind(data.enabled.unwrap_or(true))
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateOAuthService,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let scopes = data
            .scopes
            .as_ref()
            .map(|s| s.join(" "))
            .unwrap_or(existing.scopes);

        sqlx::query_as::<_, OAuthService>(&format!(
            r#"UPDATE oauth_services
               SET display_name = $2, authorization_url = $3, token_url = $4, userinfo_url = $5,
                   scopes = $6, client_id = $7, client_secret = $8, enabled = $9,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {SERVICE_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.display_name.as_ref().unwrap_or(&existing.display_name))
        .bind(data.authorization_url.as_ref().unwrap_or(&existing.authorization_url))
        .bind(data.token_url.as_ref().unwrap_or(&existing.token_url))
        .bind(data.userinfo_url.as_ref().or(existing.userinfo_url.as_ref()))
        .bind(scopes)
        .bind(data.client_id.as_ref().unwrap_or(&existing.client_id))
        .bind(data.client_secret.as_ref().unwrap_or(&existing.client_secret))
        .bind(data.enabled.unwrap_or(existing.enabled))
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM oauth_services WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl OAuthConnection {
    pub async fn find_all(
        pool: &SqlitePool,
        subscriber_id: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, OAuthConnection>(&format!(
            r#"SELECT {CONNECTION_COLUMNS} FROM oauth_connections
               WHERE $1 IS NULL OR subscriber_id = $1
               ORDER BY created_at DESC"#
        ))
        .bind(subscriber_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, OAuthConnection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM oauth_connections WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Store the grant; reconnecting the same subscriber replaces the previous tokens.
    pub async fn upsert(
        pool: &SqlitePool,
        data: &CreateOAuthConnection,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, OAuthConnection>(&format!(
            r#"INSERT INTO oauth_connections
                   (id, service_id, subscriber_id, access_token, refresh_token, scopes, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT(service_id, subscriber_id) DO UPDATE SET
                   access_token = excluded.access_token,
                   refresh_token = excluded.refresh_token,
                   scopes = excluded.scopes,
                   expires_at = excluded.expires_at,
                   updated_at = datetime('now', 'subsec')
               RETURNING {CONNECTION_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(data.service_id)
        .bind(&data.subscriber_id)
        .bind(&data.access_token)
        .bind(&data.refresh_token)
        .bind(data.scopes.join(" "))
        .bind(data.expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM oauth_connections WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::DBService;

    fn github() -> CreateOAuthService {
        CreateOAuthService {
            name: "github".to_string(),
            display_name: "GitHub".to_string(),
            authorization_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            userinfo_url: None,
            scopes: vec!["read:user".to_string(), "repo".to_string()],
            client_id: "client-123".to_string(),
            client_secret: "secret-456".to_string(),
            enabled: None,
        }
    }

    #[test]
    fn test_split_scopes_accepts_commas_and_spaces() {
        assert_eq!(split_scopes("a, b c,,d"), vec!["a", "b", "c", "d"]);
        assert!(split_scopes("").is_empty());
    }

    #[tokio::test]
    async fn test_client_secret_is_not_serialized() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = OAuthService::create(&db.pool, &github(), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(service.scope_list(), vec!["read:user", "repo"]);

        let json = serde_json::to_value(&service).unwrap();
        assert!(json.get("client_secret").is_none());
        assert_eq!(json["client_id"], "client-123");
    }

    #[tokio::test]
    async fn test_connection_upsert_and_expiry() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = OAuthService::create(&db.pool, &github(), Uuid::new_v4())
            .await
            .unwrap();

        let data = CreateOAuthConnection {
            service_id: service.id,
            subscriber_id: "sub-1".to_string(),
            access_token: "token-a".to_string(),
            refresh_token: None,
            scopes: vec![],
            expires_at: Some(Utc::now() - Duration::minutes(5)),
        };
        let first = OAuthConnection::upsert(&db.pool, &data).await.unwrap();
        assert!(first.is_expired());

        let renewed = OAuthConnection::upsert(
            &db.pool,
            &CreateOAuthConnection {
                access_token: "token-b".to_string(),
                expires_at: Some(Utc::now() + Duration::hours(1)),
                ..data
            },
        )
        .await
        .unwrap();
        assert!(!renewed.is_expired());
        assert_eq!(renewed.access_token, "token-b");

        let all = OAuthConnection::find_all(&db.pool, Some("sub-1")).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(OAuthConnection::find_all(&db.pool, Some("other")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connection_requires_existing_service() {
        let db = DBService::new_in_memory().await.unwrap();
        let result = OAuthConnection::upsert(
            &db.pool,
            &CreateOAuthConnection {
                service_id: Uuid::new_v4(),
                subscriber_id: "sub-1".to_string(),
                access_token: "token".to_string(),
                refresh_token: None,
                scopes: vec![],
                expires_at: None,
            },
        )
        .await;
        assert!(result.is_err());
    }
}
