//! OAuth service helpers: provider authorization URLs and access to stored grants.
//! Token exchange with the provider is not performed here.

use chrono::{DateTime, Utc};
use db::models::oauth::{CreateOAuthConnection, OAuthConnection, OAuthService, split_scopes};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use url::Url;
use utils::text::mask_secret;
use uuid::Uuid;

const STATE_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("OAuth service {0} not found")]
    ServiceNotFound(Uuid),
    #[error("OAuth service '{0}' is disabled")]
    ServiceDisabled(String),
    #[error("OAuth connection {0} not found")]
    ConnectionNotFound(Uuid),
    #[error("access token expired at {0}")]
    TokenExpired(DateTime<Utc>),
    #[error("invalid authorization url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct AuthorizeQuery {
    pub subscriber_id: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AuthorizeUrl {
    pub url: String,
    pub state: String,
    pub subscriber_id: String,
}

/// Connection as listed to the admin UI; tokens are masked.
#[derive(Debug, Clone, Serialize, TS)]
pub struct OAuthConnectionView {
    pub id: Uuid,
    pub service_id: Uuid,
    pub subscriber_id: String,
    pub access_token: String,
    pub has_refresh_token: bool,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&OAuthConnection> for OAuthConnectionView {
    fn from(conn: &OAuthConnection) -> Self {
        Self {
            id: conn.id,
            service_id: conn.service_id,
            subscriber_id: conn.subscriber_id.clone(),
            access_token: mask_secret(&conn.access_token),
            has_refresh_token: conn.refresh_token.is_some(),
            scopes: split_scopes(&conn.scopes),
            expires_at: conn.expires_at,
            expired: conn.is_expired(),
            created_at: conn.created_at,
            updated_at: conn.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// Provider consent URL for `service` with a fresh random `state`.
pub fn authorization_url(service: &OAuthService, query: &AuthorizeQuery) -> Result<AuthorizeUrl, OAuthError> {
    if !service.enabled {
        return Err(OAuthError::ServiceDisabled(service.name.clone()));
    }
    // The redirect must itself be a valid absolute URL.
    Url::parse(&query.redirect_uri)?;

    let state = random_state();
    let mut url = Url::parse(&service.authorization_url)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &service.client_id)
        .append_pair("redirect_uri", &query.redirect_uri)
        .append_pair("scope", &service.scope_list().join(" "))
        .append_pair("state", &state);

    Ok(AuthorizeUrl {
        url: url.into(),
        state,
        subscriber_id: query.subscriber_id.clone(),
    })
}

/// The stored access token, refused once it has expired.
pub fn access_token_at(conn: &OAuthConnection, now: DateTime<Utc>) -> Result<AccessToken, OAuthError> {
    if let Some(expired_at) = conn.expires_at.filter(|_| conn.is_expired_at(now)) {
        return Err(OAuthError::TokenExpired(expired_at));
    }
    Ok(AccessToken {
        access_token: conn.access_token.clone(),
        expires_at: conn.expires_at,
        scopes: split_scopes(&conn.scopes),
    })
}

pub async fn create_connection(
    pool: &SqlitePool,
    data: &CreateOAuthConnection,
) -> Result<OAuthConnection, OAuthError> {
    let service = OAuthService::find_by_id(pool, data.service_id)
        .await?
        .ok_or(OAuthError::ServiceNotFound(data.service_id))?;
    let conn = OAuthConnection::upsert(pool, data).await?;
    info!(
        service = %service.name,
        subscriber_id = %conn.subscriber_id,
        "OAuth connection stored"
    );
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use db::{DBService, models::oauth::CreateOAuthService};

    use super::*;

    fn service() -> OAuthService {
        OAuthService {
            id: Uuid::new_v4(),
            name: "google".to_string(),
            display_name: "Google".to_string(),
            authorization_url: "https://accounts.example.com/o/oauth2/auth?access_type=offline"
                .to_string(),
            token_url: "https://accounts.example.com/token".to_string(),
            userinfo_url: None,
            scopes: "openid,email profile".to_string(),
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn connection(expires_at: Option<DateTime<Utc>>) -> OAuthConnection {
        OAuthConnection {
            id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            subscriber_id: "sub-1".to_string(),
            access_token: "ya29.a0AfH6SMBverylongtoken".to_string(),
            refresh_token: None,
            scopes: "openid email".to_string(),
            expires_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_authorization_url_has_required_params() {
        let query = AuthorizeQuery {
            subscriber_id: "sub-1".to_string(),
            redirect_uri: "https://app.example.com/oauth/callback".to_string(),
        };
        let first = authorization_url(&service(), &query).unwrap();
        let second = authorization_url(&service(), &query).unwrap();
        assert_ne!(first.state, second.state);
        assert_eq!(first.state.len(), STATE_LEN);

        let url = Url::parse(&first.url).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["redirect_uri"], "https://app.example.com/oauth/callback");
        assert_eq!(params["scope"], "openid email profile");
        assert_eq!(params["state"], first.state);
    }

    #[test]
    fn test_authorization_url_rejects_bad_redirect_and_disabled() {
        let query = AuthorizeQuery {
            subscriber_id: "sub-1".to_string(),
            redirect_uri: "not a url".to_string(),
        };
        assert!(matches!(authorization_url(&service(), &query), Err(OAuthError::InvalidUrl(_))));

        let mut disabled = service();
        disabled.enabled = false;
        let query = AuthorizeQuery {
            subscriber_id: "sub-1".to_string(),
            redirect_uri: "https://app.example.com/cb".to_string(),
        };
        assert!(matches!(
            authorization_url(&disabled, &query),
            Err(OAuthError::ServiceDisabled(_))
        ));
    }

    #[test]
    fn test_access_token_refused_when_expired() {
        let now = Utc::now();
        assert!(access_token_at(&connection(None), now).is_ok());
        assert!(access_token_at(&connection(Some(now + Duration::hours(1))), now).is_ok());
        assert!(matches!(
            access_token_at(&connection(Some(now - Duration::seconds(1))), now),
            Err(OAuthError::TokenExpired(_))
        ));
    }

    #[test]
    fn test_connection_view_masks_token() {
        let view = OAuthConnectionView::from(&connection(None));
        assert_eq!(view.access_token, "********oken");
        assert_eq!(view.scopes, vec!["openid", "email"]);
    }

    #[tokio::test]
    async fn test_create_connection_requires_service() {
        let db = DBService::new_in_memory().await.unwrap();
        let data = CreateOAuthConnection {
            service_id: Uuid::new_v4(),
            subscriber_id: "sub-1".to_string(),
            access_token: "token".to_string(),
            refresh_token: None,
            scopes: vec![],
            expires_at: None,
        };
        assert!(matches!(
            create_connection(&db.pool, &data).await,
            Err(OAuthError::ServiceNotFound(_))
        ));

        let service = OAuthService::create(
            &db.pool,
            &CreateOAuthService {
                name: "github".to_string(),
                display_name: "GitHub".to_string(),
                authorization_url: "https://github.com/login/oauth/authorize".to_string(),
                token_url: "https://github.com/login/oauth/access_token".to_string(),
                userinfo_url: None,
                scopes: vec!["repo".to_string()],
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                enabled: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let conn = create_connection(
            &db.pool,
            &CreateOAuthConnection {
                service_id: service.id,
                ..data
            },
        )
        .await
        .unwrap();
        assert_eq!(conn.service_id, service.id);
    }
}
