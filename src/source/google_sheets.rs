//! Google Sheets v4 reader authenticated with a service account.

use super::{pad_rows, SheetReader, SourceError};
use crate::config::SheetSettings;
use anyhow::{Context, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct ValueRange {
    values: Option<Vec<Vec<JsonValue>>>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct GoogleSheetReader {
    client: Client,
    spreadsheet_id: String,
    client_email: String,
    token_uri: String,
    encoding_key: EncodingKey,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetReader {
    pub fn new(settings: &SheetSettings) -> Result<Self> {
        Self::for_spreadsheet(&settings.spreadsheet_id, &settings.service_account_key)
    }

    /// Reader for another spreadsheet shared with the same service account.
    pub fn for_spreadsheet(spreadsheet_id: &str, key_path: &Path) -> Result<Self> {
        let key = load_key(key_path)?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Service account private key is not a valid RSA PEM")?;

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.to_string(),
            client_email: key.client_email,
            token_uri: key
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            encoding_key,
            token: Mutex::new(None),
        })
    }

    fn access_token(&self) -> Result<String, SourceError> {
        let mut cached = self
            .token
            .lock()
            .map_err(|_| SourceError::Auth("token cache lock poisoned".to_string()))?;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.fetch_token()?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn fetch_token(&self) -> Result<CachedToken, SourceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SourceError::Auth(e.to_string()))?
            .as_secs() as i64;
        let claims = Claims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )
        .map_err(|e| SourceError::Auth(e.to_string()))?;

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()?;
        if !response.status().is_success() {
            return Err(SourceError::Auth(format!(
                "token endpoint returned status {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        debug!("Obtained sheets access token for {}", self.client_email);
        Ok(CachedToken {
            token: body.access_token,
            expires_at: Instant::now()
                + Duration::from_secs(body.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64)),
        })
    }
}

impl SheetReader for GoogleSheetReader {
    fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SourceError> {
        let token = self.access_token()?;
        let url = format!(
            "{}/{}/values/{}",
            SHEETS_API_BASE,
            self.spreadsheet_id,
            urlencoding::encode(range)
        );

        let response = self.client.get(&url).bearer_auth(token).send()?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status().as_u16(),
                range: range.to_string(),
            });
        }

        let body: ValueRange = response
            .json()
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        let rows = body
            .values
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect();
        Ok(pad_rows(rows))
    }
}

fn load_key(path: &Path) -> Result<ServiceAccountKey> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read service account key: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse service account key: {:?}", path))
}

fn cell_to_string(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}
