// Appending the submissions to an online spreadsheet.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::survey::*;

const SHEET_SINK: &str = "Google Sheets";

/// The three operations the spreadsheet sink needs from a sheet.
pub trait SheetClient {
    /// The first row of the sheet. Empty for a new sheet.
    fn read_header(&mut self) -> Result<Vec<String>, SinkError>;

    fn write_header(&mut self, header: &[String]) -> Result<(), SinkError>;

    fn append_row(&mut self, row: &[String]) -> Result<(), SinkError>;
}

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Tokens are renewed this long before their announced expiry.
const TOKEN_MARGIN_SECS: i64 = 60;

/// The credentials file: either a service account key, as downloaded from the
/// cloud console, or a JSON object with a ready-made `access_token`.
#[derive(Debug, Clone, Default, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    client_email: Option<String>,
    private_key: Option<String>,
    private_key_id: Option<String>,
    token_uri: Option<String>,
    access_token: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    private_key_id: Option<String>,
    token_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Credentials {
    ServiceAccount(ServiceAccountKey),
    Token(String),
}

impl CredentialsFile {
    fn into_credentials(self) -> Option<Credentials> {
        match (self.client_email, self.private_key, self.access_token) {
            (Some(client_email), Some(private_key), _) => {
                Some(Credentials::ServiceAccount(ServiceAccountKey {
                    client_email,
                    private_key,
                    private_key_id: self.private_key_id,
                    token_uri: self
                        .token_uri
                        .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
                }))
            }
            (_, _, Some(token)) => Some(Credentials::Token(token)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AccessToken {
    token: String,
    /// `None` for a token given in the credentials file.
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| now < t).unwrap_or(true)
    }
}

/// The signed JWT a service account trades for an access token.
fn signed_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String, SinkError> {
    let claims = AssertionClaims {
        iss: key.client_email.clone(),
        scope: SHEETS_SCOPE.to_string(),
        aud: key.token_uri.clone(),
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SinkError::new(SHEET_SINK, format!("invalid private_key: {}", e)))?;
    encode(&header, &claims, &encoding_key)
        .map_err(|e| SinkError::new(SHEET_SINK, format!("signing the assertion failed: {}", e)))
}

fn request_token(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<AccessToken, SinkError> {
    let assertion = signed_assertion(key, now)?;
    let body = format!(
        "grant_type={}&assertion={}",
        urlencoded(JWT_BEARER_GRANT),
        urlencoded(&assertion)
    );
    let agent = ureq::Agent::new_with_defaults();
    let response = agent
        .post(&key.token_uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .send(body.as_str())
        .map_err(|e| http_error("the token exchange", e))?;
    let tr: TokenResponse = response
        .into_body()
        .read_json()
        .map_err(|e| http_error("the token exchange", e))?;
    let lifetime = tr.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS) - TOKEN_MARGIN_SECS;
    info!(
        "HttpSheetClient: access token for {} valid for {}s",
        key.client_email, lifetime
    );
    Ok(AccessToken {
        token: tr.access_token,
        expires_at: Some(now + Duration::seconds(lifetime.max(0))),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JSValue>>,
}

fn cell_text(v: &JSValue) -> String {
    match v {
        JSValue::String(s) => s.clone(),
        JSValue::Null => "".to_string(),
        x => x.to_string(),
    }
}

/// Percent-encodes a path segment or a query value.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(ch),
            _ => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).as_bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    out
}

/// A1 notation, with the sheet name quoted.
fn sheet_range(sheet_name: &str, cells: &str) -> String {
    format!("'{}'!{}", sheet_name.replace('\'', "''"), cells)
}

/// The Sheets values API over HTTP.
///
/// The credentials file is read on first use, so that a missing file only
/// fails the spreadsheet sink. With a service account key, the access token is
/// requested from the key's `token_uri` and reused until it expires.
pub struct HttpSheetClient {
    settings: SheetSettings,
    credentials: Option<Credentials>,
    file_endpoint: Option<String>,
    token: Option<AccessToken>,
}

impl HttpSheetClient {
    pub fn new(settings: &SheetSettings) -> HttpSheetClient {
        HttpSheetClient {
            settings: settings.clone(),
            credentials: None,
            file_endpoint: None,
            token: None,
        }
    }

    fn credentials(&mut self) -> Result<Credentials, SinkError> {
        if let Some(c) = &self.credentials {
            return Ok(c.clone());
        }
        let path = &self.settings.credentials_path;
        let contents = fs::read_to_string(path)
            .map_err(|e| SinkError::new(SHEET_SINK, format!("{}: {}", path.display(), e)))?;
        let file: CredentialsFile = serde_json::from_str(&contents)
            .map_err(|e| SinkError::new(SHEET_SINK, format!("{}: {}", path.display(), e)))?;
        debug!(
            "HttpSheetClient: credentials of type {:?} read from {:?}",
            file.kind, path
        );
        self.file_endpoint = file.endpoint.clone();
        let c = file.into_credentials().ok_or_else(|| {
            SinkError::new(
                SHEET_SINK,
                format!(
                    "{}: expected a service account key (client_email, private_key) or an access_token",
                    path.display()
                ),
            )
        })?;
        self.credentials = Some(c.clone());
        Ok(c)
    }

    fn access_token(&mut self) -> Result<String, SinkError> {
        let now = Utc::now();
        if let Some(t) = &self.token {
            if t.is_fresh(now) {
                return Ok(t.token.clone());
            }
            debug!("HttpSheetClient: access token expired, requesting a new one");
        }
        let token = match self.credentials()? {
            Credentials::Token(token) => AccessToken {
                token,
                expires_at: None,
            },
            Credentials::ServiceAccount(key) => request_token(&key, now)?,
        };
        self.token = Some(token.clone());
        Ok(token.token)
    }

    fn values_url(&mut self, cells: &str, suffix: &str) -> Result<(String, String), SinkError> {
        let token = self.access_token()?;
        let endpoint = self
            .settings
            .endpoint
            .clone()
            .or_else(|| self.file_endpoint.clone())
            .unwrap_or_else(|| DEFAULT_SHEETS_ENDPOINT.to_string());
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            endpoint.trim_end_matches('/'),
            urlencoded(&self.settings.spreadsheet_id),
            urlencoded(&sheet_range(&self.settings.sheet_name, cells)),
            suffix
        );
        Ok((url, format!("Bearer {}", token)))
    }
}

fn http_error(operation: &str, e: ureq::Error) -> SinkError {
    SinkError::new(SHEET_SINK, format!("{} failed: {}", operation, e))
}

impl SheetClient for HttpSheetClient {
    fn read_header(&mut self) -> Result<Vec<String>, SinkError> {
        let (url, auth) = self.values_url("A1:1", "")?;
        let agent = ureq::Agent::new_with_defaults();
        let response = agent
            .get(&url)
            .header("Authorization", auth)
            .call()
            .map_err(|e| http_error("reading the header", e))?;
        let vr: ValueRange = response
            .into_body()
            .read_json()
            .map_err(|e| http_error("reading the header", e))?;
        Ok(vr
            .values
            .first()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default())
    }

    fn write_header(&mut self, header: &[String]) -> Result<(), SinkError> {
        let (url, auth) = self.values_url("A1", "?valueInputOption=RAW")?;
        let body = serde_json::json!({ "values": [header] });
        let agent = ureq::Agent::new_with_defaults();
        agent
            .put(&url)
            .header("Authorization", auth)
            .send_json(&body)
            .map_err(|e| http_error("writing the header", e))?;
        Ok(())
    }

    fn append_row(&mut self, row: &[String]) -> Result<(), SinkError> {
        let (url, auth) = self.values_url(
            "A1",
            ":append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
        )?;
        let body = serde_json::json!({ "values": [row] });
        let agent = ureq::Agent::new_with_defaults();
        agent
            .post(&url)
            .header("Authorization", auth)
            .send_json(&body)
            .map_err(|e| http_error("appending the row", e))?;
        Ok(())
    }
}

/// Appends each record as one row of a sheet.
///
/// The sheet gets the record keys as header when it is empty. Otherwise the
/// row follows the existing header, with unknown keys at the end.
pub struct SpreadsheetSink<C: SheetClient> {
    client: C,
}

impl<C: SheetClient> SpreadsheetSink<C> {
    pub fn new(client: C) -> SpreadsheetSink<C> {
        SpreadsheetSink { client }
    }
}

impl<C: SheetClient> RecordSink for SpreadsheetSink<C> {
    fn name(&self) -> &str {
        SHEET_SINK
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Remote
    }

    fn write(&mut self, record: &SubmissionRecord) -> Result<Vec<String>, SinkError> {
        let mut notices: Vec<String> = Vec::new();
        let mut header = self.client.read_header()?;
        while header.last().map(|h| h.is_empty()) == Some(true) {
            header.pop();
        }
        let row = if header.is_empty() {
            let keys: Vec<String> = record.keys().iter().map(|k| k.to_string()).collect();
            self.client.write_header(&keys)?;
            info!("SpreadsheetSink: header written ({} columns)", keys.len());
            record.values().iter().map(|v| v.to_string()).collect()
        } else {
            let (row, extra) = sinks::row_for_header(record, &header);
            notices.extend(sinks::drift_notice(record, &header, &extra, "the sheet"));
            row
        };
        self.client.append_row(&row)?;
        Ok(notices)
    }
}
