use super::error::{Result, SheetError};
use super::reader::SheetReader;
use super::writer::{SheetWriter, WriteMode};
use futures::future::BoxFuture;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Base of the public tabular-query endpoint
pub const GVIZ_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";

const USER_AGENT: &str = concat!("sheet_dashboard/", env!("CARGO_PKG_VERSION"));

/// A tab within the spreadsheet, addressed by name or by numeric grid id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetRef {
    Name(String),
    Gid(u64),
}

impl std::fmt::Display for SheetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetRef::Name(name) => write!(f, "{}", name),
            SheetRef::Gid(gid) => write!(f, "gid:{}", gid),
        }
    }
}

/// Build the gviz read URL for a sheet
///
/// `https://docs.google.com/spreadsheets/d/{id}/gviz/tq?tqx=out:json&sheet={name}`
/// (or `&gid={gid}`). The sheet name is form-encoded.
pub fn gviz_url(spreadsheet_id: &str, sheet: &SheetRef) -> Result<Url> {
    if spreadsheet_id.is_empty()
        || !spreadsheet_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(SheetError::Config(format!(
            "Invalid spreadsheet id '{}'",
            spreadsheet_id
        )));
    }

    let base = format!("{}/{}/gviz/tq?tqx=out:json", GVIZ_BASE_URL, spreadsheet_id);
    let mut url = Url::parse(&base)
        .map_err(|e| SheetError::Config(format!("Invalid read URL '{}': {}", base, e)))?;

    match sheet {
        SheetRef::Name(name) => {
            url.query_pairs_mut().append_pair("sheet", name);
        }
        SheetRef::Gid(gid) => {
            url.query_pairs_mut().append_pair("gid", &gid.to_string());
        }
    }

    Ok(url)
}

/// HTTP seam between the sheet client and the network
///
/// The reqwest implementation is used in production; tests substitute an
/// in-memory transport.
pub trait SheetTransport: Send + Sync {
    /// GET the url and return the body text
    fn fetch_text<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String>>;

    /// POST form fields to the url
    ///
    /// Returns the response body in [`WriteMode::Confirmed`]. In
    /// [`WriteMode::FireAndForget`] the response is never inspected and `None`
    /// is returned whenever the send itself succeeded.
    fn post_form<'a>(
        &'a self,
        url: &'a Url,
        fields: &'a [(String, String)],
        mode: WriteMode,
    ) -> BoxFuture<'a, Result<Option<String>>>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| SheetError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpTransport { http })
    }
}

impl SheetTransport for HttpTransport {
    fn fetch_text<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let response = self.http.get(url.clone()).send().await?;
            let response = response.error_for_status()?;
            Ok(response.text().await?)
        })
    }

    fn post_form<'a>(
        &'a self,
        url: &'a Url,
        fields: &'a [(String, String)],
        mode: WriteMode,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let response = self.http.post(url.clone()).form(fields).send().await?;
            match mode {
                WriteMode::FireAndForget => {
                    // Status and body are not inspected in this mode
                    debug!(status = %response.status(), "opaque write sent");
                    Ok(None)
                }
                WriteMode::Confirmed => {
                    let response = response.error_for_status()?;
                    Ok(Some(response.text().await?))
                }
            }
        })
    }
}

/// Client for one spreadsheet: gviz reads plus Apps Script writes
#[derive(Clone)]
pub struct SheetsClient {
    transport: Arc<dyn SheetTransport>,
    spreadsheet_id: String,
    webapp_url: Option<Url>,
}

impl SheetsClient {
    /// Create a client that talks to Google over HTTP
    ///
    /// `webapp_url` may be omitted for read-only use; writes then fail with a
    /// configuration error.
    pub fn connect(spreadsheet_id: String, webapp_url: Option<&str>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Self::with_transport(transport, spreadsheet_id, webapp_url)
    }

    /// Create a client over an arbitrary transport
    pub fn with_transport(
        transport: Arc<dyn SheetTransport>,
        spreadsheet_id: String,
        webapp_url: Option<&str>,
    ) -> Result<Self> {
        // Fail early on an unusable id rather than on the first read
        gviz_url(&spreadsheet_id, &SheetRef::Gid(0))?;

        let webapp_url = webapp_url
            .map(|raw| {
                Url::parse(raw).map_err(|e| {
                    SheetError::Config(format!("Invalid web app URL '{}': {}", raw, e))
                })
            })
            .transpose()?;

        Ok(SheetsClient {
            transport,
            spreadsheet_id,
            webapp_url,
        })
    }

    /// Create a new SheetsClient from environment variables
    ///
    /// Required environment variables:
    /// - `SHEETS_SPREADSHEET_ID`: the spreadsheet id from the sheet URL
    ///
    /// Optional:
    /// - `SHEETS_WEBAPP_URL`: the deployed Apps Script web app URL
    pub fn from_env() -> Result<Self> {
        let spreadsheet_id = std::env::var("SHEETS_SPREADSHEET_ID").map_err(|_| {
            SheetError::Config("SHEETS_SPREADSHEET_ID environment variable not set".into())
        })?;
        let webapp_url = std::env::var("SHEETS_WEBAPP_URL").ok();

        Self::connect(spreadsheet_id, webapp_url.as_deref())
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// The write endpoint, or a configuration error if none was given
    pub fn webapp_url(&self) -> Result<&Url> {
        self.webapp_url
            .as_ref()
            .ok_or_else(|| SheetError::Config("No web app URL configured for writes".into()))
    }

    pub(crate) fn transport(&self) -> &dyn SheetTransport {
        self.transport.as_ref()
    }

    /// Fetch the raw (wrapped) gviz body for a sheet
    pub async fn fetch_raw(&self, sheet: &SheetRef) -> Result<String> {
        let url = gviz_url(&self.spreadsheet_id, sheet)?;
        debug!(sheet = %sheet, %url, "fetching sheet");
        self.transport.fetch_text(&url).await
    }

    pub fn reader(&self) -> SheetReader<'_> {
        SheetReader::new(self)
    }

    pub fn writer(&self, mode: WriteMode) -> SheetWriter<'_> {
        SheetWriter::new(self, mode)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_gviz_url_by_name() {
        let url = gviz_url("abc123", &SheetRef::Name("Dealer List".into())).unwrap();
        assert_eq!(
            url.as_str(),
            "https://docs.google.com/spreadsheets/d/abc123/gviz/tq?tqx=out:json&sheet=Dealer+List"
        );
    }

    #[test]
    fn test_gviz_url_by_gid() {
        let url = gviz_url("abc123", &SheetRef::Gid(42)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://docs.google.com/spreadsheets/d/abc123/gviz/tq?tqx=out:json&gid=42"
        );
    }

    #[test]
    fn test_gviz_url_rejects_bad_id() {
        assert!(matches!(
            gviz_url("abc/../x", &SheetRef::Gid(0)),
            Err(SheetError::Config(_))
        ));
        assert!(gviz_url("", &SheetRef::Gid(0)).is_err());
    }

    #[test]
    fn test_writes_need_webapp_url() {
        let transport = Arc::new(FakeTransport::new());
        let client =
            SheetsClient::with_transport(transport, TEST_SPREADSHEET.to_string(), None).unwrap();
        assert!(matches!(client.webapp_url(), Err(SheetError::Config(_))));
    }

    #[test]
    fn test_invalid_webapp_url() {
        let transport = Arc::new(FakeTransport::new());
        let result =
            SheetsClient::with_transport(transport, TEST_SPREADSHEET.to_string(), Some("not a url"));
        assert!(matches!(result, Err(SheetError::Config(_))));
    }

    #[tokio::test]
    async fn test_fetch_raw_hits_gviz_url() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_read(Ok("body".into()));
        let client = client(transport.clone());

        let body = client
            .fetch_raw(&SheetRef::Name("Dealers".into()))
            .await
            .unwrap();
        assert_eq!(body, "body");

        let fetched = transport.fetched.lock().unwrap().clone();
        assert_eq!(fetched.len(), 1);
        assert!(fetched[0].ends_with("/1AbC-dEf_123/gviz/tq?tqx=out:json&sheet=Dealers"));
    }
}
