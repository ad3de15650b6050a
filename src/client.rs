//! Async client for the Decaptcher picture-solving service.
//!
//! The client holds two prebuilt `wreq::Client`s: one for the service's own
//! form/multipart POSTs (always direct) and one for fetching challenge images
//! off third-party hosts (optionally through a proxy, with a fixed browser
//! User-Agent).

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info};
use wreq::{Client, StatusCode, header};

use crate::error::Error;
use crate::multipart::{self, MultipartBody};
use crate::proxy::ProxyConfig;
use crate::types::{PicId, SolveResult, parse_solve_response};

/// Default service endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://poster.decaptcher.com/";

const RECAPTCHA_CHALLENGE_URL: &str = "http://www.google.com/recaptcha/api/challenge?k=";
const RECAPTCHA_IMAGE_URL: &str = "http://www.google.com/recaptcha/api/image?c=";

/// User-Agent sent on image and challenge fetches. Some hosts refuse the
/// default library agent.
const USER_AGENT: &str =
    "Mozilla/4.0 (compatible; MSIE 7.0; Windows NT 5.1; .NET CLR 1.1.4322; .NET CLR 2.0.50727)";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

static CHALLENGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"challenge\s+:\s+'(.*?)',").expect("challenge pattern compiles")
});

/// Service account credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Configuration for [`DecaptcherClient`].
#[derive(Debug, Clone)]
pub struct DecaptcherConfig {
    /// Service endpoint. Trailing slash expected.
    pub endpoint: String,
    /// TCP connect timeout for all requests.
    pub connect_timeout: Duration,
    /// Read timeout for service POSTs.
    pub read_timeout: Duration,
    /// Proxy for image and challenge fetches only.
    pub proxy: Option<ProxyConfig>,
}

impl Default for DecaptcherConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            proxy: None,
        }
    }
}

pub struct DecaptcherClient {
    credentials: Credentials,
    endpoint: String,
    /// Client for service POSTs. Never proxied.
    service: Client,
    /// Client for image/challenge GETs. Routed through the proxy when set.
    fetcher: Client,
}

impl DecaptcherClient {
    pub fn new(credentials: Credentials) -> Result<Self, Error> {
        Self::with_config(credentials, DecaptcherConfig::default())
    }

    pub fn with_config(credentials: Credentials, config: DecaptcherConfig) -> Result<Self, Error> {
        let service = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()?;

        let mut fetcher = Client::builder().connect_timeout(config.connect_timeout);
        if let Some(proxy) = &config.proxy {
            fetcher = fetcher.proxy(wreq::Proxy::all(proxy.to_url())?);
        }
        let fetcher = fetcher.build()?;

        Ok(Self {
            credentials,
            endpoint: config.endpoint,
            service,
            fetcher,
        })
    }

    /// Submit raw image bytes for solving.
    pub async fn solve(&self, image: &[u8]) -> Result<SolveResult, Error> {
        let body = MultipartBody::new()
            .text("function", "picture2")
            .text("username", &self.credentials.username)
            .text("password", &self.credentials.password)
            .text("pict_type", "0")
            .text("pict_to", "0")
            .file("pict", "image.jpeg", "image/jpeg", image)
            .finish();

        debug!(
            image_bytes = image.len(),
            body_bytes = body.len(),
            "submitting picture"
        );

        let started = Instant::now();
        let response = self
            .service
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, multipart::content_type())
            .body(body)
            .send()
            .await?
            .text()
            .await?;
        let elapsed = started.elapsed();

        let result = parse_solve_response(&response, elapsed)?;
        info!(
            pic_id = %result.pic_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "picture solved"
        );
        Ok(result)
    }

    /// Fetch an image by URL and submit it for solving.
    pub async fn solve_url(&self, image_url: &str) -> Result<SolveResult, Error> {
        debug!(url = image_url, "fetching image");
        let image = self
            .fetcher
            .get(image_url)
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await?
            .bytes()
            .await?;
        self.solve(&image).await
    }

    /// Solve a reCAPTCHA by site key: fetch the challenge page, extract the
    /// token, then solve the corresponding image.
    pub async fn solve_recaptcha(&self, site_id: &str) -> Result<SolveResult, Error> {
        let challenge_url = format!("{RECAPTCHA_CHALLENGE_URL}{site_id}");
        debug!(url = %challenge_url, "fetching challenge page");
        let response = self
            .fetcher
            .get(&challenge_url)
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await?;
        let status = response.status();
        let page = response.text().await?;

        let token = extract_challenge_token(&page, status)?;
        debug!(token = %token, "challenge token extracted");
        self.solve_url(&format!("{RECAPTCHA_IMAGE_URL}{token}")).await
    }

    /// Report a bad solve and request a refund. Returns the service's raw
    /// response body.
    pub async fn request_refund(&self, pic_id: &str) -> Result<String, Error> {
        let pic_id: PicId = pic_id.parse()?;
        debug!(pic_id = %pic_id, "requesting refund");
        let response = self
            .service
            .post(&self.endpoint)
            .form(&[
                ("function", "picture_bad2"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
                ("major_id", pic_id.major.as_str()),
                ("minor_id", pic_id.minor.as_str()),
            ])
            .send()
            .await?
            .text()
            .await?;
        Ok(response)
    }

    /// Query the account balance. Returns the service's raw response body.
    pub async fn balance(&self) -> Result<String, Error> {
        let response = self
            .service
            .post(&self.endpoint)
            .form(&[
                ("function", "balance"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?
            .text()
            .await?;
        Ok(response)
    }
}

/// Pull the challenge token out of a reCAPTCHA challenge page.
///
/// A missing token on a success status means the page layout changed or the
/// key is bad; on a non-success status the HTTP failure is the better signal.
fn extract_challenge_token(page: &str, status: StatusCode) -> Result<String, Error> {
    match CHALLENGE_RE.captures(page).and_then(|c| c.get(1)) {
        Some(token) => Ok(token.as_str().to_string()),
        None if status.is_success() => Err(Error::Recaptcha),
        None => Err(Error::Status(status.as_u16())),
    }
}
