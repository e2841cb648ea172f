// Remote comic fetcher module
// Talks to xkcd.com: latest comic, comic by number, and catalog size

use crate::comic::ComicReference;
use crate::error::LockError;
use crate::scrape;
use anyhow::Result;
use log::{debug, warn};
use reqwest::blocking::Client;
use std::sync::Arc;
use std::time::Duration;

/// Budget for downloading the latest comic's image at lock time
pub const LATEST_IMAGE_TIMEOUT: Duration = Duration::from_secs(6);

/// Narrow HTTP seam so the scraping logic can run against canned pages
pub trait PageSource: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, LockError>;

    /// Download raw bytes, optionally bounded by `timeout`
    fn fetch_bytes(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>, LockError>;
}

/// Blocking reqwest client; requests are unbounded unless a timeout is passed
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("xkcdlock/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self { client })
    }

    fn get(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<reqwest::blocking::Response, LockError> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        request
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| fetch_error(url, e))
    }
}

fn fetch_error(url: &str, err: reqwest::Error) -> LockError {
    let reason = if err.is_timeout() {
        "timed out".to_string()
    } else {
        err.to_string()
    };
    LockError::Fetch {
        url: url.to_string(),
        reason,
    }
}

impl PageSource for HttpSource {
    fn fetch_text(&self, url: &str) -> Result<String, LockError> {
        debug!("GET {}", url);
        self.get(url, None)?.text().map_err(|e| fetch_error(url, e))
    }

    fn fetch_bytes(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>, LockError> {
        debug!("GET {} (timeout: {:?})", url, timeout);
        let bytes = self
            .get(url, timeout)?
            .bytes()
            .map_err(|e| fetch_error(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Newest comic as advertised by the landing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestComic {
    pub hotlink_url: String,
    pub number: Option<u32>,
}

/// Scrapes comic metadata from the site through a [`PageSource`]
#[derive(Clone)]
pub struct RemoteComicFetcher {
    source: Arc<dyn PageSource>,
    base_url: String,
}

impl RemoteComicFetcher {
    pub fn new(source: Arc<dyn PageSource>, base_url: &str) -> Self {
        Self {
            source,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn landing_url(&self) -> String {
        format!("{}/", self.base_url)
    }

    fn permalink(&self, number: u32) -> String {
        format!("{}/{}/", self.base_url, number)
    }

    /// Hotlink URL (and number, if present) of the newest comic
    pub fn latest(&self) -> Result<LatestComic, LockError> {
        let url = self.landing_url();
        let page = self.source.fetch_text(&url)?;
        let hotlink_url = scrape::extract_hotlink_url(&page).ok_or(LockError::Parse {
            what: "hotlink URL",
            url: url.clone(),
        })?;
        let number = scrape::extract_comic_number(&page);
        if number.is_none() {
            warn!("Landing page at {} has no permalink, comic number unknown", url);
        }
        Ok(LatestComic { hotlink_url, number })
    }

    /// Image bytes of the latest comic, bounded by [`LATEST_IMAGE_TIMEOUT`]
    pub fn download_latest(&self, comic: &LatestComic) -> Result<Vec<u8>, LockError> {
        self.source
            .fetch_bytes(&comic.hotlink_url, Some(LATEST_IMAGE_TIMEOUT))
    }

    /// Image bytes with no time bound
    pub fn download(&self, url: &str) -> Result<Vec<u8>, LockError> {
        self.source.fetch_bytes(url, None)
    }

    /// Hotlink URL and caption of one comic from its permalink page
    pub fn by_number(&self, number: u32) -> Result<ComicReference, LockError> {
        let url = self.permalink(number);
        let page = self.source.fetch_text(&url)?;
        let meta = scrape::extract_metadata(&page);
        if let Some(found) = meta.number.filter(|found| *found != number) {
            warn!("Page {} claims to be comic {}", url, found);
        }
        let hotlink_url = meta.hotlink_url.ok_or(LockError::Parse {
            what: "hotlink URL",
            url,
        })?;
        Ok(ComicReference::new(
            number,
            hotlink_url,
            meta.caption.unwrap_or_default(),
        ))
    }

    /// Number of the newest comic, the upper bound for bulk enumeration
    pub fn catalog_size(&self) -> Result<u32, LockError> {
        let url = self.landing_url();
        let page = self
            .source
            .fetch_text(&url)
            .map_err(|e| LockError::CatalogSize(e.to_string()))?;
        scrape::extract_comic_number(&page)
            .ok_or_else(|| LockError::CatalogSize(format!("no permalink in page from {}", url)))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const BASE: &str = "https://xkcd.test";

    fn fetcher(site: FakeSite) -> (Arc<FakeSite>, RemoteComicFetcher) {
        let site = Arc::new(site);
        (site.clone(), RemoteComicFetcher::new(site, BASE))
    }

    #[test]
    fn latest_reads_the_landing_page() {
        let (_, fetcher) = fetcher(
            FakeSite::default().page("https://xkcd.test/", include_str!("../testdata/xkcd_landing.html")),
        );
        assert_eq!(
            fetcher.latest().unwrap(),
            LatestComic {
                hotlink_url: "https://imgs.xkcd.com/comics/ferris_wheels.png".to_string(),
                number: Some(2961),
            }
        );
    }

    #[test]
    fn latest_download_is_time_bounded() {
        let (site, fetcher) = fetcher(FakeSite::default().file("https://img.test/a.png", vec![1, 2, 3]));
        let latest = LatestComic {
            hotlink_url: "https://img.test/a.png".to_string(),
            number: None,
        };
        assert_eq!(fetcher.download_latest(&latest).unwrap(), vec![1, 2, 3]);
        fetcher.download("https://img.test/a.png").unwrap();
        assert_eq!(
            *site.timeouts.lock().unwrap(),
            vec![Some(Duration::from_secs(6)), None]
        );
    }

    #[test]
    fn latest_without_anchor_is_a_recoverable_parse_error() {
        let (_, fetcher) = fetcher(FakeSite::default().page("https://xkcd.test/", "<html>maintenance</html>"));
        let err = fetcher.latest().unwrap_err();
        assert!(matches!(err, LockError::Parse { what: "hotlink URL", .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn by_number_fetches_the_permalink() {
        let (_, fetcher) = fetcher(
            FakeSite::default().page("https://xkcd.test/353/", include_str!("../testdata/xkcd_353.html")),
        );
        let comic = fetcher.by_number(353).unwrap();
        assert_eq!(comic.number, 353);
        assert_eq!(comic.hotlink_url, "https://imgs.xkcd.com/comics/python.png");
        assert!(comic.caption.ends_with("Perl, I'm leaving you."));
    }

    #[test]
    fn catalog_size_failures_are_fatal_kind() {
        let (_, offline) = fetcher(FakeSite::default());
        assert!(matches!(offline.catalog_size(), Err(LockError::CatalogSize(_))));

        let (_, fetcher) = fetcher(
            FakeSite::default().page("https://xkcd.test/", include_str!("../testdata/xkcd_landing.html")),
        );
        assert_eq!(fetcher.catalog_size().unwrap(), 2961);
    }
}
