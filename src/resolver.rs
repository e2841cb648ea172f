// Image source resolver module
// Decides which raw image the pipeline gets: explicit, random or latest

use crate::comic::ComicReference;
use crate::config::SelectionMode;
use crate::error::LockError;
use crate::fetcher::RemoteComicFetcher;
use crate::image_loader::{self, extension_for, ImageAsset};
use anyhow::{Context, Result};
use log::{info, warn};
use rand::seq::SliceRandom;
use std::fs;
use std::path::{Path, PathBuf};

/// Shipped with the binary and written out on first use
const BUNDLED_DEFAULT: &[u8] = include_bytes!("../assets/default.png");

/// Raw image chosen for this invocation
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub asset: ImageAsset,
    /// Absent when the default image stood in for a failed fetch
    pub comic: Option<ComicReference>,
}

pub struct ImageSourceResolver<'a> {
    fetcher: &'a RemoteComicFetcher,
    image_dir: &'a Path,
    default_image: &'a Path,
    /// Where a downloaded latest comic is stored for the pipeline
    scratch: &'a Path,
}

impl<'a> ImageSourceResolver<'a> {
    pub fn new(
        fetcher: &'a RemoteComicFetcher,
        image_dir: &'a Path,
        default_image: &'a Path,
        scratch: &'a Path,
    ) -> Self {
        Self {
            fetcher,
            image_dir,
            default_image,
            scratch,
        }
    }

    pub fn resolve(&self, mode: &SelectionMode) -> Result<ResolvedImage> {
        match mode {
            SelectionMode::Explicit(path) => self.explicit(path),
            SelectionMode::Random => self.random(),
            SelectionMode::Latest => self.latest(),
        }
    }

    fn explicit(&self, path: &Path) -> Result<ResolvedImage> {
        if !path.is_file() {
            return Err(LockError::MissingAsset(path.to_path_buf()).into());
        }
        Ok(ResolvedImage {
            asset: ImageAsset::new(path),
            comic: ComicReference::from_file_name(path),
        })
    }

    fn random(&self) -> Result<ResolvedImage> {
        if !self.image_dir.is_dir() {
            return Err(LockError::MissingDirectory(self.image_dir.to_path_buf()).into());
        }
        let images = match image_loader::collect_images(self.image_dir) {
            Ok(images) => images,
            Err(e) => {
                warn!("{:#}", e);
                Vec::new()
            }
        };
        let pick = images
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| LockError::NoImageFound(self.image_dir.to_path_buf()))?;
        info!("Picked {} of {} local images", pick.display(), images.len());

        Ok(ResolvedImage {
            asset: ImageAsset::new(pick),
            comic: ComicReference::from_file_name(pick),
        })
    }

    /// Never fails because of the network; any problem yields the default image
    fn latest(&self) -> Result<ResolvedImage> {
        match self.fetch_latest() {
            Ok(resolved) => Ok(resolved),
            Err(e) => {
                let network = e
                    .downcast_ref::<LockError>()
                    .map_or(false, LockError::is_recoverable);
                if network {
                    warn!("Could not fetch the latest comic ({}), using the default image", e);
                } else {
                    warn!("Latest comic is unusable ({:#}), using the default image", e);
                }
                self.default()
            }
        }
    }

    fn fetch_latest(&self) -> Result<ResolvedImage> {
        let latest = self.fetcher.latest()?;
        info!("Latest comic: {:?} at {}", latest.number, latest.hotlink_url);

        let bytes = self.fetcher.download_latest(&latest)?;
        let format = image::guess_format(&bytes).map_err(|_| LockError::Parse {
            what: "image data",
            url: latest.hotlink_url.clone(),
        })?;
        let path = self.scratch.join(format!("latest.{}", extension_for(format)));
        fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let comic = latest.number.map(|number| {
            let caption = match self.fetcher.by_number(number) {
                Ok(comic) => comic.caption,
                Err(e) => {
                    warn!("No caption for comic {}: {}", number, e);
                    String::new()
                }
            };
            ComicReference::new(number, latest.hotlink_url.clone(), caption)
        });

        Ok(ResolvedImage {
            asset: ImageAsset::new(path),
            comic,
        })
    }

    fn default(&self) -> Result<ResolvedImage> {
        let path = ensure_default_image(self.default_image)?;
        Ok(ResolvedImage {
            asset: ImageAsset::new(path),
            comic: None,
        })
    }
}

/// Write the bundled default image to `path` unless it is already there
pub fn ensure_default_image(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        fs::write(path, BUNDLED_DEFAULT)
            .with_context(|| format!("Failed to write default image to {}", path.display()))?;
        info!("Installed default image at {}", path.display());
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::{comic_page, encoded_image, FakeSite};
    use image::ImageFormat;
    use std::sync::Arc;

    const BASE: &str = "https://xkcd.test";

    struct Fixture {
        _dirs: tempfile::TempDir,
        images: PathBuf,
        default_image: PathBuf,
        scratch: PathBuf,
        fetcher: RemoteComicFetcher,
    }

    fn fixture(site: FakeSite) -> Fixture {
        let dirs = tempfile::tempdir().unwrap();
        let images = dirs.path().join("images");
        let scratch = dirs.path().join("scratch");
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&scratch).unwrap();
        Fixture {
            default_image: dirs.path().join("data").join("default.png"),
            images,
            scratch,
            fetcher: RemoteComicFetcher::new(Arc::new(site), BASE),
            _dirs: dirs,
        }
    }

    impl Fixture {
        fn resolver(&self) -> ImageSourceResolver<'_> {
            ImageSourceResolver::new(&self.fetcher, &self.images, &self.default_image, &self.scratch)
        }
    }

    #[test]
    fn explicit_path_must_exist() {
        let fx = fixture(FakeSite::default());
        let missing = fx.images.join("nope.png");
        let err = fx
            .resolver()
            .resolve(&SelectionMode::Explicit(missing.clone()))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<LockError>(), Some(LockError::MissingAsset(p)) if *p == missing));

        let present = fx.images.join("xkcd-0042.png");
        fs::write(&present, b"x").unwrap();
        let resolved = fx.resolver().resolve(&SelectionMode::Explicit(present.clone())).unwrap();
        assert_eq!(resolved.asset.path, present);
        assert_eq!(resolved.comic.map(|c| c.number), Some(42));
    }

    #[test]
    fn random_picks_an_existing_file_from_the_directory() {
        let fx = fixture(FakeSite::default());
        for name in ["xkcd-0001.png", "xkcd-0002.png", "holiday.jpg"] {
            fs::write(fx.images.join(name), b"x").unwrap();
        }
        fs::write(fx.images.join("README"), b"not an image").unwrap();

        for _ in 0..20 {
            let resolved = fx.resolver().resolve(&SelectionMode::Random).unwrap();
            assert!(resolved.asset.exists());
            assert_eq!(resolved.asset.path.parent(), Some(fx.images.as_path()));
            assert_ne!(resolved.asset.path.file_name().unwrap(), "README");
        }
    }

    #[test]
    fn random_on_empty_or_missing_directory_fails() {
        let fx = fixture(FakeSite::default());
        let err = fx.resolver().resolve(&SelectionMode::Random).unwrap_err();
        assert!(matches!(err.downcast_ref::<LockError>(), Some(LockError::NoImageFound(_))));

        fs::remove_dir(&fx.images).unwrap();
        let err = fx.resolver().resolve(&SelectionMode::Random).unwrap_err();
        assert!(matches!(err.downcast_ref::<LockError>(), Some(LockError::MissingDirectory(_))));
    }

    #[test]
    fn latest_downloads_image_and_caption() {
        let hotlink = "https://imgs.test/comics/newest.png";
        let landing = comic_page(2961, hotlink, "on the landing page");
        let permalink = comic_page(2961, hotlink, "Title text &amp; all");
        let fx = fixture(
            FakeSite::default()
                .page("https://xkcd.test/", &landing)
                .page("https://xkcd.test/2961/", &permalink)
                .file(hotlink, encoded_image(ImageFormat::Png, 8, 8)),
        );

        let resolved = fx.resolver().resolve(&SelectionMode::Latest).unwrap();
        assert_eq!(resolved.asset.path, fx.scratch.join("latest.png"));
        assert!(resolved.asset.exists());
        assert_eq!(
            resolved.comic,
            Some(ComicReference::new(2961, hotlink, "Title text & all"))
        );
    }

    #[test]
    fn latest_falls_back_when_the_network_is_down() {
        let fx = fixture(FakeSite::default());
        let resolved = fx.resolver().resolve(&SelectionMode::Latest).unwrap();
        assert_eq!(resolved.asset.path, fx.default_image);
        assert!(resolved.asset.exists());
        assert!(resolved.comic.is_none());
    }

    #[test]
    fn latest_falls_back_when_the_page_has_no_hotlink() {
        let fx = fixture(FakeSite::default().page("https://xkcd.test/", "<html><body>redesigned!</body></html>"));
        let resolved = fx.resolver().resolve(&SelectionMode::Latest).unwrap();
        assert_eq!(resolved.asset.path, fx.default_image);
        assert!(resolved.comic.is_none());
    }

    #[test]
    fn latest_falls_back_when_the_download_is_not_an_image() {
        let hotlink = "https://imgs.test/comics/broken.png";
        let fx = fixture(
            FakeSite::default()
                .page("https://xkcd.test/", &comic_page(7, hotlink, "t"))
                .file(hotlink, b"<html>404</html>".to_vec()),
        );
        let resolved = fx.resolver().resolve(&SelectionMode::Latest).unwrap();
        assert_eq!(resolved.asset.path, fx.default_image);
    }

    #[test]
    fn missing_caption_keeps_the_image() {
        let hotlink = "https://imgs.test/comics/newest.jpg";
        let fx = fixture(
            FakeSite::default()
                .page("https://xkcd.test/", &comic_page(10, hotlink, "t"))
                .file(hotlink, encoded_image(ImageFormat::Jpeg, 8, 8)),
        );
        let resolved = fx.resolver().resolve(&SelectionMode::Latest).unwrap();
        assert_eq!(resolved.asset.path, fx.scratch.join("latest.jpg"));
        let comic = resolved.comic.unwrap();
        assert_eq!(comic.number, 10);
        assert!(comic.caption.is_empty());
    }

    #[test]
    fn default_image_is_installed_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("default.png");
        ensure_default_image(&path).unwrap();
        let img = image_loader::load_image(&path).unwrap();
        assert!(img.width() > 0);

        fs::write(&path, b"customised").unwrap();
        ensure_default_image(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"customised");
    }
}
