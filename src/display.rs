// Display geometry module
// Reports connected display resolutions and picks the compositing canvas

use crate::error::LockError;
use anyhow::Result;
use log::debug;
use std::ffi::OsStr;
use std::fmt;
use std::str::FromStr;

/// Resolution of one display, used as the compositing canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
}

impl ScreenGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Box the comic is resized into so the composite keeps clear of the edges
    pub fn target_size(&self, padding: u32) -> Result<(u32, u32), LockError> {
        let invalid = || LockError::InvalidGeometry {
            width: self.width,
            height: self.height,
            padding,
        };
        let width = self.width.checked_sub(padding).filter(|w| *w > 0).ok_or_else(invalid)?;
        let height = self.height.checked_sub(padding).filter(|h| *h > 0).ok_or_else(invalid)?;
        Ok((width, height))
    }
}

impl fmt::Display for ScreenGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for ScreenGeometry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("invalid screen size '{}', expected WIDTHxHEIGHT", s))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
        if width == 0 || height == 0 {
            return Err("screen dimensions must be positive".to_string());
        }
        Ok(Self { width, height })
    }
}

/// Anything that can list the resolutions of the connected displays
pub trait DisplaySource {
    fn resolutions(&self) -> Result<Vec<ScreenGeometry>>;
}

/// A display list fixed up front, from `--screen` or a test
#[derive(Debug, Clone)]
pub struct FixedDisplay(pub Vec<ScreenGeometry>);

impl DisplaySource for FixedDisplay {
    fn resolutions(&self) -> Result<Vec<ScreenGeometry>> {
        Ok(self.0.clone())
    }
}

/// Display servers that can report monitor sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    Wayland,
    X11,
}

/// Servers to ask, in order, given the session's `WAYLAND_DISPLAY`.
/// X11 is always last: i3lock sessions and XWayland both answer there.
pub fn server_order(wayland_display: Option<&OsStr>) -> Vec<DisplayServer> {
    match wayland_display {
        Some(name) if !name.is_empty() => vec![DisplayServer::Wayland, DisplayServer::X11],
        _ => vec![DisplayServer::X11],
    }
}

/// Asks each source in turn; the first non-empty answer wins
pub struct FirstAvailable(pub Vec<Box<dyn DisplaySource>>);

impl DisplaySource for FirstAvailable {
    fn resolutions(&self) -> Result<Vec<ScreenGeometry>> {
        let mut last_err = None;
        for source in &self.0 {
            match source.resolutions() {
                Ok(screens) if !screens.is_empty() => return Ok(screens),
                Ok(_) => debug!("Display source reported no screens, trying the next"),
                Err(e) => {
                    debug!("Display source failed ({:#}), trying the next", e);
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }
}

/// Largest connected display by area; this is the canvas the pipeline uses
pub fn max_area(source: &dyn DisplaySource) -> Result<ScreenGeometry> {
    let screens = source.resolutions()?;
    debug!("Connected displays: {:?}", screens);
    Ok(screens
        .into_iter()
        .max_by_key(ScreenGeometry::area)
        .ok_or(LockError::NoDisplay)?)
}

/// Smallest connected display by area
#[allow(dead_code)]
pub fn min_area(source: &dyn DisplaySource) -> Result<ScreenGeometry> {
    Ok(source
        .resolutions()?
        .into_iter()
        .min_by_key(ScreenGeometry::area)
        .ok_or(LockError::NoDisplay)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual_head() -> FixedDisplay {
        FixedDisplay(vec![
            ScreenGeometry::new(1920, 1080),
            ScreenGeometry::new(2560, 1440),
            ScreenGeometry::new(1280, 1024),
        ])
    }

    #[test]
    fn picks_largest_and_smallest_display() {
        assert_eq!(max_area(&dual_head()).unwrap(), ScreenGeometry::new(2560, 1440));
        assert_eq!(min_area(&dual_head()).unwrap(), ScreenGeometry::new(1280, 1024));
    }

    #[test]
    fn no_displays_is_an_error() {
        let err = max_area(&FixedDisplay(Vec::new())).unwrap_err();
        assert!(matches!(err.downcast_ref::<LockError>(), Some(LockError::NoDisplay)));
    }

    struct Unreachable;

    impl DisplaySource for Unreachable {
        fn resolutions(&self) -> Result<Vec<ScreenGeometry>> {
            anyhow::bail!("Failed to connect to display server")
        }
    }

    #[test]
    fn wayland_is_only_tried_inside_a_wayland_session() {
        use DisplayServer::*;

        assert_eq!(server_order(None), vec![X11]);
        assert_eq!(server_order(Some(OsStr::new(""))), vec![X11]);
        assert_eq!(server_order(Some(OsStr::new("wayland-1"))), vec![Wayland, X11]);
    }

    #[test]
    fn falls_through_to_the_next_source() {
        let chain = FirstAvailable(vec![
            Box::new(Unreachable),
            Box::new(FixedDisplay(Vec::new())),
            Box::new(dual_head()),
        ]);
        assert_eq!(max_area(&chain).unwrap(), ScreenGeometry::new(2560, 1440));
    }

    #[test]
    fn last_failure_is_reported_when_nothing_answers() {
        let chain = FirstAvailable(vec![Box::new(FixedDisplay(Vec::new())), Box::new(Unreachable)]);
        let err = max_area(&chain).unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));

        let quiet = FirstAvailable(vec![Box::new(FixedDisplay(Vec::new()))]);
        let err = max_area(&quiet).unwrap_err();
        assert!(matches!(err.downcast_ref::<LockError>(), Some(LockError::NoDisplay)));
    }

    #[test]
    fn target_size_subtracts_padding() {
        for (w, h) in [(1920, 1080), (101, 101), (3840, 2160), (800, 600)] {
            let (tw, th) = ScreenGeometry::new(w, h).target_size(100).unwrap();
            assert_eq!((tw, th), (w - 100, h - 100));
            assert!(tw > 0 && th > 0);
        }
    }

    #[test]
    fn target_size_rejects_screens_smaller_than_padding() {
        assert!(ScreenGeometry::new(100, 1080).target_size(100).is_err());
        assert!(ScreenGeometry::new(1920, 40).target_size(100).is_err());
        assert_eq!(ScreenGeometry::new(1, 1).target_size(0).unwrap(), (1, 1));
    }

    #[test]
    fn parses_screen_argument() {
        assert_eq!("1920x1080".parse::<ScreenGeometry>().unwrap(), ScreenGeometry::new(1920, 1080));
        assert_eq!("800X600".parse::<ScreenGeometry>().unwrap(), ScreenGeometry::new(800, 600));
        assert!("1920".parse::<ScreenGeometry>().is_err());
        assert!("0x600".parse::<ScreenGeometry>().is_err());
    }
}
