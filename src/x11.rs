// X11 integration module
// Lists monitor sizes through RandR, falling back to the root window

use crate::display::{DisplaySource, ScreenGeometry};
use anyhow::{Context, Result};
use log::debug;
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;

/// Queries the X server named by `DISPLAY`
#[derive(Debug, Default)]
pub struct X11Displays;

impl DisplaySource for X11Displays {
    fn resolutions(&self) -> Result<Vec<ScreenGeometry>> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X server")?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .context("X server has no such screen")?;

        // RandR 1.5 reports one entry per active monitor
        let monitors = match conn.randr_get_monitors(screen.root, true) {
            Ok(cookie) => cookie.reply().map(|reply| reply.monitors),
            Err(e) => Err(e.into()),
        };
        let screens = match monitors {
            Ok(monitors) => usable(monitors.iter().map(|m| (m.width, m.height))),
            Err(e) => {
                debug!("RandR monitor query failed: {}", e);
                Vec::new()
            }
        };
        if !screens.is_empty() {
            debug!("RandR reported {} monitor(s)", screens.len());
            return Ok(screens);
        }

        // No RandR: the root window spans every monitor
        debug!(
            "Using root window size {}x{}",
            screen.width_in_pixels, screen.height_in_pixels
        );
        Ok(usable([(screen.width_in_pixels, screen.height_in_pixels)]))
    }
}

/// Sizes with a real area, in server order
fn usable(sizes: impl IntoIterator<Item = (u16, u16)>) -> Vec<ScreenGeometry> {
    sizes
        .into_iter()
        .filter(|&(width, height)| width > 0 && height > 0)
        .map(|(width, height)| ScreenGeometry::new(width.into(), height.into()))
        .collect()
}
