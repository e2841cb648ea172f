// Wayland integration module
// Lists connected outputs using smithay-client-toolkit

use crate::display::{DisplaySource, ScreenGeometry};
use anyhow::{Context, Result};
use log::debug;
use smithay_client_toolkit::{
    delegate_output, delegate_registry,
    output::{OutputHandler, OutputInfo, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
};
use wayland_client::{
    globals::registry_queue_init,
    protocol::wl_output::{self, Transform},
    Connection, QueueHandle,
};

/// Minimal client state: just enough globals to receive output events
struct OutputLister {
    registry_state: RegistryState,
    output_state: OutputState,
}

impl OutputHandler for OutputLister {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output updated");
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl ProvidesRegistryState for OutputLister {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState];
}

delegate_output!(OutputLister);
delegate_registry!(OutputLister);

/// Queries the compositor named by `WAYLAND_DISPLAY`
#[derive(Debug, Default)]
pub struct WaylandDisplays;

impl DisplaySource for WaylandDisplays {
    fn resolutions(&self) -> Result<Vec<ScreenGeometry>> {
        let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;
        let (globals, mut event_queue) =
            registry_queue_init(&conn).context("Failed to initialize registry")?;
        let qh = event_queue.handle();

        let mut lister = OutputLister {
            registry_state: RegistryState::new(&globals),
            output_state: OutputState::new(&globals, &qh),
        };

        // First roundtrip binds the outputs, the second delivers their modes
        event_queue.roundtrip(&mut lister)?;
        event_queue.roundtrip(&mut lister)?;

        let screens: Vec<ScreenGeometry> = lister
            .output_state
            .outputs()
            .filter_map(|output| lister.output_state.info(&output))
            .filter_map(|info| output_geometry(&info))
            .collect();
        debug!("Wayland reported {} output(s)", screens.len());
        Ok(screens)
    }
}

/// Current mode of an output, or its first advertised mode, as the user sees it
fn output_geometry(info: &OutputInfo) -> Option<ScreenGeometry> {
    let mode = info
        .modes
        .iter()
        .find(|m| m.current)
        .or_else(|| info.modes.first())?;
    let (width, height) = oriented(mode.dimensions, info.transform);
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(ScreenGeometry::new(width as u32, height as u32))
}

/// Modes are reported in panel orientation; quarter turns swap the axes
fn oriented((width, height): (i32, i32), transform: Transform) -> (i32, i32) {
    match transform {
        Transform::_90 | Transform::_270 | Transform::Flipped90 | Transform::Flipped270 => {
            (height, width)
        }
        _ => (width, height),
    }
}
