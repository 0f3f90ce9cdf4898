#![cfg(target_arch = "wasm32")]

mod canvas;
mod dom;

pub use canvas::Canvas2dSurface;
pub use dom::{DomControls, DomTelemetrySurface};

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use anyhow::{Context, Result};
use kalmanviz_core::{
    CommitAction, CycleOutcome, DriverConfig, Engine, ErrorModelShape, ParameterBridge,
    TickScheduler,
};
use kalmanviz_render::{CanvasPainter, GridGeometry};
use kalmanviz_sim::{BounceGrid, DEFAULT_SEED, KinematicUniverse};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlCanvasElement, Window};

type WebScheduler =
    TickScheduler<Box<dyn Engine>, CanvasPainter<Canvas2dSurface>, DomTelemetrySurface>;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum EngineChoice {
    #[default]
    Kinematic,
    Grid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WebOptions {
    engine: EngineChoice,
    width: f64,
    height: f64,
    seed: Option<u64>,
    error_shape: ErrorModelShape,
    config: DriverConfig,
}

impl Default for WebOptions {
    fn default() -> Self {
        Self {
            engine: EngineChoice::Kinematic,
            width: 30.0,
            height: 30.0,
            seed: None,
            error_shape: ErrorModelShape::Channels,
            config: DriverConfig::default(),
        }
    }
}

impl WebOptions {
    fn from_js(value: JsValue) -> Result<Self, JsValue> {
        if value.is_null() || value.is_undefined() {
            return Ok(Self::default());
        }
        from_value(value).map_err(js_error)
    }

    fn build_engine(&self) -> Result<Box<dyn Engine>> {
        let engine: Box<dyn Engine> = match self.engine {
            EngineChoice::Kinematic => Box::new(
                KinematicUniverse::new(self.width, self.height)
                    .context("failed to build kinematic universe")?
                    .with_seed(self.seed.unwrap_or(DEFAULT_SEED))
                    .with_error_shape(self.error_shape),
            ),
            EngineChoice::Grid => Box::new(
                BounceGrid::from_dimensions(self.width, self.height)
                    .context("failed to build bounce grid")?,
            ),
        };
        Ok(engine)
    }
}

/// A timer or animation-frame request still owned by the loop.
struct Pending {
    id: i32,
    /// Dropping the closure frees it if the browser never calls it.
    _callback: Closure<dyn FnMut()>,
}

/// Scheduler plus the host-side loop bookkeeping shared with JS callbacks.
struct LoopState {
    scheduler: WebScheduler,
    bridge: ParameterBridge,
    controls: DomControls,
    window: Window,
    /// Bumped whenever pending callbacks must stop re-arming.
    generation: u64,
    timeout: Option<Pending>,
    frame: Option<Pending>,
}

impl LoopState {
    fn run_frame(&mut self) -> CycleOutcome {
        self.scheduler.run_cycle()
    }

    fn commit(&mut self, action: CommitAction) -> Result<()> {
        let command = self.bridge.commit(action, &self.controls)?;
        self.scheduler.apply(command)?;
        debug!(target: "kalmanviz::web", action = action.name(), "commit applied");
        Ok(())
    }

    /// Only called from host entry points, never from inside a loop callback.
    fn cancel_pending(&mut self) {
        self.generation += 1;
        if let Some(pending) = self.timeout.take() {
            self.window.clear_timeout_with_handle(pending.id);
        }
        if let Some(pending) = self.frame.take()
            && let Err(err) = self.window.cancel_animation_frame(pending.id)
        {
            debug!(target: "kalmanviz::web", error = ?err, "cancelAnimationFrame failed");
        }
    }
}

/// Waits the inter-tick delay, then asks for the next presentation frame.
///
/// Callbacks hold a `Weak` handle so a dropped driver is freed even while a
/// request is outstanding.
fn schedule_next(shared: &Rc<RefCell<LoopState>>) -> Result<(), JsValue> {
    let mut state = shared.borrow_mut();
    let generation = state.generation;
    let delay = i32::try_from(state.scheduler.inter_tick_delay().as_millis()).unwrap_or(i32::MAX);
    let handle = Rc::downgrade(shared);
    let callback = Closure::once(move || on_timeout(&handle, generation));
    let id = state
        .window
        .set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref::<js_sys::Function>(),
            delay,
        )?;
    // Replaces the previous timeout closure, which has already run.
    state.timeout = Some(Pending {
        id,
        _callback: callback,
    });
    Ok(())
}

fn on_timeout(handle: &Weak<RefCell<LoopState>>, generation: u64) {
    let Some(shared) = handle.upgrade() else {
        return;
    };
    let mut state = shared.borrow_mut();
    if state.generation != generation || !state.scheduler.is_running() {
        return;
    }
    let handle = Rc::downgrade(&shared);
    let callback = Closure::once(move || on_frame(&handle, generation));
    match state
        .window
        .request_animation_frame(callback.as_ref().unchecked_ref::<js_sys::Function>())
    {
        Ok(id) => {
            state.frame = Some(Pending {
                id,
                _callback: callback,
            });
        }
        Err(err) => warn!(target: "kalmanviz::web", error = ?err, "requestAnimationFrame failed"),
    }
}

fn on_frame(handle: &Weak<RefCell<LoopState>>, generation: u64) {
    let Some(shared) = handle.upgrade() else {
        return;
    };
    {
        let mut state = shared.borrow_mut();
        if state.generation != generation {
            return;
        }
        state.run_frame();
        if !state.scheduler.is_running() {
            return;
        }
    }
    if let Err(err) = schedule_next(&shared) {
        warn!(target: "kalmanviz::web", error = ?err, "failed to schedule next cycle");
    }
}

struct CommitButton {
    element: Element,
    listener: Closure<dyn FnMut()>,
}

/// Wires `commit-<action>` buttons for the actions the engine supports.
fn wire_commit_buttons(
    document: &Document,
    shared: &Rc<RefCell<LoopState>>,
) -> Result<Vec<CommitButton>, JsValue> {
    let actions = shared.borrow().bridge.actions();
    let mut buttons = Vec::with_capacity(actions.len());
    for action in actions {
        let Some(element) = document.get_element_by_id(&format!("commit-{}", action.name()))
        else {
            continue;
        };
        let handle = Rc::downgrade(shared);
        let listener = Closure::<dyn FnMut()>::new(move || {
            let Some(shared) = handle.upgrade() else {
                return;
            };
            if let Err(err) = shared.borrow_mut().commit(action) {
                let name = action.name();
                warn!(target: "kalmanviz::web", action = name, error = %err, "commit rejected");
                web_sys::console::warn_1(&JsValue::from_str(&format!(
                    "{}: {err:#}",
                    action.name()
                )));
            }
        });
        element.add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())?;
        buttons.push(CommitButton { element, listener });
    }
    Ok(buttons)
}

/// Browser host for one engine drawing into one canvas.
#[wasm_bindgen]
pub struct WebDriver {
    shared: Rc<RefCell<LoopState>>,
    buttons: Vec<CommitButton>,
}

#[wasm_bindgen]
impl WebDriver {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str, options: JsValue) -> Result<WebDriver, JsValue> {
        let options = WebOptions::from_js(options)?;
        options.config.validate().map_err(js_error)?;

        let window = web_sys::window().ok_or_else(|| js_error("no global window"))?;
        let document = window
            .document()
            .ok_or_else(|| js_error("window has no document"))?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| js_error(format!("missing canvas #{canvas_id}")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| js_error(format!("#{canvas_id} is not a canvas")))?;

        let engine = options.build_engine().map_err(js_error)?;
        let capabilities = engine.capabilities();
        let dimensions = engine.dimensions();
        let geometry = GridGeometry::for_engine(capabilities, dimensions, &options.config)
            .map_err(js_error)?;
        let surface =
            Canvas2dSurface::new(canvas, geometry.extent.0, geometry.extent.1).map_err(js_error)?;
        let painter = CanvasPainter::for_engine(surface, capabilities, dimensions, &options.config)
            .map_err(js_error)?;
        let telemetry = DomTelemetrySurface::from_document(&document).map_err(js_error)?;
        let scheduler =
            TickScheduler::new(engine, painter, telemetry, options.config).map_err(js_error)?;

        let shared = Rc::new(RefCell::new(LoopState {
            scheduler,
            bridge: ParameterBridge::new(capabilities),
            controls: DomControls::new(document.clone()),
            window,
            generation: 0,
            timeout: None,
            frame: None,
        }));
        let buttons = wire_commit_buttons(&document, &shared)?;
        debug!(target: "kalmanviz::web", canvas_id, buttons = buttons.len(), "web driver ready");
        Ok(Self { shared, buttons })
    }

    /// Paints the initial frame and arms the loop.
    pub fn start(&self) -> Result<(), JsValue> {
        {
            let mut state = self.shared.borrow_mut();
            state.cancel_pending();
            state.scheduler.start().map_err(js_error)?;
        }
        schedule_next(&self.shared)
    }

    pub fn stop(&self) {
        let mut state = self.shared.borrow_mut();
        state.cancel_pending();
        state.scheduler.stop();
    }

    pub fn pause(&self) -> Result<(), JsValue> {
        let mut state = self.shared.borrow_mut();
        state.scheduler.pause().map_err(js_error)?;
        state.cancel_pending();
        Ok(())
    }

    pub fn resume(&self) -> Result<(), JsValue> {
        self.shared
            .borrow_mut()
            .scheduler
            .resume()
            .map_err(js_error)?;
        schedule_next(&self.shared)
    }

    /// Reads the inputs for `action` (e.g. `"goal"`) and applies them between cycles.
    pub fn commit(&self, action: &str) -> Result<(), JsValue> {
        let action = action.parse::<CommitAction>().map_err(js_error)?;
        self.shared
            .borrow_mut()
            .commit(action)
            .map_err(|err| js_error(format!("{err:#}")))
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.shared.borrow().scheduler.is_running()
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_value(&self.shared.borrow().scheduler.state()).map_err(js_error)
    }

    pub fn capabilities(&self) -> Result<JsValue, JsValue> {
        to_value(&self.shared.borrow().scheduler.capabilities()).map_err(js_error)
    }

    /// Names of the commit actions this engine accepts.
    pub fn actions(&self) -> js_sys::Array {
        self.shared
            .borrow()
            .bridge
            .actions()
            .iter()
            .map(|action| JsValue::from_str(action.name()))
            .collect()
    }
}

impl Drop for WebDriver {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.try_borrow_mut() {
            state.cancel_pending();
            state.scheduler.stop();
        }
        for button in &self.buttons {
            let listener = button.listener.as_ref().unchecked_ref();
            let _ = button
                .element
                .remove_event_listener_with_callback("click", listener);
        }
    }
}

#[wasm_bindgen]
pub fn version() -> String {
    format!("kalmanviz-web {}", env!("CARGO_PKG_VERSION"))
}

#[wasm_bindgen]
pub fn default_options() -> Result<JsValue, JsValue> {
    to_value(&WebOptions::default()).map_err(js_error)
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsError::new(&err.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;
    use web_sys::HtmlTextAreaElement;

    wasm_bindgen_test_configure!(run_in_browser);

    /// Mounts a driver page under a throwaway container.
    fn mount_fixture(velocity: &str) -> Element {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .expect("document");
        let container = document.create_element("div").expect("container");
        let children = [
            ("canvas", "kv-canvas"),
            ("textarea", "log-actual"),
            ("textarea", "log-belief"),
            ("input", "velocity"),
            ("span", "readout-movement"),
            ("button", "commit-velocity"),
        ];
        for (tag, id) in children {
            let element = document.create_element(tag).expect("element");
            element.set_id(id);
            container.append_child(&element).expect("append");
        }
        document
            .body()
            .expect("body")
            .append_child(&container)
            .expect("mount");
        document
            .get_element_by_id("velocity")
            .and_then(|e| e.dyn_into::<web_sys::HtmlInputElement>().ok())
            .expect("velocity input")
            .set_value(velocity);
        container
    }

    fn text_of(id: &str) -> String {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .expect("document");
        let element = document.get_element_by_id(id).expect("element");
        match element.clone().dyn_into::<HtmlTextAreaElement>() {
            Ok(area) => area.value(),
            Err(_) => element.text_content().unwrap_or_default(),
        }
    }

    #[wasm_bindgen_test]
    fn velocity_commit_drives_logs_and_readouts() {
        let container = mount_fixture("1");
        let driver = WebDriver::new("kv-canvas", JsValue::UNDEFINED).expect("driver");
        driver.commit("velocity").expect("velocity commit");
        driver.start().expect("start");
        assert!(driver.is_running());

        let outcome = driver.shared.borrow_mut().run_frame();
        assert!(matches!(outcome, CycleOutcome::Rendered { step: 1, appended: true }));
        assert!(text_of("log-actual").starts_with("1: ["));
        assert_eq!(text_of("readout-movement"), "N(0.00000, 0.00100)");

        let canvas = driver.shared.borrow().scheduler.painter().surface().canvas().clone();
        assert_eq!((canvas.width(), canvas.height()), (41, 41));

        driver.stop();
        assert!(!driver.is_running());
        drop(driver);
        container.remove();
    }

    #[wasm_bindgen_test]
    fn malformed_input_is_reported_to_the_caller() {
        let container = mount_fixture("fast");
        let driver = WebDriver::new("kv-canvas", JsValue::NULL).expect("driver");
        assert!(driver.commit("velocity").is_err());
        assert!(driver.commit("warp").is_err());
        drop(driver);
        container.remove();
    }

    #[wasm_bindgen_test]
    fn grid_driver_exposes_no_commit_actions() {
        let container = mount_fixture("1");
        let options = WebOptions {
            engine: EngineChoice::Grid,
            width: 6.0,
            height: 4.0,
            ..WebOptions::default()
        };
        let driver =
            WebDriver::new("kv-canvas", to_value(&options).expect("options")).expect("driver");
        assert_eq!(driver.actions().length(), 0);
        assert!(driver.commit("goal").is_err());
        driver.start().expect("start");
        driver.pause().expect("pause");
        assert!(!driver.is_running());
        driver.resume().expect("resume");
        assert!(driver.is_running());
        drop(driver);
        container.remove();
    }

    #[wasm_bindgen_test]
    fn dropped_driver_frees_its_loop_state() {
        let container = mount_fixture("1");
        let driver = WebDriver::new("kv-canvas", JsValue::UNDEFINED).expect("driver");
        driver.start().expect("start");
        assert!(driver.shared.borrow().timeout.is_some());
        driver.stop();
        assert!(driver.shared.borrow().timeout.is_none());

        driver.start().expect("restart");
        let state = Rc::downgrade(&driver.shared);
        drop(driver);
        assert!(state.upgrade().is_none());
        container.remove();
    }

    #[wasm_bindgen_test]
    fn missing_canvas_is_rejected() {
        assert!(WebDriver::new("no-such-canvas", JsValue::UNDEFINED).is_err());
    }
}
