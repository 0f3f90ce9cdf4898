//! DOM-backed telemetry and control surfaces.

use std::collections::BTreeMap;

use kalmanviz_core::{
    ControlId, ControlSource, DriverError, LogChannel, ReadoutSlot, TelemetryLog, TelemetrySurface,
};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlInputElement, HtmlTextAreaElement};

const READOUT_SLOTS: [ReadoutSlot; 4] = [
    ReadoutSlot::Rotation,
    ReadoutSlot::Movement,
    ReadoutSlot::Position,
    ReadoutSlot::Gaussian,
];

/// Writes log lines into the `log-*` textareas and readouts into `readout-*` elements.
///
/// Both textareas are required. Readout elements are optional; a page only
/// carries the ones its error model produces.
#[derive(Debug, Clone)]
pub struct DomTelemetrySurface {
    actual: HtmlTextAreaElement,
    belief: HtmlTextAreaElement,
    readouts: BTreeMap<ReadoutSlot, Element>,
}

impl DomTelemetrySurface {
    pub fn from_document(document: &Document) -> Result<Self, DriverError> {
        let actual = textarea(document, LogChannel::Actual)?;
        let belief = textarea(document, LogChannel::Belief)?;
        let readouts = READOUT_SLOTS
            .into_iter()
            .filter_map(|slot| {
                document
                    .get_element_by_id(slot.element_id())
                    .map(|element| (slot, element))
            })
            .collect();
        Ok(Self {
            actual,
            belief,
            readouts,
        })
    }

    fn area(&self, channel: LogChannel) -> &HtmlTextAreaElement {
        match channel {
            LogChannel::Actual => &self.actual,
            LogChannel::Belief => &self.belief,
        }
    }
}

fn textarea(document: &Document, channel: LogChannel) -> Result<HtmlTextAreaElement, DriverError> {
    document
        .get_element_by_id(channel.element_id())
        .and_then(|element| element.dyn_into::<HtmlTextAreaElement>().ok())
        .ok_or_else(|| DriverError::Surface(format!("missing textarea #{}", channel.element_id())))
}

impl TelemetrySurface for DomTelemetrySurface {
    fn append(&mut self, channel: LogChannel, line: &str) -> Result<(), DriverError> {
        let area = self.area(channel);
        let mut value = area.value();
        value.push_str(line);
        value.push('\n');
        area.set_value(&value);
        Ok(())
    }

    fn replace(&mut self, channel: LogChannel, log: &TelemetryLog) -> Result<(), DriverError> {
        self.area(channel).set_value(&log.to_text());
        Ok(())
    }

    fn scroll_to_end(&mut self, channel: LogChannel) -> Result<(), DriverError> {
        let area = self.area(channel);
        area.set_scroll_top(area.scroll_height());
        Ok(())
    }

    fn set_readout(&mut self, slot: ReadoutSlot, text: &str) -> Result<(), DriverError> {
        if let Some(element) = self.readouts.get(&slot) {
            element.set_text_content(Some(text));
        }
        Ok(())
    }
}

/// Reads numeric `<input>` values by their [`ControlId`] element id.
#[derive(Debug, Clone)]
pub struct DomControls {
    document: Document,
}

impl DomControls {
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

impl ControlSource for DomControls {
    fn read(&self, control: ControlId) -> Option<String> {
        self.document
            .get_element_by_id(control.element_id())
            .and_then(|element| element.dyn_into::<HtmlInputElement>().ok())
            .map(|input| input.value())
    }
}
