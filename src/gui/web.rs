//! DOM front-end for the control panel: one range input per control.

use wasm_bindgen::{JsCast, JsValue, closure::Closure};
use web_sys::{Document, HtmlElement, HtmlInputElement};

use super::{ControlInfo, SharedPanel};

const PANEL_STYLE: &str = "position:fixed;top:0;right:0;padding:8px;background:rgba(0,0,0,0.6);\
                           color:#eee;font:11px sans-serif;z-index:10";

/// Appends a slider panel to the page body. Slider edits are queued on the
/// panel and applied by its flush callback at the next frame.
pub fn mount(document: &Document, panel: &SharedPanel) -> Result<HtmlElement, JsValue> {
    let body = document.body().ok_or("document has no body")?;
    let container: HtmlElement = document.create_element("div")?.dyn_into()?;
    container.set_id("controls");
    container.style().set_css_text(PANEL_STYLE);

    let controls: Vec<ControlInfo> = panel.borrow().controls().collect();
    for control in controls {
        let row = document.create_element("div")?;
        let label = document.create_element("label")?;
        label.set_text_content(Some(&control.label));
        let input: HtmlInputElement = document.create_element("input")?.dyn_into()?;
        input.set_type("range");
        input.set_min(&control.min.to_string());
        input.set_max(&control.max.to_string());
        input.set_step(&control.step.to_string());
        input.set_value(&control.value.to_string());

        let on_input = {
            let panel = panel.clone();
            let input = input.clone();
            let id = control.id;
            Closure::wrap(Box::new(move || {
                if let Ok(value) = input.value().parse::<f32>() {
                    panel.borrow_mut().set(id, value);
                }
            }) as Box<dyn FnMut()>)
        };
        input.add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())?;
        // the listener lives as long as the page
        on_input.forget();

        row.append_child(&label)?;
        row.append_child(&input)?;
        container.append_child(&row)?;
    }

    body.append_child(&container)?;
    Ok(container)
}
