//! Frame statistics overlay.

use std::time::Duration;

use instant::Instant;

/// Where the statistics line is shown.
pub trait Overlay {
    fn show(&mut self, text: &str);
}

/// Counts frames and reports frames per second and mean frame time once per interval.
pub struct Stats {
    interval: Duration,
    window_start: Option<Instant>,
    frames: u32,
    last_text: String,
    overlay: Option<Box<dyn Overlay>>,
}

impl Stats {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: None,
            frames: 0,
            last_text: String::new(),
            overlay: None,
        }
    }

    pub fn with_overlay(mut self, overlay: Box<dyn Overlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    /// Records a finished frame at `now`. Returns whether the display was refreshed.
    pub fn update_at(&mut self, now: Instant) -> bool {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = if now >= start {
            now.duration_since(start)
        } else {
            Duration::ZERO
        };
        if elapsed < self.interval {
            return false;
        }

        let seconds = elapsed.as_secs_f32();
        let fps = self.frames as f32 / seconds;
        let ms = seconds * 1000.0 / self.frames as f32;
        self.last_text = format!("{fps:.0} FPS ({ms:.1} ms)");
        if let Some(overlay) = &mut self.overlay {
            overlay.show(&self.last_text);
        }
        self.window_start = Some(now);
        self.frames = 0;
        true
    }

    pub fn text(&self) -> &str {
        &self.last_text
    }
}

impl std::fmt::Debug for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stats")
            .field("interval", &self.interval)
            .field("frames", &self.frames)
            .field("last_text", &self.last_text)
            .finish()
    }
}

/// Shows the statistics and the control panel summary in the window title.
#[cfg(not(target_arch = "wasm32"))]
pub struct TitleOverlay {
    window: std::sync::Arc<winit::window::Window>,
    prefix: String,
    panel: crate::gui::SharedPanel,
}

#[cfg(not(target_arch = "wasm32"))]
impl TitleOverlay {
    pub fn new(
        window: std::sync::Arc<winit::window::Window>,
        prefix: impl Into<String>,
        panel: crate::gui::SharedPanel,
    ) -> Self {
        Self {
            window,
            prefix: prefix.into(),
            panel,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Overlay for TitleOverlay {
    fn show(&mut self, text: &str) {
        let controls = self.panel.borrow().summary();
        self.window
            .set_title(&format!("{} | {} | {}", self.prefix, text, controls));
    }
}

/// A fixed-position element in the page's top left corner.
#[cfg(target_arch = "wasm32")]
pub struct DomOverlay {
    element: web_sys::HtmlElement,
}

#[cfg(target_arch = "wasm32")]
impl DomOverlay {
    pub fn mount(document: &web_sys::Document) -> Result<Self, wasm_bindgen::JsValue> {
        use wasm_bindgen::JsCast;

        let element: web_sys::HtmlElement = document.create_element("div")?.dyn_into()?;
        element.set_id("stats");
        element
            .style()
            .set_css_text("position:fixed;top:0;left:0;padding:4px;background:rgba(0,0,0,0.6);color:#0f0;font:11px monospace;z-index:10");
        document.body().ok_or("document has no body")?.append_child(&element)?;
        Ok(Self { element })
    }
}

#[cfg(target_arch = "wasm32")]
impl Overlay for DomOverlay {
    fn show(&mut self, text: &str) {
        self.element.set_text_content(Some(text));
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Overlay for Recorder {
        fn show(&mut self, text: &str) {
            self.0.borrow_mut().push(text.to_string());
        }
    }

    #[test]
    fn reports_once_per_interval() {
        let shown = Rc::new(RefCell::new(Vec::new()));
        let mut stats = Stats::new(Duration::from_millis(500)).with_overlay(Box::new(Recorder(shown.clone())));
        let start = Instant::now();
        for frame in 0..30 {
            stats.update_at(start + Duration::from_millis(frame * 20));
        }
        // the window closes at the 500 ms frame
        assert_eq!(shown.borrow().len(), 1);
        assert_eq!(shown.borrow()[0], "52 FPS (19.2 ms)");
    }

    #[test]
    fn nothing_is_shown_before_the_interval() {
        let mut stats = Stats::new(Duration::from_millis(500));
        let start = Instant::now();
        assert!(!stats.update_at(start));
        assert!(!stats.update_at(start + Duration::from_millis(100)));
        assert_eq!(stats.text(), "");
    }
}
