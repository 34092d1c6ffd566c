use anyhow::Result;
use opencv::core::Mat;
use opencv::highgui;

/// Live preview window for annotated frames.
pub struct FrameWindow {
    name: String,
    created: bool,
}

impl FrameWindow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: false,
        }
    }

    pub fn show(&mut self, frame: &Mat) -> Result<()> {
        if !self.created {
            highgui::named_window(&self.name, highgui::WINDOW_NORMAL | highgui::WINDOW_KEEPRATIO)?;
            self.created = true;
        }
        highgui::imshow(&self.name, frame)?;
        highgui::wait_key(1)?;
        Ok(())
    }
}

impl Drop for FrameWindow {
    fn drop(&mut self) {
        if self.created {
            let _ = highgui::destroy_window(&self.name);
        }
    }
}
