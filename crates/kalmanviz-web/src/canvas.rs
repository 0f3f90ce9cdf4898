use kalmanviz_render::{DrawSurface, Line, Rect, RenderError, Rgba};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

/// [`DrawSurface`] backed by a `<canvas>` 2-D context.
#[derive(Debug, Clone)]
pub struct Canvas2dSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl Canvas2dSurface {
    /// Resizes `canvas` to `width` x `height` and grabs its 2-D context.
    pub fn new(canvas: HtmlCanvasElement, width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidCanvas { width, height });
        }
        canvas.set_width(width);
        canvas.set_height(height);
        let context = canvas
            .get_context("2d")
            .map_err(backend_error)?
            .ok_or_else(|| RenderError::Backend("canvas has no 2d context".to_owned()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| RenderError::Backend("context is not a 2d context".to_owned()))?;
        Ok(Self { canvas, context })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    pub fn context(&self) -> &CanvasRenderingContext2d {
        &self.context
    }

    fn fill(&self, rect: Rect, color: Rgba) {
        self.context.set_fill_style_str(&color.to_css());
        self.context.fill_rect(rect.x, rect.y, rect.width, rect.height);
    }
}

impl DrawSurface for Canvas2dSurface {
    fn size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn clear(&mut self, color: Rgba) -> Result<(), RenderError> {
        let (width, height) = self.size();
        self.fill(
            Rect::new(0.0, 0.0, f64::from(width), f64::from(height)),
            color,
        );
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> Result<(), RenderError> {
        self.fill(rect, color);
        Ok(())
    }

    fn stroke_line(&mut self, line: Line, color: Rgba) -> Result<(), RenderError> {
        let footprint = line.footprint().ok_or(RenderError::UnsupportedLine {
            from: line.from,
            to: line.to,
        })?;
        self.fill(footprint, color);
        Ok(())
    }
}

pub(crate) fn backend_error(err: JsValue) -> RenderError {
    RenderError::Backend(format!("{err:?}"))
}
