use kalmanviz_core::config::parse_hex_color;
use kalmanviz_core::{CellKind, ConfigError, PaletteConfig};

/// Straight RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    /// `#rrggbb`, as accepted by a canvas `fillStyle`.
    pub fn to_css(self) -> String {
        let [r, g, b, _] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// Resolved colours for one painter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgba,
    pub grid: Rgba,
    pub empty: Rgba,
    pub wall: Rgba,
    pub agent: Rgba,
    pub goal: Rgba,
}

impl Palette {
    pub fn from_config(config: &PaletteConfig) -> Result<Self, ConfigError> {
        let color = |field, value: &str| {
            parse_hex_color(field, value).map(|[r, g, b]| Rgba::opaque(r, g, b))
        };
        Ok(Self {
            background: color("background", &config.background)?,
            grid: color("grid", &config.grid)?,
            empty: color("empty", &config.empty)?,
            wall: color("wall", &config.wall)?,
            agent: color("agent", &config.agent)?,
            goal: color("goal", &config.goal)?,
        })
    }

    pub fn cell(&self, kind: CellKind) -> Rgba {
        match kind {
            CellKind::Empty => self.empty,
            CellKind::Wall => self.wall,
            CellKind::Agent => self.agent,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Rgba::opaque(0xff, 0xff, 0xff),
            grid: Rgba::opaque(0xcc, 0xcc, 0xcc),
            empty: Rgba::opaque(0xff, 0xff, 0xff),
            wall: Rgba::opaque(0x00, 0x00, 0x00),
            agent: Rgba::opaque(0x85, 0x0c, 0x5d),
            goal: Rgba::opaque(0x2e, 0x8b, 0x57),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_default_palette() {
        let palette = Palette::from_config(&PaletteConfig::default()).unwrap();
        assert_eq!(palette, Palette::default());
        assert_eq!(palette.agent.to_css(), "#850c5d");
    }
}
