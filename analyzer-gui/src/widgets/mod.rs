//! # Widgets
//!
//! Canvas widgets for the two chart panels. Both panels use the same
//! vertical margins so that a frequency lands on the same row in each.

pub mod note_overlay;
pub mod pitch_track;

use iced::widget::canvas::{self, Frame, Path, Stroke};
use iced::{Color, Point};

/// Space above the plot area.
pub const TOP_MARGIN: f32 = 10.0;
/// Space below the plot area, for the time axis.
pub const BOTTOM_MARGIN: f32 = 40.0;

pub const GRID_COLOR: Color = Color {
    r: 1.0,
    g: 1.0,
    b: 1.0,
    a: 0.15,
};

/// Maps `value` within `limits` linearly onto `[start, start + length]`.
pub fn scale(value: f64, limits: (f64, f64), start: f32, length: f32) -> f32 {
    let (lo, hi) = limits;
    if hi <= lo {
        return start + length / 2.0;
    }
    start + ((value - lo) / (hi - lo)) as f32 * length
}

/// Vertical position of `hz`, higher frequencies further up.
pub fn frequency_y(hz: f64, limits: (f64, f64), height: f32) -> f32 {
    let plot_height = height - TOP_MARGIN - BOTTOM_MARGIN;
    TOP_MARGIN + plot_height - scale(hz, limits, 0.0, plot_height)
}

/// Horizontal grid lines at each tick between `left` and `right`.
pub fn draw_frequency_grid(
    frame: &mut Frame,
    ticks: &[f64],
    limits: (f64, f64),
    left: f32,
    right: f32,
) {
    let height = frame.height();
    let stroke = Stroke::default().with_width(1.0).with_color(GRID_COLOR);
    for &tick in ticks {
        let y = frequency_y(tick, limits, height);
        frame.stroke(&Path::line(Point::new(left, y), Point::new(right, y)), stroke);
    }
}

pub fn dashed(stroke: Stroke<'static>) -> Stroke<'static> {
    Stroke {
        line_dash: canvas::LineDash {
            segments: &[4.0, 4.0],
            offset: 0,
        },
        ..stroke
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequencies_map_into_the_plot_area() {
        let height = 250.0;
        assert_eq!(frequency_y(100.0, (100.0, 300.0), height), height - BOTTOM_MARGIN);
        assert_eq!(frequency_y(300.0, (100.0, 300.0), height), TOP_MARGIN);
        assert_eq!(scale(5.0, (5.0, 5.0), 0.0, 10.0), 5.0);
    }
}
