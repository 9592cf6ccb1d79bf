//! # Note Overlay Widget
//!
//! Panel 2 of the feature chart: the pitch distribution drawn sideways
//! (density to the right, frequency up) with the supported stable notes on
//! top of it. The panel has no frame of its own; only the frequency grid it
//! shares with the pitch track is drawn.

use iced::widget::canvas::{self, Frame, Geometry, Path, Stroke, Text};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Theme, mouse};

use analyzer_core::overlay::{MarkerKind, NotePanel};

use super::{dashed, draw_frequency_grid, frequency_y, scale};

const CURVE_COLOR: Color = Color {
    r: 0.204,
    g: 0.596,
    b: 0.859,
    a: 1.0,
};
const TONIC_COLOR: Color = Color {
    r: 0.906,
    g: 0.298,
    b: 0.235,
    a: 1.0,
};
const DEGREE_COLOR: Color = Color {
    r: 0.18,
    g: 0.8,
    b: 0.443,
    a: 1.0,
};
const REFERENCE_COLOR: Color = Color {
    r: 0.6,
    g: 0.6,
    b: 0.6,
    a: 1.0,
};

pub struct NoteOverlay {
    panel: NotePanel,
}

impl NoteOverlay {
    pub fn new(panel: NotePanel) -> Self {
        Self { panel }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fill),
        )
        .into()
    }

    fn x_for(&self, density: f64, width: f32) -> f32 {
        scale(density, self.panel.x_limits, 0.0, width)
    }
}

/// Diamond of the given width centered on `center`.
fn diamond(center: Point, size: f32) -> Path {
    let r = size / 2.0;
    Path::new(|builder| {
        builder.move_to(Point::new(center.x, center.y - r));
        builder.line_to(Point::new(center.x + r, center.y));
        builder.line_to(Point::new(center.x, center.y + r));
        builder.line_to(Point::new(center.x - r, center.y));
        builder.close();
    })
}

impl<Message> canvas::Program<Message> for NoteOverlay {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        if !bounds.width.is_finite() || !bounds.height.is_finite() {
            return vec![frame.into_geometry()];
        }

        let (width, height) = (bounds.width, bounds.height);
        let y_limits = self.panel.y_limits;

        draw_frequency_grid(&mut frame, &self.panel.y_ticks, y_limits, 0.0, width);

        let curve = Path::new(|builder| {
            for (i, &(density, hz)) in self.panel.curve.iter().enumerate() {
                let point = Point::new(
                    self.x_for(density, width),
                    frequency_y(hz, y_limits, height),
                );
                if i == 0 {
                    builder.move_to(point);
                } else {
                    builder.line_to(point);
                }
            }
        });
        frame.stroke(&curve, Stroke::default().with_width(1.5).with_color(CURVE_COLOR));

        let reference = dashed(Stroke::default().with_width(1.0).with_color(REFERENCE_COLOR));
        for line in &self.panel.reference_lines {
            let y = frequency_y(line.hz, y_limits, height);
            frame.stroke(
                &Path::line(Point::new(0.0, y), Point::new(self.x_for(line.x_end, width), y)),
                reference,
            );
        }

        for marker in &self.panel.markers {
            let center = Point::new(
                self.x_for(marker.x, width),
                frequency_y(marker.hz, y_limits, height),
            );
            let color = match marker.kind {
                MarkerKind::Tonic => TONIC_COLOR,
                MarkerKind::Degree => DEGREE_COLOR,
            };
            frame.fill(&diamond(center, marker.kind.size()), color);
        }

        let italic = iced::Font {
            style: iced::font::Style::Italic,
            ..iced::Font::DEFAULT
        };
        for label in &self.panel.labels {
            frame.fill_text(Text {
                content: label.text.clone(),
                position: Point::new(
                    self.x_for(label.x, width),
                    frequency_y(label.hz, y_limits, height),
                ),
                color: theme.palette().text,
                size: 12.0.into(),
                font: italic,
                horizontal_alignment: iced::alignment::Horizontal::Left,
                vertical_alignment: iced::alignment::Vertical::Center,
                ..Text::default()
            });
        }

        vec![frame.into_geometry()]
    }
}
