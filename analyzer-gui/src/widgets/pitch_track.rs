//! # Pitch Track Widget
//!
//! Panel 1 of the feature chart: frequency over time. Frames that the chart
//! leaves blank break the line, so unvoiced stretches show as gaps.

use iced::widget::canvas::{self, Frame, Geometry, Path, Stroke, Text};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Theme, mouse};

use analyzer_core::overlay::PitchPanel;

use super::{BOTTOM_MARGIN, TOP_MARGIN, draw_frequency_grid, frequency_y, scale};

/// Room left of the plot area for the frequency tick labels.
const LEFT_MARGIN: f32 = 70.0;
/// Number of labelled time ticks.
const TIME_TICKS: usize = 6;

const TRACK_COLOR: Color = Color {
    r: 0.204,
    g: 0.596,
    b: 0.859,
    a: 1.0,
};

pub struct PitchTrack {
    panel: PitchPanel,
}

impl PitchTrack {
    pub fn new(panel: PitchPanel) -> Self {
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

    fn x_for(&self, time: f64, width: f32) -> f32 {
        scale(time, self.panel.x_limits, LEFT_MARGIN, width - LEFT_MARGIN)
    }
}

impl<Message> canvas::Program<Message> for PitchTrack {
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
        if !bounds.width.is_finite() || !bounds.height.is_finite() || bounds.width <= LEFT_MARGIN {
            return vec![frame.into_geometry()];
        }

        let text_color = theme.palette().text;
        let (width, height) = (bounds.width, bounds.height);
        let y_limits = self.panel.y_limits;
        let plot_bottom = height - BOTTOM_MARGIN;

        if self.panel.grid {
            draw_frequency_grid(&mut frame, &self.panel.y_ticks, y_limits, LEFT_MARGIN, width);
        }

        // Axes
        let axis = Stroke::default().with_width(1.0).with_color(text_color);
        frame.stroke(
            &Path::line(Point::new(LEFT_MARGIN, TOP_MARGIN), Point::new(LEFT_MARGIN, plot_bottom)),
            axis,
        );
        frame.stroke(
            &Path::line(Point::new(LEFT_MARGIN, plot_bottom), Point::new(width, plot_bottom)),
            axis,
        );

        for &tick in &self.panel.y_ticks {
            frame.fill_text(Text {
                content: format!("{tick:.1}"),
                position: Point::new(LEFT_MARGIN - 6.0, frequency_y(tick, y_limits, height)),
                color: text_color,
                size: 12.0.into(),
                horizontal_alignment: iced::alignment::Horizontal::Right,
                vertical_alignment: iced::alignment::Vertical::Center,
                ..Text::default()
            });
        }

        let (start, end) = self.panel.x_limits;
        for i in 0..TIME_TICKS {
            let time = start + (end - start) * i as f64 / (TIME_TICKS - 1) as f64;
            frame.fill_text(Text {
                content: format!("{time:.1}"),
                position: Point::new(self.x_for(time, width), plot_bottom + 4.0),
                color: text_color,
                size: 12.0.into(),
                horizontal_alignment: iced::alignment::Horizontal::Center,
                vertical_alignment: iced::alignment::Vertical::Top,
                ..Text::default()
            });
        }

        frame.fill_text(Text {
            content: self.panel.x_label.to_string(),
            position: Point::new(LEFT_MARGIN + (width - LEFT_MARGIN) / 2.0, height - 4.0),
            color: text_color,
            size: 14.0.into(),
            horizontal_alignment: iced::alignment::Horizontal::Center,
            vertical_alignment: iced::alignment::Vertical::Bottom,
            ..Text::default()
        });
        frame.fill_text(Text {
            content: self.panel.y_label.to_string(),
            position: Point::new(4.0, TOP_MARGIN),
            color: text_color,
            size: 14.0.into(),
            horizontal_alignment: iced::alignment::Horizontal::Left,
            vertical_alignment: iced::alignment::Vertical::Top,
            ..Text::default()
        });

        // One connected stroke per voiced stretch.
        let track = Path::new(|builder| {
            let mut pen_down = false;
            for &(time, freq) in &self.panel.track {
                match freq {
                    Some(hz) => {
                        let point = Point::new(
                            self.x_for(time, width),
                            frequency_y(hz, y_limits, height),
                        );
                        if pen_down {
                            builder.line_to(point);
                        } else {
                            builder.move_to(point);
                            pen_down = true;
                        }
                    }
                    None => pen_down = false,
                }
            }
        });
        frame.stroke(&track, Stroke::default().with_width(1.5).with_color(TRACK_COLOR));

        vec![frame.into_geometry()]
    }
}
