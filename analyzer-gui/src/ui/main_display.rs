//! # Main Display Module
//!
//! Window layout: a header with what was analyzed, then the two chart
//! panels side by side in the width ratio the chart asks for.

use iced::widget::{Space, button, column, container, horizontal_space, row, text};
use iced::{Alignment, Element, Length};

use crate::widgets::{note_overlay::NoteOverlay, pitch_track::PitchTrack};
use crate::{AppDisplayData, LoadStatus, LoadedFeatures, Message};

/// Creates the complete main application view.
pub fn create_main_view(data: &AppDisplayData, can_reload: bool) -> Element<'static, Message> {
    let title = text("Makam Analyzer").size(28);

    let mut reload = button(text("Reload").size(14)).padding([6, 10]);
    if can_reload && !matches!(data.status, LoadStatus::Loading(_)) {
        reload = reload.on_press(Message::Reload);
    }

    let body: Element<'static, Message> = match &data.status {
        LoadStatus::Idle => centered_message("Usage: analyzer-gui <features.json>"),
        LoadStatus::Loading(path) => centered_message(format!("Loading {}...", path.display())),
        LoadStatus::Failed(message) => centered_message(format!("Cannot show features: {message}")),
        LoadStatus::Ready(features) => create_chart_view(features),
    };

    let main_content = column![
        row![title, horizontal_space(), reload].align_y(Alignment::Center),
        Space::with_height(20),
        body,
    ]
    .spacing(10)
    .padding(20);

    container(main_content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn centered_message(message: impl Into<String>) -> Element<'static, Message> {
    container(text(message.into()).size(20))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

/// Header line plus the pitch-track and note-overlay panels.
fn create_chart_view(features: &LoadedFeatures) -> Element<'static, Message> {
    let header = row![
        text(features.source.clone()).size(16),
        horizontal_space(),
        text(format!(
            "{} | tonic {:.2} Hz | {}",
            features.makam, features.tonic_hz, features.ahenk
        ))
        .size(16),
    ];

    let [track_ratio, overlay_ratio] = features.chart.width_ratios;
    let panels = row![
        container(PitchTrack::new(features.chart.pitch_panel.clone()).view())
            .width(Length::FillPortion(track_ratio))
            .height(Length::Fill),
        container(NoteOverlay::new(features.chart.note_panel.clone()).view())
            .width(Length::FillPortion(overlay_ratio))
            .height(Length::Fill),
    ]
    .spacing(0);

    column![header, Space::with_height(10), panels]
        .spacing(5)
        .into()
}
