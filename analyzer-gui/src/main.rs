//! # Makam Analyzer - Feature Viewer GUI
//!
//! Shows the note-overlay chart of a stored feature file: the pitch track
//! over time next to the pitch distribution with the stable notes the
//! distribution supports.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Loader Thread**: Decodes the feature file and lays out the chart
//! - **Communication**: Crossbeam channel back to the GUI thread
//! - **Updates**: 60 FPS tick subscription polls the channel

mod ui;
mod widgets;

use analyzer_core::{FeatureBundle, codec, overlay::Chart, render};
use crossbeam_channel::Receiver;
use iced::{Element, Subscription, Theme};
use log::{error, info};
use std::path::PathBuf;
use std::thread;
use ui::main_display::create_main_view;

/// Main entry point for the feature viewer.
///
/// The feature file to show is the first command-line argument.
pub fn main() -> iced::Result {
    env_logger::init();
    info!("Starting feature viewer...");
    let result = iced::application("Makam Analyzer", ViewerApp::update, ViewerApp::view)
        .subscription(ViewerApp::subscription)
        .theme(ViewerApp::theme)
        .run();
    info!("Viewer finished with result: {:?}", result);
    result
}

#[derive(Debug, Clone)]
pub enum Message {
    /// Decode the feature file again.
    Reload,
    /// Timer tick, polls the loader thread.
    Tick,
}

/// What the viewer knows about a loaded feature file.
#[derive(Debug, Clone)]
pub struct LoadedFeatures {
    pub source: String,
    pub makam: String,
    pub tonic_hz: f64,
    pub ahenk: String,
    pub chart: Chart,
}

#[derive(Debug, Clone)]
pub enum LoadStatus {
    /// No feature file was given.
    Idle,
    Loading(PathBuf),
    Ready(Box<LoadedFeatures>),
    Failed(String),
}

/// Data needed for rendering the interface.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub status: LoadStatus,
}

#[derive(Debug)]
struct ViewerApp {
    feature_path: Option<PathBuf>,
    load_receiver: Option<Receiver<Result<LoadedFeatures, String>>>,
    display_data: AppDisplayData,
}

impl Default for ViewerApp {
    fn default() -> Self {
        let feature_path = std::env::args_os().nth(1).map(PathBuf::from);
        let mut app = Self {
            feature_path,
            load_receiver: None,
            display_data: AppDisplayData {
                status: LoadStatus::Idle,
            },
        };
        app.start_loading();
        app
    }
}

impl ViewerApp {
    /// Starts decoding the feature file on its own thread.
    ///
    /// The result arrives on `load_receiver` and is picked up by the next
    /// tick.
    fn start_loading(&mut self) {
        let Some(path) = self.feature_path.clone() else {
            error!("No feature file given; usage: analyzer-gui <features.json>");
            return;
        };

        let (load_tx, load_rx) = crossbeam_channel::bounded(1);
        self.load_receiver = Some(load_rx);
        self.display_data.status = LoadStatus::Loading(path.clone());

        thread::spawn(move || {
            info!("Loading features from {}", path.display());
            let result = load_features(&path).map_err(|e| format!("{e:#}"));
            if load_tx.send(result).is_err() {
                error!("Viewer closed before {} was loaded", path.display());
            }
        });
    }

    fn update(&mut self, message: Message) {
        match message {
            Message::Reload => self.start_loading(),
            Message::Tick => {
                let Some(receiver) = &self.load_receiver else {
                    return;
                };
                if let Ok(result) = receiver.try_recv() {
                    self.load_receiver = None;
                    self.display_data.status = match result {
                        Ok(features) => {
                            info!(
                                "Showing {} of {} stable notes",
                                features.chart.notes.len(),
                                features.source
                            );
                            LoadStatus::Ready(Box::new(features))
                        }
                        Err(message) => {
                            error!("Failed to load features: {message}");
                            LoadStatus::Failed(message)
                        }
                    };
                }
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data, self.feature_path.is_some())
    }

    /// Ticks every 16ms while a load is in flight.
    fn subscription(&self) -> Subscription<Message> {
        if self.load_receiver.is_some() {
            iced::time::every(std::time::Duration::from_millis(16)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Decodes a feature file and lays out its chart.
fn load_features(path: &std::path::Path) -> anyhow::Result<LoadedFeatures> {
    let bundle: FeatureBundle = codec::decode_file(path)?;
    let chart = render(&bundle)?;
    Ok(LoadedFeatures {
        source: bundle.pitch.source,
        makam: bundle.makam,
        tonic_hz: bundle.tonic.value,
        ahenk: bundle.ahenk.name,
        chart,
    })
}
