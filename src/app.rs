use std::sync::Arc;
use std::sync::mpsc;

use eframe::egui;
use egui::{Color32, RichText};
use image::RgbaImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::canvas::{Canvas, CanvasState, Placement};
use crate::color::{ImageInfo, Rgb};
use crate::io::{GithubDirectory, HttpFetcher, ImageFetcher, ImageSource};
use crate::settings::AppSettings;

// ============================================================================
// ASYNC FETCH PIPELINE — listing and downloads run on rayon workers
// ============================================================================

/// Result delivered from a background fetch.
pub enum FetchResult {
    /// The icon listing resolved to these download URLs.
    ListingLoaded(Vec<String>),
    ListingFailed(String),
    /// An icon was downloaded and decoded.
    ImageFetched { url: String, image: RgbaImage },
    FetchFailed { url: String, error: String },
}

/// Where the startup listing stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListingStatus {
    Loading,
    Ready,
    Failed(String),
}

const RENDER_GREEN: Color32 = Color32::from_rgb(0x4C, 0xAF, 0x50);
const GROUP_BLUE: Color32 = Color32::from_rgb(0x00, 0x7B, 0xFF);

pub struct GeoCanvasApp {
    canvas: Canvas,
    state: CanvasState,
    rng: StdRng,

    image_links: Vec<String>,
    listing: ListingStatus,
    fetcher: Option<Arc<dyn ImageFetcher>>,

    io_sender: mpsc::Sender<FetchResult>,
    io_receiver: mpsc::Receiver<FetchResult>,
    pending_fetches: usize,
    /// Context used by workers to wake the UI when a result is ready.
    repaint_ctx: egui::Context,

    /// "Size: … | Color: …" for the most recently added image.
    info_text: String,
    info_color: Option<Rgb>,
    status: String,
}

impl GeoCanvasApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: AppSettings) -> Self {
        let fetcher: Option<Arc<dyn ImageFetcher>> = match HttpFetcher::from_settings(&settings) {
            Ok(f) => Some(Arc::new(f)),
            Err(e) => {
                crate::log_err!("Could not create HTTP client: {}", e);
                None
            }
        };
        let source: Option<Arc<dyn ImageSource>> = match GithubDirectory::from_settings(&settings) {
            Ok(s) => Some(Arc::new(s)),
            Err(e) => {
                crate::log_err!("Could not create listing client: {}", e);
                None
            }
        };
        Self::with_services(cc.egui_ctx.clone(), &settings, source, fetcher)
    }

    /// Build the app around explicit collaborators and start the listing.
    pub fn with_services(
        ctx: egui::Context,
        settings: &AppSettings,
        source: Option<Arc<dyn ImageSource>>,
        fetcher: Option<Arc<dyn ImageFetcher>>,
    ) -> Self {
        let (io_sender, io_receiver) = mpsc::channel();
        let mut app = Self {
            canvas: Canvas::new(settings.canvas_background),
            state: CanvasState::new(0, 0)
                .with_policies(settings.relayout_policy, settings.hit_test_order),
            rng: StdRng::from_entropy(),
            image_links: Vec::new(),
            listing: ListingStatus::Loading,
            fetcher,
            io_sender,
            io_receiver,
            pending_fetches: 0,
            repaint_ctx: ctx,
            info_text: String::new(),
            info_color: None,
            status: String::new(),
        };
        match source {
            Some(source) => app.spawn_listing(source),
            None => {
                app.listing = ListingStatus::Failed("no listing client".to_string());
                app.status = "Could not load the image list.".to_string();
            }
        }
        app
    }

    fn spawn_listing(&mut self, source: Arc<dyn ImageSource>) {
        self.status = "Loading image list…".to_string();
        self.pending_fetches += 1;
        let sender = self.io_sender.clone();
        let ctx = self.repaint_ctx.clone();
        rayon::spawn(move || {
            let msg = match source.list_available_images() {
                Ok(urls) => FetchResult::ListingLoaded(urls),
                Err(e) => FetchResult::ListingFailed(e.to_string()),
            };
            let _ = sender.send(msg);
            ctx.request_repaint();
        });
    }

    /// "Render Image": download a random icon from the listing.
    pub fn render_random_image(&mut self) {
        let Some(fetcher) = self.fetcher.clone() else {
            self.status = "Cannot download images: no HTTP client.".to_string();
            return;
        };
        let Some(url) = self.image_links.choose(&mut self.rng).cloned() else {
            self.status = match &self.listing {
                ListingStatus::Loading => "Image list is still loading…".to_string(),
                ListingStatus::Failed(e) => format!("No images available: {}", e),
                ListingStatus::Ready => "No images available.".to_string(),
            };
            return;
        };

        self.status = format!("Fetching {}…", short_name(&url));
        self.pending_fetches += 1;
        let sender = self.io_sender.clone();
        let ctx = self.repaint_ctx.clone();
        rayon::spawn(move || {
            let msg = match fetcher.fetch(&url) {
                Ok(image) => FetchResult::ImageFetched { url, image },
                Err(e) => FetchResult::FetchFailed {
                    url,
                    error: e.to_string(),
                },
            };
            let _ = sender.send(msg);
            ctx.request_repaint();
        });
    }

    /// "Group Images": stack everything on the first image.
    pub fn group_images(&mut self) {
        if self.state.group_at_first() {
            self.status = format!("Grouped {} images.", self.state.len());
        } else {
            self.status = "Need at least two images to group.".to_string();
        }
    }

    /// Drain finished background work.
    fn poll_results(&mut self) {
        while let Ok(result) = self.io_receiver.try_recv() {
            self.pending_fetches = self.pending_fetches.saturating_sub(1);
            self.handle_result(result);
        }
    }

    pub fn handle_result(&mut self, result: FetchResult) {
        match result {
            FetchResult::ListingLoaded(urls) => {
                crate::log_info!("{} images available", urls.len());
                self.status = if urls.is_empty() {
                    "The image list is empty.".to_string()
                } else {
                    format!("{} images available.", urls.len())
                };
                self.image_links = urls;
                self.listing = ListingStatus::Ready;
            }
            FetchResult::ListingFailed(error) => {
                crate::log_err!("Image listing failed: {}", error);
                self.status = format!("Could not load the image list: {}", error);
                self.listing = ListingStatus::Failed(error);
            }
            FetchResult::ImageFetched { url, image } => {
                crate::log_info!("Fetched {} ({}x{})", url, image.width(), image.height());
                let info = ImageInfo::from_image(&image);
                let placement = self.state.add_image(image, &mut self.rng);
                match info {
                    Ok(info) => {
                        self.info_text = info.to_string();
                        self.info_color = Some(info.dominant);
                        self.status = "Image information updated.".to_string();
                    }
                    Err(e) => {
                        crate::log_warn!("No color info for {}: {}", url, e);
                        self.info_text.clear();
                        self.info_color = None;
                        self.status = format!("Image added without color info: {}", e);
                    }
                }
                if placement == Placement::Clamped {
                    self.status.push_str(" The canvas is smaller than the image.");
                }
            }
            FetchResult::FetchFailed { url, error } => {
                crate::log_err!("Fetching {} failed: {}", url, error);
                self.status = format!("Could not load {}: {}", short_name(&url), error);
            }
        }
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn info_text(&self) -> &str {
        &self.info_text
    }

    pub fn listing(&self) -> &ListingStatus {
        &self.listing
    }

    fn show_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let render = egui::Button::new(RichText::new("Render Image").color(Color32::WHITE).strong())
                .fill(RENDER_GREEN);
            if ui.add(render).clicked() {
                self.render_random_image();
            }
            let group = egui::Button::new(RichText::new("Group Images").color(Color32::WHITE).strong())
                .fill(GROUP_BLUE);
            if ui.add(group).clicked() {
                self.group_images();
            }

            ui.separator();
            if let Some(color) = self.info_color {
                let (rect, _) = ui.allocate_exact_size(egui::Vec2::splat(14.0), egui::Sense::hover());
                ui.painter().rect_filled(rect, 2.0, Color32::from(color));
            }
            ui.label(RichText::new(self.info_text.as_str()).strong());
        });
    }

    fn show_status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if self.pending_fetches > 0 {
                ui.add(egui::Spinner::new());
            }
            ui.label(self.status.as_str());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("{} images", self.state.len()));
            });
        });
    }
}

impl eframe::App for GeoCanvasApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_results();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.show_toolbar(ui);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.show_status_bar(ui);
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(ctx.style().visuals.panel_fill))
            .show(ctx, |ui| {
                self.canvas.show(ui, &mut self.state, &mut self.rng);
            });
    }
}

/// Last path segment of a URL, for status messages.
fn short_name(url: &str) -> &str {
    url.rsplit('/').find(|s| !s.is_empty()).unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{FetchError, StaticSource};
    use image::Rgba;
    use std::time::Duration;

    struct SolidFetcher;

    impl ImageFetcher for SolidFetcher {
        fn fetch(&self, url: &str) -> Result<RgbaImage, FetchError> {
            if url.ends_with("missing.svg") {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            Ok(RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255])))
        }
    }

    fn app(urls: &[&str]) -> GeoCanvasApp {
        let source: Arc<dyn ImageSource> =
            Arc::new(StaticSource(urls.iter().map(|s| s.to_string()).collect()));
        let mut app = GeoCanvasApp::with_services(
            egui::Context::default(),
            &AppSettings::default(),
            Some(source),
            Some(Arc::new(SolidFetcher)),
        );
        app.state = CanvasState::new(200, 200);
        wait_one(&mut app);
        app
    }

    /// Block until one background result arrives and apply it.
    fn wait_one(app: &mut GeoCanvasApp) {
        let result = app
            .io_receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("background result");
        app.pending_fetches = app.pending_fetches.saturating_sub(1);
        app.handle_result(result);
    }

    #[test]
    fn listing_arrives_from_worker() {
        let app = app(&["https://x/a.svg", "https://x/b.svg"]);
        assert_eq!(app.listing(), &ListingStatus::Ready);
        assert_eq!(app.status(), "2 images available.");
        assert_eq!(app.pending_fetches, 0);
    }

    #[test]
    fn render_adds_image_and_shows_info() {
        let mut app = app(&["https://x/a.svg"]);
        app.render_random_image();
        assert_eq!(app.status(), "Fetching a.svg…");
        wait_one(&mut app);

        assert_eq!(app.state().len(), 1);
        assert_eq!(app.info_text(), "Size: 8x8 pixels | Color: #ff0000 (red)");
        assert_eq!(app.status(), "Image information updated.");
        let pos = app.state().images()[0].position;
        assert!((0..=192).contains(&pos.x) && (0..=192).contains(&pos.y));
    }

    #[test]
    fn failed_fetch_is_reported_and_adds_nothing() {
        let mut app = app(&["https://x/missing.svg"]);
        app.render_random_image();
        wait_one(&mut app);

        assert!(app.state().is_empty());
        assert!(app.status().starts_with("Could not load missing.svg:"), "{}", app.status());
        assert!(app.status().contains("404"));
    }

    #[test]
    fn empty_listing_reports_no_images() {
        let mut app = app(&[]);
        app.render_random_image();
        assert_eq!(app.status(), "No images available.");
        assert_eq!(app.pending_fetches, 0);
    }

    #[test]
    fn listing_failure_keeps_app_usable() {
        let mut app = app(&["https://x/a.svg"]);
        app.image_links.clear();
        app.handle_result(FetchResult::ListingFailed("HTTP 403".to_string()));
        assert_eq!(app.listing(), &ListingStatus::Failed("HTTP 403".to_string()));
        app.render_random_image();
        assert_eq!(app.status(), "No images available: HTTP 403");
    }

    #[test]
    fn group_needs_two_images() {
        let mut app = app(&["https://x/a.svg"]);
        app.group_images();
        assert_eq!(app.status(), "Need at least two images to group.");

        for _ in 0..3 {
            app.handle_result(FetchResult::ImageFetched {
                url: "https://x/a.svg".to_string(),
                image: RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])),
            });
        }
        app.group_images();
        assert_eq!(app.status(), "Grouped 3 images.");
        let first = app.state().images()[0].position;
        assert!(app.state().images().iter().all(|i| i.position == first));
    }

    #[test]
    fn short_names() {
        assert_eq!(short_name("https://x/y/25A0.svg"), "25A0.svg");
        assert_eq!(short_name("https://x/y/"), "y");
    }
}
