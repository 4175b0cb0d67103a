use anyhow::{anyhow, Result};
use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions, Vec2};
use std::time::Duration;
use strikecam::video::{DisplayWindow, Frame, StreamState};
use strikecam::Pipeline;

/// How often the surfaces are polled while nothing else repaints.
const POLL_INTERVAL: Duration = Duration::from_millis(4);

/// Open the replay window and run until it is closed (Q, Esc or the close
/// button). The pipeline is shut down when the window goes away.
pub(crate) fn run(pipeline: Pipeline) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("StrikeCam")
            .with_inner_size([1280.0, 420.0]),
        ..Default::default()
    };
    eframe::run_native(
        "StrikeCam",
        options,
        Box::new(move |cc| Ok(Box::new(Viewer::new(cc.egui_ctx.clone(), pipeline)))),
    )
    .map_err(|err| anyhow!("viewer failed: {err}"))
}

/// One replay pane backed by an egui texture.
struct Pane {
    name: String,
    ctx: egui::Context,
    texture: Option<TextureHandle>,
    quit: bool,
}

impl Pane {
    fn new(ctx: &egui::Context, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ctx: ctx.clone(),
            texture: None,
            quit: false,
        }
    }

    fn draw(&self, ui: &mut egui::Ui, width: f32, state: Option<StreamState>) {
        ui.vertical(|ui| {
            let status = match state {
                Some(StreamState::Capturing) => "capturing",
                Some(StreamState::Stopped) => "stopped",
                None => "unknown",
            };
            ui.label(egui::RichText::new(format!("{} • {status}", self.name)).strong());
            match &self.texture {
                Some(texture) => {
                    let [w, h] = texture.size();
                    let ratio = w as f32 / h.max(1) as f32;
                    ui.add(egui::Image::new((texture.id(), Vec2::new(width, width / ratio))));
                }
                None => {
                    ui.allocate_space(Vec2::new(width, width * 9.0 / 16.0));
                }
            }
        });
    }
}

impl DisplayWindow for Pane {
    fn show(&mut self, frame: &Frame) {
        let size = [frame.width() as usize, frame.height() as usize];
        let image = ColorImage::from_rgb(size, frame.as_rgb());
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::LINEAR),
            None => {
                self.texture = Some(self.ctx.load_texture(
                    format!("replay-{}", self.name),
                    image,
                    TextureOptions::LINEAR,
                ));
            }
        }
    }

    fn quit_requested(&mut self) -> bool {
        self.quit
    }
}

struct Viewer {
    pipeline: Pipeline,
    front: Pane,
    back: Pane,
}

impl Viewer {
    fn new(ctx: egui::Context, pipeline: Pipeline) -> Self {
        let names: Vec<String> = pipeline
            .surfaces()
            .iter()
            .map(|surface| surface.name().to_string())
            .collect();
        let name = |idx: usize, fallback: &str| {
            names.get(idx).cloned().unwrap_or_else(|| fallback.to_string())
        };
        Self {
            front: Pane::new(&ctx, &name(0, "front")),
            back: Pane::new(&ctx, &name(1, "back")),
            pipeline,
        }
    }
}

impl eframe::App for Viewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let quit_key =
            ctx.input(|i| i.key_pressed(egui::Key::Q) || i.key_pressed(egui::Key::Escape));
        self.front.quit = quit_key;
        self.back.quit = quit_key;

        let mut windows: [&mut dyn DisplayWindow; 2] = [&mut self.front, &mut self.back];
        let quit = self.pipeline.poll_displays(&mut windows) || quit_key;
        if quit {
            tracing::info!("quit requested from viewer");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        let states = self.pipeline.stream_states();
        let state_of = |name: &str| {
            states
                .iter()
                .find(|(stream, _)| stream == name)
                .map(|(_, state)| *state)
        };
        egui::CentralPanel::default().show(ctx, |ui| {
            let width = ((ui.available_width() - 12.0) / 2.0).max(64.0);
            ui.horizontal(|ui| {
                self.front.draw(ui, width, state_of(&self.front.name));
                self.back.draw(ui, width, state_of(&self.back.name));
            });
        });
        ctx.request_repaint_after(POLL_INTERVAL);
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.pipeline.shutdown();
    }
}
