//! egui control panel and point-cloud window.

mod canvas;

pub use canvas::{paint_cloud, paint_landmarks, project, rotation, CanvasRenderer, CanvasView, CloudSnapshot};

use egui::{vec2, Rect};
use morphcloud_core::{EngineError, Formation, LandmarkSlot, Parameter, ParticleEngine};
use morphcloud_platform::Rgb;
use tracing::{info, warn};

/// Widget state mirrored from the engine's config.
struct Controls {
    formation: Formation,
    color: [f32; 3],
    particle_size: f32,
    auto_rotate: bool,
    rotation_speed: f32,
}

impl Controls {
    fn from_engine(engine: &ParticleEngine) -> Self {
        let config = engine.config();
        Self {
            formation: config.formation,
            color: config.appearance.color.to_array(),
            particle_size: config.appearance.particle_size,
            auto_rotate: config.motion.auto_rotate,
            rotation_speed: config.motion.rotation_step_y,
        }
    }
}

pub struct ControlPanelApp {
    engine: ParticleEngine,
    view: CanvasView,
    landmarks: Option<LandmarkSlot>,
    controls: Controls,
    last_error: Option<String>,
}

impl ControlPanelApp {
    pub fn new(engine: ParticleEngine, view: CanvasView, landmarks: Option<LandmarkSlot>) -> Self {
        let controls = Controls::from_engine(&engine);
        Self {
            engine,
            view,
            landmarks,
            controls,
            last_error: None,
        }
    }

    fn apply(&mut self, parameter: Parameter) {
        info!("control panel: {parameter:?}");
        if let Err(e) = self.engine.set_parameter(parameter) {
            self.report(e);
        }
    }

    fn report(&mut self, error: EngineError) {
        warn!("{error}");
        self.last_error = Some(error.to_string());
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Morphcloud");
        ui.separator();

        let mut changes = Vec::new();
        let c = &mut self.controls;

        let previous = c.formation;
        egui::ComboBox::from_label("Formation")
            .selected_text(c.formation.name())
            .show_ui(ui, |ui| {
                for formation in Formation::ALL {
                    ui.selectable_value(&mut c.formation, formation, formation.name());
                }
            });
        if c.formation != previous {
            changes.push(Parameter::Formation(c.formation));
        }

        ui.horizontal(|ui| {
            ui.label("Colour");
            if ui.color_edit_button_rgb(&mut c.color).changed() {
                let [r, g, b] = c.color;
                changes.push(Parameter::Color(Rgb::new(r, g, b)));
            }
        });
        if ui
            .add(egui::Slider::new(&mut c.particle_size, 0.005..=0.1).text("Particle size"))
            .changed()
        {
            changes.push(Parameter::ParticleSize(c.particle_size));
        }
        if ui.checkbox(&mut c.auto_rotate, "Auto rotate").changed() {
            changes.push(Parameter::AutoRotate(c.auto_rotate));
        }
        if ui
            .add(egui::Slider::new(&mut c.rotation_speed, 0.0..=0.02).text("Rotation speed"))
            .changed()
        {
            changes.push(Parameter::RotationSpeed(c.rotation_speed));
        }

        ui.separator();
        let gesture = self.engine.gesture();
        let state = self.engine.formation_state();
        ui.label(if gesture.detected {
            format!("Hands: {}", gesture.hands)
        } else {
            "Hands: none".to_string()
        });
        ui.label(format!("Openness: {:.2}", gesture.openness));
        ui.label(format!("Distance: {:.2}", gesture.distance));
        ui.label(format!("Scale: {:.2}", self.engine.transform().scale));
        ui.label(format!("{:?} {:.0}%", state.phase(), state.progress() * 100.0));
        ui.label(format!("{} particles", state.particle_count()));
        if let Some(error) = &self.last_error {
            ui.colored_label(egui::Color32::LIGHT_RED, error.as_str());
        }

        for parameter in changes {
            self.apply(parameter);
        }
    }
}

impl eframe::App for ControlPanelApp {
    fn update(&mut self, context: &egui::Context, _frame: &mut eframe::Frame) {
        let dt = context.input(|i| i.stable_dt);
        if let Err(e) = self.engine.tick(dt) {
            self.report(e);
        }

        egui::SidePanel::left("controls")
            .resizable(false)
            .show(context, |ui| self.side_panel(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(context, |ui| {
                let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::hover());
                let viewport = response.rect;
                paint_cloud(&painter, viewport, &self.view.snapshot());

                if let Some(landmarks) = &self.landmarks {
                    let size = vec2(160.0, 120.0);
                    let inset = Rect::from_min_size(viewport.right_bottom() - size - vec2(12.0, 12.0), size);
                    paint_landmarks(&painter, inset, &landmarks.latest());
                }
            });

        context.request_repaint();
    }
}

/// Open the window and drive `engine` from its frame callback until closed.
pub fn run_control_panel(
    engine: ParticleEngine,
    view: CanvasView,
    landmarks: Option<LandmarkSlot>,
) -> Result<(), eframe::Error> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Morphcloud")
            .with_inner_size([1100.0, 720.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Morphcloud",
        native_options,
        Box::new(move |_creation_context| Ok(Box::new(ControlPanelApp::new(engine, view, landmarks)))),
    )
}
