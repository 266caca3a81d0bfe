use std::{fs::{self, create_dir_all}, path::{Path, PathBuf}, sync::Arc, thread, time::Duration};

use apriltag_depth::{
    detector::{DepthTagEngineBuilder, DetectError, DetectorSettings, TagDetector, TagObservation},
    msg::{AnnotatedImage, CameraInfo, Header, RawImage, Timestamp},
    util::{ImageY8, Point2D},
    ConfigError, DepthDetectorNode, ParameterStore,
};
use clap::{arg, command, Parser};
use image::RgbImage;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const TAG_HALF: f64 = 12.;

/// Feeds synthetic color and depth streams through a depth tag detector
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of color frames to send
    #[arg(short, long, default_value_t=60)]
    frames: u64,
    /// Color frame period, in milliseconds
    #[arg(short, long, default_value_t=10)]
    period: u64,
    /// Maximum extra delay added to each frame, in milliseconds
    #[arg(short, long, default_value_t=5)]
    jitter: u64,
    /// Number of tags in the scene
    #[arg(short, long, default_value_t=3)]
    tags: u32,
    /// Random seed
    #[arg(long, default_value_t=1)]
    seed: u64,
    /// TOML file with detector parameters
    #[arg(long)]
    params: Option<PathBuf>,
    /// Don't subscribe to detections (only transforms or images keep detection running)
    #[arg(long, default_value_t=false)]
    no_subscriber: bool,
    /// Write annotated frames as PNG files into this directory
    #[arg(long)]
    save_dir: Option<PathBuf>,
}

/// Reports the tags the scene generator placed in the last frame
struct ScriptedDetector {
    scene: Arc<Mutex<Vec<(u32, Point2D)>>>,
}

impl TagDetector for ScriptedDetector {
    fn detect(&self, image: &ImageY8) -> Result<Vec<TagObservation>, DetectError> {
        if image.width() < 16 || image.height() < 16 {
            return Err(DetectError::ImageTooSmall { width: image.width(), height: image.height() });
        }
        let scene = self.scene.lock();
        Ok(scene.iter()
            .map(|(id, c)| TagObservation {
                family: "tag36h11".into(),
                id: *id,
                hamming: 0,
                decision_margin: 60.,
                center: *c,
                corners: [
                    *c + (-TAG_HALF, TAG_HALF),
                    *c + (TAG_HALF, TAG_HALF),
                    *c + (TAG_HALF, -TAG_HALF),
                    *c + (-TAG_HALF, -TAG_HALF),
                ],
                orientation: None,
            })
            .collect())
    }
}

/// Tag positions for frame `i`, circling the image center
fn scene_at(i: u64, tags: u32) -> Vec<(u32, Point2D)> {
    (0..tags)
        .map(|id| {
            let phase = (i as f64) * 0.05 + (id as f64) * std::f64::consts::TAU / (tags as f64);
            let x = WIDTH as f64 / 2. + phase.cos() * 90.;
            let y = HEIGHT as f64 / 2. + phase.sin() * 70.;
            (id, Point2D::of(x, y))
        })
        .collect()
}

fn color_frame(i: u64, scene: &[(u32, Point2D)]) -> RawImage {
    let mut data = vec![200u8; (WIDTH * HEIGHT * 3) as usize];
    for (_, c) in scene {
        let (x0, y0) = ((c.x() - TAG_HALF).max(0.) as u32, (c.y() - TAG_HALF).max(0.) as u32);
        for y in y0..((c.y() + TAG_HALF) as u32).min(HEIGHT) {
            for x in x0..((c.x() + TAG_HALF) as u32).min(WIDTH) {
                let idx = ((y * WIDTH + x) * 3) as usize;
                data[idx..idx + 3].copy_from_slice(&[20, 20, 20]);
            }
        }
    }
    RawImage {
        header: Header { stamp: Timestamp::from_nanos(i * 1_000_000), frame_id: "camera_color_optical_frame".into() },
        width: WIDTH,
        height: HEIGHT,
        encoding: "bgr8".into(),
        is_bigendian: false,
        step: WIDTH * 3,
        data,
    }
}

/// A wall receding from 0.5m on the left to 8m on the right, in millimeters
fn depth_frame(i: u64, rng: &mut StdRng) -> RawImage {
    let mut data = Vec::with_capacity((WIDTH * HEIGHT * 2) as usize);
    for _y in 0..HEIGHT {
        for x in 0..WIDTH {
            let meters = 0.5 + 7.5 * (x as f64 / WIDTH as f64);
            // Occasional dropouts
            let mm = if rng.gen_ratio(1, 50) { 0 } else { (meters * 1000.) as u16 };
            data.extend_from_slice(&mm.to_le_bytes());
        }
    }
    RawImage {
        header: Header { stamp: Timestamp::from_nanos(i * 1_000_000), frame_id: "camera_depth_optical_frame".into() },
        width: WIDTH,
        height: HEIGHT,
        encoding: "16UC1".into(),
        is_bigendian: false,
        step: WIDTH * 2,
        data,
    }
}

fn camera_info() -> CameraInfo {
    CameraInfo {
        width: WIDTH,
        height: HEIGHT,
        k: [300., 0., WIDTH as f64 / 2., 0., 300., HEIGHT as f64 / 2., 0., 0., 1.],
        d: vec![0.; 5],
        ..Default::default()
    }
}

fn save_png(dir: &Path, image: AnnotatedImage) {
    let path = dir.join(format!("frame_{:012}.png", image.header.stamp.as_nanos()));
    match RgbImage::from_raw(image.width, image.height, image.data) {
        Some(buf) => if let Err(e) = buf.save(&path) {
            warn!("Unable to write {}: {e}", path.display());
        },
        None => warn!("Annotated image has the wrong size"),
    }
}

fn jitter(rng: &mut StdRng, period: u64, jitter: u64) -> Duration {
    Duration::from_millis(period + if jitter > 0 { rng.gen_range(0..=jitter) } else { 0 })
}

fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let params = Arc::new(match &args.params {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
            ParameterStore::from_toml_str(&text)?
        },
        None => ParameterStore::new(),
    });
    if args.save_dir.is_some() {
        params.set("publish_tag_detections_image", true);
    }

    let scene = Arc::new(Mutex::new(Vec::new()));
    let detector_scene = scene.clone();
    let builder = DepthTagEngineBuilder::new(move |settings: &DetectorSettings| -> Result<ScriptedDetector, ConfigError> {
        info!("Building {} detector with {} threads", settings.family, settings.nthreads);
        Ok(ScriptedDetector { scene: detector_scene.clone() })
    });
    let node = DepthDetectorNode::new(builder, params.clone())?;

    let detections = (!args.no_subscriber).then(|| node.subscribe_detections());
    let images = node.subscribe_images();
    if let Some(dir) = &args.save_dir {
        create_dir_all(dir).map_err(|e| ConfigError::Parse(format!("{}: {e}", dir.display())))?;
    }

    let mut total = 0;
    thread::scope(|s| {
        let node = &node;
        let args = &args;

        let depth_feed = s.spawn(move || {
            let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(1));
            // Depth runs a little slower than color
            for i in 0..(args.frames * 2 / 3) {
                node.depth_callback(&depth_frame(i, &mut rng));
                thread::sleep(jitter(&mut rng, args.period * 3 / 2, args.jitter));
            }
        });

        let color_feed = s.spawn(move || {
            let mut rng = StdRng::seed_from_u64(args.seed);
            for i in 0..args.frames {
                if i == args.frames / 2 {
                    info!("Narrowing depth range to 0..4m");
                    params.set("depth_max_range", 4.0);
                    node.refresh_params_service();
                }
                let frame_scene = scene_at(i, args.tags);
                let image = color_frame(i, &frame_scene);
                *scene.lock() = frame_scene;
                let outcome = node.image_callback(&image, &camera_info());
                tracing::debug!("Frame {i}: {outcome:?}");
                thread::sleep(jitter(&mut rng, args.period, args.jitter));
            }
        });

        // Consume outputs until both producers are done
        loop {
            let finished = depth_feed.is_finished() && color_feed.is_finished();
            if let Some(detections) = &detections {
                for set in detections.drain() {
                    total += set.len();
                    let ids = set.ids().map(|id| id.to_string()).collect::<Vec<_>>();
                    info!("{}: tags [{}]", set.header.stamp, ids.join(", "));
                }
            }
            if let (Some(images), Some(dir)) = (&images, &args.save_dir) {
                for image in images.drain() {
                    save_png(dir, image);
                }
            }
            if finished {
                break;
            }
            thread::sleep(Duration::from_millis(args.period));
        }
    });

    println!("Received {total} detections");
    println!("{}", node.coordinator().statistics());
    Ok(())
}
