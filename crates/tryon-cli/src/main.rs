use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tryon_core::compositor::FALLBACK_OPACITY_MULTIPLIER;
use tryon_core::regions::regions_for;
use tryon_core::{
    parse_landmarks, parse_recommendations, CompositeRequest, Compositor, CompositorConfig,
    EffectCatalog, EffectType, LandmarkProvider, LandmarkSet, Region, Rgb, SelectionState,
    SidecarProvider, FACE_MESH_LANDMARKS,
};

#[derive(Parser)]
#[command(name = "tryon", about = "Virtual makeup try-on CLI")]
struct Cli {
    /// Catalog file to use instead of the built-in one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog effects
    Effects {
        /// Only show effects of this type
        #[arg(long = "type")]
        effect_type: Option<EffectType>,
    },
    /// Show facial regions and which product types paint them
    Regions,
    /// Composite an effect onto an image without the daemon
    Render {
        /// Input photo
        #[arg(long)]
        image: PathBuf,
        /// Where to write the result
        #[arg(long)]
        out: PathBuf,
        /// Landmark JSON (default: <image>.landmarks.json if present)
        #[arg(long)]
        landmarks: Option<PathBuf>,
        /// Catalog effect id, e.g. "lipstick-red"
        #[arg(long, conflicts_with_all = ["rgb", "recommendation"])]
        effect: Option<String>,
        /// Custom color as "r,g,b" or "#rrggbb"
        #[arg(long, requires = "effect_type", conflicts_with = "recommendation")]
        rgb: Option<Rgb>,
        /// Product type for --rgb
        #[arg(long = "type")]
        effect_type: Option<EffectType>,
        /// Label for --rgb
        #[arg(long, default_value = "Custom")]
        label: String,
        /// Recommendation response (JSON or model text) to preview from
        #[arg(long)]
        recommendation: Option<PathBuf>,
        /// Which recommendation to preview
        #[arg(long, default_value_t = 0, requires = "recommendation")]
        pick: usize,
        /// Intensity 0-100 (default 50, or 75 for custom colors)
        #[arg(long)]
        intensity: Option<i64>,
        /// Whole-frame opacity at 100% when landmarks are missing [env: TRYON_FALLBACK_OPACITY]
        #[arg(long)]
        fallback_opacity: Option<f32>,
        /// Points per landmark set from the detector [env: TRYON_LANDMARK_COUNT]
        #[arg(long)]
        landmark_count: Option<usize>,
    },
    /// Show daemon status
    Status,
}

#[zbus::proxy(
    interface = "org.freedesktop.TryOn1",
    default_service = "org.freedesktop.TryOn1",
    default_path = "/org/freedesktop/TryOn1"
)]
trait TryOn {
    fn status(&self) -> zbus::Result<String>;
}

/// Selection flags of the render command.
struct SelectionArgs {
    effect: Option<String>,
    rgb: Option<Rgb>,
    effect_type: Option<EffectType>,
    label: String,
    recommendation: Option<String>,
    pick: usize,
    intensity: Option<i64>,
}

fn build_selection(catalog: &EffectCatalog, args: SelectionArgs) -> Result<SelectionState> {
    let mut state = SelectionState::new();

    if let Some(id) = &args.effect {
        state.set_preset(catalog, id)?;
    } else if let Some(color) = args.rgb {
        let Some(effect_type) = args.effect_type else {
            bail!("--rgb needs --type");
        };
        state.set_override(color, effect_type, args.label);
    } else if let Some(text) = &args.recommendation {
        let recs = parse_recommendations(text)?;
        let Some(rec) = recs.get(args.pick) else {
            bail!("recommendation {} out of range ({} available)", args.pick, recs.len());
        };
        let Some((color, effect_type, label)) = rec.as_override() else {
            bail!("{} cannot be previewed", rec.label());
        };
        state.set_override(color, effect_type, label);
    }

    if let Some(value) = args.intensity {
        state.set_intensity(value)?;
    }
    Ok(state)
}

/// Explicit landmark file, else the sidecar next to the image. Missing
/// landmarks are not an error; the render falls back.
fn load_landmarks(
    explicit: Option<&Path>,
    image: &image::RgbImage,
    source: &Path,
) -> Result<Option<LandmarkSet>> {
    if let Some(path) = explicit {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        return Ok(Some(parse_landmarks(&json)?));
    }
    match SidecarProvider::default().detect(image, Some(source)) {
        Ok(set) => Ok(Some(set)),
        Err(e) => {
            tracing::warn!(error = %e, "no landmarks; rendering whole-frame preview");
            Ok(None)
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn print_effects(catalog: &EffectCatalog, filter: Option<EffectType>) {
    for effect in catalog
        .effects()
        .iter()
        .filter(|e| filter.map_or(true, |t| e.effect_type == t))
    {
        println!(
            "{:<20} {:<11} {}  {}",
            effect.id, effect.effect_type, effect.color, effect.display_name
        );
    }
}

fn print_regions() {
    for region in Region::ALL {
        let types: Vec<&str> = EffectType::ALL
            .into_iter()
            .filter(|t| regions_for(*t).contains(&region))
            .map(EffectType::as_str)
            .collect();
        println!(
            "{:<12} {:>3} points  {}",
            region.name(),
            region.indices().len(),
            types.join(", ")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let catalog_path = cli
        .catalog
        .or_else(|| std::env::var_os("TRYON_CATALOG_PATH").map(PathBuf::from));
    let catalog = match &catalog_path {
        Some(path) => EffectCatalog::load(path)?,
        None => EffectCatalog::builtin()?,
    };

    match cli.command {
        Commands::Effects { effect_type } => print_effects(&catalog, effect_type),
        Commands::Regions => print_regions(),
        Commands::Render {
            image,
            out,
            landmarks,
            effect,
            rgb,
            effect_type,
            label,
            recommendation,
            pick,
            intensity,
            fallback_opacity,
            landmark_count,
        } => {
            let recommendation = recommendation
                .map(|path| {
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))
                })
                .transpose()?;
            let state = build_selection(
                &catalog,
                SelectionArgs {
                    effect,
                    rgb,
                    effect_type,
                    label,
                    recommendation,
                    pick,
                    intensity,
                },
            )?;

            let base = image::open(&image)
                .with_context(|| format!("opening {}", image.display()))?
                .to_rgb8();
            let landmarks = load_landmarks(landmarks.as_deref(), &base, &image)?;

            let config = CompositorConfig {
                fallback_opacity: fallback_opacity
                    .or_else(|| env_parse("TRYON_FALLBACK_OPACITY"))
                    .unwrap_or(FALLBACK_OPACITY_MULTIPLIER)
                    .clamp(0.0, 1.0),
            };
            let landmark_count = landmark_count
                .or_else(|| env_parse("TRYON_LANDMARK_COUNT"))
                .unwrap_or(FACE_MESH_LANDMARKS);
            let compositor = Compositor::new(&catalog, landmark_count, config)?;
            let result = compositor.composite(&CompositeRequest {
                base_image: &base,
                landmarks: landmarks.as_ref(),
                selection: state.current(),
                intensity: state.intensity(),
            });
            result
                .image
                .save(&out)
                .with_context(|| format!("writing {}", out.display()))?;

            println!(
                "{} ({:?}, {} at {}%) -> {}",
                image.display(),
                result.mode,
                state.current().label().unwrap_or("no effect"),
                state.intensity().get(),
                out.display()
            );
        }
        Commands::Status => match zbus::Connection::session().await {
            Ok(conn) => {
                let proxy = TryOnProxy::new(&conn).await?;
                match proxy.status().await {
                    Ok(status) => println!("{status}"),
                    Err(e) => println!("tryond: not reachable ({e})"),
                }
            }
            Err(e) => println!("tryond: not connected ({e})"),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tryon_core::Selection;

    fn args() -> SelectionArgs {
        SelectionArgs {
            effect: None,
            rgb: None,
            effect_type: None,
            label: "Custom".into(),
            recommendation: None,
            pick: 0,
            intensity: None,
        }
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_preset_selection() {
        let catalog = EffectCatalog::builtin().unwrap();
        let state = build_selection(
            &catalog,
            SelectionArgs {
                effect: Some("blush-pink".into()),
                ..args()
            },
        )
        .unwrap();
        assert!(matches!(state.current(), Selection::Preset(e) if e.id == "blush-pink"));
        assert_eq!(state.intensity().get(), 50);
    }

    #[test]
    fn test_unknown_preset_fails() {
        let catalog = EffectCatalog::builtin().unwrap();
        let result = build_selection(
            &catalog,
            SelectionArgs {
                effect: Some("glitter".into()),
                ..args()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rgb_override_defaults_to_75() {
        let catalog = EffectCatalog::builtin().unwrap();
        let state = build_selection(
            &catalog,
            SelectionArgs {
                rgb: Some(Rgb::new(10, 20, 30)),
                effect_type: Some(EffectType::Eyeshadow),
                ..args()
            },
        )
        .unwrap();
        assert_eq!(state.current().resolve(), Some((Rgb::new(10, 20, 30), EffectType::Eyeshadow)));
        assert_eq!(state.intensity().get(), 75);
    }

    #[test]
    fn test_explicit_intensity_wins() {
        let catalog = EffectCatalog::builtin().unwrap();
        let state = build_selection(
            &catalog,
            SelectionArgs {
                rgb: Some(Rgb::new(10, 20, 30)),
                effect_type: Some(EffectType::Lipstick),
                intensity: Some(20),
                ..args()
            },
        )
        .unwrap();
        assert_eq!(state.intensity().get(), 20);

        let bad = build_selection(
            &catalog,
            SelectionArgs {
                intensity: Some(150),
                ..args()
            },
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_recommendation_pick() {
        let catalog = EffectCatalog::builtin().unwrap();
        let text = r#"```json
[{"productName":"Serum","brand":"A","type":"serum","category":"skincare"},
 {"productName":"Tint","brand":"B","shade":"Rose","type":"blush","rgbColor":{"r":200,"g":100,"b":120}}]
```"#;
        let state = build_selection(
            &catalog,
            SelectionArgs {
                recommendation: Some(text.into()),
                pick: 1,
                ..args()
            },
        )
        .unwrap();
        assert_eq!(state.current().label(), Some("B Tint (Rose)"));

        let skincare = build_selection(
            &catalog,
            SelectionArgs {
                recommendation: Some(text.into()),
                ..args()
            },
        );
        assert!(skincare.is_err());
    }
}
