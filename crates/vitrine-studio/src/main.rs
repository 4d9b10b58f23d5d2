use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use vitrine_assets::{AssetConfig, DefaultSource, GltfLoader, normalize_base};
use vitrine_engine::logging::{LoggingConfig, init_logging};
use vitrine_engine::render::decode_png_data_url;
use vitrine_engine::surface::Background;
use vitrine_thumbs::{GpuThumbnailRenderer, Schedule, Thumbnail, ThumbnailOptions, Thumbnails};

/// Render PNG thumbnails for glTF/GLB assets.
#[derive(Debug, Parser)]
#[command(name = "vitrine", version, about)]
struct Args {
    /// Asset references: bare file names, paths under the base, or URLs.
    #[arg(required = true)]
    assets: Vec<String>,

    /// Directory the PNG files are written to.
    #[arg(short, long, default_value = "thumbnails")]
    out: PathBuf,

    #[arg(long, default_value_t = 512)]
    width: u32,

    #[arg(long, default_value_t = 512)]
    height: u32,

    /// Device pixel ratio, capped at 2.
    #[arg(long, default_value_t = 1.0)]
    pixel_ratio: f32,

    /// "transparent" or a hex color (#rgb, #rrggbb, #rrggbbaa).
    #[arg(long, default_value = "transparent")]
    background: Background,

    /// Application base path. Defaults to $VITRINE_BASE, then "/".
    #[arg(long)]
    base: Option<String>,

    /// Directory serving the base path. Defaults to $VITRINE_ASSET_ROOT, then ".".
    #[arg(long)]
    root: Option<PathBuf>,

    /// Jobs admitted at once.
    #[arg(long, default_value_t = 1)]
    max_concurrent: usize,

    /// Render as soon as a job is admitted instead of deferring to idle time.
    #[arg(long)]
    immediate: bool,

    /// Log filter, e.g. "debug" or "vitrine_thumbs=debug".
    #[arg(long)]
    log: Option<String>,
}

impl Args {
    fn asset_config(&self) -> AssetConfig {
        let mut config = AssetConfig::from_env();
        if let Some(base) = &self.base {
            config.base = normalize_base(Some(base));
        }
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        config
    }

    fn options(&self) -> ThumbnailOptions {
        let schedule = if self.immediate { Schedule::Immediate } else { Schedule::Idle };
        ThumbnailOptions::default()
            .with_size(self.width, self.height)
            .with_pixel_ratio(self.pixel_ratio)
            .with_background(self.background)
            .with_schedule(schedule)
            .with_max_concurrent(self.max_concurrent)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        ..Default::default()
    });

    let assets = args.asset_config();
    log::info!("serving base {} from {}", assets.base, assets.root.display());

    let loader = Arc::new(GltfLoader::new(DefaultSource::new(&assets)));
    let renderer = Arc::new(GpuThumbnailRenderer::new(loader, assets));
    let thumbs = Thumbnails::new(renderer, args.options());

    let pending: Vec<_> = args.assets.iter().map(|key| thumbs.ensure(key)).collect();
    let results = futures::future::join_all(pending).await;

    tokio::fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("failed to create {}", args.out.display()))?;

    let mut names = OutputNames::default();
    let mut written = 0usize;
    for (key, result) in args.assets.iter().zip(results) {
        let Thumbnail::Image(url) = result else {
            log::warn!("{key}: no thumbnail");
            continue;
        };
        let png = decode_png_data_url(&url)
            .with_context(|| format!("{key}: renderer returned a malformed image"))?;
        let path = args.out.join(names.next(key));
        tokio::fs::write(&path, png)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("{key} -> {}", path.display());
        written += 1;
    }

    let stats = thumbs.stats();
    log::info!("{written}/{} thumbnails written ({} cached)", args.assets.len(), stats.cached);
    anyhow::ensure!(written > 0, "no thumbnails could be rendered");
    Ok(())
}

/// Unique `<stem>.png` file names for asset references.
#[derive(Default)]
struct OutputNames {
    used: HashSet<String>,
}

impl OutputNames {
    fn next(&mut self, key: &str) -> String {
        let trimmed = key.split(['?', '#']).next().unwrap_or_default();
        let stem = Path::new(trimmed)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("thumbnail");

        let mut name = format!("{stem}.png");
        let mut n = 2;
        while !self.used.insert(name.clone()) {
            name = format!("{stem}-{n}.png");
            n += 1;
        }
        name
    }
}
