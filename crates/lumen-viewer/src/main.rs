mod scene;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use lumen_gpu::backends::{SoftwareDriver, WgpuDriver, WgpuInit};
use lumen_gpu::bitmap::Bitmap;
use lumen_gpu::logging::{init_logging, LoggingConfig};
use lumen_gpu::protocol::{synchronize, DriverConfig, GpuDriver, RenderBufferId};

use scene::DemoScene;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Software,
    Wgpu,
}

/// Drives a scripted scene through a GPU backend and writes the last frame to PNG.
#[derive(Debug, Parser)]
#[command(name = "lumen-viewer", version)]
struct Args {
    #[arg(long, value_enum, default_value_t = BackendKind::Software)]
    backend: BackendKind,

    #[arg(long, default_value_t = 256)]
    width: u32,

    #[arg(long, default_value_t = 256)]
    height: u32,

    /// Frames to render; the star turns a little each frame.
    #[arg(long, default_value_t = 1)]
    frames: u32,

    #[arg(long, default_value = "frame.png")]
    out: PathBuf,

    /// `env_logger` filter, e.g. "debug" or "lumen_gpu=trace".
    #[arg(long)]
    log: Option<String>,
}

enum Renderer {
    Software(SoftwareDriver),
    Wgpu(WgpuDriver),
}

impl Renderer {
    fn new(kind: BackendKind, config: &DriverConfig) -> Result<Self> {
        Ok(match kind {
            BackendKind::Software => Renderer::Software(SoftwareDriver::new(config)),
            BackendKind::Wgpu => Renderer::Wgpu(
                WgpuDriver::new_blocking(WgpuInit::default(), config).context("wgpu backend")?,
            ),
        })
    }

    fn driver(&mut self) -> &mut dyn GpuDriver {
        match self {
            Renderer::Software(d) => d,
            Renderer::Wgpu(d) => d,
        }
    }

    fn draw(&mut self) {
        match self {
            Renderer::Software(d) => {
                let stats = d.draw_command_list();
                log::debug!("{stats:?}");
            }
            Renderer::Wgpu(d) => {
                let stats = d.draw_command_list();
                log::debug!("{stats:?}");
            }
        }
    }

    fn read(&self, id: RenderBufferId) -> Result<Bitmap> {
        match self {
            Renderer::Software(d) => d.read_render_buffer(id).context("render buffer is gone"),
            Renderer::Wgpu(d) => d.read_render_buffer(id),
        }
    }

    fn violation_count(&self) -> u64 {
        match self {
            Renderer::Software(d) => d.violations().total(),
            Renderer::Wgpu(d) => d.violations().total(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(match &args.log {
        Some(filter) => LoggingConfig::with_filter(filter.clone()),
        None => LoggingConfig::default(),
    });

    anyhow::ensure!(args.width > 0 && args.height > 0, "--width and --height must be non-zero");

    let config = DriverConfig::default();
    let mut renderer = Renderer::new(args.backend, &config)?;
    if let Renderer::Wgpu(d) = &renderer {
        let info = d.gpu().adapter_info();
        log::info!("adapter: {} ({:?})", info.name, info.backend);
    }

    let scene = {
        let mut pass = synchronize(renderer.driver());
        DemoScene::create(&mut pass, args.width, args.height)
    };

    for frame in 0..args.frames.max(1) {
        {
            let mut pass = synchronize(renderer.driver());
            scene.frame(&mut pass, frame);
        }
        renderer.draw();
    }

    let pixels = renderer.read(scene.render_buffer())?;
    write_png(&pixels, &args.out)?;
    log::info!("wrote {}", args.out.display());

    {
        let mut pass = synchronize(renderer.driver());
        scene.destroy(&mut pass);
    }

    let violations = renderer.violation_count();
    if violations > 0 {
        log::warn!("{violations} protocol violations");
    }
    Ok(())
}

/// Premultiplied BGRA to straight RGBA.
fn to_rgba(bitmap: &Bitmap) -> Vec<u8> {
    let mut out = Vec::with_capacity((bitmap.width() * bitmap.height() * 4) as usize);
    for y in 0..bitmap.height() {
        for px in bitmap.row(y).chunks_exact(4).take(bitmap.width() as usize) {
            let [b, g, r, a] = [px[0], px[1], px[2], px[3]];
            let straight = |c: u8| if a == 0 { 0 } else { ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8 };
            out.extend_from_slice(&[straight(r), straight(g), straight(b), a]);
        }
    }
    out
}

fn write_png(bitmap: &Bitmap, path: &Path) -> Result<()> {
    let image = image::RgbaImage::from_raw(bitmap.width(), bitmap.height(), to_rgba(bitmap))
        .context("pixel buffer does not match the render buffer size")?;
    image.save(path).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpremultiplies_and_swizzles() {
        let bitmap = Bitmap::solid_bgra(1, 1, [0, 64, 128, 128]);
        assert_eq!(to_rgba(&bitmap), [255, 128, 0, 128]);
    }

    #[test]
    fn transparent_stays_black() {
        let bitmap = Bitmap::solid_bgra(2, 1, [0, 0, 0, 0]);
        assert_eq!(to_rgba(&bitmap), [0; 8]);
    }
}
