use std::time::{Duration, Instant};
use ash::vk;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use framebatch::renderer::Renderer;
use framebatch::renderer::config::RenderConfig;

const DEFAULT_FRAME_COUNT: u64 = 120;
const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};

/// Renders a fixed number of frames offscreen and reports frame timings.
pub struct App {
    renderer: Renderer,
    frame_count: u64,
}

impl App {
    pub fn new() -> Result<Self> {
        let frame_count = match std::env::args().nth(1) {
            Some(arg) => arg
                .parse()
                .wrap_err_with(|| format!("Invalid frame count: {:?}", arg))?,
            None => DEFAULT_FRAME_COUNT,
        };
        let renderer = Renderer::new(RenderConfig::default(), EXTENT)?;

        Ok(Self {
            renderer,
            frame_count,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let start = Instant::now();
        let mut slowest = Duration::ZERO;

        while self.renderer.frame_number() < self.frame_count {
            let frame_start = Instant::now();
            self.renderer.draw()?;
            let elapsed = frame_start.elapsed();
            slowest = slowest.max(elapsed);
            log::trace!("Frame {} took {:?}", self.renderer.frame_number(), elapsed);
        }

        let total = start.elapsed();
        log::info!(
            "Rendered {} frames in {:?} (avg {:?}, slowest {:?}, {} pipelines cached)",
            self.frame_count,
            total,
            total / self.frame_count.max(1) as u32,
            slowest,
            self.renderer.context().cached_pipeline_count(),
        );
        if let Some(gpu_time) = self.renderer.context().last_gpu_frame_time() {
            log::info!("Last measured GPU frame time: {:?}", gpu_time);
        }
        Ok(())
    }
}
