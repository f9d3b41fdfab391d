//! Caption-and-critique pipeline: image → caption → review → file.

use std::path::Path;
use std::time::Instant;

use crate::capture::ImagePayload;
use crate::captioner::ImageCaptioner;
use crate::generator::TextGenerator;
use crate::output::OutputFile;
use crate::prompt::{critique_prompt, Tone};
use crate::types::{CritiqueResult, RunReport};

/// Chains an image captioner and a text generator into a single run.
pub struct CritiquePipeline<C, G> {
    captioner: C,
    generator: G,
    tone: Tone,
    max_image_dim: Option<u32>,
}

impl<C: ImageCaptioner, G: TextGenerator> CritiquePipeline<C, G> {
    pub fn new(captioner: C, generator: G) -> Self {
        Self {
            captioner,
            generator,
            tone: Tone::default(),
            max_image_dim: None,
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    /// Downscale images larger than `max_dim` before captioning.
    pub fn with_max_image_dim(mut self, max_dim: Option<u32>) -> Self {
        self.max_image_dim = max_dim;
        self
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    /// Produce a review for the image at `image_path` and write it to
    /// `output_path`.
    ///
    /// The output location is validated before any network call. Nothing is
    /// written unless both remote calls succeed.
    pub async fn run(&self, image_path: &Path, output_path: &Path) -> CritiqueResult<RunReport> {
        let result = self.run_steps(image_path, output_path).await;
        if let Err(e) = &result {
            tracing::error!("Critique aborted: {e}");
        }
        result
    }

    async fn run_steps(&self, image_path: &Path, output_path: &Path) -> CritiqueResult<RunReport> {
        let started = Instant::now();
        tracing::info!(
            "Critique started: image={} output={} tone={}",
            image_path.display(),
            output_path.display(),
            self.tone
        );

        let output = OutputFile::prepare(output_path)?;
        tracing::debug!("Output {} is writable", output.path().display());

        let mut image = ImagePayload::from_file(image_path).await?;
        if let Some(max_dim) = self.max_image_dim {
            image = image.downscaled(max_dim)?;
        }
        tracing::debug!("Loaded image: {} bytes, {}", image.bytes.len(), image.mime);

        let caption = self.captioner.caption(&image).await?;
        tracing::info!("Caption: {caption}");

        let prompt = critique_prompt(&caption, self.tone);
        tracing::info!("Requesting review");
        let review = self.generator.generate(&prompt).await?;
        tracing::info!("Review: {review}");

        output.commit(&review)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Critique written to {} in {elapsed_ms}ms",
            output_path.display()
        );

        Ok(RunReport {
            image_path: image_path.display().to_string(),
            output_path: output_path.display().to_string(),
            tone: self.tone,
            caption,
            review,
            elapsed_ms,
        })
    }
}
