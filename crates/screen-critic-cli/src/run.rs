//! Wiring from resolved settings to a live pipeline.

use screen_critic::{
    CritiquePipeline, CritiqueResult, OpenAiChatGenerator, ReplicateCaptioner, RunReport,
};

use crate::config::Settings;

/// Pipeline backed by the hosted captioning and chat services.
pub type HostedPipeline = CritiquePipeline<ReplicateCaptioner, OpenAiChatGenerator>;

/// Construct the hosted clients. Missing credentials fail here, before any
/// network traffic.
pub fn build_pipeline(settings: &Settings) -> CritiqueResult<HostedPipeline> {
    let captioner = ReplicateCaptioner::new(
        settings.replicate_token.clone().unwrap_or_default(),
        &settings.caption_model,
    )?
    .with_base_url(settings.replicate_url.as_str())
    .with_timeout(settings.timeout);

    let generator = OpenAiChatGenerator::new(
        settings.openai_key.clone().unwrap_or_default(),
        settings.chat_model.as_str(),
    )?
    .with_base_url(settings.openai_url.as_str())
    .with_timeout(settings.timeout);

    Ok(CritiquePipeline::new(captioner, generator)
        .with_tone(settings.tone)
        .with_max_image_dim(settings.max_image_dim))
}

/// Run the pipeline once with the configured paths.
pub async fn run_once(settings: &Settings) -> CritiqueResult<RunReport> {
    let pipeline = build_pipeline(settings)?;
    tracing::debug!("Pipeline ready ({} tone)", pipeline.tone());
    pipeline
        .run(&settings.image_path, &settings.output_path)
        .await
}
