//! Picks adapters from the loaded configuration.

use crate::config::ServiceConfig;
use anyhow::{Context, Result};
use pianola_core::{FallbackStorage, Pipeline, PipelineConfig};
use pianola_infra_omr_audiveris::AudiverisOmr;
use pianola_infra_omr_demo::DemoOmr;
use pianola_infra_storage_fs::FsStorage;
use pianola_infra_storage_supabase::SupabaseStorage;
use pianola_ports::omr::OmrPort;
use pianola_ports::storage::AnimationStorePort;
use std::sync::Arc;
use std::time::Duration;

/// Audiveris when it is installed, otherwise the demo engine.
pub fn build_omr(config: &ServiceConfig) -> Arc<dyn OmrPort> {
    let demo = || DemoOmr::new(Duration::from_millis(config.omr.demo_delay_ms));
    if config.omr.demo {
        tracing::info!("using demo OMR engine");
        return Arc::new(demo());
    }

    let audiveris = AudiverisOmr::new(config.omr.engine.clone())
        .with_java(config.omr.java.clone(), config.omr.max_heap_mb);
    match audiveris.check_installation() {
        Ok(()) => {
            tracing::info!(engine = ?config.omr.engine, "using Audiveris OMR engine");
            Arc::new(audiveris)
        }
        Err(err) => {
            tracing::warn!(%err, "Audiveris unavailable, falling back to demo OMR engine");
            Arc::new(demo())
        }
    }
}

/// Supabase backed by the local results dir, or the results dir alone.
///
/// Builds a blocking HTTP client, so call it outside the async runtime.
pub fn build_storage(config: &ServiceConfig) -> Arc<dyn AnimationStorePort> {
    let local = FsStorage::new(config.paths.results_dir.clone());
    let Some(supabase) = config.supabase() else {
        tracing::warn!(
            dir = %config.paths.results_dir.display(),
            "Supabase credentials missing, storing results locally"
        );
        return Arc::new(local);
    };

    match SupabaseStorage::new(supabase) {
        Ok(remote) => {
            tracing::info!("storing results in Supabase with local fallback");
            Arc::new(FallbackStorage::new(Box::new(remote), Box::new(local)))
        }
        Err(err) => {
            tracing::warn!(%err, "Supabase client unavailable, storing results locally");
            Arc::new(local)
        }
    }
}

pub fn build_pipeline(config: &ServiceConfig) -> Result<Pipeline> {
    std::fs::create_dir_all(&config.paths.work_dir).with_context(|| {
        format!(
            "failed to create work dir {}",
            config.paths.work_dir.display()
        )
    })?;
    std::fs::create_dir_all(&config.paths.results_dir).with_context(|| {
        format!(
            "failed to create results dir {}",
            config.paths.results_dir.display()
        )
    })?;

    Ok(Pipeline::new(
        build_omr(config),
        build_storage(config),
        PipelineConfig {
            work_dir: config.paths.work_dir.clone(),
            omr: config.omr_options(),
            convert: config.convert,
        },
    ))
}
