use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::assets::image_file::ImageFile;
use crate::batch::package::{PackageReceipt, Packager, package_outputs};
use crate::compose::compositor::{Compositor, CompositorState, EncodedImage};
use crate::foundation::error::{FiligraneError, FiligraneResult};
use crate::layout::pattern::SeedPolicy;
use crate::render::surface::Surface;
use crate::render::watermark::Watermark;
use crate::settings::model::WatermarkSettings;

/// Shared flag that stops a batch before its next image.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that is not yet raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The image being processed still finishes.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Pipeline step an image failed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureStep {
    /// Base or watermark image could not be loaded.
    Decode,
    /// Settings, fonts or drawing rejected the image.
    Render,
    /// The finished surface could not be encoded.
    Encode,
}

impl FailureStep {
    fn classify(err: &FiligraneError, reached: Option<CompositorState>) -> Self {
        match (err, reached) {
            (FiligraneError::Decode { .. }, _) => Self::Decode,
            (_, Some(CompositorState::WatermarkApplied | CompositorState::Encoded)) => Self::Encode,
            _ => Self::Render,
        }
    }
}

/// One image that produced no output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFailure {
    /// Position in the input batch.
    pub index: usize,
    /// Input name.
    pub name: String,
    /// Step that failed.
    pub step: FailureStep,
    /// Error text.
    pub message: String,
}

/// Progress report, emitted after every image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchProgress {
    /// Images finished so far, failed ones included.
    pub processed: usize,
    /// Images in the batch.
    pub total: usize,
    /// Name of the image that just finished.
    pub name: String,
    /// Whether it produced an output.
    pub ok: bool,
}

/// Results of the render phase of a batch.
#[derive(Debug)]
pub struct BatchOutput {
    /// Encoded outputs in input order. Failed images are absent.
    pub outputs: Vec<EncodedImage>,
    /// Images that failed, in input order.
    pub failures: Vec<ImageFailure>,
    /// Whether the batch stopped early on request.
    pub canceled: bool,
    /// Images in the input batch.
    pub total: usize,
    /// Seed policy the batch ran with. Each output carries the seed it was rendered with.
    pub seed_policy: SeedPolicy,
}

impl BatchOutput {
    /// Every input produced exactly one output.
    pub fn is_complete(&self) -> bool {
        !self.canceled && self.failures.is_empty() && self.outputs.len() == self.total
    }

    /// Hand the outputs to `packager`.
    ///
    /// Refuses incomplete batches so an archive never disagrees with its input list. Outputs are
    /// borrowed, so a failed packaging attempt can be retried.
    pub fn package(&self, packager: &mut dyn Packager) -> FiligraneResult<PackageReceipt> {
        if !self.is_complete() {
            return Err(FiligraneError::packaging(format!(
                "batch incomplete: {} of {} images rendered, {} failed{}",
                self.outputs.len(),
                self.total,
                self.failures.len(),
                if self.canceled { ", canceled" } else { "" }
            )));
        }
        package_outputs(&self.outputs, packager)
    }
}

/// Packaging result of [`BatchDriver::run`].
#[derive(Debug)]
pub enum PackageOutcome {
    /// Not attempted because the batch was incomplete.
    Skipped,
    /// Archive written.
    Packaged(PackageReceipt),
    /// Packaging failed; outputs are still held by the report.
    Failed(FiligraneError),
}

/// Everything a finished [`BatchDriver::run`] produced.
#[derive(Debug)]
pub struct BatchReport {
    /// Render results.
    pub output: BatchOutput,
    /// Packaging result.
    pub packaging: PackageOutcome,
    /// Whether a session entry was recorded.
    pub session_recorded: bool,
}

/// Receives one entry per packaged batch.
pub trait SessionLog {
    /// Record a finished batch of `image_count` images rendered with `settings`.
    fn record_session(
        &mut self,
        image_count: usize,
        settings: &WatermarkSettings,
    ) -> FiligraneResult<()>;
}

type ProgressFn<'p> = Box<dyn FnMut(&BatchProgress) + 'p>;

/// Drives a batch through a [`Compositor`], strictly one image at a time.
pub struct BatchDriver<'p> {
    seed_policy: SeedPolicy,
    cancel: CancelFlag,
    progress: Option<ProgressFn<'p>>,
}

impl Default for BatchDriver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p> BatchDriver<'p> {
    /// A driver with one clock seed for the whole batch.
    pub fn new() -> Self {
        Self {
            seed_policy: SeedPolicy::fixed_now(),
            cancel: CancelFlag::new(),
            progress: None,
        }
    }

    /// Use `seed` for every image, e.g. the one the preview was rendered with.
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_seed_policy(SeedPolicy::Fixed(seed))
    }

    /// Resolve the random-pattern seed through `policy` once per image.
    pub fn with_seed_policy(mut self, policy: SeedPolicy) -> Self {
        self.seed_policy = policy;
        self
    }

    /// Observe `cancel` before each image.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Call `f` after every image.
    pub fn on_progress(mut self, f: impl FnMut(&BatchProgress) + 'p) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Seed policy in use.
    pub fn seed_policy(&self) -> SeedPolicy {
        self.seed_policy
    }

    /// Cancellation handle.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Render and encode every base image in order.
    ///
    /// A failing image is recorded and skipped. Errors that make every image fail (no drawing
    /// surface, invalid settings) abort the batch.
    #[tracing::instrument(skip_all, fields(images = bases.len(), seed_policy = ?self.seed_policy))]
    pub fn render_all<S: Surface>(
        &mut self,
        compositor: &mut Compositor<S>,
        bases: &[ImageFile],
        settings: &WatermarkSettings,
        watermark_image: Option<&ImageFile>,
    ) -> FiligraneResult<BatchOutput> {
        settings.validate()?;
        let watermark = Watermark::select(settings, watermark_image)?;
        let mut out = BatchOutput {
            outputs: Vec::with_capacity(bases.len()),
            failures: Vec::new(),
            canceled: false,
            total: bases.len(),
            seed_policy: self.seed_policy,
        };

        for (index, base) in bases.iter().enumerate() {
            if self.cancel.is_canceled() {
                tracing::info!(processed = index, "batch canceled");
                out.canceled = true;
                break;
            }

            let seed = self.seed_policy.resolve();
            let ok = match compositor.render_export(base, settings, watermark, seed) {
                Ok(encoded) => {
                    out.outputs.push(encoded);
                    true
                }
                Err(e) if e.is_batch_fatal() => {
                    tracing::error!(index, name = base.name(), error = %e, "batch aborted");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(index, name = base.name(), error = %e, "image failed");
                    out.failures.push(ImageFailure {
                        index,
                        name: base.name().to_owned(),
                        step: FailureStep::classify(&e, compositor.failed_in()),
                        message: e.to_string(),
                    });
                    false
                }
            };

            let report = BatchProgress {
                processed: index + 1,
                total: bases.len(),
                name: base.name().to_owned(),
                ok,
            };
            tracing::info!(processed = report.processed, total = report.total, ok, "progress");
            if let Some(progress) = self.progress.as_mut() {
                progress(&report);
            }
        }
        Ok(out)
    }

    /// Render, package, then record a session.
    ///
    /// Packaging only happens for complete batches; the session is recorded only after a
    /// successful package. A session-log failure is logged and does not fail the batch.
    #[tracing::instrument(skip_all, fields(images = bases.len()))]
    pub fn run<S: Surface>(
        &mut self,
        compositor: &mut Compositor<S>,
        bases: &[ImageFile],
        settings: &WatermarkSettings,
        watermark_image: Option<&ImageFile>,
        packager: &mut dyn Packager,
        sessions: Option<&mut dyn SessionLog>,
    ) -> FiligraneResult<BatchReport> {
        let output = self.render_all(compositor, bases, settings, watermark_image)?;

        if !output.is_complete() {
            tracing::warn!(
                rendered = output.outputs.len(),
                failed = output.failures.len(),
                canceled = output.canceled,
                "batch incomplete, not packaged"
            );
            return Ok(BatchReport {
                output,
                packaging: PackageOutcome::Skipped,
                session_recorded: false,
            });
        }

        let packaging = match output.package(packager) {
            Ok(receipt) => PackageOutcome::Packaged(receipt),
            Err(e) => {
                tracing::error!(error = %e, "packaging failed");
                PackageOutcome::Failed(e)
            }
        };

        let mut session_recorded = false;
        if let (PackageOutcome::Packaged(_), Some(log)) = (&packaging, sessions) {
            match log.record_session(output.outputs.len(), settings) {
                Ok(()) => session_recorded = true,
                Err(e) => tracing::warn!(error = %e, "session not recorded"),
            }
        }

        Ok(BatchReport {
            output,
            packaging,
            session_recorded,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/batch/driver.rs"]
mod tests;
