//! Production orchestration: Init, BoundaryDetection, SegmentProcessing,
//! Done, with Failed reachable only from a document that cannot be
//! opened or a panic escaping per-segment isolation.
//!
//! A production reaches Done even when individual segments fail; callers
//! inspect `errors` and each segment's `extraction_successful` flag.

use std::panic::AssertUnwindSafe;

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info};

use prodsplit_core::config::{Config, SegmentationConfig};
use prodsplit_core::{
    ErrorScope, ProductionError, ProductionMetadata, ProductionPhase, ProductionResult,
    SegmentationError,
};
use prodsplit_extract::{PagePool, PageSource, PdfPageSource};
use prodsplit_llm::{BoundaryClassifier, LlmError};

use crate::detector::{plan_windows, BoundaryDetector};
use crate::processor::SegmentProcessor;
use crate::progress::{CancelFlag, ProgressEvent, ProgressSink};
use crate::reconciler::reconcile;

pub struct Orchestrator {
    classifier: BoundaryClassifier,
    config: SegmentationConfig,
    /// Owned extraction pool, shared by every production this
    /// orchestrator runs.
    pool: PagePool,
}

impl Orchestrator {
    pub fn new(classifier: BoundaryClassifier, config: SegmentationConfig, pool: PagePool) -> Self {
        Self {
            classifier,
            config,
            pool,
        }
    }

    /// Build from config, creating the provider and extraction pool.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let classifier = BoundaryClassifier::from_config(&config.llm, &config.ollama)?;
        let pool = PagePool::new(config.segmentation.extract_pool_size);
        Ok(Self::new(classifier, config.segmentation.clone(), pool))
    }

    pub fn pool(&self) -> &PagePool {
        &self.pool
    }

    /// Parse a PDF and run the full production on it.
    ///
    /// Only configuration errors are returned as `Err`; every runtime
    /// failure is encoded in the result's phase and error list.
    pub async fn process_pdf(
        &self,
        bytes: Vec<u8>,
        metadata: ProductionMetadata,
        sink: &dyn ProgressSink,
        cancel: CancelFlag,
    ) -> Result<ProductionResult, SegmentationError> {
        // Window geometry must be rejected before any parsing happens.
        plan_windows(0, self.config.window_size, self.config.window_overlap)?;

        let pages = match PdfPageSource::load(bytes, self.pool.clone()).await {
            Ok(pages) => pages,
            Err(e) => {
                let mut result = ProductionResult::new();
                self.fail(&mut result, sink, format!("document could not be opened: {e}"));
                return Ok(result);
            }
        };
        self.run(&pages, metadata, sink, cancel).await
    }

    /// Run a production over an already-opened page source.
    pub async fn run(
        &self,
        pages: &dyn PageSource,
        metadata: ProductionMetadata,
        sink: &dyn ProgressSink,
        cancel: CancelFlag,
    ) -> Result<ProductionResult, SegmentationError> {
        let mut result = ProductionResult::new();
        plan_windows(0, self.config.window_size, self.config.window_overlap)?;

        // Init: the only step whose failure is fatal by definition.
        let total_pages = match pages.page_count().await {
            Ok(n) => n,
            Err(e) => {
                self.fail(&mut result, sink, format!("document could not be opened: {e}"));
                return Ok(result);
            }
        };
        result.total_pages = total_pages;
        info!(
            production_id = %result.production_id,
            total_pages, "production started"
        );

        // Boundary detection.
        result.phase = ProductionPhase::BoundaryDetection;
        let windows = plan_windows(
            total_pages,
            self.config.window_size,
            self.config.window_overlap,
        )?;
        sink.publish(ProgressEvent::DetectionStarted {
            production_id: result.production_id,
            total_pages,
            total_windows: windows.len(),
        });

        let detector = BoundaryDetector::new(&self.classifier, pages);
        let outcome = match detector
            .run(&windows, result.production_id, sink, &cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail(&mut result, sink, format!("boundary detection failed: {e}"));
                return Ok(result);
            }
        };

        result.processing_windows = outcome.windows_executed;
        for (window_index, message) in outcome.window_errors {
            result.errors.push(ProductionError {
                scope: ErrorScope::Window(window_index),
                message,
            });
        }
        if outcome.cancelled {
            info!(production_id = %result.production_id, "cancelled during detection");
            result.processing_completed = Some(Utc::now());
            return Ok(result);
        }

        let boundaries = reconcile(outcome.candidates, total_pages);
        sink.publish(ProgressEvent::DetectionCompleted {
            production_id: result.production_id,
            windows_executed: result.processing_windows,
            boundaries: boundaries.len(),
        });

        // Segment processing, one boundary at a time, failures isolated.
        result.phase = ProductionPhase::SegmentProcessing;
        let processor = SegmentProcessor::new(&self.classifier, pages, &self.config, &metadata);
        let total_segments = boundaries.len();

        for (index, boundary) in boundaries.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    production_id = %result.production_id,
                    segment = index, "cancelled during segment processing"
                );
                result.processing_completed = Some(Utc::now());
                return Ok(result);
            }

            match AssertUnwindSafe(processor.process(index, boundary))
                .catch_unwind()
                .await
            {
                Ok(processed) => {
                    if let Some(message) = processed.error {
                        result.errors.push(ProductionError {
                            scope: ErrorScope::Segment(index),
                            message,
                        });
                    }
                    sink.publish(ProgressEvent::SegmentProcessed {
                        production_id: result.production_id,
                        segment_index: index,
                        total_segments,
                        percent_complete: (index + 1) as f64 / total_segments as f64 * 100.0,
                        successful: processed.segment.extraction_successful,
                    });
                    result.segments_found.push(processed.segment);
                }
                Err(panic) => {
                    let message = panic_message(panic);
                    self.fail(
                        &mut result,
                        sink,
                        format!("segment {index} escaped isolation: {message}"),
                    );
                    return Ok(result);
                }
            }
        }

        // Done.
        result.average_confidence = result.compute_average_confidence();
        result.phase = ProductionPhase::Done;
        result.processing_completed = Some(Utc::now());

        let low_confidence = result
            .low_confidence_boundaries(self.config.confidence_threshold)
            .len();
        info!(
            production_id = %result.production_id,
            segments = result.segments_found.len(),
            low_confidence,
            errors = result.errors.len(),
            average_confidence = result.average_confidence,
            "production complete"
        );
        sink.publish(ProgressEvent::ProductionCompleted {
            production_id: result.production_id,
            segments: result.segments_found.len(),
            errors: result.errors.len(),
            average_confidence: result.average_confidence,
        });

        Ok(result)
    }

    fn fail(&self, result: &mut ProductionResult, sink: &dyn ProgressSink, message: String) {
        error!(production_id = %result.production_id, "production failed: {message}");
        result.phase = ProductionPhase::Failed;
        result.errors.push(ProductionError {
            scope: ErrorScope::Fatal,
            message: message.clone(),
        });
        result.processing_completed = Some(Utc::now());
        sink.publish(ProgressEvent::ProductionFailed {
            production_id: result.production_id,
            message,
        });
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
