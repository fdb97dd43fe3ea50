//! Strategy selection, DOM-clone fallback and the three caller-facing
//! exports (source, annotation, merged).

use crate::annotation::{AnnotationCanvas, AnnotationLayerExporter};
use crate::capture::{
    CaptureOptions, CaptureRegion, CaptureResult, CaptureStrategy, DomCloneRasterizer, SnapshotMap,
    StrategyKind, StructuralDomSnapshot, SystemScreenCapture, VideoFrameSubstitutionManager,
};
use crate::composite::{CompositeResult, CompositingEngine};
use crate::dom::{Document, NodeId};
use crate::platform::PlatformApi;
use crate::{CaptureConfig, Result};
use log::{debug, info, warn};

/// Externally visible mode of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    /// Tagging videos and snapshotting their frames.
    PreparingSnapshots,
    ExportingAnnotation,
    Capturing(StrategyKind),
    /// The preferred strategy failed; retrying with the DOM clone.
    FailedRetrying(StrategyKind),
    Compositing,
    Succeeded,
    TerminallyFailed,
}

pub struct CaptureOrchestrator {
    config: CaptureConfig,
    screen: CaptureStrategy,
    structural: CaptureStrategy,
    dom_clone: CaptureStrategy,
    videos: VideoFrameSubstitutionManager,
    exporter: AnnotationLayerExporter,
    compositor: CompositingEngine,
    state: CaptureState,
    transitions: Vec<CaptureState>,
    strategy_used: Option<StrategyKind>,
}

impl CaptureOrchestrator {
    pub fn new(config: CaptureConfig, platform: &dyn PlatformApi) -> Result<Self> {
        config.validate()?;
        Ok(CaptureOrchestrator {
            screen: CaptureStrategy::SystemScreen(SystemScreenCapture::new(platform.display_capture())),
            structural: CaptureStrategy::Structural(StructuralDomSnapshot::new()),
            dom_clone: CaptureStrategy::DomClone(DomCloneRasterizer::new()),
            videos: VideoFrameSubstitutionManager::new(&config),
            exporter: AnnotationLayerExporter::new(&config),
            compositor: CompositingEngine::new(&config),
            config,
            state: CaptureState::Idle,
            transitions: vec![CaptureState::Idle],
            strategy_used: None,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Preferred strategy for subsequent captures.
    pub fn set_strategy(&mut self, kind: StrategyKind) {
        self.config.strategy = kind;
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Every state entered during the latest run, starting from `Idle`.
    pub fn transitions(&self) -> &[CaptureState] {
        &self.transitions
    }

    /// The strategy that produced the latest source capture.
    pub fn strategy_used(&self) -> Option<StrategyKind> {
        self.strategy_used
    }

    /// Capture an already measured region with the preferred strategy.
    /// A non-default strategy that fails is retried once with the DOM
    /// clone; only the DOM clone's own failure is returned.
    pub async fn capture_region(
        &mut self,
        doc: &mut Document,
        region: &CaptureRegion,
        snapshots: &SnapshotMap,
        overlay: Option<NodeId>,
    ) -> Result<CaptureResult> {
        self.begin();
        let outcome = self.run_strategies(doc, region, snapshots, overlay).await;
        self.finish(outcome)
    }

    /// "Export source only": snapshot videos, then capture `root`.
    pub async fn export_source(
        &mut self,
        doc: &mut Document,
        root: NodeId,
        overlay: Option<NodeId>,
    ) -> Result<CaptureResult> {
        self.begin();
        let outcome = self.source(doc, root, overlay).await;
        self.finish(outcome)
    }

    /// "Export annotation only", sized to the content width of `root`.
    pub async fn export_annotation(
        &mut self,
        doc: &Document,
        root: NodeId,
        canvas: &mut AnnotationCanvas,
    ) -> Result<CaptureResult> {
        self.begin();
        let outcome = match CaptureRegion::measure(doc, root) {
            Ok(region) => self.annotation(&region, canvas).await,
            Err(e) => Err(e),
        };
        self.finish(outcome)
    }

    /// "Export merged": snapshots, annotation, source, then composite.
    pub async fn export_merged(
        &mut self,
        doc: &mut Document,
        root: NodeId,
        canvas: &mut AnnotationCanvas,
        overlay: Option<NodeId>,
    ) -> Result<CompositeResult> {
        self.begin();
        let outcome = self.merged(doc, root, canvas, overlay).await;
        if let Ok(r) = &outcome {
            info!("merged export {}x{} via {:?}", r.width, r.height, self.strategy_used);
        }
        self.finish(outcome)
    }

    fn begin(&mut self) {
        self.state = CaptureState::Idle;
        self.transitions = vec![CaptureState::Idle];
        self.strategy_used = None;
    }

    fn enter(&mut self, state: CaptureState) {
        debug!("capture state: {:?}", state);
        self.state = state;
        self.transitions.push(state);
    }

    fn finish<T>(&mut self, outcome: Result<T>) -> Result<T> {
        match &outcome {
            Ok(_) => self.enter(CaptureState::Succeeded),
            Err(_) => self.enter(CaptureState::TerminallyFailed),
        }
        outcome
    }

    fn strategy(&self, kind: StrategyKind) -> &CaptureStrategy {
        match kind {
            StrategyKind::SystemScreen => &self.screen,
            StrategyKind::Structural => &self.structural,
            StrategyKind::DomClone => &self.dom_clone,
        }
    }

    async fn run_strategies(
        &mut self,
        doc: &mut Document,
        region: &CaptureRegion,
        snapshots: &SnapshotMap,
        overlay: Option<NodeId>,
    ) -> Result<CaptureResult> {
        let preferred = self.config.strategy;
        self.enter(CaptureState::Capturing(preferred));
        let first = {
            let options = CaptureOptions { config: &self.config, snapshots, overlay };
            self.strategy(preferred).capture(doc, region, &options).await
        };
        let (kind, result) = match first {
            Err(e) if !preferred.is_default() => {
                warn!("{} capture failed ({}); falling back to dom-clone", preferred, e);
                self.enter(CaptureState::FailedRetrying(preferred));
                self.enter(CaptureState::Capturing(StrategyKind::DomClone));
                let options = CaptureOptions { config: &self.config, snapshots, overlay };
                (StrategyKind::DomClone, self.dom_clone.capture(doc, region, &options).await)
            }
            other => (preferred, other),
        };
        if result.is_ok() {
            self.strategy_used = Some(kind);
        }
        result
    }

    async fn source(&mut self, doc: &mut Document, root: NodeId, overlay: Option<NodeId>) -> Result<CaptureResult> {
        let region = CaptureRegion::measure(doc, root)?;
        self.enter(CaptureState::PreparingSnapshots);
        let snapshots = self.videos.prepare_all_snapshots(doc, root).await;
        self.run_strategies(doc, &region, &snapshots, overlay).await
    }

    async fn annotation(&mut self, region: &CaptureRegion, canvas: &mut AnnotationCanvas) -> Result<CaptureResult> {
        self.enter(CaptureState::ExportingAnnotation);
        self.exporter.export(canvas, region.content_width, region.dpr).await
    }

    async fn merged(
        &mut self,
        doc: &mut Document,
        root: NodeId,
        canvas: &mut AnnotationCanvas,
        overlay: Option<NodeId>,
    ) -> Result<CompositeResult> {
        let region = CaptureRegion::measure(doc, root)?;
        self.enter(CaptureState::PreparingSnapshots);
        let snapshots = self.videos.prepare_all_snapshots(doc, root).await;
        let annotation = self.annotation(&region, canvas).await?;
        let source = self.run_strategies(doc, &region, &snapshots, overlay).await?;
        self.enter(CaptureState::Compositing);
        self.compositor.composite(&source.image_data, &annotation.image_data).await
    }
}
