//! Scan-cycle orchestration.
//!
//! One `run_cycle` is: discovery pass, bounded snapshot fan-out, four
//! concurrent analyzers per candidate, then a sequential join point
//! where the manipulation detector (single writer), ML scorer and
//! composer run and signals go to the sink. Analyzer computation is
//! synchronous; suspension happens only at gateway fetches.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use sigscan_analyzers::{
    AnalyzerError, OrderbookAnalyzer, OrderbookReport, PatternAnalyzer, PatternReport,
    TechnicalAnalyzer, TechnicalReport, VolumeAnalyzer, VolumeReport,
};
use sigscan_composer::{ComposeInputs, Composer, Verdict};
use sigscan_core::{InstrumentKey, MarketSnapshot};
use sigscan_discovery::DiscoveryEngine;
use sigscan_gateway::{DynGateway, GatewayError, RequestLimiter};
use sigscan_manipulation::ManipulationDetector;
use sigscan_ml::{features, ConfidenceScorer, LinearModel, ModelHandle, FALLBACK_VERSION};
use sigscan_telemetry::Metrics;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::sink::{OutcomeStore, SignalSink};
use crate::snapshot::{FetchLimits, SnapshotFetcher};

/// How a cycle ended from the scheduler's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// Gateway failures exceeded the configured fraction; results this
    /// cycle are partial.
    Degraded,
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Degraded => "degraded",
        }
    }
}

/// Per-cycle summary returned to the caller.
#[derive(Debug)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Candidates that survived discovery.
    pub candidates: usize,
    pub new_listings: usize,
    pub emitted: usize,
    pub suppressed: usize,
    /// Candidates skipped for insufficient data.
    pub skipped: usize,
    /// Candidates dropped at the cycle deadline.
    pub dropped: usize,
    /// Per-instrument gateway failures, discovery included.
    pub gateway_failures: usize,
    pub duration: Duration,
}

struct AnalyzerReports {
    technical: TechnicalReport,
    volume: VolumeReport,
    orderbook: OrderbookReport,
    pattern: PatternReport,
}

enum CandidateResult {
    Analyzed {
        key: InstrumentKey,
        snapshot: Arc<MarketSnapshot>,
        reports: Box<AnalyzerReports>,
    },
    Skipped {
        key: InstrumentKey,
        detail: String,
    },
    Failed {
        key: InstrumentKey,
        error: GatewayError,
    },
    Dropped {
        key: InstrumentKey,
    },
}

/// Main application. Owns every pipeline stage; the gateway and the
/// outbound sinks are injected.
pub struct Application {
    config: AppConfig,
    discovery: DiscoveryEngine,
    fetcher: Arc<SnapshotFetcher>,
    technical: TechnicalAnalyzer,
    volume: VolumeAnalyzer,
    orderbook: OrderbookAnalyzer,
    pattern: PatternAnalyzer,
    detector: ManipulationDetector,
    scorer: ConfidenceScorer,
    composer: Composer,
    sink: Arc<dyn SignalSink>,
    outcomes: Arc<dyn OutcomeStore>,
    /// Labeled outcome count at the last successful retrain.
    trained_samples: usize,
}

impl Application {
    pub fn new(
        config: AppConfig,
        gateway: DynGateway,
        sink: Arc<dyn SignalSink>,
        outcomes: Arc<dyn OutcomeStore>,
    ) -> Self {
        let limiter = Arc::new(RequestLimiter::new(
            config.rate_budget.max_requests,
            config.rate_budget.window_secs,
        ));
        let fetcher = Arc::new(SnapshotFetcher::new(
            gateway.clone(),
            limiter,
            config.retry.policy(),
            FetchLimits {
                candles: config.candle_limit,
                orderbook_depth: config.discovery.orderbook_depth,
                trades: config.trade_limit,
            },
        ));
        Self {
            discovery: DiscoveryEngine::new(gateway, config.discovery.clone()),
            fetcher,
            technical: TechnicalAnalyzer::new(config.technical.clone()),
            volume: VolumeAnalyzer::new(config.volume.clone()),
            orderbook: OrderbookAnalyzer::new(config.orderbook.clone()),
            pattern: PatternAnalyzer::new(config.pattern.clone()),
            detector: ManipulationDetector::new(
                config.detector.clone(),
                config.consolidation.clone(),
            ),
            scorer: ConfidenceScorer::new(Arc::new(ModelHandle::new())),
            composer: Composer::new(config.composer.clone()),
            sink,
            outcomes,
            trained_samples: 0,
            config,
        }
    }

    /// Run the scan loop until a shutdown signal arrives.
    pub async fn run(mut self) -> AppResult<()> {
        info!(
            interval_secs = self.config.scan_interval_secs,
            workers = self.config.worker_pool_size,
            "Starting scan loop"
        );
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.scan_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_cycle(Utc::now()).await {
                        Ok(report) => {
                            info!(
                                outcome = report.outcome.label(),
                                candidates = report.candidates,
                                emitted = report.emitted,
                                suppressed = report.suppressed,
                                skipped = report.skipped,
                                dropped = report.dropped,
                                failures = report.gateway_failures,
                                duration_ms = report.duration.as_millis() as u64,
                                "Scan cycle finished"
                            );
                            Metrics::cycle_finished(report.outcome.label());
                        }
                        Err(err) => {
                            error!(error = %err, "Scan cycle failed");
                            Metrics::cycle_finished("failed");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }
        Ok(())
    }

    /// One full cycle at `now`. Only a failed universe listing is fatal;
    /// everything per-instrument is isolated.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> AppResult<CycleReport> {
        let start = Instant::now();
        let deadline = Duration::from_secs(self.config.cycle_deadline_secs);

        let discovered = self.discovery.scan(now).await?;
        Metrics::phase_duration("discovery", millis(start.elapsed()));
        Metrics::candidates(discovered.candidates.len() as i64);
        for _ in &discovered.new_listings {
            Metrics::new_listing();
        }
        for (_, reject) in &discovered.rejections {
            Metrics::filter_rejected(reject.gate());
        }
        for (_, err) in &discovered.failures {
            Metrics::gateway_error(err.kind());
        }

        // Keys still listed this cycle; cross-cycle detector state for
        // anything else is dropped.
        let mut universe: Vec<InstrumentKey> = discovered
            .candidates
            .iter()
            .map(|c| c.instrument.key.clone())
            .collect();
        universe.extend(discovered.rejections.iter().map(|(k, _)| k.clone()));
        universe.extend(discovered.failures.iter().map(|(k, _)| k.clone()));

        let candidates = discovered.candidates.len();
        let new_listings = discovered.new_listings.len();
        let attempted = candidates + discovered.failures.len();
        let mut gateway_failures = discovered.failures.len();

        let snapshot_start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.worker_pool_size));
        let mut tasks: JoinSet<CandidateResult> = JoinSet::new();
        for candidate in discovered.candidates {
            let key = candidate.instrument.key;
            let fetcher = self.fetcher.clone();
            let semaphore = semaphore.clone();
            let technical = self.technical.clone();
            let volume = self.volume.clone();
            let orderbook = self.orderbook.clone();
            let pattern = self.pattern.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return CandidateResult::Dropped { key },
                };

                let remaining = deadline.saturating_sub(start.elapsed());
                let snapshot = match timeout(remaining, fetcher.fetch(&key, now)).await {
                    Ok(Ok(snapshot)) => Arc::new(snapshot),
                    Ok(Err(error)) => return CandidateResult::Failed { key, error },
                    Err(_) => return CandidateResult::Dropped { key },
                };

                match analyze(technical, volume, orderbook, pattern, snapshot.clone()).await {
                    Ok(reports) => CandidateResult::Analyzed {
                        key,
                        snapshot,
                        reports: Box::new(reports),
                    },
                    Err(detail) => CandidateResult::Skipped { key, detail },
                }
            });
        }

        let mut results = Vec::with_capacity(candidates);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => error!(error = %err, "Candidate task failed"),
            }
        }
        Metrics::phase_duration("snapshot", millis(snapshot_start.elapsed()));

        // Join point: single-writer detector state, then score and compose.
        let compose_start = Instant::now();
        let mut emitted = 0;
        let mut suppressed = 0;
        let mut skipped = 0;
        let mut dropped = 0;
        for result in results {
            match result {
                CandidateResult::Analyzed {
                    key,
                    snapshot,
                    reports,
                } => {
                    if self.finish_candidate(&key, &snapshot, &reports) {
                        emitted += 1;
                    } else {
                        suppressed += 1;
                    }
                }
                CandidateResult::Skipped { key, detail } => {
                    debug!(instrument = %key, detail, "Candidate skipped");
                    skipped += 1;
                }
                CandidateResult::Failed { key, error } => {
                    warn!(instrument = %key, error = %error, "Snapshot fetch failed");
                    Metrics::gateway_error(error.kind());
                    gateway_failures += 1;
                }
                CandidateResult::Dropped { key } => {
                    debug!(instrument = %key, "Cycle deadline hit, dropped until next cycle");
                    dropped += 1;
                }
            }
        }
        self.detector.retain(&universe);
        self.maybe_retrain();
        Metrics::phase_duration("compose", millis(compose_start.elapsed()));
        Metrics::phase_duration("total", millis(start.elapsed()));

        let outcome = if attempted > 0
            && gateway_failures as f64 / attempted as f64 > self.config.degraded_failure_fraction
        {
            warn!(
                gateway_failures,
                attempted, "Most candidates failed at the gateway, cycle degraded"
            );
            CycleOutcome::Degraded
        } else {
            CycleOutcome::Completed
        };

        Ok(CycleReport {
            outcome,
            candidates,
            new_listings,
            emitted,
            suppressed,
            skipped,
            dropped,
            gateway_failures,
            duration: start.elapsed(),
        })
    }

    /// Detector, scorer and composer for one analyzed candidate.
    /// Returns whether a signal was emitted.
    fn finish_candidate(
        &mut self,
        key: &InstrumentKey,
        snapshot: &MarketSnapshot,
        reports: &AnalyzerReports,
    ) -> bool {
        let manipulation = self.detector.assess(snapshot);
        for finding in &manipulation.findings {
            Metrics::manipulation_flag(&finding.flag.to_string());
        }
        Metrics::manipulation_score(manipulation.score);

        let stats = self.outcomes.hit_stats(key);
        let features = features::extract(
            &reports.technical,
            &reports.volume,
            &reports.orderbook,
            &reports.pattern,
            &manipulation,
            &stats,
        );
        let prediction = self.scorer.score(&features);
        Metrics::ml_prediction(if prediction.model_version == FALLBACK_VERSION {
            "fallback"
        } else {
            "model"
        });

        let inputs = ComposeInputs {
            key,
            price: snapshot.current_price(),
            technical: &reports.technical,
            volume: &reports.volume,
            orderbook: &reports.orderbook,
            pattern: &reports.pattern,
            manipulation: &manipulation,
            prediction: &prediction,
        };
        match self.composer.compose(&inputs) {
            Verdict::Emit(signal) => {
                Metrics::signal_emitted(
                    &key.exchange.to_string(),
                    &signal.direction.to_string(),
                    &signal.quality.to_string(),
                    signal.quality_score,
                );
                self.sink.deliver(&signal);
                true
            }
            Verdict::Suppress(reason) => {
                debug!(instrument = %key, reason = reason.label(), "Signal suppressed");
                Metrics::signal_suppressed(reason.label());
                false
            }
        }
    }

    /// Retrain when enough newly labeled outcomes accumulated. Failure
    /// to train keeps the previous model; scoring never depends on it.
    fn maybe_retrain(&mut self) {
        let outcomes = self.outcomes.outcomes();
        let labeled = outcomes
            .iter()
            .filter(|o| o.kind.label().is_some())
            .count();
        if labeled < self.config.train.min_samples || labeled <= self.trained_samples {
            return;
        }
        match LinearModel::fit(&outcomes, &self.config.train) {
            Ok(model) => {
                info!(
                    version = %model.version,
                    samples = model.samples,
                    "Retrained scoring model"
                );
                self.scorer.handle().install(model);
                self.trained_samples = labeled;
            }
            Err(err) => debug!(error = %err, "Retrain skipped"),
        }
    }
}

/// Run the four analyzers concurrently over one immutable snapshot.
/// Any analyzer reporting insufficient data skips the candidate.
async fn analyze(
    technical: TechnicalAnalyzer,
    volume: VolumeAnalyzer,
    orderbook: OrderbookAnalyzer,
    pattern: PatternAnalyzer,
    snapshot: Arc<MarketSnapshot>,
) -> Result<AnalyzerReports, String> {
    let technical_task = tokio::task::spawn_blocking({
        let snapshot = snapshot.clone();
        move || technical.analyze(&snapshot)
    });
    let volume_task = tokio::task::spawn_blocking({
        let snapshot = snapshot.clone();
        move || volume.analyze(&snapshot)
    });
    let orderbook_task = tokio::task::spawn_blocking({
        let snapshot = snapshot.clone();
        move || orderbook.analyze(&snapshot)
    });
    let pattern_task = tokio::task::spawn_blocking(move || pattern.analyze(&snapshot));

    let (technical, volume, orderbook, pattern) =
        tokio::join!(technical_task, volume_task, orderbook_task, pattern_task);
    Ok(AnalyzerReports {
        technical: flatten(technical)?,
        volume: flatten(volume)?,
        orderbook: flatten(orderbook)?,
        pattern: flatten(pattern)?,
    })
}

fn flatten<T>(
    joined: Result<Result<T, AnalyzerError>, tokio::task::JoinError>,
) -> Result<T, String> {
    match joined {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(err)) => Err(err.to_string()),
        Err(err) => Err(format!("analyzer task failed: {err}")),
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
