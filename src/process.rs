//! Running the ellipse pipeline.
//!
//! An [`Invocation`] is an immutable record of everything a run needs,
//! captured when it is built. [`Invocation::run`] consumes it, so a record
//! can be executed at most once. [`SdeProcess`] wraps an invocation in a
//! shareable single-use handle whose second `execute` fails with
//! [`SdeError::AlreadyExecuted`].
//!
//! # Pipeline Overview
//!
//! 1. Validate configuration and input schema
//! 2. Partition features into case groups
//! 3. Per group (optionally in parallel): weighted moments, principal axes,
//!    scaled ellipse and boundary ring
//! 4. Assemble results in group order
//!
//! The cancellation check is polled before each group; progress is reported
//! as each group finishes. A group that cannot support an ellipse is skipped
//! with a warning; the run fails only when no group yields one.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::SdeConfig;
use crate::ellipse::build_ellipse;
use crate::error::{Result, SdeError, SdeWarning};
use crate::feature::{CaseKey, FeatureSource};
use crate::grouping::{group_features, Group};
use crate::math::moments::estimate_moments;
use crate::result::{EllipseFeature, ResultAssembler, RunStatus, SdeResult};

/// Caller-supplied cancellation check. Returns `true` to stop.
pub type CancelCheck<'a> = Box<dyn Fn() -> bool + Send + Sync + 'a>;

/// Receiver of progress notifications.
///
/// Lifecycle of a run:
///   1. [`started`](Self::started) once.
///   2. [`set_task`](Self::set_task) / [`progress`](Self::progress) as the
///      run advances, percentages rising from 10 to 100.
///   3. Exactly one of [`complete`](Self::complete),
///      [`cancelled`](Self::cancelled) or
///      [`exception_occurred`](Self::exception_occurred).
///   4. [`dispose`](Self::dispose) always, last.
///
/// All methods default to no-ops.
pub trait ProgressSink {
    fn started(&mut self) {}
    fn set_task(&mut self, _task: &str) {}
    fn progress(&mut self, _percent: f32) {}
    fn complete(&mut self) {}
    fn cancelled(&mut self) {}
    fn exception_occurred(&mut self, _error: &SdeError) {}
    fn dispose(&mut self) {}
}

impl ProgressSink for () {}

/// Inputs of one ellipse run, captured at construction.
pub struct Invocation<'a, S: FeatureSource + ?Sized> {
    source: &'a S,
    config: SdeConfig,
    cancel: Option<CancelCheck<'a>>,
    progress: Option<&'a mut (dyn ProgressSink + Send)>,
}

impl<'a, S: FeatureSource + ?Sized> Invocation<'a, S> {
    /// Capture a source and configuration.
    pub fn new(source: &'a S, config: SdeConfig) -> Self {
        Self {
            source,
            config,
            cancel: None,
            progress: None,
        }
    }

    /// Capture a possibly absent source.
    ///
    /// # Errors
    ///
    /// Returns [`SdeError::MissingInput`] when `source` is `None`.
    pub fn from_optional(source: Option<&'a S>, config: SdeConfig) -> Result<Self> {
        source
            .map(|s| Self::new(s, config))
            .ok_or(SdeError::MissingInput)
    }

    /// Attach a cancellation check, polled between groups.
    #[must_use]
    pub fn with_cancel(mut self, cancel: impl Fn() -> bool + Send + Sync + 'a) -> Self {
        self.cancel = Some(Box::new(cancel));
        self
    }

    /// Attach a progress sink.
    #[must_use]
    pub fn with_progress(mut self, sink: &'a mut (dyn ProgressSink + Send)) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Configuration of this run.
    #[must_use]
    pub const fn config(&self) -> &SdeConfig {
        &self.config
    }

    /// Execute the pipeline.
    ///
    /// Cancellation is not an error: the result carries
    /// [`RunStatus::Cancelled`] and the ellipses finished so far.
    ///
    /// # Errors
    ///
    /// - [`SdeError::InvalidConfig`] if the configuration does not validate.
    /// - [`SdeError::MissingInput`] if the source is empty.
    /// - [`SdeError::InvalidField`] if a configured field is not in the schema.
    /// - [`SdeError::InsufficientData`] or [`SdeError::NumericalInstability`]
    ///   of the first failed group, if no group yields an ellipse.
    pub fn run(self) -> Result<SdeResult> {
        let Self {
            source,
            config,
            cancel,
            progress,
        } = self;

        let mut noop = ();
        let progress: &mut dyn ProgressSink = match progress {
            Some(sink) => sink,
            None => &mut noop,
        };
        let is_cancelled = || cancel.as_ref().is_some_and(|f| f());

        progress.started();
        progress.set_task("Grabbing arguments");
        progress.progress(10.0);

        let outcome = run_pipeline(source, &config, &is_cancelled, progress);

        match &outcome {
            Ok(result) if result.is_cancelled() => progress.cancelled(),
            Ok(_) => progress.complete(),
            Err(e) => progress.exception_occurred(e),
        }
        progress.dispose();

        outcome
    }
}

impl<S: FeatureSource + ?Sized> std::fmt::Debug for Invocation<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("features", &self.source.len())
            .field("config", &self.config)
            .field("cancel", &self.cancel.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Single-use handle around an [`Invocation`].
///
/// The first call to [`execute`](Self::execute) takes the invocation out;
/// any later or concurrent call fails with [`SdeError::AlreadyExecuted`].
#[derive(Debug)]
pub struct SdeProcess<'a, S: FeatureSource + ?Sized> {
    invocation: Mutex<Option<Invocation<'a, S>>>,
}

impl<'a, S: FeatureSource + ?Sized> SdeProcess<'a, S> {
    #[must_use]
    pub fn new(invocation: Invocation<'a, S>) -> Self {
        Self {
            invocation: Mutex::new(Some(invocation)),
        }
    }

    /// Run the wrapped invocation.
    ///
    /// # Errors
    ///
    /// [`SdeError::AlreadyExecuted`] if this process was already executed,
    /// otherwise any error of [`Invocation::run`].
    pub fn execute(&self) -> Result<SdeResult> {
        let invocation = self
            .invocation
            .lock()
            .take()
            .ok_or(SdeError::AlreadyExecuted)?;
        invocation.run()
    }

    /// Whether [`execute`](Self::execute) has been called.
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.invocation.lock().is_none()
    }
}

/// Compute ellipses for `source` with `config`.
///
/// # Errors
///
/// See [`Invocation::run`].
pub fn compute_standard_deviational_ellipse<S>(source: &S, config: &SdeConfig) -> Result<SdeResult>
where
    S: FeatureSource + ?Sized,
{
    Invocation::new(source, config.clone()).run()
}

/// Compute ellipses from loosely typed parameters.
///
/// `ellipse_size` selects the multiplier by substring (see
/// [`EllipseSize::from_token`](crate::EllipseSize::from_token)); empty field
/// names count as absent.
///
/// # Errors
///
/// See [`Invocation::run`].
pub fn standard_deviational_ellipse<S>(
    source: &S,
    ellipse_size: &str,
    weight_field: Option<&str>,
    case_field: Option<&str>,
) -> Result<SdeResult>
where
    S: FeatureSource + ?Sized,
{
    let mut config = SdeConfig::from_size_token(ellipse_size);
    config.weight_field = weight_field.filter(|f| !f.is_empty()).map(str::to_string);
    config.case_field = case_field.filter(|f| !f.is_empty()).map(str::to_string);
    compute_standard_deviational_ellipse(source, &config)
}

/// Moments, ellipse and ring of a single group.
///
/// # Errors
///
/// Propagates [`estimate_moments`] failures.
pub fn estimate_group(group: &Group, config: &SdeConfig) -> Result<EllipseFeature> {
    let moments = estimate_moments(group)?;
    let params = build_ellipse(&moments, config);
    debug!(
        case = %group.key,
        points = moments.count,
        semi_major = params.semi_major,
        semi_minor = params.semi_minor,
        theta = params.theta,
        "estimated ellipse"
    );
    Ok(EllipseFeature::new(group.key.clone(), &moments, params, config.segments))
}

fn run_pipeline<S>(
    source: &S,
    config: &SdeConfig,
    is_cancelled: &(dyn Fn() -> bool + Sync),
    progress: &mut dyn ProgressSink,
) -> Result<SdeResult>
where
    S: FeatureSource + ?Sized,
{
    config.validate()?;
    let grouping = group_features(source, config)?;

    progress.set_task("Processing ...");
    progress.progress(25.0);

    let groups = grouping.groups;
    let mut assembler = ResultAssembler::new(config.output_type_name.clone(), grouping.warnings);

    if groups.is_empty() {
        return Err(SdeError::insufficient_data(CaseKey::Null, 0, 0.0));
    }

    let total = groups.len();
    let mut done = 0_usize;
    let outcomes = estimate_groups(&groups, config, is_cancelled, &mut || {
        done += 1;
        progress.progress(25.0 + 65.0 * done as f32 / total as f32);
    });

    let mut status = RunStatus::Completed;
    let mut first_failure = None;

    for (group, outcome) in groups.iter().zip(outcomes) {
        match outcome {
            None => status = RunStatus::Cancelled,
            Some(Ok(feature)) => assembler.push(feature),
            Some(Err(e)) => {
                let Some(warning) = skipped_group(&group.key, &e) else {
                    return Err(e);
                };
                assembler.warn(warning);
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
    }

    if status == RunStatus::Cancelled {
        info!(emitted = !assembler.is_empty(), "ellipse run cancelled");
    } else if assembler.is_empty() {
        if let Some(e) = first_failure {
            return Err(e);
        }
    }

    progress.set_task("Encoding result");
    progress.progress(90.0);

    let result = assembler.finish(status);
    info!(
        groups = total,
        ellipses = result.len(),
        warnings = result.warnings.len(),
        "ellipse run finished"
    );
    Ok(result)
}

/// Warning for a group whose failure does not abort the run, `None` when the
/// error is fatal.
fn skipped_group(key: &CaseKey, error: &SdeError) -> Option<SdeWarning> {
    match error {
        SdeError::InsufficientData {
            case,
            points,
            total_weight,
        } => {
            warn!(case = %case, points, total_weight, "insufficient data; group skipped");
            Some(SdeWarning::InsufficientData {
                case: case.clone(),
                points: *points,
                total_weight: *total_weight,
            })
        }
        SdeError::NumericalInstability { context } => {
            warn!(case = %key, context = %context, "numerical instability; group skipped");
            Some(SdeWarning::NumericalInstability {
                case: key.clone(),
                context: context.clone(),
            })
        }
        _ => None,
    }
}

type GroupOutcome = Option<Result<EllipseFeature>>;

/// Estimate every group, `None` for groups skipped after cancellation.
///
/// `on_done` is called on the calling thread once per estimated group, as
/// soon as that group finishes.
fn estimate_groups(
    groups: &[Group],
    config: &SdeConfig,
    is_cancelled: &(dyn Fn() -> bool + Sync),
    on_done: &mut dyn FnMut(),
) -> Vec<GroupOutcome> {
    if config.parallel && groups.len() > 1 {
        estimate_parallel(groups, config, is_cancelled, on_done)
    } else {
        estimate_sequential(groups, config, is_cancelled, on_done)
    }
}

/// Groups run on the rayon pool; completions are forwarded over a channel so
/// `on_done` never leaves the calling thread.
#[cfg(feature = "parallel")]
fn estimate_parallel(
    groups: &[Group],
    config: &SdeConfig,
    is_cancelled: &(dyn Fn() -> bool + Sync),
    on_done: &mut dyn FnMut(),
) -> Vec<GroupOutcome> {
    let (tx, rx) = std::sync::mpsc::channel();

    std::thread::scope(|s| {
        let worker = s.spawn(move || {
            groups
                .par_iter()
                .map_with(tx, |tx, g| {
                    let outcome = (!is_cancelled()).then(|| estimate_group(g, config));
                    if outcome.is_some() {
                        // receiver lives until every sender is dropped
                        let _ = tx.send(());
                    }
                    outcome
                })
                .collect::<Vec<_>>()
        });

        for () in rx {
            on_done();
        }
        worker
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}

#[cfg(not(feature = "parallel"))]
fn estimate_parallel(
    groups: &[Group],
    config: &SdeConfig,
    is_cancelled: &(dyn Fn() -> bool + Sync),
    on_done: &mut dyn FnMut(),
) -> Vec<GroupOutcome> {
    estimate_sequential(groups, config, is_cancelled, on_done)
}

/// Once cancelled, every later group is skipped.
fn estimate_sequential(
    groups: &[Group],
    config: &SdeConfig,
    is_cancelled: &(dyn Fn() -> bool + Sync),
    on_done: &mut dyn FnMut(),
) -> Vec<GroupOutcome> {
    let mut outcomes = Vec::with_capacity(groups.len());
    let mut cancelled = false;
    for g in groups {
        cancelled = cancelled || is_cancelled();
        if cancelled {
            outcomes.push(None);
            continue;
        }
        outcomes.push(Some(estimate_group(g, config)));
        on_done();
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Feature, FeatureCollection};
    use crate::geometry::{Geometry, Point};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        percents: Vec<f32>,
    }

    impl ProgressSink for Recorder {
        fn started(&mut self) {
            self.events.push("started".into());
        }
        fn set_task(&mut self, task: &str) {
            self.events.push(format!("task:{task}"));
        }
        fn progress(&mut self, percent: f32) {
            self.percents.push(percent);
        }
        fn complete(&mut self) {
            self.events.push("complete".into());
        }
        fn cancelled(&mut self) {
            self.events.push("cancelled".into());
        }
        fn exception_occurred(&mut self, _error: &SdeError) {
            self.events.push("exception".into());
        }
        fn dispose(&mut self) {
            self.events.push("dispose".into());
        }
    }

    /// Records progress calls into a log shared with the cancel check.
    struct Interleaved<'a>(&'a Mutex<Vec<&'static str>>);

    impl ProgressSink for Interleaved<'_> {
        fn progress(&mut self, _percent: f32) {
            self.0.lock().push("progress");
        }
    }

    fn zoned_by(zones: &[&str]) -> FeatureCollection {
        let mut fc = FeatureCollection::new(["zone"]);
        for (i, zone) in zones.iter().enumerate() {
            let x0 = 100.0 * i as f64;
            for (dx, dy) in [(0.0, 0.0), (2.0, 0.0), (0.0, 1.0), (2.0, 1.0)] {
                fc.push(
                    Feature::new(Geometry::Point(Point::new(x0 + dx, dy)))
                        .with_attribute("zone", *zone),
                );
            }
        }
        fc
    }

    fn zoned() -> FeatureCollection {
        zoned_by(&["A", "B", "C"])
    }

    #[test]
    fn test_progress_lifecycle() {
        let fc = zoned();
        let mut recorder = Recorder::default();
        let result = Invocation::new(&fc, SdeConfig::default().with_case_field("zone"))
            .with_progress(&mut recorder)
            .run()
            .unwrap();
        assert_eq!(result.len(), 3);

        assert_eq!(
            recorder.events,
            [
                "started",
                "task:Grabbing arguments",
                "task:Processing ...",
                "task:Encoding result",
                "complete",
                "dispose",
            ]
        );
        assert_eq!(recorder.percents.first(), Some(&10.0));
        assert_eq!(recorder.percents.last(), Some(&90.0));
        assert!(recorder.percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_progress_reported_as_groups_finish() {
        let fc = zoned();
        let log = Mutex::new(Vec::new());
        let mut sink = Interleaved(&log);
        let config = SdeConfig::default()
            .with_case_field("zone")
            .with_parallel(false);

        Invocation::new(&fc, config)
            .with_cancel(|| {
                log.lock().push("poll");
                false
            })
            .with_progress(&mut sink)
            .run()
            .unwrap();

        // 10 and 25 up front, one step per group, 90 for encoding
        assert_eq!(
            *log.lock(),
            [
                "progress", "progress", "poll", "progress", "poll", "progress", "poll",
                "progress", "progress",
            ]
        );
    }

    #[test]
    fn test_parallel_progress_counts_each_group() {
        let fc = zoned_by(&["A", "B", "C", "D", "E"]);
        let mut recorder = Recorder::default();
        let result = Invocation::new(&fc, SdeConfig::default().with_case_field("zone"))
            .with_progress(&mut recorder)
            .run()
            .unwrap();
        assert_eq!(result.len(), 5);

        assert_eq!(recorder.percents.len(), 2 + 5 + 1);
        assert_eq!(recorder.percents[6], 90.0);
        assert!(recorder.percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_progress_on_failure() {
        let fc = FeatureCollection::new(["zone"]);
        let mut recorder = Recorder::default();
        let err = Invocation::new(&fc, SdeConfig::default())
            .with_progress(&mut recorder)
            .run()
            .unwrap_err();
        assert_eq!(err, SdeError::MissingInput);
        assert_eq!(recorder.events.last().map(String::as_str), Some("dispose"));
        assert!(recorder.events.iter().any(|e| e == "exception"));
    }

    #[test]
    fn test_cancel_before_first_group() {
        let fc = zoned();
        let mut recorder = Recorder::default();
        let result = Invocation::new(&fc, SdeConfig::default().with_case_field("zone"))
            .with_cancel(|| true)
            .with_progress(&mut recorder)
            .run()
            .unwrap();
        assert!(result.is_cancelled());
        assert!(result.is_empty());
        assert!(recorder.events.iter().any(|e| e == "cancelled"));
    }

    #[test]
    fn test_cancel_between_groups_returns_partial() {
        let fc = zoned();
        let polls = AtomicUsize::new(0);
        let config = SdeConfig::default()
            .with_case_field("zone")
            .with_parallel(false);
        let result = Invocation::new(&fc, config)
            .with_cancel(|| polls.fetch_add(1, Ordering::SeqCst) >= 1)
            .run()
            .unwrap();

        assert!(result.is_cancelled());
        assert_eq!(result.len(), 1);
        assert_eq!(result.features[0].case_key, CaseKey::from("A"));
    }

    #[test]
    fn test_parallel_cancel_keeps_group_order() {
        let zones = ["A", "B", "C", "D", "E", "F"];
        let fc = zoned_by(&zones);
        let polls = AtomicUsize::new(0);
        let config = SdeConfig::default()
            .with_case_field("zone")
            .with_parallel(true);

        let result = Invocation::new(&fc, config)
            .with_cancel(|| polls.fetch_add(1, Ordering::SeqCst) >= 2)
            .run()
            .unwrap();

        // Exactly two polls pass, so exactly two groups are estimated.
        assert!(result.is_cancelled());
        assert_eq!(result.len(), 2);
        let positions: Vec<usize> = result
            .features
            .iter()
            .map(|f| {
                zones
                    .iter()
                    .position(|z| CaseKey::from(*z) == f.case_key)
                    .unwrap()
            })
            .collect();
        assert!(positions[0] < positions[1]);
    }

    #[test]
    fn test_overflowing_group_skipped() {
        let mut fc = zoned();
        for x in [f64::MAX, -f64::MAX] {
            fc.push(Feature::new(Geometry::Point(Point::new(x, 0.0))).with_attribute("zone", "HUGE"));
        }
        let result =
            compute_standard_deviational_ellipse(&fc, &SdeConfig::default().with_case_field("zone"))
                .unwrap();

        assert_eq!(result.len(), 3);
        assert!(result.feature(&CaseKey::from("HUGE")).is_none());
        assert!(matches!(
            result.warnings.as_slice(),
            [SdeWarning::NumericalInstability { case, .. }] if *case == CaseKey::from("HUGE")
        ));
    }

    #[test]
    fn test_only_overflowing_group_fails() {
        let fc = FeatureCollection::from_points([[f64::MAX, 0.0], [-f64::MAX, 0.0]]);
        let err = compute_standard_deviational_ellipse(&fc, &SdeConfig::default()).unwrap_err();
        assert!(matches!(err, SdeError::NumericalInstability { .. }));
    }

    #[test]
    fn test_process_runs_once() {
        let fc = zoned();
        let process = SdeProcess::new(Invocation::new(&fc, SdeConfig::default()));
        assert!(!process.is_spent());
        assert!(process.execute().is_ok());
        assert!(process.is_spent());
        assert_eq!(process.execute().unwrap_err(), SdeError::AlreadyExecuted);
    }

    #[test]
    fn test_process_concurrent_execute() {
        let fc = zoned();
        let process = SdeProcess::new(Invocation::new(&fc, SdeConfig::default()));
        let outcomes: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| process.execute())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, Err(SdeError::AlreadyExecuted)))
                .count(),
            3
        );
    }

    #[test]
    fn test_from_optional() {
        let missing: Option<&FeatureCollection> = None;
        assert_eq!(
            Invocation::from_optional(missing, SdeConfig::default()).unwrap_err(),
            SdeError::MissingInput
        );
        let fc = zoned();
        let inv = Invocation::from_optional(Some(&fc), SdeConfig::two_standard_deviations()).unwrap();
        assert_eq!(inv.config().deviations(), 2.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let fc = zoned();
        let err = compute_standard_deviational_ellipse(&fc, &SdeConfig::default().with_segments(2))
            .unwrap_err();
        assert!(matches!(err, SdeError::InvalidConfig(_)));
    }

    #[test]
    fn test_all_geometry_unreadable() {
        let fc = FeatureCollection::new(Vec::<String>::new())
            .with_feature(Feature::without_geometry())
            .with_feature(Feature::without_geometry());
        let err = compute_standard_deviational_ellipse(&fc, &SdeConfig::default()).unwrap_err();
        assert!(matches!(err, SdeError::InsufficientData { points: 0, .. }));
    }

    #[test]
    fn test_loose_parameters() {
        let fc = zoned();
        let result = standard_deviational_ellipse(&fc, "2_STANDARD_DEVIATIONS", Some(""), Some("zone")).unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.features.iter().all(|f| f.params.deviations == 2.0));
    }
}
