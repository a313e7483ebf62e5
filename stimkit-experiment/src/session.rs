use std::collections::{HashSet, VecDeque};
use std::sync::PoisonError;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stimkit_core::{
    Color, Diagnostic, ErrorSink, InputEvent, LayerTransform, Question, QuestionKind, Questionnaire,
    ReactionTestStats, RenderContext, SessionPhase, TracingSink, TrialRecord, TrialState,
};
use stimkit_render::Graphics;
use stimkit_resources::{PreloadProgress, ResourceId, ResourceManager, ResourceStats};
use stimkit_stimulus::{Frame, Stimulus, StimulusError, StimulusFactory};
use stimkit_timing::{CalibrationStats, FrameCalibration, Timer};

use crate::fixation::FIXATION_RESOURCE;
use crate::{
    CalibrationSummary, FixationMarker, SessionConfig, SessionError, SessionResults, Trial, TrialBlock, TrialEvent,
};

/// One question of the loaded page: its stimuli and remaining trials.
#[derive(Debug)]
struct QuestionRun {
    question: Question,
    prompt: Option<Stimulus>,
    main: Option<Stimulus>,
    /// Why no trial of this question can be presented.
    unavailable: Option<String>,
    background: Option<Color>,
    block: TrialBlock,
    trial: Option<Trial>,
}

impl QuestionRun {
    fn new(question: Question, prompt: Option<Stimulus>, main: Option<Stimulus>) -> Self {
        let background = question.display.background.as_ref().and_then(|value| {
            value
                .resolve()
                .inspect_err(|err| tracing::warn!(question = %question.id, %err, "invalid background color"))
                .ok()
        });
        Self {
            block: TrialBlock::for_question(&question),
            question,
            prompt,
            main,
            unavailable: None,
            background,
            trial: None,
        }
    }

    fn unavailable(question: Question, reason: String) -> Self {
        let mut run = Self::new(question, None, None);
        run.unavailable = Some(reason);
        run
    }

    fn stimuli_mut(&mut self) -> impl Iterator<Item = &mut Stimulus> {
        self.prompt.iter_mut().chain(self.main.iter_mut())
    }

    /// A prompt that cannot be prepared is dropped unless the failure is
    /// fatal; the main stimulus decides the trial.
    fn prepare(&mut self, frame: &mut Frame<'_>, resources: &ResourceManager) -> Result<(), StimulusError> {
        if let Some(prompt) = self.prompt.as_mut() {
            if let Err(err) = prompt.prepare(frame, resources) {
                if err.is_fatal() {
                    return Err(err);
                }
                tracing::warn!(question = %self.question.id, %err, "prompt dropped");
                prompt.cleanup(frame);
                self.prompt = None;
            }
        }
        if let Some(main) = self.main.as_mut() {
            main.prepare(frame, resources)?;
        }
        Ok(())
    }

    fn release(&mut self, frame: &mut Frame<'_>) {
        for stimulus in self.stimuli_mut() {
            stimulus.cleanup(frame);
        }
    }

    /// Draws prompt then main stimulus; reports whether the target (the main
    /// stimulus, else the prompt, else nothing at all) was on screen.
    fn draw(&mut self, frame: &mut Frame<'_>, ctx: &RenderContext) -> Result<bool, StimulusError> {
        let mut prompt_visible = false;
        if let Some(prompt) = self.prompt.as_mut() {
            prompt_visible = prompt.render(frame, ctx, &LayerTransform::IDENTITY)?;
        }
        match self.main.as_mut() {
            Some(main) => main.render(frame, ctx, &LayerTransform::IDENTITY),
            None if self.prompt.is_some() => Ok(prompt_visible),
            None => Ok(true),
        }
    }
}

/// Drives a questionnaire page by page: calibration, page loading, and the
/// per-frame trial schedule.
///
/// The host calls [`frame`](Self::frame) once per display refresh,
/// [`handle_input`](Self::handle_input) for every participant input stamped
/// with the same timer, and [`load_page`](Self::load_page) whenever the
/// session reports [`SessionPhase::Loading`].
pub struct Session<T: Timer, R: Rng = StdRng> {
    questionnaire: Questionnaire,
    config: SessionConfig,
    factory: StimulusFactory,
    resources: ResourceManager,
    timer: T,
    rng: R,
    sink: Box<dyn ErrorSink + Send>,
    phase: SessionPhase,
    calibration: FrameCalibration,
    calibration_stats: Option<CalibrationStats>,
    background: Color,
    fixation: FixationMarker,
    page: usize,
    queue: VecDeque<QuestionRun>,
    current: Option<QuestionRun>,
    records: Vec<TrialRecord>,
    /// Reaction-time questions; only their trials enter [`Session::stats`].
    scored: HashSet<String>,
    reported: HashSet<ResourceId>,
    abort_reason: Option<String>,
}

impl<T: Timer> Session<T, StdRng> {
    /// Seeds the fixation jitter from `config.seed`, or from the OS.
    pub fn new(
        questionnaire: Questionnaire,
        config: SessionConfig,
        resources: ResourceManager,
        timer: T,
    ) -> Result<Self, SessionError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(questionnaire, config, resources, timer, rng)
    }
}

impl<T: Timer, R: Rng> Session<T, R> {
    pub fn with_rng(
        questionnaire: Questionnaire,
        config: SessionConfig,
        mut resources: ResourceManager,
        timer: T,
        rng: R,
    ) -> Result<Self, SessionError> {
        questionnaire.validate()?;

        let text_color = SessionConfig::color(&config.text_color, Color::WHITE, "textColor");
        let mut factory = StimulusFactory::new()
            .with_font_size(config.font_size)
            .with_color(text_color);
        if let Some(font) = &config.default_font {
            factory = factory.with_default_font(font.clone());
        }

        let fixation = FixationMarker::install(
            &mut resources,
            config.fixation_size,
            config.fixation_thickness,
            SessionConfig::color(&config.fixation_color, Color::WHITE, "fixationColor"),
        )?;
        let background = SessionConfig::color(&config.background, Color::BLACK, "background");
        let scored = questionnaire
            .pages
            .iter()
            .flat_map(|page| &page.questions)
            .filter(|question| question.kind == QuestionKind::ReactionTime)
            .map(|question| question.id.clone())
            .collect();
        let phase = if config.calibration_frames == 0 {
            SessionPhase::Loading
        } else {
            SessionPhase::Calibration
        };

        Ok(Self {
            calibration: FrameCalibration::new(config.calibration_frames.max(1)),
            questionnaire,
            config,
            factory,
            resources,
            timer,
            rng,
            sink: Box::new(TracingSink),
            phase,
            calibration_stats: None,
            background,
            fixation,
            page: 0,
            queue: VecDeque::new(),
            current: None,
            records: Vec::new(),
            scored,
            reported: HashSet::new(),
            abort_reason: None,
        })
    }

    /// Replaces the default sink, which logs through `tracing`.
    pub fn with_sink(mut self, sink: impl ErrorSink + Send + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// For registering custom stimulus types before the first page loads.
    pub fn factory_mut(&mut self) -> &mut StimulusFactory {
        &mut self.factory
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn page_index(&self) -> usize {
        self.page
    }

    pub fn calibration(&self) -> Option<&CalibrationStats> {
        self.calibration_stats.as_ref()
    }

    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current.as_ref().map(|run| &run.question)
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.current.as_ref().and_then(|run| run.trial.as_ref())
    }

    /// Finalized trials in completion order.
    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    /// Aggregate over reaction-time questions. Instruction and plain
    /// stimulus pages stay in the log but are not scored.
    pub fn stats(&self) -> ReactionTestStats {
        self.stats_where(|record| self.scored.contains(&record.question_id))
    }

    /// Aggregate over one question's trials, whatever its kind.
    pub fn question_stats(&self, question_id: &str) -> ReactionTestStats {
        self.stats_where(|record| record.question_id == question_id)
    }

    fn stats_where(&self, keep: impl Fn(&TrialRecord) -> bool) -> ReactionTestStats {
        let records: Vec<TrialRecord> = self.records.iter().filter(|r| keep(r)).cloned().collect();
        ReactionTestStats::compute(&records, self.config.include_practice_in_stats)
    }

    pub fn results(&self) -> SessionResults {
        SessionResults {
            questionnaire_id: self.questionnaire.id.clone(),
            trials: self.records.clone(),
            stats: self.stats(),
            calibration: self.calibration_stats.as_ref().map(CalibrationSummary::from),
            aborted: self.abort_reason.clone(),
        }
    }

    /// Builds the current page's stimuli and loads everything they need.
    ///
    /// Stimuli whose resources failed are swapped for their text fallback
    /// when one is configured; otherwise their trials are recorded as missed
    /// with the load error. Past the last page the session completes.
    pub async fn load_page(
        &mut self,
        on_progress: impl FnMut(&PreloadProgress),
    ) -> Result<ResourceStats, SessionError> {
        if self.phase != SessionPhase::Loading {
            return Err(SessionError::NotReady {
                operation: "load a page",
                phase: self.phase,
            });
        }
        let Some(page) = self.questionnaire.pages.get(self.page).cloned() else {
            self.complete();
            return Ok(self.resources.stats());
        };

        let mut runs = Vec::with_capacity(page.questions.len());
        for question in page.questions {
            match self.factory.create_questionnaire_stimuli(&question) {
                Ok(stimuli) => {
                    let mut prompt = stimuli.prompt;
                    let mut main = stimuli.main;
                    for stimulus in prompt.iter_mut().chain(main.iter_mut()) {
                        stimulus.preload(&mut self.resources);
                    }
                    runs.push(QuestionRun::new(question, prompt, main));
                }
                Err(err) => {
                    tracing::warn!(question = %question.id, %err, "question stimuli could not be built");
                    runs.push(QuestionRun::unavailable(question, err.to_string()));
                }
            }
        }

        let stats = self.resources.preload_all(on_progress).await;
        self.report_load_errors();

        let mut needs_reload = false;
        for run in &mut runs {
            if let Some((locator, reason)) = run.prompt.as_ref().and_then(|p| p.failed_resource(&self.resources)) {
                tracing::warn!(question = %run.question.id, %locator, %reason, "prompt dropped");
                run.prompt = None;
            }
            let Some((locator, reason)) = run.main.as_ref().and_then(|m| m.failed_resource(&self.resources)) else {
                continue;
            };
            let fallback = match (&run.question.stimulus, &run.main) {
                (Some(config), Some(main)) if self.config.text_fallback => self.factory.create_fallback(config, &main.id),
                _ => None,
            };
            match fallback {
                Some(mut fallback) => {
                    tracing::info!(question = %run.question.id, %locator, "using text fallback");
                    fallback.preload(&mut self.resources);
                    run.main = Some(fallback);
                    needs_reload = true;
                }
                None => {
                    run.main = None;
                    run.unavailable = Some(format!("resource `{locator}` failed to load: {reason}"));
                }
            }
        }
        if needs_reload {
            self.resources.preload_all(|_| {}).await;
            self.report_load_errors();
        }

        tracing::info!(
            page = %page.id,
            questions = runs.len(),
            loaded = stats.loaded,
            errors = stats.errors,
            "page loaded"
        );
        self.queue = runs.into();
        self.phase = SessionPhase::Running;
        Ok(stats)
    }

    /// Stamps the frame with the session timer.
    pub fn frame(&mut self, gpu: &mut dyn Graphics) -> Result<(), SessionError> {
        let now_ns = self.timer.now();
        self.frame_at(gpu, now_ns)
    }

    /// Renders one display refresh stamped `now_ns`.
    ///
    /// Returns [`SessionError::Aborted`] on the frame a fatal rendering
    /// error stops the session; later frames only clear the screen.
    pub fn frame_at(&mut self, gpu: &mut dyn Graphics, now_ns: u64) -> Result<(), SessionError> {
        let background = self
            .current
            .as_ref()
            .and_then(|run| run.background)
            .unwrap_or(self.background);
        gpu.clear(background);

        match self.phase {
            SessionPhase::Calibration => {
                self.calibration.record_frame_at(now_ns);
                if self.calibration.sample_count() >= self.config.calibration_frames {
                    self.finish_calibration();
                }
                Ok(())
            }
            SessionPhase::Running => self.run_frame(gpu, now_ns),
            SessionPhase::Loading | SessionPhase::Complete | SessionPhase::Aborted => Ok(()),
        }
    }

    /// Offers an input to the current trial. Returns whether it finalized
    /// the trial.
    pub fn handle_input(&mut self, event: InputEvent) -> bool {
        if !self.phase.allows_input() {
            return false;
        }
        let Some(run) = self.current.as_mut() else {
            return false;
        };
        let Some(trial) = run.trial.as_mut() else {
            return false;
        };
        match trial.respond(&event, &run.question.response) {
            Some(TrialEvent::Finalized(record)) => {
                self.accept(record);
                true
            }
            _ => false,
        }
    }

    /// Releases every GPU object and closes the audio output.
    pub fn dispose(&mut self, gpu: &mut dyn Graphics) {
        {
            let audio = self.resources.audio_output();
            let mut audio = audio.lock().unwrap_or_else(PoisonError::into_inner);
            let mut frame = Frame::new(gpu, &mut *audio);
            for run in self.current.iter_mut().chain(self.queue.iter_mut()) {
                run.release(&mut frame);
            }
            self.fixation.release(frame.gpu);
        }
        self.resources.dispose(gpu);
    }

    fn finish_calibration(&mut self) {
        let stats = self.calibration.stats();
        tracing::info!(
            frame_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            refresh_hz = stats.effective_fps,
            samples = stats.samples,
            "frame timing calibrated"
        );
        self.calibration_stats = Some(stats);
        self.phase = SessionPhase::Loading;
    }

    fn run_frame(&mut self, gpu: &mut dyn Graphics, now_ns: u64) -> Result<(), SessionError> {
        let audio = self.resources.audio_output();
        let mut audio = audio.lock().unwrap_or_else(PoisonError::into_inner);
        let mut frame = Frame::new(gpu, &mut *audio);
        let mut finalized = Vec::new();

        let outcome = loop {
            if self.current.is_none() {
                let Some(run) = self.queue.pop_front() else {
                    break Ok(true);
                };
                tracing::debug!(question = %run.question.id, trials = run.block.len(), "question started");
                self.current = Some(run);
            }
            let Some(run) = self.current.as_mut() else {
                break Ok(true);
            };
            match step(
                run,
                &mut frame,
                &mut self.resources,
                &mut self.fixation,
                &mut self.rng,
                now_ns,
                &mut finalized,
            ) {
                Ok(true) => {
                    tracing::debug!(question = %run.question.id, "question finished");
                    self.current = None;
                }
                Ok(false) => break Ok(false),
                Err(err) => break Err(err),
            }
        };

        for record in finalized {
            self.accept(record);
        }
        match outcome {
            Ok(true) => {
                self.next_page();
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(err) => Err(self.abort(&mut frame, err)),
        }
    }

    fn accept(&mut self, record: TrialRecord) {
        match &record.error {
            Some(reason) => {
                tracing::warn!(question = %record.question_id, trial = record.trial_index, %reason, "trial invalid");
                self.sink.report(Diagnostic::TrialInvalid {
                    question_id: record.question_id.clone(),
                    trial_index: record.trial_index,
                    reason: reason.clone(),
                });
            }
            None => tracing::info!(
                question = %record.question_id,
                trial = record.trial_index,
                practice = record.practice,
                missed = record.missed,
                rt_ms = record.reaction_time_ms,
                "trial finalized"
            ),
        }
        self.records.push(record);
    }

    fn report_load_errors(&mut self) {
        for (id, reason) in self.resources.errors() {
            if self.reported.insert(id.clone()) {
                self.sink.report(Diagnostic::ResourceLoad {
                    id: id.to_string(),
                    reason,
                });
            }
        }
    }

    fn next_page(&mut self) {
        self.page += 1;
        if self.page < self.questionnaire.pages.len() {
            tracing::info!(page = self.page, "advancing to next page");
            self.phase = SessionPhase::Loading;
        } else {
            self.complete();
        }
    }

    fn complete(&mut self) {
        let stats = self.stats();
        tracing::info!(
            trials = self.records.len(),
            valid = stats.valid_trials,
            missed = stats.missed_trials,
            mean_rt_ms = stats.mean_reaction_time,
            "session complete"
        );
        self.phase = SessionPhase::Complete;
    }

    fn abort(&mut self, frame: &mut Frame<'_>, err: StimulusError) -> SessionError {
        let reason = err.to_string();
        if let StimulusError::Graphics { id, source } = &err {
            self.sink.report(Diagnostic::Shader {
                stimulus: id.clone(),
                reason: source.to_string(),
            });
        }
        self.sink.report(Diagnostic::SessionAborted { reason: reason.clone() });
        tracing::error!(%reason, "session aborted");

        for run in self.current.iter_mut().chain(self.queue.iter_mut()) {
            run.release(frame);
        }
        self.current = None;
        self.queue.clear();
        self.phase = SessionPhase::Aborted;
        self.abort_reason = Some(reason.clone());
        SessionError::Aborted(reason)
    }
}

/// Advances one question by one frame. Returns `Ok(true)` once its last
/// trial has completed. Records finalized along the way go to `finalized`,
/// including the trial that hit a fatal error.
fn step(
    run: &mut QuestionRun,
    frame: &mut Frame<'_>,
    resources: &mut ResourceManager,
    fixation: &mut FixationMarker,
    rng: &mut impl Rng,
    now_ns: u64,
    finalized: &mut Vec<TrialRecord>,
) -> Result<bool, StimulusError> {
    let mut push = |event: Option<TrialEvent>| {
        if let Some(TrialEvent::Finalized(record)) = event {
            finalized.push(record);
        }
    };

    loop {
        if run.trial.is_none() {
            let Some(mut trial) = run.block.next_trial(&run.question, rng) else {
                run.release(frame);
                return Ok(true);
            };
            trial.begin(now_ns);
            if let Some(reason) = &run.unavailable {
                push(trial.fail(now_ns, reason.clone()));
                continue;
            }
            if let Err(err) = run.prepare(frame, resources) {
                run.release(frame);
                push(trial.fail(now_ns, err.to_string()));
                if err.is_fatal() {
                    return Err(err);
                }
                continue;
            }
            run.trial = Some(trial);
        }

        let Some(trial) = run.trial.as_mut() else {
            continue;
        };
        match trial.advance(now_ns) {
            Some(TrialEvent::Completed) => {
                run.trial = None;
                continue;
            }
            Some(TrialEvent::IntervalStarted) => run.release(frame),
            event => push(event),
        }
        break;
    }

    let Some(trial) = run.trial.as_mut() else {
        return Ok(false);
    };
    match trial.state() {
        TrialState::Fixation => {
            if let Err(source) = fixation.draw(frame.gpu, resources) {
                let err = StimulusError::Graphics {
                    id: FIXATION_RESOURCE.to_string(),
                    source,
                };
                if err.is_fatal() {
                    push(trial.fail(now_ns, err.to_string()));
                    return Err(err);
                }
                tracing::warn!(%err, "fixation marker not drawn");
            }
        }
        TrialState::StimulusOnset | TrialState::AwaitingResponse => {
            let (width, height) = frame.gpu.viewport();
            let ctx = RenderContext::new(trial.stimulus_time_ms(now_ns).unwrap_or(0.0), width, height);
            let drawn = run.draw(frame, &ctx);
            let Some(trial) = run.trial.as_mut() else {
                return Ok(false);
            };
            match drawn {
                Ok(true) => push(trial.mark_visible(now_ns)),
                Ok(false) => {}
                Err(err) => {
                    push(trial.fail(now_ns, err.to_string()));
                    if err.is_fatal() {
                        return Err(err);
                    }
                    tracing::warn!(question = %run.question.id, %err, "stimulus failed mid-trial");
                }
            }
        }
        _ => {}
    }
    Ok(false)
}
