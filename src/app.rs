use std::{
    f32::consts::{FRAC_PI_2, TAU},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::Duration,
};

use chrono::Utc;
use eframe::{
    App, CreationContext, Frame,
    egui::{self, Align2, Context, FontId, Pos2, Sense, Shape, Stroke, Vec2},
};
use egui_extras::{Column, TableBuilder};
use thiserror::Error;

use crate::{
    acquisition::{AcquisitionFailure, get_activity_snapshot},
    config::DashboardConfig,
    domain::{ActivitySnapshot, RecentEvent},
    github::{self, FetchError, GitHubSource},
    storage::{FileCache, NullCache, SNAPSHOT_TTL_MS},
    widgets::{
        AnimatedCounter, EMPTY_FEED_PLACEHOLDER, FrameScheduler, ProgressRing, SignalGraph,
        TickSource, UNAVAILABLE_MESSAGE, boot_log_lines, entrance_opacity,
    },
};

pub const APP_NAME: &str = "Activity Dashboard";

const METRIC_LABELS: [&str; 4] = [
    "Total Contributions",
    "Current Streak",
    "Longest Streak",
    "Repositories",
];
const RING_RADIUS: f64 = 34.0;
const RING_STROKE: f32 = 6.0;
const GRAPH_SIZE: Vec2 = Vec2::new(220.0, 80.0);
const LOADING_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct DashboardApp {
    state: DashboardState,
    contribution_goal: u64,
    scheduler: FrameScheduler,
}

enum DashboardState {
    Loading {
        job: PendingJob,
        started_at: Option<f64>,
    },
    Ready(Box<DashboardView>),
    Unavailable,
}

impl DashboardApp {
    pub fn new(cc: &CreationContext<'_>, config: DashboardConfig) -> Self {
        let contribution_goal = config.contribution_goal;
        Self {
            state: DashboardState::Loading {
                job: PendingJob::spawn(config),
                started_at: None,
            },
            contribution_goal,
            scheduler: FrameScheduler::new(cc.egui_ctx.clone()),
        }
    }

    fn poll_job(&mut self) {
        let outcome = match &self.state {
            DashboardState::Loading { job, .. } => job.try_take(),
            _ => None,
        };
        let Some(outcome) = outcome else {
            return;
        };

        self.state = match outcome {
            Ok(snapshot) => {
                tracing::info!(from_cache = snapshot.from_cache, "activity snapshot ready");
                DashboardState::Ready(Box::new(DashboardView::new(
                    snapshot,
                    self.contribution_goal,
                )))
            }
            Err(err) => {
                tracing::error!(error = %err, "activity metrics unavailable");
                DashboardState::Unavailable
            }
        };
    }

    /// Stops every animation loop; called once the viewport is closing.
    fn teardown(&mut self) {
        if let DashboardState::Ready(view) = &mut self.state {
            view.graph.stop();
        }
        self.scheduler.cancel();
    }

    fn schedule_next_frame(&self, ctx: &Context) {
        if self.scheduler.is_cancelled() {
            return;
        }
        match &self.state {
            DashboardState::Loading { .. } => {
                self.scheduler.request_frame_after(LOADING_POLL_INTERVAL);
            }
            DashboardState::Ready(view) => {
                if view.is_animating(ctx) {
                    self.scheduler.request_next_frame();
                }
            }
            DashboardState::Unavailable => {}
        }
    }

    fn render(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        match &mut self.state {
            DashboardState::Loading { started_at, .. } => {
                let now = ctx.now();
                let elapsed = now - *started_at.get_or_insert(now);
                render_loading(ui, elapsed);
            }
            DashboardState::Ready(view) => render_ready(ui, view, &ctx),
            DashboardState::Unavailable => render_unavailable(ui),
        }
    }
}

impl App for DashboardApp {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        self.poll_job();

        if ctx.input(|input| input.viewport().close_requested()) {
            self.teardown();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("GitHub Activity");
            ui.separator();
            self.render(ui);
        });

        self.schedule_next_frame(ctx);
    }
}

// -----------------------------------------------------------------------------
// Ready view
// -----------------------------------------------------------------------------

struct DashboardView {
    snapshot: ActivitySnapshot,
    counters: [AnimatedCounter; 4],
    streak_ring: ProgressRing,
    goal_ring: ProgressRing,
    graph: SignalGraph,
    feed_started_at: Option<f64>,
}

impl DashboardView {
    fn new(snapshot: ActivitySnapshot, contribution_goal: u64) -> Self {
        let mut view = Self {
            snapshot,
            counters: Default::default(),
            streak_ring: ProgressRing::new(0, 0, RING_RADIUS),
            goal_ring: ProgressRing::new(0, contribution_goal, RING_RADIUS),
            graph: SignalGraph::new(),
            feed_started_at: None,
        };
        view.retarget(contribution_goal);
        view
    }

    /// Points every widget at the current snapshot; changed values restart
    /// their animation.
    fn retarget(&mut self, contribution_goal: u64) {
        let snapshot = &self.snapshot;
        let targets = [
            snapshot.total_contributions,
            u64::from(snapshot.current_streak),
            u64::from(snapshot.longest_streak),
            snapshot.repository_count,
        ];
        for (counter, target) in self.counters.iter_mut().zip(targets) {
            counter.set_target(target);
        }
        self.streak_ring.set_values(
            u64::from(snapshot.current_streak),
            u64::from(snapshot.longest_streak),
        );
        self.goal_ring
            .set_values(snapshot.total_contributions, contribution_goal);
        self.feed_started_at = None;
    }

    fn is_animating(&self, ticks: &dyn TickSource) -> bool {
        self.graph.is_running()
            || self.counters.iter().any(|counter| !counter.is_settled(ticks))
            || !self.streak_ring.is_settled(ticks)
            || !self.goal_ring.is_settled(ticks)
    }
}

fn render_ready(ui: &mut egui::Ui, view: &mut DashboardView, ticks: &Context) {
    view.graph.tick(ticks);

    if view.snapshot.from_cache {
        ui.weak("Served from local cache");
    }

    egui::Grid::new("metric_cards")
        .num_columns(METRIC_LABELS.len())
        .spacing([12.0, 12.0])
        .show(ui, |grid| {
            for (counter, label) in view.counters.iter_mut().zip(METRIC_LABELS) {
                grid.group(|card| {
                    card.vertical_centered(|card| {
                        card.heading(counter.sample(ticks).to_string());
                        card.small(label);
                    });
                });
            }
            grid.end_row();
        });

    ui.add_space(12.0);
    ui.horizontal(|row| {
        draw_progress_ring(row, &mut view.streak_ring, "Streak vs best", ticks);
        draw_progress_ring(row, &mut view.goal_ring, "Yearly goal", ticks);
        row.vertical(|column| {
            column.small("Signal");
            draw_signal_graph(column, &view.graph);
        });
    });

    ui.add_space(12.0);
    ui.separator();
    ui.strong("Recent pushes");
    let now = ticks.now();
    let elapsed = now - *view.feed_started_at.get_or_insert(now);
    draw_event_feed(ui, &view.snapshot.recent_events, elapsed);
}

fn render_loading(ui: &mut egui::Ui, elapsed: f64) {
    for line in boot_log_lines(elapsed) {
        ui.monospace(*line);
    }
    ui.spinner();
}

fn render_unavailable(ui: &mut egui::Ui) {
    ui.colored_label(ui.visuals().weak_text_color(), UNAVAILABLE_MESSAGE);
}

// -----------------------------------------------------------------------------
// Drawing helpers
// -----------------------------------------------------------------------------

fn draw_progress_ring(ui: &mut egui::Ui, ring: &mut ProgressRing, label: &str, ticks: &Context) {
    ui.vertical(|column| {
        let radius = ring.radius() as f32;
        let side = radius * 2.0 + RING_STROKE * 2.0;
        let (rect, _) = column.allocate_exact_size(Vec2::splat(side), Sense::hover());
        let painter = column.painter_at(rect);
        let center = rect.center();
        let visuals = column.visuals();

        painter.circle_stroke(
            center,
            radius,
            Stroke::new(RING_STROKE, visuals.faint_bg_color),
        );

        let fraction = (1.0 - ring.stroke_offset(ticks) / ring.circumference()) as f32;
        if fraction > 0.0 {
            let segments = ((64.0 * fraction).ceil() as usize).max(2);
            let points: Vec<Pos2> = (0..=segments)
                .map(|step| {
                    let angle = -FRAC_PI_2 + TAU * fraction * step as f32 / segments as f32;
                    center + Vec2::angled(angle) * radius
                })
                .collect();
            painter.add(Shape::line(
                points,
                Stroke::new(RING_STROKE, visuals.selection.bg_fill),
            ));
        }

        painter.text(
            center,
            Align2::CENTER_CENTER,
            format!("{}/{}", ring.value(), ring.max()),
            FontId::monospace(12.0),
            visuals.text_color(),
        );
        column.small(label);
    });
}

fn draw_signal_graph(ui: &mut egui::Ui, graph: &SignalGraph) {
    let (rect, _) = ui.allocate_exact_size(GRAPH_SIZE, Sense::hover());
    let painter = ui.painter_at(rect);
    let visuals = ui.visuals();
    painter.rect_filled(rect, 4.0, visuals.extreme_bg_color);

    let samples = graph.samples();
    if samples.len() < 2 {
        return;
    }
    let step = rect.width() / (samples.len() - 1) as f32;
    let half_height = rect.height() / 2.0 - 4.0;
    let points: Vec<Pos2> = samples
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            Pos2::new(
                rect.left() + idx as f32 * step,
                rect.center().y - value * half_height,
            )
        })
        .collect();
    painter.add(Shape::line(
        points,
        Stroke::new(1.5, visuals.selection.stroke.color),
    ));
}

fn draw_event_feed(ui: &mut egui::Ui, events: &[RecentEvent], elapsed: f64) {
    if events.is_empty() {
        ui.weak(EMPTY_FEED_PLACEHOLDER);
        return;
    }

    ui.push_id("event_feed_table", |ui| {
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::remainder())
            .column(Column::initial(90.0))
            .column(Column::initial(90.0))
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("Repository");
                });
                header.col(|ui| {
                    ui.strong("Commits");
                });
                header.col(|ui| {
                    ui.strong("When");
                });
            })
            .body(|mut body| {
                for (idx, event) in events.iter().enumerate() {
                    let opacity = entrance_opacity(idx, elapsed);
                    body.row(24.0, |mut row| {
                        row.col(|ui| {
                            ui.set_opacity(opacity);
                            ui.label(&event.repository_label);
                        });
                        row.col(|ui| {
                            ui.set_opacity(opacity);
                            ui.label(commit_label(event.unit_count));
                        });
                        row.col(|ui| {
                            ui.set_opacity(opacity);
                            ui.label(&event.relative_age);
                        });
                    });
                }
            });
    });
}

fn commit_label(count: usize) -> String {
    if count == 1 {
        "1 commit".to_owned()
    } else {
        format!("{count} commits")
    }
}

// -----------------------------------------------------------------------------
// Background acquisition
// -----------------------------------------------------------------------------

#[derive(Debug, Error)]
enum JobError {
    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] FetchError),
    #[error(transparent)]
    Acquisition(#[from] AcquisitionFailure),
    #[error("Background worker disconnected before returning a result")]
    WorkerGone,
}

type JobOutcome = Result<ActivitySnapshot, JobError>;

struct PendingJob {
    receiver: Receiver<JobOutcome>,
}

impl PendingJob {
    fn spawn(config: DashboardConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(Self::run(config));
        });
        Self { receiver: rx }
    }

    fn run(config: DashboardConfig) -> JobOutcome {
        let client = github::build_client()?;
        let source = GitHubSource::new(client, config);
        let now = Utc::now();
        let snapshot = match FileCache::initialize() {
            Ok(cache) => get_activity_snapshot(&source, &cache, now, SNAPSHOT_TTL_MS)?,
            Err(err) => {
                tracing::warn!(error = %err, "snapshot cache unavailable; fetching uncached");
                get_activity_snapshot(&source, &NullCache, now, SNAPSHOT_TTL_MS)?
            }
        };
        Ok(snapshot)
    }

    fn try_take(&self) -> Option<JobOutcome> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(JobError::WorkerGone)),
        }
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
