//! The per-frame sequence: sync callbacks, schedule the next frame, draw,
//! update the statistics overlay.

use crate::{stats::Stats, sync::SyncRegistry};

/// Asks the host for another frame (`requestAnimationFrame` on the web).
pub trait Scheduler {
    fn request_frame(&self);
}

impl Scheduler for winit::window::Window {
    fn request_frame(&self) {
        self.request_redraw();
    }
}

/// Draws one composed frame.
pub trait FrameRenderer {
    fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

#[derive(Debug)]
pub struct RenderLoop {
    state: LoopState,
    syncs: SyncRegistry,
    stats: Stats,
    frames: u64,
}

impl RenderLoop {
    pub fn new(syncs: SyncRegistry, stats: Stats) -> Self {
        Self {
            state: LoopState::Running,
            syncs,
            stats,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Final: a stopped loop never runs again.
    pub fn stop(&mut self) {
        if self.state == LoopState::Running {
            log::info!("render loop stopped after {} frames", self.frames);
        }
        self.state = LoopState::Stopped;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn syncs_mut(&mut self) -> &mut SyncRegistry {
        &mut self.syncs
    }

    /// Runs one frame. A render error is returned after the next frame has
    /// already been requested, so the loop keeps going once it is handled.
    pub fn tick(&mut self, scheduler: &dyn Scheduler, frame: &mut dyn FrameRenderer) -> Result<(), wgpu::SurfaceError> {
        if self.state == LoopState::Stopped {
            return Ok(());
        }
        self.syncs.run_all();
        scheduler.request_frame();
        frame.render_frame()?;
        self.stats.update();
        self.frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, time::Duration};

    use super::*;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct Recorder(Log);

    impl Scheduler for Recorder {
        fn request_frame(&self) {
            self.0.borrow_mut().push("schedule");
        }
    }

    impl FrameRenderer for Recorder {
        fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
            self.0.borrow_mut().push("render");
            Ok(())
        }
    }

    struct Failing;

    impl FrameRenderer for Failing {
        fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
            Err(wgpu::SurfaceError::Outdated)
        }
    }

    fn render_loop(log: &Log) -> RenderLoop {
        let mut syncs = SyncRegistry::new();
        let sync_log = log.clone();
        syncs.register(move || sync_log.borrow_mut().push("sync"));
        RenderLoop::new(syncs, Stats::new(Duration::from_millis(500)))
    }

    #[test]
    fn each_tick_syncs_then_schedules_then_renders() {
        let log = Log::default();
        let mut render_loop = render_loop(&log);
        let scheduler = Recorder(log.clone());
        let mut frame = Recorder(log.clone());
        render_loop.tick(&scheduler, &mut frame).unwrap();
        render_loop.tick(&scheduler, &mut frame).unwrap();
        assert_eq!(
            *log.borrow(),
            ["sync", "schedule", "render", "sync", "schedule", "render"]
        );
        assert_eq!(render_loop.frames(), 2);
    }

    #[test]
    fn stopped_loop_does_nothing() {
        let log = Log::default();
        let mut render_loop = render_loop(&log);
        render_loop.stop();
        render_loop
            .tick(&Recorder(log.clone()), &mut Recorder(log.clone()))
            .unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(render_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn render_errors_still_schedule_the_next_frame() {
        let log = Log::default();
        let mut render_loop = render_loop(&log);
        let result = render_loop.tick(&Recorder(log.clone()), &mut Failing);
        assert!(matches!(result, Err(wgpu::SurfaceError::Outdated)));
        assert_eq!(*log.borrow(), ["sync", "schedule"]);
        assert_eq!(render_loop.state(), LoopState::Running);
    }
}
