//! The scan engine: the cyclic real-time loop that samples inputs, runs the
//! control program, and commits outputs once per `common_tick_time_ns`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::custom::CustomLayer;
use crate::glue::image::refresh_special_functions;
use crate::glue::GlueBinding;
use crate::hardware::HardwareLayer;
use crate::program::ControlProgram;

pub struct ScanEngine<P: ControlProgram> {
    glue: GlueBinding,
    hardware: Arc<dyn HardwareLayer>,
    custom: Arc<dyn CustomLayer>,
    program: P,
}

impl<P: ControlProgram> ScanEngine<P> {
    pub fn new(glue: GlueBinding, hardware: Arc<dyn HardwareLayer>, custom: Arc<dyn CustomLayer>, program: P) -> Self {
        Self { glue, hardware, custom, program }
    }

    /// One full scan: sample, update_custom_in, tick, update_custom_out,
    /// commit, refresh the wall-clock special cell. Runs entirely under the
    /// buffer lock, matching the original's full-cycle critical section.
    fn run_one_cycle(&mut self, cycle: u64) {
        let hardware = &self.hardware;
        let custom = &self.custom;
        let program = &mut self.program;
        self.glue.with_locked_blocking(|image| {
            hardware.sample_inputs(image);
            custom.update_in(image);
            program.tick(image, cycle);
            custom.update_out(image);
            hardware.commit_outputs(image);
            refresh_special_functions(image);
        });
    }

    /// Blocks the calling thread, executing scans until `run` clears. A
    /// cycle already in progress always finishes; no new cycle starts once
    /// `run` is false.
    pub fn run(&mut self, run: Arc<AtomicBool>) {
        apply_realtime_scheduling();

        let period = Duration::from_nanos(self.glue.common_tick_time_ns.max(1));
        let mut cycle: u64 = 0;

        while run.load(Ordering::Relaxed) {
            let started_at = Instant::now();

            self.run_one_cycle(cycle);
            cycle = cycle.wrapping_add(1);

            let elapsed = started_at.elapsed();
            if elapsed > period {
                warn!(
                    overrun_us = (elapsed - period).as_micros() as u64,
                    "scan cycle overran common_tick_time_ns, starting the next cycle immediately"
                );
                continue;
            }
            std::thread::sleep(period - elapsed);
        }

        debug!("scan engine observed run = false, exiting after its last cycle");
    }
}

#[cfg(target_os = "linux")]
fn apply_realtime_scheduling() {
    let param = libc::sched_param { sched_priority: 30 };
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc != 0 {
        warn!("failed to raise scan thread to SCHED_FIFO priority 30, continuing at default priority");
    } else {
        tracing::info!("scan thread raised to SCHED_FIFO priority 30");
    }

    let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    if rc != 0 {
        warn!("failed to lock process memory with mlockall, continuing without it");
    } else {
        tracing::info!("process memory locked with mlockall");
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_realtime_scheduling() {
    warn!("real-time scheduling and mlockall are not available on this platform");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom::NoopCustomLayer;
    use crate::glue::image::IoImageState;
    use crate::hardware::SimulatorHardware;
    use crate::program::EchoProgram;

    #[test]
    fn one_cycle_samples_ticks_and_commits_in_order() {
        let glue = GlueBinding::new(1);
        glue.with_locked_blocking(|image: &mut IoImageState| {
            let mut program = EchoProgram::new();
            program.config_init(image);
        });

        let hardware: Arc<dyn HardwareLayer> = Arc::new(SimulatorHardware::new());
        let custom: Arc<dyn CustomLayer> = Arc::new(NoopCustomLayer);
        let mut engine = ScanEngine::new(glue.clone(), hardware, custom, EchoProgram::new());

        engine.run_one_cycle(0);

        let counter = glue.with_locked_blocking(|image| image.dint_memory[0]);
        assert_eq!(counter, Some(1));
    }

    #[test]
    fn run_exits_promptly_once_flag_clears() {
        let glue = GlueBinding::new(1_000_000);
        glue.with_locked_blocking(|image: &mut IoImageState| {
            let mut program = EchoProgram::new();
            program.config_init(image);
        });

        let hardware: Arc<dyn HardwareLayer> = Arc::new(SimulatorHardware::new());
        let custom: Arc<dyn CustomLayer> = Arc::new(NoopCustomLayer);
        let mut engine = ScanEngine::new(glue, hardware, custom, EchoProgram::new());

        let run = Arc::new(AtomicBool::new(false));
        engine.run(run);
    }

    #[test]
    fn custom_hooks_run_between_sample_tick_and_commit() {
        use std::sync::atomic::AtomicU32;
        use std::sync::Mutex;

        #[derive(Default)]
        struct RecordingCustomLayer {
            calls: Mutex<Vec<&'static str>>,
            init_calls: AtomicU32,
        }

        impl CustomLayer for RecordingCustomLayer {
            fn init(&self) {
                self.init_calls.fetch_add(1, Ordering::Relaxed);
            }

            fn update_in(&self, _image: &mut IoImageState) {
                self.calls.lock().unwrap().push("update_in");
            }

            fn update_out(&self, _image: &IoImageState) {
                self.calls.lock().unwrap().push("update_out");
            }
        }

        let glue = GlueBinding::new(1);
        glue.with_locked_blocking(|image: &mut IoImageState| {
            let mut program = EchoProgram::new();
            program.config_init(image);
        });

        let hardware: Arc<dyn HardwareLayer> = Arc::new(SimulatorHardware::new());
        let custom = Arc::new(RecordingCustomLayer::default());
        let mut engine = ScanEngine::new(glue, hardware, Arc::clone(&custom) as Arc<dyn CustomLayer>, EchoProgram::new());

        engine.run_one_cycle(0);

        assert_eq!(*custom.calls.lock().unwrap(), vec!["update_in", "update_out"]);
    }
}
