//! Shared test harness.

use armsim_core::config::{Config, PipelineMode, StallPolicy};
use armsim_core::core::pipeline::stages;
use armsim_core::core::Machine;
use armsim_core::sim::loader;

/// A machine wired for direct cycle-by-cycle driving from a test.
pub struct TestContext {
    pub machine: Machine,
}

impl TestContext {
    /// A machine under the given config, with tracing quieted for tests.
    pub fn with_config(config: &Config) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_test_writer()
            .try_init();
        Self {
            machine: Machine::new(config).unwrap(),
        }
    }

    /// An inline-mode machine: one instruction completes per cycle.
    pub fn inline() -> Self {
        let mut config = Config::default();
        config.pipeline.mode = PipelineMode::Inline;
        Self::with_config(&config)
    }

    /// A threaded-semantics machine. The stages are still run on the test
    /// thread, but writes defer to commit exactly as the workers see them.
    pub fn threaded() -> Self {
        Self::with_config(&Config::default())
    }

    /// Same as [`TestContext::threaded`] with a chosen stall policy.
    pub fn threaded_with_policy(policy: StallPolicy) -> Self {
        let mut config = Config::default();
        config.pipeline.stall_policy = policy;
        Self::with_config(&config)
    }

    /// Loads whole words at the bottom of ROM.
    pub fn load_words(mut self, words: &[u32]) -> Self {
        loader::flash_words(&mut self.machine, words).unwrap();
        self
    }

    /// Runs the reset cycle (cycle 0).
    pub fn reset(mut self) -> Self {
        self.machine.log.begin_cycle();
        self.machine.reset(None).unwrap();
        self.machine.tock().unwrap();
        self
    }

    /// Runs one whole cycle, panicking on any fault.
    pub fn run_cycle(&mut self) {
        self.try_run_cycle().unwrap();
    }

    /// Runs one whole cycle.
    pub fn try_run_cycle(&mut self) -> Result<(), armsim_core::common::Fault> {
        let m = &mut self.machine;
        m.log.begin_cycle();
        match m.mode() {
            PipelineMode::Inline => stages::step_inline(m)?,
            PipelineMode::Threaded => {
                stages::fetch(m)?;
                stages::decode(m)?;
                stages::execute(m)?;
            }
        }
        m.tock()
    }

    /// Runs `n` whole cycles.
    pub fn run_cycles(&mut self, n: usize) {
        for _ in 0..n {
            self.run_cycle();
        }
    }
}

/// The built-in test image: stack pointer, entry vector (`0x8 | 1`), then
/// `MOVS r0, #42` and a branch-to-self.
pub fn test_image() -> [u32; 3] {
    loader::TEST_FLASH
}

/// An image whose entry instruction is already the final branch-to-self.
pub fn self_branch_image() -> [u32; 3] {
    [0x2000_FFFC, 0x0000_0009, 0xE7FE_E7FE]
}
