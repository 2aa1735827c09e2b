//! The threaded pipeline coordinator.
//!
//! One worker thread per stage. Each cycle the driver releases all three
//! workers, each locks the machine in turn, runs its stage function, and
//! reports back; the driver then holds the lock itself for the tock. A
//! stage fault is parked in the machine's fault slot and collected by the
//! driver, so a faulting cycle still completes its barrier.

use crate::common::Fault;
use crate::core::machine::{Machine, SharedMachine};
use crate::core::pipeline::stages;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::debug;

enum Msg {
    Tick,
    Exit,
}

struct Worker {
    name: &'static str,
    tx: Sender<Msg>,
    handle: JoinHandle<()>,
}

/// Handle to the running stage workers.
pub struct Coordinator {
    workers: Vec<Worker>,
    done_rx: Receiver<()>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

type StageFn = fn(&mut Machine) -> Result<(), Fault>;

const STAGES: [(&str, StageFn); 3] = [
    ("stage-fetch", stages::fetch),
    ("stage-decode", stages::decode),
    ("stage-execute", stages::execute),
];

impl Coordinator {
    /// Spawns the three stage workers.
    pub fn spawn(machine: &SharedMachine) -> std::io::Result<Self> {
        let (done_tx, done_rx) = channel();
        let mut workers = Vec::with_capacity(STAGES.len());
        for (name, stage) in STAGES {
            let (tx, rx) = channel();
            let machine = machine.clone();
            let done = done_tx.clone();
            let handle = std::thread::Builder::new()
                .name(name.into())
                .spawn(move || worker_loop(&rx, &done, &machine, stage))?;
            workers.push(Worker { name, tx, handle });
        }
        Ok(Self { workers, done_rx })
    }

    /// Runs one tick: releases every worker and waits for all of them.
    ///
    /// The machine lock is free while this runs; stage faults are collected
    /// from the machine's fault slot afterwards, not here.
    pub fn tick(&self) -> Result<(), Fault> {
        for w in &self.workers {
            if w.tx.send(Msg::Tick).is_err() {
                return Err(Fault::CoreThreadExit);
            }
        }
        for _ in &self.workers {
            if self.done_rx.recv().is_err() {
                return Err(Fault::CoreThreadExit);
            }
        }
        Ok(())
    }

    /// Stops and joins every worker.
    pub fn shutdown(self) {
        for w in &self.workers {
            let _ = w.tx.send(Msg::Exit);
        }
        for w in self.workers {
            debug!(worker = w.name, "joining stage worker");
            let _ = w.handle.join();
        }
    }
}

fn worker_loop(
    rx: &Receiver<Msg>,
    done: &Sender<()>,
    machine: &SharedMachine,
    stage: StageFn,
) {
    while let Ok(Msg::Tick) = rx.recv() {
        {
            let mut m = machine.lock();
            if let Err(fault) = stage(&mut m) {
                // First fault wins; later stages of the same cycle may
                // cascade off it.
                if m.fault.is_none() {
                    m.fault = Some(fault);
                }
            }
        }
        if done.send(()).is_err() {
            return;
        }
    }
}
