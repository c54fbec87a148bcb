//! Observed Run
//!
//! This example drives a short chain of states on a worker thread while the
//! main thread polls the current state for progress display.
//!
//! Key concepts:
//! - States answer with the next state to run, or `Done`
//! - The worker runs outside the manager's lock, so polling never blocks
//! - A failing state ends the run with an inspectable abort record
//!
//! Run with: RUST_LOG=debug cargo run --example observed_run

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use stepwise::core::{Name, NextState, State, StepError};
use stepwise::manager::StateManager;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
#[error("oopsie!")]
struct Oopsie;

#[derive(Debug)]
struct StartState;

#[derive(Debug)]
struct FooState;

#[derive(Debug)]
struct BarState;

impl State for StartState {
    fn name(&self) -> Name {
        Name::from("StartState")
    }

    fn run(&self) -> Result<NextState, StepError> {
        println!("Now in {}", self.name());
        thread::sleep(Duration::from_secs(1));
        println!("Going to FooState");
        Ok(NextState::to(FooState))
    }
}

impl State for FooState {
    fn name(&self) -> Name {
        Name::from("FooState")
    }

    fn run(&self) -> Result<NextState, StepError> {
        println!("Now in {}", self.name());
        thread::sleep(Duration::from_secs(1));
        println!("Going to BarState");
        Ok(NextState::to(BarState))
    }
}

impl State for BarState {
    fn name(&self) -> Name {
        Name::from("BarState")
    }

    fn run(&self) -> Result<NextState, StepError> {
        println!("Now in {}", self.name());
        thread::sleep(Duration::from_secs(1));
        Err(Box::new(Oopsie))
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    println!("=== Observed Run Example ===\n");

    let manager = Arc::new(
        StateManager::builder()
            .initial(StartState)
            .trace_steps()
            .thread_name("demo-worker")
            .build()
            .unwrap(),
    );

    let worker = manager.spawn().unwrap();
    let last = manager.observe(Duration::from_millis(250), |name| println!("polled: {name}"));
    let summary = worker.join().unwrap().unwrap();

    match last.as_ref().and_then(|state| state.as_abort()) {
        Some(abort) => println!(
            "Run aborted in {}: {}",
            abort.failed_state(),
            abort.failure()
        ),
        None => {
            let name = last.map(|state| state.name().to_string());
            println!("Last state was {}", name.as_deref().unwrap_or("<none>"));
        }
    }

    println!("\nSummary: {}", serde_json::to_string_pretty(&summary).unwrap());
    println!("\n=== Example Complete ===");
}
