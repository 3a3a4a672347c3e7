// src/engine/worker.rs

//! Worker thread body and per-plan execution

use super::{CancelToken, Failure, Job, Outcome, WorkerSettings};
use crate::plan::Plan;
use crate::venv::{Environment, Provisioner};
use flume::{Receiver, Sender};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Provision once, then run plans until told to stop
///
/// A worker whose environment could not be created keeps taking plans and
/// reports each one as failed, so every submitted plan still yields an
/// outcome.
pub(super) fn worker_loop<P: Provisioner>(
    id: usize,
    provisioner: &P,
    settings: &WorkerSettings,
    jobs: Receiver<Job>,
    results: Sender<Outcome>,
    cancel: CancelToken,
) {
    // The environment is listed first so it drops before its directory
    let setup: Result<(P::Env, TempDir), String> = tempfile::Builder::new()
        .prefix("pessimist-")
        .tempdir()
        .map_err(|e| e.to_string())
        .and_then(|dir| match provisioner.create(dir.path()) {
            Ok(env) => Ok((env, dir)),
            Err(e) => Err(e.to_string()),
        });

    match &setup {
        Ok((_, dir)) => debug!("Worker {} ready in {}", id, dir.path().display()),
        Err(reason) => warn!("Worker {} could not provision an environment: {}", id, reason),
    }

    while let Ok(job) = jobs.recv() {
        let plan = match job {
            Job::Run(plan) => plan,
            Job::Shutdown => break,
        };

        if cancel.is_cancelled() {
            debug!("Worker {} skipping {} after cancellation", id, plan.title);
            continue;
        }

        let outcome = match &setup {
            Ok((env, _)) => run_plan(env, plan, &settings.pip_lines, &settings.command),
            Err(reason) => Outcome {
                plan,
                failure: Some(Failure::Provision(reason.clone())),
                transcript: String::new(),
            },
        };

        if results.send(outcome).is_err() {
            break;
        }
    }

    info!("Worker {} stopping", id);
}

/// Install a plan's pins and run the test command in `env`
///
/// The install step is skipped when there is nothing to install. The
/// transcript holds the output of every step that ran, whatever the result.
pub fn run_plan<E: Environment>(
    env: &E,
    plan: Arc<Plan>,
    pip_lines: &[String],
    command: &str,
) -> Outcome {
    let mut transcript = String::new();
    let pins = plan.pins();

    if !pins.is_empty() || !pip_lines.is_empty() {
        let installed = match env.install(&pins, pip_lines) {
            Ok(out) => {
                transcript.push_str(&out.transcript);
                out.success
            }
            Err(e) => {
                transcript.push_str(&format!("{e}\n"));
                false
            }
        };
        if !installed {
            return Outcome {
                plan,
                failure: Some(Failure::Install),
                transcript,
            };
        }
    }

    let tested = match env.run_command(command) {
        Ok(out) => {
            transcript.push_str(&out.transcript);
            out.success
        }
        Err(e) => {
            transcript.push_str(&format!("{e}\n"));
            false
        }
    };

    Outcome {
        plan,
        failure: (!tested).then_some(Failure::Test),
        transcript,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::venv::CommandOutput;
    use crate::version::Version;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Default)]
    struct ScriptedEnv {
        install_ok: bool,
        test_ok: bool,
        calls: RefCell<Vec<String>>,
    }

    impl Environment for ScriptedEnv {
        fn install(&self, packages: &[String], extra_lines: &[String]) -> Result<CommandOutput> {
            let line = format!("install {} {}", extra_lines.join(" "), packages.join(" "));
            self.calls.borrow_mut().push(line.clone());
            Ok(CommandOutput {
                success: self.install_ok,
                transcript: format!("$ {line}\n"),
            })
        }

        fn run_command(&self, command: &str) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(command.to_string());
            if command == "explode" {
                return Err(Error::EnvironmentError("no shell".to_string()));
            }
            Ok(CommandOutput {
                success: self.test_ok,
                transcript: format!("$ {command}\nran\n"),
            })
        }
    }

    fn plan(pins: &[(&str, &str)]) -> Arc<Plan> {
        let versions: BTreeMap<String, Version> = pins
            .iter()
            .map(|(n, v)| (n.to_string(), Version::parse(v).unwrap()))
            .collect();
        Arc::new(Plan {
            title: "max".to_string(),
            versions,
            fatal: true,
            target: None,
        })
    }

    #[test]
    fn test_pass() {
        let env = ScriptedEnv {
            install_ok: true,
            test_ok: true,
            ..Default::default()
        };
        let outcome = run_plan(&env, plan(&[("a", "1.0")]), &["-e .".to_string()], "make test");
        assert!(outcome.passed());
        assert_eq!(outcome.transcript, "$ install -e . a==1.0\n$ make test\nran\n");
    }

    #[test]
    fn test_install_failure_skips_tests() {
        let env = ScriptedEnv {
            install_ok: false,
            test_ok: true,
            ..Default::default()
        };
        let outcome = run_plan(&env, plan(&[("a", "1.0")]), &[], "make test");
        assert_eq!(outcome.failure, Some(Failure::Install));
        assert_eq!(env.calls.borrow().len(), 1);
    }

    #[test]
    fn test_test_failure() {
        let env = ScriptedEnv {
            install_ok: true,
            test_ok: false,
            ..Default::default()
        };
        let outcome = run_plan(&env, plan(&[("a", "1.0")]), &[], "make test");
        assert_eq!(outcome.failure, Some(Failure::Test));
        assert!(outcome.transcript.contains("ran"));
    }

    #[test]
    fn test_nothing_to_install() {
        let env = ScriptedEnv {
            install_ok: false,
            test_ok: true,
            ..Default::default()
        };
        let outcome = run_plan(&env, plan(&[]), &[], "make test");
        assert!(outcome.passed());
        assert_eq!(*env.calls.borrow(), vec!["make test".to_string()]);
    }

    #[test]
    fn test_spawn_error_is_a_test_failure() {
        let env = ScriptedEnv {
            install_ok: true,
            test_ok: true,
            ..Default::default()
        };
        let outcome = run_plan(&env, plan(&[]), &[], "explode");
        assert_eq!(outcome.failure, Some(Failure::Test));
        assert!(outcome.transcript.contains("no shell"));
    }

    /// Hands out environments that only count installs
    #[derive(Default)]
    struct CountingProvisioner {
        installs: Arc<AtomicUsize>,
    }

    struct CountingEnv {
        installs: Arc<AtomicUsize>,
    }

    impl Provisioner for CountingProvisioner {
        type Env = CountingEnv;

        fn create(&self, _dir: &Path) -> Result<CountingEnv> {
            Ok(CountingEnv {
                installs: Arc::clone(&self.installs),
            })
        }
    }

    impl Environment for CountingEnv {
        fn install(&self, _packages: &[String], _extra_lines: &[String]) -> Result<CommandOutput> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            Ok(CommandOutput {
                success: true,
                transcript: String::new(),
            })
        }

        fn run_command(&self, _command: &str) -> Result<CommandOutput> {
            Ok(CommandOutput {
                success: true,
                transcript: String::new(),
            })
        }
    }

    fn drain_queue(cancel: CancelToken) -> (Vec<Outcome>, usize) {
        let provisioner = CountingProvisioner::default();
        let settings = WorkerSettings {
            command: "make test".to_string(),
            pip_lines: Vec::new(),
        };
        let (jobs_tx, jobs_rx) = flume::unbounded();
        let (results_tx, results_rx) = flume::unbounded();

        jobs_tx.send(Job::Run(plan(&[("a", "1.0")]))).unwrap();
        jobs_tx.send(Job::Run(plan(&[("a", "2.0")]))).unwrap();
        jobs_tx.send(Job::Shutdown).unwrap();

        thread::scope(|scope| {
            let handle = scope.spawn(|| {
                worker_loop(0, &provisioner, &settings, jobs_rx, results_tx, cancel)
            });
            assert!(handle.join().is_ok());
        });

        let outcomes = results_rx.try_iter().collect();
        (outcomes, provisioner.installs.load(Ordering::SeqCst))
    }

    #[test]
    fn test_worker_runs_queued_plans_until_shutdown() {
        let (outcomes, installs) = drain_queue(CancelToken::new());
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(Outcome::passed));
        assert_eq!(installs, 2);
    }

    #[test]
    fn test_cancelled_worker_skips_queued_plans() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let (outcomes, installs) = drain_queue(cancel);
        assert!(outcomes.is_empty());
        assert_eq!(installs, 0);
    }
}
