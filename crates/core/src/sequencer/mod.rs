use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BootstrapError, DynError, Result};

/// One entry of the ordered native load chain.
///
/// The chain mirrors link-time dependencies among the modules: each entry may
/// assume all prior entries are already resident in the process. The order is
/// fixed at configuration time and never re-sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySpec {
    pub name: String,
    #[serde(default)]
    pub loaded: bool,
}

impl LibrarySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loaded: false,
        }
    }
}

/// Backend that makes a named native module resident in the process.
///
/// Implementations report failures as boxed errors; the sequencer attaches
/// the library name before anything reaches the host.
pub trait NativeLoader {
    fn load(&mut self, name: &str) -> std::result::Result<(), DynError>;
}

enum SequencerPhase {
    Unconfigured,
    Configured,
    Completed,
    Failed { name: String, cause: String },
}

/// Loads an ordered chain of native modules exactly once, failing fast.
///
/// The process-wide "which modules are resident" knowledge lives in the
/// per-entry `loaded` flags rather than ambient global state, so tests reset
/// it by constructing a fresh sequencer.
pub struct LibraryLoadSequencer {
    loader: Box<dyn NativeLoader>,
    specs: Vec<LibrarySpec>,
    phase: SequencerPhase,
}

impl LibraryLoadSequencer {
    pub fn new(loader: Box<dyn NativeLoader>) -> Self {
        Self {
            loader,
            specs: Vec::new(),
            phase: SequencerPhase::Unconfigured,
        }
    }

    /// Installs the load chain. Called once, before [`run`](Self::run).
    ///
    /// An empty chain, a duplicate name, or a repeat call are configuration
    /// errors: the chain is a strict dependency order and every module loads
    /// exactly once.
    pub fn configure(&mut self, specs: Vec<LibrarySpec>) -> Result<()> {
        if !matches!(self.phase, SequencerPhase::Unconfigured) {
            return Err(BootstrapError::configuration(
                "load chain already configured",
            ));
        }
        if specs.is_empty() {
            return Err(BootstrapError::configuration("load chain is empty"));
        }
        for (index, spec) in specs.iter().enumerate() {
            if specs[..index].iter().any(|prior| prior.name == spec.name) {
                return Err(BootstrapError::configuration(format!(
                    "library `{}` appears more than once in the chain",
                    spec.name
                )));
            }
        }

        self.specs = specs;
        self.phase = SequencerPhase::Configured;
        Ok(())
    }

    /// Loads every entry strictly in order through the backend.
    ///
    /// The first failure aborts the remaining loads: a later module may
    /// depend on the failed one, and attempting it would trade a clear
    /// diagnostic for an unresolved-symbol crash. A completed run is a no-op
    /// on re-entry; a failed run re-reports the recorded failure without
    /// touching the backend again.
    pub fn run(&mut self) -> Result<()> {
        match &self.phase {
            SequencerPhase::Unconfigured => {
                return Err(BootstrapError::configuration("run called before configure"));
            }
            SequencerPhase::Completed => {
                tracing::debug!("load chain already resident, skipping");
                return Ok(());
            }
            SequencerPhase::Failed { name, cause } => {
                tracing::debug!(library = %name, "load chain already failed, not retrying");
                return Err(BootstrapError::load(name.clone(), cause.clone()));
            }
            SequencerPhase::Configured => {}
        }

        for index in 0..self.specs.len() {
            let name = self.specs[index].name.clone();
            tracing::debug!(library = %name, position = index, "loading native library");

            if let Err(cause) = self.loader.load(&name) {
                let cause = cause.to_string();
                tracing::error!(library = %name, %cause, "native library failed to load");
                self.phase = SequencerPhase::Failed {
                    name: name.clone(),
                    cause: cause.clone(),
                };
                return Err(BootstrapError::load(name, cause));
            }

            self.specs[index].loaded = true;
            tracing::info!(library = %name, "native library resident");
        }

        self.phase = SequencerPhase::Completed;
        tracing::info!(count = self.specs.len(), "native load chain complete");
        Ok(())
    }

    /// Returns the configured chain with its per-entry load flags.
    pub fn specs(&self) -> &[LibrarySpec] {
        &self.specs
    }

    /// Returns `true` once every entry is resident.
    pub fn is_completed(&self) -> bool {
        matches!(self.phase, SequencerPhase::Completed)
    }
}

impl fmt::Debug for LibraryLoadSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match &self.phase {
            SequencerPhase::Unconfigured => "unconfigured",
            SequencerPhase::Configured => "configured",
            SequencerPhase::Completed => "completed",
            SequencerPhase::Failed { .. } => "failed",
        };
        f.debug_struct("LibraryLoadSequencer")
            .field("specs", &self.specs)
            .field("phase", &phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Shared call log so tests can inspect the loader after the sequencer
    /// takes ownership of it.
    #[derive(Clone, Default)]
    struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        fn names(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct ScriptedLoader {
        log: CallLog,
        fail_on: Option<&'static str>,
    }

    impl NativeLoader for ScriptedLoader {
        fn load(&mut self, name: &str) -> std::result::Result<(), DynError> {
            self.log.0.lock().unwrap().push(name.to_string());
            if self.fail_on == Some(name) {
                return Err("undefined symbol: mix_open_audio".into());
            }
            Ok(())
        }
    }

    fn sequencer(fail_on: Option<&'static str>) -> (LibraryLoadSequencer, CallLog) {
        let log = CallLog::default();
        let loader = ScriptedLoader {
            log: log.clone(),
            fail_on,
        };
        (LibraryLoadSequencer::new(Box::new(loader)), log)
    }

    fn chain(names: &[&str]) -> Vec<LibrarySpec> {
        names.iter().copied().map(LibrarySpec::new).collect()
    }

    #[test]
    fn loads_entries_in_configured_order() {
        let (mut sequencer, log) = sequencer(None);
        sequencer
            .configure(chain(&["SDL2", "SDL2_mixer", "lyricstator"]))
            .unwrap();

        sequencer.run().unwrap();

        assert_eq!(log.names(), vec!["SDL2", "SDL2_mixer", "lyricstator"]);
        assert!(sequencer.is_completed());
        assert!(sequencer.specs().iter().all(|spec| spec.loaded));
    }

    #[test]
    fn stops_at_the_first_failure() {
        let (mut sequencer, log) = sequencer(Some("SDL2_ttf"));
        sequencer
            .configure(chain(&[
                "SDL2",
                "SDL2_mixer",
                "SDL2_ttf",
                "SDL2_image",
                "lyricstator",
            ]))
            .unwrap();

        let err = sequencer.run().unwrap_err();

        match err {
            BootstrapError::Load { name, cause } => {
                assert_eq!(name, "SDL2_ttf");
                assert!(cause.contains("undefined symbol"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Entries after the failing one were never attempted.
        assert_eq!(log.names(), vec!["SDL2", "SDL2_mixer", "SDL2_ttf"]);
        let loaded: Vec<_> = sequencer
            .specs()
            .iter()
            .filter(|spec| spec.loaded)
            .map(|spec| spec.name.as_str())
            .collect();
        assert_eq!(loaded, vec!["SDL2", "SDL2_mixer"]);
    }

    #[test]
    fn second_run_after_success_performs_no_loads() {
        let (mut sequencer, log) = sequencer(None);
        sequencer.configure(chain(&["SDL2", "lyricstator"])).unwrap();
        sequencer.run().unwrap();

        sequencer.run().unwrap();

        assert_eq!(log.names().len(), 2);
    }

    #[test]
    fn run_after_failure_reports_without_reloading() {
        let (mut sequencer, log) = sequencer(Some("SDL2_mixer"));
        sequencer
            .configure(chain(&["SDL2", "SDL2_mixer", "lyricstator"]))
            .unwrap();
        sequencer.run().unwrap_err();

        let err = sequencer.run().unwrap_err();

        assert!(matches!(err, BootstrapError::Load { ref name, .. } if name == "SDL2_mixer"));
        assert_eq!(log.names().len(), 2);
    }

    #[test]
    fn empty_chain_is_rejected() {
        let (mut sequencer, _log) = sequencer(None);

        let err = sequencer.configure(Vec::new()).unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration(_)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (mut sequencer, _log) = sequencer(None);

        let err = sequencer
            .configure(chain(&["SDL2", "SDL2_ttf", "SDL2"]))
            .unwrap_err();
        assert!(format!("{err}").contains("SDL2"));
    }

    #[test]
    fn configure_twice_is_rejected() {
        let (mut sequencer, _log) = sequencer(None);
        sequencer.configure(chain(&["SDL2"])).unwrap();

        let err = sequencer.configure(chain(&["SDL2_mixer"])).unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration(_)));
    }

    #[test]
    fn configure_after_run_is_rejected() {
        let (mut sequencer, _log) = sequencer(None);
        sequencer.configure(chain(&["SDL2"])).unwrap();
        sequencer.run().unwrap();

        let err = sequencer.configure(chain(&["SDL2_mixer"])).unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration(_)));
    }

    #[test]
    fn run_before_configure_is_rejected() {
        let (mut sequencer, log) = sequencer(None);

        let err = sequencer.run().unwrap_err();

        assert!(matches!(err, BootstrapError::Configuration(_)));
        assert!(log.names().is_empty());
    }
}
