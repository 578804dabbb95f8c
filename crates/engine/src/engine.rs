// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine top-level: registration, routing tables, lifecycle.
//!
//! Registration (buffers, inputs, filters, outputs) happens before
//! `start`; it builds the routing tables that are then frozen into a
//! read-only [`Dispatch`] shared with every instance reader. `stop`
//! drains plugins in stages (inputs, then filters, then outputs) under
//! an overall deadline before the supervisor hard-kills stragglers.

use crate::instance::Instance;
use crate::router::TagRouter;
use crate::supervisor::{CrashFn, PrepareFn, ProcessEntry, Supervisor};
use crate::unit::ExecUnit;
use crate::{EngineError, RestartPolicy};
use fluxion_buffer::Options;
use fluxion_core::{log_tag, record, Event, LogLevel};
use fluxion_plugin::{Host, Registry};
use fluxion_wire::Pipe;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Deadline for the staged shutdown before plugin processes are killed.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// Delay between plugin process restarts.
const RESTART_DELAY: Duration = Duration::from_secs(3);

/// Read-only routing state, frozen at `start`. Shared with every
/// instance reader task.
pub(crate) struct Dispatch {
    /// One router per output group, in configuration order.
    outputs: IndexMap<String, TagRouter<Arc<ExecUnit>>>,
    /// Head of the filter chain.
    head_filters: TagRouter<Arc<ExecUnit>>,
}

impl Dispatch {
    /// Entry point for every event: the first matching filter, or
    /// straight to the outputs.
    pub fn filter(&self, ev: Event) {
        match self.head_filters.route(&ev.tag) {
            Some(unit) => unit.emit(ev),
            None => self.emit(ev),
        }
    }

    /// Fan out to every output group whose router matches; within a
    /// group, first match wins. Groups are walked in insertion order.
    pub fn emit(&self, ev: Event) {
        for router in self.outputs.values() {
            if let Some(unit) = router.route(&ev.tag) {
                unit.emit(ev.clone());
            }
        }
    }

    /// Pipeline-visible engine log: mirrors to tracing, then travels the
    /// reserved tag space like any other event.
    pub fn log(&self, name: &str, level: LogLevel, message: String) {
        match level {
            LogLevel::Debug => debug!(source = name, "{message}"),
            LogLevel::Info | LogLevel::Notice => info!(source = name, "{message}"),
            LogLevel::Warning => warn!(source = name, "{message}"),
            LogLevel::Error | LogLevel::Critical => tracing::error!(source = name, "{message}"),
        }
        self.filter(Event::new(
            log_tag(level),
            record! {
                "name" => name,
                "level" => level.as_str(),
                "message" => message,
            },
        ));
    }
}

/// Registration-time state; routing tables move into [`Dispatch`] at
/// start.
struct BuildState {
    buffers: HashMap<String, Options>,
    instances: IndexMap<String, Arc<Instance>>,
    filters: Vec<Arc<ExecUnit>>,
    outputs: IndexMap<String, TagRouter<Arc<ExecUnit>>>,
    head_filters: TagRouter<Arc<ExecUnit>>,
}

/// The pipeline engine.
pub struct Engine {
    registry: Registry,
    supervisor: Supervisor,
    state: Mutex<BuildState>,
    dispatch: OnceLock<Arc<Dispatch>>,
    unit_seq: AtomicI32,
    embed_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine with the default restart policy (restart on error, 3 s
    /// delay). `registry` lists plugins to run in-process; everything
    /// else is spawned as a `fluxion-<name>` child.
    pub fn new(registry: Registry) -> Self {
        Self::with_restart_policy(registry, RestartPolicy::OnError)
    }

    pub fn with_restart_policy(registry: Registry, policy: RestartPolicy) -> Self {
        let mut buffers = HashMap::new();
        buffers.insert("default".to_string(), Options::default());
        Self {
            registry,
            supervisor: Supervisor::new(policy, RESTART_DELAY),
            state: Mutex::new(BuildState {
                buffers,
                instances: IndexMap::new(),
                filters: Vec::new(),
                outputs: IndexMap::new(),
                head_filters: TagRouter::new(),
            }),
            dispatch: OnceLock::new(),
            unit_seq: AtomicI32::new(0),
            embed_tasks: Mutex::new(Vec::new()),
        }
    }

    /// Register a named buffer profile, replacing any previous one of
    /// the same name.
    pub fn register_buffer(&self, opts: Options) {
        self.state.lock().buffers.insert(opts.name.clone(), opts);
    }

    /// Register an input exec unit. `config` is the plugin-specific
    /// configuration, already MessagePack-encoded.
    pub fn add_input(&self, plugin_type: &str, config: Vec<u8>) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let instance = self.instance(&mut state, &format!("in-{plugin_type}"));
        self.add_exec_unit(&instance, config, None);
        Ok(())
    }

    /// Register a filter exec unit matching `pattern`. The new filter is
    /// appended to the chain and registered in every earlier filter's
    /// next-filter router, which is what keeps multi-stage filtering
    /// order-preserving.
    pub fn add_filter(
        &self,
        plugin_type: &str,
        pattern: &str,
        config: Vec<u8>,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let instance = self.instance(&mut state, &format!("filter-{plugin_type}"));
        let unit = self.add_exec_unit(&instance, config, None);

        state.head_filters.add(pattern, Arc::clone(&unit))?;
        for earlier in &state.filters {
            earlier.add_next_filter(pattern, Arc::clone(&unit))?;
        }
        state.filters.push(unit);
        Ok(())
    }

    /// Register an output exec unit in `group` (empty string for the
    /// default group), buffered per `buffer_name` or the default
    /// profile.
    pub fn add_output(
        &self,
        group: &str,
        plugin_type: &str,
        pattern: &str,
        buffer_name: Option<&str>,
        config: Vec<u8>,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let buffer_name = buffer_name.unwrap_or("default");
        let opts = state
            .buffers
            .get(buffer_name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownBuffer(buffer_name.to_string()))?;

        let instance = self.instance(&mut state, &format!("out-{plugin_type}"));
        let unit = self.add_exec_unit(&instance, config, Some(opts));
        state.outputs.entry(group.to_string()).or_default().add(pattern, unit)?;
        Ok(())
    }

    /// Freeze routing, launch embedded hosts, start the supervisor.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let dispatch = Arc::new(Dispatch {
            outputs: std::mem::take(&mut state.outputs),
            head_filters: std::mem::take(&mut state.head_filters),
        });
        self.dispatch
            .set(Arc::clone(&dispatch))
            .map_err(|_| EngineError::AlreadyStarted)?;

        for instance in state.instances.values() {
            instance.set_dispatch(Arc::clone(&dispatch));
        }

        for (name, instance) in state.instances.iter() {
            if let Some(factory) = self.registry.get(name) {
                let (engine_side, plugin_side) = Pipe::in_process_pair();
                let host = Host::new(name.clone(), factory, plugin_side);
                let host_name = name.clone();
                self.embed_tasks.lock().push(tokio::spawn(async move {
                    if let Err(err) = host.run().await {
                        warn!(plugin = %host_name, error = %err, "embedded plugin host failed");
                    }
                }));
                instance.install_pipe(engine_side);
                instance.send_info_request();
            }
        }

        self.supervisor.start();
        info!(instances = state.instances.len(), "engine started");
        Ok(())
    }

    /// Graceful shutdown: broadcast `Stop` to inputs, then filters, then
    /// outputs, waiting for each group to report termination, then kill
    /// whatever is left.
    pub async fn stop(&self) {
        let staged = async {
            for prefix in ["in-", "filter-", "out-"] {
                let group: Vec<Arc<Instance>> = {
                    let state = self.state.lock();
                    state
                        .instances
                        .iter()
                        .filter(|(name, _)| name.starts_with(prefix))
                        .map(|(_, instance)| Arc::clone(instance))
                        .collect()
                };
                for instance in &group {
                    instance.broadcast_stop().await;
                }
                for instance in &group {
                    instance.wait_terminated().await;
                    info!(plugin = %instance.name(), "plugin stopped");
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_DEADLINE, staged).await.is_err() {
            warn!("shutdown deadline exceeded; killing remaining plugin processes");
        }
        self.supervisor.stop().await;
        for task in self.embed_tasks.lock().drain(..) {
            task.abort();
        }
        info!("engine stopped");
    }

    /// Route an event into the filter chain (the normal entry point).
    pub fn filter(&self, ev: Event) {
        match self.dispatch.get() {
            Some(dispatch) => dispatch.filter(ev),
            None => debug!("engine not started; event dropped"),
        }
    }

    /// Route an event straight to the output groups.
    pub fn emit(&self, ev: Event) {
        match self.dispatch.get() {
            Some(dispatch) => dispatch.emit(ev),
            None => debug!("engine not started; event dropped"),
        }
    }

    fn instance(&self, state: &mut BuildState, name: &str) -> Arc<Instance> {
        if let Some(instance) = state.instances.get(name) {
            return Arc::clone(instance);
        }
        let instance = Instance::new(name);
        state.instances.insert(name.to_string(), Arc::clone(&instance));

        if !self.registry.contains(name) {
            let prepare_instance = Arc::clone(&instance);
            let prepare: PrepareFn = Arc::new(move |pipe: Pipe| {
                prepare_instance.install_pipe(pipe);
                prepare_instance.send_info_request();
            });

            let crash_instance = Arc::clone(&instance);
            let crash_name = name.to_string();
            let on_crash: CrashFn = Arc::new(move |err: String| {
                let message = format!("{crash_name} plugin crashed: {err}");
                match crash_instance.dispatch() {
                    Some(dispatch) => dispatch.log("engine", LogLevel::Critical, message),
                    None => tracing::error!("{message}"),
                }
            });

            self.supervisor.add(ProcessEntry {
                name: name.to_string(),
                command: format!("fluxion-{name}"),
                prepare,
                on_crash,
            });
        }
        instance
    }

    fn add_exec_unit(
        &self,
        instance: &Arc<Instance>,
        config: Vec<u8>,
        buffer: Option<Options>,
    ) -> Arc<ExecUnit> {
        let id = self.unit_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let unit = ExecUnit::new(id, instance.name(), config, buffer, instance.writer());
        instance.add_unit(Arc::clone(&unit));
        unit
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
